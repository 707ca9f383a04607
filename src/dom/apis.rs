//! Navigator and the device, media, time and network APIs hanging off it.

use super::canvas::Elements;
use super::host::{
    attr, constant, field_attr, illegal, interface, live, op, record, slot_attr, this_object, Host,
    Shared,
};
use super::WindowConfig;
use crate::error::JsError;
use crate::js::{self, arg, JsObject, JsValue, Property, Slot};
use crate::noise::Rect;
use crate::timezone;

/// Constructors that exist only in Chromium.
const CHROMIUM_SENSORS: [&str; 8] = [
    "Accelerometer",
    "Gyroscope",
    "Magnetometer",
    "AbsoluteOrientationSensor",
    "RelativeOrientationSensor",
    "LinearAccelerationSensor",
    "GravitySensor",
    "AmbientLightSensor",
];

/// A `GeolocationPosition`-shaped value.
pub fn position_object(latitude: f64, longitude: f64, accuracy: f64, timestamp: f64) -> JsObject {
    let coords = js::object([
        ("latitude", JsValue::from(latitude)),
        ("longitude", longitude.into()),
        ("accuracy", accuracy.into()),
        ("altitude", JsValue::Null),
        ("altitudeAccuracy", JsValue::Null),
        ("heading", JsValue::Null),
        ("speed", JsValue::Null),
    ]);
    js::object([("coords", JsValue::from(coords)), ("timestamp", timestamp.into())])
}

/// A `GeolocationPositionError`-shaped value for a refused request.
pub fn permission_denied() -> JsObject {
    js::object([
        ("code", JsValue::from(1u32)),
        ("message", "User denied Geolocation".into()),
        ("PERMISSION_DENIED", 1u32.into()),
        ("POSITION_UNAVAILABLE", 2u32.into()),
        ("TIMEOUT", 3u32.into()),
    ])
}

/// Sample SDP for a data-channel offer gathered on `ip`.
pub fn offer_sdp(ip: &str) -> String {
    format!(
        "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
         m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 {ip}\r\n\
         a=candidate:842163049 1 udp 1677729535 {ip} 54321 typ host generation 0\r\n",
        ip = ip
    )
}

fn frozen_strings(items: &[String]) -> JsObject {
    JsObject::frozen_array(items.iter().map(|s| s.as_str().into()).collect())
}

/// `navigator` and everything reachable from it.
pub(super) fn navigator(global: &JsObject, config: &WindowConfig, shared: &Shared) {
    let nav = interface(global, "Navigator", None, 0, illegal);
    let p = &nav.proto;

    constant(p, "userAgent", config.user_agent.as_str());
    constant(p, "appVersion", config.app_version.as_str());
    constant(p, "platform", config.platform.as_str());
    constant(p, "vendor", config.vendor.as_str());
    constant(p, "productSub", config.product_sub.as_str());
    constant(p, "language", config.language.as_str());
    constant(p, "languages", frozen_strings(&config.languages));
    constant(p, "hardwareConcurrency", config.hardware_concurrency);
    if let Some(memory) = config.device_memory {
        constant(p, "deviceMemory", memory);
    }
    if let Some(oscpu) = &config.oscpu {
        constant(p, "oscpu", oscpu.as_str());
    }
    constant(p, "webdriver", config.webdriver);
    constant(p, "doNotTrack", JsValue::Null);

    if let Some(brands) = &config.ua_brands {
        constant(p, "userAgentData", ua_data(global, config, brands, shared));
    }
    constant(p, "mediaDevices", media_devices(global, shared));
    constant(p, "geolocation", geolocation(global, config));
    constant(p, "clipboard", clipboard(global, shared));

    if config.chromium {
        let battery = interface(global, "BatteryManager", None, 0, illegal);
        constant(&battery.proto, "charging", true);
        constant(&battery.proto, "chargingTime", 0u32);
        constant(&battery.proto, "dischargingTime", f64::INFINITY);
        constant(&battery.proto, "level", 1u32);
        let manager = JsObject::new("BatteryManager", Some(&battery.proto));
        let s = shared.clone();
        op(p, "getBattery", 0, move |_, _| s.resolved(manager.clone().into()));
    }

    let instance = JsObject::new("Navigator", Some(p));
    slot_attr(global, "navigator", instance);
}

fn ua_data(
    global: &JsObject,
    config: &WindowConfig,
    brands: &[(String, String)],
    shared: &Shared,
) -> JsObject {
    let iface = interface(global, "NavigatorUAData", None, 0, illegal);
    let brand_list = |version: &dyn Fn(&str) -> String| {
        JsObject::frozen_array(
            brands
                .iter()
                .map(|(brand, major)| {
                    let entry = js::object([
                        ("brand", JsValue::from(brand.as_str())),
                        ("version", version(major).into()),
                    ]);
                    entry.freeze();
                    entry.into()
                })
                .collect(),
        )
    };
    let list = brand_list(&|major: &str| major.to_string());
    let full = config.full_version.clone();
    let full_list = brand_list(&|major: &str| {
        if full.starts_with(&format!("{}.", major)) {
            full.clone()
        } else {
            format!("{}.0.0.0", major)
        }
    });

    constant(&iface.proto, "brands", list.clone());
    constant(&iface.proto, "mobile", false);
    constant(&iface.proto, "platform", config.ua_platform.as_str());

    let platform = config.ua_platform.clone();
    let high = [
        ("architecture", JsValue::from("x86")),
        ("bitness", "64".into()),
        ("model", "".into()),
        ("platformVersion", "6.5.0".into()),
        ("uaFullVersion", config.full_version.as_str().into()),
        ("fullVersionList", full_list.into()),
    ];
    let s = shared.clone();
    op(&iface.proto, "getHighEntropyValues", 1, move |_, args| {
        let hints = arg(args, 0)
            .as_object()
            .and_then(JsObject::array_items)
            .ok_or_else(|| JsError::type_error("parameter 1 is not iterable"))?;
        let values = js::object([
            ("brands", JsValue::from(list.clone())),
            ("mobile", false.into()),
            ("platform", platform.as_str().into()),
        ]);
        for (key, value) in &high {
            if hints.iter().any(|h| h.as_str() == Some(*key)) {
                values.set(key, value.clone())?;
            }
        }
        s.resolved(values.into())
    });
    JsObject::new("NavigatorUAData", Some(&iface.proto))
}

fn media_devices(global: &JsObject, shared: &Shared) -> JsObject {
    let iface = interface(global, "MediaDevices", None, 0, illegal);
    let s = shared.clone();
    op(&iface.proto, "enumerateDevices", 0, move |_, _| {
        s.resolved(JsObject::array(Vec::new()).into())
    });
    let s = shared.clone();
    op(&iface.proto, "getUserMedia", 1, move |_, _| {
        s.rejected("NotFoundError", "Requested device not found")
    });
    JsObject::new("MediaDevices", Some(&iface.proto))
}

fn geolocation(global: &JsObject, config: &WindowConfig) -> JsObject {
    let iface = interface(global, "Geolocation", None, 0, illegal);
    let location = config.location;
    let now = config.now_ms as f64;
    // Callbacks run synchronously.
    let answer = move |args: &[JsValue]| -> Result<(), JsError> {
        match location {
            Some((lat, lon, accuracy)) => {
                js::call(
                    &arg(args, 0),
                    &JsValue::Undefined,
                    &[position_object(lat, lon, accuracy, now).into()],
                )?;
            }
            None => {
                if arg(args, 1).is_callable() {
                    js::call(&arg(args, 1), &JsValue::Undefined, &[permission_denied().into()])?;
                }
            }
        }
        Ok(())
    };
    let answer = std::sync::Arc::new(answer);
    let a = answer.clone();
    op(&iface.proto, "getCurrentPosition", 1, move |_, args| {
        (*a)(args)?;
        Ok(JsValue::Undefined)
    });
    op(&iface.proto, "watchPosition", 1, move |_, args| {
        (*answer)(args)?;
        Ok(1u32.into())
    });
    JsObject::new("Geolocation", Some(&iface.proto))
}

fn clipboard(global: &JsObject, shared: &Shared) -> JsObject {
    let iface = interface(global, "Clipboard", None, 0, illegal);
    let s = shared.clone();
    op(&iface.proto, "readText", 0, move |_, _| s.resolved("".into()));
    let s = shared.clone();
    op(&iface.proto, "read", 0, move |_, _| s.resolved(JsObject::array(Vec::new()).into()));
    let s = shared.clone();
    op(&iface.proto, "writeText", 1, move |_, _| s.resolved(JsValue::Undefined));
    let s = shared.clone();
    op(&iface.proto, "write", 1, move |_, _| s.resolved(JsValue::Undefined));
    JsObject::new("Clipboard", Some(&iface.proto))
}

pub(super) fn screen(global: &JsObject, config: &WindowConfig) {
    let iface = interface(global, "Screen", None, 0, illegal);
    let s = &config.screen;
    for (key, value) in [
        ("width", s.width),
        ("height", s.height),
        ("availWidth", s.avail_width),
        ("availHeight", s.avail_height),
        ("colorDepth", s.color_depth),
        ("pixelDepth", s.pixel_depth),
    ] {
        constant(&iface.proto, key, value);
    }
    slot_attr(global, "screen", JsObject::new("Screen", Some(&iface.proto)));
    slot_attr(global, "devicePixelRatio", config.device_pixel_ratio);
}

pub(super) fn document(global: &JsObject, elements: &Elements) {
    let html = elements.html.proto.downgrade();
    let canvas = elements.canvas.proto.downgrade();
    let document = JsObject::new("HTMLDocument", None);
    op(&document, "createElement", 1, move |_, args| {
        let tag = arg(args, 0).to_display().to_lowercase();
        if tag == "canvas" {
            return Ok(super::canvas::canvas_object(&live(&canvas)?, 300, 150).into());
        }
        Ok(JsObject::with_slot(
            "HTMLElement",
            Some(&live(&html)?),
            Slot::Element {
                tag,
                rect: Rect::new(0.0, 0.0, 0.0, 0.0),
            },
        )
        .into())
    });
    slot_attr(global, "document", document);

    let console = JsObject::new("console", None);
    for key in ["debug", "log", "warn"] {
        op(&console, key, 0, |_, _| Ok(JsValue::Undefined));
    }
    global.insert(
        "console",
        Property::Data {
            value: console.into(),
            writable: true,
            enumerable: false,
            configurable: true,
        },
    );
}

pub(super) fn audio(global: &JsObject, shared: &Shared) {
    let s = shared.clone();
    let iface = interface(global, "AudioBuffer", None, 1, move |proto, args| {
        let options = arg(args, 0);
        let read = |key| {
            js::get(&options, key)
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
        };
        let (length, count) = (read("length") as usize, read("numberOfChannels").max(1.0) as usize);
        let channels = (0..count)
            .map(|_| s.floats(vec![0.0; length]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsObject::with_slot("AudioBuffer", Some(proto), Slot::Channels(channels)).into())
    });

    fn channel(this: &JsObject, index: &JsValue) -> Result<JsObject, JsError> {
        let i = index.as_f64().unwrap_or(0.0);
        this.with_slot_ref(|slot| match slot {
            Some(Slot::Channels(channels)) => channels
                .get(i as usize)
                .filter(|_| i >= 0.0)
                .cloned()
                .ok_or_else(|| {
                    JsError::dom("IndexSizeError", "The channel index exceeds the number of channels.")
                }),
            _ => Err(JsError::type_error("Illegal invocation")),
        })
    }

    op(&iface.proto, "getChannelData", 1, |this, args| {
        Ok(channel(this_object(this)?, &arg(args, 0))?.into())
    });
    op(&iface.proto, "copyFromChannel", 2, |this, args| {
        let source = channel(this_object(this)?, &arg(args, 1))?;
        let start = arg(args, 2).as_f64().unwrap_or(0.0).max(0.0) as usize;
        let samples = source.with_slot_ref(|slot| match slot {
            Some(Slot::Float32(samples)) => samples.get(start..).map(<[f32]>::to_vec).unwrap_or_default(),
            _ => Vec::new(),
        });
        let dest = arg(args, 0);
        let dest = dest
            .as_object()
            .ok_or_else(|| JsError::type_error("parameter 1 is not of type 'Float32Array'"))?;
        dest.with_slot_mut(|slot| match slot {
            Some(Slot::Float32(out)) => {
                let n = out.len().min(samples.len());
                out[..n].copy_from_slice(&samples[..n]);
                Ok(JsValue::Undefined)
            }
            _ => Err(JsError::type_error("parameter 1 is not of type 'Float32Array'")),
        })
    });
    attr(&iface.proto, "numberOfChannels", |this| {
        this.with_slot_ref(|slot| match slot {
            Some(Slot::Channels(channels)) => Ok((channels.len() as f64).into()),
            _ => Err(JsError::type_error("Illegal invocation")),
        })
    });
    attr(&iface.proto, "length", |this| {
        this.with_slot_ref(|slot| match slot {
            Some(Slot::Channels(channels)) => Ok(channels
                .first()
                .map(|c| c.get("length"))
                .transpose()?
                .unwrap_or_else(|| JsValue::from(0u32))),
            _ => Err(JsError::type_error("Illegal invocation")),
        })
    });
}

pub(super) fn time(global: &JsObject, config: &WindowConfig) {
    let zone = timezone::parse_zone(&config.timezone).unwrap_or(chrono_tz::Tz::UTC);
    let now = config.now_ms;

    let date = interface(global, "Date", None, 7, move |proto, args| {
        let time = arg(args, 0).as_f64().map(|t| t as i64).unwrap_or(now);
        Ok(JsObject::with_slot("Date", Some(proto), Slot::Date(time)).into())
    });
    op(&date.ctor, "now", 0, move |_, _| Ok((now as f64).into()));

    fn time_value(this: &JsValue) -> Result<i64, JsError> {
        this_object(this)?.with_slot_ref(|slot| match slot {
            Some(Slot::Date(t)) => Ok(*t),
            _ => Err(JsError::type_error("this is not a Date object.")),
        })
    }
    op(&date.proto, "getTime", 0, |this, _| Ok((time_value(this)? as f64).into()));
    op(&date.proto, "getTimezoneOffset", 0, move |this, _| {
        let t = time_value(this)?;
        Ok(f64::from(timezone::offset_minutes_at(zone, t)).into())
    });

    let intl = JsObject::new("Intl", None);
    global.insert(
        "Intl",
        Property::Data {
            value: intl.clone().into(),
            writable: true,
            enumerable: false,
            configurable: true,
        },
    );
    let language = config.language.clone();
    let system_zone = config.timezone.clone();
    let format = interface(&intl, "DateTimeFormat", None, 0, move |proto, args| {
        let locale = arg(args, 0).as_str().map(str::to_string).unwrap_or_else(|| language.clone());
        let zone = match js::get(&arg(args, 1), "timeZone") {
            Ok(JsValue::String(zone)) => {
                timezone::parse_zone(&zone)
                    .map_err(|_| JsError::type_error(format!("Invalid time zone specified: {}", zone)))?;
                zone
            }
            _ => system_zone.clone(),
        };
        Ok(record(
            "DateTimeFormat",
            proto,
            vec![("locale", locale.into()), ("timeZone", zone.into())],
        )
        .into())
    });
    op(&format.proto, "resolvedOptions", 0, |this, _| {
        let this = this_object(this)?;
        Ok(js::object([
            ("locale", this.field("locale").unwrap_or_default()),
            ("calendar", "gregory".into()),
            ("numberingSystem", "latn".into()),
            ("timeZone", this.field("timeZone").unwrap_or_default()),
        ])
        .into())
    });
}

pub(super) fn webrtc(global: &JsObject, config: &WindowConfig) {
    let description = interface(global, "RTCSessionDescription", None, 0, |proto, args| {
        let init = arg(args, 0);
        let read = |key| js::get(&init, key).unwrap_or_default();
        Ok(record(
            "RTCSessionDescription",
            proto,
            vec![("type", read("type")), ("sdp", read("sdp"))],
        )
        .into())
    });
    field_attr(&description.proto, "type");
    field_attr(&description.proto, "sdp");

    let candidate = interface(global, "RTCIceCandidate", None, 0, |proto, args| {
        let init = js::get(&arg(args, 0), "candidate").unwrap_or_default();
        Ok(record("RTCIceCandidate", proto, vec![("candidate", init)]).into())
    });
    field_attr(&candidate.proto, "candidate");
    attr(&candidate.proto, "address", |this| {
        let text = this.field("candidate").unwrap_or_default().to_display();
        Ok(text
            .split_whitespace()
            .nth(4)
            .map(JsValue::from)
            .unwrap_or(JsValue::Null))
    });

    let ip = config.local_ip.clone();
    let peer = interface(global, "RTCPeerConnection", None, 0, move |proto, _| {
        Ok(record("RTCPeerConnection", proto, vec![("localIp", ip.as_str().into())]).into())
    });
    let described = description.proto.downgrade();
    attr(&peer.proto, "localDescription", move |this| {
        let ip = this.field("localIp").unwrap_or_default().to_display();
        Ok(record(
            "RTCSessionDescription",
            &live(&described)?,
            vec![("type", "offer".into()), ("sdp", offer_sdp(&ip).into())],
        )
        .into())
    });
    if config.chromium {
        global.insert(
            "webkitRTCPeerConnection",
            Property::Data {
                value: peer.ctor.into(),
                writable: true,
                enumerable: false,
                configurable: true,
            },
        );
    }
}

pub(super) fn sensors(global: &JsObject, config: &WindowConfig) {
    let plain = |proto: &JsObject, _: &[JsValue]| -> Host {
        Ok(JsObject::new(proto.class(), Some(proto)).into())
    };
    if config.chromium {
        for name in CHROMIUM_SENSORS {
            interface(global, name, None, 0, plain);
        }
    }
    interface(global, "DeviceMotionEvent", None, 1, plain);
    interface(global, "DeviceOrientationEvent", None, 1, plain);
}

pub(super) fn speech(global: &JsObject, config: &WindowConfig) {
    let iface = interface(global, "SpeechSynthesis", None, 0, illegal);
    let voices = config.voices.clone();
    op(&iface.proto, "getVoices", 0, move |_, _| {
        Ok(JsObject::array(
            voices
                .iter()
                .map(|name| {
                    js::object([
                        ("name", JsValue::from(name.as_str())),
                        ("lang", "en-US".into()),
                        ("default", false.into()),
                        ("localService", false.into()),
                    ])
                    .into()
                })
                .collect(),
        )
        .into())
    });
    let synthesis = JsObject::new("SpeechSynthesis", Some(&iface.proto));
    slot_attr(global, "speechSynthesis", synthesis);
    if config.chromium {
        interface(global, "webkitSpeechRecognition", None, 0, |proto, _| {
            Ok(JsObject::new("webkitSpeechRecognition", Some(proto)).into())
        });
    }
}

pub(super) fn notification(global: &JsObject, config: &WindowConfig, shared: &Shared) {
    let iface = interface(global, "Notification", None, 1, |proto, _| {
        Ok(JsObject::new("Notification", Some(proto)).into())
    });
    let permission = config.notification_permission.clone();
    slot_attr(&iface.ctor, "permission", permission.as_str());
    let s = shared.clone();
    op(&iface.ctor, "requestPermission", 0, move |_, args| {
        if arg(args, 0).is_callable() {
            js::call(&arg(args, 0), &JsValue::Undefined, &[permission.as_str().into()])?;
        }
        s.resolved(permission.as_str().into())
    });
}
