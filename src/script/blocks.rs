//! One override block per spoofed API surface.
//!
//! A block carries the constants it needs, resolved from the profile at
//! compile time. It renders to statements for the page script
//! ([`OverrideBlock::to_stmts`]) and can be installed into a mock window
//! with the same semantics (see [`install`](super::install)).

use super::ast::{call, Expr, Stmt};
use super::prelude::Helper;
use crate::noise::NoiseLevel;
use crate::profile::*;

/// Private IPv4 ranges and mDNS host candidates, in a syntax both the
/// `regex` crate and JavaScript `RegExp` accept.
pub const PRIVATE_ADDRESS_PATTERN: &str = r"\b(?:10(?:\.\d{1,3}){3}|192\.168(?:\.\d{1,3}){2}|172\.(?:1[6-9]|2\d|3[01])(?:\.\d{1,3}){2})\b|[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.local";

/// Globals removed when sensors are blocked.
pub const SENSOR_GLOBALS: [&str; 10] = [
    "Accelerometer",
    "Gyroscope",
    "Magnetometer",
    "AbsoluteOrientationSensor",
    "RelativeOrientationSensor",
    "LinearAccelerationSensor",
    "GravitySensor",
    "AmbientLightSensor",
    "DeviceMotionEvent",
    "DeviceOrientationEvent",
];

pub const SPEECH_RECOGNITION_GLOBALS: [&str; 2] = ["SpeechRecognition", "webkitSpeechRecognition"];

pub const RTC_GLOBALS: [&str; 2] = ["RTCPeerConnection", "webkitRTCPeerConnection"];

pub const CLIPBOARD_METHODS: [&str; 4] = ["read", "readText", "write", "writeText"];

/// Seeded noise parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Noise {
    pub seed: u32,
    pub level: NoiseLevel,
}

/// High-entropy client hints.
#[derive(Debug, Clone, PartialEq)]
pub struct UaData {
    pub brands: Vec<(String, String)>,
    pub platform: String,
    pub platform_version: String,
    pub architecture: String,
    pub full_version: String,
}

impl UaData {
    /// `fullVersionList`: the full version for brands that share the
    /// browser's major, `major.0.0.0` for the rest.
    pub fn full_version_list(&self) -> Vec<(String, String)> {
        self.brands
            .iter()
            .map(|(brand, major)| {
                let version = if major == &self.full_version
                    || self.full_version.starts_with(&format!("{}.", major))
                {
                    self.full_version.clone()
                } else {
                    format!("{}.0.0.0", major)
                };
                (brand.clone(), version)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorBlock {
    pub user_agent: String,
    pub app_version: String,
    pub platform: String,
    pub vendor: String,
    pub language: String,
    pub languages: Vec<String>,
    pub webdriver: bool,
    pub product_sub: String,
    /// Firefox only.
    pub oscpu: Option<String>,
    /// Chromium only; Firefox has no `navigator.userAgentData`.
    pub ua_data: Option<UaData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HardwareBlock {
    pub cpu_cores: u32,
    /// `None` removes `navigator.deviceMemory` (Firefox).
    pub device_memory: Option<f64>,
    pub screen: Screen,
    pub device_pixel_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatteryBlock {
    /// Remove `navigator.getBattery`.
    Remove,
    Fake {
        level: f64,
        discharging_time: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideBlock {
    Navigator(NavigatorBlock),
    Hardware(HardwareBlock),
    Privacy {
        do_not_track: Option<DoNotTrack>,
        global_privacy_control: bool,
    },
    Canvas(Noise),
    Audio(Noise),
    ClientRects(Noise),
    WebGl {
        vendor: String,
        renderer: String,
        noise: Noise,
    },
    Timezone {
        zone: String,
    },
    /// `None` denies every request.
    Geolocation(Option<Position>),
    WebRtcDisable,
    WebRtcReplace {
        local_ip: String,
    },
    MediaDevices {
        block: bool,
        seed: u32,
    },
    Battery(BatteryBlock),
    Sensors,
    Speech,
    Clipboard,
    Notification {
        permission: &'static str,
    },
}

/// Fake `enumerateDevices()` entries: kind and group index.
pub const FAKE_DEVICES: [(&str, u32); 3] = [("audioinput", 0), ("videoinput", 1), ("audiooutput", 0)];

/// Stable per-profile group id, shaped like Chromium's 64 hex digits.
pub fn device_group_id(seed: u32, group: u32) -> String {
    (0..8u32)
        .map(|i| {
            let n = crate::noise::pixel_noise(seed, group * 8 + i);
            format!("{:08x}", (n * 2_147_483_647.0) as u32)
        })
        .collect()
}

/// Battery level in `[0.50, 0.99]`, two decimals, from the seed.
pub fn fake_battery(seed: u32) -> BatteryBlock {
    let level = f64::from(50 + seed % 50) / 100.0;
    BatteryBlock::Fake {
        level,
        discharging_time: (level * 18_000.0).round(),
    }
}

impl OverrideBlock {
    /// The blocks `profile` asks for, in emission order. Settings that are
    /// off, real or auto produce nothing.
    pub fn plan(profile: &FingerprintProfile) -> Vec<OverrideBlock> {
        let chromium = profile.is_chromium();
        let seed = profile.noise_seed;
        let mut blocks = Vec::new();

        if profile.navigator.mode == OverrideMode::Custom {
            let ua_data = chromium.then(|| UaData {
                brands: profile.client_hints_brands(),
                platform: profile.client_hints_platform().to_string(),
                platform_version: profile.platform_version(),
                architecture: profile.architecture().to_string(),
                full_version: profile.browser.version.clone(),
            });
            blocks.push(OverrideBlock::Navigator(NavigatorBlock {
                user_agent: profile.user_agent.clone(),
                app_version: profile.app_version(),
                platform: profile.os.platform.clone(),
                vendor: profile.navigator.vendor.clone(),
                language: profile.navigator.language.clone(),
                languages: profile.navigator.languages.clone(),
                webdriver: profile.navigator.webdriver,
                product_sub: profile.product_sub().to_string(),
                oscpu: profile.oscpu(),
                ua_data,
            }));
        }

        if profile.hardware.mode == OverrideMode::Custom {
            blocks.push(OverrideBlock::Hardware(HardwareBlock {
                cpu_cores: profile.hardware.cpu_cores,
                device_memory: chromium.then_some(profile.hardware.device_memory),
                screen: profile.hardware.screen,
                device_pixel_ratio: profile.hardware.device_pixel_ratio,
            }));
        }

        if profile.privacy.do_not_track.is_some() || profile.privacy.global_privacy_control {
            blocks.push(OverrideBlock::Privacy {
                do_not_track: profile.privacy.do_not_track,
                global_privacy_control: profile.privacy.global_privacy_control,
            });
        }

        let noise = |level| Noise { seed, level };
        if let Some(level) = profile.canvas.active() {
            blocks.push(OverrideBlock::Canvas(noise(level)));
        }
        if let Some(level) = profile.audio.active() {
            blocks.push(OverrideBlock::Audio(noise(level)));
        }
        if let Some(level) = profile.client_rects.active() {
            blocks.push(OverrideBlock::ClientRects(noise(level)));
        }
        if profile.webgl.mode == OverrideMode::Custom {
            blocks.push(OverrideBlock::WebGl {
                vendor: profile.webgl.vendor.clone(),
                renderer: profile.webgl.renderer.clone(),
                noise: noise(profile.webgl.noise_level),
            });
        }

        if profile.timezone.mode == TimezoneMode::Custom {
            blocks.push(OverrideBlock::Timezone {
                zone: profile.timezone.name.clone(),
            });
        }

        match profile.geolocation.mode {
            GeolocationMode::Real => {}
            GeolocationMode::Deny => blocks.push(OverrideBlock::Geolocation(None)),
            GeolocationMode::IpBased | GeolocationMode::Custom => {
                // Missing coordinates cannot be reported; deny instead.
                let position = profile.geolocation.position().map(
                    |(latitude, longitude, accuracy)| Position {
                        latitude,
                        longitude,
                        accuracy,
                    },
                );
                blocks.push(OverrideBlock::Geolocation(position));
            }
        }

        match (&profile.webrtc.mode, &profile.webrtc.local_ip) {
            (WebRtcMode::Real, _) => {}
            (WebRtcMode::Disable, _) => blocks.push(OverrideBlock::WebRtcDisable),
            (WebRtcMode::Replace, Some(ip)) => blocks.push(OverrideBlock::WebRtcReplace {
                local_ip: ip.clone(),
            }),
            // Nothing to substitute with: disable rather than leak.
            (WebRtcMode::Replace, None) => blocks.push(OverrideBlock::WebRtcDisable),
        }

        match profile.media_devices.mode {
            DeviceApiMode::Off => {}
            DeviceApiMode::Fake => blocks.push(OverrideBlock::MediaDevices { block: false, seed }),
            DeviceApiMode::Block => blocks.push(OverrideBlock::MediaDevices { block: true, seed }),
        }

        match profile.battery.mode {
            DeviceApiMode::Off => {}
            // Firefox has no Battery Status API at all.
            _ if !chromium => blocks.push(OverrideBlock::Battery(BatteryBlock::Remove)),
            DeviceApiMode::Fake => blocks.push(OverrideBlock::Battery(fake_battery(seed))),
            DeviceApiMode::Block => blocks.push(OverrideBlock::Battery(BatteryBlock::Remove)),
        }

        if profile.sensors.mode == BlockMode::Block {
            blocks.push(OverrideBlock::Sensors);
        }
        if profile.speech.mode == BlockMode::Block {
            blocks.push(OverrideBlock::Speech);
        }
        if profile.advanced_apis.clipboard.mode == BlockMode::Block {
            blocks.push(OverrideBlock::Clipboard);
        }
        match profile.advanced_apis.notification.mode {
            NotificationMode::Off => {}
            NotificationMode::Default => blocks.push(OverrideBlock::Notification {
                permission: "default",
            }),
            NotificationMode::Denied => blocks.push(OverrideBlock::Notification {
                permission: "denied",
            }),
        }

        blocks
    }

    pub fn name(&self) -> &'static str {
        match self {
            OverrideBlock::Navigator(_) => "navigator",
            OverrideBlock::Hardware(_) => "hardware",
            OverrideBlock::Privacy { .. } => "privacy",
            OverrideBlock::Canvas(_) => "canvas",
            OverrideBlock::Audio(_) => "audio",
            OverrideBlock::ClientRects(_) => "clientRects",
            OverrideBlock::WebGl { .. } => "webgl",
            OverrideBlock::Timezone { .. } => "timezone",
            OverrideBlock::Geolocation(_) => "geolocation",
            OverrideBlock::WebRtcDisable | OverrideBlock::WebRtcReplace { .. } => "webrtc",
            OverrideBlock::MediaDevices { .. } => "mediaDevices",
            OverrideBlock::Battery(_) => "battery",
            OverrideBlock::Sensors => "sensors",
            OverrideBlock::Speech => "speech",
            OverrideBlock::Clipboard => "clipboard",
            OverrideBlock::Notification { .. } => "notification",
        }
    }

    /// Prelude helpers the statements call.
    pub fn helpers(&self) -> Vec<Helper> {
        match self {
            OverrideBlock::Navigator(nav) => {
                let mut helpers = vec![Helper::Core];
                if nav.ua_data.is_some() {
                    helpers.extend([Helper::Chromium, Helper::UaData]);
                }
                helpers
            }
            OverrideBlock::Canvas(_) => vec![Helper::Canvas],
            OverrideBlock::Audio(_) => vec![Helper::Audio],
            OverrideBlock::ClientRects(_) => vec![Helper::Rects],
            OverrideBlock::WebGl { .. } => vec![Helper::WebGl],
            OverrideBlock::Timezone { .. } => vec![Helper::Timezone],
            OverrideBlock::Geolocation(_) => vec![Helper::Geolocation],
            OverrideBlock::WebRtcReplace { .. } => vec![Helper::WebRtc],
            _ => vec![Helper::Core],
        }
    }

    pub fn to_stmts(&self) -> Vec<Stmt> {
        let navigator = || Expr::ident("proto").call(vec![Expr::str("Navigator")]);
        match self {
            OverrideBlock::Navigator(nav) => {
                let mut out = vec![Stmt::Const("nav".into(), navigator())];
                let nav_getter = |key: &str, value: Expr| {
                    call("getter", vec![Expr::ident("nav"), Expr::str(key), value])
                };
                out.push(nav_getter("userAgent", Expr::str(&nav.user_agent)));
                out.push(nav_getter("appVersion", Expr::str(&nav.app_version)));
                out.push(nav_getter("platform", Expr::str(&nav.platform)));
                out.push(nav_getter("vendor", Expr::str(&nav.vendor)));
                out.push(nav_getter("productSub", Expr::str(&nav.product_sub)));
                out.push(nav_getter("language", Expr::str(&nav.language)));
                out.push(nav_getter(
                    "languages",
                    Expr::ident("Object")
                        .member("freeze")
                        .call(vec![Expr::strs(&nav.languages)]),
                ));
                out.push(nav_getter("webdriver", Expr::Bool(nav.webdriver)));
                if let Some(oscpu) = &nav.oscpu {
                    out.push(nav_getter("oscpu", Expr::str(oscpu)));
                }
                match &nav.ua_data {
                    Some(data) => {
                        let brands = Expr::Array(
                            data.brands
                                .iter()
                                .map(|(b, v)| Expr::Array(vec![Expr::str(b), Expr::str(v)]))
                                .collect(),
                        );
                        let full_versions = Expr::Array(
                            data.full_version_list()
                                .into_iter()
                                .map(|(brand, version)| {
                                    Expr::Object(vec![
                                        ("brand".into(), Expr::Str(brand)),
                                        ("version".into(), Expr::Str(version)),
                                    ])
                                })
                                .collect(),
                        );
                        let high = Expr::Object(vec![
                            ("architecture".into(), Expr::str(&data.architecture)),
                            ("bitness".into(), Expr::str("64")),
                            ("model".into(), Expr::str("")),
                            ("platformVersion".into(), Expr::str(&data.platform_version)),
                            ("uaFullVersion".into(), Expr::str(&data.full_version)),
                            ("fullVersionList".into(), full_versions),
                        ]);
                        out.push(call(
                            "uaData",
                            vec![brands, Expr::str(&data.platform), high],
                        ));
                        out.push(call("chromium", vec![]));
                    }
                    None => out.push(call(
                        "remove",
                        vec![Expr::ident("nav"), Expr::str("userAgentData")],
                    )),
                }
                out
            }
            OverrideBlock::Hardware(hw) => {
                let mut out = vec![Stmt::Const("nav".into(), navigator())];
                out.push(call(
                    "getter",
                    vec![
                        Expr::ident("nav"),
                        Expr::str("hardwareConcurrency"),
                        Expr::num(hw.cpu_cores),
                    ],
                ));
                out.push(match hw.device_memory {
                    Some(memory) => call(
                        "getter",
                        vec![Expr::ident("nav"), Expr::str("deviceMemory"), Expr::num(memory)],
                    ),
                    None => call("remove", vec![Expr::ident("nav"), Expr::str("deviceMemory")]),
                });
                out.push(Stmt::Const(
                    "scr".into(),
                    Expr::ident("proto").call(vec![Expr::str("Screen")]),
                ));
                for (key, value) in screen_fields(&hw.screen) {
                    out.push(call(
                        "getter",
                        vec![Expr::ident("scr"), Expr::str(key), Expr::num(value)],
                    ));
                }
                out.push(call(
                    "getter",
                    vec![
                        Expr::ident("g"),
                        Expr::str("devicePixelRatio"),
                        Expr::num(hw.device_pixel_ratio),
                    ],
                ));
                out
            }
            OverrideBlock::Privacy {
                do_not_track,
                global_privacy_control,
            } => {
                let mut out = vec![Stmt::Const("nav".into(), navigator())];
                if let Some(dnt) = do_not_track {
                    out.push(call(
                        "getter",
                        vec![Expr::ident("nav"), Expr::str("doNotTrack"), Expr::str(dnt.as_str())],
                    ));
                }
                if *global_privacy_control {
                    out.push(call(
                        "getter",
                        vec![
                            Expr::ident("nav"),
                            Expr::str("globalPrivacyControl"),
                            Expr::Bool(true),
                        ],
                    ));
                }
                out
            }
            OverrideBlock::Canvas(n) => vec![noise_call("noiseCanvas", n.seed, n.level.pixel_scale())],
            OverrideBlock::Audio(n) => vec![noise_call("noiseAudio", n.seed, n.level.audio_scale())],
            OverrideBlock::ClientRects(n) => {
                vec![noise_call("noiseRects", n.seed, n.level.rect_scale())]
            }
            OverrideBlock::WebGl {
                vendor,
                renderer,
                noise,
            } => vec![call(
                "spoofWebgl",
                vec![
                    Expr::str(vendor),
                    Expr::str(renderer),
                    Expr::num(noise.seed),
                    Expr::num(noise.level.pixel_scale()),
                ],
            )],
            OverrideBlock::Timezone { zone } => vec![call("spoofZone", vec![Expr::str(zone)])],
            OverrideBlock::Geolocation(position) => {
                let position = match position {
                    Some(p) => Expr::Object(vec![
                        ("latitude".into(), Expr::num(p.latitude)),
                        ("longitude".into(), Expr::num(p.longitude)),
                        ("accuracy".into(), Expr::num(p.accuracy)),
                    ]),
                    None => Expr::Null,
                };
                vec![call("spoofGeo", vec![position])]
            }
            OverrideBlock::WebRtcDisable => RTC_GLOBALS
                .iter()
                .map(|name| call("remove", vec![Expr::ident("g"), Expr::str(name)]))
                .collect(),
            OverrideBlock::WebRtcReplace { local_ip } => vec![call(
                "replaceRtc",
                vec![Expr::str(local_ip), Expr::str(PRIVATE_ADDRESS_PATTERN)],
            )],
            OverrideBlock::MediaDevices { block, seed } => {
                let body = if *block {
                    vec![Stmt::Return(reject_not_allowed("Permission denied"))]
                } else {
                    let devices = Expr::Array(
                        FAKE_DEVICES
                            .iter()
                            .map(|(kind, group)| {
                                Expr::Object(vec![
                                    ("deviceId".into(), Expr::str("")),
                                    ("kind".into(), Expr::str(kind)),
                                    ("label".into(), Expr::str("")),
                                    ("groupId".into(), Expr::Str(device_group_id(*seed, *group))),
                                ])
                            })
                            .collect(),
                    );
                    vec![Stmt::Return(
                        Expr::ident("original")
                            .member("apply")
                            .call(vec![Expr::ident("self"), Expr::ident("args")])
                            .member("then")
                            .call(vec![Expr::function(
                                &["list"],
                                vec![
                                    Stmt::If(
                                        Expr::ident("list").member("length"),
                                        vec![Stmt::Return(Expr::ident("list"))],
                                    ),
                                    Stmt::Return(devices),
                                ],
                            )]),
                    )]
                };
                let mut out = vec![Stmt::Const(
                    "media".into(),
                    Expr::ident("proto").call(vec![Expr::str("MediaDevices")]),
                )];
                out.push(call(
                    "method",
                    vec![
                        Expr::ident("media"),
                        Expr::str("enumerateDevices"),
                        Expr::function(&["original", "args", "self"], body),
                    ],
                ));
                if *block {
                    out.push(call(
                        "method",
                        vec![
                            Expr::ident("media"),
                            Expr::str("getUserMedia"),
                            Expr::function(
                                &[],
                                vec![Stmt::Return(reject_not_allowed("Permission denied"))],
                            ),
                        ],
                    ));
                }
                out
            }
            OverrideBlock::Battery(BatteryBlock::Remove) => {
                vec![call("remove", vec![navigator(), Expr::str("getBattery")])]
            }
            OverrideBlock::Battery(BatteryBlock::Fake {
                level,
                discharging_time,
            }) => {
                let mut out = vec![Stmt::Const(
                    "battery".into(),
                    Expr::ident("proto").call(vec![Expr::str("BatteryManager")]),
                )];
                for (key, value) in [
                    ("charging", Expr::Bool(false)),
                    ("chargingTime", Expr::Num(f64::INFINITY)),
                    ("dischargingTime", Expr::num(*discharging_time)),
                    ("level", Expr::num(*level)),
                ] {
                    out.push(call(
                        "getter",
                        vec![Expr::ident("battery"), Expr::str(key), value],
                    ));
                }
                out
            }
            OverrideBlock::Sensors => SENSOR_GLOBALS
                .iter()
                .map(|name| call("remove", vec![Expr::ident("g"), Expr::str(name)]))
                .collect(),
            OverrideBlock::Speech => {
                let mut out = vec![call(
                    "method",
                    vec![
                        Expr::ident("proto").call(vec![Expr::str("SpeechSynthesis")]),
                        Expr::str("getVoices"),
                        Expr::function(&[], vec![Stmt::Return(Expr::Array(vec![]))]),
                    ],
                )];
                out.extend(
                    SPEECH_RECOGNITION_GLOBALS
                        .iter()
                        .map(|name| call("remove", vec![Expr::ident("g"), Expr::str(name)])),
                );
                out
            }
            OverrideBlock::Clipboard => {
                let mut out = vec![Stmt::Const(
                    "clip".into(),
                    Expr::ident("proto").call(vec![Expr::str("Clipboard")]),
                )];
                for name in CLIPBOARD_METHODS {
                    out.push(call(
                        "method",
                        vec![
                            Expr::ident("clip"),
                            Expr::str(name),
                            Expr::function(
                                &[],
                                vec![Stmt::Return(reject_not_allowed(
                                    "Read permission denied.",
                                ))],
                            ),
                        ],
                    ));
                }
                out
            }
            OverrideBlock::Notification { permission } => {
                let notification = || Expr::ident("g").member("Notification");
                let first_arg = || index(Expr::ident("args"), 0);
                let request = Expr::function(
                    &["original", "args"],
                    vec![
                        Stmt::If(
                            Expr::Unary("typeof ", Box::new(first_arg()))
                                .binary("===", Expr::str("function")),
                            vec![first_arg().call(vec![Expr::str(permission)]).stmt()],
                        ),
                        Stmt::Return(
                            Expr::ident("Promise")
                                .member("resolve")
                                .call(vec![Expr::str(permission)]),
                        ),
                    ],
                );
                vec![Stmt::If(
                    notification(),
                    vec![
                        call(
                            "getter",
                            vec![notification(), Expr::str("permission"), Expr::str(permission)],
                        ),
                        call(
                            "method",
                            vec![notification(), Expr::str("requestPermission"), request],
                        ),
                    ],
                )]
            }
        }
    }
}

/// `(width, height, ...)` in the order the hardware block installs them.
pub fn screen_fields(screen: &Screen) -> [(&'static str, u32); 6] {
    [
        ("width", screen.width),
        ("height", screen.height),
        ("availWidth", screen.avail_width),
        ("availHeight", screen.avail_height),
        ("colorDepth", screen.color_depth),
        ("pixelDepth", screen.pixel_depth),
    ]
}

fn noise_call(helper: &str, seed: u32, scale: f64) -> Stmt {
    call(helper, vec![Expr::num(seed), Expr::num(scale)])
}

fn reject_not_allowed(message: &str) -> Expr {
    Expr::ident("Promise").member("reject").call(vec![Expr::ident("DOMException")
        .new_with(vec![Expr::str(message), Expr::str("NotAllowedError")])])
}

/// `array[i]`, rendered through a computed member.
fn index(array: Expr, i: usize) -> Expr {
    array.member(&i.to_string())
}
