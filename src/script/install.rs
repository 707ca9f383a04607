//! Installing override blocks into a [`Window`].
//!
//! Each block is applied with the same semantics as its page-side
//! statements: the helpers of the prelude map one-to-one onto
//! [`InstallContext`] methods, and wrapped members go through
//! [`NativeWrapper`] and [`protect_prototype`] so they pass the same
//! native-function checks.

use super::blocks::{
    BatteryBlock, HardwareBlock, NavigatorBlock, Noise, OverrideBlock, Position, UaData,
    CLIPBOARD_METHODS, FAKE_DEVICES, PRIVATE_ADDRESS_PATTERN, RTC_GLOBALS, SENSOR_GLOBALS,
    SPEECH_RECOGNITION_GLOBALS,
};
use super::blocks::{device_group_id, screen_fields};
use crate::dom::{permission_denied, position_object, Window};
use crate::error::{JsError, NativeWrapperError};
use crate::guard::{protect_prototype, ProtectOptions};
use crate::js::{self, arg, JsObject, JsValue, Property, Slot, WeakObject};
use crate::native::{NativeWrapper, WrapOptions};
use crate::noise::{self, Rect};
use crate::timezone;
use dashmap::DashMap;
use regex::{NoExpand, Regex, RegexBuilder};
use std::sync::{Arc, OnceLock};

type Installed = Result<(), NativeWrapperError>;

/// The window being patched and the wrapper that registers replacements.
pub struct InstallContext<'a> {
    window: &'a Window,
    natives: &'a NativeWrapper,
}

impl<'a> InstallContext<'a> {
    pub fn new(window: &'a Window, natives: &'a NativeWrapper) -> Self {
        Self { window, natives }
    }

    fn global(&self) -> &JsObject {
        self.window.global()
    }

    fn proto(&self, name: &str) -> Result<JsObject, JsError> {
        self.window.prototype(name)
    }

    /// Replace the getter for `target[key]`. `f` receives the receiver and
    /// the previous getter, if there was one.
    fn wrap_getter<F>(&self, target: &JsObject, key: &str, f: F) -> Installed
    where
        F: Fn(&JsValue, Option<&JsObject>) -> Result<JsValue, JsError> + Send + Sync + 'static,
    {
        let name = format!("get {}", key);
        let existing = target
            .get_own_property(key)
            .and_then(|p| p.getter_fn().cloned());
        let wrapped = match existing {
            Some(get) => self.natives.wrap_with(
                &get.into(),
                WrapOptions::named(name).length(0),
                move |original, _, this| f(this, Some(original)),
            )?,
            None => JsObject::native_function(&name, 0, move |this, _| f(this, None)),
        };
        protect_prototype(
            &target.clone().into(),
            key,
            &wrapped.into(),
            ProtectOptions::getter(),
        )
    }

    /// Answer `target[key]` with a fixed value. The receiver is still checked:
    /// the previous getter runs first and its value is dropped, and without
    /// one the receiver must inherit from `target` (unless it is the global).
    fn getter(&self, target: &JsObject, key: &str, value: impl Into<JsValue>) -> Installed {
        let value = value.into();
        let holder = target.downgrade();
        let global = target.ptr_eq(self.global());
        self.wrap_getter(target, key, move |this, original| {
            match original {
                Some(original) => {
                    original.call(this, &[])?;
                }
                None if global => {}
                None => {
                    let implements = match (this.as_object(), holder.upgrade()) {
                        (Some(this), Some(holder)) => this.inherits_from(&holder),
                        _ => false,
                    };
                    if !implements {
                        return Err(JsError::type_error("Illegal invocation"));
                    }
                }
            }
            Ok(value.clone())
        })
    }

    /// Wrap the method `target[key]`; `f` receives `(original, args, this)`.
    fn method<F>(&self, target: &JsObject, key: &str, f: F) -> Installed
    where
        F: Fn(&JsObject, &[JsValue], &JsValue) -> Result<JsValue, JsError> + Send + Sync + 'static,
    {
        let original = target.get(key)?;
        if !original.is_callable() {
            return Err(JsError::type_error(format!("{} is not a function", key)).into());
        }
        let wrapped = self.natives.wrap_with(&original, WrapOptions::default(), f)?;
        protect_prototype(
            &target.clone().into(),
            key,
            &wrapped.into(),
            ProtectOptions::preserve(),
        )
    }

    fn remove(&self, target: &JsObject, key: &str) -> Installed {
        if target.has_property(key) {
            target.delete(key)?;
        }
        Ok(())
    }
}

fn truthy(value: &JsValue) -> bool {
    match value {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Bool(b) => *b,
        JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Object(_) => true,
    }
}

fn private_addresses() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(PRIVATE_ADDRESS_PATTERN)
            .case_insensitive(true)
            .build()
            .expect("private address regex is valid")
    })
}

/// Perturb the bytes of a `Uint8Array`/`Uint8ClampedArray` in place.
fn noise_pixels(target: &JsValue, noise: Noise) {
    if let Some(obj) = target.as_object() {
        obj.with_slot_mut(|slot| match slot {
            Some(Slot::Uint8(bytes)) | Some(Slot::Uint8Clamped(bytes)) => {
                noise::perturb_pixels(bytes, noise.seed, noise.level)
            }
            _ => {}
        });
    }
}

/// `Promise.reject(new DOMException(message, "NotAllowedError"))` in the
/// window's realm.
fn reject_not_allowed(global: &WeakObject, message: &str) -> Result<JsValue, JsError> {
    let g: JsValue = global
        .upgrade()
        .ok_or_else(|| JsError::type_error("Illegal invocation"))?
        .into();
    let error = js::call(
        &js::get(&g, "DOMException")?,
        &JsValue::Undefined,
        &[message.into(), "NotAllowedError".into()],
    )?;
    js::invoke(&js::get(&g, "Promise")?, "reject", &[error])
}

fn resolve_in(global: &WeakObject, value: JsValue) -> Result<JsValue, JsError> {
    let g: JsValue = global
        .upgrade()
        .ok_or_else(|| JsError::type_error("Illegal invocation"))?
        .into();
    js::invoke(&js::get(&g, "Promise")?, "resolve", &[value])
}

impl OverrideBlock {
    /// Apply this block to `ctx`'s window.
    pub fn install(&self, ctx: &InstallContext<'_>) -> Installed {
        match self {
            OverrideBlock::Navigator(nav) => install_navigator(ctx, nav),
            OverrideBlock::Hardware(hw) => install_hardware(ctx, hw),
            OverrideBlock::Privacy {
                do_not_track,
                global_privacy_control,
            } => {
                let nav = ctx.proto("Navigator")?;
                if let Some(dnt) = do_not_track {
                    ctx.getter(&nav, "doNotTrack", dnt.as_str())?;
                }
                if *global_privacy_control {
                    ctx.getter(&nav, "globalPrivacyControl", true)?;
                }
                Ok(())
            }
            OverrideBlock::Canvas(noise) => install_canvas(ctx, *noise),
            OverrideBlock::Audio(noise) => install_audio(ctx, *noise),
            OverrideBlock::ClientRects(noise) => {
                let noise = *noise;
                let dom_rect = ctx.global().get("DOMRect")?;
                ctx.method(
                    &ctx.proto("Element")?,
                    "getBoundingClientRect",
                    move |original, args, this| {
                        let rect = original.call(this, args)?;
                        let read = |key| js::get(&rect, key).map(|v| v.as_f64().unwrap_or(0.0));
                        let jittered = noise::jitter_rect(
                            Rect::new(read("x")?, read("y")?, read("width")?, read("height")?),
                            noise.seed,
                            noise.level,
                        );
                        js::call(
                            &dom_rect,
                            &JsValue::Undefined,
                            &[
                                jittered.x.into(),
                                jittered.y.into(),
                                jittered.width.into(),
                                jittered.height.into(),
                            ],
                        )
                    },
                )
            }
            OverrideBlock::WebGl {
                vendor,
                renderer,
                noise,
            } => install_webgl(ctx, vendor, renderer, *noise),
            OverrideBlock::Timezone { zone } => install_timezone(ctx, zone),
            OverrideBlock::Geolocation(position) => install_geolocation(ctx, *position),
            OverrideBlock::WebRtcDisable => {
                for name in RTC_GLOBALS {
                    ctx.remove(ctx.global(), name)?;
                }
                Ok(())
            }
            OverrideBlock::WebRtcReplace { local_ip } => install_webrtc(ctx, local_ip),
            OverrideBlock::MediaDevices { block, seed } => install_media(ctx, *block, *seed),
            OverrideBlock::Battery(BatteryBlock::Remove) => {
                ctx.remove(&ctx.proto("Navigator")?, "getBattery")
            }
            OverrideBlock::Battery(BatteryBlock::Fake {
                level,
                discharging_time,
            }) => {
                let battery = ctx.proto("BatteryManager")?;
                ctx.getter(&battery, "charging", false)?;
                ctx.getter(&battery, "chargingTime", f64::INFINITY)?;
                ctx.getter(&battery, "dischargingTime", *discharging_time)?;
                ctx.getter(&battery, "level", *level)
            }
            OverrideBlock::Sensors => {
                for name in SENSOR_GLOBALS {
                    ctx.remove(ctx.global(), name)?;
                }
                Ok(())
            }
            OverrideBlock::Speech => {
                ctx.method(&ctx.proto("SpeechSynthesis")?, "getVoices", |_, _, _| {
                    Ok(JsObject::array(Vec::new()).into())
                })?;
                for name in SPEECH_RECOGNITION_GLOBALS {
                    ctx.remove(ctx.global(), name)?;
                }
                Ok(())
            }
            OverrideBlock::Clipboard => {
                let clip = ctx.proto("Clipboard")?;
                for name in CLIPBOARD_METHODS {
                    let global = ctx.global().downgrade();
                    ctx.method(&clip, name, move |_, _, _| {
                        reject_not_allowed(&global, "Read permission denied.")
                    })?;
                }
                Ok(())
            }
            OverrideBlock::Notification { permission } => {
                let JsValue::Object(notification) = ctx.global().get("Notification")? else {
                    return Ok(());
                };
                let permission = *permission;
                ctx.getter(&notification, "permission", permission)?;
                let global = ctx.global().downgrade();
                ctx.method(&notification, "requestPermission", move |_, args, _| {
                    if arg(args, 0).is_callable() {
                        js::call(&arg(args, 0), &JsValue::Undefined, &[permission.into()])?;
                    }
                    resolve_in(&global, permission.into())
                })
            }
        }
    }
}

fn install_navigator(ctx: &InstallContext<'_>, nav: &NavigatorBlock) -> Installed {
    let target = ctx.proto("Navigator")?;
    ctx.getter(&target, "userAgent", nav.user_agent.as_str())?;
    ctx.getter(&target, "appVersion", nav.app_version.as_str())?;
    ctx.getter(&target, "platform", nav.platform.as_str())?;
    ctx.getter(&target, "vendor", nav.vendor.as_str())?;
    ctx.getter(&target, "productSub", nav.product_sub.as_str())?;
    ctx.getter(&target, "language", nav.language.as_str())?;
    let languages = nav.languages.iter().map(|l| l.as_str().into()).collect();
    ctx.getter(&target, "languages", JsObject::frozen_array(languages))?;
    ctx.getter(&target, "webdriver", nav.webdriver)?;
    if let Some(oscpu) = &nav.oscpu {
        ctx.getter(&target, "oscpu", oscpu.as_str())?;
    }
    match &nav.ua_data {
        Some(data) => {
            install_ua_data(ctx, data)?;
            install_chromium(ctx)
        }
        None => ctx.remove(&target, "userAgentData"),
    }
}

fn brand_objects(brands: Vec<(String, String)>) -> JsObject {
    JsObject::frozen_array(
        brands
            .into_iter()
            .map(|(brand, version)| {
                let entry = js::object([("brand", brand.into()), ("version", version.into())]);
                entry.freeze();
                entry.into()
            })
            .collect(),
    )
}

fn install_ua_data(ctx: &InstallContext<'_>, data: &UaData) -> Installed {
    let target = ctx.proto("NavigatorUAData")?;
    let list = brand_objects(data.brands.clone());
    ctx.getter(&target, "brands", list.clone())?;
    ctx.getter(&target, "mobile", false)?;
    ctx.getter(&target, "platform", data.platform.as_str())?;

    let platform = data.platform.clone();
    let high: Vec<(&'static str, JsValue)> = vec![
        ("architecture", data.architecture.as_str().into()),
        ("bitness", "64".into()),
        ("model", "".into()),
        ("platformVersion", data.platform_version.as_str().into()),
        ("uaFullVersion", data.full_version.as_str().into()),
        ("fullVersionList", brand_objects(data.full_version_list()).into()),
    ];
    let fill = Arc::new((list, platform, high));
    ctx.method(&target, "getHighEntropyValues", move |original, args, this| {
        let pending = original.call(this, args)?;
        let hints = arg(args, 0)
            .as_object()
            .and_then(JsObject::array_items)
            .unwrap_or_default();
        let fill = fill.clone();
        let on_values = JsObject::native_function("", 1, move |_, values| {
            let values = arg(values, 0);
            let obj = values
                .as_object()
                .ok_or_else(|| JsError::type_error("Cannot set properties of a non-object"))?;
            let (list, platform, high) = &*fill;
            obj.set("brands", list.clone())?;
            obj.set("mobile", false)?;
            obj.set("platform", platform.as_str())?;
            for (key, value) in high {
                if hints.iter().any(|h| h.as_str() == Some(*key)) {
                    obj.set(key, value.clone())?;
                }
            }
            Ok(values.clone())
        });
        js::invoke(&pending, "then", &[on_values.into()])
    })
}

/// `window.chrome` and the proprietary-codec answers of branded Chrome.
fn install_chromium(ctx: &InstallContext<'_>) -> Installed {
    let g = ctx.global();
    if !truthy(&g.get("chrome")?) {
        let app = js::object([("isInstalled", JsValue::from(false))]);
        let runtime = js::object(Vec::<(&str, JsValue)>::new());
        let chrome = js::object([("app", JsValue::from(app)), ("runtime", runtime.into())]);
        g.define_property(
            "chrome",
            Property::Data {
                value: chrome.into(),
                writable: true,
                enumerable: true,
                configurable: false,
            },
        )?;
    }
    let Ok(media) = ctx.proto("HTMLMediaElement") else {
        return Ok(());
    };
    ctx.method(&media, "canPlayType", |original, args, this| {
        let kind = arg(args, 0).to_display();
        if kind.contains("avc1")
            || kind.contains("mp4a.40")
            || kind == "video/mp4"
            || kind == "audio/mp4"
        {
            return Ok("probably".into());
        }
        original.call(this, args)
    })
}

fn install_hardware(ctx: &InstallContext<'_>, hw: &HardwareBlock) -> Installed {
    let nav = ctx.proto("Navigator")?;
    ctx.getter(&nav, "hardwareConcurrency", hw.cpu_cores)?;
    match hw.device_memory {
        Some(memory) => ctx.getter(&nav, "deviceMemory", memory)?,
        None => ctx.remove(&nav, "deviceMemory")?,
    }
    let screen = ctx.proto("Screen")?;
    for (key, value) in screen_fields(&hw.screen) {
        ctx.getter(&screen, key, value)?;
    }
    ctx.getter(ctx.global(), "devicePixelRatio", hw.device_pixel_ratio)
}

fn install_canvas(ctx: &InstallContext<'_>, noise: Noise) -> Installed {
    let context = ctx.proto("CanvasRenderingContext2D")?;
    let canvas = ctx.proto("HTMLCanvasElement")?;
    let get_image_data = context.get("getImageData")?;
    let document = ctx.global().get("document")?;

    // Reads of the canvas itself go through a perturbed copy so repeated
    // exports do not compound the noise.
    let noisy_copy = move |source: &JsValue| -> Result<JsValue, JsError> {
        let width = js::get(source, "width")?;
        let height = js::get(source, "height")?;
        if !truthy(&width) || !truthy(&height) {
            return Ok(source.clone());
        }
        let copy = js::invoke(&document, "createElement", &["canvas".into()])?;
        if let Some(c) = copy.as_object() {
            c.set("width", width.clone())?;
            c.set("height", height.clone())?;
        }
        let context = js::invoke(&copy, "getContext", &["2d".into()])?;
        js::invoke(&context, "drawImage", &[source.clone(), 0u32.into(), 0u32.into()])?;
        let image = js::call(
            &get_image_data,
            &context,
            &[0u32.into(), 0u32.into(), width, height],
        )?;
        noise_pixels(&js::get(&image, "data")?, noise);
        js::invoke(&context, "putImageData", &[image, 0u32.into(), 0u32.into()])?;
        Ok(copy)
    };
    let noisy_copy = Arc::new(noisy_copy);

    ctx.method(&context, "getImageData", move |original, args, this| {
        let image = original.call(this, args)?;
        noise_pixels(&js::get(&image, "data")?, noise);
        Ok(image)
    })?;
    let copy = noisy_copy.clone();
    ctx.method(&canvas, "toDataURL", move |original, args, this| {
        original.call(&(*copy)(this)?, args)
    })?;
    ctx.method(&canvas, "toBlob", move |original, args, this| {
        original.call(&(*noisy_copy)(this)?, args)
    })
}

/// Channel arrays already perturbed, by identity.
#[derive(Default)]
struct Perturbed {
    arrays: DashMap<usize, WeakObject>,
}

impl Perturbed {
    /// Record `samples`, dropping entries for collected arrays. False if it
    /// was already recorded.
    fn first_sight(&self, samples: &JsObject) -> bool {
        let key = samples.addr();
        // An address can be reused after the array is freed.
        let seen = self
            .arrays
            .get(&key)
            .and_then(|w| w.upgrade())
            .is_some_and(|o| o.ptr_eq(samples));
        if seen {
            return false;
        }
        let before = self.arrays.len();
        self.arrays.retain(|_, w| w.is_alive());
        let removed = before - self.arrays.len();
        if removed > 0 {
            tracing::trace!(removed, remaining = self.arrays.len(), "pruned perturbed channels");
        }
        self.arrays.insert(key, samples.downgrade());
        true
    }

    fn len(&self) -> usize {
        self.arrays.len()
    }
}

fn install_audio(ctx: &InstallContext<'_>, noise: Noise) -> Installed {
    let buffer = ctx.proto("AudioBuffer")?;
    let done = Arc::new(Perturbed::default());
    ctx.method(&buffer, "getChannelData", move |original, args, this| {
        let data = original.call(this, args)?;
        if let Some(samples) = data.as_object() {
            if done.first_sight(samples) {
                samples.with_slot_mut(|slot| {
                    if let Some(Slot::Float32(values)) = slot {
                        noise::perturb_samples(values, noise.seed, noise.level);
                    }
                });
            }
        }
        Ok(data)
    })?;
    if buffer.get("copyFromChannel")?.is_callable() {
        ctx.method(&buffer, "copyFromChannel", |original, args, this| {
            js::invoke(this, "getChannelData", &[arg(args, 1)])?;
            original.call(this, args)
        })?;
    }
    Ok(())
}

fn install_webgl(ctx: &InstallContext<'_>, vendor: &str, renderer: &str, noise: Noise) -> Installed {
    let mut patched = 0;
    for name in ["WebGLRenderingContext", "WebGL2RenderingContext"] {
        let Ok(target) = ctx.proto(name) else {
            continue;
        };
        let (vendor, renderer) = (vendor.to_string(), renderer.to_string());
        ctx.method(&target, "getParameter", move |original, args, this| {
            match arg(args, 0).as_f64() {
                Some(p) if p == f64::from(crate::dom::UNMASKED_VENDOR_WEBGL) => {
                    Ok(vendor.as_str().into())
                }
                Some(p) if p == f64::from(crate::dom::UNMASKED_RENDERER_WEBGL) => {
                    Ok(renderer.as_str().into())
                }
                _ => original.call(this, args),
            }
        })?;
        ctx.method(&target, "readPixels", move |original, args, this| {
            let result = original.call(this, args)?;
            let pixels = arg(args, 6);
            if truthy(&pixels) && js::get(&pixels, "BYTES_PER_ELEMENT")? == JsValue::from(1u32) {
                noise_pixels(&pixels, noise);
            }
            Ok(result)
        })?;
        patched += 1;
    }
    if patched == 0 {
        return Err(JsError::Reference("WebGLRenderingContext".to_string()).into());
    }
    Ok(())
}

fn install_timezone(ctx: &InstallContext<'_>, zone: &str) -> Installed {
    let tz = timezone::parse_zone(zone)
        .map_err(|_| JsError::type_error(format!("Invalid time zone specified: {}", zone)))?;
    let intl = ctx.global().get("Intl")?;
    let format = js::get(&intl, "DateTimeFormat")?;
    let formatter = js::call(&format, &JsValue::Undefined, &[])?;
    let system_zone = js::get(&js::invoke(&formatter, "resolvedOptions", &[])?, "timeZone")?;

    let date = ctx.proto("Date")?;
    let get_time = date.get("getTime")?;
    ctx.method(&date, "getTimezoneOffset", move |_, _, this| {
        let time = js::call(&get_time, this, &[])?.as_f64().unwrap_or(f64::NAN);
        if time.is_nan() {
            return Ok(f64::NAN.into());
        }
        let whole_seconds = (time / 1000.0).floor() as i64 * 1000;
        Ok(f64::from(timezone::offset_minutes_at(tz, whole_seconds)).into())
    })?;

    let JsValue::Object(format_proto) = js::get(&format, "prototype")? else {
        return Err(JsError::Reference("Intl.DateTimeFormat".to_string()).into());
    };
    let zone = zone.to_string();
    ctx.method(&format_proto, "resolvedOptions", move |original, args, this| {
        let options = original.call(this, args)?;
        if js::get(&options, "timeZone")? == system_zone {
            if let Some(obj) = options.as_object() {
                obj.set("timeZone", zone.as_str())?;
            }
        }
        Ok(options)
    })
}

fn install_geolocation(ctx: &InstallContext<'_>, position: Option<Position>) -> Installed {
    let target = ctx.proto("Geolocation")?;
    let now = js::get(&ctx.global().get("Date")?, "now")?;
    let answer = move |args: &[JsValue]| -> Result<(), JsError> {
        match position {
            Some(p) => {
                let success = arg(args, 0);
                if success.is_callable() {
                    let timestamp = js::call(&now, &JsValue::Undefined, &[])?
                        .as_f64()
                        .unwrap_or(0.0);
                    let value = position_object(p.latitude, p.longitude, p.accuracy, timestamp);
                    js::call(&success, &JsValue::Undefined, &[value.into()])?;
                }
            }
            None => {
                let failure = arg(args, 1);
                if failure.is_callable() {
                    js::call(&failure, &JsValue::Undefined, &[permission_denied().into()])?;
                }
            }
        }
        Ok(())
    };
    let answer = Arc::new(answer);
    let a = answer.clone();
    ctx.method(&target, "getCurrentPosition", move |_, args, _| {
        (*a)(args)?;
        Ok(JsValue::Undefined)
    })?;
    ctx.method(&target, "watchPosition", move |_, args, _| {
        (*answer)(args)?;
        Ok(1u32.into())
    })
}

fn install_webrtc(ctx: &InstallContext<'_>, local_ip: &str) -> Installed {
    let ip = Arc::new(local_ip.to_string());
    let mask = move |value: JsValue| -> JsValue {
        match value {
            JsValue::String(text) => private_addresses()
                .replace_all(&text, NoExpand(ip.as_str()))
                .into_owned()
                .into(),
            other => other,
        }
    };
    let mask = Arc::new(mask);
    let read = |original: Option<&JsObject>, this: &JsValue| -> Result<JsValue, JsError> {
        original
            .ok_or_else(|| JsError::type_error("Cannot read properties of undefined (reading 'call')"))?
            .call(this, &[])
    };

    let candidate = ctx.proto("RTCIceCandidate")?;
    for key in ["candidate", "address"] {
        let mask = mask.clone();
        ctx.wrap_getter(&candidate, key, move |this, original| {
            Ok((*mask)(read(original, this)?))
        })?;
    }

    let session = ctx.global().get("RTCSessionDescription")?;
    ctx.wrap_getter(
        &ctx.proto("RTCPeerConnection")?,
        "localDescription",
        move |this, original| {
            let description = read(original, this)?;
            if !truthy(&description) {
                return Ok(description);
            }
            let init = js::object([
                ("type", js::get(&description, "type")?),
                ("sdp", (*mask)(js::get(&description, "sdp")?)),
            ]);
            js::call(&session, &JsValue::Undefined, &[init.into()])
        },
    )
}

fn install_media(ctx: &InstallContext<'_>, block: bool, seed: u32) -> Installed {
    let media = ctx.proto("MediaDevices")?;
    let global = ctx.global().downgrade();
    if block {
        for key in ["enumerateDevices", "getUserMedia"] {
            let global = global.clone();
            ctx.method(&media, key, move |_, _, _| {
                reject_not_allowed(&global, "Permission denied")
            })?;
        }
        return Ok(());
    }

    let devices: Arc<Vec<(&'static str, String)>> = Arc::new(
        FAKE_DEVICES
            .iter()
            .map(|(kind, group)| (*kind, device_group_id(seed, *group)))
            .collect(),
    );
    ctx.method(&media, "enumerateDevices", move |original, args, this| {
        let pending = original.call(this, args)?;
        let devices = devices.clone();
        let fill = JsObject::native_function("", 1, move |_, list| {
            let list = arg(list, 0);
            if truthy(&js::get(&list, "length")?) {
                return Ok(list);
            }
            Ok(JsObject::array(
                devices
                    .iter()
                    .map(|(kind, group)| {
                        js::object([
                            ("deviceId", JsValue::from("")),
                            ("kind", (*kind).into()),
                            ("label", "".into()),
                            ("groupId", group.as_str().into()),
                        ])
                        .into()
                    })
                    .collect(),
            )
            .into())
        });
        js::invoke(&pending, "then", &[fill.into()])
    })
}
