//! A mock browser window built on the [`js`](crate::js) object model.
//!
//! The window exposes the surfaces the override blocks touch (navigator,
//! screen, canvas, WebGL, audio buffers, dates, `Intl`, geolocation, WebRTC,
//! media devices, battery, sensors, speech, clipboard and notifications) with
//! the shapes a real engine gives them: interface prototypes carrying
//! accessors, instances with no own properties, native `toString` sources.
//! Out of the box it describes an unpatched headless Chromium, which is what
//! the live checks in [`validate`](crate::validate) are meant to catch.

mod apis;
mod canvas;
mod host;

pub use apis::{offer_sdp, permission_denied, position_object};
pub use canvas::{UNMASKED_RENDERER_WEBGL, UNMASKED_VENDOR_WEBGL};
pub use host::error_value;

use crate::error::JsError;
use crate::js::{self, JsObject, JsValue, Slot};
use crate::noise::Rect;
use crate::profile::Screen;
use fnv::FnvHashSet;
use host::Shared;

/// What the unpatched window reports.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub user_agent: String,
    pub app_version: String,
    pub platform: String,
    pub vendor: String,
    pub product_sub: String,
    pub language: String,
    pub languages: Vec<String>,
    pub hardware_concurrency: u32,
    /// `None` hides `navigator.deviceMemory`.
    pub device_memory: Option<f64>,
    pub webdriver: bool,
    pub oscpu: Option<String>,
    /// Client-hint brands `(brand, major)`; `None` hides `navigator.userAgentData`.
    pub ua_brands: Option<Vec<(String, String)>>,
    pub ua_platform: String,
    pub full_version: String,
    pub screen: Screen,
    pub device_pixel_ratio: f64,
    /// IANA zone the engine thinks it is in.
    pub timezone: String,
    /// `(latitude, longitude, accuracy)`; `None` denies permission.
    pub location: Option<(f64, f64, f64)>,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    /// Host candidate address WebRTC gathers.
    pub local_ip: String,
    pub chromium: bool,
    pub notification_permission: String,
    pub voices: Vec<String>,
    /// `Date.now()` and the time of `new Date()`.
    pub now_ms: i64,
}

impl WindowConfig {
    /// Stock headless Chromium on a Linux CI box.
    pub fn headless_chrome() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         HeadlessChrome/120.0.0.0 Safari/537.36"
                .to_string(),
            app_version: "5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                          HeadlessChrome/120.0.0.0 Safari/537.36"
                .to_string(),
            platform: "Linux x86_64".to_string(),
            vendor: "Google Inc.".to_string(),
            product_sub: "20030107".to_string(),
            language: "en-US".to_string(),
            languages: vec!["en-US".to_string()],
            hardware_concurrency: 2,
            device_memory: Some(8.0),
            webdriver: true,
            oscpu: None,
            ua_brands: Some(vec![
                ("Not_A Brand".to_string(), "8".to_string()),
                ("Chromium".to_string(), "120".to_string()),
                ("HeadlessChrome".to_string(), "120".to_string()),
            ]),
            ua_platform: "Linux".to_string(),
            full_version: "120.0.6099.109".to_string(),
            screen: Screen {
                width: 800,
                height: 600,
                avail_width: 800,
                avail_height: 600,
                color_depth: 24,
                pixel_depth: 24,
            },
            device_pixel_ratio: 1.0,
            timezone: "UTC".to_string(),
            location: None,
            webgl_vendor: "Google Inc. (Google)".to_string(),
            webgl_renderer: "ANGLE (Google, Vulkan 1.3.0 (SwiftShader Device (Subzero) \
                             (0x0000C0DE)), SwiftShader driver)"
                .to_string(),
            local_ip: "10.0.2.15".to_string(),
            chromium: true,
            notification_permission: "denied".to_string(),
            voices: Vec::new(),
            now_ms: 1_700_000_000_000,
        }
    }

    /// Desktop Firefox on Linux.
    pub fn firefox() -> Self {
        let user_agent =
            "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string();
        Self {
            app_version: "5.0 (X11)".to_string(),
            user_agent,
            vendor: String::new(),
            product_sub: "20100101".to_string(),
            language: "en-US".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            hardware_concurrency: 8,
            device_memory: None,
            webdriver: false,
            oscpu: Some("Linux x86_64".to_string()),
            ua_brands: None,
            full_version: "121.0".to_string(),
            screen: Screen {
                width: 1920,
                height: 1080,
                avail_width: 1920,
                avail_height: 1053,
                color_depth: 24,
                pixel_depth: 24,
            },
            webgl_vendor: "Mozilla".to_string(),
            webgl_renderer: "Mozilla".to_string(),
            local_ip: "192.168.1.23".to_string(),
            chromium: false,
            notification_permission: "default".to_string(),
            ..Self::headless_chrome()
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::headless_chrome()
    }
}

/// A browser global and everything reachable from it.
///
/// The object graph is full of cycles (`prototype`/`constructor` pairs);
/// dropping the window tears it down.
pub struct Window {
    global: JsObject,
    config: WindowConfig,
}

impl Window {
    pub fn new(config: WindowConfig) -> Self {
        let global = JsObject::new("Window", None);

        let promise = host::promise(&global);
        let dom_exception = host::dom_exception_interface(&global);
        let (_, clamped, float32) = host::typed_arrays(&global);
        let image_data = host::image_data_interface(&global, &clamped.proto);
        let dom_rect = host::geometry(&global);

        let shared = Shared {
            promise: promise.proto.downgrade(),
            dom_exception: dom_exception.proto.downgrade(),
            dom_rect: dom_rect.proto.downgrade(),
            image_data: image_data.proto.downgrade(),
            uint8_clamped: clamped.proto.downgrade(),
            float32: float32.proto.downgrade(),
        };

        let elements = canvas::elements(&global, &config, &shared);
        apis::navigator(&global, &config, &shared);
        apis::screen(&global, &config);
        apis::document(&global, &elements);
        apis::audio(&global, &shared);
        apis::time(&global, &config);
        apis::webrtc(&global, &config);
        apis::sensors(&global, &config);
        apis::speech(&global, &config);
        apis::notification(&global, &config, &shared);

        Window { global, config }
    }

    pub fn headless_chrome() -> Self {
        Self::new(WindowConfig::headless_chrome())
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// `globalThis`.
    pub fn global(&self) -> &JsObject {
        &self.global
    }

    /// `globalThis[key]`.
    pub fn get(&self, key: &str) -> Result<JsValue, JsError> {
        self.global.get(key)
    }

    /// `key in globalThis`.
    pub fn has(&self, key: &str) -> bool {
        self.global.has_property(key)
    }

    /// Read a dotted path such as `"navigator.userAgentData.platform"`.
    pub fn read(&self, path: &str) -> Result<JsValue, JsError> {
        let mut current = JsValue::Object(self.global.clone());
        for key in path.split('.') {
            current = js::get(&current, key)?;
        }
        Ok(current)
    }

    /// `globalThis[name].prototype`, a `ReferenceError` when the interface
    /// does not exist.
    pub fn prototype(&self, name: &str) -> Result<JsObject, JsError> {
        prototype_of(&self.global, name).ok_or_else(|| JsError::Reference(name.to_string()))
    }

    pub fn navigator(&self) -> Result<JsObject, JsError> {
        match self.get("navigator")? {
            JsValue::Object(nav) => Ok(nav),
            _ => Err(JsError::Reference("navigator".to_string())),
        }
    }

    /// `new globalThis[name](...args)`.
    pub fn construct(&self, name: &str, args: &[JsValue]) -> Result<JsValue, JsError> {
        match self.get(name)? {
            JsValue::Object(ctor) if ctor.is_callable() => ctor.call(&JsValue::Undefined, args),
            _ => Err(JsError::Reference(name.to_string())),
        }
    }

    /// `document.createElement("canvas")` sized `width` x `height`.
    pub fn create_canvas(&self, width: u32, height: u32) -> Result<JsObject, JsError> {
        Ok(canvas::canvas_object(
            &self.prototype("HTMLCanvasElement")?,
            width,
            height,
        ))
    }

    /// An element laid out at `rect`.
    pub fn create_element(&self, tag: &str, rect: Rect) -> Result<JsObject, JsError> {
        Ok(JsObject::with_slot(
            "HTMLElement",
            Some(&self.prototype("HTMLElement")?),
            Slot::Element {
                tag: tag.to_lowercase(),
                rect,
            },
        ))
    }

    /// An `AudioBuffer` holding `channels`.
    pub fn create_audio_buffer(&self, channels: Vec<Vec<f32>>) -> Result<JsObject, JsError> {
        let float32 = self.prototype("Float32Array")?;
        let channels = channels
            .into_iter()
            .map(|samples| JsObject::with_slot("Float32Array", Some(&float32), Slot::Float32(samples)))
            .collect();
        Ok(JsObject::with_slot(
            "AudioBuffer",
            Some(&self.prototype("AudioBuffer")?),
            Slot::Channels(channels),
        ))
    }

    /// `new RTCIceCandidate({ candidate })`.
    pub fn create_ice_candidate(&self, candidate: &str) -> Result<JsValue, JsError> {
        let init = js::object([("candidate", JsValue::from(candidate))]);
        self.construct("RTCIceCandidate", &[init.into()])
    }

    pub fn create_peer_connection(&self) -> Result<JsValue, JsError> {
        self.construct("RTCPeerConnection", &[])
    }

    /// Settle a promise returned by the window. Non-promises resolve to
    /// themselves; a pending promise reads as rejected with `undefined`.
    pub fn await_promise(&self, value: &JsValue) -> Result<JsValue, JsValue> {
        let is_promise = value.as_object().map_or(false, |o| o.class() == "Promise");
        if !is_promise {
            return Ok(value.clone());
        }
        match host::settled_state(value) {
            Some((true, value)) => Ok(value),
            Some((false, reason)) => Err(reason),
            None => Err(JsValue::Undefined),
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::headless_chrome()
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        let mut seen = FnvHashSet::default();
        let mut keep = Vec::new();
        let mut queue = vec![self.global.clone()];
        while let Some(obj) = queue.pop() {
            if !seen.insert(obj.addr()) {
                continue;
            }
            queue.extend(obj.detach());
            // Hold every visited object until the walk ends so addresses
            // stay unique.
            keep.push(obj);
        }
    }
}

fn prototype_of(global: &JsObject, name: &str) -> Option<JsObject> {
    match global.get(name).ok()? {
        JsValue::Object(ctor) => match ctor.get("prototype").ok()? {
            JsValue::Object(proto) => Some(proto),
            _ => None,
        },
        _ => None,
    }
}

/// Bytes of a `Uint8Array` or `Uint8ClampedArray`.
pub fn typed_bytes(value: &JsValue) -> Option<Vec<u8>> {
    value.as_object()?.with_slot_ref(|slot| match slot {
        Some(Slot::Uint8(b)) | Some(Slot::Uint8Clamped(b)) => Some(b.clone()),
        _ => None,
    })
}

/// Samples of a `Float32Array`.
pub fn typed_floats(value: &JsValue) -> Option<Vec<f32>> {
    value.as_object()?.with_slot_ref(|slot| match slot {
        Some(Slot::Float32(f)) => Some(f.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_defaults_leak() {
        let window = Window::headless_chrome();
        let ua = window.read("navigator.userAgent").unwrap();
        assert!(ua.to_display().contains("HeadlessChrome"));
        assert_eq!(window.read("navigator.webdriver").unwrap(), JsValue::Bool(true));
        assert!(!window.navigator().unwrap().has_own_property("webdriver"));
        assert!(!window.has("chrome"));
        assert_eq!(window.read("screen.width").unwrap(), JsValue::from(800u32));
    }

    #[test]
    fn test_interfaces_are_linked() {
        let window = Window::headless_chrome();
        let proto = window.prototype("Navigator").unwrap();
        let nav = window.navigator().unwrap();
        assert!(nav.prototype_of().unwrap().ptr_eq(&proto));
        assert!(matches!(window.prototype("Nope"), Err(JsError::Reference(_))));
    }

    #[test]
    fn test_prototype_attributes_check_receiver() {
        let window = Window::headless_chrome();
        let proto = window.prototype("Navigator").unwrap();
        assert!(matches!(proto.get("hardwareConcurrency"), Err(JsError::Type(_))));
        let get = proto
            .get_own_property("platform")
            .and_then(|p| p.getter_fn().cloned())
            .unwrap();
        assert!(get.call(&JsValue::Null, &[]).is_err());
        assert!(get.call(&JsObject::new("Object", None).into(), &[]).is_err());
        assert_eq!(
            get.call(&window.navigator().unwrap().into(), &[]).unwrap(),
            window.read("navigator.platform").unwrap()
        );
        assert!(window.read("devicePixelRatio").is_ok());
    }

    #[test]
    fn test_promises_settle_synchronously() {
        let window = Window::headless_chrome();
        let nav = JsValue::from(window.navigator().unwrap());
        let devices = js::invoke(&js::get(&nav, "mediaDevices").unwrap(), "enumerateDevices", &[])
            .unwrap();
        let list = window.await_promise(&devices).unwrap();
        assert_eq!(list.as_object().unwrap().array_items().unwrap().len(), 0);

        let media = js::get(&nav, "mediaDevices").unwrap();
        let denied = js::invoke(&media, "getUserMedia", &[]).unwrap();
        let reason = window.await_promise(&denied).unwrap_err();
        assert_eq!(js::get(&reason, "name").unwrap(), JsValue::str("NotFoundError"));
    }

    #[test]
    fn test_date_offset_follows_zone() {
        let window = Window::new(WindowConfig {
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            ..WindowConfig::headless_chrome()
        });
        let date = window.construct("Date", &[]).unwrap();
        assert_eq!(js::invoke(&date, "getTimezoneOffset", &[]).unwrap(), JsValue::Number(-420.0));
    }

    #[test]
    fn test_peer_connection_leaks_local_ip() {
        let window = Window::headless_chrome();
        let pc = window.create_peer_connection().unwrap();
        let description = js::get(&pc, "localDescription").unwrap();
        let sdp = js::get(&description, "sdp").unwrap();
        assert!(sdp.to_display().contains("c=IN IP4 10.0.2.15"));
    }

    #[test]
    fn test_drop_tears_down_cycles() {
        let window = Window::headless_chrome();
        let weak = window.prototype("Navigator").unwrap().downgrade();
        drop(window);
        assert!(!weak.is_alive());
    }
}
