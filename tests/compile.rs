use crate::{all_off, installed, profile};
use chaser_fingerprint::js::JsValue;
use chaser_fingerprint::profile::{ApiSetting, BlockMode, WebRtcMode};
use chaser_fingerprint::{compile, Compiler, GenerateOptions, NativeWrapper, Window, WindowConfig};

const BARE_WRAPPER: &str = "(function () {\n  'use strict';\n  try {\n  } catch (e) {\n  }\n})();\n";

#[test]
fn test_all_off_compiles_to_bare_wrapper() {
    for options in [
        GenerateOptions::windows(),
        GenerateOptions::macos().browser("firefox"),
        GenerateOptions::linux().browser("edge"),
    ] {
        let script = Compiler::new().compile_script(&all_off(profile(&options)));
        assert!(script.is_empty());
        assert!(script.helpers().is_empty());
        assert_eq!(script.as_str(), BARE_WRAPPER);
    }
}

#[test]
fn test_webrtc_disable_removes_peer_connection() {
    let mut profile = profile(&GenerateOptions::windows().browser("chrome-120"));
    profile.webrtc.mode = WebRtcMode::Disable;

    let source = compile(&profile);
    assert!(source.contains("RTCPeerConnection"));

    let window = installed(&profile);
    assert_eq!(
        window.get("RTCPeerConnection").expect("should read global"),
        JsValue::Undefined
    );
    assert!(!window.has("webkitRTCPeerConnection"));
}

#[test]
fn test_chrome_120_window_reports_profile() {
    let profile = profile(&GenerateOptions::windows().browser("chrome-120"));
    let window = installed(&profile);

    let read = |path: &str| window.read(path).expect("should read path");
    assert_eq!(read("navigator.userAgent"), JsValue::str(&profile.user_agent));
    assert_eq!(read("navigator.platform"), JsValue::from("Win32"));
    assert_eq!(read("navigator.vendor"), JsValue::from("Google Inc."));
    assert_eq!(read("navigator.webdriver"), JsValue::Bool(false));
    assert_eq!(
        read("navigator.hardwareConcurrency"),
        JsValue::from(profile.hardware.cpu_cores)
    );
    assert_eq!(read("navigator.userAgentData.platform"), JsValue::from("Windows"));
    assert_eq!(read("screen.width"), JsValue::from(profile.hardware.screen.width));

    let nav = window.navigator().expect("should have navigator");
    assert!(nav.own_keys().is_empty());
}

#[test]
fn test_webrtc_replace_masks_local_address() {
    let mut profile = profile(&GenerateOptions::linux().browser("chrome"));
    profile.webrtc.local_ip = Some("192.168.7.40".to_string());
    let window = installed(&profile);

    let candidate = window
        .create_ice_candidate("candidate:842163049 1 udp 1677729535 10.0.2.15 54321 typ host generation 0")
        .expect("should create candidate");
    let address = chaser_fingerprint::js::get(&candidate, "address").expect("should read address");
    assert_eq!(address, JsValue::from("192.168.7.40"));
}

#[test]
fn test_blocked_apis_are_gone() {
    let mut profile = profile(&GenerateOptions::windows());
    profile.sensors = ApiSetting::new(BlockMode::Block);
    profile.speech = ApiSetting::new(BlockMode::Block);
    let window = installed(&profile);

    assert!(!window.has("Accelerometer"));
    assert!(!window.has("webkitSpeechRecognition"));
    let voices = chaser_fingerprint::js::invoke(
        &window.read("speechSynthesis").expect("should read speechSynthesis"),
        "getVoices",
        &[],
    )
    .expect("should list voices");
    assert_eq!(voices.to_display(), "");
}

#[test]
fn test_firefox_profile_installs_cleanly() {
    let profile = profile(&GenerateOptions::windows().browser("firefox"));
    let window = Window::new(WindowConfig::firefox());
    let report = Compiler::new()
        .compile_script(&profile)
        .install(&window, &NativeWrapper::isolated());
    assert!(report.is_clean(), "failed blocks: {:?}", report.failed);
    assert_eq!(
        window.read("navigator.userAgentData").expect("should read"),
        JsValue::Undefined
    );
    assert_eq!(
        window.read("navigator.vendor").expect("should read"),
        JsValue::from("")
    );
}

#[test]
fn test_same_profile_compiles_identically() {
    let profile = profile(&GenerateOptions::macos());
    assert_eq!(compile(&profile), compile(&profile));
    let compact = Compiler::compact().compile_script(&profile);
    assert!(compact.as_str().len() < compile(&profile).len());
}
