use crate::{installed, profile};
use chaser_fingerprint::js::{JsObject, JsValue, Property};
use chaser_fingerprint::validate::SPOOFABLE_GETTERS;
use chaser_fingerprint::{
    run_fingerprint_tests, GenerateOptions, NetworkHint, Subject, TestOptions, Window,
};

#[test]
fn test_generated_profiles_are_consistent() {
    for os in ["windows", "macos", "linux"] {
        for browser in ["chrome", "edge", "firefox"] {
            let profile = profile(
                &GenerateOptions::new()
                    .os(os)
                    .browser(browser)
                    .network_hint(NetworkHint::new().timezone("America/New_York").coordinates(40.7, -74.0)),
            );
            let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
            assert!(report.all_passed(), "{}/{}:\n{}", browser, os, report);
            assert_eq!(report.summary.pass_rate, 1.0);
        }
    }
}

#[test]
fn test_implausible_gpu_is_flagged() {
    let mut profile = profile(&GenerateOptions::macos().browser("chrome"));
    profile.webgl.renderer =
        "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)".to_string();
    profile.webrtc.local_ip = Some("8.8.8.8".to_string());

    let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
    let failed: Vec<&str> = report.failures().map(|r| r.name.as_str()).collect();
    assert_eq!(
        failed,
        ["webgl renderer plausible for os", "webrtc local ip private"]
    );
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.summary.passed + 2, report.summary.total);
}

#[test]
fn test_chromium_gpu_on_firefox_is_flagged() {
    let mut profile = profile(&GenerateOptions::macos().browser("firefox"));
    profile.webgl.vendor = "Google Inc. (Apple)".to_string();
    profile.webgl.renderer =
        "ANGLE (Apple, ANGLE Metal Renderer: Apple M1, Unspecified Version)".to_string();

    let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
    let failed: Vec<&str> = report.failures().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, ["webgl renderer matches browser"]);
}

#[test]
fn test_patched_window_passes_live_checks() {
    let profile = profile(&GenerateOptions::windows().browser("chrome-120"));
    let window = installed(&profile);
    let report = run_fingerprint_tests(Subject::Live(&window), TestOptions::expecting(&profile));
    assert!(report.all_passed(), "{}", report);

    for key in ["userAgent", "platform", "languages", "hardwareConcurrency"] {
        assert!(report.get(&format!("{} getter is native", key)).is_some());
        assert!(report.get(&format!("{} descriptor shape", key)).is_some());
    }
    assert!(report.get("userAgent equals profile").is_some());
    for receiver in ["prototype", "null"] {
        let rule = report
            .get(&format!("hardwareConcurrency getter rejects {} receiver", receiver))
            .expect("should check receiver");
        assert!(rule.passed, "{:?}", rule);
    }
}

#[test]
fn test_receiver_blind_getter_is_detected() {
    let window = Window::headless_chrome();
    let proto = window.prototype("Navigator").expect("should have Navigator");
    let get = JsObject::native_function("get platform", 0, |_, _| Ok(JsValue::str("Win32")));
    proto
        .define_property("platform", Property::getter(get))
        .expect("should redefine platform");

    let report = run_fingerprint_tests(Subject::Live(&window), TestOptions::default());
    for receiver in ["prototype", "null"] {
        let rule = report
            .get(&format!("platform getter rejects {} receiver", receiver))
            .expect("should check receiver");
        assert!(!rule.passed);
        assert_eq!(rule.actual, "Win32");
    }
    let stock = report
        .get("userAgent getter rejects prototype receiver")
        .expect("should check userAgent");
    assert!(stock.passed);
}

#[test]
fn test_stock_headless_window_is_detected() {
    let window = Window::headless_chrome();
    let report = run_fingerprint_tests(Subject::Live(&window), TestOptions::default());
    let failed: Vec<&str> = report.failures().map(|r| r.name.as_str()).collect();
    assert!(failed.contains(&"userAgent has no headless marker"));
    assert!(failed.contains(&"webdriver not true"));
    assert!(report.summary.pass_rate < 1.0);
}

#[test]
fn test_instance_override_is_detected() {
    let window = Window::headless_chrome();
    let nav = window.navigator().expect("should have navigator");
    nav.define_property(
        "platform",
        chaser_fingerprint::js::Property::data("Win32"),
    )
    .expect("should define own property");

    let report = run_fingerprint_tests(Subject::Live(&window), TestOptions::default());
    let own = report
        .get("platform not an own property")
        .expect("should check platform");
    assert!(!own.passed);
    assert!(SPOOFABLE_GETTERS.contains(&"platform"));
}

#[test]
fn test_report_json_shape() {
    let profile = profile(&GenerateOptions::linux());
    let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
    let json = serde_json::to_value(&report).expect("should serialize report");
    assert_eq!(json["summary"]["total"], report.summary.total);
    assert!(json["summary"]["passRate"].is_f64());
    let first = &json["results"][0];
    for key in ["name", "expected", "actual", "passed"] {
        assert!(first.get(key).is_some(), "missing {}", key);
    }
}
