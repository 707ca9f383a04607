//! Runs compiled scripts in a JavaScript engine against a minimal page.

use crate::{all_off, profile};
use boa_engine::{Context, Source};
use chaser_fingerprint::profile::{FingerprintProfile, OverrideMode, WebRtcMode};
use chaser_fingerprint::{compile, GenerateOptions};

/// Host interfaces whose attribute getters throw for foreign receivers, the
/// way Web IDL attributes do. `failed` collects blocks that threw.
const PAGE: &str = r#"
var failed = [];
var console = { debug: function (label, block, error) { failed.push(block + ': ' + error); } };
function host(name, attributes) {
  var ctor = function () { throw new TypeError('Illegal constructor'); };
  Object.defineProperty(ctor, 'name', { value: name });
  Object.keys(attributes).forEach(function (key) {
    var value = attributes[key];
    Object.defineProperty(ctor.prototype, key, {
      get: function () {
        if (!(this instanceof ctor)) throw new TypeError('Illegal invocation');
        return value;
      },
      enumerable: true,
      configurable: true
    });
  });
  globalThis[name] = ctor;
  return Object.create(ctor.prototype);
}
var uaData = host('NavigatorUAData', { brands: Object.freeze([]), mobile: false, platform: 'Linux' });
NavigatorUAData.prototype.getHighEntropyValues = function (hints) { return Promise.resolve({}); };
var navigator = host('Navigator', {
  userAgent: 'Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36',
  appVersion: '5.0 (X11; Linux x86_64)',
  platform: 'Linux x86_64',
  vendor: 'Google Inc.',
  productSub: '20030107',
  language: 'en-US',
  languages: Object.freeze(['en-US']),
  webdriver: true,
  hardwareConcurrency: 2,
  userAgentData: uaData
});
globalThis.RTCPeerConnection = function RTCPeerConnection() {};
globalThis.webkitRTCPeerConnection = globalThis.RTCPeerConnection;
"#;

/// Loads [`PAGE`] and runs `profile`'s compiled script in it.
fn page_with(profile: &FingerprintProfile) -> Context {
    let mut context = Context::default();
    context
        .eval(Source::from_bytes(PAGE))
        .expect("page should load");
    let script = compile(profile);
    context
        .eval(Source::from_bytes(&script))
        .unwrap_or_else(|e| panic!("script should run: {}\n{}", e, script));
    assert_eq!(eval(&mut context, "failed.join('; ')"), "");
    context
}

fn eval(context: &mut Context, code: &str) -> String {
    let value = context
        .eval(Source::from_bytes(code))
        .unwrap_or_else(|e| panic!("{}: {}", code, e));
    value
        .to_string(context)
        .expect("should convert to string")
        .to_std_string_escaped()
}

/// Name of the error reading `expr` throws, or `"no error"`.
fn thrown(context: &mut Context, expr: &str) -> String {
    let code = format!(
        "(function () {{ try {{ {}; return 'no error'; }} catch (e) {{ return e.name; }} }})()",
        expr
    );
    eval(context, &code)
}

fn spoofing(options: &GenerateOptions) -> FingerprintProfile {
    let mut profile = all_off(profile(options));
    profile.navigator.mode = OverrideMode::Custom;
    profile.privacy.global_privacy_control = true;
    profile.webrtc.mode = WebRtcMode::Disable;
    profile
}

#[test]
fn test_firefox_script_runs_in_page() {
    let profile = spoofing(&GenerateOptions::macos().browser("firefox"));
    let mut page = page_with(&profile);

    assert_eq!(eval(&mut page, "typeof RTCPeerConnection"), "undefined");
    assert_eq!(eval(&mut page, "typeof webkitRTCPeerConnection"), "undefined");
    assert_eq!(eval(&mut page, "navigator.platform"), profile.os.platform);
    assert_eq!(eval(&mut page, "navigator.userAgent"), profile.user_agent);
    assert_eq!(
        eval(&mut page, "navigator.languages.join(',')"),
        profile.navigator.languages.join(",")
    );
    assert_eq!(eval(&mut page, "navigator.webdriver"), "false");
    assert_eq!(eval(&mut page, "navigator.globalPrivacyControl"), "true");
    assert_eq!(eval(&mut page, "Object.getOwnPropertyNames(navigator).length"), "0");
}

#[test]
fn test_chrome_script_runs_in_page() {
    let profile = spoofing(&GenerateOptions::windows().browser("chrome-120"));
    let mut page = page_with(&profile);

    assert_eq!(eval(&mut page, "navigator.platform"), "Win32");
    assert_eq!(eval(&mut page, "navigator.userAgent"), profile.user_agent);
    assert_eq!(eval(&mut page, "navigator.userAgentData.platform"), "Windows");
    assert_eq!(eval(&mut page, "navigator.userAgentData.mobile"), "false");
    assert_eq!(eval(&mut page, "typeof chrome"), "object");
    assert_eq!(eval(&mut page, "typeof RTCPeerConnection"), "undefined");
}

#[test]
fn test_spoofed_getters_reject_foreign_receivers() {
    let profile = spoofing(&GenerateOptions::windows().browser("chrome-120"));
    let mut page = page_with(&profile);

    for key in ["platform", "userAgent", "globalPrivacyControl"] {
        let descriptor = format!("Object.getOwnPropertyDescriptor(Navigator.prototype, '{}')", key);
        assert_eq!(thrown(&mut page, &format!("Navigator.prototype.{}", key)), "TypeError");
        assert_eq!(thrown(&mut page, &format!("{}.get.call(null)", descriptor)), "TypeError");
        assert_eq!(thrown(&mut page, &format!("{}.get.call({{}})", descriptor)), "TypeError");
        assert_eq!(thrown(&mut page, &format!("navigator.{}", key)), "no error");
        assert_eq!(
            eval(&mut page, &format!("{}.get.toString()", descriptor)),
            format!("function get {}() {{ [native code] }}", key)
        );
    }
}
