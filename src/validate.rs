//! Consistency checks a detector would run, reported rule by rule.
//!
//! A profile can be checked offline before compilation, or a live
//! [`Window`] can be inspected after installation the way a page script would:
//! read `navigator`, look at getter sources and property descriptors.

use crate::dom::Window;
use crate::error::JsError;
use crate::generator::catalog::{DEVICE_MEMORY_VALUES, REALISTIC_CORES};
use crate::js::{JsObject, JsValue, Property};
use crate::noise::SEED_RANGE;
use crate::profile::*;
use crate::timezone;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

/// Navigator getters a spoofing script may replace.
pub const SPOOFABLE_GETTERS: [&str; 11] = [
    "userAgent",
    "appVersion",
    "platform",
    "vendor",
    "productSub",
    "language",
    "languages",
    "webdriver",
    "hardwareConcurrency",
    "deviceMemory",
    "oscpu",
];

/// What to check.
#[derive(Clone, Copy)]
pub enum Subject<'a> {
    Profile(&'a FingerprintProfile),
    Live(&'a Window),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TestOptions<'a> {
    /// For live subjects: also compare each exposed value with this profile.
    pub expected: Option<&'a FingerprintProfile>,
}

impl<'a> TestOptions<'a> {
    pub fn expecting(profile: &'a FingerprintProfile) -> Self {
        Self {
            expected: Some(profile),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// `passed / total`, 1.0 when nothing was checked.
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub summary: Summary,
    pub results: Vec<TestResult>,
}

impl TestReport {
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Append `other`'s results and recount.
    pub fn merge(&mut self, other: TestReport) {
        let results = std::mem::take(&mut self.results);
        *self = Checks {
            results: results.into_iter().chain(other.results).collect(),
        }
        .finish();
    }

    /// The result for rule `name`.
    pub fn get(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            let mark = if r.passed { "PASS" } else { "FAIL" };
            write!(f, "{} {}", mark, r.name)?;
            if !r.passed {
                write!(f, " (expected {}, got {})", r.expected, r.actual)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "{}/{} passed ({:.1}%)",
            self.summary.passed,
            self.summary.total,
            self.summary.pass_rate * 100.0
        )
    }
}

#[derive(Default)]
struct Checks {
    results: Vec<TestResult>,
}

impl Checks {
    fn check(
        &mut self,
        name: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
        passed: bool,
    ) {
        let result = TestResult {
            name: name.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            passed,
        };
        if !result.passed {
            debug!(rule = %result.name, expected = %result.expected, actual = %result.actual, "check failed");
        }
        self.results.push(result);
    }

    fn equal(&mut self, name: impl Into<String>, expected: impl fmt::Display, actual: impl fmt::Display) {
        let (expected, actual) = (expected.to_string(), actual.to_string());
        let passed = expected == actual;
        self.check(name, expected, actual, passed);
    }

    fn finish(self) -> TestReport {
        let total = self.results.len();
        let passed = self.results.iter().filter(|r| r.passed).count();
        TestReport {
            summary: Summary {
                total,
                passed,
                failed: total - passed,
                pass_rate: if total == 0 {
                    1.0
                } else {
                    passed as f64 / total as f64
                },
            },
            results: self.results,
        }
    }
}

/// Run every rule that applies to `subject`.
pub fn run_fingerprint_tests(subject: Subject<'_>, options: TestOptions<'_>) -> TestReport {
    let mut checks = Checks::default();
    match subject {
        Subject::Profile(profile) => profile_rules(&mut checks, profile),
        Subject::Live(window) => {
            live_rules(&mut checks, window);
            if let Some(profile) = options.expected {
                expected_rules(&mut checks, window, profile);
            }
        }
    }
    checks.finish()
}

fn ua_token(browser: BrowserType, major: u32) -> String {
    match browser {
        BrowserType::Chrome => format!("Chrome/{}.", major),
        BrowserType::Edge => format!("Edg/{}.", major),
        BrowserType::Firefox => format!("Firefox/{}.", major),
    }
}

fn profile_rules(c: &mut Checks, p: &FingerprintProfile) {
    let os = p.os.kind;
    c.check(
        "platform matches os",
        os.platforms().join(" | "),
        &p.os.platform,
        os.platforms().contains(&p.os.platform.as_str()),
    );
    c.check(
        "userAgent matches os",
        format!("contains {:?}", os.ua_marker()),
        &p.user_agent,
        p.user_agent.contains(os.ua_marker()),
    );
    let token = ua_token(p.browser.kind, p.browser.major_version);
    let chrome_is_edge = p.browser.kind == BrowserType::Chrome && p.user_agent.contains("Edg/");
    c.check(
        "userAgent matches browser",
        format!("contains {:?}", token),
        &p.user_agent,
        p.user_agent.contains(&token) && !chrome_is_edge,
    );
    c.equal("vendor matches browser", p.browser.kind.vendor(), &p.navigator.vendor);

    let first = p.navigator.languages.first().map(String::as_str).unwrap_or("<none>");
    c.equal("language is languages[0]", &p.navigator.language, first);

    let cores = p.hardware.cpu_cores;
    c.check(
        "cpuCores realistic",
        "one of the common core counts in 1..=128",
        cores,
        (1..=128).contains(&cores) && REALISTIC_CORES.contains(&cores),
    );
    let memory = p.hardware.device_memory;
    c.check(
        "deviceMemory enum",
        "0.25 | 0.5 | 1 | 2 | 4 | 8 | 16 | 32 | 64",
        memory,
        DEVICE_MEMORY_VALUES.contains(&memory),
    );
    c.equal("webdriver false", false, p.navigator.webdriver);

    let s = &p.hardware.screen;
    c.check(
        "screen avail within size",
        format!("<= {}x{}", s.width, s.height),
        format!("{}x{}", s.avail_width, s.avail_height),
        s.avail_width <= s.width && s.avail_height <= s.height,
    );
    c.equal("colorDepth equals pixelDepth", s.color_depth, s.pixel_depth);

    if p.webgl.mode == OverrideMode::Custom {
        let renderer = &p.webgl.renderer;
        let direct3d = renderer.contains("Direct3D") || renderer.contains("D3D11");
        let apple = renderer.contains("Apple") || renderer.contains("Metal");
        let plausible = match os {
            OsType::Windows => !apple,
            OsType::Macos => !direct3d,
            OsType::Linux => !direct3d && !apple,
        };
        c.check(
            "webgl renderer plausible for os",
            format!("a {} GPU", os),
            renderer,
            plausible,
        );
        // Chromium always renders through ANGLE; Firefox only on Windows.
        let angle = renderer.starts_with("ANGLE (") || p.webgl.vendor.starts_with("Google Inc.");
        let wants_angle = p.is_chromium() || os == OsType::Windows;
        c.check(
            "webgl renderer matches browser",
            if wants_angle { "an ANGLE renderer" } else { "a native GL renderer" },
            renderer,
            angle == wants_angle,
        );
    }

    if p.timezone.mode == TimezoneMode::Custom {
        c.check(
            "timezone valid",
            "an IANA zone",
            &p.timezone.name,
            timezone::is_valid_zone(&p.timezone.name),
        );
    }

    if matches!(
        p.geolocation.mode,
        GeolocationMode::IpBased | GeolocationMode::Custom
    ) {
        let (passed, actual) = match p.geolocation.position() {
            Some((lat, lon, accuracy)) => (
                (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) && accuracy > 0.0,
                format!("{}, {} (±{})", lat, lon, accuracy),
            ),
            None => (false, "missing".to_string()),
        };
        c.check("coordinates in range", "lat in [-90, 90], lon in [-180, 180]", actual, passed);
    }

    if p.webrtc.mode == WebRtcMode::Replace {
        let ip = p.webrtc.local_ip.as_deref();
        let private = ip
            .and_then(|ip| ip.parse::<Ipv4Addr>().ok())
            .is_some_and(|ip| ip.is_private());
        c.check(
            "webrtc local ip private",
            "a private IPv4 address",
            ip.unwrap_or("missing"),
            private,
        );
    }

    c.check(
        "noise seed in range",
        format!("< {}", SEED_RANGE),
        p.noise_seed,
        p.noise_seed < SEED_RANGE,
    );
}

fn show(value: &Result<JsValue, JsError>) -> String {
    match value {
        Ok(v) => v.to_display(),
        Err(e) => format!("threw {}", e),
    }
}

fn live_rules(c: &mut Checks, window: &Window) {
    let nav = match window.navigator() {
        Ok(nav) => nav,
        Err(e) => {
            c.check("navigator present", "an object", format!("threw {}", e), false);
            return;
        }
    };
    let read = |key: &str| nav.get(key);

    let ua = show(&read("userAgent"));
    let platform = show(&read("platform"));
    let marker = if platform.starts_with("Win") {
        "Windows NT"
    } else if platform.starts_with("Mac") {
        "Macintosh"
    } else {
        "Linux"
    };
    c.check(
        "userAgent matches platform",
        format!("contains {:?}", marker),
        &ua,
        ua.contains(marker),
    );
    c.check(
        "userAgent has no headless marker",
        "no \"Headless\"",
        &ua,
        !ua.contains("Headless"),
    );

    let vendor = show(&read("vendor"));
    let expected_vendor = if ua.contains("Firefox/") {
        BrowserType::Firefox.vendor()
    } else {
        BrowserType::Chrome.vendor()
    };
    c.equal("vendor matches browser", expected_vendor, &vendor);

    let languages = read("languages");
    let first = languages
        .as_ref()
        .ok()
        .and_then(JsValue::as_object)
        .and_then(JsObject::array_items)
        .and_then(|items| items.first().map(JsValue::to_display))
        .unwrap_or_else(|| "<none>".to_string());
    c.equal("language is languages[0]", show(&read("language")), first);
    let frozen = languages
        .as_ref()
        .ok()
        .and_then(JsValue::as_object)
        .is_some_and(JsObject::is_frozen);
    c.check("languages frozen", true, frozen, frozen);

    let cores = read("hardwareConcurrency");
    let core_ok = cores
        .as_ref()
        .ok()
        .and_then(JsValue::as_f64)
        .is_some_and(|n| n.fract() == 0.0 && REALISTIC_CORES.contains(&(n as u32)));
    c.check("hardwareConcurrency realistic", "a common core count", show(&cores), core_ok);

    let memory = read("deviceMemory");
    let memory_ok = match &memory {
        Ok(JsValue::Undefined) => true,
        Ok(JsValue::Number(n)) => DEVICE_MEMORY_VALUES.contains(n),
        _ => false,
    };
    c.check("deviceMemory enum", "undefined or 0.25 .. 64", show(&memory), memory_ok);

    let webdriver = read("webdriver");
    c.check(
        "webdriver not true",
        "false or undefined",
        show(&webdriver),
        !matches!(webdriver, Ok(JsValue::Bool(true))),
    );

    let Some(proto) = nav.prototype_of() else {
        c.check("Navigator.prototype present", "an object", "null", false);
        return;
    };
    for key in SPOOFABLE_GETTERS {
        let Some(prop) = proto.get_own_property(key) else {
            continue;
        };
        getter_rules(c, key, &prop, &proto);
        let own = nav.has_own_property(key);
        c.check(format!("{} not an own property", key), false, own, !own);
    }
}

fn getter_rules(c: &mut Checks, key: &str, prop: &Property, proto: &JsObject) {
    let source = prop
        .getter_fn()
        .map(|get| get.function_to_string().unwrap_or_else(|e| format!("threw {}", e)))
        .unwrap_or_else(|| "no getter".to_string());
    c.check(
        format!("{} getter is native", key),
        "[native code]",
        &source,
        source.contains("[native code]"),
    );

    let shape = match prop {
        Property::Accessor {
            get,
            set,
            enumerable,
            configurable,
        } => format!(
            "{{get: {}, set: {}, enumerable: {}, configurable: {}}}",
            if get.as_ref().is_some_and(JsObject::is_callable) { "fn" } else { "undefined" },
            if set.is_some() { "fn" } else { "undefined" },
            enumerable,
            configurable
        ),
        Property::Data { .. } => "data property".to_string(),
    };
    c.equal(
        format!("{} descriptor shape", key),
        "{get: fn, set: undefined, enumerable: true, configurable: true}",
        shape,
    );

    // Navigator.prototype.x and get.call(null) throw in a real browser.
    if let Some(get) = prop.getter_fn() {
        let receivers = [
            ("prototype", JsValue::from(proto.clone())),
            ("null", JsValue::Null),
        ];
        for (receiver, this) in receivers {
            let read = get.call(&this, &[]);
            c.check(
                format!("{} getter rejects {} receiver", key, receiver),
                "TypeError: Illegal invocation",
                show(&read),
                matches!(read, Err(JsError::Type(_))),
            );
        }
    }
}

fn expected_rules(c: &mut Checks, window: &Window, p: &FingerprintProfile) {
    let read = |path: &str| show(&window.read(path));
    if p.navigator.mode == OverrideMode::Custom {
        c.equal("userAgent equals profile", &p.user_agent, read("navigator.userAgent"));
        c.equal("platform equals profile", &p.os.platform, read("navigator.platform"));
        c.equal("vendor equals profile", &p.navigator.vendor, read("navigator.vendor"));
        c.equal("language equals profile", &p.navigator.language, read("navigator.language"));
        c.equal(
            "languages equal profile",
            p.navigator.languages.join(","),
            read("navigator.languages"),
        );
    }
    if p.hardware.mode == OverrideMode::Custom {
        c.equal(
            "hardwareConcurrency equals profile",
            p.hardware.cpu_cores,
            read("navigator.hardwareConcurrency"),
        );
        if p.is_chromium() {
            c.equal(
                "deviceMemory equals profile",
                crate::js::format_number(p.hardware.device_memory),
                read("navigator.deviceMemory"),
            );
        }
        c.equal("screen width equals profile", p.hardware.screen.width, read("screen.width"));
        c.equal("screen height equals profile", p.hardware.screen.height, read("screen.height"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FingerprintGenerator, GenerateOptions};

    #[test]
    fn test_generated_profiles_pass() {
        let mut generator = FingerprintGenerator::with_seed(9);
        for _ in 0..20 {
            let profile = generator.generate(&GenerateOptions::new()).unwrap();
            let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
            assert!(report.all_passed(), "{}", report);
        }
    }

    #[test]
    fn test_mismatched_language_fails() {
        let mut profile = FingerprintGenerator::with_seed(1)
            .generate(&GenerateOptions::windows())
            .unwrap();
        profile.navigator.language = "de-DE".to_string();
        profile.navigator.webdriver = true;
        let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
        assert!(!report.get("language is languages[0]").unwrap().passed);
        assert!(!report.get("webdriver false").unwrap().passed);
        assert_eq!(report.summary.failed, 2);
    }

    #[test]
    fn test_major_version_prefix_does_not_match() {
        let mut profile = FingerprintGenerator::with_seed(3)
            .generate(&GenerateOptions::windows().browser("chrome-120"))
            .unwrap();
        assert!(report_for(&profile).get("userAgent matches browser").unwrap().passed);
        profile.browser.major_version = 12;
        let report = report_for(&profile);
        let rule = report.get("userAgent matches browser").unwrap();
        assert!(!rule.passed, "{:?}", rule);
        assert!(profile.user_agent.contains("Chrome/120."));
    }

    fn report_for(profile: &FingerprintProfile) -> TestReport {
        run_fingerprint_tests(Subject::Profile(profile), TestOptions::default())
    }

    #[test]
    fn test_unpatched_headless_window_fails() {
        let window = Window::headless_chrome();
        let report = run_fingerprint_tests(Subject::Live(&window), TestOptions::default());
        assert!(!report.get("userAgent has no headless marker").unwrap().passed);
        assert!(!report.get("webdriver not true").unwrap().passed);
        assert!(report.get("userAgent getter is native").unwrap().passed);
        assert!(report.get("languages frozen").unwrap().passed);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let window = Window::headless_chrome();
        let report = run_fingerprint_tests(Subject::Live(&window), TestOptions::default());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["summary"]["passRate"].is_number());
        assert_eq!(
            json["results"].as_array().unwrap().len(),
            report.summary.total
        );
    }
}
