//! Profile generation.
//!
//! Options are hints, not requirements: anything left out gets a realistic
//! default drawn from [`catalog`], and everything a page can cross-check
//! (user agent, platform, vendor, client hints) is derived from the chosen
//! browser/OS pair. Only explicit input that cannot be honoured is an error.
//!
//! # Example
//!
//! ```rust
//! use chaser_fingerprint::generator::{FingerprintGenerator, GenerateOptions, NetworkHint};
//!
//! let options = GenerateOptions::windows()
//!     .browser("chrome-120")
//!     .network_hint(NetworkHint::new().timezone("Asia/Ho_Chi_Minh").language("vi-VN"));
//! let profile = FingerprintGenerator::with_seed(7).generate(&options).unwrap();
//! assert!(profile.user_agent.contains("Chrome/120"));
//! assert_eq!(profile.navigator.languages[0], "vi-VN");
//! ```

pub mod catalog;

use crate::error::FingerprintGenerationError;
use crate::noise::{noise_seed, NoiseLevel};
use crate::profile::*;
use crate::timezone;
use catalog::{Gpu, ScreenSize};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Locale information derived from the active proxy's exit node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkHint {
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NetworkHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timezone(mut self, zone: impl Into<String>) -> Self {
        self.timezone = Some(zone.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// What to generate. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateOptions {
    /// `chrome`, `chrome-120`, `edge`, `edge-121`, `firefox`, `firefox-121`.
    pub browser: Option<String>,
    /// `windows`/`win`, `macos`/`mac`/`osx`, `linux`.
    pub os: Option<String>,
    pub network_hint: Option<NetworkHint>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn windows() -> Self {
        Self::new().os("windows")
    }

    pub fn macos() -> Self {
        Self::new().os("macos")
    }

    pub fn linux() -> Self {
        Self::new().os("linux")
    }

    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    pub fn os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn network_hint(mut self, hint: NetworkHint) -> Self {
        self.network_hint = Some(hint);
        self
    }

    /// Read options from a JSON document such as
    /// `{"browser": "firefox", "networkHint": {"timezone": "Europe/Berlin"}}`.
    pub fn from_json(json: &str) -> Result<Self, FingerprintGenerationError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Parse `chrome`, `chrome-120`, `edge-121.0.2277.83`, ...
pub fn parse_browser(
    input: &str,
) -> Result<(BrowserType, Option<u32>), FingerprintGenerationError> {
    let input = input.trim().to_ascii_lowercase();
    let (family, version) = match input.split_once('-') {
        Some((family, version)) => (family, Some(version)),
        None => (input.as_str(), None),
    };
    let browser = match family {
        "chrome" => BrowserType::Chrome,
        "edge" | "msedge" => BrowserType::Edge,
        "firefox" => BrowserType::Firefox,
        _ => return Err(FingerprintGenerationError::UnknownBrowser(input.clone())),
    };
    let major = match version {
        None => None,
        Some(v) => {
            let major = v.split('.').next().unwrap_or(v);
            Some(
                major
                    .parse::<u32>()
                    .map_err(|_| FingerprintGenerationError::MalformedVersion(v.to_string()))?,
            )
        }
    };
    if let Some(major) = major {
        let range = catalog::supported_versions(browser);
        if !range.contains(&major) {
            return Err(FingerprintGenerationError::UnsupportedVersion {
                browser: browser.as_str(),
                major,
                min: *range.start(),
                max: *range.end(),
            });
        }
    }
    Ok((browser, major))
}

pub fn parse_os(input: &str) -> Result<OsType, FingerprintGenerationError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "windows" | "win" => Ok(OsType::Windows),
        "macos" | "mac" | "osx" => Ok(OsType::Macos),
        "linux" => Ok(OsType::Linux),
        other => Err(FingerprintGenerationError::UnknownOs(other.to_string())),
    }
}

fn language_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,3}(?:-[A-Za-z0-9]{2,8})*$").expect("language tag regex is valid")
    })
}

pub fn is_language_tag(tag: &str) -> bool {
    language_tag().is_match(tag)
}

/// `vi-VN` -> `["vi-VN", "vi", "en-US", "en"]`: the primary language, its
/// base, then English as the usual fallback.
pub fn languages_for(language: &str) -> Vec<String> {
    let mut languages = vec![language.to_string()];
    if let Some((base, _)) = language.split_once('-') {
        languages.push(base.to_string());
    }
    for fallback in catalog::DEFAULT_LANGUAGES {
        if !languages.iter().any(|l| l.eq_ignore_ascii_case(fallback)) {
            languages.push(fallback.to_string());
        }
    }
    languages
}

fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

fn check_hint(hint: &NetworkHint) -> Result<(), FingerprintGenerationError> {
    if let Some(zone) = &hint.timezone {
        timezone::parse_zone(zone)?;
    }
    if let Some(language) = &hint.language {
        if !is_language_tag(language) {
            return Err(FingerprintGenerationError::InvalidLanguage(language.clone()));
        }
    }
    if let (Some(latitude), Some(longitude)) = (hint.latitude, hint.longitude) {
        if !valid_coordinates(latitude, longitude) {
            return Err(FingerprintGenerationError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
    }
    Ok(())
}

/// Generates profiles from a random source.
pub struct FingerprintGenerator {
    rng: StdRng,
}

impl Default for FingerprintGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintGenerator {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible output for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(
        &mut self,
        options: &GenerateOptions,
    ) -> Result<FingerprintProfile, FingerprintGenerationError> {
        let requested = options.browser.as_deref().map(parse_browser).transpose()?;
        let os = match options.os.as_deref() {
            Some(os) => parse_os(os)?,
            None => self.pick(&catalog::OS_SHARES, |(_, w)| *w).0,
        };
        let hint = options.network_hint.clone().unwrap_or_default();
        check_hint(&hint)?;

        let (browser, major) = match requested {
            Some((browser, Some(major))) => (browser, major),
            Some((browser, None)) => (browser, self.pick_version(browser)),
            None => {
                let browser = self.pick(&catalog::BROWSER_SHARES, |(_, w)| *w).0;
                (browser, self.pick_version(browser))
            }
        };

        let gpu = *self.pick(catalog::gpus(os, browser), |g: &Gpu| g.weight);
        let cpu_cores = match gpu.cores.choose(&mut self.rng) {
            Some(cores) => *cores,
            None => self.pick(&catalog::CPU_CORES, |(_, w)| *w).0,
        };
        let device_memory = self.pick(&catalog::DEVICE_MEMORY, |(_, w)| *w).0;
        let size = *self.pick(catalog::screens(os), |s: &ScreenSize| s.weight);
        let device_pixel_ratio = self.pick(catalog::pixel_ratios(os), |(_, w)| *w).0;
        let depth = catalog::color_depth(os);
        let screen = Screen {
            width: size.width,
            height: size.height,
            avail_width: size.width,
            avail_height: size.height.saturating_sub(catalog::reserved_height(os)),
            color_depth: depth,
            pixel_depth: depth,
        };

        let languages = match &hint.language {
            Some(language) => languages_for(language),
            None => catalog::DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        };

        let timezone = match &hint.timezone {
            Some(zone) => Timezone {
                mode: TimezoneMode::Custom,
                name: zone.clone(),
            },
            None => Timezone {
                mode: TimezoneMode::Auto,
                name: catalog::typical_timezone(os).to_string(),
            },
        };

        let geolocation = match (hint.latitude, hint.longitude) {
            (Some(latitude), Some(longitude)) => Geolocation {
                mode: GeolocationMode::IpBased,
                latitude: Some(latitude),
                longitude: Some(longitude),
                accuracy: Some(DEFAULT_ACCURACY),
            },
            _ => Geolocation::deny(),
        };

        let profile = FingerprintProfile {
            browser: Browser {
                kind: browser,
                version: catalog::full_version(browser, major),
                major_version: major,
            },
            os: Os {
                kind: os,
                version: catalog::os_version(os).to_string(),
                platform: catalog::platform(os).to_string(),
            },
            user_agent: catalog::user_agent(browser, major, os),
            navigator: NavigatorProfile {
                mode: OverrideMode::Custom,
                vendor: browser.vendor().to_string(),
                language: languages[0].clone(),
                languages,
                webdriver: false,
            },
            hardware: Hardware {
                mode: OverrideMode::Custom,
                cpu_cores,
                device_memory,
                screen,
                device_pixel_ratio,
            },
            canvas: NoiseSettings::noise(NoiseLevel::Medium),
            audio: NoiseSettings::noise(NoiseLevel::Medium),
            client_rects: NoiseSettings::noise(NoiseLevel::Low),
            webgl: WebGl {
                mode: OverrideMode::Custom,
                vendor: gpu.vendor.to_string(),
                renderer: gpu.renderer.to_string(),
                noise_level: NoiseLevel::Low,
            },
            timezone,
            geolocation,
            webrtc: WebRtc {
                mode: WebRtcMode::Replace,
                local_ip: Some(self.local_ip()),
            },
            privacy: Privacy::default(),
            media_devices: ApiSetting::new(DeviceApiMode::Fake),
            battery: ApiSetting::new(DeviceApiMode::Fake),
            sensors: ApiSetting::default(),
            speech: ApiSetting::default(),
            advanced_apis: AdvancedApis::default(),
            noise_seed: noise_seed(&mut self.rng),
        };

        tracing::debug!(
            browser = %profile.browser.kind,
            version = %profile.browser.version,
            os = %profile.os.kind,
            gpu = %profile.webgl.renderer,
            "generated fingerprint profile"
        );
        Ok(profile)
    }

    /// A copy of a saved profile with a fresh noise seed and local IP. The
    /// identity itself is kept.
    pub fn from_template(&mut self, template: &FingerprintProfile) -> FingerprintProfile {
        let mut profile = template.clone();
        profile.noise_seed = noise_seed(&mut self.rng);
        if profile.webrtc.mode == WebRtcMode::Replace {
            profile.webrtc.local_ip = Some(self.local_ip());
        }
        profile
    }

    pub fn from_template_json(
        &mut self,
        json: &str,
    ) -> Result<FingerprintProfile, FingerprintGenerationError> {
        Ok(self.from_template(&FingerprintProfile::from_json(json)?))
    }

    fn pick_version(&mut self, browser: BrowserType) -> u32 {
        self.pick(catalog::current_versions(browser), |(_, w)| *w).0
    }

    fn local_ip(&mut self) -> String {
        let subnet = self.pick(&catalog::LAN_SUBNETS, |(_, w)| *w).0;
        format!("192.168.{}.{}", subnet, self.rng.gen_range(2..=254))
    }

    /// Weighted choice. The tables are non-empty constants with positive
    /// weights, so a failure can only mean a broken table; fall back to the
    /// first entry rather than panic.
    fn pick<'a, T>(&mut self, items: &'a [T], weight: impl Fn(&T) -> f64) -> &'a T {
        match WeightedIndex::new(items.iter().map(weight)) {
            Ok(dist) => &items[dist.sample(&mut self.rng)],
            Err(_) => &items[0],
        }
    }
}

/// Generate one profile from OS entropy.
pub fn generate(options: &GenerateOptions) -> Result<FingerprintProfile, FingerprintGenerationError> {
    FingerprintGenerator::new().generate(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browser() {
        assert_eq!(parse_browser("chrome").unwrap(), (BrowserType::Chrome, None));
        assert_eq!(
            parse_browser("Edge-121").unwrap(),
            (BrowserType::Edge, Some(121))
        );
        assert_eq!(
            parse_browser("firefox-121.0").unwrap(),
            (BrowserType::Firefox, Some(121))
        );
        assert!(matches!(
            parse_browser("safari"),
            Err(FingerprintGenerationError::UnknownBrowser(_))
        ));
        assert!(matches!(
            parse_browser("chrome-80"),
            Err(FingerprintGenerationError::UnsupportedVersion { major: 80, .. })
        ));
        assert!(matches!(
            parse_browser("chrome-latest"),
            Err(FingerprintGenerationError::MalformedVersion(_))
        ));
    }

    #[test]
    fn test_parse_os_aliases() {
        assert_eq!(parse_os("win").unwrap(), OsType::Windows);
        assert_eq!(parse_os("OSX").unwrap(), OsType::Macos);
        assert!(parse_os("android").is_err());
    }

    #[test]
    fn test_languages_for() {
        assert_eq!(languages_for("vi-VN"), vec!["vi-VN", "vi", "en-US", "en"]);
        assert_eq!(languages_for("en-US"), vec!["en-US", "en"]);
        assert_eq!(languages_for("fr"), vec!["fr", "en-US", "en"]);
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let options = GenerateOptions::new();
        let a = FingerprintGenerator::with_seed(42).generate(&options).unwrap();
        let b = FingerprintGenerator::with_seed(42).generate(&options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_macos_cores_match_gpu() {
        let mut generator = FingerprintGenerator::with_seed(3);
        for _ in 0..50 {
            let p = generator.generate(&GenerateOptions::macos()).unwrap();
            let gpu = catalog::gpus(OsType::Macos, p.browser.kind)
                .iter()
                .find(|g| g.renderer == p.webgl.renderer)
                .unwrap();
            assert!(gpu.cores.contains(&p.hardware.cpu_cores));
        }
    }

    #[test]
    fn test_invalid_hint_is_rejected() {
        let mut generator = FingerprintGenerator::with_seed(1);
        let bad_zone = GenerateOptions::new().network_hint(NetworkHint::new().timezone("Nowhere/City"));
        assert!(matches!(
            generator.generate(&bad_zone),
            Err(FingerprintGenerationError::InvalidTimezone(_))
        ));
        let bad_lang = GenerateOptions::new().network_hint(NetworkHint::new().language("not a tag"));
        assert!(matches!(
            generator.generate(&bad_lang),
            Err(FingerprintGenerationError::InvalidLanguage(_))
        ));
        let bad_geo = GenerateOptions::new().network_hint(NetworkHint::new().coordinates(95.0, 0.0));
        assert!(matches!(
            generator.generate(&bad_geo),
            Err(FingerprintGenerationError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_options_from_json() {
        let options = GenerateOptions::from_json(
            r#"{"browser":"firefox","networkHint":{"timezone":"Europe/Berlin"}}"#,
        )
        .unwrap();
        assert_eq!(options.browser.as_deref(), Some("firefox"));
        assert_eq!(options.os, None);
        assert_eq!(
            options.network_hint.unwrap().timezone.as_deref(),
            Some("Europe/Berlin")
        );
    }
}
