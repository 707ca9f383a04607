//! The fingerprint profile: one coherent browser identity.
//!
//! A profile is a plain value. It is produced by the
//! [`generator`](crate::generator), may be edited or stored as JSON, and is
//! compiled into page overrides by [`script`](crate::script). Every field
//! a page can observe is derived from the browser/OS pair; mismatches such as
//! a Windows user agent with a `MacIntel` platform are immediately flagged by
//! detectors, so [`validate`](crate::validate) checks them before compiling.

use crate::error::FingerprintGenerationError;
use crate::noise::NoiseLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    Chrome,
    Edge,
    Firefox,
}

impl BrowserType {
    pub fn as_str(self) -> &'static str {
        match self {
            BrowserType::Chrome => "chrome",
            BrowserType::Edge => "edge",
            BrowserType::Firefox => "firefox",
        }
    }

    /// Blink-based: exposes `userAgentData`, `deviceMemory`, `window.chrome`.
    pub fn is_chromium(self) -> bool {
        !matches!(self, BrowserType::Firefox)
    }

    /// The `navigator.vendor` every build of this browser reports.
    pub fn vendor(self) -> &'static str {
        match self {
            BrowserType::Chrome | BrowserType::Edge => "Google Inc.",
            BrowserType::Firefox => "",
        }
    }
}

impl fmt::Display for BrowserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Windows,
    Macos,
    Linux,
}

impl OsType {
    pub fn as_str(self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::Macos => "macos",
            OsType::Linux => "linux",
        }
    }

    /// `navigator.platform` values a real browser on this OS reports.
    pub fn platforms(self) -> &'static [&'static str] {
        match self {
            OsType::Windows => &["Win32", "Win64"],
            OsType::Macos => &["MacIntel"],
            OsType::Linux => &["Linux x86_64", "Linux armv8l", "Linux aarch64"],
        }
    }

    /// The token this OS leaves in a user agent string.
    pub fn ua_marker(self) -> &'static str {
        match self {
            OsType::Windows => "Windows NT",
            OsType::Macos => "Macintosh",
            OsType::Linux => "Linux",
        }
    }

    /// `Sec-CH-UA-Platform` / `userAgentData.platform`.
    pub fn client_hints_platform(self) -> &'static str {
        match self {
            OsType::Windows => "Windows",
            OsType::Macos => "macOS",
            OsType::Linux => "Linux",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Browser {
    #[serde(rename = "type")]
    pub kind: BrowserType,
    pub version: String,
    pub major_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Os {
    #[serde(rename = "type")]
    pub kind: OsType,
    /// The version as the user agent encodes it (`10.0`, `10.15.7`, ...).
    pub version: String,
    pub platform: String,
}

/// Whether a block of identity overrides is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    Off,
    #[default]
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatorProfile {
    #[serde(default)]
    pub mode: OverrideMode,
    pub vendor: String,
    pub language: String,
    pub languages: Vec<String>,
    #[serde(default)]
    pub webdriver: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub width: u32,
    pub height: u32,
    pub avail_width: u32,
    pub avail_height: u32,
    pub color_depth: u32,
    pub pixel_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hardware {
    #[serde(default)]
    pub mode: OverrideMode,
    pub cpu_cores: u32,
    pub device_memory: f64,
    pub screen: Screen,
    pub device_pixel_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseMode {
    Off,
    #[default]
    Noise,
}

/// Canvas, audio and client-rect settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseSettings {
    pub mode: NoiseMode,
    #[serde(default)]
    pub noise_level: NoiseLevel,
}

impl NoiseSettings {
    pub fn off() -> Self {
        Self {
            mode: NoiseMode::Off,
            noise_level: NoiseLevel::default(),
        }
    }

    pub fn noise(level: NoiseLevel) -> Self {
        Self {
            mode: NoiseMode::Noise,
            noise_level: level,
        }
    }

    /// The level to apply, `None` when off.
    pub fn active(&self) -> Option<NoiseLevel> {
        match self.mode {
            NoiseMode::Noise => Some(self.noise_level),
            NoiseMode::Off => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebGl {
    pub mode: OverrideMode,
    pub vendor: String,
    pub renderer: String,
    #[serde(default)]
    pub noise_level: NoiseLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimezoneMode {
    #[default]
    Auto,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timezone {
    pub mode: TimezoneMode,
    /// IANA zone name, e.g. `Asia/Ho_Chi_Minh`.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationMode {
    Real,
    #[default]
    Deny,
    #[serde(rename = "ip-based")]
    IpBased,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub mode: GeolocationMode,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Geolocation {
    pub fn deny() -> Self {
        Self {
            mode: GeolocationMode::Deny,
            latitude: None,
            longitude: None,
            accuracy: None,
        }
    }

    /// Coordinates to report, for the modes that report any.
    pub fn position(&self) -> Option<(f64, f64, f64)> {
        match self.mode {
            GeolocationMode::IpBased | GeolocationMode::Custom => Some((
                self.latitude?,
                self.longitude?,
                self.accuracy.unwrap_or(DEFAULT_ACCURACY),
            )),
            GeolocationMode::Real | GeolocationMode::Deny => None,
        }
    }
}

/// Metres; roughly city-level, what an IP lookup can justify.
pub const DEFAULT_ACCURACY: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebRtcMode {
    Real,
    #[default]
    Replace,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebRtc {
    pub mode: WebRtcMode,
    #[serde(rename = "localIP")]
    pub local_ip: Option<String>,
}

/// `navigator.doNotTrack` when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoNotTrack {
    #[serde(rename = "0")]
    Disabled,
    #[serde(rename = "1")]
    Enabled,
}

impl DoNotTrack {
    pub fn as_str(self) -> &'static str {
        match self {
            DoNotTrack::Disabled => "0",
            DoNotTrack::Enabled => "1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Privacy {
    pub do_not_track: Option<DoNotTrack>,
    pub global_privacy_control: bool,
}

/// Media devices and battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceApiMode {
    #[default]
    Off,
    Fake,
    Block,
}

/// Sensors, speech and clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockMode {
    #[default]
    Off,
    Block,
}

/// `Notification.permission` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    #[default]
    Off,
    Default,
    Denied,
}

/// `{ "mode": ... }` wrapper used by the single-switch APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiSetting<M> {
    pub mode: M,
}

impl<M> ApiSetting<M> {
    pub fn new(mode: M) -> Self {
        Self { mode }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvancedApis {
    #[serde(default)]
    pub clipboard: ApiSetting<BlockMode>,
    #[serde(default)]
    pub notification: ApiSetting<NotificationMode>,
}

/// A complete, internally consistent browser identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintProfile {
    pub browser: Browser,
    pub os: Os,
    pub user_agent: String,
    pub navigator: NavigatorProfile,
    pub hardware: Hardware,
    pub canvas: NoiseSettings,
    pub audio: NoiseSettings,
    pub client_rects: NoiseSettings,
    pub webgl: WebGl,
    pub timezone: Timezone,
    pub geolocation: Geolocation,
    pub webrtc: WebRtc,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default)]
    pub media_devices: ApiSetting<DeviceApiMode>,
    #[serde(default)]
    pub battery: ApiSetting<DeviceApiMode>,
    #[serde(default)]
    pub sensors: ApiSetting<BlockMode>,
    #[serde(default)]
    pub speech: ApiSetting<BlockMode>,
    #[serde(default)]
    pub advanced_apis: AdvancedApis,
    pub noise_seed: u32,
}

impl FingerprintProfile {
    pub fn to_json(&self) -> String {
        // Plain data with string keys; serializing cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, FingerprintGenerationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_chromium(&self) -> bool {
        self.browser.kind.is_chromium()
    }

    /// `navigator.appVersion`.
    pub fn app_version(&self) -> String {
        if self.is_chromium() {
            self.user_agent
                .strip_prefix("Mozilla/")
                .unwrap_or(&self.user_agent)
                .to_string()
        } else {
            let os = match self.os.kind {
                OsType::Windows => "Windows",
                OsType::Macos => "Macintosh",
                OsType::Linux => "X11",
            };
            format!("5.0 ({})", os)
        }
    }

    /// `navigator.oscpu`, which only Firefox exposes.
    pub fn oscpu(&self) -> Option<String> {
        if self.is_chromium() {
            return None;
        }
        Some(match self.os.kind {
            OsType::Windows => "Windows NT 10.0; Win64; x64".to_string(),
            OsType::Macos => {
                let short: Vec<&str> = self.os.version.split('.').take(2).collect();
                format!("Intel Mac OS X {}", short.join("."))
            }
            OsType::Linux => self.os.platform.clone(),
        })
    }

    /// `navigator.productSub`.
    pub fn product_sub(&self) -> &'static str {
        if self.is_chromium() {
            "20030107"
        } else {
            "20100101"
        }
    }

    pub fn client_hints_platform(&self) -> &'static str {
        self.os.kind.client_hints_platform()
    }

    /// `userAgentData.brands`, in the order the browser would report them.
    /// Empty for Firefox.
    pub fn client_hints_brands(&self) -> Vec<(String, String)> {
        let brand = match self.browser.kind {
            BrowserType::Chrome => "Google Chrome",
            BrowserType::Edge => "Microsoft Edge",
            BrowserType::Firefox => return Vec::new(),
        };
        let major = self.browser.major_version;
        let version = major.to_string();
        let (grease, grease_version) = greased_brand(major);

        let brands = [
            (grease, grease_version.to_string()),
            ("Chromium".to_string(), version.clone()),
            (brand.to_string(), version),
        ];
        // Chromium permutes the three entries by major version.
        const ORDERS: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        ORDERS[(major % 6) as usize]
            .iter()
            .map(|&i| brands[i].clone())
            .collect()
    }

    /// `userAgentData.getHighEntropyValues({platformVersion})`.
    pub fn platform_version(&self) -> String {
        match self.os.kind {
            OsType::Windows => "15.0.0".to_string(),
            OsType::Macos => self.os.version.clone(),
            OsType::Linux => String::new(),
        }
    }

    /// `userAgentData.getHighEntropyValues({architecture})`.
    pub fn architecture(&self) -> &'static str {
        if self.os.platform.contains("arm") || self.os.platform.contains("aarch64") {
            "arm"
        } else {
            "x86"
        }
    }
}

fn greased_brand(major: u32) -> (String, &'static str) {
    const CHARS: [char; 11] = [' ', '(', ':', '-', '.', '/', ')', ';', '=', '?', '_'];
    const VERSIONS: [&str; 3] = ["8", "99", "24"];
    let seed = major as usize;
    (
        format!(
            "Not{}A{}Brand",
            CHARS[seed % CHARS.len()],
            CHARS[(seed + 1) % CHARS.len()]
        ),
        VERSIONS[seed % VERSIONS.len()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geolocation_position() {
        let mut geo = Geolocation::deny();
        assert_eq!(geo.position(), None);
        geo.mode = GeolocationMode::IpBased;
        geo.latitude = Some(10.8);
        geo.longitude = Some(106.6);
        assert_eq!(geo.position(), Some((10.8, 106.6, DEFAULT_ACCURACY)));
        geo.longitude = None;
        assert_eq!(geo.position(), None);
    }

    #[test]
    fn test_greased_brand_is_stable() {
        assert_eq!(greased_brand(120), greased_brand(120));
        let (brand, version) = greased_brand(120);
        assert!(brand.starts_with("Not") && brand.ends_with("Brand"));
        assert!(["8", "99", "24"].contains(&version));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&GeolocationMode::IpBased).unwrap(),
            "\"ip-based\""
        );
        assert_eq!(serde_json::to_string(&DoNotTrack::Enabled).unwrap(), "\"1\"");
        let webrtc = WebRtc {
            mode: WebRtcMode::Replace,
            local_ip: Some("192.168.1.20".into()),
        };
        let json = serde_json::to_value(&webrtc).unwrap();
        assert_eq!(json["localIP"], "192.168.1.20");
        assert_eq!(json["mode"], "replace");
    }
}
