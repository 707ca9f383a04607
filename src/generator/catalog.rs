//! Curated tables the generator draws from.
//!
//! Weights are rough market shares. Everything a page can see is either drawn
//! from here or derived from the browser/OS pair, never invented freely.

use crate::profile::{BrowserType, OsType};
use std::ops::RangeInclusive;

pub const BROWSER_SHARES: [(BrowserType, f64); 3] = [
    (BrowserType::Chrome, 65.0),
    (BrowserType::Edge, 20.0),
    (BrowserType::Firefox, 15.0),
];

pub const OS_SHARES: [(OsType, f64); 3] = [
    (OsType::Windows, 70.0),
    (OsType::Macos, 20.0),
    (OsType::Linux, 10.0),
];

/// Major versions an explicit request may ask for.
pub fn supported_versions(browser: BrowserType) -> RangeInclusive<u32> {
    match browser {
        BrowserType::Chrome | BrowserType::Edge => 115..=131,
        BrowserType::Firefox => 115..=133,
    }
}

/// Versions picked when none is requested: the current release train.
pub fn current_versions(browser: BrowserType) -> &'static [(u32, f64)] {
    match browser {
        BrowserType::Chrome | BrowserType::Edge => {
            &[(131, 30.0), (130, 35.0), (129, 20.0), (128, 10.0), (127, 5.0)]
        }
        BrowserType::Firefox => &[(133, 35.0), (132, 30.0), (131, 15.0), (128, 15.0), (115, 5.0)],
    }
}

/// Full version string as the browser reports it. Chromium has frozen the
/// minor/build/patch parts of its user agent.
pub fn full_version(browser: BrowserType, major: u32) -> String {
    match browser {
        BrowserType::Chrome | BrowserType::Edge => format!("{}.0.0.0", major),
        BrowserType::Firefox => format!("{}.0", major),
    }
}

/// `os.version` as the user agent encodes it.
pub fn os_version(os: OsType) -> &'static str {
    match os {
        OsType::Windows => "10.0",
        OsType::Macos => "10.15.7",
        OsType::Linux => "x86_64",
    }
}

/// `navigator.platform`. Chromium reports `Win32` on 64-bit Windows too.
pub fn platform(os: OsType) -> &'static str {
    match os {
        OsType::Windows => "Win32",
        OsType::Macos => "MacIntel",
        OsType::Linux => "Linux x86_64",
    }
}

pub fn user_agent(browser: BrowserType, major: u32, os: OsType) -> String {
    match browser {
        BrowserType::Firefox => {
            let system = match os {
                OsType::Windows => "Windows NT 10.0; Win64; x64".to_string(),
                OsType::Macos => "Macintosh; Intel Mac OS X 10.15".to_string(),
                OsType::Linux => "X11; Linux x86_64".to_string(),
            };
            format!(
                "Mozilla/5.0 ({system}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0",
                system = system,
                major = major
            )
        }
        BrowserType::Chrome | BrowserType::Edge => {
            let system = match os {
                OsType::Windows => "Windows NT 10.0; Win64; x64",
                OsType::Macos => "Macintosh; Intel Mac OS X 10_15_7",
                OsType::Linux => "X11; Linux x86_64",
            };
            let mut ua = format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
                system, major
            );
            if browser == BrowserType::Edge {
                ua.push_str(&format!(" Edg/{}.0.0.0", major));
            }
            ua
        }
    }
}

/// A WebGL unmasked vendor/renderer pair.
#[derive(Debug, Clone, Copy)]
pub struct Gpu {
    pub vendor: &'static str,
    pub renderer: &'static str,
    pub weight: f64,
    /// Core counts this GPU ships with, for integrated parts. Empty means
    /// any desktop CPU.
    pub cores: &'static [u32],
}

const fn gpu(vendor: &'static str, renderer: &'static str, weight: f64) -> Gpu {
    Gpu {
        vendor,
        renderer,
        weight,
        cores: &[],
    }
}

const WINDOWS_GPUS: &[Gpu] = &[
    gpu(
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)",
        12.0,
    ),
    gpu(
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce RTX 4060 Direct3D11 vs_5_0 ps_5_0, D3D11)",
        10.0,
    ),
    gpu(
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce GTX 1660 SUPER Direct3D11 vs_5_0 ps_5_0, D3D11)",
        6.0,
    ),
    gpu(
        "Google Inc. (Intel)",
        "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)",
        15.0,
    ),
    gpu(
        "Google Inc. (Intel)",
        "ANGLE (Intel, Intel(R) Iris(R) Xe Graphics Direct3D11 vs_5_0 ps_5_0, D3D11)",
        12.0,
    ),
    gpu(
        "Google Inc. (AMD)",
        "ANGLE (AMD, AMD Radeon RX 6600 Direct3D11 vs_5_0 ps_5_0, D3D11)",
        8.0,
    ),
];

const MACOS_GPUS: &[Gpu] = &[
    Gpu {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, ANGLE Metal Renderer: Apple M1, Unspecified Version)",
        weight: 20.0,
        cores: &[8],
    },
    Gpu {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, ANGLE Metal Renderer: Apple M1 Pro, Unspecified Version)",
        weight: 12.0,
        cores: &[8, 10],
    },
    Gpu {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, ANGLE Metal Renderer: Apple M2, Unspecified Version)",
        weight: 18.0,
        cores: &[8],
    },
    Gpu {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, ANGLE Metal Renderer: Apple M2 Pro, Unspecified Version)",
        weight: 10.0,
        cores: &[10, 12],
    },
    Gpu {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, ANGLE Metal Renderer: Apple M3 Pro, Unspecified Version)",
        weight: 10.0,
        cores: &[11, 12],
    },
    Gpu {
        vendor: "Google Inc. (Intel Inc.)",
        renderer: "ANGLE (Intel Inc., Intel(R) Iris(TM) Plus Graphics OpenGL Engine, OpenGL 4.1)",
        weight: 8.0,
        cores: &[4, 8],
    },
];

const LINUX_GPUS: &[Gpu] = &[
    gpu(
        "Google Inc. (Intel)",
        "ANGLE (Intel, Mesa Intel(R) UHD Graphics 620 (KBL GT2), OpenGL 4.6)",
        25.0,
    ),
    gpu(
        "Google Inc. (NVIDIA Corporation)",
        "ANGLE (NVIDIA Corporation, NVIDIA GeForce GTX 1660/PCIe/SSE2, OpenGL 4.5.0)",
        20.0,
    ),
    gpu(
        "Google Inc. (NVIDIA Corporation)",
        "ANGLE (NVIDIA Corporation, NVIDIA GeForce RTX 3060/PCIe/SSE2, OpenGL 4.5.0)",
        12.0,
    ),
    gpu(
        "Google Inc. (AMD)",
        "ANGLE (AMD, AMD Radeon RX 580 Series (radeonsi, polaris10, LLVM 15.0.7), OpenGL 4.6)",
        15.0,
    ),
];

// Firefox reports bucketed renderer names. It goes through ANGLE only on
// Windows and never reports a "Google Inc." vendor elsewhere.
const FIREFOX_WINDOWS_GPUS: &[Gpu] = &[
    gpu(
        "Google Inc. (NVIDIA)",
        "ANGLE (NVIDIA, NVIDIA GeForce GTX 980 Direct3D11 vs_5_0 ps_5_0), or similar",
        25.0,
    ),
    gpu(
        "Google Inc. (Intel)",
        "ANGLE (Intel, Intel(R) HD Graphics 400 Direct3D11 vs_5_0 ps_5_0), or similar",
        30.0,
    ),
    gpu(
        "Google Inc. (AMD)",
        "ANGLE (AMD, Radeon R9 200 Series Direct3D11 vs_5_0 ps_5_0), or similar",
        10.0,
    ),
];

const FIREFOX_MACOS_GPUS: &[Gpu] = &[
    Gpu {
        vendor: "Apple",
        renderer: "Apple M1, or similar",
        weight: 60.0,
        cores: &[8, 10, 11, 12],
    },
    Gpu {
        vendor: "Intel Inc.",
        renderer: "Intel(R) HD Graphics 400, or similar",
        weight: 10.0,
        cores: &[4, 8],
    },
];

const FIREFOX_LINUX_GPUS: &[Gpu] = &[
    gpu("Intel", "Intel(R) HD Graphics 400, or similar", 30.0),
    gpu("NVIDIA Corporation", "NVIDIA GeForce GTX 980, or similar", 25.0),
    gpu("AMD", "Radeon R9 200 Series, or similar", 12.0),
];

/// WebGL vendor/renderer pairs as `browser` reports them on `os`.
pub fn gpus(os: OsType, browser: BrowserType) -> &'static [Gpu] {
    match (browser, os) {
        (BrowserType::Firefox, OsType::Windows) => FIREFOX_WINDOWS_GPUS,
        (BrowserType::Firefox, OsType::Macos) => FIREFOX_MACOS_GPUS,
        (BrowserType::Firefox, OsType::Linux) => FIREFOX_LINUX_GPUS,
        (_, OsType::Windows) => WINDOWS_GPUS,
        (_, OsType::Macos) => MACOS_GPUS,
        (_, OsType::Linux) => LINUX_GPUS,
    }
}

/// Desktop core counts with rough shares.
pub const CPU_CORES: [(u32, f64); 6] = [
    (4, 18.0),
    (6, 15.0),
    (8, 30.0),
    (12, 17.0),
    (16, 15.0),
    (20, 5.0),
];

/// Every core count a real machine plausibly reports.
pub const REALISTIC_CORES: [u32; 21] = [
    1, 2, 3, 4, 6, 8, 10, 11, 12, 14, 16, 18, 20, 24, 28, 32, 36, 48, 64, 96, 128,
];

/// Chromium rounds `deviceMemory` to a power of two and caps it at 8.
pub const DEVICE_MEMORY: [(f64, f64); 2] = [(4.0, 30.0), (8.0, 70.0)];

/// Every value `navigator.deviceMemory` can take.
pub const DEVICE_MEMORY_VALUES: [f64; 9] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0];

/// Screen size in CSS pixels.
#[derive(Debug, Clone, Copy)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

const fn screen(width: u32, height: u32, weight: f64) -> ScreenSize {
    ScreenSize {
        width,
        height,
        weight,
    }
}

const WINDOWS_SCREENS: &[ScreenSize] = &[
    screen(1920, 1080, 35.0),
    screen(1366, 768, 15.0),
    screen(1536, 864, 12.0),
    screen(1440, 900, 6.0),
    screen(1600, 900, 6.0),
    screen(2560, 1440, 10.0),
    screen(1280, 720, 4.0),
];

const MACOS_SCREENS: &[ScreenSize] = &[
    screen(1440, 900, 25.0),
    screen(1512, 982, 20.0),
    screen(1728, 1117, 12.0),
    screen(1680, 1050, 10.0),
    screen(1920, 1080, 13.0),
    screen(2560, 1440, 10.0),
];

const LINUX_SCREENS: &[ScreenSize] = &[
    screen(1920, 1080, 45.0),
    screen(2560, 1440, 20.0),
    screen(1366, 768, 15.0),
    screen(1680, 1050, 10.0),
];

pub fn screens(os: OsType) -> &'static [ScreenSize] {
    match os {
        OsType::Windows => WINDOWS_SCREENS,
        OsType::Macos => MACOS_SCREENS,
        OsType::Linux => LINUX_SCREENS,
    }
}

/// Height the OS keeps for its task bar (Windows), menu bar (macOS) or
/// panel (GNOME).
pub fn reserved_height(os: OsType) -> u32 {
    match os {
        OsType::Windows => 40,
        OsType::Macos => 25,
        OsType::Linux => 27,
    }
}

pub fn color_depth(os: OsType) -> u32 {
    match os {
        OsType::Macos => 30,
        OsType::Windows | OsType::Linux => 24,
    }
}

pub fn pixel_ratios(os: OsType) -> &'static [(f64, f64)] {
    match os {
        OsType::Windows => &[(1.0, 55.0), (1.25, 30.0), (1.5, 15.0)],
        OsType::Macos => &[(2.0, 85.0), (1.0, 15.0)],
        OsType::Linux => &[(1.0, 90.0), (2.0, 10.0)],
    }
}

pub const DEFAULT_LANGUAGES: [&str; 2] = ["en-US", "en"];

/// Typical zone reported when the profile does not override it.
pub fn typical_timezone(os: OsType) -> &'static str {
    match os {
        OsType::Windows | OsType::Linux => "America/New_York",
        OsType::Macos => "America/Los_Angeles",
    }
}

/// Third octet of home-router subnets, `192.168.x.0/24`.
pub const LAN_SUBNETS: [(u8, f64); 5] = [(0, 30.0), (1, 45.0), (2, 10.0), (10, 8.0), (100, 7.0)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_versions_are_supported() {
        for browser in [BrowserType::Chrome, BrowserType::Edge, BrowserType::Firefox] {
            let range = supported_versions(browser);
            for (major, _) in current_versions(browser) {
                assert!(range.contains(major), "{} {}", browser, major);
            }
        }
    }

    #[test]
    fn test_gpu_tables_match_os() {
        for browser in [BrowserType::Chrome, BrowserType::Edge, BrowserType::Firefox] {
            assert!(gpus(OsType::Windows, browser)
                .iter()
                .all(|g| g.renderer.contains("Direct3D")));
            assert!(gpus(OsType::Linux, browser)
                .iter()
                .all(|g| !g.renderer.contains("Direct3D") && !g.renderer.contains("Metal")));
            assert!(gpus(OsType::Macos, browser).iter().all(|g| !g.cores.is_empty()));
        }
    }

    #[test]
    fn test_firefox_gpus_skip_angle_off_windows() {
        for os in [OsType::Macos, OsType::Linux] {
            for g in gpus(os, BrowserType::Firefox) {
                assert!(!g.renderer.starts_with("ANGLE ("), "{}", g.renderer);
                assert!(!g.vendor.starts_with("Google Inc."), "{}", g.vendor);
            }
            for g in gpus(os, BrowserType::Chrome) {
                assert!(g.renderer.starts_with("ANGLE ("), "{}", g.renderer);
            }
        }
    }

    #[test]
    fn test_user_agents() {
        let ua = user_agent(BrowserType::Edge, 121, OsType::Windows);
        assert!(ua.contains("Windows NT 10.0") && ua.ends_with("Edg/121.0.0.0"));
        let ua = user_agent(BrowserType::Firefox, 121, OsType::Macos);
        assert!(ua.contains("Intel Mac OS X 10.15; rv:121.0"));
        assert!(ua.ends_with("Firefox/121.0"));
    }
}
