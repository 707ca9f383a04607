use crate::profile;
use chaser_fingerprint::generator::catalog::{self, DEVICE_MEMORY_VALUES};
use chaser_fingerprint::noise::{perturb_pixels, pixel_noise};
use chaser_fingerprint::profile::{BrowserType, OsType};
use chaser_fingerprint::{
    FingerprintGenerationError, FingerprintGenerator, FingerprintProfile, GenerateOptions,
    NetworkHint, NoiseLevel,
};

#[test]
fn test_language_is_first_of_languages() {
    let mut generator = FingerprintGenerator::with_seed(3);
    let hints = [None, Some("vi-VN"), Some("de-DE"), Some("en-GB")];
    for hint in hints.iter().cycle().take(40) {
        let mut options = GenerateOptions::new();
        if let Some(language) = hint {
            options = options.network_hint(NetworkHint::new().language(*language));
        }
        let profile = generator.generate(&options).expect("should generate profile");
        assert_eq!(
            Some(&profile.navigator.language),
            profile.navigator.languages.first()
        );
        if let Some(language) = hint {
            assert_eq!(profile.navigator.language, *language);
        }
    }
}

#[test]
fn test_platform_and_user_agent_agree_for_every_pair() {
    for os in ["windows", "macos", "linux"] {
        for browser in ["chrome", "edge", "firefox"] {
            let profile = profile(&GenerateOptions::new().os(os).browser(browser));
            let kind = profile.os.kind;
            assert!(
                kind.platforms().contains(&profile.os.platform.as_str()),
                "{}/{}: platform {}",
                browser,
                os,
                profile.os.platform
            );
            assert!(
                profile.user_agent.contains(kind.ua_marker()),
                "{}/{}: {}",
                browser,
                os,
                profile.user_agent
            );
            assert_eq!(profile.navigator.vendor, profile.browser.kind.vendor());
        }
    }
}

#[test]
fn test_firefox_gets_firefox_webgl_strings() {
    for os in [OsType::Windows, OsType::Macos, OsType::Linux] {
        let table = catalog::gpus(os, BrowserType::Firefox);
        let mut generator = FingerprintGenerator::with_seed(17);
        for _ in 0..20 {
            let profile = generator
                .generate(&GenerateOptions::new().os(os.as_str()).browser("firefox"))
                .expect("should generate profile");
            let gpu = table
                .iter()
                .find(|g| g.renderer == profile.webgl.renderer)
                .unwrap_or_else(|| panic!("{}: {} not a Firefox GPU", os, profile.webgl.renderer));
            assert_eq!(profile.webgl.vendor, gpu.vendor);
            if os != OsType::Windows {
                assert!(!profile.webgl.renderer.contains("ANGLE"), "{}", profile.webgl.renderer);
            }
        }
    }
}

#[test]
fn test_device_memory_is_a_reported_bucket() {
    let mut generator = FingerprintGenerator::with_seed(11);
    for _ in 0..50 {
        let profile = generator
            .generate(&GenerateOptions::new())
            .expect("should generate profile");
        assert!(DEVICE_MEMORY_VALUES.contains(&profile.hardware.device_memory));
    }
}

#[test]
fn test_json_round_trip() {
    let mut generator = FingerprintGenerator::with_seed(5);
    for options in [
        GenerateOptions::windows(),
        GenerateOptions::macos().browser("firefox"),
        GenerateOptions::linux().network_hint(
            NetworkHint::new()
                .timezone("Europe/Berlin")
                .coordinates(52.52, 13.405),
        ),
    ] {
        let profile = generator.generate(&options).expect("should generate profile");
        let parsed = FingerprintProfile::from_json(&profile.to_json()).expect("should parse json");
        assert_eq!(parsed, profile);
        let pretty =
            FingerprintProfile::from_json(&profile.to_json_pretty()).expect("should parse json");
        assert_eq!(pretty, profile);
    }
}

#[test]
fn test_pixel_noise_is_deterministic() {
    for seed in [0, 1, 42, 999_999] {
        for index in [0, 3, 4096, 1_000_000] {
            assert_eq!(pixel_noise(seed, index), pixel_noise(seed, index));
        }
    }

    let source: Vec<u8> = (0..=255).cycle().take(64 * 4).collect();
    let mut first = source.clone();
    let mut second = source.clone();
    perturb_pixels(&mut first, 1234, NoiseLevel::High);
    perturb_pixels(&mut second, 1234, NoiseLevel::High);
    assert_eq!(first, second);
    assert_ne!(first, source);

    let mut other = source.clone();
    perturb_pixels(&mut other, 4321, NoiseLevel::High);
    assert_ne!(first, other);
}

#[test]
fn test_chrome_120_on_windows() {
    let profile = profile(&GenerateOptions::windows().browser("chrome-120"));
    assert_eq!(profile.browser.kind, BrowserType::Chrome);
    assert_eq!(profile.browser.major_version, 120);
    assert_eq!(profile.os.kind, OsType::Windows);
    assert!(profile.user_agent.contains("Windows NT"));
    assert!(profile.user_agent.contains("Chrome/120"));
    assert_eq!(profile.os.platform, "Win32");
    assert_eq!(profile.navigator.vendor, "Google Inc.");
}

#[test]
fn test_network_hint_is_honoured() {
    let profile = profile(
        &GenerateOptions::windows().network_hint(
            NetworkHint::new()
                .timezone("Asia/Ho_Chi_Minh")
                .language("vi-VN")
                .coordinates(10.82, 106.63),
        ),
    );
    assert_eq!(profile.timezone.name, "Asia/Ho_Chi_Minh");
    assert_eq!(profile.navigator.languages[0], "vi-VN");
    let (lat, lon, _) = profile.geolocation.position().expect("should carry coordinates");
    assert_eq!((lat, lon), (10.82, 106.63));
}

#[test]
fn test_invalid_input_is_rejected() {
    let mut generator = FingerprintGenerator::with_seed(1);
    assert!(matches!(
        generator.generate(&GenerateOptions::new().browser("safari")),
        Err(FingerprintGenerationError::UnknownBrowser(_))
    ));
    assert!(matches!(
        generator.generate(&GenerateOptions::new().os("beos")),
        Err(FingerprintGenerationError::UnknownOs(_))
    ));
    assert!(matches!(
        generator.generate(
            &GenerateOptions::new().network_hint(NetworkHint::new().timezone("Mars/Olympus_Mons"))
        ),
        Err(FingerprintGenerationError::InvalidTimezone(_))
    ));
    assert!(GenerateOptions::from_json("{\"browser\": 7}").is_err());
}

#[test]
fn test_template_keeps_identity_with_fresh_seed() {
    let saved = profile(&GenerateOptions::macos().browser("edge"));
    let mut generator = FingerprintGenerator::with_seed(77);
    let copy = generator
        .from_template_json(&saved.to_json())
        .expect("should load template");
    assert_eq!(copy.user_agent, saved.user_agent);
    assert_eq!(copy.webgl, saved.webgl);
    assert!(matches!(
        generator.from_template_json("{"),
        Err(FingerprintGenerationError::Template(_))
    ));
}
