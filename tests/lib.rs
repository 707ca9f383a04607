mod compile;
mod evaluate;
mod generate;
mod native;
mod validate;

use chaser_fingerprint::profile::*;
use chaser_fingerprint::{
    FingerprintGenerator, FingerprintProfile, GenerateOptions, NativeWrapper, NoiseLevel, Window,
};

pub fn profile(options: &GenerateOptions) -> FingerprintProfile {
    FingerprintGenerator::with_seed(20_240_101)
        .generate(options)
        .expect("should generate profile")
}

/// A profile that asks for nothing to be spoofed.
pub fn all_off(mut profile: FingerprintProfile) -> FingerprintProfile {
    profile.navigator.mode = OverrideMode::Off;
    profile.hardware.mode = OverrideMode::Off;
    profile.canvas = NoiseSettings::off();
    profile.audio = NoiseSettings::off();
    profile.client_rects = NoiseSettings::off();
    profile.webgl.mode = OverrideMode::Off;
    profile.webgl.noise_level = NoiseLevel::default();
    profile.timezone.mode = TimezoneMode::Auto;
    profile.geolocation.mode = GeolocationMode::Real;
    profile.webrtc.mode = WebRtcMode::Real;
    profile.privacy = Privacy::default();
    profile.media_devices = ApiSetting::new(DeviceApiMode::Off);
    profile.battery = ApiSetting::new(DeviceApiMode::Off);
    profile.sensors = ApiSetting::new(BlockMode::Off);
    profile.speech = ApiSetting::new(BlockMode::Off);
    profile.advanced_apis = AdvancedApis::default();
    profile
}

/// A headless window with `profile`'s script installed.
pub fn installed(profile: &FingerprintProfile) -> Window {
    let window = Window::headless_chrome();
    let report = chaser_fingerprint::Compiler::new()
        .compile_script(profile)
        .install(&window, &NativeWrapper::isolated());
    assert!(report.is_clean(), "failed blocks: {:?}", report.failed);
    window
}
