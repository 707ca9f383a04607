//! Consistent browser fingerprint profiles, compiled into page overrides
//! that look native to the page.
//!
//! ```no_run
//! use chaser_fingerprint::{compile, generate, GenerateOptions};
//!
//! let profile = generate(&GenerateOptions::windows().browser("chrome-120"))?;
//! let script = compile(&profile);
//! // inject `script` before any page script runs
//! # Ok::<(), chaser_fingerprint::FingerprintGenerationError>(())
//! ```
//!
//! The same script can be installed into the in-process [`dom::Window`]
//! and checked with [`run_fingerprint_tests`], which is how this crate
//! tests what a detector would see.

pub mod dom;
pub mod error;
pub mod generator;
pub mod guard;
pub mod js;
pub mod native;
pub mod noise;
pub mod profile;
pub mod script;
pub mod timezone;
pub mod validate;

pub use dom::{Window, WindowConfig};
pub use error::{FingerprintGenerationError, JsError, NativeWrapperError};
pub use generator::{generate, FingerprintGenerator, GenerateOptions, NetworkHint};
pub use guard::{protect_prototype, ProtectOptions};
pub use native::{verify_native, NativeCheck, NativeWrapper, WrapOptions, WrapperRegistry};
pub use noise::NoiseLevel;
pub use profile::FingerprintProfile;
pub use script::{compile, CompiledScript, Compiler, InstallReport};
pub use validate::{run_fingerprint_tests, Subject, TestOptions, TestReport, TestResult};
