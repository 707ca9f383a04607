//! Error types shared across the engine.
//!
//! Generation and wrapping errors are caller bugs and are surfaced as-is.
//! [`JsError`] models exceptions thrown inside the in-process object model,
//! which is where the compiled overrides run when installed into a
//! [`dom::Window`](crate::dom::Window).

use thiserror::Error;

/// Invalid explicit input to the profile generator.
///
/// Missing fields never produce this error; they get defaults.
#[derive(Debug, Error)]
pub enum FingerprintGenerationError {
    #[error("unknown browser type `{0}` (expected chrome, edge or firefox)")]
    UnknownBrowser(String),

    #[error("unknown operating system `{0}` (expected windows, macos or linux)")]
    UnknownOs(String),

    #[error("{browser} {major} is not in the supported version range {min}..={max}")]
    UnsupportedVersion {
        browser: &'static str,
        major: u32,
        min: u32,
        max: u32,
    },

    #[error("malformed browser version `{0}`")]
    MalformedVersion(String),

    #[error("`{0}` is not a valid IANA time zone")]
    InvalidTimezone(String),

    #[error("`{0}` is not a valid language tag")]
    InvalidLanguage(String),

    #[error("coordinates ({latitude}, {longitude}) are out of range")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("malformed profile template: {0}")]
    Template(#[from] serde_json::Error),
}

/// Invalid arguments to `wrap` / `protect_prototype`, or a failure while
/// installing the wrapped member.
#[derive(Debug, Error)]
pub enum NativeWrapperError {
    #[error("original function is not callable (got {0})")]
    OriginalNotCallable(&'static str),

    #[error("wrapper function is not callable (got {0})")]
    WrapperNotCallable(&'static str),

    #[error("prototype is not an object (got {0})")]
    NotAnObject(&'static str),

    #[error("member name must be a non-empty string")]
    EmptyName,

    #[error(transparent)]
    Js(#[from] JsError),
}

/// An exception thrown inside the object model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JsError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("{name}: {message}")]
    DomException { name: String, message: String },
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::Type(message.into())
    }

    pub fn dom(name: &str, message: &str) -> Self {
        JsError::DomException {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}
