//! Native-function mimicry.
//!
//! A wrapped function is indistinguishable from an engine-implemented one
//! under the usual introspection: its `toString` reports
//! `function <name>() { [native code] }`, and its only own properties are
//! `length` and `name`, shaped `{writable: false, enumerable: false,
//! configurable: true}`.
//!
//! The link from a wrapped function back to its original lives in a
//! [`WrapperRegistry`], never on the function itself, so it cannot leak
//! through `Object.getOwnPropertyNames`.

use crate::error::{JsError, NativeWrapperError};
use crate::js::{JsObject, JsValue, Property, WeakObject};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Dead entries are swept after this many registrations.
const PRUNE_INTERVAL: usize = 64;

struct Entry {
    wrapped: WeakObject,
    original: WeakObject,
}

/// Wrapped function -> original, keyed by the wrapped function's identity.
///
/// Both sides are held weakly: once a page context drops its objects the
/// entries die with them. A wrapped function keeps its own original alive,
/// so a live wrapped function always resolves.
pub struct WrapperRegistry {
    entries: DashMap<usize, Entry>,
    inserts: AtomicUsize,
}

impl Default for WrapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            inserts: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry used by [`NativeWrapper::default`].
    pub fn global() -> Arc<WrapperRegistry> {
        static GLOBAL: OnceLock<Arc<WrapperRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(WrapperRegistry::new())).clone()
    }

    fn register(&self, wrapped: &JsObject, original: &JsObject) {
        self.entries.insert(
            wrapped.addr(),
            Entry {
                wrapped: wrapped.downgrade(),
                original: original.downgrade(),
            },
        );
        if self.inserts.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
            self.prune();
        }
    }

    fn lookup(&self, f: &JsObject) -> Option<JsObject> {
        let entry = self.entries.get(&f.addr())?;
        // An address can be reused after the wrapped function is freed.
        let wrapped = entry.wrapped.upgrade()?;
        if !wrapped.ptr_eq(f) {
            return None;
        }
        entry.original.upgrade()
    }

    /// Drop entries whose wrapped function or original is gone.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.wrapped.is_alive() && e.original.is_alive());
        let removed = before.saturating_sub(self.entries.len());
        tracing::trace!(removed, remaining = self.entries.len(), "pruned wrapper registry");
        removed
    }

    /// Live entries, after pruning.
    pub fn len(&self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Options for [`NativeWrapper::wrap`].
#[derive(Debug, Clone)]
pub struct WrapOptions {
    /// Defaults to the original's own `name`.
    pub name: Option<String>,
    /// Defaults to the original's own `length`.
    pub length: Option<u32>,
    /// Forward the call-site `this` to the wrapper. When false the wrapper
    /// sees `undefined`.
    pub preserve_this: bool,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            name: None,
            length: None,
            preserve_this: true,
        }
    }
}

impl WrapOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn preserve_this(mut self, preserve: bool) -> Self {
        self.preserve_this = preserve;
        self
    }
}

/// Result of [`NativeWrapper::verify_native_characteristics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCheck {
    pub valid: bool,
    pub checks: NativeChecks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeChecks {
    pub name: bool,
    pub to_string: bool,
    pub name_descriptor: bool,
    pub length_descriptor: bool,
}

/// Builds native-looking functions and remembers what they wrap.
#[derive(Clone)]
pub struct NativeWrapper {
    registry: Arc<WrapperRegistry>,
}

impl Default for NativeWrapper {
    fn default() -> Self {
        Self::new(WrapperRegistry::global())
    }
}

impl NativeWrapper {
    pub fn new(registry: Arc<WrapperRegistry>) -> Self {
        Self { registry }
    }

    /// A wrapper with its own registry, for an isolated session.
    pub fn isolated() -> Self {
        Self::new(Arc::new(WrapperRegistry::new()))
    }

    pub fn registry(&self) -> &Arc<WrapperRegistry> {
        &self.registry
    }

    /// Wrap `original` so that calls go to `wrapper(original, args, this)`.
    pub fn wrap(
        &self,
        original: &JsValue,
        wrapper: &JsValue,
        options: WrapOptions,
    ) -> Result<JsObject, NativeWrapperError> {
        let wrapper = match wrapper {
            JsValue::Object(w) if w.is_callable() => w.clone(),
            other => return Err(NativeWrapperError::WrapperNotCallable(other.type_name())),
        };
        self.wrap_with(original, options, move |original, args, this| {
            wrapper.call(
                &JsValue::Undefined,
                &[
                    original.clone().into(),
                    JsObject::array(args.to_vec()).into(),
                    this.clone(),
                ],
            )
        })
    }

    /// [`wrap`](Self::wrap) with the wrapper given as a Rust closure
    /// `(original, args, this)`.
    pub fn wrap_with<F>(
        &self,
        original: &JsValue,
        options: WrapOptions,
        wrapper: F,
    ) -> Result<JsObject, NativeWrapperError>
    where
        F: Fn(&JsObject, &[JsValue], &JsValue) -> Result<JsValue, JsError> + Send + Sync + 'static,
    {
        let original = match original {
            JsValue::Object(o) if o.is_callable() => o.clone(),
            other => return Err(NativeWrapperError::OriginalNotCallable(other.type_name())),
        };

        let name = match options.name {
            Some(name) => name,
            None => own_name(&original),
        };
        let length = options.length.unwrap_or_else(|| own_length(&original));
        let preserve_this = options.preserve_this;

        let target = original.clone();
        let wrapped = JsObject::native_function(&name, length, move |this, args| {
            let this = if preserve_this {
                this.clone()
            } else {
                JsValue::Undefined
            };
            wrapper(&target, args, &this)
        });

        self.registry.register(&wrapped, &original);
        Ok(wrapped)
    }

    /// The function `f` wraps, if it was produced by this wrapper's registry.
    pub fn get_original(&self, f: &JsValue) -> Option<JsObject> {
        f.as_object().and_then(|f| self.registry.lookup(f))
    }

    pub fn is_wrapped(&self, f: &JsValue) -> bool {
        self.get_original(f).is_some()
    }

    /// Run the checks a detector would run against a supposedly native
    /// function.
    pub fn verify_native_characteristics(&self, f: &JsValue, expected_name: &str) -> NativeCheck {
        verify_native(f, expected_name)
    }

    /// A native-looking function that ignores its arguments and returns
    /// `value`.
    pub fn create_constant_function(
        &self,
        name: &str,
        value: impl Into<JsValue>,
        length: u32,
    ) -> JsObject {
        let value = value.into();
        JsObject::native_function(name, length, move |_, _| Ok(value.clone()))
    }
}

/// Registry-free form of [`NativeWrapper::verify_native_characteristics`].
pub fn verify_native(f: &JsValue, expected_name: &str) -> NativeCheck {
    let Some(f) = f.as_object().filter(|f| f.is_callable()) else {
        return NativeCheck {
            valid: false,
            checks: NativeChecks {
                name: false,
                to_string: false,
                name_descriptor: false,
                length_descriptor: false,
            },
        };
    };

    let name_prop = f.get_own_property("name");
    let length_prop = f.get_own_property("length");

    let name = name_prop
        .as_ref()
        .and_then(Property::value)
        .and_then(JsValue::as_str)
        == Some(expected_name);
    let to_string = f.function_to_string().ok()
        == Some(format!("function {}() {{ [native code] }}", expected_name));
    let name_descriptor = name_prop.as_ref().is_some_and(native_shape);
    let length_descriptor = length_prop
        .as_ref()
        .is_some_and(|p| native_shape(p) && p.value().and_then(JsValue::as_f64).is_some());

    NativeCheck {
        valid: name && to_string && name_descriptor && length_descriptor,
        checks: NativeChecks {
            name,
            to_string,
            name_descriptor,
            length_descriptor,
        },
    }
}

fn native_shape(p: &Property) -> bool {
    p.writable() == Some(false) && !p.enumerable() && p.configurable()
}

fn own_name(f: &JsObject) -> String {
    f.get_own_property("name")
        .as_ref()
        .and_then(Property::value)
        .and_then(JsValue::as_str)
        .unwrap_or_default()
        .to_string()
}

fn own_length(f: &JsObject) -> u32 {
    f.get_own_property("length")
        .as_ref()
        .and_then(Property::value)
        .and_then(JsValue::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original() -> JsValue {
        JsObject::native_function("getParameter", 1, |_, args| {
            Ok(args.first().cloned().unwrap_or_default())
        })
        .into()
    }

    #[test]
    fn test_wrap_defaults_to_original_metadata() {
        let natives = NativeWrapper::isolated();
        let wrapped = natives
            .wrap_with(&original(), WrapOptions::default(), |o, args, this| {
                o.call(this, args)
            })
            .unwrap();
        assert_eq!(wrapped.get("name").unwrap(), JsValue::str("getParameter"));
        assert_eq!(wrapped.get("length").unwrap(), JsValue::Number(1.0));
        assert!(natives
            .verify_native_characteristics(&wrapped.clone().into(), "getParameter")
            .valid);
    }

    #[test]
    fn test_wrapper_receives_original_args_and_this() {
        let natives = NativeWrapper::isolated();
        let wrapper = JsObject::script_function("", 3, "(o, a, t) => t", |_, args| {
            let items = args[1].as_object().and_then(|a| a.array_items()).unwrap();
            assert_eq!(items.len(), 2);
            assert!(args[0].is_callable());
            Ok(args[2].clone())
        });
        let wrapped = natives
            .wrap(&original(), &wrapper.into(), WrapOptions::default())
            .unwrap();
        let this = JsValue::str("ctx");
        let out = wrapped.call(&this, &[1u32.into(), 2u32.into()]).unwrap();
        assert_eq!(out, this);
    }

    #[test]
    fn test_preserve_this_false_forwards_undefined() {
        let natives = NativeWrapper::isolated();
        let wrapped = natives
            .wrap_with(
                &original(),
                WrapOptions::default().preserve_this(false),
                |_, _, this| Ok(this.clone()),
            )
            .unwrap();
        assert!(wrapped.call(&JsValue::str("x"), &[]).unwrap().is_undefined());
    }

    #[test]
    fn test_rejects_non_callables() {
        let natives = NativeWrapper::isolated();
        let err = natives
            .wrap(&JsValue::Number(1.0), &original(), WrapOptions::default())
            .unwrap_err();
        assert!(matches!(err, NativeWrapperError::OriginalNotCallable("number")));
        let err = natives
            .wrap(&original(), &JsValue::Null, WrapOptions::default())
            .unwrap_err();
        assert!(matches!(err, NativeWrapperError::WrapperNotCallable("object")));
    }

    #[test]
    fn test_registry_is_weak() {
        let natives = NativeWrapper::isolated();
        {
            let wrapped = natives
                .wrap_with(&original(), WrapOptions::default(), |o, a, t| o.call(t, a))
                .unwrap();
            assert!(natives.is_wrapped(&wrapped.into()));
            assert_eq!(natives.registry().len(), 1);
        }
        assert_eq!(natives.registry().len(), 0);
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = NativeWrapper::isolated();
        let b = NativeWrapper::isolated();
        let wrapped: JsValue = a
            .wrap_with(&original(), WrapOptions::default(), |o, x, t| o.call(t, x))
            .unwrap()
            .into();
        assert!(a.is_wrapped(&wrapped));
        assert!(!b.is_wrapped(&wrapped));
    }

    #[test]
    fn test_constant_function() {
        let natives = NativeWrapper::isolated();
        let f = natives.create_constant_function("get vendor", "Google Inc.", 0);
        assert_eq!(
            f.call(&JsValue::Undefined, &[JsValue::Null]).unwrap(),
            JsValue::str("Google Inc.")
        );
        assert!(natives
            .verify_native_characteristics(&f.into(), "get vendor")
            .valid);
    }

    #[test]
    fn test_script_function_fails_verification() {
        let f = JsObject::script_function("spoof", 0, "function spoof() { return 1 }", |_, _| {
            Ok(JsValue::Number(1.0))
        });
        let check = verify_native(&f.into(), "spoof");
        assert!(!check.valid);
        assert!(check.checks.name);
        assert!(!check.checks.to_string);
    }
}
