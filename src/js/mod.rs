//! A small in-process model of JavaScript values and objects.
//!
//! This is the "proxy object" layer the wrapper and guard operate on: objects
//! with prototypes, data and accessor property descriptors, callables that
//! report a `Function.prototype.toString` source, and internal slots for
//! typed arrays and canvases. It is deliberately not an interpreter; the
//! compiled overrides are installed into it as Rust closures.

mod object;
mod value;

pub use object::{FunctionSource, JsObject, NativeFn, Property, Slot, WeakObject};
pub use value::{format_number, JsValue};

use crate::error::JsError;

/// Argument `i`, or `undefined` when absent.
pub fn arg(args: &[JsValue], i: usize) -> JsValue {
    args.get(i).cloned().unwrap_or_default()
}

/// Read `key` from a value that must be an object.
pub fn get(target: &JsValue, key: &str) -> Result<JsValue, JsError> {
    match target {
        JsValue::Object(o) => o.get(key),
        JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            target.to_display(),
            key
        ))),
        _ => Ok(JsValue::Undefined),
    }
}

/// Call `target[key](...args)` with `target` as `this`.
pub fn invoke(target: &JsValue, key: &str, args: &[JsValue]) -> Result<JsValue, JsError> {
    match get(target, key)? {
        JsValue::Object(f) if f.is_callable() => f.call(target, args),
        _ => Err(JsError::type_error(format!("{} is not a function", key))),
    }
}

/// Call `f` if it is callable, else throw the engine's TypeError.
pub fn call(f: &JsValue, this: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match f {
        JsValue::Object(f) if f.is_callable() => f.call(this, args),
        other => Err(JsError::type_error(format!(
            "{} is not a function",
            other.to_display()
        ))),
    }
}

/// An object literal `{ key: value, ... }`.
pub fn object<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, JsValue)>) -> JsObject {
    let obj = JsObject::new("Object", None);
    for (key, value) in entries {
        obj.insert(key.as_ref(), Property::data(value));
    }
    obj
}
