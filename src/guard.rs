//! Installing wrapped members on prototypes.
//!
//! Overrides go on the prototype, never the instance: a real `navigator` has
//! no own `platform`, and `Object.getOwnPropertyNames(navigator)` must stay
//! empty after patching.

use crate::error::NativeWrapperError;
use crate::js::{JsValue, Property};

/// Options for [`protect_prototype`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectOptions {
    /// Re-apply the existing member's `writable`/`enumerable`/`configurable`
    /// flags instead of the Web IDL defaults.
    pub preserve_descriptor: bool,
    /// When the member does not exist yet, install it as a getter rather
    /// than a method.
    pub as_getter: bool,
}

impl ProtectOptions {
    pub fn preserve() -> Self {
        Self {
            preserve_descriptor: true,
            as_getter: false,
        }
    }

    pub fn getter() -> Self {
        Self {
            preserve_descriptor: true,
            as_getter: true,
        }
    }
}

/// Replace `proto[method_name]` with `wrapped`.
///
/// An existing accessor gets a new `get` (its `set` is kept), an existing
/// data property gets a new `value`. Without `preserve_descriptor` the
/// member takes the Web IDL shape: enumerable, configurable, and writable
/// for methods.
pub fn protect_prototype(
    proto: &JsValue,
    method_name: &str,
    wrapped: &JsValue,
    options: ProtectOptions,
) -> Result<(), NativeWrapperError> {
    let proto = match proto {
        JsValue::Object(o) => o,
        other => return Err(NativeWrapperError::NotAnObject(other.type_name())),
    };
    if method_name.is_empty() {
        return Err(NativeWrapperError::EmptyName);
    }
    let wrapped = match wrapped {
        JsValue::Object(f) if f.is_callable() => f.clone(),
        other => return Err(NativeWrapperError::WrapperNotCallable(other.type_name())),
    };

    let keep = options.preserve_descriptor;
    let next = match proto.get_own_property(method_name) {
        Some(Property::Accessor {
            set,
            enumerable,
            configurable,
            ..
        }) => Property::Accessor {
            get: Some(wrapped),
            set,
            enumerable: !keep || enumerable,
            configurable: !keep || configurable,
        },
        Some(Property::Data {
            writable,
            enumerable,
            configurable,
            ..
        }) => Property::Data {
            value: wrapped.into(),
            writable: !keep || writable,
            enumerable: !keep || enumerable,
            configurable: !keep || configurable,
        },
        None if options.as_getter => Property::getter(wrapped),
        None => Property::method(wrapped),
    };

    proto.define_property(method_name, next)?;
    tracing::trace!(class = proto.class(), member = method_name, "protected prototype member");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::JsObject;
    use crate::native::{verify_native, NativeWrapper, WrapOptions};

    fn proto_with_hidden_method() -> JsObject {
        let proto = JsObject::new("Thing", None);
        let f = JsObject::native_function("ping", 0, |_, _| Ok(JsValue::str("pong")));
        proto
            .define_property(
                "ping",
                Property::Data {
                    value: f.into(),
                    writable: true,
                    enumerable: false,
                    configurable: true,
                },
            )
            .unwrap();
        proto
    }

    #[test]
    fn test_preserves_descriptor_flags() {
        let proto = proto_with_hidden_method();
        let natives = NativeWrapper::isolated();
        let original = proto.get("ping").unwrap();
        let wrapped = natives
            .wrap_with(&original, WrapOptions::default(), |_, _, _| {
                Ok(JsValue::str("spoofed"))
            })
            .unwrap();
        protect_prototype(
            &proto.clone().into(),
            "ping",
            &wrapped.into(),
            ProtectOptions::preserve(),
        )
        .unwrap();

        let prop = proto.get_own_property("ping").unwrap();
        assert!(!prop.enumerable());
        assert_eq!(prop.writable(), Some(true));
        let f = proto.get("ping").unwrap();
        assert!(verify_native(&f, "ping").valid);
        assert_eq!(
            f.as_object().unwrap().call(&JsValue::Undefined, &[]).unwrap(),
            JsValue::str("spoofed")
        );
    }

    #[test]
    fn test_default_uses_web_idl_shape() {
        let proto = proto_with_hidden_method();
        let f = JsObject::native_function("ping", 0, |_, _| Ok(JsValue::Null));
        protect_prototype(
            &proto.clone().into(),
            "ping",
            &f.into(),
            ProtectOptions::default(),
        )
        .unwrap();
        assert!(proto.get_own_property("ping").unwrap().enumerable());
    }

    #[test]
    fn test_accessor_keeps_setter() {
        let proto = JsObject::new("Thing", None);
        let get = JsObject::native_function("get value", 0, |_, _| Ok(JsValue::Number(1.0)));
        let set = JsObject::native_function("set value", 1, |_, _| Ok(JsValue::Undefined));
        proto
            .define_property(
                "value",
                Property::Accessor {
                    get: Some(get),
                    set: Some(set.clone()),
                    enumerable: true,
                    configurable: true,
                },
            )
            .unwrap();
        let new_get = JsObject::native_function("get value", 0, |_, _| Ok(JsValue::Number(2.0)));
        protect_prototype(
            &proto.clone().into(),
            "value",
            &new_get.into(),
            ProtectOptions::preserve(),
        )
        .unwrap();
        let prop = proto.get_own_property("value").unwrap();
        assert!(prop.setter_fn().unwrap().ptr_eq(&set));
        assert_eq!(proto.get("value").unwrap(), JsValue::Number(2.0));
    }

    #[test]
    fn test_absent_member_as_getter() {
        let proto = JsObject::new("Navigator", None);
        let get = JsObject::native_function("get webdriver", 0, |_, _| Ok(false.into()));
        protect_prototype(
            &proto.clone().into(),
            "webdriver",
            &get.into(),
            ProtectOptions::getter(),
        )
        .unwrap();
        let prop = proto.get_own_property("webdriver").unwrap();
        assert!(prop.is_accessor());
        assert!(prop.enumerable() && prop.configurable());
    }

    #[test]
    fn test_invalid_arguments() {
        let f: JsValue = JsObject::native_function("f", 0, |_, _| Ok(JsValue::Null)).into();
        assert!(matches!(
            protect_prototype(&JsValue::Null, "f", &f, ProtectOptions::default()),
            Err(NativeWrapperError::NotAnObject("object"))
        ));
        let proto: JsValue = JsObject::new("Object", None).into();
        assert!(matches!(
            protect_prototype(&proto, "", &f, ProtectOptions::default()),
            Err(NativeWrapperError::EmptyName)
        ));
    }
}
