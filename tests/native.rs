use chaser_fingerprint::js::{JsObject, JsValue, Property};
use chaser_fingerprint::{
    protect_prototype, verify_native, NativeWrapper, NativeWrapperError, ProtectOptions,
    WrapOptions,
};

const IDENTIFIERS: [&str; 6] = [
    "toDataURL",
    "getParameter",
    "getChannelData",
    "get userAgent",
    "enumerateDevices",
    "x",
];

fn original(name: &str, length: u32) -> JsValue {
    JsObject::native_function(name, length, |this, _| Ok(this.clone())).into()
}

fn assert_native_descriptor(prop: Option<Property>, value: JsValue) {
    match prop.expect("should have own property") {
        Property::Data {
            value: actual,
            writable,
            enumerable,
            configurable,
        } => {
            assert_eq!(actual, value);
            assert!(!writable);
            assert!(!enumerable);
            assert!(configurable);
        }
        Property::Accessor { .. } => panic!("expected a data property"),
    }
}

#[test]
fn test_wrapped_functions_look_native() {
    let natives = NativeWrapper::isolated();
    for name in IDENTIFIERS {
        for length in 0..=10 {
            let wrapped = natives
                .wrap_with(
                    &original("original", 3),
                    WrapOptions::named(name).length(length),
                    |original, args, this| original.call(this, args),
                )
                .expect("should wrap");

            assert_eq!(
                wrapped.function_to_string().expect("should stringify"),
                format!("function {}() {{ [native code] }}", name)
            );
            assert_native_descriptor(wrapped.get_own_property("name"), name.into());
            assert_native_descriptor(wrapped.get_own_property("length"), length.into());
            assert!(!wrapped.has_own_property("prototype"));

            let check = natives.verify_native_characteristics(&wrapped.clone().into(), name);
            assert!(check.valid, "{} / {}: {:?}", name, length, check.checks);
        }
    }
}

#[test]
fn test_wrapper_defaults_to_original_metadata() {
    let natives = NativeWrapper::isolated();
    let wrapped = natives
        .wrap_with(
            &original("getImageData", 4),
            WrapOptions::default(),
            |original, args, this| original.call(this, args),
        )
        .expect("should wrap");
    assert!(verify_native(&wrapped.clone().into(), "getImageData").valid);
    assert_eq!(wrapped.get("length").expect("should read length"), JsValue::from(4u32));
}

#[test]
fn test_registry_maps_wrapper_to_original() {
    let natives = NativeWrapper::isolated();
    let original = original("getParameter", 1);
    let wrapped: JsValue = natives
        .wrap_with(&original, WrapOptions::default(), |original, args, this| {
            original.call(this, args)
        })
        .expect("should wrap")
        .into();

    let found = natives.get_original(&wrapped).expect("should be registered");
    assert!(found.ptr_eq(original.as_object().expect("should be an object")));
    assert!(natives.is_wrapped(&wrapped));
    assert!(!natives.is_wrapped(&original));

    let other = NativeWrapper::isolated();
    assert!(!other.is_wrapped(&wrapped));
}

#[test]
fn test_non_callables_are_rejected() {
    let natives = NativeWrapper::isolated();
    let result = natives.wrap_with(&JsValue::from(1.0), WrapOptions::default(), |_, _, _| {
        Ok(JsValue::Undefined)
    });
    assert!(matches!(result, Err(NativeWrapperError::OriginalNotCallable("number"))));
}

#[test]
fn test_protect_prototype_keeps_instance_clean() {
    let proto = JsObject::new("Navigator", None);
    let getter = JsObject::native_function("get platform", 0, |_, _| Ok("Linux x86_64".into()));
    proto
        .define_property("platform", Property::getter(getter))
        .expect("should define getter");
    let instance = JsObject::new("Navigator", Some(&proto));

    let natives = NativeWrapper::isolated();
    let original = proto
        .get_own_property("platform")
        .and_then(|p| p.getter_fn().cloned())
        .expect("should have getter");
    let wrapped = natives
        .wrap_with(&original.into(), WrapOptions::default(), |_, _, _| Ok("Win32".into()))
        .expect("should wrap");
    protect_prototype(
        &proto.clone().into(),
        "platform",
        &wrapped.into(),
        ProtectOptions::preserve(),
    )
    .expect("should protect");

    assert_eq!(instance.get("platform").expect("should read"), JsValue::from("Win32"));
    assert!(instance.own_keys().is_empty());
    let prop = proto.get_own_property("platform").expect("should keep accessor");
    assert!(prop.is_accessor());
    assert!(prop.setter_fn().is_none());
    assert!(verify_native(&prop.getter_fn().cloned().into(), "get platform").valid);
}
