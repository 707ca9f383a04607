//! Building blocks for host objects: interface objects, Web IDL attributes
//! and operations, promises, exceptions and typed arrays.

use crate::error::JsError;
use crate::js::{arg, JsObject, JsValue, Property, Slot, WeakObject};
use crate::noise::Rect;
use fnv::FnvHashMap;

pub(super) type Host = Result<JsValue, JsError>;

pub(super) fn live(weak: &WeakObject) -> Result<JsObject, JsError> {
    weak.upgrade()
        .ok_or_else(|| JsError::type_error("Illegal invocation"))
}

pub(super) fn this_object(this: &JsValue) -> Result<&JsObject, JsError> {
    this.as_object()
        .ok_or_else(|| JsError::type_error("Illegal invocation"))
}

/// Shape of an interface object on the global, and of `constructor`.
fn interface_slot(value: JsObject) -> Property {
    Property::Data {
        value: value.into(),
        writable: true,
        enumerable: false,
        configurable: true,
    }
}

pub(super) struct Interface {
    pub ctor: JsObject,
    pub proto: JsObject,
}

/// Define interface `name` on `holder`. `construct` receives the interface
/// prototype and the constructor arguments.
pub(super) fn interface<F>(
    holder: &JsObject,
    name: &str,
    parent: Option<&JsObject>,
    length: u32,
    construct: F,
) -> Interface
where
    F: Fn(&JsObject, &[JsValue]) -> Host + Send + Sync + 'static,
{
    let proto = JsObject::new(name, parent);
    let weak = proto.downgrade();
    let ctor = JsObject::native_function(name, length, move |_, args| {
        construct(&live(&weak)?, args)
    });
    ctor.insert(
        "prototype",
        Property::Data {
            value: proto.clone().into(),
            writable: false,
            enumerable: false,
            configurable: false,
        },
    );
    proto.insert("constructor", interface_slot(ctor.clone()));
    holder.insert(name, interface_slot(ctor.clone()));
    Interface { ctor, proto }
}

pub(super) fn illegal(_: &JsObject, _: &[JsValue]) -> Host {
    Err(JsError::type_error("Illegal constructor"))
}

/// A read-only attribute whose getter sees the receiver.
pub(super) fn attr<F>(target: &JsObject, key: &str, f: F)
where
    F: Fn(&JsObject) -> Host + Send + Sync + 'static,
{
    let get = JsObject::native_function(&format!("get {}", key), 0, move |this, _| {
        f(this_object(this)?)
    });
    target.insert(key, Property::getter(get));
}

/// A fixed attribute on an interface prototype. Like a Web IDL getter it
/// throws unless the receiver implements the interface.
pub(super) fn constant(target: &JsObject, key: &str, value: impl Into<JsValue>) {
    let value = value.into();
    let proto = target.downgrade();
    attr(target, key, move |this| {
        if !this.inherits_from(&live(&proto)?) {
            return Err(JsError::type_error("Illegal invocation"));
        }
        Ok(value.clone())
    });
}

/// A fixed attribute on a singleton holder such as the global object or an
/// interface object, where any object receiver is accepted.
pub(super) fn slot_attr(target: &JsObject, key: &str, value: impl Into<JsValue>) {
    let value = value.into();
    attr(target, key, move |_| Ok(value.clone()));
}

/// A read-only attribute backed by an internal field of the same name.
pub(super) fn field_attr(target: &JsObject, key: &str) {
    let field = key.to_string();
    attr(target, key, move |this| Ok(this.field(&field).unwrap_or_default()));
}

/// A Web IDL operation.
pub(super) fn op<F>(target: &JsObject, key: &str, length: u32, f: F)
where
    F: Fn(&JsValue, &[JsValue]) -> Host + Send + Sync + 'static,
{
    target.insert(key, Property::method(JsObject::native_function(key, length, f)));
}

/// A host object with internal fields.
pub(super) fn record(class: &str, proto: &JsObject, fields: Vec<(&str, JsValue)>) -> JsObject {
    let fields: FnvHashMap<String, JsValue> = fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    JsObject::with_slot(class, Some(proto), Slot::Fields(fields))
}

/// Prototypes host code needs after construction, held weakly.
#[derive(Clone)]
pub(super) struct Shared {
    pub promise: WeakObject,
    pub dom_exception: WeakObject,
    pub dom_rect: WeakObject,
    pub image_data: WeakObject,
    pub uint8_clamped: WeakObject,
    pub float32: WeakObject,
}

impl Shared {
    pub fn resolved(&self, value: JsValue) -> Host {
        Ok(settled(&live(&self.promise)?, true, value))
    }

    pub fn rejected(&self, name: &str, message: &str) -> Host {
        let error = dom_exception(&live(&self.dom_exception)?, name, message);
        Ok(settled(&live(&self.promise)?, false, error.into()))
    }

    pub fn rect(&self, rect: Rect) -> Host {
        Ok(JsObject::with_slot("DOMRect", Some(&live(&self.dom_rect)?), Slot::Rect(rect)).into())
    }

    pub fn clamped_bytes(&self, bytes: Vec<u8>) -> Result<JsObject, JsError> {
        Ok(JsObject::with_slot(
            "Uint8ClampedArray",
            Some(&live(&self.uint8_clamped)?),
            Slot::Uint8Clamped(bytes),
        ))
    }

    pub fn floats(&self, samples: Vec<f32>) -> Result<JsObject, JsError> {
        Ok(JsObject::with_slot(
            "Float32Array",
            Some(&live(&self.float32)?),
            Slot::Float32(samples),
        ))
    }

    pub fn image_data(&self, width: u32, height: u32, data: Vec<u8>) -> Host {
        let data = self.clamped_bytes(data)?;
        Ok(record(
            "ImageData",
            &live(&self.image_data)?,
            vec![
                ("width", width.into()),
                ("height", height.into()),
                ("data", data.into()),
            ],
        )
        .into())
    }
}

pub(super) fn settled(proto: &JsObject, fulfilled: bool, value: JsValue) -> JsValue {
    JsObject::with_slot("Promise", Some(proto), Slot::Settled { fulfilled, value }).into()
}

/// `(fulfilled, value)` of a settled promise.
pub(super) fn settled_state(value: &JsValue) -> Option<(bool, JsValue)> {
    value.as_object()?.with_slot_ref(|slot| match slot {
        Some(Slot::Settled { fulfilled, value }) => Some((*fulfilled, value.clone())),
        _ => None,
    })
}

pub(super) fn dom_exception(proto: &JsObject, name: &str, message: &str) -> JsObject {
    record(
        "DOMException",
        proto,
        vec![("name", name.into()), ("message", message.into())],
    )
}

/// The value a thrown [`JsError`] carries into a rejected promise.
pub fn error_value(error: &JsError) -> JsValue {
    let (class, message) = match error {
        JsError::Type(message) => ("TypeError", message.clone()),
        JsError::Reference(name) => ("ReferenceError", format!("{} is not defined", name)),
        JsError::DomException { name, message } => (name.as_str(), message.clone()),
    };
    let obj = JsObject::new(class, None);
    obj.insert("name", Property::hidden(class));
    obj.insert("message", Property::hidden(message));
    obj.into()
}

/// `Promise`, with synchronous settlement: handlers run inside `then`.
pub(super) fn promise(global: &JsObject) -> Interface {
    let iface = interface(global, "Promise", None, 1, |proto, args| {
        let executor = arg(args, 0);
        if !executor.is_callable() {
            return Err(JsError::type_error(format!(
                "Promise resolver {} is not a function",
                executor.to_display()
            )));
        }
        // Pending until the executor settles it.
        let promise = JsObject::new("Promise", Some(proto));
        let settle = |fulfilled: bool| {
            let weak = promise.downgrade();
            JsObject::native_function("", 1, move |_, args| {
                if let Some(p) = weak.upgrade() {
                    p.with_slot_mut(|slot| {
                        if slot.is_none() {
                            *slot = Some(Slot::Settled {
                                fulfilled,
                                value: arg(args, 0),
                            });
                        }
                    });
                }
                Ok(JsValue::Undefined)
            })
        };
        let resolve = settle(true);
        let reject = settle(false);
        if let Err(e) = crate::js::call(
            &executor,
            &JsValue::Undefined,
            &[resolve.into(), reject.clone().into()],
        ) {
            reject.call(&JsValue::Undefined, &[error_value(&e)])?;
        }
        Ok(promise.into())
    });

    let weak = iface.proto.downgrade();
    let then = move |this: &JsValue, on_fulfilled: JsValue, on_rejected: JsValue| -> Host {
        let proto = live(&weak)?;
        let receiver = this_object(this)?;
        if receiver.class() != "Promise" {
            return Err(JsError::type_error("receiver is not a Promise"));
        }
        let Some((fulfilled, value)) = settled_state(this) else {
            return Ok(JsObject::new("Promise", Some(&proto)).into());
        };
        let handler = if fulfilled { on_fulfilled } else { on_rejected };
        match handler {
            JsValue::Object(f) if f.is_callable() => match f.call(&JsValue::Undefined, &[value]) {
                Ok(result) => match settled_state(&result) {
                    Some((fulfilled, value)) => Ok(settled(&proto, fulfilled, value)),
                    None => Ok(settled(&proto, true, result)),
                },
                Err(e) => Ok(settled(&proto, false, error_value(&e))),
            },
            _ => Ok(settled(&proto, fulfilled, value)),
        }
    };
    let then = std::sync::Arc::new(then);
    let t = then.clone();
    op(&iface.proto, "then", 2, move |this, args| {
        (*t)(this, arg(args, 0), arg(args, 1))
    });
    op(&iface.proto, "catch", 1, move |this, args| {
        (*then)(this, JsValue::Undefined, arg(args, 0))
    });

    let weak = iface.proto.downgrade();
    op(&iface.ctor, "resolve", 1, move |_, args| {
        let value = arg(args, 0);
        if settled_state(&value).is_some() {
            return Ok(value);
        }
        Ok(settled(&live(&weak)?, true, value))
    });
    let weak = iface.proto.downgrade();
    op(&iface.ctor, "reject", 1, move |_, args| {
        Ok(settled(&live(&weak)?, false, arg(args, 0)))
    });
    iface
}

/// `DOMException(message, name)`.
pub(super) fn dom_exception_interface(global: &JsObject) -> Interface {
    let iface = interface(global, "DOMException", None, 0, |proto, args| {
        let message = arg(args, 0);
        let name = arg(args, 1);
        Ok(dom_exception(
            proto,
            name.as_str().unwrap_or("Error"),
            message.as_str().unwrap_or(""),
        )
        .into())
    });
    field_attr(&iface.proto, "name");
    field_attr(&iface.proto, "message");
    iface
}

fn byte_length(this: &JsObject) -> Host {
    this.with_slot_ref(|slot| match slot {
        Some(Slot::Uint8(b)) | Some(Slot::Uint8Clamped(b)) => Ok(JsValue::from(b.len() as f64)),
        Some(Slot::Float32(f)) => Ok(JsValue::from(f.len() as f64)),
        _ => Err(JsError::type_error("Illegal invocation")),
    })
}

fn typed_length(args: &[JsValue]) -> Result<usize, JsError> {
    match arg(args, 0) {
        JsValue::Undefined => Ok(0),
        JsValue::Number(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(JsError::type_error("Invalid typed array length")),
    }
}

/// `Uint8Array`, `Uint8ClampedArray` and `Float32Array`, constructible
/// from a length.
pub(super) fn typed_arrays(global: &JsObject) -> (Interface, Interface, Interface) {
    let uint8 = interface(global, "Uint8Array", None, 3, |proto, args| {
        let len = typed_length(args)?;
        Ok(JsObject::with_slot("Uint8Array", Some(proto), Slot::Uint8(vec![0; len])).into())
    });
    let clamped = interface(global, "Uint8ClampedArray", None, 3, |proto, args| {
        let len = typed_length(args)?;
        Ok(
            JsObject::with_slot("Uint8ClampedArray", Some(proto), Slot::Uint8Clamped(vec![0; len]))
                .into(),
        )
    });
    let float32 = interface(global, "Float32Array", None, 3, |proto, args| {
        let len = typed_length(args)?;
        Ok(JsObject::with_slot("Float32Array", Some(proto), Slot::Float32(vec![0.0; len])).into())
    });
    for (iface, bytes) in [(&uint8, 1u32), (&clamped, 1), (&float32, 4)] {
        iface.proto.insert("BYTES_PER_ELEMENT", Property::Data {
            value: bytes.into(),
            writable: false,
            enumerable: true,
            configurable: false,
        });
        attr(&iface.proto, "length", byte_length);
    }
    (uint8, clamped, float32)
}

/// `ImageData(width, height)` over a `Uint8ClampedArray`.
pub(super) fn image_data_interface(global: &JsObject, clamped: &JsObject) -> Interface {
    let bytes = clamped.downgrade();
    let iface = interface(global, "ImageData", None, 2, move |proto, args| {
        let side = |i| match arg(args, i) {
            JsValue::Number(n) if n >= 1.0 => Ok(n as u32),
            _ => Err(JsError::dom("IndexSizeError", "The source width is 0.")),
        };
        let (width, height) = (side(0)?, side(1)?);
        let data = JsObject::with_slot(
            "Uint8ClampedArray",
            Some(&live(&bytes)?),
            Slot::Uint8Clamped(vec![0; width as usize * height as usize * 4]),
        );
        Ok(record(
            "ImageData",
            proto,
            vec![
                ("width", width.into()),
                ("height", height.into()),
                ("data", data.into()),
            ],
        )
        .into())
    });
    for key in ["width", "height", "data"] {
        field_attr(&iface.proto, key);
    }
    iface
}

/// `DOMRectReadOnly` and `DOMRect`.
pub(super) fn geometry(global: &JsObject) -> Interface {
    fn from_args(args: &[JsValue]) -> Rect {
        let n = |i| arg(args, i).as_f64().unwrap_or(0.0);
        Rect::new(n(0), n(1), n(2), n(3))
    }
    let read_only = interface(global, "DOMRectReadOnly", None, 0, |proto, args| {
        Ok(JsObject::with_slot("DOMRectReadOnly", Some(proto), Slot::Rect(from_args(args))).into())
    });
    let rect = interface(global, "DOMRect", Some(&read_only.proto), 0, |proto, args| {
        Ok(JsObject::with_slot("DOMRect", Some(proto), Slot::Rect(from_args(args))).into())
    });

    let fields: [(&str, fn(&Rect) -> f64); 8] = [
        ("x", |r| r.x),
        ("y", |r| r.y),
        ("width", |r| r.width),
        ("height", |r| r.height),
        ("top", |r| r.y.min(r.bottom())),
        ("left", |r| r.x.min(r.right())),
        ("right", |r| r.x.max(r.right())),
        ("bottom", |r| r.y.max(r.bottom())),
    ];
    for (key, read) in fields {
        attr(&read_only.proto, key, move |this| {
            this.with_slot_ref(|slot| match slot {
                Some(Slot::Rect(r)) => Ok(read(r).into()),
                _ => Err(JsError::type_error("Illegal invocation")),
            })
        });
    }
    rect
}
