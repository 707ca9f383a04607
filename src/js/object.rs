use super::JsValue;
use crate::error::JsError;
use crate::noise::Rect;
use fnv::FnvHashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Host implementation of a callable: `(this, args) -> result`.
pub type NativeFn = Arc<dyn Fn(&JsValue, &[JsValue]) -> Result<JsValue, JsError> + Send + Sync>;

/// What `Function.prototype.toString` reports for a callable.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionSource {
    /// Engine-implemented: `function <name>() { [native code] }`.
    Native(String),
    /// Author-written: the literal source text.
    Script(String),
}

/// Host-side internal slot backing an object (typed array contents, canvas
/// pixels, a date's time value, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Array(Vec<JsValue>),
    Uint8Clamped(Vec<u8>),
    Uint8(Vec<u8>),
    Float32(Vec<f32>),
    Canvas {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    Date(i64),
    Text(String),
    /// `DOMRect` geometry.
    Rect(Rect),
    /// A laid-out element.
    Element { tag: String, rect: Rect },
    /// A settled promise.
    Settled { fulfilled: bool, value: JsValue },
    /// Audio channel data, one `Float32Array` per channel.
    Channels(Vec<JsObject>),
    /// Named internal fields of a host object (`[[type]]`, `[[sdp]]`, ...).
    Fields(FnvHashMap<String, JsValue>),
}

/// An own property, data or accessor.
#[derive(Clone, Debug)]
pub enum Property {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<JsObject>,
        set: Option<JsObject>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    /// Plain assignment shape: writable, enumerable, configurable.
    pub fn data(value: impl Into<JsValue>) -> Self {
        Property::Data {
            value: value.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Shape of a native function's `name` / `length`.
    pub fn hidden(value: impl Into<JsValue>) -> Self {
        Property::Data {
            value: value.into(),
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    /// Web IDL operation shape.
    pub fn method(f: JsObject) -> Self {
        Property::Data {
            value: f.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Web IDL read-only attribute shape.
    pub fn getter(f: JsObject) -> Self {
        Property::Accessor {
            get: Some(f),
            set: None,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }

    /// `None` for accessors.
    pub fn writable(&self) -> Option<bool> {
        match self {
            Property::Data { writable, .. } => Some(*writable),
            Property::Accessor { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&JsValue> {
        match self {
            Property::Data { value, .. } => Some(value),
            Property::Accessor { .. } => None,
        }
    }

    pub fn getter_fn(&self) -> Option<&JsObject> {
        match self {
            Property::Accessor { get, .. } => get.as_ref(),
            Property::Data { .. } => None,
        }
    }

    pub fn setter_fn(&self) -> Option<&JsObject> {
        match self {
            Property::Accessor { set, .. } => set.as_ref(),
            Property::Data { .. } => None,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Property::Accessor { .. })
    }

    fn same_shape(&self, other: &Property) -> bool {
        match (self, other) {
            (
                Property::Data {
                    value: a,
                    writable: wa,
                    enumerable: ea,
                    configurable: ca,
                },
                Property::Data {
                    value: b,
                    writable: wb,
                    enumerable: eb,
                    configurable: cb,
                },
            ) => a.strict_equals(b) && wa == wb && ea == eb && ca == cb,
            (
                Property::Accessor {
                    get: ga,
                    set: sa,
                    enumerable: ea,
                    configurable: ca,
                },
                Property::Accessor {
                    get: gb,
                    set: sb,
                    enumerable: eb,
                    configurable: cb,
                },
            ) => same_fn(ga, gb) && same_fn(sa, sb) && ea == eb && ca == cb,
            _ => false,
        }
    }
}

fn same_fn(a: &Option<JsObject>, b: &Option<JsObject>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

struct ObjectInner {
    class: String,
    proto: RwLock<Option<JsObject>>,
    props: RwLock<FnvHashMap<String, Property>>,
    extensible: AtomicBool,
    call: Option<NativeFn>,
    source: Option<FunctionSource>,
    slot: RwLock<Option<Slot>>,
}

/// A reference to an object in the model. Cloning shares identity.
#[derive(Clone)]
pub struct JsObject(Arc<ObjectInner>);

/// A non-owning handle; see [`WrapperRegistry`](crate::native::WrapperRegistry).
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<JsObject> {
        self.0.upgrade().map(JsObject)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

impl JsObject {
    fn build(
        class: &str,
        proto: Option<&JsObject>,
        call: Option<NativeFn>,
        source: Option<FunctionSource>,
        slot: Option<Slot>,
    ) -> Self {
        JsObject(Arc::new(ObjectInner {
            class: class.to_string(),
            proto: RwLock::new(proto.cloned()),
            props: RwLock::new(FnvHashMap::default()),
            extensible: AtomicBool::new(true),
            call,
            source,
            slot: RwLock::new(slot),
        }))
    }

    /// An ordinary object of the given class.
    pub fn new(class: &str, proto: Option<&JsObject>) -> Self {
        Self::build(class, proto, None, None, None)
    }

    /// An ordinary object backed by an internal slot.
    pub fn with_slot(class: &str, proto: Option<&JsObject>, slot: Slot) -> Self {
        Self::build(class, proto, None, None, Some(slot))
    }

    /// An array (exotic `length` and index properties).
    pub fn array(items: Vec<JsValue>) -> Self {
        Self::with_slot("Array", None, Slot::Array(items))
    }

    /// A frozen array, the shape of `navigator.languages`.
    pub fn frozen_array(items: Vec<JsValue>) -> Self {
        let arr = Self::array(items);
        arr.freeze();
        arr
    }

    /// A callable with own `length` and `name` shaped like a native
    /// function's.
    pub fn function(name: &str, length: u32, source: FunctionSource, call: NativeFn) -> Self {
        let f = Self::build("Function", None, Some(call), Some(source), None);
        {
            let mut props = write(&f.0.props);
            props.insert("length".to_string(), Property::hidden(length));
            props.insert("name".to_string(), Property::hidden(name));
        }
        f
    }

    /// An engine-implemented function.
    pub fn native_function<F>(name: &str, length: u32, f: F) -> Self
    where
        F: Fn(&JsValue, &[JsValue]) -> Result<JsValue, JsError> + Send + Sync + 'static,
    {
        Self::function(
            name,
            length,
            FunctionSource::Native(name.to_string()),
            Arc::new(f),
        )
    }

    /// An author-written function whose `toString` shows `source`.
    pub fn script_function<F>(name: &str, length: u32, source: &str, f: F) -> Self
    where
        F: Fn(&JsValue, &[JsValue]) -> Result<JsValue, JsError> + Send + Sync + 'static,
    {
        Self::function(
            name,
            length,
            FunctionSource::Script(source.to_string()),
            Arc::new(f),
        )
    }

    pub fn class(&self) -> &str {
        &self.0.class
    }

    pub fn is_callable(&self) -> bool {
        self.0.call.is_some()
    }

    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key. Only meaningful while the object is alive.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Arc::downgrade(&self.0))
    }

    pub fn prototype_of(&self) -> Option<JsObject> {
        read(&self.0.proto).clone()
    }

    /// Whether `proto` is on this object's prototype chain. An object does
    /// not inherit from itself.
    pub fn inherits_from(&self, proto: &JsObject) -> bool {
        let mut current = self.prototype_of();
        while let Some(p) = current {
            if p.ptr_eq(proto) {
                return true;
            }
            current = p.prototype_of();
        }
        false
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.load(Ordering::Acquire)
    }

    fn is_array(&self) -> bool {
        matches!(&*read(&self.0.slot), Some(Slot::Array(_)))
    }

    /// Snapshot of an array's elements, `None` for non-arrays.
    pub fn array_items(&self) -> Option<Vec<JsValue>> {
        match &*read(&self.0.slot) {
            Some(Slot::Array(items)) => Some(items.clone()),
            _ => None,
        }
    }

    /// `Object.getOwnPropertyDescriptor`.
    pub fn get_own_property(&self, key: &str) -> Option<Property> {
        if let Some(Slot::Array(items)) = &*read(&self.0.slot) {
            let frozen = !self.is_extensible();
            if key == "length" {
                return Some(Property::Data {
                    value: JsValue::Number(items.len() as f64),
                    writable: !frozen,
                    enumerable: false,
                    configurable: false,
                });
            }
            if let Some(i) = array_index(key) {
                return items.get(i).map(|v| Property::Data {
                    value: v.clone(),
                    writable: !frozen,
                    enumerable: true,
                    configurable: !frozen,
                });
            }
        }
        read(&self.0.props).get(key).cloned()
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        self.get_own_property(key).is_some()
    }

    /// The `in` operator.
    pub fn has_property(&self, key: &str) -> bool {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if obj.has_own_property(key) {
                return true;
            }
            current = obj.prototype_of();
        }
        false
    }

    /// `Object.getOwnPropertyNames`, sorted for stable output.
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = read(&self.0.props).keys().cloned().collect();
        if let Some(items) = self.array_items() {
            keys.extend((0..items.len()).map(|i| i.to_string()));
            keys.push("length".to_string());
        }
        keys.sort();
        keys
    }

    fn find_property(&self, key: &str) -> Option<Property> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Some(prop) = obj.get_own_property(key) {
                return Some(prop);
            }
            current = obj.prototype_of();
        }
        None
    }

    /// `Object.defineProperty` (throwing form).
    pub fn define_property(&self, key: &str, prop: Property) -> Result<(), JsError> {
        let existing = self.get_own_property(key);
        match &existing {
            Some(current) if !current.configurable() => {
                let allowed = current.same_shape(&prop)
                    || matches!(
                        (current, &prop),
                        (
                            Property::Data { writable: true, enumerable: e1, .. },
                            Property::Data { enumerable: e2, configurable: false, .. },
                        ) if e1 == e2
                    );
                if !allowed {
                    return Err(JsError::type_error(format!(
                        "Cannot redefine property: {}",
                        key
                    )));
                }
            }
            None if !self.is_extensible() => {
                return Err(JsError::type_error(format!(
                    "Cannot define property {}, object is not extensible",
                    key
                )));
            }
            _ => {}
        }

        if self.is_array() {
            if key == "length" {
                return Err(JsError::type_error("Cannot redefine array length"));
            }
            if let Some(i) = array_index(key) {
                let value = match prop {
                    Property::Data { value, .. } => value,
                    Property::Accessor { .. } => {
                        return Err(JsError::type_error("Array elements must be data properties"))
                    }
                };
                let mut slot = write(&self.0.slot);
                if let Some(Slot::Array(items)) = slot.as_mut() {
                    if i < items.len() {
                        items[i] = value;
                    } else {
                        items.resize(i, JsValue::Undefined);
                        items.push(value);
                    }
                }
                return Ok(());
            }
        }

        write(&self.0.props).insert(key.to_string(), prop);
        Ok(())
    }

    /// Define without the configurability checks. Only for building fresh
    /// host objects.
    pub(crate) fn insert(&self, key: &str, prop: Property) {
        write(&self.0.props).insert(key.to_string(), prop);
    }

    /// `obj[key]`, invoking getters with `obj` as the receiver.
    pub fn get(&self, key: &str) -> Result<JsValue, JsError> {
        self.get_with_receiver(key, &JsValue::Object(self.clone()))
    }

    pub fn get_with_receiver(&self, key: &str, receiver: &JsValue) -> Result<JsValue, JsError> {
        match self.find_property(key) {
            None => Ok(JsValue::Undefined),
            Some(Property::Data { value, .. }) => Ok(value),
            Some(Property::Accessor { get: Some(get), .. }) => get.call(receiver, &[]),
            Some(Property::Accessor { get: None, .. }) => Ok(JsValue::Undefined),
        }
    }

    /// `obj[key] = value` with strict-mode failure semantics.
    pub fn set(&self, key: &str, value: impl Into<JsValue>) -> Result<(), JsError> {
        let value = value.into();
        match self.find_property(key) {
            Some(Property::Accessor { set: Some(set), .. }) => {
                set.call(&JsValue::Object(self.clone()), &[value])?;
                Ok(())
            }
            Some(Property::Accessor { set: None, .. }) => Err(JsError::type_error(format!(
                "Cannot set property {} which has only a getter",
                key
            ))),
            Some(Property::Data { writable: false, .. }) => Err(JsError::type_error(format!(
                "Cannot assign to read only property '{}'",
                key
            ))),
            _ => match self.get_own_property(key) {
                Some(Property::Data {
                    enumerable,
                    configurable,
                    ..
                }) => self.define_property(
                    key,
                    Property::Data {
                        value,
                        writable: true,
                        enumerable,
                        configurable,
                    },
                ),
                _ => self.define_property(key, Property::data(value)),
            },
        }
    }

    /// The `delete` operator (strict: non-configurable throws).
    pub fn delete(&self, key: &str) -> Result<bool, JsError> {
        match self.get_own_property(key) {
            None => Ok(true),
            Some(prop) if !prop.configurable() => Err(JsError::type_error(format!(
                "Cannot delete property '{}'",
                key
            ))),
            Some(_) => {
                write(&self.0.props).remove(key);
                Ok(true)
            }
        }
    }

    /// `Object.freeze`.
    pub fn freeze(&self) {
        self.0.extensible.store(false, Ordering::Release);
        let mut props = write(&self.0.props);
        for prop in props.values_mut() {
            match prop {
                Property::Data {
                    writable,
                    configurable,
                    ..
                } => {
                    *writable = false;
                    *configurable = false;
                }
                Property::Accessor { configurable, .. } => *configurable = false,
            }
        }
    }

    /// `Object.isFrozen`.
    pub fn is_frozen(&self) -> bool {
        !self.is_extensible()
            && self.own_keys().iter().all(|k| match self.get_own_property(k) {
                Some(p) => !p.configurable() && p.writable() != Some(true),
                None => true,
            })
    }

    /// `[[Call]]`.
    pub fn call(&self, this: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        match &self.0.call {
            Some(f) => f(this, args),
            None => Err(JsError::type_error(format!(
                "[object {}] is not a function",
                self.0.class
            ))),
        }
    }

    /// `Function.prototype.toString.call(this)`.
    pub fn function_to_string(&self) -> Result<String, JsError> {
        match &self.0.source {
            Some(FunctionSource::Native(name)) => {
                Ok(format!("function {}() {{ [native code] }}", name))
            }
            Some(FunctionSource::Script(src)) => Ok(src.clone()),
            None => Err(JsError::type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            )),
        }
    }

    pub fn source(&self) -> Option<&FunctionSource> {
        self.0.source.as_ref()
    }

    /// Read the internal slot.
    pub fn with_slot_ref<R>(&self, f: impl FnOnce(Option<&Slot>) -> R) -> R {
        f(read(&self.0.slot).as_ref())
    }

    /// Mutate the internal slot.
    pub fn with_slot_mut<R>(&self, f: impl FnOnce(&mut Option<Slot>) -> R) -> R {
        f(&mut write(&self.0.slot))
    }

    /// Internal field `key` of a [`Slot::Fields`] object.
    pub fn field(&self, key: &str) -> Option<JsValue> {
        match &*read(&self.0.slot) {
            Some(Slot::Fields(fields)) => fields.get(key).cloned(),
            _ => None,
        }
    }

    /// Drop every outgoing reference (properties, prototype, slot) and
    /// return the objects that were referenced. Used to break the cycles of
    /// a discarded object graph.
    pub(crate) fn detach(&self) -> Vec<JsObject> {
        let mut out = Vec::new();
        let props = std::mem::take(&mut *write(&self.0.props));
        for prop in props.into_values() {
            match prop {
                Property::Data { value, .. } => out.extend(value.as_object().cloned()),
                Property::Accessor { get, set, .. } => out.extend(get.into_iter().chain(set)),
            }
        }
        out.extend(write(&self.0.proto).take());
        match write(&self.0.slot).take() {
            Some(Slot::Array(items)) => out.extend(items.iter().filter_map(|v| v.as_object().cloned())),
            Some(Slot::Channels(channels)) => out.extend(channels),
            Some(Slot::Settled { value, .. }) => out.extend(value.as_object().cloned()),
            Some(Slot::Fields(fields)) => {
                out.extend(fields.values().filter_map(|v| v.as_object().cloned()))
            }
            _ => {}
        }
        out
    }
}

impl PartialEq for JsObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.source {
            Some(FunctionSource::Native(name)) => write!(f, "[function {}]", name),
            Some(FunctionSource::Script(_)) => write!(f, "[function]"),
            None => write!(f, "[object {}]", self.0.class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getter_receives_receiver() {
        let proto = JsObject::new("Navigator", None);
        let getter = JsObject::native_function("get platform", 0, |this, _| {
            Ok(JsValue::str(if this.is_undefined() { "none" } else { "Win32" }))
        });
        proto
            .define_property("platform", Property::getter(getter))
            .unwrap();
        let nav = JsObject::new("Navigator", Some(&proto));
        assert_eq!(nav.get("platform").unwrap(), JsValue::str("Win32"));
        assert!(!nav.has_own_property("platform"));
        assert!(nav.has_property("platform"));
    }

    #[test]
    fn test_native_function_shape() {
        let f = JsObject::native_function("getParameter", 1, |_, _| Ok(JsValue::Null));
        assert_eq!(
            f.function_to_string().unwrap(),
            "function getParameter() { [native code] }"
        );
        let name = f.get_own_property("name").unwrap();
        assert_eq!(name.writable(), Some(false));
        assert!(!name.enumerable());
        assert!(name.configurable());
        assert_eq!(f.own_keys(), vec!["length".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_frozen_array() {
        let arr = JsObject::frozen_array(vec!["en-US".into(), "en".into()]);
        assert!(arr.is_frozen());
        assert_eq!(arr.get("length").unwrap(), JsValue::Number(2.0));
        assert_eq!(arr.get("0").unwrap(), JsValue::str("en-US"));
        assert!(arr.set("0", "fr").is_err());
        assert!(arr.define_property("2", Property::data("de")).is_err());
    }

    #[test]
    fn test_non_configurable_redefine_fails() {
        let obj = JsObject::new("Object", None);
        obj.define_property(
            "x",
            Property::Data {
                value: 1u32.into(),
                writable: false,
                enumerable: false,
                configurable: false,
            },
        )
        .unwrap();
        assert!(obj.define_property("x", Property::data(2u32)).is_err());
        assert!(obj.delete("x").is_err());
    }

    #[test]
    fn test_script_function_to_string() {
        let f = JsObject::script_function("", 0, "() => 42", |_, _| Ok(JsValue::Number(42.0)));
        assert_eq!(f.function_to_string().unwrap(), "() => 42");
        let plain = JsObject::new("Object", None);
        assert!(plain.function_to_string().is_err());
    }
}
