//! Script host backed by plain Rust values.
//!
//! [`NativeHost`] lets Rust game code (and the test suite) drive the core
//! without an embedded interpreter. Its values are either callbacks
//! (`Rc<dyn Fn>`) or shared property objects (`Rc<RefCell<dyn PropertyAccess>>`).
//! Identity is the `Rc` allocation, so clones of one value compare equal.
//!
//! Pinning keeps a clone of the value in a keep-alive map with a count, the
//! same bookkeeping the Lua host does with registry keys.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::handletable::Handle;
use super::scripthost::{ScriptArg, ScriptError, ScriptHost};

/// Signature of a native callback: `(context, args) -> result`.
pub type NativeFn = dyn Fn(Option<&NativeValue>, &[ScriptArg]) -> Result<ScriptArg, ScriptError>;

/// Capability interface for objects whose numeric properties can be animated.
///
/// Unknown names return `None` / `false`; the host turns that into a
/// [`ScriptError::MissingProperty`], which the core absorbs.
pub trait PropertyAccess {
    fn get_property(&self, name: &str) -> Option<f32>;
    fn set_property(&mut self, name: &str, value: f32) -> bool;

    /// Animation handle exposed under `name`, used by state machines whose
    /// states name an animation.
    fn animation(&self, _name: &str) -> Option<Handle> {
        None
    }
}

/// A value living in the native host.
#[derive(Clone)]
pub enum NativeValue {
    Callback(Rc<NativeFn>),
    Object(Rc<RefCell<dyn PropertyAccess>>),
}

impl NativeValue {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Option<&NativeValue>, &[ScriptArg]) -> Result<ScriptArg, ScriptError> + 'static,
    {
        NativeValue::Callback(Rc::new(f))
    }

    pub fn object<T: PropertyAccess + 'static>(object: Rc<RefCell<T>>) -> Self {
        NativeValue::Object(object)
    }

    fn address(&self) -> usize {
        match self {
            NativeValue::Callback(f) => Rc::as_ptr(f) as *const () as usize,
            NativeValue::Object(o) => Rc::as_ptr(o) as *const () as usize,
        }
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Callback(_) => write!(f, "Callback({:#x})", self.address()),
            NativeValue::Object(_) => write!(f, "Object({:#x})", self.address()),
        }
    }
}

/// Simple named-property object.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    values: FxHashMap<String, f32>,
    animations: FxHashMap<String, Handle>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f32) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_animation(mut self, name: impl Into<String>, handle: Handle) -> Self {
        self.animations.insert(name.into(), handle);
        self
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    /// Insert or overwrite a value, declaring the property if needed.
    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        self.values.insert(name.into(), value);
    }
}

impl PropertyAccess for PropertyBag {
    fn get_property(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    fn set_property(&mut self, name: &str, value: f32) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn animation(&self, name: &str) -> Option<Handle> {
        self.animations.get(name).copied()
    }
}

/// [`ScriptHost`] over [`NativeValue`]s.
#[derive(Default)]
pub struct NativeHost {
    pinned: RefCell<FxHashMap<usize, (NativeValue, usize)>>,
}

impl NativeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `value` currently holds at least one pin.
    pub fn is_pinned(&self, value: &NativeValue) -> bool {
        self.pinned.borrow().contains_key(&value.address())
    }
}

impl ScriptHost for NativeHost {
    type Value = NativeValue;

    fn pin(&self, value: &NativeValue) {
        self.pinned
            .borrow_mut()
            .entry(value.address())
            .or_insert_with(|| (value.clone(), 0))
            .1 += 1;
    }

    fn unpin(&self, value: &NativeValue) {
        let released = {
            let mut pinned = self.pinned.borrow_mut();
            let key = value.address();
            match pinned.get_mut(&key) {
                Some((_, count)) if *count > 1 => {
                    *count -= 1;
                    None
                }
                Some(_) => pinned.remove(&key),
                None => None,
            }
        };
        // Dropping the last keep-alive clone can run arbitrary destructors.
        drop(released);
    }

    fn pinned_count(&self) -> usize {
        self.pinned.borrow().values().map(|(_, count)| *count).sum()
    }

    fn invoke(
        &self,
        callback: &NativeValue,
        context: Option<&NativeValue>,
        args: &[ScriptArg],
    ) -> Result<ScriptArg, ScriptError> {
        match callback {
            NativeValue::Callback(f) => {
                let f = Rc::clone(f);
                (*f)(context, args)
            }
            NativeValue::Object(_) => Err(ScriptError::NotCallable),
        }
    }

    fn identity_equal(&self, a: &NativeValue, b: &NativeValue) -> bool {
        match (a, b) {
            (NativeValue::Callback(_), NativeValue::Callback(_))
            | (NativeValue::Object(_), NativeValue::Object(_)) => a.address() == b.address(),
            _ => false,
        }
    }

    fn get_property(&self, target: &NativeValue, name: &str) -> Result<f32, ScriptError> {
        let NativeValue::Object(object) = target else {
            return Err(ScriptError::MissingProperty(name.to_owned()));
        };
        let object = object.try_borrow().map_err(|_| ScriptError::Busy)?;
        object
            .get_property(name)
            .ok_or_else(|| ScriptError::MissingProperty(name.to_owned()))
    }

    fn set_property(&self, target: &NativeValue, name: &str, value: f32) -> Result<(), ScriptError> {
        let NativeValue::Object(object) = target else {
            return Err(ScriptError::MissingProperty(name.to_owned()));
        };
        let mut object = object.try_borrow_mut().map_err(|_| ScriptError::Busy)?;
        if object.set_property(name, value) {
            Ok(())
        } else {
            Err(ScriptError::MissingProperty(name.to_owned()))
        }
    }

    fn resolve_animation(&self, owner: &NativeValue, name: &str) -> Option<Handle> {
        match owner {
            NativeValue::Object(object) => object.try_borrow().ok()?.animation(name),
            NativeValue::Callback(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(value: f32) -> (Rc<RefCell<PropertyBag>>, NativeValue) {
        let obj = Rc::new(RefCell::new(PropertyBag::new().with_value("x", value)));
        let v = NativeValue::object(obj.clone());
        (obj, v)
    }

    #[test]
    fn test_pin_counts_balance() {
        let host = NativeHost::new();
        let (_obj, v) = bag(1.0);
        host.pin(&v);
        host.pin(&v);
        assert_eq!(host.pinned_count(), 2);
        host.unpin(&v);
        assert!(host.is_pinned(&v));
        host.unpin(&v);
        assert_eq!(host.pinned_count(), 0);
        assert!(!host.is_pinned(&v));
    }

    #[test]
    fn test_unpin_unknown_value_is_noop() {
        let host = NativeHost::new();
        let (_obj, v) = bag(1.0);
        host.unpin(&v);
        assert_eq!(host.pinned_count(), 0);
    }

    #[test]
    fn test_pin_keeps_callback_alive() {
        let host = NativeHost::new();
        let marker = Rc::new(());
        let captured = marker.clone();
        let cb = NativeValue::callback(move |_, _| {
            let _ = &captured;
            Ok(ScriptArg::Nil)
        });
        host.pin(&cb);
        drop(cb);
        assert_eq!(Rc::strong_count(&marker), 2);
        let again = host.pinned.borrow().values().next().map(|(v, _)| v.clone()).unwrap();
        host.unpin(&again);
        drop(again);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_identity_by_allocation() {
        let host = NativeHost::new();
        let (_a, va) = bag(1.0);
        let (_b, vb) = bag(1.0);
        assert!(host.identity_equal(&va, &va.clone()));
        assert!(!host.identity_equal(&va, &vb));
    }

    #[test]
    fn test_property_round_trip() {
        let host = NativeHost::new();
        let (obj, v) = bag(2.0);
        assert_eq!(host.get_property(&v, "x").unwrap(), 2.0);
        host.set_property(&v, "x", 5.0).unwrap();
        assert_eq!(obj.borrow().value("x"), Some(5.0));
    }

    #[test]
    fn test_missing_property_errors() {
        let host = NativeHost::new();
        let (_obj, v) = bag(2.0);
        assert!(matches!(
            host.get_property(&v, "nope"),
            Err(ScriptError::MissingProperty(_))
        ));
        assert!(host.set_property(&v, "nope", 1.0).is_err());
    }

    #[test]
    fn test_busy_object_reports_error() {
        let host = NativeHost::new();
        let (obj, v) = bag(2.0);
        let _held = obj.borrow_mut();
        assert!(matches!(host.get_property(&v, "x"), Err(ScriptError::Busy)));
    }

    #[test]
    fn test_invoke_passes_context_and_args() {
        let host = NativeHost::new();
        let (_obj, owner) = bag(7.0);
        let cb = NativeValue::callback(|ctx, args| {
            assert!(ctx.is_some());
            Ok(ScriptArg::from(args.len()))
        });
        let ret = host.invoke(&cb, Some(&owner), &[1.0f32.into(), "a".into()]);
        assert_eq!(ret.unwrap(), ScriptArg::Integer(2));
    }

    #[test]
    fn test_invoke_object_is_not_callable() {
        let host = NativeHost::new();
        let (_obj, v) = bag(0.0);
        assert!(matches!(host.invoke(&v, None, &[]), Err(ScriptError::NotCallable)));
    }

    #[test]
    fn test_resolve_animation_from_bag() {
        let host = NativeHost::new();
        let obj = Rc::new(RefCell::new(
            PropertyBag::new().with_animation("run", Handle::from_raw(9)),
        ));
        let owner = NativeValue::object(obj);
        assert_eq!(host.resolve_animation(&owner, "run"), Some(Handle::from_raw(9)));
        assert_eq!(host.resolve_animation(&owner, "walk"), None);
    }
}
