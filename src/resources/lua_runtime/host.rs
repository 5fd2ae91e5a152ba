//! [`ScriptHost`] over an mlua state.
//!
//! Host values are plain `mlua::Value`s. Pinning stores the value in the Lua
//! registry, keyed by the value's pointer, with a refcount so that a value
//! held by several entities stays in the registry until its last unpin.
//! Plain values (numbers, booleans, nil) are not collectable and are not
//! pinned.

use std::cell::RefCell;

use log::{error, warn};
use mlua::prelude::*;
use rustc_hash::FxHashMap;

use crate::resources::handletable::Handle;
use crate::resources::scripthost::{ScriptArg, ScriptError, ScriptHost};

struct Pin {
    key: LuaRegistryKey,
    count: usize,
}

pub struct LuaHost {
    lua: Lua,
    pins: RefCell<FxHashMap<usize, Pin>>,
}

impl LuaHost {
    pub fn new(lua: Lua) -> Self {
        LuaHost {
            lua,
            pins: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    fn pin_key(value: &LuaValue) -> Option<usize> {
        let ptr = value.to_pointer() as usize;
        (ptr != 0).then_some(ptr)
    }

    fn to_lua(&self, arg: &ScriptArg) -> LuaResult<LuaValue> {
        Ok(match arg {
            ScriptArg::Nil | ScriptArg::Opaque => LuaValue::Nil,
            ScriptArg::Bool(b) => LuaValue::Boolean(*b),
            ScriptArg::Number(n) => LuaValue::Number(*n),
            ScriptArg::Integer(i) => LuaValue::Integer(*i),
            ScriptArg::Str(s) => LuaValue::String(self.lua.create_string(s)?),
            ScriptArg::Handle(h) => LuaValue::Integer(h.raw() as i64),
        })
    }

    fn call(&self, function: &LuaFunction, args: LuaMultiValue) -> Result<LuaValue, ScriptError> {
        function
            .call::<LuaValue>(args)
            .map_err(|e| ScriptError::Callback(e.to_string()))
    }

    /// `target[name]`, or `target:get_<name>()` when the field is absent.
    fn read_field(&self, table: &LuaTable, name: &str) -> Result<LuaValue, ScriptError> {
        let value: LuaValue = table
            .get(name)
            .map_err(|e| ScriptError::Callback(e.to_string()))?;
        match value {
            LuaValue::Function(f) => self.call(&f, LuaMultiValue::from_vec(vec![LuaValue::Table(table.clone())])),
            LuaValue::Nil => {
                let getter: Option<LuaFunction> = table
                    .get(format!("get_{}", name))
                    .map_err(|e| ScriptError::Callback(e.to_string()))?;
                match getter {
                    Some(f) => self.call(&f, LuaMultiValue::from_vec(vec![LuaValue::Table(table.clone())])),
                    None => Err(ScriptError::MissingProperty(name.to_owned())),
                }
            }
            other => Ok(other),
        }
    }
}

/// Convert a callback result into a plain argument.
pub(super) fn from_lua(value: &LuaValue) -> ScriptArg {
    match value {
        LuaValue::Nil => ScriptArg::Nil,
        LuaValue::Boolean(b) => ScriptArg::Bool(*b),
        LuaValue::Integer(i) => ScriptArg::Integer(*i),
        LuaValue::Number(n) => ScriptArg::Number(*n),
        LuaValue::String(s) => ScriptArg::Str(s.to_string_lossy()),
        _ => ScriptArg::Opaque,
    }
}

impl ScriptHost for LuaHost {
    type Value = LuaValue;

    fn pin(&self, value: &LuaValue) {
        let Some(ptr) = Self::pin_key(value) else {
            return;
        };
        if let Some(pin) = self.pins.borrow_mut().get_mut(&ptr) {
            pin.count += 1;
            return;
        }
        // Registry allocation can run finalizers that pin or unpin.
        let key = match self.lua.create_registry_value(value.clone()) {
            Ok(key) => key,
            Err(e) => {
                error!(target: "script", "Pinning value: {}", e);
                return;
            }
        };
        let duplicate = {
            let mut pins = self.pins.borrow_mut();
            match pins.get_mut(&ptr) {
                Some(pin) => {
                    pin.count += 1;
                    Some(key)
                }
                None => {
                    pins.insert(ptr, Pin { key, count: 1 });
                    None
                }
            }
        };
        if let Some(key) = duplicate {
            if let Err(e) = self.lua.remove_registry_value(key) {
                warn!(target: "script", "Releasing duplicate pin: {}", e);
            }
        }
    }

    fn unpin(&self, value: &LuaValue) {
        let Some(ptr) = Self::pin_key(value) else {
            return;
        };
        let released = {
            let mut pins = self.pins.borrow_mut();
            let Some(pin) = pins.get_mut(&ptr) else {
                warn!(target: "script", "Unpinning a value that is not pinned");
                return;
            };
            pin.count -= 1;
            if pin.count == 0 { pins.remove(&ptr) } else { None }
        };
        if let Some(pin) = released
            && let Err(e) = self.lua.remove_registry_value(pin.key)
        {
            error!(target: "script", "Releasing pinned value: {}", e);
        }
    }

    fn pinned_count(&self) -> usize {
        self.pins.borrow().values().map(|p| p.count).sum()
    }

    fn invoke(
        &self,
        callback: &LuaValue,
        context: Option<&LuaValue>,
        args: &[ScriptArg],
    ) -> Result<ScriptArg, ScriptError> {
        let LuaValue::Function(function) = callback else {
            return Err(ScriptError::NotCallable);
        };
        let mut values = Vec::with_capacity(args.len() + 1);
        if let Some(ctx) = context {
            values.push(ctx.clone());
        }
        for arg in args {
            values.push(
                self.to_lua(arg)
                    .map_err(|e| ScriptError::Callback(e.to_string()))?,
            );
        }
        let ret = self.call(function, LuaMultiValue::from_vec(values))?;
        Ok(from_lua(&ret))
    }

    fn identity_equal(&self, a: &LuaValue, b: &LuaValue) -> bool {
        match (Self::pin_key(a), Self::pin_key(b)) {
            (Some(pa), Some(pb)) => pa == pb,
            _ => a == b,
        }
    }

    fn get_property(&self, target: &LuaValue, name: &str) -> Result<f32, ScriptError> {
        let LuaValue::Table(table) = target else {
            return Err(ScriptError::MissingProperty(name.to_owned()));
        };
        match self.read_field(table, name)? {
            LuaValue::Integer(i) => Ok(i as f32),
            LuaValue::Number(n) => Ok(n as f32),
            _ => Err(ScriptError::NotNumeric(name.to_owned())),
        }
    }

    fn set_property(&self, target: &LuaValue, name: &str, value: f32) -> Result<(), ScriptError> {
        let LuaValue::Table(table) = target else {
            return Err(ScriptError::MissingProperty(name.to_owned()));
        };
        let setter: Option<LuaFunction> = table
            .get(format!("set_{}", name))
            .map_err(|e| ScriptError::Callback(e.to_string()))?;
        match setter {
            Some(f) => f
                .call::<()>((table.clone(), value))
                .map_err(|e| ScriptError::Callback(e.to_string())),
            None => table
                .set(name, value)
                .map_err(|e| ScriptError::Callback(e.to_string())),
        }
    }

    fn resolve_animation(&self, owner: &LuaValue, name: &str) -> Option<Handle> {
        let LuaValue::Table(table) = owner else {
            return None;
        };
        let animations: LuaTable = table.get("animations").ok()?;
        match animations.get::<LuaValue>(name).ok()? {
            LuaValue::Integer(i) if i > 0 => Some(Handle::from_raw(i as u64)),
            LuaValue::Number(n) if n >= 1.0 && n.fract() == 0.0 => Some(Handle::from_raw(n as u64)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> LuaHost {
        LuaHost::new(Lua::new())
    }

    fn eval(host: &LuaHost, code: &str) -> LuaValue {
        host.lua().load(code).eval().unwrap()
    }

    // ==================== PIN TESTS ====================

    #[test]
    fn test_pin_is_refcounted_per_value() {
        let h = host();
        let t = eval(&h, "return {}");
        h.pin(&t);
        h.pin(&t.clone());
        assert_eq!(h.pinned_count(), 2);
        h.unpin(&t);
        assert_eq!(h.pinned_count(), 1);
        h.unpin(&t);
        assert_eq!(h.pinned_count(), 0);
    }

    #[test]
    fn test_plain_values_are_not_pinned() {
        let h = host();
        h.pin(&LuaValue::Integer(3));
        h.pin(&LuaValue::Nil);
        assert_eq!(h.pinned_count(), 0);
    }

    // ==================== INVOKE TESTS ====================

    #[test]
    fn test_invoke_passes_context_first() {
        let h = host();
        let f = eval(&h, "return function(self, a, b) return self.base + a + b end");
        let ctx = eval(&h, "return { base = 10 }");
        let ret = h
            .invoke(&f, Some(&ctx), &[ScriptArg::Integer(1), ScriptArg::Number(0.5)])
            .unwrap();
        assert_eq!(ret.as_number(), Some(11.5));
    }

    #[test]
    fn test_invoke_converts_handles_and_strings() {
        let h = host();
        let f = eval(&h, "return function(id, s) return s .. id end");
        let ret = h
            .invoke(&f, None, &[Handle::from_raw(7).into(), "h".into()])
            .unwrap();
        assert_eq!(ret, ScriptArg::Str("h7".into()));
    }

    #[test]
    fn test_invoke_errors() {
        let h = host();
        let bad = eval(&h, "return function() error('boom') end");
        assert!(matches!(h.invoke(&bad, None, &[]), Err(ScriptError::Callback(_))));
        assert!(matches!(
            h.invoke(&LuaValue::Integer(1), None, &[]),
            Err(ScriptError::NotCallable)
        ));
    }

    #[test]
    fn test_table_return_is_opaque() {
        let h = host();
        let f = eval(&h, "return function() return {} end");
        assert_eq!(h.invoke(&f, None, &[]).unwrap(), ScriptArg::Opaque);
    }

    // ==================== PROPERTY TESTS ====================

    #[test]
    fn test_plain_field_read_write() {
        let h = host();
        let t = eval(&h, "return { x = 4 }");
        assert_eq!(h.get_property(&t, "x").unwrap(), 4.0);
        h.set_property(&t, "x", 2.5).unwrap();
        assert_eq!(h.get_property(&t, "x").unwrap(), 2.5);
    }

    #[test]
    fn test_accessor_methods() {
        let h = host();
        let t = eval(
            &h,
            r#"
            local o = { _a = 1, writes = 0 }
            function o:get_alpha() return self._a end
            function o:set_alpha(v) self._a = v; self.writes = self.writes + 1 end
            return o
            "#,
        );
        assert_eq!(h.get_property(&t, "alpha").unwrap(), 1.0);
        h.set_property(&t, "alpha", 0.25).unwrap();
        assert_eq!(h.get_property(&t, "alpha").unwrap(), 0.25);
        assert_eq!(h.get_property(&t, "writes").unwrap(), 1.0);
    }

    #[test]
    fn test_function_field_is_called() {
        let h = host();
        let t = eval(&h, "return { width = function(self) return 32 end }");
        assert_eq!(h.get_property(&t, "width").unwrap(), 32.0);
    }

    #[test]
    fn test_missing_and_non_numeric() {
        let h = host();
        let t = eval(&h, "return { name = 'x' }");
        assert!(matches!(h.get_property(&t, "y"), Err(ScriptError::MissingProperty(_))));
        assert!(matches!(h.get_property(&t, "name"), Err(ScriptError::NotNumeric(_))));
        assert!(h.get_property(&LuaValue::Integer(1), "x").is_err());
    }

    // ==================== IDENTITY / ANIMATION TESTS ====================

    #[test]
    fn test_identity_is_reference_equality() {
        let h = host();
        let a = eval(&h, "return {}");
        let b = eval(&h, "return {}");
        assert!(h.identity_equal(&a, &a.clone()));
        assert!(!h.identity_equal(&a, &b));
    }

    #[test]
    fn test_resolve_animation_reads_owner_table() {
        let h = host();
        let owner = eval(&h, "return { animations = { run = 3, bad = 'x' } }");
        assert_eq!(h.resolve_animation(&owner, "run"), Some(Handle::from_raw(3)));
        assert_eq!(h.resolve_animation(&owner, "bad"), None);
        assert_eq!(h.resolve_animation(&owner, "idle"), None);
        let bare = eval(&h, "return {}");
        assert_eq!(h.resolve_animation(&bare, "run"), None);
    }
}
