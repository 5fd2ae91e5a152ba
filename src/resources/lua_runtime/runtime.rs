//! Lua runtime core implementation.
//!
//! This module contains the `LuaRuntime` struct which owns the Lua
//! interpreter, the [`LuaHost`] built on it, and the `engine` table API.

use std::path::Path;
use std::rc::Rc;

use log::{error, info, warn};
use mlua::prelude::*;

use super::bindings;
use super::host::LuaHost;
use crate::runtime::CoreEngines;

/// The Lua interpreter and its script host.
///
/// Not thread-safe; lives on the thread that runs the frame loop.
pub struct LuaRuntime {
    lua: Lua,
    host: Rc<LuaHost>,
}

impl LuaRuntime {
    /// Creates a new Lua runtime and registers the logging part of the
    /// `engine` table.
    ///
    /// # Errors
    ///
    /// Returns an error if Lua initialization or API registration fails.
    pub fn new() -> LuaResult<Self> {
        let lua = Lua::new();

        // Set up the package path so `require` can find scripts in assets/scripts/
        lua.load(r#"package.path = "./assets/scripts/?.lua;./assets/scripts/?/init.lua;" .. package.path"#)
            .exec()?;

        let host = Rc::new(LuaHost::new(lua.clone()));
        let runtime = Self { lua, host };
        runtime.register_base_api()?;
        Ok(runtime)
    }

    /// The host to build [`CoreEngines`] with.
    pub fn host(&self) -> Rc<LuaHost> {
        self.host.clone()
    }

    /// Adds the tween, sprite, animation, state machine and event bus
    /// functions to `engine`, bound to `engines`.
    ///
    /// The functions hold the engines weakly; once the engines are dropped
    /// every call raises a Lua error.
    pub fn register_engine_api(&self, engines: &CoreEngines<LuaHost>) -> LuaResult<()> {
        bindings::register(&self.lua, engines.downgrade())
    }

    fn register_base_api(&self) -> LuaResult<()> {
        let engine = self.lua.create_table()?;

        // engine.log(message) - General purpose logging
        engine.set(
            "log",
            self.lua.create_function(|_, msg: String| {
                info!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;

        engine.set(
            "log_info",
            self.lua.create_function(|_, msg: String| {
                info!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;

        engine.set(
            "log_warn",
            self.lua.create_function(|_, msg: String| {
                warn!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;

        engine.set(
            "log_error",
            self.lua.create_function(|_, msg: String| {
                error!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;

        self.lua.globals().set("engine", engine)?;

        Ok(())
    }

    /// Loads and executes a Lua script file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the script has syntax/runtime errors.
    pub fn run_script(&self, path: impl AsRef<Path>) -> LuaResult<()> {
        let path = path.as_ref();
        let script = std::fs::read_to_string(path)
            .map_err(|e| LuaError::ExternalError(std::sync::Arc::new(e)))?;
        self.lua
            .load(&script)
            .set_name(path.to_string_lossy())
            .exec()
    }

    /// Executes a chunk of Lua source.
    pub fn exec(&self, source: &str) -> LuaResult<()> {
        self.lua.load(source).exec()
    }

    /// Calls a global Lua function by name with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the function doesn't exist or execution fails.
    pub fn call_function<A, R>(&self, name: &str, args: A) -> LuaResult<R>
    where
        A: IntoLuaMulti,
        R: FromLuaMulti,
    {
        let func: LuaFunction = self.lua.globals().get(name)?;
        func.call(args)
    }

    /// Checks if a global function exists.
    pub fn has_function(&self, name: &str) -> bool {
        self.lua.globals().get::<LuaFunction>(name).is_ok()
    }

    /// Returns a reference to the underlying Lua state.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::scripthost::ScriptHost;

    fn setup() -> (LuaRuntime, CoreEngines<LuaHost>) {
        let lua = LuaRuntime::new().unwrap();
        let engines = CoreEngines::new(lua.host(), false);
        lua.register_engine_api(&engines).unwrap();
        (lua, engines)
    }

    #[test]
    fn test_base_api_registered() {
        let lua = LuaRuntime::new().unwrap();
        lua.exec("engine.log('hello'); engine.log_warn('careful')").unwrap();
        assert!(!lua.has_function("update"));
        lua.exec("function update(dt) return dt * 2 end").unwrap();
        assert!(lua.has_function("update"));
        let r: f64 = lua.call_function("update", 1.5).unwrap();
        assert_eq!(r, 3.0);
    }

    #[test]
    fn test_tween_from_lua() {
        let (lua, engines) = setup();
        lua.exec("obj = { x = 0 }; id = engine.tween{ target = obj, property = 'x', to = 10, duration = 1 }")
            .unwrap();
        engines.animations.update(0.5);
        let x: f64 = lua.lua().load("return obj.x").eval().unwrap();
        assert!((x - 5.0).abs() < 1e-4);
        let progress: f64 = lua
            .lua()
            .load("return engine.tween_get(id).progress")
            .eval()
            .unwrap();
        assert!((progress - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_lookup_misses_return_nil_or_false() {
        let (lua, _engines) = setup();
        let (a, b, c): (LuaValue, bool, LuaValue) = lua
            .lua()
            .load("return engine.tween_get(999), engine.fsm_trigger(999, 'go'), engine.fsm_current(999)")
            .eval()
            .unwrap();
        assert!(a.is_nil());
        assert!(!b);
        assert!(c.is_nil());
    }

    #[test]
    fn test_api_errors_after_engines_dropped() {
        let (lua, engines) = setup();
        drop(engines);
        assert!(lua.exec("engine.fsm_create()").is_err());
    }

    #[test]
    fn test_clear_releases_lua_pins() {
        let (lua, engines) = setup();
        lua.exec(
            r#"
            local o = { x = 0 }
            engine.tween{ target = o, property = 'x', to = 1, duration = 1,
                          on_complete = function() end }
            local m = engine.fsm_create(o)
            engine.fsm_add_state(m, 'a', { on_enter = function() end })
            engine.subscribe('ping', function() end)
            "#,
        )
        .unwrap();
        assert!(lua.host().pinned_count() > 0);
        engines.clear();
        assert_eq!(lua.host().pinned_count(), 0);
    }
}
