//! Lua scripting for the core engines.
//!
//! - [`host`] - [`LuaHost`], the [`ScriptHost`](crate::resources::scripthost::ScriptHost)
//!   implementation over mlua values
//! - [`runtime`] - [`LuaRuntime`], the interpreter plus the global `engine` table
//! - `bindings` - the tween, animation, state machine and event bus functions
//!   on `engine`
//!
//! # Example
//!
//! ```lua
//! local player = { x = 0, stamina = 1, animations = {} }
//! engine.tween{ target = player, property = "x", to = 100, duration = 0.5,
//!               easing = "quad_out" }
//!
//! local fsm = engine.fsm_create(player)
//! engine.fsm_add_state(fsm, "idle", {})
//! engine.fsm_add_state(fsm, "jump", { on_enter = function(self) engine.log("jump!") end })
//! engine.fsm_add_transition(fsm, "idle", "jump", "jump",
//!     function(self) return self.stamina > 0 end)
//! engine.fsm_set_initial(fsm, "idle")
//! engine.fsm_bind_input(fsm, { action = "jump", phase = "pressed", to = "jump" })
//! ```

mod bindings;
pub mod host;
pub mod runtime;

pub use host::LuaHost;
pub use runtime::LuaRuntime;
