//! Long-lived engine objects.
//!
//! The engines are shared through `Rc` between the ECS world (as a non-send
//! resource) and the script host's API closures, so they use interior
//! mutability and never hold a borrow across a script callback.
//!
//! Overview
//! - `animationcoordinator` – tweens, sprite animations and sprites, one update per frame
//! - `coreconfig` – INI-backed runtime configuration
//! - `eventbus` – double-buffered publish/subscribe
//! - `handletable` – handle tables whose ids are never reused
//! - `input` – raw action state and phase resolution
//! - `lua_runtime` – mlua host and the `engine` script API (feature `lua`)
//! - `nativehost` – script host over Rust closures and objects
//! - `scripthost` – the contract every script host implements
//! - `statemachines` – state-machine engine: guards, transitions, input bindings
//! - `worldtime` – simulation time and delta
pub mod animationcoordinator;
pub mod coreconfig;
pub mod eventbus;
pub mod handletable;
pub mod input;
#[cfg(feature = "lua")]
pub mod lua_runtime;
pub mod nativehost;
pub mod scripthost;
pub mod statemachines;
pub mod worldtime;
