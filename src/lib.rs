//! Aberred core library.
//!
//! The real-time coordination core of the engine: easing curves, tweens,
//! sprite animations, the animation coordinator, a double-buffered event
//! bus, and a state-machine engine with guards and input bindings. Every
//! engine talks to scripts only through the
//! [`ScriptHost`](resources::scripthost::ScriptHost) contract and stays
//! consistent when a callback creates, destroys or redirects the objects
//! being updated.
//!
//! [`runtime::Runtime`] wires the engines into a bevy_ecs schedule that runs
//! one frame per `tick`.

pub mod components;
pub mod events;
pub mod resources;
pub mod runtime;
pub mod systems;
