//! Per-frame stepping.
//!
//! Submodules overview
//! - [`animation`] – frame walking and the animation coordinator system
//! - [`easing`] – the easing curve functions
//! - [`eventbus`] – dispatch of the event bus once per frame
//! - [`input`] – resolve [`crate::resources::input::InputState`] into action events
//! - [`statemachine`] – state-machine update system
//! - [`time`] – update simulation time and delta
//! - [`tween`] – tween stepping

pub mod animation;
pub mod easing;
pub mod eventbus;
pub mod input;
pub mod statemachine;
pub mod time;
pub mod tween;
