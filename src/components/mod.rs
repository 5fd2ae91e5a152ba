//! Entity data held in the engines' handle tables.
//!
//! Components are plain data: the engines in [`crate::resources`] own them
//! and the stepping logic in [`crate::systems`] advances them. They are
//! generic over the script host's value type where they hold callbacks.
//!
//! Submodules overview:
//! - [`animation`] – frame-cycling sprite animation state and creation spec
//! - [`sprite`] – texture key, size and the source rectangle a renderer reads
//! - [`statemachine`] – state graph, transitions and input bindings
//! - [`tween`] – easing curves and property interpolation state

pub mod animation;
pub mod sprite;
pub mod statemachine;
pub mod tween;
