//! Event payloads carried by the event bus.
//!
//! Submodules:
//! - [`bus`] – the [`Event`](bus::Event) envelope and its script-facing argument list
//! - [`input`] – resolved input actions and their phases
pub mod bus;
pub mod input;
