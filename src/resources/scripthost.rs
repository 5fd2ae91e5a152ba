//! Scripting host contract.
//!
//! The core never talks to a scripting language directly. Everything it needs
//! from the embedding host goes through the [`ScriptHost`] trait:
//!
//! - `pin` / `unpin` keep callback values and owner objects alive while an
//!   entity holds them. Each engine pins when an entity takes a value and
//!   unpins exactly once when the entry leaves its table.
//! - `invoke` runs a callback, optionally with a context object (the state
//!   machine owner, a subscription context).
//! - `identity_equal` decides whether two values are the same object.
//! - `get_property` / `set_property` form the numeric property contract that
//!   tweens animate through.
//! - `resolve_animation` looks up an animation handle in an owner's exposed
//!   animation table.
//!
//! Failures are returned as [`ScriptError`], but they never leave the core:
//! engines go through the helpers at the bottom of this module, which log the
//! error and carry on with a neutral value.
//!
//! Implementations: [`NativeHost`](super::nativehost::NativeHost) for Rust
//! closures and objects, and `LuaHost` (feature `lua`).

use std::cell::Cell;

use log::{error, warn};
use thiserror::Error;

use super::handletable::Handle;

/// A plain value passed to or returned from a script callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ScriptArg {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Integer(i64),
    Str(String),
    Handle(Handle),
    /// A host value that has no plain representation (a table, a function).
    /// Truthy, like any non-nil, non-false script value.
    Opaque,
}

impl ScriptArg {
    /// Script truthiness: everything except `nil` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, ScriptArg::Nil | ScriptArg::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptArg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptArg::Number(n) => Some(*n),
            ScriptArg::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<bool> for ScriptArg {
    fn from(v: bool) -> Self {
        ScriptArg::Bool(v)
    }
}

impl From<f32> for ScriptArg {
    fn from(v: f32) -> Self {
        ScriptArg::Number(v as f64)
    }
}

impl From<f64> for ScriptArg {
    fn from(v: f64) -> Self {
        ScriptArg::Number(v)
    }
}

impl From<i64> for ScriptArg {
    fn from(v: i64) -> Self {
        ScriptArg::Integer(v)
    }
}

impl From<usize> for ScriptArg {
    fn from(v: usize) -> Self {
        ScriptArg::Integer(v as i64)
    }
}

impl From<&str> for ScriptArg {
    fn from(v: &str) -> Self {
        ScriptArg::Str(v.to_owned())
    }
}

impl From<String> for ScriptArg {
    fn from(v: String) -> Self {
        ScriptArg::Str(v)
    }
}

impl From<Handle> for ScriptArg {
    fn from(v: Handle) -> Self {
        ScriptArg::Handle(v)
    }
}

impl<T: Into<ScriptArg>> From<Option<T>> for ScriptArg {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ScriptArg::Nil)
    }
}

/// Errors raised by a scripting host at the callback/property boundary.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("callback raised: {0}")]
    Callback(String),
    #[error("value is not callable")]
    NotCallable,
    #[error("target has no property '{0}'")]
    MissingProperty(String),
    #[error("property '{0}' is not numeric")]
    NotNumeric(String),
    #[error("target is already borrowed")]
    Busy,
}

/// The services the core consumes from an embedded scripting host.
pub trait ScriptHost: 'static {
    /// A host value: callback, owner object, context, tween target.
    type Value: Clone + 'static;

    /// Extend the lifetime of `value` until a matching [`unpin`](Self::unpin).
    fn pin(&self, value: &Self::Value);

    /// Release one [`pin`](Self::pin) of `value`.
    fn unpin(&self, value: &Self::Value);

    /// Number of outstanding pins.
    fn pinned_count(&self) -> usize;

    /// Run `callback` with `args`. `context` is passed as the receiver
    /// (`self`) when present.
    fn invoke(
        &self,
        callback: &Self::Value,
        context: Option<&Self::Value>,
        args: &[ScriptArg],
    ) -> Result<ScriptArg, ScriptError>;

    fn identity_equal(&self, a: &Self::Value, b: &Self::Value) -> bool;

    fn get_property(&self, target: &Self::Value, name: &str) -> Result<f32, ScriptError>;

    fn set_property(&self, target: &Self::Value, name: &str, value: f32)
    -> Result<(), ScriptError>;

    /// Animation handle registered under `name` in `owner`'s animation table.
    fn resolve_animation(&self, owner: &Self::Value, name: &str) -> Option<Handle>;
}

/// Invoke a callback, absorbing any error.
///
/// Returns `None` when the callback raised; the error is logged with `what`
/// naming the callback site.
pub fn invoke_logged<H: ScriptHost>(
    host: &H,
    what: &str,
    callback: &H::Value,
    context: Option<&H::Value>,
    args: &[ScriptArg],
) -> Option<ScriptArg> {
    match host.invoke(callback, context, args) {
        Ok(ret) => Some(ret),
        Err(e) => {
            error!(target: "script", "Error in {}: {}", what, e);
            None
        }
    }
}

/// Read a numeric property, yielding `0.0` when the read fails.
pub fn read_property<H: ScriptHost>(host: &H, target: &H::Value, name: &str) -> f32 {
    host.get_property(target, name).unwrap_or_else(|e| {
        warn!(target: "script", "Reading property '{}': {}", name, e);
        0.0
    })
}

/// Write a numeric property, ignoring failures after logging them.
pub fn write_property<H: ScriptHost>(host: &H, target: &H::Value, name: &str, value: f32) {
    if let Err(e) = host.set_property(target, name, value) {
        warn!(target: "script", "Writing property '{}': {}", name, e);
    }
}

pub(crate) fn pin_opt<H: ScriptHost>(host: &H, value: Option<&H::Value>) {
    if let Some(v) = value {
        host.pin(v);
    }
}

pub(crate) fn unpin_opt<H: ScriptHost>(host: &H, value: Option<&H::Value>) {
    if let Some(v) = value {
        host.unpin(v);
    }
}

/// Marks an engine as "inside update" for the lifetime of the guard.
///
/// `enter` returns `None` when the engine is already updating, which is how
/// a callback calling `update` on the engine running it gets ignored.
pub(crate) struct PassGuard<'a>(&'a Cell<bool>);

impl<'a> PassGuard<'a> {
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(PassGuard(flag))
        }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
