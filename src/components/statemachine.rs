//! State-machine data.
//!
//! A [`StateMachine`] is a directed graph of named states. Edges are keyed by
//! `(state, event)` and may carry a guard predicate evaluated in the owner's
//! context. Each state may name an animation that plays while it is current.
//!
//! Machines live in the
//! [`StateMachineEngine`](crate::resources::statemachines::StateMachineEngine),
//! which implements the transition protocol. This module only holds data.
//!
//! # Callback arguments
//!
//! | callback    | context | arguments                        |
//! |-------------|---------|----------------------------------|
//! | `on_enter`  | owner   | `(handle, previous_state or nil)`|
//! | `on_exit`   | owner   | `(handle, target_state)`         |
//! | `on_update` | owner   | `(handle, dt, time_in_state)`    |
//! | guard       | owner   | `(handle, event)`                |
//! | input guard | owner   | `(handle, action, phase)`        |

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::events::input::InputPhase;
use crate::resources::handletable::Handle;

/// Callbacks and animation for a single state.
#[derive(Clone, Debug)]
pub struct StateDefinition<V> {
    pub on_enter: Option<V>,
    pub on_exit: Option<V>,
    /// Returning a state name from `on_update` requests a forced transition.
    pub on_update: Option<V>,
    /// Animation name, resolved through the machine's cache then the owner.
    pub animation: Option<String>,
}

impl<V> Default for StateDefinition<V> {
    fn default() -> Self {
        StateDefinition {
            on_enter: None,
            on_exit: None,
            on_update: None,
            animation: None,
        }
    }
}

impl<V> StateDefinition<V> {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_on_enter(mut self, callback: V) -> Self {
        self.on_enter = Some(callback);
        self
    }
    pub fn with_on_exit(mut self, callback: V) -> Self {
        self.on_exit = Some(callback);
        self
    }
    pub fn with_on_update(mut self, callback: V) -> Self {
        self.on_update = Some(callback);
        self
    }
    pub fn with_animation(mut self, name: impl Into<String>) -> Self {
        self.animation = Some(name.into());
        self
    }

    /// Every host value this definition holds.
    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        [&self.on_enter, &self.on_exit, &self.on_update]
            .into_iter()
            .flatten()
    }
}

#[derive(Clone, Debug)]
pub struct TransitionDefinition<V> {
    pub target: String,
    pub guard: Option<V>,
}

#[derive(Clone, Debug)]
pub struct StateMachine<V> {
    /// Context object for every callback; pinned for the machine's lifetime.
    pub owner: Option<V>,
    pub states: FxHashMap<String, StateDefinition<V>>,
    /// from-state -> event -> transition.
    pub transitions: FxHashMap<String, FxHashMap<String, TransitionDefinition<V>>>,
    pub initial: Option<String>,
    pub current: Option<String>,
    pub previous: Option<String>,
    pub time_in_state: f32,
    /// Set once the first state has been entered.
    pub initialized: bool,
    /// Sprite bound to every animation the machine plays.
    pub sprite: Option<Handle>,
    /// state-animation name -> animation handle.
    pub animation_cache: FxHashMap<String, Handle>,
    pub current_animation: Option<Handle>,
}

impl<V> StateMachine<V> {
    pub fn new(owner: Option<V>) -> Self {
        StateMachine {
            owner,
            states: FxHashMap::default(),
            transitions: FxHashMap::default(),
            initial: None,
            current: None,
            previous: None,
            time_in_state: 0.0,
            initialized: false,
            sprite: None,
            animation_cache: FxHashMap::default(),
            current_animation: None,
        }
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn transition(&self, from: &str, event: &str) -> Option<&TransitionDefinition<V>> {
        self.transitions.get(from)?.get(event)
    }

    pub fn current_state(&self) -> Option<&StateDefinition<V>> {
        self.states.get(self.current.as_deref()?)
    }

    /// Waiting for the lazy first entry on the next update.
    pub fn needs_init(&self) -> bool {
        !self.initialized && self.initial.as_deref().is_some_and(|s| self.has_state(s))
    }

    /// Every host value the machine holds: owner, state callbacks, guards.
    pub(crate) fn values(&self) -> Vec<&V> {
        let mut out: Vec<&V> = self.owner.iter().collect();
        for state in self.states.values() {
            out.extend(state.values());
        }
        for edges in self.transitions.values() {
            out.extend(edges.values().filter_map(|t| t.guard.as_ref()));
        }
        out
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        let mut states: Vec<String> = self.states.keys().cloned().collect();
        states.sort();
        MachineSnapshot {
            current: self.current.clone(),
            previous: self.previous.clone(),
            initial: self.initial.clone(),
            initialized: self.initialized,
            time_in_state: self.time_in_state,
            states,
            sprite: self.sprite,
            current_animation: self.current_animation,
        }
    }
}

/// Input-driven transition registered on a machine.
#[derive(Clone, Debug)]
pub struct InputBinding<V> {
    pub machine: Handle,
    pub action: String,
    pub phase: InputPhase,
    /// Only match while the machine is in this state.
    pub from_state: Option<String>,
    pub target: String,
    pub guard: Option<V>,
    /// Skip the guard.
    pub forced: bool,
}

impl<V> InputBinding<V> {
    pub fn new(
        machine: Handle,
        action: impl Into<String>,
        phase: InputPhase,
        target: impl Into<String>,
    ) -> Self {
        InputBinding {
            machine,
            action: action.into(),
            phase,
            from_state: None,
            target: target.into(),
            guard: None,
            forced: false,
        }
    }
    pub fn with_from_state(mut self, state: impl Into<String>) -> Self {
        self.from_state = Some(state.into());
        self
    }
    pub fn with_guard(mut self, guard: V) -> Self {
        self.guard = Some(guard);
        self
    }
    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    pub fn matches(&self, action: &str, phase: InputPhase, current: Option<&str>) -> bool {
        self.action == action
            && self.phase == phase
            && self
                .from_state
                .as_deref()
                .is_none_or(|from| current == Some(from))
    }
}

/// Read-only copy of a machine's state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MachineSnapshot {
    pub current: Option<String>,
    pub previous: Option<String>,
    pub initial: Option<String>,
    pub initialized: bool,
    pub time_in_state: f32,
    /// Defined state names, sorted.
    pub states: Vec<String>,
    pub sprite: Option<Handle>,
    pub current_animation: Option<Handle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine<u32> {
        let mut m = StateMachine::new(Some(1));
        m.states.insert(
            "idle".into(),
            StateDefinition::new().with_on_enter(2).with_animation("idle"),
        );
        m.states
            .insert("run".into(), StateDefinition::new().with_on_update(3));
        m.transitions.entry("idle".into()).or_default().insert(
            "go".into(),
            TransitionDefinition {
                target: "run".into(),
                guard: Some(4),
            },
        );
        m
    }

    #[test]
    fn test_transition_lookup() {
        let m = machine();
        assert_eq!(m.transition("idle", "go").unwrap().target, "run");
        assert!(m.transition("idle", "stop").is_none());
        assert!(m.transition("run", "go").is_none());
    }

    #[test]
    fn test_needs_init_requires_defined_initial() {
        let mut m = machine();
        assert!(!m.needs_init());
        m.initial = Some("nowhere".into());
        assert!(!m.needs_init());
        m.initial = Some("idle".into());
        assert!(m.needs_init());
        m.initialized = true;
        assert!(!m.needs_init());
    }

    #[test]
    fn test_values_lists_every_held_value() {
        let mut values: Vec<u32> = machine().values().into_iter().copied().collect();
        values.sort();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_snapshot_sorts_states() {
        let snap = machine().snapshot();
        assert_eq!(snap.states, vec!["idle".to_string(), "run".to_string()]);
        assert!(snap.current.is_none());
        assert!(!snap.initialized);
    }

    #[test]
    fn test_binding_matches() {
        let b: InputBinding<u32> = InputBinding::new(Handle::from_raw(1), "jump", InputPhase::Pressed, "air")
            .with_from_state("ground");
        assert!(b.matches("jump", InputPhase::Pressed, Some("ground")));
        assert!(!b.matches("jump", InputPhase::Pressed, Some("air")));
        assert!(!b.matches("jump", InputPhase::Pressed, None));
        assert!(!b.matches("jump", InputPhase::Held, Some("ground")));
        let any: InputBinding<u32> = InputBinding::new(Handle::from_raw(1), "jump", InputPhase::Pressed, "air");
        assert!(any.matches("jump", InputPhase::Pressed, None));
    }
}
