//! Per-frame action input resource.
//!
//! The embedding host reports raw down/up state for named actions
//! (`press`, `release`, `set_down`). Once per frame
//! [`InputState::resolve`] derives the [`BoolState`] of every action and the
//! [`InputActionEvent`]s the input system publishes. A press and release
//! that both land between two resolves still produce a `Pressed` phase,
//! followed by `Released` on the next frame.
use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use smallvec::SmallVec;

use crate::events::input::{InputActionEvent, InputPhase};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Boolean action state as of the last resolve.
pub struct BoolState {
    /// Whether the action is currently active/pressed this frame.
    pub active: bool,
    /// Whether the action was just pressed this frame.
    pub just_pressed: bool,
    /// Whether the action was just released this frame.
    pub just_released: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct ActionState {
    raw: bool,
    /// Set by `press`, cleared by `resolve`, so taps are never lost.
    latched: bool,
    state: BoolState,
}

/// Resource capturing the per-frame state of named input actions.
///
/// Actions are kept in name order, which is also the order events are
/// produced in.
#[derive(Resource, Debug, Clone, Default)]
pub struct InputState {
    actions: BTreeMap<String, ActionState>,
}

impl InputState {
    pub fn press(&mut self, action: &str) {
        let entry = self.actions.entry(action.to_string()).or_default();
        entry.raw = true;
        entry.latched = true;
    }

    pub fn release(&mut self, action: &str) {
        if let Some(entry) = self.actions.get_mut(action) {
            entry.raw = false;
        }
    }

    pub fn set_down(&mut self, action: &str, down: bool) {
        if down {
            self.press(action);
        } else {
            self.release(action);
        }
    }

    pub fn state(&self, action: &str) -> BoolState {
        self.actions
            .get(action)
            .map(|a| a.state)
            .unwrap_or_default()
    }

    pub fn is_active(&self, action: &str) -> bool {
        self.state(action).active
    }

    pub fn just_pressed(&self, action: &str) -> bool {
        self.state(action).just_pressed
    }

    pub fn just_released(&self, action: &str) -> bool {
        self.state(action).just_released
    }

    /// Advance every action one frame and report its phase.
    ///
    /// Emits `Pressed` on the frame an action goes down, `Held` on every
    /// later frame it stays down, and `Released` on the frame it goes up.
    /// An action is forgotten one resolve after its `Released` frame.
    pub fn resolve(&mut self) -> SmallVec<[InputActionEvent; 8]> {
        let mut events = SmallVec::new();
        for (name, action) in self.actions.iter_mut() {
            let down = action.raw || action.latched;
            let was = action.state.active;
            action.latched = false;
            action.state = BoolState {
                active: down,
                just_pressed: down && !was,
                just_released: !down && was,
            };
            let phase = match (was, down) {
                (false, true) => Some(InputPhase::Pressed),
                (true, true) => Some(InputPhase::Held),
                (true, false) => Some(InputPhase::Released),
                (false, false) => None,
            };
            if let Some(phase) = phase {
                events.push(InputActionEvent::new(name.as_str(), phase));
            }
        }
        // Idle actions read the same as unknown ones.
        self.actions
            .retain(|_, a| a.raw || a.latched || a.state != BoolState::default());
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases(events: &[InputActionEvent]) -> Vec<(&str, InputPhase)> {
        events.iter().map(|e| (e.action.as_str(), e.phase)).collect()
    }

    #[test]
    fn test_press_hold_release_cycle() {
        let mut input = InputState::default();
        input.press("jump");
        assert_eq!(phases(&input.resolve()), vec![("jump", InputPhase::Pressed)]);
        assert!(input.just_pressed("jump") && input.is_active("jump"));
        assert_eq!(phases(&input.resolve()), vec![("jump", InputPhase::Held)]);
        assert!(!input.just_pressed("jump"));
        input.release("jump");
        assert_eq!(phases(&input.resolve()), vec![("jump", InputPhase::Released)]);
        assert!(input.just_released("jump"));
        assert!(input.resolve().is_empty());
        assert!(!input.just_released("jump"));
    }

    #[test]
    fn test_tap_between_frames_is_seen() {
        let mut input = InputState::default();
        input.press("fire");
        input.release("fire");
        assert_eq!(phases(&input.resolve()), vec![("fire", InputPhase::Pressed)]);
        assert_eq!(phases(&input.resolve()), vec![("fire", InputPhase::Released)]);
    }

    #[test]
    fn test_events_in_name_order() {
        let mut input = InputState::default();
        input.set_down("right", true);
        input.set_down("jump", true);
        let events = input.resolve();
        assert_eq!(events[0].action, "jump");
        assert_eq!(events[1].action, "right");
    }

    #[test]
    fn test_released_actions_are_forgotten() {
        let mut input = InputState::default();
        for name in ["a", "b", "c"] {
            input.press(name);
        }
        input.resolve();
        input.release("a");
        input.release("b");
        input.resolve();
        assert_eq!(input.actions.len(), 3, "released frame still reports");
        assert!(input.just_released("a"));
        input.resolve();
        assert_eq!(input.actions.keys().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(input.state("a"), BoolState::default());
        input.press("a");
        assert_eq!(phases(&input.resolve()), vec![("a", InputPhase::Pressed), ("c", InputPhase::Held)]);
    }

    #[test]
    fn test_unknown_action_is_inactive() {
        let mut input = InputState::default();
        input.release("ghost");
        assert_eq!(input.state("ghost"), BoolState::default());
        assert!(input.resolve().is_empty());
    }
}
