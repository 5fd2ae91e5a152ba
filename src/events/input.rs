//! Input action events.
//!
//! Input resolution turns raw per-action down/up states into
//! [`InputActionEvent`]s, one per action per frame while anything changes or
//! is held. They travel through the [`EventBus`](crate::resources::eventbus::EventBus)
//! under the `"input_action"` type tag, where the state-machine engine picks
//! them up for input-bound transitions.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of an action within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPhase {
    /// Went down this frame.
    Pressed,
    /// Still down after the frame it was pressed.
    Held,
    /// Went up this frame.
    Released,
}

impl InputPhase {
    pub fn name(self) -> &'static str {
        match self {
            InputPhase::Pressed => "pressed",
            InputPhase::Held => "held",
            InputPhase::Released => "released",
        }
    }

    pub fn from_name(name: &str) -> Option<InputPhase> {
        match name {
            "pressed" => Some(InputPhase::Pressed),
            "held" => Some(InputPhase::Held),
            "released" => Some(InputPhase::Released),
            _ => None,
        }
    }
}

/// Event emitted when a named action changes phase or is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputActionEvent {
    /// Action name, as bound by scripts (`"jump"`, `"left"`).
    pub action: String,
    pub phase: InputPhase,
}

impl InputActionEvent {
    pub fn new(action: impl Into<String>, phase: InputPhase) -> Self {
        InputActionEvent {
            action: action.into(),
            phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_round_trip() {
        for phase in [InputPhase::Pressed, InputPhase::Held, InputPhase::Released] {
            assert_eq!(InputPhase::from_name(phase.name()), Some(phase));
        }
        assert_eq!(InputPhase::from_name("tapped"), None);
    }

    #[test]
    fn test_event_serializes_snake_case_phase() {
        let json = serde_json::to_string(&InputActionEvent::new("jump", InputPhase::Pressed))
            .unwrap();
        assert_eq!(json, r#"{"action":"jump","phase":"pressed"}"#);
    }
}
