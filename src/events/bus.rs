//! Event payloads carried by the [`EventBus`](crate::resources::eventbus::EventBus).
//!
//! Every event has a string type tag used for subscription matching and a
//! flat argument list handed to script subscribers.

use smallvec::{SmallVec, smallvec};

use crate::events::input::{InputActionEvent, InputPhase};
use crate::resources::scripthost::ScriptArg;

/// Type tag of [`Event::InputAction`].
pub const INPUT_ACTION_EVENT: &str = "input_action";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    InputAction(InputActionEvent),
    /// Script- or game-defined event.
    Custom {
        name: String,
        payload: Vec<ScriptArg>,
    },
}

impl Event {
    pub fn custom(name: impl Into<String>, payload: Vec<ScriptArg>) -> Self {
        Event::Custom {
            name: name.into(),
            payload,
        }
    }

    /// Build an event from a script `publish(type, ...)` call.
    ///
    /// `"input_action"` with a string action and a known phase name becomes
    /// a real [`Event::InputAction`]; anything else stays custom.
    pub fn from_script(name: &str, payload: Vec<ScriptArg>) -> Self {
        if name == INPUT_ACTION_EVENT
            && let [action, phase, ..] = payload.as_slice()
            && let (Some(action), Some(phase)) =
                (action.as_str(), phase.as_str().and_then(InputPhase::from_name))
        {
            return Event::InputAction(InputActionEvent::new(action, phase));
        }
        Event::custom(name, payload)
    }

    pub fn event_type(&self) -> &str {
        match self {
            Event::InputAction(_) => INPUT_ACTION_EVENT,
            Event::Custom { name, .. } => name,
        }
    }

    /// Arguments passed to script subscribers, after the optional context.
    pub fn args(&self) -> SmallVec<[ScriptArg; 4]> {
        match self {
            Event::InputAction(e) => smallvec![
                ScriptArg::from(e.action.as_str()),
                ScriptArg::from(e.phase.name())
            ],
            Event::Custom { payload, .. } => payload.iter().cloned().collect(),
        }
    }
}

impl From<InputActionEvent> for Event {
    fn from(e: InputActionEvent) -> Self {
        Event::InputAction(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_action_from_script() {
        let e = Event::from_script("input_action", vec!["jump".into(), "pressed".into()]);
        assert_eq!(
            e,
            Event::InputAction(InputActionEvent::new("jump", InputPhase::Pressed))
        );
        assert_eq!(e.event_type(), INPUT_ACTION_EVENT);
        assert_eq!(e.args().as_slice(), &[ScriptArg::from("jump"), ScriptArg::from("pressed")]);
    }

    #[test]
    fn test_malformed_input_action_stays_custom() {
        let e = Event::from_script("input_action", vec!["jump".into(), "wiggle".into()]);
        assert!(matches!(e, Event::Custom { .. }));
        assert_eq!(e.event_type(), INPUT_ACTION_EVENT);
        let e = Event::from_script("input_action", vec![]);
        assert!(matches!(e, Event::Custom { .. }));
    }

    #[test]
    fn test_custom_event_args() {
        let e = Event::from_script("score", vec![ScriptArg::Integer(10), ScriptArg::Bool(true)]);
        assert_eq!(e.event_type(), "score");
        assert_eq!(e.args().len(), 2);
    }
}
