//! Input resolution system.
//!
//! Resolves [`InputState`] for the frame and publishes one
//! [`InputActionEvent`](crate::events::input::InputActionEvent) per active
//! or changing action to the event bus. Dispatch happens in the next system
//! of the chain.
use bevy_ecs::prelude::*;

use crate::resources::input::InputState;
use crate::resources::scripthost::ScriptHost;
use crate::runtime::CoreEngines;

pub fn input_resolution_system<H: ScriptHost>(
    mut input: ResMut<InputState>,
    engines: NonSend<CoreEngines<H>>,
) {
    for event in input.resolve() {
        engines.bus.publish(event.into());
    }
}
