//! State-machine update system.
//!
//! Runs after the animation coordinator, so animations started by
//! input-driven transitions during dispatch have already advanced once by
//! the time lazily initialized machines enter their first state.
use bevy_ecs::prelude::*;

use crate::resources::scripthost::ScriptHost;
use crate::resources::worldtime::WorldTime;
use crate::runtime::CoreEngines;

pub fn state_machine_update_system<H: ScriptHost>(
    time: Res<WorldTime>,
    engines: NonSend<CoreEngines<H>>,
) {
    engines.machines.update(time.delta);
}
