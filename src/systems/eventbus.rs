//! Event dispatch system.
use bevy_ecs::prelude::*;
use log::trace;

use crate::resources::scripthost::ScriptHost;
use crate::runtime::CoreEngines;

/// Deliver everything published since the previous frame's dispatch.
pub fn event_dispatch_system<H: ScriptHost>(engines: NonSend<CoreEngines<H>>) {
    let delivered = engines.bus.dispatch();
    if delivered > 0 {
        trace!("Delivered {} events", delivered);
    }
}
