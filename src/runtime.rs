//! Frame runtime.
//!
//! [`Runtime`] owns a bevy_ecs [`World`] holding the time, input and config
//! resources plus the engines (as a non-send resource, since they share
//! `Rc`s with the script host), and a [`Schedule`] that runs one frame:
//!
//! 1. `input_resolution_system` publishes this frame's action events;
//! 2. `event_dispatch_system` delivers them (input-bound transitions fire here);
//! 3. `animation_update_system` advances tweens and sprite animations;
//! 4. `state_machine_update_system` enters pending initial states and runs
//!    `on_update`.

use std::rc::{Rc, Weak};

use bevy_ecs::prelude::*;
use log::info;
use serde::Serialize;

use crate::resources::animationcoordinator::AnimationCoordinator;
use crate::resources::coreconfig::CoreConfig;
use crate::resources::eventbus::EventBus;
use crate::resources::input::InputState;
use crate::resources::scripthost::ScriptHost;
use crate::resources::statemachines::StateMachineEngine;
use crate::resources::worldtime::WorldTime;
use crate::systems::animation::animation_update_system;
use crate::systems::eventbus::event_dispatch_system;
use crate::systems::input::input_resolution_system;
use crate::systems::statemachine::state_machine_update_system;
use crate::systems::time::update_world_time;

/// The engines of one runtime, sharing one script host.
pub struct CoreEngines<H: ScriptHost> {
    pub host: Rc<H>,
    pub animations: Rc<AnimationCoordinator<H>>,
    pub machines: Rc<StateMachineEngine<H>>,
    pub bus: Rc<EventBus<H>>,
}

impl<H: ScriptHost> Clone for CoreEngines<H> {
    fn clone(&self) -> Self {
        CoreEngines {
            host: self.host.clone(),
            animations: self.animations.clone(),
            machines: self.machines.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<H: ScriptHost> CoreEngines<H> {
    /// Build the engines and subscribe the state machines to input events.
    pub fn new(host: Rc<H>, strict_transitions: bool) -> Self {
        let animations = Rc::new(AnimationCoordinator::new(host.clone()));
        let machines = Rc::new(StateMachineEngine::new(host.clone(), animations.clone()));
        let bus = Rc::new(EventBus::new(host.clone()));
        machines.set_strict(strict_transitions);
        machines.attach_input(&bus);
        CoreEngines {
            host,
            animations,
            machines,
            bus,
        }
    }

    /// Empty every engine for a script reload. Handles issued before the
    /// reload never resolve afterwards.
    pub fn clear(&self) {
        self.machines.clear();
        self.animations.clear();
        self.bus.clear();
        self.machines.attach_input(&self.bus);
        info!("Cleared core engines");
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            tweens: self.animations.tween_count(),
            animations: self.animations.animation_count(),
            sprites: self.animations.sprite_count(),
            machines: self.machines.machine_count(),
            input_bindings: self.machines.binding_count(),
            subscriptions: self.bus.subscription_count(),
            pending_events: self.bus.pending(),
            pinned: self.host.pinned_count(),
        }
    }

    /// Non-owning copy, for closures stored inside the script host.
    pub fn downgrade(&self) -> WeakEngines<H> {
        WeakEngines {
            host: Rc::downgrade(&self.host),
            animations: Rc::downgrade(&self.animations),
            machines: Rc::downgrade(&self.machines),
            bus: Rc::downgrade(&self.bus),
        }
    }
}

pub struct WeakEngines<H: ScriptHost> {
    host: Weak<H>,
    animations: Weak<AnimationCoordinator<H>>,
    machines: Weak<StateMachineEngine<H>>,
    bus: Weak<EventBus<H>>,
}

impl<H: ScriptHost> Clone for WeakEngines<H> {
    fn clone(&self) -> Self {
        WeakEngines {
            host: self.host.clone(),
            animations: self.animations.clone(),
            machines: self.machines.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<H: ScriptHost> WeakEngines<H> {
    pub fn upgrade(&self) -> Option<CoreEngines<H>> {
        Some(CoreEngines {
            host: self.host.upgrade()?,
            animations: self.animations.upgrade()?,
            machines: self.machines.upgrade()?,
            bus: self.bus.upgrade()?,
        })
    }
}

/// Table sizes and pinned-value count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoreStats {
    pub tweens: usize,
    pub animations: usize,
    pub sprites: usize,
    pub machines: usize,
    pub input_bindings: usize,
    pub subscriptions: usize,
    pub pending_events: usize,
    pub pinned: usize,
}

pub struct Runtime<H: ScriptHost> {
    world: World,
    schedule: Schedule,
    engines: CoreEngines<H>,
}

impl<H: ScriptHost> Runtime<H> {
    pub fn new(host: Rc<H>, config: CoreConfig) -> Self {
        let engines = CoreEngines::new(host, config.strict_transitions);

        let mut world = World::new();
        world.insert_resource(WorldTime::default().with_time_scale(config.time_scale));
        world.insert_resource(InputState::default());
        world.insert_resource(config);
        world.insert_non_send_resource(engines.clone());

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                input_resolution_system::<H>,
                event_dispatch_system::<H>,
                animation_update_system::<H>,
                state_machine_update_system::<H>,
            )
                .chain(),
        );

        Runtime {
            world,
            schedule,
            engines,
        }
    }

    /// Run one frame of `dt` unscaled seconds.
    pub fn tick(&mut self, dt: f32) {
        update_world_time(&mut self.world, dt);
        self.schedule.run(&mut self.world);
        self.world.clear_trackers();
    }

    pub fn engines(&self) -> &CoreEngines<H> {
        &self.engines
    }

    /// Raw action input for the next tick.
    pub fn input_mut(&mut self) -> Mut<'_, InputState> {
        self.world.resource_mut::<InputState>()
    }

    pub fn world_time(&self) -> WorldTime {
        *self.world.resource::<WorldTime>()
    }

    pub fn config(&self) -> &CoreConfig {
        self.world.resource::<CoreConfig>()
    }

    /// Hot-reload entry: see [`CoreEngines::clear`].
    pub fn clear(&mut self) {
        self.engines.clear();
    }

    pub fn stats(&self) -> CoreStats {
        self.engines.stats()
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}
