//! State-machine engine.
//!
//! Owns every [`StateMachine`] and every [`InputBinding`], resolves triggers
//! and forced state changes into exit/enter callbacks, and plays the
//! animation each state names through the shared
//! [`AnimationCoordinator`].
//!
//! # Transition protocol
//!
//! [`perform_transition`](StateMachineEngine::set_state) runs, in order:
//!
//! 1. the current state's `on_exit(handle, target)`;
//! 2. stop the machine's current animation;
//! 3. commit `previous`/`current`, reset `time_in_state`;
//! 4. resolve, bind and play the target state's animation;
//! 5. the target state's `on_enter(handle, previous)`.
//!
//! Any callback may destroy or reconfigure the machine, so the machine is
//! looked up again by handle after every step. A missing machine aborts the
//! rest of the protocol without error.
//!
//! # Silent no-ops
//!
//! Unknown handles, events without a transition, undefined states and false
//! guards are all ignored without logging. With strict transitions enabled
//! they are reported at `warn` level instead; behavior does not change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::{debug, error, warn};
use smallvec::SmallVec;

use crate::components::statemachine::{
    InputBinding, MachineSnapshot, StateDefinition, StateMachine, TransitionDefinition,
};
use crate::events::bus::{Event, INPUT_ACTION_EVENT};
use crate::events::input::InputActionEvent;
use crate::resources::animationcoordinator::AnimationCoordinator;
use crate::resources::eventbus::EventBus;
use crate::resources::handletable::{Handle, HandleTable};
use crate::resources::scripthost::{
    PassGuard, ScriptArg, ScriptHost, invoke_logged, pin_opt, unpin_opt,
};
use crate::systems::time::sanitize_dt;

pub struct StateMachineEngine<H: ScriptHost> {
    host: Rc<H>,
    animations: Rc<AnimationCoordinator<H>>,
    machines: RefCell<HandleTable<StateMachine<H::Value>>>,
    bindings: RefCell<HandleTable<InputBinding<H::Value>>>,
    input_subscription: Cell<Option<Handle>>,
    strict: Cell<bool>,
    updating: Cell<bool>,
}

/// What one machine does during an update pass.
enum UpdateStep<V> {
    Enter(String),
    Tick {
        callback: V,
        owner: Option<V>,
        time_in_state: f32,
    },
    Skip,
}

impl<H: ScriptHost> StateMachineEngine<H> {
    pub fn new(host: Rc<H>, animations: Rc<AnimationCoordinator<H>>) -> Self {
        StateMachineEngine {
            host,
            animations,
            machines: RefCell::new(HandleTable::new()),
            bindings: RefCell::new(HandleTable::new()),
            input_subscription: Cell::new(None),
            strict: Cell::new(false),
            updating: Cell::new(false),
        }
    }

    /// Report ignored triggers and state changes at `warn` level.
    pub fn set_strict(&self, strict: bool) {
        self.strict.set(strict);
    }

    pub fn is_strict(&self) -> bool {
        self.strict.get()
    }

    fn ignored(&self, what: fmt::Arguments<'_>) {
        if self.strict.get() {
            warn!("Ignored {}", what);
        }
    }

    // ==================== DEFINITION ====================

    /// Create an empty machine. `owner` is the context every callback and
    /// guard runs with.
    pub fn create(&self, owner: Option<H::Value>) -> Handle {
        pin_opt(&*self.host, owner.as_ref());
        let handle = self.machines.borrow_mut().insert(StateMachine::new(owner));
        debug!("Created state machine {}", handle);
        handle
    }

    /// Remove a machine, stop its animation and drop its input bindings.
    pub fn destroy(&self, handle: Handle) -> bool {
        let removed = self.machines.borrow_mut().remove(handle);
        let Some(machine) = removed else {
            return false;
        };
        if let Some(anim) = machine.current_animation {
            self.animations.stop_animation(anim);
        }
        let bindings = self
            .bindings
            .borrow_mut()
            .remove_where(|b| b.machine == handle);
        for (_, binding) in &bindings {
            unpin_opt(&*self.host, binding.guard.as_ref());
        }
        for value in machine.values() {
            self.host.unpin(value);
        }
        debug!("Destroyed state machine {}", handle);
        true
    }

    /// Define (or redefine) a state.
    pub fn add_state(
        &self,
        handle: Handle,
        name: impl Into<String>,
        definition: StateDefinition<H::Value>,
    ) -> bool {
        if !self.machines.borrow().contains(handle) {
            return false;
        }
        // Pinning may run host code, so no table borrow is held across it.
        for value in definition.values() {
            self.host.pin(value);
        }
        let replaced = match self.machines.borrow_mut().get_mut(handle) {
            Some(machine) => machine.states.insert(name.into(), definition),
            None => Some(definition),
        };
        if let Some(old) = replaced {
            for value in old.values() {
                self.host.unpin(value);
            }
        }
        true
    }

    /// Add the edge `from --event--> to`, replacing any edge with the same
    /// `(from, event)`.
    pub fn add_transition(
        &self,
        handle: Handle,
        from: impl Into<String>,
        event: impl Into<String>,
        to: impl Into<String>,
        guard: Option<H::Value>,
    ) -> bool {
        if !self.machines.borrow().contains(handle) {
            return false;
        }
        pin_opt(&*self.host, guard.as_ref());
        let edge = TransitionDefinition {
            target: to.into(),
            guard,
        };
        let replaced = match self.machines.borrow_mut().get_mut(handle) {
            Some(machine) => machine
                .transitions
                .entry(from.into())
                .or_default()
                .insert(event.into(), edge),
            None => Some(edge),
        };
        if let Some(old) = replaced {
            unpin_opt(&*self.host, old.guard.as_ref());
        }
        true
    }

    /// State entered on the first update after this call.
    pub fn set_initial(&self, handle: Handle, state: impl Into<String>) -> bool {
        match self.machines.borrow_mut().get_mut(handle) {
            Some(machine) => {
                machine.initial = Some(state.into());
                true
            }
            None => false,
        }
    }

    /// Pre-seed the animation a state name resolves to.
    pub fn register_animation(
        &self,
        handle: Handle,
        name: impl Into<String>,
        animation: Handle,
    ) -> bool {
        match self.machines.borrow_mut().get_mut(handle) {
            Some(machine) => {
                machine.animation_cache.insert(name.into(), animation);
                true
            }
            None => false,
        }
    }

    /// Bind a sprite to every animation this machine plays, including the
    /// current one.
    pub fn bind_sprite(&self, handle: Handle, sprite: Handle) -> bool {
        let current = {
            let mut machines = self.machines.borrow_mut();
            let Some(machine) = machines.get_mut(handle) else {
                return false;
            };
            machine.sprite = Some(sprite);
            machine.current_animation
        };
        if let Some(anim) = current {
            self.animations.bind_sprite(anim, sprite);
        }
        true
    }

    // ==================== TRANSITIONS ====================

    /// Follow the transition for `(current state, event)`.
    ///
    /// Returns true when the transition happened. Missing transitions,
    /// uninitialized machines and false or failing guards return false.
    pub fn trigger(&self, handle: Handle, event: &str) -> bool {
        let (target, guard, owner) = {
            let machines = self.machines.borrow();
            let Some(machine) = machines.get(handle) else {
                self.ignored(format_args!("trigger '{}' on unknown machine {}", event, handle));
                return false;
            };
            let Some(current) = machine.current.as_deref().filter(|_| machine.initialized) else {
                self.ignored(format_args!("trigger '{}' on uninitialized machine {}", event, handle));
                return false;
            };
            let Some(transition) = machine.transition(current, event) else {
                let current = current.to_string();
                self.ignored(format_args!(
                    "trigger '{}' on {}: no transition from '{}'",
                    event, handle, current
                ));
                return false;
            };
            (
                transition.target.clone(),
                transition.guard.clone(),
                machine.owner.clone(),
            )
        };

        if let Some(guard) = guard
            && !self.guard_allows(handle, &guard, owner.as_ref(), &[handle.into(), event.into()])
        {
            self.ignored(format_args!("trigger '{}' on {}: guard refused", event, handle));
            return false;
        }
        self.perform_transition(handle, &target)
    }

    /// Evaluate a guard. Errors count as a refusal.
    fn guard_allows(
        &self,
        handle: Handle,
        guard: &H::Value,
        owner: Option<&H::Value>,
        args: &[ScriptArg],
    ) -> bool {
        match self.host.invoke(guard, owner, args) {
            Ok(result) => result.is_truthy(),
            Err(e) => {
                error!(target: "script", "Error in transition guard of {}: {}", handle, e);
                false
            }
        }
    }

    /// Forced transition: no event, no guard. Entering the current state
    /// again runs exit and enter. An uninitialized machine is initialized.
    pub fn set_state(&self, handle: Handle, state: &str) -> bool {
        self.perform_transition(handle, state)
    }

    fn perform_transition(&self, handle: Handle, target: &str) -> bool {
        // (a) exit
        let (on_exit, owner) = {
            let machines = self.machines.borrow();
            let Some(machine) = machines.get(handle) else {
                self.ignored(format_args!("state change on unknown machine {}", handle));
                return false;
            };
            if !machine.has_state(target) {
                self.ignored(format_args!("state change on {} to undefined '{}'", handle, target));
                return false;
            }
            let on_exit = if machine.initialized {
                machine.current_state().and_then(|s| s.on_exit.clone())
            } else {
                None
            };
            (on_exit, machine.owner.clone())
        };
        if let Some(cb) = on_exit {
            invoke_logged(
                &*self.host,
                "state on_exit",
                &cb,
                owner.as_ref(),
                &[handle.into(), target.into()],
            );
        }

        // (b) stop the current animation
        let stopped = {
            let mut machines = self.machines.borrow_mut();
            let Some(machine) = machines.get_mut(handle) else {
                return false;
            };
            machine.current_animation.take()
        };
        if let Some(anim) = stopped {
            self.animations.stop_animation(anim);
        }

        // (c) commit
        let (animation, sprite, owner, previous) = {
            let mut machines = self.machines.borrow_mut();
            let Some(machine) = machines.get_mut(handle) else {
                return false;
            };
            if !machine.has_state(target) {
                return false;
            }
            machine.previous = machine.current.replace(target.to_string());
            machine.time_in_state = 0.0;
            machine.initialized = true;
            (
                machine.states.get(target).and_then(|s| s.animation.clone()),
                machine.sprite,
                machine.owner.clone(),
                machine.previous.clone(),
            )
        };
        debug!(
            "State machine {}: {} -> {}",
            handle,
            previous.as_deref().unwrap_or("<none>"),
            target
        );

        // (d) animation
        if let Some(name) = animation
            && !self.play_state_animation(handle, &name, sprite, owner.as_ref())
        {
            return true;
        }

        // (e) enter
        let on_enter = self
            .machines
            .borrow()
            .get(handle)
            .and_then(|m| m.states.get(target))
            .and_then(|s| s.on_enter.clone());
        if let Some(cb) = on_enter {
            invoke_logged(
                &*self.host,
                "state on_enter",
                &cb,
                owner.as_ref(),
                &[handle.into(), previous.into()],
            );
        }
        true
    }

    /// Resolve the named animation and start it for `handle`.
    ///
    /// Returns false when the machine disappeared along the way.
    fn play_state_animation(
        &self,
        handle: Handle,
        name: &str,
        sprite: Option<Handle>,
        owner: Option<&H::Value>,
    ) -> bool {
        let cached = {
            let machines = self.machines.borrow();
            let Some(machine) = machines.get(handle) else {
                return false;
            };
            machine.animation_cache.get(name).copied()
        };
        let resolved = cached
            .filter(|a| self.animations.has_animation(*a))
            .or_else(|| {
                owner
                    .and_then(|o| self.host.resolve_animation(o, name))
                    .filter(|a| self.animations.has_animation(*a))
            });
        let Some(anim) = resolved else {
            self.ignored(format_args!("animation '{}' for {}: not found", name, handle));
            return true;
        };

        {
            let mut machines = self.machines.borrow_mut();
            let Some(machine) = machines.get_mut(handle) else {
                return false;
            };
            machine.animation_cache.insert(name.to_string(), anim);
            machine.current_animation = Some(anim);
        }
        if let Some(sprite) = sprite {
            self.animations.bind_sprite(anim, sprite);
        }
        self.animations.play_animation(anim);
        true
    }

    // ==================== INPUT ====================

    /// Register an input-driven transition. Returns `None` when the machine
    /// does not exist.
    pub fn bind_input(&self, binding: InputBinding<H::Value>) -> Option<Handle> {
        if !self.machines.borrow().contains(binding.machine) {
            return None;
        }
        pin_opt(&*self.host, binding.guard.as_ref());
        Some(self.bindings.borrow_mut().insert(binding))
    }

    pub fn unbind_input(&self, handle: Handle) -> bool {
        let removed = self.bindings.borrow_mut().remove(handle);
        match removed {
            Some(binding) => {
                unpin_opt(&*self.host, binding.guard.as_ref());
                true
            }
            None => false,
        }
    }

    /// Subscribe to input action events on `bus`, replacing any earlier
    /// subscription made by this engine.
    pub fn attach_input(self: &Rc<Self>, bus: &EventBus<H>) {
        if let Some(old) = self.input_subscription.take() {
            bus.unsubscribe(old);
        }
        let weak = Rc::downgrade(self);
        let subscription = bus.subscribe_native(INPUT_ACTION_EVENT, move |event| {
            if let (Some(engine), Event::InputAction(action)) = (weak.upgrade(), event) {
                engine.handle_input(action);
            }
        });
        self.input_subscription.set(Some(subscription));
    }

    /// Apply every binding matching `event` and the bound machine's current
    /// state. Returns how many state changes happened.
    pub fn handle_input(&self, event: &InputActionEvent) -> usize {
        let candidates: SmallVec<[Handle; 8]> = self
            .bindings
            .borrow()
            .iter()
            .filter(|(_, b)| b.action == event.action && b.phase == event.phase)
            .map(|(h, _)| h)
            .collect();

        let mut changed = 0;
        for binding_handle in candidates {
            let Some(binding) = self.bindings.borrow().get(binding_handle).cloned() else {
                continue;
            };
            let owner = {
                let machines = self.machines.borrow();
                let Some(machine) = machines.get(binding.machine) else {
                    continue;
                };
                if !binding.matches(&event.action, event.phase, machine.current.as_deref()) {
                    continue;
                }
                machine.owner.clone()
            };
            if !binding.forced
                && let Some(guard) = &binding.guard
                && !self.guard_allows(
                    binding.machine,
                    guard,
                    owner.as_ref(),
                    &[
                        binding.machine.into(),
                        event.action.as_str().into(),
                        event.phase.name().into(),
                    ],
                )
            {
                continue;
            }
            if self.set_state(binding.machine, &binding.target) {
                changed += 1;
            }
        }
        changed
    }

    // ==================== UPDATE ====================

    /// Enter pending initial states, then run `on_update` for every
    /// initialized machine.
    ///
    /// Machines created during this call are first entered on the next one.
    pub fn update(&self, dt: f32) {
        let Some(_guard) = PassGuard::enter(&self.updating) else {
            warn!("StateMachineEngine::update called from inside an update; ignored");
            return;
        };
        let dt = sanitize_dt(dt);

        let handles = self.machines.borrow().handles();
        for handle in handles {
            let step = {
                let mut machines = self.machines.borrow_mut();
                match machines.get_mut(handle) {
                    Some(m) if m.needs_init() => match m.initial.clone() {
                        Some(initial) => UpdateStep::Enter(initial),
                        None => UpdateStep::Skip,
                    },
                    Some(m) if m.initialized => {
                        m.time_in_state += dt;
                        match m.current_state().and_then(|s| s.on_update.clone()) {
                            Some(callback) => UpdateStep::Tick {
                                callback,
                                owner: m.owner.clone(),
                                time_in_state: m.time_in_state,
                            },
                            None => UpdateStep::Skip,
                        }
                    }
                    _ => UpdateStep::Skip,
                }
            };

            match step {
                UpdateStep::Enter(initial) => {
                    self.perform_transition(handle, &initial);
                }
                UpdateStep::Tick {
                    callback,
                    owner,
                    time_in_state,
                } => {
                    let ret = invoke_logged(
                        &*self.host,
                        "state on_update",
                        &callback,
                        owner.as_ref(),
                        &[handle.into(), dt.into(), time_in_state.into()],
                    );
                    if let Some(ScriptArg::Str(next)) = ret {
                        let elsewhere = self
                            .machines
                            .borrow()
                            .get(handle)
                            .is_some_and(|m| m.current.as_deref() != Some(next.as_str()));
                        if elsewhere {
                            self.set_state(handle, &next);
                        }
                    }
                }
                UpdateStep::Skip => {}
            }
        }
    }

    // ==================== QUERIES ====================

    pub fn current_state(&self, handle: Handle) -> Option<String> {
        self.machines.borrow().get(handle)?.current.clone()
    }

    pub fn machine(&self, handle: Handle) -> Option<MachineSnapshot> {
        self.machines.borrow().get(handle).map(|m| m.snapshot())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.machines.borrow().contains(handle)
    }

    pub fn machine_count(&self) -> usize {
        self.machines.borrow().len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Drop every machine and binding. Animations are left to the
    /// coordinator's own `clear`. Handle counters keep running.
    pub fn clear(&self) {
        let machines = self.machines.borrow_mut().drain();
        let bindings = self.bindings.borrow_mut().drain();
        for (_, machine) in &machines {
            for value in machine.values() {
                self.host.unpin(value);
            }
        }
        for (_, binding) in &bindings {
            unpin_opt(&*self.host, binding.guard.as_ref());
        }
    }
}
