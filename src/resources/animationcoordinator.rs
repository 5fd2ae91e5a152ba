//! Animation coordinator.
//!
//! Owns the tween, sprite-animation and sprite tables and drives them once
//! per frame through [`AnimationCoordinator::update`]:
//!
//! 1. advance every tween, collecting the ones that completed;
//! 2. run tween completion callbacks;
//! 3. advance every sprite animation, collecting the ones that completed;
//! 4. run animation completion callbacks;
//! 5. sweep finished entries, unpinning their host values exactly once.
//!
//! Every method takes `&self`. Tables sit behind `RefCell`s and no borrow is
//! ever held while script code runs, so callbacks may create, cancel or
//! destroy anything, including the entry whose callback is executing. After
//! each host call the entry is looked up again by handle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};
use smallvec::SmallVec;

use crate::components::animation::{AnimationSnapshot, AnimationSpec, SpriteAnimation};
use crate::components::sprite::{SourceRect, Sprite};
use crate::components::tween::{Tween, TweenSnapshot, TweenSpec};
use crate::resources::handletable::{Handle, HandleTable};
use crate::resources::scripthost::{
    PassGuard, ScriptArg, ScriptHost, invoke_logged, pin_opt, read_property, unpin_opt,
};
use crate::systems::animation::advance_animations;
use crate::systems::time::sanitize_dt;
use crate::systems::tween::advance_tweens;

pub struct AnimationCoordinator<H: ScriptHost> {
    host: Rc<H>,
    pub(crate) tweens: RefCell<HandleTable<Tween<H::Value>>>,
    pub(crate) animations: RefCell<HandleTable<SpriteAnimation<H::Value>>>,
    pub(crate) sprites: RefCell<HandleTable<Sprite>>,
    updating: Cell<bool>,
}

impl<H: ScriptHost> AnimationCoordinator<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self {
            host,
            tweens: RefCell::new(HandleTable::new()),
            animations: RefCell::new(HandleTable::new()),
            sprites: RefCell::new(HandleTable::new()),
            updating: Cell::new(false),
        }
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    /// Advance all tweens and animations by `dt` seconds.
    ///
    /// Negative or non-finite `dt` is treated as zero. Calls made from a
    /// callback while an update is running are ignored.
    pub fn update(&self, dt: f32) {
        let Some(_guard) = PassGuard::enter(&self.updating) else {
            warn!("AnimationCoordinator::update called from inside an update; ignored");
            return;
        };
        let dt = sanitize_dt(dt);

        let finished_tweens = advance_tweens(self, dt);
        self.fire_tween_completions(&finished_tweens);

        let finished_animations = advance_animations(self, dt);
        self.fire_animation_completions(&finished_animations);

        self.sweep();
    }

    fn fire_tween_completions(&self, handles: &[Handle]) {
        for &handle in handles {
            let callback = {
                let tweens = self.tweens.borrow();
                tweens.get(handle).and_then(|t| t.on_complete.clone())
            };
            if let Some(cb) = callback {
                invoke_logged(&*self.host, "tween on_complete", &cb, None, &[handle.into()]);
            }
        }
    }

    fn fire_animation_completions(&self, handles: &[Handle]) {
        for &handle in handles {
            let callback = {
                let animations = self.animations.borrow();
                animations.get(handle).and_then(|a| a.on_complete.clone())
            };
            if let Some(cb) = callback {
                invoke_logged(&*self.host, "animation on_complete", &cb, None, &[handle.into()]);
            }
        }
    }

    /// Remove completed/cancelled tweens and completed non-looping animations.
    fn sweep(&self) {
        let dead_tweens = self.tweens.borrow_mut().remove_where(|t| t.is_finished());
        let dead_animations = self
            .animations
            .borrow_mut()
            .remove_where(|a| a.is_finished());
        if !dead_tweens.is_empty() || !dead_animations.is_empty() {
            debug!(
                "Swept {} tweens, {} animations",
                dead_tweens.len(),
                dead_animations.len()
            );
        }
        for (_, tween) in dead_tweens {
            self.release_tween(&tween);
        }
        for (_, animation) in dead_animations {
            self.release_animation(&animation);
        }
    }

    fn release_tween(&self, tween: &Tween<H::Value>) {
        self.host.unpin(&tween.target);
        unpin_opt(&*self.host, tween.on_update.as_ref());
        unpin_opt(&*self.host, tween.on_complete.as_ref());
    }

    fn release_animation(&self, animation: &SpriteAnimation<H::Value>) {
        unpin_opt(&*self.host, animation.on_frame.as_ref());
        unpin_opt(&*self.host, animation.on_complete.as_ref());
    }

    // ==================== TWEENS ====================

    /// Start animating `spec.target.spec.property`.
    ///
    /// Any running tween on the same target and property is cancelled first,
    /// so it never writes the property again. Without `from`, the start value
    /// is read from the property.
    pub fn create_tween(&self, spec: TweenSpec<H::Value>) -> Handle {
        self.cancel_tweens_for(&spec.target, Some(&spec.property));

        let start = match spec.from {
            Some(from) => from,
            None => read_property(&*self.host, &spec.target, &spec.property),
        };
        let duration = if spec.duration.is_finite() {
            spec.duration.max(0.0)
        } else {
            0.0
        };
        let delay = if spec.delay.is_finite() {
            spec.delay.max(0.0)
        } else {
            0.0
        };

        self.host.pin(&spec.target);
        pin_opt(&*self.host, spec.on_update.as_ref());
        pin_opt(&*self.host, spec.on_complete.as_ref());

        let handle = self.tweens.borrow_mut().insert(Tween {
            target: spec.target,
            property: spec.property,
            start,
            end: spec.to,
            duration,
            elapsed: 0.0,
            delay,
            delay_remaining: delay,
            easing: spec.easing,
            on_update: spec.on_update,
            on_complete: spec.on_complete,
            active: true,
            paused: false,
            completed: false,
            cancelled: false,
        });
        debug!("Created tween {}", handle);
        handle
    }

    pub fn tween(&self, handle: Handle) -> Option<TweenSnapshot> {
        self.tweens.borrow().get(handle).map(|t| t.snapshot())
    }

    /// Flag a tween as cancelled. It stays resolvable, but inert, until the
    /// next sweep.
    pub fn cancel_tween(&self, handle: Handle) -> bool {
        self.tweens
            .borrow_mut()
            .get_mut(handle)
            .is_some_and(|t| t.cancel())
    }

    pub fn pause_tween(&self, handle: Handle) -> bool {
        match self.tweens.borrow_mut().get_mut(handle) {
            Some(t) if !t.is_finished() => {
                t.paused = true;
                true
            }
            _ => false,
        }
    }

    pub fn resume_tween(&self, handle: Handle) -> bool {
        match self.tweens.borrow_mut().get_mut(handle) {
            Some(t) if !t.is_finished() => {
                t.paused = false;
                true
            }
            _ => false,
        }
    }

    /// Cancel every live tween on `target`, optionally only for `property`.
    /// Returns how many were cancelled.
    pub fn cancel_tweens_for(&self, target: &H::Value, property: Option<&str>) -> usize {
        let candidates: SmallVec<[(Handle, H::Value); 8]> = {
            let tweens = self.tweens.borrow();
            tweens
                .iter()
                .filter(|(_, t)| !t.is_finished())
                .filter(|(_, t)| property.is_none_or(|p| t.property == p))
                .map(|(h, t)| (h, t.target.clone()))
                .collect()
        };
        let mut cancelled = 0;
        for (handle, other) in candidates {
            if self.host.identity_equal(target, &other) && self.cancel_tween(handle) {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Remove a tween immediately, without waiting for the sweep.
    pub fn destroy_tween(&self, handle: Handle) -> bool {
        let removed = self.tweens.borrow_mut().remove(handle);
        match removed {
            Some(tween) => {
                self.release_tween(&tween);
                true
            }
            None => false,
        }
    }

    // ==================== SPRITES ====================

    pub fn create_sprite(&self, sprite: Sprite) -> Handle {
        self.sprites.borrow_mut().insert(sprite)
    }

    pub fn destroy_sprite(&self, handle: Handle) -> bool {
        self.sprites.borrow_mut().remove(handle).is_some()
    }

    pub fn sprite(&self, handle: Handle) -> Option<Sprite> {
        self.sprites.borrow().get(handle).cloned()
    }

    pub(crate) fn set_sprite_source(&self, handle: Handle, source: SourceRect) {
        if let Some(sprite) = self.sprites.borrow_mut().get_mut(handle) {
            sprite.source = source;
        }
    }

    // ==================== SPRITE ANIMATIONS ====================

    pub fn create_animation(&self, spec: AnimationSpec<H::Value>) -> Handle {
        pin_opt(&*self.host, spec.on_frame.as_ref());
        pin_opt(&*self.host, spec.on_complete.as_ref());
        let animation = SpriteAnimation::from_spec(spec);
        let binding = animation.sprite.zip(animation.current_source());
        let handle = self.animations.borrow_mut().insert(animation);
        if let Some((sprite, source)) = binding {
            self.set_sprite_source(sprite, source);
        }
        debug!("Created animation {}", handle);
        handle
    }

    pub fn destroy_animation(&self, handle: Handle) -> bool {
        let removed = self.animations.borrow_mut().remove(handle);
        match removed {
            Some(animation) => {
                self.release_animation(&animation);
                true
            }
            None => false,
        }
    }

    pub fn animation(&self, handle: Handle) -> Option<AnimationSnapshot> {
        self.animations.borrow().get(handle).map(|a| a.snapshot())
    }

    /// Restart from the first frame.
    pub fn play_animation(&self, handle: Handle) -> bool {
        let binding = {
            let mut animations = self.animations.borrow_mut();
            let Some(animation) = animations.get_mut(handle) else {
                return false;
            };
            animation.restart();
            animation.sprite.zip(animation.current_source())
        };
        if let Some((sprite, source)) = binding {
            self.set_sprite_source(sprite, source);
        }
        true
    }

    /// Stop advancing, leaving the current frame visible.
    pub fn stop_animation(&self, handle: Handle) -> bool {
        match self.animations.borrow_mut().get_mut(handle) {
            Some(animation) => {
                animation.playing = false;
                true
            }
            None => false,
        }
    }

    pub fn bind_sprite(&self, animation: Handle, sprite: Handle) -> bool {
        let binding = {
            let mut animations = self.animations.borrow_mut();
            let Some(anim) = animations.get_mut(animation) else {
                return false;
            };
            anim.sprite = Some(sprite);
            anim.current_source()
        };
        if let Some(source) = binding {
            self.set_sprite_source(sprite, source);
        }
        true
    }

    pub fn has_animation(&self, handle: Handle) -> bool {
        self.animations.borrow().contains(handle)
    }

    // ==================== LIFECYCLE ====================

    pub fn tween_count(&self) -> usize {
        self.tweens.borrow().len()
    }

    pub fn animation_count(&self) -> usize {
        self.animations.borrow().len()
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.borrow().len()
    }

    /// Drop every tween, animation and sprite. Handle counters keep running.
    pub fn clear(&self) {
        let tweens = self.tweens.borrow_mut().drain();
        let animations = self.animations.borrow_mut().drain();
        self.sprites.borrow_mut().drain();
        for (_, tween) in &tweens {
            self.release_tween(tween);
        }
        for (_, animation) in &animations {
            self.release_animation(animation);
        }
    }

    pub(crate) fn invoke(&self, what: &str, callback: &H::Value, args: &[ScriptArg]) {
        invoke_logged(&*self.host, what, callback, None, args);
    }
}
