//! Sprite animation stepping and the per-frame animation system.
//!
//! - [`advance_frames`] is the pure frame-walk: given the playback state and
//!   `dt`, it reports every index change and whether playback completed.
//! - [`advance_animations`] applies it to every animation in the
//!   coordinator, keeps bound sprites on the current frame and fires
//!   `on_frame` once per change.
//! - [`animation_update_system`] runs the whole coordinator update from the
//!   schedule.
//!
//! # Catch-up
//!
//! A long frame may cross several frame boundaries. Each crossed boundary is
//! reported, so `on_frame` fires once per change, in order. A non-looping
//! animation that runs off the end stops on its last frame and completes.
//! Looping animations are capped, see [`advance_frames`].
//!
//! A callback that restarts or destroys the animation ends the walk: the
//! remaining changes are dropped and completion is not reported.

use bevy_ecs::prelude::*;
use smallvec::SmallVec;

use crate::resources::animationcoordinator::AnimationCoordinator;
use crate::resources::handletable::Handle;
use crate::resources::scripthost::ScriptHost;
use crate::resources::worldtime::WorldTime;
use crate::runtime::CoreEngines;

/// Outcome of one [`advance_frames`] step.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FrameAdvance {
    /// New indices, one per boundary crossed.
    pub changes: SmallVec<[usize; 4]>,
    pub completed: bool,
}

/// Walk the frame index forward by `dt`.
///
/// `current_index` and `elapsed` are updated in place. Malformed input
/// (no frames or a non-positive frame duration) reports completion with no
/// changes.
///
/// A looping walk reports at most two cycles of changes. When `dt` covers
/// more, the whole cycles beyond the first are skipped without being
/// reported; the final index and leftover time are still exact.
pub(crate) fn advance_frames(
    current_index: &mut usize,
    elapsed: &mut f32,
    frame_duration: f32,
    frame_count: usize,
    looping: bool,
    dt: f32,
) -> FrameAdvance {
    let mut out = FrameAdvance::default();
    if frame_count == 0 || frame_duration.is_nan() || frame_duration <= 0.0 {
        out.completed = true;
        return out;
    }

    *elapsed += dt;
    if looping {
        // Cap runaway catch-up to one extra cycle.
        let cycle = frame_duration * frame_count as f32;
        if *elapsed >= cycle * 2.0 {
            *elapsed = cycle + *elapsed % cycle;
        }
    }

    while *elapsed >= frame_duration {
        *elapsed -= frame_duration;
        let next = *current_index + 1;
        if next >= frame_count {
            if looping {
                *current_index = 0;
                out.changes.push(0);
            } else {
                *elapsed = 0.0;
                out.completed = true;
                break;
            }
        } else {
            *current_index = next;
            out.changes.push(next);
        }
    }
    out
}

/// Step every animation that exists right now by `dt`.
///
/// Returns the handles whose playback completed on this step.
pub(crate) fn advance_animations<H: ScriptHost>(
    coordinator: &AnimationCoordinator<H>,
    dt: f32,
) -> SmallVec<[Handle; 8]> {
    let handles = coordinator.animations.borrow().handles();
    let mut completed = SmallVec::new();
    for handle in handles {
        if step_animation(coordinator, handle, dt) {
            completed.push(handle);
        }
    }
    completed
}

fn step_animation<H: ScriptHost>(
    coordinator: &AnimationCoordinator<H>,
    handle: Handle,
    dt: f32,
) -> bool {
    let (advance, frames, sprite, geometry, on_frame, generation) = {
        let mut animations = coordinator.animations.borrow_mut();
        let Some(anim) = animations.get_mut(handle) else {
            return false;
        };
        if !anim.playing || anim.completed {
            return false;
        }
        let advance = advance_frames(
            &mut anim.current_index,
            &mut anim.elapsed,
            anim.frame_duration,
            anim.frames.len(),
            anim.looping,
            dt,
        );
        if advance.completed {
            anim.completed = true;
            anim.playing = false;
        }
        if advance.changes.is_empty() {
            return advance.completed;
        }
        (
            advance,
            anim.frames.clone(),
            anim.sprite,
            anim.geometry,
            anim.on_frame.clone(),
            anim.generation,
        )
    };
    // Unchanged since this step began: not destroyed, not restarted.
    let untouched = || {
        coordinator
            .animations
            .borrow()
            .get(handle)
            .is_some_and(|a| a.generation == generation)
    };

    if let (Some(sprite), Some(&last)) = (sprite, advance.changes.last()) {
        coordinator.set_sprite_source(sprite, geometry.source_rect(frames[last]));
    }

    if let Some(cb) = on_frame {
        for &index in &advance.changes {
            if !untouched() {
                break;
            }
            coordinator.invoke(
                "animation on_frame",
                &cb,
                &[handle.into(), index.into(), (frames[index] as i64).into()],
            );
        }
    }

    if !advance.completed {
        return false;
    }
    coordinator
        .animations
        .borrow()
        .get(handle)
        .is_some_and(|a| a.generation == generation && a.completed && !a.playing)
}

/// Run the animation coordinator for this frame.
///
/// Contract
/// - Reads [`WorldTime`] for the scaled delta.
/// - Steps tweens, then sprite animations, then sweeps finished entries.
pub fn animation_update_system<H: ScriptHost>(
    time: Res<WorldTime>,
    engines: NonSend<CoreEngines<H>>,
) {
    engines.animations.update(time.delta);
}
