//! Tween stepping.
//!
//! [`advance_tweens`] is the first phase of
//! [`AnimationCoordinator::update`](crate::resources::animationcoordinator::AnimationCoordinator::update).
//! Each tween is stepped in handle order: the property is written, then
//! `on_update` runs with `(t, value)`. Completion callbacks are deferred to
//! the coordinator so that every tween has advanced before any of them run.

use smallvec::SmallVec;

use crate::resources::animationcoordinator::AnimationCoordinator;
use crate::resources::handletable::Handle;
use crate::resources::scripthost::{ScriptHost, write_property};
use crate::systems::easing::ease;

/// Linearly interpolate between two floats.
pub(crate) fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Step every tween that exists right now by `dt`.
///
/// Tweens created by callbacks during this pass are not stepped until the
/// next frame. Returns the handles that completed, in stepping order.
pub(crate) fn advance_tweens<H: ScriptHost>(
    coordinator: &AnimationCoordinator<H>,
    dt: f32,
) -> SmallVec<[Handle; 8]> {
    let handles = coordinator.tweens.borrow().handles();
    let mut completed = SmallVec::new();
    for handle in handles {
        if step_tween(coordinator, handle, dt) {
            completed.push(handle);
        }
    }
    completed
}

/// Advance one tween. Returns true when it completed on this step.
fn step_tween<H: ScriptHost>(coordinator: &AnimationCoordinator<H>, handle: Handle, dt: f32) -> bool {
    let host = coordinator.host();

    let (target, property, on_update, t, value) = {
        let mut tweens = coordinator.tweens.borrow_mut();
        let Some(tween) = tweens.get_mut(handle) else {
            return false;
        };
        if !tween.is_running() {
            return false;
        }
        if tween.delay_remaining > 0.0 {
            tween.delay_remaining = (tween.delay_remaining - dt).max(0.0);
            return false;
        }
        tween.elapsed += dt;
        let t = if tween.duration > 0.0 {
            (tween.elapsed / tween.duration).min(1.0)
        } else {
            1.0
        };
        let value = if t >= 1.0 {
            tween.end
        } else {
            lerp_f32(tween.start, tween.end, ease(tween.easing, t))
        };
        (
            tween.target.clone(),
            tween.property.clone(),
            tween.on_update.clone(),
            t,
            value,
        )
    };

    write_property(&**host, &target, &property, value);

    if let Some(cb) = on_update {
        let still_running = coordinator
            .tweens
            .borrow()
            .get(handle)
            .is_some_and(|tw| tw.is_running());
        if still_running {
            coordinator.invoke("tween on_update", &cb, &[t.into(), value.into()]);
        }
    }

    let mut tweens = coordinator.tweens.borrow_mut();
    match tweens.get_mut(handle) {
        Some(tween) if !tween.cancelled && !tween.completed && t >= 1.0 => {
            tween.completed = true;
            tween.active = false;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tween::{Easing, TweenSpec};
    use crate::resources::nativehost::{NativeHost, NativeValue, PropertyBag};
    use crate::resources::scripthost::ScriptArg;
    use std::cell::RefCell;
    use std::rc::Rc;

    const EPSILON: f32 = 1e-6;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn coordinator() -> AnimationCoordinator<NativeHost> {
        AnimationCoordinator::new(Rc::new(NativeHost::new()))
    }

    fn object(x: f32) -> (Rc<RefCell<PropertyBag>>, NativeValue) {
        let obj = Rc::new(RefCell::new(PropertyBag::new().with_value("x", x)));
        let value = NativeValue::object(obj.clone());
        (obj, value)
    }

    // ==================== INTERPOLATION FUNCTION TESTS ====================

    #[test]
    fn test_lerp_f32_basic() {
        assert!(approx_eq(lerp_f32(0.0, 10.0, 0.5), 5.0));
        assert!(approx_eq(lerp_f32(0.0, 10.0, 0.0), 0.0));
        assert!(approx_eq(lerp_f32(0.0, 10.0, 1.0), 10.0));
    }

    #[test]
    fn test_lerp_f32_negative_values() {
        assert!(approx_eq(lerp_f32(-10.0, 10.0, 0.5), 0.0));
        assert!(approx_eq(lerp_f32(-10.0, 10.0, 0.25), -5.0));
    }

    #[test]
    fn test_lerp_f32_extrapolation() {
        // overshooting curves rely on lerp not clamping
        assert!(approx_eq(lerp_f32(0.0, 10.0, -0.5), -5.0));
        assert!(approx_eq(lerp_f32(0.0, 10.0, 1.5), 15.0));
    }

    // ==================== STEP TESTS ====================

    #[test]
    fn test_advance_reports_completed_in_order() {
        let c = coordinator();
        let (_a, ta) = object(0.0);
        let (_b, tb) = object(0.0);
        let (_d, td) = object(0.0);
        let first = c.create_tween(TweenSpec::new(ta, "x", 1.0, 0.5));
        c.create_tween(TweenSpec::new(tb, "x", 1.0, 2.0));
        let third = c.create_tween(TweenSpec::new(td, "x", 1.0, 0.25));
        let done = advance_tweens(&c, 0.5);
        assert_eq!(done.as_slice(), &[first, third]);
    }

    #[test]
    fn test_step_writes_eased_value() {
        let c = coordinator();
        let (obj, target) = object(0.0);
        c.create_tween(TweenSpec::new(target, "x", 100.0, 1.0).with_easing(Easing::QuadIn));
        advance_tweens(&c, 0.5);
        assert!((obj.borrow().value("x").unwrap() - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_overshoot_value_is_written() {
        let c = coordinator();
        let (obj, target) = object(0.0);
        c.create_tween(TweenSpec::new(target, "x", 1.0, 1.0).with_easing(Easing::BackOut));
        advance_tweens(&c, 0.8);
        assert!(obj.borrow().value("x").unwrap() > 1.0);
    }

    #[test]
    fn test_delay_consumed_without_spilling() {
        let c = coordinator();
        let (obj, target) = object(0.0);
        let h = c.create_tween(TweenSpec::new(target, "x", 10.0, 1.0).with_delay(0.3));
        advance_tweens(&c, 0.5);
        let snap = c.tween(h).unwrap();
        assert_eq!(snap.delay_remaining, 0.0);
        assert_eq!(snap.elapsed, 0.0);
        assert_eq!(obj.borrow().value("x"), Some(0.0));
    }

    #[test]
    fn test_cancel_in_on_update_blocks_completion() {
        let c = Rc::new(coordinator());
        let (_obj, target) = object(0.0);
        let slot = Rc::new(std::cell::Cell::new(None));
        let (weak, s) = (Rc::downgrade(&c), slot.clone());
        let cb = NativeValue::callback(move |_, _| {
            if let (Some(c), Some(h)) = (weak.upgrade(), s.get()) {
                c.cancel_tween(h);
            }
            Ok(ScriptArg::Nil)
        });
        let h = c.create_tween(TweenSpec::new(target, "x", 1.0, 0.1).with_on_update(cb));
        slot.set(Some(h));
        let done = advance_tweens(&c, 0.2);
        assert!(done.is_empty());
        let snap = c.tween(h).unwrap();
        assert!(snap.cancelled && !snap.completed);
    }
}
