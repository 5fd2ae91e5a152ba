//! Tween data.
//!
//! A [`Tween`] interpolates one numeric property of a host object from a
//! start value to an end value over `duration` seconds, shaped by an
//! [`Easing`] curve. Tweens live in the
//! [`AnimationCoordinator`](crate::resources::animationcoordinator::AnimationCoordinator)
//! tween table and are created from a [`TweenSpec`].
//!
//! See [`crate::systems::tween`] for the per-frame stepping logic and
//! [`crate::systems::easing`] for the curve math.

use serde::{Deserialize, Serialize};

/// Named easing curves.
///
/// Every curve maps `t = 0` to `0` and `t = 1` to `1`. The back and elastic
/// families overshoot the `[0, 1]` range in between.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant speed (no easing).
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuartIn,
    QuartOut,
    QuartInOut,
    QuintIn,
    QuintOut,
    QuintInOut,
    SineIn,
    SineOut,
    SineInOut,
    ExpoIn,
    ExpoOut,
    ExpoInOut,
    CircIn,
    CircOut,
    CircInOut,
    /// Pulls back below 0 before heading to 1.
    BackIn,
    /// Overshoots past 1 before settling.
    BackOut,
    BackInOut,
    /// Oscillates around 0 with growing amplitude.
    ElasticIn,
    /// Oscillates around 1 with decaying amplitude.
    ElasticOut,
    ElasticInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
}

impl Easing {
    /// Every curve, in declaration order.
    pub const ALL: [Easing; 31] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
        Easing::QuartIn,
        Easing::QuartOut,
        Easing::QuartInOut,
        Easing::QuintIn,
        Easing::QuintOut,
        Easing::QuintInOut,
        Easing::SineIn,
        Easing::SineOut,
        Easing::SineInOut,
        Easing::ExpoIn,
        Easing::ExpoOut,
        Easing::ExpoInOut,
        Easing::CircIn,
        Easing::CircOut,
        Easing::CircInOut,
        Easing::BackIn,
        Easing::BackOut,
        Easing::BackInOut,
        Easing::ElasticIn,
        Easing::ElasticOut,
        Easing::ElasticInOut,
        Easing::BounceIn,
        Easing::BounceOut,
        Easing::BounceInOut,
    ];

    /// The snake_case name scripts use (`"quad_in_out"`).
    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::QuadIn => "quad_in",
            Easing::QuadOut => "quad_out",
            Easing::QuadInOut => "quad_in_out",
            Easing::CubicIn => "cubic_in",
            Easing::CubicOut => "cubic_out",
            Easing::CubicInOut => "cubic_in_out",
            Easing::QuartIn => "quart_in",
            Easing::QuartOut => "quart_out",
            Easing::QuartInOut => "quart_in_out",
            Easing::QuintIn => "quint_in",
            Easing::QuintOut => "quint_out",
            Easing::QuintInOut => "quint_in_out",
            Easing::SineIn => "sine_in",
            Easing::SineOut => "sine_out",
            Easing::SineInOut => "sine_in_out",
            Easing::ExpoIn => "expo_in",
            Easing::ExpoOut => "expo_out",
            Easing::ExpoInOut => "expo_in_out",
            Easing::CircIn => "circ_in",
            Easing::CircOut => "circ_out",
            Easing::CircInOut => "circ_in_out",
            Easing::BackIn => "back_in",
            Easing::BackOut => "back_out",
            Easing::BackInOut => "back_in_out",
            Easing::ElasticIn => "elastic_in",
            Easing::ElasticOut => "elastic_out",
            Easing::ElasticInOut => "elastic_in_out",
            Easing::BounceIn => "bounce_in",
            Easing::BounceOut => "bounce_out",
            Easing::BounceInOut => "bounce_in_out",
        }
    }

    /// Look a curve up by name. Unknown names fall back to [`Easing::Linear`].
    pub fn from_name(name: &str) -> Easing {
        Easing::ALL
            .iter()
            .copied()
            .find(|e| e.name() == name)
            .unwrap_or(Easing::Linear)
    }

    /// Whether the curve may leave `[0, 1]` between its endpoints.
    pub fn overshoots(self) -> bool {
        matches!(
            self,
            Easing::BackIn
                | Easing::BackOut
                | Easing::BackInOut
                | Easing::ElasticIn
                | Easing::ElasticOut
                | Easing::ElasticInOut
        )
    }
}

/// An active interpolation of `target.property`.
///
/// `V` is the host value type holding the target object and callbacks.
/// A tween is never both `completed` and `cancelled`.
#[derive(Clone, Debug)]
pub struct Tween<V> {
    pub target: V,
    pub property: String,
    pub start: f32,
    pub end: f32,
    /// Duration in seconds. Zero completes on the first update.
    pub duration: f32,
    pub elapsed: f32,
    pub delay: f32,
    pub delay_remaining: f32,
    pub easing: Easing,
    /// Called with `(t, value)` after every property write.
    pub on_update: Option<V>,
    /// Called with the tween handle in the completion pass.
    pub on_complete: Option<V>,
    pub active: bool,
    pub paused: bool,
    pub completed: bool,
    pub cancelled: bool,
}

impl<V> Tween<V> {
    /// Eligible for advancement this frame.
    pub fn is_running(&self) -> bool {
        self.active && !self.paused && !self.completed && !self.cancelled
    }

    /// Due for removal at the next sweep.
    pub fn is_finished(&self) -> bool {
        self.completed || self.cancelled
    }

    /// Normalized progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration > 0.0 {
            (self.elapsed / self.duration).min(1.0)
        } else if self.completed {
            1.0
        } else {
            0.0
        }
    }

    /// Mark cancelled. Completed tweens stay completed.
    pub fn cancel(&mut self) -> bool {
        if self.completed || self.cancelled {
            return false;
        }
        self.cancelled = true;
        self.active = false;
        true
    }

    pub fn snapshot(&self) -> TweenSnapshot {
        TweenSnapshot {
            property: self.property.clone(),
            start: self.start,
            end: self.end,
            duration: self.duration,
            elapsed: self.elapsed,
            delay_remaining: self.delay_remaining,
            easing: self.easing,
            progress: self.progress(),
            active: self.active,
            paused: self.paused,
            completed: self.completed,
            cancelled: self.cancelled,
        }
    }
}

/// Everything needed to create a [`Tween`].
#[derive(Clone, Debug)]
pub struct TweenSpec<V> {
    pub target: V,
    pub property: String,
    /// Start value. When absent the current property value is read.
    pub from: Option<f32>,
    pub to: f32,
    pub duration: f32,
    pub delay: f32,
    pub easing: Easing,
    pub on_update: Option<V>,
    pub on_complete: Option<V>,
}

impl<V> TweenSpec<V> {
    pub fn new(target: V, property: impl Into<String>, to: f32, duration: f32) -> Self {
        TweenSpec {
            target,
            property: property.into(),
            from: None,
            to,
            duration,
            delay: 0.0,
            easing: Easing::Linear,
            on_update: None,
            on_complete: None,
        }
    }
    pub fn with_from(mut self, from: f32) -> Self {
        self.from = Some(from);
        self
    }
    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
    pub fn with_on_update(mut self, callback: V) -> Self {
        self.on_update = Some(callback);
        self
    }
    pub fn with_on_complete(mut self, callback: V) -> Self {
        self.on_complete = Some(callback);
        self
    }
}

/// Read-only copy of a tween's state, as returned by lookups.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TweenSnapshot {
    pub property: String,
    pub start: f32,
    pub end: f32,
    pub duration: f32,
    pub elapsed: f32,
    pub delay_remaining: f32,
    pub easing: Easing,
    pub progress: f32,
    pub active: bool,
    pub paused: bool,
    pub completed: bool,
    pub cancelled: bool,
}
