//! Easing curve math.
//!
//! [`ease`] is a pure function of `(curve, t)`. The input is clamped to
//! `[0, 1]`; the output is not, so back and elastic curves keep their
//! overshoot.

use std::f32::consts::PI;

use crate::components::tween::Easing;

const BACK_C1: f32 = 1.70158;
const BACK_C2: f32 = BACK_C1 * 1.525;
const BACK_C3: f32 = BACK_C1 + 1.0;
const ELASTIC_C4: f32 = (2.0 * PI) / 3.0;
const ELASTIC_C5: f32 = (2.0 * PI) / 4.5;
const BOUNCE_N1: f32 = 7.5625;
const BOUNCE_D1: f32 = 2.75;

/// Apply an easing function to a normalized time value.
pub fn ease(e: Easing, t: f32) -> f32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    match e {
        Easing::Linear => t,
        Easing::QuadIn => t * t,
        Easing::QuadOut => t * (2.0 - t),
        Easing::QuadInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                -1.0 + (4.0 - 2.0 * t) * t
            }
        }
        Easing::CubicIn => t * t * t,
        Easing::CubicOut => {
            let p = t - 1.0;
            p * p * p + 1.0
        }
        Easing::CubicInOut => {
            if t < 0.5 {
                4.0 * t * t * t
            } else {
                let p = 2.0 * t - 2.0;
                0.5 * p * p * p + 1.0
            }
        }
        Easing::QuartIn => t.powi(4),
        Easing::QuartOut => 1.0 - (1.0 - t).powi(4),
        Easing::QuartInOut => {
            if t < 0.5 {
                8.0 * t.powi(4)
            } else {
                1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
            }
        }
        Easing::QuintIn => t.powi(5),
        Easing::QuintOut => 1.0 - (1.0 - t).powi(5),
        Easing::QuintInOut => {
            if t < 0.5 {
                16.0 * t.powi(5)
            } else {
                1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
            }
        }
        Easing::SineIn => 1.0 - (t * PI / 2.0).cos(),
        Easing::SineOut => (t * PI / 2.0).sin(),
        Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
        Easing::ExpoIn => {
            if t == 0.0 {
                0.0
            } else {
                2f32.powf(10.0 * t - 10.0)
            }
        }
        Easing::ExpoOut => {
            if t == 1.0 {
                1.0
            } else {
                1.0 - 2f32.powf(-10.0 * t)
            }
        }
        Easing::ExpoInOut => {
            if t == 0.0 || t == 1.0 {
                t
            } else if t < 0.5 {
                2f32.powf(20.0 * t - 10.0) / 2.0
            } else {
                (2.0 - 2f32.powf(-20.0 * t + 10.0)) / 2.0
            }
        }
        Easing::CircIn => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        Easing::CircOut => (1.0 - (t - 1.0) * (t - 1.0)).max(0.0).sqrt(),
        Easing::CircInOut => {
            if t < 0.5 {
                (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
            } else {
                ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
            }
        }
        Easing::BackIn => BACK_C3 * t * t * t - BACK_C1 * t * t,
        Easing::BackOut => {
            let p = t - 1.0;
            1.0 + BACK_C3 * p * p * p + BACK_C1 * p * p
        }
        Easing::BackInOut => {
            if t < 0.5 {
                ((2.0 * t).powi(2) * ((BACK_C2 + 1.0) * 2.0 * t - BACK_C2)) / 2.0
            } else {
                ((2.0 * t - 2.0).powi(2) * ((BACK_C2 + 1.0) * (t * 2.0 - 2.0) + BACK_C2) + 2.0)
                    / 2.0
            }
        }
        Easing::ElasticIn => {
            if t == 0.0 || t == 1.0 {
                t
            } else {
                -(2f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * ELASTIC_C4).sin()
            }
        }
        Easing::ElasticOut => {
            if t == 0.0 || t == 1.0 {
                t
            } else {
                2f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * ELASTIC_C4).sin() + 1.0
            }
        }
        Easing::ElasticInOut => {
            if t == 0.0 || t == 1.0 {
                t
            } else if t < 0.5 {
                -(2f32.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * ELASTIC_C5).sin()) / 2.0
            } else {
                (2f32.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * ELASTIC_C5).sin()) / 2.0
                    + 1.0
            }
        }
        Easing::BounceIn => 1.0 - bounce_out(1.0 - t),
        Easing::BounceOut => bounce_out(t),
        Easing::BounceInOut => {
            if t < 0.5 {
                (1.0 - bounce_out(1.0 - 2.0 * t)) / 2.0
            } else {
                (1.0 + bounce_out(2.0 * t - 1.0)) / 2.0
            }
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    if t < 1.0 / BOUNCE_D1 {
        BOUNCE_N1 * t * t
    } else if t < 2.0 / BOUNCE_D1 {
        let p = t - 1.5 / BOUNCE_D1;
        BOUNCE_N1 * p * p + 0.75
    } else if t < 2.5 / BOUNCE_D1 {
        let p = t - 2.25 / BOUNCE_D1;
        BOUNCE_N1 * p * p + 0.9375
    } else {
        let p = t - 2.625 / BOUNCE_D1;
        BOUNCE_N1 * p * p + 0.984375
    }
}
