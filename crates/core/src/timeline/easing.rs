use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize)]
pub enum EasingType {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Bounce,
    Elastic,
}

impl EasingType {
    /// Maps progress (clamped to 0.0..=1.0) to eased progress.
    ///
    /// Elastic overshoots outside 0.0..=1.0 in the middle of the curve; the
    /// caller clamps the interpolated channel value.
    pub fn apply(&self, progress: f64) -> f64 {
        let ease_fn = match self {
            EasingType::Linear => linear,
            EasingType::EaseIn => ease_in,
            EasingType::EaseOut => ease_out,
            EasingType::EaseInOut => ease_in_out,
            EasingType::Bounce => bounce,
            EasingType::Elastic => elastic,
        };
        let t = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        (ease_fn)(t)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EasingType::Linear => "Linear",
            EasingType::EaseIn => "EaseIn",
            EasingType::EaseOut => "EaseOut",
            EasingType::EaseInOut => "EaseInOut",
            EasingType::Bounce => "Bounce",
            EasingType::Elastic => "Elastic",
        }
    }
}

pub fn linear(t: f64) -> f64 {
    t
}

pub fn ease_in(t: f64) -> f64 {
    t * t
}

pub fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t) * (1.0 - t)
}

pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

pub fn bounce(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

pub fn elastic(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let c4 = (2.0 * PI) / 3.0;
    2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
}

/// Interpolates between two channel values and rounds to the nearest byte.
pub fn interpolate(start: u8, end: u8, eased: f64) -> u8 {
    let start = start as f64;
    let end = end as f64;
    (start + (end - start) * eased).round().clamp(0.0, 255.0) as u8
}
