//! Over-lifetime curves and color gradients.
//!
//! All the `*-over-lifetime` channels are the same abstraction: a
//! piecewise-linear (optionally smoothstepped) function of
//! `life_pct ∈ [0, 1]`. Keys are kept sorted; sampling locates the
//! surrounding pair by binary search and interpolates.

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurveKey {
    pub t: f32,
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    keys: Vec<CurveKey>,
    smooth: bool,
}

impl Curve {
    pub fn constant(value: f32) -> Curve {
        Curve {
            keys: vec![CurveKey { t: 0.0, value }],
            smooth: false,
        }
    }

    /// Keys are sorted by time on construction; duplicates keep their
    /// relative order.
    pub fn from_keys(mut keys: Vec<CurveKey>, smooth: bool) -> Curve {
        assert!(!keys.is_empty(), "a curve needs at least one key");
        keys.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
        Curve { keys, smooth }
    }

    /// Convenience: straight ramp from `start` at t=0 to `end` at t=1.
    pub fn ramp(start: f32, end: f32) -> Curve {
        Curve::from_keys(
            vec![
                CurveKey { t: 0.0, value: start },
                CurveKey { t: 1.0, value: end },
            ],
            false,
        )
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn sample(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        // index of the first key strictly after t
        let after = self.keys.partition_point(|k| k.t <= t);
        if after == 0 {
            return self.keys[0].value;
        }
        if after == self.keys.len() {
            return self.keys[after - 1].value;
        }
        let a = self.keys[after - 1];
        let b = self.keys[after];
        let span = b.t - a.t;
        if span <= f32::EPSILON {
            return b.value;
        }
        let mut alpha = (t - a.t) / span;
        if self.smooth {
            alpha = alpha * alpha * (3.0 - 2.0 * alpha);
        }
        a.value + (b.value - a.value) * alpha
    }
}

/// Per-axis multipliers for velocity-over-lifetime: either one uniform
/// curve for all three axes or three independent ones.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisCurve {
    Uniform(Curve),
    PerAxis { x: Curve, y: Curve, z: Curve },
}

impl AxisCurve {
    pub fn sample(&self, t: f32) -> [f32; 3] {
        match self {
            AxisCurve::Uniform(curve) => {
                let v = curve.sample(t);
                [v, v, v]
            }
            AxisCurve::PerAxis { x, y, z } => [x.sample(t), y.sample(t), z.sample(t)],
        }
    }
}

/// Sorted RGBA keys, linearly interpolated.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    keys: Vec<(f32, [f32; 4])>,
}

impl Gradient {
    pub fn uniform(color: [f32; 4]) -> Gradient {
        Gradient {
            keys: vec![(0.0, color)],
        }
    }

    pub fn from_keys(mut keys: Vec<(f32, [f32; 4])>) -> Gradient {
        assert!(!keys.is_empty(), "a gradient needs at least one key");
        keys.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Gradient { keys }
    }

    pub fn keys(&self) -> &[(f32, [f32; 4])] {
        &self.keys
    }

    pub fn sample(&self, t: f32) -> [f32; 4] {
        let t = t.clamp(0.0, 1.0);
        let after = self.keys.partition_point(|k| k.0 <= t);
        if after == 0 {
            return self.keys[0].1;
        }
        if after == self.keys.len() {
            return self.keys[after - 1].1;
        }
        let (ta, ca) = self.keys[after - 1];
        let (tb, cb) = self.keys[after];
        let span = tb - ta;
        if span <= f32::EPSILON {
            return cb;
        }
        let alpha = (t - ta) / span;
        [
            ca[0] + (cb[0] - ca[0]) * alpha,
            ca[1] + (cb[1] - ca[1]) * alpha,
            ca[2] + (cb[2] - ca[2]) * alpha,
            ca[3] + (cb[3] - ca[3]) * alpha,
        ]
    }
}
