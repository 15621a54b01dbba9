//! Scalar keyframe curves built from animations.

use dae_math::Vec2;
use serde::Serialize;

use crate::collada::{Animation, FloatArray, Interpolation};
use crate::error::{ColladaError, ColladaResult};

/// One key. Tangents are (time, value) control points; exporters that
/// write one-component tangents get their time placed a third of the way
/// into the segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,

    /// Interpolation of the segment starting at this key.
    pub interpolation: Interpolation,
    pub in_tangent: Option<Vec2>,
    pub out_tangent: Option<Vec2>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Curve {
    pub keys: Vec<Keyframe>,
}

fn tangent(array: Option<&FloatArray>, key: usize) -> Option<Vec2> {
    let element = array?.element(key)?;
    match *element {
        [time, value, ..] => Some(Vec2::new(time, value)),
        [value] => Some(Vec2::new(f32::NAN, value)),
        [] => None,
    }
}

impl Curve {
    /// Curve of the first output component of an animation.
    pub fn from_animation(animation: &Animation) -> ColladaResult<Self> {
        let times = animation.input_times()?;
        let outputs = animation.outputs()?;
        if outputs.n_components > 1 {
            log::warn!(
                "Animation '{}' has {}-component output; using the first",
                animation.id,
                outputs.n_components
            );
        }

        let mut keys = Vec::with_capacity(times.len());
        for (i, &time) in times.iter().enumerate() {
            let value = outputs
                .element(i)
                .and_then(|e| e.first().copied())
                .ok_or_else(|| ColladaError::IndexOutOfRange {
                    source_id: outputs.id.to_string(),
                    index: i as u32,
                    count: outputs.element_count(),
                })?;
            keys.push(Keyframe {
                time,
                value,
                interpolation: animation.interpolation(i),
                in_tangent: tangent(animation.in_tangents(), i),
                out_tangent: tangent(animation.out_tangents(), i),
            });
        }
        Ok(Self::new(keys))
    }

    /// Build from keys in ascending time order. Missing tangent times are
    /// filled in here.
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        for i in 0..keys.len() {
            let prev = i.checked_sub(1).map(|p| keys[p].time);
            let next = keys.get(i + 1).map(|k| k.time);
            let key = &mut keys[i];
            if let Some(t) = key.in_tangent.as_mut().filter(|t| t.x.is_nan()) {
                t.x = key.time - (key.time - prev.unwrap_or(key.time)) / 3.0;
            }
            if let Some(t) = key.out_tangent.as_mut().filter(|t| t.x.is_nan()) {
                t.x = key.time + (next.unwrap_or(key.time) - key.time) / 3.0;
            }
        }
        Self { keys }
    }

    pub fn start_time(&self) -> f32 {
        self.keys.first().map_or(0.0, |k| k.time)
    }

    pub fn end_time(&self) -> f32 {
        self.keys.last().map_or(0.0, |k| k.time)
    }

    /// Value at `time`, held constant outside the key range.
    pub fn evaluate(&self, time: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 0.0,
        };
        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        // First key strictly after `time`; never 0 or len here.
        let next = self.keys.partition_point(|k| k.time <= time);
        let (k0, k1) = (&self.keys[next - 1], &self.keys[next]);
        let span = k1.time - k0.time;
        if span <= 0.0 {
            return k1.value;
        }
        let s = (time - k0.time) / span;

        match k0.interpolation {
            Interpolation::Step => k0.value,
            Interpolation::Linear => k0.value + (k1.value - k0.value) * s,
            Interpolation::Bezier => {
                let p0 = Vec2::new(k0.time, k0.value);
                let p3 = Vec2::new(k1.time, k1.value);
                let p1 = k0.out_tangent.unwrap_or_else(|| p0.lerp(p3, 1.0 / 3.0));
                let p2 = k1.in_tangent.unwrap_or_else(|| p0.lerp(p3, 2.0 / 3.0));
                bezier_at_time(p0, p1, p2, p3, time)
            }
            Interpolation::Hermite => {
                let m0 = k0.out_tangent.map_or(k1.value - k0.value, |t| t.y);
                let m1 = k1.in_tangent.map_or(k1.value - k0.value, |t| t.y);
                let (s2, s3) = (s * s, s * s * s);
                (2.0 * s3 - 3.0 * s2 + 1.0) * k0.value
                    + (s3 - 2.0 * s2 + s) * m0
                    + (-2.0 * s3 + 3.0 * s2) * k1.value
                    + (s3 - s2) * m1
            }
        }
    }
}

fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, s: f32) -> f32 {
    let r = 1.0 - s;
    r * r * r * p0 + 3.0 * r * r * s * p1 + 3.0 * r * s * s * p2 + s * s * s * p3
}

/// Value of a 2D cubic bezier at the parameter whose x equals `time`.
/// The x polynomial is monotonic for sane tangents, so bisection converges.
fn bezier_at_time(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, time: f32) -> f32 {
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    let mut s = (time - p0.x) / (p3.x - p0.x);
    for _ in 0..32 {
        let x = bezier(p0.x, p1.x, p2.x, p3.x, s);
        if (x - time).abs() < 1e-6 {
            break;
        }
        if x < time {
            lo = s;
        } else {
            hi = s;
        }
        s = 0.5 * (lo + hi);
    }
    bezier(p0.y, p1.y, p2.y, p3.y, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn key(time: f32, value: f32, interpolation: Interpolation) -> Keyframe {
        Keyframe {
            time,
            value,
            interpolation,
            in_tangent: None,
            out_tangent: None,
        }
    }

    #[test]
    fn test_linear_and_clamping() {
        let curve = Curve::new(vec![
            key(0.0, 0.0, Interpolation::Linear),
            key(2.0, 10.0, Interpolation::Linear),
        ]);
        assert_relative_eq!(curve.evaluate(1.0), 5.0);
        assert_relative_eq!(curve.evaluate(-1.0), 0.0);
        assert_relative_eq!(curve.evaluate(3.0), 10.0);
        assert_relative_eq!(curve.end_time(), 2.0);
    }

    #[test]
    fn test_step_holds_value() {
        let curve = Curve::new(vec![
            key(0.0, 1.0, Interpolation::Step),
            key(1.0, 2.0, Interpolation::Step),
            key(2.0, 3.0, Interpolation::Step),
        ]);
        assert_relative_eq!(curve.evaluate(0.99), 1.0);
        assert_relative_eq!(curve.evaluate(1.0), 2.0);
        assert_relative_eq!(curve.evaluate(1.5), 2.0);
    }

    #[test]
    fn test_bezier_with_default_tangents_is_linear() {
        let curve = Curve::new(vec![
            key(0.0, 0.0, Interpolation::Bezier),
            key(3.0, 6.0, Interpolation::Bezier),
        ]);
        assert_relative_eq!(curve.evaluate(1.5), 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_bezier_ease() {
        let mut k0 = key(0.0, 0.0, Interpolation::Bezier);
        let mut k1 = key(1.0, 1.0, Interpolation::Bezier);
        k0.out_tangent = Some(Vec2::new(0.333, 0.0));
        k1.in_tangent = Some(Vec2::new(0.667, 1.0));
        let curve = Curve::new(vec![k0, k1]);

        assert_relative_eq!(curve.evaluate(0.5), 0.5, epsilon = 1e-3);
        assert!(curve.evaluate(0.1) < 0.1);
        assert!(curve.evaluate(0.9) > 0.9);
    }

    #[test]
    fn test_hermite_endpoints() {
        let mut k0 = key(0.0, 2.0, Interpolation::Hermite);
        let mut k1 = key(1.0, 4.0, Interpolation::Hermite);
        k0.out_tangent = Some(Vec2::new(f32::NAN, 0.0));
        k1.in_tangent = Some(Vec2::new(f32::NAN, 0.0));
        let curve = Curve::new(vec![k0, k1]);

        assert_relative_eq!(curve.evaluate(0.0), 2.0);
        assert_relative_eq!(curve.evaluate(0.5), 3.0, epsilon = 1e-5);
        assert_relative_eq!(curve.evaluate(1.0), 4.0);
        assert_relative_eq!(curve.keys[0].out_tangent.unwrap().x, 1.0 / 3.0);
    }

    #[test]
    fn test_empty_curve() {
        assert_relative_eq!(Curve::new(Vec::new()).evaluate(1.0), 0.0);
    }
}
