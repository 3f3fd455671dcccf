//! Math types and interpolation helpers for Strata

pub use glam::Vec3;

/// Clamps `value` into `[0, 1]`. NaN collapses to `0.0`.
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Hermite ease between `from` and `to`.
///
/// `t` is clamped into `[0, 1]`, so `smoothstep(a, b, 0.0) == a` and
/// `smoothstep(a, b, 1.0) == b` with no overshoot in between.
pub fn smoothstep(from: f32, to: f32, t: f32) -> f32 {
    let t = clamp01(t);
    let t = t * t * (3.0 - 2.0 * t);
    to * t + from * (1.0 - t)
}
