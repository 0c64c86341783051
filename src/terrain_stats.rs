//! Minimal min / max helper over heightfield samples.
//! Works on a borrowed `&[f32]` to avoid copies. NaN samples are ignored.

/// Compute `(min, max)` in a single sweep.
/// An empty or all-NaN slice yields `(0.0, 0.0)`.
pub fn min_max(data: &[f32]) -> (f32, f32) {
    let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
    for &v in data {
        if v < lo {
            lo = v;
        }
        if v > hi {
            hi = v;
        }
    }
    if lo > hi {
        return (0.0, 0.0);
    }
    (lo, hi)
}
