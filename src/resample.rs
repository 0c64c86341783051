//! Resizing source grids to a canonical landscape size.
//!
//! Each axis is handled on its own: an axis that shrinks (or stays) is
//! bilinearly resampled with `scale = (old - 1) / (new - 1)`, an axis that
//! grows is padded by centering the source and replicating its border.
//! Both policies run in one pass through a per-axis sample lookup.

use glam::Vec3;

use crate::error::ConversionWarning;
use crate::grid::{GridBuffer, Sample};
use crate::size::CanonicalSize;

/// How one axis was resized
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisResize {
    Unchanged,
    /// Bilinear shrink; `factor = (old - 1) / (new - 1)`
    Resampled { factor: f32 },
    /// Edge padding; `offset` new cells inserted before the original origin
    Padded { offset: i32 },
}

impl AxisResize {
    fn plan(old: u32, new: u32) -> Self {
        if old == new {
            AxisResize::Unchanged
        } else if new < old {
            AxisResize::Resampled {
                factor: (old - 1) as f32 / (new - 1) as f32,
            }
        } else {
            AxisResize::Padded {
                offset: ((new - old) / 2) as i32,
            }
        }
    }

    pub fn factor(&self) -> f32 {
        match self {
            AxisResize::Resampled { factor } => *factor,
            _ => 1.0,
        }
    }

    pub fn offset(&self) -> i32 {
        match self {
            AxisResize::Padded { offset } => *offset,
            _ => 0,
        }
    }
}

/// Output of [`GridResampler::resize`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeResult<T: Sample = f32> {
    pub resized_grid: GridBuffer<T>,
    /// Per-axis shrink ratio; 1 on padded or unchanged axes, z always 1
    pub resize_factor: Vec3,
    /// Padding cells inserted before the source origin on each axis
    pub pixel_offset: (i32, i32),
    pub warnings: Vec<ConversionWarning>,
}

/// Source lookup for one destination index: two neighbours and a blend weight
#[derive(Debug, Clone, Copy)]
struct Tap {
    i0: usize,
    i1: usize,
    frac: f64,
}

fn axis_taps(old: u32, new: u32, plan: AxisResize) -> Vec<Tap> {
    let last = old as usize - 1;
    (0..new as usize)
        .map(|i| match plan {
            AxisResize::Unchanged => Tap { i0: i, i1: i, frac: 0.0 },
            AxisResize::Resampled { .. } => {
                // Integer numerator keeps the last index exact.
                let pos = (i * last) as f64 / (new as usize - 1) as f64;
                let i0 = (pos.floor() as usize).min(last);
                let i1 = (i0 + 1).min(last);
                Tap {
                    i0,
                    i1,
                    frac: pos - i0 as f64,
                }
            }
            AxisResize::Padded { offset } => {
                let src = (i as i64 - offset as i64).clamp(0, last as i64) as usize;
                Tap {
                    i0: src,
                    i1: src,
                    frac: 0.0,
                }
            }
        })
        .collect()
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t == 0.0 {
        a
    } else {
        a + (b - a) * t
    }
}

/// Resample or pad `values` (`old_w x old_h`, row-major) to `new_w x new_h`.
///
/// Returns the new samples and the per-axis plans.
pub fn resize_samples<T: Sample>(
    values: &[T],
    old_w: u32,
    old_h: u32,
    new_w: u32,
    new_h: u32,
) -> (Vec<T>, AxisResize, AxisResize) {
    debug_assert_eq!(values.len(), old_w as usize * old_h as usize);
    debug_assert!(old_w >= 2 && old_h >= 2 && new_w >= 2 && new_h >= 2);

    let plan_x = AxisResize::plan(old_w, new_w);
    let plan_y = AxisResize::plan(old_h, new_h);
    if plan_x == AxisResize::Unchanged && plan_y == AxisResize::Unchanged {
        return (values.to_vec(), plan_x, plan_y);
    }

    let taps_x = axis_taps(old_w, new_w, plan_x);
    let taps_y = axis_taps(old_h, new_h, plan_y);
    let stride = old_w as usize;

    let mut out = Vec::with_capacity(new_w as usize * new_h as usize);
    for ty in &taps_y {
        let row0 = &values[ty.i0 * stride..(ty.i0 + 1) * stride];
        let row1 = &values[ty.i1 * stride..(ty.i1 + 1) * stride];
        for tx in &taps_x {
            if tx.frac == 0.0 && ty.frac == 0.0 {
                out.push(row0[tx.i0]);
                continue;
            }
            let top = lerp(row0[tx.i0].to_f64(), row0[tx.i1].to_f64(), tx.frac);
            let bottom = lerp(row1[tx.i0].to_f64(), row1[tx.i1].to_f64(), tx.frac);
            out.push(T::from_f64(lerp(top, bottom, ty.frac)));
        }
    }
    (out, plan_x, plan_y)
}

/// Stateless grid resizer
#[derive(Debug, Clone, Copy, Default)]
pub struct GridResampler;

impl GridResampler {
    /// Resize `grid` to the canonical vertex counts.
    ///
    /// The grid's transform is carried over unchanged; placement adjusts
    /// for `resize_factor` and `pixel_offset`.
    pub fn resize<T: Sample>(grid: &GridBuffer<T>, canonical: &CanonicalSize) -> ResizeResult<T> {
        Self::resize_to(grid, canonical.width(), canonical.height())
    }

    pub fn resize_to<T: Sample>(grid: &GridBuffer<T>, new_w: u32, new_h: u32) -> ResizeResult<T> {
        let (old_w, old_h) = grid.dims();
        let (values, plan_x, plan_y) = resize_samples(grid.values(), old_w, old_h, new_w, new_h);

        let mut warnings = Vec::new();
        let from = (old_w, old_h);
        let to = (new_w, new_h);
        if matches!(plan_x, AxisResize::Padded { .. }) || matches!(plan_y, AxisResize::Padded { .. }) {
            warnings.push(ConversionWarning::Padded { from, to }.emit());
        }
        if matches!(plan_x, AxisResize::Resampled { .. }) || matches!(plan_y, AxisResize::Resampled { .. }) {
            warnings.push(ConversionWarning::Resampled { from, to }.emit());
        }

        ResizeResult {
            resized_grid: GridBuffer::from_raw(new_w, new_h, values, grid.transform),
            resize_factor: Vec3::new(plan_x.factor(), plan_y.factor(), 1.0),
            pixel_offset: (plan_x.offset(), plan_y.offset()),
            warnings,
        }
    }
}
