//! Rectangular sample grids with a spatial transform.
//!
//! Samples are stored row-major: `values[y * width + x]`. A grid needs at
//! least two samples per axis to be resampled or converted.

use crate::error::{ConversionError, ConversionResult};
use crate::transforms::Transform;

/// Numeric sample stored in a grid. Resampling goes through `f64`;
/// integer samples round and clamp on the way back.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Sample for u16 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, u16::MAX as f64) as u16
    }
}

impl Sample for u8 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, u8::MAX as f64) as u8
    }
}

/// Check the dimensions and sample count of a row-major grid
pub fn validate_dims(width: u32, height: u32, len: usize) -> ConversionResult<()> {
    if width < 2 || height < 2 {
        return Err(ConversionError::invalid_grid(width, height));
    }
    let expected = width as usize * height as usize;
    if len != expected {
        return Err(ConversionError::LengthMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Owned grid of samples plus the transform placing it in space
#[derive(Debug, Clone, PartialEq)]
pub struct GridBuffer<T: Sample = f32> {
    width: u32,
    height: u32,
    values: Vec<T>,
    pub transform: Transform,
}

impl<T: Sample> GridBuffer<T> {
    pub fn new(width: u32, height: u32, values: Vec<T>, transform: Transform) -> ConversionResult<Self> {
        validate_dims(width, height, values.len())?;
        Ok(Self {
            width,
            height,
            values,
            transform,
        })
    }

    /// Build from parts already validated by another grid type
    pub(crate) fn from_raw(width: u32, height: u32, values: Vec<T>, transform: Transform) -> Self {
        debug_assert!(validate_dims(width, height, values.len()).is_ok());
        Self {
            width,
            height,
            values,
            transform,
        }
    }

    pub fn filled(width: u32, height: u32, value: T, transform: Transform) -> ConversionResult<Self> {
        let len = width as usize * height as usize;
        Self::new(width, height, vec![value; len], transform)
    }

    pub fn from_fn<F>(width: u32, height: u32, transform: Transform, mut f: F) -> ConversionResult<Self>
    where
        F: FnMut(u32, u32) -> T,
    {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self::new(width, height, values, transform)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x < self.width && y < self.height {
            Some(self.values[self.index(x, y)])
        } else {
            None
        }
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) -> bool {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.values[idx] = value;
            true
        } else {
            false
        }
    }

    pub fn row(&self, y: u32) -> &[T] {
        let start = y as usize * self.width as usize;
        &self.values[start..start + self.width as usize]
    }

    /// Swap rows and columns. Sources that store samples column-major
    /// come out row-major, with width and height exchanged.
    pub fn transposed(&self) -> Self {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut values = Vec::with_capacity(w * h);
        for x in 0..w {
            for y in 0..h {
                values.push(self.values[y * w + x]);
            }
        }
        Self {
            width: self.height,
            height: self.width,
            values,
            transform: self.transform,
        }
    }

}

impl GridBuffer<f32> {
    /// `(min, max)` of the samples
    pub fn min_max(&self) -> (f32, f32) {
        crate::terrain_stats::min_max(&self.values)
    }
}
