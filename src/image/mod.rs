//! Single channel floating point images returned by the renderer.

pub mod heatmap;
pub mod patch;

use crate::error::Error;
use heatmap::ColorMap;
use ::image::{ColorType, ExtendedColorType, Rgb32FImage};
use rayon::prelude::*;
use std::path::Path;

pub use heatmap::{Gray, Hot, Jet, render_heatmap};
pub use patch::{CONSOLE_PRECISION, FILE_PRECISION, Patch, Window};

/// A single channel image of floating point samples.
///
/// Samples are stored row-major. Renderers may produce non-finite samples, which are
/// ignored when computing ranges and mapped to zero when converting to bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    rows: usize,
    cols: usize,
    pixels: Vec<f64>,
}

impl Image {
    /// Create an image from a row-major buffer of `rows * cols` samples.
    pub fn from_vec(rows: usize, cols: usize, pixels: Vec<f64>) -> Result<Self, Error> {
        if pixels.len() != rows * cols {
            return Err(Error::InvalidInput(format!(
                "expected {} samples for a {rows}x{cols} image but got: {}",
                rows * cols,
                pixels.len()
            )));
        }

        Ok(Self { rows, cols, pixels })
    }

    /// Create an image by evaluating `f(row, col)` at every pixel.
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let pixels = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .map(|(row, col)| f(row, col))
            .collect();

        Self { rows, cols, pixels }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            pixels: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f64] {
        self.pixels.as_slice()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.pixels
    }

    /// Returns the sample at `(row, col)` if it is within the image, otherwise returns None.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        self.pixels.get(row * self.cols + col).copied()
    }

    /// Returns the smallest and largest finite samples.
    ///
    /// Returns `None` if the image has no finite samples.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.pixels)
    }

    /// Returns a copy of the image with every sample multiplied by `factor`.
    ///
    /// Useful to lift faint star fields into a visible range before saving.
    pub fn scaled(&self, factor: f64) -> Image {
        Self {
            rows: self.rows,
            cols: self.cols,
            pixels: self.pixels.par_iter().map(|v| v * factor).collect(),
        }
    }

    /// Maps the finite range of the image onto `0..=255`.
    pub fn gray8_bytes(&self) -> Vec<u8> {
        let (min, max) = self.finite_range().unwrap_or((0.0, 0.0));
        self.pixels
            .par_iter()
            .map(|v| (normalize(*v, min, max) * 255.).round() as u8)
            .collect()
    }

    /// Maps the finite range of the image through `map` into RGB bytes.
    pub fn rgb8_bytes<M: ColorMap + Sync>(&self, map: &M) -> Vec<u8> {
        let (min, max) = self.finite_range().unwrap_or((0.0, 0.0));
        self.pixels
            .par_iter()
            .flat_map_iter(|v| match v.is_finite() {
                true => map.rgb(normalize(*v, min, max)),
                false => [0, 0, 0],
            })
            .collect()
    }

    /// Save the image as an 8-bit grayscale image, normalized to its finite range.
    ///
    /// The format is chosen from the extension of `path`.
    pub fn save_gray8<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        ::image::save_buffer(
            path,
            &self.gray8_bytes(),
            self.cols as u32,
            self.rows as u32,
            ExtendedColorType::L8,
        )?;

        Ok(())
    }

    /// Save the raw samples as 32-bit floats, e.g. to a TIFF.
    ///
    /// Samples are replicated across three channels because the encoders only accept
    /// floating point RGB.
    pub fn save_float<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let data: Vec<f32> = self
            .pixels
            .iter()
            .flat_map(|v| [*v as f32; 3])
            .collect();

        Rgb32FImage::from_raw(self.cols as u32, self.rows as u32, data)
            .ok_or_else(|| Error::InvalidInput("image buffer does not match its dimensions".into()))?
            .save(path)?;

        Ok(())
    }

    /// Open an image file as a single channel image.
    ///
    /// Floating point files keep their samples, anything else is converted to 8-bit
    /// luminance on the range `0..=255`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let decoded = ::image::open(path)?;
        let (cols, rows) = (decoded.width() as usize, decoded.height() as usize);

        let pixels = match decoded.color() {
            ColorType::Rgb32F | ColorType::Rgba32F => decoded
                .to_rgb32f()
                .pixels()
                .map(|px| px.0[0] as f64)
                .collect(),
            _ => decoded
                .to_luma8()
                .into_raw()
                .into_iter()
                .map(f64::from)
                .collect(),
        };

        Self::from_vec(rows, cols, pixels)
    }
}

/// Returns the smallest and largest finite values of `samples`.
pub(crate) fn finite_range(samples: &[f64]) -> Option<(f64, f64)> {
    samples
        .par_iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| (v, v))
        .reduce_with(|(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)))
}

/// Map `x` from `[min, max]` onto `[0, 1]`.
///
/// Non-finite values and degenerate ranges map to zero.
pub(crate) fn normalize(x: f64, min: f64, max: f64) -> f64 {
    if !x.is_finite() || !(max > min) {
        return 0.0;
    }

    ((x - min) / (max - min)).clamp(0.0, 1.0)
}
