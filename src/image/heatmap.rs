use super::{Patch, normalize};
use crate::error::Error;
use ::image::{ExtendedColorType, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Maps a value on the unit interval to an RGB color.
pub trait ColorMap {
    /// Returns the color for `t`, where `t` is expected on the range `[0, 1]`.
    ///
    /// Values outside the range are clamped and NaN maps to the color of zero.
    fn rgb(&self, t: f64) -> [u8; 3];

    /// Map an f64 on the interval `[x_min, x_max]` to an RGB color.
    ///
    /// Returns `None` if `x` is outside the interval.
    fn map(&self, x: f64, x_min: f64, x_max: f64) -> Option<[u8; 3]> {
        if !(x_min..=x_max).contains(&x) {
            return None;
        }

        Some(self.rgb(normalize(x, x_min, x_max)))
    }
}

fn channel(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.).round() as u8
}

fn unit(t: f64) -> f64 {
    match t.is_nan() {
        true => 0.0,
        false => t.clamp(0.0, 1.0),
    }
}

/// Black through red and yellow to white.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hot;

impl ColorMap for Hot {
    fn rgb(&self, t: f64) -> [u8; 3] {
        let t = unit(t);
        [
            channel(t / 0.375),
            channel((t - 0.375) / 0.375),
            channel((t - 0.75) / 0.25),
        ]
    }
}

/// Dark blue through cyan and yellow to dark red.
#[derive(Clone, Copy, Debug, Default)]
pub struct Jet;

impl ColorMap for Jet {
    fn rgb(&self, t: f64) -> [u8; 3] {
        let t = unit(t);
        [
            channel(1.5 - (4. * t - 3.).abs()),
            channel(1.5 - (4. * t - 2.).abs()),
            channel(1.5 - (4. * t - 1.).abs()),
        ]
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Gray;

impl ColorMap for Gray {
    fn rgb(&self, t: f64) -> [u8; 3] {
        [channel(unit(t)); 3]
    }
}

/// Renders `patch` as a false color PNG with a color bar along its right edge.
///
/// Each patch sample becomes a `scale` x `scale` block. The bar spans the full height
/// with the patch maximum at the top and the minimum at the bottom. Non-finite samples
/// are drawn black.
pub fn render_heatmap<M: ColorMap>(patch: &Patch, map: &M, scale: u32) -> Result<Vec<u8>, Error> {
    if scale == 0 {
        return Err(Error::InvalidInput("heatmap scale must be non-zero".into()));
    }

    let (min, max) = patch.finite_range().unwrap_or((0.0, 0.0));
    let scale = scale as usize;
    let map_width = patch.cols() * scale;
    let width = map_width + 2 * scale;
    let height = patch.rows() * scale;

    debug!(min, max, width, height, "rendering patch heatmap");

    let mut bytes = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let color = if x < map_width {
                match patch.get(y / scale, x / scale) {
                    Some(v) if v.is_finite() => map.rgb(normalize(v, min, max)),
                    _ => [0, 0, 0],
                }
            } else if x < map_width + scale / 2 {
                // Gap between the map and the bar.
                [255, 255, 255]
            } else {
                map.rgb(1.0 - y as f64 / (height.max(2) - 1) as f64)
            };
            bytes.extend_from_slice(&color);
        }
    }

    let mut png_bytes: Vec<u8> = Vec::new();
    ::image::write_buffer_with_format(
        &mut Cursor::new(&mut png_bytes),
        &bytes,
        width as u32,
        height as u32,
        ExtendedColorType::Rgb8,
        ImageFormat::Png,
    )?;

    Ok(png_bytes)
}
