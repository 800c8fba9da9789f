//! Rectangular windows around a pixel of interest and their text reports.

use super::{Image, finite_range};
use crate::error::Error;
use chrono::Utc;
use std::{fmt, fs::OpenOptions, io::Write, path::Path};
use tracing::{debug, warn};

/// Decimal places used when printing a report to a terminal.
pub const CONSOLE_PRECISION: usize = 8;

/// Decimal places used when appending a report to a file.
pub const FILE_PRECISION: usize = 16;

/// A window of `2 * half_height + 1` rows by `2 * half_width + 1` columns centered on a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub center_row: usize,
    pub center_col: usize,
    pub half_height: usize,
    pub half_width: usize,
}

impl Window {
    pub fn new(center_row: usize, center_col: usize, half_height: usize, half_width: usize) -> Self {
        Self {
            center_row,
            center_col,
            half_height,
            half_width,
        }
    }

    pub fn square(center_row: usize, center_col: usize, half_size: usize) -> Self {
        Self::new(center_row, center_col, half_size, half_size)
    }

    pub fn rows(&self) -> usize {
        self.half_height.saturating_mul(2).saturating_add(1)
    }

    pub fn cols(&self) -> usize {
        self.half_width.saturating_mul(2).saturating_add(1)
    }

    /// Index of the first image row in the window.
    pub fn top(&self) -> usize {
        self.center_row.saturating_sub(self.half_height)
    }

    /// Index of the first image column in the window.
    pub fn left(&self) -> usize {
        self.center_col.saturating_sub(self.half_width)
    }

    /// Returns true if every pixel of the window lies inside an image of the given size.
    pub fn fits(&self, image_rows: usize, image_cols: usize) -> bool {
        let fits_axis = |center: usize, half: usize, len: usize| {
            center >= half
                && center
                    .checked_add(half)
                    .is_some_and(|last| last < len)
        };

        fits_axis(self.center_row, self.half_height, image_rows)
            && fits_axis(self.center_col, self.half_width, image_cols)
    }
}

/// A borrowed view of an [`Image`] through a [`Window`] that fits inside it.
#[derive(Clone, Copy, Debug)]
pub struct Patch<'a> {
    image: &'a Image,
    window: Window,
}

impl Image {
    /// Borrow the pixels inside `window`.
    ///
    /// Fails with [`Error::BoundsExceeded`] if any part of the window lies outside the image.
    pub fn patch(&self, window: Window) -> Result<Patch<'_>, Error> {
        if !window.fits(self.rows, self.cols) {
            return Err(Error::BoundsExceeded {
                center_row: window.center_row,
                center_col: window.center_col,
                rows: window.rows(),
                cols: window.cols(),
                image_rows: self.rows,
                image_cols: self.cols,
            });
        }

        debug!(?window, "extracted patch");
        Ok(Patch {
            image: self,
            window,
        })
    }

    /// Like [`Image::patch`] but logs a warning and returns `None` when the window does not fit.
    pub fn get_patch(&self, window: Window) -> Option<Patch<'_>> {
        match self.patch(window) {
            Ok(patch) => Some(patch),
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }
}

impl<'a> Patch<'a> {
    pub fn window(&self) -> Window {
        self.window
    }

    pub fn rows(&self) -> usize {
        self.window.rows()
    }

    pub fn cols(&self) -> usize {
        self.window.cols()
    }

    /// Returns the sample at `(row, col)` relative to the top left corner of the patch.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }

        self.image
            .get(self.window.top() + row, self.window.left() + col)
    }

    /// Returns the sample at the window center.
    pub fn center(&self) -> f64 {
        self.get(self.window.half_height, self.window.half_width)
            .unwrap_or(f64::NAN)
    }

    /// Iterates over the rows of the patch as slices of the underlying image.
    pub fn lines(&self) -> impl Iterator<Item = &'a [f64]> + '_ {
        let (left, cols) = (self.window.left(), self.cols());
        let image = self.image;
        (self.window.top()..self.window.top() + self.rows()).map(move |row| {
            let start = row * image.cols() + left;
            &image.as_slice()[start..start + cols]
        })
    }

    /// Copies the patch into an owned image.
    pub fn to_image(&self) -> Image {
        Image {
            rows: self.rows(),
            cols: self.cols(),
            pixels: self.lines().flatten().copied().collect(),
        }
    }

    /// Returns the smallest and largest finite samples in the patch.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.lines().flatten().copied().collect::<Vec<f64>>())
    }

    /// Formats the patch as a text table with `precision` decimal places.
    ///
    /// Every line is labelled with its image row. The center pixel is wrapped in brackets.
    pub fn format_report(&self, precision: usize) -> String {
        let mut report = String::from("Extract :\n");

        for (i, line) in self.lines().enumerate() {
            let mut text = format!("  line {:3} :", self.window.top() + i);
            for (j, v) in line.iter().enumerate() {
                let cell = match (i == self.window.half_height, j == self.window.half_width) {
                    (true, true) => format!(" [{v:.precision$}]"),
                    _ => format!("  {v:.precision$} "),
                };
                text.push_str(&cell);
            }
            report.push_str(text.trim_end());
            report.push('\n');
        }

        report
    }

    /// Appends a timestamped, full precision report to the file at `path`, creating it if needed.
    pub fn append_report<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        writeln!(file, "# generated_at={}", Utc::now().to_rfc3339())?;
        file.write_all(self.format_report(FILE_PRECISION).as_bytes())?;

        debug!(path = %path.as_ref().display(), "appended patch report");
        Ok(())
    }
}

impl fmt::Display for Patch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_report(CONSOLE_PRECISION))
    }
}
