//! Regression checks that compare rendered images against references.
//!
//! Per pixel errors are binned into an [`ErrorHistogram`]. A check passes when the error
//! at a chosen quantile stays under the limit recorded in [`Thresholds`].

use crate::{error::Error, image::Image};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use tracing::debug;

/// Histogram of normalized absolute errors over `[0, 1]`.
///
/// Errors are divided by the finite range of the reference image. Errors beyond the
/// range land in the last bin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorHistogram {
    counts: Vec<u64>,
}

impl ErrorHistogram {
    /// Bins the errors of `image` against `reference`.
    ///
    /// Pixels where either image is not finite are skipped. A reference without any
    /// spread in its finite samples is compared with absolute errors.
    pub fn between(image: &Image, reference: &Image, bins: usize) -> Result<Self, Error> {
        if bins == 0 {
            return Err(Error::InvalidInput("histogram needs at least one bin".into()));
        }

        if (image.rows(), image.cols()) != (reference.rows(), reference.cols()) {
            return Err(Error::InvalidInput(format!(
                "image of {}x{} does not match reference of {}x{}",
                image.rows(),
                image.cols(),
                reference.rows(),
                reference.cols()
            )));
        }

        let span = match reference.finite_range() {
            Some((min, max)) if max > min => max - min,
            _ => 1.0,
        };

        let counts = image
            .as_slice()
            .par_iter()
            .zip(reference.as_slice().par_iter())
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| {
                let error = (a - b).abs() / span;
                ((error * bins as f64) as usize).min(bins - 1)
            })
            .fold(
                || vec![0u64; bins],
                |mut counts, bin| {
                    counts[bin] += 1;
                    counts
                },
            )
            .reduce(
                || vec![0u64; bins],
                |a, b| a.iter().zip(&b).map(|(x, y)| x + y).collect(),
            );

        let histogram = Self { counts };
        debug!(
            bins,
            samples = histogram.total(),
            span,
            "computed error histogram"
        );
        Ok(histogram)
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of pixel pairs that were compared.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn bin_width(&self) -> f64 {
        1.0 / self.bins() as f64
    }

    /// Fraction of compared pixels in bins starting at or above `error`.
    pub fn fraction_above(&self, error: f64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        let above: u64 = self
            .counts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i as f64 * self.bin_width() >= error)
            .map(|(_, count)| count)
            .sum();

        above as f64 / total as f64
    }

    /// Smallest bin upper edge below which at least a fraction `q` of the errors fall.
    ///
    /// Returns zero for an empty histogram.
    pub fn quantile(&self, q: f64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        let wanted = q.clamp(0.0, 1.0) * total as f64;
        let mut cumulative = 0;
        for (i, count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative as f64 >= wanted {
                return (i + 1) as f64 * self.bin_width();
            }
        }

        1.0
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        write_json(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        read_json(path)
    }
}

/// Pass criteria for a regression check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Quantile of the error histogram that is checked.
    pub quantile: f64,

    /// Largest allowed error at `quantile`.
    pub max_error: f64,
}

impl Thresholds {
    /// Derives thresholds from a known good histogram, scaling its error at `quantile`
    /// by `margin`.
    pub fn from_histogram(histogram: &ErrorHistogram, quantile: f64, margin: f64) -> Self {
        Self {
            quantile,
            max_error: histogram.quantile(quantile) * margin,
        }
    }

    /// Fails when no pixel pair could be compared.
    pub fn check(&self, histogram: &ErrorHistogram) -> Verdict {
        let samples = histogram.total();
        let error = histogram.quantile(self.quantile);
        Verdict {
            quantile: self.quantile,
            error,
            max_error: self.max_error,
            samples,
            passed: samples > 0 && error <= self.max_error,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        write_json(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        read_json(path)
    }
}

/// Outcome of [`Thresholds::check`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Verdict {
    pub quantile: f64,
    pub error: f64,
    pub max_error: f64,
    pub samples: u64,
    pub passed: bool,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.samples == 0 {
            return write!(f, "FAIL: no finite pixels compared");
        }

        write!(
            f,
            "{}: error {:.6} at quantile {} (max {:.6})",
            if self.passed { "PASS" } else { "FAIL" },
            self.error,
            self.quantile,
            self.max_error
        )
    }
}

fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, Error> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn reference() -> Image {
        Image::from_fn(4, 5, |row, col| (row * 5 + col) as f64)
    }

    #[test]
    fn identical_images_fall_in_first_bin() {
        let histogram = ErrorHistogram::between(&reference(), &reference(), 10).unwrap();
        assert_eq!(histogram.counts()[0], 20);
        assert_eq!(histogram.total(), 20);
        assert_relative_eq!(histogram.quantile(1.0), 0.1);
        assert_eq!(histogram.fraction_above(0.1), 0.0);
    }

    #[test]
    fn errors_normalized_by_reference_range() {
        // Range of the reference is 19.
        let shifted = Image::from_fn(4, 5, |row, col| match (row, col) {
            (0, 0) => 9.5,
            (3, 4) => 19.0 + 19.0 * 2.0,
            _ => (row * 5 + col) as f64,
        });

        let histogram = ErrorHistogram::between(&shifted, &reference(), 4).unwrap();
        assert_eq!(histogram.counts(), &[18, 0, 1, 1]);
        assert_relative_eq!(histogram.fraction_above(0.5), 0.1);
        assert_relative_eq!(histogram.quantile(0.9), 0.25);
        assert_relative_eq!(histogram.quantile(0.95), 0.75);
        assert_relative_eq!(histogram.quantile(1.0), 1.0);
    }

    #[test]
    fn non_finite_pairs_skipped() {
        let mut pixels = reference().into_vec();
        pixels[3] = f64::NAN;
        pixels[7] = f64::INFINITY;
        let image = Image::from_vec(4, 5, pixels).unwrap();

        let histogram = ErrorHistogram::between(&image, &reference(), 8).unwrap();
        assert_eq!(histogram.total(), 18);
    }

    #[rstest]
    #[case(Image::zeros(4, 4), 10)]
    #[case(Image::zeros(4, 5), 0)]
    fn invalid_comparisons(#[case] image: Image, #[case] bins: usize) {
        assert!(matches!(
            ErrorHistogram::between(&image, &reference(), bins),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_histogram() {
        let nan = Image::from_vec(1, 1, vec![f64::NAN]).unwrap();
        let histogram = ErrorHistogram::between(&nan, &nan, 5).unwrap();
        assert_eq!(histogram.quantile(0.5), 0.0);
        assert_eq!(histogram.fraction_above(0.0), 0.0);
    }

    #[test]
    fn thresholds_pass_and_fail() {
        let good = ErrorHistogram::between(&reference(), &reference(), 10).unwrap();
        let thresholds = Thresholds::from_histogram(&good, 0.99, 2.0);
        assert_relative_eq!(thresholds.max_error, 0.2);
        assert!(thresholds.check(&good).passed);

        let bad_image = reference().scaled(3.0);
        let bad = ErrorHistogram::between(&bad_image, &reference(), 10).unwrap();
        let verdict = thresholds.check(&bad);
        assert!(!verdict.passed);
        assert!(verdict.to_string().starts_with("FAIL"));
    }

    #[test]
    fn nothing_compared_fails() {
        let nan = Image::from_vec(2, 2, vec![f64::NAN; 4]).unwrap();
        let finite = Image::from_fn(2, 2, |row, col| (row + col) as f64);
        let histogram = ErrorHistogram::between(&nan, &finite, 10).unwrap();

        let thresholds = Thresholds {
            quantile: 0.999,
            max_error: 0.01,
        };
        let verdict = thresholds.check(&histogram);
        assert_eq!(verdict.samples, 0);
        assert!(!verdict.passed);
        assert_eq!(verdict.to_string(), "FAIL: no finite pixels compared");
    }

    #[test]
    fn thresholds_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");

        let thresholds = Thresholds {
            quantile: 0.999,
            max_error: 0.05,
        };
        thresholds.save(&path).unwrap();
        assert_eq!(Thresholds::load(&path).unwrap(), thresholds);
    }
}
