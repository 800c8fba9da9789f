use crate::error::Error;
use serde::{Deserialize, Serialize};

/// A point spread function sampled on a square pixel grid.
///
/// Kernel weights are stored row-major and sum to one. An empty kernel stands for
/// "no blur".
#[derive(Clone, Debug, PartialEq)]
pub struct Psf {
    size: usize,
    kernel: Vec<f64>,
}

impl Psf {
    /// Creates a `size` x `size` Gaussian kernel with standard deviation `sigma` in pixels.
    ///
    /// Sample offsets are `i - size / 2` using integer division, so even sizes are not
    /// centered.
    pub fn gaussian(size: usize, sigma: f64) -> Result<Self, Error> {
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(Error::InvalidInput(format!(
                "expected a positive, finite PSF sigma but got: {sigma}"
            )));
        }

        let half = (size / 2) as f64;
        let weights: Vec<f64> = (0..size)
            .flat_map(|row| (0..size).map(move |col| (row as f64 - half, col as f64 - half)))
            .map(|(y, x)| (-(x * x + y * y) / (2. * sigma * sigma)).exp())
            .collect();

        let total: f64 = weights.iter().sum();
        let kernel = weights.into_iter().map(|w| w / total).collect();

        Ok(Self { size, kernel })
    }

    /// Creates a `Psf` from explicit weights, normalizing them to sum to one.
    pub fn from_kernel(size: usize, kernel: Vec<f64>) -> Result<Self, Error> {
        if kernel.len() != size * size {
            return Err(Error::InvalidInput(format!(
                "expected {} PSF weights for a {size}x{size} kernel but got: {}",
                size * size,
                kernel.len()
            )));
        }

        if kernel.is_empty() {
            return Ok(Self { size, kernel });
        }

        let total: f64 = kernel.iter().sum();
        if !(total > 0.0) || !total.is_finite() || kernel.iter().any(|w| *w < 0.0) {
            return Err(Error::InvalidInput(
                "PSF weights must be non-negative with a positive, finite sum".into(),
            ));
        }

        Ok(Self {
            size,
            kernel: kernel.into_iter().map(|w| w / total).collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.size
    }

    pub fn cols(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.kernel
    }

    /// Returns the weight at `(row, col)` if it is inside the kernel.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.size || col >= self.size {
            return None;
        }

        self.kernel.get(row * self.size + col).copied()
    }

    /// Returns the margin in pixels the renderer keeps around a point source for this kernel.
    pub fn support_distance(&self) -> usize {
        self.rows().max(self.cols()) / 2 + 2
    }
}

/// Serializable description of a [`Psf`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PsfConfig {
    Gaussian { size: usize, sigma: f64 },
}

impl TryFrom<PsfConfig> for Psf {
    type Error = Error;

    fn try_from(config: PsfConfig) -> Result<Self, Self::Error> {
        match config {
            PsfConfig::Gaussian { size, sigma } => Psf::gaussian(size, sigma),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    #[case(11)]
    fn gaussian_sums_to_one(#[case] size: usize) {
        let psf = Psf::gaussian(size, 1.0).unwrap();
        assert_eq!(psf.as_slice().len(), size * size);
        assert_relative_eq!(psf.as_slice().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn gaussian_peaks_at_center() {
        let psf = Psf::gaussian(5, 0.8).unwrap();
        let center = psf.get(2, 2).unwrap();
        assert!(psf.as_slice().iter().all(|w| *w <= center));

        // Symmetric about the center.
        assert_eq!(psf.get(0, 1), psf.get(1, 0));
        assert_eq!(psf.get(4, 2), psf.get(0, 2));
        assert_relative_eq!(
            psf.get(2, 3).unwrap() / center,
            (-1.0f64 / (2. * 0.8 * 0.8)).exp(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn zero_size_is_empty() {
        let psf = Psf::gaussian(0, 1.0).unwrap();
        assert!(psf.is_empty());
        assert_eq!(psf.get(0, 0), None);
        assert_eq!(psf.support_distance(), 2);
    }

    #[rstest]
    #[case(0, 2)]
    #[case(3, 3)]
    #[case(7, 5)]
    #[case(11, 7)]
    fn support_distance(#[case] size: usize, #[case] distance: usize) {
        assert_eq!(Psf::gaussian(size, 1.0).unwrap().support_distance(), distance);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn invalid_sigma(#[case] sigma: f64) {
        assert!(matches!(Psf::gaussian(3, sigma), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn explicit_kernel_normalized() {
        let psf = Psf::from_kernel(2, vec![1.0, 1.0, 1.0, 5.0]).unwrap();
        assert_eq!(psf.as_slice(), &[0.125, 0.125, 0.125, 0.625]);
        assert!(Psf::from_kernel(2, vec![1.0; 3]).is_err());
        assert!(Psf::from_kernel(1, vec![-1.0]).is_err());
    }

    #[test]
    fn config_round_trip() {
        let config: PsfConfig =
            serde_json::from_str(r#"{ "kind": "gaussian", "size": 3, "sigma": 0.25 }"#).unwrap();
        let psf = Psf::try_from(config).unwrap();
        assert_eq!(psf.rows(), 3);
    }
}
