use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::Transform;
use crate::data::model::Spectrum;
use crate::error::ProcessingError;

/// Savitzky-Golay smoothing on the intensity index axis.
///
/// Each point is replaced by the value at its centre of the least-squares
/// polynomial of degree `poly_order` fitted over a window of
/// `2 * half_window + 1` points. The first and last `half_window` points are
/// evaluated on the polynomial fitted to the first and last full window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smoother {
    pub half_window: usize,
    pub poly_order: usize,
}

impl Default for Smoother {
    fn default() -> Self {
        Self {
            half_window: 10,
            poly_order: 3,
        }
    }
}

impl Smoother {
    pub fn window(&self) -> usize {
        2 * self.half_window + 1
    }

    /// Least-squares projection `(VᵀV)⁻¹Vᵀ` for a window centred on zero:
    /// row `j` maps window samples to the fitted coefficient of `x^j`.
    fn projection(&self) -> Result<DMatrix<f64>, ProcessingError> {
        let window = self.window();
        if self.poly_order >= window {
            return Err(ProcessingError::InvalidParameter {
                stage: self.name(),
                message: format!(
                    "poly_order {} must be less than the window length {window}",
                    self.poly_order
                ),
            });
        }
        let half = self.half_window as f64;
        let vander = DMatrix::from_fn(window, self.poly_order + 1, |r, c| {
            (r as f64 - half).powi(c as i32)
        });
        let normal = vander.transpose() * &vander;
        let inverse = normal
            .try_inverse()
            .ok_or_else(|| ProcessingError::InvalidParameter {
                stage: self.name(),
                message: "singular least-squares system".to_string(),
            })?;
        Ok(inverse * vander.transpose())
    }
}

/// Horner evaluation of `Σ c_j x^j`.
fn evaluate(coefficients: &DVector<f64>, x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

impl Transform for Smoother {
    fn name(&self) -> &'static str {
        "smoothing"
    }

    fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError> {
        let y = spectrum.intensity();
        let n = y.len();
        let window = self.window();
        let half = self.half_window;
        let projection = self.projection()?;
        if n < window {
            return Err(ProcessingError::TooShort {
                stage: self.name(),
                len: n,
                required: window,
            });
        }

        // Convolution weights of the centre point.
        let weights: Vec<f64> = projection.row(0).iter().copied().collect();
        let mut smoothed = vec![0.0; n];
        for (i, out) in smoothed.iter_mut().enumerate().take(n - half).skip(half) {
            let segment = &y[i - half..=i + half];
            *out = weights.iter().zip(segment).map(|(w, v)| w * v).sum();
        }

        let head = &projection * DVector::from_column_slice(&y[..window]);
        for (i, out) in smoothed.iter_mut().enumerate().take(half) {
            *out = evaluate(&head, i as f64 - half as f64);
        }

        let tail_start = n - window;
        let tail = &projection * DVector::from_column_slice(&y[tail_start..]);
        for (i, out) in smoothed.iter_mut().enumerate().skip(n - half) {
            *out = evaluate(&tail, (i - tail_start) as f64 - half as f64);
        }

        spectrum.with_intensity(smoothed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_support::peaked_spectrum;

    fn spectrum_from(intensity: Vec<f64>) -> Spectrum {
        let mz = (0..intensity.len()).map(|i| i as f64).collect();
        Spectrum::new(mz, intensity).unwrap()
    }

    #[test]
    fn cubic_is_reproduced_exactly() {
        // A polynomial of degree <= poly_order is a fixed point, edges included.
        let y: Vec<f64> = (0..60)
            .map(|i| {
                let x = i as f64 * 0.1;
                0.5 * x * x * x - 2.0 * x * x + x + 3.0
            })
            .collect();
        let out = Smoother::default().apply(&spectrum_from(y.clone())).unwrap();
        for (a, b) in out.intensity().iter().zip(&y) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn known_quadratic_window_weights() {
        // Classic 5-point quadratic coefficients: (-3, 12, 17, 12, -3) / 35.
        let smoother = Smoother {
            half_window: 2,
            poly_order: 2,
        };
        let projection = smoother.projection().unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0];
        for (w, e) in projection.row(0).iter().zip(expected) {
            assert!((w - e / 35.0).abs() < 1e-12);
        }
    }

    #[test]
    fn smoothing_reduces_ripple_and_keeps_length() {
        let sp = peaked_spectrum();
        let out = Smoother::default().apply(&sp).unwrap();
        assert_eq!(out.len(), sp.len());
        assert_eq!(out.mz(), sp.mz());

        let roughness = |v: &[f64]| v.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>();
        assert!(roughness(out.intensity()) < roughness(sp.intensity()));
    }

    #[test]
    fn rejects_short_spectra_and_bad_orders() {
        let short = spectrum_from(vec![1.0; 10]);
        assert!(matches!(
            Smoother::default().apply(&short),
            Err(ProcessingError::TooShort { required: 21, .. })
        ));

        let bad = Smoother {
            half_window: 1,
            poly_order: 3,
        };
        assert!(matches!(
            bad.apply(&spectrum_from(vec![1.0; 10])),
            Err(ProcessingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn zero_half_window_is_identity() {
        let sp = spectrum_from(vec![3.0, 1.0, 4.0, 1.0, 5.0]);
        let out = Smoother {
            half_window: 0,
            poly_order: 0,
        }
        .apply(&sp)
        .unwrap();
        assert_eq!(out.intensity(), sp.intensity());
    }
}
