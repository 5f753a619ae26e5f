use serde::{Deserialize, Serialize};

use crate::data::model::{FeatureVector, Spectrum};
use crate::error::ProcessingError;

const STAGE: &str = "resampling";

/// `n` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut grid: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            grid[n - 1] = end;
            grid
        }
    }
}

/// Piecewise-linear value of `(xs, ys)` at `x`; outside `xs` the first or
/// last segment is extended. `xs` must be strictly increasing with >= 2 points.
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    let segment = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let (x0, x1) = (xs[segment - 1], xs[segment]);
    let (y0, y1) = (ys[segment - 1], ys[segment]);
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Interpolate `spectrum` at every point of `grid`.
pub fn resample_onto(spectrum: &Spectrum, grid: &[f64]) -> Result<FeatureVector, ProcessingError> {
    if spectrum.len() < 2 {
        return Err(ProcessingError::TooShort {
            stage: STAGE,
            len: spectrum.len(),
            required: 2,
        });
    }
    let (mz, intensity) = (spectrum.mz(), spectrum.intensity());
    Ok(grid.iter().map(|&x| interpolate(mz, intensity, x)).collect())
}

/// Resample onto `target_length` points spanning the spectrum's own m/z range.
pub fn resample(spectrum: &Spectrum, target_length: usize) -> Result<FeatureVector, ProcessingError> {
    check_length(target_length)?;
    let grid = linspace(spectrum.min_mz(), spectrum.max_mz(), target_length);
    resample_onto(spectrum, &grid)
}

fn check_length(target_length: usize) -> Result<(), ProcessingError> {
    if target_length < 2 {
        return Err(ProcessingError::InvalidParameter {
            stage: STAGE,
            message: format!("target length {target_length} is below 2"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resampler – grid policy + length
// ---------------------------------------------------------------------------

/// Where the uniform grid comes from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Grid {
    /// Each spectrum's own post-trim `[min mz, max mz]`.
    #[default]
    PerSpectrum,
    /// One grid for every spectrum, so feature `k` is the same m/z everywhere.
    Fixed { min_mz: f64, max_mz: f64 },
}

/// User-facing grid choice; `Shared` becomes [`Grid::Fixed`] over the trim range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    #[default]
    PerSpectrum,
    Shared,
}

/// Turns preprocessed spectra into fixed-length feature vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Resampler {
    pub target_length: usize,
    pub grid: Grid,
}

impl Resampler {
    pub fn new(target_length: usize, grid: Grid) -> Result<Self, ProcessingError> {
        check_length(target_length)?;
        if let Grid::Fixed { min_mz, max_mz } = grid {
            if !(min_mz.is_finite() && max_mz.is_finite() && min_mz < max_mz) {
                return Err(ProcessingError::InvalidParameter {
                    stage: STAGE,
                    message: format!("empty shared grid [{min_mz}, {max_mz}]"),
                });
            }
        }
        Ok(Resampler {
            target_length,
            grid,
        })
    }

    pub fn features(&self, spectrum: &Spectrum) -> Result<FeatureVector, ProcessingError> {
        match self.grid {
            Grid::PerSpectrum => resample(spectrum, self.target_length),
            Grid::Fixed { min_mz, max_mz } => {
                resample_onto(spectrum, &linspace(min_mz, max_mz, self.target_length))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(mz: Vec<f64>, intensity: Vec<f64>) -> Spectrum {
        Spectrum::new(mz, intensity).unwrap()
    }

    #[test]
    fn output_has_target_length() {
        let sp = spectrum(vec![2000.0, 2100.0, 2500.0, 9000.0], vec![0.1, 0.4, 0.2, 0.3]);
        for len in [2, 3, 17, 1000] {
            assert_eq!(resample(&sp, len).unwrap().len(), len);
        }
    }

    #[test]
    fn resampling_a_uniform_spectrum_is_identity() {
        let mz = linspace(2000.0, 20000.0, 1000);
        let intensity: Vec<f64> = (0..1000).map(|i| ((i as f64) * 0.05).sin().abs()).collect();
        let sp = spectrum(mz, intensity.clone());
        let out = resample(&sp, 1000).unwrap();
        for (a, b) in out.iter().zip(&intensity) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn interpolates_between_points_and_extrapolates_outside() {
        let xs = [0.0, 1.0, 3.0];
        let ys = [0.0, 2.0, 6.0];
        assert_eq!(interpolate(&xs, &ys, 0.5), 1.0);
        assert_eq!(interpolate(&xs, &ys, 2.0), 4.0);
        assert_eq!(interpolate(&xs, &ys, -1.0), -2.0);
        assert_eq!(interpolate(&xs, &ys, 4.0), 8.0);
        assert_eq!(interpolate(&xs, &ys, 3.0), 6.0);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let single = spectrum(vec![5000.0], vec![1.0]);
        assert!(matches!(resample(&single, 10), Err(ProcessingError::TooShort { .. })));

        let sp = spectrum(vec![1.0, 2.0], vec![1.0, 1.0]);
        assert!(matches!(resample(&sp, 1), Err(ProcessingError::InvalidParameter { .. })));
        assert!(Resampler::new(10, Grid::Fixed { min_mz: 3.0, max_mz: 3.0 }).is_err());
    }

    #[test]
    fn shared_grid_aligns_features_across_spectra() {
        let resampler = Resampler::new(
            5,
            Grid::Fixed {
                min_mz: 0.0,
                max_mz: 4.0,
            },
        )
        .unwrap();
        let a = spectrum(vec![0.0, 4.0], vec![0.0, 4.0]);
        let b = spectrum(vec![1.0, 3.0], vec![1.0, 3.0]);
        // Same linear signal, different coverage: identical features on a shared grid.
        assert_eq!(resampler.features(&a).unwrap(), resampler.features(&b).unwrap());
        assert_eq!(resampler.features(&a).unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let grid = linspace(2000.0, 20000.0, 7);
        assert_eq!(grid.first(), Some(&2000.0));
        assert_eq!(grid.last(), Some(&20000.0));
        assert_eq!(grid.len(), 7);
    }
}
