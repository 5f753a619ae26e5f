use serde::{Deserialize, Serialize};

use super::Transform;
use crate::data::model::Spectrum;
use crate::error::ProcessingError;

// ---------------------------------------------------------------------------
// Variance stabilization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizeMethod {
    #[default]
    Sqrt,
    /// `ln(1 + x)`
    Log,
    /// `log2(1 + x)`
    Log2,
    /// `log10(1 + x)`
    Log10,
}

/// Makes noise variance roughly independent of signal level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VarStabilizer {
    pub method: StabilizeMethod,
}

impl Transform for VarStabilizer {
    fn name(&self) -> &'static str {
        "variance stabilization"
    }

    fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError> {
        let f: fn(f64) -> f64 = match self.method {
            StabilizeMethod::Sqrt => f64::sqrt,
            StabilizeMethod::Log => f64::ln_1p,
            StabilizeMethod::Log2 => |v: f64| v.ln_1p() / std::f64::consts::LN_2,
            StabilizeMethod::Log10 => |v: f64| v.ln_1p() / std::f64::consts::LN_10,
        };
        spectrum.with_intensity(spectrum.intensity().iter().map(|&v| f(v)).collect())
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    /// Unit total intensity.
    #[default]
    Sum,
    /// Unit maximum intensity.
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalizer {
    pub method: NormalizeMethod,
}

impl Transform for Normalizer {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError> {
        let values = spectrum.intensity();
        let norm = match self.method {
            NormalizeMethod::Sum => values.iter().sum::<f64>(),
            NormalizeMethod::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        if !norm.is_finite() || norm <= 0.0 {
            return Err(ProcessingError::DegenerateNorm {
                stage: self.name(),
                norm,
            });
        }
        spectrum.with_intensity(values.iter().map(|&v| v / norm).collect())
    }
}

// ---------------------------------------------------------------------------
// Trimming
// ---------------------------------------------------------------------------

/// Keeps the points with `min_mz <= mz <= max_mz`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trimmer {
    pub min_mz: f64,
    pub max_mz: f64,
}

impl Default for Trimmer {
    fn default() -> Self {
        Self {
            min_mz: 2000.0,
            max_mz: 20000.0,
        }
    }
}

impl Trimmer {
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if !(self.min_mz.is_finite() && self.max_mz.is_finite() && self.min_mz < self.max_mz) {
            return Err(ProcessingError::InvalidParameter {
                stage: "trimming",
                message: format!("empty range [{}, {}]", self.min_mz, self.max_mz),
            });
        }
        Ok(())
    }
}

impl Transform for Trimmer {
    fn name(&self) -> &'static str {
        "trimming"
    }

    fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError> {
        self.validate()?;
        // mz is sorted, so the kept points form one contiguous run.
        let mz = spectrum.mz();
        let start = mz.partition_point(|&m| m < self.min_mz);
        let end = mz.partition_point(|&m| m <= self.max_mz);
        let end = end.max(start);
        Spectrum::new(
            mz[start..end].to_vec(),
            spectrum.intensity()[start..end].to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(mz: &[f64], intensity: &[f64]) -> Spectrum {
        Spectrum::new(mz.to_vec(), intensity.to_vec()).unwrap()
    }

    #[test]
    fn sqrt_and_log_stabilizers() {
        let sp = spectrum(&[1.0, 2.0, 3.0], &[0.0, 4.0, 99.0]);
        let sqrt = VarStabilizer::default().apply(&sp).unwrap();
        assert_eq!(sqrt.intensity(), &[0.0, 2.0, 99.0f64.sqrt()]);

        let log10 = VarStabilizer {
            method: StabilizeMethod::Log10,
        }
        .apply(&sp)
        .unwrap();
        assert!((log10.intensity()[2] - 2.0).abs() < 1e-12);
        assert_eq!(log10.intensity()[0], 0.0);
    }

    #[test]
    fn sqrt_of_negative_intensity_fails() {
        let sp = spectrum(&[1.0, 2.0], &[1.0, -4.0]);
        assert!(matches!(
            VarStabilizer::default().apply(&sp),
            Err(ProcessingError::NonFinite { axis: "intensity", index: 1 })
        ));
    }

    #[test]
    fn sum_and_max_normalization() {
        let sp = spectrum(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0]);
        let sum = Normalizer::default().apply(&sp).unwrap();
        assert!((sum.intensity().iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let max = Normalizer {
            method: NormalizeMethod::Max,
        }
        .apply(&sp)
        .unwrap();
        assert_eq!(max.intensity()[3], 1.0);
    }

    #[test]
    fn zero_spectrum_cannot_be_normalized() {
        let sp = spectrum(&[1.0, 2.0], &[0.0, 0.0]);
        assert!(matches!(
            Normalizer::default().apply(&sp),
            Err(ProcessingError::DegenerateNorm { .. })
        ));
    }

    #[test]
    fn trimming_is_inclusive_and_never_grows() {
        let sp = spectrum(&[1500.0, 2000.0, 2500.0, 20000.0, 20001.0], &[1.0; 5]);
        let out = Trimmer::default().apply(&sp).unwrap();
        assert_eq!(out.mz(), &[2000.0, 2500.0, 20000.0]);
        assert!(out.len() <= sp.len());
    }

    #[test]
    fn inverted_trim_range_is_rejected() {
        let sp = spectrum(&[1.0, 2.0], &[1.0, 1.0]);
        let trimmer = Trimmer {
            min_mz: 5.0,
            max_mz: 1.0,
        };
        assert!(matches!(
            trimmer.apply(&sp),
            Err(ProcessingError::InvalidParameter { stage: "trimming", .. })
        ));
    }
}
