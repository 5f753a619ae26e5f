//! Spectrum preprocessing: five fixed-order stages, then resampling.
//!
//! ```text
//!   Spectrum (raw counts)
//!        │
//!        ▼
//!   VarStabilizer ─► Smoother ─► BaselineCorrector ─► Normalizer ─► Trimmer
//!        │
//!        ▼
//!   Resampler  ─►  FeatureVector (fixed length)
//! ```
//!
//! Each stage is a pure `&Spectrum -> Result<Spectrum>` transform. Only stage
//! parameters are configurable; the order is fixed by [`Pipeline`].

use log::trace;
use serde::{Deserialize, Serialize};

use crate::data::model::Spectrum;
use crate::error::ProcessingError;

pub mod baseline;
pub mod resample;
pub mod smooth;
pub mod transforms;

pub use baseline::{BaselineCorrector, BaselineMethod};
pub use resample::{Grid, GridMode, Resampler};
pub use smooth::Smoother;
pub use transforms::{NormalizeMethod, Normalizer, StabilizeMethod, Trimmer, VarStabilizer};

/// A single preprocessing stage.
pub trait Transform {
    /// Stage name used in errors and logs.
    fn name(&self) -> &'static str;

    fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError>;
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The preprocessing chain with its per-stage parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub stabilizer: VarStabilizer,
    pub smoother: Smoother,
    pub baseline: BaselineCorrector,
    pub normalizer: Normalizer,
    pub trimmer: Trimmer,
}

impl Pipeline {
    /// Stages in execution order.
    pub fn stages(&self) -> [&dyn Transform; 5] {
        [
            &self.stabilizer,
            &self.smoother,
            &self.baseline,
            &self.normalizer,
            &self.trimmer,
        ]
    }

    /// Run every stage in order. The first failing stage aborts the chain.
    pub fn process(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError> {
        self.stages()
            .iter()
            .try_fold(spectrum.clone(), |current, stage| {
                let next = stage.apply(&current)?;
                trace!(
                    "{}: {} -> {} points",
                    stage.name(),
                    current.len(),
                    next.len()
                );
                Ok(next)
            })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::peaked_spectrum;
    use super::*;

    #[test]
    fn default_pipeline_output_properties() {
        let input = peaked_spectrum();
        let pipeline = Pipeline::default();
        let out = pipeline.process(&input).unwrap();

        assert!(out.len() <= input.len());
        assert!(out
            .mz()
            .iter()
            .all(|&m| (pipeline.trimmer.min_mz..=pipeline.trimmer.max_mz).contains(&m)));
        assert!(out.intensity().iter().all(|&v| v >= -1e-9));
    }

    #[test]
    fn stage_order_is_fixed() {
        let pipeline = Pipeline::default();
        let names: Vec<_> = pipeline.stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["variance stabilization", "smoothing", "baseline correction", "normalization", "trimming"]
        );
    }

    #[test]
    fn trimming_everything_fails_the_sample() {
        let pipeline = Pipeline {
            trimmer: Trimmer {
                min_mz: 50_000.0,
                max_mz: 60_000.0,
            },
            ..Default::default()
        };
        assert_eq!(pipeline.process(&peaked_spectrum()), Err(ProcessingError::Empty));
    }

    #[test]
    fn pipeline_deserializes_partial_config() {
        let pipeline: Pipeline =
            serde_json::from_str(r#"{"smoother": {"half_window": 5}, "stabilizer": {"method": "log10"}}"#)
                .unwrap();
        assert_eq!(pipeline.smoother.half_window, 5);
        assert_eq!(pipeline.smoother.poly_order, 3);
        assert_eq!(pipeline.stabilizer.method, StabilizeMethod::Log10);
        assert_eq!(pipeline.trimmer, Trimmer::default());
    }
}
