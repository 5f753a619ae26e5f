//! Two-dimensional embedding of the feature matrix.
//!
//! [`embed`] validates the matrix, applies the small-corpus policy and then
//! runs t-SNE, Barnes-Hut by default. Fewer than two rows is not an error: the outcome is
//! [`EmbeddingOutcome::Skipped`] and nothing downstream should be drawn.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::model::FeatureVector;
use crate::error::{EmbeddingError, InsufficientDataError};

pub mod affinity;
pub mod quadtree;
pub mod tsne;

/// Minimum number of rows t-SNE can embed.
pub const MIN_SAMPLES: usize = 2;

/// How the t-SNE gradient is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsneMethod {
    /// Sparse nearest-neighbour affinities and quadtree repulsion.
    #[default]
    BarnesHut,
    /// Every pair, dense matrices. Small corpora only.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsneConfig {
    /// Desired perplexity; clamped to `n - 1` for small corpora.
    pub perplexity: f64,
    pub learning_rate: f64,
    pub n_iter: usize,
    pub early_exaggeration: f64,
    pub exaggeration_iters: usize,
    pub seed: u64,
    pub method: TsneMethod,
    /// Barnes-Hut opening angle; 0 visits every point.
    pub theta: f64,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            learning_rate: 200.0,
            n_iter: 1000,
            early_exaggeration: 12.0,
            exaggeration_iters: 250,
            seed: 42,
            method: TsneMethod::BarnesHut,
            theta: 0.5,
        }
    }
}

impl TsneConfig {
    fn validate(&self) -> Result<(), EmbeddingError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(EmbeddingError::InvalidParameter(format!("{name} must be positive, got {v}")))
            }
        };
        positive("perplexity", self.perplexity)?;
        positive("learning_rate", self.learning_rate)?;
        positive("early_exaggeration", self.early_exaggeration)?;
        if !(self.theta.is_finite() && self.theta >= 0.0) {
            return Err(EmbeddingError::InvalidParameter(format!(
                "theta must be non-negative, got {}",
                self.theta
            )));
        }
        if self.n_iter == 0 {
            return Err(EmbeddingError::InvalidParameter("n_iter must be at least 1".into()));
        }
        Ok(())
    }
}

/// Perplexity actually used for `n_samples` rows: `min(desired, n - 1)`.
pub fn effective_perplexity(desired: f64, n_samples: usize) -> f64 {
    desired.min(n_samples.saturating_sub(1) as f64)
}

/// A finished embedding, one point per input row.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub points: Vec<[f64; 2]>,
    pub perplexity: f64,
    pub kl_divergence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Completed(Embedding),
    Skipped(InsufficientDataError),
}

impl EmbeddingOutcome {
    pub fn embedding(&self) -> Option<&Embedding> {
        match self {
            EmbeddingOutcome::Completed(e) => Some(e),
            EmbeddingOutcome::Skipped(_) => None,
        }
    }
}

fn validate_rows(rows: &[FeatureVector]) -> Result<(), EmbeddingError> {
    let expected = rows.first().map_or(0, Vec::len);
    if expected == 0 {
        return Err(EmbeddingError::NoFeatures);
    }
    for (row, values) in rows.iter().enumerate() {
        if values.len() != expected {
            return Err(EmbeddingError::RaggedMatrix {
                row,
                expected,
                found: values.len(),
            });
        }
        if let Some(column) = values.iter().position(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite { row, column });
        }
    }
    Ok(())
}

/// Embed the feature rows into 2-D.
pub fn embed(rows: &[FeatureVector], config: &TsneConfig) -> Result<EmbeddingOutcome, EmbeddingError> {
    if rows.len() < MIN_SAMPLES {
        let err = InsufficientDataError {
            found: rows.len(),
            required: MIN_SAMPLES,
        };
        warn!("skipping embedding: {err}");
        return Ok(EmbeddingOutcome::Skipped(err));
    }
    config.validate()?;
    validate_rows(rows)?;

    let perplexity = effective_perplexity(config.perplexity, rows.len());
    if perplexity < config.perplexity {
        info!(
            "perplexity clamped from {} to {perplexity} for {} samples",
            config.perplexity,
            rows.len()
        );
    }
    let result = tsne::run(rows, perplexity, config);
    Ok(EmbeddingOutcome::Completed(Embedding {
        points: result.points,
        perplexity,
        kl_divergence: result.kl_divergence,
    }))
}
