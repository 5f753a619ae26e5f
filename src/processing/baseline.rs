use serde::{Deserialize, Serialize};

use super::Transform;
use crate::data::model::Spectrum;
use crate::error::ProcessingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BaselineMethod {
    /// Statistics-sensitive non-linear iterative peak clipping.
    #[default]
    #[serde(rename = "SNIP", alias = "snip")]
    Snip,
}

/// Estimates and subtracts the slowly varying background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineCorrector {
    pub method: BaselineMethod,
    /// SNIP clipping iterations; iteration `k` compares each point with the
    /// mean of its neighbours `k` positions away.
    pub iterations: usize,
}

impl Default for BaselineCorrector {
    fn default() -> Self {
        Self {
            method: BaselineMethod::Snip,
            iterations: 10,
        }
    }
}

/// Log-log-square-root operator; compresses the dynamic range before clipping.
fn lls(v: f64) -> f64 {
    (((v + 1.0).sqrt() + 1.0).ln() + 1.0).ln()
}

fn lls_inverse(v: f64) -> f64 {
    ((v.exp() - 1.0).exp() - 1.0).powi(2) - 1.0
}

/// SNIP baseline of `y`. Indices beyond either end take the edge value.
pub fn snip_baseline(y: &[f64], iterations: usize) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }
    let mut current: Vec<f64> = y.iter().map(|&v| lls(v)).collect();
    let mut next = current.clone();
    for k in 1..=iterations {
        for (i, out) in next.iter_mut().enumerate() {
            let left = current[i.saturating_sub(k)];
            let right = current[(i + k).min(n - 1)];
            *out = current[i].min((left + right) / 2.0);
        }
        std::mem::swap(&mut current, &mut next);
    }
    current.into_iter().map(lls_inverse).collect()
}

impl Transform for BaselineCorrector {
    fn name(&self) -> &'static str {
        "baseline correction"
    }

    fn apply(&self, spectrum: &Spectrum) -> Result<Spectrum, ProcessingError> {
        // Smoothing undershoot below zero carries no signal; LLS is undefined below -1.
        let y: Vec<f64> = spectrum.intensity().iter().map(|&v| v.max(0.0)).collect();
        let baseline = match self.method {
            BaselineMethod::Snip => snip_baseline(&y, self.iterations),
        };
        spectrum.with_intensity(y.iter().zip(&baseline).map(|(v, b)| v - b).collect())
    }
}
