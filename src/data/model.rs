use std::path::{Path, PathBuf};

use crate::error::ProcessingError;

// ---------------------------------------------------------------------------
// Spectrum – paired m/z and intensity axes
// ---------------------------------------------------------------------------

/// A single mass spectrum.
///
/// The fields are private: every `Spectrum` has passed [`Spectrum::new`], so
/// `mz` is non-empty, strictly increasing, and the same length as `intensity`,
/// and both axes are finite. Transforms never mutate a spectrum in place,
/// they build a new one through the same constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl Spectrum {
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Result<Self, ProcessingError> {
        if mz.len() != intensity.len() {
            return Err(ProcessingError::LengthMismatch {
                mz: mz.len(),
                intensity: intensity.len(),
            });
        }
        if mz.is_empty() {
            return Err(ProcessingError::Empty);
        }
        if let Some(index) = mz.iter().position(|v| !v.is_finite()) {
            return Err(ProcessingError::NonFinite { axis: "mz", index });
        }
        if let Some(index) = intensity.iter().position(|v| !v.is_finite()) {
            return Err(ProcessingError::NonFinite {
                axis: "intensity",
                index,
            });
        }
        if let Some(index) = mz.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ProcessingError::NonMonotonic { index: index + 1 });
        }
        Ok(Self { mz, intensity })
    }

    /// Replace the intensity axis, keeping `mz`.
    pub fn with_intensity(&self, intensity: Vec<f64>) -> Result<Self, ProcessingError> {
        Self::new(self.mz.clone(), intensity)
    }

    pub fn mz(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    /// Always false for a constructed spectrum; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn min_mz(&self) -> f64 {
        self.mz[0]
    }

    pub fn max_mz(&self) -> f64 {
        self.mz[self.mz.len() - 1]
    }
}

// ---------------------------------------------------------------------------
// SamplePair – the two raw files of one acquisition
// ---------------------------------------------------------------------------

/// Raw acquisition-parameters file (`acqu`) and its sibling intensity trace (`fid`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SamplePair {
    pub acqu: PathBuf,
    pub fid: PathBuf,
}

impl SamplePair {
    /// Pair an `acqu` file with the `fid` in the same directory.
    /// The `fid` need not exist; loading reports it.
    pub fn from_acqu(acqu: &Path) -> Self {
        let fid = acqu.with_file_name("fid");
        SamplePair {
            acqu: acqu.to_path_buf(),
            fid,
        }
    }
}

// ---------------------------------------------------------------------------
// Corpus – feature matrix with parallel labels
// ---------------------------------------------------------------------------

/// Fixed-length intensity vector sampled on a uniform m/z grid.
pub type FeatureVector = Vec<f64>;

/// Feature matrix (row per sample) with parallel species labels and sources.
///
/// Rows are kept in insertion order; every row has `feature_length` entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Corpus {
    feature_length: usize,
    features: Vec<FeatureVector>,
    labels: Vec<String>,
    sources: Vec<PathBuf>,
}

impl Corpus {
    pub fn new(feature_length: usize) -> Self {
        Corpus {
            feature_length,
            ..Default::default()
        }
    }

    /// Append one row. Rows of the wrong length are rejected.
    pub fn push(
        &mut self,
        features: FeatureVector,
        label: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Result<(), ProcessingError> {
        if features.len() != self.feature_length {
            return Err(ProcessingError::RowLength {
                expected: self.feature_length,
                found: features.len(),
            });
        }
        self.features.push(features);
        self.labels.push(label.into());
        self.sources.push(source.into());
        Ok(())
    }

    pub fn feature_length(&self) -> usize {
        self.feature_length
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// `(rows, columns)` of the feature matrix.
    pub fn shape(&self) -> (usize, usize) {
        (self.features.len(), self.feature_length)
    }

    /// Number of rows carrying `label`.
    pub fn count_label(&self, label: &str) -> usize {
        self.labels.iter().filter(|l| l.as_str() == label).count()
    }

    /// Distinct labels in first-appearance order.
    pub fn species(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for label in &self.labels {
            if !seen.contains(label) {
                seen.push(label.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_rejects_invariant_violations() {
        assert_eq!(
            Spectrum::new(vec![], vec![]),
            Err(ProcessingError::Empty)
        );
        assert_eq!(
            Spectrum::new(vec![1.0, 2.0], vec![1.0]),
            Err(ProcessingError::LengthMismatch { mz: 2, intensity: 1 })
        );
        assert_eq!(
            Spectrum::new(vec![1.0, 3.0, 3.0], vec![0.0; 3]),
            Err(ProcessingError::NonMonotonic { index: 2 })
        );
        assert_eq!(
            Spectrum::new(vec![1.0, 2.0], vec![0.0, f64::NAN]),
            Err(ProcessingError::NonFinite {
                axis: "intensity",
                index: 1
            })
        );
    }

    #[test]
    fn spectrum_bounds() {
        let sp = Spectrum::new(vec![10.0, 11.0, 15.0], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(sp.len(), 3);
        assert_eq!(sp.min_mz(), 10.0);
        assert_eq!(sp.max_mz(), 15.0);
    }

    #[test]
    fn pair_uses_sibling_fid() {
        let pair = SamplePair::from_acqu(Path::new("/data/Escherichia/Coli/1/0_A1/1/1SLin/acqu"));
        assert_eq!(pair.fid, PathBuf::from("/data/Escherichia/Coli/1/0_A1/1/1SLin/fid"));
        assert_eq!(pair.acqu.parent(), pair.fid.parent());
    }

    #[test]
    fn corpus_keeps_rows_parallel() {
        let mut corpus = Corpus::new(3);
        corpus.push(vec![1.0, 2.0, 3.0], "Escherichia_Coli", "a/acqu").unwrap();
        corpus.push(vec![0.0; 3], "Enterococcus_Faecalis", "b/acqu").unwrap();
        corpus.push(vec![1.0; 3], "Escherichia_Coli", "c/acqu").unwrap();
        let short = corpus.push(vec![1.0; 2], "Escherichia_Coli", "d/acqu");
        assert_eq!(
            short,
            Err(ProcessingError::RowLength {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            short.unwrap_err().to_string(),
            "feature row has 2 values, expected 3"
        );

        assert_eq!(corpus.shape(), (3, 3));
        assert_eq!(corpus.labels().len(), corpus.sources().len());
        assert_eq!(corpus.count_label("Escherichia_Coli"), 2);
        assert_eq!(
            corpus.species(),
            vec!["Escherichia_Coli".to_string(), "Enterococcus_Faecalis".to_string()]
        );
    }
}
