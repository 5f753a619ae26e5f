//! Corpus building: discover, load, preprocess and resample every sample of
//! the requested species, skipping the ones that fail.

use std::path::PathBuf;

use log::{debug, info, warn};
use serde::Serialize;

use crate::data::discovery::{species_pairs, DiscoveryOrder};
use crate::data::loader::load_pair;
use crate::data::model::{Corpus, FeatureVector, SamplePair};
use crate::error::{ProcessingError, SampleError};
use crate::processing::{Grid, GridMode, Pipeline, Resampler};

/// Discovered, kept-after-cap and successfully processed samples of one species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesCount {
    pub label: String,
    pub discovered: usize,
    pub retained: usize,
    pub succeeded: usize,
}

/// A sample left out of the corpus and why.
#[derive(Debug)]
pub struct SampleFailure {
    pub species: String,
    pub pair: SamplePair,
    pub error: SampleError,
}

#[derive(Debug)]
pub struct CorpusBuild {
    pub corpus: Corpus,
    pub failures: Vec<SampleFailure>,
    /// One entry per requested species, in request order.
    pub counts: Vec<SpeciesCount>,
}

/// Settings for one corpus build.
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    pub root: PathBuf,
    pub species: Vec<String>,
    pub max_per_species: usize,
    pub target_length: usize,
    pub pipeline: Pipeline,
    pub grid: GridMode,
    pub order: DiscoveryOrder,
}

impl CorpusBuilder {
    pub fn new(root: impl Into<PathBuf>, species: &[impl AsRef<str>]) -> Self {
        CorpusBuilder {
            root: root.into(),
            species: species.iter().map(|s| s.as_ref().to_string()).collect(),
            max_per_species: 4000,
            target_length: 1000,
            pipeline: Pipeline::default(),
            grid: GridMode::default(),
            order: DiscoveryOrder::default(),
        }
    }

    /// The resampler for this build. A shared grid spans the trim range.
    pub fn resampler(&self) -> Result<Resampler, ProcessingError> {
        let grid = match self.grid {
            GridMode::PerSpectrum => Grid::PerSpectrum,
            GridMode::Shared => {
                self.pipeline.trimmer.validate()?;
                Grid::Fixed {
                    min_mz: self.pipeline.trimmer.min_mz,
                    max_mz: self.pipeline.trimmer.max_mz,
                }
            }
        };
        Resampler::new(self.target_length, grid)
    }

    /// Load, preprocess and resample a single sample.
    pub fn process_pair(
        &self,
        pair: &SamplePair,
        resampler: &Resampler,
    ) -> Result<FeatureVector, SampleError> {
        let raw = load_pair(pair)?;
        let processed = self.pipeline.process(&raw)?;
        Ok(resampler.features(&processed)?)
    }

    /// Build the corpus. Per-sample failures are collected, never fatal;
    /// only an invalid configuration is.
    pub fn build(&self) -> Result<CorpusBuild, ProcessingError> {
        let resampler = self.resampler()?;
        self.pipeline.trimmer.validate()?;

        let mut corpus = Corpus::new(self.target_length);
        let mut failures = Vec::new();
        let mut counts = Vec::with_capacity(self.species.len());

        for label in &self.species {
            let (discovered, pairs) =
                species_pairs(&self.root, label, self.max_per_species, self.order);
            let mut count = SpeciesCount {
                label: label.clone(),
                discovered,
                retained: pairs.len(),
                succeeded: 0,
            };
            info!(
                "{label}: {discovered} sample(s) found, {} retained (cap {})",
                pairs.len(),
                self.max_per_species
            );

            for pair in pairs {
                let outcome = self.process_pair(&pair, &resampler).and_then(|features| {
                    corpus
                        .push(features, label.as_str(), pair.acqu.clone())
                        .map_err(SampleError::from)
                });
                match outcome {
                    Ok(()) => {
                        count.succeeded += 1;
                        debug!("{label}: added {}", pair.acqu.display());
                    }
                    Err(error) => {
                        warn!("{label}: skipping {}: {error}", pair.acqu.display());
                        failures.push(SampleFailure {
                            species: label.clone(),
                            pair,
                            error,
                        });
                    }
                }
            }
            counts.push(count);
        }

        info!(
            "corpus: {} row(s) x {} features, {} sample(s) skipped",
            corpus.len(),
            corpus.feature_length(),
            failures.len()
        );
        Ok(CorpusBuild {
            corpus,
            failures,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::data::loader::AcquisitionParams;
    use crate::data::synthetic::{
        default_params, default_profiles, synthetic_counts, write_sample, write_species_tree,
    };
    use crate::error::LoadError;

    #[test]
    fn cap_limits_rows_per_species() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = default_profiles();
        write_species_tree(dir.path(), &profiles[..2], 4, &default_params(), 3).unwrap();

        let mut builder = CorpusBuilder::new(dir.path(), &["Escherichia_Coli", "Enterococcus_Faecalis"]);
        builder.max_per_species = 3;
        builder.target_length = 200;
        let build = builder.build().unwrap();

        assert_eq!(build.corpus.shape(), (6, 200));
        assert!(build.failures.is_empty());
        assert_eq!(
            build.counts[0],
            SpeciesCount {
                label: "Escherichia_Coli".into(),
                discovered: 4,
                retained: 3,
                succeeded: 3,
            }
        );
        // Rows follow the requested species order.
        assert_eq!(build.corpus.labels()[..3], ["Escherichia_Coli"; 3]);
        assert_eq!(build.corpus.labels()[3..], ["Enterococcus_Faecalis"; 3]);
    }

    #[test]
    fn broken_samples_are_skipped_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = default_profiles();
        let written = write_species_tree(dir.path(), &profiles[..1], 3, &default_params(), 5).unwrap();
        fs::remove_file(&written[1].1.fid).unwrap();

        let mut builder = CorpusBuilder::new(dir.path(), &["Escherichia_Coli", "Missing_Species"]);
        builder.target_length = 100;
        let build = builder.build().unwrap();

        assert_eq!(build.corpus.len(), 2);
        assert_eq!(build.failures.len(), 1);
        assert_eq!(build.failures[0].pair, written[1].1);
        assert!(matches!(
            build.failures[0].error,
            SampleError::Load(LoadError::Missing(_))
        ));
        assert_eq!(build.counts[1].discovered, 0);
        assert_eq!(build.counts[1].succeeded, 0);
    }

    #[test]
    fn unprocessable_samples_are_skipped_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = default_profiles();
        let written = write_species_tree(dir.path(), &profiles[..1], 3, &default_params(), 5).unwrap();

        // Calibrated entirely above the trim window, so trimming leaves nothing.
        let heavy_params = AcquisitionParams {
            delay: 90_000.0,
            ..default_params()
        };
        assert!(heavy_params.mass_axis()[0] > 20_000.0);
        let mut rng = StdRng::seed_from_u64(11);
        let counts = synthetic_counts(&heavy_params, &profiles[0], 60.0, &mut rng);
        let heavy = write_sample(
            dir.path(),
            "Escherichia_Coli",
            "18199999",
            "0_H8",
            &heavy_params,
            &counts,
        )
        .unwrap();

        let mut builder = CorpusBuilder::new(dir.path(), &["Escherichia_Coli"]);
        builder.target_length = 100;
        let build = builder.build().unwrap();

        assert_eq!(build.counts[0].discovered, written.len() + 1);
        assert_eq!(build.counts[0].succeeded, written.len());
        assert_eq!(build.corpus.len(), written.len());
        assert_eq!(build.failures.len(), 1);
        assert_eq!(build.failures[0].pair, heavy);
        assert!(matches!(
            build.failures[0].error,
            SampleError::Processing(ProcessingError::Empty)
        ));
    }

    #[test]
    fn shared_grid_uses_trim_bounds() {
        let mut builder = CorpusBuilder::new("unused", &["Escherichia_Coli"]);
        builder.grid = GridMode::Shared;
        let resampler = builder.resampler().unwrap();
        assert_eq!(
            resampler.grid,
            Grid::Fixed {
                min_mz: 2000.0,
                max_mz: 20000.0
            }
        );
    }

    #[test]
    fn invalid_target_length_is_fatal() {
        let mut builder = CorpusBuilder::new("unused", &["Escherichia_Coli"]);
        builder.target_length = 1;
        assert!(builder.build().is_err());
    }
}
