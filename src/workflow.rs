//! End-to-end runs: raw tree → corpus → embedding → plot, CSV and report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::color::ColorMap;
use crate::config::RunConfig;
use crate::corpus::{CorpusBuild, SpeciesCount};
use crate::data::export::{read_corpus_parquet, write_corpus_parquet, write_embedding_csv, write_json};
use crate::data::model::Corpus;
use crate::embedding::{embed, EmbeddingOutcome};
use crate::plot::{render_scatter, PlotStyle};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSample {
    pub species: String,
    pub acqu: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Completed { perplexity: f64, kl_divergence: f64 },
    Skipped { found: usize, required: usize },
}

/// Files written by a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Artefacts {
    pub plot: Option<PathBuf>,
    pub embedding_csv: Option<PathBuf>,
    pub corpus: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Summary of a run, also written as `run_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub rows: usize,
    pub feature_length: usize,
    pub species: Vec<SpeciesCount>,
    pub skipped: Vec<SkippedSample>,
    pub embedding: EmbeddingStatus,
    pub artefacts: Artefacts,
}

impl RunReport {
    pub fn plot_written(&self) -> bool {
        self.artefacts.plot.is_some()
    }
}

/// Embed the corpus and, if the embedding ran, write the plot and the
/// coordinates CSV. `species` sets legend order and colours.
pub fn embed_and_plot(
    corpus: &Corpus,
    species: &[String],
    config: &RunConfig,
) -> Result<(EmbeddingStatus, Artefacts)> {
    let outcome = embed(corpus.features(), &config.embedding).context("embedding failed")?;
    match outcome {
        EmbeddingOutcome::Skipped(err) => {
            warn!("no plot written: {err}");
            Ok((
                EmbeddingStatus::Skipped {
                    found: err.found,
                    required: err.required,
                },
                Artefacts::default(),
            ))
        }
        EmbeddingOutcome::Completed(embedding) => {
            let plot = config.plot_path();
            render_scatter(
                &plot,
                &embedding.points,
                corpus.labels(),
                &ColorMap::new(species),
                &PlotStyle::default(),
            )?;
            let csv = config.embedding_csv_path();
            write_embedding_csv(&csv, corpus, &embedding.points)?;
            info!("embedding coordinates written to {}", csv.display());
            Ok((
                EmbeddingStatus::Completed {
                    perplexity: embedding.perplexity,
                    kl_divergence: embedding.kl_divergence,
                },
                Artefacts {
                    plot: Some(plot),
                    embedding_csv: Some(csv),
                    ..Default::default()
                },
            ))
        }
    }
}

fn finish(
    config: &RunConfig,
    corpus: &Corpus,
    species: Vec<SpeciesCount>,
    skipped: Vec<SkippedSample>,
    legend: &[String],
    corpus_file: Option<PathBuf>,
) -> Result<RunReport> {
    let (embedding, mut artefacts) = embed_and_plot(corpus, legend, config)?;
    artefacts.corpus = corpus_file;
    artefacts.report = Some(config.report_path());

    let report = RunReport {
        rows: corpus.len(),
        feature_length: corpus.feature_length(),
        species,
        skipped,
        embedding,
        artefacts,
    };
    write_json(&config.report_path(), &report)?;
    Ok(report)
}

fn skipped_samples(build: &CorpusBuild) -> Vec<SkippedSample> {
    build
        .failures
        .iter()
        .map(|f| SkippedSample {
            species: f.species.clone(),
            acqu: f.pair.acqu.clone(),
            reason: f.error.to_string(),
        })
        .collect()
}

/// Full workflow from the raw sample tree.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    info!(
        "building corpus from {} for {} species",
        config.root.display(),
        config.species.len()
    );
    let build = config
        .corpus_builder()
        .build()
        .context("invalid preprocessing configuration")?;

    let corpus_file = match &config.export_corpus {
        Some(path) => {
            write_corpus_parquet(&build.corpus, path)?;
            info!("corpus exported to {}", path.display());
            Some(path.clone())
        }
        None => None,
    };

    let skipped = skipped_samples(&build);
    finish(
        config,
        &build.corpus,
        build.counts,
        skipped,
        &config.species,
        corpus_file,
    )
}

/// Re-embed a corpus previously exported to Parquet.
pub fn run_from_corpus(config: &RunConfig, corpus_path: &Path) -> Result<RunReport> {
    let corpus = read_corpus_parquet(corpus_path)
        .with_context(|| format!("loading corpus {}", corpus_path.display()))?;
    info!(
        "loaded corpus {}: {} row(s) x {} features",
        corpus_path.display(),
        corpus.len(),
        corpus.feature_length()
    );
    let legend = corpus.species();
    let species = legend
        .iter()
        .map(|label| {
            let n = corpus.count_label(label);
            SpeciesCount {
                label: label.clone(),
                discovered: n,
                retained: n,
                succeeded: n,
            }
        })
        .collect();
    finish(
        config,
        &corpus,
        species,
        Vec::new(),
        &legend,
        Some(corpus_path.to_path_buf()),
    )
}
