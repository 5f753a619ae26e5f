use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::corpus::CorpusBuilder;
use crate::data::discovery::DiscoveryOrder;
use crate::embedding::TsneConfig;
use crate::processing::{GridMode, Pipeline};

/// Species processed when none are requested.
pub const DEFAULT_SPECIES: [&str; 5] = [
    "Escherichia_Coli",
    "Enterococcus_Faecalis",
    "Staphylococcus_Aureus",
    "Klebsiella_Pneumoniae",
    "Staphylococcus_Epidermidis",
];

/// Everything one run needs. Every field has a default, so `{}` is a valid
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Root of the `<Genus>/<Species>/…` sample tree.
    pub root: PathBuf,
    pub species: Vec<String>,
    pub max_per_species: usize,
    pub target_length: usize,
    pub pipeline: Pipeline,
    pub grid: GridMode,
    pub discovery_order: DiscoveryOrder,
    pub embedding: TsneConfig,
    pub output_dir: PathBuf,
    pub plot_file: String,
    /// Also write the corpus to this Parquet file.
    pub export_corpus: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            root: PathBuf::from("."),
            species: DEFAULT_SPECIES.iter().map(|s| s.to_string()).collect(),
            max_per_species: 4000,
            target_length: 1000,
            pipeline: Pipeline::default(),
            grid: GridMode::default(),
            discovery_order: DiscoveryOrder::default(),
            embedding: TsneConfig::default(),
            output_dir: PathBuf::from("./tsne_results"),
            plot_file: "tsne_visualization_PREPRO.png".to_string(),
            export_corpus: None,
        }
    }
}

impl RunConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(&self.plot_file)
    }

    pub fn embedding_csv_path(&self) -> PathBuf {
        self.output_dir.join("tsne_embedding.csv")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("run_report.json")
    }

    pub fn corpus_builder(&self) -> CorpusBuilder {
        CorpusBuilder {
            root: self.root.clone(),
            species: self.species.clone(),
            max_per_species: self.max_per_species,
            target_length: self.target_length,
            pipeline: self.pipeline.clone(),
            grid: self.grid,
            order: self.discovery_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default_config() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.species.len(), 5);
        assert_eq!(
            config.plot_path(),
            PathBuf::from("./tsne_results/tsne_visualization_PREPRO.png")
        );
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
                "root": "/data/matched_bacteria",
                "max_per_species": 50,
                "grid": "shared",
                "discovery_order": "filesystem",
                "embedding": {"perplexity": 10.0},
                "pipeline": {"trimmer": {"min_mz": 3000.0}}
            }"#,
        )
        .unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/data/matched_bacteria"));
        assert_eq!(config.max_per_species, 50);
        assert_eq!(config.grid, GridMode::Shared);
        assert_eq!(config.discovery_order, DiscoveryOrder::Filesystem);
        assert_eq!(config.embedding.perplexity, 10.0);
        assert_eq!(config.embedding.seed, 42);
        assert_eq!(config.pipeline.trimmer.min_mz, 3000.0);
        assert_eq!(config.pipeline.trimmer.max_mz, 20000.0);
        assert_eq!(config.target_length, 1000);
    }

    #[test]
    fn unreadable_config_reports_path() {
        let err = RunConfig::from_file(Path::new("/nonexistent/run.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/run.json"));
    }
}
