use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;

use maldi_embed::config::RunConfig;
use maldi_embed::data::discovery::DiscoveryOrder;
use maldi_embed::embedding::TsneMethod;
use maldi_embed::processing::GridMode;
use maldi_embed::workflow::{self, EmbeddingStatus, RunReport};

/// Preprocess MALDI-TOF spectra and project them with t-SNE.
#[derive(Parser, Debug)]
#[command(name = "maldi-embed")]
#[command(version)]
struct Cli {
    /// JSON run configuration; flags override its fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging when RUST_LOG is not set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the corpus from a raw sample tree, embed and plot it
    Run {
        /// Root of the <Genus>/<Species>/... tree
        #[arg(long)]
        root: Option<PathBuf>,

        /// Species labels (Genus_Species), comma separated
        #[arg(long, value_delimiter = ',')]
        species: Option<Vec<String>>,

        /// Maximum samples per species
        #[arg(long)]
        max_per_species: Option<usize>,

        /// Feature vector length
        #[arg(long)]
        target_length: Option<usize>,

        /// Resample every spectrum onto one grid over the trim range
        #[arg(long)]
        shared_grid: bool,

        /// Keep filesystem traversal order instead of sorting
        #[arg(long)]
        unsorted: bool,

        /// Also write the corpus to this Parquet file
        #[arg(long)]
        export_corpus: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Embed and plot a corpus exported with `run --export-corpus`
    Embed {
        /// Corpus Parquet file
        corpus: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Directory for the plot, coordinates and report
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Plot file name inside the output directory
    #[arg(long)]
    plot_file: Option<String>,

    /// t-SNE perplexity before the small-corpus clamp
    #[arg(long)]
    perplexity: Option<f64>,

    /// Seed for the initial layout
    #[arg(long)]
    seed: Option<u64>,

    /// Exact t-SNE gradient instead of Barnes-Hut; quadratic memory
    #[arg(long)]
    exact: bool,
}

impl OutputArgs {
    fn apply(self, config: &mut RunConfig) {
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(file) = self.plot_file {
            config.plot_file = file;
        }
        if let Some(p) = self.perplexity {
            config.embedding.perplexity = p;
        }
        if let Some(seed) = self.seed {
            config.embedding.seed = seed;
        }
        if self.exact {
            config.embedding.method = TsneMethod::Exact;
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if verbose { "debug" } else { "info" },
    ));
    builder.init();
}

fn summarize(report: &RunReport) {
    info!(
        "{} sample(s) embedded, {} skipped",
        report.rows,
        report.skipped.len()
    );
    match &report.embedding {
        EmbeddingStatus::Completed { perplexity, .. } => {
            if let Some(plot) = &report.artefacts.plot {
                println!("Plot saved to {} (perplexity {perplexity})", plot.display());
            }
        }
        EmbeddingStatus::Skipped { found, required } => {
            println!("Insufficient data: {found} sample(s) collected, at least {required} required; no plot written");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    let report = match cli.command {
        Command::Run {
            root,
            species,
            max_per_species,
            target_length,
            shared_grid,
            unsorted,
            export_corpus,
            output,
        } => {
            if let Some(root) = root {
                config.root = root;
            }
            if let Some(species) = species {
                config.species = species;
            }
            if let Some(cap) = max_per_species {
                config.max_per_species = cap;
            }
            if let Some(len) = target_length {
                config.target_length = len;
            }
            if shared_grid {
                config.grid = GridMode::Shared;
            }
            if unsorted {
                config.discovery_order = DiscoveryOrder::Filesystem;
            }
            if export_corpus.is_some() {
                config.export_corpus = export_corpus;
            }
            output.apply(&mut config);
            workflow::run(&config)?
        }
        Command::Embed { corpus, output } => {
            output.apply(&mut config);
            workflow::run_from_corpus(&config, &corpus)?
        }
    };

    summarize(&report);
    Ok(())
}
