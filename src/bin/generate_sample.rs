use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use maldi_embed::data::synthetic::{default_params, default_profiles, write_species_tree};

/// Write a tree of synthetic Bruker flex acquisitions (`acqu` + `fid`).
#[derive(Parser, Debug)]
#[command(name = "generate-sample")]
struct Args {
    /// Root directory of the generated <Genus>/<Species>/... tree
    #[arg(default_value = "synthetic_maldi")]
    output: PathBuf,

    /// Samples written per species
    #[arg(short = 'n', long, default_value_t = 5)]
    per_species: usize,

    /// Seed for peak jitter and noise
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let profiles = default_profiles();
    let params = default_params();
    let written = write_species_tree(&args.output, &profiles, args.per_species, &params, args.seed)
        .with_context(|| format!("writing samples under {}", args.output.display()))?;

    println!(
        "Wrote {} acquisitions ({} species x {}, {} points each) under {}",
        written.len(),
        profiles.len(),
        args.per_species,
        params.td,
        args.output.display()
    );
    Ok(())
}
