use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::discovery::species_dir;
use super::loader::{AcquisitionParams, TraceByteOrder};
use super::model::SamplePair;

// ---------------------------------------------------------------------------
// Raw file writers
// ---------------------------------------------------------------------------

/// Write a minimal flex `acqu` file carrying the keys the loader reads.
pub fn write_acqu(path: &Path, params: &AcquisitionParams) -> io::Result<()> {
    let bytorda = match params.byte_order {
        TraceByteOrder::Little => 0,
        TraceByteOrder::Big => 1,
    };
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    writeln!(file, "##TITLE= synthetic acquisition")?;
    writeln!(file, "##JCAMPDX= 5.0")?;
    writeln!(file, "##$BYTORDA= {bytorda}")?;
    writeln!(file, "##$DELAY= {}", params.delay)?;
    writeln!(file, "##$DW= {}", params.dw)?;
    writeln!(file, "##$ML1= {}", params.ml1)?;
    writeln!(file, "##$ML2= {}", params.ml2)?;
    writeln!(file, "##$ML3= {}", params.ml3)?;
    writeln!(file, "##$TD= {}", params.td)?;
    writeln!(file, "##END=")?;
    file.flush()
}

/// Write raw 32-bit counts as a `fid` trace.
pub fn write_fid(path: &Path, counts: &[i32], order: TraceByteOrder) -> io::Result<()> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    for &c in counts {
        match order {
            TraceByteOrder::Little => file.write_i32::<LittleEndian>(c)?,
            TraceByteOrder::Big => file.write_i32::<BigEndian>(c)?,
        }
    }
    file.flush()
}

// ---------------------------------------------------------------------------
// Synthetic species profiles
// ---------------------------------------------------------------------------

/// Characteristic peaks of one species: `(mz, sigma, amplitude)`.
#[derive(Debug, Clone)]
pub struct SpeciesProfile {
    pub label: String,
    pub peaks: Vec<(f64, f64, f64)>,
}

impl SpeciesProfile {
    pub fn new(label: &str, peaks: &[(f64, f64, f64)]) -> Self {
        SpeciesProfile {
            label: label.to_string(),
            peaks: peaks.to_vec(),
        }
    }
}

/// Five species with distinct ribosomal-protein-like peak patterns.
pub fn default_profiles() -> Vec<SpeciesProfile> {
    vec![
        SpeciesProfile::new(
            "Escherichia_Coli",
            &[(4365.0, 12.0, 9000.0), (5381.0, 14.0, 12000.0), (6255.0, 15.0, 7000.0), (9536.0, 20.0, 5000.0)],
        ),
        SpeciesProfile::new(
            "Enterococcus_Faecalis",
            &[(4431.0, 12.0, 8000.0), (5085.0, 13.0, 11000.0), (6408.0, 15.0, 9000.0), (8861.0, 19.0, 4000.0)],
        ),
        SpeciesProfile::new(
            "Staphylococcus_Aureus",
            &[(3444.0, 10.0, 10000.0), (4305.0, 12.0, 7000.0), (5034.0, 13.0, 9000.0), (6888.0, 16.0, 6000.0)],
        ),
        SpeciesProfile::new(
            "Klebsiella_Pneumoniae",
            &[(5380.0, 14.0, 9000.0), (6284.0, 15.0, 12000.0), (7710.0, 17.0, 6000.0), (9480.0, 20.0, 7000.0)],
        ),
        SpeciesProfile::new(
            "Staphylococcus_Epidermidis",
            &[(3388.0, 10.0, 8000.0), (4813.0, 12.0, 10000.0), (6007.0, 14.0, 8000.0), (9629.0, 20.0, 5000.0)],
        ),
    ]
}

/// Acquisition parameters used for synthetic samples: 4000 points covering
/// roughly 1280..20470 m/z.
pub fn default_params() -> AcquisitionParams {
    AcquisitionParams {
        td: 4000,
        delay: 20000.0,
        dw: 15.0,
        ml1: 3.2e6,
        ml2: 0.5,
        ml3: 0.0,
        byte_order: TraceByteOrder::Little,
    }
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Box-Muller transform on the seeded generator.
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Raw counts for one acquisition: decaying chemical background, the
/// profile's peaks with per-sample amplitude jitter, and Gaussian noise.
pub fn synthetic_counts(
    params: &AcquisitionParams,
    profile: &SpeciesProfile,
    noise_level: f64,
    rng: &mut StdRng,
) -> Vec<i32> {
    let jitter: Vec<f64> = profile
        .peaks
        .iter()
        .map(|_| rng.gen_range(0.85..1.15))
        .collect();
    let mz = params.mass_axis();
    let start = mz.first().copied().unwrap_or(0.0);

    mz.iter()
        .map(|&m| {
            let background = 2500.0 * (-(m - start) / 2500.0).exp() + 150.0;
            let signal: f64 = profile
                .peaks
                .iter()
                .zip(&jitter)
                .map(|(&(mu, sigma, amp), j)| gaussian(m, mu, sigma, amp * j))
                .sum();
            let value = background + signal + gauss(rng, 0.0, noise_level);
            value.round() as i32
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Directory tree writer
// ---------------------------------------------------------------------------

/// Leaf directory of one acquisition:
/// `<root>/<Genus>/<Species>/<run>/<well>/1/1SLin`.
pub fn sample_dir(root: &Path, label: &str, run_id: &str, well: &str) -> PathBuf {
    species_dir(root, label)
        .join(run_id)
        .join(well)
        .join("1")
        .join("1SLin")
}

/// Write one `acqu`/`fid` pair and return it.
pub fn write_sample(
    root: &Path,
    label: &str,
    run_id: &str,
    well: &str,
    params: &AcquisitionParams,
    counts: &[i32],
) -> io::Result<SamplePair> {
    let dir = sample_dir(root, label, run_id, well);
    fs::create_dir_all(&dir)?;
    let pair = SamplePair::from_acqu(&dir.join("acqu"));
    write_acqu(&pair.acqu, params)?;
    write_fid(&pair.fid, counts, params.byte_order)?;
    Ok(pair)
}

/// Write `per_species` synthetic samples for every profile under `root`.
///
/// Deterministic for a given `seed`. Returns `(label, pair)` in write order.
pub fn write_species_tree(
    root: &Path,
    profiles: &[SpeciesProfile],
    per_species: usize,
    params: &AcquisitionParams,
    seed: u64,
) -> io::Result<Vec<(String, SamplePair)>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut written = Vec::with_capacity(profiles.len() * per_species);

    for profile in profiles {
        for i in 0..per_species {
            let run_id = format!("{}", 18_100_000 + i);
            let well = format!("0_{}{}", (b'A' + (i % 8) as u8) as char, 1 + i / 8);
            let counts = synthetic_counts(params, profile, 60.0, &mut rng);
            let pair = write_sample(root, &profile.label, &run_id, &well, params, &counts)?;
            written.push((profile.label.clone(), pair));
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::from_bruker;

    #[test]
    fn written_tree_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = default_profiles();
        let params = default_params();
        let written = write_species_tree(dir.path(), &profiles[..2], 3, &params, 7).unwrap();
        assert_eq!(written.len(), 6);

        let (label, pair) = &written[0];
        assert_eq!(label, "Escherichia_Coli");
        assert!(pair.acqu.starts_with(dir.path().join("Escherichia").join("Coli")));

        let sp = from_bruker(&pair.acqu, &pair.fid).unwrap();
        assert_eq!(sp.len(), params.td);
        assert!(sp.min_mz() < 2000.0 && sp.max_mz() > 20000.0);
    }

    #[test]
    fn generation_is_seeded() {
        let params = default_params();
        let profile = &default_profiles()[0];
        let a = synthetic_counts(&params, profile, 60.0, &mut StdRng::seed_from_u64(1));
        let b = synthetic_counts(&params, profile, 60.0, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }
}
