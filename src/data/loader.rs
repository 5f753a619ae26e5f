use std::fs;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;

use super::model::{SamplePair, Spectrum};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one Bruker flex acquisition: the `acqu` parameter file and its `fid` trace.
///
/// All-or-nothing: any missing key, short trace or bad calibration fails the
/// whole sample.
pub fn from_bruker(acqu: &Path, fid: &Path) -> Result<Spectrum, LoadError> {
    let params = AcquisitionParams::from_file(acqu)?;
    let counts = read_trace(fid, params.byte_order, params.td)?;

    let mz = params.mass_axis();
    let intensity: Vec<f64> = counts.into_iter().map(|c| c.max(0) as f64).collect();

    debug!(
        "loaded {} points from {} (mz {:.1}..{:.1})",
        mz.len(),
        fid.display(),
        mz.first().copied().unwrap_or(f64::NAN),
        mz.last().copied().unwrap_or(f64::NAN)
    );

    Spectrum::new(mz, intensity).map_err(|source| LoadError::Calibration {
        path: acqu.to_path_buf(),
        source,
    })
}

/// Convenience wrapper over [`from_bruker`] for a discovered pair.
pub fn load_pair(pair: &SamplePair) -> Result<Spectrum, LoadError> {
    from_bruker(&pair.acqu, &pair.fid)
}

// ---------------------------------------------------------------------------
// acqu – JCAMP-style acquisition parameters
// ---------------------------------------------------------------------------

/// Byte order of the `fid` samples (`##$BYTORDA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceByteOrder {
    #[default]
    Little,
    Big,
}

/// The subset of `acqu` needed to rebuild the mass axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionParams {
    /// Declared number of points in the trace.
    pub td: usize,
    /// Time of flight of the first point.
    pub delay: f64,
    /// Dwell time between points.
    pub dw: f64,
    pub ml1: f64,
    pub ml2: f64,
    pub ml3: f64,
    pub byte_order: TraceByteOrder,
}

impl AcquisitionParams {
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::Missing(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // Vendor files are mostly ASCII but occasionally carry latin-1 comments.
        let text = String::from_utf8_lossy(&bytes);
        Self::parse(&text, path)
    }

    /// Parse `##$KEY= value` lines. `path` is only used for error context.
    pub fn parse(text: &str, path: &Path) -> Result<Self, LoadError> {
        let lookup = |key: &'static str| -> Result<&str, LoadError> {
            find_value(text, key).ok_or_else(|| LoadError::MissingParameter {
                path: path.to_path_buf(),
                key,
            })
        };
        let number = |key: &'static str| -> Result<f64, LoadError> {
            let raw = lookup(key)?;
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| LoadError::InvalidParameter {
                    path: path.to_path_buf(),
                    key,
                    value: raw.to_string(),
                })
        };

        let td_raw = lookup("TD")?;
        let td = td_raw
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| LoadError::InvalidParameter {
                path: path.to_path_buf(),
                key: "TD",
                value: td_raw.to_string(),
            })?;

        let ml1 = number("ML1")?;
        if ml1 <= 0.0 {
            return Err(LoadError::InvalidParameter {
                path: path.to_path_buf(),
                key: "ML1",
                value: ml1.to_string(),
            });
        }

        let byte_order = match find_value(text, "BYTORDA") {
            None | Some("0") => TraceByteOrder::Little,
            Some("1") => TraceByteOrder::Big,
            Some(other) => {
                return Err(LoadError::InvalidParameter {
                    path: path.to_path_buf(),
                    key: "BYTORDA",
                    value: other.to_string(),
                })
            }
        };

        Ok(AcquisitionParams {
            td,
            delay: number("DELAY")?,
            dw: number("DW")?,
            ml1,
            ml2: number("ML2")?,
            ml3: number("ML3")?,
            byte_order,
        })
    }

    /// Time of flight of each trace point.
    pub fn time_of_flight(&self) -> Vec<f64> {
        (0..self.td)
            .map(|i| self.delay + i as f64 * self.dw)
            .collect()
    }

    /// Mass-to-charge axis from the quadratic time-of-flight calibration.
    pub fn mass_axis(&self) -> Vec<f64> {
        self.time_of_flight()
            .into_iter()
            .map(|tof| tof_to_mass(self.ml1, self.ml2, self.ml3, tof))
            .collect()
    }
}

/// `A = ML3`, `B = sqrt(1e12 / ML1)`, `C = ML2 - tof`; the mass is the square of
/// the positive root of `A r^2 + B r + C = 0`.
///
/// The root is taken in its rationalised form `-2C / (B + sqrt(B^2 - 4AC))`,
/// which reduces to `-C / B` when `A = 0` and does not cancel when `A` is tiny.
pub fn tof_to_mass(ml1: f64, ml2: f64, ml3: f64, tof: f64) -> f64 {
    let a = ml3;
    let b = (1e12 / ml1).sqrt();
    let c = ml2 - tof;
    let root = -2.0 * c / (b + (b * b - 4.0 * a * c).sqrt());
    root * root
}

/// Value of the first `##$KEY=` line, with surrounding whitespace and `<>` stripped.
fn find_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix("##$")?;
        let (name, value) = rest.split_once('=')?;
        if name.trim() != key {
            return None;
        }
        Some(
            value
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .trim(),
        )
    })
}

// ---------------------------------------------------------------------------
// fid – raw 32-bit intensity trace
// ---------------------------------------------------------------------------

fn read_trace(path: &Path, order: TraceByteOrder, declared: usize) -> Result<Vec<i32>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % 4 != 0 {
        return Err(LoadError::TruncatedTrace {
            path: path.to_path_buf(),
            len: bytes.len() as u64,
        });
    }

    let found = bytes.len() / 4;
    if found < declared {
        return Err(LoadError::TraceLength {
            path: path.to_path_buf(),
            declared,
            found,
        });
    }

    // Trailing padding beyond TD is ignored.
    let bytes = &bytes[..declared * 4];
    let mut counts = vec![0i32; declared];
    match order {
        TraceByteOrder::Little => LittleEndian::read_i32_into(bytes, &mut counts),
        TraceByteOrder::Big => BigEndian::read_i32_into(bytes, &mut counts),
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{write_acqu, write_fid};

    fn params(td: usize) -> AcquisitionParams {
        AcquisitionParams {
            td,
            delay: 20000.0,
            dw: 10.0,
            ml1: 3.2e6,
            ml2: 0.5,
            ml3: 0.0,
            byte_order: TraceByteOrder::Little,
        }
    }

    #[test]
    fn parses_flex_parameters() {
        let text = "##TITLE= parameter file\n\
                    ##$TD= 4000\n\
                    ##$DELAY= 20000\n\
                    ##$DW= 10\n\
                    ##$ML1= 3200000.5\n\
                    ##$ML2= 0.5\n\
                    ##$ML3= -1.2e-5\n\
                    ##$BYTORDA= 1\n\
                    ##$NTBCal= <>\n";
        let p = AcquisitionParams::parse(text, Path::new("acqu")).unwrap();
        assert_eq!(p.td, 4000);
        assert_eq!(p.delay, 20000.0);
        assert_eq!(p.ml3, -1.2e-5);
        assert_eq!(p.byte_order, TraceByteOrder::Big);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = AcquisitionParams::parse("##$TD= 10\n", Path::new("acqu")).unwrap_err();
        assert!(matches!(err, LoadError::MissingParameter { key: "ML1", .. }));
    }

    #[test]
    fn quadratic_calibration_matches_linear_when_ml3_small() {
        let linear = tof_to_mass(3.2e6, 0.5, 0.0, 50000.0);
        let quadratic = tof_to_mass(3.2e6, 0.5, 1e-12, 50000.0);
        assert!((linear - quadratic).abs() / linear < 1e-6);
        assert!(linear > 7000.0 && linear < 9000.0);
    }

    #[test]
    fn loads_pair_and_clips_negative_counts() {
        let dir = tempfile::tempdir().unwrap();
        let acqu = dir.path().join("acqu");
        let fid = dir.path().join("fid");
        let p = params(4);
        write_acqu(&acqu, &p).unwrap();
        write_fid(&fid, &[5, -3, 7, 0], p.byte_order).unwrap();

        let sp = from_bruker(&acqu, &fid).unwrap();
        assert_eq!(sp.intensity(), &[5.0, 0.0, 7.0, 0.0]);
        assert_eq!(sp.mz(), p.mass_axis().as_slice());
    }

    #[test]
    fn big_endian_trace() {
        let dir = tempfile::tempdir().unwrap();
        let acqu = dir.path().join("acqu");
        let fid = dir.path().join("fid");
        let mut p = params(3);
        p.byte_order = TraceByteOrder::Big;
        write_acqu(&acqu, &p).unwrap();
        write_fid(&fid, &[1, 256, 65536], TraceByteOrder::Big).unwrap();

        let sp = from_bruker(&acqu, &fid).unwrap();
        assert_eq!(sp.intensity(), &[1.0, 256.0, 65536.0]);
    }

    #[test]
    fn short_and_truncated_traces_fail() {
        let dir = tempfile::tempdir().unwrap();
        let acqu = dir.path().join("acqu");
        let fid = dir.path().join("fid");
        write_acqu(&acqu, &params(5)).unwrap();

        write_fid(&fid, &[1, 2, 3], TraceByteOrder::Little).unwrap();
        assert!(matches!(
            from_bruker(&acqu, &fid),
            Err(LoadError::TraceLength { declared: 5, found: 3, .. })
        ));

        fs::write(&fid, [0u8; 7]).unwrap();
        assert!(matches!(
            from_bruker(&acqu, &fid),
            Err(LoadError::TruncatedTrace { len: 7, .. })
        ));
    }

    #[test]
    fn longer_trace_is_cut_to_declared_size() {
        let dir = tempfile::tempdir().unwrap();
        let acqu = dir.path().join("acqu");
        let fid = dir.path().join("fid");
        write_acqu(&acqu, &params(2)).unwrap();
        write_fid(&fid, &[4, 5, 6, 7], TraceByteOrder::Little).unwrap();

        let sp = from_bruker(&acqu, &fid).unwrap();
        assert_eq!(sp.intensity(), &[4.0, 5.0]);
    }

    #[test]
    fn missing_fid_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let acqu = dir.path().join("acqu");
        write_acqu(&acqu, &params(2)).unwrap();
        let err = from_bruker(&acqu, &dir.path().join("fid")).unwrap_err();
        assert!(matches!(err, LoadError::Missing(_)));
    }
}
