use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::model::SamplePair;

/// File name of the acquisition-parameters file that anchors a sample.
pub const ACQU_FILE: &str = "acqu";

// ---------------------------------------------------------------------------
// Label <-> path mapping
// ---------------------------------------------------------------------------

/// Directory levels named by a label: every `_` separates two levels, so
/// `Klebsiella_Pneumoniae_ssp` names `Klebsiella/Pneumoniae/ssp`. Empty
/// pieces from doubled or edge underscores are dropped.
pub fn label_segments(label: &str) -> Vec<&str> {
    label.split('_').filter(|s| !s.is_empty()).collect()
}

/// `<root>/<Genus>/<Species>[/...]` for a label.
pub fn species_dir(root: &Path, label: &str) -> PathBuf {
    label_segments(label)
        .into_iter()
        .fold(root.to_path_buf(), |dir, segment| dir.join(segment))
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Order in which sample pairs are listed before the per-species cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOrder {
    /// Lexicographic by file name at every directory level; reproducible.
    #[default]
    Sorted,
    /// Whatever order the filesystem returns entries in.
    Filesystem,
}

/// Every `acqu` file below `dir`, paired with its sibling `fid`.
///
/// A missing directory yields no pairs. Unreadable entries are logged and
/// skipped, the walk continues.
pub fn discover_pairs(dir: &Path, order: DiscoveryOrder) -> Vec<SamplePair> {
    if !dir.is_dir() {
        warn!("species directory {} does not exist", dir.display());
        return Vec::new();
    }

    let walker = WalkDir::new(dir).follow_links(false);
    let walker = match order {
        DiscoveryOrder::Sorted => walker.sort_by_file_name(),
        DiscoveryOrder::Filesystem => walker,
    };

    let mut pairs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("skipping unreadable entry under {}: {err}", dir.display());
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == ACQU_FILE {
            pairs.push(SamplePair::from_acqu(entry.path()));
        }
    }
    debug!("{} sample pair(s) under {}", pairs.len(), dir.display());
    pairs
}

/// Discover the pairs of one species and keep at most `cap`, preserving order.
pub fn species_pairs(
    root: &Path,
    label: &str,
    cap: usize,
    order: DiscoveryOrder,
) -> (usize, Vec<SamplePair>) {
    let mut pairs = discover_pairs(&species_dir(root, label), order);
    let found = pairs.len();
    pairs.truncate(cap);
    (found, pairs)
}
