//! Publication comparison results.
//!
//! A comparison step upstream writes one marker file per published
//! artifact. An empty marker means the freshly built artifact is identical
//! to the last released one; any content means it differs. Only the byte
//! length of a marker matters.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, warn};

/// Comparison outcome for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonMarker {
    /// What was compared, usually the marker's file path.
    pub artifact_label: String,
    /// Size of the diff; zero means no difference.
    pub byte_size: u64,
}

impl ComparisonMarker {
    /// Marker for `artifact_label` with a diff of `byte_size` bytes.
    pub fn new(artifact_label: impl Into<String>, byte_size: u64) -> Self {
        Self {
            artifact_label: artifact_label.into(),
            byte_size,
        }
    }

    /// Whether this artifact differs from its previous publication.
    pub const fn differs(&self) -> bool {
        self.byte_size > 0
    }

    /// Read the marker stored at `path`.
    ///
    /// A file that doesn't exist counts as a zero-size marker, matching
    /// how the comparison step reports "nothing to diff".
    pub fn from_file(path: &Utf8Path) -> std::io::Result<Self> {
        let byte_size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path, "comparison result file missing, treating as no difference");
                0
            }
            Err(e) => return Err(e),
        };
        Ok(Self::new(path.as_str(), byte_size))
    }
}

/// Read a marker for each path, in order.
pub fn markers_from_files(paths: &[Utf8PathBuf]) -> std::io::Result<Vec<ComparisonMarker>> {
    paths.iter().map(|p| ComparisonMarker::from_file(p)).collect()
}

/// Reduce comparison markers to a single "publications differ" signal.
///
/// No markers means the comparison did not run, which is treated as
/// "differences exist" so that a release is not silently blocked.
/// Otherwise the publications differ if any marker is non-empty.
pub fn has_differences(markers: &[ComparisonMarker]) -> bool {
    if markers.is_empty() {
        debug!("no comparison results, assuming publications differ");
        return true;
    }

    let differing: Vec<&str> = markers
        .iter()
        .filter(|m| m.differs())
        .map(|m| m.artifact_label.as_str())
        .collect();
    debug!(
        markers = markers.len(),
        differing = differing.len(),
        ?differing,
        "compared publications"
    );
    !differing.is_empty()
}
