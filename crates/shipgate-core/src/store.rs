//! On-disk snapshot of project contributors.
//!
//! The snapshot is a pretty-printed JSON document:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "contributors": [
//!     {
//!       "login": "szczepiq",
//!       "name": "Szczepan Faber",
//!       "contributions": 1024,
//!       "repository": "mockito/mockito"
//!     }
//!   ]
//! }
//! ```
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the destination, so readers see either the old snapshot or
//! the new one, never a truncated file.

use std::collections::HashSet;
use std::io::Write;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::contributors::{ContributorRecord, ProjectContributorsSnapshot};

/// Version written into new snapshot files.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from snapshot persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The file exists but is not a valid snapshot.
    #[error("corrupt contributors snapshot {path}: {message}")]
    CorruptSnapshot {
        /// The offending file.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// Reading or writing the file failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// What was being attempted ("read", "write", ...).
        action: &'static str,
        /// The file involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for snapshot persistence.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    format_version: u32,
    contributors: &'a [ContributorRecord],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    format_version: u32,
    contributors: Vec<ContributorRecord>,
}

/// Write `snapshot` to `destination`, atomically replacing any previous file.
///
/// Missing parent directories are created.
#[instrument(skip(snapshot), fields(contributors = snapshot.len()))]
pub fn save(snapshot: &ProjectContributorsSnapshot, destination: &Utf8Path) -> StoreResult<()> {
    let io_err = |action: &'static str| {
        move |source: std::io::Error| StoreError::Io {
            action,
            path: destination.to_string(),
            source,
        }
    };

    let parent = match destination.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_err("create parent directory of"))?;

    let document = SnapshotFileRef {
        format_version: FORMAT_VERSION,
        contributors: snapshot.contributors(),
    };
    let mut json = serde_json::to_vec_pretty(&document)
        .map_err(|e| io_err("serialize")(std::io::Error::other(e)))?;
    json.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err("create temp file for"))?;
    tmp.write_all(&json).map_err(io_err("write"))?;
    tmp.as_file().sync_all().map_err(io_err("sync"))?;
    tmp.persist(destination)
        .map_err(|e| io_err("replace")(e.error))?;

    info!(path = %destination, "saved contributors snapshot");
    Ok(())
}

/// Read a snapshot from `source`.
///
/// A missing or empty (whitespace-only) file is an empty snapshot. Anything
/// that does not parse, repeats a login, or carries an unknown format
/// version is [`StoreError::CorruptSnapshot`].
#[instrument]
pub fn load(source: &Utf8Path) -> StoreResult<ProjectContributorsSnapshot> {
    let text = match std::fs::read_to_string(source) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no snapshot file, starting empty");
            return Ok(ProjectContributorsSnapshot::default());
        }
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            return Err(corrupt(source, "file is not valid UTF-8"));
        }
        Err(source_err) => {
            return Err(StoreError::Io {
                action: "read",
                path: source.to_string(),
                source: source_err,
            });
        }
    };

    if text.trim().is_empty() {
        debug!("empty snapshot file");
        return Ok(ProjectContributorsSnapshot::default());
    }

    let file: SnapshotFile =
        serde_json::from_str(&text).map_err(|e| corrupt(source, &e.to_string()))?;
    if file.format_version != FORMAT_VERSION {
        return Err(corrupt(
            source,
            &format!("unsupported format_version {}", file.format_version),
        ));
    }

    let mut seen = HashSet::with_capacity(file.contributors.len());
    for record in &file.contributors {
        if !seen.insert(record.login.as_str()) {
            return Err(corrupt(source, &format!("duplicate login '{}'", record.login)));
        }
    }

    let snapshot = ProjectContributorsSnapshot::from_unique(file.contributors);
    debug!(contributors = snapshot.len(), "loaded contributors snapshot");
    Ok(snapshot)
}

fn corrupt(path: &Utf8Path, message: &str) -> StoreError {
    StoreError::CorruptSnapshot {
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;
    use crate::remote::RepositoryIdentity;

    fn tmp_dir() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, dir)
    }

    fn record(login: &str, name: &str, contributions: u64, repo: &str) -> ContributorRecord {
        ContributorRecord {
            login: login.into(),
            name: name.into(),
            contributions,
            repository: repo.parse::<RepositoryIdentity>().unwrap(),
        }
    }

    fn sample() -> ProjectContributorsSnapshot {
        ProjectContributorsSnapshot::from_records(vec![
            record("mstachniuk", "Marcin Stachniuk", 40, "mockito/shipkit"),
            record("szczepiq", "Szczepan Faber", 120, "mockito/mockito"),
            record("bric3", "bric3", 40, "mockito/mockito"),
        ])
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("contributors.json");
        let snapshot = sample();

        save(&snapshot, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, snapshot);
        let logins: Vec<&str> = loaded.contributors().iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["szczepiq", "bric3", "mstachniuk"]);
    }

    #[test]
    fn saved_file_is_self_describing() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("contributors.json");
        save(&sample(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["format_version"], 1);
        let first = &value["contributors"][0];
        assert_eq!(first["login"], "szczepiq");
        assert_eq!(first["name"], "Szczepan Faber");
        assert_eq!(first["contributions"], 120);
        assert_eq!(first["repository"], "mockito/mockito");
    }

    #[test]
    fn save_creates_parent_directories() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("build").join("release-tools").join("all-contributors.json");
        save(&sample(), &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn save_replaces_previous_snapshot_without_leftovers() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("contributors.json");
        save(&sample(), &path).unwrap();
        save(&ProjectContributorsSnapshot::default(), &path).unwrap();

        assert!(load(&path).unwrap().is_empty());
        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1, "temp files must not be left behind");
    }

    #[test]
    fn failed_save_leaves_previous_file_untouched() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("contributors.json");
        save(&sample(), &path).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        // A directory in place of the parent makes the write fail
        let blocked = dir.join("contributors.json").join("nested.json");
        assert!(save(&sample(), &blocked).is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn missing_file_is_empty_snapshot() {
        let (_tmp, dir) = tmp_dir();
        let snapshot = load(&dir.join("absent.json")).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn empty_file_is_empty_snapshot() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("empty.json");
        std::fs::write(&path, "\n  \n").unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_corrupt() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{\"contributors\": [").unwrap();
        assert!(matches!(load(&path), Err(StoreError::CorruptSnapshot { .. })));
    }

    #[test]
    fn invalid_repository_is_corrupt() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("bad.json");
        std::fs::write(
            &path,
            r#"{"format_version":1,"contributors":[{"login":"a","name":"a","contributions":1,"repository":"nope"}]}"#,
        )
        .unwrap();
        assert!(matches!(load(&path), Err(StoreError::CorruptSnapshot { .. })));
    }

    #[test]
    fn duplicate_login_is_corrupt() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("dup.json");
        std::fs::write(
            &path,
            r#"{"format_version":1,"contributors":[
                {"login":"a","name":"a","contributions":1,"repository":"o/r"},
                {"login":"a","name":"a","contributions":2,"repository":"o/r"}]}"#,
        )
        .unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate login 'a'"));
    }

    #[test]
    fn unknown_format_version_is_corrupt() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("future.json");
        std::fs::write(&path, r#"{"format_version":2,"contributors":[]}"#).unwrap();
        assert!(matches!(load(&path), Err(StoreError::CorruptSnapshot { .. })));
    }

    #[test]
    fn load_restores_ranking_order() {
        let (_tmp, dir) = tmp_dir();
        let path = dir.join("unordered.json");
        std::fs::write(
            &path,
            r#"{"format_version":1,"contributors":[
                {"login":"low","name":"Low","contributions":1,"repository":"o/r"},
                {"login":"high","name":"High","contributions":9,"repository":"o/r"}]}"#,
        )
        .unwrap();
        let snapshot = load(&path).unwrap();
        assert_eq!(snapshot.contributors()[0].login, "high");
    }
}
