//! Configuration file sync helper.
//!
//! Copies a fixed list of configuration and credential files into the
//! deployment directory. Contents are compared first so repeated runs
//! are no-ops; the files themselves are opaque and never inspected.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::DeployError;

/// What happened to one synced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyAction {
    /// The destination was created or replaced.
    Copied,

    /// Source and destination were already identical.
    UpToDate,
}

/// Per-file sync report.
#[derive(Debug, Clone)]
pub struct CopyReport {
    pub file: PathBuf,
    pub action: CopyAction,
}

/// Copy `files` (relative paths) from `source_dir` into `dest_dir`.
pub fn sync_files(
    source_dir: &Path,
    dest_dir: &Path,
    files: &[PathBuf],
) -> Result<Vec<CopyReport>, DeployError> {
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let source = source_dir.join(file);
        if !source.is_file() {
            return Err(DeployError::SourceMissing { path: source });
        }

        let dest = dest_dir.join(file);
        if dest.is_file() && fs::read(&source)? == fs::read(&dest)? {
            debug!(file = %file.display(), "already up to date");
            reports.push(CopyReport {
                file: file.clone(),
                action: CopyAction::UpToDate,
            });
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &dest)?;
        info!(file = %file.display(), dest = %dest.display(), "copied");
        reports.push(CopyReport {
            file: file.clone(),
            action: CopyAction::Copied,
        });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_missing_and_skips_identical_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let files = vec![PathBuf::from("bitrix24/bitrix_portals.json")];

        fs::create_dir_all(src.path().join("bitrix24")).unwrap();
        fs::write(src.path().join(&files[0]), b"{}").unwrap();

        let first = sync_files(src.path(), dst.path(), &files).unwrap();
        assert_eq!(first[0].action, CopyAction::Copied);
        assert!(dst.path().join(&files[0]).is_file());

        let second = sync_files(src.path(), dst.path(), &files).unwrap();
        assert_eq!(second[0].action, CopyAction::UpToDate);
    }

    #[test]
    fn replaces_outdated_destination() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let files = vec![PathBuf::from(".env")];

        fs::write(src.path().join(".env"), b"DB_HOST=new").unwrap();
        fs::write(dst.path().join(".env"), b"DB_HOST=old").unwrap();

        let reports = sync_files(src.path(), dst.path(), &files).unwrap();
        assert_eq!(reports[0].action, CopyAction::Copied);
        assert_eq!(fs::read(dst.path().join(".env")).unwrap(), b"DB_HOST=new");
    }

    #[test]
    fn missing_source_is_an_error() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let files = vec![PathBuf::from("absent.json")];

        let err = sync_files(src.path(), dst.path(), &files).unwrap_err();
        assert!(matches!(err, DeployError::SourceMissing { .. }));
    }
}
