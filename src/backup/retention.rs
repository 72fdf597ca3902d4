use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::archive::{ARTIFACT_PREFIX, ARTIFACT_SUFFIX};

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("failed to list backup directory {path}: {source}")]
    List {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Delete all but the `keep` newest artifacts in `dest_dir` and return how
/// many were removed. Newest-first order falls out of sorting the filenames
/// descending. A delete that fails is logged and skipped so the rest of the
/// sweep still happens.
pub fn enforce(dest_dir: &Path, keep: usize) -> Result<usize, RetentionError> {
    let keep = keep.max(1);
    let mut names = fs::read_dir(dest_dir)
        .map_err(|source| RetentionError::List {
            path: dest_dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_SUFFIX))
        .collect::<Vec<_>>();

    names.sort();
    names.reverse();

    let mut deleted = 0;
    for name in names.into_iter().skip(keep) {
        let path = dest_dir.join(&name);
        info!("deleting old backup: {}", path.display());
        match fs::remove_file(&path) {
            Ok(()) => deleted += 1,
            Err(err) => warn!("failed to delete {}: {}", path.display(), err),
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn artifact(dir: &Path, sec: usize) {
        touch(dir, &format!("mc_backup_2026-01-01_00-00-{sec:02}.tar.gz"));
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn keeps_the_newest_n() {
        let dir = tempfile::tempdir().unwrap();
        for sec in 0..7 {
            artifact(dir.path(), sec);
        }

        let deleted = enforce(dir.path(), 5).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(
            remaining(dir.path()),
            (2..7)
                .map(|sec| format!("mc_backup_2026-01-01_00-00-{sec:02}.tar.gz"))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn noop_below_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        for sec in 0..3 {
            artifact(dir.path(), sec);
        }
        assert_eq!(enforce(dir.path(), 5).unwrap(), 0);
        assert_eq!(remaining(dir.path()).len(), 3);
    }

    #[test]
    fn repeated_enforcement_deletes_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        for sec in 0..9 {
            artifact(dir.path(), sec);
        }
        assert_eq!(enforce(dir.path(), 4).unwrap(), 5);
        assert_eq!(enforce(dir.path(), 4).unwrap(), 0);
        assert_eq!(remaining(dir.path()).len(), 4);
    }

    #[test]
    fn ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        for sec in 0..6 {
            artifact(dir.path(), sec);
        }
        touch(dir.path(), "backup_log.log");
        touch(dir.path(), "mc_backup_notes.txt");
        touch(dir.path(), "unrelated.tar.gz");

        enforce(dir.path(), 2).unwrap();
        let names = remaining(dir.path());
        assert!(names.contains(&"backup_log.log".to_string()));
        assert!(names.contains(&"mc_backup_notes.txt".to_string()));
        assert!(names.contains(&"unrelated.tar.gz".to_string()));
        assert_eq!(
            names
                .iter()
                .filter(|name| name.ends_with(".tar.gz") && name.starts_with("mc_backup_2026"))
                .count(),
            2
        );
    }

    #[test]
    fn manual_artifacts_count_against_the_window() {
        let dir = tempfile::tempdir().unwrap();
        for sec in 0..4 {
            artifact(dir.path(), sec);
        }
        touch(dir.path(), "mc_backup_2026-01-01_00-00-04_manual.tar.gz");

        assert_eq!(enforce(dir.path(), 3).unwrap(), 2);
        let names = remaining(dir.path());
        assert!(names.contains(&"mc_backup_2026-01-01_00-00-04_manual.tar.gz".to_string()));
    }

    #[test]
    fn keep_is_clamped_to_one() {
        let dir = tempfile::tempdir().unwrap();
        for sec in 0..3 {
            artifact(dir.path(), sec);
        }
        enforce(dir.path(), 0).unwrap();
        assert_eq!(remaining(dir.path()).len(), 1);
    }
}
