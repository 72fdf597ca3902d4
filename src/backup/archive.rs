use chrono::{DateTime, Local};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const ARTIFACT_PREFIX: &str = "mc_backup_";
pub const ARTIFACT_SUFFIX: &str = ".tar.gz";
const MANUAL_TAG: &str = "_manual";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("world directory not found: {0}")]
    SourceMissing(PathBuf),
    #[error("failed to prepare backup directory {path}: {source}")]
    DestUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write archive {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Artifact filename for a given cycle. The fixed-width timestamp makes
/// plain lexicographic order chronological; `_manual` only tags how the
/// cycle was triggered.
pub fn artifact_name(timestamp: DateTime<Local>, manual: bool) -> String {
    let tag = if manual { MANUAL_TAG } else { "" };
    format!(
        "{ARTIFACT_PREFIX}{}{tag}{ARTIFACT_SUFFIX}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Compress the world directory into a single tar.gz artifact whose root
/// entry is always named `world`, whatever the source directory is called.
/// Either the artifact is fully written or no file is left behind.
pub async fn archive_world(
    source: &Path,
    dest_dir: &Path,
    timestamp: DateTime<Local>,
    manual: bool,
) -> Result<PathBuf, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::SourceMissing(source.to_path_buf()));
    }
    std::fs::create_dir_all(dest_dir).map_err(|source| ArchiveError::DestUnwritable {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let archive_path = dest_dir.join(artifact_name(timestamp, manual));
    info!(
        "backing up {} to {} (can take a while depending on world size)",
        source.display(),
        archive_path.display()
    );

    let source = source.to_path_buf();
    let path = archive_path.clone();
    tokio::task::spawn_blocking(move || write_archive(&source, &path)).await??;

    Ok(archive_path)
}

fn write_archive(source: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
    let result = try_write_archive(source, archive_path);
    if result.is_err() {
        // never leave a partial artifact behind
        let _ = std::fs::remove_file(archive_path);
    }
    result
}

fn try_write_archive(source: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
    let io = |source: std::io::Error| ArchiveError::Write {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::create(archive_path).map_err(io)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = tar::Builder::new(encoder);
    tar.append_dir_all("world", source).map_err(io)?;
    let encoder = tar.into_inner().map_err(io)?;
    encoder.finish().map_err(io)?;
    Ok(())
}
