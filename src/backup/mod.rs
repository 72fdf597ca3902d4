pub mod archive;
pub mod retention;
pub mod scheduler;
pub mod state;

use chrono::{DateTime, Local};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::rcon::{ExecutionError, ServerConsole};
use archive::ArchiveError;
use state::SharedState;

const LOCK_FILE_NAME: &str = ".mc-dab.lock";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("another backup cycle is already running for {0}")]
    Busy(PathBuf),
    #[error("failed to prepare backup directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("failed to re-enable autosave: {0}")]
    Resume(#[source] ExecutionError),
}

/// Runs one backup cycle end to end: suspend autosave, flush, archive,
/// prune, resume autosave. Scheduled ticks and manual triggers both come
/// through here.
pub struct Coordinator<C> {
    console: C,
    keep: usize,
    state: SharedState,
}

impl<C: ServerConsole> Coordinator<C> {
    pub fn new(console: C, keep: usize, state: SharedState) -> Self {
        Self {
            console,
            keep,
            state,
        }
    }

    /// A cycle holds an exclusive file lock in the destination directory,
    /// so a trigger racing an in-flight cycle fails fast with `Busy`
    /// instead of interleaving. Autosave is re-enabled no matter how the
    /// archive step went; the last-success timestamp only moves on a fully
    /// clean cycle.
    pub async fn run_backup(
        &self,
        world: &Path,
        backup_dir: &Path,
        manual: bool,
    ) -> Result<PathBuf, BackupError> {
        self.run_backup_at(world, backup_dir, manual, Local::now())
            .await
    }

    /// `run_backup` with an explicit cycle timestamp.
    pub(crate) async fn run_backup_at(
        &self,
        world: &Path,
        backup_dir: &Path,
        manual: bool,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf, BackupError> {
        std::fs::create_dir_all(backup_dir).map_err(|source| BackupError::Prepare {
            path: backup_dir.to_path_buf(),
            source,
        })?;
        let _lock = acquire_cycle_lock(backup_dir)?;

        info!("disabling autosave and forcing a world save");
        if let Err(err) = self.console.execute("save-off").await {
            warn!("save-off failed, continuing with autosave enabled: {err}");
        }
        if let Err(err) = self.console.execute("save-all").await {
            warn!("save-all failed, world may not be fully flushed: {err}");
        }

        let archived = archive::archive_world(world, backup_dir, timestamp, manual).await;

        // retention only runs once a new artifact actually landed
        if archived.is_ok() {
            match retention::enforce(backup_dir, self.keep) {
                Ok(0) => {}
                Ok(count) => info!("pruned {count} old backups"),
                Err(err) => warn!("retention sweep failed: {err}"),
            }
        }

        // autosave must come back on no matter how the archive went
        let resumed = self.console.execute("save-on").await;
        match &resumed {
            Ok(()) => info!("re-enabled autosave"),
            Err(err) => error!("save-on failed, autosave may still be off: {err}"),
        }

        let path = archived?;
        resumed.map_err(BackupError::Resume)?;

        {
            let mut guard = self.state.lock().expect("schedule state lock poisoned");
            guard.last_success = Some(timestamp);
            if let Err(err) = state::write_snapshot(backup_dir, &guard) {
                warn!("failed to write status snapshot: {err}");
            }
        }
        info!("backup complete: {}", path.display());
        Ok(path)
    }
}

struct CycleLock {
    _file: std::fs::File,
}

fn acquire_cycle_lock(backup_dir: &Path) -> Result<CycleLock, BackupError> {
    let path = backup_dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| BackupError::Prepare {
            path: path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(CycleLock { _file: file }),
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
            Err(BackupError::Busy(backup_dir.to_path_buf()))
        }
        Err(source) => Err(BackupError::Prepare { path, source }),
    }
}
