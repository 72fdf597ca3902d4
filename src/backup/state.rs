use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const STATUS_FILE_NAME: &str = ".mc-dab-status.json";

pub type SharedState = Arc<Mutex<ScheduleState>>;

/// Process-wide schedule bookkeeping. The coordinator is the only writer;
/// status queries read the mirrored snapshot file instead of this struct.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub last_success: Option<DateTime<Local>>,
    pub interval: Duration,
}

impl ScheduleState {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_success: None,
            interval,
        }
    }

    pub fn shared(interval: Duration) -> SharedState {
        Arc::new(Mutex::new(Self::new(interval)))
    }
}

/// Mirror of `ScheduleState` written to the backup directory so a separate
/// `--status` invocation can read it. Rewritten from scratch when a resident
/// process starts, so state never survives a restart.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub last_success: Option<DateTime<Local>>,
    pub interval_secs: u64,
    pub written_at: DateTime<Local>,
}

pub fn status_path(backup_dir: &Path) -> PathBuf {
    backup_dir.join(STATUS_FILE_NAME)
}

/// Write the snapshot atomically (tmp file + rename) so a concurrent reader
/// never sees a half-written document.
pub fn write_snapshot(backup_dir: &Path, state: &ScheduleState) -> io::Result<()> {
    let snapshot = StatusSnapshot {
        last_success: state.last_success,
        interval_secs: state.interval.as_secs(),
        written_at: Local::now(),
    };
    let path = status_path(backup_dir);
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(&snapshot).map_err(io::Error::other)?;
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

pub fn read_snapshot(backup_dir: &Path) -> Option<StatusSnapshot> {
    let content = fs::read_to_string(status_path(backup_dir)).ok()?;
    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!("ignoring malformed status snapshot: {err}");
            None
        }
    }
}

/// Human-readable status line for the CLI.
pub fn format_status(snapshot: Option<&StatusSnapshot>, now: DateTime<Local>) -> String {
    let Some(snapshot) = snapshot else {
        return "no backup yet".to_string();
    };
    let Some(last) = snapshot.last_success else {
        return "no backup yet".to_string();
    };

    let interval = TimeDelta::seconds(snapshot.interval_secs as i64);
    let remaining = (interval - now.signed_duration_since(last)).max(TimeDelta::zero());
    let next = if remaining.is_zero() {
        "due now".to_string()
    } else if remaining.num_minutes() == 0 {
        "in less than a minute".to_string()
    } else {
        format!("in ~{} minutes", remaining.num_minutes())
    };
    format!(
        "last backup: {}\nnext backup {next}",
        last.format("%Y-%m-%d %H:%M:%S")
    )
}
