use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_NAME: &str = "mc-dab.toml";
const LOG_FILE_NAME: &str = "backup_log.log";

/// On-disk configuration. Every field is optional; missing keys fall back
/// to the defaults below, and CLI flags override the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub container: String,
    pub rcon_bin: String,
    pub world_path: PathBuf,
    pub backup_dir: PathBuf,
    pub interval_minutes: u64,
    pub max_backups: usize,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            container: "minecraft".to_string(),
            rcon_bin: "rcon-cli".to_string(),
            world_path: PathBuf::from("world"),
            backup_dir: PathBuf::from("backups"),
            interval_minutes: 60,
            max_backups: 5,
        }
    }
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub container: String,
    pub rcon_bin: String,
    pub world_path: PathBuf,
    pub backup_dir: PathBuf,
    pub interval: Duration,
    pub max_backups: usize,
}

impl Config {
    /// Resolve the effective configuration: built-in defaults, then the
    /// config file (explicit path or ./mc-dab.toml), then CLI overrides.
    pub fn load(
        explicit: Option<&Path>,
        world_override: Option<PathBuf>,
        backup_override: Option<PathBuf>,
    ) -> Result<Self> {
        let file = match explicit {
            Some(path) => ConfigFile::read(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_NAME);
                if default_path.exists() {
                    ConfigFile::read(default_path)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        Ok(Self {
            container: file.container,
            rcon_bin: file.rcon_bin,
            world_path: world_override.unwrap_or(file.world_path),
            backup_dir: backup_override.unwrap_or(file.backup_dir),
            interval: Duration::from_secs(file.interval_minutes.max(1) * 60),
            max_backups: file.max_backups.max(1),
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.backup_dir.join(LOG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_config_file() {
        let config = Config::load(None, None, None).unwrap();
        assert_eq!(config.container, "minecraft");
        assert_eq!(config.max_backups, 5);
        assert_eq!(config.interval, Duration::from_secs(3600));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mc-dab.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "container = \"mc\"").unwrap();
        writeln!(file, "interval_minutes = 30").unwrap();
        writeln!(file, "max_backups = 3").unwrap();

        let config = Config::load(Some(&path), None, None).unwrap();
        assert_eq!(config.container, "mc");
        assert_eq!(config.interval, Duration::from_secs(1800));
        assert_eq!(config.max_backups, 3);
        // untouched keys keep their defaults
        assert_eq!(config.rcon_bin, "rcon-cli");
    }

    #[test]
    fn cli_paths_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mc-dab.toml");
        fs::write(&path, "world_path = \"/srv/world\"\n").unwrap();

        let config = Config::load(
            Some(&path),
            Some(PathBuf::from("/elsewhere/world")),
            Some(PathBuf::from("/elsewhere/backups")),
        )
        .unwrap();
        assert_eq!(config.world_path, PathBuf::from("/elsewhere/world"));
        assert_eq!(config.backup_dir, PathBuf::from("/elsewhere/backups"));
    }

    #[test]
    fn zero_values_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mc-dab.toml");
        fs::write(&path, "interval_minutes = 0\nmax_backups = 0\n").unwrap();

        let config = Config::load(Some(&path), None, None).unwrap();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.max_backups, 1);
    }
}
