use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::Arc;

mod backup;
mod config;
mod logs;
mod rcon;

use backup::state::ScheduleState;
use backup::Coordinator;
use config::Config;

#[derive(Parser)]
#[command(name = "mc-dab")]
#[command(about = "Rotating tar.gz world backups for a dockerized Minecraft server", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["manual", "status", "logs", "run"])
))]
struct Cli {
    /// World directory to archive
    #[arg(long)]
    world_path: Option<PathBuf>,
    /// Directory receiving the rotated archives
    #[arg(long)]
    backup_dir: Option<PathBuf>,
    /// Path to mc-dab.toml (defaults to ./mc-dab.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run one tagged backup cycle now
    #[arg(long)]
    manual: bool,
    /// Print the last successful backup and time until the next one
    #[arg(long)]
    status: bool,
    /// Print the last 10 log lines
    #[arg(long)]
    logs: bool,
    /// Stay resident and back up on a fixed interval
    #[arg(long)]
    run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(
        cli.config.as_deref(),
        cli.world_path.clone(),
        cli.backup_dir.clone(),
    )
    .context("failed to load configuration")?;

    if cli.status {
        let snapshot = backup::state::read_snapshot(&config.backup_dir);
        println!(
            "{}",
            backup::state::format_status(snapshot.as_ref(), Local::now())
        );
        return Ok(());
    }

    if cli.logs {
        for line in logs::tail(&config.log_path(), 10)? {
            println!("{line}");
        }
        return Ok(());
    }

    logs::init(&config.log_path())?;
    let console = Arc::new(rcon::DockerRcon::new(
        config.container.clone(),
        config.rcon_bin.clone(),
    ));

    if cli.manual {
        let state = ScheduleState::shared(config.interval);
        let coordinator = Coordinator::new(console, config.max_backups, state);
        coordinator
            .run_backup(&config.world_path, &config.backup_dir, true)
            .await
            .context("manual backup failed")?;
        return Ok(());
    }

    backup::scheduler::run_resident(console, &config).await
}
