use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::rcon::ServerConsole;

use super::state::{self, ScheduleState};
use super::Coordinator;

/// Tick the coordinator forever, starting one full interval after launch.
/// `MissedTickBehavior::Delay` gives the no-catch-up policy: a cycle that
/// overruns the interval just pushes the next tick out by the overrun.
/// Each cycle runs in its own task and is awaited before the next tick, so
/// cycles never overlap but a failed or panicked cycle only costs that one
/// tick.
pub async fn run<C: ServerConsole + 'static>(
    coordinator: Coordinator<C>,
    world: PathBuf,
    backup_dir: PathBuf,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let coordinator = Arc::new(coordinator);
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        "scheduler started, first backup in {} minutes",
        period.as_secs() / 60
    );

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let coordinator = coordinator.clone();
                let world = world.clone();
                let backup_dir = backup_dir.clone();
                let cycle = tokio::spawn(async move {
                    coordinator.run_backup(&world, &backup_dir, false).await
                });
                match cycle.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => error!("scheduled backup failed: {err}"),
                    Err(err) => error!("scheduled backup panicked: {err}"),
                }
            }
            _ = shutdown.changed() => {
                info!("scheduler stopping");
                return;
            }
        }
    }
}

/// Resident mode: start the scheduler, then block until SIGINT/SIGTERM.
/// Shutdown waits for an in-flight cycle to finish (its own cleanup
/// re-enables autosave) and then sends one more best-effort `save-on`, so
/// a stop mid-archive can never leave the server with autosave off.
pub async fn run_resident<C>(console: Arc<C>, config: &Config) -> anyhow::Result<()>
where
    C: ServerConsole + 'static,
{
    std::fs::create_dir_all(&config.backup_dir)?;

    // fresh process, fresh slate: status starts over at "no backup yet"
    let state = ScheduleState::shared(config.interval);
    state::write_snapshot(&config.backup_dir, &state.lock().expect("schedule state lock poisoned"))?;

    let coordinator = Coordinator::new(console.clone(), config.max_backups, state);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run(
        coordinator,
        config.world_path.clone(),
        config.backup_dir.clone(),
        config.interval,
        shutdown_rx,
    ));

    wait_for_shutdown().await;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    if let Err(err) = scheduler.await {
        error!("scheduler task panicked: {err}");
    }

    if let Err(err) = console.execute("save-on").await {
        warn!("shutdown save-on failed: {err}");
    }
    Ok(())
}

async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            warn!("failed to install SIGTERM handler: {err}");
            let _ = ctrl_c.await;
        }
    }
}
