//! Watch mode - periodic backups in the foreground
//!
//! Runs a backup every configured interval until Ctrl+C. Ctrl+C also raises
//! the cancellation flag so a run in progress stops at the next action.

use crate::sync::{SyncEngine, SyncSummary};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Parse duration strings like "30s", "30m", "1h", "2d" or plain seconds
pub fn parse_interval(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    let secs = if let Some(value) = duration_str.strip_suffix('s') {
        value.parse::<u64>().context("Invalid seconds value")?
    } else if let Some(value) = duration_str.strip_suffix('m') {
        value.parse::<u64>().map(|v| v * 60).context("Invalid minutes value")?
    } else if let Some(value) = duration_str.strip_suffix('h') {
        value.parse::<u64>().map(|v| v * 3600).context("Invalid hours value")?
    } else if let Some(value) = duration_str.strip_suffix('d') {
        value.parse::<u64>().map(|v| v * 86400).context("Invalid days value")?
    } else {
        duration_str
            .parse::<u64>()
            .context("Invalid duration format. Use format like '30m', '1h', '2d'")?
    };

    if secs == 0 {
        anyhow::bail!("Interval must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

/// Watch-mode statistics
#[derive(Debug, Clone, Default)]
pub struct WatchStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<Instant>,
}

/// Foreground periodic runner
pub struct Watcher {
    engine: SyncEngine,
    interval: Duration,
    cancel: Arc<AtomicBool>,
    shutdown_sender: broadcast::Sender<()>,
    stats: WatchStats,
}

impl Watcher {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            engine,
            interval,
            cancel: Arc::new(AtomicBool::new(false)),
            shutdown_sender,
            stats: WatchStats::default(),
        }
    }

    /// Handle that stops the loop and cancels the current run
    pub fn shutdown_handle(&self) -> (broadcast::Sender<()>, Arc<AtomicBool>) {
        (self.shutdown_sender.clone(), self.cancel.clone())
    }

    pub fn stats(&self) -> &WatchStats {
        &self.stats
    }

    /// Run until Ctrl+C. The first backup starts immediately.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting watch mode with interval: {:?}", self.interval);

        let (shutdown_sender, cancel) = self.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, stopping watch mode...");
                cancel.store(true, Ordering::SeqCst);
                let _ = shutdown_sender.send(());
            }
        });

        self.watch_loop().await
    }

    /// Main loop; exits when a shutdown message arrives
    pub async fn watch_loop(&mut self) -> Result<()> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let mut interval_timer = interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received in watch loop");
                    break;
                }

                _ = interval_timer.tick() => {
                    if self.cancel.load(Ordering::SeqCst) {
                        break;
                    }

                    debug!("Starting scheduled backup");
                    self.stats.total_runs += 1;
                    self.stats.last_run = Some(Instant::now());

                    match self.engine.sync_once(self.cancel.clone()).await {
                        Ok(summary) => {
                            self.stats.successful_runs += 1;
                            log_run_success(&summary);
                        }
                        Err(e) => {
                            self.stats.failed_runs += 1;
                            error!("Scheduled backup failed: {:?}", e);
                        }
                    }
                }
            }
        }

        info!(
            "Watch mode exiting after {} runs ({} failed)",
            self.stats.total_runs, self.stats.failed_runs
        );
        Ok(())
    }
}

fn log_run_success(summary: &SyncSummary) {
    info!(
        "Scheduled backup completed in {:.2}s: {} added, {} updated, {} failed, {} deleted in source",
        summary.duration.as_secs_f64(),
        summary.added,
        summary.updated,
        summary.failed_operations,
        summary.deleted_in_source
    );
}
