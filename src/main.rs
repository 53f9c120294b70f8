use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

use mirrorkeep::config::{expand_path, LoggingConfig};
use mirrorkeep::diff::count_states;
use mirrorkeep::watch::parse_interval;
use mirrorkeep::{Config, HealthCheck, Plan, SyncEngine, SyncProgress, SyncState, SyncSummary, Watcher};

#[derive(Parser)]
#[command(name = "mirrorkeep")]
#[command(about = "One-way, version-preserving directory backup")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Source directory (overrides the configured one)
    #[arg(short, long, global = true)]
    source: Option<String>,

    /// Target directory (overrides the configured one)
    #[arg(short, long, global = true)]
    target: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the source and target directories to the configuration
    Init,

    /// Show the sync state of every path
    Status {
        /// Include unchanged paths
        #[arg(long)]
        all: bool,
    },

    /// Preview the backup plan
    Plan {
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Back up the source into the target
    Sync {
        /// Show the plan without making changes
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run a backup periodically until Ctrl+C
    Watch {
        /// Interval between runs, e.g. "30m", "1h"
        #[arg(short, long)]
        interval: Option<String>,
    },

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let config = match (&cli.command, cli.config.as_deref()) {
        // init may point --config at a file that does not exist yet
        (Commands::Init, Some(path)) if !path.exists() => Config::default(),
        (_, path) => load_config(path)?,
    };

    init_logging(cli.verbose, &config.logging)?;
    info!("Starting mirrorkeep v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config;
    if let Some(source) = &cli.source {
        config.source_directory = Some(expand_path(source).context("Invalid --source path")?);
    }
    if let Some(target) = &cli.target {
        config.target_directory = Some(expand_path(target).context("Invalid --target path")?);
    }

    match cli.command {
        Commands::Init => cmd_init(&config, &config_path),
        Commands::Status { all } => cmd_status(all, &config),
        Commands::Plan { json } => cmd_plan(json, &config),
        Commands::Sync { dry_run, yes } => cmd_sync(dry_run, yes, &config).await,
        Commands::Watch { interval } => cmd_watch(interval, &config).await,
        Commands::Doctor => cmd_doctor(&config),
    }
}

/// Initialize logging from the configuration; `--verbose` forces debug.
/// Log output goes to stderr so `plan --json` stays machine readable.
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match logging.format.as_str() {
        "pretty" => fmt::layer()
            .pretty()
            .with_ansi(logging.color)
            .with_writer(std::io::stderr)
            .boxed(),
        "full" => fmt::layer()
            .with_ansi(logging.color)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => fmt::layer()
            .compact()
            .with_ansi(logging.color)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).with(filter).init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Persist the selected roots
fn cmd_init(config: &Config, config_path: &std::path::Path) -> Result<()> {
    info!("Initializing mirrorkeep...");

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    config.save(config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ mirrorkeep initialized successfully!");
    println!("   Config: {:?}", config_path);
    println!(
        "   Source directory: {}",
        config.source_directory.as_deref().unwrap_or("(not set)")
    );
    println!(
        "   Target directory: {}",
        config.target_directory.as_deref().unwrap_or("(not set)")
    );

    if config.source_directory.is_none() || config.target_directory.is_none() {
        println!("   Next: mirrorkeep init --source <dir> --target <dir>");
    } else {
        println!("   Next: run 'mirrorkeep sync'");
    }

    Ok(())
}

/// Print the state map of both trees
fn cmd_status(all: bool, config: &Config) -> Result<()> {
    let mut engine = SyncEngine::new(config);
    let states = engine.states()?;

    println!("📊 Backup status");
    for (path, state) in &states {
        if all || *state != SyncState::Unchanged {
            println!("   {} {:<9} {}", state_icon(*state), state.as_str(), path);
        }
    }

    let counts = count_states(states.values());
    let count = |state: SyncState| counts.get(&state).copied().unwrap_or(0);
    println!();
    println!("📈 Summary:");
    println!("   ➕ Added: {}", count(SyncState::Added));
    println!("   🔄 Updated: {}", count(SyncState::Updated));
    println!("   🗑️  Deleted in source: {}", count(SyncState::Deleted));
    println!("   ✅ Unchanged: {}", count(SyncState::Unchanged));

    Ok(())
}

/// Preview the ordered plan
fn cmd_plan(json: bool, config: &Config) -> Result<()> {
    let mut engine = SyncEngine::new(config);
    let plan = engine.prepare_plan()?;

    if json {
        let output = serde_json::to_string_pretty(plan.actions())
            .context("Failed to serialize the backup plan")?;
        println!("{}", output);
        return Ok(());
    }

    print_plan(&plan);
    Ok(())
}

/// Build, confirm and execute a backup
async fn cmd_sync(dry_run: bool, yes: bool, config: &Config) -> Result<()> {
    info!("Starting backup...");

    let mut engine = SyncEngine::new(config);
    let plan = engine.prepare_plan()?;

    // Preflight checks - make sure the target can take the backup
    let health = HealthCheck::run(engine.source(), engine.target());
    if !health.all_passed() {
        print_health_report(&health);
        anyhow::bail!("Cannot start backup - fix the errors above first");
    }

    // Show warnings but continue
    for warning in health.warnings() {
        println!("⚠️  {}", warning.message);
        if let Some(details) = &warning.details {
            println!("   {}", details);
        }
    }

    if dry_run {
        println!("🔍 Dry run mode - no files will be changed");
        print_plan(&plan);
        return Ok(());
    }

    if plan.is_noop() {
        println!("✅ Everything is up to date");
        let deleted = plan.counts().deleted;
        if deleted > 0 {
            println!("   🗑️  {} files deleted in source (kept in target)", deleted);
        }
        return Ok(());
    }

    print_plan_counts(&plan);

    if config.sync.confirm && !yes && !confirm("Proceed with the backup?")? {
        println!("⏭️  Backup cancelled");
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_flag.store(true, Ordering::SeqCst);
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                SyncProgress::Started { total } => {
                    println!("\n🔄 Backing up {} files", total);
                }
                SyncProgress::Item(progress) => {
                    let icon = if progress.succeeded { state_icon(progress.state) } else { "❌" };
                    print!(
                        "\r   [{}/{}] {} {:<60}",
                        progress.completed,
                        progress.total,
                        icon,
                        progress.relative_path.as_str()
                    );
                    let _ = std::io::stdout().flush();
                }
                SyncProgress::Status(_) => println!(),
                SyncProgress::Finished(_) => break,
            }
        }
    });

    let summary = engine.run(plan, Some(tx), cancel).await?;
    let _ = printer.await;

    print_summary(&summary);
    Ok(())
}

/// Periodic backups in the foreground
async fn cmd_watch(interval: Option<String>, config: &Config) -> Result<()> {
    let interval_str = interval.unwrap_or_else(|| config.sync.watch_interval.clone());
    let interval = parse_interval(&interval_str)?;

    let mut engine = SyncEngine::new(config);
    // Fail fast when a root is missing
    engine.prepare_plan()?;

    println!("🖥️  Watching every {} (Ctrl+C to stop)", interval_str);
    let mut watcher = Watcher::new(engine, interval);
    watcher.run().await?;

    let stats = watcher.stats();
    println!("📊 Watch statistics:");
    println!("   Total runs: {}", stats.total_runs);
    println!("   Successful: {}", stats.successful_runs);
    println!("   Failed: {}", stats.failed_runs);

    Ok(())
}

/// System health check and diagnostics
fn cmd_doctor(config: &Config) -> Result<()> {
    let source = config.source_path();
    let target = config.target_path();
    let health = HealthCheck::run(source.as_deref(), target.as_deref());
    print_health_report(&health);
    Ok(())
}

fn state_icon(state: SyncState) -> &'static str {
    match state {
        SyncState::Unchanged => "✅",
        SyncState::Added => "➕",
        SyncState::Updated => "🔄",
        SyncState::Deleted => "🗑️ ",
    }
}

/// Ask a yes/no question on stdin. Anything but "y"/"yes" declines.
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn print_plan(plan: &Plan) {
    println!("📋 Backup plan");
    for action in plan.actions() {
        if action.state != SyncState::Unchanged {
            println!(
                "   {} {:<9} {}",
                state_icon(action.state),
                action.state.as_str(),
                action.relative_path
            );
        }
    }
    println!();
    print_plan_counts(plan);
}

fn print_plan_counts(plan: &Plan) {
    let counts = plan.counts();
    println!("📈 Summary:");
    println!("   ➕ Files to add: {}", counts.added);
    println!("   🔄 Files to update: {}", counts.updated);
    println!("   🗑️  Deleted in source (kept in target): {}", counts.deleted);
    println!("   ✅ Unchanged: {}", counts.unchanged);
}

fn print_summary(summary: &SyncSummary) {
    if summary.cancelled {
        println!(
            "\n⚠️  Backup cancelled after {} of {} actions",
            summary.completed_actions, summary.total_actions
        );
    } else {
        println!("\n🎉 Backup Complete!");
    }
    println!("   📊 Total actions: {}", summary.total_actions);
    println!("   ✅ Successful operations: {}", summary.successful_operations());
    println!("   📦 Archived versions: {}", summary.archived);
    println!("   ❌ Failed operations: {}", summary.failed_operations);
    println!("   🗑️  Deleted in source: {}", summary.deleted_in_source);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if !summary.failures.is_empty() {
        println!("\n🔍 Failed Operations:");
        for (path, error) in &summary.failures {
            println!("   ❌ {}: {}", path, error);
        }
    }
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    use mirrorkeep::health::CheckResult;

    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 mirrorkeep System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
