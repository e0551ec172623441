//! rota-send - Daemon that publishes one unposted content item per interval

use clap::Parser;
use librotacast::config::resolve_config_path;
use librotacast::logging::{LogFormat, LoggingConfig};
use librotacast::platforms::create_platform;
use librotacast::{Config, Ledger, Result, RotacastError, Rotator, Schedule};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rota-send")]
#[command(version)]
#[command(about = "Publish one unposted content item per interval")]
#[command(long_about = "\
rota-send - Publish one unposted content item per interval

DESCRIPTION:
    rota-send is a long-running daemon. Every interval it picks one file
    from the content directory that has never been posted, formats it to
    fit the length budget, publishes it and records it in the history
    ledger. Once every file has been posted, cycles are skipped until new
    files appear.

USAGE:
    # Run in foreground (logs to stderr)
    rota-send

    # Post one item now and exit
    rota-send --once

    # See what would be posted, without posting or recording anything
    rota-send --once --dry-run

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/rotacast/config.toml
    (override with --config or ROTACAST_CONFIG)

    [content]
    dir = \"~/.local/share/rotacast/content\"

    [ledger]
    path = \"~/.local/share/rotacast/history.json\"

    [format]
    max_length = 500
    tags = [\"#rust\"]

    [schedule]
    interval = \"60m\"        # or \"random:45m-90m\"

    [mastodon]
    instance = \"mastodon.social\"
    token_file = \"~/.config/rotacast/mastodon.token\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error, or the --once cycle failed
    2 - Configuration, ledger or authentication error
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Interval between cycles (overrides config), e.g. "30m" or "random:20m-40m"
    #[arg(long, value_name = "DURATION")]
    interval: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log posts instead of publishing them; the ledger is not updated
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose, cli.log_format).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "rota-send failed");
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = resolve_config_path(cli.config.as_deref())?;
    let mut config = Config::load_from_path(&config_path)?;
    if let Some(interval) = cli.interval {
        config.schedule.interval = interval;
    }
    config.validate()?;
    let schedule = Schedule::parse(&config.schedule.interval)?;

    let ledger = Ledger::load(config.ledger_path()?)?;

    let mut platform = create_platform(&config, cli.dry_run)?;
    platform.authenticate().await?;

    let rotator = Rotator::from_config(&config, ledger, platform)?.with_dry_run(cli.dry_run);

    info!(
        config = %config_path.display(),
        platform = rotator.platform_name(),
        schedule = %schedule,
        dry_run = cli.dry_run,
        "rota-send starting"
    );

    if cli.once {
        let outcome = rotator.run_cycle().await;
        log_summary(&rotator);
        return Ok(if outcome.is_failure() { 1 } else { 0 });
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    run_daemon_loop(&rotator, &schedule, config.schedule.run_on_start, &shutdown).await;

    log_summary(&rotator);
    info!("rota-send stopped");
    Ok(0)
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| RotacastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, finishing current cycle");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, finishing current cycle");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

async fn run_daemon_loop(
    rotator: &Rotator,
    schedule: &Schedule,
    run_on_start: bool,
    shutdown: &AtomicBool,
) {
    if run_on_start {
        rotator.run_cycle().await;
    }

    loop {
        let delay = schedule.next_delay();
        info!(
            delay = %humantime::format_duration(delay),
            "Waiting for next cycle"
        );

        if !sleep_until_shutdown(delay, shutdown).await {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        rotator.run_cycle().await;
    }
}

/// Sleep for `delay`, checking the shutdown flag every second
///
/// Returns `false` if shutdown was requested.
async fn sleep_until_shutdown(delay: Duration, shutdown: &AtomicBool) -> bool {
    let mut remaining = delay;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_secs(1));
        sleep(step).await;
        remaining -= step;
    }
    !shutdown.load(Ordering::Relaxed)
}

fn log_summary(rotator: &Rotator) {
    let stats = rotator.stats();
    info!(
        committed = stats.committed,
        dry_run = stats.dry_run,
        skipped = stats.skipped,
        failed = stats.failed,
        busy = stats.busy,
        unrecorded = stats.unrecorded,
        "Cycle summary"
    );
}
