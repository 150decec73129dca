use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;

use pomotrack::app::{print_phase_changes, App};
use pomotrack::config::{self, Config};
use pomotrack::ledger::{BackgroundLedger, JsonLedger};
use pomotrack::logging;
use pomotrack::notify::{deliver_completions, ChannelNotifier, NotificationMethod};
use pomotrack::timer::{Clock, PomodoroTimer, SystemClock, TimerService};

#[tokio::main]
async fn main() -> Result<()> {
    // Ensure config directory exists (creates logs dir too)
    config::ensure_directories()?;

    // Initialize file logging BEFORE any tracing calls
    let (log_file_info, _guard) = logging::init_file_logging(&config::logs_dir())?;

    if let Ok(count) = logging::cleanup_old_logs(&config::logs_dir()) {
        if count > 0 {
            tracing::info!("Cleaned up {} old log files", count);
        }
    }
    tracing::info!("Logging to: {}", log_file_info.path.display());

    let config = Config::load()?;
    let clock = Arc::new(SystemClock::new());

    let store = Arc::new(JsonLedger::new());
    match store.prune_older_than(config.ledger_retention_days) {
        Ok(0) => {}
        Ok(count) => tracing::info!("Pruned {} old session entries", count),
        Err(e) => tracing::warn!("Failed to prune session ledger: {}", e),
    }
    match store.close_abandoned(clock.now_ms()) {
        Ok(0) => {}
        Ok(count) => tracing::info!("Closed {} sessions abandoned by a previous run", count),
        Err(e) => tracing::warn!("Failed to close abandoned sessions: {}", e),
    }
    let ledger = BackgroundLedger::spawn(store, config.ledger_queue_size);

    let (notifier, completions) = ChannelNotifier::new();
    let method = NotificationMethod::from_config(&config.notification_method);
    let timer = PomodoroTimer::new(
        config.timer.clone(),
        clock,
        Arc::new(ledger.clone()),
        Box::new(notifier),
    );
    let service = TimerService::new(timer);
    let printer = tokio::spawn(print_phase_changes(service.subscribe()));
    let delivery = tokio::spawn(deliver_completions(completions, method));

    println!("pomotrack ready, type 'help' for commands");
    let mut app = App::new(service, ledger, config, Some(config::config_file_path()));
    let result = app.run(BufReader::new(tokio::io::stdin())).await;

    app.shutdown().await;
    printer.abort();
    delivery.abort();

    result
}
