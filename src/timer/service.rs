//! Async driver for the timer
//!
//! `TimerService` shares one [`PomodoroTimer`] behind a tokio mutex and owns
//! its tick scheduler: a single background task that calls `tick()` once per
//! interval while a phase is running. The scheduler handle lives under the same
//! lock as the timer, so starting, replacing and retiring it never races with a
//! command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

use crate::ledger::{SessionId, TaskId};

use super::{ConfigError, ConfigUpdate, PomodoroTimer, TimerState};

/// Default scheduler period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

struct Shared {
    timer: PomodoroTimer,
    ticker: Option<JoinHandle<()>>,
}

/// Cloneable handle to a running timer
#[derive(Clone)]
pub struct TimerService {
    shared: Arc<Mutex<Shared>>,
    updates: watch::Receiver<TimerState>,
    tick_interval: Duration,
}

impl TimerService {
    pub fn new(timer: PomodoroTimer) -> Self {
        let updates = timer.subscribe();
        Self {
            shared: Arc::new(Mutex::new(Shared {
                timer,
                ticker: None,
            })),
            updates,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Override the scheduler period
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        let mut rx = self.updates.clone();
        rx.borrow_and_update();
        rx
    }

    /// Latest published state
    pub fn snapshot(&self) -> TimerState {
        self.updates.borrow().clone()
    }

    pub async fn start_focus(
        &self,
        task_id: Option<TaskId>,
        override_secs: Option<u64>,
    ) -> SessionId {
        self.with_timer(|timer| timer.start_focus(task_id, override_secs))
            .await
    }

    pub async fn start_break(&self, is_long: bool) -> SessionId {
        self.with_timer(|timer| timer.start_break(is_long)).await
    }

    pub async fn pause(&self) -> bool {
        self.with_timer(PomodoroTimer::pause).await
    }

    pub async fn resume(&self) -> bool {
        self.with_timer(PomodoroTimer::resume).await
    }

    pub async fn stop(&self) -> bool {
        self.with_timer(PomodoroTimer::stop).await
    }

    pub async fn reset(&self) {
        self.with_timer(PomodoroTimer::reset).await
    }

    pub async fn update_config(&self, updates: Vec<ConfigUpdate>) -> Result<(), ConfigError> {
        self.with_timer(|timer| timer.update_config(updates)).await
    }

    /// Recompute from the clock right away
    ///
    /// Used when the host regains attention after being suspended, so the
    /// display does not wait for the next scheduled tick.
    pub async fn sync(&self) {
        self.with_timer(PomodoroTimer::tick).await
    }

    /// Whether the tick scheduler task is alive
    pub async fn is_ticking(&self) -> bool {
        self.shared.lock().await.ticker.is_some()
    }

    /// Stop the scheduler without touching timer state
    pub async fn shutdown(&self) {
        if let Some(handle) = self.shared.lock().await.ticker.take() {
            handle.abort();
        }
    }

    async fn with_timer<R>(&self, f: impl FnOnce(&mut PomodoroTimer) -> R) -> R {
        let mut shared = self.shared.lock().await;
        let result = f(&mut shared.timer);
        shared.sync_ticker(&self.shared, self.tick_interval);
        result
    }
}

impl Shared {
    /// Start or retire the scheduler to match the timer
    fn sync_ticker(&mut self, handle: &Arc<Mutex<Shared>>, period: Duration) {
        if self.timer.is_ticking() {
            if self.ticker.is_none() {
                debug!(?period, "Starting tick scheduler");
                self.ticker = Some(spawn_ticker(Arc::clone(handle), period));
            }
        } else if let Some(ticker) = self.ticker.take() {
            debug!("Stopping tick scheduler");
            ticker.abort();
        }
    }
}

fn spawn_ticker(shared: Arc<Mutex<Shared>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let mut guard = shared.lock().await;
            guard.timer.tick();
            if !guard.timer.is_ticking() {
                // Retire ourselves under the lock so the next command spawns a fresh task
                guard.ticker = None;
                trace!("Tick scheduler finished");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, SessionLedger};
    use crate::notify::{ChannelNotifier, PhaseCompletion, SilentNotifier};
    use crate::timer::{ActivePhase, Clock, FakeClock, Millis, Phase, TimerConfig};

    /// Clock that follows tokio's (pausable) time
    struct TokioClock {
        origin: time::Instant,
    }

    impl Clock for TokioClock {
        fn now_ms(&self) -> Millis {
            self.origin.elapsed().as_millis() as Millis
        }
    }

    fn service_with(config: TimerConfig, clock: Arc<dyn Clock>) -> (TimerService, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let timer = PomodoroTimer::new(config, clock, ledger.clone(), Box::new(SilentNotifier));
        (TimerService::new(timer), ledger)
    }

    fn paused_service(config: TimerConfig) -> (TimerService, Arc<MemoryLedger>) {
        service_with(
            config,
            Arc::new(TokioClock {
                origin: time::Instant::now(),
            }),
        )
    }

    async fn sleep_secs(secs: f64) {
        time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_counts_down_and_expires() {
        let (service, ledger) = paused_service(TimerConfig::default());
        service.start_focus(None, Some(5)).await;
        assert!(service.is_ticking().await);

        sleep_secs(2.5).await;
        assert_eq!(service.snapshot().remaining_seconds, 3);

        sleep_secs(3.0).await;
        let state = service.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.completed_focus_count, 1);
        assert!(!service.is_ticking().await);
        assert!(ledger.entries().unwrap()[0].completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_scheduler() {
        let (service, _ledger) = paused_service(TimerConfig::default());
        service.start_focus(None, None).await;
        sleep_secs(10.5).await;

        assert!(service.pause().await);
        assert!(!service.is_ticking().await);
        let remaining = service.snapshot().remaining_seconds;
        assert_eq!(remaining, 1490);

        sleep_secs(600.0).await;
        assert_eq!(service.snapshot().remaining_seconds, remaining);

        assert!(service.resume().await);
        assert!(service.is_ticking().await);
        sleep_secs(1.5).await;
        assert_eq!(service.snapshot().remaining_seconds, remaining - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_stops_scheduler() {
        let (service, _ledger) = paused_service(TimerConfig::default());
        service.start_break(true).await;
        assert!(service.stop().await);
        assert!(!service.is_ticking().await);
        assert!(!service.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_one_scheduler() {
        let (service, ledger) = paused_service(TimerConfig::default());
        service.start_focus(None, None).await;
        sleep_secs(3.5).await;
        service.start_focus(None, Some(10)).await;
        assert!(service.is_ticking().await);

        // Same scheduler, same cadence: the last tick lands 3.5s into the new phase
        sleep_secs(4.0).await;
        assert_eq!(service.snapshot().remaining_seconds, 7);
        assert_eq!(ledger.open_entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_chain_keeps_scheduler_running() {
        let config = TimerConfig {
            auto_start_breaks: true,
            auto_start_focus: true,
            ..TimerConfig::default()
        };
        let (service, _ledger) = paused_service(config);
        service.start_focus(None, None).await;

        sleep_secs(1500.5).await;
        assert_eq!(service.snapshot().phase, Phase::ShortBreak);
        assert!(service.is_ticking().await);

        sleep_secs(300.0).await;
        assert_eq!(service.snapshot().phase, Phase::Focus);
        assert_eq!(service.snapshot().completed_focus_count, 1);
    }

    #[tokio::test]
    async fn test_sync_catches_up_without_scheduler() {
        let clock = FakeClock::new(0);
        let (service, _ledger) = service_with(TimerConfig::default(), Arc::new(clock.clone()));
        let service = service.with_tick_interval(Duration::from_secs(3600));

        service.start_focus(None, None).await;
        clock.advance_secs(1499);
        service.sync().await;
        assert_eq!(service.snapshot().remaining_seconds, 1);

        clock.advance_secs(1);
        service.sync().await;
        assert_eq!(service.snapshot().phase, Phase::Idle);
        assert!(!service.is_ticking().await);
    }

    #[tokio::test]
    async fn test_completion_queued_for_delivery() {
        let clock = FakeClock::new(0);
        let (notifier, mut completions) = ChannelNotifier::new();
        let timer = PomodoroTimer::new(
            TimerConfig::default(),
            Arc::new(clock.clone()),
            Arc::new(MemoryLedger::new()),
            Box::new(notifier),
        );
        let service = TimerService::new(timer);
        let task = uuid::Uuid::new_v4();

        service.start_focus(Some(task), None).await;
        assert!(completions.try_recv().is_err());

        clock.advance_secs(1500);
        service.sync().await;

        assert_eq!(
            completions.try_recv().unwrap(),
            PhaseCompletion {
                phase: ActivePhase::Focus,
                task_id: Some(task),
            }
        );
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscriber_woken_by_command() {
        let (service, _ledger) = service_with(TimerConfig::default(), Arc::new(FakeClock::new(0)));
        let mut rx = service.subscribe();

        {
            let mut changed = tokio_test::task::spawn(rx.changed());
            tokio_test::assert_pending!(changed.poll());

            service.start_break(false).await;
            assert!(changed.is_woken());
            tokio_test::assert_ready_ok!(changed.poll());
        }

        assert_eq!(rx.borrow().phase, Phase::ShortBreak);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_config_through_service() {
        let (service, _ledger) = service_with(TimerConfig::default(), Arc::new(FakeClock::new(0)));
        service
            .update_config(vec![ConfigUpdate::ShortBreakMinutes(10)])
            .await
            .unwrap();
        assert_eq!(service.snapshot().config.short_break_minutes, 10);

        let err = service
            .update_config(vec![ConfigUpdate::FocusMinutes(0)])
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration { .. }));
    }
}
