//! Client-side synchronization engine.
//!
//! [`SyncEngine`] keeps an eventually-consistent mirror of the device state:
//! it polls history and settings on a fixed interval, applies operator edits
//! optimistically, sends them to the device and reconciles the result.
//!
//! # Consistency rules
//!
//! - A poll tick fetches history and settings concurrently and swaps both
//!   into state under one lock, so a [`ViewState`] never mixes two ticks.
//! - A failed tick leaves state untouched; the next tick is the retry.
//! - Edits, their completions and tick starts are stamped from one monotonic
//!   clock. When a tick reconciles, a field keeps its local value unless its
//!   request settled before the tick started, so stale reads never regress
//!   newer edits.
//! - `stop()` bumps a generation counter; results of ticks, refreshes and
//!   mutations issued under an older generation are discarded.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use smartmon_core::{SyncConfig, SyncEngine, SyncEvent};
//! use smartmon_types::{OperationMode, ThresholdField};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::from_config(SyncConfig::new("http://192.168.1.20:5001/api"))?;
//! let mut events = engine.subscribe();
//!
//! engine.start(Duration::from_secs(5))?;
//! engine.set_threshold(ThresholdField::Temperature, 24.5);
//! engine.set_mode(OperationMode::Manual).await;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         SyncEvent::ViewChanged(view) => println!("{:?}", view.latest_reading()),
//!         SyncEvent::Failed(failure) => eprintln!("{failure}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use smartmon_types::{OperationMode, SettingsField, SettingsRecord, ThresholdField};

use crate::api::DeviceApi;
use crate::client::HttpDeviceClient;
use crate::config::{FailurePolicy, SyncConfig};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, Operation, SyncEvent, SyncFailure};
use crate::history::HistoryBuffer;
use crate::projection::ViewState;

/// Poll counters since the last `start`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    pub successful_polls: u64,
    pub failed_polls: u64,
    pub consecutive_failures: u32,
    pub last_success_at: Option<OffsetDateTime>,
    pub last_failure: Option<SyncFailure>,
}

#[derive(Debug, Clone, Copy)]
struct PendingEdit {
    seq: u64,
    /// Clock value when the request completed, `None` while in flight.
    settled_at: Option<u64>,
}

#[derive(Debug)]
struct State {
    history: Arc<HistoryBuffer>,
    /// Settings as shown: confirmed values overlaid with pending edits.
    settings: SettingsRecord,
    /// Last settings document received from the device.
    confirmed: SettingsRecord,
    loaded: bool,
    generation: u64,
    running: bool,
    cancel: Option<CancellationToken>,
    clock: u64,
    pending: [Option<PendingEdit>; SettingsField::ALL.len()],
    stats: SyncStats,
}

impl State {
    fn new(capacity: usize) -> Self {
        Self {
            history: Arc::new(HistoryBuffer::new(capacity)),
            settings: SettingsRecord::default(),
            confirmed: SettingsRecord::default(),
            loaded: false,
            generation: 0,
            running: false,
            cancel: None,
            clock: 0,
            pending: [None; SettingsField::ALL.len()],
            stats: SyncStats::default(),
        }
    }

    /// Clear mirrored data for a new generation.
    fn reset(&mut self, capacity: usize) {
        let generation = self.generation + 1;
        let clock = self.clock;
        *self = Self::new(capacity);
        self.generation = generation;
        // The clock stays monotonic across restarts.
        self.clock = clock;
    }

    fn view(&self) -> ViewState {
        let pending = SettingsField::ALL
            .into_iter()
            .filter(|f| self.pending[f.index()].is_some())
            .collect();
        ViewState::new(Arc::clone(&self.history), self.settings, self.loaded, pending)
    }

    fn stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn begin_edit(&mut self, field: SettingsField) -> u64 {
        let seq = self.stamp();
        self.pending[field.index()] = Some(PendingEdit {
            seq,
            settled_at: None,
        });
        seq
    }

    fn settle_edit(&mut self, field: SettingsField) {
        let now = self.stamp();
        if let Some(p) = self.pending[field.index()].as_mut() {
            p.settled_at = Some(now);
        }
    }

    fn is_latest_edit(&self, field: SettingsField, seq: u64) -> bool {
        matches!(self.pending[field.index()], Some(p) if p.seq == seq)
    }

    fn reconcile_settings(&mut self, server: SettingsRecord, tick_started_at: u64) {
        self.confirmed = server;
        for field in SettingsField::ALL {
            let slot = &mut self.pending[field.index()];
            // Only a tick that started after the request settled can have
            // observed its effect on the device.
            let keep_local = matches!(
                slot,
                Some(p) if p.settled_at.is_none_or(|settled| settled > tick_started_at)
            );
            if keep_local {
                continue;
            }
            *slot = None;
            self.settings.copy_field(&server, field);
        }
    }
}

struct Shared<A> {
    api: A,
    config: SyncConfig,
    events: EventDispatcher,
    state: Mutex<State>,
}

impl<A: DeviceApi + 'static> Shared<A> {
    async fn poll_loop(
        self: Arc<Self>,
        generation: u64,
        period: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Poll cancelled with a tick in flight, discarding it");
                    break;
                }
                _ = self.tick(generation) => {}
            }
        }

        debug!("Poll loop for generation {} exited", generation);
    }

    /// Fetch history and settings together and reconcile them.
    ///
    /// Returns `true` when state was updated.
    async fn tick(&self, generation: u64) -> bool {
        let tick_started_at = self.state.lock().stamp();
        let limit = self.config.history_limit;

        let result = tokio::try_join!(self.api.fetch_history(limit), self.api.fetch_settings());

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!(
                "Discarding poll result from generation {} (current {})",
                generation, state.generation
            );
            return false;
        }

        match result {
            Ok((readings, settings)) => {
                let history =
                    HistoryBuffer::from_server(readings, limit, self.config.duplicate_policy);
                debug!(
                    "Poll reconciled {} readings, mode {}",
                    history.len(),
                    settings.operation_mode
                );

                state.history = Arc::new(history);
                state.reconcile_settings(settings, tick_started_at);
                state.loaded = true;
                state.stats.successful_polls += 1;
                state.stats.consecutive_failures = 0;
                state.stats.last_success_at = Some(OffsetDateTime::now_utc());

                self.events.send(SyncEvent::ViewChanged(state.view()));
                true
            }
            Err(e) => {
                let failure = SyncFailure::new(Operation::Poll, &e);
                state.stats.failed_polls += 1;
                state.stats.consecutive_failures += 1;
                state.stats.last_failure = Some(failure.clone());

                let failures = state.stats.consecutive_failures;
                if failures <= 3 {
                    warn!("Poll failed: {} (attempt {})", e, failures);
                } else if failures == 4 {
                    error!(
                        "Poll failed {} times in a row, will continue trying silently",
                        failures
                    );
                }

                self.events.send(SyncEvent::Failed(failure));
                false
            }
        }
    }

    /// Apply a mutation outcome.
    ///
    /// Returns `false` when the outcome was discarded because the engine
    /// was stopped or restarted since the request was issued.
    fn finish_edit(
        &self,
        generation: u64,
        field: SettingsField,
        seq: u64,
        operation: Operation,
        result: Result<()>,
    ) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("Discarding {} result issued before stop", operation);
            return false;
        }

        let is_latest = state.is_latest_edit(field, seq);
        let slot = field.index();

        match result {
            Ok(()) => {
                debug!("{} accepted for {}", operation, field);
                if is_latest {
                    state.settle_edit(field);
                }
            }
            Err(e) => {
                warn!("{} failed for {}: {}", operation, field, e);
                self.events
                    .send(SyncEvent::Failed(SyncFailure::new(operation, &e)));

                if !is_latest {
                    return true;
                }
                match self.config.failure_policy {
                    FailurePolicy::Keep => state.settle_edit(field),
                    FailurePolicy::Rollback => {
                        let confirmed = state.confirmed;
                        state.settings.copy_field(&confirmed, field);
                        state.pending[slot] = None;
                        self.events.send(SyncEvent::ViewChanged(state.view()));
                    }
                }
            }
        }
        true
    }

    fn report(&self, operation: Operation, error: &Error) {
        warn!("{} rejected: {}", operation, error);
        self.events
            .send(SyncEvent::Failed(SyncFailure::new(operation, error)));
    }
}

/// Completion handle for a background request started by the engine.
///
/// Awaiting it resolves once the request (and, for [`SyncEngine::set_mode`],
/// the confirming refresh) has settled and its outcome has been applied.
/// Dropping it does not cancel the request.
#[derive(Debug)]
pub struct RequestHandle {
    task: Option<JoinHandle<()>>,
}

impl RequestHandle {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: Some(tokio::spawn(future)),
        }
    }

    fn ready() -> Self {
        Self { task: None }
    }

    /// Whether the request has settled.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Future for RequestHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.task.as_mut() {
            None => Poll::Ready(()),
            Some(task) => Pin::new(task).poll(cx).map(|_| ()),
        }
    }
}

/// Synchronizes local view state with the device API.
///
/// All methods that spawn work (`start`, `refresh`, `set_mode`,
/// `set_threshold`) must be called from within a tokio runtime.
///
/// Dropping the engine stops polling.
pub struct SyncEngine<A: DeviceApi + 'static> {
    shared: Arc<Shared<A>>,
}

impl SyncEngine<HttpDeviceClient> {
    /// Validate `config` and build an engine talking HTTP to `config.base_url`.
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let client = HttpDeviceClient::with_timeout(&config.base_url, config.request_timeout())?;
        Ok(Self::new(client, config))
    }
}

impl<A: DeviceApi + 'static> SyncEngine<A> {
    /// Create an engine over any [`DeviceApi`] implementation.
    pub fn new(api: A, config: SyncConfig) -> Self {
        let state = State::new(config.history_limit);
        let events = EventDispatcher::new(config.event_capacity);
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                events,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// The underlying API client.
    pub fn api(&self) -> &A {
        &self.shared.api
    }

    /// Subscribe to view changes and failures.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Current view state.
    pub fn snapshot(&self) -> ViewState {
        self.shared.state.lock().view()
    }

    pub fn stats(&self) -> SyncStats {
        self.shared.state.lock().stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Start polling every `poll_interval`, beginning immediately.
    ///
    /// State is reset to empty/default. Calling `start` while running
    /// restarts the cycle with the new interval.
    pub fn start(&self, poll_interval: Duration) -> Result<()> {
        if poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll interval must be > 0".to_string()));
        }

        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.shared.state.lock();
            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            state.reset(self.shared.config.history_limit);
            state.running = true;
            state.cancel = Some(cancel.clone());
            self.shared.events.send(SyncEvent::ViewChanged(state.view()));
            state.generation
        };

        info!(
            "Starting sync with {} every {:?} (generation {})",
            self.shared.config.base_url, poll_interval, generation
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(shared.poll_loop(generation, poll_interval, cancel));
        Ok(())
    }

    /// Start polling at the configured interval.
    pub fn start_default(&self) -> Result<()> {
        self.start(self.shared.config.poll_interval())
    }

    /// Stop polling.
    ///
    /// After this returns, nothing issued before it (scheduled ticks,
    /// refreshes, mutation completions) changes state or emits events.
    /// The last state stays readable. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.generation += 1;
        if state.running {
            state.running = false;
            info!("Sync stopped");
        }
    }

    /// Run one poll tick now, outside the schedule.
    pub fn refresh(&self) -> RequestHandle {
        let shared = Arc::clone(&self.shared);
        let generation = shared.state.lock().generation;
        RequestHandle::spawn(async move {
            shared.tick(generation).await;
        })
    }

    /// Switch the operation mode.
    ///
    /// The new mode is visible immediately. On success a refresh pulls the
    /// confirmed state; on failure the configured [`FailurePolicy`] applies.
    pub fn set_mode(&self, mode: OperationMode) -> RequestHandle {
        let field = SettingsField::OperationMode;
        let (generation, seq) = {
            let mut state = self.shared.state.lock();
            state.settings.operation_mode = mode;
            let seq = state.begin_edit(field);
            self.shared.events.send(SyncEvent::ViewChanged(state.view()));
            (state.generation, seq)
        };

        let shared = Arc::clone(&self.shared);
        RequestHandle::spawn(async move {
            let result = shared.api.set_mode(mode).await;
            let accepted = result.is_ok();
            let current = shared.finish_edit(generation, field, seq, Operation::SetMode, result);
            if accepted && current {
                shared.tick(generation).await;
            }
        })
    }

    /// Change one threshold.
    ///
    /// The new value is visible immediately and the whole settings document
    /// is sent to the device. No refresh follows; the next scheduled tick
    /// picks up the confirmed value. Non-finite values are rejected without
    /// a request.
    pub fn set_threshold(&self, field: ThresholdField, value: f64) -> RequestHandle {
        if !value.is_finite() {
            self.shared
                .report(Operation::SetThreshold, &Error::InvalidValue { field, value });
            return RequestHandle::ready();
        }

        let settings_field = SettingsField::from(field);
        let (generation, seq, document) = {
            let mut state = self.shared.state.lock();
            let document = state.settings.with_threshold(field, value);
            state.settings = document;
            let seq = state.begin_edit(settings_field);
            self.shared.events.send(SyncEvent::ViewChanged(state.view()));
            (state.generation, seq, document)
        };

        let shared = Arc::clone(&self.shared);
        RequestHandle::spawn(async move {
            let result = shared.api.update_settings(&document).await;
            shared.finish_edit(
                generation,
                settings_field,
                seq,
                Operation::SetThreshold,
                result,
            );
        })
    }
}

impl<A: DeviceApi + 'static> Drop for SyncEngine<A> {
    fn drop(&mut self) {
        // Poll task holds its own Arc; cancel it so it does not outlive the engine.
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockDeviceApi;
    use smartmon_types::{Metric, SensorReading};
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::sleep;

    fn engine_with(api: MockDeviceApi, config: SyncConfig) -> SyncEngine<Arc<MockDeviceApi>> {
        SyncEngine::new(Arc::new(api), config)
    }

    fn engine(api: MockDeviceApi) -> SyncEngine<Arc<MockDeviceApi>> {
        engine_with(api, SyncConfig::default())
    }

    fn scenario_api() -> MockDeviceApi {
        MockDeviceApi::builder()
            .reading(SensorReading::new(1, 20.0, 40.0, 900))
            .reading(SensorReading::new(2, 21.0, 41.0, 950))
            .mode(OperationMode::Auto)
            .temp_threshold(18.0)
            .build()
    }

    fn drain(rx: &mut EventReceiver) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn failures(events: &[SyncEvent]) -> Vec<&SyncFailure> {
        events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Failed(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_projects_latest_and_series() {
        let engine = engine(scenario_api());

        engine.refresh().await;
        let view = engine.snapshot();

        assert!(view.is_loaded());
        assert_eq!(
            view.latest_reading().map(|r| (r.timestamp, r.temperature)),
            Some((2, 21.0))
        );
        let temps: Vec<_> = view.series_for(Metric::Temperature).collect();
        assert_eq!(temps, [(1, 20.0), (2, 21.0)]);
        assert_eq!(view.settings().temp_threshold, 18.0);
        assert_eq!(view.settings().operation_mode, OperationMode::Auto);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_is_optimistic_then_confirmed() {
        let api = scenario_api();
        api.set_write_latency(Duration::from_millis(100));
        let engine = engine(api);
        engine.refresh().await;

        let handle = engine.set_mode(OperationMode::Manual);
        let view = engine.snapshot();
        assert_eq!(view.settings().operation_mode, OperationMode::Manual);
        assert!(view.is_pending(SettingsField::OperationMode));
        assert_eq!(engine.api().settings().await.operation_mode, OperationMode::Auto);

        handle.await;

        let view = engine.snapshot();
        assert_eq!(view.settings().operation_mode, OperationMode::Manual);
        assert!(view.pending_fields().is_empty());
        assert_eq!(engine.api().mode_requests(), 1);
        // Initial refresh plus the confirming one.
        assert_eq!(engine.api().settings_requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_threshold_is_visible_before_request_resolves() {
        let api = scenario_api();
        api.set_write_latency(Duration::from_millis(100));
        let engine = engine(api);
        engine.refresh().await;

        let handle = engine.set_threshold(ThresholdField::Temperature, 5.0);
        assert_eq!(engine.snapshot().settings().temp_threshold, 5.0);
        assert!(!handle.is_finished());

        handle.await;

        let posted = engine.api().posted_settings().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].temp_threshold, 5.0);
        // The full document is sent, other fields untouched.
        assert_eq!(posted[0].operation_mode, OperationMode::Auto);
        assert_eq!(posted[0].moisture_threshold, 50);
        assert_eq!(posted[0].light_threshold, 1200);
        // No refresh follows a threshold change.
        assert_eq!(engine.api().settings_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_integer_threshold_is_rounded() {
        let engine = engine(scenario_api());

        engine.set_threshold(ThresholdField::Moisture, 41.6).await;

        assert_eq!(engine.snapshot().settings().moisture_threshold, 42);
        assert_eq!(engine.api().settings().await.moisture_threshold, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mutation_reports_once_and_keeps_value() {
        let engine = engine(scenario_api());
        engine.refresh().await;
        engine.api().set_fail_writes(true);
        let mut rx = engine.subscribe();

        engine.set_threshold(ThresholdField::Temperature, 5.0).await;

        let events = drain(&mut rx);
        let failed = failures(&events);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, ErrorKind::Transport);
        assert_eq!(failed[0].operation, Operation::SetThreshold);
        // Default policy keeps the optimistic value.
        assert_eq!(engine.snapshot().settings().temp_threshold, 5.0);

        // Still operable.
        engine.api().set_fail_writes(false);
        engine.set_threshold(ThresholdField::Light, 800.0).await;
        assert_eq!(engine.api().settings().await.light_threshold, 800);
        engine.start(Duration::from_secs(1)).unwrap();
        engine.stop();
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kept_value_is_replaced_by_next_poll() {
        let engine = engine(scenario_api());
        engine.refresh().await;
        engine.api().set_fail_writes(true);

        engine.set_threshold(ThresholdField::Temperature, 5.0).await;
        engine.refresh().await;

        let view = engine.snapshot();
        assert_eq!(view.settings().temp_threshold, 18.0);
        assert!(view.pending_fields().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_policy_restores_confirmed_value() {
        let config = SyncConfig {
            failure_policy: FailurePolicy::Rollback,
            ..Default::default()
        };
        let engine = engine_with(scenario_api(), config);
        engine.refresh().await;
        engine.api().set_fail_writes(true);
        let mut rx = engine.subscribe();

        engine.set_threshold(ThresholdField::Temperature, 5.0).await;

        let view = engine.snapshot();
        assert_eq!(view.settings().temp_threshold, 18.0);
        assert!(view.pending_fields().is_empty());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SyncEvent::ViewChanged(_)));
        assert!(matches!(events[1], SyncEvent::Failed(_)));
        match &events[2] {
            SyncEvent::ViewChanged(view) => assert_eq!(view.settings().temp_threshold, 18.0),
            other => panic!("expected rollback view, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mode_change_does_not_refresh() {
        let engine = engine(scenario_api());
        engine.api().set_fail_writes(true);
        let mut rx = engine.subscribe();

        engine.set_mode(OperationMode::Off).await;

        assert_eq!(engine.api().settings_requests(), 0);
        assert_eq!(engine.snapshot().settings().operation_mode, OperationMode::Off);
        let events = drain(&mut rx);
        let failed = failures(&events);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].operation, Operation::SetMode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_writer_wins_locally() {
        let api = scenario_api();
        api.set_write_latency(Duration::from_millis(100));
        let engine = engine(api);
        engine.refresh().await;

        let first = engine.set_threshold(ThresholdField::Temperature, 10.0);
        sleep(Duration::from_millis(10)).await;
        let second = engine.set_threshold(ThresholdField::Temperature, 12.0);
        assert_eq!(engine.snapshot().settings().temp_threshold, 12.0);

        first.await;
        // The older completion must not clear the newer edit.
        assert!(engine.snapshot().is_pending(SettingsField::TempThreshold));
        second.await;

        let posted = engine.api().posted_settings().await;
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[1].temp_threshold, 12.0);

        engine.refresh().await;
        assert_eq!(engine.snapshot().settings().temp_threshold, 12.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_poll_does_not_regress_newer_edit() {
        let api = scenario_api();
        api.set_read_latency(Duration::from_millis(100));
        api.set_write_latency(Duration::from_millis(300));
        let engine = engine(api);

        engine.start(Duration::from_secs(1)).unwrap();
        sleep(Duration::from_millis(10)).await;
        // The first tick is in flight and will read temp_threshold = 18.
        engine.set_threshold(ThresholdField::Temperature, 5.0);

        sleep(Duration::from_millis(150)).await;
        let view = engine.snapshot();
        assert!(view.is_loaded());
        assert_eq!(view.settings().temp_threshold, 5.0);
        assert!(view.is_pending(SettingsField::TempThreshold));

        // Write lands at ~310ms, next tick at 1s confirms it.
        sleep(Duration::from_millis(1_100)).await;
        let view = engine.snapshot();
        assert_eq!(view.settings().temp_threshold, 5.0);
        assert!(!view.is_pending(SettingsField::TempThreshold));
        engine.stop();
    }

    fn shown_views<T>(events: &[SyncEvent], f: impl Fn(&ViewState) -> T) -> Vec<T> {
        events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::ViewChanged(view) => Some(f(view)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_reading_before_write_lands_keeps_edit() {
        let api = scenario_api();
        api.set_write_latency(Duration::from_millis(50));
        api.set_history_latency(Duration::from_millis(200));
        let engine = engine(api);
        let mut rx = engine.subscribe();

        let write = engine.set_threshold(ThresholdField::Temperature, 5.0);
        sleep(Duration::from_millis(10)).await;
        // Reads settings (18.0) at once, finishes after the write lands at 50ms.
        engine.refresh().await;
        write.await;

        assert_eq!(engine.api().settings().await.temp_threshold, 5.0);
        let view = engine.snapshot();
        assert_eq!(view.settings().temp_threshold, 5.0);
        assert!(view.is_pending(SettingsField::TempThreshold));
        let shown = shown_views(&drain(&mut rx), |v| v.settings().temp_threshold);
        assert!(shown.iter().all(|t| *t == 5.0), "shown {shown:?}");

        // A tick started after the write settled confirms it.
        engine.refresh().await;
        let view = engine.snapshot();
        assert_eq!(view.settings().temp_threshold, 5.0);
        assert!(!view.is_pending(SettingsField::TempThreshold));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_change_does_not_flicker_under_slow_tick() {
        let api = scenario_api();
        api.set_write_latency(Duration::from_millis(50));
        api.set_history_latency(Duration::from_millis(200));
        let engine = engine(api);
        engine.refresh().await;
        let mut rx = engine.subscribe();

        let change = engine.set_mode(OperationMode::Manual);
        sleep(Duration::from_millis(10)).await;
        // Reads AUTO before the mode write lands, completes after it.
        let stale = engine.refresh();
        change.await;
        stale.await;

        let shown = shown_views(&drain(&mut rx), |v| v.settings().operation_mode);
        assert!(!shown.is_empty());
        assert!(
            shown.iter().all(|m| *m == OperationMode::Manual),
            "shown {shown:?}"
        );
        let view = engine.snapshot();
        assert_eq!(view.settings().operation_mode, OperationMode::Manual);
        assert!(view.pending_fields().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_tick() {
        let api = scenario_api();
        api.set_read_latency(Duration::from_millis(100));
        let engine = engine(api);

        engine.start(Duration::from_secs(1)).unwrap();
        let mut rx = engine.subscribe();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.api().history_requests(), 1);

        engine.stop();
        let frozen = engine.snapshot();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(engine.snapshot(), frozen);
        assert!(!frozen.is_loaded());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(engine.api().history_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_mutation_completion() {
        let api = scenario_api();
        api.set_write_latency(Duration::from_millis(100));
        let engine = engine(api);

        let handle = engine.set_mode(OperationMode::Off);
        let mut rx = engine.subscribe();
        engine.stop();
        handle.await;

        // The request reached the device but its refresh never ran.
        assert_eq!(engine.api().mode_requests(), 1);
        assert_eq!(engine.api().settings_requests(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_polling_and_idempotent_stop() {
        let engine = engine(scenario_api());

        engine.start(Duration::from_secs(1)).unwrap();
        assert!(engine.is_running());
        sleep(Duration::from_millis(3_500)).await;
        // Ticks at 0s, 1s, 2s and 3s.
        assert_eq!(engine.api().history_requests(), 4);
        assert_eq!(engine.stats().successful_polls, 4);

        engine.stop();
        engine.stop();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.api().history_requests(), 4);
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_state() {
        let engine = engine(scenario_api());
        engine.start(Duration::from_secs(1)).unwrap();
        sleep(Duration::from_millis(10)).await;
        assert!(engine.snapshot().is_loaded());

        engine.start(Duration::from_secs(2)).unwrap();
        assert!(!engine.snapshot().is_loaded());
        assert_eq!(engine.stats(), SyncStats::default());

        sleep(Duration::from_millis(10)).await;
        assert!(engine.snapshot().is_loaded());
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_state_and_recovers() {
        let engine = engine(scenario_api());
        engine.refresh().await;
        let before = engine.snapshot();

        engine.api().set_fail_reads(true);
        let mut rx = engine.subscribe();
        engine.refresh().await;

        assert_eq!(engine.snapshot(), before);
        let events = drain(&mut rx);
        let failed = failures(&events);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].operation, Operation::Poll);
        assert_eq!(engine.stats().consecutive_failures, 1);

        engine.api().set_fail_reads(false);
        engine.refresh().await;
        let stats = engine.stats();
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.failed_polls, 1);
        assert_eq!(stats.successful_polls, 2);
        assert!(stats.last_success_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_kind_is_reported() {
        let engine = engine(scenario_api());
        engine.api().set_fail_kind(ErrorKind::Decode).await;
        engine.api().set_fail_reads(true);
        let mut rx = engine.subscribe();

        engine.refresh().await;

        let events = drain(&mut rx);
        assert_eq!(failures(&events)[0].kind, ErrorKind::Decode);
        assert!(!engine.snapshot().is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_threshold_is_rejected_locally() {
        let engine = engine(scenario_api());
        let mut rx = engine.subscribe();

        engine.set_threshold(ThresholdField::Temperature, f64::NAN).await;

        assert_eq!(engine.api().update_requests(), 0);
        assert_eq!(engine.snapshot().settings().temp_threshold, 23.0);
        let events = drain(&mut rx);
        let failed = failures(&events);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, ErrorKind::InvalidValue);
    }

    #[tokio::test]
    async fn test_start_rejects_zero_interval() {
        let engine = engine(scenario_api());
        let err = engine.start(Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_from_config_validates() {
        let result = SyncEngine::from_config(SyncConfig::new("device.local"));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
