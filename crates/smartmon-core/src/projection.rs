//! Display-ready projection of the synchronized state.
//!
//! A [`ViewState`] is an immutable snapshot taken under the engine's state
//! lock, so the history window and the settings it carries always belong to
//! the same reconciliation. Everything derived from it (latest reading,
//! chart series, actuator expectations) is computed on demand from the
//! snapshot and never patched incrementally.

use std::sync::Arc;

use smartmon_types::{Metric, SensorReading, SettingsField, SettingsRecord};

use crate::format::TimeFormatter;
use crate::history::HistoryBuffer;
use crate::thresholds::{self, ActuatorState};

/// Snapshot of everything a panel needs to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    history: Arc<HistoryBuffer>,
    settings: SettingsRecord,
    loaded: bool,
    pending: Vec<SettingsField>,
}

impl ViewState {
    pub(crate) fn new(
        history: Arc<HistoryBuffer>,
        settings: SettingsRecord,
        loaded: bool,
        pending: Vec<SettingsField>,
    ) -> Self {
        Self {
            history,
            settings,
            loaded,
            pending,
        }
    }

    /// The state before any successful poll.
    pub fn empty(capacity: usize) -> Self {
        Self::new(
            Arc::new(HistoryBuffer::new(capacity)),
            SettingsRecord::default(),
            false,
            Vec::new(),
        )
    }

    /// Newest reading, or `None` when no data has arrived yet.
    pub fn latest_reading(&self) -> Option<&SensorReading> {
        self.history.latest()
    }

    /// The ascending history window.
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Settings as currently shown, including unconfirmed local edits.
    pub fn settings(&self) -> &SettingsRecord {
        &self.settings
    }

    /// Whether at least one poll has completed since the engine started.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Settings fields holding a local edit the server has not confirmed yet.
    pub fn pending_fields(&self) -> &[SettingsField] {
        &self.pending
    }

    pub fn is_pending(&self, field: SettingsField) -> bool {
        self.pending.contains(&field)
    }

    /// `(timestamp, value)` pairs for one metric, oldest first.
    ///
    /// The returned iterator is `Clone`, so a chart can walk it more than once.
    pub fn series_for(&self, metric: Metric) -> Series<'_> {
        series(self.history.as_slice(), metric)
    }

    pub fn temperature_series(&self) -> Series<'_> {
        self.series_for(Metric::Temperature)
    }

    pub fn moisture_series(&self) -> Series<'_> {
        self.series_for(Metric::Moisture)
    }

    pub fn light_series(&self) -> Series<'_> {
        self.series_for(Metric::Light)
    }

    /// What the device should be doing given the latest reading.
    pub fn actuators(&self) -> ActuatorState {
        self.latest_reading()
            .map(|reading| thresholds::evaluate(reading, &self.settings))
            .unwrap_or(ActuatorState::UNKNOWN)
    }

    /// "Last updated" label for the newest reading (empty when unknown).
    pub fn last_updated_label(&self, formatter: &TimeFormatter) -> String {
        formatter.label(self.latest_reading().map(|r| r.timestamp))
    }
}

/// Project a reading slice onto one metric.
pub fn series(readings: &[SensorReading], metric: Metric) -> Series<'_> {
    Series {
        inner: readings.iter(),
        metric,
    }
}

/// Lazy iterator over `(timestamp, value)` pairs of one metric.
#[derive(Debug, Clone)]
pub struct Series<'a> {
    inner: std::slice::Iter<'a, SensorReading>,
    metric: Metric,
}

impl Series<'_> {
    pub fn metric(&self) -> Metric {
        self.metric
    }
}

impl Iterator for Series<'_> {
    type Item = (i64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|r| (r.timestamp, r.value(self.metric)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Series<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DuplicatePolicy;
    use smartmon_types::OperationMode;

    fn view(readings: Vec<SensorReading>, settings: SettingsRecord) -> ViewState {
        let history = HistoryBuffer::from_server(readings, 20, DuplicatePolicy::KeepLast);
        ViewState::new(Arc::new(history), settings, true, Vec::new())
    }

    #[test]
    fn test_empty_view_has_no_latest() {
        let view = ViewState::empty(20);
        assert!(view.latest_reading().is_none());
        assert!(!view.is_loaded());
        assert_eq!(view.series_for(Metric::Temperature).count(), 0);
        assert_eq!(view.actuators(), ActuatorState::UNKNOWN);
        assert_eq!(view.last_updated_label(&TimeFormatter::utc()), "");
    }

    #[test]
    fn test_latest_and_series() {
        let view = view(
            vec![
                SensorReading::new(2, 21.0, 45.0, 700),
                SensorReading::new(1, 20.0, 44.0, 710),
            ],
            SettingsRecord::default(),
        );

        assert_eq!(view.latest_reading().map(|r| r.timestamp), Some(2));
        let temps: Vec<_> = view.temperature_series().collect();
        assert_eq!(temps, [(1, 20.0), (2, 21.0)]);
        let moisture: Vec<_> = view.moisture_series().collect();
        assert_eq!(moisture, [(1, 44.0), (2, 45.0)]);
        let light: Vec<_> = view.light_series().collect();
        assert_eq!(light, [(1, 710.0), (2, 700.0)]);
    }

    #[test]
    fn test_series_is_restartable() {
        let view = view(
            vec![
                SensorReading::new(1, 20.0, 44.0, 710),
                SensorReading::new(2, 21.0, 45.0, 700),
            ],
            SettingsRecord::default(),
        );

        let series = view.series_for(Metric::Temperature);
        assert_eq!(series.len(), 2);
        let first: Vec<_> = series.clone().collect();
        let second: Vec<_> = series.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_actuators_follow_settings_mode() {
        let readings = vec![SensorReading::new(1, 30.0, 10.0, 100)];
        let auto = view(readings.clone(), SettingsRecord::default());
        assert!(auto.actuators().any_active());

        let off = view(
            readings,
            SettingsRecord::default().with_mode(OperationMode::Off),
        );
        assert_eq!(off.actuators(), ActuatorState::OFF);
    }
}
