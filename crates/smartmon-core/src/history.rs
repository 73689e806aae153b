//! Bounded, timestamp-ordered window of sensor readings.
//!
//! The device returns its most recent readings in whatever order its storage
//! yields them (newest first, in practice). [`HistoryBuffer::from_server`]
//! normalizes a payload into a strictly ascending window that is swapped in
//! wholesale on each successful poll.

use serde::{Deserialize, Serialize};

use smartmon_types::SensorReading;

/// How readings that share a timestamp are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The reading appearing later in the server payload wins.
    #[default]
    KeepLast,
    /// The reading appearing first in the server payload wins.
    KeepFirst,
}

/// A strictly ascending, bounded sequence of readings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryBuffer {
    readings: Vec<SensorReading>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: Vec::new(),
            capacity,
        }
    }

    /// Build a buffer from a raw server payload.
    ///
    /// Readings are sorted by timestamp, duplicates are collapsed according to
    /// `policy`, and only the newest `capacity` readings are kept.
    ///
    /// ```
    /// use smartmon_core::history::{DuplicatePolicy, HistoryBuffer};
    /// use smartmon_types::SensorReading;
    ///
    /// let payload = vec![
    ///     SensorReading::new(3, 22.0, 40.0, 800),
    ///     SensorReading::new(1, 20.0, 41.0, 810),
    ///     SensorReading::new(2, 21.0, 42.0, 820),
    /// ];
    /// let buffer = HistoryBuffer::from_server(payload, 2, DuplicatePolicy::KeepLast);
    /// let stamps: Vec<_> = buffer.iter().map(|r| r.timestamp).collect();
    /// assert_eq!(stamps, [2, 3]);
    /// ```
    pub fn from_server(
        readings: Vec<SensorReading>,
        capacity: usize,
        policy: DuplicatePolicy,
    ) -> Self {
        let mut readings = normalize(readings, policy);
        if readings.len() > capacity {
            readings.drain(..readings.len() - capacity);
        }
        Self { readings, capacity }
    }

    /// Maximum number of readings kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// The newest reading, if any.
    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.last()
    }

    pub fn as_slice(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SensorReading> {
        self.readings.iter()
    }
}

impl<'a> IntoIterator for &'a HistoryBuffer {
    type Item = &'a SensorReading;
    type IntoIter = std::slice::Iter<'a, SensorReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

/// Sort readings ascending by timestamp and collapse duplicates.
///
/// The sort is stable, so among equal timestamps the payload order decides
/// which reading survives.
pub fn normalize(mut readings: Vec<SensorReading>, policy: DuplicatePolicy) -> Vec<SensorReading> {
    readings.sort_by_key(|r| r.timestamp);

    let mut out: Vec<SensorReading> = Vec::with_capacity(readings.len());
    for reading in readings {
        match out.last_mut() {
            Some(last) if last.timestamp == reading.timestamp => {
                if policy == DuplicatePolicy::KeepLast {
                    *last = reading;
                }
            }
            _ => out.push(reading),
        }
    }
    out
}
