//! Counter, gauge and histogram state owned by the aggregation engine.
//!
//! These are plain values, not a metrics library: the engine mutates them
//! under single-writer discipline and readers take a [`MetricSnapshot`] copy.

use std::collections::BTreeMap;

use crate::classify::ClientLabels;

/// Upper bounds (seconds) of the session duration histogram, up to 12h.
pub const SESSION_DURATION_BOUNDS: [f64; 19] = [
    30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0, 10800.0, 14400.0, 18000.0,
    21600.0, 25200.0, 28800.0, 32400.0, 36000.0, 39600.0, 43200.0,
];

/// Number of histogram slots: one per bound plus the `+Inf` overflow slot.
pub const SESSION_DURATION_SLOTS: usize = SESSION_DURATION_BOUNDS.len() + 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledCounter {
    values: BTreeMap<ClientLabels, u64>,
}

impl LabeledCounter {
    pub fn inc(&mut self, labels: ClientLabels) {
        let value = self.values.entry(labels).or_insert(0);
        *value = value.saturating_add(1);
    }

    pub fn get(&self, labels: ClientLabels) -> u64 {
        self.values.get(&labels).copied().unwrap_or(0)
    }

    /// Overwrites a label's value. Used when restoring a snapshot.
    pub fn set(&mut self, labels: ClientLabels, value: u64) {
        self.values.insert(labels, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientLabels, u64)> + '_ {
        self.values.iter().map(|(labels, value)| (*labels, *value))
    }

    pub fn total(&self) -> u64 {
        self.values.values().sum()
    }
}

/// Fixed-bucket histogram of session durations in seconds.
///
/// `counts` holds one non-cumulative count per bound plus a trailing
/// overflow slot; cumulative values are derived when rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationHistogram {
    counts: [u64; SESSION_DURATION_SLOTS],
    sum: f64,
}

impl Default for DurationHistogram {
    fn default() -> Self {
        Self {
            counts: [0; SESSION_DURATION_SLOTS],
            sum: 0.0,
        }
    }
}

impl DurationHistogram {
    pub fn from_parts(counts: [u64; SESSION_DURATION_SLOTS], sum: f64) -> Self {
        Self { counts, sum }
    }

    pub fn observe(&mut self, seconds: f64) {
        let slot = SESSION_DURATION_BOUNDS
            .iter()
            .position(|bound| seconds <= *bound)
            .unwrap_or(SESSION_DURATION_BOUNDS.len());
        self.counts[slot] = self.counts[slot].saturating_add(1);
        self.sum += seconds;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn counts(&self) -> &[u64; SESSION_DURATION_SLOTS] {
        &self.counts
    }

    /// `(upper bound, cumulative count)` pairs; the last bound is `+Inf`.
    pub fn cumulative(&self) -> Vec<(f64, u64)> {
        let mut running = 0u64;
        self.counts
            .iter()
            .enumerate()
            .map(|(slot, count)| {
                running = running.saturating_add(*count);
                let bound = SESSION_DURATION_BOUNDS
                    .get(slot)
                    .copied()
                    .unwrap_or(f64::INFINITY);
                (bound, running)
            })
            .collect()
    }
}

/// Instantaneous values, always recomputed from the trackers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gauges {
    pub active_connections: u64,
    pub active_projects: u64,
    pub active_users: u64,
}

/// Cumulative metrics plus the current gauges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    pub project_joins: LabeledCounter,
    pub project_leaves: LabeledCounter,
    pub unique_users: u64,
    pub unique_projects: u64,
    pub session_duration: DurationHistogram,
    pub gauges: Gauges,
}

/// Point-in-time copy of every metric, handed to readers.
pub type MetricSnapshot = MetricSet;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Browser, OperatingSystem};

    #[test]
    fn observe_uses_inclusive_upper_bounds() {
        let mut histogram = DurationHistogram::default();
        histogram.observe(600.0);
        assert_eq!(histogram.counts()[4], 1);
        assert_eq!(histogram.sum(), 600.0);
        assert_eq!(histogram.count(), 1);
    }

    #[test]
    fn observe_overflow_lands_in_last_slot() {
        let mut histogram = DurationHistogram::default();
        histogram.observe(50_000.0);
        assert_eq!(histogram.counts()[SESSION_DURATION_SLOTS - 1], 1);
    }

    #[test]
    fn observe_small_and_zero_durations_land_in_first_slot() {
        let mut histogram = DurationHistogram::default();
        histogram.observe(0.0);
        histogram.observe(29.9);
        assert_eq!(histogram.counts()[0], 2);
    }

    #[test]
    fn cumulative_counts_are_monotonic_and_end_at_total() {
        let mut histogram = DurationHistogram::default();
        for seconds in [10.0, 45.0, 45.0, 700.0, 99_999.0] {
            histogram.observe(seconds);
        }
        let cumulative = histogram.cumulative();
        assert_eq!(cumulative.len(), SESSION_DURATION_SLOTS);
        assert!(cumulative.windows(2).all(|pair| pair[0].1 <= pair[1].1));
        assert_eq!(cumulative[0], (30.0, 1));
        assert_eq!(cumulative[1], (60.0, 3));
        let (last_bound, last_count) = cumulative[SESSION_DURATION_SLOTS - 1];
        assert!(last_bound.is_infinite());
        assert_eq!(last_count, 5);
    }

    #[test]
    fn labeled_counter_tracks_each_label_pair() {
        let chrome = ClientLabels::new(Browser::Chrome, OperatingSystem::MacOsX);
        let mut counter = LabeledCounter::default();
        counter.inc(chrome);
        counter.inc(chrome);
        counter.inc(ClientLabels::OTHER);

        assert_eq!(counter.get(chrome), 2);
        assert_eq!(counter.get(ClientLabels::OTHER), 1);
        assert_eq!(
            counter.get(ClientLabels::new(Browser::Safari, OperatingSystem::Other)),
            0
        );
        assert_eq!(counter.total(), 3);
    }
}
