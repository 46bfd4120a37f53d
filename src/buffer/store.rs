use crate::domain::{MetricValue, RecordedEvent};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Everything buffered for one ping, taken as a unit at assembly time.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSnapshot {
    pub metrics: BTreeMap<String, MetricValue>,
    pub events: Vec<RecordedEvent>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl MeasurementSnapshot {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.events.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug)]
struct PingStore {
    metrics: BTreeMap<String, MetricValue>,
    events: Vec<RecordedEvent>,
    start_time: DateTime<Utc>,
}

impl PingStore {
    fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            metrics: BTreeMap::new(),
            events: Vec::new(),
            start_time,
        }
    }

    fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.events.is_empty()
    }

    /// Drains the store into a snapshot. The next window starts where this
    /// one ends.
    fn drain(&mut self) -> MeasurementSnapshot {
        let end_time = Utc::now();
        let start_time = std::mem::replace(&mut self.start_time, end_time);

        MeasurementSnapshot {
            metrics: std::mem::take(&mut self.metrics),
            events: std::mem::take(&mut self.events),
            start_time,
            end_time,
        }
    }
}

/// In-memory measurement state, keyed by the ping each measurement is sent in.
///
/// Recording may happen from any thread. Taking a snapshot clears the store
/// under the same lock, so a measurement lands in exactly one ping.
#[derive(Debug, Default)]
pub struct MeasurementBuffer {
    stores: Mutex<HashMap<String, PingStore>>,
}

impl MeasurementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_metric(&self, ping: &str, metric_id: impl Into<String>, value: MetricValue) {
        let mut stores = self.stores.lock();
        Self::store_for(&mut stores, ping)
            .metrics
            .insert(metric_id.into(), value);
    }

    /// Adds `amount` to a counter, creating it when absent. A non-counter
    /// value under the same id is replaced.
    pub fn add_to_counter(&self, ping: &str, metric_id: impl Into<String>, amount: i64) {
        let mut stores = self.stores.lock();
        let store = Self::store_for(&mut stores, ping);
        let entry = store
            .metrics
            .entry(metric_id.into())
            .or_insert(MetricValue::Counter(0));

        match entry {
            MetricValue::Counter(current) => *current = current.saturating_add(amount),
            other => *other = MetricValue::Counter(amount),
        }
    }

    /// Records an event. When the ping's event count reaches `max_events` the
    /// store is drained and the snapshot returned; only one caller can observe
    /// the threshold crossing.
    pub fn record_event(
        &self,
        ping: &str,
        event: RecordedEvent,
        max_events: usize,
    ) -> Option<MeasurementSnapshot> {
        let mut stores = self.stores.lock();
        let store = Self::store_for(&mut stores, ping);
        store.events.push(event);

        if store.events.len() >= max_events {
            tracing::debug!(
                "Event threshold of {max_events} reached for ping '{ping}', forcing assembly"
            );
            Some(store.drain())
        } else {
            None
        }
    }

    /// Takes everything buffered for `ping`. Returns `None` when nothing is
    /// buffered, leaving the window open.
    pub fn take_snapshot(&self, ping: &str) -> Option<MeasurementSnapshot> {
        let mut stores = self.stores.lock();
        match stores.get_mut(ping) {
            Some(store) if !store.is_empty() => Some(store.drain()),
            _ => None,
        }
    }

    /// Puts back a snapshot that could not be queued, ahead of anything
    /// recorded since it was taken. Counters are summed; other metrics keep
    /// the newer value.
    pub fn restore(&self, ping: &str, snapshot: MeasurementSnapshot) {
        let mut stores = self.stores.lock();
        let store = Self::store_for(&mut stores, ping);
        store.start_time = store.start_time.min(snapshot.start_time);

        for (metric_id, value) in snapshot.metrics {
            match store.metrics.entry(metric_id) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(mut entry) => {
                    if let (MetricValue::Counter(newer), MetricValue::Counter(older)) =
                        (entry.get_mut(), &value)
                    {
                        *newer = newer.saturating_add(*older);
                    }
                }
            }
        }

        let newer = std::mem::replace(&mut store.events, snapshot.events);
        store.events.extend(newer);
    }

    pub fn event_count(&self, ping: &str) -> usize {
        self.stores
            .lock()
            .get(ping)
            .map(|store| store.events.len())
            .unwrap_or(0)
    }

    pub fn metric(&self, ping: &str, metric_id: &str) -> Option<MetricValue> {
        self.stores
            .lock()
            .get(ping)
            .and_then(|store| store.metrics.get(metric_id).cloned())
    }

    pub fn is_empty(&self, ping: &str) -> bool {
        self.stores
            .lock()
            .get(ping)
            .is_none_or(PingStore::is_empty)
    }

    fn store_for<'a>(stores: &'a mut HashMap<String, PingStore>, ping: &str) -> &'a mut PingStore {
        stores
            .entry(ping.to_string())
            .or_insert_with(|| PingStore::new(Utc::now()))
    }
}
