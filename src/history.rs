use std::collections::VecDeque;

use crate::models::HistoryRecord;

// Set to true to trace evictions
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Number of conversions kept when configuration does not say otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Most-recent-first cache of finished conversions.
///
/// Order is insertion order only; `captured_at` plays no part in it. Inserting
/// past capacity silently drops the oldest records.
pub struct HistoryStore {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl HistoryStore {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Puts `record` at the front and returns whatever fell off the back.
    ///
    /// A record whose id is already stored replaces the old one, keeping ids
    /// unique.
    pub fn insert(&mut self, record: HistoryRecord) -> Vec<HistoryRecord> {
        self.records.retain(|existing| existing.id != record.id);
        self.records.push_front(record);

        let evicted: Vec<HistoryRecord> = if self.records.len() > self.capacity {
            self.records.drain(self.capacity..).collect()
        } else {
            Vec::new()
        };

        for record in &evicted {
            log_debug!("history full ({}), evicted {}", self.capacity, record.id);
        }
        evicted
    }

    /// Removes the record with `id`. Absent ids are a no-op.
    pub fn delete(&mut self, id: &str) -> Option<HistoryRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        self.records.remove(index)
    }

    pub fn select(&self, id: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Front (newest) to back (oldest).
    pub fn list(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(markup: &str) -> HistoryRecord {
        HistoryRecord::new(markup, None)
    }

    fn markups(store: &HistoryStore) -> Vec<String> {
        store.iter().map(|r| r.markup.clone()).collect()
    }

    #[test]
    fn default_capacity_is_ten() {
        assert_eq!(HistoryStore::default().capacity(), 10);
        assert_eq!(DEFAULT_HISTORY_CAPACITY, 10);
    }

    #[test]
    fn inserts_go_to_the_front() {
        let mut store = HistoryStore::default();
        store.insert(record("a"));
        store.insert(record("b"));
        store.insert(record("c"));
        assert_eq!(markups(&store), vec!["c", "b", "a"]);
    }

    #[test]
    fn filling_to_capacity_never_evicts() {
        let mut store = HistoryStore::new(10);
        for i in 0..10 {
            assert!(store.insert(record(&format!("r{i}"))).is_empty());
        }
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn one_past_capacity_evicts_exactly_the_oldest() {
        let mut store = HistoryStore::new(10);
        let first = record("r1");
        let first_id = first.id.clone();
        store.insert(first);
        for i in 2..=10 {
            store.insert(record(&format!("r{i}")));
        }

        let evicted = store.insert(record("r11"));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, first_id);
        assert_eq!(store.len(), 10);
        assert!(store.select(&first_id).is_none());
    }

    #[test]
    fn twelve_inserts_keep_r12_down_to_r3() {
        let mut store = HistoryStore::new(10);
        for i in 1..=12 {
            store.insert(record(&format!("r{i}")));
        }
        let expected: Vec<String> = (3..=12).rev().map(|i| format!("r{i}")).collect();
        assert_eq!(markups(&store), expected);
    }

    #[test]
    fn never_exceeds_capacity_for_any_insert_count() {
        for capacity in 1..=5 {
            let mut store = HistoryStore::new(capacity);
            for i in 0..(capacity * 3) {
                store.insert(record(&i.to_string()));
                assert!(store.len() <= capacity);
                assert_eq!(store.list()[0].markup, i.to_string());
            }
        }
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = HistoryStore::default();
        let keep = record("keep");
        let gone = record("gone");
        let gone_id = gone.id.clone();
        store.insert(keep);
        store.insert(gone);

        assert!(store.delete(&gone_id).is_some());
        let once = markups(&store);
        assert!(store.delete(&gone_id).is_none());
        assert_eq!(markups(&store), once);
        assert_eq!(once, vec!["keep"]);
    }

    #[test]
    fn delete_unknown_id_is_a_no_op() {
        let mut store = HistoryStore::default();
        store.insert(record("a"));
        assert!(store.delete("missing").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn select_finds_by_id() {
        let mut store = HistoryStore::default();
        let target = record("\\frac{1}{2}");
        let id = target.id.clone();
        store.insert(target);
        store.insert(record("other"));
        assert_eq!(store.select(&id).map(|r| r.markup.as_str()), Some("\\frac{1}{2}"));
        assert!(store.select("nope").is_none());
    }

    #[test]
    fn reinserting_an_id_keeps_ids_unique() {
        let mut store = HistoryStore::default();
        let original = record("x");
        let duplicate = original.clone();
        store.insert(original);
        store.insert(record("y"));
        store.insert(duplicate);
        assert_eq!(markups(&store), vec!["x", "y"]);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut store = HistoryStore::new(0);
        store.insert(record("a"));
        store.insert(record("b"));
        assert_eq!(markups(&store), vec!["b"]);
    }
}
