use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

use chrono::{TimeDelta, Utc};
use folio_config::RetentionPolicy;
use tracing::debug;

use crate::observer::{ObserverList, ResultObserver, Subscription};
use crate::sync::{lock, read, write};
use crate::types::{ExecutionResult, PageKey};

type Records = HashMap<PageKey, ExecutionResult>;

/// Snapshots written by observers while a delivery pass is running.
#[derive(Default)]
struct Delivery {
  thread: Option<ThreadId>,
  deferred: VecDeque<Vec<ExecutionResult>>,
}

/// In-memory map from page key to the latest execution result.
///
/// Writes and the notifications they trigger are serialized, so observers see
/// snapshots in the same order the writes happened. Reads never wait on
/// observers, which lets an observer call [`ResultStore::list`].
///
/// An observer may also write to the store. Its write is applied at once and
/// its snapshot is delivered after the current pass over the observers ends.
#[derive(Default)]
pub struct ResultStore {
  records: RwLock<Records>,
  write_lock: Mutex<()>,
  delivery: Mutex<Delivery>,
  observers: ObserverList,
  retention: RetentionPolicy,
}

impl ResultStore {
  /// Create an unbounded store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a store that evicts records according to `retention` on every write.
  pub fn with_retention(retention: RetentionPolicy) -> Self {
    Self {
      retention,
      ..Self::default()
    }
  }

  /// Look up the result for a page URL.
  pub fn get(&self, url: &str) -> Option<ExecutionResult> {
    self.get_by_key(&PageKey::from_url(url))
  }

  pub fn get_by_key(&self, key: &PageKey) -> Option<ExecutionResult> {
    read(&self.records).get(key).cloned()
  }

  /// Snapshot of every record. Order is unspecified.
  pub fn list(&self) -> Vec<ExecutionResult> {
    read(&self.records).values().cloned().collect()
  }

  pub fn len(&self) -> usize {
    read(&self.records).len()
  }

  pub fn is_empty(&self) -> bool {
    read(&self.records).is_empty()
  }

  /// Replace the record for `record.id` and notify observers.
  pub fn put(&self, record: ExecutionResult) {
    self.mutate(|records| {
      let key = record.id.clone();
      records.insert(key.clone(), record);
      self.apply_retention(records, &key);
    });
  }

  /// Remove every record and notify observers with the empty snapshot.
  pub fn clear(&self) {
    self.mutate(Records::clear);
  }

  fn mutate(&self, change: impl FnOnce(&mut Records)) {
    if self.is_delivering_here() {
      // write_lock is held further up this thread's stack
      let snapshot = self.apply(change);
      lock(&self.delivery).deferred.push_back(snapshot);
      return;
    }

    let _serial = lock(&self.write_lock);
    let snapshot = self.apply(change);
    self.deliver(snapshot);
  }

  fn apply(&self, change: impl FnOnce(&mut Records)) -> Vec<ExecutionResult> {
    let mut records = write(&self.records);
    change(&mut records);
    records.values().cloned().collect()
  }

  fn is_delivering_here(&self) -> bool {
    lock(&self.delivery).thread == Some(thread::current().id())
  }

  /// Notify observers of `snapshot`, then of any snapshots they caused.
  fn deliver(&self, snapshot: Vec<ExecutionResult>) {
    lock(&self.delivery).thread = Some(thread::current().id());

    let mut next = snapshot;
    loop {
      self.observers.notify(&next);

      let mut delivery = lock(&self.delivery);
      match delivery.deferred.pop_front() {
        Some(deferred) => next = deferred,
        None => {
          delivery.thread = None;
          return;
        }
      }
    }
  }

  /// Register an observer. It receives the full snapshot after every write.
  pub fn subscribe<O>(&self, observer: O) -> Subscription
  where
    O: ResultObserver + 'static,
  {
    self.observers.register(Arc::new(observer))
  }

  pub fn observer_count(&self) -> usize {
    self.observers.len()
  }

  /// Drop records past the retention bounds, never the one just written.
  fn apply_retention(&self, records: &mut Records, keep: &PageKey) {
    if self.retention.is_unbounded() {
      return;
    }

    let before = records.len();

    if let Some(max_age) = self
      .retention
      .max_age_secs
      .and_then(|secs| TimeDelta::try_seconds(i64::try_from(secs).ok()?))
    {
      let cutoff = Utc::now() - max_age;
      records.retain(|key, record| key == keep || record.last_updated >= cutoff);
    }

    if let Some(max_entries) = self.retention.max_entries {
      while records.len() > max_entries.max(1) {
        let oldest = records
          .iter()
          .filter(|(key, _)| *key != keep)
          .min_by_key(|(_, record)| record.last_updated)
          .map(|(key, _)| key.clone());

        match oldest {
          Some(key) => {
            records.remove(&key);
          }
          None => break,
        }
      }
    }

    let evicted = before - records.len();
    if evicted > 0 {
      debug!(evicted, remaining = records.len(), "evicted execution results");
    }
  }
}
