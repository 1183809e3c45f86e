//! Result observers.
//!
//! Observers receive the full current snapshot of the store after every write,
//! not a diff. Page counts are small, so consumers (status panels, progress
//! logs) always get the complete picture.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc;
use tracing::error;

use crate::sync::{read, write};
use crate::types::ExecutionResult;

/// Trait for receiving store snapshots.
///
/// Called synchronously from the writing thread, so implementations should be
/// quick. Writes an observer makes to the store are delivered once the current
/// round of notifications finishes. An observer must not block waiting on a
/// write from another thread, since that write waits for it.
pub trait ResultObserver: Send + Sync {
  fn on_results(&self, results: &[ExecutionResult]);
}

impl<F> ResultObserver for F
where
  F: Fn(&[ExecutionResult]) + Send + Sync,
{
  fn on_results(&self, results: &[ExecutionResult]) {
    self(results)
  }
}

/// An observer that forwards snapshots to an unbounded channel.
///
/// Use this to consume snapshots asynchronously (stream to a UI, log, etc.).
#[derive(Debug, Clone)]
pub struct ChannelObserver {
  sender: mpsc::UnboundedSender<Vec<ExecutionResult>>,
}

impl ChannelObserver {
  pub fn new(sender: mpsc::UnboundedSender<Vec<ExecutionResult>>) -> Self {
    Self { sender }
  }
}

impl ResultObserver for ChannelObserver {
  fn on_results(&self, results: &[ExecutionResult]) {
    // Receiver may have been dropped
    let _ = self.sender.send(results.to_vec());
  }
}

type Registered = Vec<(u64, Arc<dyn ResultObserver>)>;

/// Registration-ordered list of observers.
#[derive(Default)]
pub(crate) struct ObserverList {
  next_id: AtomicU64,
  observers: Arc<RwLock<Registered>>,
}

impl ObserverList {
  pub(crate) fn register(&self, observer: Arc<dyn ResultObserver>) -> Subscription {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    write(&self.observers).push((id, observer));

    Subscription {
      id,
      observers: Arc::downgrade(&self.observers),
      active: AtomicBool::new(true),
    }
  }

  pub(crate) fn len(&self) -> usize {
    read(&self.observers).len()
  }

  /// Deliver a snapshot to every observer in registration order.
  pub(crate) fn notify(&self, results: &[ExecutionResult]) {
    // Copy out so observers may unsubscribe while being notified
    let observers: Vec<(u64, Arc<dyn ResultObserver>)> = read(&self.observers).clone();

    for (id, observer) in observers {
      if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer.on_results(results))) {
        error!(
          observer_id = id,
          panic = %panic_message(panic.as_ref()),
          "result observer panicked"
        );
      }
    }
  }
}

/// Handle returned by `subscribe`. Dropping it keeps the observer registered.
pub struct Subscription {
  id: u64,
  observers: Weak<RwLock<Registered>>,
  active: AtomicBool,
}

impl Subscription {
  /// Remove the observer. Calling this more than once is a no-op.
  pub fn unsubscribe(&self) {
    if !self.active.swap(false, Ordering::AcqRel) {
      return;
    }
    if let Some(observers) = self.observers.upgrade() {
      write(&observers).retain(|(id, _)| *id != self.id);
    }
  }

  pub fn is_active(&self) -> bool {
    self.active.load(Ordering::Acquire)
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .field("active", &self.is_active())
      .finish()
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
