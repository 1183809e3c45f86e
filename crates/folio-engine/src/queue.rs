//! Throttled execution queue.
//!
//! Queued pages run one at a time, in FIFO order, with a fixed pause after
//! each one so the content source is never flooded. A single drain loop is
//! spawned on demand; enqueueing while it runs just appends.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use folio_config::ExecutionOptions;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::runner::Runner;

struct QueuedExecution {
  url: String,
  options: ExecutionOptions,
}

/// Pending work and the drain flag share one lock, so an item can never be
/// pushed after the loop decided to stop but before it cleared the flag.
#[derive(Default)]
struct QueueState {
  pending: VecDeque<QueuedExecution>,
  draining: bool,
}

pub(crate) struct ExecutionQueue {
  state: Mutex<QueueState>,
  idle: Notify,
  delay: Duration,
  cancel: CancellationToken,
}

impl ExecutionQueue {
  pub(crate) fn new(delay: Duration) -> Self {
    Self {
      state: Mutex::new(QueueState::default()),
      idle: Notify::new(),
      delay,
      cancel: CancellationToken::new(),
    }
  }

  fn state(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Append a page and start the drain loop if none is running.
  ///
  /// Without a tokio runtime to drain on, the page is dropped.
  pub(crate) fn push(self: &Arc<Self>, runner: &Arc<Runner>, url: String, options: ExecutionOptions) {
    if self.cancel.is_cancelled() {
      warn!(url = %url, "execution queue is shut down, dropping page");
      return;
    }

    let mut state = self.state();
    if state.draining {
      state.pending.push_back(QueuedExecution { url, options });
      return;
    }

    let handle = match tokio::runtime::Handle::try_current() {
      Ok(handle) => handle,
      Err(e) => {
        error!(url = %url, error = %e, "no tokio runtime to drain the execution queue, dropping page");
        return;
      }
    };

    state.pending.push_back(QueuedExecution { url, options });
    state.draining = true;
    drop(state);

    let queue = Arc::clone(self);
    let runner = Arc::clone(runner);
    handle.spawn(async move { queue.drain(runner).await });
  }

  async fn drain(self: Arc<Self>, runner: Arc<Runner>) {
    info!(pending = self.len(), "queue drain started");
    let mut processed = 0usize;

    while let Some(next) = self.next_item() {
      let result = runner.execute(&next.url, &next.options).await;
      processed += 1;
      debug!(url = %next.url, status = %result.status, "queued page executed");

      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => {}
        _ = tokio::time::sleep(self.delay) => {}
      }
    }

    info!(processed, "queue drain finished");
    self.idle.notify_waiters();
  }

  /// Pop the next item, clearing the drain flag when there is nothing left.
  fn next_item(&self) -> Option<QueuedExecution> {
    let mut state = self.state();

    if self.cancel.is_cancelled() {
      let dropped = state.pending.len();
      state.pending.clear();
      state.draining = false;
      if dropped > 0 {
        warn!(dropped, "execution queue shut down with pending pages");
      }
      return None;
    }

    let next = state.pending.pop_front();
    if next.is_none() {
      state.draining = false;
    }
    next
  }

  pub(crate) fn len(&self) -> usize {
    self.state().pending.len()
  }

  pub(crate) fn is_draining(&self) -> bool {
    self.state().draining
  }

  /// Wait until the queue is empty and no drain loop is running.
  pub(crate) async fn wait_idle(&self) {
    loop {
      let mut notified = pin!(self.idle.notified());
      notified.as_mut().enable();

      {
        let state = self.state();
        if !state.draining && state.pending.is_empty() {
          return;
        }
      }

      notified.await;
    }
  }

  /// Stop the drain loop after the page it is currently running.
  pub(crate) fn shutdown(&self) {
    self.cancel.cancel();
  }
}
