//! Background task tracking
//!
//! Work scheduled by integrations is spawned on the tokio runtime and its
//! handle is kept, so callers can wait for everything scheduled so far
//! (including tasks scheduled by those tasks) to finish.

use std::future::Future;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Tracks spawned tasks until they are awaited
#[derive(Debug, Default)]
pub struct TaskTracker {
    pending: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` and track it under `name`
    pub fn create_task<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!("Creating task: {}", name);
        let handle = tokio::spawn(future);
        self.pending.lock().push((name, handle));
    }

    /// Number of tasks not yet awaited
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Wait until every tracked task has finished
    pub async fn block_till_done(&self) {
        loop {
            let batch: Vec<(String, JoinHandle<()>)> = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                break;
            }

            let (names, handles): (Vec<String>, Vec<JoinHandle<()>>) = batch.into_iter().unzip();
            for (name, result) in names.iter().zip(join_all(handles).await) {
                match result {
                    Ok(()) => debug!("Task finished: {}", name),
                    Err(e) if e.is_panic() => error!("Task {} panicked", name),
                    Err(_) => debug!("Task cancelled: {}", name),
                }
            }
        }
    }
}
