use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinSet;

pub type DeferredTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs work after the response has been sent. Callers never observe the
/// result; completion is only guaranteed as far as the host drains pending
/// tasks before shutting down.
pub trait BackgroundTasks: Send + Sync {
    fn defer(&self, label: &'static str, task: DeferredTask);
}

/// Spawns deferred work onto the tokio runtime and keeps the handles so
/// shutdown can wait for them.
#[derive(Default)]
pub struct TokioBackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

impl TokioBackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Waits for every task spawned so far.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.lock());
        if !tasks.is_empty() {
            tracing::info!(pending = tasks.len(), "waiting for deferred tasks");
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "deferred task panicked");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BackgroundTasks for TokioBackgroundTasks {
    fn defer(&self, label: &'static str, task: DeferredTask) {
        let mut tasks = self.lock();
        while let Some(finished) = tasks.try_join_next() {
            if let Err(err) = finished {
                tracing::error!(error = %err, "deferred task panicked");
            }
        }
        tasks.spawn(task);
        tracing::debug!(task = label, pending = tasks.len(), "deferred task scheduled");
    }
}
