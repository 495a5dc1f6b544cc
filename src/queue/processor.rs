//! Admission loop: hands ready entries to workers in order

use tokio::sync::OwnedSemaphorePermit;

use super::{PersistentQueue, QueueEntry, QueuePayload};
use crate::error::PipelineError;

impl<T: QueuePayload> PersistentQueue<T> {
    /// Spawn the admission loop
    ///
    /// The loop repeatedly:
    /// 1. Acquires a worker permit (blocks while N handlers are running)
    /// 2. Waits for the lowest-order ready entry
    /// 3. Spawns the handler for it, holding the permit until it finishes
    ///
    /// Taking the permit before popping means an entry is only bound to a worker
    /// at the moment one is free, so a lower-order entry admitted meanwhile
    /// still goes first.
    pub(super) fn start_processor(&self) {
        let queue = self.clone();
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    permit = queue.inner.workers.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => break,
                    },
                };

                let entry = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    entry = queue.next_ready() => entry,
                };

                queue.spawn_worker(entry, permit);
            }
            tracing::debug!("queue admission loop stopped");
        });
    }

    /// Wait for and pop the lowest-order ready entry
    async fn next_ready(&self) -> QueueEntry<T> {
        loop {
            {
                let mut state = self.inner.state.lock().await;
                while let Some(admission) = state.ready.pop() {
                    if let Some(entry) = state.pending.get(&admission.key) {
                        return entry.clone();
                    }
                }
            }
            self.inner.ready_notify.notified().await;
        }
    }

    fn spawn_worker(&self, entry: QueueEntry<T>, permit: OwnedSemaphorePermit) {
        let queue = self.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let QueueEntry { key, data, order } = entry;
            tracing::debug!(key = %key, order, "task admitted");

            // Separate task so a panicking handler cannot take the worker down with it
            let handler = queue.inner.handler.clone();
            let result = match tokio::spawn(async move { handler.handle(data).await }).await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::HandlerPanicked {
                    reason: e.to_string(),
                }),
            };

            if let Err(e) = &result {
                tracing::warn!(key = %key, error = %e, "task ended with an error");
            }

            queue.complete(&key).await;
        });
    }
}
