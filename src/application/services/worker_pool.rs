use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::ConversionWorker;

/// A fixed set of conversion workers sharing one broker channel.
pub struct WorkerPool {
    cancel: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub fn start(worker: ConversionWorker, size: usize) -> Self {
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();

        for worker_id in 0..size.max(1) {
            workers.spawn(worker.clone().run(worker_id, cancel.child_token()));
        }

        tracing::info!(size = workers.len(), "Worker pool started");
        Self { cancel, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stops consuming and waits for in-flight deliveries to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Conversion worker panicked");
            }
        }
        tracing::info!("Worker pool drained");
    }
}
