//! Durable-write queue.
//!
//! Mutations hand their changes to a single writer task over a channel and
//! await the reply. Repository calls are blocking file I/O, so each batch runs
//! on the blocking pool; batches are written one at a time in arrival order.

use std::sync::Arc;

use claims_engine::repository::Repositories;
use claims_engine::{Change, RepositoryError};
use tokio::sync::{mpsc, oneshot};

/// Queue depth before senders start waiting.
pub const WRITE_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("claim writer has stopped")]
    Stopped,
}

struct WriteRequest {
    changes: Vec<Change>,
    reply: oneshot::Sender<Result<(), RepositoryError>>,
}

/// Cheap to clone; every clone feeds the same writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriteRequest>,
}

impl WriterHandle {
    /// Persist `changes` and wait for the outcome.
    pub async fn write(&self, changes: Vec<Change>) -> Result<(), WriteError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WriteRequest { changes, reply })
            .await
            .map_err(|_| WriteError::Stopped)?;
        rx.await.map_err(|_| WriteError::Stopped)?.map_err(WriteError::from)
    }
}

/// Spawn the writer task. It runs until every handle is dropped.
pub fn spawn(repos: Repositories) -> WriterHandle {
    let (tx, mut rx) = mpsc::channel::<WriteRequest>(WRITE_QUEUE_CAPACITY);
    let repos = Arc::new(repos);
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let repos = Arc::clone(&repos);
            let count = request.changes.len();
            let changes = request.changes;
            let result = tokio::task::spawn_blocking(move || repos.apply(&changes))
                .await
                .unwrap_or_else(|e| Err(RepositoryError::Unavailable(format!("writer task failed: {e}"))));
            match &result {
                Ok(()) => tracing::debug!("Persisted {} claim changes", count),
                Err(e) => tracing::error!("Failed to persist {} claim changes: {}", count, e),
            }
            // The caller may have given up; nothing to do then.
            let _ = request.reply.send(result);
        }
        tracing::info!("Claim writer stopped");
    });
    WriterHandle { tx }
}
