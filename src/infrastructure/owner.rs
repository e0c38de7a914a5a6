//! Single-threaded owner of the record store.
//!
//! The store is moved onto one dedicated OS thread and never shared. Other
//! contexts submit closures over an mpsc channel and await the reply on a
//! oneshot, so every store access is serialized without locks.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::repositories::{RecordStore, StoreError};

/// Upper bound on how long a caller waits for the owner thread
pub const OWNER_CALL_TIMEOUT: Duration = Duration::from_secs(30);

type Job = Box<dyn FnOnce(&mut dyn RecordStore) + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum OwnerCallError {
    #[error("record store did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("cancelled while waiting for record store")]
    Cancelled,
    #[error("record store is not running")]
    Closed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OwnerContext;

impl OwnerContext {
    /// Start the owner thread. It runs until every handle is dropped.
    pub fn spawn(store: Box<dyn RecordStore>) -> io::Result<OwnerHandle> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        std::thread::Builder::new()
            .name("record-owner".to_string())
            .spawn(move || {
                let mut store = store;
                while let Some(job) = rx.blocking_recv() {
                    let run = panic::catch_unwind(AssertUnwindSafe(|| job(store.as_mut())));
                    if run.is_err() {
                        tracing::error!("Record store job panicked");
                    }
                }
                tracing::debug!("Record owner thread stopped");
            })?;

        Ok(OwnerHandle {
            tx,
            timeout: OWNER_CALL_TIMEOUT,
        })
    }
}

/// Cheap cloneable entry point into the owner thread
#[derive(Clone)]
pub struct OwnerHandle {
    tx: mpsc::UnboundedSender<Job>,
    timeout: Duration,
}

impl OwnerHandle {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Run `f` on the owner thread, bounded only by the call timeout
    pub async fn call<T, F>(&self, f: F) -> Result<T, OwnerCallError>
    where
        F: FnOnce(&mut dyn RecordStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.call_cancellable(f, &CancellationToken::new()).await
    }

    /// Run `f` on the owner thread. Returns early with `Cancelled` when
    /// `cancel` fires; the job itself still runs once it is dequeued.
    pub async fn call_cancellable<T, F>(
        &self,
        f: F,
        cancel: &CancellationToken,
    ) -> Result<T, OwnerCallError>
    where
        F: FnOnce(&mut dyn RecordStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(OwnerCallError::Cancelled);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |store: &mut dyn RecordStore| {
            let _ = reply_tx.send(f(store));
        });
        self.tx.send(job).map_err(|_| OwnerCallError::Closed)?;

        tokio::select! {
            reply = tokio::time::timeout(self.timeout, reply_rx) => match reply {
                Ok(Ok(result)) => result.map_err(OwnerCallError::Store),
                Ok(Err(_)) => Err(OwnerCallError::Closed),
                Err(_) => Err(OwnerCallError::Timeout(self.timeout)),
            },
            _ = cancel.cancelled() => Err(OwnerCallError::Cancelled),
        }
    }
}
