use crate::guarded::GuardedCache;
use std::sync::Arc;
use tinylink_core::{ShortCode, StoredEntity, UrlCache};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of pending commands before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Command {
    Put(StoredEntity),
    Evict(ShortCode),
    Flush(oneshot::Sender<()>),
}

/// Handle to a background task that applies cache writes in order.
///
/// Enqueueing never waits: when the queue is full the command is dropped,
/// since the cache is only ever a copy of the store. Clones share one queue.
/// The worker exits once every handle is dropped.
#[derive(Debug, Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<Command>,
}

impl CacheWriter {
    /// Spawns the worker on the current runtime.
    pub fn spawn<C: UrlCache>(
        cache: Arc<GuardedCache<C>>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(cache, rx));
        (Self { tx }, handle)
    }

    pub fn enqueue_put(&self, entity: StoredEntity) {
        let code = entity.short_code().clone();
        self.enqueue(Command::Put(entity), &code);
    }

    pub fn enqueue_evict(&self, code: ShortCode) {
        let key = code.clone();
        self.enqueue(Command::Evict(code), &key);
    }

    fn enqueue(&self, command: Command, code: &ShortCode) {
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(code = %code, "cache write queue full, dropping command");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(code = %code, "cache writer stopped, dropping command");
            }
        }
    }

    /// Waits until every command enqueued before this call has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run<C: UrlCache>(cache: Arc<GuardedCache<C>>, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Put(entity) => {
                let outcome = cache.put(&entity).await;
                debug!(code = %entity.short_code(), ?outcome, "applied cache put");
            }
            Command::Evict(code) => {
                let outcome = cache.evict(&code).await;
                debug!(code = %code, ?outcome, "applied cache eviction");
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    info!("cache writer stopped");
}
