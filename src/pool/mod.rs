//! Fixed-size pool of pre-authenticated casework clients.
//!
//! Clients are created lazily and logged in before first hand-out. A checkout
//! is exclusive: the pool never lends the same instance to two callers, which
//! is what lets a client mutate its session during `login` without locking.

use crate::client::CaseworkClient;
use crate::errors::{CaseworkError, CaseworkResult};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

type ClientFactory = dyn Fn() -> CaseworkResult<CaseworkClient> + Send + Sync;

/// A pool of casework clients.
///
/// Construct one at process startup and pass it by reference to call sites;
/// call [`ClientPool::shutdown`] when the process is done with it.
pub struct ClientPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<CaseworkClient>>,
    acquire_timeout: Duration,
    factory: Box<ClientFactory>,
    size: usize,
}

impl ClientPool {
    /// Creates a pool of at most `size` clients.
    ///
    /// The factory builds an unauthenticated client; the pool logs each one
    /// in before its first hand-out.
    pub fn new(
        size: usize,
        acquire_timeout: Duration,
        factory: impl Fn() -> CaseworkResult<CaseworkClient> + Send + Sync + 'static,
    ) -> Self {
        info!(size, "client pool initialized");
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(size)),
                idle: Mutex::new(Vec::with_capacity(size)),
                acquire_timeout,
                factory: Box::new(factory),
                size,
            }),
        }
    }

    /// The maximum number of clients.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Borrows a logged-in client, waiting up to the pool's configured
    /// acquire timeout.
    pub async fn acquire(&self) -> CaseworkResult<PooledClient> {
        self.acquire_timeout(self.inner.acquire_timeout).await
    }

    /// Borrows a logged-in client, waiting up to `timeout`.
    ///
    /// Fails with [`crate::errors::CaseworkErrorKind::PoolTimeout`] when no
    /// client becomes available in time.
    pub async fn acquire_timeout(&self, timeout: Duration) -> CaseworkResult<PooledClient> {
        let acquired =
            tokio::time::timeout(timeout, Arc::clone(&self.inner.semaphore).acquire_owned()).await;
        let permit = match acquired {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(CaseworkError::pool_timeout("client pool is shut down")),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out waiting for a pooled client"
                );
                return Err(CaseworkError::pool_timeout(format!(
                    "timed out after {timeout:?} waiting for a pooled client"
                )));
            }
        };

        let existing = lock_idle(&self.inner.idle).pop();
        let client = match existing {
            Some(client) => client,
            None => {
                // Holding a permit guarantees fewer than `size` clients exist.
                debug!("creating pooled client");
                let client = (self.inner.factory)()?;
                client.login().await?;
                client
            }
        };

        Ok(PooledClient {
            client: Some(client),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Shuts the pool down: refuses further acquires and drops all idle
    /// clients. Checked-out clients are dropped when their holders release
    /// them.
    pub fn shutdown(&self) {
        self.inner.semaphore.close();
        let drained = lock_idle(&self.inner.idle).split_off(0);
        info!(clients = drained.len(), "client pool shut down");
    }
}

fn lock_idle(idle: &Mutex<Vec<CaseworkClient>>) -> std::sync::MutexGuard<'_, Vec<CaseworkClient>> {
    idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An exclusive checkout of one pooled client.
///
/// Dropping the guard returns the client to the pool and wakes one waiter.
pub struct PooledClient {
    client: Option<CaseworkClient>,
    inner: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledClient")
            .field("checked_out", &self.client.is_some())
            .finish()
    }
}

impl Deref for PooledClient {
    type Target = CaseworkClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("client present until drop")
    }
}

impl DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("client present until drop")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            lock_idle(&self.inner.idle).push(client);
        }
        // The permit releases after this body, once the client is back.
    }
}
