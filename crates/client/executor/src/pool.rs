use std::ops::Deref;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fixed set of clients, each lent to one worker at a time.
///
/// Clients are never shared between two in-flight batches, so a client type
/// which is not safe to use concurrently can be pooled as is.
pub struct ClientPool<C> {
    clients: Mutex<Vec<C>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl<C> ClientPool<C> {
    pub fn try_new<E>(size: usize, mut factory: impl FnMut(usize) -> Result<C, E>) -> Result<Self, E> {
        let size = size.max(1);
        let clients = (0..size).map(&mut factory).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clients: Mutex::new(clients), permits: Arc::new(Semaphore::new(size)), size })
    }

    pub fn new(size: usize, mut factory: impl FnMut(usize) -> C) -> Self {
        match Self::try_new::<std::convert::Infallible>(size, |i| Ok(factory(i))) {
            Ok(pool) => pool,
            Err(never) => match never {},
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Waits for a free client. `None` once the pool is closed.
    pub async fn checkout(&self) -> Option<PooledClient<'_, C>> {
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        let client = self.lock().pop()?;
        Some(PooledClient { pool: self, client: Some(client), _permit: permit })
    }

    /// Wakes up every waiter with `None` and refuses further checkouts.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<C>> {
        // The critical sections only push and pop, a poisoned lock still holds a valid vec.
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A client checked out of a [ClientPool], returned on drop.
pub struct PooledClient<'a, C> {
    pool: &'a ClientPool<C>,
    client: Option<C>,
    _permit: OwnedSemaphorePermit,
}

impl<C> Deref for PooledClient<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        // Only taken in drop.
        self.client.as_ref().expect("Client is present until drop")
    }
}

impl<C> Drop for PooledClient<'_, C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.lock().push(client);
        }
    }
}
