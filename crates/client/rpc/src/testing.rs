//! In-process transport for tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{BatchTransport, JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, RpcError};

type Handler = dyn Fn(&JsonRpcRequest) -> Result<Value, JsonRpcErrorObject> + Send + Sync;

/// Answers every request with a handler. Responses are returned in reverse
/// order to exercise id based re-ordering.
///
/// Clones share their counters, so a pool of clones can be inspected as one.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    transient_failures: Arc<AtomicUsize>,
    max_batch_size: Option<usize>,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
    methods: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&JsonRpcRequest) -> Result<Value, JsonRpcErrorObject> + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            transient_failures: Arc::new(AtomicUsize::new(0)),
            max_batch_size: None,
            batch_sizes: Default::default(),
            methods: Default::default(),
        }
    }

    /// The next `n` batches fail with HTTP 503.
    pub fn fail_next(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Batches larger than `size` fail with HTTP 413.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    /// Sizes of the batches which reached the handler.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().expect("Poisoned lock").clone()
    }

    /// Methods of every request which reached the handler.
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().expect("Poisoned lock").clone()
    }

    pub fn count_method(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }
}

#[async_trait]
impl BatchTransport for MockTransport {
    async fn send_batch(&self, requests: &[JsonRpcRequest]) -> Result<Vec<JsonRpcResponse>, RpcError> {
        if self.transient_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(RpcError::Status { status: 503, body: "unavailable".to_string() });
        }
        if self.max_batch_size.is_some_and(|max| requests.len() > max) {
            return Err(RpcError::Status { status: 413, body: "batch too large".to_string() });
        }

        self.batch_sizes.lock().expect("Poisoned lock").push(requests.len());
        self.methods.lock().expect("Poisoned lock").extend(requests.iter().map(|r| r.method.clone()));

        Ok(requests
            .iter()
            .rev()
            .map(|req| match (self.handler)(req) {
                Ok(result) => JsonRpcResponse::success(req.id, result),
                Err(err) => JsonRpcResponse::failure(req.id, err),
            })
            .collect())
    }
}
