//! Deterministic object-to-backend routing.
//!
//! Selection hash: the sum of the Unicode scalar values of every character
//! in the object id, modulo the validated backend count.  Stable for a
//! fixed backend-set size and a fixed id.  This is deliberately *not* a
//! consistent hash: changing the backend-set size remaps most keys, and
//! objects stored under the old set size may become unreachable at their
//! original key.  Accepted, documented behavior.

use anyhow::anyhow;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use metrics::counter;
use tracing::debug;

use crate::backend::{Backend, BUCKET};
use crate::errors::GatewayError;
use crate::metrics::BACKEND_SELECTED_TOTAL;

/// Routes object operations to exactly one validated backend.
///
/// The backend list is fixed at construction: insertion order is discovery
/// traversal order, and no membership change ever happens afterwards, so
/// concurrent `put`/`get` calls only read.
#[derive(Debug)]
pub struct ObjectRouter {
    backends: Vec<Backend>,
}

impl ObjectRouter {
    pub fn new(backends: Vec<Backend>) -> Self {
        Self { backends }
    }

    /// Number of validated backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Store `content` under key `id` on the backend selected by `id`.
    pub async fn put(&self, id: &str, content: Bytes) -> Result<(), GatewayError> {
        let backend = self.select(id)?;
        backend
            .client
            .put_object()
            .bucket(BUCKET)
            .key(id)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|err| anyhow!("put {id} on {}: {err}", backend.name))?;
        Ok(())
    }

    /// Fetch the object under key `id` from the backend selected by `id`,
    /// fully buffered.  A failure partway through the read discards the
    /// partial buffer and propagates the error.
    pub async fn get(&self, id: &str) -> Result<Bytes, GatewayError> {
        let backend = self.select(id)?;
        let response = backend
            .client
            .get_object()
            .bucket(BUCKET)
            .key(id)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    anyhow!("object {id} does not exist")
                } else {
                    anyhow!("get {id} on {}: {service_err}", backend.name)
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|err| anyhow!("get {id} on {}: {err}", backend.name))?
            .into_bytes();
        Ok(data)
    }

    /// Select the backend for `id`, or fail when none are available.
    fn select(&self, id: &str) -> Result<&Backend, GatewayError> {
        if self.backends.is_empty() {
            return Err(GatewayError::NoBackendAvailable);
        }
        let index = route_index(id, self.backends.len());
        let backend = &self.backends[index];
        debug!(
            id,
            index,
            backend = %backend.name,
            address = %backend.address,
            "backend selected"
        );
        counter!(BACKEND_SELECTED_TOTAL, "backend" => backend.name.clone()).increment(1);
        Ok(backend)
    }
}

/// Map an object id to a backend index among `count` backends.
///
/// `count` must be non-zero.
pub fn route_index(id: &str, count: usize) -> usize {
    let sum: u64 = id.chars().map(|c| c as u64).sum();
    (sum % count as u64) as usize
}

// -- Tests -------------------------------------------------------------------
