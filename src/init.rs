//! Once-only router initialization.
//!
//! Discovery, connection, and bucket preparation run strictly in that order,
//! at most once per process lifetime, no matter how many callers race for
//! the router at startup.  [`RouterCell`] provides the concurrency-safe
//! accessor; it lives inside the application state and is threaded through
//! the HTTP layer rather than sitting in a module-level global.
//!
//! Zero validated backends after the full pipeline is a fatal startup
//! condition, checked once at completion -- the list is immutable
//! afterwards, so it can never become empty later.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::backend;
use crate::config::Config;
use crate::discovery::{self, RejectedCandidate};
use crate::router::ObjectRouter;

/// Lazily-initialized shared router.
///
/// Concurrent first callers of [`RouterCell::get_or_try_init`] observe the
/// initialization closure executed exactly once; late arrivals block until
/// the first attempt resolves and then share its router.
#[derive(Debug, Default)]
pub struct RouterCell {
    cell: OnceCell<Arc<ObjectRouter>>,
}

impl RouterCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell pre-populated with `router`, bypassing initialization.
    pub fn with_router(router: ObjectRouter) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Arc::new(router))),
        }
    }

    /// Get the router, running `init` first if no attempt has succeeded yet.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> anyhow::Result<Arc<ObjectRouter>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<ObjectRouter>>,
    {
        self.cell
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }
}

/// Run the full Discovery -> Connector -> BucketPreparer pipeline.
///
/// Per-candidate failures are collected and logged here; pipeline-level
/// failures (runtime unreachable, listing failure, malformed backend
/// address, zero validated backends) are returned to the caller, which
/// decides whether to terminate the process.
pub async fn initialize(config: &Config) -> anyhow::Result<ObjectRouter> {
    let search_timeout = Duration::from_secs(config.discovery.search_timeout);

    let (candidates, rejected) = discovery::discover(search_timeout).await?;
    log_rejections("discovery", &rejected);

    let connected = backend::connect(candidates)?;
    let (backends, rejected) = backend::prepare_buckets(connected).await;
    log_rejections("bucket preparation", &rejected);

    build_router(backends)
}

/// Final pipeline stage: fail when no backend survived validation.
fn build_router(backends: Vec<backend::Backend>) -> anyhow::Result<ObjectRouter> {
    if backends.is_empty() {
        anyhow::bail!("no backend storage detected");
    }
    info!(
        backends = backends.len(),
        "storage backend initialization complete"
    );
    Ok(ObjectRouter::new(backends))
}

fn log_rejections(stage: &str, rejected: &[RejectedCandidate]) {
    for candidate in rejected {
        warn!(
            stage,
            name = %candidate.name,
            address = %candidate.address,
            reason = %candidate.reason,
            "backend candidate dropped"
        );
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use aws_sdk_s3::Client;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dummy_backend(name: &str) -> Backend {
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url("http://10.0.0.1:9000")
            .credentials_provider(Credentials::new("ak", "sk", None, None, "test"))
            .force_path_style(true)
            .build();
        Backend {
            name: name.to_string(),
            address: "10.0.0.1:9000".to_string(),
            client: Client::from_conf(config),
        }
    }

    #[test]
    fn test_build_router_empty_is_fatal() {
        let result = build_router(vec![]);
        assert!(result.is_err());
        assert!(result
            .err()
            .unwrap()
            .to_string()
            .contains("no backend storage detected"));
    }

    #[test]
    fn test_build_router_keeps_order() {
        let router = build_router(vec![dummy_backend("node-a"), dummy_backend("node-b")]).unwrap();
        assert_eq!(router.backend_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_initialize_once() {
        let cell = Arc::new(RouterCell::new());
        let attempts = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            let attempts = Arc::clone(&attempts);
            handles.push(tokio::spawn(async move {
                cell.get_or_try_init(|| async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    // Hold initialization open long enough for every caller
                    // to be waiting on the cell.
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(ObjectRouter::new(vec![dummy_backend("node-a")]))
                })
                .await
            }));
        }

        for handle in handles {
            let router = handle.await.unwrap().unwrap();
            assert_eq!(router.backend_count(), 1);
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_router_skips_initialization() {
        let cell = RouterCell::with_router(ObjectRouter::new(vec![dummy_backend("node-a")]));
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_in_init = Arc::clone(&ran);
        let router = cell
            .get_or_try_init(|| async move {
                ran_in_init.fetch_add(1, Ordering::SeqCst);
                Ok(ObjectRouter::new(vec![]))
            })
            .await
            .unwrap();

        assert_eq!(router.backend_count(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
