//! Backend connection and bucket preparation.
//!
//! The connector turns each discovered [`BackendCandidate`] into a
//! [`ConnectedCandidate`] carrying an S3 client built from the candidate's
//! extracted credentials.  Encryption is disabled: backend nodes live on a
//! trusted internal network and speak plain HTTP.
//!
//! The bucket preparer then ensures the well-known bucket exists on every
//! connected node (creating it with object locking if absent) and drops the
//! nodes where it cannot, producing the final validated [`Backend`] list.

use anyhow::Context;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::discovery::{BackendCandidate, RejectedCandidate};

/// Well-known bucket every backend node must serve.
pub const BUCKET: &str = "amazing-bucket";

/// Region presented to backend nodes. MinIO accepts any value; the SDK
/// requires one for signing.
const BACKEND_REGION: &str = "us-east-1";

/// A candidate with a constructed S3 client, not yet bucket-validated.
pub struct ConnectedCandidate {
    pub name: String,
    pub address: String,
    pub deadline: Duration,
    pub client: Client,
}

/// A validated backend connection, eligible for routing.
#[derive(Clone)]
pub struct Backend {
    pub name: String,
    pub address: String,
    pub client: Client,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

/// Build an S3 client for every candidate.
///
/// A malformed address is fatal for the whole initialization attempt: once a
/// candidate's address shape is known to be broken there is no fallback, and
/// continuing would serve with a client that can never reach its node.
pub fn connect(candidates: Vec<BackendCandidate>) -> anyhow::Result<Vec<ConnectedCandidate>> {
    candidates.into_iter().map(connect_one).collect()
}

fn connect_one(candidate: BackendCandidate) -> anyhow::Result<ConnectedCandidate> {
    let endpoint = format!("http://{}", candidate.address);
    endpoint
        .parse::<http::Uri>()
        .with_context(|| format!("invalid backend endpoint {endpoint}"))?;

    let credentials = Credentials::new(
        &candidate.access_key,
        &candidate.secret_key,
        None,
        None,
        "container-env",
    );
    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(BACKEND_REGION))
        .endpoint_url(&endpoint)
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();

    info!(name = %candidate.name, %endpoint, "backend client created");

    Ok(ConnectedCandidate {
        name: candidate.name,
        address: candidate.address,
        deadline: candidate.deadline,
        client: Client::from_conf(config),
    })
}

/// Ensure the well-known bucket exists on every connected candidate.
///
/// Candidates whose bucket cannot be verified or created are dropped and
/// recorded; the survivors form the validated backend list, in discovery
/// order.
pub async fn prepare_buckets(
    candidates: Vec<ConnectedCandidate>,
) -> (Vec<Backend>, Vec<RejectedCandidate>) {
    let mut backends = Vec::new();
    let mut rejected = Vec::new();

    for candidate in candidates {
        match ensure_bucket(&candidate).await {
            Ok(()) => backends.push(Backend {
                name: candidate.name,
                address: candidate.address,
                client: candidate.client,
            }),
            Err(err) => {
                warn!(
                    name = %candidate.name,
                    address = %candidate.address,
                    error = %err,
                    "can't prepare bucket, dropping backend"
                );
                rejected.push(RejectedCandidate {
                    name: candidate.name,
                    address: candidate.address,
                    reason: err.to_string(),
                });
            }
        }
    }

    (backends, rejected)
}

/// Check bucket existence, creating it (with object locking) if absent.
///
/// A HeadBucket failure other than NotFound rejects the candidate rather
/// than falling open into a creation attempt: a node we cannot even query
/// is not a node we should route to.
async fn ensure_bucket(candidate: &ConnectedCandidate) -> anyhow::Result<()> {
    let head = timeout(
        candidate.deadline,
        candidate.client.head_bucket().bucket(BUCKET).send(),
    )
    .await;

    match head {
        Ok(Ok(_)) => return Ok(()),
        Ok(Err(err)) => {
            let service_err = err.into_service_error();
            if !service_err.is_not_found() {
                anyhow::bail!("bucket check failed: {service_err}");
            }
        }
        Err(_) => anyhow::bail!("bucket check timed out"),
    }

    timeout(
        candidate.deadline,
        candidate
            .client
            .create_bucket()
            .bucket(BUCKET)
            .object_lock_enabled_for_bucket(true)
            .send(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("bucket creation timed out"))?
    .map_err(|err| anyhow::anyhow!("bucket creation failed: {err}"))?;

    info!(name = %candidate.name, bucket = BUCKET, "bucket created");
    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(address: &str) -> BackendCandidate {
        BackendCandidate {
            name: "node-a".to_string(),
            address: address.to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            deadline: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_connect_builds_client() {
        let connected = connect(vec![candidate("172.18.0.2:9000")]).unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].name, "node-a");
        assert_eq!(connected[0].address, "172.18.0.2:9000");
    }

    #[test]
    fn test_connect_preserves_order() {
        let mut first = candidate("10.0.0.1:9000");
        first.name = "node-a".to_string();
        let mut second = candidate("10.0.0.2:9000");
        second.name = "node-b".to_string();

        let connected = connect(vec![first, second]).unwrap();
        assert_eq!(connected[0].name, "node-a");
        assert_eq!(connected[1].name, "node-b");
    }

    #[test]
    fn test_connect_rejects_malformed_address() {
        let result = connect(vec![candidate("not a host:9000")]);
        assert!(result.is_err());
        let message = result.err().unwrap().to_string();
        assert!(message.contains("invalid backend endpoint"), "{message}");
    }
}
