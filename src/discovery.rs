//! Backend discovery against the container runtime.
//!
//! Backend nodes are not statically configured.  The gateway asks the Docker
//! daemon for running containers, keeps those whose name and attached
//! network both carry the well-known markers, and extracts each node's
//! MinIO credentials from the container's declared environment.
//!
//! Runtime connection and container-listing failures are fatal (there is no
//! way to serve requests without at least attempting discovery); everything
//! that goes wrong with an individual container only drops that candidate,
//! recorded in the returned rejection list.

use anyhow::Context;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::ContainerSummary;
use bollard::Docker;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Marker substring identifying backend node containers by name.
pub const CONTAINER_MARKER: &str = "amazin-object-storage-node";

/// Marker substring identifying the backend network.
pub const NETWORK_MARKER: &str = "amazin-object-storage";

/// Environment variable holding a node's access key.
pub const ENV_ACCESS_KEY: &str = "MINIO_ACCESS_KEY";

/// Environment variable holding a node's secret key.
pub const ENV_SECRET_KEY: &str = "MINIO_SECRET_KEY";

/// Fixed port the storage service listens on inside each node.
pub const STORAGE_PORT: u16 = 9000;

/// Overall deadline for the container-listing call.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// A backend node detected by discovery, before connection and validation.
#[derive(Debug, Clone)]
pub struct BackendCandidate {
    /// Matched container name, leading `/` stripped.
    pub name: String,
    /// `<container-ip>:9000`.
    pub address: String,
    /// Access key extracted from the container environment.
    pub access_key: String,
    /// Secret key extracted from the container environment.
    pub secret_key: String,
    /// Deadline bounding this candidate's subsequent network calls.
    pub deadline: Duration,
}

/// A candidate dropped at some pipeline stage, kept for observability.
#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub name: String,
    pub address: String,
    pub reason: String,
}

/// Query the container runtime and produce backend candidates.
///
/// `search_timeout` is the per-candidate deadline; it bounds each container
/// inspection here and is carried on the candidate for the bucket-preparation
/// stage.
pub async fn discover(
    search_timeout: Duration,
) -> anyhow::Result<(Vec<BackendCandidate>, Vec<RejectedCandidate>)> {
    let docker = Docker::connect_with_local_defaults()
        .context("could not connect to the container runtime")?;

    let options = ListContainersOptions::<String> {
        all: false,
        ..Default::default()
    };
    let containers = timeout(LIST_TIMEOUT, docker.list_containers(Some(options)))
        .await
        .context("container listing timed out")?
        .context("could not list containers")?;

    let mut candidates = Vec::new();
    let mut rejected = Vec::new();

    for container in containers {
        let Some((name, ip)) = match_container(&container) else {
            continue;
        };
        let address = format!("{ip}:{STORAGE_PORT}");
        info!(%name, %address, "found backend container, extracting credentials");

        let Some(id) = container.id.as_deref() else {
            rejected.push(RejectedCandidate {
                name,
                address,
                reason: "container has no id".to_string(),
            });
            continue;
        };

        let inspect = match timeout(
            search_timeout,
            docker.inspect_container(id, None::<InspectContainerOptions>),
        )
        .await
        {
            Ok(Ok(inspect)) => inspect,
            Ok(Err(err)) => {
                rejected.push(RejectedCandidate {
                    name,
                    address,
                    reason: format!("container inspection failed: {err}"),
                });
                continue;
            }
            Err(_) => {
                rejected.push(RejectedCandidate {
                    name,
                    address,
                    reason: "container inspection timed out".to_string(),
                });
                continue;
            }
        };

        let env = inspect
            .config
            .and_then(|config| config.env)
            .unwrap_or_default();
        match candidate_from_env(name.clone(), address.clone(), &env, search_timeout) {
            Some(candidate) => candidates.push(candidate),
            None => rejected.push(RejectedCandidate {
                name,
                address,
                reason: format!("missing {ENV_ACCESS_KEY} or {ENV_SECRET_KEY}"),
            }),
        }
    }

    Ok((candidates, rejected))
}

/// Decide whether a listed container qualifies as a backend node.
///
/// Returns the matched name (leading `/` stripped) and the container's IP
/// address on the matched network, or `None` if any filter fails.
fn match_container(container: &ContainerSummary) -> Option<(String, String)> {
    if container.state.as_deref() != Some("running") {
        return None;
    }

    let names = container.names.as_deref().unwrap_or_default();
    let name = find_containing(names, CONTAINER_MARKER)?
        .trim_start_matches('/')
        .to_string();

    let networks = container.network_settings.as_ref()?.networks.as_ref()?;
    let (_, endpoint) = networks
        .iter()
        .find(|(network, _)| network.contains(NETWORK_MARKER))?;
    let ip = endpoint.ip_address.clone().filter(|ip| !ip.is_empty())?;

    Some((name, ip))
}

/// Build a candidate from a container's declared environment, or `None` if
/// either credential variable is absent.
fn candidate_from_env(
    name: String,
    address: String,
    env: &[String],
    deadline: Duration,
) -> Option<BackendCandidate> {
    let access_key = env_value(env, ENV_ACCESS_KEY)?;
    let secret_key = env_value(env, ENV_SECRET_KEY)?;
    Some(BackendCandidate {
        name,
        address,
        access_key,
        secret_key,
        deadline,
    })
}

/// Extract the value of `key` from `NAME=value` environment entries.
fn env_value(env: &[String], key: &str) -> Option<String> {
    env.iter().find_map(|entry| {
        entry
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

/// First item containing `marker`, if any.
fn find_containing<'a>(items: &'a [String], marker: &str) -> Option<&'a str> {
    items
        .iter()
        .find(|item| item.contains(marker))
        .map(String::as_str)
}

// -- Tests -------------------------------------------------------------------
