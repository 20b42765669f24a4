pub mod deployments;
pub mod publisher;
pub mod reconciler;


use crate::{cluster, conf, storage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use strum::{Display, EnumString};

pub fn epoch_milli() -> u64 {
    let current_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();

    u64::try_from(current_epoch).unwrap()
}

/// Failure taxonomy for the service core. Per-cluster failures in a batch are
/// wrapped into [`ClusterError`]s and aggregated rather than propagated; only
/// validation failures detected before any per-cluster work abort a call
/// outright.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ApiError {
    /// Malformed or missing input; the caller's fault.
    #[error("invalid argument; {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// An explicit template id belonging to a different deployment was
    /// supplied.
    #[error("permission denied; {0}")]
    PermissionDenied(String),

    /// Stored data failed to parse; a data integrity problem, not the
    /// caller's fault.
    #[error("could not parse stored data; {0}")]
    Malformed(String),

    /// An image override named a container the template does not have.
    #[error("deployment template does not have container: {0}")]
    UnknownContainer(String),

    /// The target cluster is unreachable or unknown to the gateway.
    #[error("cluster unavailable; {0}")]
    Unavailable(String),

    /// The cluster rejected the workload object.
    #[error("could not apply workload; {0}")]
    ApplyFailed(String),

    /// The workload was applied but the live-status pointer could not be
    /// updated; future resolutions may act on stale state.
    #[error("workload applied but live-status update failed; {0}")]
    StatusDesync(String),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),
}

/// One cluster's failure within a multi-cluster batch. Batches carry these in
/// the response envelope instead of failing the whole call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterError {
    pub cluster: String,
    pub error: String,
}

impl ClusterError {
    pub fn new(cluster: &str, error: &ApiError) -> Self {
        ClusterError {
            cluster: cluster.to_string(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.cluster, self.error)
    }
}

#[derive(
    Debug, Clone, Display, Default, PartialEq, EnumString, Eq, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ResourceKind {
    #[default]
    Deployment,
}

#[derive(
    Debug, Clone, Display, Default, PartialEq, EnumString, Eq, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum PublishOutcome {
    /// Should only be in this state while the publish attempt is in flight.
    #[default]
    Unknown,

    Success,

    Failure,
}

/// Holds all services the operations need. The embedding HTTP layer
/// constructs one of these at startup and calls the operation methods on it.
pub struct ApiState {
    /// Various configurations needed by the api.
    pub conf: conf::Config,

    /// The main backend storage implementation; armada keeps all of its
    /// durable state here.
    pub storage: storage::Db,

    /// The mechanism by which armada reaches individual clusters.
    pub gateway: Arc<dyn cluster::ClusterGateway + Send + Sync>,
}

impl ApiState {
    pub fn new(
        conf: conf::Config,
        storage: storage::Db,
        gateway: Arc<dyn cluster::ClusterGateway + Send + Sync>,
    ) -> Self {
        ApiState {
            conf,
            storage,
            gateway,
        }
    }

    /// Build the state from configuration alone: open (and migrate) the
    /// database and initialize the configured gateway engine.
    pub async fn from_conf(conf: conf::Config) -> anyhow::Result<Self> {
        let storage = storage::Db::new(&conf.server.storage_path).await?;
        let gateway = cluster::init_gateway(&conf.cluster)?;

        Ok(ApiState {
            conf,
            storage,
            gateway,
        })
    }
}
