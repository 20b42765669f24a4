mod memory;

pub use memory::{InMemoryGateway, MemoryCluster};

use crate::{
    conf,
    workload::{PodInfo, Workload},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use strum::{Display, EnumString};

/// Represents different cluster gateway failure possibilities.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GatewayError {
    /// Failed to start the gateway due to misconfigured settings, usually from a misconfigured settings file.
    #[allow(dead_code)]
    #[error("could not init cluster gateway; {0}")]
    FailedGatewayPrecondition(String),

    /// Cluster requested by name is not known to the gateway.
    #[error("cluster not found; {0}")]
    NoSuchCluster(String),

    /// Workload requested by name could not be found in the cluster.
    #[error("workload not found; {0}")]
    NoSuchWorkload(String),

    /// Failed to communicate with the cluster due to network error or other.
    #[error("could not connect to cluster; {0}")]
    Connection(String),

    /// An unexpected and unknown error has occurred.
    #[allow(dead_code)]
    #[error("unexpected cluster gateway error occurred; {0}")]
    Unknown(String),
}

/// A live handle to a single cluster, capable of reading and writing workload
/// objects within it.
#[async_trait]
pub trait ClusterHandle: Debug {
    /// Fetch the named workload object from the cluster.
    async fn get_workload(&self, name: &str, namespace: &str) -> Result<Workload, GatewayError>;

    /// Apply a workload object to the cluster with upsert semantics: created
    /// if absent, replaced if present. Returns the object as stored.
    async fn apply_workload(&self, workload: &Workload) -> Result<Workload, GatewayError>;

    /// List pods currently backing the named workload.
    async fn list_pods(
        &self,
        namespace: &str,
        workload_name: &str,
    ) -> Result<Vec<PodInfo>, GatewayError>;
}

/// The gateway trait defines what the interface between armada and per-cluster
/// API access should look like. Timeouts, retries, and credentials are the
/// concrete engine's concern.
#[async_trait]
pub trait ClusterGateway: Debug {
    /// Resolve a cluster name to a live handle for it.
    async fn resolve(
        &self,
        cluster_name: &str,
    ) -> Result<Arc<dyn ClusterHandle + Send + Sync>, GatewayError>;
}

#[derive(
    Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
pub enum Engine {
    #[default]
    InMemory,
}

pub fn init_gateway(
    config: &conf::Cluster,
) -> Result<Arc<dyn ClusterGateway + Send + Sync>, GatewayError> {
    #[allow(clippy::match_single_binding)]
    match config.engine {
        Engine::InMemory => Ok(Arc::new(InMemoryGateway::default())),
    }
}
