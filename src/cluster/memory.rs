use super::{ClusterGateway, ClusterHandle, GatewayError};
use crate::workload::{PodInfo, Workload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// An in-process cluster gateway. Each registered cluster keeps its own
/// workload and pod maps; apply is an upsert keyed by (namespace, name).
/// Backs local development and the test suites; a Kubernetes-backed engine
/// lives with the embedding service.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    clusters: RwLock<HashMap<String, Arc<MemoryCluster>>>,
}

impl InMemoryGateway {
    /// Register a cluster under the given name, returning the handle so
    /// callers can seed workloads and pods into it.
    pub fn add_cluster(&self, name: &str) -> Arc<MemoryCluster> {
        let cluster = Arc::new(MemoryCluster::new(name));
        self.clusters
            .write()
            .unwrap()
            .insert(name.to_string(), cluster.clone());
        cluster
    }
}

#[async_trait]
impl ClusterGateway for InMemoryGateway {
    async fn resolve(
        &self,
        cluster_name: &str,
    ) -> Result<Arc<dyn ClusterHandle + Send + Sync>, GatewayError> {
        let clusters = self.clusters.read().unwrap();
        clusters
            .get(cluster_name)
            .map(|cluster| cluster.clone() as Arc<dyn ClusterHandle + Send + Sync>)
            .ok_or_else(|| GatewayError::NoSuchCluster(cluster_name.to_string()))
    }
}

#[derive(Debug)]
pub struct MemoryCluster {
    name: String,

    /// (namespace, workload name) -> stored object.
    workloads: RwLock<HashMap<(String, String), Workload>>,

    /// workload name -> pods backing it.
    pods: RwLock<HashMap<String, Vec<PodInfo>>>,

    /// When set, the next apply_workload call fails with a connection error.
    fail_next_apply: AtomicBool,
}

impl MemoryCluster {
    fn new(name: &str) -> Self {
        MemoryCluster {
            name: name.to_string(),
            workloads: RwLock::new(HashMap::new()),
            pods: RwLock::new(HashMap::new()),
            fail_next_apply: AtomicBool::new(false),
        }
    }

    pub fn seed_workload(&self, workload: Workload) {
        let key = (
            workload.metadata.namespace.clone(),
            workload.metadata.name.clone(),
        );
        self.workloads.write().unwrap().insert(key, workload);
    }

    pub fn seed_pods(&self, workload_name: &str, pods: Vec<PodInfo>) {
        self.pods
            .write()
            .unwrap()
            .insert(workload_name.to_string(), pods);
    }

    pub fn stored_workload(&self, name: &str, namespace: &str) -> Option<Workload> {
        self.workloads
            .read()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterHandle for MemoryCluster {
    async fn get_workload(&self, name: &str, namespace: &str) -> Result<Workload, GatewayError> {
        self.stored_workload(name, namespace).ok_or_else(|| {
            GatewayError::NoSuchWorkload(format!("{}/{} in cluster {}", namespace, name, self.name))
        })
    }

    async fn apply_workload(&self, workload: &Workload) -> Result<Workload, GatewayError> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Connection(format!(
                "cluster {} rejected the connection",
                self.name
            )));
        }

        let key = (
            workload.metadata.namespace.clone(),
            workload.metadata.name.clone(),
        );
        self.workloads
            .write()
            .unwrap()
            .insert(key, workload.clone());

        Ok(workload.clone())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        workload_name: &str,
    ) -> Result<Vec<PodInfo>, GatewayError> {
        let pods = self.pods.read().unwrap();
        Ok(pods
            .get(workload_name)
            .map(|pods| {
                pods.iter()
                    .filter(|pod| pod.namespace == namespace)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
