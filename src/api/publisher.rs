//! Pushes a resolved workload to its target cluster and records the outcome.

use crate::{
    api::{epoch_milli, ApiError, PublishOutcome, ResourceKind},
    api::reconciler::DeploymentInfo,
    cluster::ClusterGateway,
    storage,
};
use sqlx::SqliteConnection;
use tracing::warn;

/// A publish-history entry scheduled before the apply is attempted. The
/// outcome fields are filled in as the attempt resolves and [`record`]
/// persists the entry exactly once; callers must route every exit path
/// through it. A failed insert is logged and swallowed so history problems
/// never block the publish response.
///
/// [`record`]: PendingHistory::record
#[derive(Debug)]
pub struct PendingHistory {
    entry: storage::publish_history::PublishHistory,
}

impl PendingHistory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: ResourceKind,
        resource_id: i64,
        resource_name: &str,
        template_id: i64,
        cluster: &str,
        operated_by: &str,
        message: &str,
    ) -> Self {
        PendingHistory {
            entry: storage::publish_history::PublishHistory {
                id: 0,
                resource_kind: kind.to_string(),
                resource_id,
                resource_name: resource_name.to_string(),
                template_id,
                cluster: cluster.to_string(),
                operated_by: operated_by.to_string(),
                message: message.to_string(),
                status: PublishOutcome::Unknown.to_string(),
                created: epoch_milli().to_string(),
            },
        }
    }

    pub fn succeed(&mut self) {
        self.entry.status = PublishOutcome::Success.to_string();
    }

    pub fn fail(&mut self, message: &str) {
        self.entry.status = PublishOutcome::Failure.to_string();
        self.entry.message = message.to_string();
    }

    pub async fn record(self, conn: &mut SqliteConnection) {
        if let Err(e) = storage::publish_history::insert(conn, &self.entry).await {
            warn!(
                cluster = %self.entry.cluster,
                resource = %self.entry.resource_name,
                error = %e,
                "could not record publish history entry"
            );
        }
    }
}

/// Apply one [`DeploymentInfo`]'s workload to its target cluster. Exactly one
/// history row is written regardless of outcome; the live-status pointer
/// moves only after a confirmed apply.
///
/// Errors are per-cluster: the aggregating caller collects them and carries
/// on with the remaining clusters in the batch.
pub async fn publish_deployment(
    gateway: &dyn ClusterGateway,
    conn: &mut SqliteConnection,
    info: &DeploymentInfo,
    operated_by: &str,
) -> Result<(), ApiError> {
    let handle = gateway
        .resolve(&info.cluster.name)
        .await
        .map_err(|e| ApiError::Unavailable(format!("cluster '{}'; {}", info.cluster.name, e)))?;

    let mut pending = PendingHistory::new(
        ResourceKind::Deployment,
        info.deployment.id,
        &info.workload.metadata.name,
        info.template.id,
        &info.cluster.name,
        operated_by,
        &info.template.description,
    );

    match handle.apply_workload(&info.workload).await {
        Err(e) => {
            pending.fail(&e.to_string());
            pending.record(conn).await;
            Err(ApiError::ApplyFailed(format!(
                "cluster '{}'; {}",
                info.cluster.name, e
            )))
        }
        Ok(_) => {
            pending.succeed();
            pending.record(conn).await;

            let status = storage::publish_status::PublishStatus {
                resource_kind: ResourceKind::Deployment.to_string(),
                resource_id: info.deployment.id,
                cluster: info.cluster.name.clone(),
                template_id: info.template.id,
                modified: epoch_milli().to_string(),
            };

            // The workload is already live at this point; a failed pointer
            // update desynchronizes future resolutions and must be surfaced
            // as its own failure class rather than silently dropped.
            storage::publish_status::upsert(conn, &status)
                .await
                .map_err(|e| {
                    ApiError::StatusDesync(format!("cluster '{}'; {}", info.cluster.name, e))
                })
        }
    }
}
