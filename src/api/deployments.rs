//! The deployment operations exposed to the calling boundary: upgrade
//! (template reconciliation + multi-cluster publish), scale, and the
//! non-authoritative status read path.

use crate::{
    api::{
        epoch_milli, publisher, reconciler, ApiError, ApiState, ClusterError, ResourceKind,
    },
    cluster::GatewayError,
    storage,
    workload::{PodInfo, PodPhase},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDeploymentParams {
    /// Logical deployment name.
    pub deployment: String,

    /// Must be the namespace of the application owning the deployment.
    pub namespace: String,

    /// Target clusters for the fan-out.
    pub clusters: Vec<String>,

    /// 0 upgrades whatever template is live per cluster; a nonzero id pins an
    /// existing template and skips the image merge entirely.
    pub template_id: i64,

    /// When false, stop after persisting the new template versions and let
    /// the caller publish them later (possibly via `template_id`).
    pub publish: bool,

    pub description: String,

    /// Image overrides as `container=image,container=image`.
    pub images: String,

    /// Identity stamped onto new templates and history rows.
    pub operated_by: String,
}

/// A success-shaped envelope even when clusters failed: callers must inspect
/// `errors`, not just the presence of a response, to detect partial failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDeploymentResponse {
    /// Ids of the template versions minted by this call, one per group of
    /// clusters that shared a source template. Empty on the pinned-template
    /// path.
    pub template_ids: Vec<i64>,

    pub errors: Vec<ClusterError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleDeploymentParams {
    pub deployment: String,
    pub namespace: String,
    pub cluster: String,
    pub replicas: i32,
    pub description: String,
    pub operated_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub namespace: String,
    pub labels: HashMap<String, String>,
    pub desired_replicas: i32,
    pub current_replicas: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub deployment: DeploymentSummary,
    pub pods: Vec<PodInfo>,

    /// True only when the live pod count matches the desired replica count
    /// and every pod is running with an assigned address.
    pub healthz: bool,
}

impl ApiState {
    /// Reconcile image overrides (or a pinned template) onto one deployment
    /// across a set of clusters and fan out the publish.
    ///
    /// Clusters that are currently live on the same template converge to the
    /// same merged specification, so exactly one new template version is
    /// persisted per source-template group; clusters live on different
    /// templates always get independent versions even for identical
    /// overrides, because their base specs may differ.
    ///
    /// Every group member's deployment record is pointed at the new template
    /// before any publish attempt, so the record reflects intent even when a
    /// publish later fails on some clusters. Per-cluster failures never abort
    /// the batch; they are aggregated into the response. The only hard
    /// failures are validation errors raised before any per-cluster work.
    pub async fn upgrade_deployment(
        &self,
        params: UpgradeDeploymentParams,
    ) -> Result<UpgradeDeploymentResponse, ApiError> {
        let mut conn = self.storage.conn().await?;

        // Pinned-template path: publish an existing version as-is to every
        // cluster, skipping merge and grouping.
        if params.template_id != 0 && params.publish {
            let mut errors = vec![];

            for cluster in &params.clusters {
                let info = match reconciler::resolve_online_deployment(
                    &mut conn,
                    &params.deployment,
                    &params.namespace,
                    cluster,
                    params.template_id,
                )
                .await
                {
                    Ok(info) => info,
                    Err(e) => {
                        error!(cluster = %cluster, error = %e, "could not resolve online deployment");
                        errors.push(ClusterError::new(cluster, &e));
                        continue;
                    }
                };

                if let Err(e) = publisher::publish_deployment(
                    self.gateway.as_ref(),
                    &mut conn,
                    &info,
                    &params.operated_by,
                )
                .await
                {
                    error!(cluster = %cluster, error = %e, "could not publish deployment");
                    errors.push(ClusterError::new(cluster, &e));
                }
            }

            return Ok(UpgradeDeploymentResponse {
                template_ids: vec![],
                errors,
            });
        }

        let image_map = reconciler::parse_image_overrides(&params.images)?;

        // Phase 1: resolve and merge per cluster, grouping by the
        // pre-mutation template id.
        let mut errors: Vec<ClusterError> = vec![];
        let mut groups: BTreeMap<i64, Vec<reconciler::DeploymentInfo>> = BTreeMap::new();

        for cluster in &params.clusters {
            match reconciler::resolve_online_deployment(
                &mut conn,
                &params.deployment,
                &params.namespace,
                cluster,
                0,
            )
            .await
            {
                Ok(mut info) => {
                    match reconciler::merge_images(&mut info.workload, &image_map) {
                        Ok(()) => groups.entry(info.template.id).or_default().push(info),
                        Err(e) => errors.push(ClusterError::new(cluster, &e)),
                    }
                }
                Err(e) => {
                    error!(cluster = %cluster, error = %e, "could not resolve online deployment");
                    errors.push(ClusterError::new(cluster, &e));
                }
            }
        }

        // Any failure detected before grouping aborts before any write.
        if !errors.is_empty() {
            return Ok(UpgradeDeploymentResponse {
                template_ids: vec![],
                errors,
            });
        }

        // Phase 2: persist exactly one new template per group and point every
        // member's record at it.
        let mut template_ids = vec![];
        let mut prepared: Vec<Vec<reconciler::DeploymentInfo>> = vec![];
        let description = format!("[api] {}", params.description);

        for (source_template_id, mut members) in groups {
            let spec = match serde_json::to_string(&members[0].workload) {
                Ok(spec) => spec,
                Err(e) => {
                    let e = ApiError::Malformed(format!("could not serialize workload; {}", e));
                    for member in &members {
                        errors.push(ClusterError::new(&member.cluster.name, &e));
                    }
                    continue;
                }
            };

            let new_template = storage::deployment_templates::DeploymentTemplate {
                id: 0,
                deployment_id: members[0].deployment.id,
                template: spec,
                description: description.clone(),
                created_by: params.operated_by.clone(),
                created: epoch_milli().to_string(),
            };

            let new_id =
                match storage::deployment_templates::insert(&mut conn, &new_template).await {
                    Ok(id) => id,
                    Err(e) => {
                        error!(error = %e, "could not save new deployment template");
                        let e = ApiError::from(e);
                        for member in &members {
                            errors.push(ClusterError::new(&member.cluster.name, &e));
                        }
                        continue;
                    }
                };
            template_ids.push(new_id);
            debug!(
                source_template_id,
                new_template_id = new_id,
                members = members.len(),
                "minted new deployment template for cluster group"
            );

            let mut published_members = vec![];
            for mut info in members.drain(..) {
                let update = storage::deployments::UpdatableFields {
                    template_id: Some(new_id),
                    modified: Some(epoch_milli().to_string()),
                    ..Default::default()
                };

                if let Err(e) =
                    storage::deployments::update(&mut conn, info.deployment.id, update).await
                {
                    error!(cluster = %info.cluster.name, error = %e, "could not update deployment record");
                    errors.push(ClusterError::new(&info.cluster.name, &ApiError::from(e)));
                    continue;
                }

                info.template.id = new_id;
                info.template.description = description.clone();
                published_members.push(info);
            }

            prepared.push(published_members);
        }

        if !params.publish || !errors.is_empty() {
            return Ok(UpgradeDeploymentResponse {
                template_ids,
                errors,
            });
        }

        // Phase 3: fan out. Failures are per-cluster and never fatal to the
        // rest of the batch.
        for members in &prepared {
            for info in members {
                if let Err(e) = publisher::publish_deployment(
                    self.gateway.as_ref(),
                    &mut conn,
                    info,
                    &params.operated_by,
                )
                .await
                {
                    error!(cluster = %info.cluster.name, error = %e, "could not publish deployment");
                    errors.push(ClusterError::new(&info.cluster.name, &e));
                }
            }
        }

        Ok(UpgradeDeploymentResponse {
            template_ids,
            errors,
        })
    }

    /// Change the replica count of one deployment on one cluster without
    /// touching the template. The cluster is authoritative for the current
    /// object here, so the live workload is read back directly rather than
    /// resolved from storage; no template versioning occurs and the history
    /// row carries template id 0.
    pub async fn scale_deployment(&self, params: ScaleDeploymentParams) -> Result<(), ApiError> {
        if params.replicas <= 0 || params.replicas > 32 {
            return Err(ApiError::InvalidArgument(format!(
                "replicas {} not in range (0,32]",
                params.replicas
            )));
        }
        if params.deployment.is_empty() {
            return Err(ApiError::InvalidArgument(
                "deployment name must not be empty".into(),
            ));
        }
        if params.namespace.is_empty() {
            return Err(ApiError::InvalidArgument(
                "namespace must not be empty".into(),
            ));
        }
        if params.cluster.is_empty() {
            return Err(ApiError::InvalidArgument(
                "cluster must not be empty".into(),
            ));
        }

        let mut conn = self.storage.conn().await?;

        let namespace = storage::namespaces::get_by_name(&mut conn, &params.namespace)
            .await
            .map_err(|e| match e {
                storage::StorageError::NotFound => {
                    ApiError::NotFound(format!("namespace '{}'", params.namespace))
                }
                _ => e.into(),
            })?;

        let deployment = storage::deployments::get_by_name(&mut conn, &params.deployment)
            .await
            .map_err(|e| match e {
                storage::StorageError::NotFound => {
                    ApiError::NotFound(format!("deployment '{}'", params.deployment))
                }
                _ => e.into(),
            })?;

        // Fail on a corrupt replica map before contacting the cluster.
        let mut replica_map = reconciler::parse_replica_map(&deployment)?;

        let handle = self.gateway.resolve(&params.cluster).await.map_err(|e| {
            ApiError::Unavailable(format!("cluster '{}'; {}", params.cluster, e))
        })?;

        let mut workload = handle
            .get_workload(&params.deployment, &namespace.kube_namespace)
            .await
            .map_err(|e| match e {
                GatewayError::NoSuchWorkload(msg) => ApiError::NotFound(format!("workload {}", msg)),
                _ => ApiError::Unavailable(format!("cluster '{}'; {}", params.cluster, e)),
            })?;

        let current_replicas = workload.spec.replicas.unwrap_or(0);
        let message = format!(
            "[api][original replicas: {}][target replicas: {}] {}",
            current_replicas, params.replicas, params.description
        );

        let mut pending = publisher::PendingHistory::new(
            ResourceKind::Deployment,
            deployment.id,
            &workload.metadata.name,
            0,
            &params.cluster,
            &params.operated_by,
            &message,
        );

        workload.spec.replicas = Some(params.replicas);

        match handle.apply_workload(&workload).await {
            Err(e) => {
                pending.fail(&e.to_string());
                pending.record(&mut conn).await;
                Err(ApiError::ApplyFailed(format!(
                    "cluster '{}'; {}",
                    params.cluster, e
                )))
            }
            Ok(_) => {
                pending.succeed();
                pending.record(&mut conn).await;

                replica_map.insert(params.cluster.clone(), params.replicas);
                let replicas = serde_json::to_string(&replica_map).map_err(|e| {
                    ApiError::Malformed(format!("could not serialize replica map; {}", e))
                })?;

                storage::deployments::update(
                    &mut conn,
                    deployment.id,
                    storage::deployments::UpdatableFields {
                        replicas: Some(replicas),
                        modified: Some(epoch_milli().to_string()),
                        ..Default::default()
                    },
                )
                .await?;

                Ok(())
            }
        }
    }

    /// Report the live state of a deployment on one cluster: the workload
    /// object, its pods, and a single healthz bit. This is a read-only,
    /// non-authoritative path; nothing here consults or updates
    /// publish_status.
    pub async fn get_deployment_status(
        &self,
        deployment: &str,
        namespace: &str,
        cluster: &str,
    ) -> Result<DeploymentStatus, ApiError> {
        if deployment.is_empty() || namespace.is_empty() || cluster.is_empty() {
            return Err(ApiError::InvalidArgument(
                "deployment, namespace, and cluster must not be empty".into(),
            ));
        }

        let mut conn = self.storage.conn().await?;

        let namespace = storage::namespaces::get_by_name(&mut conn, namespace)
            .await
            .map_err(|e| match e {
                storage::StorageError::NotFound => {
                    ApiError::NotFound(format!("namespace '{}'", namespace))
                }
                _ => e.into(),
            })?;

        let handle = self
            .gateway
            .resolve(cluster)
            .await
            .map_err(|e| ApiError::Unavailable(format!("cluster '{}'; {}", cluster, e)))?;

        let workload = handle
            .get_workload(deployment, &namespace.kube_namespace)
            .await
            .map_err(|e| match e {
                GatewayError::NoSuchWorkload(msg) => ApiError::NotFound(format!("workload {}", msg)),
                _ => ApiError::Unavailable(format!("cluster '{}'; {}", cluster, e)),
            })?;

        let pods = handle
            .list_pods(&namespace.kube_namespace, deployment)
            .await
            .map_err(|e| ApiError::Unavailable(format!("cluster '{}'; {}", cluster, e)))?;

        let desired_replicas = workload.spec.replicas.unwrap_or(0);

        let mut healthz = pods.len() as i32 == desired_replicas;
        for pod in &pods {
            if pod.pod_ip.is_empty() || pod.phase != PodPhase::Running {
                healthz = false;
            }
        }

        Ok(DeploymentStatus {
            deployment: DeploymentSummary {
                name: workload.metadata.name.clone(),
                namespace: workload.metadata.namespace.clone(),
                labels: workload.metadata.labels.clone(),
                desired_replicas,
                current_replicas: pods.len() as i32,
            },
            pods,
            healthz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{seed_world, TestWorld, WEB_TEMPLATE};
    use crate::workload::Workload;
    use pretty_assertions::assert_eq;

    fn upgrade_params(clusters: &[&str], images: &str) -> UpgradeDeploymentParams {
        UpgradeDeploymentParams {
            deployment: "web".into(),
            namespace: "payments".into(),
            clusters: clusters.iter().map(|c| c.to_string()).collect(),
            template_id: 0,
            publish: true,
            description: "bump app".into(),
            images: images.into(),
            operated_by: "ci".into(),
        }
    }

    fn live_web_workload(replicas: i32) -> Workload {
        let mut workload: Workload = serde_json::from_str(WEB_TEMPLATE).unwrap();
        workload.metadata.namespace = "payments-prod".into();
        workload.spec.replicas = Some(replicas);
        workload
    }

    fn running_pod(name: &str, pod_ip: &str) -> PodInfo {
        PodInfo {
            name: name.into(),
            namespace: "payments-prod".into(),
            phase: PodPhase::Running,
            pod_ip: pod_ip.into(),
            node_name: "node-1".into(),
            ..Default::default()
        }
    }

    async fn template_count(world: &TestWorld) -> usize {
        let mut conn = world.harness.conn().await.unwrap();
        storage::deployment_templates::list_by_deployment(&mut conn, world.deployment_id)
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn upgrade_groups_clusters_sharing_a_source_template() {
        let world = seed_world().await;

        let resp = world
            .state
            .upgrade_deployment(upgrade_params(&["east-1", "west-1"], "app=app:v2"))
            .await
            .unwrap();

        assert_eq!(resp.errors, vec![]);
        assert_eq!(resp.template_ids.len(), 1);
        let new_id = resp.template_ids[0];
        assert_eq!(new_id, world.template_id + 1);

        let mut conn = world.harness.conn().await.unwrap();

        // One new immutable version with the merged images.
        let template = storage::deployment_templates::get_by_id(&mut conn, new_id)
            .await
            .unwrap();
        let workload: Workload = serde_json::from_str(&template.template).unwrap();
        assert_eq!(workload.containers()[0].image, "app:v2");
        assert_eq!(workload.containers()[1].image, "sidecar:v2");
        assert_eq!(template.description, "[api] bump app");
        assert_eq!(template.created_by, "ci");

        // The record points at the new version.
        let deployment = storage::deployments::get_by_id(&mut conn, world.deployment_id)
            .await
            .unwrap();
        assert_eq!(deployment.template_id, new_id);

        // Both clusters confirmed live on the new version.
        for cluster in ["east-1", "west-1"] {
            let status =
                storage::publish_status::get(&mut conn, "deployment", world.deployment_id, cluster)
                    .await
                    .unwrap();
            assert_eq!(status.template_id, new_id);
        }

        // Two publish attempts, both recorded as successes.
        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|row| row.status == "success"));
        assert!(history.iter().all(|row| row.template_id == new_id));

        // The applied objects carry the merged image and the record replicas.
        for cluster in [&world.east, &world.west] {
            let stored = cluster.stored_workload("web", "payments-prod").unwrap();
            assert_eq!(stored.containers()[0].image, "app:v2");
            assert_eq!(stored.spec.replicas, Some(3));
        }
    }

    #[tokio::test]
    async fn upgrade_diverged_sources_get_independent_templates() {
        let world = seed_world().await;
        let mut conn = world.harness.conn().await.unwrap();

        // Put west-1 on its own template version first.
        let west_template = storage::deployment_templates::DeploymentTemplate {
            id: 0,
            deployment_id: world.deployment_id,
            template: WEB_TEMPLATE.into(),
            description: "west canary".into(),
            created_by: "ci".into(),
            created: "some_time".into(),
        };
        let west_template_id = storage::deployment_templates::insert(&mut conn, &west_template)
            .await
            .unwrap();
        storage::publish_status::upsert(
            &mut conn,
            &storage::publish_status::PublishStatus {
                resource_kind: "deployment".into(),
                resource_id: world.deployment_id,
                cluster: "west-1".into(),
                template_id: west_template_id,
                modified: "some_time".into(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let resp = world
            .state
            .upgrade_deployment(upgrade_params(&["east-1", "west-1"], "app=app:v2"))
            .await
            .unwrap();

        assert_eq!(resp.errors, vec![]);
        // Identical overrides, but different source templates: two new rows.
        assert_eq!(resp.template_ids.len(), 2);
        assert_ne!(resp.template_ids[0], resp.template_ids[1]);
    }

    #[tokio::test]
    async fn upgrade_unknown_container_rejects_without_writes() {
        let world = seed_world().await;

        let resp = world
            .state
            .upgrade_deployment(upgrade_params(&["east-1", "west-1"], "ghost=ghost:v2"))
            .await
            .unwrap();

        assert_eq!(resp.template_ids, Vec::<i64>::new());
        assert_eq!(resp.errors.len(), 2);
        assert!(resp.errors[0].error.contains("container"));

        // No new template, no history, no cluster contact.
        assert_eq!(template_count(&world).await, 1);
        let mut conn = world.harness.conn().await.unwrap();
        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert!(history.is_empty());
        assert!(world.east.stored_workload("web", "payments-prod").is_none());
    }

    #[tokio::test]
    async fn upgrade_with_unparsable_images_is_a_hard_failure() {
        let world = seed_world().await;

        let err = world
            .state
            .upgrade_deployment(upgrade_params(&["east-1"], ""))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidArgument(_)), "{:?}", err);
        assert_eq!(template_count(&world).await, 1);
    }

    #[tokio::test]
    async fn upgrade_without_publish_persists_template_only() {
        let world = seed_world().await;

        let mut params = upgrade_params(&["east-1", "west-1"], "app=app:v2");
        params.publish = false;

        let resp = world.state.upgrade_deployment(params).await.unwrap();

        assert_eq!(resp.errors, vec![]);
        assert_eq!(resp.template_ids.len(), 1);
        let new_id = resp.template_ids[0];

        let mut conn = world.harness.conn().await.unwrap();

        // Record moved (desired state), status did not (confirmed state),
        // nothing was applied, no attempt recorded.
        let deployment = storage::deployments::get_by_id(&mut conn, world.deployment_id)
            .await
            .unwrap();
        assert_eq!(deployment.template_id, new_id);

        let status =
            storage::publish_status::get(&mut conn, "deployment", world.deployment_id, "east-1")
                .await
                .unwrap();
        assert_eq!(status.template_id, world.template_id);

        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert!(history.is_empty());
        assert!(world.east.stored_workload("web", "payments-prod").is_none());
    }

    #[tokio::test]
    async fn partial_publish_failure_diverges_record_and_status() {
        let world = seed_world().await;

        world.west.fail_next_apply();

        let resp = world
            .state
            .upgrade_deployment(upgrade_params(&["east-1", "west-1"], "app=app:v2"))
            .await
            .unwrap();

        assert_eq!(resp.template_ids.len(), 1);
        let new_id = resp.template_ids[0];
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(resp.errors[0].cluster, "west-1");

        let mut conn = world.harness.conn().await.unwrap();

        // Desired state: the record points at the new template for both
        // clusters, because the write-through happened before publish.
        let deployment = storage::deployments::get_by_id(&mut conn, world.deployment_id)
            .await
            .unwrap();
        assert_eq!(deployment.template_id, new_id);

        // Confirmed state: east moved, west still shows the old template.
        let east_status =
            storage::publish_status::get(&mut conn, "deployment", world.deployment_id, "east-1")
                .await
                .unwrap();
        assert_eq!(east_status.template_id, new_id);

        let west_status =
            storage::publish_status::get(&mut conn, "deployment", world.deployment_id, "west-1")
                .await
                .unwrap();
        assert_eq!(west_status.template_id, world.template_id);

        // Both attempts were recorded, one per outcome.
        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert_eq!(history.len(), 2);
        let successes = history.iter().filter(|row| row.status == "success").count();
        let failures = history.iter().filter(|row| row.status == "failure").count();
        assert_eq!((successes, failures), (1, 1));
    }

    #[tokio::test]
    async fn upgrade_with_pinned_template_publishes_without_minting() {
        let world = seed_world().await;

        let mut params = upgrade_params(&["east-1", "west-1"], "");
        params.template_id = world.template_id;

        let resp = world.state.upgrade_deployment(params).await.unwrap();

        assert_eq!(resp.errors, vec![]);
        assert_eq!(resp.template_ids, Vec::<i64>::new());
        assert_eq!(template_count(&world).await, 1);

        let mut conn = world.harness.conn().await.unwrap();
        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|row| row.status == "success"));
        assert!(world.east.stored_workload("web", "payments-prod").is_some());
        assert!(world.west.stored_workload("web", "payments-prod").is_some());
    }

    #[tokio::test]
    async fn upgrade_with_foreign_template_id_is_denied_per_cluster() {
        let world = seed_world().await;
        let mut conn = world.harness.conn().await.unwrap();

        let foreign = storage::deployment_templates::DeploymentTemplate {
            id: 0,
            deployment_id: world.deployment_id + 100,
            template: WEB_TEMPLATE.into(),
            description: "someone else's".into(),
            created_by: "ci".into(),
            created: "some_time".into(),
        };
        let foreign_id = storage::deployment_templates::insert(&mut conn, &foreign)
            .await
            .unwrap();
        drop(conn);

        let mut params = upgrade_params(&["east-1", "west-1"], "");
        params.template_id = foreign_id;

        let resp = world.state.upgrade_deployment(params).await.unwrap();

        assert_eq!(resp.errors.len(), 2);
        assert!(resp.errors[0].error.contains("permission denied"));
        assert!(world.east.stored_workload("web", "payments-prod").is_none());
    }

    #[tokio::test]
    async fn scale_rejects_out_of_range_replicas_before_cluster_contact() {
        let world = seed_world().await;

        for replicas in [0, -1, 33] {
            let err = world
                .state
                .scale_deployment(ScaleDeploymentParams {
                    deployment: "web".into(),
                    namespace: "payments".into(),
                    cluster: "east-1".into(),
                    replicas,
                    description: "".into(),
                    operated_by: "ci".into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)), "{:?}", err);
        }

        let mut conn = world.harness.conn().await.unwrap();
        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn scale_applies_and_updates_the_replica_map() {
        let world = seed_world().await;
        world.east.seed_workload(live_web_workload(3));

        world
            .state
            .scale_deployment(ScaleDeploymentParams {
                deployment: "web".into(),
                namespace: "payments".into(),
                cluster: "east-1".into(),
                replicas: 5,
                description: "traffic spike".into(),
                operated_by: "ci".into(),
            })
            .await
            .unwrap();

        let stored = world.east.stored_workload("web", "payments-prod").unwrap();
        assert_eq!(stored.spec.replicas, Some(5));

        let mut conn = world.harness.conn().await.unwrap();

        let deployment = storage::deployments::get_by_id(&mut conn, world.deployment_id)
            .await
            .unwrap();
        let replica_map: HashMap<String, i32> =
            serde_json::from_str(&deployment.replicas).unwrap();
        assert_eq!(replica_map["east-1"], 5);
        assert_eq!(replica_map["west-1"], 3);

        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "success");
        assert_eq!(history[0].template_id, 0);
        assert!(history[0].message.contains("original replicas: 3"));
        assert!(history[0].message.contains("target replicas: 5"));
    }

    #[tokio::test]
    async fn scale_apply_failure_records_history_and_keeps_the_map() {
        let world = seed_world().await;
        world.east.seed_workload(live_web_workload(3));
        world.east.fail_next_apply();

        let err = world
            .state
            .scale_deployment(ScaleDeploymentParams {
                deployment: "web".into(),
                namespace: "payments".into(),
                cluster: "east-1".into(),
                replicas: 5,
                description: "traffic spike".into(),
                operated_by: "ci".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ApplyFailed(_)), "{:?}", err);

        let mut conn = world.harness.conn().await.unwrap();

        let deployment = storage::deployments::get_by_id(&mut conn, world.deployment_id)
            .await
            .unwrap();
        let replica_map: HashMap<String, i32> =
            serde_json::from_str(&deployment.replicas).unwrap();
        assert_eq!(replica_map["east-1"], 3);

        let history =
            storage::publish_history::list(&mut conn, "deployment", world.deployment_id, 0)
                .await
                .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "failure");
        assert_eq!(history[0].template_id, 0);
    }

    #[tokio::test]
    async fn status_is_healthy_when_pods_match_desired() {
        let world = seed_world().await;
        world.east.seed_workload(live_web_workload(2));
        world.east.seed_pods(
            "web",
            vec![
                running_pod("web-1", "10.0.0.1"),
                running_pod("web-2", "10.0.0.2"),
            ],
        );

        let status = world
            .state
            .get_deployment_status("web", "payments", "east-1")
            .await
            .unwrap();

        assert!(status.healthz);
        assert_eq!(status.pods.len(), 2);
        assert_eq!(status.deployment.name, "web");
        assert_eq!(status.deployment.namespace, "payments-prod");
        assert_eq!(status.deployment.desired_replicas, 2);
        assert_eq!(status.deployment.current_replicas, 2);
    }

    #[tokio::test]
    async fn status_is_unhealthy_on_count_mismatch_or_bad_pods() {
        let world = seed_world().await;
        world.east.seed_workload(live_web_workload(2));

        // Fewer pods than desired.
        world
            .east
            .seed_pods("web", vec![running_pod("web-1", "10.0.0.1")]);
        let status = world
            .state
            .get_deployment_status("web", "payments", "east-1")
            .await
            .unwrap();
        assert!(!status.healthz);

        // Right count, but one pod has no address.
        world.east.seed_pods(
            "web",
            vec![running_pod("web-1", "10.0.0.1"), running_pod("web-2", "")],
        );
        let status = world
            .state
            .get_deployment_status("web", "payments", "east-1")
            .await
            .unwrap();
        assert!(!status.healthz);

        // Right count, but one pod is still pending.
        let mut pending = running_pod("web-2", "10.0.0.2");
        pending.phase = PodPhase::Pending;
        world
            .east
            .seed_pods("web", vec![running_pod("web-1", "10.0.0.1"), pending]);
        let status = world
            .state
            .get_deployment_status("web", "payments", "east-1")
            .await
            .unwrap();
        assert!(!status.healthz);
    }

    #[tokio::test]
    async fn status_for_unknown_cluster_is_unavailable() {
        let world = seed_world().await;

        let err = world
            .state
            .get_deployment_status("web", "payments", "not-registered")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unavailable(_)), "{:?}", err);
    }
}
