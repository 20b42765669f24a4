//! Resolves the authoritative "online" state for a (deployment, cluster) pair
//! and merges caller-supplied image overrides onto it.

use crate::{
    api::{ApiError, ResourceKind},
    storage,
    workload::Workload,
};
use sqlx::SqliteConnection;
use std::collections::HashMap;

/// The per-cluster working set for one reconciliation: every record needed to
/// rebuild, mutate, and publish the workload. Built fresh per call and handed
/// by value to the publisher.
#[derive(Debug, Clone)]
pub struct DeploymentInfo {
    pub deployment: storage::deployments::Deployment,
    pub template: storage::deployment_templates::DeploymentTemplate,
    pub workload: Workload,
    pub cluster: storage::clusters::Cluster,
    pub namespace: storage::namespaces::Namespace,
}

/// Produce a fully populated [`DeploymentInfo`] reflecting what is currently
/// authoritative for the given cluster.
///
/// With `template_id` == 0 the template currently live on the cluster (per
/// publish_status) is used; a nonzero id selects that template explicitly,
/// provided it belongs to the named deployment. The stored template is
/// namespace-agnostic and carries no authoritative replica count, so both are
/// injected here on every resolution: the namespace from the owning
/// application, the replica count from the deployment record's per-cluster
/// map.
pub async fn resolve_online_deployment(
    conn: &mut SqliteConnection,
    deployment_name: &str,
    namespace_name: &str,
    cluster_name: &str,
    template_id: i64,
) -> Result<DeploymentInfo, ApiError> {
    if deployment_name.is_empty() {
        return Err(ApiError::InvalidArgument(
            "deployment name must not be empty".into(),
        ));
    }
    if namespace_name.is_empty() {
        return Err(ApiError::InvalidArgument(
            "namespace must not be empty".into(),
        ));
    }
    if cluster_name.is_empty() {
        return Err(ApiError::InvalidArgument(
            "cluster must not be empty".into(),
        ));
    }

    let deployment = storage::deployments::get_by_name(conn, deployment_name)
        .await
        .map_err(|e| match e {
            storage::StorageError::NotFound => {
                ApiError::NotFound(format!("deployment '{}'", deployment_name))
            }
            _ => e.into(),
        })?;

    let template = if template_id != 0 {
        let template = storage::deployment_templates::get_by_id(conn, template_id)
            .await
            .map_err(|e| match e {
                storage::StorageError::NotFound => {
                    ApiError::NotFound(format!("deployment template '{}'", template_id))
                }
                _ => e.into(),
            })?;

        // Explicit template ids cannot reach across deployments.
        if template.deployment_id != deployment.id {
            return Err(ApiError::PermissionDenied(format!(
                "template '{}' does not belong to deployment '{}'",
                template_id, deployment_name
            )));
        }

        template
    } else {
        let status = storage::publish_status::get(
            conn,
            &ResourceKind::Deployment.to_string(),
            deployment.id,
            cluster_name,
        )
        .await
        .map_err(|e| match e {
            storage::StorageError::NotFound => ApiError::NotFound(format!(
                "publish status for deployment '{}' on cluster '{}'",
                deployment_name, cluster_name
            )),
            _ => e.into(),
        })?;

        storage::deployment_templates::get_by_id(conn, status.template_id)
            .await
            .map_err(|e| match e {
                storage::StorageError::NotFound => ApiError::Malformed(format!(
                    "publish status references missing template '{}'",
                    status.template_id
                )),
                _ => e.into(),
            })?
    };

    let mut workload: Workload = serde_json::from_str(&template.template).map_err(|e| {
        ApiError::Malformed(format!(
            "deployment template '{}' failed to parse; {}",
            template.id, e
        ))
    })?;

    let application = storage::applications::get_by_id(conn, deployment.application_id)
        .await
        .map_err(|e| match e {
            storage::StorageError::NotFound => ApiError::Malformed(format!(
                "deployment '{}' references missing application '{}'",
                deployment_name, deployment.application_id
            )),
            _ => e.into(),
        })?;

    let namespace = storage::namespaces::get_by_id(conn, application.namespace_id)
        .await
        .map_err(|e| match e {
            storage::StorageError::NotFound => ApiError::Malformed(format!(
                "application '{}' references missing namespace '{}'",
                application.name, application.namespace_id
            )),
            _ => e.into(),
        })?;

    // The namespace is not a free parameter; it must agree with the
    // application that owns the deployment.
    if namespace.name != namespace_name {
        return Err(ApiError::InvalidArgument(format!(
            "namespace '{}' is not the namespace of deployment '{}'",
            namespace_name, deployment_name
        )));
    }
    workload.metadata.namespace = namespace.kube_namespace.clone();

    let replicas = parse_replica_map(&deployment)?;
    workload.spec.replicas = Some(replicas.get(cluster_name).copied().unwrap_or(0));

    let cluster = storage::clusters::get_by_name(conn, cluster_name)
        .await
        .map_err(|e| match e {
            storage::StorageError::NotFound => {
                ApiError::NotFound(format!("cluster '{}'", cluster_name))
            }
            _ => e.into(),
        })?;

    Ok(DeploymentInfo {
        deployment,
        template,
        workload,
        cluster,
        namespace,
    })
}

/// Deserialize the deployment record's per-cluster desired replica map.
pub fn parse_replica_map(
    deployment: &storage::deployments::Deployment,
) -> Result<HashMap<String, i32>, ApiError> {
    serde_json::from_str(&deployment.replicas).map_err(|e| {
        ApiError::Malformed(format!(
            "replica map for deployment '{}' failed to parse; {}",
            deployment.name, e
        ))
    })
}

/// Parse the `container=image,container=image` override string. Pairs that do
/// not contain exactly one `=` or have an empty side are skipped; zero usable
/// pairs is a hard validation failure.
pub fn parse_image_overrides(images: &str) -> Result<HashMap<String, String>, ApiError> {
    let mut image_map = HashMap::new();

    for pair in images.split(',') {
        if let Some((name, image)) = pair.split_once('=') {
            if !name.is_empty() && !image.is_empty() && !image.contains('=') {
                image_map.insert(name.to_string(), image.to_string());
            }
        }
    }

    if image_map.is_empty() {
        return Err(ApiError::InvalidArgument(format!(
            "images parameter '{}' contains no usable container=image pairs",
            images
        )));
    }

    Ok(image_map)
}

/// Apply the override map to the workload's containers. Matched keys are
/// consumed from a working copy; any key left over names a container absent
/// from the template and rejects this cluster's update.
pub fn merge_images(
    workload: &mut Workload,
    image_map: &HashMap<String, String>,
) -> Result<(), ApiError> {
    let mut unmatched = image_map.clone();

    for container in workload.containers_mut() {
        if let Some(image) = unmatched.remove(&container.name) {
            container.image = image;
        }
    }

    if !unmatched.is_empty() {
        let mut missing: Vec<String> = unmatched.into_keys().collect();
        missing.sort();
        return Err(ApiError::UnknownContainer(missing.join(",")));
    }

    Ok(())
}
