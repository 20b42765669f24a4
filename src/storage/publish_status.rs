use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

/// The single source of truth for which template is confirmed live on a
/// cluster. Written by the publisher only after a successful apply; never
/// derived by querying the cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct PublishStatus {
    pub resource_kind: String,
    pub resource_id: i64,
    pub cluster: String,
    pub template_id: i64,
    pub modified: String,
}

pub async fn upsert(
    conn: &mut SqliteConnection,
    status: &PublishStatus,
) -> Result<(), StorageError> {
    let query = sqlx::query(
        "INSERT INTO publish_status (resource_kind, resource_id, cluster, template_id, modified) \
        VALUES (?, ?, ?, ?, ?) \
        ON CONFLICT (resource_kind, resource_id, cluster) \
        DO UPDATE SET template_id = excluded.template_id, modified = excluded.modified;",
    )
    .bind(&status.resource_kind)
    .bind(status.resource_id)
    .bind(&status.cluster)
    .bind(status.template_id)
    .bind(&status.modified);

    let sql = query.sql();

    query
        .execute(conn)
        .map_ok(|_| ())
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get(
    conn: &mut SqliteConnection,
    resource_kind: &str,
    resource_id: i64,
    cluster: &str,
) -> Result<PublishStatus, StorageError> {
    let query = sqlx::query_as::<_, PublishStatus>(
        "SELECT resource_kind, resource_id, cluster, template_id, modified \
        FROM publish_status WHERE resource_kind = ? AND resource_id = ? AND cluster = ?;",
    )
    .bind(resource_kind)
    .bind(resource_id)
    .bind(cluster);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
