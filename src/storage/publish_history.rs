use crate::storage::{map_sqlx_error, StorageError, MAX_ROW_LIMIT};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

/// Append-only audit record of a single publish attempt, successful or not.
/// Rows are never updated or deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct PublishHistory {
    pub id: i64,
    pub resource_kind: String,
    pub resource_id: i64,
    pub resource_name: String,

    /// 0 when the publish was not template based (pure scale actions).
    pub template_id: i64,

    pub cluster: String,
    pub operated_by: String,
    pub message: String,
    pub status: String,
    pub created: String,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    history: &PublishHistory,
) -> Result<i64, StorageError> {
    let query = sqlx::query(
        "INSERT INTO publish_history (resource_kind, resource_id, resource_name, template_id, \
        cluster, operated_by, message, status, created) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);",
    )
    .bind(&history.resource_kind)
    .bind(history.resource_id)
    .bind(&history.resource_name)
    .bind(history.template_id)
    .bind(&history.cluster)
    .bind(&history.operated_by)
    .bind(&history.message)
    .bind(&history.status)
    .bind(&history.created);

    let sql = query.sql();

    query
        .execute(conn)
        .map_ok(|result| result.last_insert_rowid())
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

/// Return publish attempts for a resource, newest first; limited to 200 rows
/// in any one response.
pub async fn list(
    conn: &mut SqliteConnection,
    resource_kind: &str,
    resource_id: i64,
    limit: i64,
) -> Result<Vec<PublishHistory>, StorageError> {
    let mut limit = limit;

    if limit == 0 || limit > MAX_ROW_LIMIT {
        limit = MAX_ROW_LIMIT;
    }

    let query = sqlx::query_as::<_, PublishHistory>(
        "SELECT id, resource_kind, resource_id, resource_name, template_id, cluster, \
        operated_by, message, status, created FROM publish_history \
        WHERE resource_kind = ? AND resource_id = ? ORDER BY id DESC LIMIT ?;",
    )
    .bind(resource_kind)
    .bind(resource_id)
    .bind(limit);

    let sql = query.sql();

    query
        .fetch_all(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
