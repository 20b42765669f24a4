use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct Namespace {
    pub id: i64,

    /// Logical name callers address the namespace by.
    pub name: String,

    /// The actual Kubernetes namespace injected into workloads at resolution
    /// time.
    pub kube_namespace: String,

    pub created: String,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    namespace: &Namespace,
) -> Result<i64, StorageError> {
    let query = sqlx::query(
        "INSERT INTO namespaces (name, kube_namespace, created) VALUES (?, ?, ?);",
    )
    .bind(&namespace.name)
    .bind(&namespace.kube_namespace)
    .bind(&namespace.created);

    let sql = query.sql();

    query
        .execute(conn)
        .map_ok(|result| result.last_insert_rowid())
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Namespace, StorageError> {
    let query = sqlx::query_as::<_, Namespace>(
        "SELECT id, name, kube_namespace, created FROM namespaces WHERE name = ?;",
    )
    .bind(name);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Namespace, StorageError> {
    let query = sqlx::query_as::<_, Namespace>(
        "SELECT id, name, kube_namespace, created FROM namespaces WHERE id = ?;",
    )
    .bind(id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
