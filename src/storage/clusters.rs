use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct Cluster {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created: String,
}

pub async fn insert(conn: &mut SqliteConnection, cluster: &Cluster) -> Result<i64, StorageError> {
    let query = sqlx::query("INSERT INTO clusters (name, description, created) VALUES (?, ?, ?);")
        .bind(&cluster.name)
        .bind(&cluster.description)
        .bind(&cluster.created);

    let sql = query.sql();

    query
        .execute(conn)
        .map_ok(|result| result.last_insert_rowid())
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Cluster, StorageError> {
    let query = sqlx::query_as::<_, Cluster>(
        "SELECT id, name, description, created FROM clusters WHERE name = ?;",
    )
    .bind(name);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
