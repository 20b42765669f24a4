use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct Application {
    pub id: i64,
    pub name: String,

    /// Every application lives inside exactly one namespace; deployments
    /// inherit it.
    pub namespace_id: i64,

    pub created: String,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    application: &Application,
) -> Result<i64, StorageError> {
    let query =
        sqlx::query("INSERT INTO applications (name, namespace_id, created) VALUES (?, ?, ?);")
            .bind(&application.name)
            .bind(application.namespace_id)
            .bind(&application.created);

    let sql = query.sql();

    query
        .execute(conn)
        .map_ok(|result| result.last_insert_rowid())
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Application, StorageError> {
    let query = sqlx::query_as::<_, Application>(
        "SELECT id, name, namespace_id, created FROM applications WHERE id = ?;",
    )
    .bind(id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
