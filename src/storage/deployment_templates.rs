use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

/// One immutable version of a deployment's workload specification. A template
/// row is never updated once written; any change to the specification inserts
/// a new row. There is deliberately no update function in this module.
#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct DeploymentTemplate {
    /// 0 means the template has not been saved yet.
    pub id: i64,

    pub deployment_id: i64,

    /// The serialized workload object.
    pub template: String,

    pub description: String,
    pub created_by: String,
    pub created: String,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    template: &DeploymentTemplate,
) -> Result<i64, StorageError> {
    let query = sqlx::query(
        "INSERT INTO deployment_templates (deployment_id, template, description, created_by, created) \
        VALUES (?, ?, ?, ?, ?);",
    )
    .bind(template.deployment_id)
    .bind(&template.template)
    .bind(&template.description)
    .bind(&template.created_by)
    .bind(&template.created);

    let sql = query.sql();

    query
        .execute(conn)
        .map_ok(|result| result.last_insert_rowid())
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<DeploymentTemplate, StorageError> {
    let query = sqlx::query_as::<_, DeploymentTemplate>(
        "SELECT id, deployment_id, template, description, created_by, created \
        FROM deployment_templates WHERE id = ?;",
    )
    .bind(id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn list_by_deployment(
    conn: &mut SqliteConnection,
    deployment_id: i64,
) -> Result<Vec<DeploymentTemplate>, StorageError> {
    let query = sqlx::query_as::<_, DeploymentTemplate>(
        "SELECT id, deployment_id, template, description, created_by, created \
        FROM deployment_templates WHERE deployment_id = ? ORDER BY id DESC;",
    )
    .bind(deployment_id);

    let sql = query.sql();

    query
        .fetch_all(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
