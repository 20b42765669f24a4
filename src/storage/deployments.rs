use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, QueryBuilder, Sqlite, SqliteConnection};

/// The mutable record for a logical deployment. The immutable parts of a
/// deployment (the workload specification itself) live in
/// `deployment_templates`; this row carries what changes between publishes.
#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct Deployment {
    pub id: i64,
    pub application_id: i64,
    pub name: String,

    /// JSON object of cluster name -> desired replica count.
    pub replicas: String,

    /// The template this deployment should be running; desired state, not
    /// confirmed state (that is publish_status's job). 0 until the first
    /// upgrade.
    pub template_id: i64,

    pub created: String,
    pub modified: String,
}

#[derive(Clone, Debug, Default)]
pub struct UpdatableFields {
    pub replicas: Option<String>,
    pub template_id: Option<i64>,
    pub modified: Option<String>,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    deployment: &Deployment,
) -> Result<i64, StorageError> {
    let query = sqlx::query(
        "INSERT INTO deployments (application_id, name, replicas, template_id, created, modified) \
        VALUES (?, ?, ?, ?, ?, ?);",
    )
    .bind(deployment.application_id)
    .bind(&deployment.name)
    .bind(&deployment.replicas)
    .bind(deployment.template_id)
    .bind(&deployment.created)
    .bind(&deployment.modified);

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
) -> Result<Deployment, StorageError> {
    let query = sqlx::query_as::<_, Deployment>(
        "SELECT id, application_id, name, replicas, template_id, created, modified \
        FROM deployments WHERE name = ?;",
    )
    .bind(name);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Deployment, StorageError> {
    let query = sqlx::query_as::<_, Deployment>(
        "SELECT id, application_id, name, replicas, template_id, created, modified \
        FROM deployments WHERE id = ?;",
    )
    .bind(id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    fields: UpdatableFields,
) -> Result<(), StorageError> {
    let mut update_query: QueryBuilder<Sqlite> = QueryBuilder::new(r#"UPDATE deployments SET "#);
    let mut updated_fields_total = 0;

    if let Some(value) = &fields.replicas {
        if updated_fields_total > 0 {
            update_query.push(", ");
        }
        update_query.push("replicas = ");
        update_query.push_bind(value);
        updated_fields_total += 1;
    }

    if let Some(value) = &fields.template_id {
        if updated_fields_total > 0 {
            update_query.push(", ");
        }
        update_query.push("template_id = ");
        update_query.push_bind(value);
        updated_fields_total += 1;
    }

    if let Some(value) = &fields.modified {
        if updated_fields_total > 0 {
            update_query.push(", ");
        }
        update_query.push("modified = ");
        update_query.push_bind(value);
        updated_fields_total += 1;
    }

    // If no fields were updated, return an error
    if updated_fields_total == 0 {
        return Err(StorageError::NoFieldsUpdated);
    }

    update_query.push(" WHERE id = ");
    update_query.push_bind(id);
    update_query.push(";");

    let update_query = update_query.build();

    let sql = update_query.sql();

    update_query
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(|e| map_sqlx_error(e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::TestHarness;
    use pretty_assertions::assert_eq;

    async fn setup() -> (TestHarness, sqlx::pool::PoolConnection<sqlx::Sqlite>) {
        let harness = TestHarness::new().await;
        let mut conn = harness.conn().await.unwrap();

        let deployment = Deployment {
            id: 0,
            application_id: 1,
            name: "web".into(),
            replicas: r#"{"east-1":3}"#.into(),
            template_id: 0,
            created: "some_time".into(),
            modified: "some_time".into(),
        };

        insert(&mut conn, &deployment)
            .await
            .expect("Failed to insert deployment");

        (harness, conn)
    }

    #[tokio::test]
    async fn test_get_deployment() {
        let (_harness, mut conn) = setup().await;

        let deployment = get_by_name(&mut conn, "web")
            .await
            .expect("Failed to get deployment");

        assert_eq!(deployment.id, 1);
        assert_eq!(deployment.replicas, r#"{"east-1":3}"#);
        assert_eq!(deployment.template_id, 0);

        let by_id = get_by_id(&mut conn, deployment.id)
            .await
            .expect("Failed to get deployment by id");
        assert_eq!(by_id, deployment);
    }

    #[tokio::test]
    async fn test_update_deployment() {
        let (_harness, mut conn) = setup().await;

        let fields_to_update = UpdatableFields {
            replicas: Some(r#"{"east-1":5,"west-1":2}"#.into()),
            template_id: Some(7),
            modified: Some("some_time_mod".into()),
        };

        update(&mut conn, 1, fields_to_update)
            .await
            .expect("Failed to update deployment");

        let updated = get_by_name(&mut conn, "web")
            .await
            .expect("Failed to retrieve updated deployment");

        assert_eq!(updated.replicas, r#"{"east-1":5,"west-1":2}"#);
        assert_eq!(updated.template_id, 7);
        assert_eq!(updated.modified, "some_time_mod");
    }

    #[tokio::test]
    async fn test_update_with_no_fields_errors() {
        let (_harness, mut conn) = setup().await;

        let result = update(&mut conn, 1, UpdatableFields::default())
            .await
            .unwrap_err();
        assert_eq!(result, StorageError::NoFieldsUpdated);
    }
}
