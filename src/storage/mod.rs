pub mod applications;
pub mod clusters;
pub mod deployment_templates;
pub mod deployments;
pub mod namespaces;
pub mod publish_history;
pub mod publish_status;


use sqlx::{migrate, pool::PoolConnection, Pool, Sqlite, SqlitePool};
use std::ops::Deref;
use std::{fs::File, io, path::Path};

/// The maximum amount of rows that can be returned by any single query.
const MAX_ROW_LIMIT: i64 = 200;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error("could not establish connection to database; {0}")]
    Connection(String),

    #[error("requested entity not found")]
    NotFound,

    #[error("entity already exists")]
    Exists,

    #[error("did not attempt to update any fields")]
    NoFieldsUpdated,

    #[error("unexpected storage error occurred; code: {code:?}; message: {message}; query: {query}")]
    GenericDBError {
        code: Option<String>,
        message: String,
        query: String,
    },
}

#[derive(Debug)]
pub enum SqliteErrors {
    Constraint,
}

/// Sqlite Errors are determined by database error code. We map these to the specific code so that
/// when we come back with a database error we can detect which one happened.
/// See the codes here: https://www.sqlite.org/rescode.html
impl SqliteErrors {
    fn value(&self) -> String {
        match *self {
            SqliteErrors::Constraint => "1555".to_string(),
        }
    }
}

fn map_sqlx_error(e: sqlx::Error, query: &str) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(database_err) => {
            if let Some(err_code) = database_err.code() {
                if err_code.deref() == SqliteErrors::Constraint.value() {
                    return StorageError::Exists;
                }
            }

            StorageError::GenericDBError {
                code: database_err.code().map(|code| code.to_string()),
                message: database_err.message().to_string(),
                query: query.into(),
            }
        }
        _ => StorageError::GenericDBError {
            code: None,
            message: e.to_string(),
            query: query.into(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

// Create file if not exists.
fn touch_file(path: &Path) -> io::Result<()> {
    if !path.exists() {
        File::create(path)?;
    }

    Ok(())
}

impl Db {
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        touch_file(Path::new(path)).map_err(|e| StorageError::Connection(format!("{:?}", e)))?;

        let connection_pool = SqlitePool::connect(&format!("file:{}", path))
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))?;

        migrate!("src/storage/migrations")
            .run(&connection_pool)
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))?;

        Ok(Db {
            pool: connection_pool,
        })
    }

    pub async fn conn(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))
    }
}
