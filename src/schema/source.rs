//! Column metadata retrieval.
//!
//! The configuration phase asks a [`SchemaSource`] for the ordered column list
//! of every configured table. [`MySqlSchemaSource`] reads
//! `INFORMATION_SCHEMA.COLUMNS` over a small connection pool; the in-memory
//! [`MemorySchemaSource`] serves fixed metadata.

use crate::error::SchemaError;
use ahash::AHashMap;
use async_trait::async_trait;

/// One row of column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    /// 1-based ordinal position
    pub position: u32,
    pub is_primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            position,
            is_primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

/// Per-table column metadata lookup
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Ordered column list of `database.table`.
    ///
    /// An empty list is returned as-is; the caller treats it as
    /// [`SchemaError::Unavailable`].
    async fn fetch_columns(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>, SchemaError>;
}

/// Schema source backed by a fixed map
#[derive(Debug, Default, Clone)]
pub struct MemorySchemaSource {
    tables: AHashMap<(String, String), Vec<ColumnInfo>>,
}

impl MemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the columns of `database.table`
    pub fn with_table(
        mut self,
        database: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnInfo>,
    ) -> Self {
        self.tables.insert((database.into(), table.into()), columns);
        self
    }
}

#[async_trait]
impl SchemaSource for MemorySchemaSource {
    async fn fetch_columns(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
        Ok(self
            .tables
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(feature = "mysql")]
pub use mysql::MySqlSchemaSource;

#[cfg(feature = "mysql")]
mod mysql {
    use super::{ColumnInfo, SchemaSource};
    use crate::config::ConnectionSettings;
    use crate::error::SchemaError;
    use async_trait::async_trait;
    use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
    use sqlx::Row;
    use std::time::Duration;

    // Cast to CHAR/UNSIGNED so the decoded types do not depend on the server version
    const COLUMNS_QUERY: &str = r#"
        SELECT
            CAST(c.COLUMN_NAME AS CHAR) AS COLUMN_NAME,
            CAST(c.DATA_TYPE AS CHAR) AS DATA_TYPE,
            CAST(c.ORDINAL_POSITION AS UNSIGNED) AS ORDINAL_POSITION,
            CAST(c.COLUMN_KEY AS CHAR) AS COLUMN_KEY
        FROM INFORMATION_SCHEMA.COLUMNS c
        WHERE c.TABLE_SCHEMA = ?
        AND c.TABLE_NAME = ?
        ORDER BY c.ORDINAL_POSITION
    "#;

    /// Reads column metadata from a MySQL server
    #[derive(Debug, Clone)]
    pub struct MySqlSchemaSource {
        pool: MySqlPool,
    }

    impl MySqlSchemaSource {
        /// Create a lazily-connecting pool against `information_schema`
        pub fn connect(settings: &ConnectionSettings) -> Self {
            let mut options = MySqlConnectOptions::new()
                .username(&settings.user)
                .database("information_schema");
            if let Some(socket) = settings.socket.as_deref().filter(|s| !s.is_empty()) {
                options = options.socket(socket);
            } else {
                options = options.host(&settings.host).port(settings.port);
            }
            if let Some(password) = settings.password.as_deref() {
                options = options.password(password);
            }

            let pool = MySqlPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(30))
                .connect_lazy_with(options);

            Self { pool }
        }

        /// Closes the connection pool gracefully
        pub async fn close(&self) {
            self.pool.close().await;
        }
    }

    #[async_trait]
    impl SchemaSource for MySqlSchemaSource {
        async fn fetch_columns(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
            let query_error = |e: sqlx::Error| SchemaError::Query {
                database: database.to_string(),
                table: table.to_string(),
                source: Box::new(e),
            };

            let rows = sqlx::query(COLUMNS_QUERY)
                .bind(database)
                .bind(table)
                .fetch_all(&self.pool)
                .await
                .map_err(query_error)?;

            let mut columns = Vec::with_capacity(rows.len());
            for row in &rows {
                let name: String = row.try_get("COLUMN_NAME").map_err(query_error)?;
                let data_type: String = row.try_get("DATA_TYPE").map_err(query_error)?;
                let position: u64 = row.try_get("ORDINAL_POSITION").map_err(query_error)?;
                let column_key: String = row.try_get("COLUMN_KEY").unwrap_or_default();

                columns.push(ColumnInfo {
                    name,
                    data_type,
                    position: u32::try_from(position).unwrap_or(u32::MAX),
                    is_primary_key: column_key == "PRI",
                });
            }

            tracing::debug!(
                "Read {} columns for table '{}.{}'",
                columns.len(),
                database,
                table
            );

            Ok(columns)
        }
    }
}
