//! PostgreSQL Executor
//!
//! Runs select statements through a sqlx connection pool. Parameters are
//! bound from [`DatabaseValue`]s and result columns are converted back,
//! with SQL NULL mapped to [`DatabaseValue::Null`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row as SqlxRow, TypeInfo};

use super::core::{DatabaseValue, Row, StatementExecutor};
use crate::config::PoolConfig;
use crate::error::{DatabaseError, OrmError, OrmResult};
use crate::query::SelectStatement;

/// Statement executor backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: Pool<Postgres>,
}

impl PostgresExecutor {
    /// Wrap an existing pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        validate_database_url(database_url)?;

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options.connect(database_url).await.map_err(|e| {
            OrmError::configuration(format!("Failed to create PostgreSQL pool: {}", e))
        })?;

        tracing::debug!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "PostgreSQL pool created"
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StatementExecutor for PostgresExecutor {
    async fn fetch_all(&self, statement: &SelectStatement) -> Result<Vec<Row>, DatabaseError> {
        let (sql, params) = statement.to_sql_with_params();

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_database_value(query, param);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(convert_row).collect()
    }
}

/// Check scheme, host and database name of a PostgreSQL URL
pub fn validate_database_url(database_url: &str) -> OrmResult<()> {
    let parsed = url::Url::parse(database_url)
        .map_err(|e| OrmError::configuration(format!("Invalid database URL: {}", e)))?;

    if parsed.scheme() != "postgresql" && parsed.scheme() != "postgres" {
        return Err(OrmError::configuration("Invalid PostgreSQL URL scheme"));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(OrmError::configuration("Missing host in database URL"));
    }

    if parsed.path().trim_start_matches('/').is_empty() {
        return Err(OrmError::configuration("Missing database name in URL"));
    }

    Ok(())
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float32(f) => query.bind(*f),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

fn convert_row(row: &PgRow) -> Result<Row, DatabaseError> {
    let mut converted = Row::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        converted.push(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(converted)
}

fn column_error(type_name: &str, e: sqlx::Error) -> DatabaseError {
    DatabaseError::with_source(format!("Failed to get {} value", type_name), e)
}

/// Read an optional column of type `T`, mapping NULL to `DatabaseValue::Null`
fn get_optional<'r, T>(row: &'r PgRow, index: usize, type_name: &str) -> Result<Option<T>, DatabaseError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| column_error(type_name, e))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> Result<DatabaseValue, DatabaseError> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    let value = match type_name {
        "BOOL" => get_optional::<bool>(row, index, type_name)?.map(DatabaseValue::Bool),
        "INT2" => get_optional::<i16>(row, index, type_name)?.map(|v| DatabaseValue::Int32(i32::from(v))),
        "INT4" => get_optional::<i32>(row, index, type_name)?.map(DatabaseValue::Int32),
        "INT8" => get_optional::<i64>(row, index, type_name)?.map(DatabaseValue::Int64),
        "FLOAT4" => get_optional::<f32>(row, index, type_name)?.map(DatabaseValue::Float32),
        "FLOAT8" => get_optional::<f64>(row, index, type_name)?.map(DatabaseValue::Float64),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            get_optional::<String>(row, index, type_name)?.map(DatabaseValue::String)
        }
        "BYTEA" => get_optional::<Vec<u8>>(row, index, type_name)?.map(DatabaseValue::Bytes),
        "UUID" => get_optional::<uuid::Uuid>(row, index, type_name)?.map(DatabaseValue::Uuid),
        "TIMESTAMPTZ" => get_optional::<chrono::DateTime<chrono::Utc>>(row, index, type_name)?
            .map(DatabaseValue::DateTime),
        "TIMESTAMP" => get_optional::<chrono::NaiveDateTime>(row, index, type_name)?
            .map(|v| DatabaseValue::DateTime(v.and_utc())),
        "DATE" => get_optional::<chrono::NaiveDate>(row, index, type_name)?.map(DatabaseValue::Date),
        "TIME" => get_optional::<chrono::NaiveTime>(row, index, type_name)?.map(DatabaseValue::Time),
        "JSON" | "JSONB" => get_optional::<JsonValue>(row, index, type_name)?.map(DatabaseValue::Json),
        _ => {
            // Fallback: try to get as string
            get_optional::<String>(row, index, type_name)?.map(DatabaseValue::String)
        }
    };

    Ok(value.unwrap_or(DatabaseValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_validation() {
        assert!(validate_database_url("postgres://user:pw@localhost:5432/things").is_ok());
        assert!(validate_database_url("postgresql://localhost/things").is_ok());
        assert!(validate_database_url("mysql://localhost/things").is_err());
        assert!(validate_database_url("postgres://localhost").is_err());
        assert!(validate_database_url("not a url").is_err());
    }
}
