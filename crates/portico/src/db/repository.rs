// File: src/db/repository.rs
// Purpose: Per-entity repository base with positional-parameter SQL helpers

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row};

/// One result row, column name → value
pub type Record = Map<String, Value>;

/// Implemented by every entity repository the application registers
///
/// ```ignore
/// pub struct UserRepository {
///     db: DbRepository,
/// }
///
/// impl Repository for UserRepository {
///     fn from_connection(db: DbRepository) -> Self {
///         Self { db }
///     }
/// }
/// ```
pub trait Repository: Send + Sync + 'static {
    fn from_connection(db: DbRepository) -> Self
    where
        Self: Sized;
}

/// SQL helpers bound to the connection of one entity
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: AnyPool,
}

impl DbRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Run a statement with positional `?` parameters
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<AnyQueryResult, sqlx::Error> {
        bind_all(sqlx::query(sql), params).execute(&self.pool).await
    }

    /// First row of a query, if any
    pub async fn fetch(&self, sql: &str, params: Vec<Value>) -> Result<Option<Record>, sqlx::Error> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    /// All rows of a query
    pub async fn fetch_all(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Record>, sqlx::Error> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    /// First row decoded into `T` by column name
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<T>, sqlx::Error> {
        self.fetch(sql, params).await?.map(from_record).transpose()
    }

    pub async fn fetch_all_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<T>, sqlx::Error> {
        self.fetch_all(sql, params)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }
}

/// Decode a record into any type deserializable from its columns
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, sqlx::Error> {
    serde_json::from_value(Value::Object(record)).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: Vec<Value>,
) -> Query<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s),
            // Arrays and objects are stored as JSON text
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn row_to_record(row: &AnyRow) -> Record {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            (column.name().to_string(), decode_column(row, index))
        })
        .collect()
}

fn decode_column(row: &AnyRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(Some(value)) = row.try_get::<Option<f64>, _>(index) {
        return Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<Option<String>, _>(index) {
        return Value::String(value);
    }
    if let Ok(Some(value)) = row.try_get::<Option<bool>, _>(index) {
        return Value::Bool(value);
    }
    Value::Null
}
