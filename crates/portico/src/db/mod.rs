// File: src/db/mod.rs
// Purpose: Named connection pools and the per-request repository cache
//
// `Database` lives for the whole process and knows every connection and
// repository factory. `DbManager` is created per request and hands out
// repository instances, building each one at most once.

mod repository;

pub use repository::{from_record, DbRepository, Record, Repository};

use crate::config::{ConnectionConfig, DatabaseConfig};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("no database connection named `{0}`")]
    UnknownConnection(String),

    #[error("no database connection configured")]
    NoConnection,

    #[error("no repository registered for entity `{0}`")]
    UnknownRepository(String),

    #[error("repository for entity `{entity}` is not a `{expected}`")]
    TypeMismatch {
        entity: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

type RepositoryHandle = Arc<dyn Any + Send + Sync>;
type RepositoryFactory = Arc<dyn Fn(DbRepository) -> RepositoryHandle + Send + Sync>;

/// Process-wide database registry
#[derive(Default)]
pub struct Database {
    /// Declaration order; the first entry is the default connection
    connections: Vec<(String, AnyPool)>,
    repository_connections: HashMap<String, String>,
    factories: HashMap<String, RepositoryFactory>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field(
                "connections",
                &self.connections.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("repository_connections", &self.repository_connections)
            .field("repositories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every connection and mapping from configuration
    ///
    /// Pools connect lazily, so this fails only on malformed URLs.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, DbError> {
        let mut database = Self::new();
        for connection in &config.connections {
            database.connect(connection)?;
        }
        for (entity, name) in &config.repository_connections {
            database.set_repository_connection(entity.clone(), name.clone());
        }
        Ok(database)
    }

    /// Register a lazily connected pool under `config.name`
    pub fn connect(&mut self, config: &ConnectionConfig) -> Result<(), DbError> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy(&config.url)?;

        tracing::debug!(connection = %config.name, "Registered database connection");
        self.add_pool(config.name.clone(), pool);
        Ok(())
    }

    /// Register an existing pool, replacing one of the same name
    pub fn add_pool(&mut self, name: impl Into<String>, pool: AnyPool) {
        let name = name.into();
        match self.connections.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = pool,
            None => self.connections.push((name, pool)),
        }
    }

    /// Named connection, or the default one for `None`
    pub fn connection(&self, name: Option<&str>) -> Result<&AnyPool, DbError> {
        match name {
            Some(name) => self
                .connections
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, pool)| pool)
                .ok_or_else(|| DbError::UnknownConnection(name.to_string())),
            None => self
                .connections
                .first()
                .map(|(_, pool)| pool)
                .ok_or(DbError::NoConnection),
        }
    }

    /// Route an entity's repository to a non-default connection
    pub fn set_repository_connection(&mut self, entity: impl Into<String>, name: impl Into<String>) {
        self.repository_connections.insert(entity.into(), name.into());
    }

    pub fn connection_for_repository(&self, entity: &str) -> Result<&AnyPool, DbError> {
        self.connection(self.repository_connections.get(entity).map(String::as_str))
    }

    /// Make `R` available as the repository for `entity`
    pub fn register_repository<R: Repository>(&mut self, entity: impl Into<String>) -> &mut Self {
        let factory: RepositoryFactory =
            Arc::new(|db: DbRepository| Arc::new(R::from_connection(db)) as RepositoryHandle);
        self.factories.insert(entity.into(), factory);
        self
    }

    pub fn has_repository(&self, entity: &str) -> bool {
        self.factories.contains_key(entity)
    }

    fn build_repository(&self, entity: &str) -> Result<RepositoryHandle, DbError> {
        let factory = self
            .factories
            .get(entity)
            .ok_or_else(|| DbError::UnknownRepository(entity.to_string()))?;
        let pool = self.connection_for_repository(entity)?.clone();
        Ok(factory(DbRepository::new(pool)))
    }
}

/// Repository access for one request
pub struct DbManager {
    database: Arc<Database>,
    repositories: HashMap<String, RepositoryHandle>,
}

impl std::fmt::Debug for DbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbManager")
            .field("cached", &self.repositories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DbManager {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            repositories: HashMap::new(),
        }
    }

    /// Repository for `entity`, built on first use and cached afterwards
    pub fn get<R: Repository>(&mut self, entity: &str) -> Result<Arc<R>, DbError> {
        let handle = match self.repositories.get(entity) {
            Some(handle) => handle.clone(),
            None => {
                let handle = self.database.build_repository(entity)?;
                self.repositories.insert(entity.to_string(), handle.clone());
                handle
            }
        };

        handle.downcast::<R>().map_err(|_| DbError::TypeMismatch {
            entity: entity.to_string(),
            expected: std::any::type_name::<R>(),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct NoteRepository {
        db: DbRepository,
    }

    impl Repository for NoteRepository {
        fn from_connection(db: DbRepository) -> Self {
            Self { db }
        }
    }

    struct OtherRepository;

    impl Repository for OtherRepository {
        fn from_connection(_db: DbRepository) -> Self {
            Self
        }
    }

    fn memory(name: &str) -> ConnectionConfig {
        ConnectionConfig {
            name: name.to_string(),
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    fn database() -> Database {
        let mut database = Database::new();
        database.connect(&memory("default")).unwrap();
        database.connect(&memory("archive")).unwrap();
        database.register_repository::<NoteRepository>("Note");
        database
    }

    #[tokio::test]
    async fn test_default_and_named_connections() {
        let database = database();
        assert!(database.connection(None).is_ok());
        assert!(database.connection(Some("archive")).is_ok());
        assert!(matches!(
            database.connection(Some("missing")),
            Err(DbError::UnknownConnection(name)) if name == "missing"
        ));
        assert!(matches!(
            Database::new().connection(None),
            Err(DbError::NoConnection)
        ));
    }

    #[tokio::test]
    async fn test_repository_connection_mapping() {
        let mut database = database();
        database.set_repository_connection("Note", "nowhere");
        let mut manager = DbManager::new(Arc::new(database));
        assert!(matches!(
            manager.get::<NoteRepository>("Note"),
            Err(DbError::UnknownConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_is_cached_per_manager() {
        let database = Arc::new(database());
        let mut manager = DbManager::new(database.clone());

        let first = manager.get::<NoteRepository>("Note").unwrap();
        let second = manager.get::<NoteRepository>("Note").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mut other_request = DbManager::new(database);
        let third = other_request.get::<NoteRepository>("Note").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn test_unknown_and_mismatched_repository() {
        let mut manager = DbManager::new(Arc::new(database()));
        assert!(matches!(
            manager.get::<NoteRepository>("Comment"),
            Err(DbError::UnknownRepository(name)) if name == "Comment"
        ));
        assert!(matches!(
            manager.get::<OtherRepository>("Note"),
            Err(DbError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_repository_queries() {
        let mut manager = DbManager::new(Arc::new(database()));
        let notes = manager.get::<NoteRepository>("Note").unwrap();

        notes
            .db
            .execute(
                "CREATE TABLE note (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL, score REAL, tag TEXT)",
                vec![],
            )
            .await
            .unwrap();

        let result = notes
            .db
            .execute(
                "INSERT INTO note (body, score) VALUES (?, ?)",
                vec![json!("first"), json!(1.5)],
            )
            .await
            .unwrap();
        assert_eq!(result.rows_affected(), 1);

        notes
            .db
            .execute(
                "INSERT INTO note (body, score, tag) VALUES (?, ?, ?)",
                vec![json!("second"), json!(2.5), json!("x")],
            )
            .await
            .unwrap();

        let row = notes
            .db
            .fetch("SELECT id, body, score, tag FROM note WHERE body = ?", vec![json!("first")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("id"), Some(&json!(1)));
        assert_eq!(row.get("body"), Some(&json!("first")));
        assert_eq!(row.get("score"), Some(&json!(1.5)));
        assert_eq!(row.get("tag"), Some(&Value::Null));

        let rows = notes
            .db
            .fetch_all("SELECT body FROM note ORDER BY id DESC", vec![])
            .await
            .unwrap();
        let bodies: Vec<_> = rows.iter().map(|r| r["body"].clone()).collect();
        assert_eq!(bodies, vec![json!("second"), json!("first")]);

        let none = notes
            .db
            .fetch("SELECT id FROM note WHERE id = ?", vec![json!(99)])
            .await
            .unwrap();
        assert!(none.is_none());

        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Note {
            id: i64,
            body: String,
            tag: Option<String>,
        }

        let notes_as: Vec<Note> = notes
            .db
            .fetch_all_as("SELECT id, body, tag FROM note ORDER BY id", vec![])
            .await
            .unwrap();
        assert_eq!(
            notes_as,
            vec![
                Note { id: 1, body: "first".into(), tag: None },
                Note { id: 2, body: "second".into(), tag: Some("x".into()) },
            ]
        );

        let mismatch = notes
            .db
            .fetch_as::<Note>("SELECT body FROM note WHERE id = ?", vec![json!(1)])
            .await;
        assert!(matches!(mismatch, Err(sqlx::Error::Decode(_))));
    }
}
