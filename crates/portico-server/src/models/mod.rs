// File: src/models/mod.rs
// Purpose: Blog entities, their repositories and the SQLite schema

mod status;
mod user;

pub use status::{Status, StatusRepository};
pub use user::{hash_password, verify_password, User, UserRepository};

use sqlx::AnyPool;

/// Entity names the repositories are registered under
pub const USER_ENTITY: &str = "User";
pub const STATUS_ENTITY: &str = "Status";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_name TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS statuses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id),
        body TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS statuses_user_id ON statuses (user_id)",
];

/// Create the tables if they do not exist yet
pub async fn create_schema(pool: &AnyPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
