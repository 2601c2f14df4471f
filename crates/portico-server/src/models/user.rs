use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use portico::{DbRepository, Repository};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A registered account, as kept in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub user_name: String,
    pub created_at: String,
}

#[derive(Deserialize)]
struct StoredUser {
    id: i64,
    user_name: String,
    password: String,
    created_at: String,
}

pub struct UserRepository {
    db: DbRepository,
}

impl Repository for UserRepository {
    fn from_connection(db: DbRepository) -> Self {
        Self { db }
    }
}

impl UserRepository {
    pub async fn insert(&self, user_name: &str, password: &str) -> Result<()> {
        let hash = hash_password(password)?;
        self.db
            .execute(
                "INSERT INTO users (user_name, password) VALUES (?, ?)",
                vec![json!(user_name), json!(hash)],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_by_user_name(&self, user_name: &str) -> Result<Option<User>, sqlx::Error> {
        self.db
            .fetch_as(
                "SELECT id, user_name, created_at FROM users WHERE user_name = ?",
                vec![json!(user_name)],
            )
            .await
    }

    pub async fn is_unique_user_name(&self, user_name: &str) -> Result<bool, sqlx::Error> {
        let row = self
            .db
            .fetch(
                "SELECT COUNT(id) AS count FROM users WHERE user_name = ?",
                vec![json!(user_name)],
            )
            .await?;
        Ok(row.and_then(|r| r.get("count").and_then(|c| c.as_i64())) == Some(0))
    }

    /// The user with these credentials, if they match
    pub async fn authenticate(&self, user_name: &str, password: &str) -> Result<Option<User>> {
        let stored: Option<StoredUser> = self
            .db
            .fetch_as(
                "SELECT id, user_name, password, created_at FROM users WHERE user_name = ?",
                vec![json!(user_name)],
            )
            .await?;

        Ok(stored
            .filter(|s| verify_password(password, &s.password))
            .map(|s| User {
                id: s.id,
                user_name: s.user_name,
                created_at: s.created_at,
            }))
    }
}

/// Argon2id hash in PHC string format
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("password hashing failed: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-hash"));
    }
}
