use portico::{DbRepository, Repository};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A posted status with its author's name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub user_id: i64,
    pub body: String,
    pub created_at: String,
    pub user_name: String,
}

pub struct StatusRepository {
    db: DbRepository,
}

impl Repository for StatusRepository {
    fn from_connection(db: DbRepository) -> Self {
        Self { db }
    }
}

const SELECT_WITH_AUTHOR: &str = "SELECT s.id, s.user_id, s.body, s.created_at, u.user_name \
     FROM statuses s INNER JOIN users u ON s.user_id = u.id";

impl StatusRepository {
    pub async fn insert(&self, user_id: i64, body: &str) -> Result<(), sqlx::Error> {
        self.db
            .execute(
                "INSERT INTO statuses (user_id, body) VALUES (?, ?)",
                vec![json!(user_id), json!(body)],
            )
            .await?;
        Ok(())
    }

    /// Newest first
    pub async fn fetch_all_by_user_id(&self, user_id: i64) -> Result<Vec<Status>, sqlx::Error> {
        self.db
            .fetch_all_as(
                &format!("{} WHERE u.id = ? ORDER BY s.created_at DESC, s.id DESC", SELECT_WITH_AUTHOR),
                vec![json!(user_id)],
            )
            .await
    }

    pub async fn fetch_by_id_and_user_name(
        &self,
        id: i64,
        user_name: &str,
    ) -> Result<Option<Status>, sqlx::Error> {
        self.db
            .fetch_as(
                &format!("{} WHERE s.id = ? AND u.user_name = ?", SELECT_WITH_AUTHOR),
                vec![json!(id), json!(user_name)],
            )
            .await
    }
}
