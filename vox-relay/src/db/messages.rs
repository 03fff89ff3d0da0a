//! Assistant message persistence
//!
//! One row per completed relay session. The store is a seam so relay tests
//! can exercise persistence failures without a broken database.

use crate::error::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;
use vox_common::ChatMessage;

/// Persistence boundary for completed assistant messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Save the fully assembled assistant response for `chat_id` and
    /// return the stored record.
    async fn save_assistant_message(&self, chat_id: Uuid, content: &str) -> Result<ChatMessage>;
}

/// SQLite-backed message store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file and initialize the
    /// schema.
    pub async fn open(db_path: &Path) -> Result<Self> {
        info!("Opening message database: {}", db_path.display());

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::init(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create the messages table if it does not exist yet.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        debug!("Message schema initialized");
        Ok(())
    }

    /// Number of stored messages for `chat_id`.
    pub async fn count_for_chat(&self, chat_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
            .bind(chat_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn save_assistant_message(&self, chat_id: Uuid, content: &str) -> Result<ChatMessage> {
        let message = ChatMessage::assistant(chat_id, content);

        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, role, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.chat_id.to_string())
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Saved message {} for chat {}", message.id, chat_id);
        Ok(message)
    }
}
