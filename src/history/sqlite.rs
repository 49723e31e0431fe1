use std::path::PathBuf;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use super::{ConversationTurn, HistoryMessage, MessageRole, MessageStore, NewTurn, TurnStore};
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::persistence(format!("Failed to connect to history db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_query TEXT NOT NULL,
                search_results TEXT NOT NULL,
                origin_agent_response TEXT NOT NULL,
                final_agent_response TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::persistence(format!("Failed to init chat_history table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(username, timestamp)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::persistence(format!("Failed to create index: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS message_store (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::persistence(format!("Failed to init message_store table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_message_store_session ON message_store(session_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::persistence(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    // Fixed-width UTC timestamps sort lexically in time order.
    fn now() -> String {
        chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn row_to_turn(row: &SqliteRow) -> Result<ConversationTurn, ApiError> {
        Ok(ConversationTurn {
            id: row.try_get("id").map_err(ApiError::persistence)?,
            username: row.try_get("username").map_err(ApiError::persistence)?,
            timestamp: row.try_get("timestamp").map_err(ApiError::persistence)?,
            user_query: row.try_get("user_query").map_err(ApiError::persistence)?,
            search_results: row.try_get("search_results").map_err(ApiError::persistence)?,
            origin_agent_response: row
                .try_get("origin_agent_response")
                .map_err(ApiError::persistence)?,
            final_agent_response: row
                .try_get("final_agent_response")
                .map_err(ApiError::persistence)?,
        })
    }

    fn row_to_message(row: &SqliteRow) -> Result<HistoryMessage, ApiError> {
        let role: String = row.try_get("role").map_err(ApiError::persistence)?;
        Ok(HistoryMessage {
            id: row.try_get("id").map_err(ApiError::persistence)?,
            session_id: row.try_get("session_id").map_err(ApiError::persistence)?,
            role: MessageRole::parse(&role).unwrap_or(MessageRole::System),
            content: row.try_get("content").map_err(ApiError::persistence)?,
            created_at: row.try_get("created_at").map_err(ApiError::persistence)?,
        })
    }
}

#[async_trait]
impl TurnStore for HistoryStore {
    async fn insert_turn(&self, turn: NewTurn) -> Result<i64, ApiError> {
        let result = sqlx::query(
            "INSERT INTO chat_history
                (username, timestamp, user_query, search_results, origin_agent_response, final_agent_response)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&turn.username)
        .bind(Self::now())
        .bind(&turn.user_query)
        .bind(&turn.search_results)
        .bind(&turn.origin_agent_response)
        .bind(&turn.final_agent_response)
        .execute(&self.pool)
        .await
        .map_err(ApiError::persistence)?;

        Ok(result.last_insert_rowid())
    }

    async fn latest_turn(&self, username: &str) -> Result<Option<ConversationTurn>, ApiError> {
        let row = sqlx::query(
            "SELECT * FROM chat_history
             WHERE username = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::persistence)?;

        row.as_ref().map(Self::row_to_turn).transpose()
    }

    async fn delete_turns(&self, username: &str) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM chat_history WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(ApiError::persistence)?;
        Ok(result.rows_affected() as usize)
    }

    async fn usernames(&self) -> Result<Vec<String>, ApiError> {
        sqlx::query_scalar("SELECT DISTINCT username FROM chat_history ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::persistence)
    }

    async fn all_turns(&self) -> Result<Vec<ConversationTurn>, ApiError> {
        let rows = sqlx::query("SELECT * FROM chat_history ORDER BY timestamp ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::persistence)?;

        rows.iter().map(Self::row_to_turn).collect()
    }
}

#[async_trait]
impl MessageStore for HistoryStore {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<i64, ApiError> {
        let result = sqlx::query(
            "INSERT INTO message_store (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(ApiError::persistence)?;

        Ok(result.last_insert_rowid())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryMessage>, ApiError> {
        let rows = if limit > 0 {
            sqlx::query(
                "SELECT * FROM (SELECT * FROM message_store WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2) ORDER BY id ASC",
            )
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::persistence)?
        } else {
            sqlx::query("SELECT * FROM message_store WHERE session_id = ?1 ORDER BY id ASC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::persistence)?
        };

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn clear(&self, session_id: &str) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM message_store WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::persistence)?;
        Ok(result.rows_affected() as usize)
    }
}
