//! PostgreSQL storage backend using sqlx.

use std::collections::BTreeSet;
use std::time::Duration;

use ailvi_core::{Direction, MessageLogEntry, PhaseState, Role, Summary, Turn, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::pg_migrations::run_pg_migrations;
use crate::traits::{MessageLogStore, PhaseStore, SummaryStore, TurnStore};

const PG_POOL_MAX_CONNECTIONS: u32 = 8;
const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// # Errors
    /// Returns error if the connection or migrations fail.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        run_pg_migrations(&pool).await.map_err(|e| StorageError::Migration(e.to_string()))?;
        tracing::info!("PgStorage initialized");
        Ok(Self { pool })
    }
}

fn parse_column<T>(value: &str, column: &str) -> Result<T, StorageError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| StorageError::corrupt(format!("invalid {column}"), e))
}

fn to_i32(value: usize, column: &str) -> Result<i32, StorageError> {
    i32::try_from(value).map_err(|e| StorageError::corrupt(format!("{column} exceeds i32::MAX"), e))
}

fn row_to_turn(row: &PgRow) -> Result<Turn, StorageError> {
    Ok(Turn {
        role: parse_column::<Role>(&row.try_get::<String, _>("role")?, "role")?,
        content: row.try_get("content")?,
        timestamp: row.try_get("created_at")?,
    })
}

fn row_to_summary(row: &PgRow, user_id: &UserId) -> Result<Summary, StorageError> {
    let turn_count: i32 = row.try_get("turn_count")?;
    Ok(Summary {
        id: row.try_get("id")?,
        user_id: user_id.clone(),
        text: row.try_get("text")?,
        turn_count: usize::try_from(turn_count)
            .map_err(|e| StorageError::corrupt("negative turn_count", e))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TurnStore for PgStorage {
    async fn load_turns(&self, user_id: &UserId) -> Result<Vec<Turn>, StorageError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM turns WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_turn).collect()
    }

    async fn append_turn(&self, user_id: &UserId, turn: &Turn) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO turns (user_id, role, content, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id.as_str())
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_turns(&self, user_id: &UserId) -> Result<usize, StorageError> {
        let result = sqlx::query("DELETE FROM turns WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}

#[async_trait]
impl PhaseStore for PgStorage {
    async fn load_phase_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PhaseState>, StorageError> {
        let row = sqlx::query(
            "SELECT current_phase_index, completed_phases, free_text_note, offered_summary,
                    summary_delivered, messages_used, updated_at
               FROM phase_states WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let index: i32 = row.try_get("current_phase_index")?;
        let used: i32 = row.try_get("messages_used")?;
        let completed: serde_json::Value = row.try_get("completed_phases")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        Ok(Some(PhaseState {
            user_id: user_id.clone(),
            current_phase_index: usize::try_from(index)
                .map_err(|e| StorageError::corrupt("negative current_phase_index", e))?,
            completed_phases: serde_json::from_value::<BTreeSet<String>>(completed)?,
            free_text_note: row.try_get("free_text_note")?,
            offered_summary: row.try_get("offered_summary")?,
            summary_delivered: row.try_get("summary_delivered")?,
            messages_used: u32::try_from(used)
                .map_err(|e| StorageError::corrupt("negative messages_used", e))?,
            updated_at,
        }))
    }

    async fn save_phase_state(&self, state: &PhaseState) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO phase_states
               (user_id, current_phase_index, completed_phases, free_text_note, offered_summary,
                summary_delivered, messages_used, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id) DO UPDATE SET
               current_phase_index = EXCLUDED.current_phase_index,
               completed_phases = EXCLUDED.completed_phases,
               free_text_note = EXCLUDED.free_text_note,
               offered_summary = EXCLUDED.offered_summary,
               summary_delivered = EXCLUDED.summary_delivered,
               messages_used = EXCLUDED.messages_used,
               updated_at = EXCLUDED.updated_at",
        )
        .bind(state.user_id.as_str())
        .bind(to_i32(state.current_phase_index, "current_phase_index")?)
        .bind(serde_json::to_value(&state.completed_phases)?)
        .bind(&state.free_text_note)
        .bind(state.offered_summary)
        .bind(state.summary_delivered)
        .bind(
            i32::try_from(state.messages_used)
                .map_err(|e| StorageError::corrupt("messages_used exceeds i32::MAX", e))?,
        )
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SummaryStore for PgStorage {
    async fn save_summary(&self, summary: &Summary) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO summaries (id, user_id, text, turn_count, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&summary.id)
        .bind(summary.user_id.as_str())
        .bind(&summary.text)
        .bind(to_i32(summary.turn_count, "turn_count")?)
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_summaries(&self, user_id: &UserId) -> Result<Vec<Summary>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, text, turn_count, created_at FROM summaries
              WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| row_to_summary(r, user_id)).collect()
    }
}

#[async_trait]
impl MessageLogStore for PgStorage {
    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO bot_logs (chat_id, username, direction, text, ts) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.user_id.as_str())
        .bind(&entry.username)
        .bind(entry.direction.as_str())
        .bind(&entry.text)
        .bind(entry.ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageLogEntry>, StorageError> {
        let rows = sqlx::query(
            "SELECT username, direction, text, ts FROM (
                 SELECT id, username, direction, text, ts FROM bot_logs
                  WHERE chat_id = $1 ORDER BY id DESC LIMIT $2
             ) recent ORDER BY id ASC",
        )
        .bind(user_id.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<MessageLogEntry, StorageError> {
                Ok(MessageLogEntry {
                    user_id: user_id.clone(),
                    username: row.try_get("username")?,
                    direction: parse_column::<Direction>(
                        &row.try_get::<String, _>("direction")?,
                        "direction",
                    )?,
                    text: row.try_get("text")?,
                    ts: row.try_get("ts")?,
                })
            })
            .collect()
    }
}
