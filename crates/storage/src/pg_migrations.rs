//! PostgreSQL schema migrations for AILVI storage.

use sqlx::PgPool;

use crate::error::StorageError;

/// Run all PostgreSQL migrations. Every statement is idempotent.
pub async fn run_pg_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS turns (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_user ON turns (user_id, id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS phase_states (
            user_id TEXT PRIMARY KEY,
            current_phase_index INTEGER NOT NULL DEFAULT 0,
            completed_phases JSONB NOT NULL DEFAULT '[]',
            free_text_note TEXT NOT NULL DEFAULT '',
            offered_summary BOOLEAN NOT NULL DEFAULT FALSE,
            summary_delivered BOOLEAN NOT NULL DEFAULT FALSE,
            messages_used INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS summaries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            text TEXT NOT NULL,
            turn_count INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_user ON summaries (user_id, created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS bot_logs (
            id BIGSERIAL PRIMARY KEY,
            chat_id TEXT NOT NULL,
            username TEXT,
            direction TEXT NOT NULL,
            text TEXT NOT NULL,
            ts TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bot_logs_chat ON bot_logs (chat_id, id)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations complete");
    Ok(())
}
