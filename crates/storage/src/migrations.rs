//! SQLite schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 3;

/// Original bot schema: history, phase state and the `bot_logs` audit table.
const V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_user ON turns(user_id, id);

CREATE TABLE IF NOT EXISTS phase_states (
    user_id TEXT PRIMARY KEY,
    current_phase_index INTEGER NOT NULL DEFAULT 0,
    completed_phases TEXT NOT NULL DEFAULT '[]',
    free_text_note TEXT NOT NULL DEFAULT '',
    offered_summary INTEGER NOT NULL DEFAULT 0,
    summary_delivered INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bot_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id TEXT NOT NULL,
    username TEXT,
    direction TEXT NOT NULL,
    text TEXT NOT NULL,
    ts TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bot_logs_chat ON bot_logs(chat_id, id);
";

const V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS summaries (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    text TEXT NOT NULL,
    turn_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_summaries_user ON summaries(user_id, created_at);
";

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let sql = format!("PRAGMA table_info({table})");
    let Ok(mut stmt) = conn.prepare(&sql) else {
        return false;
    };
    let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(1)) else {
        return false;
    };
    rows.flatten().any(|name| name == column)
}

fn add_column_if_not_exists(
    conn: &Connection,
    table: &str,
    column: &str,
    col_type: &str,
) -> Result<(), rusqlite::Error> {
    if !column_exists(conn, table, column) {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {col_type}"), [])?;
    }
    Ok(())
}

pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(current_version, target = SCHEMA_VERSION, "Database schema version");

    if current_version < 1i32 {
        tracing::info!("Running migration v1: initial schema");
        conn.execute_batch(V1_SQL)?;
    }

    if current_version < 2i32 {
        tracing::info!("Running migration v2: summaries table");
        conn.execute_batch(V2_SQL)?;
    }

    if current_version < 3i32 {
        tracing::info!("Running migration v3: messages_used on phase_states");
        add_column_if_not_exists(
            conn,
            "phase_states",
            "messages_used",
            "INTEGER NOT NULL DEFAULT 0",
        )?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tracing::info!(version = SCHEMA_VERSION, "Database schema up to date");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::unwrap_used, reason = "test code")]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert!(column_exists(&conn, "phase_states", "messages_used"));
        assert!(column_exists(&conn, "bot_logs", "direction"));
    }
}
