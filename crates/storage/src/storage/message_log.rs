use ailvi_core::{Direction, MessageLogEntry, UserId};
use rusqlite::params;

use super::{Storage, get_conn, log_row_error, parse_enum, parse_ts};
use crate::error::StorageError;

impl Storage {
    /// # Errors
    /// Returns error if the insert fails.
    pub fn log_message(&self, entry: &MessageLogEntry) -> Result<(), StorageError> {
        let conn = get_conn(&self.pool)?;
        conn.execute(
            "INSERT INTO bot_logs (chat_id, username, direction, text, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.user_id.as_str(),
                entry.username,
                entry.direction.as_str(),
                entry.text,
                entry.ts.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn recent_messages(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageLogEntry>, StorageError> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT username, direction, text, ts FROM (
                 SELECT id, username, direction, text, ts FROM bot_logs
                  WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id.as_str(), limit as i64], |row| {
            Ok(MessageLogEntry {
                user_id: user_id.clone(),
                username: row.get(0)?,
                direction: parse_enum::<Direction>(1, &row.get::<_, String>(1)?)?,
                text: row.get(2)?,
                ts: parse_ts(3, &row.get::<_, String>(3)?)?,
            })
        })?;
        Ok(rows.filter_map(log_row_error).collect())
    }
}
