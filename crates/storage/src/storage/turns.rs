use ailvi_core::{Role, Turn, UserId};
use rusqlite::params;

use super::{Storage, get_conn, log_row_error, parse_enum, parse_ts};
use crate::error::StorageError;

impl Storage {
    /// All turns of a user, in insertion order.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn load_turns(&self, user_id: &UserId) -> Result<Vec<Turn>, StorageError> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM turns WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id.as_str()], |row| {
            Ok(Turn {
                role: parse_enum::<Role>(0, &row.get::<_, String>(0)?)?,
                content: row.get(1)?,
                timestamp: parse_ts(2, &row.get::<_, String>(2)?)?,
            })
        })?;
        Ok(rows.filter_map(log_row_error).collect())
    }

    /// # Errors
    /// Returns error if the insert fails.
    pub fn append_turn(&self, user_id: &UserId, turn: &Turn) -> Result<(), StorageError> {
        let conn = get_conn(&self.pool)?;
        conn.execute(
            "INSERT INTO turns (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id.as_str(), turn.role.as_str(), turn.content, turn.timestamp.to_rfc3339()],
        )?;
        Ok(())
    }

    /// # Errors
    /// Returns error if the delete fails.
    pub fn clear_turns(&self, user_id: &UserId) -> Result<usize, StorageError> {
        let conn = get_conn(&self.pool)?;
        let removed = conn.execute("DELETE FROM turns WHERE user_id = ?1", params![user_id.as_str()])?;
        Ok(removed)
    }
}
