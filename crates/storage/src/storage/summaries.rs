use ailvi_core::{Summary, UserId};
use rusqlite::params;

use super::{Storage, get_conn, log_row_error, parse_ts};
use crate::error::StorageError;

impl Storage {
    /// Insert a new summary. An existing id is a [`StorageError::Duplicate`].
    ///
    /// # Errors
    /// Returns error if the insert fails.
    pub fn save_summary(&self, summary: &Summary) -> Result<(), StorageError> {
        let conn = get_conn(&self.pool)?;
        let result = conn.execute(
            "INSERT INTO summaries (id, user_id, text, turn_count, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                summary.id,
                summary.user_id.as_str(),
                summary.text,
                summary.turn_count as i64,
                summary.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Duplicate(summary.id.clone()))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn get_summaries(&self, user_id: &UserId) -> Result<Vec<Summary>, StorageError> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT id, text, turn_count, created_at FROM summaries
               WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![user_id.as_str()], |row| {
            Ok(Summary {
                id: row.get(0)?,
                user_id: user_id.clone(),
                text: row.get(1)?,
                turn_count: row.get::<_, i64>(2)? as usize,
                created_at: parse_ts(3, &row.get::<_, String>(3)?)?,
            })
        })?;
        Ok(rows.filter_map(log_row_error).collect())
    }
}
