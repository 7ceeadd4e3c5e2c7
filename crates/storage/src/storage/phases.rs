use std::collections::BTreeSet;

use ailvi_core::{PhaseState, UserId};
use rusqlite::{OptionalExtension as _, params};

use super::{Storage, get_conn, parse_ts};
use crate::error::StorageError;

impl Storage {
    /// # Errors
    /// Returns error if the query fails or the row is corrupt.
    pub fn load_phase_state(&self, user_id: &UserId) -> Result<Option<PhaseState>, StorageError> {
        let conn = get_conn(&self.pool)?;
        let row = conn
            .query_row(
                "SELECT current_phase_index, completed_phases, free_text_note, offered_summary,
                        summary_delivered, messages_used, updated_at
                   FROM phase_states WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, i64>(5)?,
                        parse_ts(6, &row.get::<_, String>(6)?)?,
                    ))
                },
            )
            .optional()?;

        let Some((index, completed, note, offered, delivered, used, updated_at)) = row else {
            return Ok(None);
        };
        let completed_phases: BTreeSet<String> = serde_json::from_str(&completed)?;
        Ok(Some(PhaseState {
            user_id: user_id.clone(),
            current_phase_index: usize::try_from(index)
                .map_err(|e| StorageError::corrupt("negative current_phase_index", e))?,
            completed_phases,
            free_text_note: note,
            offered_summary: offered,
            summary_delivered: delivered,
            messages_used: u32::try_from(used)
                .map_err(|e| StorageError::corrupt("messages_used out of range", e))?,
            updated_at,
        }))
    }

    /// # Errors
    /// Returns error if the upsert fails.
    pub fn save_phase_state(&self, state: &PhaseState) -> Result<(), StorageError> {
        let conn = get_conn(&self.pool)?;
        conn.execute(
            "INSERT OR REPLACE INTO phase_states
               (user_id, current_phase_index, completed_phases, free_text_note, offered_summary,
                summary_delivered, messages_used, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                state.user_id.as_str(),
                state.current_phase_index as i64,
                serde_json::to_string(&state.completed_phases)?,
                state.free_text_note,
                state.offered_summary,
                state.summary_delivered,
                i64::from(state.messages_used),
                state.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
