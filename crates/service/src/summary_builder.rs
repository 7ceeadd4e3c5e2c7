//! Map-reduce summary over a user's full history.
//!
//! Chunks are extracted concurrently, each under its own timeout; failed
//! chunks are dropped. Several partial results are merged by the model, with
//! a local set union as fallback. A final synthesis call writes the
//! narrative, which is persisted as a new [`Summary`].

use std::sync::Arc;

use ailvi_core::persona::PERSONA_SYSTEM_PROMPT;
use ailvi_core::{EngineConfig, Summary, Turn, UserId};
use ailvi_llm::summary::{extract_chunk, merge_facts, synthesize};
use ailvi_llm::{Generator, SummaryFacts};
use ailvi_storage::StorageBackend;
use ailvi_storage::traits::SummaryStore;
use chrono::Utc;
use futures_util::future::join_all;

use crate::error::ServiceError;
use crate::history::HistoryStore;
use crate::phase_tracker::PhaseTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Delivered(Summary),
    /// Nothing usable came back; state is unchanged and the user may ask again.
    RetryLater,
}

pub struct SummaryBuilder {
    storage: Arc<StorageBackend>,
    generator: Arc<dyn Generator>,
    history: Arc<HistoryStore>,
    tracker: Arc<PhaseTracker>,
    config: Arc<EngineConfig>,
}

impl SummaryBuilder {
    #[must_use]
    pub fn new(
        storage: Arc<StorageBackend>,
        generator: Arc<dyn Generator>,
        history: Arc<HistoryStore>,
        tracker: Arc<PhaseTracker>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { storage, generator, history, tracker, config }
    }

    /// Runs the pipeline for a user who has been offered a summary.
    ///
    /// # Errors
    /// [`ServiceError::SummaryNotOffered`] when no offer was made; nothing is
    /// generated or stored in that case. Pipeline failures are reported as
    /// [`SummaryOutcome::RetryLater`], not as errors.
    pub async fn summarize(&self, user_id: &UserId) -> Result<SummaryOutcome, ServiceError> {
        let state = self.tracker.state(user_id).await;
        if !state.offered_summary {
            return Err(ServiceError::SummaryNotOffered(user_id.clone()));
        }

        let turns = self.history.full(user_id).await;
        let text = match self.run_pipeline(&turns).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "summary pipeline failed");
                return Ok(SummaryOutcome::RetryLater);
            },
        };

        let summary = Summary {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            text,
            turn_count: turns.len(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.storage.save_summary(&summary).await {
            tracing::warn!(user_id = %user_id, error = %e, "summary not persisted");
        }
        self.tracker.mark_delivered(user_id).await;
        tracing::info!(
            user_id = %user_id,
            summary_id = %summary.id,
            turns = summary.turn_count,
            "summary delivered"
        );
        Ok(SummaryOutcome::Delivered(summary))
    }

    async fn run_pipeline(&self, turns: &[Turn]) -> Result<String, ServiceError> {
        let facts = self.extract_all(turns).await;
        let merged = match facts.as_slice() {
            [] => return Err(ServiceError::Pipeline("no chunk produced observations".to_owned())),
            [single] => single.clone(),
            parts => self.merge(parts).await,
        };

        let synthesis = synthesize(self.generator.as_ref(), &merged, PERSONA_SYSTEM_PROMPT);
        match tokio::time::timeout(self.config.generation_timeout, synthesis).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ServiceError::Pipeline("synthesis timed out".to_owned())),
        }
    }

    /// Map step. Results keep chunk order; failed chunks are skipped.
    async fn extract_all(&self, turns: &[Turn]) -> Vec<SummaryFacts> {
        let timeout = self.config.generation_timeout;
        let calls = turns.chunks(self.config.summary_chunk_turns.max(1)).enumerate().map(
            |(index, chunk)| async move {
                match tokio::time::timeout(timeout, extract_chunk(self.generator.as_ref(), chunk))
                    .await
                {
                    Ok(Ok(facts)) => Some(facts),
                    Ok(Err(e)) => {
                        tracing::warn!(chunk = index, error = %e, "summary chunk dropped");
                        None
                    },
                    Err(_) => {
                        tracing::warn!(chunk = index, "summary chunk timed out");
                        None
                    },
                }
            },
        );
        join_all(calls).await.into_iter().flatten().collect()
    }

    async fn merge(&self, parts: &[SummaryFacts]) -> SummaryFacts {
        let call = merge_facts(self.generator.as_ref(), parts);
        match tokio::time::timeout(self.config.generation_timeout, call).await {
            Ok(Ok(merged)) => merged,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, parts = parts.len(), "merge failed, using local union");
                SummaryFacts::union(parts)
            },
            Err(_) => {
                tracing::warn!(parts = parts.len(), "merge timed out, using local union");
                SummaryFacts::union(parts)
            },
        }
    }
}
