//! Ordered dialogue phases and the per-user progress record.
//!
//! All mutation of [`PhaseState`] goes through methods that keep its
//! invariants: the phase index never moves backwards, completed phases are
//! never removed, the summary offer is made at most once and only after every
//! phase is complete, and delivery implies an offer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_NOTE_BYTES;
use crate::error::ConfigError;
use crate::session::UserId;
use crate::text::truncate_bytes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub title: String,
    /// Extra system instruction while this phase is current.
    pub instruction: String,
}

impl Phase {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), instruction: instruction.into() }
    }

    fn with_generic_instruction(id: &str, title: &str) -> Self {
        Self::new(
            id,
            title,
            format!(
                "Сейчас мягко исследуй с человеком тему «{title}». Задавай по одному открытому \
                 вопросу, отражай услышанное, не давай готовых ответов."
            ),
        )
    }
}

/// How the tracker advances through the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseMode {
    /// A classification pass decides which phases were addressed.
    #[default]
    Classify,
    /// Every ordinary user reply completes the current phase.
    Linear,
}

impl std::str::FromStr for PhaseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classify" | "classification" => Ok(Self::Classify),
            "linear" => Ok(Self::Linear),
            other => Err(ConfigError::Invalid {
                var: "AILVI_PHASE_MODE",
                reason: format!("unknown phase mode `{other}`"),
            }),
        }
    }
}

/// Read-only ordered phase list, shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCatalog {
    phases: Vec<Phase>,
}

impl PhaseCatalog {
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for an empty list or duplicate ids.
    pub fn new(phases: Vec<Phase>) -> Result<Self, ConfigError> {
        if phases.is_empty() {
            return Err(ConfigError::Invalid {
                var: "AILVI_PHASES",
                reason: "at least one phase is required".to_owned(),
            });
        }
        let mut seen = BTreeSet::new();
        for phase in &phases {
            if !seen.insert(phase.id.as_str()) {
                return Err(ConfigError::Invalid {
                    var: "AILVI_PHASES",
                    reason: format!("duplicate phase id `{}`", phase.id),
                });
            }
        }
        Ok(Self { phases })
    }

    /// Parses `id:title;id:title`. A bare `id` doubles as its title.
    ///
    /// # Errors
    /// Same as [`PhaseCatalog::new`].
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let phases = spec
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((id, title)) => Phase::with_generic_instruction(id.trim(), title.trim()),
                None => Phase::with_generic_instruction(entry, entry),
            })
            .collect();
        Self::new(phases)
    }

    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.phases.iter().any(|p| p.id == id)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.id.as_str()).collect()
    }
}

impl Default for PhaseCatalog {
    fn default() -> Self {
        Self {
            phases: vec![
                Phase::new(
                    "meaning",
                    "Смысл и призвание",
                    "Помоги человеку нащупать, что для него наполнено смыслом: моменты, когда \
                     он чувствовал себя на своём месте, и к чему его тянет.",
                ),
                Phase::new(
                    "inner_state",
                    "Внутреннее состояние",
                    "Бережно расспроси о том, как человек себя чувствует сейчас: что даёт силы, \
                     что забирает, где напряжение.",
                ),
                Phase::new(
                    "values",
                    "Ценности",
                    "Помоги сформулировать личные ценности: что для человека важно, без чего он \
                     не готов жить, что возмущает и что вдохновляет.",
                ),
                Phase::new(
                    "strengths",
                    "Сильные стороны",
                    "Исследуй сильные стороны: что получается легко, за что благодарят другие, \
                     в чём человек бывает незаменим.",
                ),
                Phase::new(
                    "work",
                    "Отношения с работой и делом",
                    "Поговори о работе и деле: что в нынешнем занятии откликается, а что нет, \
                     каким могло бы быть дело мечты.",
                ),
                Phase::new(
                    "next_steps",
                    "Ясность в шагах",
                    "Помоги наметить один-два маленьких конкретных шага на ближайшие дни, \
                     опираясь на уже сказанное.",
                ),
            ],
        }
    }
}

/// Per-user progress through the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub user_id: UserId,
    pub current_phase_index: usize,
    pub completed_phases: BTreeSet<String>,
    pub free_text_note: String,
    pub offered_summary: bool,
    pub summary_delivered: bool,
    /// Generation-eligible messages spent against the free limit. Survives reset.
    pub messages_used: u32,
    pub updated_at: DateTime<Utc>,
}

impl PhaseState {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            current_phase_index: 0,
            completed_phases: BTreeSet::new(),
            free_text_note: String::new(),
            offered_summary: false,
            summary_delivered: false,
            messages_used: 0,
            updated_at: Utc::now(),
        }
    }

    /// Back to phase 0 with empty progress. The usage counter is kept.
    pub fn reset(&mut self) {
        let messages_used = self.messages_used;
        *self = Self::new(self.user_id.clone());
        self.messages_used = messages_used;
    }

    #[must_use]
    pub fn is_complete(&self, catalog: &PhaseCatalog) -> bool {
        catalog.phases().iter().all(|p| self.completed_phases.contains(&p.id))
    }

    /// Whether the first `count` phases of the catalogue are complete.
    #[must_use]
    pub fn foundation_complete(&self, catalog: &PhaseCatalog, count: usize) -> bool {
        catalog.phases().iter().take(count).all(|p| self.completed_phases.contains(&p.id))
    }

    #[must_use]
    pub const fn offer_pending(&self) -> bool {
        self.offered_summary && !self.summary_delivered
    }

    #[must_use]
    pub fn current_phase<'a>(&self, catalog: &'a PhaseCatalog) -> Option<&'a Phase> {
        catalog.get(self.current_phase_index)
    }

    /// Folds one classification result into the state.
    ///
    /// Unknown phase ids and `false` flags are ignored. Returns the ids that
    /// became complete with this call.
    pub fn apply_classification(
        &mut self,
        catalog: &PhaseCatalog,
        flags: &BTreeMap<String, bool>,
        note: Option<&str>,
    ) -> Vec<String> {
        let mut newly = Vec::new();
        for phase in catalog.phases() {
            if flags.get(&phase.id).copied().unwrap_or(false)
                && self.completed_phases.insert(phase.id.clone())
            {
                newly.push(phase.id.clone());
            }
        }
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            self.free_text_note = truncate_bytes(note, MAX_NOTE_BYTES).to_owned();
        }
        self.sync_index(catalog);
        self.updated_at = Utc::now();
        newly
    }

    /// Completes the current phase and moves to the next one, clamped at the
    /// last phase. Returns the id that was completed.
    pub fn advance_linear(&mut self, catalog: &PhaseCatalog) -> Option<String> {
        let phase = catalog.get(self.current_phase_index)?;
        let completed = self.completed_phases.insert(phase.id.clone()).then(|| phase.id.clone());
        let last = catalog.len().saturating_sub(1);
        self.current_phase_index = self.current_phase_index.saturating_add(1).min(last);
        self.updated_at = Utc::now();
        completed
    }

    /// Flips `offered_summary` if every phase is complete and no offer was
    /// made yet. Returns `true` only on the flipping call.
    pub fn try_offer(&mut self, catalog: &PhaseCatalog) -> bool {
        if self.offered_summary || !self.is_complete(catalog) {
            return false;
        }
        self.offered_summary = true;
        self.updated_at = Utc::now();
        true
    }

    /// Records a delivered summary. Refused unless an offer was made.
    pub fn mark_delivered(&mut self) -> bool {
        if !self.offered_summary {
            return false;
        }
        self.summary_delivered = true;
        self.updated_at = Utc::now();
        true
    }

    fn sync_index(&mut self, catalog: &PhaseCatalog) {
        let first_open = catalog
            .phases()
            .iter()
            .position(|p| !self.completed_phases.contains(&p.id))
            .unwrap_or_else(|| catalog.len().saturating_sub(1));
        self.current_phase_index = self.current_phase_index.max(first_open);
    }
}
