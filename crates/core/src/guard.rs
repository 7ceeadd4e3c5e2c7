//! Deterministic content guard for generated text.
//!
//! Matching is case-insensitive substring search over NFKC-normalised text,
//! so full-width or compatibility forms of a term still match. The guard never
//! rewrites with a model: a flagged text is replaced by a fixed message.

use unicode_normalization::UnicodeNormalization as _;

use crate::env_config::split_list;
use crate::persona::{BRIDGE_MESSAGE, SAFE_REDIRECT};

/// Backend identity and competitor names the persona must never surface.
const BASE_DENY_TERMS: &[&str] = &[
    "openai",
    "open ai",
    "chatgpt",
    "chat gpt",
    "gpt-3",
    "gpt-4",
    "gpt-5",
    "gpt4",
    "языковая модель",
    "языковой модели",
    "language model",
    "anthropic",
    "claude",
    "gemini",
    "google bard",
    "yandexgpt",
    "gigachat",
    "гигачат",
    "алиса от яндекса",
    "deepseek",
    "mistral",
    "llama",
];

/// Topics that are premature until the foundational phases are complete.
const BASE_STAGE_TERMS: &[&str] = &[
    "инвестиц",
    "вложи деньги",
    "вложить деньги",
    "криптовалют",
    "кредит",
    "ипотек",
    "зарплат",
    "уволься",
    "увольняйся",
    "смени работу",
    "открой бизнес",
    "открыть бизнес",
    "invest",
    "quit your job",
    "salary",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    pub flagged: bool,
    /// Text to deliver: the input when clean, a fixed message otherwise.
    pub safe_text: String,
    /// The list term that triggered, for logging.
    pub matched: Option<String>,
}

impl GuardVerdict {
    fn clean(text: &str) -> Self {
        Self { flagged: false, safe_text: text.to_owned(), matched: None }
    }

    fn flagged(replacement: &str, term: &str) -> Self {
        Self { flagged: true, safe_text: replacement.to_owned(), matched: Some(term.to_owned()) }
    }
}

#[derive(Debug, Clone)]
pub struct ContentGuard {
    deny: Vec<Box<str>>,
    stage: Vec<Box<str>>,
}

impl Default for ContentGuard {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl ContentGuard {
    /// Builds a guard from the built-in lists extended with `extra_deny` and
    /// `extra_stage`.
    #[must_use]
    pub fn new(extra_deny: &[String], extra_stage: &[String]) -> Self {
        Self {
            deny: build_list(BASE_DENY_TERMS, extra_deny),
            stage: build_list(BASE_STAGE_TERMS, extra_stage),
        }
    }

    /// Guard with exactly the given lists, no built-ins.
    #[must_use]
    pub fn with_terms(deny: &[&str], stage: &[&str]) -> Self {
        Self { deny: build_list(deny, &[]), stage: build_list(stage, &[]) }
    }

    /// Parses a comma-separated term list, as read from `AILVI_DENY_TERMS`.
    #[must_use]
    pub fn parse_terms(raw: &str) -> Vec<String> {
        split_list(raw, ',')
    }

    /// Deny-list check only.
    #[must_use]
    pub fn inspect(&self, text: &str) -> GuardVerdict {
        if text.trim().is_empty() {
            return GuardVerdict::clean(text.trim());
        }
        let normalized = normalize(text);
        match find_term(&self.deny, &normalized) {
            Some(term) => GuardVerdict::flagged(SAFE_REDIRECT, term),
            None => GuardVerdict::clean(text),
        }
    }

    /// Deny-list check plus the stage policy: restricted topics are flagged
    /// while `foundation_complete` is false. The deny-list wins when both hit.
    #[must_use]
    pub fn inspect_for_stage(&self, text: &str, foundation_complete: bool) -> GuardVerdict {
        let verdict = self.inspect(text);
        if verdict.flagged || foundation_complete || verdict.safe_text.is_empty() {
            return verdict;
        }
        let normalized = normalize(text);
        match find_term(&self.stage, &normalized) {
            Some(term) => GuardVerdict::flagged(BRIDGE_MESSAGE, term),
            None => verdict,
        }
    }
}

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

fn build_list(base: &[&str], extra: &[String]) -> Vec<Box<str>> {
    let mut terms: Vec<Box<str>> = base
        .iter()
        .map(|t| normalize(t))
        .chain(extra.iter().map(|t| normalize(t)))
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .map(String::into_boxed_str)
        .collect();
    terms.sort_unstable();
    terms.dedup();
    terms
}

fn find_term<'a>(terms: &'a [Box<str>], normalized: &str) -> Option<&'a str> {
    terms.iter().map(AsRef::as_ref).find(|t| normalized.contains(t))
}
