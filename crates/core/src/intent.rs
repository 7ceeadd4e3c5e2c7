//! Keyword/regex intent classification of inbound user text.
//!
//! Pure and context-free: the engine decides what an intent means given the
//! session state (an `Affirmative` only matters while an offer is pending).

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::DEFAULT_BEGIN_KEYWORD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Start (or restart) the guided flow.
    Begin,
    Affirmative,
    Negative,
    /// Asking what model or company is behind the bot.
    IdentityQuestion,
    /// Money or career talk that needs groundwork first.
    PrematureTopic,
    Ordinary,
}

#[expect(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static NEGATIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(нет|неа|не\s+сейчас|не\s+надо|не\s+хочу|не\s+готов\w*|позже|потом|later|not\s+now|no|nope)\b",
    )
    .unwrap()
});

#[expect(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static AFFIRMATIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(да|ага|угу|конечно|давай\w*|хочу|готов\w*|покажи|показывай|присылай|ок|окей|yes|yep|yeah|sure|show|ready|ok|okay)\b",
    )
    .unwrap()
});

#[expect(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static IDENTITY_QUESTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(кто\s+тебя\s+(создал|сделал|написал|разработал|обучил)|ты\s+(chat\s*gpt|gpt|нейросеть|робот|ии)\b|как(ая|ой)\s+ты\s+модель|на\s+какой\s+модели|who\s+(made|created|built|trained)\s+you|are\s+you\s+(chat\s*gpt|gpt|an?\s+ai|a\s+bot|a\s+robot)|what\s+model)",
    )
    .unwrap()
});

#[expect(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static PREMATURE_TOPIC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(деньг|денег|зараб|зарплат|доход|бизнес|инвест|карьер|подработ|money|salary|income|career|invest|business)",
    )
    .unwrap()
});

impl Intent {
    /// Classifies with the default begin keyword.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        IntentClassifier::default().classify(text)
    }

    /// Topic-only classification, ignoring begin/yes/no.
    #[must_use]
    pub fn classify_topic(text: &str) -> Self {
        if IDENTITY_QUESTION_REGEX.is_match(text) {
            Self::IdentityQuestion
        } else if PREMATURE_TOPIC_REGEX.is_match(text) {
            Self::PrematureTopic
        } else {
            Self::Ordinary
        }
    }

    #[must_use]
    pub const fn is_reply_to_offer(self) -> bool {
        matches!(self, Self::Affirmative | Self::Negative)
    }
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    begin_keyword: String,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BEGIN_KEYWORD)
    }
}

impl IntentClassifier {
    #[must_use]
    pub fn new(begin_keyword: &str) -> Self {
        Self { begin_keyword: begin_keyword.trim().to_lowercase() }
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> Intent {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Intent::Ordinary;
        }
        if !self.begin_keyword.is_empty() && trimmed.to_lowercase().starts_with(&self.begin_keyword)
        {
            return Intent::Begin;
        }
        if NEGATIVE_REGEX.is_match(trimmed) {
            return Intent::Negative;
        }
        if AFFIRMATIVE_REGEX.is_match(trimmed) {
            return Intent::Affirmative;
        }
        Intent::classify_topic(trimmed)
    }
}
