//! Prompts and parsers for the summary map/merge/synthesis steps.

use std::collections::HashSet;

use ailvi_core::{Turn, parse_model_json};
use serde::{Deserialize, Serialize};

use crate::ai_types::Message;
use crate::error::LlmError;
use crate::generator::{GenerationParams, Generator};

const EXTRACT_MAX_TOKENS: u32 = 900;
const MERGE_MAX_TOKENS: u32 = 1200;
const SYNTHESIS_MAX_TOKENS: u32 = 1500;
const SYNTHESIS_TEMPERATURE: f32 = 0.6;

/// Structured observations about a person, extracted from one chunk of
/// history or merged across chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFacts {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub motifs: Vec<String>,
    /// Verbatim phrases of the person.
    #[serde(default)]
    pub quotes: Vec<String>,
}

impl SummaryFacts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.strengths.is_empty()
            && self.interests.is_empty()
            && self.motifs.is_empty()
            && self.quotes.is_empty()
    }

    /// Local order-preserving set union. Items are compared trimmed and
    /// case-insensitively; the first spelling wins.
    #[must_use]
    pub fn union(parts: &[Self]) -> Self {
        Self {
            values: union_field(parts.iter().map(|p| &p.values)),
            strengths: union_field(parts.iter().map(|p| &p.strengths)),
            interests: union_field(parts.iter().map(|p| &p.interests)),
            motifs: union_field(parts.iter().map(|p| &p.motifs)),
            quotes: union_field(parts.iter().map(|p| &p.quotes)),
        }
    }

    fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn union_field<'a>(lists: impl Iterator<Item = &'a Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in lists.flatten() {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            out.push(item.to_owned());
        }
    }
    out
}

const FACTS_SHAPE: &str = r#"{"values": [], "strengths": [], "interests": [], "motifs": [], "quotes": []}"#;

fn parse_facts(content: &str, context: &str) -> Result<SummaryFacts, LlmError> {
    parse_model_json::<SummaryFacts>(content).map_err(|e| LlmError::JsonParse {
        context: format!("{context} ({})", ailvi_core::truncate_bytes(content, 200)),
        source: e,
    })
}

/// Map step: observations from one ordered chunk of history.
#[must_use]
pub fn build_extraction_messages(chunk: &[Turn]) -> Vec<Message> {
    let transcript = chunk
        .iter()
        .map(|t| format!("{}: {}", t.role.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n");
    let system = format!(
        "Ты внимательно читаешь фрагмент диалога проводника с человеком и выписываешь только то, \
         что человек сказал о себе. Ничего не придумывай.\n\
         values: ценности; strengths: сильные стороны; interests: интересы и то, что вдохновляет; \
         motifs: повторяющиеся темы; quotes: короткие дословные фразы человека.\n\
         Верни строго JSON вида {FACTS_SHAPE}"
    );
    vec![Message::system(system), Message::user(transcript)]
}

/// Reduce step: reconcile several payloads into one deduplicated payload.
#[must_use]
pub fn build_merge_messages(parts: &[SummaryFacts]) -> Vec<Message> {
    let payloads =
        parts.iter().map(SummaryFacts::to_prompt_json).collect::<Vec<_>>().join("\n---\n");
    let system = format!(
        "Объедини несколько наборов наблюдений о человеке в один. Убери повторы и \
         перефразирования одного и того же, сохрани формулировки человека. Не добавляй новое.\n\
         Верни строго JSON вида {FACTS_SHAPE}"
    );
    vec![Message::system(system), Message::user(payloads)]
}

/// Final narrative in the fixed section template.
#[must_use]
pub fn build_synthesis_messages(facts: &SummaryFacts, persona: &str) -> Vec<Message> {
    let system = format!(
        "{persona}\n\nНапиши человеку тёплый итоговый портрет по наблюдениям ниже. \
         Строго четыре раздела с заголовками в <b></b>:\n\
         <b>1. Твои ценности</b>\n<b>2. Твои сильные стороны</b>\n\
         <b>3. Что тебя вдохновляет</b>\n<b>4. Ближайшие шаги</b>\n\
         В каждом разделе 2-4 пункта, опирайся на слова человека, в шагах предложи 2-3 \
         маленьких конкретных действия на ближайшую неделю."
    );
    vec![Message::system(system), Message::user(facts.to_prompt_json())]
}

/// # Errors
/// Generation or parse failure; the caller drops the chunk.
pub async fn extract_chunk(
    generator: &dyn Generator,
    chunk: &[Turn],
) -> Result<SummaryFacts, LlmError> {
    let content = generator
        .generate(&build_extraction_messages(chunk), &GenerationParams::structured(EXTRACT_MAX_TOKENS))
        .await?;
    parse_facts(&content, "summary chunk extraction")
}

/// # Errors
/// Generation or parse failure; the caller falls back to [`SummaryFacts::union`].
pub async fn merge_facts(
    generator: &dyn Generator,
    parts: &[SummaryFacts],
) -> Result<SummaryFacts, LlmError> {
    let content = generator
        .generate(&build_merge_messages(parts), &GenerationParams::structured(MERGE_MAX_TOKENS))
        .await?;
    parse_facts(&content, "summary merge")
}

/// # Errors
/// Generation failure or an empty narrative.
pub async fn synthesize(
    generator: &dyn Generator,
    facts: &SummaryFacts,
    persona: &str,
) -> Result<String, LlmError> {
    let params = GenerationParams {
        temperature: SYNTHESIS_TEMPERATURE,
        max_tokens: SYNTHESIS_MAX_TOKENS,
        json: false,
    };
    let text = generator.generate(&build_synthesis_messages(facts, persona), &params).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_owned())
}
