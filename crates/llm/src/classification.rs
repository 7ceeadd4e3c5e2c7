//! Phase classification pass: which catalogue phases did the recent window
//! meaningfully address?

use std::collections::BTreeMap;

use ailvi_core::{PhaseCatalog, Turn, parse_model_json};
use serde::Deserialize;

use crate::ai_types::Message;
use crate::error::LlmError;
use crate::generator::{GenerationParams, Generator};

const CLASSIFY_MAX_TOKENS: u32 = 300;

/// Parsed classification result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseClassification {
    /// Only ids from the catalogue; unknown ids are dropped while parsing.
    pub flags: BTreeMap<String, bool>,
    pub note: Option<String>,
}

#[derive(Deserialize)]
struct ClassificationJson {
    #[serde(default)]
    phases: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    note: Option<String>,
}

/// Builds the classification request for the last turns of a session.
#[must_use]
pub fn build_classification_messages(
    catalog: &PhaseCatalog,
    window: &[Turn],
    previous_note: &str,
) -> Vec<Message> {
    let phase_list = catalog
        .phases()
        .iter()
        .map(|p| format!("- \"{}\": {}", p.id, p.title))
        .collect::<Vec<_>>()
        .join("\n");
    let example = catalog
        .phases()
        .iter()
        .map(|p| format!("\"{}\": false", p.id))
        .collect::<Vec<_>>()
        .join(", ");

    let system = format!(
        r#"Ты анализируешь фрагмент диалога проводника с человеком.
Для каждой темы из списка определи, была ли она по существу раскрыта человеком в этом фрагменте
(не просто упомянута, а человек рассказал о себе что-то содержательное).

Темы:
{phase_list}

Верни строго JSON без пояснений:
{{"phases": {{{example}}}, "note": "одна-две фразы о том, что важно помнить о человеке"}}"#
    );

    let transcript = window
        .iter()
        .map(|t| format!("{}: {}", t.role.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n");

    let mut user = String::new();
    if !previous_note.trim().is_empty() {
        user.push_str("Прежняя заметка: ");
        user.push_str(previous_note.trim());
        user.push_str("\n\n");
    }
    user.push_str("Фрагмент:\n");
    user.push_str(&transcript);

    vec![Message::system(system), Message::user(user)]
}

/// Parses model output into a [`PhaseClassification`].
///
/// Accepts booleans and the strings `"true"`/`"false"`; anything else for a
/// phase is treated as `false`. Ids not in the catalogue are ignored.
///
/// # Errors
/// Returns [`LlmError::JsonParse`] if no JSON object can be recovered, and
/// [`LlmError::MissingField`] if it has no `phases` map at all.
pub fn parse_classification(
    content: &str,
    catalog: &PhaseCatalog,
) -> Result<PhaseClassification, LlmError> {
    let raw: serde_json::Value = parse_model_json(content).map_err(|e| LlmError::JsonParse {
        context: format!("phase classification ({})", ailvi_core::truncate_bytes(content, 200)),
        source: e,
    })?;
    if raw.get("phases").is_none_or(|p| !p.is_object()) {
        return Err(LlmError::MissingField("phases".to_owned()));
    }
    let parsed: ClassificationJson =
        serde_json::from_value(raw).map_err(|e| LlmError::JsonParse {
            context: "phase classification shape".to_owned(),
            source: e,
        })?;

    let flags = parsed
        .phases
        .into_iter()
        .filter(|(id, _)| catalog.contains(id))
        .map(|(id, v)| {
            let done = match v {
                serde_json::Value::Bool(b) => b,
                serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
                _ => false,
            };
            (id, done)
        })
        .collect();

    let note = parsed.note.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
    Ok(PhaseClassification { flags, note })
}

/// Runs one classification pass.
///
/// # Errors
/// Propagates generation and parse failures; callers leave phase state
/// untouched on error.
pub async fn classify_phases(
    generator: &dyn Generator,
    catalog: &PhaseCatalog,
    window: &[Turn],
    previous_note: &str,
) -> Result<PhaseClassification, LlmError> {
    let messages = build_classification_messages(catalog, window, previous_note);
    let content = generator
        .generate(&messages, &GenerationParams::structured(CLASSIFY_MAX_TOKENS))
        .await?;
    parse_classification(&content, catalog)
}
