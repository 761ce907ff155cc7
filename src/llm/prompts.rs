use super::ChatMessage;
use crate::types::{Question, QuestionType};
use std::path::Path;
use tracing::{info, warn};

/// Used when no usable system prompt file is found.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You answer questionnaire items. Be brief and precise. Reply with JSON only, exactly as instructed.";

/// Read the system prompt once; a missing or blank file falls back to
/// [`DEFAULT_SYSTEM_PROMPT`] with a warning.
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            info!("System prompt loaded from {}", path.display());
            text.trim().to_string()
        }
        Ok(_) => {
            warn!(
                "System prompt file {} is empty, using the built-in prompt",
                path.display()
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            warn!(
                "Could not read system prompt from {}: {}; using the built-in prompt",
                path.display(),
                e
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

/// `[system, user]` messages asking for an `{"answer": ...}` object.
///
/// The user turn carries, blank-line separated: the shared section stem, the
/// recent Q/A history, the question and the reply format.
pub fn build_messages_for_question(
    system_prompt: &str,
    question: &Question,
    section_ctx: &str,
    history: &str,
) -> Vec<ChatMessage> {
    let mut blocks = Vec::new();
    if !section_ctx.trim().is_empty() {
        blocks.push(format!("Shared context:\n{}", section_ctx.trim()));
    }
    if !history.trim().is_empty() {
        blocks.push(history.trim().to_string());
    }
    blocks.push(format!("Question:\n{}", question.text.trim()));

    let options = question.options();
    let format = if question.kind.is_choice_like() && !options.is_empty() {
        let listed = options
            .iter()
            .map(|o| format!("- {}", o))
            .collect::<Vec<_>>()
            .join("\n");
        let shape = if question.kind == QuestionType::Checkboxes {
            "Pick one or more: {\"answer\": [\"OPTION_1\", \"OPTION_2\"]}"
        } else {
            "Pick exactly one: {\"answer\": \"ONE_OPTION_EXACTLY_AS_LISTED\"}"
        };
        format!("Options:\n{}\n\nReturn JSON only.\n{}", listed, shape)
    } else {
        "Return JSON only: {\"answer\": \"SHORT_TEXT\"}".to_string()
    };
    blocks.push(format);

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(blocks.join("\n\n")),
    ]
}
