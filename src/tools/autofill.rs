use crate::core::config::ScoutConfig;
use crate::features::section_context::{is_section_heading, make_section_context_map};
use crate::features::QaCache;
use crate::llm::prompts::build_messages_for_question;
use crate::llm::{ChatMessage, ChatOptions, ChatProvider};
use crate::nlp::{extract_answer, resolve_multiple, resolve_single, ModelAnswer};
use crate::scraping::FormParser;
use crate::tools::answer_builder::AnswerSet;
use crate::tools::submit::submit_payload;
use crate::types::*;
use crate::AppState;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AutofillOptions {
    pub strict: bool,
    pub delay: Duration,
    pub submit: bool,
    pub reset_on_new_section: bool,
    pub chat: ChatOptions,
    /// Sent as `Referer` on submission; `answer_form` fills in the form URL.
    pub referer: Option<String>,
}

impl AutofillOptions {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            strict: config.resolve_strict(),
            delay: config.resolve_delay(),
            submit: false,
            reset_on_new_section: config.resolve_reset_on_new_section(),
            chat: ChatOptions {
                temperature: config.resolve_temperature(),
                max_tokens: None,
            },
            referer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnsweredQuestion {
    pub entry_id: String,
    pub question: String,
    pub answer: Answer,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedQuestion {
    pub entry_id: Option<String>,
    pub question: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutofillReport {
    pub title: Option<String>,
    pub answered: Vec<AnsweredQuestion>,
    pub skipped: Vec<SkippedQuestion>,
    pub payload: SubmissionPayload,
    /// HTTP status of the accepted submission, when one was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_status: Option<u16>,
}

/// Fetch and parse `url`, then answer it with `provider`.
pub async fn answer_form(
    state: &AppState,
    provider: &dyn ChatProvider,
    url: &str,
    mut options: AutofillOptions,
) -> Result<AutofillReport> {
    let parser = FormParser::new(
        state.http_client.clone(),
        state.config.resolve_form_timeout(),
    );
    let form = parser.parse(url).await?;
    if options.referer.is_none() {
        options.referer = Some(url.to_string());
    }
    answer_parsed_form(state, provider, &form, &options).await
}

/// Ask the model about every answerable question in order and assemble the
/// submission payload.
///
/// Per-question failures are recorded in the report and the run goes on;
/// a failed preflight, rejected credentials or a failed submission end it.
pub async fn answer_parsed_form(
    state: &AppState,
    provider: &dyn ChatProvider,
    form: &FormModel,
    options: &AutofillOptions,
) -> Result<AutofillReport> {
    preflight(provider).await?;

    let config = &state.config;
    let mut answers = AnswerSet::new(form, options.strict);
    let mut cache = QaCache::new(
        config.resolve_qa_cache_path(),
        config.resolve_qa_cache_max_pairs(),
        config.resolve_qa_cache_max_chars(),
    );
    let section_map = make_section_context_map(&form.questions);
    let mut answered = Vec::new();
    let mut skipped = Vec::new();

    let total = form.questions.len();
    for (idx, question) in form.questions.iter().enumerate() {
        let Some(entry_id) = question.entry_id.as_deref() else {
            skipped.push(SkippedQuestion {
                entry_id: None,
                question: question.text.clone(),
                reason: "no field identifier".to_string(),
            });
            continue;
        };

        if options.reset_on_new_section && is_section_heading(&question.text) {
            cache.clear();
        }

        let messages = build_messages_for_question(
            &state.system_prompt,
            question,
            section_map.get(entry_id).map(String::as_str).unwrap_or(""),
            &cache.as_text(),
        );

        match answer_one(provider, question, &messages, options).await {
            Ok(value) => match answers.set_answer(entry_id, value.clone()) {
                Ok(()) => {
                    info!("[entry.{}] OK -> {} ({})", entry_id, value, short(&question.text));
                    cache.add(&question.text, &value);
                    answered.push(AnsweredQuestion {
                        entry_id: entry_id.to_string(),
                        question: question.text.clone(),
                        answer: value,
                    });
                }
                Err(e) => {
                    warn!("[entry.{}] answer rejected: {}", entry_id, e);
                    skipped.push(skip(entry_id, question, e.to_string()));
                }
            },
            Err(Skip::Fatal(e)) => return Err(e),
            Err(Skip::Question(reason)) => {
                warn!("[entry.{}] skipped: {}", entry_id, reason);
                skipped.push(skip(entry_id, question, reason));
            }
        }

        if !options.delay.is_zero() && idx + 1 < total {
            tokio::time::sleep(options.delay).await;
        }
    }

    let payload = answers.build_submission_pairs();
    info!(
        "Payload for {} holds {} pairs ({} answered, {} skipped)",
        payload.action,
        payload.pairs.len(),
        answered.len(),
        skipped.len()
    );

    let submission_status = if options.submit {
        let status = submit_payload(
            &state.http_client,
            &payload,
            options.referer.as_deref(),
            config.resolve_form_timeout(),
        )
        .await
        .context("Form submission failed")?;
        Some(status.as_u16())
    } else {
        None
    };

    Ok(AutofillReport {
        title: form.title.clone(),
        answered,
        skipped,
        payload,
        submission_status,
    })
}

enum Skip {
    Question(String),
    Fatal(anyhow::Error),
}

async fn answer_one(
    provider: &dyn ChatProvider,
    question: &Question,
    messages: &[ChatMessage],
    options: &AutofillOptions,
) -> Result<Answer, Skip> {
    let reply = match provider.chat(messages, &options.chat).await {
        Ok(reply) => reply,
        Err(e) if e.is_auth() => {
            return Err(Skip::Fatal(
                anyhow!(e).context(format!("{} rejected the credentials", provider.name())),
            ))
        }
        Err(e) => return Err(Skip::Question(format!("LLM request failed: {}", e))),
    };

    let parsed = extract_answer(&reply)
        .ok_or_else(|| Skip::Question(format!("no JSON answer in reply {:?}", short(&reply))))?;
    reconcile_answer(question, &parsed)
        .ok_or_else(|| Skip::Question(format!("reply {:?} matches no option", parsed.joined())))
}

/// Turn the model's answer into a value for the answer set, following the
/// question type. Unmatched replies fall back to "other" when the question
/// has one.
pub fn reconcile_answer(question: &Question, parsed: &ModelAnswer) -> Option<Answer> {
    let options = question.options();
    if options.is_empty() || !question.kind.is_choice_like() {
        let text = parsed.joined();
        let text = text.trim();
        return (!text.is_empty()).then(|| Answer::from(text));
    }

    let matched = if question.kind == QuestionType::Checkboxes {
        let picked = match parsed {
            ModelAnswer::Text(text) => resolve_multiple(text, options),
            ModelAnswer::List(items) => {
                let mut picked: Vec<&str> = Vec::new();
                for found in items.iter().filter_map(|i| resolve_single(i, options)) {
                    if !picked.contains(&found) {
                        picked.push(found);
                    }
                }
                (!picked.is_empty()).then_some(picked)
            }
        };
        picked.map(Answer::from)
    } else {
        parsed
            .first()
            .and_then(|text| resolve_single(text, options))
            .map(Answer::from)
    };

    matched.or_else(|| {
        let raw = parsed.first()?.trim();
        (question.other_allowed && !raw.is_empty()).then(|| Answer::other(raw))
    })
}

async fn preflight(provider: &dyn ChatProvider) -> Result<()> {
    match provider.list_models().await {
        Ok(models) => info!(
            "{} exposes {} models (e.g. {:?}); using {}",
            provider.name(),
            models.len(),
            models.iter().take(5).collect::<Vec<_>>(),
            provider.model()
        ),
        Err(e) => warn!("{}: listing models failed: {}", provider.name(), e),
    }

    let ping = [
        ChatMessage::system("Reply with one word."),
        ChatMessage::user("ping"),
    ];
    let reply = provider
        .chat(
            &ping,
            &ChatOptions {
                temperature: 0.0,
                max_tokens: Some(8),
            },
        )
        .await
        .with_context(|| format!("{} chat check failed", provider.name()))?;
    info!("{} chat check OK: {:?}", provider.name(), short(&reply));
    Ok(())
}

fn skip(entry_id: &str, question: &Question, reason: String) -> SkippedQuestion {
    SkippedQuestion {
        entry_id: Some(entry_id.to_string()),
        question: question.text.clone(),
        reason,
    }
}

/// First line, at most 80 characters.
fn short(text: &str) -> String {
    text.lines().next().unwrap_or("").chars().take(80).collect()
}
