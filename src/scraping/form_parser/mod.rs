mod items;
mod meta;

use crate::core::antibot;
use crate::scraping::navigator::{dig_str, first_text};
use crate::types::*;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub use meta::MarkupMeta;

const ENTRY_ID_NOTE: &str = "An empty entry_id usually means the page was opened through an edit link; \
     use the public .../viewform URL without edit_requested=true.";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(
        "form data (FB_PUBLIC_LOAD_DATA_) not found: the form may be closed, \
         require sign-in, or its markup has changed"
    )]
    PayloadNotFound,

    #[error("form data is not valid JSON: {0}")]
    PayloadMalformed(#[from] serde_json::Error),

    #[error("could not locate the question list in the form data")]
    ItemsRootNotFound,
}

/// Recovers a typed question model from a public Google Form page.
pub struct FormParser {
    client: Client,
    timeout: Duration,
}

impl FormParser {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch `url` and extract its form model.
    pub async fn parse(&self, url: &str) -> Result<FormModel> {
        let html = self.fetch_html(url).await?;
        let form = Self::extract(&html, url)?;
        info!(
            "Parsed form {:?}: {} questions, {} markup entry ids",
            form.title.as_deref().unwrap_or(""),
            form.questions_count,
            form.meta.entry_ids.len()
        );
        Ok(form)
    }

    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).map_err(|e| anyhow!("Invalid URL '{}': {}", url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(anyhow!("URL must use HTTP or HTTPS protocol"));
        }

        let mut request = self
            .client
            .get(parsed)
            .header("User-Agent", antibot::get_random_user_agent())
            .timeout(self.timeout);
        for (name, value) in antibot::get_stealth_headers() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch form page {}", url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Form page {} returned HTTP {}", url, status));
        }
        response
            .text()
            .await
            .context("Failed to read form page body")
    }

    /// Build the form model from raw page markup. Deterministic for a given input.
    pub fn extract(markup: &str, source_url: &str) -> Result<FormModel, ExtractionError> {
        let document = Html::parse_document(markup);
        let meta = MarkupMeta::from_markup(markup, &document, source_url);
        let data = Self::extract_payload(markup)?;

        let title = dig_str(&data, &[1, 8])
            .map(str::to_string)
            .or_else(|| first_text(&data).map(str::to_string));
        let description = dig_str(&data, &[1, 0]).map(str::to_string);

        let items = Self::guess_items_root(&data)?;
        let mut markup_ids = meta.entry_ids.iter();
        let mut questions = Vec::new();

        for item in items.iter().filter(|v| v.is_array()) {
            let Some(raw_text) = Self::question_text(item) else {
                continue;
            };
            let text = unescape_html(&raw_text);

            let (choices, columns) = Self::extract_choices(item);
            let kind = Self::question_type(item, choices.as_deref(), columns.as_deref());

            let mut question = Question::new(text, kind);
            question.required = Self::is_required(item);
            question.choices_or_rows = choices.filter(|c| !c.is_empty());
            question.columns = columns;

            // markup order first, then label text, then numbers embedded in the item
            question.entry_id = markup_ids
                .next()
                .cloned()
                .or_else(|| meta.match_label(&question.text))
                .or_else(|| Self::entry_id_from_item(item));

            Self::strip_blank_options(&mut question);
            debug!(
                "question {:?} -> type={} entry_id={:?}",
                question.text, question.kind, question.entry_id
            );
            questions.push(question);
        }

        Ok(FormModel {
            title,
            description,
            questions_count: questions.len(),
            questions,
            meta: FormMeta {
                action: meta.action,
                fbzx: meta.fbzx,
                entry_ids: meta.entry_ids,
                label_map_size: meta.label_map.len(),
                note: ENTRY_ID_NOTE.to_string(),
            },
        })
    }

    /// Blank options never survive extraction; in a choice question they mean
    /// a free-text "other" exists.
    fn strip_blank_options(question: &mut Question) {
        let Some(choices) = question.choices_or_rows.as_mut() else {
            return;
        };
        if !choices.iter().any(|c| c.trim().is_empty()) {
            return;
        }
        choices.retain(|c| !c.trim().is_empty());
        if choices.is_empty() {
            question.choices_or_rows = None;
        }
        if !question.kind.is_choice_like() {
            return;
        }
        question.other_allowed = true;
        question.other_value = Some(OTHER_OPTION_VALUE.to_string());
        question.other_response_key = question.entry_id.as_deref().map(other_response_key);
    }
}

/// Decode HTML entities while leaving literal `<`/`>` alone.
///
/// Line endings are folded to `\n` and NUL characters dropped for every text.
pub(crate) fn unescape_html(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n").replace('\0', "");
    if !text.contains('&') {
        return text;
    }
    let guarded = text.replace('<', "&lt;").replace('>', "&gt;");
    Html::parse_fragment(&guarded)
        .root_element()
        .text()
        .collect()
}
