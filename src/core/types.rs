use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel a choice field carries when the free-text "other" option is picked.
pub const OTHER_OPTION_VALUE: &str = "__other_option__";

/// Closed set of question kinds.
///
/// The first eight come from the form's own numeric type code. `Grid`, `Choice`
/// and `Text` are shape-based fallbacks used when that code is missing or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortAnswer,
    Paragraph,
    MultipleChoice,
    Dropdown,
    Checkboxes,
    LinearScale,
    Date,
    Time,
    Grid,
    Choice,
    Text,
}

impl QuestionType {
    /// Map the authoritative numeric type code (item index 3) to a tag.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(QuestionType::ShortAnswer),
            1 => Some(QuestionType::Paragraph),
            2 => Some(QuestionType::MultipleChoice),
            3 => Some(QuestionType::Dropdown),
            4 => Some(QuestionType::Checkboxes),
            5 => Some(QuestionType::LinearScale),
            7 => Some(QuestionType::Date),
            8 => Some(QuestionType::Time),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Paragraph => "paragraph",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Dropdown => "dropdown",
            QuestionType::Checkboxes => "checkboxes",
            QuestionType::LinearScale => "linear_scale",
            QuestionType::Date => "date",
            QuestionType::Time => "time",
            QuestionType::Grid => "grid",
            QuestionType::Choice => "choice",
            QuestionType::Text => "text",
        }
    }

    /// Types whose options may carry a blank "other" placeholder.
    pub fn is_choice_like(&self) -> bool {
        matches!(
            self,
            QuestionType::MultipleChoice
                | QuestionType::Dropdown
                | QuestionType::Checkboxes
                | QuestionType::Choice
        )
    }

    /// Exactly one declared option may be submitted.
    pub fn is_single_select(&self) -> bool {
        matches!(
            self,
            QuestionType::MultipleChoice | QuestionType::Dropdown | QuestionType::Choice
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recovered form question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Options for choice questions, rows for grids. Never contains blanks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices_or_rows: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Numeric part of the `entry.<id>` wire key. `None` means unanswerable.
    pub entry_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub other_allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_response_key: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, kind: QuestionType) -> Self {
        Self {
            text: text.into(),
            kind,
            required: None,
            choices_or_rows: None,
            columns: None,
            entry_id: None,
            other_allowed: false,
            other_value: None,
            other_response_key: None,
        }
    }

    /// Declared options (empty slice when there are none).
    pub fn options(&self) -> &[String] {
        self.choices_or_rows.as_deref().unwrap_or(&[])
    }
}

/// Wire key for a field identifier.
pub fn field_key(entry_id: &str) -> String {
    format!("entry.{}", entry_id)
}

/// Companion wire key carrying the free text of an "other" answer.
pub fn other_response_key(entry_id: &str) -> String {
    format!("entry.{}.other_option_response", entry_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FormMeta {
    /// Submission target (`.../formResponse`).
    pub action: String,
    /// Anti-forgery token; empty when the page carried none.
    pub fbzx: String,
    /// Field identifiers in first-seen markup order.
    pub entry_ids: Vec<String>,
    pub label_map_size: usize,
    pub note: String,
}

/// Extractor output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormModel {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions_count: usize,
    pub questions: Vec<Question>,
    pub meta: FormMeta,
}

/// A value stored per question in the answer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// Checkbox selections, submitted as one pair per item.
    Choices(Vec<String>),
    /// Free-text "other" answer, optionally alongside ordinary checkbox picks.
    Other {
        other: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        selected: Vec<String>,
    },
    Text(String),
}

impl Answer {
    pub fn other(text: impl Into<String>) -> Self {
        Answer::Other {
            other: text.into(),
            selected: Vec::new(),
        }
    }

    pub fn other_with(text: impl Into<String>, selected: Vec<String>) -> Self {
        Answer::Other {
            other: text.into(),
            selected,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Text(s) => f.write_str(s),
            Answer::Choices(items) => f.write_str(&items.join(", ")),
            Answer::Other { other, selected } => {
                if selected.is_empty() {
                    f.write_str(other)
                } else {
                    write!(f, "{}, {}", selected.join(", "), other)
                }
            }
        }
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Answer::Text(value.to_string())
    }
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        Answer::Text(value)
    }
}

impl From<Vec<String>> for Answer {
    fn from(value: Vec<String>) -> Self {
        Answer::Choices(value)
    }
}

impl From<Vec<&str>> for Answer {
    fn from(value: Vec<&str>) -> Self {
        Answer::Choices(value.into_iter().map(str::to_string).collect())
    }
}

/// Ordered wire pairs plus the URL they are posted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubmissionPayload {
    pub action: String,
    /// Keys may repeat (checkbox multi-select).
    pub pairs: Vec<(String, String)>,
}

impl SubmissionPayload {
    /// Pairs addressed to form fields (the token excluded).
    pub fn entry_pairs(&self) -> impl Iterator<Item = &(String, String)> {
        self.pairs.iter().filter(|(k, _)| k.starts_with("entry."))
    }
}
