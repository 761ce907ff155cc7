use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static OBJECT_SPAN: OnceLock<Regex> = OnceLock::new();

/// The `answer` field pulled out of a model completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAnswer {
    Text(String),
    List(Vec<String>),
}

impl ModelAnswer {
    /// First item for lists, the text otherwise.
    pub fn first(&self) -> Option<&str> {
        match self {
            ModelAnswer::Text(s) => Some(s.as_str()),
            ModelAnswer::List(items) => items.first().map(String::as_str),
        }
    }

    /// Single-line rendering; list items joined with `", "`.
    pub fn joined(&self) -> String {
        match self {
            ModelAnswer::Text(s) => s.clone(),
            ModelAnswer::List(items) => items.join(", "),
        }
    }
}

/// Read `{"answer": ...}` from a completion.
///
/// The whole reply is tried as JSON first, then the widest `{...}` span inside
/// it. Null, missing or nested-object answers yield `None`.
pub fn extract_answer(raw: &str) -> Option<ModelAnswer> {
    let object = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => return None,
        Err(_) => {
            let re = OBJECT_SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("object regex"));
            let span = re.find(raw)?;
            serde_json::from_str::<Value>(span.as_str()).ok()?
        }
    };
    answer_value(object.get("answer")?)
}

fn answer_value(v: &Value) -> Option<ModelAnswer> {
    match v {
        Value::Array(items) => Some(ModelAnswer::List(
            items.iter().filter_map(scalar_text).collect(),
        )),
        other => scalar_text(other).map(ModelAnswer::Text),
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
