use crate::types::*;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    #[error("unknown field entry.{0}")]
    UnknownField(String),

    #[error("{values:?} not among the options of entry.{entry_id} and \"other\" is not allowed")]
    InvalidOption {
        entry_id: String,
        values: Vec<String>,
    },
}

/// Answers keyed by field identifier, validated against the extracted questions.
///
/// In strict mode invalid input is an error; in lenient mode it is dropped and
/// the previous state is left as it was.
#[derive(Debug, Clone)]
pub struct AnswerSet {
    strict: bool,
    action: String,
    fbzx: String,
    questions: IndexMap<String, Question>,
    answers: IndexMap<String, Answer>,
}

impl AnswerSet {
    pub fn new(form: &FormModel, strict: bool) -> Self {
        let questions = form
            .questions
            .iter()
            .filter_map(|q| q.entry_id.clone().map(|id| (id, q.clone())))
            .collect();
        Self {
            strict,
            action: form.meta.action.clone(),
            fbzx: form.meta.fbzx.clone(),
            questions,
            answers: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn get(&self, entry_id: &str) -> Option<&Answer> {
        self.answers.get(entry_id)
    }

    pub fn question(&self, entry_id: &str) -> Option<&Question> {
        self.questions.get(entry_id)
    }

    /// Declared options of a question; empty for unknown ids and free-text types.
    pub fn available_options(&self, entry_id: &str) -> &[String] {
        self.questions
            .get(entry_id)
            .map(Question::options)
            .unwrap_or(&[])
    }

    /// Answerable questions with nothing stored yet, in form order.
    pub fn iter_unanswered(&self) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .filter(|(id, _)| !self.answers.contains_key(id.as_str()))
            .map(|(_, q)| q)
    }

    /// Validate `value` against the question's type and options and store it.
    /// Setting an id again replaces its answer but keeps its original position.
    pub fn set_answer(
        &mut self,
        entry_id: &str,
        value: impl Into<Answer>,
    ) -> Result<(), AnswerError> {
        let value = value.into();
        let Some(question) = self.questions.get(entry_id) else {
            return self.reject(AnswerError::UnknownField(entry_id.to_string()));
        };

        let stored = match value {
            // explicit "other" records are taken as given
            other @ Answer::Other { .. } => other,
            value if question.kind.is_single_select() => {
                match Self::single_select(question, value) {
                    Ok(answer) => answer,
                    Err(values) => {
                        return self.reject(AnswerError::InvalidOption {
                            entry_id: entry_id.to_string(),
                            values,
                        })
                    }
                }
            }
            value if question.kind == QuestionType::Checkboxes => {
                match Self::checkboxes(question, value, self.strict) {
                    Ok(Some(answer)) => answer,
                    Ok(None) => return Ok(()),
                    Err(values) => {
                        return Err(AnswerError::InvalidOption {
                            entry_id: entry_id.to_string(),
                            values,
                        })
                    }
                }
            }
            Answer::Choices(items) => Answer::Text(items.join(", ")),
            text => text,
        };

        debug!("[entry.{}] stored {:?}", entry_id, stored);
        self.answers.insert(entry_id.to_string(), stored);
        Ok(())
    }

    fn reject(&self, err: AnswerError) -> Result<(), AnswerError> {
        if self.strict {
            Err(err)
        } else {
            debug!("ignored in lenient mode: {}", err);
            Ok(())
        }
    }

    fn single_select(question: &Question, value: Answer) -> Result<Answer, Vec<String>> {
        match value {
            Answer::Text(s) if question.options().contains(&s) => Ok(Answer::Text(s)),
            Answer::Text(s) if question.other_allowed => Ok(Answer::other(s)),
            Answer::Text(s) => Err(vec![s]),
            Answer::Choices(items) => Err(items),
            other @ Answer::Other { .. } => Ok(other),
        }
    }

    /// `Ok(None)` leaves the stored answer untouched.
    fn checkboxes(
        question: &Question,
        value: Answer,
        strict: bool,
    ) -> Result<Option<Answer>, Vec<String>> {
        let items = match value {
            Answer::Text(s) => vec![s],
            Answer::Choices(items) => items,
            other @ Answer::Other { .. } => return Ok(Some(other)),
        };
        let (selected, unknown): (Vec<String>, Vec<String>) = items
            .into_iter()
            .partition(|v| question.options().contains(v));

        if unknown.is_empty() {
            return Ok(Some(Answer::Choices(selected)));
        }
        if question.other_allowed {
            return Ok(Some(Answer::other_with(unknown.join("; "), selected)));
        }
        if strict {
            return Err(unknown);
        }
        debug!("dropping undeclared checkbox values {:?}", unknown);
        Ok((!selected.is_empty()).then_some(Answer::Choices(selected)))
    }

    /// Ordered wire pairs: the `fbzx` token first (when present), then every
    /// stored answer in insertion order.
    pub fn build_submission_pairs(&self) -> SubmissionPayload {
        let mut pairs = Vec::with_capacity(self.answers.len() + 1);
        if !self.fbzx.is_empty() {
            pairs.push(("fbzx".to_string(), self.fbzx.clone()));
        }

        for (id, answer) in &self.answers {
            let key = field_key(id);
            match answer {
                Answer::Other { other, selected } => {
                    let question = self.questions.get(id);
                    let flag = question
                        .and_then(|q| q.other_value.clone())
                        .unwrap_or_else(|| OTHER_OPTION_VALUE.to_string());
                    let other_key = question
                        .and_then(|q| q.other_response_key.clone())
                        .unwrap_or_else(|| other_response_key(id));
                    pairs.push((key.clone(), flag));
                    pairs.push((other_key, other.clone()));
                    pairs.extend(selected.iter().map(|s| (key.clone(), s.clone())));
                }
                Answer::Choices(items) => {
                    pairs.extend(items.iter().map(|s| (key.clone(), s.clone())));
                }
                Answer::Text(s) => pairs.push((key, s.clone())),
            }
        }

        SubmissionPayload {
            action: self.action.clone(),
            pairs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, kind: QuestionType, options: &[&str], other: bool) -> Question {
        let mut q = Question::new(format!("Question {}", id), kind);
        q.entry_id = Some(id.to_string());
        if !options.is_empty() {
            q.choices_or_rows = Some(options.iter().map(|s| s.to_string()).collect());
        }
        if other {
            q.other_allowed = true;
            q.other_value = Some(OTHER_OPTION_VALUE.to_string());
            q.other_response_key = Some(other_response_key(id));
        }
        q
    }

    fn form(questions: Vec<Question>) -> FormModel {
        FormModel {
            title: Some("T".into()),
            description: None,
            questions_count: questions.len(),
            questions,
            meta: FormMeta {
                action: "https://example.com/formResponse".into(),
                fbzx: "tok".into(),
                ..FormMeta::default()
            },
        }
    }

    fn sample(strict: bool) -> AnswerSet {
        AnswerSet::new(
            &form(vec![
                question("1", QuestionType::MultipleChoice, &["Yes", "No"], false),
                question("2", QuestionType::Dropdown, &["Red", "Blue"], true),
                question("3", QuestionType::Checkboxes, &["A", "B", "C"], true),
                question("4", QuestionType::Checkboxes, &["A", "B"], false),
                question("5", QuestionType::ShortAnswer, &[], false),
            ]),
            strict,
        )
    }

    #[test]
    fn single_select_accepts_declared_or_other() {
        let mut set = sample(true);
        set.set_answer("1", "Yes").unwrap();
        set.set_answer("2", "Green").unwrap();
        assert_eq!(set.get("1"), Some(&Answer::Text("Yes".into())));
        assert_eq!(set.get("2"), Some(&Answer::other("Green")));
        assert_eq!(
            set.set_answer("1", "Maybe"),
            Err(AnswerError::InvalidOption {
                entry_id: "1".into(),
                values: vec!["Maybe".into()]
            })
        );
    }

    #[test]
    fn checkbox_other_pairs_in_order() {
        let mut set = sample(true);
        set.set_answer("3", vec!["A", "X"]).unwrap();
        let payload = set.build_submission_pairs();
        let pairs: Vec<(&str, &str)> = payload
            .entry_pairs()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("entry.3", OTHER_OPTION_VALUE),
                ("entry.3.other_option_response", "X"),
                ("entry.3", "A"),
            ]
        );
    }

    #[test]
    fn strict_and_lenient_undeclared_checkbox() {
        let mut strict = sample(true);
        assert!(matches!(
            strict.set_answer("4", vec!["A", "Z"]),
            Err(AnswerError::InvalidOption { .. })
        ));
        assert!(strict.get("4").is_none());

        let mut lenient = sample(false);
        lenient.set_answer("4", vec!["B"]).unwrap();
        lenient.set_answer("4", vec!["Z"]).unwrap();
        assert_eq!(lenient.get("4"), Some(&Answer::from(vec!["B"])));
        lenient.set_answer("4", vec!["A", "Z"]).unwrap();
        assert_eq!(lenient.get("4"), Some(&Answer::from(vec!["A"])));
        lenient.set_answer("1", "Nope").unwrap();
        assert!(lenient.get("1").is_none());
    }

    #[test]
    fn unknown_field_strict_vs_lenient() {
        let mut strict = sample(true);
        assert_eq!(
            strict.set_answer("999", "x"),
            Err(AnswerError::UnknownField("999".into()))
        );
        let mut lenient = sample(false);
        assert!(lenient.set_answer("999", "x").is_ok());
        assert!(lenient.is_empty());
    }

    #[test]
    fn explicit_other_record_is_verbatim() {
        let mut set = sample(true);
        set.set_answer("1", Answer::other("Free")).unwrap();
        set.set_answer("4", Answer::other_with("Z", vec!["Q".into()]))
            .unwrap();
        let pairs = set.build_submission_pairs().pairs;
        assert!(pairs.contains(&("entry.1.other_option_response".into(), "Free".into())));
        assert!(pairs.contains(&("entry.4".into(), "Q".into())));
    }

    #[test]
    fn other_types_store_strings_and_token_leads() {
        let mut set = sample(true);
        set.set_answer("5", vec!["x", "y"]).unwrap();
        set.set_answer("1", "No").unwrap();
        set.set_answer("5", "final").unwrap();
        let payload = set.build_submission_pairs();
        assert_eq!(payload.action, "https://example.com/formResponse");
        assert_eq!(
            payload.pairs,
            vec![
                ("fbzx".to_string(), "tok".to_string()),
                ("entry.5".to_string(), "final".to_string()),
                ("entry.1".to_string(), "No".to_string()),
            ]
        );
    }

    #[test]
    fn unanswered_and_options() {
        let mut set = sample(true);
        set.set_answer("1", "Yes").unwrap();
        let ids: Vec<_> = set
            .iter_unanswered()
            .filter_map(|q| q.entry_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["2", "3", "4", "5"]);
        assert_eq!(set.available_options("2"), ["Red".to_string(), "Blue".to_string()]);
        assert!(set.available_options("5").is_empty());
        assert!(set.available_options("nope").is_empty());
        assert_eq!(set.len(), 1);
    }
}
