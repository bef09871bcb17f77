//! Submission records and answer normalization.
//!
//! A [`SubmissionRecord`] is one external survey response exactly as the
//! API returned it — immutable once fetched. Normalization projects it
//! into a [`CleanedRecord`]: a flat, deterministic `field id → string`
//! mapping with whitespace-sane text values, which is what the processed
//! table and the summary are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text values longer than this are truncated; guards the sink against
/// pathological payloads.
const MAX_TEXT_LEN: usize = 50_000;

/// One survey response as returned by the forms API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub response_id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub landing_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub answers: Vec<RawAnswer>,
}

/// One typed answer inside a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnswer {
    pub field: FieldRef,
    #[serde(flatten)]
    pub value: AnswerValue,
}

/// Reference to the question a value answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRef {
    pub id: String,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

/// The typed answer payloads the API produces. Unknown types degrade to
/// an empty value rather than failing the whole fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerValue {
    Text { text: String },
    Email { email: String },
    Url { url: String },
    Number { number: f64 },
    Boolean { boolean: bool },
    Choice { choice: ChoiceLabel },
    Choices { choices: Vec<ChoiceLabel> },
    Date { date: String },
    FileUrl { file_url: String },
    #[serde(other)]
    Unknown,
}

/// A selected choice: a predefined label or free-text "other".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChoiceLabel {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub other: Option<String>,
}

impl ChoiceLabel {
    fn display(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.other.clone())
            .unwrap_or_default()
    }
}

/// A submission projected to a flat field → value mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub response_id: String,
    pub submitted_at: DateTime<Utc>,
    pub landing_id: String,
    pub token: String,
    /// BTreeMap for deterministic column ordering downstream.
    pub answers: BTreeMap<String, String>,
}

impl CleanedRecord {
    /// A response with at least one answer counts as completed.
    pub fn is_completed(&self) -> bool {
        !self.answers.is_empty()
    }
}

/// Project a raw submission into its cleaned form.
pub fn clean_record(record: &SubmissionRecord) -> CleanedRecord {
    let mut answers = BTreeMap::new();
    for answer in &record.answers {
        let value = match &answer.value {
            AnswerValue::Text { text } => clean_text(text),
            AnswerValue::Email { email } => clean_text(email),
            AnswerValue::Url { url } => clean_text(url),
            AnswerValue::Number { number } => format_number(*number),
            AnswerValue::Boolean { boolean } => boolean.to_string(),
            AnswerValue::Choice { choice } => clean_text(&choice.display()),
            AnswerValue::Choices { choices } => clean_text(
                &choices
                    .iter()
                    .map(ChoiceLabel::display)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            AnswerValue::Date { date } => date.clone(),
            AnswerValue::FileUrl { file_url } => file_url.clone(),
            AnswerValue::Unknown => String::new(),
        };
        answers.insert(answer.field.id.clone(), value);
    }

    CleanedRecord {
        response_id: record.response_id.clone(),
        submitted_at: record.submitted_at,
        landing_id: record.landing_id.clone().unwrap_or_default(),
        token: record.token.clone().unwrap_or_default(),
        answers,
    }
}

/// Clean a text value: trim, collapse runs of whitespace and line breaks
/// to single spaces, cap the length.
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() > MAX_TEXT_LEN {
        let mut end = MAX_TEXT_LEN;
        while !collapsed.is_char_boundary(end) {
            end -= 1;
        }
        collapsed[..end].to_string()
    } else {
        collapsed
    }
}

/// Integers render without a trailing ".0" so ratings read as "4", not "4.0".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(answers: &str) -> SubmissionRecord {
        let json = format!(
            r#"{{
                "response_id": "r1",
                "submitted_at": "2025-06-01T09:30:00Z",
                "landing_id": "l1",
                "token": "t1",
                "answers": {answers}
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\n\nb\t c  "), "a b c");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_clean_text_caps_length() {
        let long = "x".repeat(60_000);
        assert_eq!(clean_text(&long).len(), 50_000);
    }

    #[test]
    fn test_typed_answers_normalize() {
        let record = record_json(
            r#"[
                {"field": {"id": "q_name", "type": "short_text"}, "type": "text", "text": "  Alex   Johnson "},
                {"field": {"id": "q_rating"}, "type": "number", "number": 4},
                {"field": {"id": "q_recommend"}, "type": "boolean", "boolean": true},
                {"field": {"id": "q_format"}, "type": "choice", "choice": {"label": "Pair programming"}},
                {"field": {"id": "q_topics"}, "type": "choices", "choices": [
                    {"label": "Rust"}, {"other": "Testing"}
                ]},
                {"field": {"id": "q_date"}, "type": "date", "date": "2025-06-01"}
            ]"#,
        );

        let cleaned = clean_record(&record);
        assert_eq!(cleaned.answers["q_name"], "Alex Johnson");
        assert_eq!(cleaned.answers["q_rating"], "4");
        assert_eq!(cleaned.answers["q_recommend"], "true");
        assert_eq!(cleaned.answers["q_format"], "Pair programming");
        assert_eq!(cleaned.answers["q_topics"], "Rust, Testing");
        assert_eq!(cleaned.answers["q_date"], "2025-06-01");
        assert!(cleaned.is_completed());
    }

    #[test]
    fn test_unknown_answer_type_degrades() {
        let record = record_json(
            r#"[{"field": {"id": "q_x"}, "type": "payment", "payment": {"amount": "10"}}]"#,
        );
        let cleaned = clean_record(&record);
        assert_eq!(cleaned.answers["q_x"], "");
    }

    #[test]
    fn test_empty_answers_is_partial() {
        let record = record_json("[]");
        let cleaned = clean_record(&record);
        assert!(!cleaned.is_completed());
        assert_eq!(cleaned.landing_id, "l1");
    }

    #[test]
    fn test_choice_prefers_label_over_other() {
        let choice = ChoiceLabel {
            label: Some("A".into()),
            other: Some("B".into()),
        };
        assert_eq!(choice.display(), "A");
    }
}
