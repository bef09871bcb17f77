//! Heuristic question classifier — snapshot in, question shape out.
//!
//! This is the core decision tree of the resolver. It is a pure function
//! of a [`PageSnapshot`]: no page access, no randomness, no state, so the
//! same snapshot always classifies the same way and every branch is
//! testable with a synthetic page.
//!
//! Priority order matters and must not be reshuffled:
//!
//! 1. **Opinion scale** — ≥3 controls labeled with a single digit 1–5.
//!    Checked first because scale buttons would otherwise look like a
//!    short multiple-choice list.
//! 2. **Multiple choice** — ≥2 controls with label text longer than a
//!    navigation label ("OK", "Next"), excluding digit labels.
//! 3. **Text entry** — any visible text input, textarea, or editable
//!    region; the sub-kind picks the sample pool from prompt keywords.
//! 4. **Submit** — a finalizing control and nothing fillable.
//! 5. **Unknown** — nothing matched; the caller retries or skips.

use super::sampler::PoolId;
use super::snapshot::{Control, ControlRole, PageSnapshot};
use serde::{Deserialize, Serialize};

/// The classified kind of the currently visible question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    OpinionScale,
    MultipleChoice,
    Submit,
    Unknown,
}

/// A classified question with everything the fill step needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Question {
    /// 1–5 rating scale. `buttons` maps each detected digit to its control
    /// index, sorted by digit, so rating N resolves by exact label first
    /// and by position (Nth entry) as the fallback.
    OpinionScale { buttons: Vec<(u8, usize)> },
    /// Choice list. `candidates` are the control indices eligible for
    /// selection, in document order.
    MultipleChoice { candidates: Vec<usize> },
    /// A text question targeting one control, with the sample pool the
    /// prompt keywords selected.
    Text {
        control: usize,
        long: bool,
        pool: PoolId,
    },
    /// A finalizing control; invoking it ends the run.
    Submit { control: usize },
    /// No known question shape matched.
    Unknown,
}

impl Question {
    /// The plain kind, for logging and outcome records.
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::OpinionScale { .. } => QuestionKind::OpinionScale,
            Question::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            Question::Text { long: false, .. } => QuestionKind::ShortText,
            Question::Text { long: true, .. } => QuestionKind::LongText,
            Question::Submit { .. } => QuestionKind::Submit,
            Question::Unknown => QuestionKind::Unknown,
        }
    }
}

/// Labels that belong to navigation chrome, not answer options.
const NAV_WORDS: [&str; 6] = ["next", "continue", "ok", "submit", "back", "skip"];

/// Minimum label length for a multiple-choice candidate. Anything this
/// short is navigation chrome or a scale digit.
const CHOICE_LABEL_MIN: usize = 6;

/// Minimum digit-labeled controls to call the page a rating scale.
const SCALE_MIN_BUTTONS: usize = 3;

/// Minimum long-labeled controls to call the page a choice list.
const CHOICE_MIN_OPTIONS: usize = 2;

/// Classify the visible question. First match wins; see the module docs
/// for why the order is load-bearing.
pub fn classify(snapshot: &PageSnapshot) -> Question {
    // 1. Opinion scale
    let mut scale: Vec<(u8, usize)> = snapshot
        .buttons()
        .filter(|c| c.enabled)
        .filter_map(|c| digit_label(c).map(|d| (d, c.index)))
        .collect();
    if scale.len() >= SCALE_MIN_BUTTONS {
        scale.sort_by_key(|&(digit, _)| digit);
        return Question::OpinionScale { buttons: scale };
    }

    // 2. Multiple choice
    let candidates: Vec<usize> = snapshot
        .buttons()
        .filter(|c| c.enabled && is_choice_label(c.match_text()))
        .map(|c| c.index)
        .collect();
    if candidates.len() >= CHOICE_MIN_OPTIONS {
        return Question::MultipleChoice { candidates };
    }

    // 3. Text entry
    if let Some(entry) = snapshot.text_entries().find(|c| c.enabled) {
        let long = matches!(entry.role, ControlRole::TextArea | ControlRole::Editable);
        return Question::Text {
            control: entry.index,
            long,
            pool: pool_for_prompt(&snapshot.page_text),
        };
    }

    // 4. Submit
    if let Some(submit) = snapshot
        .buttons()
        .find(|c| c.enabled && c.match_text().to_lowercase().contains("submit"))
    {
        return Question::Submit {
            control: submit.index,
        };
    }

    Question::Unknown
}

/// Pick the sample pool for a text question from the visible prompt.
///
/// Keyword families, checked in order: name → names pool; enjoyment
/// wording → positive pool; improvement wording → improvement pool;
/// anything else → additional-comments pool.
pub fn pool_for_prompt(page_text: &str) -> PoolId {
    let text = page_text.to_lowercase();
    if text.contains("name") {
        return PoolId::Names;
    }
    if ["enjoy", "positive", "liked"].iter().any(|k| text.contains(k)) {
        return PoolId::Positive;
    }
    if ["improve", "better", "feedback"].iter().any(|k| text.contains(k)) {
        return PoolId::Improvement;
    }
    PoolId::Additional
}

/// Extract a 1–5 digit label from a control: exact rendered text first,
/// then any scale digit inside the accessible label ("Rate 4 of 5").
fn digit_label(control: &Control) -> Option<u8> {
    let text = control.text.trim();
    if text.len() == 1 {
        if let Some(d) = text.chars().next().and_then(scale_digit) {
            return Some(d);
        }
    }
    control.label.chars().find_map(scale_digit)
}

fn scale_digit(c: char) -> Option<u8> {
    match c {
        '1'..='5' => Some(c as u8 - b'0'),
        _ => None,
    }
}

/// Whether a label reads like an answer option rather than navigation.
///
/// Nav words are matched as whole tokens, never substrings: option labels
/// legitimately contain them embedded ("Feedback sessions", "Workbooks").
fn is_choice_label(label: &str) -> bool {
    let trimmed = label.trim();
    if trimmed.len() < CHOICE_LABEL_MIN {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !lower
        .split_whitespace()
        .any(|token| NAV_WORDS.contains(&token))
}
