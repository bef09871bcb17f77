//! Page snapshots — the resolver's view of the host page.
//!
//! A [`PageSnapshot`] is a transient, immutable capture of the visible
//! interactive state of the current form step: every control in document
//! order plus the full visible page text. The classifier never touches a
//! live page; it only ever sees snapshots, which makes it unit-testable
//! with synthetic pages and keeps the host environment behind the
//! [`PageDriver`](crate::driver::PageDriver) seam.
//!
//! Snapshots can be built two ways: by a live driver (which observes the
//! real rendered page, including CSS visibility), or from raw HTML via
//! [`PageSnapshot::from_html`] for tests and offline classification. The
//! HTML path only sees static visibility cues (`hidden`, `type="hidden"`,
//! `disabled`), not computed layout.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// What kind of interactive element a control is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRole {
    /// A clickable button (`<button>`, `[role="button"]`).
    Button,
    /// A single-line text entry (`<input type="text">` and friends).
    TextInput,
    /// A multi-line text entry (`<textarea>`).
    TextArea,
    /// A contenteditable region.
    Editable,
    /// A radio option (`<input type="radio">`, `[role="radio"]`).
    Radio,
}

/// One visible interactive control on the current form step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    /// Position in document order. Stable within a single snapshot; the
    /// driver resolves indices against the same collection query.
    pub index: usize,
    /// The control's role.
    pub role: ControlRole,
    /// Rendered text content, trimmed and whitespace-collapsed.
    pub text: String,
    /// Accessible label (`aria-label`), empty when absent.
    pub label: String,
    /// Whether the control is enabled.
    pub enabled: bool,
}

impl Control {
    /// Text used for label matching: rendered text, falling back to the
    /// accessible label when the control renders no text (icon buttons).
    pub fn match_text(&self) -> &str {
        if self.text.is_empty() {
            &self.label
        } else {
            &self.text
        }
    }
}

/// The observed state of the current form step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// All visible interactive controls, in document order.
    pub controls: Vec<Control>,
    /// Full visible page text, lowercased and whitespace-collapsed.
    /// Used for keyword-based prompt classification.
    pub page_text: String,
}

impl PageSnapshot {
    /// Whether the snapshot contains anything the resolver could act on.
    pub fn is_actionable(&self) -> bool {
        !self.controls.is_empty()
    }

    /// Buttons only (including radio options, which fill the same role
    /// on choice questions).
    pub fn buttons(&self) -> impl Iterator<Item = &Control> {
        self.controls
            .iter()
            .filter(|c| matches!(c.role, ControlRole::Button | ControlRole::Radio))
    }

    /// Text-entry controls only.
    pub fn text_entries(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter().filter(|c| {
            matches!(
                c.role,
                ControlRole::TextInput | ControlRole::TextArea | ControlRole::Editable
            )
        })
    }

    /// Build a snapshot from raw HTML.
    ///
    /// Walks the document once and collects buttons, text inputs,
    /// textareas, contenteditable regions, and radio options, skipping
    /// elements that are statically hidden or disabled. Indices follow
    /// document order so they line up with a driver that runs the same
    /// query against the live DOM.
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);

        let control_sel = Selector::parse(
            "button, [role=\"button\"], [role=\"radio\"], input, textarea, [contenteditable=\"true\"]",
        )
        .expect("control selector is valid");

        let mut controls = Vec::new();
        for el in document.select(&control_sel) {
            if el.value().attr("hidden").is_some() {
                continue;
            }
            let role = match classify_element(&el) {
                Some(r) => r,
                None => continue,
            };
            let enabled = el.value().attr("disabled").is_none();
            controls.push(Control {
                index: controls.len(),
                role,
                text: element_text(&el),
                label: el.value().attr("aria-label").unwrap_or("").trim().to_string(),
                enabled,
            });
        }

        let body_sel = Selector::parse("body").expect("body selector is valid");
        let page_text = document
            .select(&body_sel)
            .next()
            .map(|body| element_text(&body).to_lowercase())
            .unwrap_or_default();

        Self {
            controls,
            page_text,
        }
    }
}

/// Map an HTML element to a control role, or `None` when it is not an
/// interactive control the resolver cares about.
fn classify_element(el: &ElementRef<'_>) -> Option<ControlRole> {
    let tag = el.value().name();
    let role_attr = el.value().attr("role").unwrap_or("");

    if tag == "button" || role_attr == "button" {
        return Some(ControlRole::Button);
    }
    if role_attr == "radio" {
        return Some(ControlRole::Radio);
    }
    if tag == "textarea" {
        return Some(ControlRole::TextArea);
    }
    if el.value().attr("contenteditable") == Some("true") {
        return Some(ControlRole::Editable);
    }
    if tag == "input" {
        return match el.value().attr("type").unwrap_or("text") {
            "hidden" | "checkbox" => None,
            "radio" => Some(ControlRole::Radio),
            "submit" => Some(ControlRole::Button),
            _ => Some(ControlRole::TextInput),
        };
    }
    None
}

/// Collect all text content from an element, trimmed and
/// whitespace-collapsed.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
