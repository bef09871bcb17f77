//! Text-write escalation — an ordered chain of increasingly invasive
//! write strategies with a read-back success predicate.
//!
//! Hosting pages vary in how they detect input: some accept a plain
//! property write, some only react to synthetic input/change/blur events,
//! some validate through keystroke listeners and need character-by-
//! character emulation, and a few only honor the platform text-insertion
//! command. Rather than duplicating inline fallback branches, the chain
//! is an explicit ordered list tried in sequence; the first strategy
//! whose write survives a read-back wins.

use super::classify::QuestionKind;
use crate::driver::PageDriver;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One way of writing text into an editable control, least to most
/// invasive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Set the value property directly.
    DirectSet,
    /// Set the value, then dispatch synthetic input/change/blur events.
    SyntheticEvents,
    /// Write one character at a time, dispatching an input event per
    /// character, for hosts that ignore bulk writes.
    CharByChar,
    /// Platform-level text-insertion command (`execCommand("insertText")`).
    InsertCommand,
}

impl WriteStrategy {
    /// The escalation order. Tried front to back.
    pub fn escalation() -> [WriteStrategy; 4] {
        [
            WriteStrategy::DirectSet,
            WriteStrategy::SyntheticEvents,
            WriteStrategy::CharByChar,
            WriteStrategy::InsertCommand,
        ]
    }
}

/// Why a single fill step failed.
#[derive(Debug, Error)]
pub enum FillError {
    /// Every write strategy was tried and the host page ignored or
    /// reverted all of them.
    #[error("host page rejected the write after {tried} strategies")]
    WriteRejected { tried: usize },
    /// The driver itself failed (page gone, JS error).
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

/// The result of one successful fill attempt: what was answered and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillOutcome {
    /// The classified question kind this outcome answered.
    pub kind: QuestionKind,
    /// The value used (digit for scales, label for choices, text for
    /// text questions; may be empty for optional feedback).
    pub value: String,
    /// The write strategy that succeeded, for text questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<WriteStrategy>,
}

/// Write `text` into the control at `index`, escalating through the
/// strategy chain until a read-back confirms the value stuck.
///
/// An intentionally blank value (optional feedback left empty) succeeds
/// immediately without touching the page.
pub async fn write_with_escalation(
    driver: &dyn PageDriver,
    index: usize,
    text: &str,
) -> Result<WriteStrategy, FillError> {
    if text.is_empty() {
        return Ok(WriteStrategy::DirectSet);
    }

    let chain = WriteStrategy::escalation();
    for (attempt, &strategy) in chain.iter().enumerate() {
        driver.set_text(index, text, strategy).await?;

        let readback = driver.read_value(index).await?;
        if readback == text {
            if attempt > 0 {
                tracing::debug!(?strategy, attempt, "write succeeded after escalation");
            }
            return Ok(strategy);
        }
        tracing::debug!(
            ?strategy,
            readback_len = readback.len(),
            "write not observed by host page, escalating"
        );
    }

    Err(FillError::WriteRejected { tried: chain.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::snapshot::PageSnapshot;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A driver that only registers writes at or above a given strategy.
    struct StubbornDriver {
        accepts_from: Option<WriteStrategy>,
        value: Mutex<String>,
        writes: Mutex<Vec<WriteStrategy>>,
    }

    impl StubbornDriver {
        fn new(accepts_from: Option<WriteStrategy>) -> Self {
            Self {
                accepts_from,
                value: Mutex::new(String::new()),
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageDriver for StubbornDriver {
        async fn snapshot(&self) -> anyhow::Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
        async fn invoke(&self, _index: usize) -> anyhow::Result<()> {
            Ok(())
        }
        async fn set_text(
            &self,
            _index: usize,
            text: &str,
            strategy: WriteStrategy,
        ) -> anyhow::Result<()> {
            self.writes.lock().unwrap().push(strategy);
            let order = WriteStrategy::escalation();
            let rank = |s: WriteStrategy| order.iter().position(|&x| x == s).unwrap();
            if let Some(min) = self.accepts_from {
                if rank(strategy) >= rank(min) {
                    *self.value.lock().unwrap() = text.to_string();
                }
            }
            Ok(())
        }
        async fn read_value(&self, _index: usize) -> anyhow::Result<String> {
            Ok(self.value.lock().unwrap().clone())
        }
        async fn confirm_key(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reload(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_strategy_wins_on_cooperative_host() {
        let driver = StubbornDriver::new(Some(WriteStrategy::DirectSet));
        let used = write_with_escalation(&driver, 0, "Alex Johnson")
            .await
            .unwrap();
        assert_eq!(used, WriteStrategy::DirectSet);
        assert_eq!(driver.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_escalates_to_char_by_char() {
        let driver = StubbornDriver::new(Some(WriteStrategy::CharByChar));
        let used = write_with_escalation(&driver, 0, "hello").await.unwrap();
        assert_eq!(used, WriteStrategy::CharByChar);
        assert_eq!(
            *driver.writes.lock().unwrap(),
            vec![
                WriteStrategy::DirectSet,
                WriteStrategy::SyntheticEvents,
                WriteStrategy::CharByChar,
            ]
        );
    }

    #[tokio::test]
    async fn test_rejection_after_exhausting_chain() {
        let driver = StubbornDriver::new(None);
        let err = write_with_escalation(&driver, 0, "hello").await.unwrap_err();
        match err {
            FillError::WriteRejected { tried } => assert_eq!(tried, 4),
            other => panic!("expected WriteRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_value_short_circuits() {
        let driver = StubbornDriver::new(None);
        let used = write_with_escalation(&driver, 0, "").await.unwrap();
        assert_eq!(used, WriteStrategy::DirectSet);
        assert!(driver.writes.lock().unwrap().is_empty());
    }
}
