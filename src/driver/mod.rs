//! Page-driver abstraction — the seam between the resolver and the host page.
//!
//! The resolver never touches a browser directly. Everything it needs from
//! the host environment is expressed as the [`PageDriver`] trait: observe
//! the current step as a snapshot, invoke a control, write text through a
//! chosen strategy, read a value back, and emit a platform-level confirm
//! key. The production implementation drives Chromium via CDP; tests use
//! scripted fakes.
//!
//! Control indices refer to the ordering of the most recent snapshot. The
//! driver must resolve indices against the same collection query that
//! produced the snapshot, so indices stay stable within one step.

pub mod chromium;

use crate::resolver::fill::WriteStrategy;
use crate::resolver::snapshot::PageSnapshot;
use anyhow::Result;
use async_trait::async_trait;

/// Operations the resolver needs from the hosting page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Observe the current visible state of the form step.
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Invoke (click) the control at `index` in the current snapshot.
    async fn invoke(&self, index: usize) -> Result<()>;

    /// Write `text` into the editable control at `index` using the given
    /// strategy. Writing must emit whatever change-notification signals
    /// the strategy implies; verification is the caller's job via
    /// [`read_value`](Self::read_value).
    async fn set_text(&self, index: usize, text: &str, strategy: WriteStrategy) -> Result<()>;

    /// Read back the current value of the editable control at `index`.
    async fn read_value(&self, index: usize) -> Result<String>;

    /// Emit a platform-level confirm signal (Enter key), the last-resort
    /// advance mechanism when no proceed control can be found.
    async fn confirm_key(&self) -> Result<()>;

    /// Reload the form for a fresh response.
    async fn reload(&self) -> Result<()>;
}
