//! Adaptive Question Resolver — classify the visible form step, fill it
//! with sampled data, and advance until the form submits.
//!
//! Layered so the heuristics stay testable without a browser:
//!
//! - [`snapshot`] — the abstract page view ([`PageSnapshot`]).
//! - [`classify`] — pure snapshot → question-shape classifier.
//! - [`sampler`] — sample pools and the weighted rating distribution.
//! - [`fill`] — the escalating write-strategy chain.
//! - [`runner`] — the observe/classify/fill/advance loop.

pub mod classify;
pub mod fill;
pub mod runner;
pub mod sampler;
pub mod snapshot;

pub use classify::{classify, Question, QuestionKind};
pub use fill::{FillOutcome, WriteStrategy};
pub use runner::{LoopConfig, Resolver, RunReport, StopReason};
pub use sampler::{PoolId, RatingWeights, SamplePools};
pub use snapshot::{Control, ControlRole, PageSnapshot};
