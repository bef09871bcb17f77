//! The resolver control loop: observe → classify → fill → advance.
//!
//! One logical task, strictly sequential steps. Each step observes the
//! page through a bounded poll (the host renders asynchronously, so an
//! observation attempted too early legitimately sees nothing), classifies
//! the visible question, applies exactly one fill action, then tries to
//! advance. Progress is judged by comparing snapshots: the host page owns
//! the DOM and may auto-advance on its own, so the loop never assumes its
//! click was what moved things forward.
//!
//! Termination: a Submit control fired, the configured step cap was
//! reached, or two consecutive steps made no progress.

use super::classify::{classify, Question, QuestionKind};
use super::fill::{write_with_escalation, FillError, FillOutcome};
use super::sampler::{PoolId, RatingWeights, SamplePools};
use super::snapshot::PageSnapshot;
use crate::driver::PageDriver;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Knobs for the control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Hard cap on steps per response (safety bound).
    pub max_steps: u32,
    /// Poll interval while waiting for the page to become actionable.
    pub poll_interval_ms: u64,
    /// Maximum total wait per observation before reporting a transient miss.
    pub poll_budget_ms: u64,
    /// Settle time after an action, letting transitions start before the
    /// progress check re-observes.
    pub settle_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            poll_interval_ms: 250,
            poll_budget_ms: 8_000,
            settle_ms: 600,
        }
    }
}

/// Why one step failed. All variants are retryable at the loop level.
#[derive(Debug, Error)]
pub enum StepError {
    /// Expected controls not yet rendered within the poll budget.
    #[error("no actionable controls rendered within the poll budget")]
    TransientMiss,
    /// The page matches no known question shape. Never guessed through
    /// destructively; the loop decides whether to retry or stop.
    #[error("page matches no known question shape ({buttons} buttons, {entries} text entries)")]
    Ambiguous { buttons: usize, entries: usize },
    /// The host page rejected every write strategy.
    #[error(transparent)]
    Fill(#[from] FillError),
    /// Driver failure (page gone, script error).
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

/// What one step accomplished.
#[derive(Debug)]
pub enum StepResult {
    /// The Submit control was invoked; the run is over.
    Submitted,
    /// A question was filled and the page moved on.
    Progressed(FillOutcome),
    /// A fill may have happened but the page did not change.
    NoProgress(Option<FillOutcome>),
}

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The form was submitted.
    Submitted,
    /// The step cap was reached.
    StepCap,
    /// Two consecutive steps made no progress.
    Stalled,
}

/// Summary of one full run through the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub steps: u32,
    pub stop: StopReason,
    pub outcomes: Vec<FillOutcome>,
}

impl RunReport {
    pub fn submitted(&self) -> bool {
        self.stop == StopReason::Submitted
    }
}

/// The Adaptive Question Resolver: drives one host page through a form.
pub struct Resolver<D: PageDriver> {
    driver: D,
    pools: SamplePools,
    weights: RatingWeights,
    cfg: LoopConfig,
    rng: StdRng,
}

impl<D: PageDriver> Resolver<D> {
    pub fn new(driver: D, pools: SamplePools, weights: RatingWeights, cfg: LoopConfig) -> Self {
        Self {
            driver,
            pools,
            weights,
            cfg,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(
        driver: D,
        pools: SamplePools,
        weights: RatingWeights,
        cfg: LoopConfig,
        seed: u64,
    ) -> Self {
        Self {
            driver,
            pools,
            weights,
            cfg,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Hand the driver back, for callers that need to shut it down.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run the loop until the form submits, the step cap is hit, or the
    /// page stalls.
    pub async fn run(&mut self) -> Result<RunReport> {
        let mut outcomes = Vec::new();
        let mut steps = 0u32;
        let mut stalls = 0u32;

        let stop = loop {
            if steps >= self.cfg.max_steps {
                tracing::warn!(steps, "step cap reached, stopping");
                break StopReason::StepCap;
            }
            steps += 1;

            match self.step().await {
                Ok(StepResult::Submitted) => {
                    tracing::info!(steps, "form submitted");
                    break StopReason::Submitted;
                }
                Ok(StepResult::Progressed(outcome)) => {
                    tracing::info!(kind = ?outcome.kind, value = %outcome.value, "step filled");
                    outcomes.push(outcome);
                    stalls = 0;
                }
                Ok(StepResult::NoProgress(outcome)) => {
                    tracing::warn!(step = steps, "no progress on this step");
                    if let Some(o) = outcome {
                        outcomes.push(o);
                    }
                    stalls += 1;
                    if stalls >= 2 {
                        break StopReason::Stalled;
                    }
                }
                Err(err) => {
                    // Transient by policy: the host renders asynchronously,
                    // so a failed classification is retried, not fatal.
                    tracing::warn!(step = steps, error = %err, "step failed, will re-observe");
                    stalls += 1;
                    if stalls >= 2 {
                        break StopReason::Stalled;
                    }
                    sleep(Duration::from_millis(self.cfg.poll_interval_ms)).await;
                }
            }
        };

        Ok(RunReport {
            steps,
            stop,
            outcomes,
        })
    }

    /// Run `responses` complete passes through the form, reloading between
    /// them. Stops early if a pass fails to submit.
    pub async fn run_responses(&mut self, responses: u32) -> Result<Vec<RunReport>> {
        let mut reports = Vec::new();
        for n in 1..=responses {
            tracing::info!(response = n, of = responses, "starting response");
            let report = self.run().await?;
            let submitted = report.submitted();
            reports.push(report);
            if !submitted {
                tracing::warn!(response = n, "response did not submit, stopping session");
                break;
            }
            if n < responses {
                self.driver.reload().await?;
            }
        }
        Ok(reports)
    }

    /// One observe/classify/fill/advance cycle.
    async fn step(&mut self) -> Result<StepResult, StepError> {
        let before = self.observe().await?;
        let question = classify(&before);
        tracing::debug!(
            kind = ?question.kind(),
            controls = before.controls.len(),
            "classified step"
        );

        let outcome = match &question {
            Question::Unknown => {
                return Err(StepError::Ambiguous {
                    buttons: before.buttons().count(),
                    entries: before.text_entries().count(),
                });
            }
            Question::Submit { control } => {
                self.driver.invoke(*control).await?;
                return Ok(StepResult::Submitted);
            }
            Question::OpinionScale { buttons } => self.fill_scale(buttons).await?,
            Question::MultipleChoice { candidates } => {
                self.fill_choice(&before, candidates).await?
            }
            Question::Text { control, long, pool } => {
                self.fill_text(*control, *long, *pool).await?
            }
        };

        // The host may auto-advance after a selection; the advance attempt
        // tolerates that by checking progress via snapshots, not clicks.
        sleep(Duration::from_millis(self.cfg.settle_ms)).await;
        self.advance().await?;
        sleep(Duration::from_millis(self.cfg.settle_ms)).await;

        let after = self.driver.snapshot().await?;
        if signature(&after) != signature(&before) {
            Ok(StepResult::Progressed(outcome))
        } else {
            Ok(StepResult::NoProgress(Some(outcome)))
        }
    }

    /// Poll until the page has actionable controls, bounded by the budget.
    async fn observe(&self) -> Result<PageSnapshot, StepError> {
        let started = Instant::now();
        let budget = Duration::from_millis(self.cfg.poll_budget_ms);
        loop {
            let snap = self.driver.snapshot().await?;
            if snap.is_actionable() {
                return Ok(snap);
            }
            if started.elapsed() >= budget {
                return Err(StepError::TransientMiss);
            }
            sleep(Duration::from_millis(self.cfg.poll_interval_ms)).await;
        }
    }

    /// Sample a rating and invoke the matching scale button: exact digit
    /// label first, positional (nth, 1-indexed) as the fallback.
    async fn fill_scale(&mut self, buttons: &[(u8, usize)]) -> Result<FillOutcome, StepError> {
        let rating = self.weights.sample(&mut self.rng);
        let index = match buttons.iter().find(|&&(digit, _)| digit == rating) {
            Some(&(_, idx)) => idx,
            // Positional fallback, 1-indexed. The classifier guarantees at
            // least three buttons here.
            None => {
                let pos = (rating as usize - 1).min(buttons.len().saturating_sub(1));
                buttons
                    .get(pos)
                    .map(|&(_, idx)| idx)
                    .ok_or_else(|| anyhow::anyhow!("scale question with no buttons"))?
            }
        };

        self.driver.invoke(index).await?;
        Ok(FillOutcome {
            kind: QuestionKind::OpinionScale,
            value: rating.to_string(),
            strategy: None,
        })
    }

    /// Sample a format label and select the control whose text contains,
    /// or is contained by, the sample; any candidate as a last resort so
    /// the form always moves forward.
    async fn fill_choice(
        &mut self,
        snapshot: &PageSnapshot,
        candidates: &[usize],
    ) -> Result<FillOutcome, StepError> {
        let wanted = self.pools.pick(PoolId::Formats, &mut self.rng).to_string();
        let wanted_lower = wanted.to_lowercase();

        let chosen = candidates
            .iter()
            .find(|&&idx| {
                let text = snapshot.controls[idx].match_text().to_lowercase();
                text.contains(&wanted_lower) || wanted_lower.contains(&text)
            })
            .copied()
            .unwrap_or_else(|| {
                tracing::debug!(label = %wanted, "no option matched sample, taking first candidate");
                candidates[0]
            });

        self.driver.invoke(chosen).await?;
        Ok(FillOutcome {
            kind: QuestionKind::MultipleChoice,
            value: snapshot.controls[chosen].match_text().to_string(),
            strategy: None,
        })
    }

    /// Sample from the prompt-selected pool and write it through the
    /// escalation chain.
    async fn fill_text(
        &mut self,
        control: usize,
        long: bool,
        pool: PoolId,
    ) -> Result<FillOutcome, StepError> {
        let value = self.pools.pick(pool, &mut self.rng).to_string();
        let strategy = write_with_escalation(&self.driver, control, &value).await?;
        Ok(FillOutcome {
            kind: if long {
                QuestionKind::LongText
            } else {
                QuestionKind::ShortText
            },
            value,
            strategy: Some(strategy),
        })
    }

    /// Find and trigger a proceed control: strict accessible-label match
    /// first, then a scan of visible enabled controls for proceed text,
    /// then the platform confirm key.
    async fn advance(&self) -> Result<(), StepError> {
        let snap = self.driver.snapshot().await?;

        // Strict: an accessible label that names the next action.
        if let Some(c) = snap
            .buttons()
            .find(|c| c.enabled && c.label.to_lowercase().contains("next"))
        {
            self.driver.invoke(c.index).await?;
            return Ok(());
        }

        // Scan: proceed wording or a directional glyph, never "back".
        if let Some(c) = snap.buttons().find(|c| {
            let text = c.match_text().to_lowercase();
            c.enabled
                && !text.contains("back")
                && (text.contains("next")
                    || text.contains("continue")
                    || text == "ok"
                    || text.contains('→')
                    || text == ">")
        }) {
            self.driver.invoke(c.index).await?;
            return Ok(());
        }

        // Last resort: platform confirm key. Progress is verified by the
        // caller's snapshot comparison either way.
        tracing::debug!("no proceed control found, sending confirm key");
        self.driver.confirm_key().await?;
        Ok(())
    }
}

/// Cheap identity for progress detection: visible text plus the control
/// labels. Two identical signatures mean the step went nowhere.
fn signature(snapshot: &PageSnapshot) -> String {
    let mut sig = snapshot.page_text.clone();
    for c in &snapshot.controls {
        sig.push('\u{1f}');
        sig.push_str(c.match_text());
    }
    sig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_changes_with_page_text() {
        let a = PageSnapshot {
            controls: Vec::new(),
            page_text: "question one".into(),
        };
        let b = PageSnapshot {
            controls: Vec::new(),
            page_text: "question two".into(),
        };
        assert_ne!(signature(&a), signature(&b));
        assert_eq!(signature(&a), signature(&a.clone()));
    }

    #[test]
    fn test_loop_config_defaults_are_bounded() {
        let cfg = LoopConfig::default();
        assert!(cfg.max_steps > 0);
        assert!(cfg.poll_budget_ms >= cfg.poll_interval_ms);
    }
}
