//! End-to-end resolver loop tests against a scripted in-memory page.

use anyhow::Result;
use async_trait::async_trait;
use fieldwork::driver::PageDriver;
use fieldwork::resolver::{
    LoopConfig, PageSnapshot, RatingWeights, Resolver, SamplePools, StopReason, WriteStrategy,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// One scripted form step.
struct FakePage {
    snapshot: PageSnapshot,
    /// Invoking this control moves to the next page. `None` models a page
    /// that never advances no matter what is clicked.
    advance_on: Option<usize>,
    /// Invoking this control counts as submitting the form.
    submit_on: Option<usize>,
}

impl FakePage {
    fn from_html(html: &str, advance_on: Option<usize>, submit_on: Option<usize>) -> Self {
        Self {
            snapshot: PageSnapshot::from_html(html),
            advance_on,
            submit_on,
        }
    }
}

#[derive(Default)]
struct FakeState {
    current: usize,
    values: HashMap<(usize, usize), String>,
    submits: u32,
    reloads: u32,
    invocations: Vec<(usize, usize)>,
}

/// Scripted driver: a fixed sequence of pages, advancing when designated
/// controls are invoked.
struct FakeDriver {
    pages: Vec<FakePage>,
    state: Mutex<FakeState>,
}

impl FakeDriver {
    fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock")
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        let state = self.state();
        Ok(self.pages[state.current].snapshot.clone())
    }

    async fn invoke(&self, index: usize) -> Result<()> {
        let mut state = self.state();
        let page = state.current;
        state.invocations.push((page, index));

        if self.pages[page].submit_on == Some(index) {
            state.submits += 1;
            return Ok(());
        }
        if self.pages[page].advance_on == Some(index) && page + 1 < self.pages.len() {
            state.current += 1;
        }
        Ok(())
    }

    async fn set_text(&self, index: usize, text: &str, _strategy: WriteStrategy) -> Result<()> {
        let mut state = self.state();
        let page = state.current;
        state.values.insert((page, index), text.to_string());
        Ok(())
    }

    async fn read_value(&self, index: usize) -> Result<String> {
        let state = self.state();
        Ok(state
            .values
            .get(&(state.current, index))
            .cloned()
            .unwrap_or_default())
    }

    async fn confirm_key(&self) -> Result<()> {
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let mut state = self.state();
        state.current = 0;
        state.values.clear();
        state.reloads += 1;
        Ok(())
    }
}

fn fast_config() -> LoopConfig {
    LoopConfig {
        max_steps: 25,
        poll_interval_ms: 1,
        poll_budget_ms: 10,
        settle_ms: 0,
    }
}

fn resolver_over(pages: Vec<FakePage>) -> Resolver<FakeDriver> {
    Resolver::with_seed(
        FakeDriver::new(pages),
        SamplePools::embedded(),
        RatingWeights::default(),
        fast_config(),
        42,
    )
}

/// A four-step form: name, rating scale, choice list, submit.
fn full_form() -> Vec<FakePage> {
    vec![
        FakePage::from_html(
            r#"<html><body>
                <h1>What is your name?</h1>
                <input type="text" />
                <button>OK</button>
            </body></html>"#,
            Some(1),
            None,
        ),
        FakePage::from_html(
            r#"<html><body>
                <h1>How would you rate the workshop?</h1>
                <button>1</button><button>2</button><button>3</button>
                <button>4</button><button>5</button>
                <button>OK</button>
            </body></html>"#,
            Some(5),
            None,
        ),
        FakePage::from_html(
            r#"<html><body>
                <h1>Which session format did you prefer?</h1>
                <button>Hands-on exercises</button>
                <button>Group discussions</button>
                <button>Pair programming</button>
                <button>OK</button>
            </body></html>"#,
            Some(3),
            None,
        ),
        FakePage::from_html(
            r#"<html><body>
                <h1>All done. Ready to send?</h1>
                <button>Submit</button>
            </body></html>"#,
            None,
            Some(0),
        ),
    ]
}

#[tokio::test]
async fn full_form_runs_to_submission() {
    let mut resolver = resolver_over(full_form());
    let report = resolver.run().await.expect("run failed");

    assert_eq!(report.stop, StopReason::Submitted);
    assert!(report.submitted());
    // Name, scale, and choice each produced one fill outcome.
    assert_eq!(report.outcomes.len(), 3);

    let driver = resolver.into_driver();
    let state = driver.state();
    assert_eq!(state.submits, 1);
    // The name answer landed in the input on page 0 and came from the
    // names pool.
    let name = state.values.get(&(0, 0)).expect("name was written");
    assert!(SamplePools::embedded().names.iter().any(|n| n == name));
}

#[tokio::test]
async fn scale_click_stays_in_digit_range() {
    let mut resolver = resolver_over(full_form());
    resolver.run().await.expect("run failed");

    let driver = resolver.into_driver();
    let state = driver.state();
    // On the scale page, the rating click must land on a digit button
    // (indices 0-4); index 5 is the OK control used to advance.
    let scale_clicks: Vec<usize> = state
        .invocations
        .iter()
        .filter(|&&(page, _)| page == 1)
        .map(|&(_, idx)| idx)
        .collect();
    assert!(scale_clicks.iter().any(|&idx| idx <= 4));
}

#[tokio::test]
async fn submit_only_page_ends_in_one_step() {
    let mut resolver = resolver_over(vec![FakePage::from_html(
        r#"<html><body><h1>Ready?</h1><button>Submit</button></body></html>"#,
        None,
        Some(0),
    )]);
    let report = resolver.run().await.expect("run failed");

    assert_eq!(report.stop, StopReason::Submitted);
    assert_eq!(report.steps, 1);
    assert!(report.outcomes.is_empty());

    let driver = resolver.into_driver();
    assert_eq!(driver.state().submits, 1);
}

#[tokio::test]
async fn never_advancing_page_stalls_out() {
    // The OK button is present but wired to nothing; two consecutive
    // no-progress steps must end the run well under the step cap.
    let mut resolver = resolver_over(vec![FakePage::from_html(
        r#"<html><body>
            <h1>What is your name?</h1>
            <input type="text" />
            <button>OK</button>
        </body></html>"#,
        None,
        None,
    )]);
    let report = resolver.run().await.expect("run failed");

    assert_eq!(report.stop, StopReason::Stalled);
    assert_eq!(report.steps, 2);
}

#[tokio::test]
async fn unclassifiable_page_stalls_instead_of_guessing() {
    // A lone short-labeled button matches no question shape. The loop
    // must stop without ever clicking it.
    let mut resolver = resolver_over(vec![FakePage::from_html(
        r#"<html><body><h1>Interstitial</h1><button>OK</button></body></html>"#,
        Some(0),
        None,
    )]);
    let report = resolver.run().await.expect("run failed");

    assert_eq!(report.stop, StopReason::Stalled);
    let driver = resolver.into_driver();
    assert!(driver.state().invocations.is_empty());
}

#[tokio::test]
async fn multiple_responses_reload_between_runs() {
    let mut resolver = resolver_over(full_form());
    let reports = resolver.run_responses(3).await.expect("session failed");

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.submitted()));

    let driver = resolver.into_driver();
    let state = driver.state();
    assert_eq!(state.submits, 3);
    // Reloaded between responses, not after the last one.
    assert_eq!(state.reloads, 2);
}
