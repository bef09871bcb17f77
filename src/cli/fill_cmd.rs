//! `fieldwork fill <url>` — drive a live form through the resolver.

use crate::cli::output;
use crate::config::Config;
use crate::driver::chromium::FormSession;
use crate::resolver::{LoopConfig, Resolver, SamplePools};
use anyhow::Result;

/// Launch a browser session and run the resolver for `responses` passes.
pub async fn run(
    url: &str,
    responses: u32,
    max_steps: Option<u32>,
    config_path: Option<&str>,
) -> Result<()> {
    let config = Config::load(config_path.map(std::path::Path::new))?;

    let mut limits: LoopConfig = config.resolver.limits.clone();
    if let Some(cap) = max_steps {
        limits.max_steps = cap;
    }
    let pools = match config.resolver.pools {
        Some(pools) => pools.validated()?,
        None => SamplePools::embedded(),
    };

    if !output::is_quiet() && !output::is_json() {
        println!("Opening form: {url}");
    }
    let session = FormSession::launch(url).await?;
    let mut resolver = Resolver::new(session, pools, config.resolver.rating_weights, limits);

    let reports = resolver.run_responses(responses).await?;
    resolver.into_driver().close().await?;
    let submitted = reports.iter().filter(|r| r.submitted()).count();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "requested": responses,
            "submitted": submitted,
            "runs": reports,
        }));
    } else if !output::is_quiet() {
        for (n, report) in reports.iter().enumerate() {
            println!(
                "Response {}: {} steps, stop={:?}",
                n + 1,
                report.steps,
                report.stop
            );
            for outcome in &report.outcomes {
                println!("  {:?}: {}", outcome.kind, outcome.value);
            }
        }
        println!("Submitted {submitted}/{responses} responses.");
    }

    if submitted < responses as usize {
        anyhow::bail!("only {submitted} of {responses} responses submitted");
    }
    Ok(())
}
