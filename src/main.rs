// Copyright 2026 Fieldwork Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fieldwork::cli;

#[derive(Parser)]
#[command(
    name = "fieldwork",
    about = "Fieldwork — survey form auto-fill and response harvesting",
    version,
    after_help = "Run 'fieldwork <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a form in headless Chromium and fill it with sampled responses
    Fill {
        /// URL of the form to fill
        url: String,
        /// Number of complete responses to submit
        #[arg(long, default_value = "1")]
        responses: u32,
        /// Override the per-response step cap
        #[arg(long)]
        max_steps: Option<u32>,
        /// Path to a config file (default: ~/.fieldwork/config.json)
        #[arg(long)]
        config: Option<String>,
    },
    /// Pull submitted responses from the forms API
    Harvest {
        #[command(subcommand)]
        action: HarvestAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum HarvestAction {
    /// Verify the API token and form id work
    TestConnection {
        /// Path to a config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Fetch all responses and rebuild the local tables
    Fetch {
        /// Path to a config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Recompute the summary from stored responses
    Summary {
        /// Path to a config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Rebuild per-field answer reports from stored responses
    Reports {
        /// Path to a config file
        #[arg(long)]
        config: Option<String>,
    },
    /// Fetch on a fixed interval until interrupted
    Schedule {
        /// Minutes between fetches
        #[arg(long, default_value = "60")]
        every: u64,
        /// Path to a config file
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("FIELDWORK_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("FIELDWORK_QUIET", "1");
    }
    let default_level = if cli.verbose {
        "fieldwork=debug"
    } else {
        "fieldwork=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Fill {
            url,
            responses,
            max_steps,
            config,
        } => cli::fill_cmd::run(&url, responses, max_steps, config.as_deref()).await,
        Commands::Harvest { action } => match action {
            HarvestAction::TestConnection { config } => {
                cli::harvest_cmd::run_test_connection(config.as_deref()).await
            }
            HarvestAction::Fetch { config } => cli::harvest_cmd::run_fetch(config.as_deref()).await,
            HarvestAction::Summary { config } => {
                cli::harvest_cmd::run_summary(config.as_deref()).await
            }
            HarvestAction::Reports { config } => {
                cli::harvest_cmd::run_reports(config.as_deref()).await
            }
            HarvestAction::Schedule { every, config } => {
                cli::harvest_cmd::run_schedule(every, config.as_deref()).await
            }
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fieldwork", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
