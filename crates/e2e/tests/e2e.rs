//! E2E harness entry point
//!
//! This file is the test binary that runs the YAML suites in `specs/`.
//! Run with: cargo test --package adopet-e2e --test e2e
//!
//! By default the suites run against the simulated Adopet page. Pass
//! `--live` (or set `ADOPET_E2E_LIVE=1`) to drive a real browser through
//! Playwright against the deployed site:
//!
//!     cargo test --package adopet-e2e --test e2e -- --live --headed

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adopet_e2e::playwright::{Browser, PlaywrightLauncher};
use adopet_e2e::preflight::check_reachable;
use adopet_e2e::scenario::{load_scenarios, Scenario};
use adopet_e2e::simulated::{SimulatedLauncher, SimulatedSite};
use adopet_e2e::{E2eResult, RunnerConfig, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(name = "adopet-e2e")]
#[command(about = "E2E scenario runner for the Adopet front-end")]
#[command(ignore_errors = true)]
struct Args {
    /// Run only scenarios whose name contains this text
    filter: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to suite specs directory
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// YAML file with extra macros
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this exact name
    #[arg(short, long)]
    name: Option<String>,

    /// Drive a real browser against the target URL
    #[arg(long, env = "ADOPET_E2E_LIVE")]
    live: bool,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn build_config(args: &Args) -> E2eResult<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig {
            specs_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs"),
            output_dir: PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("adopet-e2e"),
            ..Default::default()
        },
    };

    if let Some(specs) = &args.specs {
        config.specs_dir = specs.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(commands) = &args.commands {
        config.commands_file = Some(commands.clone());
    }
    if let Some(browser) = &args.browser {
        config.playwright.browser = browser.parse::<Browser>()?;
    }
    if args.headed {
        config.playwright.headless = false;
    }
    Ok(config)
}

fn select(scenarios: Vec<Scenario>, args: &Args) -> Vec<Scenario> {
    scenarios
        .into_iter()
        .filter(|s| args.tag.as_ref().map_or(true, |t| s.tags.contains(t)))
        .filter(|s| args.name.as_ref().map_or(true, |n| &s.name == n))
        .filter(|s| {
            args.filter
                .as_ref()
                .map_or(true, |f| s.full_name().contains(f.as_str()))
        })
        .collect()
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let config = build_config(&args)?;
    let scenarios = select(load_scenarios(&config.specs_dir)?, &args);

    if scenarios.is_empty() {
        info!("No scenarios selected");
        return Ok(true);
    }

    let runner = ScenarioRunner::from_config(config)?;
    let config = runner.config();

    let results = if args.live {
        check_reachable(&config.target_url, Duration::from_secs(30)).await?;
        let launcher = PlaywrightLauncher::new(config.playwright.clone()).await?;
        runner.run_suite(&launcher, &scenarios).await?
    } else {
        info!("Running against the simulated site (pass --live for a real browser)");
        let launcher =
            SimulatedLauncher::new(SimulatedSite::adopet().with_base_url(config.target_url.clone()));
        runner.run_suite(&launcher, &scenarios).await?
    };

    runner.write_results(&results)?;

    Ok(results.failed == 0)
}
