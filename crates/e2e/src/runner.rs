//! Scenario runner: sequential dispatch of planned actions against a session

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::error::{E2eError, E2eResult};
use crate::macros::{MacroRegistry, PlannedAction};
use crate::scenario::{Action, Scenario};
use crate::session::{BrowserSession, SessionLauncher};

/// Result of executing one primitive action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub step_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Page capture taken when a scenario failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureScreenshot {
    pub path: String,
    pub sha256: String,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,

    /// Actions never attempted because an earlier one failed
    pub skipped_steps: usize,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<FailureScreenshot>,
}

impl ScenarioResult {
    fn failed_before_start(name: String, started_at: DateTime<Utc>, error: &E2eError) -> Self {
        Self {
            name,
            started_at,
            success: false,
            duration_ms: 0,
            steps: vec![],
            skipped_steps: 0,
            error: Some(error.to_string()),
            screenshot: None,
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Executes scenarios one action at a time
pub struct ScenarioRunner {
    config: RunnerConfig,
    registry: MacroRegistry,
}

impl ScenarioRunner {
    /// Create a runner with the builtin macros
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_registry(config, MacroRegistry::with_builtins())
    }

    pub fn with_registry(config: RunnerConfig, registry: MacroRegistry) -> Self {
        Self { config, registry }
    }

    /// Create a runner, loading `commands_file` on top of the builtins
    pub fn from_config(config: RunnerConfig) -> E2eResult<Self> {
        config.validate()?;
        let mut registry = MacroRegistry::with_builtins();
        if let Some(path) = &config.commands_file {
            let count = registry.load_file(path)?;
            info!("Loaded {} macro(s) from {}", count, path.display());
        }
        Ok(Self::with_registry(config, registry))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MacroRegistry {
        &mut self.registry
    }

    /// Expand macros and resolve relative URLs into the final action list
    pub fn plan(&self, scenario: &Scenario) -> E2eResult<Vec<PlannedAction>> {
        let base = scenario
            .target_url
            .as_deref()
            .unwrap_or(&self.config.target_url);

        let mut planned = if scenario.macros.is_empty() {
            self.registry.expand(&scenario.steps)?
        } else {
            self.registry.scoped(&scenario.macros)?.expand(&scenario.steps)?
        };

        for entry in &mut planned {
            if let Action::Visit { url } = &mut entry.action {
                *url = resolve_url(base, url)?;
            }
        }
        Ok(planned)
    }

    /// Run one scenario against `session`, stopping at the first failure
    pub async fn run_scenario<S>(&self, session: &mut S, scenario: &Scenario) -> E2eResult<ScenarioResult>
    where
        S: BrowserSession + ?Sized,
    {
        let name = scenario.full_name();
        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Running scenario: {}", name);

        let plan = match self.plan(scenario) {
            Ok(plan) => plan,
            Err(e) => return Ok(ScenarioResult::failed_before_start(name, started_at, &e)),
        };

        let mut steps = Vec::with_capacity(plan.len());
        let mut scenario_error = None;

        for (index, planned) in plan.iter().enumerate() {
            let step_name = planned.action.name();
            debug!("Step {}: {}", index + 1, step_name);

            let step_start = Instant::now();
            let outcome = session.perform(&planned.action).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            let error = outcome.err().map(|e| e.to_string());
            let success = error.is_none();
            steps.push(StepResult {
                index,
                step_name,
                origin: planned.origin.clone(),
                success,
                duration_ms,
                error: error.clone(),
            });

            if !success {
                scenario_error = error;
                break;
            }
        }

        let skipped_steps = plan.len() - steps.len();
        let screenshot = if scenario_error.is_some() && self.config.screenshot_on_failure {
            self.capture_failure(session, &name).await
        } else {
            None
        };

        Ok(ScenarioResult {
            name,
            started_at,
            success: scenario_error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            skipped_steps,
            error: scenario_error,
            screenshot,
        })
    }

    async fn capture_failure<S>(&self, session: &mut S, name: &str) -> Option<FailureScreenshot>
    where
        S: BrowserSession + ?Sized,
    {
        let path = self
            .config
            .screenshot_dir()
            .join(format!("{}.failed.png", file_stem(name)));

        match session.screenshot(&path).await {
            Ok(true) => match sha256_file(&path) {
                Ok(sha256) => Some(FailureScreenshot {
                    path: path.to_string_lossy().into_owned(),
                    sha256,
                }),
                Err(e) => {
                    warn!("Screenshot {} unreadable: {}", path.display(), e);
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!("Failure screenshot for '{}' failed: {}", name, e);
                None
            }
        }
    }

    /// Run scenarios in order, each against a fresh session
    pub async fn run_suite<L>(&self, launcher: &L, scenarios: &[Scenario]) -> E2eResult<SuiteResult>
    where
        L: SessionLauncher + ?Sized,
    {
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = match launcher.launch().await {
                Ok(mut session) => {
                    let result = self.run_scenario(&mut session, scenario).await;
                    if let Err(e) = session.close().await {
                        warn!("Closing session for '{}' failed: {}", scenario.full_name(), e);
                    }
                    result?
                }
                Err(e) => ScenarioResult::failed_before_start(scenario.full_name(), Utc::now(), &e),
            };

            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        Ok(SuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Write suite results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Join `url` onto `base`; absolute URLs pass through
pub fn resolve_url(base: &str, url: &str) -> E2eResult<String> {
    let invalid = |reason: String| E2eError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let base = reqwest::Url::parse(base).map_err(|e| invalid(format!("base {}: {}", base, e)))?;
    let joined = base.join(url).map_err(|e| invalid(e.to_string()))?;
    Ok(joined.to_string())
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    stem.trim_matches('-').to_string()
}

fn sha256_file(path: &Path) -> E2eResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
