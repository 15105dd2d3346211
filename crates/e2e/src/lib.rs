//! Adopet E2E Scenario Runner
//!
//! This crate drives the Adopet front-end through scripted browser
//! scenarios:
//! - Parses declarative YAML suites (shared setup + cases)
//! - Expands named macros such as `login(email, password)`
//! - Dispatches each action in order to an explicit browser session
//! - Controls Playwright through a persistent Node driver
//! - Ships a simulated Adopet page for offline runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  E2E Scenario Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── plan(scenario) -> [PlannedAction]    (MacroRegistry) │
//! │    ├── run_scenario(&mut session, scenario) -> Result       │
//! │    └── run_suite(&launcher, scenarios) -> SuiteResult       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserSession            SessionLauncher                  │
//! │    ├── PlaywrightSession     ├── PlaywrightLauncher         │
//! │    └── SimulatedBrowser      └── SimulatedLauncher          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── visit  { url }                                       │
//! │    ├── click  { selector }                                  │
//! │    ├── type   { selector, text }                            │
//! │    ├── submit { selector }                                  │
//! │    └── call   <macro> args [..]                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod macros;
pub mod playwright;
pub mod preflight;
pub mod runner;
pub mod scenario;
pub mod selector;
pub mod session;
pub mod simulated;

pub use config::{RunnerConfig, DEFAULT_TARGET_URL};
pub use error::{E2eError, E2eResult};
pub use macros::{MacroDef, MacroRegistry, PlannedAction};
pub use runner::{ScenarioResult, ScenarioRunner, SuiteResult};
pub use scenario::{Action, Scenario, Step, Suite};
pub use selector::Selector;
pub use session::{BrowserSession, SessionLauncher};
