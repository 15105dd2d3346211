//! Declarative YAML scenarios
//!
//! A suite file groups scenarios that share setup steps:
//!
//! ```yaml
//! name: login
//! before_each:
//!   - action: visit
//!     url: /
//!   - action: click
//!     selector: '[data-test="login-button"]'
//! cases:
//!   - name: authenticates with the login helper
//!     steps:
//!       - call: login
//!         args: [maria@gmail.com, Senha123]
//! ```
//!
//! Each case becomes one [`Scenario`] whose steps are `before_each`
//! followed by the case's own steps.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};
use crate::macros::MacroDef;
use crate::selector::Selector;

/// One atomic browser interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Navigate to a URL (relative URLs resolve against the scenario target)
    Visit { url: String },

    /// Click an element
    Click { selector: Selector },

    /// Type text into an input
    Type {
        selector: Selector,
        #[serde(deserialize_with = "scalar_text")]
        text: String,
    },

    /// Click the element that submits a form
    Submit { selector: Selector },
}

impl Action {
    /// Short label used in logs and reports. Typed text is left out.
    pub fn name(&self) -> String {
        match self {
            Action::Visit { url } => format!("visit:{}", url),
            Action::Click { selector } => format!("click:{}", selector),
            Action::Type { selector, .. } => format!("type:{}", selector),
            Action::Submit { selector } => format!("submit:{}", selector),
        }
    }

    /// The element this action touches, if any
    pub fn selector(&self) -> Option<&Selector> {
        match self {
            Action::Visit { .. } => None,
            Action::Click { selector }
            | Action::Type { selector, .. }
            | Action::Submit { selector } => Some(selector),
        }
    }
}

/// Invocation of a registered macro by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroCall {
    pub call: String,
    #[serde(default, deserialize_with = "scalar_texts")]
    pub args: Vec<String>,
}

/// YAML scalar taken as the text it was written as, so unquoted
/// `12345678` or `true` still reach a field as typed
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(s) => s,
            Scalar::Integer(n) => n.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn scalar_texts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let scalars = Vec::<Scalar>::deserialize(deserializer)?;
    Ok(scalars.into_iter().map(String::from).collect())
}

/// A scenario entry: a primitive action or a macro call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Call(MacroCall),
    Action(Action),
}

impl From<Action> for Step {
    fn from(action: Action) -> Self {
        Step::Action(action)
    }
}

impl Step {
    pub fn call(name: &str, args: &[&str]) -> Self {
        Step::Call(MacroCall {
            call: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }
}

/// A single end-to-end scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Name of the suite this scenario was loaded from
    #[serde(default)]
    pub suite: Option<String>,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Base URL of the application under test, overriding the runner's
    #[serde(default)]
    pub target_url: Option<String>,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Macros visible only to this scenario
    #[serde(default)]
    pub macros: Vec<MacroDef>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            suite: None,
            tags: Vec::new(),
            target_url: None,
            steps,
            macros: Vec::new(),
        }
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    /// `suite > case`, or just the case name
    pub fn full_name(&self) -> String {
        match &self.suite {
            Some(suite) => format!("{} > {}", suite, self.name),
            None => self.name.clone(),
        }
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}

/// A case inside a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
}

/// A suite file: shared setup plus one or more cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub target_url: Option<String>,

    /// Steps prepended to every case
    #[serde(default)]
    pub before_each: Vec<Step>,

    pub cases: Vec<Case>,

    /// Macros available to every case in this suite
    #[serde(default)]
    pub macros: Vec<MacroDef>,
}

impl Suite {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        if suite.cases.is_empty() {
            return Err(E2eError::SpecParse(format!(
                "suite '{}' has no cases",
                suite.name
            )));
        }
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Flatten into one scenario per case
    pub fn into_scenarios(self) -> Vec<Scenario> {
        let Suite {
            name,
            tags,
            target_url,
            before_each,
            cases,
            macros,
            ..
        } = self;

        cases
            .into_iter()
            .map(|case| {
                let mut steps = before_each.clone();
                steps.extend(case.steps);
                let mut case_tags = tags.clone();
                case_tags.extend(case.tags);
                Scenario {
                    name: case.name,
                    suite: Some(name.clone()),
                    tags: case_tags,
                    target_url: target_url.clone(),
                    steps,
                    macros: macros.clone(),
                }
            })
            .collect()
    }
}

/// Load every suite under `dir` and flatten into scenarios
pub fn load_scenarios(dir: &Path) -> E2eResult<Vec<Scenario>> {
    Ok(Suite::load_all(dir)?
        .into_iter()
        .flat_map(Suite::into_scenarios)
        .collect())
}
