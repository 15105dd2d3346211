//! Named, reusable action sequences
//!
//! A macro is registered once and referenced by name from any scenario.
//! Its steps may use `{{param}}` placeholders in URLs, selectors and typed
//! text; calling it binds the placeholders positionally to the call's
//! arguments. Expansion happens before a scenario touches the browser, so
//! an unknown macro or a bad argument count fails the scenario up front.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::scenario::{Action, MacroCall, Step};
use crate::selector::Selector;

/// Nested calls deeper than this are treated as runaway recursion
const MAX_DEPTH: usize = 16;

/// A named, parameterized sequence of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub steps: Vec<Step>,
}

/// A primitive action after macro expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: Action,

    /// Outermost macro this action came from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Replace `{{name}}` placeholders. Returns the first unbound name on failure.
fn substitute(template: &str, bindings: &HashMap<String, String>) -> Result<String, String> {
    let mut missing = None;
    let out = placeholder_pattern().replace_all(template, |caps: &Captures<'_>| {
        match bindings.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(name),
        None => Ok(out.into_owned()),
    }
}

fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    placeholder_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

fn step_strings(step: &Step) -> Vec<&str> {
    match step {
        Step::Call(call) => call.args.iter().map(String::as_str).collect(),
        Step::Action(Action::Visit { url }) => vec![url.as_str()],
        Step::Action(Action::Click { selector }) | Step::Action(Action::Submit { selector }) => {
            vec![selector.as_str()]
        }
        Step::Action(Action::Type { selector, text }) => vec![selector.as_str(), text.as_str()],
    }
}

/// Registry of macros available to scenarios
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, MacroDef>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the builtin `login(email, password)` macro
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(login_macro())
            .expect("builtin macros are well formed");
        registry
    }

    /// Register a macro. Names must be unique and every placeholder must
    /// name a declared parameter.
    pub fn register(&mut self, def: MacroDef) -> E2eResult<()> {
        if def.name.trim().is_empty() {
            return Err(E2eError::SpecParse("macro with empty name".to_string()));
        }
        if self.macros.contains_key(&def.name) {
            return Err(E2eError::DuplicateMacro(def.name));
        }
        for (i, param) in def.params.iter().enumerate() {
            if def.params[..i].contains(param) {
                return Err(E2eError::SpecParse(format!(
                    "macro '{}' declares parameter '{}' twice",
                    def.name, param
                )));
            }
        }
        for step in &def.steps {
            for text in step_strings(step) {
                if let Some(unknown) = placeholders(text).find(|p| !def.params.iter().any(|d| d.as_str() == *p)) {
                    return Err(E2eError::SpecParse(format!(
                        "macro '{}' references unknown parameter '{}'",
                        def.name, unknown
                    )));
                }
            }
        }

        debug!("Registered macro {}({})", def.name, def.params.join(", "));
        self.macros.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Registered macro names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register every macro in a YAML list. Returns how many were added.
    pub fn load_yaml(&mut self, yaml: &str) -> E2eResult<usize> {
        let defs: Vec<MacroDef> = serde_yaml::from_str(yaml)?;
        let count = defs.len();
        for def in defs {
            self.register(def)?;
        }
        Ok(count)
    }

    pub fn load_file(&mut self, path: &Path) -> E2eResult<usize> {
        let content = std::fs::read_to_string(path)?;
        self.load_yaml(&content)
    }

    /// A copy of this registry extended with scenario-local macros
    pub fn scoped(&self, extra: &[MacroDef]) -> E2eResult<Self> {
        let mut registry = self.clone();
        for def in extra {
            registry.register(def.clone())?;
        }
        Ok(registry)
    }

    /// Expand steps into the ordered list of primitive actions
    pub fn expand(&self, steps: &[Step]) -> E2eResult<Vec<PlannedAction>> {
        let mut out = Vec::with_capacity(steps.len());
        let mut stack = Vec::new();
        self.expand_into(steps, None, &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand_into(
        &self,
        steps: &[Step],
        bindings: Option<&HashMap<String, String>>,
        stack: &mut Vec<String>,
        out: &mut Vec<PlannedAction>,
    ) -> E2eResult<()> {
        for step in steps {
            match step {
                Step::Action(action) => {
                    let action = match bindings {
                        Some(b) => bind_action(action, b, stack)?,
                        None => action.clone(),
                    };
                    out.push(PlannedAction {
                        action,
                        origin: stack.first().cloned(),
                    });
                }
                Step::Call(call) => {
                    let call = match bindings {
                        Some(b) => bind_call(call, b, stack)?,
                        None => call.clone(),
                    };
                    self.expand_call(&call, stack, out)?;
                }
            }
        }
        Ok(())
    }

    fn expand_call(
        &self,
        call: &MacroCall,
        stack: &mut Vec<String>,
        out: &mut Vec<PlannedAction>,
    ) -> E2eResult<()> {
        let def = self
            .macros
            .get(&call.call)
            .ok_or_else(|| E2eError::UnknownMacro(call.call.clone()))?;

        if call.args.len() != def.params.len() {
            return Err(E2eError::MacroArity {
                name: def.name.clone(),
                expected: def.params.len(),
                got: call.args.len(),
            });
        }
        if stack.contains(&def.name) || stack.len() >= MAX_DEPTH {
            let mut chain = stack.clone();
            chain.push(def.name.clone());
            return Err(E2eError::MacroRecursion(chain.join(" -> ")));
        }

        let bindings: HashMap<String, String> = def
            .params
            .iter()
            .cloned()
            .zip(call.args.iter().cloned())
            .collect();

        stack.push(def.name.clone());
        let result = self.expand_into(&def.steps, Some(&bindings), stack, out);
        stack.pop();
        result
    }
}

fn bind_text(text: &str, bindings: &HashMap<String, String>, stack: &[String]) -> E2eResult<String> {
    substitute(text, bindings).map_err(|name| {
        E2eError::SpecParse(format!(
            "macro '{}' references unknown parameter '{}'",
            stack.last().map(String::as_str).unwrap_or("?"),
            name
        ))
    })
}

fn bind_selector(
    selector: &Selector,
    bindings: &HashMap<String, String>,
    stack: &[String],
) -> E2eResult<Selector> {
    Selector::new(bind_text(selector.as_str(), bindings, stack)?)
}

fn bind_action(action: &Action, bindings: &HashMap<String, String>, stack: &[String]) -> E2eResult<Action> {
    Ok(match action {
        Action::Visit { url } => Action::Visit {
            url: bind_text(url, bindings, stack)?,
        },
        Action::Click { selector } => Action::Click {
            selector: bind_selector(selector, bindings, stack)?,
        },
        Action::Type { selector, text } => Action::Type {
            selector: bind_selector(selector, bindings, stack)?,
            text: bind_text(text, bindings, stack)?,
        },
        Action::Submit { selector } => Action::Submit {
            selector: bind_selector(selector, bindings, stack)?,
        },
    })
}

fn bind_call(call: &MacroCall, bindings: &HashMap<String, String>, stack: &[String]) -> E2eResult<MacroCall> {
    Ok(MacroCall {
        call: call.call.clone(),
        args: call
            .args
            .iter()
            .map(|arg| bind_text(arg, bindings, stack))
            .collect::<E2eResult<_>>()?,
    })
}

/// `login(email, password)`: fill both credential fields and submit
fn login_macro() -> MacroDef {
    MacroDef {
        name: "login".to_string(),
        params: vec!["email".to_string(), "password".to_string()],
        steps: vec![
            Step::Action(Action::Type {
                selector: Selector::data_test("input-loginEmail"),
                text: "{{email}}".to_string(),
            }),
            Step::Action(Action::Type {
                selector: Selector::data_test("input-loginPassword"),
                text: "{{password}}".to_string(),
            }),
            Step::Action(Action::Submit {
                selector: Selector::data_test("submit-button"),
            }),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(name: &str) -> Step {
        Step::Action(Action::Click {
            selector: Selector::data_test(name),
        })
    }

    #[test]
    fn test_login_builtin_expands_to_three_actions() {
        let registry = MacroRegistry::with_builtins();
        let plan = registry
            .expand(&[Step::call("login", &["maria@gmail.com", "Senha123"])])
            .unwrap();

        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|p| p.origin.as_deref() == Some("login")));
        assert_eq!(
            plan[0].action,
            Action::Type {
                selector: Selector::data_test("input-loginEmail"),
                text: "maria@gmail.com".to_string(),
            }
        );
        assert_eq!(
            plan[1].action,
            Action::Type {
                selector: Selector::data_test("input-loginPassword"),
                text: "Senha123".to_string(),
            }
        );
        assert_eq!(
            plan[2].action,
            Action::Submit {
                selector: Selector::data_test("submit-button"),
            }
        );
    }

    #[test]
    fn test_top_level_text_is_not_substituted() {
        let registry = MacroRegistry::new();
        let step = Step::Action(Action::Type {
            selector: Selector::data_test("note"),
            text: "{{literal}}".to_string(),
        });
        let plan = registry.expand(&[step]).unwrap();
        assert_eq!(
            plan[0].action,
            Action::Type {
                selector: Selector::data_test("note"),
                text: "{{literal}}".to_string(),
            }
        );
        assert_eq!(plan[0].origin, None);
    }

    #[test]
    fn test_unknown_macro() {
        let registry = MacroRegistry::with_builtins();
        let err = registry.expand(&[Step::call("logout", &[])]).unwrap_err();
        assert!(matches!(err, E2eError::UnknownMacro(name) if name == "logout"));
    }

    #[test]
    fn test_arity_mismatch() {
        let registry = MacroRegistry::with_builtins();
        let err = registry
            .expand(&[Step::call("login", &["maria@gmail.com"])])
            .unwrap_err();
        assert!(matches!(
            err,
            E2eError::MacroArity { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = MacroRegistry::with_builtins();
        let err = registry.register(login_macro()).unwrap_err();
        assert!(matches!(err, E2eError::DuplicateMacro(_)));
    }

    #[test]
    fn test_register_rejects_undeclared_placeholder() {
        let mut registry = MacroRegistry::new();
        let def = MacroDef {
            name: "open".to_string(),
            params: vec![],
            steps: vec![Step::Action(Action::Visit {
                url: "/{{page}}".to_string(),
            })],
        };
        assert!(matches!(registry.register(def), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_nested_macros_forward_arguments() {
        let yaml = r#"
- name: open-login
  steps:
    - action: visit
      url: /
    - action: click
      selector: '[data-test="login-button"]'
- name: sign-in
  params: [email, password]
  steps:
    - call: open-login
    - call: login
      args: ['{{email}}', '{{password}}']
"#;
        let mut registry = MacroRegistry::with_builtins();
        assert_eq!(registry.load_yaml(yaml).unwrap(), 2);
        assert_eq!(registry.names(), vec!["login", "open-login", "sign-in"]);

        let plan = registry
            .expand(&[Step::call("sign-in", &["a@b.c", "pw"])])
            .unwrap();
        assert_eq!(plan.len(), 5);
        assert!(plan.iter().all(|p| p.origin.as_deref() == Some("sign-in")));
        assert_eq!(
            plan[3].action,
            Action::Type {
                selector: Selector::data_test("input-loginPassword"),
                text: "pw".to_string(),
            }
        );
    }

    #[test]
    fn test_recursion_is_detected() {
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: "ping".to_string(),
                params: vec![],
                steps: vec![click("a"), Step::call("pong", &[])],
            })
            .unwrap();
        registry
            .register(MacroDef {
                name: "pong".to_string(),
                params: vec![],
                steps: vec![Step::call("ping", &[])],
            })
            .unwrap();

        let err = registry.expand(&[Step::call("ping", &[])]).unwrap_err();
        match err {
            E2eError::MacroRecursion(chain) => assert_eq!(chain, "ping -> pong -> ping"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scoped_registry_does_not_leak() {
        let base = MacroRegistry::with_builtins();
        let local = MacroDef {
            name: "open".to_string(),
            params: vec![],
            steps: vec![click("login-button")],
        };
        let scoped = base.scoped(&[local]).unwrap();
        assert!(scoped.contains("open"));
        assert!(!base.contains("open"));
    }
}
