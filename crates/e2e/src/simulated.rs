//! In-process model of the Adopet login page
//!
//! Lets scenarios run without Node or network access. The model only knows
//! what the login flow needs: a landing page with a login button, a login
//! form revealed by that button, and a set of known accounts.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use tracing::debug;

use crate::config::DEFAULT_TARGET_URL;
use crate::error::{E2eError, E2eResult};
use crate::selector::Selector;
use crate::session::{BrowserSession, SessionLauncher};

/// Static description of the simulated application
#[derive(Debug, Clone)]
pub struct SimulatedSite {
    base_url: String,
    landing: Vec<Selector>,
    reveals: HashMap<Selector, Vec<Selector>>,
    email_field: Selector,
    password_field: Selector,
    submit_button: Selector,
    accounts: Vec<(String, String)>,
}

impl SimulatedSite {
    /// The Adopet front-end with one registered account
    pub fn adopet() -> Self {
        let email_field = Selector::data_test("input-loginEmail");
        let password_field = Selector::data_test("input-loginPassword");
        let submit_button = Selector::data_test("submit-button");

        let mut reveals = HashMap::new();
        reveals.insert(
            Selector::data_test("login-button"),
            vec![
                email_field.clone(),
                password_field.clone(),
                submit_button.clone(),
            ],
        );

        Self {
            base_url: DEFAULT_TARGET_URL.to_string(),
            landing: vec![Selector::data_test("login-button")],
            reveals,
            email_field,
            password_field,
            submit_button,
            accounts: vec![("maria@gmail.com".to_string(), "Senha123".to_string())],
        }
    }

    /// A landing page whose login button is missing
    pub fn without_login_button(mut self) -> Self {
        let login = Selector::data_test("login-button");
        self.landing.retain(|s| s != &login);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_account(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.push((email.into(), password.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Same scheme, host and port as the base URL
    fn serves(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.base_url)) {
            (Ok(url), Ok(base)) => url.origin() == base.origin(),
            _ => false,
        }
    }

    fn is_input(&self, selector: &Selector) -> bool {
        selector == &self.email_field || selector == &self.password_field
    }
}

/// Something a session attempted, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Visit(String),
    Click(Selector),
    Type(Selector, String),
    Submit(Selector),
    Screenshot(PathBuf),
}

impl Interaction {
    /// Whether this touched a form field
    pub fn is_field_interaction(&self) -> bool {
        matches!(self, Interaction::Type(..) | Interaction::Submit(_))
    }
}

/// A form submission seen by the simulated backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub email: String,
    pub accepted: bool,
}

/// Observable page state of one simulated session
#[derive(Debug, Clone, Default)]
pub struct SimulatedState {
    pub url: Option<String>,
    pub visible: HashSet<Selector>,
    pub fields: HashMap<Selector, String>,
    pub interactions: Vec<Interaction>,
    pub submissions: Vec<Submission>,
    pub authenticated_as: Option<String>,
}

impl SimulatedState {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated_as.is_some()
    }
}

/// A simulated browser page
pub struct SimulatedBrowser {
    site: Arc<SimulatedSite>,
    state: SimulatedState,
    closed: bool,
    finished: Option<Arc<Mutex<Vec<SimulatedState>>>>,
}

impl SimulatedBrowser {
    pub fn new(site: SimulatedSite) -> Self {
        Self {
            site: Arc::new(site),
            state: SimulatedState::default(),
            closed: false,
            finished: None,
        }
    }

    pub fn state(&self) -> &SimulatedState {
        &self.state
    }

    fn require_visible(&self, step: String, selector: &Selector) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::StepFailed {
                step,
                reason: "browser is closed".to_string(),
            });
        }
        if !self.state.visible.contains(selector) {
            return Err(E2eError::StepFailed {
                step,
                reason: format!("timed out retrying: expected to find element {}", selector),
            });
        }
        Ok(())
    }

    /// Effects of activating a visible element. Clicking the submit button
    /// and submitting through it are the same gesture.
    fn press(&mut self, selector: &Selector) {
        if let Some(revealed) = self.site.reveals.get(selector) {
            self.state.visible.extend(revealed.iter().cloned());
        }
        if selector == &self.site.submit_button {
            self.send_form();
        }
    }

    fn send_form(&mut self) {
        let field = |s: &Selector| self.state.fields.get(s).cloned().unwrap_or_default();
        let email = field(&self.site.email_field);
        let password = field(&self.site.password_field);
        let accepted = self
            .site
            .accounts
            .iter()
            .any(|(e, p)| e == &email && p == &password);

        debug!("Simulated login for {} accepted: {}", email, accepted);
        self.state.submissions.push(Submission {
            email: email.clone(),
            accepted,
        });
        if accepted {
            self.state.authenticated_as = Some(email);
            self.state.url = Some(format!("{}/home", self.site.base_url.trim_end_matches('/')));
            self.state.visible.clear();
        }
    }
}

#[async_trait]
impl BrowserSession for SimulatedBrowser {
    async fn visit(&mut self, url: &str) -> E2eResult<()> {
        self.state.interactions.push(Interaction::Visit(url.to_string()));
        if !self.site.serves(url) {
            return Err(E2eError::StepFailed {
                step: format!("visit:{}", url),
                reason: "page failed to load".to_string(),
            });
        }

        self.state.url = Some(url.to_string());
        self.state.visible = self.site.landing.iter().cloned().collect();
        self.state.fields.clear();
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> E2eResult<()> {
        self.state.interactions.push(Interaction::Click(selector.clone()));
        self.require_visible(format!("click:{}", selector), selector)?;
        self.press(selector);
        Ok(())
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> E2eResult<()> {
        self.state
            .interactions
            .push(Interaction::Type(selector.clone(), text.to_string()));
        let step = format!("type:{}", selector);
        self.require_visible(step.clone(), selector)?;
        if !self.site.is_input(selector) {
            return Err(E2eError::StepFailed {
                step,
                reason: "element is not typeable".to_string(),
            });
        }

        self.state
            .fields
            .entry(selector.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn submit(&mut self, selector: &Selector) -> E2eResult<()> {
        self.state.interactions.push(Interaction::Submit(selector.clone()));
        self.require_visible(format!("submit:{}", selector), selector)?;
        self.press(selector);
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<bool> {
        self.state
            .interactions
            .push(Interaction::Screenshot(path.to_path_buf()));
        Ok(false)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(finished) = &self.finished {
            finished.lock().push(self.state.clone());
        }
        Ok(())
    }
}

/// Hands out fresh simulated sessions and keeps their final states
#[derive(Clone)]
pub struct SimulatedLauncher {
    site: Arc<SimulatedSite>,
    finished: Arc<Mutex<Vec<SimulatedState>>>,
}

impl SimulatedLauncher {
    pub fn new(site: SimulatedSite) -> Self {
        Self {
            site: Arc::new(site),
            finished: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Final states of closed sessions, in launch order
    pub fn sessions(&self) -> Vec<SimulatedState> {
        self.finished.lock().clone()
    }
}

#[async_trait]
impl SessionLauncher for SimulatedLauncher {
    type Session = SimulatedBrowser;

    async fn launch(&self) -> E2eResult<SimulatedBrowser> {
        Ok(SimulatedBrowser {
            site: Arc::clone(&self.site),
            state: SimulatedState::default(),
            closed: false,
            finished: Some(Arc::clone(&self.finished)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_button_reveals_form() {
        let mut browser = SimulatedBrowser::new(SimulatedSite::adopet());
        browser.visit(DEFAULT_TARGET_URL).await.unwrap();
        assert!(!browser
            .state()
            .visible
            .contains(&Selector::data_test("input-loginEmail")));

        browser
            .click(&Selector::data_test("login-button"))
            .await
            .unwrap();
        assert!(browser
            .state()
            .visible
            .contains(&Selector::data_test("input-loginEmail")));
    }

    #[tokio::test]
    async fn test_typing_into_hidden_field_fails() {
        let mut browser = SimulatedBrowser::new(SimulatedSite::adopet());
        browser.visit(DEFAULT_TARGET_URL).await.unwrap();

        let err = browser
            .type_text(&Selector::data_test("input-loginEmail"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::StepFailed { .. }));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let mut browser = SimulatedBrowser::new(SimulatedSite::adopet());
        browser.visit(DEFAULT_TARGET_URL).await.unwrap();
        browser
            .click(&Selector::data_test("login-button"))
            .await
            .unwrap();
        browser
            .type_text(&Selector::data_test("input-loginEmail"), "maria@gmail.com")
            .await
            .unwrap();
        browser
            .type_text(&Selector::data_test("input-loginPassword"), "wrong")
            .await
            .unwrap();
        browser
            .submit(&Selector::data_test("submit-button"))
            .await
            .unwrap();

        let state = browser.state();
        assert!(!state.is_authenticated());
        assert_eq!(
            state.submissions,
            vec![Submission {
                email: "maria@gmail.com".to_string(),
                accepted: false
            }]
        );
    }

    #[tokio::test]
    async fn test_visit_outside_site_fails() {
        let mut browser = SimulatedBrowser::new(SimulatedSite::adopet());
        assert!(browser.visit("https://example.com/").await.is_err());
    }

    #[test]
    fn test_serves_compares_origins() {
        let site = SimulatedSite::adopet();
        assert!(site.serves("https://adopet-frontend-cypress.vercel.app/home"));
        assert!(!site.serves("https://adopet-frontend-cypress.vercel.app.evil.com/"));
        assert!(!site.serves("http://adopet-frontend-cypress.vercel.app/"));
        assert!(!site.serves("not a url"));
    }

    #[tokio::test]
    async fn test_clicking_submit_button_sends_form() {
        let mut browser = SimulatedBrowser::new(SimulatedSite::adopet());
        browser.visit(DEFAULT_TARGET_URL).await.unwrap();
        browser
            .click(&Selector::data_test("login-button"))
            .await
            .unwrap();
        browser
            .type_text(&Selector::data_test("input-loginEmail"), "maria@gmail.com")
            .await
            .unwrap();
        browser
            .type_text(&Selector::data_test("input-loginPassword"), "Senha123")
            .await
            .unwrap();
        browser
            .click(&Selector::data_test("submit-button"))
            .await
            .unwrap();

        let state = browser.state();
        assert_eq!(state.authenticated_as.as_deref(), Some("maria@gmail.com"));
        assert_eq!(state.submissions.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_on_login_button_reveals_form() {
        let mut browser = SimulatedBrowser::new(SimulatedSite::adopet());
        browser.visit(DEFAULT_TARGET_URL).await.unwrap();
        browser
            .submit(&Selector::data_test("login-button"))
            .await
            .unwrap();

        let state = browser.state();
        assert!(state
            .visible
            .contains(&Selector::data_test("input-loginPassword")));
        assert!(state.submissions.is_empty());
    }

    #[tokio::test]
    async fn test_launcher_collects_closed_sessions() {
        let launcher = SimulatedLauncher::new(SimulatedSite::adopet());
        let mut first = launcher.launch().await.unwrap();
        first.visit(DEFAULT_TARGET_URL).await.unwrap();
        first.close().await.unwrap();
        first.close().await.unwrap();

        let sessions = launcher.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].url.as_deref(), Some(DEFAULT_TARGET_URL));
    }
}
