//! Playwright browser automation
//!
//! Each session runs a small Node driver that owns one browser context and
//! one page. Rust sends it one JSON command per line on stdin and waits for
//! the matching `{ "ok": ... }` line on stdout before sending the next, so
//! actions never overlap.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::selector::Selector;
use crate::session::{BrowserSession, SessionLauncher};

const DRIVER_SCRIPT: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

const config = __CONFIG__;

function reply(value) {
  process.stdout.write(JSON.stringify(value) + '\n');
}

(async () => {
  const browser = await playwright[config.browser].launch({ headless: config.headless });
  const context = await browser.newContext({
    viewport: { width: config.viewport_width, height: config.viewport_height }
  });
  const page = await context.newPage();
  page.setDefaultTimeout(config.action_timeout_ms);
  page.setDefaultNavigationTimeout(config.page_load_timeout_ms);
  reply({ ready: true });

  const lines = readline.createInterface({ input: process.stdin, crlfDelay: Infinity });
  for await (const line of lines) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
    } catch (error) {
      reply({ ok: false, error: 'invalid command: ' + error.message });
      continue;
    }
    try {
      switch (cmd.op) {
        case 'visit':
          await page.goto(cmd.url, { waitUntil: 'load' });
          break;
        case 'click':
          await page.locator(cmd.selector).click();
          break;
        case 'type':
          await page.locator(cmd.selector).pressSequentially(cmd.text, { delay: cmd.delay_ms });
          break;
        case 'submit':
          await page.locator(cmd.selector).click();
          await page.waitForLoadState('load');
          break;
        case 'screenshot':
          await page.screenshot({ path: cmd.path, fullPage: true });
          break;
        case 'close':
          await browser.close();
          reply({ ok: true });
          return;
        default:
          throw new Error('unknown op: ' + cmd.op);
      }
      reply({ ok: true });
    } catch (error) {
      reply({ ok: false, error: error.message });
    }
  }
  await browser.close();
})().catch((error) => {
  reply({ ok: false, error: error.message });
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Time allowed for an element to resolve and accept an action
    pub action_timeout_ms: u64,

    /// Time allowed for navigation and browser startup
    pub page_load_timeout_ms: u64,

    /// Delay between keystrokes when typing
    pub type_delay_ms: u64,

    /// Node executable
    pub node_binary: PathBuf,

    /// Extra module search path for `require('playwright')`
    pub node_path: Option<PathBuf>,

    /// Extra time allowed on top of Playwright's own timeouts before the
    /// driver is considered hung
    pub driver_grace_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout_ms: 4_000,
            page_load_timeout_ms: 60_000,
            type_delay_ms: 10,
            node_binary: PathBuf::from("node"),
            node_path: None,
            driver_grace_ms: 5_000,
        }
    }
}

/// Settings embedded into the driver script
#[derive(Serialize)]
struct DriverSettings<'a> {
    browser: &'a str,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    action_timeout_ms: u64,
    page_load_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Visit { url: &'a str },
    Click { selector: &'a str },
    Type { selector: &'a str, text: &'a str, delay_ms: u64 },
    Submit { selector: &'a str },
    Screenshot { path: String },
    Close,
}

#[derive(Debug, Default, Deserialize)]
struct DriverReply {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Launches one Node/Playwright driver per scenario
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a launcher after verifying Node can load Playwright
    pub async fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config).await?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Check if Playwright is resolvable from a script in the temp dir
    async fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let mut cmd = TokioCommand::new(&config.node_binary);
        cmd.args(["-e", "require.resolve('playwright')"])
            .current_dir(std::env::temp_dir())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match cmd.status().await {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Render the driver script for this configuration
    pub fn driver_script(&self) -> E2eResult<String> {
        let settings = DriverSettings {
            browser: self.config.browser.as_str(),
            headless: self.config.headless,
            viewport_width: self.config.viewport_width,
            viewport_height: self.config.viewport_height,
            action_timeout_ms: self.config.action_timeout_ms,
            page_load_timeout_ms: self.config.page_load_timeout_ms,
        };
        Ok(DRIVER_SCRIPT.replace("__CONFIG__", &serde_json::to_string(&settings)?))
    }
}

#[async_trait]
impl SessionLauncher for PlaywrightLauncher {
    type Session = PlaywrightSession;

    async fn launch(&self) -> E2eResult<PlaywrightSession> {
        PlaywrightSession::start(self.config.clone(), &self.driver_script()?).await
    }
}

/// A browser page driven through a Node child process
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    config: PlaywrightConfig,
    closed: bool,

    /// Holds the driver script until the session ends
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    async fn start(config: PlaywrightConfig, script: &str) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, script)?;

        debug!("Starting Playwright driver: {}", script_path.display());

        let mut cmd = TokioCommand::new(&config.node_binary);
        cmd.arg(&script_path)
            .current_dir(script_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::Playwright(format!(
                "Failed to spawn {}: {}",
                config.node_binary.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            config,
            closed: false,
            _script_dir: script_dir,
        };

        let startup = session.navigation_limit();
        let reply = timeout(startup, session.read_reply())
            .await
            .map_err(|_| E2eError::Timeout("browser startup".to_string()))??;
        if !reply.ready {
            return Err(E2eError::Playwright(
                reply
                    .error
                    .unwrap_or_else(|| "driver did not report ready".to_string()),
            ));
        }

        info!(
            "Playwright {} session ready (headless: {})",
            session.config.browser.as_str(),
            session.config.headless
        );
        Ok(session)
    }

    /// Read the next protocol line, skipping anything that isn't JSON
    async fn read_reply(&mut self) -> E2eResult<DriverReply> {
        loop {
            match self.stdout.next_line().await? {
                Some(line) => match serde_json::from_str::<DriverReply>(&line) {
                    Ok(reply) => return Ok(reply),
                    Err(_) => debug!(target: "playwright", "{}", line),
                },
                None => {
                    return Err(E2eError::Playwright(
                        "driver exited unexpectedly".to_string(),
                    ))
                }
            }
        }
    }

    async fn write_command(&mut self, command: &DriverCommand<'_>) -> E2eResult<()> {
        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Send one command and wait for its reply.
    ///
    /// A driver that stops answering can't be resynchronized: a late reply
    /// would be read as the answer to the next command. Timeouts and I/O
    /// failures therefore kill the driver and close the session.
    async fn send(&mut self, command: DriverCommand<'_>, label: String, limit: Duration) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::Playwright("session already closed".to_string()));
        }

        if let Err(e) = self.write_command(&command).await {
            self.abandon();
            return Err(e);
        }

        let reply = match timeout(limit, self.read_reply()).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.abandon();
                return Err(e);
            }
            Err(_) => {
                self.abandon();
                return Err(E2eError::Timeout(label));
            }
        };

        if reply.ok {
            Ok(())
        } else {
            Err(E2eError::StepFailed {
                step: label,
                reason: reply.error.unwrap_or_else(|| "unknown driver error".to_string()),
            })
        }
    }

    /// Give up on the driver without waiting for it
    fn abandon(&mut self) {
        self.closed = true;
        if let Err(e) = self.child.start_kill() {
            debug!("Playwright driver already gone: {}", e);
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.config.driver_grace_ms)
    }

    fn action_limit(&self) -> Duration {
        Duration::from_millis(self.config.action_timeout_ms) + self.grace()
    }

    fn navigation_limit(&self) -> Duration {
        Duration::from_millis(self.config.page_load_timeout_ms) + self.grace()
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn visit(&mut self, url: &str) -> E2eResult<()> {
        let limit = self.navigation_limit();
        self.send(DriverCommand::Visit { url }, format!("visit:{}", url), limit)
            .await
    }

    async fn click(&mut self, selector: &Selector) -> E2eResult<()> {
        let limit = self.action_limit();
        self.send(
            DriverCommand::Click {
                selector: selector.as_str(),
            },
            format!("click:{}", selector),
            limit,
        )
        .await
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> E2eResult<()> {
        let delay_ms = self.config.type_delay_ms;
        let typing = Duration::from_millis(delay_ms.saturating_mul(text.chars().count() as u64));
        let limit = self.action_limit() + typing;
        self.send(
            DriverCommand::Type {
                selector: selector.as_str(),
                text,
                delay_ms,
            },
            format!("type:{}", selector),
            limit,
        )
        .await
    }

    async fn submit(&mut self, selector: &Selector) -> E2eResult<()> {
        let limit = self.action_limit() + self.navigation_limit();
        self.send(
            DriverCommand::Submit {
                selector: selector.as_str(),
            },
            format!("submit:{}", selector),
            limit,
        )
        .await
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<bool> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let limit = self.action_limit();
        self.send(
            DriverCommand::Screenshot {
                path: path.to_string_lossy().into_owned(),
            },
            format!("screenshot:{}", path.display()),
            limit,
        )
        .await?;
        Ok(true)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        let limit = self.action_limit();
        let result = self
            .send(DriverCommand::Close, "close".to_string(), limit)
            .await;
        self.closed = true;

        if let Err(e) = &result {
            warn!("Playwright driver did not close cleanly: {}", e);
        }
        if timeout(self.grace(), self.child.wait()).await.is_err() {
            let _ = self.child.kill().await;
        }
        result
    }
}
