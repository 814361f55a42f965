//! Application configuration for PagePitch.
//!
//! User config lives at `~/.pagepitch/pagepitch.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: it names the environment variables
//! that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PagePitchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagepitch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagepitch";

// ---------------------------------------------------------------------------
// Config structs (matching pagepitch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Lead source settings.
    #[serde(default)]
    pub input: InputConfig,

    /// PageSpeed Insights settings.
    #[serde(default)]
    pub pagespeed: PageSpeedConfig,

    /// Browser rendering settings.
    #[serde(default)]
    pub renderer: RendererSection,

    /// Mail submission settings.
    #[serde(default)]
    pub smtp: SmtpSection,

    /// Run pacing and artifact placement.
    #[serde(default)]
    pub run: RunSection,
}

/// `[input]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Default spreadsheet path (overridden by the `run` argument).
    #[serde(default)]
    pub spreadsheet: String,

    /// Worksheet name; empty means the first sheet.
    #[serde(default)]
    pub sheet: String,
}

/// `[pagespeed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSpeedConfig {
    /// Scoring API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Device strategy sent with every request.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PageSpeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            strategy: default_strategy(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://www.googleapis.com/pagespeedonline/v5/runPagespeed".into()
}
fn default_api_key_env() -> String {
    "PAGESPEED_API_KEY".into()
}
fn default_strategy() -> String {
    "mobile".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[renderer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSection {
    /// Hosted report viewer; the target URL is appended as `?url=`.
    #[serde(default = "default_report_url")]
    pub report_url: String,

    /// Chrome/Chromium binary; empty means auto-detect.
    #[serde(default)]
    pub chrome_executable: String,

    /// Command run between the primary and fallback render attempts.
    #[serde(default = "default_reinstall_command")]
    pub reinstall_command: Vec<String>,

    /// Page navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            report_url: default_report_url(),
            chrome_executable: String::new(),
            reinstall_command: default_reinstall_command(),
            navigation_timeout_secs: default_navigation_timeout(),
        }
    }
}

fn default_report_url() -> String {
    "https://pagespeed.web.dev/report".into()
}
fn default_reinstall_command() -> Vec<String> {
    [
        "npx",
        "--yes",
        "@puppeteer/browsers",
        "install",
        "chrome-headless-shell@stable",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_navigation_timeout() -> u64 {
    60
}

/// `[smtp]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSection {
    /// Submission host.
    #[serde(default)]
    pub host: String,

    /// Submission port (STARTTLS).
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Sender address, also used as the login user.
    #[serde(default)]
    pub address: String,

    /// Name of the env var holding the SMTP password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmtpSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            address: String::new(),
            password_env: default_password_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}
fn default_password_env() -> String {
    "SMTP_PASSWORD".into()
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// Pause between records in milliseconds.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,

    /// Directory where per-lead PDFs are written before sending.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            pace_ms: default_pace_ms(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

fn default_pace_ms() -> u64 {
    800
}
fn default_artifact_dir() -> String {
    ".".into()
}

// ---------------------------------------------------------------------------
// Runtime config (resolved once at startup, passed to each component)
// ---------------------------------------------------------------------------

/// Settings for the performance scorer.
#[derive(Clone)]
pub struct ScoringConfig {
    pub endpoint: String,
    pub api_key: String,
    pub strategy: String,
    pub timeout: Duration,
}

impl ScoringConfig {
    /// Scorer settings with the API key taken from the environment.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        Self::resolve_with(config, &|var| std::env::var(var).ok())
    }

    fn resolve_with(config: &AppConfig, lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            endpoint: config.pagespeed.endpoint.clone(),
            api_key: secret_from(&config.pagespeed.api_key_env, "PageSpeed API key", lookup)?,
            strategy: config.pagespeed.strategy.clone(),
            timeout: Duration::from_secs(config.pagespeed.timeout_secs),
        })
    }
}

impl std::fmt::Debug for ScoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("strategy", &self.strategy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the report renderer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub report_url: String,
    pub chrome_executable: Option<PathBuf>,
    pub reinstall_command: Vec<String>,
    pub navigation_timeout: Duration,
}

impl From<&AppConfig> for RenderConfig {
    fn from(config: &AppConfig) -> Self {
        let section = &config.renderer;
        Self {
            report_url: section.report_url.clone(),
            chrome_executable: non_empty(&section.chrome_executable).map(PathBuf::from),
            reinstall_command: section.reinstall_command.clone(),
            navigation_timeout: Duration::from_secs(section.navigation_timeout_secs),
        }
    }
}

/// Settings for mail submission.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub address: String,
    pub password: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the orchestrator loop.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub artifact_dir: PathBuf,
    pub pace: Duration,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            artifact_dir: PathBuf::from(&config.run.artifact_dir),
            pace: Duration::from_millis(config.run.pace_ms),
        }
    }
}

/// Everything a full run needs, validated before the first record is read.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub spreadsheet: PathBuf,
    pub sheet: Option<String>,
    pub scoring: ScoringConfig,
    pub render: RenderConfig,
    pub smtp: SmtpConfig,
    pub pipeline: PipelineConfig,
}

impl RuntimeConfig {
    /// Resolve the runtime config from the file config, CLI overrides and
    /// the process environment.
    pub fn resolve(
        config: &AppConfig,
        spreadsheet: Option<PathBuf>,
        sheet: Option<String>,
    ) -> Result<Self> {
        Self::resolve_with(config, spreadsheet, sheet, |var| std::env::var(var).ok())
    }

    /// Like [`RuntimeConfig::resolve`], with an explicit secret lookup.
    pub fn resolve_with(
        config: &AppConfig,
        spreadsheet: Option<PathBuf>,
        sheet: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let spreadsheet = spreadsheet
            .or_else(|| non_empty(&config.input.spreadsheet).map(PathBuf::from))
            .ok_or_else(|| {
                PagePitchError::config(
                    "no spreadsheet given. Pass a path to `run` or set [input].spreadsheet",
                )
            })?;

        let sheet = sheet.or_else(|| non_empty(&config.input.sheet).map(String::from));

        let scoring = ScoringConfig::resolve_with(config, &lookup)?;

        let host = non_empty(&config.smtp.host)
            .ok_or_else(|| PagePitchError::config("[smtp].host is not set"))?;
        let address = non_empty(&config.smtp.address)
            .ok_or_else(|| PagePitchError::config("[smtp].address is not set"))?;

        let smtp = SmtpConfig {
            host: host.to_string(),
            port: config.smtp.port,
            address: address.to_string(),
            password: secret_from(&config.smtp.password_env, "SMTP password", &lookup)?,
            timeout: Duration::from_secs(config.smtp.timeout_secs),
        };

        Ok(Self {
            spreadsheet,
            sheet,
            scoring,
            render: RenderConfig::from(config),
            smtp,
            pipeline: PipelineConfig::from(config),
        })
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn secret_from(
    var_name: &str,
    what: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String> {
    match lookup(var_name) {
        Some(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(PagePitchError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagepitch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PagePitchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagepitch/pagepitch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PagePitchError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PagePitchError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PagePitchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PagePitchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PagePitchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
