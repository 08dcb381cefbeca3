//! Application settings management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// General settings
    #[serde(default)]
    pub general: GeneralSettings,

    /// Completion service settings
    #[serde(default)]
    pub llm: LlmSettings,

    /// Receipt analysis service settings
    #[serde(default)]
    pub analyzer: AnalyzerSettings,

    /// Synced cloud folder settings
    #[serde(default)]
    pub cloud: CloudSettings,

    /// Spending chart settings
    #[serde(default)]
    pub graph: GraphSettings,

    /// Monthly report e-mail settings
    #[serde(default)]
    pub mail: MailSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Root of the input, processed, error and output directories
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write a log file for each run that touches the ledger
    #[serde(default = "default_true")]
    pub log_to_file: bool,

    /// Directory for run log files (defaults to `<data_dir>/logs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Level for the run log file, independent of `log_level`
    #[serde(default = "default_file_log_level")]
    pub file_log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// LLM provider (azure_openai, gemini)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Model or deployment name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API endpoint (Azure resource URL, or a custom Gemini base URL)
    #[serde(default)]
    pub endpoint: String,

    /// Azure OpenAI api-version query parameter
    #[serde(default = "default_llm_api_version")]
    pub api_version: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    /// Document Intelligence resource URL
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_analyzer_model")]
    pub model_id: String,

    #[serde(default = "default_analyzer_api_version")]
    pub api_version: String,

    /// Delay between result polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up after this many polls
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Timeout for each HTTP request in seconds
    #[serde(default = "default_analyzer_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudSettings {
    /// Import receipts from a synced folder before each run
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub inbox_dir: PathBuf,

    #[serde(default)]
    pub processed_dir: PathBuf,

    #[serde(default)]
    pub error_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Draw monthly and annual spending charts after each run
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TrueType/OpenType font for chart labels; common CJK fonts are tried
    /// when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    /// Send the monthly report after a run on `send_day`
    #[serde(default)]
    pub enabled: bool,

    /// Day of the month (1-31) the current month's report goes out
    #[serde(default = "default_send_day")]
    pub send_day: u32,

    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// STARTTLS submission port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_user: String,

    #[serde(default)]
    pub smtp_password: String,
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "kakeibo", "kakeibo")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.local/share/kakeibo"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_log_level() -> String {
    "debug".to_string()
}

fn default_llm_provider() -> String {
    "azure_openai".to_string()
}

fn default_llm_model() -> String {
    "gpt-4.1".to_string()
}

fn default_llm_api_version() -> String {
    "2024-12-01-preview".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_analyzer_model() -> String {
    "prebuilt-receipt".to_string()
}

fn default_analyzer_api_version() -> String {
    "2023-07-31".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    60
}

fn default_analyzer_timeout_secs() -> u64 {
    30
}

fn default_send_day() -> u32 {
    1
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_to_file: true,
            log_dir: None,
            file_log_level: default_file_log_level(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: String::new(),
            model: default_llm_model(),
            endpoint: String::new(),
            api_version: default_llm_api_version(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: default_analyzer_model(),
            api_version: default_analyzer_api_version(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            timeout_secs: default_analyzer_timeout_secs(),
        }
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            font_path: None,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            send_day: default_send_day(),
            from: String::new(),
            to: Vec::new(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_user: String::new(),
            smtp_password: String::new(),
        }
    }
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("No config file found, using defaults");
            let mut settings = Self::default();
            settings.apply_env_overrides();
            return Ok(settings);
        }

        let mut settings = Self::load_from(&config_path)?;
        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Parse a configuration file without applying env overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        override_if_empty(&mut self.llm.api_key, "KAKEIBO_LLM_API_KEY");
        override_if_empty(&mut self.llm.endpoint, "KAKEIBO_LLM_ENDPOINT");
        override_if_empty(&mut self.analyzer.api_key, "KAKEIBO_ANALYZER_API_KEY");
        override_if_empty(&mut self.analyzer.endpoint, "KAKEIBO_ANALYZER_ENDPOINT");
        override_if_empty(&mut self.mail.smtp_user, "KAKEIBO_SMTP_USER");
        override_if_empty(&mut self.mail.smtp_password, "KAKEIBO_SMTP_PASSWORD");
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("KAKEIBO_CONFIG") {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let dirs = ProjectDirs::from("com", "kakeibo", "kakeibo")
            .context("Could not determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Write default configuration to a file
    pub fn write_default(path: &Path) -> Result<()> {
        let settings = Self::default();
        let content = toml::to_string_pretty(&settings)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory scanned for new receipt images
    pub fn input_dir(&self) -> PathBuf {
        self.general.data_dir.join("input")
    }

    /// Receipts that were recorded successfully
    pub fn processed_dir(&self) -> PathBuf {
        self.general.data_dir.join("processed")
    }

    /// Receipts that could not be recorded
    pub fn error_dir(&self) -> PathBuf {
        self.general.data_dir.join("error")
    }

    pub fn output_json_dir(&self) -> PathBuf {
        self.general.data_dir.join("output").join("json")
    }

    pub fn output_csv_dir(&self) -> PathBuf {
        self.general.data_dir.join("output").join("csv")
    }

    pub fn output_summary_dir(&self) -> PathBuf {
        self.general.data_dir.join("output").join("summary")
    }

    pub fn output_graph_dir(&self) -> PathBuf {
        self.general.data_dir.join("output").join("graph")
    }

    /// Where run log files go
    pub fn log_dir(&self) -> PathBuf {
        self.general
            .log_dir
            .clone()
            .unwrap_or_else(|| self.general.data_dir.join("logs"))
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.input_dir(),
            self.processed_dir(),
            self.error_dir(),
            self.output_json_dir(),
            self.output_csv_dir(),
            self.output_summary_dir(),
            self.output_graph_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

fn override_if_empty(field: &mut String, var: &str) {
    if !field.trim().is_empty() {
        return;
    }
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            *field = value;
        }
    }
}
