use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::error::ConfigError;
use crate::core::session::DEFAULT_TITLE_CHARS;

/// Question endpoint served by the local RAG backend
const DEFAULT_ENDPOINT: &str = "http://localhost:8000/query";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Directory holding the session database and log file, relative to `working_dir`
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// URL that receives `POST {"question": ...}`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Characters of the first question used as the default title
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Height cap for the growing input box
    #[serde(default = "default_input_max_lines")]
    pub input_max_lines: u16,

    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            data_dir: default_data_dir(),
            endpoint: default_endpoint(),
            title_max_chars: default_title_max_chars(),
            input_max_lines: default_input_max_lines(),
            debug: false,
        }
    }
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_data_dir() -> String {
    ".ragchat".into()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

fn default_title_max_chars() -> usize {
    DEFAULT_TITLE_CHARS
}

fn default_input_max_lines() -> u16 {
    6
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig {
        working_dir: wd.clone(),
        ..AppConfig::default()
    };

    // Global config
    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("ragchat").join("config.json");
        if global_path.exists() {
            merge_config(&mut config, read_config_file(&global_path)?);
        }
    }

    // Project-local config
    let local_path = wd.join("ragchat.json");
    if local_path.exists() {
        merge_config(&mut config, read_config_file(&local_path)?);
    }

    detect_endpoint(&mut config);

    Ok(config)
}

fn read_config_file(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if overlay.endpoint != default_endpoint() {
        base.endpoint = overlay.endpoint;
    }
    if overlay.title_max_chars != default_title_max_chars() {
        base.title_max_chars = overlay.title_max_chars;
    }
    if overlay.input_max_lines != default_input_max_lines() {
        base.input_max_lines = overlay.input_max_lines;
    }
    if overlay.debug {
        base.debug = true;
    }
}

fn detect_endpoint(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("RAGCHAT_ENDPOINT") {
        if !url.trim().is_empty() {
            config.endpoint = url.trim().to_string();
        }
    }
}

impl AppConfig {
    pub fn data_path(&self) -> PathBuf {
        self.working_dir.join(&self.data_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_path().join("ragchat.log")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.title_max_chars == 0 {
            return Err(ConfigError::Invalid("title_max_chars must be positive".into()));
        }
        Ok(())
    }
}
