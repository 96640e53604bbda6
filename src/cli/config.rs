use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::api::CredentialSource;

/// Locally persisted CLI state: which server to talk to and with what token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub token_saved_at: Option<DateTime<Utc>>,
    pub last_ping: Option<DateTime<Utc>>,
}

impl CliConfig {
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
        self.token_saved_at = Some(Utc::now());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
        self.token_saved_at = None;
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("COURSEWARE_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("courseware").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_cli_config() -> anyhow::Result<CliConfig> {
    let config_file = get_config_dir()?.join("cli.json");

    if !config_file.exists() {
        return Ok(CliConfig::default());
    }

    let content = fs::read_to_string(config_file)?;
    let config: CliConfig = serde_json::from_str(&content)?;
    Ok(config)
}

pub fn save_cli_config(config: &CliConfig) -> anyhow::Result<()> {
    let config_file = get_config_dir()?.join("cli.json");

    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_file, content)?;
    Ok(())
}

/// Token read from the CLI config; dropped from disk when the service rejects it
pub struct SavedToken {
    token: Mutex<Option<String>>,
}

impl SavedToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }
}

impl CredentialSource for SavedToken {
    fn bearer_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn on_unauthorized(&self) {
        if let Ok(mut token) = self.token.lock() {
            *token = None;
        }
        let cleared = load_cli_config().and_then(|mut config| {
            config.clear_token();
            save_cli_config(&config)
        });
        if let Err(e) = cleared {
            warn!("could not clear rejected token: {}", e);
        }
    }
}
