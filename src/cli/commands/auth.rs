use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{load_cli_config, save_cli_config};
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Store a bearer token issued by the platform")]
    Token {
        #[arg(help = "Bearer token")]
        token: String,
    },

    #[command(about = "Forget the stored token")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Token { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err(anyhow::anyhow!("Token must not be empty"));
            }
            let mut config = load_cli_config()?;
            config.set_token(token.to_string());
            save_cli_config(&config)?;
            output_success(&output_format, "Token saved", None)
        }
        AuthCommands::Logout => {
            let mut config = load_cli_config()?;
            config.clear_token();
            save_cli_config(&config)?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let config = load_cli_config()?;
            let data = json!({
                "authenticated": config.token.is_some(),
                "token_saved_at": config.token_saved_at,
            });
            let text = match config.token_saved_at {
                Some(at) if config.token.is_some() => vec![format!("Token saved at {}", at.to_rfc3339())],
                _ if config.token.is_some() => vec!["Token saved".to_string()],
                _ => vec!["Not logged in".to_string()],
            };
            output_data(&output_format, &data, &text)
        }
    }
}
