use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use url::Url;

use crate::cli::config::{load_cli_config, save_cli_config};
use crate::cli::utils::{output_data, output_success};
use crate::cli::{connect, effective_config, OutputFormat};

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Set the API base URL")]
    Set {
        #[arg(help = "Server URL, e.g. https://admin.example.com")]
        url: String,
    },

    #[command(about = "Show the server in use")]
    Show,

    #[command(about = "Check the server by loading the taxonomy tree")]
    Ping,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Set { url } => {
            let parsed = Url::parse(url.trim()).map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;
            let mut config = load_cli_config()?;
            config.server_url = Some(parsed.to_string());
            save_cli_config(&config)?;

            output_success(
                &output_format,
                &format!("Server set to {}", parsed),
                Some(json!({ "server_url": parsed.to_string() })),
            )
        }
        ServerCommands::Show => {
            let app_config = effective_config()?;
            let saved = load_cli_config()?;
            let data = json!({
                "server_url": &app_config.api.base_url,
                "saved": saved.server_url.is_some(),
                "environment": &app_config.environment,
                "last_ping": saved.last_ping,
            });
            let mut text = vec![format!("Server: {}", app_config.api.base_url)];
            if saved.server_url.is_none() {
                text.push("(from environment)".to_string());
            }
            if let Some(at) = saved.last_ping {
                text.push(format!("Last successful ping: {}", at.to_rfc3339()));
            }
            output_data(&output_format, &data, &text)
        }
        ServerCommands::Ping => {
            let console = connect()?;
            let tree = console.tree().fetch_tree().await?;
            let counts = tree.counts();

            let mut config = load_cli_config()?;
            config.last_ping = Some(Utc::now());
            save_cli_config(&config)?;

            output_success(
                &output_format,
                &format!(
                    "Server is up: {} grades, {} topics, {} sections",
                    counts.grades, counts.topics, counts.sections
                ),
                Some(json!({
                    "grades": counts.grades,
                    "topics": counts.topics,
                    "sections": counts.sections,
                })),
            )
        }
    }
}
