pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::console::AdminConsole;
use crate::error::AdminError;

#[derive(Parser)]
#[command(name = "cwadmin")]
#[command(about = "Courseware admin CLI - taxonomy management and content moderation")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Remote server selection and health")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },

    #[command(about = "Bearer token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Grade / Topic / Section management")]
    Taxonomy {
        #[command(subcommand)]
        cmd: commands::taxonomy::TaxonomyCommands,
    },

    #[command(about = "Content listing, authoring and approval")]
    Content {
        #[command(subcommand)]
        cmd: commands::content::ContentCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Environment config with the saved server URL applied on top
pub fn effective_config() -> anyhow::Result<AppConfig> {
    let mut app_config = crate::config::config().clone();
    if let Some(url) = config::load_cli_config()?.server_url {
        app_config.api.base_url = url;
    }
    Ok(app_config)
}

/// Console for the saved server and token
pub fn connect() -> anyhow::Result<AdminConsole> {
    let app_config = effective_config()?;
    let saved = config::load_cli_config()?;
    let credentials = Arc::new(config::SavedToken::new(saved.token));
    Ok(AdminConsole::with_http(&app_config, credentials)?)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Server { cmd } => commands::server::handle(cmd, output_format.clone()).await,
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format.clone()).await,
        Commands::Taxonomy { cmd } => commands::taxonomy::handle(cmd, output_format.clone()).await,
        Commands::Content { cmd } => commands::content::handle(cmd, output_format.clone()).await,
    };

    let Err(e) = result else {
        return Ok(());
    };
    let Some(admin) = e.downcast_ref::<AdminError>() else {
        return Err(e);
    };

    let message = match admin {
        AdminError::Unauthorized(_) => format!("{}; token cleared, run `cwadmin auth token <token>`", admin),
        _ => admin.to_string(),
    };
    // Text mode leaves printing to the binary
    if let OutputFormat::Json = output_format {
        utils::output_error(&output_format, &message, Some(admin.error_code()))?;
    }
    Err(anyhow::anyhow!(message))
}
