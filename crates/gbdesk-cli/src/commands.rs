//! Command handlers for the desktop bridge CLI

use tracing::info;

use crate::app::{render_message, BridgeApp};
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command against the loaded configuration
    pub async fn execute(command: Commands, mut config: AppConfig) -> Result<()> {
        match command {
            Commands::Serve { name, in_memory } => {
                if let Some(name) = name {
                    config.ble.local_name = name;
                }
                config.store.in_memory |= in_memory;
                config.validate()?;
                Self::handle_serve_command(BridgeApp::new(config)).await
            }
            Commands::Messages { limit } => {
                Self::handle_messages_command(BridgeApp::new(config), limit).await
            }
            Commands::Config => Self::handle_config_command(&config),
        }
    }

    async fn handle_serve_command(app: BridgeApp) -> Result<()> {
        info!(
            "Starting bridge as '{}' (service {})",
            app.config().ble.local_name,
            app.config().gatt.service_uuid
        );
        app.serve().await
    }

    async fn handle_messages_command(app: BridgeApp, limit: usize) -> Result<()> {
        for message in app.recent_messages(limit).await? {
            println!("{}", render_message(&message)?);
        }
        Ok(())
    }

    fn handle_config_command(config: &AppConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
