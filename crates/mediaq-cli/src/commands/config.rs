//! Configuration inspection CLI commands.

use clap::{Args, Subcommand};

use crate::output;
use mediaq_core::config::mask_credentials;
use mediaq_core::error::AppError;

use super::Cli;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub async fn execute(args: &ConfigArgs, cli: &Cli) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = cli.load_config()?;
            config.database.url = mask_credentials(&config.database.url);
            config.broker.redis.url = mask_credentials(&config.broker.redis.url);
            output::print_json(&config);
        }
        ConfigCommand::Validate => match cli.load_config() {
            Ok(config) => {
                output::print_success(&format!("Configuration '{}' is valid", cli.config));
                output::print_kv("Broker", &config.broker.provider);
                output::print_kv("Store", &config.store.provider);
                output::print_kv("Database", &mask_credentials(&config.database.url));
                output::print_kv("Concurrency", &config.worker.concurrency.to_string());
                output::print_kv(
                    "Time limits",
                    &format!(
                        "soft {}s / hard {}s / visibility {}s",
                        config.worker.soft_time_limit_seconds,
                        config.worker.hard_time_limit_seconds,
                        config.broker.visibility_timeout_seconds
                    ),
                );
                output::print_kv("Schedule entries", &config.scheduler.entries.len().to_string());
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
