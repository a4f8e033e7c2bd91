//! CLI command definitions and dispatch.

pub mod config;
pub mod process;
pub mod status;
pub mod trigger;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputFormat};
use mediaq_broker::BrokerManager;
use mediaq_core::config::AppConfig;
use mediaq_core::error::AppError;
use mediaq_core::traits::ItemStore;
use mediaq_database::DatabasePool;
use mediaq_worker::JobQueue;

/// MediaQ: scheduled AI processing for media libraries
#[derive(Debug, Parser)]
#[command(name = "mediaq", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (`config/{env}.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Seconds to keep retrying an unreachable broker before giving up
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show queue depths and item processing counts
    Status(status::StatusArgs),
    /// Enqueue a batch-discovery job now
    Trigger(trigger::TriggerArgs),
    /// Enqueue processing for a single uploaded item
    Process(process::ProcessArgs),
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Status(args) => status::execute(args, self).await,
            Commands::Trigger(args) => trigger::execute(args, self).await,
            Commands::Process(args) => process::execute(args, self).await,
            Commands::Config(args) => config::execute(args, self).await,
        }
    }

    /// Cancellation token for broker retries, bounded by `--timeout`
    pub fn deadline(&self) -> CancellationToken {
        mediaq_worker::deadline(Duration::from_secs(self.timeout.max(1)))
    }

    /// Load and validate configuration
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load(&self.config, &self.env)
    }
}

/// Connections a command needs
pub struct Context {
    /// Validated configuration
    pub config: AppConfig,
    /// Item store
    pub store: Arc<dyn ItemStore>,
    /// Database pool when the store is PostgreSQL
    pub pool: Option<DatabasePool>,
    /// Job queue over the configured broker
    pub queue: JobQueue,
}

impl Context {
    /// Connect to the configured store and broker
    pub async fn connect(cli: &Cli) -> Result<Self, AppError> {
        let config = cli.load_config()?;
        if config.broker.provider == "memory" {
            output::print_warning(
                "broker.provider is 'memory': the queue lives only inside this process",
            );
        }

        let (store, pool) = mediaq_database::create_item_store(&config).await?;
        let broker = BrokerManager::new(&config.broker).await?;
        let queue = JobQueue::new(Arc::new(broker), &config.broker, &config.processing);

        Ok(Self {
            config,
            store,
            pool,
            queue,
        })
    }

    /// Release connections
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}
