//! Manual batch discovery.

use clap::Args;

use crate::output;
use mediaq_core::error::AppError;
use mediaq_core::types::MediaKind;

use super::{Cli, Context};

/// Arguments for the trigger command
#[derive(Debug, Args)]
pub struct TriggerArgs {
    /// Media kind to discover (`photo` or `video`)
    pub kind: MediaKind,

    /// Maximum number of items to enqueue
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Execute the trigger command
pub async fn execute(args: &TriggerArgs, cli: &Cli) -> Result<(), AppError> {
    let ctx = Context::connect(cli).await?;

    let limit = match args.limit {
        Some(0) => return Err(AppError::validation("--limit must be greater than 0")),
        Some(limit) => limit,
        None => ctx
            .config
            .scheduler
            .entries
            .iter()
            .find(|entry| entry.kind == args.kind)
            .map(|entry| entry.batch_size_limit)
            .unwrap_or(500),
    };

    let job_id = ctx
        .queue
        .enqueue_discovery(args.kind, limit, &cli.deadline())
        .await?;

    output::print_success(&format!(
        "Discovery for {} enqueued (job: {}, limit: {})",
        args.kind, job_id, limit
    ));

    ctx.close().await;
    Ok(())
}
