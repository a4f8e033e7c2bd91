//! Single-item processing, the path taken after an upload.

use clap::Args;

use crate::output;
use mediaq_core::error::AppError;
use mediaq_core::types::{ItemId, MediaKind};

use super::{Cli, Context};

/// Arguments for the process command
#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Media kind of the item (`photo` or `video`)
    pub kind: MediaKind,

    /// Item identifier
    pub id: ItemId,

    /// Enqueue even when automatic processing on upload is disabled
    #[arg(long)]
    pub force: bool,
}

/// Execute the process command
pub async fn execute(args: &ProcessArgs, cli: &Cli) -> Result<(), AppError> {
    let ctx = Context::connect(cli).await?;
    let cancel = cli.deadline();

    let job_id = if args.force {
        Some(ctx.queue.enqueue_item(args.id, args.kind, &cancel).await?)
    } else {
        ctx.queue
            .enqueue_item_on_upload(args.id, args.kind, &cancel)
            .await?
    };

    match job_id {
        Some(job_id) => output::print_success(&format!(
            "Processing for {} {} enqueued (job: {})",
            args.kind, args.id, job_id
        )),
        None => output::print_warning(
            "processing.auto_process_on_upload is disabled; pass --force to enqueue anyway",
        ),
    }

    ctx.close().await;
    Ok(())
}
