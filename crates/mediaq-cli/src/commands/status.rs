//! Queue and item status.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use mediaq_core::error::AppError;
use mediaq_core::types::MediaKind;
use mediaq_database::MediaItemRepository;

use super::{Cli, Context};

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// List this many recent failures per kind (PostgreSQL store only)
    #[arg(long, default_value_t = 0)]
    pub failures: i64,
}

/// Item counts for one media kind
#[derive(Debug, Serialize, Tabled)]
struct KindRow {
    kind: String,
    pending: u64,
    processing: u64,
    processed: u64,
    failed: u64,
    total: u64,
}

/// A failed item
#[derive(Debug, Serialize, Tabled)]
struct FailureRow {
    id: String,
    kind: String,
    error: String,
    updated_at: String,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, cli: &Cli) -> Result<(), AppError> {
    let ctx = Context::connect(cli).await?;

    let stats = ctx.queue.stats().await?;
    let mut rows = Vec::with_capacity(MediaKind::ALL.len());
    for kind in MediaKind::ALL {
        let counts = ctx.store.status_counts(kind).await?;
        rows.push(KindRow {
            kind: kind.to_string(),
            pending: counts.pending,
            processing: counts.processing,
            processed: counts.processed,
            failed: counts.failed,
            total: counts.total(),
        });
    }

    match cli.format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "queue": stats,
            "items": rows,
        })),
        OutputFormat::Table => {
            println!("Queue '{}':", ctx.config.broker.queue);
            output::print_kv("Ready", &stats.ready.to_string());
            output::print_kv("Delayed", &stats.delayed.to_string());
            output::print_kv("In flight", &stats.in_flight.to_string());
            output::print_kv("Concurrency", &ctx.config.worker.concurrency.to_string());
            output::print_kv(
                "Scheduled discovery",
                if ctx.config.scheduler.enabled { "enabled" } else { "disabled" },
            );
            println!();
            output::print_list(&rows, OutputFormat::Table);
        }
    }

    if args.failures > 0 {
        match &ctx.pool {
            Some(pool) => {
                let repo = MediaItemRepository::new(pool.pool().clone());
                let mut failures = Vec::new();
                for kind in MediaKind::ALL {
                    for item in repo.recent_failures(kind, args.failures).await? {
                        failures.push(FailureRow {
                            id: item.id.to_string(),
                            kind: item.kind.to_string(),
                            error: item.processing_error.unwrap_or_default(),
                            updated_at: item.updated_at.to_rfc3339(),
                        });
                    }
                }
                println!();
                output::print_list(&failures, cli.format);
            }
            None => output::print_warning("Failure listing needs store.provider = 'postgres'"),
        }
    }

    ctx.close().await;
    Ok(())
}
