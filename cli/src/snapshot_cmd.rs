//! `ld-migrate snapshot`

use clap::Parser;
use ld_migrate_core::{
    HttpTransport, MigrateConfig, RateLimitedTransport, SnapshotDir, capture_project,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::output::{Palette, print_capture};
use crate::{EXIT_CANCELLED, EXIT_FATAL, EXIT_OK, EXIT_REVIEW};

#[derive(Debug, Parser)]
pub struct SnapshotArgs {
    /// Key of the project to capture
    #[arg(short = 'p', long)]
    pub project: String,

    /// Output the capture summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: SnapshotArgs, config: &MigrateConfig, cancel: CancellationToken) -> i32 {
    let api_key = match config.require_api_key() {
        Ok(key) => key,
        Err(err) => {
            eprintln!("error: {err}");
            return EXIT_FATAL;
        }
    };
    let http = match HttpTransport::new(&config.api_base_url(), api_key, config.request_timeout()) {
        Ok(http) => http,
        Err(err) => {
            eprintln!("error: {err}");
            return EXIT_FATAL;
        }
    };
    let transport = RateLimitedTransport::new(http);
    let store = SnapshotDir::new(&config.snapshot_dir);
    tracing::info!(project = %args.project, snapshot = %store.root().display(), "capturing project");

    // Capture only reads, so an interrupt may drop the request in flight.
    let result = tokio::select! {
        result = capture_project(&transport, &store, &args.project) => result,
        () = cancel.cancelled() => {
            tracing::warn!(project = %args.project, "capture cancelled; snapshot is incomplete");
            return EXIT_CANCELLED;
        }
    };

    match result {
        Ok(summary) => {
            if args.json {
                let output = json!({
                    "project": summary.project,
                    "written": summary.written,
                    "failures": summary
                        .failures
                        .iter()
                        .map(|failure| json!({ "resource": failure.resource, "reason": failure.reason }))
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            } else {
                print_capture(&summary, Palette::stdout());
            }
            if summary.is_complete() { EXIT_OK } else { EXIT_REVIEW }
        }
        Err(err) => {
            tracing::error!(error = %err, "capture aborted");
            eprintln!("error: {err}");
            EXIT_FATAL
        }
    }
}
