//! `ld-migrate migrate`
//!
//! Replays `<snapshot_dir>/project/<source>/` into a new destination project.
//! With `--dry-run` every request is built and printed but none is sent.

use clap::Parser;
use ld_migrate_core::transport::ApiRequest;
use ld_migrate_core::{
    DryRunTransport, HttpTransport, MigrateConfig, MigrationPlan, MigrationReport, Migrator,
    RateLimitedTransport, SnapshotDir,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::output::{Palette, print_report};
use crate::{EXIT_CANCELLED, EXIT_FATAL, EXIT_OK, EXIT_REVIEW};

#[derive(Debug, Parser)]
pub struct MigrateArgs {
    /// Key of the captured source project
    #[arg(short = 'p', long)]
    pub source_project: String,

    /// Key for the project to create at the destination
    #[arg(short = 'd', long)]
    pub dest_project: String,

    /// Print every request instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: MigrateArgs, config: &MigrateConfig, cancel: CancellationToken) -> i32 {
    let store = SnapshotDir::new(&config.snapshot_dir);
    let plan = MigrationPlan {
        source_project: args.source_project.clone(),
        destination_project: args.dest_project.clone(),
    };
    tracing::info!(
        source = %plan.source_project,
        destination = %plan.destination_project,
        snapshot = %store.root().display(),
        dry_run = args.dry_run,
        "starting migration"
    );

    if args.dry_run {
        let transport = DryRunTransport::new();
        let result = Migrator::new(&store, &transport)
            .with_cancellation(cancel)
            .run(&plan)
            .await;
        let requests = transport.requests();
        return match result {
            Ok(report) => {
                if args.json {
                    let output = json!({
                        "requests": requests.iter().map(request_json).collect::<Vec<_>>(),
                        "report": report,
                    });
                    print_json(&output);
                } else {
                    print_requests(&requests);
                    print_report(&report, Palette::stdout());
                }
                exit_code(&report)
            }
            Err(err) => fatal(&err),
        };
    }

    let api_key = match config.require_api_key() {
        Ok(key) => key,
        Err(err) => return fatal(&err),
    };
    let http = match HttpTransport::new(&config.api_base_url(), api_key, config.request_timeout()) {
        Ok(http) => http,
        Err(err) => return fatal(&err),
    };
    let transport = RateLimitedTransport::new(http);

    match Migrator::new(&store, &transport)
        .with_cancellation(cancel)
        .run(&plan)
        .await
    {
        Ok(report) => {
            if args.json {
                print_json(&report);
            } else {
                print_report(&report, Palette::stdout());
            }
            exit_code(&report)
        }
        Err(err) => fatal(&err),
    }
}

fn exit_code(report: &MigrationReport) -> i32 {
    if report.cancelled {
        EXIT_CANCELLED
    } else if report.needs_review() {
        EXIT_REVIEW
    } else {
        EXIT_OK
    }
}

fn fatal(err: &dyn std::error::Error) -> i32 {
    tracing::error!(error = %err, "migration aborted");
    eprintln!("error: {err}");
    EXIT_FATAL
}

fn request_json(request: &ApiRequest) -> Value {
    json!({
        "method": request.method.as_str(),
        "path": request.path,
        "body": request.body,
    })
}

fn print_requests(requests: &[ApiRequest]) {
    for request in requests {
        println!("{} {}", request.method, request.path);
        if let Some(body) = &request.body {
            println!("{}", serde_json::to_string_pretty(body).unwrap_or_default());
        }
        println!();
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
