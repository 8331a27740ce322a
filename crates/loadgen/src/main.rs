//! `imago-loadgen` -- load generator for the imago conversion service.
//!
//! Spawns `-concurrency` workers that each submit `-count` conversion
//! batches, waits for every batch to resolve, and logs success and
//! failure totals.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                         |
//! |------------------------|----------|-------------------------|-------------------------------------|
//! | `IMAGO_SERVER_URL`     | no       | `http://localhost:3000` | Conversion service base URL         |
//! | `STATUS_TIMEOUT_SECS`  | no       | `300`                   | Server-side long-poll timeout       |
//! | `REPORT_INTERVAL_SECS` | no       | `10`                    | Seconds between progress lines      |
//! | `IMAGO_SOURCE_URI`     | no       | fixture image           | Source image for every action       |
//! | `IMAGO_OUTPUT_PREFIX`  | no       | fixture prefix          | Where converted outputs are written |

use std::sync::Arc;

use imago_client::ImagoApi;
use imago_loadgen::config::{Cli, Settings};
use imago_loadgen::pool::LoadTest;
use imago_loadgen::submitter::HttpSubmitter;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imago_loadgen=info,imago_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse_normalized();

    let settings = Settings::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let api = ImagoApi::new(&settings.server_url, settings.request_timeout()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(1);
    });

    tracing::info!(
        server_url = %settings.server_url,
        status_timeout_secs = settings.status_timeout.as_secs(),
        report_interval_secs = settings.report_interval.as_secs(),
        "Starting imago-loadgen",
    );

    let submitter = HttpSubmitter::new(api, settings.template.clone())
        .with_status_timeout(settings.status_timeout);

    LoadTest::new(Arc::new(submitter), cli.plan())
        .with_report_interval(settings.report_interval)
        .run()
        .await;
}
