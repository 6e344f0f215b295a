//! scanq
//!
//! Usage:
//!     scanq
//!
//! Walks the built-in root and publishes every file modified in the last ten
//! years to the `walks` queue. Set `RUST_LOG` to change log verbosity.

use anyhow::Context;
use scanq::CrawlConfig;
use scanq_logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogConfig {
        app_name: "scanq",
        verbose: false,
    })?;

    let config = CrawlConfig::default();
    let result = match scanq::run(&config).await {
        Ok(result) => result,
        Err(e) if e.is_fatal() => {
            tracing::error!(error = %e, "Broker setup failed");
            return Err(e).context("Broker setup failed");
        }
        Err(e) => {
            tracing::error!(error = %e, "Scan aborted");
            return Err(e).context("Scan aborted");
        }
    };

    let stats = &result.stats;
    tracing::info!(
        dirs = stats.dirs_scanned,
        files = stats.files_seen,
        matched = stats.files_matched,
        too_old = stats.files_too_old,
        published = stats.events_published,
        classify_failures = stats.classify_failures,
        publish_failures = stats.publish_failures,
        errors = stats.errors,
        duration_ms = stats.duration_ms,
        "Scan complete"
    );
    for error in result.errors.iter().take(10) {
        tracing::warn!(path = %error.path, kind = %error.kind, error = %error.message, "Entry error");
    }

    Ok(())
}
