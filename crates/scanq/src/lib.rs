//! scanq - announce recently modified files on an AMQP queue
//!
//! One run walks a directory tree, picks every regular file modified after a
//! fixed cutoff, sniffs its content type and publishes one JSON event per
//! file to the durable `walks` queue.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌────────────────┐     ┌─────────────┐
//! │  Connection  │     │   Traversal    │     │      File      │     │    Event    │
//! │ (retry, set  │────▶│   Scheduler    │────▶│   Classifier   │────▶│  Publisher  │
//! │  up queue)   │     │ (task per dir) │     │ (header sniff) │     │   (AMQP)    │
//! └──────────────┘     └────────────────┘     └────────────────┘     └─────────────┘
//! ```
//!
//! Only broker setup can fail a run. Per-file problems are counted in
//! [`WalkStats`] and the walk carries on.

pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod publish;
pub mod types;
pub mod walker;

// Re-exports for convenience
pub use classify::FileClassifier;
pub use config::CrawlConfig;
pub use connection::{BrokerSession, RetryPolicy};
pub use error::{Result, ScanqError};
pub use publish::{AmqpPublisher, EventSink};
pub use types::{DiscoveryEvent, EntryError, EntryErrorKind, WalkResult, WalkStats};
pub use walker::TraversalScheduler;

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

/// Connect, walk the configured root, publish, close.
///
/// The cutoff is fixed before the broker is dialed. Returns an error only
/// when the broker session cannot be set up; nothing is walked in that case.
pub async fn run(config: &CrawlConfig) -> Result<WalkResult> {
    let mut session = None;
    let slot = &mut session;

    let result = run_with(config, move || async move {
        let opened = BrokerSession::connect(&config.amqp_uri, &config.queue, &config.retry).await?;
        let publisher = Arc::new(AmqpPublisher::new(&opened));
        *slot = Some(opened);
        Ok::<_, ScanqError>(publisher)
    })
    .await;

    if let Some(session) = session {
        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close broker session cleanly");
        }
    }

    result
}

/// Run a scan against whatever sink `connect` produces.
///
/// Same ordering as [`run`]: cutoff, then `connect`, then the walk. An error
/// from `connect` is returned before any directory is listed.
pub async fn run_with<S, F, Fut>(config: &CrawlConfig, connect: F) -> Result<WalkResult>
where
    S: EventSink + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<S>>>,
{
    let cutoff = config.cutoff(SystemTime::now());
    info!(
        cutoff = %types::format_timestamp(cutoff),
        root = %config.root.display(),
        "Starting scan"
    );

    let sink = connect().await?;

    let scheduler = TraversalScheduler::new(
        sink,
        FileClassifier::new(config.sniff_len),
        config.max_concurrent_dirs,
    );
    Ok(scheduler.walk(&config.resolved_root(), cutoff).await)
}
