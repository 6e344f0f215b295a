//! Broker session setup
//!
//! - Dial with a bounded number of attempts and a fixed pause in between
//! - One connection and one channel for the whole run, never reconnected
//! - The destination queue is declared durable before anything is published

use crate::config::redact_uri;
use crate::error::{Result, ScanqError};
use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// Dial attempts and the pause between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Run `dial` until it succeeds or the policy is spent.
///
/// Each failure is logged. There is no pause after the last attempt.
pub async fn retry_connect<T, F, Fut>(policy: &RetryPolicy, target: &str, mut dial: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match dial().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(broker = %target, attempt, "Connected after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    warn!(
                        broker = %target,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Could not connect, retrying in {:?}",
                        policy.delay
                    );
                    tokio::time::sleep(policy.delay).await;
                } else {
                    warn!(broker = %target, attempt, error = %e, "Could not connect, giving up");
                }
            }
        }
    }

    Err(ScanqError::ConnectExhausted {
        target: target.to_string(),
        attempts,
        last_error,
    })
}

/// Durable, shared, kept when unused.
pub fn queue_declare_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        passive: false,
        durable: true,
        exclusive: false,
        auto_delete: false,
        nowait: false,
    }
}

/// Live connection plus the channel every publish goes through
pub struct BrokerSession {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl BrokerSession {
    /// Dial the broker, open a channel and declare `queue`.
    ///
    /// Any error here is fatal for the run.
    pub async fn connect(uri: &str, queue: &str, policy: &RetryPolicy) -> Result<Self> {
        let target = redact_uri(uri);
        let connection = retry_connect(policy, &target, move || async move {
            Connection::connect(uri, ConnectionProperties::default())
                .await
                .map_err(ScanqError::from)
        })
        .await?;
        info!(broker = %target, "Connected to broker");

        let channel = connection
            .create_channel()
            .await
            .map_err(ScanqError::Channel)?;

        let declared = channel
            .queue_declare(queue, queue_declare_options(), FieldTable::default())
            .await
            .map_err(|source| ScanqError::QueueDeclare {
                queue: queue.to_string(),
                source,
            })?;
        info!(
            queue = %queue,
            messages = declared.message_count(),
            consumers = declared.consumer_count(),
            "Queue declared"
        );

        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Close the channel, then the connection.
    pub async fn close(self) -> Result<()> {
        self.channel.close(REPLY_SUCCESS, "OK").await?;
        self.connection.close(REPLY_SUCCESS, "OK").await?;
        Ok(())
    }
}
