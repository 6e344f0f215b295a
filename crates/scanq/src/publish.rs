//! Event publishing
//!
//! Every directory task publishes through one shared channel, so the AMQP
//! implementation serializes submissions behind an async mutex. Broker
//! confirms are never awaited.

use crate::connection::BrokerSession;
use crate::error::Result;
use crate::types::DiscoveryEvent;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::trace;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode 1: the message is not written to disk by the broker.
pub const TRANSIENT_DELIVERY_MODE: u8 = 1;

/// Destination for discovery events.
///
/// Implementations must accept concurrent calls from many tasks.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DiscoveryEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Properties stamped on every message.
pub fn message_properties() -> BasicProperties {
    BasicProperties::default()
        .with_content_type(JSON_CONTENT_TYPE.into())
        .with_delivery_mode(TRANSIENT_DELIVERY_MODE)
}

/// Publishes to a queue through the default exchange.
pub struct AmqpPublisher {
    channel: Mutex<Channel>,
    routing_key: String,
}

impl AmqpPublisher {
    pub fn new(session: &BrokerSession) -> Self {
        Self {
            channel: Mutex::new(session.channel().clone()),
            routing_key: session.queue().to_string(),
        }
    }
}

impl EventSink for AmqpPublisher {
    async fn publish(&self, event: &DiscoveryEvent) -> Result<()> {
        let body = event.to_json()?;
        let channel = self.channel.lock().await;
        // mandatory=false, immediate=false
        let _confirm = channel
            .basic_publish(
                "",
                &self.routing_key,
                BasicPublishOptions::default(),
                &body,
                message_properties(),
            )
            .await?;
        trace!(path = %event.path, "Published event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_properties() {
        let props = message_properties();
        assert_eq!(
            props.content_type().as_ref().map(|ct| ct.as_str()),
            Some("application/json")
        );
        assert_eq!(*props.delivery_mode(), Some(1));
        assert!(props.expiration().is_none());
    }

    #[test]
    fn test_publish_options_are_not_mandatory() {
        let options = BasicPublishOptions::default();
        assert!(!options.mandatory);
        assert!(!options.immediate);
    }
}
