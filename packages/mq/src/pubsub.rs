//! Redis pub/sub plumbing for live progress channels.
//!
//! Queues carry work that must not be lost; progress events are best-effort
//! and only matter while a client is watching, so they go over plain pub/sub
//! instead of the task queue.

use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::debug;

use crate::error::MqError;

/// Multiplexed connection for publishers. Cheap to clone.
pub async fn connect_publisher(url: &str) -> Result<ConnectionManager, MqError> {
    let client = redis::Client::open(url)?;
    Ok(client.get_connection_manager().await?)
}

/// Client handle for subscribers; each subscription holds its own connection.
pub fn client(url: &str) -> Result<redis::Client, MqError> {
    Ok(redis::Client::open(url)?)
}

/// Publish a JSON payload to a channel. Returns the subscriber count.
pub async fn publish_json<T: Serialize>(
    conn: &ConnectionManager,
    channel: &str,
    payload: &T,
) -> Result<i64, MqError> {
    let body = serde_json::to_string(payload)?;
    let mut conn = conn.clone();
    let receivers: i64 = conn.publish(channel, body).await?;
    debug!(channel, receivers, "Published pub/sub message");
    Ok(receivers)
}

/// An active subscription to one channel.
pub struct Subscription {
    pubsub: redis::aio::PubSub,
}

/// Subscribe to a channel, yielding raw message payloads.
pub async fn subscribe(client: &redis::Client, channel: &str) -> Result<Subscription, MqError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    Ok(Subscription { pubsub })
}

impl Subscription {
    /// Next message payload, or None once the connection closes.
    pub async fn next_payload(&mut self) -> Option<String> {
        let msg = self.pubsub.on_message().next().await?;
        msg.get_payload().ok()
    }
}
