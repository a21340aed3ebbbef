use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Pub/sub error: {0}")]
    PubSub(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<broccoli_queue::error::BroccoliError> for MqError {
    fn from(e: broccoli_queue::error::BroccoliError) -> Self {
        MqError::Queue(e.to_string())
    }
}
