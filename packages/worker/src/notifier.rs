use redis::aio::ConnectionManager;
use tracing::warn;

use common::progress::{ProgressEvent, progress_channel};
use mq::pubsub;

/// Fire-and-forget publisher for evaluation progress.
///
/// Publish failures are logged and swallowed; a broken progress channel must
/// never abort an evaluation.
#[derive(Clone)]
pub struct ProgressNotifier {
    conn: Option<ConnectionManager>,
}

impl ProgressNotifier {
    pub async fn connect(url: &str) -> Self {
        match pubsub::connect_publisher(url).await {
            Ok(conn) => Self { conn: Some(conn) },
            Err(e) => {
                warn!(error = %e, "Progress notifier disabled: pub/sub connection failed");
                Self { conn: None }
            }
        }
    }

    /// A notifier that drops every event. Used when MQ is disabled and in
    /// tests.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    pub async fn publish(&self, submission_id: i32, event: &ProgressEvent) {
        let Some(conn) = &self.conn else { return };
        let channel = progress_channel(submission_id);
        if let Err(e) = pubsub::publish_json(conn, &channel, event).await {
            warn!(submission_id, error = %e, "Failed to publish progress event");
        }
    }
}
