use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Queue for evaluation jobs; absent when MQ is disabled.
    pub mq: Option<Arc<mq::Mq>>,
    /// Redis client for progress subscriptions; absent when MQ is disabled.
    pub events: Option<redis::Client>,
    pub config: Arc<AppConfig>,
}
