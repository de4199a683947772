use sigbridge_auth::{Authenticator, NetworkPolicy};
use sigbridge_feedback::FeedbackLog;
use sigbridge_queue::{FileSignalQueue, SignalSource};
use std::sync::Arc;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub authenticator: Authenticator,
    pub queue: Arc<dyn SignalSource>,
    pub feedback: FeedbackLog,
    /// Shown in /health so operators can confirm which directory is served.
    pub queue_dir: String,
}

impl AppState {
    /// Wire up the production backends from one config.
    pub fn from_config(config: &sigbridge_core::BridgeConfig) -> Self {
        let authenticator = Authenticator::new(
            config.token.clone(),
            config.hmac_secret.clone(),
            NetworkPolicy::new(config.token_only_networks.clone()),
            config.replay_window,
            config.replay_cache_capacity,
        );
        Self {
            authenticator,
            queue: Arc::new(FileSignalQueue::new(&config.queue_dir)),
            feedback: FeedbackLog::new(&config.feedback_log),
            queue_dir: config.queue_dir.display().to_string(),
        }
    }
}
