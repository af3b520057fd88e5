use gslb_core::SyncEngine;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct WebhookState {
    pub engine: Arc<SyncEngine>,

    /// Shared secret expected in the secret header
    /// ⚠️ NEVER log this value
    pub secret: Arc<str>,
}

impl WebhookState {
    pub fn new(engine: Arc<SyncEngine>, secret: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState")
            .field("zone", &self.engine.zone())
            .field("secret", &"<REDACTED>")
            .finish()
    }
}
