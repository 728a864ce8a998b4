use std::sync::Arc;

use codenews_core::{Authenticator, Config, SanitizedConfig, TicketQueue, TicketStore};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    queue: Arc<TicketQueue>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        queue: Arc<TicketQueue>,
    ) -> Self {
        Self {
            config,
            authenticator,
            queue,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get sanitized config (safe to expose via API)
    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    pub fn queue(&self) -> &TicketQueue {
        &self.queue
    }

    /// Raw store access, used for scrape-time gauges.
    pub fn ticket_store(&self) -> &Arc<dyn TicketStore> {
        self.queue.store()
    }
}
