//! Gateway state
//!
//! Application state shared by every route.

use crate::broadcast::{BroadcastRouter, EventPublisher};
use chat_common::{AppConfig, JwtService};
use chat_core::UserDirectory;
use std::sync::Arc;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    /// Bridge into the broadcast router
    publisher: EventPublisher,
    jwt_service: Arc<JwtService>,
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Start the router against `directory` and build the state around it
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: AppConfig, directory: Arc<dyn UserDirectory>) -> Self {
        let (router, _task) = BroadcastRouter::spawn(&config.realtime, directory);
        let jwt_service = Arc::new(JwtService::new(
            &config.jwt.secret,
            config.jwt.access_token_expiry,
        ));

        Self {
            publisher: EventPublisher::new(router),
            jwt_service,
            config: Arc::new(config),
        }
    }

    /// Get the event publisher
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("publisher", &self.publisher)
            .field("config", &"AppConfig")
            .finish()
    }
}
