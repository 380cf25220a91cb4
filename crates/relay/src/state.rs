//! Shared application state

use std::sync::Arc;

use assist_shared::AddressResolver;

use crate::auth::{AllowAll, Authorizer, JwtAuthorizer, JwtManager};
use crate::config::Config;
use crate::websocket::WebSocketState;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ws_state: WebSocketState,
    pub authorizer: Arc<dyn Authorizer>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let authorizer: Arc<dyn Authorizer> = match &config.jwt_secret {
            Some(secret) => Arc::new(JwtAuthorizer::new(JwtManager::new(
                secret,
                config.jwt_expiry_hours,
            ))),
            None => {
                tracing::warn!(
                    "ASSIST_JWT_SECRET not set, agent connections are not authenticated"
                );
                Arc::new(AllowAll)
            }
        };

        Self::with_authorizer(config, authorizer)
    }

    pub fn with_authorizer(config: Config, authorizer: Arc<dyn Authorizer>) -> Self {
        let resolver = AddressResolver::new(config.project_key_length);
        Self {
            config: Arc::new(config),
            ws_state: WebSocketState::new(resolver),
            authorizer,
        }
    }
}
