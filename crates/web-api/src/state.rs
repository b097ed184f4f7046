use std::sync::Arc;

use application::{IdentityVerifier, MessagingService, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub messaging_service: Arc<MessagingService>,
    pub sessions: Arc<SessionRegistry>,
    pub identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        messaging_service: Arc<MessagingService>,
        sessions: Arc<SessionRegistry>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            messaging_service,
            sessions,
            identity,
        }
    }
}
