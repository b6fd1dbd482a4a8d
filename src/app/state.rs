//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matchmaking::DuelService;
use crate::presence::PresenceRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: Arc<PresenceRegistry>,
    pub duel: DuelService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let presence = Arc::new(PresenceRegistry::new());

        // Coordinator shares the registry used for delivery
        let duel = DuelService::new(presence.clone());

        Self {
            config,
            presence,
            duel,
        }
    }
}
