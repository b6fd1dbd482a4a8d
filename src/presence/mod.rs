//! Presence registry - connected participants and their outboxes

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Longest display name accepted
pub const MAX_NAME_LEN: usize = 24;

/// A connected participant
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    outbox: mpsc::UnboundedSender<ServerMsg>,
}

/// Maps connection ids to display names and delivery channels
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    participants: DashMap<Uuid, Participant>,
    /// Reverse index for name lookups and uniqueness
    names: DashMap<String, Uuid>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a display name without reserving it
    pub fn check_name(&self, name: &str) -> Result<(), PresenceError> {
        if name.is_empty() {
            return Err(PresenceError::EmptyName);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(PresenceError::NameHasWhitespace);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(PresenceError::NameTooLong);
        }
        if self.names.contains_key(name) {
            return Err(PresenceError::NameTaken);
        }
        Ok(())
    }

    /// Register a participant; returns its connection id and outbox receiver
    pub fn register(
        &self,
        name: &str,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<ServerMsg>), PresenceError> {
        self.check_name(name)?;

        let id = Uuid::new_v4();
        match self.names.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(PresenceError::NameTaken),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let (outbox, rx) = mpsc::unbounded_channel();
        self.participants.insert(
            id,
            Participant {
                id,
                display_name: name.to_string(),
                outbox,
            },
        );

        info!(participant = %id, name, "Participant joined");
        Ok((id, rx))
    }

    /// Release a participant's identity; returns its display name
    pub fn unregister(&self, id: Uuid) -> Option<String> {
        let (_, participant) = self.participants.remove(&id)?;
        self.names
            .remove_if(&participant.display_name, |_, owner| *owner == id);
        info!(participant = %id, name = %participant.display_name, "Participant left");
        Some(participant.display_name)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Uuid> {
        let id = *self.names.get(name)?;
        self.participants.contains_key(&id).then_some(id)
    }

    pub fn display_name(&self, id: Uuid) -> Option<String> {
        self.participants.get(&id).map(|p| p.display_name.clone())
    }

    pub fn is_connected(&self, id: Uuid) -> bool {
        self.participants.contains_key(&id)
    }

    /// Deliver a message; silently dropped if the participant is gone
    pub fn send(&self, id: Uuid, msg: ServerMsg) -> bool {
        let Some(participant) = self.participants.get(&id) else {
            debug!(participant = %id, "Dropping message for departed participant");
            return false;
        };
        participant.outbox.send(msg).is_ok()
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }
}

/// Presence errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    #[error("Display name must not be empty")]
    EmptyName,

    #[error("Display name must not contain whitespace")]
    NameHasWhitespace,

    #[error("Display name is longer than {} characters", MAX_NAME_LEN)]
    NameTooLong,

    #[error("Display name is already in use")]
    NameTaken,
}
