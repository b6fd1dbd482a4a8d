//! Pending challenge requests

use std::collections::HashMap;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::util::ids::ChallengeId;

/// An addressed, time-bounded invitation to duel
#[derive(Debug)]
pub struct ChallengeRequest {
    pub id: ChallengeId,
    pub challenger: Uuid,
    pub challenger_name: String,
    pub target: Uuid,
    pub target_name: String,
    pub created_at: Instant,
    /// Timer task that expires this request
    expiry: Option<AbortHandle>,
}

impl ChallengeRequest {
    pub fn new(
        id: ChallengeId,
        challenger: (Uuid, String),
        target: (Uuid, String),
        expiry: Option<AbortHandle>,
    ) -> Self {
        Self {
            id,
            challenger: challenger.0,
            challenger_name: challenger.1,
            target: target.0,
            target_name: target.1,
            created_at: Instant::now(),
            expiry,
        }
    }

    /// The other party of the request
    pub fn counterpart(&self, participant: Uuid) -> Uuid {
        if participant == self.challenger {
            self.target
        } else {
            self.challenger
        }
    }

    /// Name of the other party of the request
    pub fn counterpart_name(&self, participant: Uuid) -> &str {
        if participant == self.challenger {
            &self.target_name
        } else {
            &self.challenger_name
        }
    }
}

/// All pending challenge requests
#[derive(Debug, Default)]
pub struct ChallengeBook {
    requests: HashMap<ChallengeId, ChallengeRequest>,
}

impl ChallengeBook {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, request: ChallengeRequest) {
        self.requests.insert(request.id, request);
    }

    pub fn get(&self, id: ChallengeId) -> Option<&ChallengeRequest> {
        self.requests.get(&id)
    }

    /// Remove a request and cancel its expiry timer
    pub fn remove(&mut self, id: ChallengeId) -> Option<ChallengeRequest> {
        let mut request = self.requests.remove(&id)?;
        if let Some(timer) = request.expiry.take() {
            timer.abort();
        }
        Some(request)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
