//! Duel coordinator - challenges, quick matches, session registry, departures

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::physics::CHALLENGE_TTL_MILLIS;
use crate::game::{DuelSession, SessionCommand, SessionHandle};
use crate::presence::PresenceRegistry;
use crate::util::ids::{ChallengeId, SessionId};
use crate::ws::protocol::{Direction, EndReason, Position, Role, ServerMsg};

use super::challenge::{ChallengeBook, ChallengeRequest};
use super::error::DuelError;
use super::queue::{MatchmakingQueue, QueueEntry};

/// The one place a participant currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Party to a pending challenge (either side)
    Challenge(ChallengeId),
    /// Waiting in the quick-match queue
    Queued,
    /// Combatant in a running session
    Session(SessionId),
}

/// Coordinator state, always mutated under one lock
#[derive(Debug, Default)]
pub struct Lobby {
    memberships: HashMap<Uuid, Membership>,
    challenges: ChallengeBook,
    queue: MatchmakingQueue,
    sessions: HashMap<SessionId, SessionHandle>,
}

impl Lobby {
    fn ensure_free(&self, participant: Uuid) -> Result<(), DuelError> {
        match self.memberships.get(&participant) {
            None => Ok(()),
            Some(Membership::Queued) => Err(DuelError::AlreadyQueued),
            Some(_) => Err(DuelError::AlreadyInSession),
        }
    }

    fn clear_membership(&mut self, participant: Uuid, expected: Membership) {
        if self.memberships.get(&participant) == Some(&expected) {
            self.memberships.remove(&participant);
        }
    }

    /// Drop a session from the registry and free its participants.
    /// Safe to call repeatedly; a participant already in a newer
    /// session keeps that membership.
    pub fn release_session(&mut self, id: SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.remove(&id)?;
        for participant in handle.participants {
            self.clear_membership(participant, Membership::Session(id));
        }
        debug!(session_id = %handle.id, "Duel removed from registry");
        Some(handle)
    }

    /// Ask a session to end. Memberships stay until its task exits, so
    /// `sessionEnded` reaches both sides before either can be paired again.
    fn end_session(&mut self, id: SessionId, reason: EndReason) {
        let delivered = self.sessions.get(&id).is_some_and(|handle| {
            handle.send(SessionCommand::End {
                winner: None,
                reason,
            })
        });
        if !delivered {
            self.release_session(id);
        }
    }

    fn take_challenge(&mut self, id: ChallengeId) -> Option<ChallengeRequest> {
        let request = self.challenges.remove(id)?;
        self.clear_membership(request.challenger, Membership::Challenge(id));
        self.clear_membership(request.target, Membership::Challenge(id));
        Some(request)
    }

    /// The session a participant is fighting in, if it is `session_id`
    fn session_of(&self, participant: Uuid, session_id: SessionId) -> Result<&SessionHandle, DuelError> {
        match self.memberships.get(&participant) {
            Some(Membership::Session(id)) if *id == session_id => self
                .sessions
                .get(&session_id)
                .filter(|handle| handle.contains(participant))
                .ok_or(DuelError::SessionNotFound(session_id)),
            _ => Err(DuelError::SessionNotFound(session_id)),
        }
    }
}

/// Owns every registry of the duel subsystem for the life of the process
#[derive(Clone)]
pub struct DuelService {
    presence: Arc<PresenceRegistry>,
    lobby: Arc<Mutex<Lobby>>,
    challenge_ttl: Duration,
}

impl DuelService {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self {
            presence,
            lobby: Arc::new(Mutex::new(Lobby::default())),
            challenge_ttl: Duration::from_millis(CHALLENGE_TTL_MILLIS),
        }
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    fn name_of(&self, participant: Uuid) -> Result<String, DuelError> {
        self.presence
            .display_name(participant)
            .ok_or(DuelError::NotConnected)
    }

    // ------------------------------------------------------------------
    // Challenges
    // ------------------------------------------------------------------

    /// Invite `target_name` to a duel
    pub fn send_challenge(&self, challenger: Uuid, target_name: &str) -> Result<ChallengeId, DuelError> {
        let mut lobby = self.lobby.lock();

        let challenger_name = self.name_of(challenger)?;
        let target = self
            .presence
            .find_by_name(target_name)
            .ok_or_else(|| DuelError::TargetNotFound(target_name.to_string()))?;
        if target == challenger {
            return Err(DuelError::CannotChallengeSelf);
        }

        // Any membership on either side blocks a new challenge
        lobby
            .ensure_free(challenger)
            .and_then(|_| lobby.ensure_free(target))
            .map_err(|_| DuelError::AlreadyInSession)?;

        let id = ChallengeId::next();
        let service = self.clone();
        let ttl = self.challenge_ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            service.expire_challenge(id);
        });

        lobby.challenges.insert(ChallengeRequest::new(
            id,
            (challenger, challenger_name.clone()),
            (target, target_name.to_string()),
            Some(timer.abort_handle()),
        ));
        lobby.memberships.insert(challenger, Membership::Challenge(id));
        lobby.memberships.insert(target, Membership::Challenge(id));

        self.presence
            .send(target, ServerMsg::ChallengeReceived { challenger_name: challenger_name.clone() });

        info!(
            challenge_id = %id,
            challenger = %challenger_name,
            target = %target_name,
            "Challenge sent"
        );
        Ok(id)
    }

    fn expire_challenge(&self, id: ChallengeId) {
        let mut lobby = self.lobby.lock();
        if let Some(request) = lobby.take_challenge(id) {
            info!(challenge_id = %id, challenger = %request.challenger_name, "Challenge expired");
            self.presence.send(
                request.challenger,
                ServerMsg::ChallengeExpired {
                    opponent_name: request.target_name,
                },
            );
        }
    }

    /// Locate the pending request addressed to `responder`
    fn addressed_to(lobby: &Lobby, responder: Uuid) -> Result<ChallengeId, DuelError> {
        match lobby.memberships.get(&responder) {
            Some(Membership::Challenge(id))
                if lobby.challenges.get(*id).is_some_and(|r| r.target == responder) =>
            {
                Ok(*id)
            }
            _ => Err(DuelError::RequestNotFound),
        }
    }

    /// Accept the challenge addressed to `responder` and start the duel
    pub fn accept_challenge(&self, responder: Uuid) -> Result<SessionId, DuelError> {
        let mut lobby = self.lobby.lock();

        let id = Self::addressed_to(&lobby, responder)?;
        let request = lobby.take_challenge(id).ok_or(DuelError::RequestNotFound)?;

        if !self.presence.is_connected(request.challenger) || !self.presence.is_connected(responder) {
            return Err(DuelError::OpponentDisconnected);
        }

        debug!(
            challenge_id = %id,
            answered_ms = request.created_at.elapsed().as_millis() as u64,
            "Challenge accepted"
        );

        let session_id = self.start_session(
            &mut lobby,
            (request.challenger, request.challenger_name.clone()),
            (request.target, request.target_name.clone()),
        );

        self.presence.send(
            request.challenger,
            ServerMsg::SessionCreated {
                session_id,
                role: Role::First,
                opponent_name: request.target_name,
            },
        );
        self.presence.send(
            responder,
            ServerMsg::ChallengeAccepted {
                session_id,
                role: Role::Second,
                opponent_name: request.challenger_name,
            },
        );

        Ok(session_id)
    }

    /// Decline the challenge addressed to `responder`
    pub fn decline_challenge(&self, responder: Uuid) -> Result<(), DuelError> {
        let mut lobby = self.lobby.lock();

        let id = Self::addressed_to(&lobby, responder)?;
        let request = lobby.take_challenge(id).ok_or(DuelError::RequestNotFound)?;

        info!(challenge_id = %id, target = %request.target_name, "Challenge declined");
        self.presence.send(
            request.challenger,
            ServerMsg::ChallengeDeclined {
                opponent_name: request.target_name,
            },
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Quick match
    // ------------------------------------------------------------------

    /// Pair with the longest-waiting participant, or wait in the queue.
    /// Returns the new session id when a pairing happened.
    pub fn request_match(&self, participant: Uuid) -> Result<Option<SessionId>, DuelError> {
        let mut lobby = self.lobby.lock();

        lobby.ensure_free(participant)?;
        let name = self.name_of(participant)?;

        let Some(entry) = lobby.queue.pop_oldest() else {
            lobby.queue.enqueue(QueueEntry::new(participant));
            lobby.memberships.insert(participant, Membership::Queued);
            self.presence.send(participant, ServerMsg::MatchQueued);
            info!(participant = %name, queue_size = lobby.queue.len(), "Participant queued for quick match");
            return Ok(None);
        };

        lobby.clear_membership(entry.participant, Membership::Queued);

        let Some(opponent_name) = self.presence.display_name(entry.participant) else {
            warn!(participant = %entry.participant, "Dropping queue entry of departed participant");
            return Err(DuelError::OpponentDisconnected);
        };

        debug!(waited_ms = entry.wait_time().as_millis() as u64, "Quick match paired");

        let session_id = self.start_session(
            &mut lobby,
            (entry.participant, opponent_name.clone()),
            (participant, name.clone()),
        );

        self.presence.send(
            entry.participant,
            ServerMsg::SessionCreated {
                session_id,
                role: Role::First,
                opponent_name: name,
            },
        );
        self.presence.send(
            participant,
            ServerMsg::SessionCreated {
                session_id,
                role: Role::Second,
                opponent_name,
            },
        );

        Ok(Some(session_id))
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Register a session and spawn its task
    fn start_session(&self, lobby: &mut Lobby, first: (Uuid, String), second: (Uuid, String)) -> SessionId {
        let id = SessionId::next();
        let (session, handle, commands) =
            DuelSession::new(id, first.clone(), second.clone(), self.presence.clone());

        lobby.memberships.insert(first.0, Membership::Session(id));
        lobby.memberships.insert(second.0, Membership::Session(id));
        lobby.sessions.insert(id, handle);

        info!(
            session_id = %id,
            first = %first.1,
            second = %second.1,
            active_sessions = lobby.sessions.len(),
            "Created new duel"
        );

        let registry = self.lobby.clone();
        tokio::spawn(async move {
            session.run(commands).await;

            // Cleanup after the duel ends
            registry.lock().release_session(id);
        });

        id
    }

    /// Leave a running session; ends it for both sides
    pub fn leave_session(&self, participant: Uuid, session_id: SessionId) -> Result<(), DuelError> {
        let mut lobby = self.lobby.lock();
        lobby.session_of(participant, session_id)?;
        lobby.end_session(session_id, EndReason::Left);
        Ok(())
    }

    fn dispatch(&self, participant: Uuid, session_id: SessionId, command: SessionCommand) -> Result<(), DuelError> {
        let lobby = self.lobby.lock();
        let handle = lobby.session_of(participant, session_id)?;
        if handle.send(command) {
            Ok(())
        } else {
            Err(DuelError::SessionNotFound(session_id))
        }
    }

    /// Relay a client-reported move into its session
    pub fn move_player(
        &self,
        participant: Uuid,
        session_id: SessionId,
        position: Position,
        direction: Direction,
    ) -> Result<(), DuelError> {
        self.dispatch(
            participant,
            session_id,
            SessionCommand::Move {
                participant,
                position,
                direction,
            },
        )
    }

    /// Fire a projectile in a session
    pub fn shoot(
        &self,
        participant: Uuid,
        session_id: SessionId,
        position: Position,
        direction: Direction,
    ) -> Result<(), DuelError> {
        self.dispatch(
            participant,
            session_id,
            SessionCommand::Shoot {
                participant,
                position,
                direction,
            },
        )
    }

    // ------------------------------------------------------------------
    // Departure
    // ------------------------------------------------------------------

    /// Remove every trace of a participant: pending challenge, queue entry,
    /// active session and presence, all under one lock.
    pub fn depart(&self, participant: Uuid) {
        let mut lobby = self.lobby.lock();

        match lobby.memberships.get(&participant).copied() {
            Some(Membership::Challenge(id)) => {
                if let Some(request) = lobby.take_challenge(id) {
                    let other = request.counterpart(participant);
                    let name = request.counterpart_name(other).to_string();
                    self.presence.send(
                        other,
                        ServerMsg::ChallengeCancelled {
                            opponent_name: name,
                            reason: "disconnected".to_string(),
                        },
                    );
                }
            }
            Some(Membership::Queued) => {
                lobby.queue.remove(participant);
                lobby.clear_membership(participant, Membership::Queued);
            }
            Some(Membership::Session(id)) => {
                lobby.clear_membership(participant, Membership::Session(id));
                lobby.end_session(id, EndReason::Disconnected);
            }
            None => {}
        }

        self.presence.unregister(participant);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    #[cfg(test)]
    pub fn membership(&self, participant: Uuid) -> Option<Membership> {
        self.lobby.lock().memberships.get(&participant).copied()
    }

    pub fn active_sessions(&self) -> usize {
        self.lobby.lock().sessions.len()
    }

    pub fn queue_size(&self) -> usize {
        self.lobby.lock().queue.len()
    }

    pub fn pending_challenges(&self) -> usize {
        self.lobby.lock().challenges.len()
    }
}
