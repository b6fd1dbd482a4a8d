//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::ids::SessionId;

/// Arena coordinates, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Translate by a fixed offset
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Facing direction of a combatant or projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    /// Unit steps along (x, y); screen coordinates, so "up" is negative y.
    /// Diagonals are the union of one horizontal and one vertical component.
    pub fn axis_steps(self) -> (f32, f32) {
        match self {
            Self::Up => (0.0, -1.0),
            Self::Down => (0.0, 1.0),
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
            Self::UpLeft => (-1.0, -1.0),
            Self::UpRight => (1.0, -1.0),
            Self::DownLeft => (-1.0, 1.0),
            Self::DownRight => (1.0, 1.0),
        }
    }
}

/// Which side of a duel a participant plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Challenger, or the longest-waiting queue entry
    First,
    Second,
}

impl Role {
    pub fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A combatant's health reached zero
    Knockout,
    /// A participant left the session
    Left,
    /// A participant's connection went away
    Disconnected,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Invite a participant, by display name, to a duel
    SendChallenge { target_name: String },

    /// Accept the challenge addressed to the sender
    AcceptChallenge,

    /// Decline the challenge addressed to the sender
    DeclineChallenge,

    /// Quick match against the next waiting participant
    RequestMatch,

    /// Leave a running session
    LeaveSession { session_id: SessionId },

    /// Client-reported position and facing
    Move {
        session_id: SessionId,
        position: Position,
        direction: Direction,
    },

    /// Fire from the given position
    Shoot {
        session_id: SessionId,
        position: Position,
        direction: Direction,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Explicitly leave the lobby (same effect as closing the socket)
    Departed,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        connection_id: Uuid,
        display_name: String,
        server_time: u64,
    },

    /// Someone challenged the recipient
    ChallengeReceived { challenger_name: String },

    /// The recipient accepted a challenge and a session started
    ChallengeAccepted {
        session_id: SessionId,
        role: Role,
        opponent_name: String,
    },

    /// The target declined the recipient's challenge
    ChallengeDeclined { opponent_name: String },

    /// The recipient's challenge went unanswered
    ChallengeExpired { opponent_name: String },

    /// A pending challenge was torn down because the other party left
    ChallengeCancelled { opponent_name: String, reason: String },

    /// The recipient is waiting in the quick-match queue
    MatchQueued,

    /// A session was created with the recipient as a combatant
    SessionCreated {
        session_id: SessionId,
        role: Role,
        opponent_name: String,
    },

    /// Relayed movement of the opponent
    OpponentMoved {
        position: Position,
        direction: Direction,
    },

    /// Relayed shot, sent to both combatants
    OpponentShot {
        is_first_combatant: bool,
        position: Position,
        direction: Direction,
    },

    /// A combatant took a hit
    PlayerHit {
        is_first_combatant: bool,
        health: u8,
        winner: Option<String>,
    },

    /// The session is over
    SessionEnded {
        winner: Option<String>,
        reason: EndReason,
    },

    /// A request from the recipient failed
    SessionError { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}
