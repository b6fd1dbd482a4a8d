//! Arena geometry and projectile kinematics

use serde::Serialize;

use crate::util::time::TICK_MILLIS;
use crate::ws::protocol::{Direction, Position};

/// Arena width in units
pub const ARENA_WIDTH: f32 = 760.0;
/// Arena height in units
pub const ARENA_HEIGHT: f32 = 520.0;
/// Distance a projectile covers per tick along each active axis
pub const PROJECTILE_SPEED: f32 = 5.0;
/// Projectile lifetime in milliseconds
pub const PROJECTILE_LIFETIME_MILLIS: u64 = 3000;
/// Distance below which a projectile scores a hit
pub const HIT_RADIUS: f32 = 25.0;
/// Offset from a combatant's reported position to its center (and muzzle)
pub const CENTER_OFFSET: Position = Position::new(15.0, 15.0);
/// Spawn position of the first combatant
pub const FIRST_START: Position = Position::new(100.0, 100.0);
/// Spawn position of the second combatant
pub const SECOND_START: Position = Position::new(600.0, 400.0);
/// Health every combatant starts with
pub const START_HEALTH: u8 = 3;
/// How long a challenge stays open, in milliseconds
pub const CHALLENGE_TTL_MILLIS: u64 = 30_000;

/// Arena constants as shared with presentation clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaConstants {
    pub width: f32,
    pub height: f32,
    pub projectile_speed: f32,
    pub tick_millis: u64,
    pub projectile_lifetime_millis: u64,
    pub hit_radius: f32,
    pub muzzle_offset: Position,
    pub first_start: Position,
    pub second_start: Position,
    pub start_health: u8,
    pub challenge_ttl_millis: u64,
}

impl ArenaConstants {
    pub fn current() -> Self {
        Self {
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
            projectile_speed: PROJECTILE_SPEED,
            tick_millis: TICK_MILLIS,
            projectile_lifetime_millis: PROJECTILE_LIFETIME_MILLIS,
            hit_radius: HIT_RADIUS,
            muzzle_offset: CENTER_OFFSET,
            first_start: FIRST_START,
            second_start: SECOND_START,
            start_health: START_HEALTH,
            challenge_ttl_millis: CHALLENGE_TTL_MILLIS,
        }
    }
}

/// Physics helpers for the duel arena
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a point one tick along `direction`.
    /// Each active axis moves by the full `speed`.
    pub fn advance(position: Position, direction: Direction, speed: f32) -> Position {
        let (sx, sy) = direction.axis_steps();
        position.offset(sx * speed, sy * speed)
    }

    /// Whether a point lies inside the arena (edges inclusive)
    pub fn in_bounds(position: Position) -> bool {
        (0.0..=ARENA_WIDTH).contains(&position.x) && (0.0..=ARENA_HEIGHT).contains(&position.y)
    }

    /// Center of a combatant whose top-left corner is `position`
    pub fn body_center(position: Position) -> Position {
        position.offset(CENTER_OFFSET.x, CENTER_OFFSET.y)
    }

    /// Whether a projectile at `projectile` hits a combatant at `target`
    pub fn is_hit(projectile: Position, target: Position) -> bool {
        projectile.distance(Self::body_center(target)) < HIT_RADIUS
    }
}
