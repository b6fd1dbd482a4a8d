//! Combat system - projectiles, their lifetime, hit detection

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::util::ids::ProjectileId;
use crate::ws::protocol::{Direction, Position, Role};

use super::physics::{PhysicsSystem, CENTER_OFFSET, PROJECTILE_LIFETIME_MILLIS, PROJECTILE_SPEED};

/// Active projectile in a duel
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    /// Side that fired it; it can only ever hit the other side
    pub owner: Role,
    pub position: Position,
    pub direction: Direction,
    pub speed: f32,
    pub spawned_at: Instant,
}

impl Projectile {
    /// Spawn a projectile at the muzzle of a combatant standing at `origin`
    pub fn new(owner: Role, origin: Position, direction: Direction, now: Instant) -> Self {
        Self {
            id: ProjectileId::next(),
            owner,
            position: origin.offset(CENTER_OFFSET.x, CENTER_OFFSET.y),
            direction,
            speed: PROJECTILE_SPEED,
            spawned_at: now,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.spawned_at)
            > Duration::from_millis(PROJECTILE_LIFETIME_MILLIS)
    }
}

/// What happened to a projectile during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Still flying
    Flying,
    /// Lifetime ran out; removed
    Expired,
    /// Left the arena; removed
    OutOfBounds,
    /// Reached the opponent; removed
    Hit(HitResult),
}

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: ProjectileId,
    pub shooter: Role,
    pub target: Role,
    pub position: Position,
}

/// Arena of live projectiles for one session.
/// Slots are reused through a free list; the index keeps spawn order.
#[derive(Debug, Default)]
pub struct ProjectileSet {
    slots: Vec<Option<Projectile>>,
    free: Vec<usize>,
    index: BTreeMap<ProjectileId, usize>,
}

impl ProjectileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, projectile: Projectile) -> ProjectileId {
        let id = projectile.id;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(projectile);
                slot
            }
            None => {
                self.slots.push(Some(projectile));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
        id
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.index
            .get(&id)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    /// Remove a projectile; returns `None` if it was already gone
    pub fn remove(&mut self, id: ProjectileId) -> Option<Projectile> {
        let slot = self.index.remove(&id)?;
        self.free.push(slot);
        self.slots[slot].take()
    }

    /// Live projectile ids in spawn order
    pub fn live_ids(&self) -> Vec<ProjectileId> {
        self.index.keys().copied().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
    }

    /// Advance one projectile by a tick and resolve it against the
    /// position of the shooter's opponent.
    pub fn step(&mut self, id: ProjectileId, now: Instant, opponent_at: Position) -> StepOutcome {
        let Some(&slot) = self.index.get(&id) else {
            return StepOutcome::Expired;
        };
        let Some(projectile) = self.slots[slot].as_mut() else {
            return StepOutcome::Expired;
        };

        if projectile.is_expired(now) {
            self.remove(id);
            return StepOutcome::Expired;
        }

        projectile.position =
            PhysicsSystem::advance(projectile.position, projectile.direction, projectile.speed);

        if !PhysicsSystem::in_bounds(projectile.position) {
            self.remove(id);
            return StepOutcome::OutOfBounds;
        }

        if PhysicsSystem::is_hit(projectile.position, opponent_at) {
            let hit = HitResult {
                projectile_id: id,
                shooter: projectile.owner,
                target: projectile.owner.opponent(),
                position: projectile.position,
            };
            self.remove(id);
            return StepOutcome::Hit(hit);
        }

        StepOutcome::Flying
    }
}
