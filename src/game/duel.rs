//! Duel state and authoritative per-session tick loop

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::presence::PresenceRegistry;
use crate::util::ids::{ProjectileId, SessionId};
use crate::util::time::tick_duration;
use crate::ws::protocol::{Direction, EndReason, Position, Role, ServerMsg};

use super::combat::{HitResult, Projectile, ProjectileSet, StepOutcome};
use super::physics::{FIRST_START, SECOND_START, START_HEALTH};

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Combatants placed, not yet accepting moves
    Created,
    /// Moves and shots are processed
    Active,
    /// Terminal
    Ended,
}

/// One side of a duel (authoritative)
#[derive(Debug, Clone)]
pub struct Combatant {
    pub participant: Uuid,
    pub display_name: String,
    pub position: Position,
    pub direction: Direction,
    pub health: u8,
}

impl Combatant {
    pub fn new(participant: Uuid, display_name: String, position: Position) -> Self {
        Self {
            participant,
            display_name,
            position,
            direction: Direction::Up,
            health: START_HEALTH,
        }
    }
}

/// Work queued for a session task
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Move {
        participant: Uuid,
        position: Position,
        direction: Direction,
    },
    Shoot {
        participant: Uuid,
        position: Position,
        direction: Direction,
    },
    End {
        winner: Option<String>,
        reason: EndReason,
    },
}

/// Handle to a running session
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Participants indexed by role: `[first, second]`
    pub participants: [Uuid; 2],
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Queue a command; returns false once the session task is gone
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn role_of(&self, participant: Uuid) -> Option<Role> {
        if self.participants[0] == participant {
            Some(Role::First)
        } else if self.participants[1] == participant {
            Some(Role::Second)
        } else {
            None
        }
    }

    pub fn contains(&self, participant: Uuid) -> bool {
        self.role_of(participant).is_some()
    }
}

/// The authoritative state machine for one duel
pub struct DuelSession {
    id: SessionId,
    phase: SessionPhase,
    first: Combatant,
    second: Combatant,
    projectiles: ProjectileSet,
    presence: Arc<PresenceRegistry>,
}

impl DuelSession {
    /// Create a session and the handle used to feed it
    pub fn new(
        id: SessionId,
        first: (Uuid, String),
        second: (Uuid, String),
        presence: Arc<PresenceRegistry>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionCommand>) {
        let (commands, command_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            id,
            participants: [first.0, second.0],
            commands,
        };

        let session = Self {
            id,
            phase: SessionPhase::Created,
            first: Combatant::new(first.0, first.1, FIRST_START),
            second: Combatant::new(second.0, second.1, SECOND_START),
            projectiles: ProjectileSet::new(),
            presence,
        };

        (session, handle, command_rx)
    }

    #[cfg(test)]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase == SessionPhase::Ended
    }

    pub fn combatant(&self, role: Role) -> &Combatant {
        match role {
            Role::First => &self.first,
            Role::Second => &self.second,
        }
    }

    fn combatant_mut(&mut self, role: Role) -> &mut Combatant {
        match role {
            Role::First => &mut self.first,
            Role::Second => &mut self.second,
        }
    }

    pub fn role_of(&self, participant: Uuid) -> Option<Role> {
        if self.first.participant == participant {
            Some(Role::First)
        } else if self.second.participant == participant {
            Some(Role::Second)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn live_projectiles(&self) -> usize {
        self.projectiles.len()
    }

    /// Start accepting moves and shots
    pub fn activate(&mut self) {
        if self.phase == SessionPhase::Created {
            self.phase = SessionPhase::Active;
        }
    }

    fn notify(&self, role: Role, msg: ServerMsg) {
        self.presence.send(self.combatant(role).participant, msg);
    }

    fn notify_both(&self, msg: ServerMsg) {
        self.notify(Role::First, msg.clone());
        self.notify(Role::Second, msg);
    }

    /// Overwrite the caller's position and relay it to the opponent only
    pub fn move_player(&mut self, participant: Uuid, position: Position, direction: Direction) {
        if self.phase != SessionPhase::Active {
            return;
        }
        let Some(role) = self.role_of(participant) else {
            return;
        };

        let combatant = self.combatant_mut(role);
        combatant.position = position;
        combatant.direction = direction;

        trace!(session_id = %self.id, ?role, x = position.x, y = position.y, "Combatant moved");

        self.notify(
            role.opponent(),
            ServerMsg::OpponentMoved {
                position,
                direction,
            },
        );
    }

    /// Spawn a projectile for the caller and relay the shot to both sides
    pub fn shoot(
        &mut self,
        participant: Uuid,
        position: Position,
        direction: Direction,
        now: Instant,
    ) -> Option<ProjectileId> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        let role = self.role_of(participant)?;

        self.notify_both(ServerMsg::OpponentShot {
            is_first_combatant: role == Role::First,
            position,
            direction,
        });

        let id = self
            .projectiles
            .insert(Projectile::new(role, position, direction, now));

        debug!(session_id = %self.id, projectile_id = %id, ?role, "Projectile fired");
        Some(id)
    }

    /// Run one simulation tick over every live projectile
    pub fn tick(&mut self, now: Instant) {
        if self.phase != SessionPhase::Active {
            return;
        }

        for id in self.projectiles.live_ids() {
            // A knockout earlier in this tick stops the rest
            if self.is_ended() {
                break;
            }

            let Some(owner) = self.projectiles.get(id).map(|p| p.owner) else {
                continue;
            };
            let opponent_at = self.combatant(owner.opponent()).position;

            if let StepOutcome::Hit(hit) = self.projectiles.step(id, now, opponent_at) {
                self.apply_hit(hit);
            }
        }
    }

    fn apply_hit(&mut self, hit: HitResult) {
        let target = self.combatant_mut(hit.target);
        target.health = target.health.saturating_sub(1);
        let health = target.health;

        let winner = (health == 0).then(|| self.combatant(hit.shooter).display_name.clone());

        debug!(
            session_id = %self.id,
            projectile_id = %hit.projectile_id,
            target = ?hit.target,
            health,
            "Combatant hit"
        );

        self.notify_both(ServerMsg::PlayerHit {
            is_first_combatant: hit.target == Role::First,
            health,
            winner: winner.clone(),
        });

        if health == 0 {
            self.end_game(winner, EndReason::Knockout);
        }
    }

    /// Enter the terminal phase. Only the first call has any effect.
    pub fn end_game(&mut self, winner: Option<String>, reason: EndReason) -> bool {
        if self.is_ended() {
            return false;
        }

        self.phase = SessionPhase::Ended;
        self.projectiles.clear();

        info!(
            session_id = %self.id,
            winner = winner.as_deref().unwrap_or("-"),
            ?reason,
            "Duel ended"
        );

        self.notify_both(ServerMsg::SessionEnded { winner, reason });
        true
    }

    /// Apply a queued command
    pub fn apply(&mut self, command: SessionCommand, now: Instant) {
        match command {
            SessionCommand::Move {
                participant,
                position,
                direction,
            } => self.move_player(participant, position, direction),
            SessionCommand::Shoot {
                participant,
                position,
                direction,
            } => {
                self.shoot(participant, position, direction, now);
            }
            SessionCommand::End { winner, reason } => {
                self.end_game(winner, reason);
            }
        }
    }

    /// Run the authoritative loop until the session ends
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!(
            session_id = %self.id,
            first = %self.first.display_name,
            second = %self.second.display_name,
            "Duel started"
        );

        self.activate();

        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.is_ended() {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command, Instant::now()),
                    // Every handle dropped without an explicit end
                    None => {
                        self.end_game(None, EndReason::Disconnected);
                    }
                },
                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::HIT_RADIUS;
    use std::time::Duration;

    struct Fixture {
        presence: Arc<PresenceRegistry>,
        x: Uuid,
        y: Uuid,
        x_rx: mpsc::UnboundedReceiver<ServerMsg>,
        y_rx: mpsc::UnboundedReceiver<ServerMsg>,
    }

    fn fixture() -> Fixture {
        let presence = Arc::new(PresenceRegistry::new());
        let (x, x_rx) = presence.register("x").unwrap();
        let (y, y_rx) = presence.register("y").unwrap();
        Fixture {
            presence,
            x,
            y,
            x_rx,
            y_rx,
        }
    }

    fn active_session(f: &Fixture) -> DuelSession {
        let (mut session, _handle, _rx) = DuelSession::new(
            SessionId::next(),
            (f.x, "x".into()),
            (f.y, "y".into()),
            f.presence.clone(),
        );
        session.activate();
        session
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn ticks(session: &mut DuelSession, start: Instant, count: u64) {
        for n in 1..=count {
            session.tick(start + Duration::from_millis(16 * n));
        }
    }

    #[test]
    fn combatants_start_in_opposite_corners() {
        let f = fixture();
        let (session, handle, _rx) =
            DuelSession::new(SessionId::next(), (f.x, "x".into()), (f.y, "y".into()), f.presence.clone());

        assert_eq!(session.phase(), SessionPhase::Created);
        assert_eq!(session.combatant(Role::First).position, Position::new(100.0, 100.0));
        assert_eq!(session.combatant(Role::Second).position, Position::new(600.0, 400.0));
        assert_eq!(session.combatant(Role::First).health, 3);
        assert_eq!(session.combatant(Role::Second).direction, Direction::Up);
        assert_eq!(handle.role_of(f.y), Some(Role::Second));
    }

    #[test]
    fn moves_are_ignored_before_activation() {
        let mut f = fixture();
        let (mut session, _handle, _rx) =
            DuelSession::new(SessionId::next(), (f.x, "x".into()), (f.y, "y".into()), f.presence.clone());

        session.move_player(f.x, Position::new(1.0, 1.0), Direction::Left);
        assert_eq!(session.combatant(Role::First).position, FIRST_START);
        assert!(drain(&mut f.y_rx).is_empty());
    }

    #[test]
    fn move_is_relayed_only_to_the_opponent() {
        let mut f = fixture();
        let mut session = active_session(&f);

        session.move_player(f.x, Position::new(130.0, 90.0), Direction::UpRight);

        let first = session.combatant(Role::First);
        assert_eq!(first.position, Position::new(130.0, 90.0));
        assert_eq!(first.direction, Direction::UpRight);
        assert!(drain(&mut f.x_rx).is_empty());
        assert_eq!(
            drain(&mut f.y_rx),
            vec![ServerMsg::OpponentMoved {
                position: Position::new(130.0, 90.0),
                direction: Direction::UpRight,
            }]
        );
    }

    #[test]
    fn shot_is_relayed_to_both_sides() {
        let mut f = fixture();
        let mut session = active_session(&f);

        let id = session.shoot(f.y, Position::new(600.0, 400.0), Direction::Left, Instant::now());
        assert!(id.is_some());
        assert_eq!(session.live_projectiles(), 1);

        let expected = ServerMsg::OpponentShot {
            is_first_combatant: false,
            position: Position::new(600.0, 400.0),
            direction: Direction::Left,
        };
        assert_eq!(drain(&mut f.x_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut f.y_rx), vec![expected]);
    }

    #[test]
    fn diagonal_shot_hits_opponent_on_its_line() {
        let mut f = fixture();
        let mut session = active_session(&f);
        // Second combatant steps onto the 45 degree line through the muzzle
        session.move_player(f.y, Position::new(400.0, 400.0), Direction::Up);

        let start = Instant::now();
        session.shoot(f.x, Position::new(100.0, 100.0), Direction::DownRight, start);
        drain(&mut f.x_rx);
        drain(&mut f.y_rx);

        // Body center (415,415); muzzle (115,115); hit once within HIT_RADIUS
        let needed = ((300.0 - HIT_RADIUS / 2f32.sqrt()) / 5.0).ceil() as u64;
        ticks(&mut session, start, needed);

        assert_eq!(session.combatant(Role::Second).health, 2);
        assert_eq!(session.live_projectiles(), 0);
        let hit = ServerMsg::PlayerHit {
            is_first_combatant: false,
            health: 2,
            winner: None,
        };
        assert_eq!(drain(&mut f.x_rx), vec![hit.clone()]);
        assert_eq!(drain(&mut f.y_rx), vec![hit]);
        assert!(!session.is_ended());
    }

    #[test]
    fn shooter_cannot_hit_itself() {
        let f = fixture();
        let mut session = active_session(&f);
        let start = Instant::now();
        session.shoot(f.x, Position::new(100.0, 100.0), Direction::Up, start);

        ticks(&mut session, start, 40);
        assert_eq!(session.combatant(Role::First).health, 3);
        assert_eq!(session.live_projectiles(), 0);
    }

    #[test]
    fn third_hit_declares_winner_and_ends_once() {
        let mut f = fixture();
        let mut session = active_session(&f);
        // Put the target right next to the shooter's muzzle line
        session.move_player(f.y, Position::new(110.0, 100.0), Direction::Left);
        drain(&mut f.x_rx);

        let start = Instant::now();
        for shot in 0..3u64 {
            let at = start + Duration::from_millis(100 * shot);
            session.shoot(f.x, Position::new(100.0, 100.0), Direction::Right, at);
            session.tick(at + Duration::from_millis(16));
            session.tick(at + Duration::from_millis(32));
        }

        assert_eq!(session.combatant(Role::Second).health, 0);
        assert!(session.is_ended());

        for rx in [&mut f.x_rx, &mut f.y_rx] {
            let msgs = drain(rx);
            let hits: Vec<_> = msgs
                .iter()
                .filter_map(|m| match m {
                    ServerMsg::PlayerHit { health, winner, .. } => Some((*health, winner.clone())),
                    _ => None,
                })
                .collect();
            assert_eq!(
                hits,
                vec![(2, None), (1, None), (0, Some("x".to_string()))]
            );
            let ended: Vec<_> = msgs
                .iter()
                .filter(|m| matches!(m, ServerMsg::SessionEnded { .. }))
                .collect();
            assert_eq!(
                ended,
                vec![&ServerMsg::SessionEnded {
                    winner: Some("x".into()),
                    reason: EndReason::Knockout,
                }]
            );
        }
    }

    #[test]
    fn end_game_is_idempotent_and_keeps_first_winner() {
        let mut f = fixture();
        let mut session = active_session(&f);

        assert!(session.end_game(Some("x".into()), EndReason::Knockout));
        assert!(!session.end_game(Some("y".into()), EndReason::Left));
        assert!(!session.end_game(None, EndReason::Disconnected));

        let expected = vec![ServerMsg::SessionEnded {
            winner: Some("x".into()),
            reason: EndReason::Knockout,
        }];
        assert_eq!(drain(&mut f.x_rx), expected);
        assert_eq!(drain(&mut f.y_rx), expected);
    }

    #[test]
    fn ended_session_stops_simulating() {
        let mut f = fixture();
        let mut session = active_session(&f);
        session.move_player(f.y, Position::new(110.0, 100.0), Direction::Left);
        let start = Instant::now();
        session.shoot(f.x, Position::new(100.0, 100.0), Direction::Right, start);

        session.end_game(None, EndReason::Left);
        assert_eq!(session.live_projectiles(), 0);
        drain(&mut f.y_rx);

        ticks(&mut session, start, 10);
        session.move_player(f.x, Position::new(0.0, 0.0), Direction::Down);
        assert!(session.shoot(f.x, Position::new(0.0, 0.0), Direction::Down, start).is_none());

        assert_eq!(session.combatant(Role::Second).health, 3);
        assert!(drain(&mut f.y_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_processes_commands_and_stops_on_end() {
        let mut f = fixture();
        let (session, handle, rx) =
            DuelSession::new(SessionId::next(), (f.x, "x".into()), (f.y, "y".into()), f.presence.clone());
        let task = tokio::spawn(session.run(rx));

        assert!(handle.send(SessionCommand::Move {
            participant: f.x,
            position: Position::new(200.0, 200.0),
            direction: Direction::Down,
        }));
        assert!(handle.send(SessionCommand::End {
            winner: None,
            reason: EndReason::Left,
        }));
        tokio_test::assert_ok!(task.await);

        assert_eq!(
            drain(&mut f.y_rx),
            vec![
                ServerMsg::OpponentMoved {
                    position: Position::new(200.0, 200.0),
                    direction: Direction::Down,
                },
                ServerMsg::SessionEnded {
                    winner: None,
                    reason: EndReason::Left,
                },
            ]
        );
        assert_eq!(drain(&mut f.x_rx).len(), 1);
        assert!(!handle.send(SessionCommand::End {
            winner: None,
            reason: EndReason::Left,
        }));
    }
}
