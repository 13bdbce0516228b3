//! Match Engine
//!
//! The authoritative state machine for one duel. It owns both players,
//! the reveal buffer, the turn counter and the turn timer, and resolves
//! each turn as one atomic step.
//!
//! ```text
//! WaitingForPlayers --2nd join--> AwaitingReveals --both revealed / timeout--> Resolving
//!                                        ^                                          |
//!                                        +------------ turn <= total ---------------+
//!                                                                                   |
//!                                                      Ended <--- turn > total -----+
//! ```
//!
//! The engine never talks to the network. Everything it announces goes on
//! an outbox that the transport drains after each call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::DeterministicRng;
use crate::game::ability::apply_ability;
use crate::game::card::{Card, CardId};
use crate::game::catalog::CardCatalog;
use crate::game::events::{AbilityEvent, MatchEvent, MatchResult, TurnResult};
use crate::game::state::{MatchPhase, MatchSnapshot, PlayerId, PlayerState};
use crate::game::timer::TurnTimer;

/// Players per match.
pub const PLAYERS_PER_MATCH: usize = 2;

/// Match rules.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Turns before the match ends
    pub total_turns: u32,
    /// Cards dealt to each player at match start
    pub starting_hand_size: usize,
    /// Ceiling for the per-turn cost limit
    pub max_cost_cap: u32,
    /// Time allowed for reveals each turn
    pub turn_duration: Duration,
    /// Cadence of the remaining-time broadcast
    pub timer_broadcast_interval: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            total_turns: 6,
            starting_hand_size: 3,
            max_cost_cap: 6,
            turn_duration: Duration::from_secs(30),
            timer_broadcast_interval: Duration::from_secs(1),
        }
    }
}

/// Cost limit for a turn: `clamp(turn, 1, cap)`.
#[inline]
pub fn max_cost_for_turn(turn: u32, cap: u32) -> u32 {
    turn.clamp(1, cap.max(1))
}

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Player never joined this match.
    #[error("Player {0} is not registered")]
    NotRegistered(PlayerId),

    /// Operation not valid in the current phase.
    #[error("Expected phase {expected}, match is {actual}")]
    WrongPhase {
        /// Phase the operation needs
        expected: MatchPhase,
        /// Phase the match is in
        actual: MatchPhase,
    },

    /// Both seats are taken.
    #[error("Match is full, cannot seat {0}")]
    MatchFull(PlayerId),

    /// Player id is empty.
    #[error("Player id must not be empty")]
    InvalidPlayerId,

    /// Catalog has nothing to draw.
    #[error("Card catalog is empty")]
    EmptyCatalog,
}

/// The match state machine.
pub struct MatchEngine {
    /// Shared card definitions
    catalog: Arc<CardCatalog>,
    /// Rules
    config: MatchConfig,
    /// Engine seed; mixed with player ids at match start
    seed: u64,
    /// Source of every draw and random discard
    rng: DeterministicRng,
    /// Lifecycle phase
    phase: MatchPhase,
    /// Current turn (1-based)
    current_turn: u32,
    /// Players in seat (join) order
    players: Vec<PlayerState>,
    /// This turn's reveals
    pending_reveals: BTreeMap<PlayerId, Vec<CardId>>,
    /// Per-turn countdown
    timer: TurnTimer,
    /// Events not yet handed to the transport
    outbox: Vec<MatchEvent>,
}

impl MatchEngine {
    /// Create an engine waiting for players.
    pub fn new(
        catalog: Arc<CardCatalog>,
        config: MatchConfig,
        seed: u64,
    ) -> Result<Self, EngineError> {
        if catalog.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }

        let timer = TurnTimer::new(config.turn_duration, config.timer_broadcast_interval);

        Ok(Self {
            catalog,
            config,
            seed,
            rng: DeterministicRng::new(seed),
            phase: MatchPhase::WaitingForPlayers,
            current_turn: 1,
            players: Vec::with_capacity(PLAYERS_PER_MATCH),
            pending_reveals: BTreeMap::new(),
            timer,
            outbox: Vec::new(),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Current turn (1-based).
    pub fn current_turn(&self) -> u32 {
        self.current_turn
    }

    /// Turns in the match.
    pub fn total_turns(&self) -> u32 {
        self.config.total_turns
    }

    /// Cost limit for the current turn.
    pub fn max_cost_for_turn(&self) -> u32 {
        max_cost_for_turn(self.current_turn, self.config.max_cost_cap)
    }

    /// Registered player ids in seat order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    /// Check if a player is registered.
    pub fn is_registered(&self, player_id: &PlayerId) -> bool {
        self.players.iter().any(|p| &p.id == player_id)
    }

    /// Look up a player.
    pub fn player(&self, player_id: &PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| &p.id == player_id)
    }

    /// Reveal recorded for a player this turn.
    pub fn pending_reveal(&self, player_id: &PlayerId) -> Option<&[CardId]> {
        self.pending_reveals.get(player_id).map(|v| v.as_slice())
    }

    /// Time left in the current turn.
    pub fn time_left(&self) -> Duration {
        self.timer.remaining()
    }

    /// Point-in-time view of the match.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            turn: self.current_turn,
            total_turns: self.config.total_turns,
            players: self.players.iter().map(|p| p.snapshot()).collect(),
        }
    }

    /// Hash of turn, RNG, phase and every player.
    pub fn state_hash(&self) -> StateHash {
        compute_state_hash(self.current_turn, self.rng.state(), |hasher| {
            hasher.update_str(&self.phase.to_string());
            for player in &self.players {
                player.hash_into(hasher);
            }
        })
    }

    /// Take every queued event, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.outbox)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Register a player.
    ///
    /// Joining twice is a no-op (`Ok(false)`). The second registration
    /// starts the match.
    pub fn join(&mut self, player_id: PlayerId) -> Result<bool, EngineError> {
        if player_id.is_empty() {
            return Err(EngineError::InvalidPlayerId);
        }
        if self.is_registered(&player_id) {
            debug!(player = %player_id, "Join ignored, already registered");
            return Ok(false);
        }
        if self.phase != MatchPhase::WaitingForPlayers || self.players.len() >= PLAYERS_PER_MATCH {
            return Err(EngineError::MatchFull(player_id));
        }

        self.players.push(PlayerState::new(player_id.clone()));
        info!(player = %player_id, players = self.players.len(), "Player joined");

        if self.players.len() == PLAYERS_PER_MATCH {
            self.start_match();
        }

        Ok(true)
    }

    /// Record a player's reveal for this turn.
    ///
    /// Over-cost reveals are logged and accepted. A second reveal from the
    /// same player replaces the first. Returns whether the turn resolved.
    #[instrument(skip(self, card_ids))]
    pub fn submit_reveal(
        &mut self,
        player_id: &PlayerId,
        card_ids: Vec<CardId>,
    ) -> Result<bool, EngineError> {
        if !self.is_registered(player_id) {
            return Err(EngineError::NotRegistered(player_id.clone()));
        }
        self.expect_phase(MatchPhase::AwaitingReveals)?;

        let cost = self.catalog.cost_of(&card_ids);
        let max_cost = self.max_cost_for_turn();
        if cost > max_cost {
            warn!(
                player = %player_id,
                cost,
                max_cost,
                "Reveal exceeds cost limit, accepting anyway"
            );
        }

        debug!(player = %player_id, cards = ?card_ids, "Reveal recorded");
        self.pending_reveals.insert(player_id.clone(), card_ids);

        if self.pending_reveals.len() == self.players.len() {
            self.resolve_turn();
            return Ok(true);
        }

        Ok(false)
    }

    /// Resolve the current turn with empty reveals for anyone missing.
    pub fn force_resolve_on_timeout(&mut self) -> Result<(), EngineError> {
        self.expect_phase(MatchPhase::AwaitingReveals)?;

        for player in &self.players {
            if !self.pending_reveals.contains_key(&player.id) {
                info!(
                    player = %player.id,
                    turn = self.current_turn,
                    "No reveal before timeout, passing"
                );
                self.pending_reveals.insert(player.id.clone(), Vec::new());
            }
        }

        self.resolve_turn();
        Ok(())
    }

    /// Snapshot for a reconnecting player. Never mutates the match.
    pub fn request_full_state(&self, player_id: &PlayerId) -> Result<MatchSnapshot, EngineError> {
        if !self.is_registered(player_id) {
            return Err(EngineError::NotRegistered(player_id.clone()));
        }
        Ok(self.snapshot())
    }

    /// Advance the turn timer.
    ///
    /// Queues the cosmetic countdown broadcast when due and forces
    /// resolution once when time runs out.
    pub fn tick(&mut self, elapsed: Duration) {
        if self.phase != MatchPhase::AwaitingReveals {
            return;
        }

        let tick = self.timer.advance(elapsed);
        if let Some(time_left) = tick.broadcast {
            self.outbox.push(MatchEvent::Timer { time_left });
        }

        if tick.expired {
            info!(turn = self.current_turn, "Turn timer expired");
            self.outbox.push(MatchEvent::TimerExpired);
            if let Err(e) = self.force_resolve_on_timeout() {
                warn!("Forced resolution skipped: {}", e);
            }
        }
    }

    /// Start a new match with the same two players after the last one ended.
    pub fn rematch(&mut self) -> Result<(), EngineError> {
        self.expect_phase(MatchPhase::Ended)?;
        self.start_match();
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn expect_phase(&self, expected: MatchPhase) -> Result<(), EngineError> {
        if self.phase != expected {
            return Err(EngineError::WrongPhase { expected, actual: self.phase });
        }
        Ok(())
    }

    /// Reset both players, deal, open turn 1.
    fn start_match(&mut self) {
        let ids = self.player_ids();
        self.rng = DeterministicRng::from_match_params(self.seed, &ids);
        self.current_turn = 1;
        self.pending_reveals.clear();

        let catalog = &self.catalog;
        let rng = &mut self.rng;
        for player in self.players.iter_mut() {
            player.reset();
            for _ in 0..self.config.starting_hand_size {
                player.draw_card(catalog.draw(rng));
            }
        }

        info!(
            players = ?ids,
            total_turns = self.config.total_turns,
            "Match started"
        );

        self.outbox.push(MatchEvent::MatchStarted);
        self.begin_turn();
    }

    /// Open the current turn for reveals.
    fn begin_turn(&mut self) {
        self.phase = MatchPhase::AwaitingReveals;
        self.timer.restart();
        self.outbox.push(MatchEvent::Timer { time_left: self.timer.remaining_secs() });
        self.outbox.push(MatchEvent::TurnStarted(self.snapshot()));
    }

    fn end_match(&mut self) {
        self.phase = MatchPhase::Ended;
        self.timer.stop();

        let result = MatchResult {
            turn: self.current_turn,
            scores: self.scores(),
            snapshot: self.snapshot(),
        };

        info!(
            winner = ?result.winner(),
            scores = ?result.scores,
            state_hash = %hex::encode(self.state_hash()),
            "Match ended"
        );

        self.outbox.push(MatchEvent::MatchEnded(result));
    }

    fn scores(&self) -> BTreeMap<PlayerId, i32> {
        self.players.iter().map(|p| (p.id.clone(), p.score)).collect()
    }

    fn boards(&self) -> BTreeMap<PlayerId, Vec<CardId>> {
        self.players.iter().map(|p| (p.id.clone(), p.board_ids())).collect()
    }

    // =========================================================================
    // Turn resolution
    // =========================================================================

    /// Resolve the current turn. Runs to completion in one call.
    fn resolve_turn(&mut self) {
        self.phase = MatchPhase::Resolving;
        self.timer.stop();

        let reveals = std::mem::take(&mut self.pending_reveals);
        let catalog = &self.catalog;

        // 1. Played lists from reveals; unknown ids skipped
        for player in self.players.iter_mut() {
            player.played_this_turn.clear();
            if let Some(ids) = reveals.get(&player.id) {
                player
                    .played_this_turn
                    .extend(ids.iter().filter_map(|id| catalog.get(*id)).cloned());
            }
        }

        // 2. Hand to board; cards missing from hand still reach the board
        for player in self.players.iter_mut() {
            let Some(ids) = reveals.get(&player.id) else { continue };
            for &id in ids {
                let card = match player.take_from_hand(id) {
                    Some(card) => card,
                    None => match catalog.get(id) {
                        Some(card) => {
                            debug!(player = %player.id, card = id, "Revealed card not in hand");
                            card.clone()
                        }
                        None => continue,
                    },
                };
                player.add_to_board(card);
            }
        }

        // 3-4. Destructive abilities first, then everything else
        let mut ability_events = Vec::new();
        self.run_ability_pass(true, &mut ability_events);
        self.run_ability_pass(false, &mut ability_events);

        // 5. Surviving cards score their power
        for player in self.players.iter_mut() {
            player.score = player.score.saturating_add(player.power_in_play());
        }

        // 6-7. Extra draws, then the unconditional draw
        let catalog = &self.catalog;
        let rng = &mut self.rng;
        for player in self.players.iter_mut() {
            for _ in 0..player.pending_extra_draws {
                player.draw_card(catalog.draw(rng));
            }
            player.pending_extra_draws = 0;
        }
        for player in self.players.iter_mut() {
            player.draw_card(catalog.draw(rng));
        }

        // 8. Announce
        let next_turn = self.current_turn + 1;
        let result = TurnResult {
            turn: next_turn,
            scores: self.scores(),
            boards: self.boards(),
            ability_events,
        };
        info!(
            turn = self.current_turn,
            scores = ?result.scores,
            abilities = result.ability_events.len(),
            "Turn resolved"
        );
        self.outbox.push(MatchEvent::TurnResolved(result));

        // 9. Transient state
        for player in self.players.iter_mut() {
            player.clear_transient();
        }

        self.current_turn = next_turn;
        if self.current_turn > self.config.total_turns {
            self.end_match();
        } else {
            self.begin_turn();
        }
    }

    /// Fire every destructive (or every non-destructive) ability in play.
    ///
    /// Players go in seat order, cards in reveal order. A card removed by an
    /// earlier effect no longer fires.
    fn run_ability_pass(&mut self, destructive: bool, events: &mut Vec<AbilityEvent>) {
        for seat in 0..self.players.len() {
            let cards: Vec<Card> = self.players[seat]
                .played_this_turn
                .iter()
                .filter(|c| c.ability.is_destructive() == destructive)
                .cloned()
                .collect();

            for card in cards {
                let Some((me, opponent)) = seat_pair(&mut self.players, seat) else { return };
                if !me.has_in_play(card.id) {
                    debug!(
                        player = %me.id,
                        card = card.id,
                        "Card left play before its ability fired"
                    );
                    continue;
                }
                if apply_ability(&card, me, opponent, &mut self.rng) {
                    events.push(AbilityEvent::fired(&me.id, &card));
                }
            }
        }
    }
}

/// Borrow the player in `seat` and their opponent.
fn seat_pair(
    players: &mut [PlayerState],
    seat: usize,
) -> Option<(&mut PlayerState, &mut PlayerState)> {
    if players.len() != PLAYERS_PER_MATCH {
        return None;
    }
    let (first, second) = players.split_at_mut(1);
    match seat {
        0 => Some((&mut first[0], &mut second[0])),
        1 => Some((&mut second[0], &mut first[0])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::AbilityKind;
    use proptest::prelude::*;

    const GAIN3: CardId = 1;
    const GAIN2: CardId = 2;
    const GAIN5: CardId = 3;
    const DESTROY1: CardId = 4;
    const SCHOLAR: CardId = 5;
    const BRUTE: CardId = 6;

    fn full_catalog() -> Vec<Card> {
        vec![
            Card::new(GAIN3, "Gain3", 1, 0, AbilityKind::GainPoints, 3),
            Card::new(GAIN2, "Gain2", 1, 0, AbilityKind::GainPoints, 2),
            Card::new(GAIN5, "Gain5", 1, 0, AbilityKind::GainPoints, 5),
            Card::new(DESTROY1, "Destroy1", 1, 0, AbilityKind::DestroyOpponentCardInPlay, 1),
            Card::new(SCHOLAR, "Scholar", 1, 0, AbilityKind::DrawExtraCard, 2),
            Card::new(BRUTE, "Brute", 5, 4, AbilityKind::None, 0),
        ]
    }

    fn engine_with(cards: Vec<Card>) -> MatchEngine {
        let catalog = Arc::new(CardCatalog::new(cards).unwrap());
        MatchEngine::new(catalog, MatchConfig::default(), 42).unwrap()
    }

    fn p1() -> PlayerId {
        PlayerId::from("p1")
    }

    fn p2() -> PlayerId {
        PlayerId::from("p2")
    }

    fn started(cards: Vec<Card>) -> MatchEngine {
        let mut engine = engine_with(cards);
        engine.join(p1()).unwrap();
        engine.join(p2()).unwrap();
        engine.drain_outbox();
        engine
    }

    fn last_turn_result(events: &[MatchEvent]) -> TurnResult {
        events
            .iter()
            .rev()
            .find_map(|e| match e {
                MatchEvent::TurnResolved(r) => Some(r.clone()),
                _ => None,
            })
            .expect("no turn result")
    }

    fn score(engine: &MatchEngine, id: &PlayerId) -> i32 {
        engine.player(id).unwrap().score
    }

    #[test]
    fn test_join_is_idempotent_and_starts_at_two() {
        let mut engine = engine_with(full_catalog());

        assert_eq!(engine.join(p1()), Ok(true));
        assert_eq!(engine.join(p1()), Ok(false));
        assert_eq!(engine.phase(), MatchPhase::WaitingForPlayers);
        assert!(engine.drain_outbox().is_empty());

        assert_eq!(engine.join(p2()), Ok(true));
        assert_eq!(engine.phase(), MatchPhase::AwaitingReveals);
        assert_eq!(engine.current_turn(), 1);
        assert_eq!(engine.max_cost_for_turn(), 1);

        for id in [p1(), p2()] {
            assert_eq!(engine.player(&id).unwrap().hand.len(), 3);
        }

        let events = engine.drain_outbox();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], MatchEvent::MatchStarted);
        assert!(matches!(events[1], MatchEvent::Timer { time_left } if time_left == 30.0));
        match &events[2] {
            MatchEvent::TurnStarted(snapshot) => {
                assert_eq!(snapshot.turn, 1);
                assert_eq!(snapshot.total_turns, 6);
                assert_eq!(snapshot.players.len(), 2);
                assert_eq!(snapshot.players[0].player_id, p1());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_third_player_rejected() {
        let mut engine = started(full_catalog());
        assert_eq!(
            engine.join(PlayerId::from("p3")),
            Err(EngineError::MatchFull(PlayerId::from("p3")))
        );
        // Existing players can still re-join harmlessly
        assert_eq!(engine.join(p2()), Ok(false));
        assert_eq!(engine.join(PlayerId::from("")), Err(EngineError::InvalidPlayerId));
    }

    #[test]
    fn test_reveal_guards() {
        let mut engine = engine_with(full_catalog());
        engine.join(p1()).unwrap();

        assert_eq!(
            engine.submit_reveal(&p1(), vec![GAIN3]),
            Err(EngineError::WrongPhase {
                expected: MatchPhase::AwaitingReveals,
                actual: MatchPhase::WaitingForPlayers,
            })
        );

        engine.join(p2()).unwrap();
        assert_eq!(
            engine.submit_reveal(&PlayerId::from("ghost"), vec![]),
            Err(EngineError::NotRegistered(PlayerId::from("ghost")))
        );
    }

    #[test]
    fn test_gain_points_scenario() {
        // Single-card catalog: every hand is all Gain3
        let mut engine = started(vec![Card::new(GAIN3, "Gain3", 1, 0, AbilityKind::GainPoints, 3)]);

        assert_eq!(engine.submit_reveal(&p1(), vec![GAIN3]), Ok(false));
        assert_eq!(engine.submit_reveal(&p2(), vec![]), Ok(true));

        assert_eq!(score(&engine, &p1()), 3);
        assert_eq!(score(&engine, &p2()), 0);
        assert_eq!(engine.current_turn(), 2);
        assert_eq!(engine.max_cost_for_turn(), 2);

        // 3 - 1 played + 1 drawn, and 3 + 1 drawn
        assert_eq!(engine.player(&p1()).unwrap().hand.len(), 3);
        assert_eq!(engine.player(&p2()).unwrap().hand.len(), 4);

        let events = engine.drain_outbox();
        let result = last_turn_result(&events);
        assert_eq!(result.turn, 2);
        assert_eq!(result.scores[&p1()], 3);
        assert_eq!(result.boards[&p1()], vec![GAIN3]);
        assert!(result.boards[&p2()].is_empty());
        assert_eq!(result.ability_events.len(), 1);
        assert_eq!(result.ability_events[0].player_id, p1());
        assert_eq!(result.ability_events[0].ability, AbilityKind::GainPoints);

        // Next turn opened
        assert!(matches!(events.last(), Some(MatchEvent::TurnStarted(s)) if s.turn == 2));
        let p1_state = engine.player(&p1()).unwrap();
        assert!(p1_state.played_this_turn.is_empty());
        assert_eq!(p1_state.pending_extra_draws, 0);
    }

    #[test]
    fn test_destroy_resolves_before_scoring() {
        let mut engine = started(full_catalog());

        engine.submit_reveal(&p1(), vec![DESTROY1, GAIN2]).unwrap();
        engine.submit_reveal(&p2(), vec![GAIN5]).unwrap();

        assert_eq!(score(&engine, &p1()), 2);
        assert_eq!(score(&engine, &p2()), 0);

        let result = last_turn_result(&engine.drain_outbox());
        let fired: Vec<(PlayerId, CardId)> = result
            .ability_events
            .iter()
            .map(|e| (e.player_id.clone(), e.card_id))
            .collect();
        assert_eq!(fired, vec![(p1(), DESTROY1), (p1(), GAIN2)]);

        // Destroyed cards still count as played for the board
        assert_eq!(result.boards[&p2()], vec![GAIN5]);
    }

    #[test]
    fn test_destructive_pass_ignores_reveal_order() {
        let mut engine = started(full_catalog());

        // Destroy revealed last still fires before anything else
        engine.submit_reveal(&p1(), vec![GAIN2, DESTROY1]).unwrap();
        engine.submit_reveal(&p2(), vec![BRUTE, GAIN5]).unwrap();

        // Brute (front) destroyed: p2 gets Gain5 only, no Brute power
        assert_eq!(score(&engine, &p2()), 5);
        assert_eq!(score(&engine, &p1()), 2);

        let result = last_turn_result(&engine.drain_outbox());
        assert_eq!(result.ability_events[0].card_id, DESTROY1);
    }

    #[test]
    fn test_destroyed_destroyer_does_not_fire() {
        let mut engine = started(full_catalog());

        // Seat 1 resolves first and removes seat 2's destroyer
        engine.submit_reveal(&p1(), vec![DESTROY1, GAIN3]).unwrap();
        engine.submit_reveal(&p2(), vec![DESTROY1, GAIN2]).unwrap();

        assert_eq!(score(&engine, &p1()), 3);
        assert_eq!(score(&engine, &p2()), 2);

        let result = last_turn_result(&engine.drain_outbox());
        assert_eq!(result.ability_events.len(), 3);
    }

    #[test]
    fn test_power_scores_only_survivors() {
        let mut engine = started(full_catalog());

        engine.submit_reveal(&p1(), vec![BRUTE]).unwrap();
        engine.submit_reveal(&p2(), vec![BRUTE]).unwrap();

        assert_eq!(score(&engine, &p1()), 4);
        assert_eq!(score(&engine, &p2()), 4);
    }

    #[test]
    fn test_extra_draws() {
        let scholar = Card::new(SCHOLAR, "Scholar", 1, 0, AbilityKind::DrawExtraCard, 2);
        let mut engine = started(vec![scholar]);

        engine.submit_reveal(&p1(), vec![SCHOLAR]).unwrap();
        engine.submit_reveal(&p2(), vec![]).unwrap();

        // 3 - 1 + 2 extra + 1
        assert_eq!(engine.player(&p1()).unwrap().hand.len(), 5);
        assert_eq!(engine.player(&p2()).unwrap().hand.len(), 4);
        assert_eq!(engine.player(&p1()).unwrap().pending_extra_draws, 0);
    }

    #[test]
    fn test_timeout_forces_resolution() {
        let mut engine = started(vec![Card::new(GAIN3, "Gain3", 1, 0, AbilityKind::GainPoints, 3)]);

        engine.submit_reveal(&p1(), vec![GAIN3]).unwrap();
        engine.tick(Duration::from_secs(10));
        assert_eq!(engine.current_turn(), 1);
        let events = engine.drain_outbox();
        assert!(matches!(events.as_slice(), [MatchEvent::Timer { .. }]));

        engine.tick(Duration::from_secs(20));
        assert_eq!(engine.current_turn(), 2);
        assert_eq!(engine.phase(), MatchPhase::AwaitingReveals);
        assert_eq!(score(&engine, &p1()), 3);
        assert_eq!(score(&engine, &p2()), 0);

        let events = engine.drain_outbox();
        assert_eq!(events[0], MatchEvent::TimerExpired);
        assert!(matches!(events[1], MatchEvent::TurnResolved(_)));

        // Timer restarted for turn 2
        assert_eq!(engine.time_left(), Duration::from_secs(30));
    }

    #[test]
    fn test_force_resolve_with_nobody_revealed() {
        let mut engine = started(full_catalog());
        engine.force_resolve_on_timeout().unwrap();
        assert_eq!(engine.current_turn(), 2);
        assert_eq!(score(&engine, &p1()), 0);
        assert_eq!(engine.player(&p1()).unwrap().hand.len(), 4);
    }

    #[test]
    fn test_snapshot_hides_pending_reveals() {
        let mut engine = started(full_catalog());
        let before = engine.request_full_state(&p1()).unwrap();

        engine.submit_reveal(&p1(), vec![GAIN3]).unwrap();
        let during = engine.request_full_state(&p2()).unwrap();

        assert_eq!(before, during);
        assert_eq!(engine.pending_reveal(&p1()), Some(&[GAIN3][..]));
        assert!(engine.request_full_state(&PlayerId::from("ghost")).is_err());
    }

    #[test]
    fn test_second_reveal_overwrites_first() {
        let mut engine = started(full_catalog());
        engine.submit_reveal(&p1(), vec![GAIN5]).unwrap();
        engine.submit_reveal(&p1(), vec![GAIN2]).unwrap();
        assert_eq!(engine.current_turn(), 1);

        engine.submit_reveal(&p2(), vec![]).unwrap();
        assert_eq!(score(&engine, &p1()), 2);
    }

    #[test]
    fn test_over_cost_reveal_still_resolves() {
        let mut engine = started(full_catalog());
        // Brute costs 5 on turn 1
        engine.submit_reveal(&p1(), vec![BRUTE, GAIN3]).unwrap();
        engine.submit_reveal(&p2(), vec![]).unwrap();
        assert_eq!(score(&engine, &p1()), 7);
    }

    #[test]
    fn test_unknown_and_missing_cards() {
        let mut engine = started(vec![
            Card::new(GAIN3, "Gain3", 1, 0, AbilityKind::GainPoints, 3),
            Card::new(GAIN2, "Gain2", 1, 1, AbilityKind::GainPoints, 2),
        ]);
        let hand_before = engine.player(&p1()).unwrap().hand_ids();
        let hand_has_gain2 = hand_before.contains(&GAIN2);

        engine.submit_reveal(&p1(), vec![999, GAIN2]).unwrap();
        engine.submit_reveal(&p2(), vec![]).unwrap();

        // Unknown id skipped, Gain2 resolved from catalog either way
        assert_eq!(score(&engine, &p1()), 3);
        assert_eq!(engine.player(&p1()).unwrap().board_ids(), vec![GAIN2]);

        let expected_hand = if hand_has_gain2 { 3 } else { 4 };
        assert_eq!(engine.player(&p1()).unwrap().hand.len(), expected_hand);
    }

    #[test]
    fn test_board_accumulates_across_turns() {
        let mut engine = started(full_catalog());

        engine.submit_reveal(&p1(), vec![GAIN3]).unwrap();
        engine.submit_reveal(&p2(), vec![]).unwrap();
        engine.submit_reveal(&p1(), vec![GAIN2, GAIN3]).unwrap();
        engine.submit_reveal(&p2(), vec![]).unwrap();

        assert_eq!(engine.player(&p1()).unwrap().board_ids(), vec![GAIN3, GAIN2]);
        let snapshot = engine.request_full_state(&p1()).unwrap();
        assert_eq!(snapshot.players[0].board_card_ids, vec![GAIN3, GAIN2]);
        assert_eq!(snapshot.turn, 3);
    }

    #[test]
    fn test_match_ends_after_total_turns() {
        let mut engine = started(full_catalog());

        for _ in 0..6 {
            engine.submit_reveal(&p1(), vec![GAIN3]).unwrap();
            engine.submit_reveal(&p2(), vec![]).unwrap();
        }

        assert_eq!(engine.phase(), MatchPhase::Ended);
        assert_eq!(score(&engine, &p1()), 18);
        assert!(matches!(
            engine.submit_reveal(&p1(), vec![]),
            Err(EngineError::WrongPhase { actual: MatchPhase::Ended, .. })
        ));

        let events = engine.drain_outbox();
        match events.last() {
            Some(MatchEvent::MatchEnded(result)) => {
                assert_eq!(result.turn, 7);
                assert_eq!(result.scores[&p1()], 18);
                assert_eq!(result.winner(), Some(&p1()));
                assert_eq!(result.snapshot.players.len(), 2);
            }
            other => panic!("unexpected last event {:?}", other),
        }

        // Timer is dead once ended
        engine.tick(Duration::from_secs(60));
        assert!(engine.drain_outbox().is_empty());
    }

    #[test]
    fn test_rematch_resets_players() {
        let mut engine = started(full_catalog());
        assert!(engine.rematch().is_err());

        for _ in 0..6 {
            engine.force_resolve_on_timeout().unwrap();
        }
        engine.rematch().unwrap();

        assert_eq!(engine.phase(), MatchPhase::AwaitingReveals);
        assert_eq!(engine.current_turn(), 1);
        for id in [p1(), p2()] {
            let p = engine.player(&id).unwrap();
            assert_eq!(p.score, 0);
            assert_eq!(p.hand.len(), 3);
            assert!(p.board.is_empty());
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let play = || {
            let mut engine = started(full_catalog());
            for turn in 0..6 {
                let hand = engine.player(&p1()).unwrap().hand_ids();
                engine.submit_reveal(&p1(), hand.into_iter().take(1 + turn % 2).collect()).unwrap();
                let hand = engine.player(&p2()).unwrap().hand_ids();
                engine.submit_reveal(&p2(), hand.into_iter().take(1).collect()).unwrap();
            }
            (engine.state_hash(), engine.drain_outbox())
        };

        let (hash1, events1) = play();
        let (hash2, events2) = play();
        assert_eq!(hash1, hash2);
        assert_eq!(events1, events2);
    }

    #[test]
    fn test_different_seeds_deal_differently() {
        let catalog = Arc::new(CardCatalog::new(full_catalog()).unwrap());
        let deal = |seed| {
            let mut engine =
                MatchEngine::new(catalog.clone(), MatchConfig::default(), seed).unwrap();
            engine.join(p1()).unwrap();
            engine.join(p2()).unwrap();
            engine.state_hash()
        };
        assert_eq!(deal(1), deal(1));
        assert_ne!(deal(1), deal(2));
    }

    #[test]
    fn test_max_cost_examples() {
        assert_eq!(max_cost_for_turn(0, 6), 1);
        assert_eq!(max_cost_for_turn(1, 6), 1);
        assert_eq!(max_cost_for_turn(4, 6), 4);
        assert_eq!(max_cost_for_turn(6, 6), 6);
        assert_eq!(max_cost_for_turn(9, 6), 6);
    }

    proptest! {
        #[test]
        fn prop_max_cost_is_clamped_turn(turn in 1u32..100) {
            let max = max_cost_for_turn(turn, 6);
            prop_assert_eq!(max, turn.min(6));
        }
    }
}
