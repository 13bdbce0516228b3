//! Card Abilities
//!
//! Each ability kind maps to one plain function over the two player states.
//! Effects only touch scores, extra-draw counters and the played-this-turn
//! lists; they never look at where their own card sits.

use crate::core::rng::DeterministicRng;
use crate::game::card::{AbilityKind, Card};
use crate::game::state::PlayerState;

/// An ability effect: `(value, self, opponent, rng)`.
pub type EffectFn = fn(i32, &mut PlayerState, &mut PlayerState, &mut DeterministicRng);

/// Look up the effect for an ability kind.
///
/// `None` and `Unknown` have no effect.
pub fn effect_for(kind: AbilityKind) -> Option<EffectFn> {
    match kind {
        AbilityKind::GainPoints => Some(gain_points),
        AbilityKind::StealPoints => Some(steal_points),
        AbilityKind::DoublePower => Some(double_power),
        AbilityKind::DrawExtraCard => Some(draw_extra_card),
        AbilityKind::DiscardOpponentRandomCard => Some(discard_opponent_random),
        AbilityKind::DestroyOpponentCardInPlay => Some(destroy_opponent_in_play),
        AbilityKind::None | AbilityKind::Unknown => None,
    }
}

/// Apply a card's ability. Returns whether anything ran.
pub fn apply_ability(
    card: &Card,
    me: &mut PlayerState,
    opponent: &mut PlayerState,
    rng: &mut DeterministicRng,
) -> bool {
    match effect_for(card.ability) {
        Some(effect) => {
            effect(card.ability_value, me, opponent, rng);
            true
        }
        None => false,
    }
}

/// Add `value` to own score.
fn gain_points(
    value: i32,
    me: &mut PlayerState,
    _opponent: &mut PlayerState,
    _rng: &mut DeterministicRng,
) {
    me.score = me.score.saturating_add(value);
}

/// Move `min(opponent.score, value)` points across; never below zero.
fn steal_points(
    value: i32,
    me: &mut PlayerState,
    opponent: &mut PlayerState,
    _rng: &mut DeterministicRng,
) {
    let stolen = opponent.score.min(value).max(0);
    opponent.score -= stolen;
    me.score = me.score.saturating_add(stolen);
}

/// Every card in play scores its power `value - 1` more times.
fn double_power(
    value: i32,
    me: &mut PlayerState,
    _opponent: &mut PlayerState,
    _rng: &mut DeterministicRng,
) {
    let bonus: i32 = me
        .played_this_turn
        .iter()
        .map(|c| (c.power as i32).saturating_mul(value - 1))
        .sum();
    me.score = me.score.saturating_add(bonus);
}

/// Owe `value` extra draws at end of turn.
fn draw_extra_card(
    value: i32,
    me: &mut PlayerState,
    _opponent: &mut PlayerState,
    _rng: &mut DeterministicRng,
) {
    me.pending_extra_draws = me.pending_extra_draws.saturating_add(value.max(0) as u32);
}

/// Remove up to `value` uniformly random cards from the opponent's play.
fn discard_opponent_random(
    value: i32,
    _me: &mut PlayerState,
    opponent: &mut PlayerState,
    rng: &mut DeterministicRng,
) {
    for _ in 0..value.max(0) {
        if opponent.played_this_turn.is_empty() {
            break;
        }
        let idx = rng.next_index(opponent.played_this_turn.len());
        opponent.played_this_turn.remove(idx);
    }
}

/// Remove up to `value` cards from the front of the opponent's play.
fn destroy_opponent_in_play(
    value: i32,
    _me: &mut PlayerState,
    opponent: &mut PlayerState,
    _rng: &mut DeterministicRng,
) {
    let n = (value.max(0) as usize).min(opponent.played_this_turn.len());
    opponent.played_this_turn.drain(..n);
}
