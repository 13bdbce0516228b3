//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by an `action` field, with
//! camelCase field names.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::card::CardId;
use crate::game::events::{AbilityEvent, MatchEvent, MatchResult, TurnResult};
use crate::game::state::{MatchSnapshot, PlayerId, PlayerSnapshot};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask the server for a player id (or confirm one already held).
    JoinRequest(JoinRequest),

    /// Take a seat in a match.
    Join(JoinMessage),

    /// Submit this turn's play.
    RevealCards(RevealCards),

    /// Reconnect: ask for the full match state.
    RequestFullState(RequestFullState),
}

/// Id request. An empty or missing id asks the server to issue one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Requested id, possibly empty
    #[serde(default)]
    pub player_id: String,
}

/// Seat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    /// Player taking the seat
    pub player_id: String,
}

/// A turn's reveal. An empty list is a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealCards {
    /// Revealing player
    pub player_id: String,
    /// Cards played, in reveal order
    #[serde(default)]
    pub card_ids: Vec<CardId>,
}

/// Reconnect request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFullState {
    /// Returning player
    pub player_id: String,
}

impl ClientMessage {
    /// Player id the message is about.
    pub fn player_id(&self) -> &str {
        match self {
            ClientMessage::JoinRequest(m) => &m.player_id,
            ClientMessage::Join(m) => &m.player_id,
            ClientMessage::RevealCards(m) => &m.player_id,
            ClientMessage::RequestFullState(m) => &m.player_id,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Server-issued player id.
    #[serde(rename_all = "camelCase")]
    AssignPlayerId {
        /// Id the client should use from now on
        player_id: String,
    },

    /// Both players are seated and cards are dealt.
    GameStart,

    /// Full snapshot at the start of a turn.
    #[serde(rename_all = "camelCase")]
    GameState {
        /// Match state
        full_state: FullGameState,
    },

    /// Cosmetic countdown.
    #[serde(rename_all = "camelCase")]
    Timer {
        /// Seconds left this turn
        time_left: f32,
    },

    /// The turn timer ran out; resolution is being forced.
    TimerExpire,

    /// Result of a resolved turn.
    RevealResult(RevealResult),

    /// Terminal result.
    #[serde(rename_all = "camelCase")]
    EndMatch {
        /// Turn counter at the end
        turn: u32,
        /// Final score per player
        scores: BTreeMap<String, i32>,
        /// Final match state
        full_state: FullGameState,
    },

    /// Reconnect response, unicast to the requester.
    #[serde(rename_all = "camelCase")]
    ReconnectedFullState {
        /// Match state
        full_state: FullGameState,
    },
}

/// Result of a resolved turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealResult {
    /// Turn the match moves on to
    pub turn: u32,
    /// Score per player
    pub scores: BTreeMap<String, i32>,
    /// Cards on each player's board
    pub played_cards: BTreeMap<String, Vec<CardId>>,
    /// Abilities in firing order
    pub ability_events: Vec<AbilityEventMessage>,
}

/// One ability firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityEventMessage {
    /// Card owner
    pub player_id: String,
    /// Card whose ability fired
    pub card_id: CardId,
    /// Ability kind name
    pub ability_name: String,
    /// Notification text
    pub description: String,
}

/// Full match snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullGameState {
    /// Current turn (1-based)
    pub turn: u32,
    /// Turns in the match
    pub total_turns: u32,
    /// Players in seat order
    pub players: Vec<PlayerEntry>,
}

/// One player in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    /// Player id
    pub player_id: String,
    /// Visible state
    pub state: PlayerStateMessage,
}

/// A player's visible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateMessage {
    /// Score
    pub score: i32,
    /// Hand, in draw order
    pub hand_card_ids: Vec<CardId>,
    /// Every card the player has on the board
    pub played_this_turn: Vec<CardId>,
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn string_keys<V: Clone>(map: &BTreeMap<PlayerId, V>) -> BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

impl From<&PlayerSnapshot> for PlayerEntry {
    fn from(p: &PlayerSnapshot) -> Self {
        Self {
            player_id: p.player_id.to_string(),
            state: PlayerStateMessage {
                score: p.score,
                hand_card_ids: p.hand_card_ids.clone(),
                played_this_turn: p.board_card_ids.clone(),
            },
        }
    }
}

impl From<&MatchSnapshot> for FullGameState {
    fn from(s: &MatchSnapshot) -> Self {
        Self {
            turn: s.turn,
            total_turns: s.total_turns,
            players: s.players.iter().map(PlayerEntry::from).collect(),
        }
    }
}

impl From<&AbilityEvent> for AbilityEventMessage {
    fn from(e: &AbilityEvent) -> Self {
        Self {
            player_id: e.player_id.to_string(),
            card_id: e.card_id,
            ability_name: e.ability.name().to_string(),
            description: e.description.clone(),
        }
    }
}

impl From<&TurnResult> for RevealResult {
    fn from(r: &TurnResult) -> Self {
        Self {
            turn: r.turn,
            scores: string_keys(&r.scores),
            played_cards: string_keys(&r.boards),
            ability_events: r.ability_events.iter().map(AbilityEventMessage::from).collect(),
        }
    }
}

impl From<&MatchResult> for ServerMessage {
    fn from(r: &MatchResult) -> Self {
        ServerMessage::EndMatch {
            turn: r.turn,
            scores: string_keys(&r.scores),
            full_state: FullGameState::from(&r.snapshot),
        }
    }
}

impl From<&MatchEvent> for ServerMessage {
    fn from(event: &MatchEvent) -> Self {
        match event {
            MatchEvent::MatchStarted => ServerMessage::GameStart,
            MatchEvent::TurnStarted(snapshot) => ServerMessage::GameState {
                full_state: FullGameState::from(snapshot),
            },
            MatchEvent::Timer { time_left } => ServerMessage::Timer { time_left: *time_left },
            MatchEvent::TimerExpired => ServerMessage::TimerExpire,
            MatchEvent::TurnResolved(result) => {
                ServerMessage::RevealResult(RevealResult::from(result))
            }
            MatchEvent::MatchEnded(result) => ServerMessage::from(result),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::AbilityKind;
    use serde_json::{json, Value};

    fn to_value(msg: &ServerMessage) -> Value {
        serde_json::from_str(&msg.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_client_messages_parse() {
        let msg = ClientMessage::from_json(r#"{"action":"revealCards","playerId":"p1","cardIds":[3,4]}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::RevealCards(RevealCards { player_id: "p1".into(), card_ids: vec![3, 4] })
        );

        let msg = ClientMessage::from_json(r#"{"action":"join","playerId":"p2"}"#).unwrap();
        assert_eq!(msg.player_id(), "p2");

        let msg = ClientMessage::from_json(r#"{"action":"requestFullState","playerId":"p2"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::RequestFullState(_)));
    }

    #[test]
    fn test_join_request_without_id() {
        let msg = ClientMessage::from_json(r#"{"action":"joinRequest"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRequest(JoinRequest::default()));
        assert_eq!(msg.player_id(), "");
    }

    #[test]
    fn test_empty_reveal_is_a_pass() {
        let msg = ClientMessage::from_json(r#"{"action":"revealCards","playerId":"p1"}"#).unwrap();
        match msg {
            ClientMessage::RevealCards(r) => assert!(r.card_ids.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_messages_rejected() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"action":"teleport","playerId":"p1"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"playerId":"p1"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"action":"revealCards","playerId":"p1","cardIds":"x"}"#).is_err());
    }

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(
            to_value(&ServerMessage::AssignPlayerId { player_id: "abc".into() }),
            json!({"action": "assignPlayerId", "playerId": "abc"})
        );
        assert_eq!(to_value(&ServerMessage::GameStart), json!({"action": "gameStart"}));
        assert_eq!(to_value(&ServerMessage::TimerExpire), json!({"action": "timerExpire"}));
        assert_eq!(
            to_value(&ServerMessage::Timer { time_left: 12.5 }),
            json!({"action": "timer", "timeLeft": 12.5})
        );
    }

    #[test]
    fn test_game_state_from_snapshot() {
        let snapshot = MatchSnapshot {
            turn: 2,
            total_turns: 6,
            players: vec![PlayerSnapshot {
                player_id: PlayerId::from("p1"),
                score: 3,
                hand_card_ids: vec![1, 2],
                board_card_ids: vec![5],
            }],
        };

        let msg = ServerMessage::from(&MatchEvent::TurnStarted(snapshot));
        assert_eq!(
            to_value(&msg),
            json!({
                "action": "gameState",
                "fullState": {
                    "turn": 2,
                    "totalTurns": 6,
                    "players": [{
                        "playerId": "p1",
                        "state": {"score": 3, "handCardIds": [1, 2], "playedThisTurn": [5]}
                    }]
                }
            })
        );
    }

    #[test]
    fn test_reveal_result_from_turn() {
        let p1 = PlayerId::from("p1");
        let p2 = PlayerId::from("p2");
        let result = TurnResult {
            turn: 2,
            scores: [(p1.clone(), 3), (p2.clone(), 0)].into_iter().collect(),
            boards: [(p1.clone(), vec![7]), (p2.clone(), vec![])].into_iter().collect(),
            ability_events: vec![AbilityEvent {
                player_id: p1,
                card_id: 7,
                ability: AbilityKind::GainPoints,
                description: "Gain 3 points".into(),
            }],
        };

        let value = to_value(&ServerMessage::from(&MatchEvent::TurnResolved(result)));
        assert_eq!(value["action"], "revealResult");
        assert_eq!(value["turn"], 2);
        assert_eq!(value["scores"], json!({"p1": 3, "p2": 0}));
        assert_eq!(value["playedCards"], json!({"p1": [7], "p2": []}));
        assert_eq!(
            value["abilityEvents"],
            json!([{"playerId": "p1", "cardId": 7, "abilityName": "GainPoints", "description": "Gain 3 points"}])
        );
    }

    #[test]
    fn test_end_match_shape() {
        let result = MatchResult {
            turn: 7,
            scores: [(PlayerId::from("p1"), 9)].into_iter().collect(),
            snapshot: MatchSnapshot { turn: 7, total_turns: 6, players: Vec::new() },
        };
        let value = to_value(&ServerMessage::from(&MatchEvent::MatchEnded(result)));
        assert_eq!(value["action"], "endMatch");
        assert_eq!(value["turn"], 7);
        assert_eq!(value["scores"]["p1"], 9);
        assert_eq!(value["fullState"]["totalTurns"], 6);
    }

    #[test]
    fn test_server_message_json_roundtrip() {
        let msg = ServerMessage::ReconnectedFullState {
            full_state: FullGameState { turn: 3, total_turns: 6, players: Vec::new() },
        };
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }
}
