//! Match Session Management
//!
//! A session pairs one `MatchEngine` with the connections of its two
//! players. The session forwards player actions into the engine and pushes
//! the engine's outbox to whoever is connected.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::game::card::CardId;
use crate::game::catalog::CardCatalog;
use crate::game::engine::{EngineError, MatchConfig, MatchEngine, PLAYERS_PER_MATCH};
use crate::game::state::{MatchPhase, PlayerId};
use crate::network::protocol::{FullGameState, ServerMessage};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Connection state for reconnection support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Player is connected.
    Connected,
    /// Player disconnected, waiting for reconnect.
    Disconnected {
        /// When disconnection occurred.
        since: Instant,
    },
}

/// A player seated in a session.
#[derive(Debug)]
pub struct SessionPlayer {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Connection state.
    pub connection_state: ConnectionState,
    /// Message channel to this player.
    pub sender: mpsc::Sender<ServerMessage>,
}

impl SessionPlayer {
    /// Check if player is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self.connection_state, ConnectionState::Connected)
    }
}

/// A match session.
pub struct MatchSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// The match.
    engine: MatchEngine,
    /// Seated players.
    players: BTreeMap<PlayerId, SessionPlayer>,
    /// When the last tick ran.
    last_tick: Instant,
    /// When the match ended (if it has).
    ended_at: Option<Instant>,
}

impl MatchSession {
    /// Create a session around a fresh engine.
    pub fn new(id: SessionId, engine: MatchEngine) -> Self {
        Self {
            id,
            engine,
            players: BTreeMap::new(),
            last_tick: Instant::now(),
            ended_at: None,
        }
    }

    /// Seat a player, or rebind an already seated player to a new connection.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.sender = sender;
            player.connection_state = ConnectionState::Connected;
            info!(session = %hex::encode(&self.id[..4]), player = %player_id, "Player rebound");
            return Ok(());
        }

        self.engine.join(player_id.clone())?;
        self.players.insert(player_id.clone(), SessionPlayer {
            player_id,
            connection_state: ConnectionState::Connected,
            sender,
        });

        // Start the turn clock from now, not from session creation
        if self.engine.phase() == MatchPhase::AwaitingReveals {
            self.last_tick = Instant::now();
        }

        Ok(())
    }

    /// Forward a reveal. Returns whether it resolved the turn.
    pub fn reveal(
        &mut self,
        player_id: &PlayerId,
        card_ids: Vec<CardId>,
    ) -> Result<bool, SessionError> {
        Ok(self.engine.submit_reveal(player_id, card_ids)?)
    }

    /// Rebind a returning player and build their reconnect snapshot.
    pub fn reconnect(
        &mut self,
        player_id: &PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<ServerMessage, SessionError> {
        let snapshot = self.engine.request_full_state(player_id)?;

        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.clone()))?;
        player.sender = sender;
        player.connection_state = ConnectionState::Connected;

        Ok(ServerMessage::ReconnectedFullState {
            full_state: FullGameState::from(&snapshot),
        })
    }

    /// Mark a player as disconnected when `sender` is still their bound
    /// connection. Returns true if the state changed.
    ///
    /// A closing socket the player has already moved away from is ignored.
    pub fn mark_disconnected(
        &mut self,
        player_id: &PlayerId,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> bool {
        match self.players.get_mut(player_id) {
            Some(player) if player.sender.same_channel(sender) => {
                player.connection_state = ConnectionState::Disconnected { since: Instant::now() };
                true
            }
            _ => false,
        }
    }

    /// Advance the turn timer by the wall time since the last tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.engine.tick(elapsed);
    }

    /// Send everything the engine queued to the connected players.
    ///
    /// Never waits on a slow client; a full channel drops the message.
    /// Returns the number of events dispatched.
    pub fn dispatch(&mut self) -> usize {
        let events = self.engine.drain_outbox();
        for event in &events {
            self.broadcast(ServerMessage::from(event));
        }

        if self.ended_at.is_none() && self.engine.phase() == MatchPhase::Ended {
            self.ended_at = Some(Instant::now());
            info!(session = %hex::encode(&self.id[..4]), "Session match ended");
        }

        events.len()
    }

    /// Send a message to every connected player.
    pub fn broadcast(&self, message: ServerMessage) {
        for player in self.players.values() {
            if !player.is_connected() {
                continue;
            }
            match player.sender.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(player = %player.player_id, "Outbound channel full, message dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(player = %player.player_id, "Outbound channel closed");
                }
            }
        }
    }

    /// Match phase.
    pub fn phase(&self) -> MatchPhase {
        self.engine.phase()
    }

    /// Check if a player is seated here.
    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains_key(player_id)
    }

    /// Check if a seated player is connected.
    pub fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.players.get(player_id).map(|p| p.is_connected()).unwrap_or(false)
    }

    /// Waiting for a second player.
    pub fn is_open(&self) -> bool {
        self.engine.phase() == MatchPhase::WaitingForPlayers
            && self.players.len() < PLAYERS_PER_MATCH
    }

    /// Nobody is connected any more.
    pub fn is_abandoned(&self) -> bool {
        self.players.values().all(|p| !p.is_connected())
    }

    /// How long ago the match ended, if it has.
    pub fn ended_for(&self, now: Instant) -> Option<Duration> {
        self.ended_at.map(|t| now.duration_since(t))
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The engine refused the operation.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Player has no session.
    #[error("Player {0} not found")]
    PlayerNotFound(PlayerId),
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Result of placing a player.
pub struct JoinOutcome {
    /// Session the player is in.
    pub session_id: SessionId,
    /// The session.
    pub session: Arc<RwLock<MatchSession>>,
    /// A new session was created for this player.
    pub created: bool,
}

/// Manages all active sessions.
pub struct SessionManager {
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<MatchSession>>>>,
    /// Player to session mapping.
    player_sessions: RwLock<BTreeMap<PlayerId, SessionId>>,
    /// Serializes seat assignment.
    matchmaking: Mutex<()>,
    /// Card definitions shared by every match.
    catalog: Arc<CardCatalog>,
    /// Rules for new matches.
    match_config: MatchConfig,
    /// Fixed engine seed; random per session when unset.
    seed: Option<u64>,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new(catalog: Arc<CardCatalog>, match_config: MatchConfig, seed: Option<u64>) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            player_sessions: RwLock::new(BTreeMap::new()),
            matchmaking: Mutex::new(()),
            catalog,
            match_config,
            seed,
        }
    }

    /// Create a new session.
    pub async fn create_session(
        &self,
    ) -> Result<(SessionId, Arc<RwLock<MatchSession>>), SessionError> {
        let id = uuid::Uuid::new_v4().into_bytes();
        let seed = self.seed.unwrap_or_else(|| session_seed(&id));
        let engine = MatchEngine::new(self.catalog.clone(), self.match_config.clone(), seed)?;
        let session = Arc::new(RwLock::new(MatchSession::new(id, engine)));

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session.clone());

        info!(
            session = %hex::encode(&id[..4]),
            seed = %format!("{:016x}", seed),
            "Session created"
        );
        Ok((id, session))
    }

    /// Place a player.
    ///
    /// A player already bound to a session is rebound to `sender` there.
    /// Otherwise they take the open seat, or a new session is created.
    pub async fn join(
        &self,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<JoinOutcome, SessionError> {
        let _guard = self.matchmaking.lock().await;

        // The map guard must be gone before `sessions` is locked
        let bound = self.player_sessions.read().await.get(&player_id).copied();
        if let Some(session_id) = bound {
            if let Some(session) = self.get_session(&session_id).await {
                {
                    let mut s = session.write().await;
                    s.join(player_id, sender)?;
                    s.dispatch();
                }
                return Ok(JoinOutcome { session_id, session, created: false });
            }
        }

        let (session_id, session, created) = match self.find_open_session().await {
            Some((id, session)) => (id, session, false),
            None => {
                let (id, session) = self.create_session().await?;
                (id, session, true)
            }
        };

        {
            let mut s = session.write().await;
            s.join(player_id.clone(), sender)?;
            s.dispatch();
        }
        self.register_player(player_id, session_id).await;

        Ok(JoinOutcome { session_id, session, created })
    }

    /// First session still waiting for a second player.
    async fn find_open_session(&self) -> Option<(SessionId, Arc<RwLock<MatchSession>>)> {
        let sessions = self.sessions.read().await;
        for (id, session) in sessions.iter() {
            if session.read().await.is_open() {
                return Some((*id, session.clone()));
            }
        }
        None
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<MatchSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Get session for a player.
    pub async fn get_player_session(
        &self,
        player_id: &PlayerId,
    ) -> Option<Arc<RwLock<MatchSession>>> {
        let session_id = self.player_sessions.read().await.get(player_id).copied()?;
        self.get_session(&session_id).await
    }

    /// Register player in a session.
    pub async fn register_player(&self, player_id: PlayerId, session_id: SessionId) {
        let mut player_sessions = self.player_sessions.write().await;
        player_sessions.insert(player_id, session_id);
    }

    /// Mark a player's connection gone. The seat is kept for reconnection.
    ///
    /// Only the connection the player is currently bound to counts.
    pub async fn disconnect_player(
        &self,
        player_id: &PlayerId,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        if let Some(session) = self.get_player_session(player_id).await {
            if session.write().await.mark_disconnected(player_id, sender) {
                info!(player = %player_id, "Player disconnected");
            }
        }
    }

    /// Remove a session and its player bindings.
    ///
    /// The two maps are locked one at a time, never together.
    pub async fn remove_session(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
        self.player_sessions.write().await.retain(|_, sid| sid != id);
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Drop sessions that ended more than `grace` ago, and lobbies nobody
    /// is connected to. Returns the removed ids.
    pub async fn cleanup(&self, grace: Duration) -> Vec<SessionId> {
        let _guard = self.matchmaking.lock().await;
        let now = Instant::now();

        let mut to_remove = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                let s = session.read().await;
                let expired = s.ended_for(now).map(|d| d >= grace).unwrap_or(false);
                let abandoned_lobby =
                    s.phase() == MatchPhase::WaitingForPlayers && s.is_abandoned();
                if expired || abandoned_lobby {
                    to_remove.push(*id);
                }
            }
        }

        for id in &to_remove {
            self.remove_session(id).await;
            debug!(session = %hex::encode(&id[..4]), "Session removed");
        }

        to_remove
    }
}

/// Engine seed for a session without a configured one.
fn session_seed(id: &SessionId) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&id[..8]);
    u64::from_le_bytes(bytes)
}
