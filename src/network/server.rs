//! WebSocket Game Server
//!
//! Async WebSocket server for duel connections.
//! Parses client actions, routes them to the player's session, and runs
//! one timer task per session plus a periodic cleanup task.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::catalog::CardCatalog;
use crate::game::state::{MatchPhase, PlayerId};
use crate::network::config::ServerConfig;
use crate::network::protocol::{
    ClientMessage, ServerMessage, JoinRequest, JoinMessage, RevealCards, RequestFullState,
};
use crate::network::session::{MatchSession, SessionManager};

/// Outbound queue depth per connection.
const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Player identifier, once the client has named one.
    player_id: Option<PlayerId>,
    /// Connection time.
    connected_at: Instant,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, catalog: Arc<CardCatalog>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sessions = SessionManager::new(catalog, config.match_config.clone(), config.seed);

        Self {
            config,
            sessions: Arc::new(sessions),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind and run the server until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Duel server listening on {}", listener.local_addr()?);

        let cleanup_sessions = self.sessions.clone();
        let cleanup_interval = self.config.cleanup_interval;
        let session_grace = self.config.session_grace;

        // Spawn cleanup task
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_sessions, cleanup_interval, session_grace).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CHANNEL_SIZE);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    player_id: None,
                    connected_at: Instant::now(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        warn!("Dropping malformed message from {}: {}", addr, e);
                                        continue;
                                    }
                                };

                                Self::handle_client_message(
                                    addr,
                                    client_msg,
                                    &clients,
                                    &sessions,
                                    &config,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                warn!("Dropping binary frame from {}", addr);
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();

            let client = clients.write().await.remove(&addr);
            if let Some(client) = client {
                if let Some(player_id) = client.player_id {
                    // No-op if the player already moved to another connection
                    sessions.disconnect_player(&player_id, &msg_tx).await;
                }
                debug!("Client {} was connected for {:?}", addr, client.connected_at.elapsed());
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
        config: &ServerConfig,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::JoinRequest(req) => {
                Self::handle_join_request(addr, req, clients, sender).await;
            }
            ClientMessage::Join(join) => {
                Self::handle_join(addr, join, clients, sessions, config, sender).await;
            }
            ClientMessage::RevealCards(reveal) => {
                Self::handle_reveal(addr, reveal, clients, sessions).await;
            }
            ClientMessage::RequestFullState(req) => {
                Self::handle_request_full_state(addr, req, clients, sessions, sender).await;
            }
        }
    }

    /// Bind a player id to this connection.
    async fn bind_player(addr: SocketAddr, player_id: &PlayerId, clients: &Clients) {
        let mut clients = clients.write().await;
        if let Some(client) = clients.get_mut(&addr) {
            client.player_id = Some(player_id.clone());
        }
    }

    /// Echo the requested id, or issue a new one.
    async fn handle_join_request(
        addr: SocketAddr,
        req: JoinRequest,
        clients: &Clients,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let player_id = if req.player_id.is_empty() {
            PlayerId::generate()
        } else {
            PlayerId::new(req.player_id)
        };

        Self::bind_player(addr, &player_id, clients).await;
        debug!("Assigned player id {} to {}", player_id, addr);

        let _ = sender.send(ServerMessage::AssignPlayerId {
            player_id: player_id.to_string(),
        }).await;
    }

    /// Seat the player and start their session's timer if it is new.
    async fn handle_join(
        addr: SocketAddr,
        join: JoinMessage,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
        config: &ServerConfig,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let player_id = PlayerId::new(join.player_id);
        if player_id.is_empty() {
            warn!("Dropping join without player id from {}", addr);
            return;
        }

        match sessions.join(player_id.clone(), sender.clone()).await {
            Ok(outcome) => {
                Self::bind_player(addr, &player_id, clients).await;
                if outcome.created {
                    Self::spawn_session_timer(
                        Arc::downgrade(&outcome.session),
                        sessions.clone(),
                        config.tick_interval,
                        config.session_grace,
                    );
                }
                info!(
                    "Player {} joined session {}",
                    player_id,
                    hex::encode(&outcome.session_id[..4])
                );
            }
            Err(e) => {
                warn!("Join from {} rejected: {}", player_id, e);
            }
        }
    }

    /// Forward a reveal to the player's session.
    ///
    /// Only the player bound to this connection may reveal through it.
    async fn handle_reveal(
        addr: SocketAddr,
        reveal: RevealCards,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
    ) {
        let player_id = PlayerId::new(reveal.player_id);
        let bound = clients.read().await.get(&addr).and_then(|c| c.player_id.clone());
        if bound.as_ref() != Some(&player_id) {
            warn!(
                "Dropping reveal for {} from {}: not bound to this connection",
                player_id, addr
            );
            return;
        }

        let session = match sessions.get_player_session(&player_id).await {
            Some(s) => s,
            None => {
                warn!("Dropping reveal from {} ({}): no session", player_id, addr);
                return;
            }
        };

        let mut s = session.write().await;
        if let Err(e) = s.reveal(&player_id, reveal.card_ids) {
            warn!("Dropping reveal from {}: {}", player_id, e);
        }
        s.dispatch();
    }

    /// Send the reconnect snapshot to the requester only.
    async fn handle_request_full_state(
        addr: SocketAddr,
        req: RequestFullState,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let player_id = PlayerId::new(req.player_id);
        let session = match sessions.get_player_session(&player_id).await {
            Some(s) => s,
            None => {
                warn!("Dropping full state request from {} ({}): no session", player_id, addr);
                return;
            }
        };

        let reply = session.write().await.reconnect(&player_id, sender.clone());
        match reply {
            Ok(message) => {
                Self::bind_player(addr, &player_id, clients).await;
                info!("Player {} reconnected from {}", player_id, addr);
                let _ = sender.send(message).await;
            }
            Err(e) => {
                warn!("Dropping full state request from {}: {}", player_id, e);
            }
        }
    }

    /// Tick one session's turn timer until its match ends, then drop the
    /// session after the grace period.
    fn spawn_session_timer(
        session: Weak<RwLock<MatchSession>>,
        sessions: Arc<SessionManager>,
        tick_interval: Duration,
        grace: Duration,
    ) {
        tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let session_id = loop {
                ticker.tick().await;

                // Session already removed
                let Some(strong) = session.upgrade() else { return };

                let mut s = strong.write().await;
                s.tick();
                s.dispatch();
                if s.phase() == MatchPhase::Ended {
                    break s.id;
                }
            };

            tokio::time::sleep(grace).await;
            sessions.remove_session(&session_id).await;
            info!("Session {} closed", hex::encode(&session_id[..4]));
        });
    }

    /// Run cleanup loop.
    async fn run_cleanup_loop(
        sessions: Arc<SessionManager>,
        cleanup_interval: Duration,
        grace: Duration,
    ) {
        let mut interval = interval(cleanup_interval);

        loop {
            interval.tick().await;

            let removed = sessions.cleanup(grace).await;
            if !removed.is_empty() {
                info!("Cleanup removed {} sessions", removed.len());
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}
