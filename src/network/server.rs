//! WebSocket Arena Server
//!
//! Async WebSocket front for the engine. Handles authentication, routes
//! each typed request to the corresponding engine operation, and
//! broadcasts lifecycle events to connected observers.
//!
//! Serialization discipline: the engine is held behind one `RwLock`.
//! Mutating operations take the write lock, so racing requests against
//! the same entity serialize and the loser observes the post-state error;
//! read-only queries share the read lock.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::core::amount::Amount;
use crate::core::id::Addr;
use crate::crypto::seal::{InputProof, SealedMove};
use crate::engine::ops::{Engine, RoundOutcome};
use crate::engine::events::EngineEvent;
use crate::network::auth::{validate_token, AuthConfig};
use crate::network::protocol::{
    AuthRequest, AuthResult, ClientMessage, CommitMoveRequest, ErrorCode, MatchSnapshot,
    PayoutInfo, ServerError, ServerMessage, TournamentSnapshot,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Drop bookkeeping for connections idle beyond this.
    pub idle_timeout: Duration,
    /// Development faucet: credit and approve this much on first auth.
    /// Stands in for the external token primitive; never set in production.
    pub dev_faucet: Option<Amount>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static bind addr"),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            dev_faucet: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Arena server errors.
#[derive(Debug, thiserror::Error)]
pub enum ArenaServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Connected client state.
struct ConnectedClient {
    /// Participant address (after auth).
    address: Option<Addr>,
    /// Is authenticated.
    authenticated: bool,
    /// Connection time.
    #[allow(dead_code)]
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
    /// Message sender (for direct messaging to client).
    sender: mpsc::Sender<ServerMessage>,
}

type ClientMap = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The arena server.
pub struct ArenaServer {
    /// Server configuration.
    config: ServerConfig,
    /// Authentication configuration.
    auth: AuthConfig,
    /// The engine, serialized behind one lock.
    engine: Arc<RwLock<Engine>>,
    /// Connected clients.
    clients: ClientMap,
    /// Lifecycle event fan-out.
    events_tx: broadcast::Sender<EngineEvent>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl ArenaServer {
    /// Create a new server around an engine.
    pub fn new(config: ServerConfig, auth: AuthConfig, engine: Engine) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            auth,
            engine: Arc::new(RwLock::new(engine)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            events_tx,
            shutdown_tx,
        }
    }

    /// Signal all connections and the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), ArenaServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Arena server listening on {}", self.config.bind_addr);

        // Spawn cleanup task
        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.idle_timeout;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout).await;
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
        let engine = self.engine.clone();
        let events_tx = self.events_tx.clone();
        let auth = self.auth.clone();
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
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    address: None,
                    authenticated: false,
                    connected_at: Instant::now(),
                    last_activity: Instant::now(),
                    sender: msg_tx.clone(),
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

            // Forward lifecycle events to authenticated clients.
            let event_clients = clients.clone();
            let event_sender = msg_tx.clone();
            let mut events_rx = events_tx.subscribe();
            let event_task = tokio::spawn(async move {
                while let Ok(event) = events_rx.recv().await {
                    let authed = event_clients
                        .read()
                        .await
                        .get(&addr)
                        .map(|c| c.authenticated)
                        .unwrap_or(false);
                    if authed && event_sender.send(ServerMessage::Event(event)).await.is_err() {
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
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(
                                            ServerError::protocol(
                                                ErrorCode::InvalidInput,
                                                "Invalid message format",
                                            ),
                                        )).await;
                                        continue;
                                    }
                                };

                                // Update activity
                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                    }
                                }

                                Self::handle_client_message(
                                    addr,
                                    client_msg,
                                    &clients,
                                    &engine,
                                    &events_tx,
                                    &auth,
                                    &config,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Ping(_))) => {
                                let _ = msg_tx.send(ServerMessage::Pong {
                                    timestamp: 0,
                                    server_time: now_millis(),
                                }).await;
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
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            event_task.abort();
            {
                let mut clients = clients.write().await;
                clients.remove(&addr);
            }
            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    #[allow(clippy::too_many_arguments)]
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &ClientMap,
        engine: &Arc<RwLock<Engine>>,
        events_tx: &broadcast::Sender<EngineEvent>,
        auth: &AuthConfig,
        config: &ServerConfig,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Auth(req) => {
                Self::handle_auth(addr, req, clients, engine, auth, config, sender).await;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: now_millis(),
                }).await;
            }
            operation => {
                let caller = {
                    let clients = clients.read().await;
                    match clients.get(&addr) {
                        Some(c) if c.authenticated => c.address,
                        _ => None,
                    }
                };

                let Some(caller) = caller else {
                    let _ = sender.send(ServerMessage::Error(ServerError::protocol(
                        ErrorCode::NotAuthenticated,
                        "Must authenticate first",
                    ))).await;
                    return;
                };

                let response = Self::dispatch_operation(engine, events_tx, caller, operation).await;
                let _ = sender.send(response).await;
            }
        }
    }

    /// Handle authentication.
    async fn handle_auth(
        addr: SocketAddr,
        req: AuthRequest,
        clients: &ClientMap,
        engine: &Arc<RwLock<Engine>>,
        auth: &AuthConfig,
        config: &ServerConfig,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let claims = match validate_token(&req.token, auth) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Auth failed for {}: {}", addr, e);
                let _ = sender.send(ServerMessage::AuthResult(AuthResult {
                    success: false,
                    address: None,
                    session_id: None,
                    error: Some(e.to_string()),
                    server_version: config.version.clone(),
                })).await;
                return;
            }
        };

        let address = claims.address();

        // Dev-mode faucet: fund and approve so joins can proceed without
        // the external token layer.
        if let Some(amount) = config.dev_faucet {
            let mut engine = engine.write().await;
            if engine.balance_of(&address).is_zero() {
                if let Err(e) = engine.credit(address, amount) {
                    warn!("Faucet credit failed for {}: {}", address.short(), e);
                }
                engine.approve(address, amount);
            }
        }

        {
            let mut clients = clients.write().await;
            if let Some(client) = clients.get_mut(&addr) {
                client.address = Some(address);
                client.authenticated = true;
            }
        }

        let _ = sender.send(ServerMessage::AuthResult(AuthResult {
            success: true,
            address: Some(address),
            session_id: Some(uuid::Uuid::new_v4().to_string()),
            error: None,
            server_version: config.version.clone(),
        })).await;

        debug!("Client {} authenticated as {}", addr, address.short());
    }

    /// Route one authenticated request to its engine operation.
    ///
    /// Mutating operations take the engine write lock and flush emitted
    /// events into the broadcast channel on success; queries take the
    /// read lock and emit nothing.
    async fn dispatch_operation(
        engine: &Arc<RwLock<Engine>>,
        events_tx: &broadcast::Sender<EngineEvent>,
        caller: Addr,
        msg: ClientMessage,
    ) -> ServerMessage {
        match msg {
            ClientMessage::CreateTournament { entry_fee } => {
                let mut engine = engine.write().await;
                match engine.create_tournament(caller, entry_fee) {
                    Ok(tournament_id) => {
                        Self::flush_events(&mut engine, events_tx);
                        ServerMessage::TournamentCreated { tournament_id }
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::JoinTournament { tournament_id } => {
                let mut engine = engine.write().await;
                match engine.join_tournament(caller, tournament_id) {
                    Ok(()) => {
                        Self::flush_events(&mut engine, events_tx);
                        Self::tournament_snapshot(&engine, tournament_id)
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::StartTournament { tournament_id } => {
                let mut engine = engine.write().await;
                match engine.start_tournament(caller, tournament_id) {
                    Ok(_) => {
                        Self::flush_events(&mut engine, events_tx);
                        Self::tournament_snapshot(&engine, tournament_id)
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::AdvanceRound { tournament_id } => {
                let mut engine = engine.write().await;
                match engine.advance_round(tournament_id) {
                    Ok(RoundOutcome::NextRound { .. }) | Ok(RoundOutcome::Completed(_)) => {
                        Self::flush_events(&mut engine, events_tx);
                        Self::tournament_snapshot(&engine, tournament_id)
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::CommitMove(CommitMoveRequest {
                match_id,
                ciphertext,
                input_proof,
            }) => {
                let Some(sealed) = SealedMove::from_hex(&ciphertext) else {
                    return ServerMessage::Error(ServerError::protocol(
                        ErrorCode::InvalidInput,
                        "ciphertext is not valid hex",
                    ));
                };
                let Some(proof) = InputProof::from_hex(&input_proof) else {
                    return ServerMessage::Error(ServerError::protocol(
                        ErrorCode::InvalidInput,
                        "input proof is not valid hex",
                    ));
                };

                let mut engine = engine.write().await;
                match engine.commit_move(caller, match_id, sealed, proof) {
                    Ok(_) => {
                        Self::flush_events(&mut engine, events_tx);
                        Self::match_snapshot(&engine, match_id)
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::ResolveMatch { match_id } => {
                let mut engine = engine.write().await;
                match engine.resolve_match(match_id) {
                    Ok(_) => {
                        Self::flush_events(&mut engine, events_tx);
                        Self::match_snapshot(&engine, match_id)
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::PayoutMatch { match_id } => {
                let mut engine = engine.write().await;
                match engine.payout_match(match_id) {
                    Ok(amount) => {
                        Self::flush_events(&mut engine, events_tx);
                        match engine.get_match(match_id).ok().and_then(|m| m.winner) {
                            Some(winner) => ServerMessage::Payout(PayoutInfo {
                                match_id,
                                winner,
                                amount,
                            }),
                            None => ServerMessage::Error(ServerError::protocol(
                                ErrorCode::InternalError,
                                "paid-out match has no winner",
                            )),
                        }
                    }
                    Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
                }
            }

            ClientMessage::GetTournament { tournament_id } => {
                let engine = engine.read().await;
                Self::tournament_snapshot(&engine, tournament_id)
            }

            ClientMessage::GetMatch { match_id } => {
                let engine = engine.read().await;
                Self::match_snapshot(&engine, match_id)
            }

            // Auth and Ping are handled before dispatch.
            ClientMessage::Auth(_) | ClientMessage::Ping { .. } => {
                ServerMessage::Error(ServerError::protocol(
                    ErrorCode::InvalidInput,
                    "unexpected message",
                ))
            }
        }
    }

    /// Drain engine events into the broadcast channel.
    fn flush_events(engine: &mut Engine, events_tx: &broadcast::Sender<EngineEvent>) {
        for event in engine.take_events() {
            // Send fails only when nobody listens; that is fine.
            let _ = events_tx.send(event);
        }
    }

    fn tournament_snapshot(
        engine: &Engine,
        tournament_id: crate::core::id::TournamentId,
    ) -> ServerMessage {
        match engine.get_tournament(tournament_id) {
            Ok(t) => ServerMessage::Tournament(TournamentSnapshot::from(t)),
            Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
        }
    }

    fn match_snapshot(engine: &Engine, match_id: crate::core::id::MatchId) -> ServerMessage {
        match engine.get_match(match_id) {
            Ok(m) => ServerMessage::Match(MatchSnapshot::from(m)),
            Err(e) => ServerMessage::Error(ServerError::from_engine(&e)),
        }
    }

    /// Periodically drop bookkeeping for dead or idle connections.
    async fn run_cleanup_loop(clients: ClientMap, idle_timeout: Duration) {
        let mut ticker = interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;

            let mut clients = clients.write().await;
            let before = clients.len();
            clients.retain(|_, c| {
                !c.sender.is_closed() && c.last_activity.elapsed() < idle_timeout
            });
            let dropped = before - clients.len();
            if dropped > 0 {
                debug!("Cleaned up {} stale connections", dropped);
            }
        }
    }
}

/// Server wall clock in milliseconds.
fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id::TournamentId;
    use crate::crypto::seal::EvaluationKey;
    use crate::engine::ops::EngineConfig;

    fn operator() -> Addr {
        Addr::new([0xee; 20])
    }

    fn test_engine() -> Arc<RwLock<Engine>> {
        let mut engine = Engine::new(
            EngineConfig { operator: operator() },
            EvaluationKey::derive("test-backend"),
        );
        let player = Addr::new([1; 20]);
        engine.credit(player, Amount::from_tokens(100)).unwrap();
        engine.approve(player, Amount::from_tokens(100));
        Arc::new(RwLock::new(engine))
    }

    #[tokio::test]
    async fn test_dispatch_create_and_join() {
        let engine = test_engine();
        let (events_tx, _keep) = broadcast::channel(16);

        let created = ArenaServer::dispatch_operation(
            &engine,
            &events_tx,
            operator(),
            ClientMessage::CreateTournament {
                entry_fee: Amount::from_tokens(10),
            },
        )
        .await;
        let tournament_id = match created {
            ServerMessage::TournamentCreated { tournament_id } => tournament_id,
            other => panic!("unexpected response: {:?}", other),
        };

        let joined = ArenaServer::dispatch_operation(
            &engine,
            &events_tx,
            Addr::new([1; 20]),
            ClientMessage::JoinTournament { tournament_id },
        )
        .await;
        match joined {
            ServerMessage::Tournament(snapshot) => {
                assert_eq!(snapshot.players.len(), 1);
                assert_eq!(snapshot.prize_pool, Amount::from_tokens(10));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_maps_engine_errors() {
        let engine = test_engine();
        let (events_tx, _keep) = broadcast::channel(16);

        let response = ArenaServer::dispatch_operation(
            &engine,
            &events_tx,
            Addr::new([1; 20]),
            ClientMessage::JoinTournament {
                tournament_id: TournamentId(42),
            },
        )
        .await;

        match response {
            ServerMessage::Error(err) => {
                assert_eq!(err.code, ErrorCode::NotFound);
                assert!(!err.retryable);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_rejects_malformed_hex() {
        let engine = test_engine();
        let (events_tx, _keep) = broadcast::channel(16);

        let response = ArenaServer::dispatch_operation(
            &engine,
            &events_tx,
            Addr::new([1; 20]),
            ClientMessage::CommitMove(CommitMoveRequest {
                match_id: crate::core::id::MatchId(0),
                ciphertext: "not-hex!".into(),
                input_proof: "00".into(),
            }),
        )
        .await;

        match response {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::InvalidInput),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_operations_broadcast_events() {
        let engine = test_engine();
        let (events_tx, mut events_rx) = broadcast::channel(16);

        ArenaServer::dispatch_operation(
            &engine,
            &events_tx,
            operator(),
            ClientMessage::CreateTournament {
                entry_fee: Amount::from_tokens(10),
            },
        )
        .await;

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, EngineEvent::TournamentCreated { .. }));
    }
}
