//! WebSocket Game Server
//!
//! Async WebSocket server pairing clients into rooms.
//! Every connection names its room in the handshake query; the first
//! two arrivals play, anyone after that is turned away.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use crate::history::{LogSink, MatchSink};
use crate::network::identity::{anonymous_name, Handshake, IdentityLookup, QueryNameLookup};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::session::{
    RoomRegistry, SessionConfig, SessionError, SessionHandle, TickOutcome, REASON_OPPONENT_LEFT,
};

/// Close reason when the handshake has no `code`.
pub const REASON_MISSING_CODE: &str = "Missing room code";

/// Close reason for a third arrival.
pub const REASON_ROOM_FULL: &str = "Room full";

/// Close reason sent to every connection on shutdown.
pub const REASON_SHUTDOWN: &str = "Server shutting down";

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Settings for every room.
    pub session: SessionConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            session: SessionConfig::default(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Live rooms.
    registry: Arc<RoomRegistry>,
    /// Display name resolution.
    identity: Arc<dyn IdentityLookup>,
    /// Open connections.
    active_connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server that logs results and trusts query names.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_collaborators(config, Arc::new(LogSink), Arc::new(QueryNameLookup))
    }

    /// Create a server with explicit history and identity backends.
    pub fn with_collaborators(
        config: ServerConfig,
        sink: Arc<dyn MatchSink>,
        identity: Arc<dyn IdentityLookup>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(RoomRegistry::new(config.session.clone(), sink));

        Self {
            config,
            registry,
            identity,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind to the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind the listener without serving yet.
    pub async fn bind(&self) -> Result<TcpListener, GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            "Pong arena server v{} listening on {}",
            self.config.version,
            listener.local_addr()?,
        );
        Ok(listener)
    }

    /// Accept connections on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let open = self.active_connections.load(Ordering::SeqCst);
                            if open >= self.config.max_connections {
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

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();
        let identity = self.identity.clone();
        let active = self.active_connections.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        active.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            if let Err(e) = Self::serve_connection(stream, addr, registry, identity, shutdown_rx).await {
                warn!("Connection {} ended with error: {}", addr, e);
            }
            active.fetch_sub(1, Ordering::SeqCst);
            info!("Client {} cleaned up", addr);
        });
    }

    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<RoomRegistry>,
        identity: Arc<dyn IdentityLookup>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let mut handshake = Handshake::default();
        let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let cookie = req.headers().get(COOKIE).and_then(|v| v.to_str().ok());
            handshake = Handshake::parse(req.uri().query(), cookie);
            Ok(response)
        };
        let mut ws_stream = accept_hdr_async(stream, callback).await?;

        let Some(code) = handshake.code.clone() else {
            info!("Rejecting {}: no room code", addr);
            ws_stream.close(Some(close_frame(CloseCode::Policy, REASON_MISSING_CODE))).await?;
            return Ok(());
        };
        let name = identity.display_name(&handshake).unwrap_or_else(anonymous_name);

        // A room torn down between lookup and join is replaced once
        let mut attempt = 0;
        let (session, outcome, mut msg_rx) = loop {
            let session = registry.get_or_create(&code).await;
            let (msg_tx, msg_rx) = mpsc::unbounded_channel::<ServerMessage>();
            let joined = session.write().await.join(addr, name.clone(), msg_tx);

            match joined {
                Ok(outcome) => break (session, outcome, msg_rx),
                Err(SessionError::RoomFull) => {
                    info!("Rejecting {} from room {}: full", addr, code);
                    ws_stream.close(Some(close_frame(CloseCode::Policy, REASON_ROOM_FULL))).await?;
                    return Ok(());
                }
                Err(SessionError::Closed) if attempt == 0 => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        };

        if outcome.paired {
            let driver = tokio::spawn(Self::run_room_loop(session.clone(), registry.clone(), code.clone()));
            session.write().await.attach_driver(driver);
        }

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        loop {
            tokio::select! {
                outbound = msg_rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            let text = match msg.to_json() {
                                Ok(t) => t,
                                Err(e) => {
                                    error!("Failed to serialize {}: {}", msg.kind(), e);
                                    continue;
                                }
                            };
                            if ws_sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Session dropped our channel
                            let reason = session.read().await.close_reason().unwrap_or(REASON_OPPONENT_LEFT);
                            send_close(&mut ws_sender, CloseCode::Away, reason).await;
                            break;
                        }
                    }
                }
                inbound = ws_receiver.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_client_message(addr, ClientMessage::from_json(&text), &session).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            Self::handle_client_message(addr, ClientMessage::from_slice(&data), &session).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    send_close(&mut ws_sender, CloseCode::Away, REASON_SHUTDOWN).await;
                    break;
                }
            }
        }

        // Cleanup
        let was_member = session.write().await.on_disconnect(addr);
        if was_member {
            registry.remove(&code, &session).await;
        }

        Ok(())
    }

    /// Forward an inbound frame to the session; anything unparseable is dropped.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: Result<ClientMessage, serde_json::Error>,
        session: &SessionHandle,
    ) {
        match msg {
            Ok(ClientMessage::Input(intent)) => {
                if let Err(e) = session.write().await.on_intent(addr, intent) {
                    debug!("Ignoring input from {}: {}", addr, e);
                }
            }
            Err(e) => {
                debug!("Invalid message from {}: {}", addr, e);
            }
        }
    }

    /// Tick a paired room until it ends, then dispose of it after the
    /// grace period.
    async fn run_room_loop(session: SessionHandle, registry: Arc<RoomRegistry>, code: String) {
        let (tick_interval, grace) = {
            let s = session.read().await;
            (s.config().tick_interval(), s.config().dispose_grace)
        };

        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match session.write().await.on_timer() {
                TickOutcome::Idle | TickOutcome::Ticked => {}
                TickOutcome::Ended => break,
                TickOutcome::Closed => return,
            }
        }

        tokio::time::sleep(grace).await;

        session.write().await.dispose();
        registry.remove(&code, &session).await;
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get open connection count.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Get live room count.
    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }

    /// The room registry.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn close_frame(code: CloseCode, reason: &'static str) -> CloseFrame<'static> {
    CloseFrame { code, reason: reason.into() }
}

async fn send_close(ws_sender: &mut WsSink, code: CloseCode, reason: &'static str) {
    if let Err(e) = ws_sender.send(Message::Close(Some(close_frame(code, reason)))).await {
        debug!("Close frame not delivered: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.session.tick_rate, 60);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config);

        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown_stops_serving() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = Arc::new(GameServer::new(config));
        let listener = server.bind().await.unwrap();

        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };
        // The signal is only seen once `serve` has subscribed
        for _ in 0..50 {
            server.shutdown();
            if serving.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), serving).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
