//! Pong Arena Server
//!
//! Runs the WebSocket match server until Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pong_arena::{
    history::{BackgroundSink, JsonLinesSink, LogSink, MatchSink},
    network::{
        identity::{AuthConfig, IdentityLookup, JwtNameLookup, QueryNameLookup},
        session::SessionConfig,
        GameServer, ServerConfig,
    },
    TICK_RATE, VERSION,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative two-player Pong server")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PONG_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Maximum concurrent connections
    #[arg(long, env = "PONG_MAX_CONNECTIONS", default_value_t = 1000)]
    max_connections: usize,

    /// Append finished matches to this JSON Lines file instead of the log
    #[arg(long, env = "PONG_HISTORY_FILE")]
    history_file: Option<PathBuf>,

    /// Winning score
    #[arg(long, env = "PONG_WIN_SCORE", default_value_t = 5)]
    win_score: u32,

    /// Seconds a finished room keeps its code
    #[arg(long, env = "PONG_DISPOSE_GRACE_SECS", default_value_t = 10)]
    dispose_grace_secs: u64,

    /// HS256 secret for access token cookies
    #[arg(long, env = "PONG_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Expected token issuer
    #[arg(long, env = "PONG_JWT_ISSUER")]
    jwt_issuer: Option<String>,

    /// Expected token audience
    #[arg(long, env = "PONG_JWT_AUDIENCE")]
    jwt_audience: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Pong Arena Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let mut session = SessionConfig::default();
    session.match_config.win_score = args.win_score.max(1);
    session.dispose_grace = Duration::from_secs(args.dispose_grace_secs);

    let config = ServerConfig {
        bind_addr: args.bind,
        max_connections: args.max_connections,
        session,
        ..ServerConfig::default()
    };

    let sink: Arc<dyn MatchSink> = match &args.history_file {
        Some(path) => {
            info!("Recording matches to {}", path.display());
            let file = Arc::new(JsonLinesSink::new(path));
            Arc::new(BackgroundSink::spawn(file).context("failed to start history writer")?)
        }
        None => Arc::new(LogSink),
    };

    let auth = AuthConfig {
        issuer: args.jwt_issuer,
        audience: args.jwt_audience,
        secret: args.jwt_secret,
        ..AuthConfig::default()
    };
    let identity: Arc<dyn IdentityLookup> = if auth.is_configured() {
        info!("Access token names enabled");
        Arc::new(JwtNameLookup::new(&auth).context("invalid token configuration")?)
    } else {
        Arc::new(QueryNameLookup)
    };

    let server = Arc::new(GameServer::with_collaborators(config, sink, identity));
    let listener = server.bind().await.context("failed to bind listener")?;

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_server.shutdown();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.serve(listener).await.context("server stopped with an error")?;
    info!("Server stopped");
    Ok(())
}
