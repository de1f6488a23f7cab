//! Pong Bot
//!
//! Headless client that joins a room and tracks the ball with its paddle.
//! Useful as a sparring partner and for smoke-testing a deployment.

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pong_arena::client::{ClientEvent, ClientPhase, MatchClient, Predictor};
use pong_arena::game::input::PaddleIntent;
use pong_arena::network::protocol::ServerMessage;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless Pong opponent")]
struct Args {
    /// Server URL
    #[arg(short, long, env = "PONG_SERVER_URL", default_value = "ws://127.0.0.1:8080/")]
    server: String,

    /// Room code to join
    #[arg(short, long)]
    code: String,

    /// Display name
    #[arg(short, long, default_value = "Bot")]
    name: String,

    /// Ignore the ball while it is this close to the paddle centre
    #[arg(long, default_value_t = 10.0)]
    deadband: f64,
}

/// Intent that steers the paddle centre towards the ball.
fn steer(predictor: &Predictor, deadband: f64) -> PaddleIntent {
    let config = &predictor.config().match_config;
    let (Some(state), Some(paddle)) = (predictor.state(), predictor.own_paddle()) else {
        return PaddleIntent::IDLE;
    };

    let offset = state.ball.center_y(config) - paddle.center_y(config);
    if offset < -deadband {
        PaddleIntent::new(true, false)
    } else if offset > deadband {
        PaddleIntent::new(false, true)
    } else {
        PaddleIntent::IDLE
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut client = MatchClient::connect(&args.server, &args.code, Some(&args.name))
        .await
        .context("failed to connect")?;
    info!("Joined room {} as {}", args.code, args.name);

    let mut predictor = Predictor::default();
    let mut frame = tokio::time::interval(Duration::from_millis(16));
    let mut last_frame = Instant::now();

    loop {
        frame.tick().await;

        while let Some(event) = client.try_recv() {
            match event {
                ClientEvent::Message(msg) => {
                    if let ServerMessage::Ready(ready) = &msg {
                        info!(
                            "Opponent {} found, starting in {}s",
                            ready.name_opponent.as_deref().unwrap_or("?"),
                            ready.countdown,
                        );
                    }
                    predictor.handle(msg);
                }
                ClientEvent::Closed { code, reason } => {
                    info!("Connection closed ({}): {}", code, reason);
                    return Ok(());
                }
            }
        }

        if predictor.phase() == ClientPhase::Ended {
            if let Some(result) = predictor.result() {
                info!("Game over, winner {} ({} - {})", result.winner, result.score1, result.score2);
            }
            client.close().await;
            return Ok(());
        }

        let now = Instant::now();
        predictor.set_intent(steer(&predictor, args.deadband));
        predictor.advance_frame(now - last_frame);
        last_frame = now;

        if let Some(msg) = predictor.poll_input(now) {
            debug!("Sending {:?}", msg);
            client.send(msg).context("connection lost")?;
        }
    }
}
