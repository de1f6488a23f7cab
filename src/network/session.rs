//! Match Session Management
//!
//! A session owns one room: its two participants, the authoritative
//! game state, the phase clock, and the handle of the task that ticks
//! it. The [`RoomRegistry`] maps room codes to live sessions.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::core::rng::{derive_room_seed, SeededRng};
use crate::game::input::PaddleIntent;
use crate::game::phase::MatchPhase;
use crate::game::state::{GameState, Side};
use crate::game::tick::{tick, MatchConfig};
use crate::history::{MatchRecord, MatchSink};
use crate::network::protocol::{GameOverInfo, InitInfo, ReadyInfo, ServerMessage};

/// Close reason sent to the survivor when the other side disconnects.
pub const REASON_OPPONENT_LEFT: &str = "Opponent left";

/// Close reason sent when a finished session is disposed.
pub const REASON_MATCH_FINISHED: &str = "Match finished";

/// Configuration for a match session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Physics constants.
    pub match_config: MatchConfig,
    /// Timer fires per second.
    pub tick_rate: u32,
    /// Hold between pairing and the first serve.
    pub countdown: Duration,
    /// Hold after each non-winning point.
    pub score_pause: Duration,
    /// How long a finished room keeps its code before disposal.
    pub dispose_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::default(),
            tick_rate: crate::TICK_RATE,
            countdown: Duration::from_secs(3),
            score_pause: Duration::from_millis(800),
            dispose_grace: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Interval between timer fires.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    /// Countdown length as announced in `ready`.
    pub fn countdown_secs(&self) -> u32 {
        self.countdown.as_secs_f64().ceil() as u32
    }
}

/// A connection seated in a session.
#[derive(Debug)]
pub struct Participant {
    /// Peer address, unique per connection.
    pub addr: SocketAddr,
    /// Display name.
    pub name: String,
    /// Paddle this participant controls.
    pub side: Side,
    /// Outbound message channel.
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Assigned side.
    pub side: Side,
    /// This join filled the room and started the countdown.
    pub paired: bool,
}

/// What a timer fire did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Ball not live, nothing simulated.
    Idle,
    /// One kernel step ran and was broadcast.
    Ticked,
    /// The match has been decided.
    Ended,
    /// The session was torn down.
    Closed,
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Both seats taken.
    #[error("Room full")]
    RoomFull,

    /// Session already torn down.
    #[error("Session closed")]
    Closed,

    /// Connection is not seated in this session.
    #[error("Not a participant")]
    NotParticipant,
}

/// One authoritative match.
pub struct MatchSession {
    /// Room code.
    code: String,
    /// Session configuration.
    config: SessionConfig,
    /// Seated connections, in arrival order.
    participants: Vec<Participant>,
    /// Authoritative state.
    state: GameState,
    /// Timed phase.
    phase: MatchPhase,
    /// Serve randomness.
    rng: SeededRng,
    /// Finished-match sink.
    sink: Arc<dyn MatchSink>,
    /// Tick driver, set once the room fills.
    driver: Option<JoinHandle<()>>,
    /// Set once the session is torn down.
    close_reason: Option<&'static str>,
    /// When the session was created.
    created_at: Instant,
}

impl MatchSession {
    /// Create an empty session.
    pub fn new(code: impl Into<String>, config: SessionConfig, seed: u64, sink: Arc<dyn MatchSink>) -> Self {
        let mut rng = SeededRng::new(seed);
        let state = GameState::new(&config.match_config, &mut rng);

        Self {
            code: code.into(),
            config,
            participants: Vec::with_capacity(2),
            state,
            phase: MatchPhase::Waiting,
            rng,
            sink,
            driver: None,
            close_reason: None,
            created_at: Instant::now(),
        }
    }

    /// Seat a connection.
    ///
    /// The first arrival plays left and gets an `init` straight away.
    /// The second plays right; both then get `init` followed by
    /// `ready`, and the countdown starts.
    pub fn join(
        &mut self,
        addr: SocketAddr,
        name: impl Into<String>,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<JoinOutcome, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let side = match self.participants.len() {
            0 => Side::Left,
            1 => Side::Right,
            _ => return Err(SessionError::RoomFull),
        };

        let participant = Participant { addr, name: name.into(), side, sender };
        info!("{} joined room {} as {}", participant.name, self.code, side);
        self.participants.push(participant);

        if side == Side::Left {
            let init = self.init_for(0);
            self.send_to(0, init);
            return Ok(JoinOutcome { side, paired: false });
        }

        for index in 0..self.participants.len() {
            let init = self.init_for(index);
            self.send_to(index, init);
        }
        for index in 0..self.participants.len() {
            let opponent = self.participants[1 - index].name.clone();
            self.send_to(index, ServerMessage::Ready(ReadyInfo {
                name_opponent: Some(opponent),
                countdown: self.config.countdown_secs(),
            }));
        }

        self.phase = MatchPhase::countdown(self.config.countdown, self.config.tick_rate);
        info!(
            "Room {} paired ({} vs {}), countdown {:?}",
            self.code, self.participants[0].name, self.participants[1].name, self.config.countdown,
        );

        Ok(JoinOutcome { side, paired: true })
    }

    /// Overwrite the held intent of `addr`'s paddle.
    pub fn on_intent(&mut self, addr: SocketAddr, intent: PaddleIntent) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let side = self.side_of(addr).ok_or(SessionError::NotParticipant)?;
        self.state.paddle_mut(side).set_intent(intent);
        Ok(())
    }

    /// Advance the phase clock by one timer fire.
    ///
    /// Returns true if the ball just went live.
    pub fn advance_clock(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        let went_live = self.phase.advance();
        if went_live {
            self.state.running = true;
            debug!("Room {} live", self.code);
        }
        went_live
    }

    /// Run one kernel step and broadcast the result.
    ///
    /// A no-op unless the ball is live.
    pub fn tick(&mut self) -> TickOutcome {
        if self.is_closed() {
            return TickOutcome::Closed;
        }
        if self.phase.is_ended() {
            return TickOutcome::Ended;
        }
        if !self.state.running {
            return TickOutcome::Idle;
        }

        let result = tick(&mut self.state, &self.config.match_config, &mut self.rng);
        self.broadcast(ServerMessage::State { state: self.state.clone() });

        if let Some(winner) = result.winner {
            self.finish(winner);
            return TickOutcome::Ended;
        }

        if let Some(scorer) = result.scored {
            debug!(
                "Room {}: {} scored ({}-{})",
                self.code, scorer, self.state.left_paddle.score, self.state.right_paddle.score,
            );
            self.phase = MatchPhase::scored_pause(self.config.score_pause, self.config.tick_rate);
        }

        TickOutcome::Ticked
    }

    /// One timer fire: clock, then kernel.
    pub fn on_timer(&mut self) -> TickOutcome {
        self.advance_clock();
        self.tick()
    }

    /// Broadcast the result and hand it to the sink, once.
    fn finish(&mut self, winner: Side) {
        self.phase = MatchPhase::Ended;
        self.state.running = false;

        let winner_name = self.name_of(winner).unwrap_or(winner.as_str()).to_string();
        let score1 = self.state.left_paddle.score;
        let score2 = self.state.right_paddle.score;

        self.broadcast(ServerMessage::GameOver(GameOverInfo {
            winner: winner_name.clone(),
            score1,
            score2,
        }));
        info!("Room {} finished: {} wins {}-{}", self.code, winner_name, score1, score2);

        let record = MatchRecord {
            player1: self.name_of(Side::Left).unwrap_or_default().to_string(),
            player2: self.name_of(Side::Right).unwrap_or_default().to_string(),
            winner: winner_name,
            score1,
            score2,
            finished_at: Utc::now(),
        };
        if let Err(e) = self.sink.record_match(&record) {
            error!("Failed to record result of room {}: {}", self.code, e);
        }
    }

    /// Remember the task ticking this session.
    pub fn attach_driver(&mut self, handle: JoinHandle<()>) {
        if self.is_closed() {
            handle.abort();
            return;
        }
        if let Some(previous) = self.driver.replace(handle) {
            previous.abort();
        }
    }

    /// Tear the session down because `addr` went away.
    ///
    /// Stops the driver and releases every participant's channel, so
    /// the other connection closes too. Returns true if `addr` was
    /// seated here.
    pub fn on_disconnect(&mut self, addr: SocketAddr) -> bool {
        let Some(side) = self.side_of(addr) else {
            return false;
        };

        info!("Participant {} ({}) left room {}", addr, side, self.code);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.close(REASON_OPPONENT_LEFT);
        true
    }

    /// Dispose of a finished session after its grace period.
    ///
    /// Called from the driver itself, so the driver is not aborted.
    pub fn dispose(&mut self) {
        if self.is_closed() {
            return;
        }
        info!("Disposing room {} after {:?}", self.code, self.created_at.elapsed());
        self.driver = None;
        self.close(REASON_MATCH_FINISHED);
    }

    fn close(&mut self, reason: &'static str) {
        self.participants.clear();
        self.state.running = false;
        if self.close_reason.is_none() {
            self.close_reason = Some(reason);
        }
    }

    /// Room code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Number of seated participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Is the session torn down?
    pub fn is_closed(&self) -> bool {
        self.close_reason.is_some()
    }

    /// Why the session was torn down.
    pub fn close_reason(&self) -> Option<&'static str> {
        self.close_reason
    }

    /// Side of a seated connection.
    pub fn side_of(&self, addr: SocketAddr) -> Option<Side> {
        self.participants.iter().find(|p| p.addr == addr).map(|p| p.side)
    }

    fn name_of(&self, side: Side) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.side == side)
            .map(|p| p.name.as_str())
    }

    fn init_for(&self, index: usize) -> ServerMessage {
        let me = &self.participants[index];
        ServerMessage::Init(InitInfo {
            side: me.side,
            name_you: me.name.clone(),
            name_opponent: self.name_of(me.side.opponent()).map(str::to_string),
            state: self.state.clone(),
        })
    }

    fn send_to(&self, index: usize, message: ServerMessage) {
        if let Some(participant) = self.participants.get(index) {
            if participant.sender.send(message).is_err() {
                debug!("Dropped message to {}: receiver gone", participant.addr);
            }
        }
    }

    /// Send a message to every participant.
    pub fn broadcast(&self, message: ServerMessage) {
        for participant in &self.participants {
            if participant.sender.send(message.clone()).is_err() {
                debug!("Dropped {} to {}: receiver gone", message.kind(), participant.addr);
            }
        }
    }
}

// =============================================================================
// ROOM REGISTRY
// =============================================================================

/// Shared handle to a session.
pub type SessionHandle = Arc<RwLock<MatchSession>>;

/// Maps room codes to live sessions.
///
/// At most one session exists per code. Locks are always taken
/// registry first, then session.
pub struct RoomRegistry {
    /// Active rooms.
    rooms: RwLock<BTreeMap<String, SessionHandle>>,
    /// Configuration for new sessions.
    config: SessionConfig,
    /// Sink handed to every session.
    sink: Arc<dyn MatchSink>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(config: SessionConfig, sink: Arc<dyn MatchSink>) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            config,
            sink,
        }
    }

    /// Return the session for `code`, creating an empty one if none is
    /// live.
    pub async fn get_or_create(&self, code: &str) -> SessionHandle {
        let mut rooms = self.rooms.write().await;

        if let Some(existing) = rooms.get(code) {
            if !existing.read().await.is_closed() {
                return Arc::clone(existing);
            }
        }

        let salt = Utc::now()
            .timestamp_nanos_opt()
            .map(|nanos| nanos as u64)
            .unwrap_or_default();
        let seed = derive_room_seed(code, salt);
        info!("Created room {} (seed {})", code, hex::encode(seed.to_be_bytes()));

        let session = Arc::new(RwLock::new(MatchSession::new(
            code,
            self.config.clone(),
            seed,
            Arc::clone(&self.sink),
        )));
        rooms.insert(code.to_string(), Arc::clone(&session));
        session
    }

    /// Drop the mapping for `code`, provided it still points at
    /// `session`. A newer session under the same code is left alone.
    pub async fn remove(&self, code: &str, session: &SessionHandle) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(code) {
            Some(current) if Arc::ptr_eq(current, session) => {
                rooms.remove(code);
                debug!("Removed room {}", code);
                true
            }
            _ => false,
        }
    }

    /// Number of mapped rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Configuration for new sessions.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
