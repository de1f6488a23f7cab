//! Client Predictor / Reconciler
//!
//! Mirrors the server's state on the client. The own paddle is moved
//! locally every frame from held intent; everything else comes from
//! server snapshots. The own paddle is only snapped back to the server
//! when the two drift further apart than a tolerance.
//!
//! One predictor serves either side: "mine" and "opponent's" are
//! resolved from the side assigned in `init`.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::game::input::PaddleIntent;
use crate::game::state::{GameState, Paddle, Side};
use crate::game::tick::MatchConfig;
use crate::network::protocol::{ClientMessage, GameOverInfo, InitInfo, ReadyInfo, ServerMessage};

/// Client-side tuning.
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Board and paddle dimensions.
    pub match_config: MatchConfig,
    /// Local paddle speed, in pixels per reference frame.
    pub local_paddle_speed: f64,
    /// Frame length `local_paddle_speed` is expressed against.
    pub reference_frame: Duration,
    /// Longest frame integrated in one step.
    pub max_frame_delta: Duration,
    /// Minimum gap between two intent sends.
    pub input_send_interval: Duration,
    /// Resend unchanged intent after this long.
    pub keep_alive_interval: Duration,
    /// Own-paddle drift tolerated before snapping to the server.
    pub correction_tolerance: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::default(),
            local_paddle_speed: 9.0,
            reference_frame: Duration::from_secs_f64(1.0 / 60.0),
            max_frame_delta: Duration::from_millis(40),
            input_send_interval: Duration::from_millis(50),
            keep_alive_interval: Duration::from_millis(250),
            correction_tolerance: 20.0,
        }
    }
}

/// Client view of the match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// No `init` yet.
    Idle,
    /// Seated, waiting for an opponent.
    Waiting,
    /// Opponent present, ball held.
    Countdown {
        /// Time left on the announced countdown
        remaining: Duration,
    },
    /// Ball in play (including short pauses after a point).
    Live,
    /// `gameOver` received. Terminal.
    Ended,
}

/// Local mirror of one match.
#[derive(Debug)]
pub struct Predictor {
    config: PredictorConfig,
    phase: ClientPhase,
    side: Option<Side>,
    name_you: Option<String>,
    name_opponent: Option<String>,
    state: Option<GameState>,
    intent: PaddleIntent,
    last_sent: Option<(PaddleIntent, Instant)>,
    result: Option<GameOverInfo>,
    corrections: u64,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl Predictor {
    /// Idle predictor.
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            phase: ClientPhase::Idle,
            side: None,
            name_you: None,
            name_opponent: None,
            state: None,
            intent: PaddleIntent::IDLE,
            last_sent: None,
            result: None,
            corrections: 0,
        }
    }

    /// Feed one server message.
    pub fn handle(&mut self, msg: ServerMessage) {
        if self.phase == ClientPhase::Ended {
            return;
        }
        match msg {
            ServerMessage::Init(info) => self.on_init(info),
            ServerMessage::Ready(info) => self.on_ready(info),
            ServerMessage::State { state } => self.on_state(state),
            ServerMessage::GameOver(info) => self.on_game_over(info),
        }
    }

    fn on_init(&mut self, info: InitInfo) {
        self.side = Some(info.side);
        self.name_you = Some(info.name_you);
        if info.name_opponent.is_some() {
            self.name_opponent = info.name_opponent;
        }
        let running = info.state.running;
        self.state = Some(info.state);

        self.phase = if running {
            ClientPhase::Live
        } else {
            match self.phase {
                ClientPhase::Idle | ClientPhase::Waiting => ClientPhase::Waiting,
                other => other,
            }
        };
    }

    fn on_ready(&mut self, info: ReadyInfo) {
        if info.name_opponent.is_some() {
            self.name_opponent = info.name_opponent;
        }
        if self.phase != ClientPhase::Live {
            self.phase = ClientPhase::Countdown {
                remaining: Duration::from_secs(u64::from(info.countdown)),
            };
        }
    }

    /// Merge an authoritative snapshot.
    ///
    /// Ball, flags and the opponent paddle are taken as-is. The own
    /// paddle keeps its predicted position unless the server disagrees
    /// by more than the tolerance.
    pub fn on_state(&mut self, snapshot: GameState) {
        if self.phase == ClientPhase::Ended {
            return;
        }
        if snapshot.running && matches!(self.phase, ClientPhase::Waiting | ClientPhase::Countdown { .. }) {
            self.phase = ClientPhase::Live;
        }

        let (Some(side), Some(local)) = (self.side, self.state.as_mut()) else {
            self.state = Some(snapshot);
            return;
        };

        local.ball = snapshot.ball.clone();
        local.running = snapshot.running;
        local.winner = snapshot.winner;
        *local.paddle_mut(side.opponent()) = snapshot.paddle(side.opponent()).clone();

        let server_paddle = snapshot.paddle(side);
        let own = local.paddle_mut(side);
        own.score = server_paddle.score;
        let drift = (server_paddle.y - own.y).abs();
        if drift > self.config.correction_tolerance {
            debug!("Correcting own paddle by {:.1}px", drift);
            own.y = server_paddle.y;
            self.corrections += 1;
        }
    }

    fn on_game_over(&mut self, info: GameOverInfo) {
        self.phase = ClientPhase::Ended;
        self.result = Some(info);
    }

    /// Replace the held intent.
    pub fn set_intent(&mut self, intent: PaddleIntent) {
        self.intent = intent;
    }

    /// Advance one render frame of `dt`.
    ///
    /// Runs the countdown and, while live, moves the own paddle.
    pub fn advance_frame(&mut self, dt: Duration) {
        let dt = dt.min(self.config.max_frame_delta);

        if let ClientPhase::Countdown { remaining } = self.phase {
            let remaining = remaining.saturating_sub(dt);
            self.phase = if remaining.is_zero() {
                ClientPhase::Live
            } else {
                ClientPhase::Countdown { remaining }
            };
            return;
        }

        if self.phase != ClientPhase::Live {
            return;
        }
        let (Some(side), Some(state)) = (self.side, self.state.as_mut()) else {
            return;
        };

        let direction = self.intent.direction();
        if direction == 0.0 {
            return;
        }

        let scale = dt.as_secs_f64() / self.config.reference_frame.as_secs_f64();
        let max_y = self.config.match_config.board_height - self.config.match_config.paddle_height;
        let paddle = state.paddle_mut(side);
        paddle.y = (paddle.y + direction * self.config.local_paddle_speed * scale).clamp(0.0, max_y);
    }

    /// Intent message to send now, if any.
    ///
    /// Changes go out at most once per send interval; unchanged intent
    /// is repeated once per keep-alive interval.
    pub fn poll_input(&mut self, now: Instant) -> Option<ClientMessage> {
        if !matches!(
            self.phase,
            ClientPhase::Waiting | ClientPhase::Countdown { .. } | ClientPhase::Live
        ) {
            return None;
        }

        let due = match self.last_sent {
            None => true,
            Some((sent, at)) => {
                let since = now.saturating_duration_since(at);
                (sent != self.intent && since >= self.config.input_send_interval)
                    || since >= self.config.keep_alive_interval
            }
        };
        if !due {
            return None;
        }

        self.last_sent = Some((self.intent, now));
        Some(ClientMessage::Input(self.intent))
    }

    /// Current phase.
    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// Assigned side.
    pub fn side(&self) -> Option<Side> {
        self.side
    }

    /// Own display name.
    pub fn name_you(&self) -> Option<&str> {
        self.name_you.as_deref()
    }

    /// Opponent's display name.
    pub fn name_opponent(&self) -> Option<&str> {
        self.name_opponent.as_deref()
    }

    /// Merged state, once `init` has arrived.
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Own paddle as rendered.
    pub fn own_paddle(&self) -> Option<&Paddle> {
        let side = self.side?;
        self.state.as_ref().map(|s| s.paddle(side))
    }

    /// Opponent paddle as last reported.
    pub fn opponent_paddle(&self) -> Option<&Paddle> {
        let side = self.side?;
        self.state.as_ref().map(|s| s.paddle(side.opponent()))
    }

    /// Final result, once `gameOver` has arrived.
    pub fn result(&self) -> Option<&GameOverInfo> {
        self.result.as_ref()
    }

    /// Number of times the own paddle was snapped to the server.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// Client configuration.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::SeededRng;

    fn server_state() -> GameState {
        GameState::new(&MatchConfig::default(), &mut SeededRng::new(11))
    }

    fn init(side: Side) -> ServerMessage {
        ServerMessage::Init(InitInfo {
            side,
            name_you: "me".to_string(),
            name_opponent: Some("them".to_string()),
            state: server_state(),
        })
    }

    fn live_predictor(side: Side) -> Predictor {
        let mut p = Predictor::default();
        p.handle(init(side));
        let mut snap = server_state();
        snap.running = true;
        p.handle(ServerMessage::State { state: snap });
        p
    }

    #[test]
    fn test_lifecycle() {
        let mut p = Predictor::default();
        assert_eq!(p.phase(), ClientPhase::Idle);

        p.handle(init(Side::Left));
        assert_eq!(p.phase(), ClientPhase::Waiting);
        assert_eq!(p.side(), Some(Side::Left));

        p.handle(ServerMessage::Ready(ReadyInfo { name_opponent: Some("them".into()), countdown: 3 }));
        assert_eq!(p.phase(), ClientPhase::Countdown { remaining: Duration::from_secs(3) });

        for _ in 0..75 {
            p.advance_frame(Duration::from_millis(40));
        }
        assert_eq!(p.phase(), ClientPhase::Live);

        p.handle(ServerMessage::GameOver(GameOverInfo { winner: "them".into(), score1: 2, score2: 5 }));
        assert_eq!(p.phase(), ClientPhase::Ended);
        assert_eq!(p.result().map(|r| r.score2), Some(5));
    }

    #[test]
    fn test_running_snapshot_ends_countdown() {
        let mut p = Predictor::default();
        p.handle(init(Side::Right));
        p.handle(ServerMessage::Ready(ReadyInfo { name_opponent: None, countdown: 3 }));

        let mut snap = server_state();
        snap.running = true;
        p.handle(ServerMessage::State { state: snap });

        assert_eq!(p.phase(), ClientPhase::Live);
        assert_eq!(p.name_opponent(), Some("them"));
    }

    #[test]
    fn test_local_paddle_moves_only_while_live() {
        let mut p = Predictor::default();
        p.handle(init(Side::Left));
        p.set_intent(PaddleIntent::new(false, true));

        p.advance_frame(Duration::from_millis(16));
        assert_eq!(p.own_paddle().map(|pd| pd.y), Some(160.0));

        let mut p = live_predictor(Side::Left);
        p.set_intent(PaddleIntent::new(false, true));
        p.advance_frame(Duration::from_secs_f64(1.0 / 60.0));
        let y = p.own_paddle().map(|pd| pd.y).unwrap();
        assert!((y - 169.0).abs() < 1e-9);
    }

    #[test]
    fn test_frame_delta_capped() {
        let mut p = live_predictor(Side::Right);
        p.set_intent(PaddleIntent::new(true, false));

        p.advance_frame(Duration::from_secs(5));

        // 40ms at 9px per 1/60s is 21.6px
        let y = p.own_paddle().map(|pd| pd.y).unwrap();
        assert!((y - (160.0 - 21.6)).abs() < 1e-6);
    }

    #[test]
    fn test_local_paddle_clamped() {
        let mut p = live_predictor(Side::Left);
        p.set_intent(PaddleIntent::new(true, false));

        for _ in 0..200 {
            p.advance_frame(Duration::from_millis(16));
        }
        assert_eq!(p.own_paddle().map(|pd| pd.y), Some(0.0));
    }

    #[test]
    fn test_small_drift_kept() {
        let mut p = live_predictor(Side::Left);
        p.set_intent(PaddleIntent::new(false, true));
        p.advance_frame(Duration::from_millis(16));
        let predicted = p.own_paddle().unwrap().y;

        let mut snap = server_state();
        snap.running = true;
        snap.left_paddle.y = predicted + 15.0;
        snap.left_paddle.score = 2;
        snap.right_paddle.y = 10.0;
        snap.ball.x = 123.0;
        p.on_state(snap);

        assert_eq!(p.own_paddle().unwrap().y, predicted);
        assert_eq!(p.own_paddle().unwrap().score, 2);
        assert_eq!(p.opponent_paddle().unwrap().y, 10.0);
        assert_eq!(p.state().unwrap().ball.x, 123.0);
        assert_eq!(p.corrections(), 0);
    }

    #[test]
    fn test_large_drift_corrected() {
        let mut p = live_predictor(Side::Right);

        let mut snap = server_state();
        snap.running = true;
        snap.right_paddle.y = 300.0;
        p.on_state(snap);

        assert_eq!(p.own_paddle().unwrap().y, 300.0);
        assert_eq!(p.corrections(), 1);
    }

    #[test]
    fn test_snapshots_ignored_after_game_over() {
        let mut p = live_predictor(Side::Left);
        p.handle(ServerMessage::GameOver(GameOverInfo { winner: "me".into(), score1: 5, score2: 0 }));
        let before = p.state().cloned();

        let mut snap = server_state();
        snap.ball.x = 1.0;
        p.handle(ServerMessage::State { state: snap });

        assert_eq!(p.state().cloned(), before);
    }

    #[test]
    fn test_input_rate_limit_and_keep_alive() {
        let mut p = Predictor::default();
        let t0 = Instant::now();

        // Nothing before init
        assert_eq!(p.poll_input(t0), None);

        p.handle(init(Side::Left));
        assert_eq!(p.poll_input(t0), Some(ClientMessage::Input(PaddleIntent::IDLE)));

        // Change inside the send interval waits
        p.set_intent(PaddleIntent::new(true, false));
        assert_eq!(p.poll_input(t0 + Duration::from_millis(20)), None);
        assert_eq!(
            p.poll_input(t0 + Duration::from_millis(50)),
            Some(ClientMessage::Input(PaddleIntent::new(true, false))),
        );

        // Unchanged intent is only repeated as a keep-alive
        assert_eq!(p.poll_input(t0 + Duration::from_millis(200)), None);
        assert_eq!(
            p.poll_input(t0 + Duration::from_millis(300)),
            Some(ClientMessage::Input(PaddleIntent::new(true, false))),
        );

        p.handle(ServerMessage::GameOver(GameOverInfo { winner: "me".into(), score1: 5, score2: 1 }));
        assert_eq!(p.poll_input(t0 + Duration::from_secs(10)), None);
    }
}
