//! Session coordination: host election, seed propagation, roster tracking
//! and position relay.
//!
//! [`SessionCoordinator`] is a synchronous state machine. The caller feeds it
//! transport notifications and inbound frames one at a time, then drains the
//! frames it wants sent and the [`SessionEvent`]s it raised. It never performs
//! I/O itself, so the tick loop is never blocked.
//!
//! ```text
//!   Disconnected ──connect──▶ Connecting ──open──▶ Unauthenticated ──token──▶ Authenticated
//!        ▲                                                │                        │
//!        └──────────────────── error / close ─────────────┴────────────────────────┘
//! ```

use std::collections::HashSet;

use tracing::{debug, info, warn};
use voxlink_voxel::WorldSeed;

use crate::protocol::{self, InboundFrame, InboundMessage, ProtocolError};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No transport.
    Disconnected,
    /// Transport requested, not yet open.
    Connecting,
    /// Transport open, login sent, no account token yet.
    Unauthenticated,
    /// Server accepted the login.
    Authenticated,
}

impl SessionPhase {
    /// Whether frames can be sent in this phase.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Authenticated)
    }
}

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Credentials were rejected before contacting the server.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    /// A frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// How to authenticate once the transport opens.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Login name and password.
    Password {
        /// Login name.
        login: String,
        /// Password.
        password: String,
    },
    /// Account token from an earlier session.
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { login, .. } => f
                .debug_struct("Password")
                .field("login", login)
                .finish_non_exhaustive(),
            Self::Token(_) => f.write_str("Token(..)"),
        }
    }
}

/// At least three consecutive ASCII word characters somewhere in `s`.
fn has_word_run(s: &str) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

impl Credentials {
    /// Reject credentials the server would never accept.
    pub fn validate(&self) -> Result<(), SessionError> {
        match self {
            Self::Password { login, password } => {
                if !has_word_run(login) {
                    return Err(SessionError::InvalidCredentials(
                        "login needs at least three letters, digits or underscores",
                    ));
                }
                if !has_word_run(password) {
                    return Err(SessionError::InvalidCredentials(
                        "password needs at least three letters, digits or underscores",
                    ));
                }
                Ok(())
            }
            Self::Token(token) if token.is_empty() => {
                Err(SessionError::InvalidCredentials("user token is empty"))
            }
            Self::Token(_) => Ok(()),
        }
    }
}

/// A remote peer's reported position.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerPositionEvent {
    /// Peer session token.
    pub token: String,
    /// World X.
    pub x: f64,
    /// World Y.
    pub y: f64,
    /// World Z.
    pub z: f64,
    /// Camera yaw.
    pub camera_angle: f64,
}

/// Notifications for the world driver and UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The server accepted the login.
    Authenticated,
    /// The server rejected the login.
    LoginFailed(String),
    /// The world seed is known; chunk streaming may start.
    SeedEstablished(WorldSeed),
    /// A remote peer joined.
    PeerJoined(String),
    /// A remote peer left.
    PeerLeft(String),
    /// A remote peer moved.
    PeerPosition(PeerPositionEvent),
    /// Player chat.
    Chat {
        /// Sender's display name.
        user_name: String,
        /// Message text.
        text: String,
        /// Whether this client sent it.
        own: bool,
    },
    /// Server chat.
    ServerChat(String),
    /// A system notice for the user, such as a dropped connection.
    Notice(String),
}

/// Everything the coordinator knows about the current session.
#[derive(Debug, Default)]
struct SessionState {
    local_token: Option<String>,
    user_token: Option<String>,
    user_name: Option<String>,
    is_host: bool,
    world_seed: Option<WorldSeed>,
    known_peers: HashSet<String>,
    roster_size: Option<u32>,
}

/// Drives one multiplayer session.
pub struct SessionCoordinator {
    phase: SessionPhase,
    credentials: Option<Credentials>,
    state: SessionState,
    outbound: Vec<String>,
    events: Vec<SessionEvent>,
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCoordinator {
    /// A coordinator with no session.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            credentials: None,
            state: SessionState::default(),
            outbound: Vec::new(),
            events: Vec::new(),
        }
    }

    // --- Transport notifications ---

    /// Start a new session. Any previous session state is discarded; the
    /// caller opens the transport and reports back via
    /// [`on_transport_open`](Self::on_transport_open).
    pub fn connect(&mut self, credentials: Credentials) -> Result<(), SessionError> {
        credentials.validate()?;
        self.state = SessionState::default();
        self.outbound.clear();
        self.credentials = Some(credentials);
        self.phase = SessionPhase::Connecting;
        debug!("Session connecting");
        Ok(())
    }

    /// The transport is open: send the login request.
    pub fn on_transport_open(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Connecting {
            warn!("Transport opened in phase {:?}, ignoring", self.phase);
            return Ok(());
        }
        self.phase = SessionPhase::Unauthenticated;
        let login = match &self.credentials {
            Some(Credentials::Password { login, password }) => {
                protocol::encode_password_login(login, password)?
            }
            Some(Credentials::Token(token)) => protocol::encode_token_login(token)?,
            None => return Ok(()),
        };
        self.outbound.push(login);
        info!("Session transport open, login sent");
        Ok(())
    }

    /// The transport failed.
    pub fn on_transport_error(&mut self) {
        self.drop_session("connection error");
    }

    /// The transport closed.
    pub fn on_transport_closed(&mut self) {
        self.drop_session("connection closed");
    }

    /// User-initiated disconnect. Raises no notice.
    pub fn disconnect(&mut self) {
        self.phase = SessionPhase::Disconnected;
        self.outbound.clear();
    }

    fn drop_session(&mut self, notice: &str) {
        if self.phase == SessionPhase::Disconnected {
            return;
        }
        warn!("Session lost: {}", notice);
        self.phase = SessionPhase::Disconnected;
        self.outbound.clear();
        self.events.push(SessionEvent::Notice(notice.to_string()));
    }

    // --- Inbound ---

    /// Apply one inbound frame. Malformed frames are ignored.
    pub fn handle_frame(&mut self, raw: &str) -> Result<(), SessionError> {
        if !self.phase.is_connected() {
            debug!("Dropping frame received while {:?}", self.phase);
            return Ok(());
        }
        let frame = match InboundFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Ignoring malformed frame: {}", e);
                return Ok(());
            }
        };
        for message in frame.messages() {
            self.apply(message)?;
        }
        Ok(())
    }

    fn apply(&mut self, message: InboundMessage) -> Result<(), SessionError> {
        match message {
            InboundMessage::WsToken(token) => {
                debug!("Session token assigned");
                self.state.local_token = Some(token);
            }
            InboundMessage::UserToken(token) => {
                self.state.user_token = Some(token);
                if self.phase == SessionPhase::Unauthenticated {
                    self.phase = SessionPhase::Authenticated;
                    info!("Login accepted");
                    self.events.push(SessionEvent::Authenticated);
                }
            }
            InboundMessage::LoginFailed(reason) => {
                warn!("Login rejected: {}", reason);
                self.events.push(SessionEvent::LoginFailed(reason));
            }
            InboundMessage::PeersJoined(tokens) => {
                for token in tokens {
                    if self.is_local(&token) || self.state.known_peers.contains(&token) {
                        continue;
                    }
                    info!("Peer {} joined", token);
                    self.state.known_peers.insert(token.clone());
                    self.events.push(SessionEvent::PeerJoined(token));
                }
            }
            InboundMessage::PeerLeft(token) => {
                if !self.is_local(&token) && self.state.known_peers.remove(&token) {
                    info!("Peer {} left", token);
                    self.events.push(SessionEvent::PeerLeft(token));
                }
            }
            InboundMessage::RosterSize(size) => {
                self.state.roster_size = Some(size);
                if size == 1 {
                    self.elect_self();
                }
                if self.state.is_host
                    && let Some(seed) = &self.state.world_seed
                {
                    let frame = protocol::encode_seed(seed.as_str())?;
                    self.outbound.push(frame);
                }
            }
            InboundMessage::Seed(raw) => self.adopt_seed(&raw),
            InboundMessage::UserName(name) => {
                self.state.user_name = Some(name);
            }
            InboundMessage::PeerPosition {
                token,
                x,
                z,
                y,
                camera_angle,
            } => {
                if !self.is_local(&token) {
                    self.events.push(SessionEvent::PeerPosition(PeerPositionEvent {
                        token,
                        x,
                        y,
                        z,
                        camera_angle,
                    }));
                }
            }
            InboundMessage::Chat {
                user_name,
                text,
                ws_token,
            } => {
                let own = ws_token.as_deref().is_some_and(|t| self.is_local(t));
                self.events.push(SessionEvent::Chat {
                    user_name,
                    text,
                    own,
                });
            }
            InboundMessage::ServerChat(text) => {
                self.events.push(SessionEvent::ServerChat(text));
            }
        }
        Ok(())
    }

    fn is_local(&self, token: &str) -> bool {
        self.state.local_token.as_deref() == Some(token)
    }

    /// Alone in the session: become host with a fresh seed. A peer that is
    /// already host keeps its seed.
    fn elect_self(&mut self) {
        if self.state.is_host {
            return;
        }
        self.state.is_host = true;
        let seed = WorldSeed::random();
        match &self.state.world_seed {
            Some(previous) => info!("Elected host, world seed {} replaces {}", seed, previous),
            None => info!("Elected host, world seed {}", seed),
        }
        self.state.world_seed = Some(seed.clone());
        self.events.push(SessionEvent::SeedEstablished(seed));
    }

    fn adopt_seed(&mut self, raw: &str) {
        if self.state.is_host {
            debug!("Host ignoring incoming seed");
            return;
        }
        let seed = match WorldSeed::parse(raw) {
            Ok(seed) => seed,
            Err(e) => {
                debug!("Ignoring seed: {}", e);
                return;
            }
        };
        if self.state.world_seed.as_ref() == Some(&seed) {
            return;
        }
        info!("Adopted world seed {}", seed);
        self.state.world_seed = Some(seed.clone());
        self.events.push(SessionEvent::SeedEstablished(seed));
    }

    // --- Outbound ---

    /// Queue a position update. Returns `Ok(false)` if not connected.
    pub fn broadcast_position(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        camera_angle: f64,
    ) -> Result<bool, SessionError> {
        if !self.phase.is_connected() {
            return Ok(false);
        }
        let token = self.state.local_token.as_deref().unwrap_or_default();
        let frame = protocol::encode_position(token, x, y, z, camera_angle)?;
        self.outbound.push(frame);
        Ok(true)
    }

    /// Queue a chat line. Returns `Ok(false)` if not connected.
    pub fn send_chat(&mut self, text: &str) -> Result<bool, SessionError> {
        if !self.phase.is_connected() {
            return Ok(false);
        }
        let frame = protocol::encode_chat(
            self.state.user_name.as_deref().unwrap_or_default(),
            self.state.local_token.as_deref().unwrap_or_default(),
            text,
        )?;
        self.outbound.push(frame);
        Ok(true)
    }

    /// Take the frames queued for sending.
    pub fn drain_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }

    /// Take the events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Queries ---

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether this peer originates the world seed.
    pub fn is_host(&self) -> bool {
        self.state.is_host
    }

    /// The authoritative world seed, once known.
    pub fn world_seed(&self) -> Option<&WorldSeed> {
        self.state.world_seed.as_ref()
    }

    /// Session token assigned by the server.
    pub fn local_token(&self) -> Option<&str> {
        self.state.local_token.as_deref()
    }

    /// Account token received on successful login.
    pub fn user_token(&self) -> Option<&str> {
        self.state.user_token.as_deref()
    }

    /// Display name assigned by the server.
    pub fn user_name(&self) -> Option<&str> {
        self.state.user_name.as_deref()
    }

    /// Last roster size reported by the server.
    pub fn roster_size(&self) -> Option<u32> {
        self.state.roster_size
    }

    /// Whether `token` is a known remote peer.
    pub fn knows_peer(&self, token: &str) -> bool {
        self.state.known_peers.contains(token)
    }

    /// Remote peers, in no particular order.
    pub fn known_peers(&self) -> impl Iterator<Item = &str> {
        self.state.known_peers.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
