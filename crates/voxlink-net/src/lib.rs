//! Multiplayer session plumbing: text framing over TCP, the JSON wire
//! protocol, the session coordinator state machine, and the background
//! transport that feeds it.

pub mod client;
pub mod framing;
pub mod protocol;
pub mod session;

pub use client::{ConnectionState, ConnectionStateWatch, SessionLink, TransportError, TransportEvent};
pub use framing::{FrameConfig, FrameError, read_text_frame, write_text_frame};
pub use protocol::{InboundFrame, InboundMessage, ProtocolError};
pub use session::{
    Credentials, PeerPositionEvent, SessionCoordinator, SessionError, SessionEvent, SessionPhase,
};
