//! voxlink client orchestration.
//!
//! Provides the world driver that ties chunk streaming to the multiplayer
//! session, the fixed-timestep loop that ticks it, and the headless
//! renderer/observer used by the binary.

pub mod driver;
pub mod game_loop;
pub mod headless;

pub use driver::{
    BroadcastThrottle, DriverError, DriverSettings, PlayerPose, SessionTransport, WorldDriver,
    WorldObserver,
};
pub use game_loop::{FIXED_DT, GameLoop, MAX_FRAME_TIME};
pub use headless::{HeadlessChunk, HeadlessRenderer, LoggingObserver};
