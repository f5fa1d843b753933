//! Renderer and observer for running without a display.
//!
//! [`HeadlessRenderer`] keeps chunk geometry statistics instead of GPU
//! buffers; [`LoggingObserver`] turns world notifications into log lines.

use tracing::{debug, info, warn};
use voxlink_net::PeerPositionEvent;
use voxlink_voxel::{ChunkCoordinate, ChunkGeometry, ChunkRenderer, Viewport, WorldSeed};

use crate::driver::WorldObserver;

/// What the headless renderer keeps per chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessChunk {
    /// Chunk the geometry belongs to.
    pub coordinate: ChunkCoordinate,
    /// Number of quads in the mesh.
    pub quads: usize,
}

/// A [`ChunkRenderer`] that only counts.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    built: u64,
    released: u64,
    shown: u64,
    hidden: u64,
    live_quads: usize,
}

impl HeadlessRenderer {
    /// Handles built and not yet released.
    pub fn live(&self) -> u64 {
        self.built - self.released
    }

    /// Total handles ever built.
    pub fn built(&self) -> u64 {
        self.built
    }

    /// Handles currently shown.
    pub fn shown(&self) -> u64 {
        self.shown - self.hidden
    }

    /// Quads held by live handles.
    pub fn live_quads(&self) -> usize {
        self.live_quads
    }
}

impl ChunkRenderer for HeadlessRenderer {
    type Handle = HeadlessChunk;

    fn build(&mut self, geometry: &ChunkGeometry) -> HeadlessChunk {
        self.built += 1;
        let quads = geometry.quad_count();
        self.live_quads += quads;
        HeadlessChunk {
            coordinate: geometry.coordinate,
            quads,
        }
    }

    fn show(&mut self, handle: &HeadlessChunk) {
        self.shown += 1;
        debug!("Showing chunk {} ({} quads)", handle.coordinate, handle.quads);
    }

    fn hide(&mut self, handle: &HeadlessChunk) {
        self.hidden += 1;
        debug!("Hiding chunk {}", handle.coordinate);
    }

    fn release(&mut self, handle: HeadlessChunk) {
        self.released += 1;
        self.live_quads -= handle.quads;
    }
}

/// Logs every world notification.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    peers: usize,
}

impl WorldObserver for LoggingObserver {
    fn on_viewport_changed(&mut self, viewport: Viewport) {
        debug!(
            "Streaming around chunk {} (render distance {})",
            viewport.center, viewport.render_distance
        );
    }

    fn on_seed_established(&mut self, seed: &WorldSeed) {
        info!("World seed: {}", seed);
    }

    fn on_authenticated(&mut self) {
        info!("Logged in");
    }

    fn on_login_failed(&mut self, reason: &str) {
        warn!("Login failed: {}", reason);
    }

    fn on_peer_joined(&mut self, token: &str) {
        self.peers += 1;
        info!("Player {} joined ({} online)", token, self.peers + 1);
    }

    fn on_peer_left(&mut self, token: &str) {
        self.peers = self.peers.saturating_sub(1);
        info!("Player {} left ({} online)", token, self.peers + 1);
    }

    fn on_peer_position(&mut self, event: &PeerPositionEvent) {
        debug!(
            "Player {} at ({:.1}, {:.1}, {:.1})",
            event.token, event.x, event.y, event.z
        );
    }

    fn on_chat(&mut self, user_name: &str, text: &str, _own: bool) {
        if user_name.is_empty() {
            info!("[server] {}", text);
        } else {
            info!("<{}> {}", user_name, text);
        }
    }

    fn on_notice(&mut self, text: &str) {
        warn!("{}", text);
    }
}
