//! Messages exchanged between the world driver and the chunk generator.

use std::sync::Arc;

use crate::coords::{ChunkCoordinate, Viewport};
use crate::geometry::ChunkGeometry;
use crate::seed::WorldSeed;

/// A command sent to the chunk generator.
#[derive(Clone, Debug, PartialEq)]
pub enum GeneratorRequest {
    /// Generate every chunk inside the viewport.
    Load(Viewport),
    /// The viewport moved or resized: generate what entered, drop what left.
    UpdateRange {
        /// Viewport the generator last served.
        old: Viewport,
        /// Viewport to serve now.
        new: Viewport,
    },
    /// Adopt a world seed before generating anything else.
    SetSeed(WorldSeed),
}

/// Whether a chunk became available or should be discarded.
#[derive(Clone, Debug)]
pub enum ChunkEventKind {
    /// Geometry for the chunk is ready.
    Add(Arc<ChunkGeometry>),
    /// The chunk left the viewport.
    Remove,
}

/// A per-chunk notification from the generator.
#[derive(Clone, Debug)]
pub struct ChunkEvent {
    /// Which chunk the event is about.
    pub coordinate: ChunkCoordinate,
    /// What happened to it.
    pub kind: ChunkEventKind,
}

impl ChunkEvent {
    /// An `add` event carrying ready geometry.
    pub fn add(geometry: ChunkGeometry) -> Self {
        Self {
            coordinate: geometry.coordinate,
            kind: ChunkEventKind::Add(Arc::new(geometry)),
        }
    }

    /// A `remove` event.
    pub fn remove(coordinate: ChunkCoordinate) -> Self {
        Self {
            coordinate,
            kind: ChunkEventKind::Remove,
        }
    }

    /// Returns `true` for `add` events.
    pub fn is_add(&self) -> bool {
        matches!(self.kind, ChunkEventKind::Add(_))
    }
}

/// Anything the generator reports back.
#[derive(Clone, Debug)]
pub enum GeneratorEvent {
    /// The generator had no seed and picked this one. Emitted before any
    /// chunk event that depends on it.
    SeedChosen(WorldSeed),
    /// A chunk was added or removed.
    Chunk(ChunkEvent),
}
