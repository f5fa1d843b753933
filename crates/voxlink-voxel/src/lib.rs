//! Chunk addressing, world seeds, chunk geometry, the generator message
//! protocol, and the chunk lifecycle manager that reconciles asynchronous
//! generator results into a visible set.

pub mod coords;
pub mod events;
pub mod geometry;
pub mod lifecycle;
pub mod seed;

pub use coords::{ChunkCoordinate, MAX_CHUNK_COORDINATE, MAX_RENDER_DISTANCE, Viewport};
pub use events::{ChunkEvent, ChunkEventKind, GeneratorEvent, GeneratorRequest};
pub use geometry::{ATLAS_TILES, ChunkGeometry, FaceDirection, Material, TerrainVertex};
pub use lifecycle::{
    ChunkLifecycleManager, ChunkRecord, ChunkRenderer, ChunkState, LifecycleError,
};
pub use seed::{SeedError, WorldSeed};
