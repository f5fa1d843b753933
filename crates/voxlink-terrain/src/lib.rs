//! Procedural terrain: seeded column-height noise, chunk meshing, and the
//! background chunk generator that answers viewport requests.

mod error;
mod generator;
mod height;
mod mesher;

pub use error::GenerationError;
pub use generator::{ChunkGenerator, GeneratorSettings};
pub use height::{
    FixedPoint64, MAX_TERRAIN_HEIGHT, TerrainNoise, TerrainParams, fbm_fixed_point,
};
pub use mesher::{MAX_CHUNK_SIZE, mesh_chunk};
