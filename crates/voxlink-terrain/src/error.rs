use voxlink_voxel::ChunkCoordinate;

/// Errors raised while generating chunks or starting the generator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The chunk lies outside the addressable world.
    #[error("chunk {0} is outside the world limits")]
    CoordinateOutOfLimits(ChunkCoordinate),

    /// Chunk edge length is zero or larger than supported.
    #[error("invalid chunk size {0}")]
    InvalidChunkSize(u32),

    /// Terrain parameters are inconsistent.
    #[error("invalid terrain parameters: {0}")]
    InvalidParams(&'static str),

    /// A generator thread could not be started.
    #[error("failed to spawn generator thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}
