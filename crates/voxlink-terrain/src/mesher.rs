//! Heightfield chunk meshing.
//!
//! Each column gets a top quad. A side quad is emitted for every block of a
//! column that rises above its horizontal neighbor; neighbors across the
//! chunk border are sampled from the noise so adjacent chunks meet without
//! gaps.

use voxlink_voxel::{ChunkCoordinate, ChunkGeometry, FaceDirection};

use crate::error::GenerationError;
use crate::height::TerrainNoise;

/// Largest chunk edge length the mesher accepts, in blocks.
pub const MAX_CHUNK_SIZE: u32 = 64;

/// Build the mesh for one chunk. Identical noise seed, coordinate and size
/// always produce identical geometry.
pub fn mesh_chunk(
    noise: &TerrainNoise,
    coordinate: ChunkCoordinate,
    chunk_size: u32,
) -> Result<ChunkGeometry, GenerationError> {
    if !coordinate.is_within_limits() {
        return Err(GenerationError::CoordinateOutOfLimits(coordinate));
    }
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(GenerationError::InvalidChunkSize(chunk_size));
    }

    let size = chunk_size as usize;
    let padded = size + 2;
    let base_x = i64::from(coordinate.x) * i64::from(chunk_size);
    let base_z = i64::from(coordinate.z) * i64::from(chunk_size);

    // Heights with a one-column border on every side.
    let mut heights = vec![0_u32; padded * padded];
    for pz in 0..padded {
        for px in 0..padded {
            heights[pz * padded + px] = noise.height(base_x + px as i64 - 1, base_z + pz as i64 - 1);
        }
    }
    let height_at = |lx: i64, lz: i64| heights[(lz + 1) as usize * padded + (lx + 1) as usize];

    let mut geometry = ChunkGeometry::new(coordinate);

    for lz in 0..size {
        for lx in 0..size {
            let h = height_at(lx as i64, lz as i64);
            geometry.push_quad(
                FaceDirection::PosY,
                (h - 1) as usize,
                lx,
                lz,
                1,
                1,
                noise.material(h, h - 1),
            );

            for direction in FaceDirection::HORIZONTAL {
                let (dx, dz) = direction.horizontal_offset();
                let neighbor = height_at(lx as i64 + i64::from(dx), lz as i64 + i64::from(dz));
                let (layer, u) = match direction {
                    FaceDirection::PosX | FaceDirection::NegX => (lx, lz),
                    _ => (lz, lx),
                };
                for y in neighbor..h {
                    geometry.push_quad(direction, layer, u, y as usize, 1, 1, noise.material(h, y));
                }
            }
        }
    }

    Ok(geometry)
}
