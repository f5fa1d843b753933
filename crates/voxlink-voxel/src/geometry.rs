//! Chunk mesh data produced by the generator and consumed by the renderer.
//!
//! Vertices are plain-old-data so that two peers can compare generated
//! geometry byte for byte via [`ChunkGeometry::as_bytes`].

use bytemuck::{Pod, Zeroable};

use crate::coords::ChunkCoordinate;

/// Number of tiles along the U axis of the terrain texture atlas.
pub const ATLAS_TILES: u32 = 8;

/// One of the six cardinal directions a block face can point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaceDirection {
    /// +X direction.
    PosX = 0,
    /// −X direction.
    NegX = 1,
    /// +Y direction.
    PosY = 2,
    /// −Y direction.
    NegY = 3,
    /// +Z direction.
    PosZ = 4,
    /// −Z direction.
    NegZ = 5,
}

impl FaceDirection {
    /// The four horizontal directions, used for column side faces.
    pub const HORIZONTAL: [FaceDirection; 4] = [Self::PosX, Self::NegX, Self::PosZ, Self::NegZ];

    /// Returns `(layer_axis, u_axis, v_axis)`; each value is 0=X, 1=Y, 2=Z.
    ///
    /// `layer_axis` is perpendicular to the face, `u_axis` and `v_axis` span it.
    pub fn sweep_axes(self) -> (usize, usize, usize) {
        match self {
            Self::PosX | Self::NegX => (0, 2, 1), // layer=X, u=Z, v=Y
            Self::PosY | Self::NegY => (1, 0, 2), // layer=Y, u=X, v=Z
            Self::PosZ | Self::NegZ => (2, 0, 1), // layer=Z, u=X, v=Y
        }
    }

    /// Unit normal.
    pub fn normal(self) -> [f32; 3] {
        match self {
            Self::PosX => [1.0, 0.0, 0.0],
            Self::NegX => [-1.0, 0.0, 0.0],
            Self::PosY => [0.0, 1.0, 0.0],
            Self::NegY => [0.0, -1.0, 0.0],
            Self::PosZ => [0.0, 0.0, 1.0],
            Self::NegZ => [0.0, 0.0, -1.0],
        }
    }

    /// Horizontal neighbor offset `(dx, dz)`; zero for vertical faces.
    pub fn horizontal_offset(self) -> (i32, i32) {
        match self {
            Self::PosX => (1, 0),
            Self::NegX => (-1, 0),
            Self::PosZ => (0, 1),
            Self::NegZ => (0, -1),
            Self::PosY | Self::NegY => (0, 0),
        }
    }

    /// Baked directional light factor, standing in for per-vertex colors.
    pub fn shade(self) -> f32 {
        match self {
            Self::PosY => 1.0,
            Self::NegY => 0.5,
            Self::PosX | Self::NegX => 0.8,
            Self::PosZ | Self::NegZ => 0.65,
        }
    }

    fn is_positive(self) -> bool {
        matches!(self, Self::PosX | Self::PosY | Self::PosZ)
    }
}

/// Surface material of a block face; the discriminant is its atlas tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Material {
    /// Beach and lake-bed sand.
    Sand = 0,
    /// Grass-topped soil.
    Grass = 1,
    /// Soil below the grass line.
    Dirt = 2,
    /// Bedrock and cliffs.
    Stone = 3,
    /// Mountain caps.
    Snow = 4,
}

impl Material {
    /// Atlas tile index used for texture coordinates.
    pub fn atlas_tile(self) -> u32 {
        self as u32
    }
}

/// A single vertex of a chunk mesh, in chunk-local block units.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Position relative to the chunk's minimum corner.
    pub position: [f32; 3],
    /// Face normal.
    pub normal: [f32; 3],
    /// Atlas texture coordinates.
    pub uv: [f32; 2],
    /// Baked light factor in `[0, 1]`.
    pub shade: f32,
    /// [`Material`] discriminant.
    pub material: u32,
}

/// Mesh geometry for one chunk, ready for a renderer to upload.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkGeometry {
    /// The chunk this geometry belongs to.
    pub coordinate: ChunkCoordinate,
    /// Vertex buffer.
    pub vertices: Vec<TerrainVertex>,
    /// Index buffer (triangles, 3 indices per triangle).
    pub indices: Vec<u32>,
}

impl ChunkGeometry {
    /// Creates empty geometry for `coordinate`.
    pub fn new(coordinate: ChunkCoordinate) -> Self {
        Self {
            coordinate,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Pushes a single quad.
    ///
    /// `layer`, `u`, `v` are in chunk-local block coordinates along the axes
    /// returned by [`FaceDirection::sweep_axes`]; `w` and `h` are the quad
    /// extents along `u` and `v`.
    #[allow(clippy::too_many_arguments)]
    pub fn push_quad(
        &mut self,
        direction: FaceDirection,
        layer: usize,
        u: usize,
        v: usize,
        w: usize,
        h: usize,
        material: Material,
    ) {
        let (layer_axis, u_axis, v_axis) = direction.sweep_axes();
        let normal = direction.normal();
        let shade = direction.shade();

        // Positive faces sit on the far side of the block.
        let layer_pos = if direction.is_positive() {
            layer as f32 + 1.0
        } else {
            layer as f32
        };

        let corners = [
            (u as f32, v as f32),
            (u as f32 + w as f32, v as f32),
            (u as f32 + w as f32, v as f32 + h as f32),
            (u as f32, v as f32 + h as f32),
        ];
        let tile = material.atlas_tile() as f32;
        let tiles = ATLAS_TILES as f32;
        let uvs = [
            [tile / tiles, 0.0],
            [(tile + 1.0) / tiles, 0.0],
            [(tile + 1.0) / tiles, 1.0],
            [tile / tiles, 1.0],
        ];

        let base = self.vertices.len() as u32;

        for (i, &(cu, cv)) in corners.iter().enumerate() {
            let mut pos = [0.0_f32; 3];
            pos[layer_axis] = layer_pos;
            pos[u_axis] = cu;
            pos[v_axis] = cv;

            self.vertices.push(TerrainVertex {
                position: pos,
                normal,
                uv: uvs[i],
                shade,
                material: material as u32,
            });
        }

        if direction.is_positive() {
            self.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        } else {
            self.indices
                .extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        }
    }

    /// Number of quads in the mesh.
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Returns `true` if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex bytes followed by index bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);
        let mut out = Vec::with_capacity(vertex_bytes.len() + index_bytes.len());
        out.extend_from_slice(vertex_bytes);
        out.extend_from_slice(index_bytes);
        out
    }
}

const _: () = assert!(
    std::mem::size_of::<TerrainVertex>() == 40,
    "TerrainVertex must stay padding-free"
);

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> ChunkGeometry {
        ChunkGeometry::new(ChunkCoordinate::new(0, 0))
    }

    #[test]
    fn test_push_quad_adds_four_vertices_six_indices() {
        let mut g = geometry();
        g.push_quad(FaceDirection::PosY, 3, 1, 2, 1, 1, Material::Grass);
        assert_eq!(g.vertices.len(), 4);
        assert_eq!(g.indices.len(), 6);
        assert_eq!(g.quad_count(), 1);
    }

    #[test]
    fn test_top_face_sits_above_block() {
        let mut g = geometry();
        g.push_quad(FaceDirection::PosY, 3, 1, 2, 1, 1, Material::Grass);
        assert!(g.vertices.iter().all(|v| v.position[1] == 4.0));
        assert!(g.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
        assert_eq!(g.vertices[0].position, [1.0, 4.0, 2.0]);
        assert_eq!(g.vertices[2].position, [2.0, 4.0, 3.0]);
    }

    #[test]
    fn test_negative_face_reverses_winding() {
        let mut pos = geometry();
        let mut neg = geometry();
        pos.push_quad(FaceDirection::PosX, 0, 0, 0, 1, 1, Material::Stone);
        neg.push_quad(FaceDirection::NegX, 0, 0, 0, 1, 1, Material::Stone);
        assert_eq!(pos.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(neg.indices, vec![0, 2, 1, 0, 3, 2]);
        assert!(neg.vertices.iter().all(|v| v.position[0] == 0.0));
        assert!(pos.vertices.iter().all(|v| v.position[0] == 1.0));
    }

    #[test]
    fn test_uvs_select_atlas_tile() {
        let mut g = geometry();
        g.push_quad(FaceDirection::PosY, 0, 0, 0, 1, 1, Material::Stone);
        let tile = Material::Stone.atlas_tile() as f32 / ATLAS_TILES as f32;
        assert_eq!(g.vertices[0].uv, [tile, 0.0]);
        assert_eq!(g.vertices[0].material, Material::Stone as u32);
    }

    #[test]
    fn test_as_bytes_length() {
        let mut g = geometry();
        g.push_quad(FaceDirection::PosZ, 1, 0, 0, 1, 2, Material::Dirt);
        assert_eq!(g.as_bytes().len(), 4 * 40 + 6 * 4);
        assert!(geometry().as_bytes().is_empty());
    }
}
