//! Chunk-grid addressing and square render viewports.

use std::fmt;

/// Largest absolute chunk coordinate the world accepts on either axis.
///
/// Requests outside `[-MAX_CHUNK_COORDINATE, MAX_CHUNK_COORDINATE]` are
/// treated as malformed and ignored by the generator.
pub const MAX_CHUNK_COORDINATE: i32 = 1 << 20;

/// Largest render distance a [`Viewport`] will hold.
pub const MAX_RENDER_DISTANCE: u32 = 64;

/// Identifies a fixed-size terrain tile on the horizontal chunk grid.
///
/// Equality and hashing are by value; this is the key space for all chunk
/// state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoordinate {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the continuous world position `(x, z)`.
    ///
    /// Uses floor division so that `-0.5` lands in chunk `-1`, not `0`.
    /// Returns `None` for non-finite positions, a non-positive chunk span,
    /// or positions whose chunk index does not fit in `i32`.
    pub fn from_world(x: f64, z: f64, chunk_size: u32, block_scale: f64) -> Option<Self> {
        let span = f64::from(chunk_size) * block_scale;
        if !span.is_finite() || span <= 0.0 {
            return None;
        }
        Some(Self {
            x: floor_to_i32(x / span)?,
            z: floor_to_i32(z / span)?,
        })
    }

    /// World-space position of this chunk's minimum corner `(x, z)`.
    pub fn origin(self, chunk_size: u32, block_scale: f64) -> (f64, f64) {
        let span = f64::from(chunk_size) * block_scale;
        (f64::from(self.x) * span, f64::from(self.z) * span)
    }

    /// Returns the coordinate offset by `(dx, dz)`, or `None` on overflow.
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// Chebyshev (square-box) distance between two coordinates.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        dx.max(dz).min(u64::from(u32::MAX)) as u32
    }

    /// Whether both axes lie within [`MAX_CHUNK_COORDINATE`].
    pub fn is_within_limits(self) -> bool {
        self.x.unsigned_abs() <= MAX_CHUNK_COORDINATE as u32
            && self.z.unsigned_abs() <= MAX_CHUNK_COORDINATE as u32
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.z)
    }
}

fn floor_to_i32(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let floored = value.floor();
    if floored < f64::from(i32::MIN) || floored > f64::from(i32::MAX) {
        return None;
    }
    Some(floored as i32)
}

/// The square box of chunks that should be visible around a center chunk.
///
/// A chunk is inside when its Chebyshev distance to `center` is at most
/// `render_distance`, giving `(2 * render_distance + 1)^2` chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    /// Chunk the player currently stands in.
    pub center: ChunkCoordinate,
    /// Chunks kept visible in each direction.
    pub render_distance: u32,
}

impl Viewport {
    /// Creates a viewport. `render_distance` is clamped to
    /// [`MAX_RENDER_DISTANCE`].
    pub const fn new(center: ChunkCoordinate, render_distance: u32) -> Self {
        let render_distance = if render_distance > MAX_RENDER_DISTANCE {
            MAX_RENDER_DISTANCE
        } else {
            render_distance
        };
        Self {
            center,
            render_distance,
        }
    }

    /// Whether `coordinate` lies inside the render box.
    pub fn contains(&self, coordinate: ChunkCoordinate) -> bool {
        self.center.chebyshev_distance(coordinate) <= self.render_distance
    }

    /// Every in-limit coordinate inside the box, nearest rings first.
    ///
    /// The order is deterministic: ring distance, then squared Euclidean
    /// distance, then `(x, z)`.
    pub fn coordinates(&self) -> Vec<ChunkCoordinate> {
        let r = i64::from(self.render_distance);
        let cx = i64::from(self.center.x);
        let cz = i64::from(self.center.z);
        let limit = i64::from(MAX_CHUNK_COORDINATE);

        let mut coords: Vec<(u64, u64, ChunkCoordinate)> = Vec::new();
        for dx in -r..=r {
            let x = cx + dx;
            if x.abs() > limit {
                continue;
            }
            for dz in -r..=r {
                let z = cz + dz;
                if z.abs() > limit {
                    continue;
                }
                let ring = dx.unsigned_abs().max(dz.unsigned_abs());
                let dist_sq = (dx * dx + dz * dz) as u64;
                coords.push((ring, dist_sq, ChunkCoordinate::new(x as i32, z as i32)));
            }
        }
        coords.sort_unstable();
        coords.into_iter().map(|(_, _, c)| c).collect()
    }

    /// Coordinates inside `self` but not inside `other`, nearest first.
    pub fn difference(&self, other: &Viewport) -> Vec<ChunkCoordinate> {
        self.coordinates()
            .into_iter()
            .filter(|c| !other.contains(*c))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
