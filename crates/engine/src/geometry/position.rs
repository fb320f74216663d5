use serde::{Deserialize, Serialize};

/// Absolute block position in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position3D {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the block column at `(x, z)`.
    pub const fn containing(x: i32, z: i32) -> Self {
        Self::new(x >> 4, z >> 4)
    }

    pub const fn block_origin(&self, y: i32) -> Position3D {
        Position3D::new(self.x << 4, y, self.z << 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_coordinates_floor_into_chunks() {
        assert_eq!(Position3D::new(-1, 64, -16).chunk(), ChunkPos::new(-1, -1));
        assert_eq!(Position3D::new(-17, 0, 15).chunk(), ChunkPos::new(-2, 0));
        assert_eq!(Position3D::new(16, 0, 0).chunk(), ChunkPos::new(1, 0));
    }

    #[test]
    fn block_origin_is_chunk_corner() {
        let origin = ChunkPos::new(-2, 3).block_origin(70);
        assert_eq!(origin, Position3D::new(-32, 70, 48));
        assert_eq!(origin.chunk(), ChunkPos::new(-2, 3));
    }
}
