pub mod area;
pub mod position;

pub use area::Area;
pub use position::{ChunkPos, Position3D};
