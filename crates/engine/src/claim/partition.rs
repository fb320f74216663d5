use serde::{Deserialize, Serialize};

use crate::geometry::{Area, Position3D};
use crate::ids::{ClaimId, PartitionId, WorldId};

/// One rectangular piece of a claim.
///
/// A partition belongs to exactly one claim and never overlaps another
/// partition in the same world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub claim: ClaimId,
    pub world: WorldId,
    pub area: Area,
}

impl Partition {
    pub fn new(claim: ClaimId, world: WorldId, area: Area) -> Self {
        Self {
            id: PartitionId::new(),
            claim,
            world,
            area,
        }
    }

    pub const fn contains(&self, pos: &Position3D) -> bool {
        self.area.contains(pos)
    }

    pub const fn block_count(&self) -> i64 {
        self.area.block_count()
    }
}
