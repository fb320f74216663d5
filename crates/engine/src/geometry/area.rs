use serde::{Deserialize, Serialize};

use super::position::{ChunkPos, Position3D};

/// Axis-aligned rectangle on the (x, z) plane, unbounded vertically.
///
/// The corners are normalised on construction so `min <= max` on both axes.
/// Edges are closed: a position on the boundary is inside. Two areas that only
/// share an edge touch but do not overlap, which is what lets a claim grow by
/// placing a new partition flush against an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Area {
    min_x: i32,
    min_z: i32,
    max_x: i32,
    max_z: i32,
}

impl Area {
    /// Build from two opposite corners given as `(x, z)` in any order.
    pub const fn new(a: (i32, i32), b: (i32, i32)) -> Self {
        let (min_x, max_x) = if a.0 <= b.0 { (a.0, b.0) } else { (b.0, a.0) };
        let (min_z, max_z) = if a.1 <= b.1 { (a.1, b.1) } else { (b.1, a.1) };
        Self {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    /// Square footprint of `radius` blocks in each direction around `centre`.
    pub const fn from_centre(centre: Position3D, radius: i32) -> Self {
        Self::new(
            (centre.x.saturating_sub(radius), centre.z.saturating_sub(radius)),
            (centre.x.saturating_add(radius), centre.z.saturating_add(radius)),
        )
    }

    pub const fn min_x(&self) -> i32 {
        self.min_x
    }

    pub const fn min_z(&self) -> i32 {
        self.min_z
    }

    pub const fn max_x(&self) -> i32 {
        self.max_x
    }

    pub const fn max_z(&self) -> i32 {
        self.max_z
    }

    pub const fn width(&self) -> i64 {
        self.max_x as i64 - self.min_x as i64
    }

    pub const fn depth(&self) -> i64 {
        self.max_z as i64 - self.min_z as i64
    }

    /// Claim-block cost of this area.
    pub const fn block_count(&self) -> i64 {
        self.width() * self.depth()
    }

    /// Whether the position's column lies within the inclusive bounds. Height is ignored.
    pub const fn contains(&self, pos: &Position3D) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.z >= self.min_z && pos.z <= self.max_z
    }

    /// Containment with the max edges excluded. Interior-disjoint areas are
    /// disjoint under this test, which makes it a tie-breaker on shared edges.
    pub(crate) const fn contains_half_open(&self, pos: &Position3D) -> bool {
        pos.x >= self.min_x && pos.x < self.max_x && pos.z >= self.min_z && pos.z < self.max_z
    }

    /// Length of the intersection along each axis. Negative means a gap.
    const fn intersection_extent(&self, other: &Area) -> (i64, i64) {
        let x = min(self.max_x, other.max_x) as i64 - max(self.min_x, other.min_x) as i64;
        let z = min(self.max_z, other.max_z) as i64 - max(self.min_z, other.min_z) as i64;
        (x, z)
    }

    /// True iff the intersection has positive area. Touching edges do not count.
    pub const fn overlaps(&self, other: &Area) -> bool {
        let (x, z) = self.intersection_extent(other);
        x > 0 && z > 0
    }

    /// True if the areas overlap or share an edge segment of positive length.
    /// Meeting at a single corner is not adjacency.
    pub const fn is_adjacent_or_overlapping(&self, other: &Area) -> bool {
        let (x, z) = self.intersection_extent(other);
        x >= 0 && z >= 0 && (x > 0 || z > 0)
    }

    /// The area grown by `distance` blocks on every side.
    pub const fn expanded(&self, distance: i32) -> Self {
        Self {
            min_x: self.min_x.saturating_sub(distance),
            min_z: self.min_z.saturating_sub(distance),
            max_x: self.max_x.saturating_add(distance),
            max_z: self.max_z.saturating_add(distance),
        }
    }

    /// Every chunk column the closed rectangle touches.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> + use<> {
        let lo = ChunkPos::containing(self.min_x, self.min_z);
        let hi = ChunkPos::containing(self.max_x, self.max_z);
        (lo.x..=hi.x).flat_map(move |cx| (lo.z..=hi.z).map(move |cz| ChunkPos::new(cx, cz)))
    }

    /// Number of chunk columns touched; used to refuse absurd footprints cheaply.
    pub const fn chunk_span(&self) -> i64 {
        let w = (self.max_x >> 4) as i64 - (self.min_x >> 4) as i64 + 1;
        let d = (self.max_z >> 4) as i64 - (self.min_z >> 4) as i64 + 1;
        w * d
    }
}

const fn min(a: i32, b: i32) -> i32 {
    if a < b { a } else { b }
}

const fn max(a: i32, b: i32) -> i32 {
    if a > b { a } else { b }
}

impl From<[i32; 4]> for Area {
    fn from([x1, z1, x2, z2]: [i32; 4]) -> Self {
        Self::new((x1, z1), (x2, z2))
    }
}

impl From<Area> for [i32; 4] {
    fn from(area: Area) -> Self {
        [area.min_x, area.min_z, area.max_x, area.max_z]
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {})-({}, {})",
            self.min_x, self.min_z, self.max_x, self.max_z
        )
    }
}
