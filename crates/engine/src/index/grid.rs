use std::collections::{HashMap, HashSet};

use crate::geometry::{Area, ChunkPos, Position3D};
use crate::ids::{ClaimId, PartitionId};

/// One partition as registered in a chunk bucket. The area is copied in so a
/// lookup never has to leave the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub partition: PartitionId,
    pub claim: ClaimId,
    pub area: Area,
}

/// Partitions bucketed by the chunk columns they touch.
///
/// A partition is registered in every chunk its closed footprint covers, so a
/// point lookup only scans the handful of partitions sharing the point's chunk.
/// Buckets that become empty are deallocated.
#[derive(Default)]
pub struct ChunkGrid {
    buckets: HashMap<ChunkPos, Vec<Slot>>,
    partitions: usize,
}

impl ChunkGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: Slot) {
        for chunk in slot.area.chunks() {
            self.buckets.entry(chunk).or_default().push(slot);
        }
        self.partitions += 1;
    }

    /// Unregister `partition`, which must have been inserted with `area`.
    pub fn remove(&mut self, partition: PartitionId, area: Area) -> bool {
        let mut found = false;
        for chunk in area.chunks() {
            let Some(bucket) = self.buckets.get_mut(&chunk) else {
                continue;
            };
            let before = bucket.len();
            bucket.retain(|s| s.partition != partition);
            found |= bucket.len() != before;
            if bucket.is_empty() {
                self.buckets.remove(&chunk);
            }
        }
        if found {
            self.partitions -= 1;
        }
        found
    }

    /// The single partition owning `pos`.
    ///
    /// Closed areas may share an edge, so a position on that edge is inside
    /// both. Half-open containment (max edges excluded) picks at most one of
    /// them; positions on an outer max edge fall back to closed containment,
    /// preferring the area with the greatest min corner.
    pub fn find(&self, pos: &Position3D) -> Option<&Slot> {
        let bucket = self.buckets.get(&pos.chunk())?;
        let mut edge: Option<&Slot> = None;
        for slot in bucket {
            if slot.area.contains_half_open(pos) {
                return Some(slot);
            }
            if slot.area.contains(pos) {
                let better = match edge {
                    None => true,
                    Some(current) => corner(&slot.area) > corner(&current.area),
                };
                if better {
                    edge = Some(slot);
                }
            }
        }
        edge
    }

    /// Every registered partition whose area passes `test`, each reported once.
    ///
    /// Walks the chunks under `area`, or every bucket when the area spans more
    /// chunks than are occupied.
    pub fn matching<F>(&self, area: &Area, test: F) -> Vec<Slot>
    where
        F: Fn(&Area) -> bool,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut visit = |bucket: &Vec<Slot>| {
            for slot in bucket {
                if test(&slot.area) && seen.insert(slot.partition) {
                    out.push(*slot);
                }
            }
        };

        if area.chunk_span() > self.buckets.len() as i64 {
            self.buckets.values().for_each(&mut visit);
        } else {
            for chunk in area.chunks() {
                if let Some(bucket) = self.buckets.get(&chunk) {
                    visit(bucket);
                }
            }
        }
        out
    }

    /// Partitions whose area overlaps `area` (touching edges excluded).
    pub fn overlapping(&self, area: &Area) -> Vec<Slot> {
        self.matching(area, |other| other.overlaps(area))
    }

    pub fn len(&self) -> usize {
        self.partitions
    }

    pub fn is_empty(&self) -> bool {
        self.partitions == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

fn corner(area: &Area) -> (i32, i32) {
    (area.min_x(), area.min_z())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(x1: i32, z1: i32, x2: i32, z2: i32) -> Slot {
        Slot {
            partition: PartitionId::new(),
            claim: ClaimId::new(),
            area: Area::new((x1, z1), (x2, z2)),
        }
    }

    #[test]
    fn find_hits_only_the_containing_slot() {
        let mut grid = ChunkGrid::new();
        let a = slot(0, 0, 40, 40);
        let b = slot(100, 100, 120, 120);
        grid.insert(a);
        grid.insert(b);

        assert_eq!(grid.find(&Position3D::new(20, 64, 20)).map(|s| s.partition), Some(a.partition));
        assert_eq!(grid.find(&Position3D::new(110, 0, 110)).map(|s| s.partition), Some(b.partition));
        assert!(grid.find(&Position3D::new(60, 64, 60)).is_none());
        assert!(grid.find(&Position3D::new(-1, 64, 0)).is_none());
    }

    #[test]
    fn shared_edge_resolves_to_one_side() {
        let mut grid = ChunkGrid::new();
        let left = slot(0, 0, 10, 10);
        let right = slot(10, 0, 20, 10);
        grid.insert(left);
        grid.insert(right);

        // x = 10 belongs to the partition starting there
        assert_eq!(grid.find(&Position3D::new(10, 0, 5)).map(|s| s.partition), Some(right.partition));
        // outer max edges still resolve
        assert_eq!(grid.find(&Position3D::new(20, 0, 10)).map(|s| s.partition), Some(right.partition));
        assert_eq!(grid.find(&Position3D::new(0, 0, 10)).map(|s| s.partition), Some(left.partition));
        // shared corner on the top edge
        assert_eq!(grid.find(&Position3D::new(10, 0, 10)).map(|s| s.partition), Some(right.partition));
    }

    #[test]
    fn remove_frees_every_bucket() {
        let mut grid = ChunkGrid::new();
        let big = slot(-20, -20, 50, 50);
        grid.insert(big);
        assert!(grid.bucket_count() > 1);
        assert!(grid.remove(big.partition, big.area));
        assert_eq!(grid.bucket_count(), 0);
        assert!(grid.is_empty());
        assert!(!grid.remove(big.partition, big.area));
    }

    #[test]
    fn overlapping_reports_each_partition_once() {
        let mut grid = ChunkGrid::new();
        let wide = slot(0, 0, 100, 100);
        grid.insert(wide);
        grid.insert(slot(200, 0, 210, 10));

        let hits = grid.overlapping(&Area::new((50, 50), (150, 150)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].partition, wide.partition);

        assert!(grid.overlapping(&Area::new((100, 0), (200, 10))).is_empty());
    }

    #[test]
    fn huge_queries_scan_occupied_buckets() {
        let mut grid = ChunkGrid::new();
        let a = slot(0, 0, 10, 10);
        grid.insert(a);
        let everything = Area::new((-30_000_000, -30_000_000), (30_000_000, 30_000_000));
        let hits = grid.overlapping(&everything);
        assert_eq!(hits.len(), 1);
    }
}
