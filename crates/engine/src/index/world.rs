use std::collections::HashMap;

use super::grid::{ChunkGrid, Slot};
use crate::claim::{Claim, Partition, connectivity};
use crate::geometry::{Area, Position3D};
use crate::ids::{ClaimId, PartitionId, WorldId};
use crate::transfer::TransferRequest;

/// All claims of a single world, plus the grid that locates them.
///
/// Every mutator here keeps `claims`, `grid` and `anchors` in step; callers
/// hold the world's write lock across a whole operation, so readers never see
/// one updated without the others.
pub struct WorldClaims {
    id: WorldId,
    claims: HashMap<ClaimId, Claim>,
    grid: ChunkGrid,
    anchors: HashMap<Position3D, ClaimId>,
    pub(crate) transfers: HashMap<ClaimId, TransferRequest>,
}

/// A claim as it stood before a mutation, enough to put it back.
#[derive(Debug, Clone)]
pub(crate) struct ClaimState {
    pub claim: Claim,
    pub transfer: Option<TransferRequest>,
}

impl WorldClaims {
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            claims: HashMap::new(),
            grid: ChunkGrid::new(),
            anchors: HashMap::new(),
            transfers: HashMap::new(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn claim(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.get(&id)
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn partition_count(&self) -> usize {
        self.grid.len()
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// The claim and partition owning `pos`, if any.
    pub fn find_at(&self, pos: &Position3D) -> Option<(&Claim, &Partition)> {
        let slot = self.grid.find(pos)?;
        let claim = self.claims.get(&slot.claim)?;
        let partition = claim.partition(slot.partition)?;
        Some((claim, partition))
    }

    pub fn claim_by_anchor(&self, pos: &Position3D) -> Option<&Claim> {
        self.anchors.get(pos).and_then(|id| self.claims.get(id))
    }

    pub fn transfer(&self, claim: ClaimId) -> Option<&TransferRequest> {
        self.transfers.get(&claim)
    }

    pub(crate) fn snapshot(&self, id: ClaimId) -> Option<ClaimState> {
        self.claims.get(&id).map(|claim| ClaimState {
            claim: claim.clone(),
            transfer: self.transfers.get(&id).copied(),
        })
    }

    pub(crate) fn insert_claim(&mut self, claim: Claim) {
        for partition in &claim.partitions {
            self.grid.insert(slot(partition));
        }
        self.anchors.insert(claim.anchor, claim.id);
        self.claims.insert(claim.id, claim);
    }

    /// Remove a claim with everything hanging off it.
    pub(crate) fn remove_claim(&mut self, id: ClaimId) -> Option<Claim> {
        let claim = self.claims.remove(&id)?;
        for partition in &claim.partitions {
            self.grid.remove(partition.id, partition.area);
        }
        if self.anchors.get(&claim.anchor) == Some(&id) {
            self.anchors.remove(&claim.anchor);
        }
        self.transfers.remove(&id);
        Some(claim)
    }

    /// Put a claim back as it was, or drop it if it did not exist.
    ///
    /// `left_behind` is the transfer request the undone mutation produced. If
    /// the live request no longer matches it, something else has answered or
    /// replaced the request since, and the live one is kept.
    pub(crate) fn restore(&mut self, id: ClaimId, state: Option<ClaimState>, left_behind: Option<TransferRequest>) {
        let live = self.transfers.get(&id).copied();
        self.remove_claim(id);
        if let Some(state) = state {
            let request = if live == left_behind { state.transfer } else { live };
            if let Some(request) = request {
                self.transfers.insert(id, request);
            }
            self.insert_claim(state.claim);
        }
    }

    /// Non-partition edits (grants, flags, metadata). Partition changes must go
    /// through the dedicated methods so the grid stays in sync.
    pub(crate) fn claim_mut(&mut self, id: ClaimId) -> Option<&mut Claim> {
        self.claims.get_mut(&id)
    }

    pub(crate) fn add_partition(&mut self, partition: Partition) -> bool {
        let Some(claim) = self.claims.get_mut(&partition.claim) else {
            return false;
        };
        self.grid.insert(slot(&partition));
        claim.partitions.push(partition);
        true
    }

    pub(crate) fn set_partition_area(&mut self, claim: ClaimId, id: PartitionId, area: Area) -> bool {
        let Some(partition) = self
            .claims
            .get_mut(&claim)
            .and_then(|c| c.partitions.iter_mut().find(|p| p.id == id))
        else {
            return false;
        };
        self.grid.remove(id, partition.area);
        partition.area = area;
        self.grid.insert(slot(partition));
        true
    }

    pub(crate) fn remove_partition(&mut self, claim: ClaimId, id: PartitionId) -> Option<Partition> {
        let claim = self.claims.get_mut(&claim)?;
        let pos = claim.partitions.iter().position(|p| p.id == id)?;
        let partition = claim.partitions.remove(pos);
        self.grid.remove(id, partition.area);
        Some(partition)
    }

    pub(crate) fn move_anchor(&mut self, id: ClaimId, to: Position3D) -> bool {
        let Some(claim) = self.claims.get_mut(&id) else {
            return false;
        };
        if self.anchors.get(&claim.anchor) == Some(&id) {
            self.anchors.remove(&claim.anchor);
        }
        claim.anchor = to;
        self.anchors.insert(to, id);
        true
    }

    /// Check the two structural invariants: no partitions overlap and every
    /// claim is one connected piece.
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for claim in self.claims.values() {
            for partition in &claim.partitions {
                for other in self.grid.overlapping(&partition.area) {
                    if other.partition == partition.id {
                        continue;
                    }
                    let key = if partition.id < other.partition {
                        (partition.id, other.partition)
                    } else {
                        (other.partition, partition.id)
                    };
                    if seen.insert(key) {
                        out.push(Violation::Overlap {
                            world: self.id,
                            a: key.0,
                            b: key.1,
                        });
                    }
                }
            }
            let areas = claim.areas();
            if areas.is_empty() || !connectivity::is_connected(&areas) {
                out.push(Violation::Disconnected {
                    world: self.id,
                    claim: claim.id,
                    components: connectivity::component_count(&areas),
                });
            }
        }
        out
    }
}

/// A broken structural invariant found by [`WorldClaims::violations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Overlap {
        world: WorldId,
        a: PartitionId,
        b: PartitionId,
    },
    Disconnected {
        world: WorldId,
        claim: ClaimId,
        components: usize,
    },
}

fn slot(partition: &Partition) -> Slot {
    Slot {
        partition: partition.id,
        claim: partition.claim,
        area: partition.area,
    }
}
