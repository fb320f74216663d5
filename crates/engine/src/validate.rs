//! Geometry rules for creating, resizing and removing partitions.
//!
//! Every `plan_*` function inspects the world without touching it and either
//! returns what to apply or the reason it must not be applied. The index runs
//! them under the world's write lock and applies the plan in the same critical
//! section.

use crate::claim::{Claim, Partition, connectivity};
use crate::error::ClaimError;
use crate::geometry::Area;
use crate::ids::{ClaimId, PartitionId, PlayerId, WorldId};
use crate::index::world::WorldClaims;

/// Remaining claim-block budget of a player.
pub trait BlockAllowance: Send + Sync {
    fn remaining_blocks(&self, player: PlayerId) -> i64;
}

/// Budget that never runs out.
pub struct Unlimited;

impl BlockAllowance for Unlimited {
    fn remaining_blocks(&self, _player: PlayerId) -> i64 {
        i64::MAX
    }
}

/// Server-configured placement limits, passed into each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRules {
    /// Shortest allowed side of a partition. Values below 1 are treated as 1.
    pub minimum_partition_size: i32,
    /// Gap kept clear between partitions of different claims.
    pub claim_buffer: i32,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            minimum_partition_size: 1,
            claim_buffer: 0,
        }
    }
}

/// What removing a partition amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Partition,
    /// The partition was the claim's last; the claim goes with it.
    WholeClaim,
}

pub(crate) fn check_size(area: &Area, rules: &PlacementRules) -> Result<(), ClaimError> {
    let minimum = rules.minimum_partition_size.max(1);
    if area.width() < i64::from(minimum) || area.depth() < i64::from(minimum) {
        return Err(ClaimError::TooSmall { minimum });
    }
    Ok(())
}

/// Fails on the first partition overlapping `area`, skipping `ignore`.
pub(crate) fn check_overlap(
    world: &WorldClaims,
    area: &Area,
    ignore: Option<PartitionId>,
) -> Result<(), ClaimError> {
    match world
        .grid()
        .overlapping(area)
        .into_iter()
        .find(|slot| Some(slot.partition) != ignore)
    {
        Some(slot) => Err(ClaimError::Overlap {
            partition: slot.partition,
            claim: slot.claim,
        }),
        None => Ok(()),
    }
}

/// Fails if `area` comes within the buffer distance of another claim.
pub(crate) fn check_buffer(
    world: &WorldClaims,
    area: &Area,
    own: Option<ClaimId>,
    rules: &PlacementRules,
) -> Result<(), ClaimError> {
    if rules.claim_buffer <= 0 {
        return Ok(());
    }
    let zone = area.expanded(rules.claim_buffer);
    match world
        .grid()
        .matching(&zone, |other| other.overlaps(&zone))
        .into_iter()
        .find(|slot| Some(slot.claim) != own)
    {
        Some(slot) => Err(ClaimError::TooClose {
            claim: slot.claim,
            distance: rules.claim_buffer,
        }),
        None => Ok(()),
    }
}

/// Growth is checked against the budget; shrinking always passes, even when
/// the owner is already over budget.
pub(crate) fn check_blocks(required: i64, remaining: i64) -> Result<(), ClaimError> {
    if required > 0 && required > remaining {
        return Err(ClaimError::InsufficientBlocks {
            required,
            remaining: remaining.max(0),
        });
    }
    Ok(())
}

/// Whether a new partition at `area` would touch the claim.
pub fn partition_connects(claim: &Claim, area: &Area) -> bool {
    claim.partitions.is_empty()
        || claim
            .partitions
            .iter()
            .any(|p| p.area.is_adjacent_or_overlapping(area))
}

pub fn connected_after_resize(claim: &Claim, partition: PartitionId, area: Area) -> bool {
    let areas: Vec<Area> = claim
        .partitions
        .iter()
        .map(|p| if p.id == partition { area } else { p.area })
        .collect();
    connectivity::is_connected(&areas)
}

pub fn connected_after_removal(claim: &Claim, partition: PartitionId) -> bool {
    let areas: Vec<Area> = claim
        .partitions
        .iter()
        .filter(|p| p.id != partition)
        .map(|p| p.area)
        .collect();
    connectivity::is_connected(&areas)
}

/// Everything needed to place a brand new claim.
#[derive(Debug, Clone)]
pub struct ClaimDraft {
    pub world: WorldId,
    pub owner: PlayerId,
    pub name: String,
    pub anchor: crate::geometry::Position3D,
    pub area: Area,
}

pub(crate) fn plan_claim(
    world: &WorldClaims,
    draft: ClaimDraft,
    rules: &PlacementRules,
    remaining: i64,
) -> Result<Claim, ClaimError> {
    let name = crate::claim::normalise_name(&draft.name)?;
    if world
        .claims()
        .any(|c| c.owner == draft.owner && c.name.eq_ignore_ascii_case(&name))
    {
        return Err(ClaimError::NameTaken(name));
    }
    check_size(&draft.area, rules)?;
    if !draft.area.contains(&draft.anchor) {
        return Err(ClaimError::AnchorOutside);
    }
    check_overlap(world, &draft.area, None)?;
    check_buffer(world, &draft.area, None, rules)?;
    check_blocks(draft.area.block_count(), remaining)?;
    Ok(Claim::new(draft.world, draft.owner, name, draft.anchor, draft.area))
}

pub(crate) fn plan_partition(
    world: &WorldClaims,
    claim: ClaimId,
    area: Area,
    target_world: WorldId,
    rules: &PlacementRules,
    remaining: i64,
) -> Result<Partition, ClaimError> {
    let current = world
        .claim(claim)
        .ok_or(ClaimError::claim_not_found(claim))?;
    if target_world != current.world {
        return Err(ClaimError::Disconnected(claim));
    }
    check_size(&area, rules)?;
    check_overlap(world, &area, None)?;
    check_buffer(world, &area, Some(claim), rules)?;
    if !partition_connects(current, &area) {
        return Err(ClaimError::Disconnected(claim));
    }
    check_blocks(area.block_count(), remaining)?;
    Ok(Partition::new(claim, current.world, area))
}

pub(crate) fn plan_resize(
    world: &WorldClaims,
    claim: ClaimId,
    partition: PartitionId,
    area: Area,
    rules: &PlacementRules,
    remaining: i64,
) -> Result<(), ClaimError> {
    let current = world
        .claim(claim)
        .ok_or(ClaimError::claim_not_found(claim))?;
    let old = current
        .partition(partition)
        .ok_or(ClaimError::partition_not_found(partition))?;
    check_size(&area, rules)?;
    check_overlap(world, &area, Some(partition))?;
    check_buffer(world, &area, Some(claim), rules)?;
    if !connected_after_resize(current, partition, area) {
        return Err(ClaimError::Disconnected(claim));
    }
    check_blocks(area.block_count() - old.area.block_count(), remaining)
}

pub(crate) fn plan_removal(
    world: &WorldClaims,
    claim: ClaimId,
    partition: PartitionId,
) -> Result<Removal, ClaimError> {
    let current = world
        .claim(claim)
        .ok_or(ClaimError::claim_not_found(claim))?;
    if current.partition(partition).is_none() {
        return Err(ClaimError::partition_not_found(partition));
    }
    if current.partitions.len() == 1 {
        return Ok(Removal::WholeClaim);
    }
    if !connected_after_removal(current, partition) {
        return Err(ClaimError::Disconnected(claim));
    }
    Ok(Removal::Partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_check_only_limits_growth() {
        assert!(check_blocks(100, 100).is_ok());
        assert_eq!(
            check_blocks(101, 100),
            Err(ClaimError::InsufficientBlocks {
                required: 101,
                remaining: 100
            })
        );
        assert!(check_blocks(-50, -10).is_ok());
        assert!(check_blocks(0, -10).is_ok());
    }

    #[test]
    fn minimum_size_is_at_least_one() {
        let rules = PlacementRules {
            minimum_partition_size: 0,
            claim_buffer: 0,
        };
        assert_eq!(
            check_size(&Area::new((0, 0), (0, 10)), &rules),
            Err(ClaimError::TooSmall { minimum: 1 })
        );
        let rules = PlacementRules {
            minimum_partition_size: 5,
            claim_buffer: 0,
        };
        assert!(check_size(&Area::new((0, 0), (5, 5)), &rules).is_ok());
        assert!(check_size(&Area::new((0, 0), (4, 50)), &rules).is_err());
    }
}
