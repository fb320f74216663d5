//! Host-side services the claim engine consults: block allowances, claim
//! caps, per-player limit overrides and world-border checks.

use std::collections::HashMap;
use std::sync::Arc;

use claims_engine::{Area, BlockAllowance, Claim, ClaimIndex, PlayerId, Position3D, TransferPolicy, WorldId};

use crate::config::ClaimsConfig;

/// Block mutations and bounds owned by the game runtime.
pub trait WorldManipulation: Send + Sync {
    /// Remove the block at `pos` without dropping it as an item. Returns
    /// whether a block was removed.
    fn break_without_item_drop(&self, world: WorldId, pos: Position3D) -> bool;

    fn is_inside_world_border(&self, world: WorldId, area: &Area) -> bool;
}

/// A square border centred on the origin, the same in every world. Block
/// removal is left to the game runtime and always reports success.
pub struct SquareBorder {
    radius: i32,
}

impl SquareBorder {
    pub fn new(radius: i32) -> Self {
        Self { radius: radius.abs() }
    }
}

impl WorldManipulation for SquareBorder {
    fn break_without_item_drop(&self, world: WorldId, pos: Position3D) -> bool {
        tracing::debug!(world = %world, x = pos.x, y = pos.y, z = pos.z, "anchor block removed");
        true
    }

    fn is_inside_world_border(&self, _world: WorldId, area: &Area) -> bool {
        let r = self.radius;
        area.min_x() >= -r && area.min_z() >= -r && area.max_x() <= r && area.max_z() <= r
    }
}

/// Per-player overrides of the configured limits, typically granted by a
/// permissions plugin or rank.
pub trait PlayerMetadata: Send + Sync {
    fn claim_limit(&self, player: PlayerId) -> Option<usize>;
    fn claim_block_limit(&self, player: PlayerId) -> Option<i64>;
}

/// Everyone gets the configured limits.
pub struct NoMetadata;

impl PlayerMetadata for NoMetadata {
    fn claim_limit(&self, _player: PlayerId) -> Option<usize> {
        None
    }

    fn claim_block_limit(&self, _player: PlayerId) -> Option<i64> {
        None
    }
}

/// Fixed per-player limits.
#[derive(Default)]
pub struct StaticMetadata {
    pub claim_limits: HashMap<PlayerId, usize>,
    pub block_limits: HashMap<PlayerId, i64>,
}

impl PlayerMetadata for StaticMetadata {
    fn claim_limit(&self, player: PlayerId) -> Option<usize> {
        self.claim_limits.get(&player).copied()
    }

    fn claim_block_limit(&self, player: PlayerId) -> Option<i64> {
        self.block_limits.get(&player).copied()
    }
}

/// Limits resolved from player metadata first, then configuration.
#[derive(Clone)]
pub struct Limits {
    metadata: Arc<dyn PlayerMetadata>,
    claim_limit: usize,
    claim_block_limit: i64,
}

impl Limits {
    pub fn new(config: &ClaimsConfig, metadata: Arc<dyn PlayerMetadata>) -> Self {
        Self {
            metadata,
            claim_limit: config.claim_limit,
            claim_block_limit: config.claim_block_limit,
        }
    }

    pub fn claim_limit(&self, player: PlayerId) -> usize {
        self.metadata.claim_limit(player).unwrap_or(self.claim_limit)
    }

    pub fn claim_block_limit(&self, player: PlayerId) -> i64 {
        self.metadata
            .claim_block_limit(player)
            .unwrap_or(self.claim_block_limit)
    }
}

/// Remaining blocks = the player's limit minus the blocks their claims
/// already cover. Can be negative after a limit is lowered.
pub struct ConfiguredAllowance {
    index: Arc<ClaimIndex>,
    limits: Limits,
}

impl ConfiguredAllowance {
    pub fn new(index: Arc<ClaimIndex>, limits: Limits) -> Self {
        Self { index, limits }
    }
}

impl BlockAllowance for ConfiguredAllowance {
    fn remaining_blocks(&self, player: PlayerId) -> i64 {
        self.limits.claim_block_limit(player) - self.index.block_count_owned_by(player)
    }
}

/// A player may receive a claim if it fits under both their claim cap and
/// their block allowance.
pub struct ClaimCapPolicy {
    index: Arc<ClaimIndex>,
    limits: Limits,
}

impl ClaimCapPolicy {
    pub fn new(index: Arc<ClaimIndex>, limits: Limits) -> Self {
        Self { index, limits }
    }
}

impl TransferPolicy for ClaimCapPolicy {
    fn can_receive(&self, target: PlayerId, claim: &Claim) -> bool {
        let owned = self.index.claim_count_owned_by(target);
        if owned >= self.limits.claim_limit(target) {
            return false;
        }
        let remaining = self.limits.claim_block_limit(target) - self.index.block_count_owned_by(target);
        claim.block_count() <= remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_engine::{ClaimDraft, PlacementRules, Unlimited};

    fn limits(claims: usize, blocks: i64) -> Limits {
        let config = ClaimsConfig {
            claim_limit: claims,
            claim_block_limit: blocks,
            ..ClaimsConfig::default()
        };
        Limits::new(&config, Arc::new(NoMetadata))
    }

    fn claim_for(index: &ClaimIndex, owner: PlayerId, name: &str, area: Area) -> Claim {
        let id = index
            .create_claim(
                ClaimDraft {
                    world: WorldId::new(),
                    owner,
                    name: name.into(),
                    anchor: Position3D::new(area.min_x(), 64, area.min_z()),
                    area,
                },
                &PlacementRules::default(),
                &Unlimited,
            )
            .unwrap()
            .claim();
        index.claim(id).unwrap()
    }

    #[test]
    fn allowance_subtracts_owned_blocks() {
        let index = Arc::new(ClaimIndex::new());
        let owner = PlayerId::new();
        claim_for(&index, owner, "a", Area::new((0, 0), (10, 10)));
        let allowance = ConfiguredAllowance::new(Arc::clone(&index), limits(3, 150));
        assert_eq!(allowance.remaining_blocks(owner), 50);
        assert_eq!(allowance.remaining_blocks(PlayerId::new()), 150);
    }

    #[test]
    fn metadata_overrides_configured_limits() {
        let vip = PlayerId::new();
        let mut metadata = StaticMetadata::default();
        metadata.block_limits.insert(vip, 1_000_000);
        let limits = Limits::new(&ClaimsConfig::default(), Arc::new(metadata));
        assert_eq!(limits.claim_block_limit(vip), 1_000_000);
        assert_eq!(limits.claim_block_limit(PlayerId::new()), 10_000);
        assert_eq!(limits.claim_limit(vip), 3);
    }

    #[test]
    fn cap_policy_checks_count_and_blocks() {
        let index = Arc::new(ClaimIndex::new());
        let target = PlayerId::new();
        let big = claim_for(&index, PlayerId::new(), "big", Area::new((0, 0), (20, 20)));
        let small = claim_for(&index, PlayerId::new(), "small", Area::new((0, 0), (5, 5)));

        let policy = ClaimCapPolicy::new(Arc::clone(&index), limits(1, 100));
        assert!(!policy.can_receive(target, &big));
        assert!(policy.can_receive(target, &small));

        claim_for(&index, target, "own", Area::new((0, 0), (2, 2)));
        assert!(!policy.can_receive(target, &small));
    }

    #[test]
    fn border_contains_only_inner_areas() {
        let border = SquareBorder::new(100);
        let world = WorldId::new();
        assert!(border.is_inside_world_border(world, &Area::new((-100, -100), (100, 100))));
        assert!(!border.is_inside_world_border(world, &Area::new((95, 0), (105, 10))));
    }
}
