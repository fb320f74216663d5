pub mod commit;
pub mod grid;
pub mod world;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rayon::prelude::*;

use crate::access::{self, Authority, Decision};
use crate::claim::{self, Claim, Flag, Partition, Permission};
use crate::error::ClaimError;
use crate::geometry::{Area, Position3D};
use crate::ids::{ClaimId, PartitionId, PlayerId, WorldId};
use crate::transfer::{self, PlayerAccess, TransferPolicy, TransferRequest};
use crate::validate::{self, BlockAllowance, ClaimDraft, PlacementRules, Removal};

pub use commit::{Change, Commit, Grantee};
pub use world::{Violation, WorldClaims};

type Shard = Arc<RwLock<WorldClaims>>;

/// Every claim on the server, sharded by world.
///
/// Each world sits behind its own reader-writer lock. Lookups take the read
/// side; a mutation takes the write side for validate-and-apply only, so a
/// reader sees either none or all of it. The route maps let operations that
/// only carry a claim or partition id find their world without scanning.
///
/// Routes are updated while the owning world's write lock is held. Readers
/// copy a route out before locking the world, never the other way round.
pub struct ClaimIndex {
    worlds: DashMap<WorldId, Shard>,
    claim_routes: DashMap<ClaimId, WorldId>,
    partition_routes: DashMap<PartitionId, ClaimId>,
}

/// Outcome of [`ClaimIndex::load`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub worlds: usize,
    pub claims: usize,
    pub partitions: usize,
    /// Stored claims that could not be indexed, with the reason.
    pub rejected: Vec<(ClaimId, ClaimError)>,
}

/// Result of offering a claim to another player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offer {
    pub request: TransferRequest,
    /// The pending request this offer replaced, if it went to someone else.
    pub superseded: Option<TransferRequest>,
}

impl ClaimIndex {
    pub fn new() -> Self {
        Self {
            worlds: DashMap::new(),
            claim_routes: DashMap::new(),
            partition_routes: DashMap::new(),
        }
    }

    fn shard(&self, world: WorldId) -> Option<Shard> {
        self.worlds.get(&world).map(|w| Arc::clone(w.value()))
    }

    fn shard_or_create(&self, world: WorldId) -> Shard {
        Arc::clone(
            self.worlds
                .entry(world)
                .or_insert_with(|| Arc::new(RwLock::new(WorldClaims::new(world))))
                .value(),
        )
    }

    fn shards(&self) -> Vec<Shard> {
        self.worlds.iter().map(|w| Arc::clone(w.value())).collect()
    }

    fn shard_of(&self, claim: ClaimId) -> Result<Shard, ClaimError> {
        let world = self
            .claim_routes
            .get(&claim)
            .map(|r| *r)
            .ok_or(ClaimError::claim_not_found(claim))?;
        self.shard(world).ok_or(ClaimError::claim_not_found(claim))
    }

    fn claim_of(&self, partition: PartitionId) -> Result<ClaimId, ClaimError> {
        self.partition_routes
            .get(&partition)
            .map(|r| *r)
            .ok_or(ClaimError::partition_not_found(partition))
    }

    fn reroute(&self, before: Option<&Claim>, after: Option<&Claim>) {
        if let Some(old) = before {
            for p in &old.partitions {
                if after.is_none_or(|new| new.partition(p.id).is_none()) {
                    self.partition_routes.remove(&p.id);
                }
            }
            if after.is_none() {
                self.claim_routes.remove(&old.id);
            }
        }
        if let Some(new) = after {
            self.claim_routes.insert(new.id, new.world);
            for p in &new.partitions {
                self.partition_routes.insert(p.id, new.id);
            }
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// The partition owning `pos`, if any.
    pub fn find_at(&self, world: WorldId, pos: &Position3D) -> Option<Partition> {
        let shard = self.shard(world)?;
        let guard = shard.read().expect("claim world lock poisoned");
        guard.find_at(pos).map(|(_, p)| *p)
    }

    pub fn claim_at(&self, world: WorldId, pos: &Position3D) -> Option<Claim> {
        let shard = self.shard(world)?;
        let guard = shard.read().expect("claim world lock poisoned");
        guard.find_at(pos).map(|(c, _)| c.clone())
    }

    /// The world a claim lives in.
    pub fn world_of(&self, claim: ClaimId) -> Option<WorldId> {
        self.claim_routes.get(&claim).map(|r| *r)
    }

    pub fn claim(&self, id: ClaimId) -> Option<Claim> {
        self.with_claim(id, Claim::clone)
    }

    /// Run `f` against the live claim under the world's read lock.
    pub fn with_claim<R>(&self, id: ClaimId, f: impl FnOnce(&Claim) -> R) -> Option<R> {
        let shard = self.shard_of(id).ok()?;
        let guard = shard.read().expect("claim world lock poisoned");
        guard.claim(id).map(f)
    }

    pub fn partition(&self, id: PartitionId) -> Option<Partition> {
        let claim = self.claim_of(id).ok()?;
        self.with_claim(claim, |c| c.partition(id).copied()).flatten()
    }

    pub fn claim_by_anchor(&self, world: WorldId, pos: &Position3D) -> Option<Claim> {
        let shard = self.shard(world)?;
        let guard = shard.read().expect("claim world lock poisoned");
        guard.claim_by_anchor(pos).cloned()
    }

    /// Claims owned by `player` across all worlds, oldest first.
    pub fn claims_owned_by(&self, player: PlayerId) -> Vec<Claim> {
        let mut out: Vec<Claim> = self
            .shards()
            .iter()
            .flat_map(|shard| {
                let guard = shard.read().expect("claim world lock poisoned");
                guard
                    .claims()
                    .filter(|c| c.owner == player)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    pub fn claims_in_world(&self, world: WorldId) -> Vec<Claim> {
        let Some(shard) = self.shard(world) else {
            return Vec::new();
        };
        let guard = shard.read().expect("claim world lock poisoned");
        guard.claims().cloned().collect()
    }

    pub fn claim_count_owned_by(&self, player: PlayerId) -> usize {
        self.owned_stat(player, |_| 1).0
    }

    /// Claim blocks currently spent by `player`.
    pub fn block_count_owned_by(&self, player: PlayerId) -> i64 {
        self.owned_stat(player, Claim::block_count).1
    }

    fn owned_stat(&self, player: PlayerId, measure: impl Fn(&Claim) -> i64) -> (usize, i64) {
        self.shards().iter().fold((0, 0), |(count, sum), shard| {
            let guard = shard.read().expect("claim world lock poisoned");
            guard
                .claims()
                .filter(|c| c.owner == player)
                .fold((count, sum), |(n, s), c| (n + 1, s + measure(c)))
        })
    }

    /// Permission check by position. Unclaimed positions are always allowed.
    pub fn check_player_action_at(
        &self,
        world: WorldId,
        pos: &Position3D,
        actor: PlayerId,
        permission: Permission,
        authority: &dyn Authority,
    ) -> Decision {
        let Some(shard) = self.shard(world) else {
            return Decision::Unclaimed;
        };
        let guard = shard.read().expect("claim world lock poisoned");
        match guard.find_at(pos) {
            Some((claim, _)) => access::decide(claim, actor, permission, authority),
            None => Decision::Unclaimed,
        }
    }

    /// Flag check by position. Unclaimed positions are always allowed.
    pub fn check_world_action_at(&self, world: WorldId, pos: &Position3D, flag: Flag) -> bool {
        let Some(shard) = self.shard(world) else {
            return true;
        };
        let guard = shard.read().expect("claim world lock poisoned");
        guard
            .find_at(pos)
            .is_none_or(|(claim, _)| access::is_world_action_allowed(claim, flag))
    }

    pub fn pending_transfer(&self, claim: ClaimId) -> Option<TransferRequest> {
        let shard = self.shard_of(claim).ok()?;
        let guard = shard.read().expect("claim world lock poisoned");
        guard.transfer(claim).copied()
    }

    pub fn player_access(&self, claim: ClaimId, player: PlayerId) -> Result<PlayerAccess, ClaimError> {
        let shard = self.shard_of(claim)?;
        let guard = shard.read().expect("claim world lock poisoned");
        if guard.claim(claim).is_none() {
            return Err(ClaimError::claim_not_found(claim));
        }
        Ok(PlayerAccess {
            claim,
            player,
            has_transfer_request: guard.transfer(claim).is_some_and(|r| r.target == player),
        })
    }

    /// Whether a new claim could be placed on `area`, by size, overlap and
    /// buffer. Block allowance and naming are not considered.
    pub fn check_placement(&self, world: WorldId, area: &Area, rules: &PlacementRules) -> Result<(), ClaimError> {
        validate::check_size(area, rules)?;
        let Some(shard) = self.shard(world) else {
            return Ok(());
        };
        let guard = shard.read().expect("claim world lock poisoned");
        validate::check_overlap(&guard, area, None)?;
        validate::check_buffer(&guard, area, None, rules)
    }

    /// Whether removing the partition would leave the claim connected (or empty).
    pub fn can_remove_partition(&self, partition: PartitionId) -> Result<bool, ClaimError> {
        let claim = self.claim_of(partition)?;
        self.with_claim(claim, |c| {
            if c.partition(partition).is_none() {
                return Err(ClaimError::partition_not_found(partition));
            }
            Ok(validate::connected_after_removal(c, partition))
        })
        .ok_or(ClaimError::claim_not_found(claim))?
    }

    pub fn world_ids(&self) -> Vec<WorldId> {
        self.worlds.iter().map(|w| *w.key()).collect()
    }

    pub fn claim_count(&self) -> usize {
        self.claim_routes.len()
    }

    pub fn partition_count(&self) -> usize {
        self.partition_routes.len()
    }

    /// Check every world for overlapping partitions and split claims, in parallel.
    pub fn verify_invariants(&self) -> Vec<Violation> {
        self.shards()
            .par_iter()
            .flat_map_iter(|shard| {
                shard
                    .read()
                    .expect("claim world lock poisoned")
                    .violations()
            })
            .collect()
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Snapshot the claim, run `op` under the write lock, and describe the result.
    /// `op` must not change anything before it has validated.
    fn mutate<F>(&self, claim: ClaimId, op: F) -> Result<Commit, ClaimError>
    where
        F: FnOnce(&mut WorldClaims) -> Result<(), ClaimError>,
    {
        let shard = self.shard_of(claim)?;
        let mut world = shard.write().expect("claim world lock poisoned");
        let before = world
            .snapshot(claim)
            .ok_or(ClaimError::claim_not_found(claim))?;
        op(&mut *world)?;
        let transfer_after = world.transfer(claim).copied();
        let after = world.claim(claim);
        self.reroute(Some(&before.claim), after);
        Ok(Commit::new(world.id(), claim, Some(before), after, transfer_after))
    }

    /// Edit grants, flags or metadata through a closure on the live claim.
    fn edit<F>(&self, claim: ClaimId, op: F) -> Result<Commit, ClaimError>
    where
        F: FnOnce(&mut Claim) -> Result<(), ClaimError>,
    {
        self.mutate(claim, |world| {
            let live = world
                .claim_mut(claim)
                .ok_or(ClaimError::claim_not_found(claim))?;
            op(live)
        })
    }

    pub fn create_claim(
        &self,
        draft: ClaimDraft,
        rules: &PlacementRules,
        allowance: &dyn BlockAllowance,
    ) -> Result<Commit, ClaimError> {
        let remaining = allowance.remaining_blocks(draft.owner);
        let name = claim::normalise_name(&draft.name)?;
        if self.name_taken(draft.owner, &name, None) {
            return Err(ClaimError::NameTaken(name));
        }

        let shard = match self.shard(draft.world) {
            Some(shard) => shard,
            None => {
                // A rejected draft must not leave an empty world behind.
                validate::plan_claim(&WorldClaims::new(draft.world), draft.clone(), rules, remaining)?;
                self.shard_or_create(draft.world)
            }
        };
        let mut world = shard.write().expect("claim world lock poisoned");
        let new = validate::plan_claim(&world, draft, rules, remaining)?;
        let id = new.id;
        tracing::debug!(claim = %id, owner = %new.owner, area = %new.partitions[0].area, "claim created");
        world.insert_claim(new);
        let after = world.claim(id);
        self.reroute(None, after);
        Ok(Commit::new(world.id(), id, None, after, None))
    }

    fn name_taken(&self, owner: PlayerId, name: &str, except: Option<ClaimId>) -> bool {
        self.shards().iter().any(|shard| {
            shard
                .read()
                .expect("claim world lock poisoned")
                .claims()
                .any(|c| c.owner == owner && Some(c.id) != except && c.name.eq_ignore_ascii_case(name))
        })
    }

    /// Remove a claim together with its partitions, grants, flags and any
    /// pending transfer request.
    pub fn delete_claim(&self, claim: ClaimId) -> Result<Commit, ClaimError> {
        self.mutate(claim, |world| {
            world.remove_claim(claim);
            Ok(())
        })
    }

    pub fn create_partition(
        &self,
        claim: ClaimId,
        world_id: WorldId,
        area: Area,
        rules: &PlacementRules,
        allowance: &dyn BlockAllowance,
    ) -> Result<Commit, ClaimError> {
        let owner = self
            .with_claim(claim, |c| c.owner)
            .ok_or(ClaimError::claim_not_found(claim))?;
        let remaining = allowance.remaining_blocks(owner);
        self.mutate(claim, |world| {
            let partition = validate::plan_partition(world, claim, area, world_id, rules, remaining)?;
            tracing::debug!(claim = %claim, partition = %partition.id, %area, "partition added");
            world.add_partition(partition);
            Ok(())
        })
    }

    pub fn resize_partition(
        &self,
        partition: PartitionId,
        area: Area,
        rules: &PlacementRules,
        allowance: &dyn BlockAllowance,
    ) -> Result<Commit, ClaimError> {
        let claim = self.claim_of(partition)?;
        let owner = self
            .with_claim(claim, |c| c.owner)
            .ok_or(ClaimError::claim_not_found(claim))?;
        let remaining = allowance.remaining_blocks(owner);
        self.mutate(claim, |world| {
            validate::plan_resize(world, claim, partition, area, rules, remaining)?;
            world.set_partition_area(claim, partition, area);
            Ok(())
        })
    }

    /// Remove one partition. Removing the last one deletes the whole claim.
    pub fn remove_partition(&self, partition: PartitionId) -> Result<Commit, ClaimError> {
        let claim = self.claim_of(partition)?;
        self.mutate(claim, |world| {
            match validate::plan_removal(world, claim, partition)? {
                Removal::Partition => {
                    world.remove_partition(claim, partition);
                }
                Removal::WholeClaim => {
                    tracing::debug!(claim = %claim, "last partition removed, deleting claim");
                    world.remove_claim(claim);
                }
            }
            Ok(())
        })
    }

    pub fn grant_player_permission(
        &self,
        claim: ClaimId,
        player: PlayerId,
        permission: Permission,
    ) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.grant_player(player, permission);
            Ok(())
        })
    }

    pub fn revoke_player_permission(
        &self,
        claim: ClaimId,
        player: PlayerId,
        permission: Permission,
    ) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.revoke_player(player, permission);
            Ok(())
        })
    }

    pub fn grant_all_player_permissions(&self, claim: ClaimId, player: PlayerId) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            for permission in Permission::ALL {
                c.grant_player(player, permission);
            }
            Ok(())
        })
    }

    pub fn revoke_all_player_permissions(&self, claim: ClaimId, player: PlayerId) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.clear_player(player);
            Ok(())
        })
    }

    pub fn grant_claim_permission(&self, claim: ClaimId, permission: Permission) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.grant_claim_wide(permission);
            Ok(())
        })
    }

    pub fn revoke_claim_permission(&self, claim: ClaimId, permission: Permission) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.revoke_claim_wide(permission);
            Ok(())
        })
    }

    pub fn grant_all_claim_permissions(&self, claim: ClaimId) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            for permission in Permission::ALL {
                c.grant_claim_wide(permission);
            }
            Ok(())
        })
    }

    pub fn revoke_all_claim_permissions(&self, claim: ClaimId) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.claim_permissions.clear();
            Ok(())
        })
    }

    pub fn set_flag(&self, claim: ClaimId, flag: Flag, enabled: bool) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.set_flag(flag, enabled);
            Ok(())
        })
    }

    pub fn set_all_flags(&self, claim: ClaimId, enabled: bool) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            for flag in Flag::ALL {
                c.set_flag(flag, enabled);
            }
            Ok(())
        })
    }

    pub fn rename(&self, claim: ClaimId, name: &str) -> Result<Commit, ClaimError> {
        let name = claim::normalise_name(name)?;
        let owner = self
            .with_claim(claim, |c| c.owner)
            .ok_or(ClaimError::claim_not_found(claim))?;
        if self.name_taken(owner, &name, Some(claim)) {
            return Err(ClaimError::NameTaken(name));
        }
        self.edit(claim, |c| {
            c.name = name;
            Ok(())
        })
    }

    pub fn set_description(&self, claim: ClaimId, description: &str) -> Result<Commit, ClaimError> {
        claim::check_description(description)?;
        self.edit(claim, |c| {
            c.description = description.trim().to_string();
            Ok(())
        })
    }

    pub fn set_icon(&self, claim: ClaimId, icon: &str) -> Result<Commit, ClaimError> {
        self.edit(claim, |c| {
            c.icon = icon.to_string();
            Ok(())
        })
    }

    /// Move the claim's anchor. The new position must be inside the claim and
    /// must not already anchor another claim.
    pub fn move_anchor(&self, claim: ClaimId, to: Position3D) -> Result<Commit, ClaimError> {
        self.mutate(claim, |world| {
            let current = world
                .claim(claim)
                .ok_or(ClaimError::claim_not_found(claim))?;
            if !current.contains(&to) {
                return Err(ClaimError::AnchorOutside);
            }
            if world.claim_by_anchor(&to).is_some_and(|other| other.id != claim) {
                return Err(ClaimError::AnchorOutside);
            }
            world.move_anchor(claim, to);
            Ok(())
        })
    }

    // ── Transfers ────────────────────────────────────────────────────────

    /// Offer the claim to `target`. The policy is asked before the world is
    /// locked; requests are not durable so nothing needs persisting.
    pub fn offer_transfer(
        &self,
        claim: ClaimId,
        target: PlayerId,
        policy: &dyn TransferPolicy,
        now: DateTime<Utc>,
    ) -> Result<Offer, ClaimError> {
        let snapshot = self.claim(claim).ok_or(ClaimError::claim_not_found(claim))?;
        transfer::check_offer(&snapshot, self.pending_transfer(claim).as_ref(), target)?;
        if !policy.can_receive(target, &snapshot) {
            return Err(ClaimError::TransferRefused(target));
        }
        let shard = self.shard_of(claim)?;
        let mut world = shard.write().expect("claim world lock poisoned");
        let (request, superseded) = transfer::offer(&mut world, claim, target, now)?;
        tracing::info!(claim = %claim, from = %request.offered_by, to = %target, "transfer offered");
        Ok(Offer { request, superseded })
    }

    pub fn withdraw_transfer(&self, claim: ClaimId, target: PlayerId) -> Result<TransferRequest, ClaimError> {
        let shard = self.shard_of(claim)?;
        let mut world = shard.write().expect("claim world lock poisoned");
        transfer::withdraw(&mut world, claim, target)
    }

    /// Make `target` the owner, consuming their pending request. Fails with
    /// `NameTaken` if `target` already owns a claim of the same name.
    pub fn accept_transfer(
        &self,
        claim: ClaimId,
        target: PlayerId,
        policy: &dyn TransferPolicy,
    ) -> Result<Commit, ClaimError> {
        let snapshot = self.claim(claim).ok_or(ClaimError::claim_not_found(claim))?;
        transfer::check_pending(self.pending_transfer(claim).as_ref(), claim, target)?;
        if self.name_taken(target, &snapshot.name, Some(claim)) {
            return Err(ClaimError::NameTaken(snapshot.name));
        }
        if !policy.can_receive(target, &snapshot) {
            return Err(ClaimError::TransferRefused(target));
        }
        self.mutate(claim, |world| {
            let request = transfer::accept(world, claim, target)?;
            tracing::info!(claim = %claim, from = %request.offered_by, to = %target, "transfer accepted");
            Ok(())
        })
    }

    /// Drop a timed-out request. Does nothing if it was already answered or
    /// replaced by a newer offer.
    pub fn expire_transfer(
        &self,
        claim: ClaimId,
        target: PlayerId,
        offered_at: DateTime<Utc>,
    ) -> Option<TransferRequest> {
        let shard = self.shard_of(claim).ok()?;
        let mut world = shard.write().expect("claim world lock poisoned");
        transfer::expire(&mut world, claim, target, offered_at)
    }

    // ── Recovery ─────────────────────────────────────────────────────────

    /// Put the claim back the way it was before `commit` was applied.
    ///
    /// A transfer request offered, withdrawn or expired since the commit is
    /// left as it is now; only the commit's own effect on it is undone.
    pub fn rollback(&self, commit: Commit) {
        let Some(shard) = self.shard(commit.world) else {
            return;
        };
        let mut world = shard.write().expect("claim world lock poisoned");
        let current = world.claim(commit.claim).cloned();
        world.restore(commit.claim, commit.before, commit.transfer_after);
        self.reroute(current.as_ref(), world.claim(commit.claim));
        tracing::warn!(claim = %commit.claim, world = %commit.world, "claim mutation rolled back");
    }

    /// Index stored claims, one world per rayon task. Meant for an empty index;
    /// worlds already present are replaced.
    ///
    /// A claim with no partitions, or with a partition overlapping one already
    /// indexed, is skipped and reported rather than failing the whole load.
    pub fn load(&self, claims: Vec<Claim>) -> LoadReport {
        let mut by_world: HashMap<WorldId, Vec<Claim>> = HashMap::new();
        for c in claims {
            by_world.entry(c.world).or_default().push(c);
        }

        let built: Vec<(WorldClaims, Vec<(ClaimId, ClaimError)>)> = by_world
            .into_par_iter()
            .map(|(id, claims)| build_world(id, claims))
            .collect();

        let mut report = LoadReport::default();
        for (world, rejected) in built {
            report.worlds += 1;
            report.claims += world.claim_count();
            report.partitions += world.partition_count();
            report.rejected.extend(rejected);
            for c in world.claims() {
                self.reroute(None, Some(c));
            }
            self.worlds.insert(world.id(), Arc::new(RwLock::new(world)));
        }
        tracing::info!(
            worlds = report.worlds,
            claims = report.claims,
            partitions = report.partitions,
            rejected = report.rejected.len(),
            "claim index loaded"
        );
        report
    }
}

fn build_world(id: WorldId, mut claims: Vec<Claim>) -> (WorldClaims, Vec<(ClaimId, ClaimError)>) {
    // Oldest claims win any conflict.
    claims.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let mut world = WorldClaims::new(id);
    let mut rejected = Vec::new();
    for c in claims {
        if c.partitions.is_empty() {
            tracing::warn!(claim = %c.id, "stored claim has no partitions");
            rejected.push((c.id, ClaimError::Disconnected(c.id)));
            continue;
        }
        let clash = c.partitions.iter().find_map(|p| {
            world
                .grid()
                .overlapping(&p.area)
                .first()
                .map(|slot| ClaimError::Overlap {
                    partition: slot.partition,
                    claim: slot.claim,
                })
        });
        if let Some(err) = clash {
            tracing::warn!(claim = %c.id, error = %err, "stored claim overlaps an indexed claim");
            rejected.push((c.id, err));
            continue;
        }
        if !c.is_connected() {
            tracing::warn!(claim = %c.id, "stored claim is not connected; indexing anyway");
        }
        world.insert_claim(c);
    }
    (world, rejected)
}

impl Default for ClaimIndex {
    fn default() -> Self {
        Self::new()
    }
}
