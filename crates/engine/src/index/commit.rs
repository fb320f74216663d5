use serde::{Deserialize, Serialize};

use super::world::ClaimState;
use crate::claim::{Claim, ClaimRecord, Flag, Partition, Permission};
use crate::ids::{ClaimId, PartitionId, PlayerId, WorldId};
use crate::transfer::TransferRequest;

/// Who a permission is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    Player(PlayerId),
    /// Every visitor that is not the owner.
    Everyone,
}

/// One durable write implied by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    ClaimSaved(ClaimRecord),
    /// Cascades to the claim's partitions, grants and flags.
    ClaimDeleted(ClaimId),
    PartitionSaved(Partition),
    PartitionDeleted(PartitionId),
    FlagSet {
        claim: ClaimId,
        flag: Flag,
        enabled: bool,
    },
    PermissionSet {
        claim: ClaimId,
        grantee: Grantee,
        permission: Permission,
        granted: bool,
    },
}

/// A mutation that has been applied in memory.
///
/// It carries the durable changes to write and the prior state so the index
/// can be put back if the write fails. An empty change list means the
/// mutation had no effect (an idempotent grant, say) or only touched
/// ephemeral state.
#[derive(Debug)]
#[must_use = "a commit must be persisted or rolled back"]
pub struct Commit {
    pub(crate) world: WorldId,
    pub(crate) claim: ClaimId,
    pub(crate) before: Option<ClaimState>,
    /// The pending request as the mutation left it.
    pub(crate) transfer_after: Option<TransferRequest>,
    changes: Vec<Change>,
    inverse: Vec<Change>,
}

impl Commit {
    pub(crate) fn new(
        world: WorldId,
        claim: ClaimId,
        before: Option<ClaimState>,
        after: Option<&Claim>,
        transfer_after: Option<TransferRequest>,
    ) -> Self {
        let prior = before.as_ref().map(|s| &s.claim);
        Self {
            world,
            claim,
            changes: diff(prior, after),
            inverse: diff(after, prior),
            before,
            transfer_after,
        }
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn claim(&self) -> ClaimId {
        self.claim
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Writes that undo `changes`, for repairing storage after a partial write.
    pub fn inverse(&self) -> &[Change] {
        &self.inverse
    }

    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Durable writes that turn `before` into `after`.
pub fn diff(before: Option<&Claim>, after: Option<&Claim>) -> Vec<Change> {
    match (before, after) {
        (None, None) => Vec::new(),
        (Some(old), None) => vec![Change::ClaimDeleted(old.id)],
        (None, Some(new)) => created(new),
        (Some(old), Some(new)) => updated(old, new),
    }
}

fn created(claim: &Claim) -> Vec<Change> {
    let mut out = vec![Change::ClaimSaved(claim.record())];
    out.extend(claim.partitions.iter().copied().map(Change::PartitionSaved));
    out.extend(claim.flags.iter().map(|&flag| Change::FlagSet {
        claim: claim.id,
        flag,
        enabled: true,
    }));
    for (grantee, permission) in grants(claim) {
        out.push(Change::PermissionSet {
            claim: claim.id,
            grantee,
            permission,
            granted: true,
        });
    }
    out
}

fn updated(old: &Claim, new: &Claim) -> Vec<Change> {
    let mut out = Vec::new();

    let record = new.record();
    if old.record() != record {
        out.push(Change::ClaimSaved(record));
    }

    for partition in &new.partitions {
        if old.partition(partition.id) != Some(partition) {
            out.push(Change::PartitionSaved(*partition));
        }
    }
    for partition in &old.partitions {
        if new.partition(partition.id).is_none() {
            out.push(Change::PartitionDeleted(partition.id));
        }
    }

    for &flag in new.flags.difference(&old.flags) {
        out.push(Change::FlagSet {
            claim: new.id,
            flag,
            enabled: true,
        });
    }
    for &flag in old.flags.difference(&new.flags) {
        out.push(Change::FlagSet {
            claim: new.id,
            flag,
            enabled: false,
        });
    }

    let old_grants: std::collections::BTreeSet<_> = grants(old).collect();
    let new_grants: std::collections::BTreeSet<_> = grants(new).collect();
    for &(grantee, permission) in new_grants.difference(&old_grants) {
        out.push(Change::PermissionSet {
            claim: new.id,
            grantee,
            permission,
            granted: true,
        });
    }
    for &(grantee, permission) in old_grants.difference(&new_grants) {
        out.push(Change::PermissionSet {
            claim: new.id,
            grantee,
            permission,
            granted: false,
        });
    }

    out
}

fn grants(claim: &Claim) -> impl Iterator<Item = (Grantee, Permission)> + '_ {
    let players = claim
        .player_permissions
        .iter()
        .flat_map(|(player, set)| set.iter().map(move |&p| (Grantee::Player(*player), p)));
    let everyone = claim
        .claim_permissions
        .iter()
        .map(|&p| (Grantee::Everyone, p));
    players.chain(everyone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Area, Position3D};

    fn claim() -> Claim {
        Claim::new(
            WorldId::new(),
            PlayerId::new(),
            "Field".into(),
            Position3D::new(0, 64, 0),
            Area::new((0, 0), (10, 10)),
        )
    }

    #[test]
    fn unchanged_claim_has_no_changes() {
        let c = claim();
        assert!(diff(Some(&c), Some(&c)).is_empty());
    }

    #[test]
    fn new_claim_writes_record_and_partitions() {
        let c = claim();
        let changes = diff(None, Some(&c));
        assert!(matches!(changes[0], Change::ClaimSaved(ref r) if r.id == c.id));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn deletion_is_a_single_cascade() {
        let c = claim();
        assert_eq!(diff(Some(&c), None), vec![Change::ClaimDeleted(c.id)]);
    }

    #[test]
    fn grant_and_flag_edits_are_itemised() {
        let old = claim();
        let mut new = old.clone();
        let friend = PlayerId::new();
        new.grant_player(friend, Permission::Build);
        new.grant_claim_wide(Permission::DoorUse);
        new.set_flag(Flag::Pvp, true);

        let changes = diff(Some(&old), Some(&new));
        assert_eq!(changes.len(), 3);
        assert!(changes.contains(&Change::PermissionSet {
            claim: old.id,
            grantee: Grantee::Player(friend),
            permission: Permission::Build,
            granted: true,
        }));
        assert!(changes.contains(&Change::FlagSet {
            claim: old.id,
            flag: Flag::Pvp,
            enabled: true,
        }));

        let undo = diff(Some(&new), Some(&old));
        assert_eq!(undo.len(), 3);
        assert!(undo.contains(&Change::PermissionSet {
            claim: old.id,
            grantee: Grantee::Everyone,
            permission: Permission::DoorUse,
            granted: false,
        }));
    }

    #[test]
    fn partition_resize_is_a_save() {
        let old = claim();
        let mut new = old.clone();
        new.partitions[0].area = Area::new((0, 0), (12, 10));
        assert_eq!(diff(Some(&old), Some(&new)), vec![Change::PartitionSaved(new.partitions[0])]);
    }
}
