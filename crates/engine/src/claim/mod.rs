pub mod connectivity;
pub mod flag;
pub mod partition;
pub mod permission;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClaimError;
use crate::geometry::{Area, Position3D};
use crate::ids::{ClaimId, PartitionId, PlayerId, WorldId};

pub use flag::Flag;
pub use partition::Partition;
pub use permission::Permission;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_DESCRIPTION_LEN: usize = 140;

/// Icon shown for claims that never picked one.
pub const DEFAULT_ICON: &str = "bell";

/// The persisted scalar part of a claim. Partitions, flags and grants live in
/// their own repositories and are joined back together on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: ClaimId,
    pub world: WorldId,
    pub owner: PlayerId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub anchor: Position3D,
    pub created_at: DateTime<Utc>,
}

/// An owned region made of one or more connected partitions.
///
/// Instances handed out by the index are snapshots; mutating one does not
/// touch the live claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub id: ClaimId,
    pub world: WorldId,
    pub owner: PlayerId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub anchor: Position3D,
    pub created_at: DateTime<Utc>,
    pub(crate) partitions: Vec<Partition>,
    pub(crate) flags: BTreeSet<Flag>,
    pub(crate) player_permissions: BTreeMap<PlayerId, BTreeSet<Permission>>,
    pub(crate) claim_permissions: BTreeSet<Permission>,
}

impl Claim {
    /// A claim with a single partition covering `area`.
    pub fn new(world: WorldId, owner: PlayerId, name: String, anchor: Position3D, area: Area) -> Self {
        let id = ClaimId::new();
        Self {
            id,
            world,
            owner,
            name,
            description: String::new(),
            icon: DEFAULT_ICON.to_string(),
            anchor,
            created_at: Utc::now(),
            partitions: vec![Partition::new(id, world, area)],
            flags: BTreeSet::new(),
            player_permissions: BTreeMap::new(),
            claim_permissions: BTreeSet::new(),
        }
    }

    /// Join a stored record with its stored children.
    pub fn assemble(record: ClaimRecord, partitions: Vec<Partition>) -> Self {
        Self {
            id: record.id,
            world: record.world,
            owner: record.owner,
            name: record.name,
            description: record.description,
            icon: record.icon,
            anchor: record.anchor,
            created_at: record.created_at,
            partitions,
            flags: BTreeSet::new(),
            player_permissions: BTreeMap::new(),
            claim_permissions: BTreeSet::new(),
        }
    }

    pub fn record(&self) -> ClaimRecord {
        ClaimRecord {
            id: self.id,
            world: self.world,
            owner: self.owner,
            name: self.name.clone(),
            description: self.description.clone(),
            icon: self.icon.clone(),
            anchor: self.anchor,
            created_at: self.created_at,
        }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.id == id)
    }

    pub fn areas(&self) -> Vec<Area> {
        self.partitions.iter().map(|p| p.area).collect()
    }

    /// Total claim-block cost of all partitions.
    pub fn block_count(&self) -> i64 {
        self.partitions.iter().map(Partition::block_count).sum()
    }

    pub fn contains(&self, pos: &Position3D) -> bool {
        self.partitions.iter().any(|p| p.contains(pos))
    }

    pub fn is_connected(&self) -> bool {
        connectivity::is_connected(&self.areas())
    }

    pub fn flags(&self) -> &BTreeSet<Flag> {
        &self.flags
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Permissions explicitly granted to `player`. Empty for players with no entry.
    pub fn player_permissions(&self, player: PlayerId) -> BTreeSet<Permission> {
        self.player_permissions
            .get(&player)
            .cloned()
            .unwrap_or_default()
    }

    pub fn claim_wide_permissions(&self) -> &BTreeSet<Permission> {
        &self.claim_permissions
    }

    /// Every player with at least one explicit grant.
    pub fn players_with_permissions(&self) -> impl Iterator<Item = (PlayerId, &BTreeSet<Permission>)> {
        self.player_permissions.iter().map(|(p, set)| (*p, set))
    }

    pub(crate) fn grant_player(&mut self, player: PlayerId, permission: Permission) -> bool {
        self.player_permissions
            .entry(player)
            .or_default()
            .insert(permission)
    }

    /// Removes the grant; a player left with no grants loses their entry.
    pub(crate) fn revoke_player(&mut self, player: PlayerId, permission: Permission) -> bool {
        let Some(set) = self.player_permissions.get_mut(&player) else {
            return false;
        };
        let removed = set.remove(&permission);
        if set.is_empty() {
            self.player_permissions.remove(&player);
        }
        removed
    }

    /// Drops every grant held by `player`, returning what was held.
    pub(crate) fn clear_player(&mut self, player: PlayerId) -> BTreeSet<Permission> {
        self.player_permissions.remove(&player).unwrap_or_default()
    }

    pub(crate) fn grant_claim_wide(&mut self, permission: Permission) -> bool {
        self.claim_permissions.insert(permission)
    }

    pub(crate) fn revoke_claim_wide(&mut self, permission: Permission) -> bool {
        self.claim_permissions.remove(&permission)
    }

    pub(crate) fn set_flag(&mut self, flag: Flag, enabled: bool) -> bool {
        if enabled {
            self.flags.insert(flag)
        } else {
            self.flags.remove(&flag)
        }
    }
}

/// Trim and length-check a claim name.
pub fn normalise_name(name: &str) -> Result<String, ClaimError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ClaimError::InvalidName);
    }
    Ok(trimmed.to_string())
}

pub fn check_description(description: &str) -> Result<(), ClaimError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ClaimError::DescriptionTooLong);
    }
    Ok(())
}
