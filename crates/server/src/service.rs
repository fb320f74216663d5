//! Claim management actions.
//!
//! This is the surface command handlers and menus call. Every action checks
//! the caller's rights, runs the engine operation, persists the resulting
//! commit and publishes it on the event bus. Mutations on one world are
//! serialised by an async gate held until the write has landed, so a
//! rollback after a failed write never races another writer or an expiring
//! transfer request.
//!
//! Claim counts and names are checked across every world, so actions that
//! give a player a claim or a name also take that player's gate first. The
//! owner gate is always taken before a world gate.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use claims_engine::access;
use claims_engine::timer::{TimerId, TimerQueue};
use claims_engine::{
    Area, Authority, BlockAllowance, Change, Claim, ClaimDraft, ClaimError, ClaimId, ClaimIndex, Commit, Decision, Flag,
    Partition, PartitionId, Permission, PlacementRules, PlayerId, Position3D, TransferPolicy,
    TransferRequest, WorldId,
};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ClaimsConfig;
use crate::dashboard::Metrics;
use crate::event_bus::{ChangeSource, ClaimChangeBatch, ClaimEvent, TransferEnd};
use crate::player_state::PlayerStateRegistry;
use crate::rules::{self, RuleContext, RuleSet, WorldEvent};
use crate::services::{ClaimCapPolicy, ConfiguredAllowance, Limits, PlayerMetadata, WorldManipulation};
use crate::writer::{WriteError, WriterHandle};

/// What a refused caller was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Required {
    Owner,
    Permission(Permission),
}

impl fmt::Display for Required {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Required::Owner => f.write_str("ownership"),
            Required::Permission(p) => write!(f, "the {p} permission"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("player {player} needs {required} on claim {claim}")]
    PermissionDenied {
        player: PlayerId,
        claim: ClaimId,
        required: Required,
    },

    #[error("area is outside the world border")]
    OutsideWorldBorder,

    #[error("claim limit of {limit} reached")]
    ClaimLimitReached { limit: usize },

    #[error("failed to persist claim change: {0}")]
    Persistence(#[from] WriteError),
}

/// Read-only summary of a claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimDetails {
    pub id: ClaimId,
    pub world: WorldId,
    pub owner: PlayerId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub anchor: Position3D,
    pub created_at: DateTime<Utc>,
    pub block_count: i64,
    pub partitions: Vec<Area>,
    pub flags: Vec<Flag>,
}

impl From<&Claim> for ClaimDetails {
    fn from(claim: &Claim) -> Self {
        Self {
            id: claim.id,
            world: claim.world,
            owner: claim.owner,
            name: claim.name.clone(),
            description: claim.description.clone(),
            icon: claim.icon.clone(),
            anchor: claim.anchor,
            created_at: claim.created_at,
            block_count: claim.block_count(),
            partitions: claim.areas(),
            flags: claim.flags().iter().copied().collect(),
        }
    }
}

/// Collaborators wired in by the composition root.
pub struct ServiceDeps {
    pub index: Arc<ClaimIndex>,
    pub writer: WriterHandle,
    pub players: Arc<PlayerStateRegistry>,
    pub world: Arc<dyn WorldManipulation>,
    pub metadata: Arc<dyn PlayerMetadata>,
    pub metrics: Arc<Metrics>,
    pub bus: broadcast::Sender<ClaimEvent>,
}

#[derive(Default)]
struct Expiries {
    queue: TimerQueue<TransferRequest>,
    by_claim: HashMap<ClaimId, TimerId>,
}

pub struct ClaimService {
    index: Arc<ClaimIndex>,
    writer: WriterHandle,
    players: Arc<PlayerStateRegistry>,
    world: Arc<dyn WorldManipulation>,
    metrics: Arc<Metrics>,
    bus: broadcast::Sender<ClaimEvent>,
    config: ClaimsConfig,
    rules: PlacementRules,
    limits: Limits,
    allowance: ConfiguredAllowance,
    policy: ClaimCapPolicy,
    protection: RuleSet,
    gates: DashMap<WorldId, Arc<tokio::sync::Mutex<()>>>,
    owners: DashMap<PlayerId, Arc<tokio::sync::Mutex<()>>>,
    expiries: Mutex<Expiries>,
}

impl ClaimService {
    pub fn new(config: ClaimsConfig, deps: ServiceDeps) -> Self {
        let limits = Limits::new(&config, deps.metadata);
        Self {
            allowance: ConfiguredAllowance::new(Arc::clone(&deps.index), limits.clone()),
            policy: ClaimCapPolicy::new(Arc::clone(&deps.index), limits.clone()),
            limits,
            rules: config.placement_rules(),
            config,
            index: deps.index,
            writer: deps.writer,
            players: deps.players,
            world: deps.world,
            metrics: deps.metrics,
            bus: deps.bus,
            protection: rules::standard(),
            gates: DashMap::new(),
            owners: DashMap::new(),
            expiries: Mutex::new(Expiries::default()),
        }
    }

    pub fn index(&self) -> &Arc<ClaimIndex> {
        &self.index
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn players(&self) -> &Arc<PlayerStateRegistry> {
        &self.players
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClaimEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> broadcast::Sender<ClaimEvent> {
        self.bus.clone()
    }

    fn gate(&self, world: WorldId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.gates.entry(world).or_default().value())
    }

    fn owner_gate(&self, player: PlayerId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.owners.entry(player).or_default().value())
    }

    fn world_of(&self, claim: ClaimId) -> Result<WorldId, ActionError> {
        self.index
            .world_of(claim)
            .ok_or(ActionError::Claim(ClaimError::claim_not_found(claim)))
    }

    fn partition_of(&self, partition: PartitionId) -> Result<Partition, ActionError> {
        self.index
            .partition(partition)
            .ok_or(ActionError::Claim(ClaimError::partition_not_found(partition)))
    }

    /// Owner, override or an explicit grant of `permission`.
    fn require(&self, claim: ClaimId, actor: PlayerId, permission: Permission) -> Result<(), ActionError> {
        let decision = self
            .index
            .with_claim(claim, |c| access::decide(c, actor, permission, &*self.players))
            .ok_or(ClaimError::claim_not_found(claim))?;
        self.metrics.record_decision(decision);
        if decision.is_allowed() {
            Ok(())
        } else {
            Err(ActionError::PermissionDenied {
                player: actor,
                claim,
                required: Required::Permission(permission),
            })
        }
    }

    /// Owner or override only.
    fn require_owner(&self, claim: ClaimId, actor: PlayerId) -> Result<(), ActionError> {
        let owner = self
            .index
            .with_claim(claim, |c| c.owner)
            .ok_or(ClaimError::claim_not_found(claim))?;
        if owner == actor {
            return Ok(());
        }
        if self.players.has_override(actor) {
            tracing::info!(target: "audit", player = %actor, claim = %claim, "owner action taken by override");
            return Ok(());
        }
        Err(ActionError::PermissionDenied {
            player: actor,
            claim,
            required: Required::Owner,
        })
    }

    fn require_inside_border(&self, world: WorldId, area: &Area) -> Result<(), ActionError> {
        if self.world.is_inside_world_border(world, area) {
            Ok(())
        } else {
            Err(ActionError::OutsideWorldBorder)
        }
    }

    /// Run `op` behind the world's gate, persist its commit and publish it.
    ///
    /// A failed write rolls the index back and makes a best-effort attempt to
    /// undo whatever part of the write did land.
    async fn commit<F>(&self, source: ChangeSource, world: WorldId, op: F) -> Result<ClaimChangeBatch, ActionError>
    where
        F: FnOnce(&ClaimIndex) -> Result<Commit, ActionError>,
    {
        let gate = self.gate(world);
        let _held = gate.lock().await;

        let commit = op(&self.index).inspect_err(|_| self.metrics.record_rejection())?;
        let batch = ClaimChangeBatch {
            source,
            world: commit.world(),
            claim: commit.claim(),
            changes: commit.changes().into(),
        };
        if commit.is_noop() {
            return Ok(batch);
        }

        if let Err(e) = self.writer.write(commit.changes().to_vec()).await {
            let inverse = commit.inverse().to_vec();
            self.index.rollback(commit);
            self.metrics.record_rollback();
            if let Err(repair) = self.writer.write(inverse).await {
                tracing::error!(claim = %batch.claim, "Could not undo partial claim write: {}", repair);
            }
            return Err(ActionError::Persistence(e));
        }

        self.metrics.record_commit();
        let _ = self.bus.send(ClaimEvent::Committed(batch.clone()));
        Ok(batch)
    }

    /// Shorthand for actions that edit an existing claim after a permission check.
    async fn edit<F>(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        permission: Permission,
        op: F,
    ) -> Result<ClaimChangeBatch, ActionError>
    where
        F: FnOnce(&ClaimIndex) -> Result<Commit, ClaimError>,
    {
        let world = self.world_of(claim)?;
        self.commit(ChangeSource::Player(actor), world, |index| {
            self.require(claim, actor, permission)?;
            Ok(op(index)?)
        })
        .await
    }

    // ── Claims ───────────────────────────────────────────────────────────

    /// Create a claim around `anchor`, sized by the configured initial radius.
    pub async fn create_claim(
        &self,
        actor: PlayerId,
        world: WorldId,
        name: &str,
        anchor: Position3D,
    ) -> Result<ClaimId, ActionError> {
        let area = Area::from_centre(anchor, self.config.initial_claim_radius);
        self.require_inside_border(world, &area)?;
        let owner_gate = self.owner_gate(actor);
        let _owner = owner_gate.lock().await;
        let batch = self
            .commit(ChangeSource::Player(actor), world, |index| {
                let limit = self.limits.claim_limit(actor);
                if index.claim_count_owned_by(actor) >= limit {
                    return Err(ActionError::ClaimLimitReached { limit });
                }
                let draft = ClaimDraft {
                    world,
                    owner: actor,
                    name: name.to_string(),
                    anchor,
                    area,
                };
                Ok(index.create_claim(draft, &self.rules, &self.allowance)?)
            })
            .await?;
        tracing::info!(claim = %batch.claim, owner = %actor, "Claim created");
        Ok(batch.claim)
    }

    /// Whether a claim anchored at `anchor` could be created right now.
    pub fn is_new_claim_location_valid(&self, world: WorldId, anchor: Position3D) -> bool {
        let area = Area::from_centre(anchor, self.config.initial_claim_radius);
        self.world.is_inside_world_border(world, &area)
            && self.index.check_placement(world, &area, &self.rules).is_ok()
    }

    pub fn claim_at(&self, world: WorldId, pos: &Position3D) -> Option<Claim> {
        let started = Instant::now();
        let claim = self.index.claim_at(world, pos);
        self.metrics.record_lookup(started.elapsed());
        claim
    }

    pub fn claim_details(&self, claim: ClaimId) -> Option<ClaimDetails> {
        self.index.with_claim(claim, |c| ClaimDetails::from(c))
    }

    pub fn player_claims(&self, player: PlayerId) -> Vec<ClaimDetails> {
        self.index
            .claims_owned_by(player)
            .iter()
            .map(ClaimDetails::from)
            .collect()
    }

    pub fn claim_block_count(&self, claim: ClaimId) -> Option<i64> {
        self.index.with_claim(claim, Claim::block_count)
    }

    // ── Anchor ───────────────────────────────────────────────────────────

    pub fn claim_by_anchor(&self, world: WorldId, pos: &Position3D) -> Option<Claim> {
        self.index.claim_by_anchor(world, pos)
    }

    /// Breaking a claim's anchor deletes the claim. Returns the deleted claim,
    /// or `None` if no claim is anchored at `pos`.
    pub async fn break_anchor(
        &self,
        actor: PlayerId,
        world: WorldId,
        pos: Position3D,
    ) -> Result<Option<ClaimId>, ActionError> {
        let Some(claim) = self.index.claim_by_anchor(world, &pos).map(|c| c.id) else {
            return Ok(None);
        };
        self.commit(ChangeSource::Player(actor), world, |index| {
            self.require_owner(claim, actor)?;
            Ok(index.delete_claim(claim)?)
        })
        .await?;
        self.world.break_without_item_drop(world, pos);
        self.forget_expiry(claim);
        tracing::info!(claim = %claim, player = %actor, "Claim deleted by breaking its anchor");
        Ok(Some(claim))
    }

    pub async fn move_anchor(&self, actor: PlayerId, claim: ClaimId, to: Position3D) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManageMetadata, |index| index.move_anchor(claim, to))
            .await
            .map(drop)
    }

    // ── Metadata ─────────────────────────────────────────────────────────

    pub async fn rename_claim(&self, actor: PlayerId, claim: ClaimId, name: &str) -> Result<(), ActionError> {
        let owner = self
            .index
            .with_claim(claim, |c| c.owner)
            .ok_or(ClaimError::claim_not_found(claim))?;
        let owner_gate = self.owner_gate(owner);
        let _owner = owner_gate.lock().await;
        self.edit(actor, claim, Permission::ManageMetadata, |index| index.rename(claim, name))
            .await
            .map(drop)
    }

    pub async fn set_description(&self, actor: PlayerId, claim: ClaimId, text: &str) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManageMetadata, |index| {
            index.set_description(claim, text)
        })
        .await
        .map(drop)
    }

    pub async fn set_icon(&self, actor: PlayerId, claim: ClaimId, icon: &str) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManageMetadata, |index| index.set_icon(claim, icon))
            .await
            .map(drop)
    }

    // ── Flags ────────────────────────────────────────────────────────────

    pub async fn set_flag(&self, actor: PlayerId, claim: ClaimId, flag: Flag, enabled: bool) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManageFlags, |index| {
            index.set_flag(claim, flag, enabled)
        })
        .await
        .map(drop)
    }

    pub async fn set_all_flags(&self, actor: PlayerId, claim: ClaimId, enabled: bool) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManageFlags, |index| {
            index.set_all_flags(claim, enabled)
        })
        .await
        .map(drop)
    }

    pub fn claim_flags(&self, claim: ClaimId) -> Option<BTreeSet<Flag>> {
        self.index.with_claim(claim, |c| c.flags().clone())
    }

    pub fn has_flag(&self, claim: ClaimId, flag: Flag) -> bool {
        self.index
            .with_claim(claim, |c| c.has_flag(flag))
            .unwrap_or(false)
    }

    // ── Partitions ───────────────────────────────────────────────────────

    pub async fn create_partition(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        world: WorldId,
        area: Area,
    ) -> Result<PartitionId, ActionError> {
        self.require_inside_border(world, &area)?;
        let batch = self
            .edit(actor, claim, Permission::ManagePartitions, |index| {
                index.create_partition(claim, world, area, &self.rules, &self.allowance)
            })
            .await?;
        batch
            .changes
            .iter()
            .find_map(|c| match c {
                Change::PartitionSaved(p) => Some(p.id),
                _ => None,
            })
            .ok_or(ActionError::Claim(ClaimError::claim_not_found(claim)))
    }

    pub async fn resize_partition(&self, actor: PlayerId, partition: PartitionId, area: Area) -> Result<(), ActionError> {
        let current = self.partition_of(partition)?;
        self.require_inside_border(current.world, &area)?;
        self.edit(actor, current.claim, Permission::ManagePartitions, |index| {
            index.resize_partition(partition, area, &self.rules, &self.allowance)
        })
        .await
        .map(drop)
    }

    /// Remove a partition; removing the last one deletes the claim.
    pub async fn remove_partition(&self, actor: PlayerId, partition: PartitionId) -> Result<(), ActionError> {
        let current = self.partition_of(partition)?;
        let batch = self
            .edit(actor, current.claim, Permission::ManagePartitions, |index| {
                index.remove_partition(partition)
            })
            .await?;
        if batch.changes.iter().any(|c| matches!(c, Change::ClaimDeleted(_))) {
            self.forget_expiry(current.claim);
        }
        Ok(())
    }

    pub fn can_remove_partition(&self, partition: PartitionId) -> Result<bool, ActionError> {
        Ok(self.index.can_remove_partition(partition)?)
    }

    pub fn partition_at(&self, world: WorldId, pos: &Position3D) -> Option<Partition> {
        let started = Instant::now();
        let partition = self.index.find_at(world, pos);
        self.metrics.record_lookup(started.elapsed());
        partition
    }

    pub fn claim_partitions(&self, claim: ClaimId) -> Vec<Partition> {
        self.index
            .with_claim(claim, |c| c.partitions().to_vec())
            .unwrap_or_default()
    }

    // ── Permissions ──────────────────────────────────────────────────────

    pub async fn grant_player_permission(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        player: PlayerId,
        permission: Permission,
    ) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.grant_player_permission(claim, player, permission)
        })
        .await
        .map(drop)
    }

    pub async fn revoke_player_permission(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        player: PlayerId,
        permission: Permission,
    ) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.revoke_player_permission(claim, player, permission)
        })
        .await
        .map(drop)
    }

    pub async fn grant_all_player_permissions(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        player: PlayerId,
    ) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.grant_all_player_permissions(claim, player)
        })
        .await
        .map(drop)
    }

    pub async fn revoke_all_player_permissions(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        player: PlayerId,
    ) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.revoke_all_player_permissions(claim, player)
        })
        .await
        .map(drop)
    }

    pub async fn grant_claim_permission(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        permission: Permission,
    ) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.grant_claim_permission(claim, permission)
        })
        .await
        .map(drop)
    }

    pub async fn revoke_claim_permission(
        &self,
        actor: PlayerId,
        claim: ClaimId,
        permission: Permission,
    ) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.revoke_claim_permission(claim, permission)
        })
        .await
        .map(drop)
    }

    pub async fn grant_all_claim_permissions(&self, actor: PlayerId, claim: ClaimId) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.grant_all_claim_permissions(claim)
        })
        .await
        .map(drop)
    }

    pub async fn revoke_all_claim_permissions(&self, actor: PlayerId, claim: ClaimId) -> Result<(), ActionError> {
        self.edit(actor, claim, Permission::ManagePermissions, |index| {
            index.revoke_all_claim_permissions(claim)
        })
        .await
        .map(drop)
    }

    pub fn player_permissions(&self, claim: ClaimId, player: PlayerId) -> BTreeSet<Permission> {
        self.index
            .with_claim(claim, |c| c.player_permissions(player))
            .unwrap_or_default()
    }

    pub fn claim_permissions(&self, claim: ClaimId) -> BTreeSet<Permission> {
        self.index
            .with_claim(claim, |c| c.claim_wide_permissions().clone())
            .unwrap_or_default()
    }

    pub fn players_with_permissions(&self, claim: ClaimId) -> Vec<(PlayerId, BTreeSet<Permission>)> {
        self.index
            .with_claim(claim, |c| {
                c.players_with_permissions()
                    .map(|(p, set)| (p, set.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Protection ───────────────────────────────────────────────────────

    pub fn check_player_action(
        &self,
        world: WorldId,
        pos: &Position3D,
        actor: PlayerId,
        permission: Permission,
    ) -> Decision {
        let started = Instant::now();
        let decision = self
            .index
            .check_player_action_at(world, pos, actor, permission, &*self.players);
        self.metrics.record_lookup(started.elapsed());
        self.metrics.record_decision(decision);
        decision
    }

    pub fn check_world_action(&self, world: WorldId, pos: &Position3D, flag: Flag) -> bool {
        let started = Instant::now();
        let allowed = self.index.check_world_action_at(world, pos, flag);
        self.metrics.record_lookup(started.elapsed());
        self.metrics.record_flag_check(allowed);
        allowed
    }

    /// Whether the protection rules let `event` happen.
    pub fn protect(&self, event: &WorldEvent) -> bool {
        let ctx = RuleContext {
            index: &self.index,
            authority: &*self.players,
            metrics: &self.metrics,
        };
        self.protection.evaluate(&ctx, event)
    }

    // ── Transfers ────────────────────────────────────────────────────────

    /// Offer the claim to `target`. The offer lapses after the configured time.
    pub async fn offer_transfer(&self, actor: PlayerId, claim: ClaimId, target: PlayerId) -> Result<(), ActionError> {
        let world = self.world_of(claim)?;
        let gate = self.gate(world);
        let _held = gate.lock().await;

        self.require_owner(claim, actor)?;
        let offer = self
            .index
            .offer_transfer(claim, target, &self.policy, Utc::now())
            .inspect_err(|_| self.metrics.record_rejection())?;

        self.schedule_expiry(offer.request);
        if let Some(old) = offer.superseded {
            let _ = self.bus.send(ClaimEvent::TransferClosed {
                request: old,
                reason: TransferEnd::Superseded,
            });
        }
        let _ = self.bus.send(ClaimEvent::TransferOffered(offer.request));
        Ok(())
    }

    /// `actor` takes ownership by answering the request addressed to them.
    pub async fn accept_transfer(&self, actor: PlayerId, claim: ClaimId) -> Result<(), ActionError> {
        let world = self.world_of(claim)?;
        let owner_gate = self.owner_gate(actor);
        let _owner = owner_gate.lock().await;
        let request = self.index.pending_transfer(claim);
        self.commit(ChangeSource::Player(actor), world, |index| {
            Ok(index.accept_transfer(claim, actor, &self.policy)?)
        })
        .await?;
        self.forget_expiry(claim);
        if let Some(request) = request.filter(|r| r.target == actor) {
            let _ = self.bus.send(ClaimEvent::TransferClosed {
                request,
                reason: TransferEnd::Accepted,
            });
        }
        tracing::info!(claim = %claim, new_owner = %actor, "Claim transferred");
        Ok(())
    }

    pub async fn withdraw_transfer(&self, actor: PlayerId, claim: ClaimId, target: PlayerId) -> Result<(), ActionError> {
        let world = self.world_of(claim)?;
        let gate = self.gate(world);
        let _held = gate.lock().await;

        self.require_owner(claim, actor)?;
        let request = self
            .index
            .withdraw_transfer(claim, target)
            .inspect_err(|_| self.metrics.record_rejection())?;
        self.forget_expiry(claim);
        let _ = self.bus.send(ClaimEvent::TransferClosed {
            request,
            reason: TransferEnd::Withdrawn,
        });
        Ok(())
    }

    pub fn can_receive(&self, target: PlayerId, claim: ClaimId) -> bool {
        self.index
            .claim(claim)
            .is_some_and(|c| self.policy.can_receive(target, &c))
    }

    pub fn has_transfer_request(&self, claim: ClaimId, player: PlayerId) -> bool {
        self.index
            .player_access(claim, player)
            .is_ok_and(|a| a.has_transfer_request)
    }

    fn schedule_expiry(&self, request: TransferRequest) {
        let deadline = request.offered_at + self.config.transfer_request_ttl();
        let mut expiries = self.expiries.lock().expect("expiry queue poisoned");
        let id = expiries.queue.schedule(deadline, request);
        if let Some(old) = expiries.by_claim.insert(request.claim, id) {
            expiries.queue.cancel(old);
        }
    }

    fn forget_expiry(&self, claim: ClaimId) {
        let mut expiries = self.expiries.lock().expect("expiry queue poisoned");
        if let Some(id) = expiries.by_claim.remove(&claim) {
            expiries.queue.cancel(id);
        }
    }

    /// Drop every transfer request whose time is up. Returns how many lapsed.
    ///
    /// Each request is dropped behind its world's gate, so it cannot lapse
    /// while a write on the same world is still waiting to land.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> usize {
        let due = {
            let mut expiries = self.expiries.lock().expect("expiry queue poisoned");
            let due = expiries.queue.pop_due(now);
            for request in &due {
                if expiries
                    .by_claim
                    .get(&request.claim)
                    .is_some_and(|id| !expiries.queue.is_pending(*id))
                {
                    expiries.by_claim.remove(&request.claim);
                }
            }
            due
        };

        let mut expired = 0;
        for request in due {
            let Some(world) = self.index.world_of(request.claim) else {
                continue;
            };
            let gate = self.gate(world);
            let _held = gate.lock().await;
            if self
                .index
                .expire_transfer(request.claim, request.target, request.offered_at)
                .is_some()
            {
                expired += 1;
                self.metrics.record_expiry();
                tracing::info!(claim = %request.claim, target = %request.target, "Transfer request expired");
                let _ = self.bus.send(ClaimEvent::TransferClosed {
                    request,
                    reason: TransferEnd::Expired,
                });
            }
        }
        expired
    }

    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.expiries
            .lock()
            .expect("expiry queue poisoned")
            .queue
            .next_deadline()
    }

    // ── Player ───────────────────────────────────────────────────────────

    pub fn toggle_override(&self, player: PlayerId) -> bool {
        self.players.toggle_override(player)
    }

    pub fn remaining_blocks(&self, player: PlayerId) -> i64 {
        self.allowance.remaining_blocks(player)
    }

    pub fn claim_limit(&self, player: PlayerId) -> usize {
        self.limits.claim_limit(player)
    }
}
