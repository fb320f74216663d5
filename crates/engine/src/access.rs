//! Permission and flag resolution.
//!
//! The resolver only answers yes or no. Turning a "no" into an error for the
//! player is the calling layer's job.

use crate::claim::{Claim, Flag, Permission};
use crate::ids::PlayerId;

/// Server-wide authority able to bypass claim permissions.
pub trait Authority: Send + Sync {
    fn has_override(&self, player: PlayerId) -> bool;
}

/// No player holds an override.
pub struct NoOverrides;

impl Authority for NoOverrides {
    fn has_override(&self, _player: PlayerId) -> bool {
        false
    }
}

/// Outcome of a player check, with the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The position is not inside any claim.
    Unclaimed,
    Owner,
    Override,
    PlayerGrant,
    ClaimWide,
    Denied,
}

impl Decision {
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied)
    }
}

/// Decide whether `actor` may perform `permission` inside `claim`.
///
/// Precedence: owner, then override (audited), then explicit grants.
pub fn decide(
    claim: &Claim,
    actor: PlayerId,
    permission: Permission,
    authority: &dyn Authority,
) -> Decision {
    if actor == claim.owner {
        return Decision::Owner;
    }
    if authority.has_override(actor) {
        tracing::info!(
            target: "audit",
            player = %actor,
            claim = %claim.id,
            owner = %claim.owner,
            permission = %permission,
            "claim override used"
        );
        return Decision::Override;
    }
    if claim
        .player_permissions
        .get(&actor)
        .is_some_and(|set| set.contains(&permission))
    {
        return Decision::PlayerGrant;
    }
    if claim.claim_permissions.contains(&permission) {
        return Decision::ClaimWide;
    }
    Decision::Denied
}

pub fn is_player_action_allowed(
    claim: &Claim,
    actor: PlayerId,
    permission: Permission,
    authority: &dyn Authority,
) -> bool {
    decide(claim, actor, permission, authority).is_allowed()
}

/// Passive world events (explosions, fire spread) have no actor; only the
/// claim's flags decide.
pub fn is_world_action_allowed(claim: &Claim, flag: Flag) -> bool {
    claim.has_flag(flag)
}
