//! Ownership transfer requests.
//!
//! ```text
//! NoRequest --offer--> Offered --accept---> Accepted
//!                         |----withdraw--> Withdrawn
//!                         |----offer(other target)--> Superseded
//!                         `----expire---> Expired
//! ```
//!
//! A claim has at most one pending request. Requests are ephemeral and are
//! never written to the repositories.

use chrono::{DateTime, Utc};

use crate::claim::Claim;
use crate::error::ClaimError;
use crate::ids::{ClaimId, PlayerId};
use crate::index::world::WorldClaims;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub claim: ClaimId,
    pub offered_by: PlayerId,
    pub target: PlayerId,
    pub offered_at: DateTime<Utc>,
}

/// Per-player view of a claim, separate from permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerAccess {
    pub claim: ClaimId,
    pub player: PlayerId,
    pub has_transfer_request: bool,
}

/// Decides whether a player may become the owner of a claim.
pub trait TransferPolicy: Send + Sync {
    fn can_receive(&self, target: PlayerId, claim: &Claim) -> bool;
}

/// Any player may receive any claim.
pub struct OpenTransfers;

impl TransferPolicy for OpenTransfers {
    fn can_receive(&self, _target: PlayerId, _claim: &Claim) -> bool {
        true
    }
}

/// Checks shared by offer: the target is not the owner and is not already the
/// pending target.
pub(crate) fn check_offer(
    claim: &Claim,
    pending: Option<&TransferRequest>,
    target: PlayerId,
) -> Result<(), ClaimError> {
    if target == claim.owner {
        return Err(ClaimError::AlreadyOwner(target));
    }
    if pending.is_some_and(|r| r.target == target) {
        return Err(ClaimError::AlreadyRequested(target));
    }
    Ok(())
}

pub(crate) fn check_pending(
    pending: Option<&TransferRequest>,
    claim: ClaimId,
    target: PlayerId,
) -> Result<TransferRequest, ClaimError> {
    match pending {
        Some(request) if request.target == target => Ok(*request),
        _ => Err(ClaimError::NoSuchRequest {
            claim,
            player: target,
        }),
    }
}

/// Record a new offer, returning the request it superseded.
pub(crate) fn offer(
    world: &mut WorldClaims,
    claim: ClaimId,
    target: PlayerId,
    now: DateTime<Utc>,
) -> Result<(TransferRequest, Option<TransferRequest>), ClaimError> {
    let owner = {
        let current = world
            .claim(claim)
            .ok_or(ClaimError::claim_not_found(claim))?;
        check_offer(current, world.transfer(claim), target)?;
        current.owner
    };
    let request = TransferRequest {
        claim,
        offered_by: owner,
        target,
        offered_at: now,
    };
    let superseded = world.transfers.insert(claim, request);
    if let Some(old) = &superseded {
        tracing::debug!(claim = %claim, old = %old.target, new = %target, "transfer request superseded");
    }
    Ok((request, superseded))
}

pub(crate) fn withdraw(
    world: &mut WorldClaims,
    claim: ClaimId,
    target: PlayerId,
) -> Result<TransferRequest, ClaimError> {
    if world.claim(claim).is_none() {
        return Err(ClaimError::claim_not_found(claim));
    }
    check_pending(world.transfer(claim), claim, target)?;
    world
        .transfers
        .remove(&claim)
        .ok_or(ClaimError::NoSuchRequest {
            claim,
            player: target,
        })
}

/// Hand the claim to `target`. The previous owner keeps no grants and the new
/// owner's explicit grants are dropped since ownership covers them.
pub(crate) fn accept(
    world: &mut WorldClaims,
    claim: ClaimId,
    target: PlayerId,
) -> Result<TransferRequest, ClaimError> {
    if world.claim(claim).is_none() {
        return Err(ClaimError::claim_not_found(claim));
    }
    let request = check_pending(world.transfer(claim), claim, target)?;
    let current = world
        .claim_mut(claim)
        .ok_or(ClaimError::claim_not_found(claim))?;
    let prior = current.owner;
    current.owner = target;
    current.clear_player(prior);
    current.clear_player(target);
    world.transfers.remove(&claim);
    Ok(request)
}

/// Drop the request only if it is still the exact offer that was timed.
pub(crate) fn expire(
    world: &mut WorldClaims,
    claim: ClaimId,
    target: PlayerId,
    offered_at: DateTime<Utc>,
) -> Option<TransferRequest> {
    let still_pending = world
        .transfer(claim)
        .is_some_and(|r| r.target == target && r.offered_at == offered_at);
    if still_pending {
        world.transfers.remove(&claim)
    } else {
        None
    }
}
