//! Claim-change event bus.
//!
//! Every committed claim mutation and every transfer-request transition is
//! published as a [`ClaimEvent`] on a shared `tokio::sync::broadcast`
//! channel. Boundary renderers, chat notifiers and the dashboard subscribe.

use std::sync::Arc;

use claims_engine::{Change, ClaimId, PlayerId, TransferRequest, WorldId};

/// Recommended capacity for the broadcast channel.
pub const BUS_CAPACITY: usize = 256;

/// Who caused a change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeSource {
    Player(PlayerId),
}

/// The durable changes of one committed mutation.
///
/// Uses `Arc<[...]>` so cloning per subscriber is just a refcount bump.
#[derive(Clone, Debug)]
pub struct ClaimChangeBatch {
    pub source: ChangeSource,
    pub world: WorldId,
    pub claim: ClaimId,
    pub changes: Arc<[Change]>,
}

/// Why a transfer request stopped being pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEnd {
    Accepted,
    Withdrawn,
    Superseded,
    Expired,
}

#[derive(Clone, Debug)]
pub enum ClaimEvent {
    Committed(ClaimChangeBatch),
    TransferOffered(TransferRequest),
    TransferClosed {
        request: TransferRequest,
        reason: TransferEnd,
    },
}

impl ClaimEvent {
    pub fn claim(&self) -> ClaimId {
        match self {
            ClaimEvent::Committed(batch) => batch.claim,
            ClaimEvent::TransferOffered(request) => request.claim,
            ClaimEvent::TransferClosed { request, .. } => request.claim,
        }
    }

    /// Short name used by the dashboard feed.
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimEvent::Committed(_) => "committed",
            ClaimEvent::TransferOffered(_) => "transfer_offered",
            ClaimEvent::TransferClosed { .. } => "transfer_closed",
        }
    }
}
