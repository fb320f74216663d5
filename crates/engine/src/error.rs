//! Typed failures returned by claim operations.
//!
//! Every variant is recoverable. Validation failures are detected before any
//! state changes, so an `Err` always means the operation was a no-op.

use crate::claim::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
use crate::ids::{ClaimId, PartitionId, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// The proposed geometry intersects an existing partition.
    #[error("area overlaps partition {partition} of claim {claim}")]
    Overlap {
        partition: PartitionId,
        claim: ClaimId,
    },

    /// The mutation would leave the claim in more than one connected piece,
    /// or a new partition would not touch the claim at all.
    #[error("claim {0} would not remain one connected region")]
    Disconnected(ClaimId),

    /// The owner lacks the claim blocks for the requested growth.
    #[error("needs {required} claim blocks but only {remaining} remain")]
    InsufficientBlocks { required: i64, remaining: i64 },

    #[error("player {0} already owns this claim")]
    AlreadyOwner(PlayerId),

    #[error("player {0} already has a pending transfer request")]
    AlreadyRequested(PlayerId),

    #[error("no pending transfer request for player {player} on claim {claim}")]
    NoSuchRequest { claim: ClaimId, player: PlayerId },

    /// The target cannot take ownership (claim cap or block allowance).
    #[error("player {0} cannot receive this claim")]
    TransferRefused(PlayerId),

    #[error("{0} not found")]
    NotFound(Missing),

    /// Either side of the area is shorter than the configured minimum.
    #[error("area is smaller than the minimum of {minimum} blocks per side")]
    TooSmall { minimum: i32 },

    /// The area intrudes on the buffer zone kept around another claim.
    #[error("area is within {distance} blocks of claim {claim}")]
    TooClose { claim: ClaimId, distance: i32 },

    #[error("player already owns a claim named {0:?}")]
    NameTaken(String),

    #[error("claim names must be 1 to {} characters", MAX_NAME_LEN)]
    InvalidName,

    #[error("descriptions are limited to {} characters", MAX_DESCRIPTION_LEN)]
    DescriptionTooLong,

    /// The anchor would sit outside every partition of its claim.
    #[error("anchor must lie inside the claim")]
    AnchorOutside,
}

/// What a [`ClaimError::NotFound`] was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Claim(ClaimId),
    Partition(PartitionId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Claim(id) => write!(f, "claim {id}"),
            Missing::Partition(id) => write!(f, "partition {id}"),
        }
    }
}

impl ClaimError {
    pub const fn claim_not_found(id: ClaimId) -> Self {
        Self::NotFound(Missing::Claim(id))
    }

    pub const fn partition_not_found(id: PartitionId) -> Self {
        Self::NotFound(Missing::Partition(id))
    }
}

/// Failure reported by a durable repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
