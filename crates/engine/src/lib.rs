//! Land-claim engine: who owns which part of the world and what others may
//! do there.
//!
//! The engine is synchronous and game-agnostic. The host feeds it positions
//! and player ids, persists the [`index::Commit`]s it returns, and supplies
//! block allowances, override authority and transfer policy through traits.

pub mod access;
pub mod claim;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod index;
pub mod repository;
pub mod timer;
pub mod transfer;
pub mod validate;

pub use access::{Authority, Decision, NoOverrides};
pub use claim::{Claim, ClaimRecord, Flag, Partition, Permission};
pub use error::{ClaimError, Missing, RepositoryError};
pub use geometry::{Area, ChunkPos, Position3D};
pub use ids::{ClaimId, PartitionId, PlayerId, WorldId};
pub use index::{Change, ClaimIndex, Commit, Grantee, LoadReport, Offer};
pub use transfer::{OpenTransfers, PlayerAccess, TransferPolicy, TransferRequest};
pub use validate::{BlockAllowance, ClaimDraft, PlacementRules, Unlimited};
