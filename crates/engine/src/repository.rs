//! Durable storage contracts.
//!
//! The index is rebuilt from these four repositories alone. Each stores one
//! kind of record keyed by UUID; deleting a claim cascades through all of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::claim::{Claim, ClaimRecord, Flag, Partition, Permission};
use crate::error::RepositoryError;
use crate::ids::{ClaimId, PartitionId};
use crate::index::{Change, ClaimIndex, Grantee, LoadReport};

/// One stored permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub claim: ClaimId,
    pub grantee: Grantee,
    pub permission: Permission,
}

/// One enabled flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagRecord {
    pub claim: ClaimId,
    pub flag: Flag,
}

pub trait ClaimRepository: Send + Sync {
    fn load_all(&self) -> Result<Vec<ClaimRecord>, RepositoryError>;
    /// Insert or replace by id.
    fn save(&self, record: &ClaimRecord) -> Result<(), RepositoryError>;
    fn remove(&self, id: ClaimId) -> Result<(), RepositoryError>;
}

pub trait PartitionRepository: Send + Sync {
    fn load_all(&self) -> Result<Vec<Partition>, RepositoryError>;
    /// Insert or replace by id.
    fn save(&self, partition: &Partition) -> Result<(), RepositoryError>;
    fn remove(&self, id: PartitionId) -> Result<(), RepositoryError>;
    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError>;
}

pub trait PermissionRepository: Send + Sync {
    fn load_all(&self) -> Result<Vec<PermissionGrant>, RepositoryError>;
    /// Adding an existing grant is a no-op.
    fn add(&self, grant: &PermissionGrant) -> Result<(), RepositoryError>;
    fn remove(&self, grant: &PermissionGrant) -> Result<(), RepositoryError>;
    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError>;
}

pub trait FlagRepository: Send + Sync {
    fn load_all(&self) -> Result<Vec<FlagRecord>, RepositoryError>;
    fn add(&self, record: &FlagRecord) -> Result<(), RepositoryError>;
    fn remove(&self, record: &FlagRecord) -> Result<(), RepositoryError>;
    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError>;
}

/// A store that can take a whole change list as one durable write.
pub trait BatchStore: Send + Sync {
    /// Either every change lands or none does.
    fn apply_batch(&self, changes: &[Change]) -> Result<(), RepositoryError>;
}

/// The four repositories a claim store is made of.
#[derive(Clone)]
pub struct Repositories {
    pub claims: Arc<dyn ClaimRepository>,
    pub partitions: Arc<dyn PartitionRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub flags: Arc<dyn FlagRepository>,
    batch: Option<Arc<dyn BatchStore>>,
}

impl Repositories {
    /// All four contracts served by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ClaimRepository + PartitionRepository + PermissionRepository + FlagRepository + 'static,
    {
        Self {
            claims: store.clone(),
            partitions: store.clone(),
            permissions: store.clone(),
            flags: store,
            batch: None,
        }
    }

    /// Like [`from_store`](Self::from_store), but change lists go to the
    /// store's batch write instead of one repository call per change.
    pub fn from_batch_store<S>(store: Arc<S>) -> Self
    where
        S: ClaimRepository
            + PartitionRepository
            + PermissionRepository
            + FlagRepository
            + BatchStore
            + 'static,
    {
        Self {
            batch: Some(store.clone()),
            ..Self::from_store(store)
        }
    }

    /// Write `changes`. Without a batch store they go in order, one repository
    /// call each, stopping at the first failure.
    pub fn apply(&self, changes: &[Change]) -> Result<(), RepositoryError> {
        if let Some(batch) = &self.batch {
            return batch.apply_batch(changes);
        }
        for change in changes {
            match change {
                Change::ClaimSaved(record) => self.claims.save(record)?,
                Change::ClaimDeleted(id) => {
                    self.partitions.remove_by_claim(*id)?;
                    self.permissions.remove_by_claim(*id)?;
                    self.flags.remove_by_claim(*id)?;
                    self.claims.remove(*id)?;
                }
                Change::PartitionSaved(partition) => self.partitions.save(partition)?,
                Change::PartitionDeleted(id) => self.partitions.remove(*id)?,
                Change::FlagSet {
                    claim,
                    flag,
                    enabled,
                } => {
                    let record = FlagRecord {
                        claim: *claim,
                        flag: *flag,
                    };
                    if *enabled {
                        self.flags.add(&record)?;
                    } else {
                        self.flags.remove(&record)?;
                    }
                }
                Change::PermissionSet {
                    claim,
                    grantee,
                    permission,
                    granted,
                } => {
                    let grant = PermissionGrant {
                        claim: *claim,
                        grantee: *grantee,
                        permission: *permission,
                    };
                    if *granted {
                        self.permissions.add(&grant)?;
                    } else {
                        self.permissions.remove(&grant)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Join every stored record back into whole claims. Children whose claim
    /// no longer exists are skipped.
    pub fn load_claims(&self) -> Result<Vec<Claim>, RepositoryError> {
        let records = self.claims.load_all()?;
        let mut partitions: HashMap<ClaimId, Vec<Partition>> = HashMap::new();
        for p in self.partitions.load_all()? {
            partitions.entry(p.claim).or_default().push(p);
        }

        let mut claims: HashMap<ClaimId, Claim> = records
            .into_iter()
            .map(|r| {
                let children = partitions.remove(&r.id).unwrap_or_default();
                (r.id, Claim::assemble(r, children))
            })
            .collect();
        let orphans: usize = partitions.values().map(Vec::len).sum();

        let mut dangling = 0;
        for record in self.flags.load_all()? {
            match claims.get_mut(&record.claim) {
                Some(c) => {
                    c.set_flag(record.flag, true);
                }
                None => dangling += 1,
            }
        }
        for grant in self.permissions.load_all()? {
            match (claims.get_mut(&grant.claim), grant.grantee) {
                (Some(c), Grantee::Player(player)) => {
                    c.grant_player(player, grant.permission);
                }
                (Some(c), Grantee::Everyone) => {
                    c.grant_claim_wide(grant.permission);
                }
                (None, _) => dangling += 1,
            }
        }
        if orphans + dangling > 0 {
            tracing::warn!(orphans, dangling, "skipped stored records with no claim");
        }

        Ok(claims.into_values().collect())
    }

    /// Load everything into `index`.
    pub fn rebuild(&self, index: &ClaimIndex) -> Result<LoadReport, RepositoryError> {
        let claims = self.load_claims()?;
        Ok(index.load(claims))
    }
}

/// In-memory store for tests and tooling. Every call can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryTables>,
}

#[derive(Default, Clone)]
struct MemoryTables {
    claims: HashMap<ClaimId, ClaimRecord>,
    partitions: HashMap<PartitionId, Partition>,
    grants: Vec<PermissionGrant>,
    flags: Vec<FlagRecord>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write return [`RepositoryError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.tables().fail_writes = failing;
    }

    pub fn claim_count(&self) -> usize {
        self.tables().claims.len()
    }

    pub fn partition_count(&self) -> usize {
        self.tables().partitions.len()
    }

    pub fn grant_count(&self) -> usize {
        self.tables().grants.len()
    }

    pub fn flag_count(&self) -> usize {
        self.tables().flags.len()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, MemoryTables> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    fn write<R>(&self, f: impl FnOnce(&mut MemoryTables) -> R) -> Result<R, RepositoryError> {
        let mut tables = self.tables();
        if tables.fail_writes {
            return Err(RepositoryError::Unavailable("memory store set to fail".into()));
        }
        Ok(f(&mut tables))
    }
}

impl ClaimRepository for MemoryStore {
    fn load_all(&self) -> Result<Vec<ClaimRecord>, RepositoryError> {
        Ok(self.tables().claims.values().cloned().collect())
    }

    fn save(&self, record: &ClaimRecord) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.claims.insert(record.id, record.clone());
        })
    }

    fn remove(&self, id: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.claims.remove(&id);
        })
    }
}

impl PartitionRepository for MemoryStore {
    fn load_all(&self) -> Result<Vec<Partition>, RepositoryError> {
        Ok(self.tables().partitions.values().copied().collect())
    }

    fn save(&self, partition: &Partition) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.partitions.insert(partition.id, *partition);
        })
    }

    fn remove(&self, id: PartitionId) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.partitions.remove(&id);
        })
    }

    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| t.partitions.retain(|_, p| p.claim != claim))
    }
}

impl PermissionRepository for MemoryStore {
    fn load_all(&self) -> Result<Vec<PermissionGrant>, RepositoryError> {
        Ok(self.tables().grants.clone())
    }

    fn add(&self, grant: &PermissionGrant) -> Result<(), RepositoryError> {
        self.write(|t| {
            if !t.grants.contains(grant) {
                t.grants.push(*grant);
            }
        })
    }

    fn remove(&self, grant: &PermissionGrant) -> Result<(), RepositoryError> {
        self.write(|t| t.grants.retain(|g| g != grant))
    }

    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| t.grants.retain(|g| g.claim != claim))
    }
}

impl FlagRepository for MemoryStore {
    fn load_all(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        Ok(self.tables().flags.clone())
    }

    fn add(&self, record: &FlagRecord) -> Result<(), RepositoryError> {
        self.write(|t| {
            if !t.flags.contains(record) {
                t.flags.push(*record);
            }
        })
    }

    fn remove(&self, record: &FlagRecord) -> Result<(), RepositoryError> {
        self.write(|t| t.flags.retain(|f| f != record))
    }

    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| t.flags.retain(|f| f.claim != claim))
    }
}
