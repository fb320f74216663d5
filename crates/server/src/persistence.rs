//! File-backed claim store.
//!
//! All four repositories live in one JSON document, rewritten through a temp
//! file and a rename so a crash never leaves a torn file. A commit's change
//! list is applied as one rewrite. Tables are `IndexMap`s so the file keeps
//! insertion order and diffs cleanly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use claims_engine::repository::{
    BatchStore, ClaimRepository, FlagRecord, FlagRepository, PartitionRepository, PermissionGrant,
    PermissionRepository,
};
use claims_engine::{Change, ClaimId, ClaimRecord, Partition, PartitionId, RepositoryError};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Bumped whenever the document layout changes.
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct Tables {
    version: u32,
    /// Bumped on every rewrite of the file.
    #[serde(default)]
    revision: u64,
    claims: IndexMap<ClaimId, ClaimRecord>,
    partitions: IndexMap<PartitionId, Partition>,
    permissions: IndexSet<PermissionGrant>,
    flags: IndexSet<FlagRecord>,
}

impl Tables {
    fn apply(&mut self, change: &Change) {
        match change {
            Change::ClaimSaved(record) => {
                self.claims.insert(record.id, record.clone());
            }
            Change::ClaimDeleted(id) => {
                self.partitions.retain(|_, p| p.claim != *id);
                self.permissions.retain(|g| g.claim != *id);
                self.flags.retain(|f| f.claim != *id);
                self.claims.shift_remove(id);
            }
            Change::PartitionSaved(partition) => {
                self.partitions.insert(partition.id, *partition);
            }
            Change::PartitionDeleted(id) => {
                self.partitions.shift_remove(id);
            }
            Change::FlagSet { claim, flag, enabled } => {
                let record = FlagRecord {
                    claim: *claim,
                    flag: *flag,
                };
                if *enabled {
                    self.flags.insert(record);
                } else {
                    self.flags.shift_remove(&record);
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
                    self.permissions.insert(grant);
                } else {
                    self.permissions.shift_remove(&grant);
                }
            }
        }
    }
}

pub struct JsonStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonStore {
    /// Open the store at `path`, creating an empty one if the file is missing.
    pub fn open(path: &Path) -> Result<Self> {
        let tables = if path.exists() {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let tables: Tables = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?;
            if tables.version != FORMAT_VERSION {
                anyhow::bail!(
                    "{} has format version {}, expected {}",
                    path.display(),
                    tables.version,
                    FORMAT_VERSION
                );
            }
            tracing::info!(
                "Opened claim store {} ({} claims, {} partitions)",
                path.display(),
                tables.claims.len(),
                tables.partitions.len()
            );
            tables
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let tables = Tables {
                version: FORMAT_VERSION,
                ..Tables::default()
            };
            write_atomic(path, &tables).with_context(|| format!("creating {}", path.display()))?;
            tracing::info!("Created empty claim store at {}", path.display());
            tables
        };
        Ok(Self {
            path: path.to_path_buf(),
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times the file has been rewritten over its lifetime.
    pub fn revision(&self) -> u64 {
        self.read(|t| t.revision)
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.lock().expect("claim store poisoned"))
    }

    /// Apply `f` to a copy, persist it, and only then make it current.
    fn write(&self, f: impl FnOnce(&mut Tables)) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().expect("claim store poisoned");
        let mut next = tables.clone();
        f(&mut next);
        next.revision += 1;
        write_atomic(&self.path, &next)?;
        *tables = next;
        Ok(())
    }
}

fn write_atomic(path: &Path, tables: &Tables) -> Result<(), RepositoryError> {
    let json = serde_json::to_vec_pretty(tables).map_err(|e| RepositoryError::Malformed(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl BatchStore for JsonStore {
    fn apply_batch(&self, changes: &[Change]) -> Result<(), RepositoryError> {
        if changes.is_empty() {
            return Ok(());
        }
        self.write(|t| {
            for change in changes {
                t.apply(change);
            }
        })
    }
}

impl ClaimRepository for JsonStore {
    fn load_all(&self) -> Result<Vec<ClaimRecord>, RepositoryError> {
        Ok(self.read(|t| t.claims.values().cloned().collect()))
    }

    fn save(&self, record: &ClaimRecord) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.claims.insert(record.id, record.clone());
        })
    }

    fn remove(&self, id: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.claims.shift_remove(&id);
        })
    }
}

impl PartitionRepository for JsonStore {
    fn load_all(&self) -> Result<Vec<Partition>, RepositoryError> {
        Ok(self.read(|t| t.partitions.values().copied().collect()))
    }

    fn save(&self, partition: &Partition) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.partitions.insert(partition.id, *partition);
        })
    }

    fn remove(&self, id: PartitionId) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.partitions.shift_remove(&id);
        })
    }

    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| t.partitions.retain(|_, p| p.claim != claim))
    }
}

impl PermissionRepository for JsonStore {
    fn load_all(&self) -> Result<Vec<PermissionGrant>, RepositoryError> {
        Ok(self.read(|t| t.permissions.iter().copied().collect()))
    }

    fn add(&self, grant: &PermissionGrant) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.permissions.insert(*grant);
        })
    }

    fn remove(&self, grant: &PermissionGrant) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.permissions.shift_remove(grant);
        })
    }

    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| t.permissions.retain(|g| g.claim != claim))
    }
}

impl FlagRepository for JsonStore {
    fn load_all(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        Ok(self.read(|t| t.flags.iter().copied().collect()))
    }

    fn add(&self, record: &FlagRecord) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.flags.insert(*record);
        })
    }

    fn remove(&self, record: &FlagRecord) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.flags.shift_remove(record);
        })
    }

    fn remove_by_claim(&self, claim: ClaimId) -> Result<(), RepositoryError> {
        self.write(|t| t.flags.retain(|f| f.claim != claim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_engine::repository::Repositories;
    use claims_engine::{
        Area, ClaimDraft, ClaimIndex, Flag, Permission, PlacementRules, PlayerId, Position3D,
        Unlimited, WorldId,
    };
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("claims-store-{}-{}", name, uuid::Uuid::new_v4()));
        dir.join("claims.json")
    }

    #[test]
    fn changes_survive_reopen() {
        let path = temp_path("reopen");
        let index = ClaimIndex::new();
        let world = WorldId::new();
        let friend = PlayerId::new();

        {
            let repos = Repositories::from_store(Arc::new(JsonStore::open(&path).unwrap()));
            let created = index
                .create_claim(
                    ClaimDraft {
                        world,
                        owner: PlayerId::new(),
                        name: "Orchard".into(),
                        anchor: Position3D::new(2, 70, 2),
                        area: Area::new((0, 0), (12, 12)),
                    },
                    &PlacementRules::default(),
                    &Unlimited,
                )
                .unwrap();
            let claim = created.claim();
            repos.apply(created.changes()).unwrap();
            repos
                .apply(index.set_flag(claim, Flag::TreeGrowth, true).unwrap().changes())
                .unwrap();
            repos
                .apply(
                    index
                        .grant_player_permission(claim, friend, Permission::Husbandry)
                        .unwrap()
                        .changes(),
                )
                .unwrap();
        }

        let repos = Repositories::from_store(Arc::new(JsonStore::open(&path).unwrap()));
        let rebuilt = ClaimIndex::new();
        let report = repos.rebuild(&rebuilt).unwrap();
        assert_eq!(report.claims, 1);
        let claim = rebuilt.claim_at(world, &Position3D::new(6, 0, 6)).unwrap();
        assert_eq!(claim.name, "Orchard");
        assert!(claim.has_flag(Flag::TreeGrowth));
        assert!(claim.player_permissions(friend).contains(&Permission::Husbandry));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn deleting_a_claim_cascades() {
        let path = temp_path("cascade");
        let store = Arc::new(JsonStore::open(&path).unwrap());
        let repos = Repositories::from_batch_store(Arc::clone(&store));
        let index = ClaimIndex::new();
        let created = index
            .create_claim(
                ClaimDraft {
                    world: WorldId::new(),
                    owner: PlayerId::new(),
                    name: "Temp".into(),
                    anchor: Position3D::new(0, 64, 0),
                    area: Area::new((0, 0), (4, 4)),
                },
                &PlacementRules::default(),
                &Unlimited,
            )
            .unwrap();
        let claim = created.claim();
        repos.apply(created.changes()).unwrap();
        repos
            .apply(index.grant_all_claim_permissions(claim).unwrap().changes())
            .unwrap();
        repos.apply(index.delete_claim(claim).unwrap().changes()).unwrap();

        assert!(store.read(|t| t.claims.is_empty()
            && t.partitions.is_empty()
            && t.permissions.is_empty()
            && t.flags.is_empty()));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn a_commit_is_one_rewrite() {
        let path = temp_path("batch");
        let store = Arc::new(JsonStore::open(&path).unwrap());
        let repos = Repositories::from_batch_store(Arc::clone(&store));
        let index = ClaimIndex::new();
        let created = index
            .create_claim(
                ClaimDraft {
                    world: WorldId::new(),
                    owner: PlayerId::new(),
                    name: "Pasture".into(),
                    anchor: Position3D::new(1, 64, 1),
                    area: Area::new((0, 0), (6, 6)),
                },
                &PlacementRules::default(),
                &Unlimited,
            )
            .unwrap();
        let claim = created.claim();
        repos.apply(created.changes()).unwrap();

        let before = store.revision();
        let grant_all = index.grant_all_claim_permissions(claim).unwrap();
        assert_eq!(grant_all.changes().len(), Permission::ALL.len());
        repos.apply(grant_all.changes()).unwrap();
        assert_eq!(store.revision(), before + 1);

        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.revision(), before + 1);
        assert_eq!(reopened.read(|t| t.permissions.len()), Permission::ALL.len());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_fails_to_open() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{ not json").unwrap();
        assert!(JsonStore::open(&path).is_err());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
