//! Claim action layer: permission checks, persistence, rollback on failed
//! writes, transfer expiry and the event bus.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use claims_engine::repository::{MemoryStore, Repositories};
use claims_engine::{Area, ClaimError, ClaimId, ClaimIndex, Decision, Flag, Permission, PlayerId, Position3D, WorldId};
use claims_server::config::ClaimsConfig;
use claims_server::dashboard::{Gauges, Metrics};
use claims_server::event_bus::{self, ClaimEvent, TransferEnd};
use claims_server::player_state::PlayerStateRegistry;
use claims_server::rules::{Interaction, WorldEvent};
use claims_server::service::{ActionError, ClaimService, Required, ServiceDeps};
use claims_server::services::{NoMetadata, SquareBorder};
use claims_server::writer;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    service: ClaimService,
    store: Arc<MemoryStore>,
    world: WorldId,
}

fn harness_with(config: ClaimsConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let (bus, _) = broadcast::channel(event_bus::BUS_CAPACITY);
    let deps = ServiceDeps {
        index: Arc::new(ClaimIndex::new()),
        writer: writer::spawn(Repositories::from_store(Arc::clone(&store))),
        players: Arc::new(PlayerStateRegistry::new()),
        world: Arc::new(SquareBorder::new(config.world_border_radius)),
        metadata: Arc::new(NoMetadata),
        metrics: Arc::new(Metrics::new()),
        bus,
    };
    Harness {
        service: ClaimService::new(config, deps),
        store,
        world: WorldId::new(),
    }
}

fn harness() -> Harness {
    harness_with(ClaimsConfig::default())
}

const HOME: Position3D = Position3D::new(0, 64, 0);

async fn home_claim(h: &Harness, owner: PlayerId) -> ClaimId {
    h.service
        .create_claim(owner, h.world, "Home", HOME)
        .await
        .expect("claim should be created")
}

// ---------------------------------------------------------------------------
// Creation and deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_claim_persists_and_publishes() {
    let h = harness();
    let mut rx = h.service.subscribe();
    let owner = PlayerId::new();

    let claim = home_claim(&h, owner).await;

    assert_eq!(h.store.claim_count(), 1);
    assert_eq!(h.store.partition_count(), 1);
    let details = h.service.claim_details(claim).unwrap();
    assert_eq!(details.owner, owner);
    assert_eq!(details.partitions, vec![Area::new((-5, -5), (5, 5))]);
    assert_eq!(h.service.remaining_blocks(owner), 10_000 - 100);

    match rx.try_recv().unwrap() {
        ClaimEvent::Committed(batch) => {
            assert_eq!(batch.claim, claim);
            assert_eq!(batch.changes.len(), 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn claim_limit_and_world_border_are_enforced() {
    let h = harness_with(ClaimsConfig {
        claim_limit: 1,
        world_border_radius: 100,
        ..ClaimsConfig::default()
    });
    let owner = PlayerId::new();
    home_claim(&h, owner).await;

    let second = h
        .service
        .create_claim(owner, h.world, "Barn", Position3D::new(50, 64, 50))
        .await;
    assert!(matches!(second, Err(ActionError::ClaimLimitReached { limit: 1 })));

    let other = PlayerId::new();
    let far = h
        .service
        .create_claim(other, h.world, "Outpost", Position3D::new(200, 64, 0))
        .await;
    assert!(matches!(far, Err(ActionError::OutsideWorldBorder)));
    assert!(!h.service.is_new_claim_location_valid(h.world, Position3D::new(200, 64, 0)));
    assert!(!h.service.is_new_claim_location_valid(h.world, Position3D::new(3, 64, 3)));
    assert!(h.service.is_new_claim_location_valid(h.world, Position3D::new(40, 64, 40)));
    assert_eq!(h.service.metrics().snapshot(Gauges::default()).rejections_total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn claim_limit_holds_across_worlds() {
    let Harness { service, store, .. } = harness_with(ClaimsConfig {
        claim_limit: 1,
        ..ClaimsConfig::default()
    });
    let service = Arc::new(service);
    let owner = PlayerId::new();

    let attempts: Vec<_> = (0..2)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_claim(owner, WorldId::new(), &format!("Camp {i}"), HOME)
                    .await
            })
        })
        .collect();

    let (mut created, mut refused) = (0, 0);
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => created += 1,
            Err(ActionError::ClaimLimitReached { limit: 1 }) => refused += 1,
            Err(e) => panic!("unexpected error {e}"),
        }
    }
    assert_eq!((created, refused), (1, 1));
    assert_eq!(store.claim_count(), 1);
}

#[tokio::test]
async fn only_the_owner_can_break_the_anchor() {
    let h = harness();
    let owner = PlayerId::new();
    let claim = home_claim(&h, owner).await;

    let intruder = h.service.break_anchor(PlayerId::new(), h.world, HOME).await;
    assert!(matches!(
        intruder,
        Err(ActionError::PermissionDenied {
            required: Required::Owner,
            ..
        })
    ));
    assert!(h.service.claim_details(claim).is_some());

    assert_eq!(h.service.break_anchor(owner, h.world, HOME).await.unwrap(), Some(claim));
    assert!(h.service.claim_details(claim).is_none());
    assert_eq!(h.store.claim_count(), 0);
    assert_eq!(h.store.partition_count(), 0);

    // Nothing anchored here any more.
    assert_eq!(h.service.break_anchor(owner, h.world, HOME).await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn management_needs_the_matching_permission() {
    let h = harness();
    let owner = PlayerId::new();
    let helper = PlayerId::new();
    let claim = home_claim(&h, owner).await;

    let denied = h.service.set_flag(helper, claim, Flag::Pvp, true).await;
    assert!(matches!(
        denied,
        Err(ActionError::PermissionDenied {
            required: Required::Permission(Permission::ManageFlags),
            ..
        })
    ));

    h.service
        .grant_player_permission(owner, claim, helper, Permission::ManageFlags)
        .await
        .unwrap();
    h.service.set_flag(helper, claim, Flag::Pvp, true).await.unwrap();
    assert!(h.service.has_flag(claim, Flag::Pvp));
    assert_eq!(h.store.flag_count(), 1);

    // ManageFlags does not extend to renaming.
    let rename = h.service.rename_claim(helper, claim, "Mine now").await;
    assert!(matches!(rename, Err(ActionError::PermissionDenied { .. })));
}

#[tokio::test]
async fn override_players_pass_position_checks() {
    let h = harness();
    let owner = PlayerId::new();
    let admin = PlayerId::new();
    home_claim(&h, owner).await;

    let pos = Position3D::new(1, 64, 1);
    assert_eq!(
        h.service.check_player_action(h.world, &pos, admin, Permission::Break),
        Decision::Denied
    );
    assert!(h.service.toggle_override(admin));
    let dig = WorldEvent::Interact {
        world: h.world,
        player: admin,
        pos,
        action: Interaction::BreakBlock,
    };
    assert!(h.service.protect(&dig));

    let snap = h.service.metrics().snapshot(Gauges::default());
    assert_eq!(snap.overrides_total, 1);
    assert_eq!(snap.denials_total, 1);
}

// ---------------------------------------------------------------------------
// Persistence failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_write_rolls_the_index_back() {
    let h = harness();
    let owner = PlayerId::new();
    let friend = PlayerId::new();
    let claim = home_claim(&h, owner).await;
    let before = h.service.claim_details(claim).unwrap();

    h.store.set_failing(true);
    let grant = h
        .service
        .grant_player_permission(owner, claim, friend, Permission::Build)
        .await;
    assert!(matches!(grant, Err(ActionError::Persistence(_))));
    assert!(h.service.player_permissions(claim, friend).is_empty());

    let resize = h
        .service
        .create_partition(owner, claim, h.world, Area::new((5, -5), (15, 5)))
        .await;
    assert!(matches!(resize, Err(ActionError::Persistence(_))));
    assert_eq!(h.service.claim_partitions(claim).len(), 1);
    assert_eq!(h.service.claim_details(claim).unwrap().block_count, before.block_count);

    let created = h
        .service
        .create_claim(PlayerId::new(), h.world, "Lost", Position3D::new(100, 64, 100))
        .await;
    assert!(matches!(created, Err(ActionError::Persistence(_))));
    assert_eq!(h.service.index().claim_count(), 1);
    assert!(h.service.index().verify_invariants().is_empty());

    h.store.set_failing(false);
    h.service
        .grant_player_permission(owner, claim, friend, Permission::Build)
        .await
        .unwrap();
    assert_eq!(h.store.grant_count(), 1);

    let snap = h.service.metrics().snapshot(Gauges::default());
    assert_eq!(snap.rollbacks_total, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_write_racing_expiry_leaves_no_request() {
    let Harness { service, store, world } = harness_with(ClaimsConfig {
        transfer_request_secs: 60,
        ..ClaimsConfig::default()
    });
    let service = Arc::new(service);
    let owner = PlayerId::new();
    let buyer = PlayerId::new();
    let claim = service.create_claim(owner, world, "Home", HOME).await.unwrap();
    service.offer_transfer(owner, claim, buyer).await.unwrap();

    store.set_failing(true);
    let later = Utc::now() + TimeDelta::seconds(61);
    let grant = tokio::spawn({
        let service = Arc::clone(&service);
        async move {
            service
                .grant_player_permission(owner, claim, PlayerId::new(), Permission::DoorUse)
                .await
        }
    });
    let expiry = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.expire_due(later).await }
    });

    assert!(matches!(grant.await.unwrap(), Err(ActionError::Persistence(_))));
    assert_eq!(expiry.await.unwrap(), 1);
    assert!(!service.has_transfer_request(claim, buyer));
    assert!(service.next_expiry().is_none());
}

// ---------------------------------------------------------------------------
// Partitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partitions_grow_and_shrink_the_claim() {
    let h = harness();
    let owner = PlayerId::new();
    let claim = home_claim(&h, owner).await;

    let east = h
        .service
        .create_partition(owner, claim, h.world, Area::new((5, -5), (15, 5)))
        .await
        .unwrap();
    let found = h.service.partition_at(h.world, &Position3D::new(12, 70, 0)).unwrap();
    assert_eq!(found.id, east);
    assert_eq!(h.service.claim_block_count(claim), Some(200));

    let detached = h
        .service
        .create_partition(owner, claim, h.world, Area::new((40, 40), (50, 50)))
        .await;
    assert!(matches!(detached, Err(ActionError::Claim(ClaimError::Disconnected(_)))));

    h.service
        .resize_partition(owner, east, Area::new((5, -5), (25, 5)))
        .await
        .unwrap();
    assert_eq!(h.service.claim_block_count(claim), Some(300));

    assert!(h.service.can_remove_partition(east).unwrap());
    h.service.remove_partition(owner, east).await.unwrap();
    assert_eq!(h.store.partition_count(), 1);

    // The last partition takes the claim with it.
    let home = h.service.claim_partitions(claim)[0].id;
    h.service.remove_partition(owner, home).await.unwrap();
    assert!(h.service.claim_details(claim).is_none());
    assert_eq!(h.store.claim_count(), 0);
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepted_transfer_changes_owner_and_cancels_expiry() {
    let h = harness();
    let owner = PlayerId::new();
    let buyer = PlayerId::new();
    let claim = home_claim(&h, owner).await;
    let mut rx = h.service.subscribe();

    let stolen = h.service.offer_transfer(buyer, claim, buyer).await;
    assert!(matches!(stolen, Err(ActionError::PermissionDenied { .. })));

    h.service.offer_transfer(owner, claim, buyer).await.unwrap();
    assert!(h.service.has_transfer_request(claim, buyer));
    assert!(h.service.next_expiry().is_some());

    h.service.accept_transfer(buyer, claim).await.unwrap();
    assert_eq!(h.service.claim_details(claim).unwrap().owner, buyer);
    assert!(!h.service.has_transfer_request(claim, buyer));
    assert!(h.service.next_expiry().is_none());
    assert_eq!(h.service.expire_due(Utc::now() + TimeDelta::days(1)).await, 0);

    assert!(matches!(rx.try_recv().unwrap(), ClaimEvent::TransferOffered(r) if r.target == buyer));
    assert!(matches!(rx.try_recv().unwrap(), ClaimEvent::Committed(b) if b.claim == claim));
    assert!(matches!(
        rx.try_recv().unwrap(),
        ClaimEvent::TransferClosed {
            reason: TransferEnd::Accepted,
            ..
        }
    ));
}

#[tokio::test]
async fn offers_expire_once() {
    let h = harness_with(ClaimsConfig {
        transfer_request_secs: 60,
        ..ClaimsConfig::default()
    });
    let owner = PlayerId::new();
    let first = PlayerId::new();
    let second = PlayerId::new();
    let claim = home_claim(&h, owner).await;
    let mut rx = h.service.subscribe();

    h.service.offer_transfer(owner, claim, first).await.unwrap();
    h.service.offer_transfer(owner, claim, second).await.unwrap();
    assert!(!h.service.has_transfer_request(claim, first));
    assert!(h.service.has_transfer_request(claim, second));

    assert_eq!(h.service.expire_due(Utc::now()).await, 0);
    let later = Utc::now() + TimeDelta::seconds(61);
    assert_eq!(h.service.expire_due(later).await, 1);
    assert_eq!(h.service.expire_due(later).await, 0);
    assert!(!h.service.has_transfer_request(claim, second));

    let reasons: Vec<TransferEnd> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|e| match e {
            ClaimEvent::TransferClosed { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(reasons, vec![TransferEnd::Superseded, TransferEnd::Expired]);
    assert_eq!(
        h.service.metrics().snapshot(Gauges::default()).transfers_expired,
        1
    );
}

#[tokio::test]
async fn withdrawn_offer_cannot_be_accepted() {
    let h = harness();
    let owner = PlayerId::new();
    let buyer = PlayerId::new();
    let claim = home_claim(&h, owner).await;

    h.service.offer_transfer(owner, claim, buyer).await.unwrap();
    h.service.withdraw_transfer(owner, claim, buyer).await.unwrap();
    let accept = h.service.accept_transfer(buyer, claim).await;
    assert!(matches!(
        accept,
        Err(ActionError::Claim(ClaimError::NoSuchRequest { .. }))
    ));
    assert_eq!(h.service.claim_details(claim).unwrap().owner, owner);
}
