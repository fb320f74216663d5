//! Ownership transfer requests through the index.

use chrono::{TimeDelta, Utc};
use claims_engine::{
    Area, Claim, ClaimDraft, ClaimError, ClaimId, ClaimIndex, NoOverrides, OpenTransfers, Permission,
    PlacementRules, PlayerId, Position3D, TransferPolicy, Unlimited, WorldId, access,
};

struct Nobody;

impl TransferPolicy for Nobody {
    fn can_receive(&self, _target: PlayerId, _claim: &Claim) -> bool {
        false
    }
}

fn setup() -> (ClaimIndex, ClaimId, PlayerId) {
    let index = ClaimIndex::new();
    let owner = PlayerId::new();
    let claim = index
        .create_claim(
            ClaimDraft {
                world: WorldId::new(),
                owner,
                name: "Manor".into(),
                anchor: Position3D::new(1, 64, 1),
                area: Area::new((0, 0), (8, 8)),
            },
            &PlacementRules::default(),
            &Unlimited,
        )
        .unwrap()
        .claim();
    (index, claim, owner)
}

#[test]
fn offer_then_withdraw_changes_nothing() {
    let (index, claim, owner) = setup();
    let target = PlayerId::new();
    index.offer_transfer(claim, target, &OpenTransfers, Utc::now()).unwrap();
    assert!(index.player_access(claim, target).unwrap().has_transfer_request);

    index.withdraw_transfer(claim, target).unwrap();
    assert_eq!(index.claim(claim).unwrap().owner, owner);
    assert!(index.pending_transfer(claim).is_none());
    assert!(!index.player_access(claim, target).unwrap().has_transfer_request);
    assert!(matches!(
        index.withdraw_transfer(claim, target),
        Err(ClaimError::NoSuchRequest { .. })
    ));
}

#[test]
fn accept_moves_ownership_and_drops_old_bypass() {
    let (index, claim, owner) = setup();
    let target = PlayerId::new();
    let _ = index.grant_player_permission(claim, target, Permission::Build).unwrap();
    index.offer_transfer(claim, target, &OpenTransfers, Utc::now()).unwrap();

    let commit = index.accept_transfer(claim, target, &OpenTransfers).unwrap();
    assert!(!commit.is_noop());

    let c = index.claim(claim).unwrap();
    assert_eq!(c.owner, target);
    assert!(c.player_permissions(target).is_empty());
    assert!(index.pending_transfer(claim).is_none());
    assert!(!access::is_player_action_allowed(&c, owner, Permission::Build, &NoOverrides));
    assert!(access::is_player_action_allowed(&c, target, Permission::Build, &NoOverrides));
}

#[test]
fn second_offer_supersedes_the_first() {
    let (index, claim, _) = setup();
    let x = PlayerId::new();
    let y = PlayerId::new();
    index.offer_transfer(claim, x, &OpenTransfers, Utc::now()).unwrap();
    let offer = index.offer_transfer(claim, y, &OpenTransfers, Utc::now()).unwrap();

    assert_eq!(offer.superseded.map(|r| r.target), Some(x));
    assert!(!index.player_access(claim, x).unwrap().has_transfer_request);
    assert!(index.player_access(claim, y).unwrap().has_transfer_request);
    assert!(matches!(
        index.accept_transfer(claim, x, &OpenTransfers),
        Err(ClaimError::NoSuchRequest { .. })
    ));
}

#[test]
fn offer_rejections() {
    let (index, claim, owner) = setup();
    let target = PlayerId::new();
    assert_eq!(
        index.offer_transfer(claim, owner, &OpenTransfers, Utc::now()).unwrap_err(),
        ClaimError::AlreadyOwner(owner)
    );
    assert_eq!(
        index.offer_transfer(claim, target, &Nobody, Utc::now()).unwrap_err(),
        ClaimError::TransferRefused(target)
    );
    index.offer_transfer(claim, target, &OpenTransfers, Utc::now()).unwrap();
    assert_eq!(
        index.offer_transfer(claim, target, &OpenTransfers, Utc::now()).unwrap_err(),
        ClaimError::AlreadyRequested(target)
    );
    // policy is asked again on accept
    assert_eq!(
        index.accept_transfer(claim, target, &Nobody).unwrap_err(),
        ClaimError::TransferRefused(target)
    );
    assert_eq!(index.claim(claim).unwrap().owner, owner);
}

#[test]
fn expiry_only_removes_the_timed_offer() {
    let (index, claim, _) = setup();
    let target = PlayerId::new();
    let first_at = Utc::now();
    index.offer_transfer(claim, target, &OpenTransfers, first_at).unwrap();
    index.withdraw_transfer(claim, target).unwrap();
    let second_at = first_at + TimeDelta::seconds(5);
    index.offer_transfer(claim, target, &OpenTransfers, second_at).unwrap();

    // the first offer's timer fires late
    assert!(index.expire_transfer(claim, target, first_at).is_none());
    assert!(index.pending_transfer(claim).is_some());

    assert!(index.expire_transfer(claim, target, second_at).is_some());
    assert!(index.expire_transfer(claim, target, second_at).is_none());
    assert!(index.pending_transfer(claim).is_none());
}

#[test]
fn deleting_the_claim_drops_the_request() {
    let (index, claim, _) = setup();
    let target = PlayerId::new();
    index.offer_transfer(claim, target, &OpenTransfers, Utc::now()).unwrap();
    let _ = index.delete_claim(claim).unwrap();
    assert!(index.pending_transfer(claim).is_none());
    assert!(index.player_access(claim, target).is_err());
}

#[test]
fn accepting_keeps_names_unique_per_owner() {
    let (index, claim, _) = setup();
    let buyer = PlayerId::new();
    let _ = index
        .create_claim(
            ClaimDraft {
                world: WorldId::new(),
                owner: buyer,
                name: "manor".into(),
                anchor: Position3D::new(1, 64, 1),
                area: Area::new((0, 0), (8, 8)),
            },
            &PlacementRules::default(),
            &Unlimited,
        )
        .unwrap();
    index.offer_transfer(claim, buyer, &OpenTransfers, Utc::now()).unwrap();

    assert_eq!(
        index.accept_transfer(claim, buyer, &OpenTransfers).unwrap_err(),
        ClaimError::NameTaken("Manor".into())
    );
    assert_ne!(index.claim(claim).unwrap().owner, buyer);
    assert!(index.pending_transfer(claim).is_some());

    // once renamed, the same request goes through
    let _ = index.rename(claim, "Manor East").unwrap();
    let _ = index.accept_transfer(claim, buyer, &OpenTransfers).unwrap();
    let names: Vec<_> = index.claims_owned_by(buyer).into_iter().map(|c| c.name).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Manor East".to_string()));
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

#[test]
fn rollback_does_not_revive_an_expired_request() {
    let (index, claim, _) = setup();
    let target = PlayerId::new();
    let offered_at = Utc::now();
    index.offer_transfer(claim, target, &OpenTransfers, offered_at).unwrap();

    // an unrelated edit is in flight when the request times out
    let edit = index.grant_player_permission(claim, PlayerId::new(), Permission::DoorUse).unwrap();
    assert!(index.expire_transfer(claim, target, offered_at).is_some());
    index.rollback(edit);

    assert!(index.pending_transfer(claim).is_none());
    assert!(!index.player_access(claim, target).unwrap().has_transfer_request);
}

#[test]
fn rollback_of_an_accept_restores_the_request() {
    let (index, claim, owner) = setup();
    let target = PlayerId::new();
    index.offer_transfer(claim, target, &OpenTransfers, Utc::now()).unwrap();

    let accepted = index.accept_transfer(claim, target, &OpenTransfers).unwrap();
    index.rollback(accepted);

    assert_eq!(index.claim(claim).unwrap().owner, owner);
    assert_eq!(index.pending_transfer(claim).map(|r| r.target), Some(target));
}
