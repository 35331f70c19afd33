use chunkhold_core::{BlockPos, RegionKey, WorldKey};
use chunkhold_retention::RetentionRecord;
use chunkhold_testkit::{regions, AuthorityCall, RecordingAuthority, ScriptedOwner};

fn anchor() -> BlockPos {
    BlockPos::new(8, 64, 8)
}

fn setup(desired: &[(i32, i32)]) -> (std::sync::Arc<RecordingAuthority>, ScriptedOwner) {
    let authority = RecordingAuthority::shared();
    let owner = ScriptedOwner::new(
        authority.handle(),
        WorldKey::overworld(),
        anchor(),
        regions(desired),
    );
    (authority, owner)
}

#[test]
fn register_diff_and_release_scenario() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0), (1, 0)]);

    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::pin(&world, anchor(), 0, 0, false),
            AuthorityCall::pin(&world, anchor(), 1, 0, false),
        ]
    );
    assert_eq!(owner.retention.retained(), &regions(&[(0, 0), (1, 0)]));
    assert!(owner.retention.is_registered());

    owner.change_desired(regions(&[(1, 0), (2, 0)]));
    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::unpin(&world, anchor(), 0, 0, false),
            AuthorityCall::pin(&world, anchor(), 2, 0, false),
        ]
    );
    assert_eq!(owner.retention.retained(), &regions(&[(1, 0), (2, 0)]));

    owner.request.eligible = false;
    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::unpin(&world, anchor(), 1, 0, false),
            AuthorityCall::unpin(&world, anchor(), 2, 0, false),
        ]
    );
    assert!(owner.retention.retained().is_empty());
    assert!(!owner.retention.is_registered());
    assert_eq!(authority.ticket_count(), 0);
}

#[test]
fn repeated_refresh_without_changes_is_silent() {
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.refresh();
    authority.take_calls();

    owner.refresh();
    owner.refresh();
    assert!(authority.calls().is_empty());

    // A desired-set change that is not announced is not picked up.
    owner.request.desired = regions(&[(5, 5)]);
    owner.refresh();
    assert!(authority.calls().is_empty());
    assert_eq!(owner.retention.retained(), &regions(&[(0, 0)]));
}

#[test]
fn announced_change_with_identical_set_issues_no_calls() {
    let (authority, mut owner) = setup(&[(0, 0), (0, 1)]);
    owner.refresh();
    authority.take_calls();
    owner.retention.clear_dirty();

    owner.change_desired(regions(&[(0, 0), (0, 1)]));
    owner.refresh();
    assert!(authority.calls().is_empty());
    assert!(!owner.retention.is_dirty());
}

#[test]
fn moving_releases_old_anchor_before_pinning_new_one() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0), (1, 0)]);
    owner.refresh();
    authority.take_calls();

    let moved = BlockPos::new(40, 64, 8);
    owner.request.pos = moved;
    owner.request.desired = regions(&[(2, 0)]);
    owner.refresh();

    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::unpin(&world, anchor(), 0, 0, false),
            AuthorityCall::unpin(&world, anchor(), 1, 0, false),
            AuthorityCall::pin(&world, moved, 2, 0, false),
        ]
    );
    assert_eq!(owner.retention.anchor().map(|a| a.pos), Some(moved));
    assert!(authority.tickets_at(&world, anchor()).is_empty());
}

#[test]
fn changing_world_releases_even_when_ineligible() {
    let overworld = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.refresh();
    authority.take_calls();

    owner.request.world = Some(WorldKey::parse("chunkhold:mining").unwrap());
    owner.request.eligible = false;
    owner.refresh();

    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::unpin(&overworld, anchor(), 0, 0, false)]
    );
    assert!(!owner.retention.is_registered());
}

#[test]
fn ineligible_owner_never_registers() {
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.request.eligible = false;
    owner.refresh();
    owner.retention.notify_desired_set_changed();
    owner.refresh();
    assert!(authority.calls().is_empty());
    assert!(!owner.retention.is_registered());
}

#[test]
fn owner_without_world_is_ignored() {
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.request.world = None;
    owner.refresh();
    assert!(authority.calls().is_empty());
    assert!(!owner.retention.is_registered());
}

#[test]
fn failed_calls_do_not_abort_the_batch() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0), (1, 0), (2, 0)]);
    authority.refuse_region(RegionKey::new(1, 0));

    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::pin(&world, anchor(), 0, 0, false),
            AuthorityCall::pin(&world, anchor(), 1, 0, false).refused(),
            AuthorityCall::pin(&world, anchor(), 2, 0, false),
        ]
    );
    // Bookkeeping follows intent.
    assert_eq!(owner.retention.retained(), &regions(&[(0, 0), (1, 0), (2, 0)]));
    assert_eq!(authority.ticket_count(), 2);
}

#[test]
fn emptied_desired_set_releases_then_reregisters_quietly() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.refresh();
    authority.take_calls();

    owner.change_desired(regions(&[]));
    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::unpin(&world, anchor(), 0, 0, false)]
    );
    assert!(!owner.retention.is_registered());

    owner.refresh();
    assert!(authority.take_calls().is_empty());
    assert!(owner.retention.is_registered());
    assert!(owner.retention.retained().is_empty());

    owner.change_desired(regions(&[(3, 3)]));
    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::pin(&world, anchor(), 3, 3, false)]
    );
}

#[test]
fn removal_is_idempotent() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.refresh();
    authority.take_calls();

    owner.retention.on_removed();
    owner.retention.on_removed();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::unpin(&world, anchor(), 0, 0, false)]
    );
    assert!(owner.retention.retained().is_empty());
}

#[test]
fn removal_before_registration_does_nothing() {
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.retention.on_removed();
    assert!(authority.calls().is_empty());
}

#[test]
fn ticking_owner_pins_and_releases_in_ticking_mode() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.request.ticking = true;
    owner.refresh();
    assert_eq!(owner.retention.registered_ticking(), Some(true));

    // The registered mode sticks for releases even if the owner's mode flips.
    owner.request.ticking = false;
    owner.request.eligible = false;
    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::pin(&world, anchor(), 0, 0, true),
            AuthorityCall::unpin(&world, anchor(), 0, 0, true),
        ]
    );
}

#[test]
fn mode_change_alone_is_not_repinned_by_refresh() {
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.refresh();
    authority.take_calls();

    owner.request.ticking = true;
    owner.retention.notify_desired_set_changed();
    owner.refresh();
    assert!(authority.calls().is_empty());
    assert_eq!(owner.retention.registered_ticking(), Some(false));
}

#[test]
fn dirty_tracks_retained_changes() {
    let (_authority, mut owner) = setup(&[(0, 0)]);
    assert!(!owner.retention.is_dirty());
    owner.refresh();
    assert!(owner.retention.is_dirty());
    owner.retention.clear_dirty();
    owner.refresh();
    assert!(!owner.retention.is_dirty());
    owner.request.eligible = false;
    owner.refresh();
    assert!(owner.retention.is_dirty());
}

#[test]
fn serialize_roundtrip_restores_only_the_set() {
    let (_authority, mut owner) = setup(&[(0, 0), (-3, 7)]);
    owner.refresh();
    let record = owner.retention.serialize();
    assert_eq!(record.regions(), regions(&[(0, 0), (-3, 7)]));

    let (authority, mut restored) = setup(&[(0, 0), (-3, 7)]);
    restored.retention.deserialize(&record);
    assert_eq!(restored.retention.retained(), owner.retention.retained());
    assert!(!restored.retention.is_registered());
    assert!(authority.calls().is_empty());
}

#[test]
fn deserialize_into_registered_component_releases_first() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner.refresh();
    authority.take_calls();

    owner
        .retention
        .deserialize(&[RegionKey::new(9, 9)].into_iter().collect::<RetentionRecord>());
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::unpin(&world, anchor(), 0, 0, false)]
    );
    assert_eq!(owner.retention.retained(), &regions(&[(9, 9)]));
    assert!(!owner.retention.is_registered());
}

#[test]
fn registering_discards_unconfirmed_persisted_regions() {
    let world = WorldKey::overworld();
    let (authority, mut owner) = setup(&[(0, 0)]);
    owner
        .retention
        .deserialize(&[RegionKey::new(4, 4)].into_iter().collect::<RetentionRecord>());

    owner.refresh();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::pin(&world, anchor(), 0, 0, false)]
    );
    assert_eq!(owner.retention.retained(), &regions(&[(0, 0)]));
}
