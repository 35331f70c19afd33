use std::collections::BTreeMap;
use std::sync::Arc;

use chunkhold_content::{Machine, MachineKind, RetentionSettings, Upgrade};
use chunkhold_core::{BlockPos, RegionKey, WorldKey};
use chunkhold_retention::validate_world;
use chunkhold_testkit::{regions, AuthorityCall, RecordingAuthority};

fn settings() -> Arc<RetentionSettings> {
    Arc::new(RetentionSettings::default())
}

fn place(authority: &Arc<RecordingAuthority>, kind: MachineKind, pos: BlockPos) -> Machine {
    Machine::new(
        kind,
        Some(WorldKey::overworld()),
        pos,
        settings(),
        authority.handle(),
    )
}

#[test]
fn quarry_needs_anchor_upgrade() {
    let authority = RecordingAuthority::shared();
    let pos = BlockPos::new(8, 64, 8);
    let mut quarry = place(&authority, MachineKind::quarry(), pos);

    quarry.tick();
    assert!(authority.calls().is_empty());
    assert!(!quarry.is_eligible());

    assert_eq!(quarry.install_upgrade(Upgrade::Anchor, 1), Ok(1));
    quarry.tick();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::pin(&WorldKey::overworld(), pos, 0, 0, false)]
    );
    assert_eq!(quarry.retention().retained(), &regions(&[(0, 0)]));

    assert_eq!(quarry.remove_upgrade(Upgrade::Anchor, 1), 1);
    quarry.tick();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::unpin(&WorldKey::overworld(), pos, 0, 0, false)]
    );
    assert!(!quarry.retention().is_registered());
}

#[test]
fn quarry_target_change_is_diffed() {
    let authority = RecordingAuthority::shared();
    let world = WorldKey::overworld();
    let pos = BlockPos::new(8, 64, 8);
    let mut quarry = place(&authority, MachineKind::quarry(), pos);
    quarry.install_upgrade(Upgrade::Anchor, 1).unwrap();
    quarry.tick();
    authority.take_calls();

    assert!(quarry.set_target(Some(RegionKey::new(4, 4))));
    quarry.tick();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::pin(&world, pos, 4, 4, false)]
    );

    assert!(quarry.set_target(Some(RegionKey::new(5, 4))));
    quarry.tick();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::unpin(&world, pos, 4, 4, false),
            AuthorityCall::pin(&world, pos, 5, 4, false),
        ]
    );
    assert_eq!(quarry.retention().retained(), &regions(&[(0, 0), (5, 4)]));

    quarry.tick();
    assert!(authority.calls().is_empty());
}

#[test]
fn stabilizer_pins_ticking_grid_cells() {
    let authority = RecordingAuthority::shared();
    let world = WorldKey::overworld();
    let pos = BlockPos::new(40, 64, 8);
    let mut stabilizer = place(&authority, MachineKind::stabilizer(), pos);
    stabilizer.install_upgrade(Upgrade::Anchor, 1).unwrap();
    stabilizer.tick();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::pin(&world, pos, 2, 0, true)]
    );

    assert_eq!(stabilizer.toggle_cell(1, 1), Some(true));
    assert_eq!(stabilizer.toggle_cell(0, 0), Some(true));
    assert_eq!(stabilizer.toggle_cell(3, 0), None);
    assert_eq!(stabilizer.toggle_cell(i32::MIN, 0), None);
    stabilizer.tick();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::pin(&world, pos, 3, 1, true)]
    );

    assert_eq!(stabilizer.toggle_cell(1, 1), Some(false));
    stabilizer.tick();
    assert_eq!(
        authority.take_calls(),
        vec![AuthorityCall::unpin(&world, pos, 3, 1, true)]
    );
    assert_eq!(stabilizer.retention().registered_ticking(), Some(true));
}

#[test]
fn global_switch_and_relay_are_never_eligible() {
    let authority = RecordingAuthority::shared();
    let pos = BlockPos::new(0, 64, 0);
    let disabled = Arc::new(RetentionSettings {
        allow_chunk_loading: false,
        ..RetentionSettings::default()
    });
    let mut quarry = Machine::new(
        MachineKind::quarry(),
        Some(WorldKey::overworld()),
        pos,
        disabled,
        authority.handle(),
    );
    quarry.install_upgrade(Upgrade::Anchor, 1).unwrap();
    quarry.tick();

    let mut relay = place(&authority, MachineKind::Relay, BlockPos::new(16, 64, 0));
    assert!(relay.install_upgrade(Upgrade::Anchor, 1).is_err());
    relay.tick();

    assert!(authority.calls().is_empty());
    assert!(!quarry.is_eligible());
    assert!(!relay.is_eligible());
}

#[test]
fn move_releases_old_anchor_before_pinning_new() {
    let authority = RecordingAuthority::shared();
    let world = WorldKey::overworld();
    let old = BlockPos::new(8, 64, 8);
    let new = BlockPos::new(24, 64, 8);
    let mut quarry = place(&authority, MachineKind::quarry(), old);
    quarry.install_upgrade(Upgrade::Anchor, 1).unwrap();
    quarry.tick();
    authority.take_calls();

    quarry.move_to(new);
    quarry.tick();
    assert_eq!(
        authority.take_calls(),
        vec![
            AuthorityCall::unpin(&world, old, 0, 0, false),
            AuthorityCall::pin(&world, new, 1, 0, false),
        ]
    );
    assert_eq!(quarry.retention().anchor().map(|a| a.pos), Some(new));
}

#[test]
fn removal_releases_everything() {
    let authority = RecordingAuthority::shared();
    let mut quarry = place(&authority, MachineKind::quarry(), BlockPos::new(8, 64, 8));
    quarry.install_upgrade(Upgrade::Anchor, 1).unwrap();
    quarry.set_target(Some(RegionKey::new(3, 3)));
    quarry.tick();
    assert_eq!(authority.ticket_count(), 2);

    quarry.on_removed();
    quarry.on_removed();
    assert_eq!(authority.ticket_count(), 0);
    assert!(quarry.retention().retained().is_empty());
}

#[test]
fn save_and_load_restore_components() {
    let authority = RecordingAuthority::shared();
    let mut stabilizer = place(&authority, MachineKind::stabilizer(), BlockPos::new(8, 64, 8));
    stabilizer.install_upgrade(Upgrade::Anchor, 1).unwrap();
    stabilizer.toggle_cell(-1, 0);
    stabilizer.tick();
    assert!(stabilizer.needs_save());

    let save = stabilizer.save();
    assert!(!stabilizer.needs_save());
    let json = serde_json::to_string(&save).unwrap();
    let decoded = serde_json::from_str(&json).unwrap();
    assert_eq!(save, decoded);

    let fresh = RecordingAuthority::shared();
    let restored = Machine::load(
        &decoded,
        Some(WorldKey::overworld()),
        settings(),
        fresh.handle(),
    )
    .unwrap();
    assert_eq!(restored.kind(), stabilizer.kind());
    assert!(restored.upgrades().is_installed(Upgrade::Anchor));
    assert_eq!(restored.retention().retained(), &regions(&[(-1, 0), (0, 0)]));
    assert!(!restored.retention().is_registered());
    assert!(!restored.needs_save());
    assert!(fresh.calls().is_empty());
}

#[test]
fn validation_restores_tickets_after_lost_registry() {
    let authority = RecordingAuthority::shared();
    let world = WorldKey::overworld();
    let pos = BlockPos::new(8, 64, 8);
    let mut quarry = place(&authority, MachineKind::quarry(), pos);
    quarry.install_upgrade(Upgrade::Anchor, 1).unwrap();
    quarry.tick();
    let save = quarry.save();

    // Registry gone, machine record kept.
    let rebuilt = RecordingAuthority::shared();
    let mut machines = BTreeMap::new();
    machines.insert(
        pos,
        Machine::load(&save, Some(world.clone()), settings(), rebuilt.handle()).unwrap(),
    );
    let report = validate_world(&world, &*rebuilt, &mut machines);
    assert_eq!(report.anchors, 0);

    let machine = machines.get_mut(&pos).unwrap();
    machine.tick();
    assert_eq!(
        rebuilt.take_calls(),
        vec![AuthorityCall::pin(&world, pos, 0, 0, false)]
    );
    assert!(machine.retention().is_registered());
}

#[test]
fn validation_releases_tickets_of_machine_without_anchor() {
    let authority = RecordingAuthority::shared();
    let world = WorldKey::overworld();
    let pos = BlockPos::new(8, 64, 8);
    authority.seed(&world, pos, &regions(&[(0, 0), (7, 7)]), false);

    let mut machines = BTreeMap::new();
    machines.insert(pos, place(&authority, MachineKind::quarry(), pos));
    let report = validate_world(&world, &*authority, &mut machines);
    assert_eq!(report.released, 1);
    assert_eq!(authority.ticket_count(), 0);
}
