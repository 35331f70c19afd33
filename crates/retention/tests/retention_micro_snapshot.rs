use chunkhold_core::{BlockPos, SimTick, WorldKey};
use chunkhold_testkit::{
    regions, run_micro_worldtest, MicroWorldtestConfig, RecordingAuthority, ScriptedOwner,
};
use serde::Serialize;
use std::path::PathBuf;

fn snapshot_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/snapshots")
        .join(name)
}

#[derive(Debug, Clone, Serialize)]
struct Snap {
    registered: bool,
    retained: Vec<String>,
}

#[test]
fn micro_retention_register_diff_release_snapshot() {
    let authority = RecordingAuthority::shared();
    let owner = ScriptedOwner::new(
        authority.handle(),
        WorldKey::overworld(),
        BlockPos::new(8, 64, 8),
        regions(&[(0, 0), (1, 0)]),
    );

    run_micro_worldtest(
        MicroWorldtestConfig {
            name: "retention_register_diff_release".to_string(),
            ticks: 4,
            snapshot_path: snapshot_path("micro_retention_register_diff_release.json"),
        },
        &authority,
        owner,
        |tick: SimTick, owner: &mut ScriptedOwner| {
            match tick.0 {
                1 => owner.change_desired(regions(&[(1, 0), (2, 0)])),
                2 => owner.request.eligible = false,
                _ => {}
            }
            owner.refresh();
        },
        |owner: &ScriptedOwner| Snap {
            registered: owner.retention.is_registered(),
            retained: owner
                .retention
                .retained()
                .iter()
                .map(ToString::to_string)
                .collect(),
        },
    )
    .expect("snapshot matches");
}
