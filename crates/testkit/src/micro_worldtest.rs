//! Micro-worldtests: step a handful of owners for a few ticks, capturing the
//! authority calls each tick produced alongside a state snapshot, and compare
//! the report against a golden file.

use crate::snapshot::assert_json_snapshot;
use crate::RecordingAuthority;
use anyhow::Result;
use chunkhold_core::SimTick;
use serde::Serialize;
use std::path::PathBuf;

/// Configuration for a micro-worldtest.
#[derive(Debug, Clone)]
pub struct MicroWorldtestConfig {
    /// Name written into the report.
    pub name: String,
    /// Number of ticks to step (the report also holds the initial frame).
    pub ticks: u64,
    /// Golden JSON file.
    pub snapshot_path: PathBuf,
}

/// State captured after a step.
#[derive(Debug, Clone, Serialize)]
pub struct MicroWorldtestFrame<S> {
    /// Tick number.
    pub tick: u64,
    /// Authority calls issued during the step, in order.
    pub calls: Vec<String>,
    /// Snapshot payload.
    pub snapshot: S,
}

#[derive(Debug, Clone, Serialize)]
struct MicroWorldtestReport<S> {
    name: String,
    frames: Vec<MicroWorldtestFrame<S>>,
}

/// Run a micro-worldtest and assert (or update) its golden file.
///
/// Frame 0 is the initial state; any calls logged before the run are
/// discarded. Each step runs at the current tick, then the tick advances and
/// a frame is captured.
pub fn run_micro_worldtest<State, Snapshot, StepFn, SnapFn>(
    config: MicroWorldtestConfig,
    authority: &RecordingAuthority,
    mut state: State,
    mut step: StepFn,
    mut snapshot: SnapFn,
) -> Result<()>
where
    Snapshot: Serialize,
    StepFn: FnMut(SimTick, &mut State),
    SnapFn: FnMut(&State) -> Snapshot,
{
    authority.take_calls();
    let mut frames = Vec::with_capacity(config.ticks as usize + 1);
    let mut tick = SimTick::ZERO;
    frames.push(MicroWorldtestFrame {
        tick: tick.0,
        calls: Vec::new(),
        snapshot: snapshot(&state),
    });

    for _ in 0..config.ticks {
        step(tick, &mut state);
        tick = tick.advance(1);
        frames.push(MicroWorldtestFrame {
            tick: tick.0,
            calls: authority
                .take_calls()
                .iter()
                .map(ToString::to_string)
                .collect(),
            snapshot: snapshot(&state),
        });
    }

    let report = MicroWorldtestReport {
        name: config.name,
        frames,
    };
    assert_json_snapshot(config.snapshot_path, &report)
}
