//! Overlap and spacing resolution.
//!
//! ## Requirements
//!
//! - Dropping or nudging benches must never leave two footprints overlapping
//!   or closer than the minimum clearance.
//! - Fixtures (bimah, ark, columns) are anchors: the resolver routes the
//!   whole correction through the movable side of a pair.
//! - The map edge wins over clearance. An overfull map settles clamped and
//!   still overlapping rather than looping.
//!
//! ## Implementation
//!
//! Bounded iterative relaxation. Each pass walks all pairs (O(n²), n is tens
//! of benches), pushes every conflicting pair apart along the axis of least
//! penetration, then clamps movable benches to the map bounds. A pass with
//! no conflict ends the loop; otherwise it stops at [`MAX_RELAX_PASSES`].

use thiserror::Error;

use crate::bench::{Bench, SeatMap};

/// Upper bound on relaxation passes. Reaching it is not an error, the
/// layout is simply left as settled as it got.
pub const MAX_RELAX_PASSES: usize = 80;

/// Minimum gap between any two footprints, in map pixels.
pub const MIN_CLEARANCE: f32 = 10.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("unknown bench id {0}")]
    UnknownBench(u32),
}

/// Relaxes the whole map until no pair conflicts or the pass bound is hit.
/// Returns the number of passes that moved something.
pub fn resolve_spacing(map: &mut SeatMap) -> usize {
    let (width, height) = (map.width, map.height);

    for pass in 0..MAX_RELAX_PASSES {
        let mut moved = false;

        let n = map.benches.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (head, tail) = map.benches.split_at_mut(j);
                moved |= separate(&mut head[i], &mut tail[0]);
            }
        }

        for bench in &mut map.benches {
            if !bench.is_fixture() {
                clamp_to_bounds(bench, width, height);
            }
        }

        if !moved {
            return pass;
        }
    }

    MAX_RELAX_PASSES
}

/// Translates every selected bench by the same delta (multi-select drag).
/// The caller is expected to resolve spacing afterwards.
pub fn translate_selection(
    map: &mut SeatMap,
    ids: &[u32],
    dx: f32,
    dy: f32,
) -> Result<(), LayoutError> {
    if let Some(unknown) = ids.iter().find(|id| map.bench(**id).is_none()) {
        return Err(LayoutError::UnknownBench(*unknown));
    }

    for bench in &mut map.benches {
        if ids.contains(&bench.id) {
            bench.x += dx;
            bench.y += dy;
        }
    }

    Ok(())
}

/// Keeps the footprint inside `[0, width] x [0, height]`. An oversized bench
/// lands at the origin.
pub fn clamp_to_bounds(bench: &mut Bench, map_width: f32, map_height: f32) {
    let rect = bench.rect();
    bench.x = bench.x.clamp(0.0, (map_width - rect.width).max(0.0));
    bench.y = bench.y.clamp(0.0, (map_height - rect.height).max(0.0));
}

/// Pushes one conflicting pair apart. Returns true if anything moved.
fn separate(a: &mut Bench, b: &mut Bench) -> bool {
    if a.is_fixture() && b.is_fixture() {
        return false;
    }

    let ra = a.rect();
    let rb = b.rect();
    let (acx, acy) = ra.center();
    let (bcx, bcy) = rb.center();

    // Penetration depth per axis, clearance included. Positive on both axes
    // means the pair conflicts.
    let px = (ra.width + rb.width) / 2.0 + MIN_CLEARANCE - (bcx - acx).abs();
    let py = (ra.height + rb.height) / 2.0 + MIN_CLEARANCE - (bcy - acy).abs();
    if px <= 0.0 || py <= 0.0 {
        return false;
    }

    // Split the correction; a fixture routes its share to the other side.
    let (share_a, share_b) = match (a.is_fixture(), b.is_fixture()) {
        (false, false) => (0.5, 0.5),
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        (true, true) => unreachable!(),
    };

    if px <= py {
        let dir = if bcx >= acx { 1.0 } else { -1.0 };
        a.x -= dir * px * share_a;
        b.x += dir * px * share_b;
    } else {
        let dir = if bcy >= acy { 1.0 } else { -1.0 };
        a.y -= dir * py * share_a;
        b.y += dir * py * share_b;
    }

    true
}
