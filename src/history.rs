//! Module `history`
//!
//! Congestion history update (spec §4.4, step "update history"). Grounded
//! on `original_source/.../DataType.h`'s `updateCongestionHistory` and its
//! `str_accu(rnd)` decay schedule, supplemented per SPEC_FULL.md §3 since
//! spec.md names the history-update step but not its three branches.

use crate::grid::Grid;

/// Exponential decay applied to `last_usage` every iteration before the
/// new overflow contribution is folded in (`original_source` constant
/// `0.9`; Open Question, see DESIGN.md).
pub const HISTORY_DECAY: f32 = 0.9;

/// Which of the three history-update branches an iteration falls into,
/// selected by the iteration driver from total overflow trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    /// First iteration after a cost-schedule change: seed history from
    /// the current overflow with no decay.
    Seed,
    /// Steady state: decay the existing history, then add overflow.
    Decay,
    /// Overflow increased since the last iteration: reinforce history
    /// more aggressively so the next pass avoids the same edges harder.
    Reinforce,
}

/// `str_accu(rnd)`: the per-round step added on top of decay, growing
/// slowly with the round number so later iterations push congested edges
/// away harder than early ones.
fn str_accu(round: u32) -> f32 {
    1.0 + 0.1 * (round as f32).min(10.0)
}

/// Apply one history update pass to every 2D edge, per the three
/// `up_type` branches (spec §4.4 / SPEC_FULL.md §3).
pub fn update_congestion_history(grid: &mut Grid, update_type: UpdateType, round: u32) {
    let (x, y) = (grid.x(), grid.y());
    for yy in 0..y {
        for xx in 0..x.saturating_sub(1) {
            let e = grid.h_edge2d_mut(yy, xx);
            apply(e_last_usage_mut(e), e.overflow(), update_type, round);
        }
    }
    for yy in 0..y.saturating_sub(1) {
        for xx in 0..x {
            let e = grid.v_edge2d_mut(yy, xx);
            apply(e_last_usage_mut(e), e.overflow(), update_type, round);
        }
    }
}

fn e_last_usage_mut(e: &mut crate::grid::Edge2D) -> &mut f32 {
    &mut e.last_usage
}

/// Overflowing edges never decay: they pick up `last_usage += overflow`
/// (scaled by `str_accu` under `Reinforce`) regardless of branch, the way
/// `updateCongestionHistory` keeps a congested edge's history climbing.
/// Non-overflowing edges only decay under `Decay`/`Reinforce`; `Seed` has
/// no prior history to decay from, so it resets to zero.
fn apply(last_usage: &mut f32, overflow: i32, update_type: UpdateType, round: u32) {
    let overflow = overflow.max(0) as f32;
    if overflow > 0.0 {
        *last_usage += match update_type {
            UpdateType::Seed | UpdateType::Decay => overflow,
            UpdateType::Reinforce => overflow * str_accu(round),
        };
        return;
    }
    *last_usage = match update_type {
        UpdateType::Seed => 0.0,
        UpdateType::Decay | UpdateType::Reinforce => *last_usage * HISTORY_DECAY,
    };
}

/// Update `cong_cnt` (consecutive-overflow counter) per the same three
/// branches `update_congestion_history` uses: `Seed` leaves it alone (no
/// prior count to build on yet), `Decay`/`Reinforce` bump it for edges
/// still overflowing and let it drain by one, clamped at zero, otherwise
/// (spec §4.4; `original_source/.../maze.cpp`'s `congCNT` update).
pub fn update_congestion_counts(grid: &mut Grid, update_type: UpdateType) {
    let (x, y) = (grid.x(), grid.y());
    for yy in 0..y {
        for xx in 0..x.saturating_sub(1) {
            bump_cong_cnt(grid.h_edge2d_mut(yy, xx), update_type);
        }
    }
    for yy in 0..y.saturating_sub(1) {
        for xx in 0..x {
            bump_cong_cnt(grid.v_edge2d_mut(yy, xx), update_type);
        }
    }
}

fn bump_cong_cnt(e: &mut crate::grid::Edge2D, update_type: UpdateType) {
    match update_type {
        UpdateType::Seed => {}
        UpdateType::Decay | UpdateType::Reinforce => {
            e.cong_cnt = if e.overflow() > 0 { e.cong_cnt + 1 } else { (e.cong_cnt - 1).max(0) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn seed_sets_last_usage_to_overflow() {
        let mut g = Grid::new(3, 3, 1).unwrap();
        g.add_h_capacity(0, 1);
        g.h_edge2d_mut(0, 0).usage = 4;
        update_congestion_history(&mut g, UpdateType::Seed, 0);
        assert_eq!(g.h_edge2d(0, 0).last_usage, 3.0);
    }

    #[test]
    fn decay_shrinks_history_when_overflow_clears() {
        let mut g = Grid::new(3, 3, 1).unwrap();
        g.add_h_capacity(0, 5);
        g.h_edge2d_mut(0, 0).last_usage = 10.0;
        update_congestion_history(&mut g, UpdateType::Decay, 1);
        assert_eq!(g.h_edge2d(0, 0).last_usage, 9.0);
    }

    #[test]
    fn cong_cnt_drains_by_one_when_overflow_clears() {
        let mut g = Grid::new(3, 3, 1).unwrap();
        g.add_h_capacity(0, 5);
        g.h_edge2d_mut(0, 0).cong_cnt = 3;
        update_congestion_counts(&mut g, UpdateType::Decay);
        assert_eq!(g.h_edge2d(0, 0).cong_cnt, 2);
    }

    #[test]
    fn cong_cnt_unchanged_under_seed() {
        let mut g = Grid::new(3, 3, 1).unwrap();
        g.add_h_capacity(0, 5);
        g.h_edge2d_mut(0, 0).cong_cnt = 3;
        update_congestion_counts(&mut g, UpdateType::Seed);
        assert_eq!(g.h_edge2d(0, 0).cong_cnt, 3);
    }

    #[test]
    fn cong_cnt_increments_while_overflowing() {
        let mut g = Grid::new(3, 3, 1).unwrap();
        g.add_h_capacity(0, 1);
        g.h_edge2d_mut(0, 0).usage = 4;
        update_congestion_counts(&mut g, UpdateType::Reinforce);
        assert_eq!(g.h_edge2d(0, 0).cong_cnt, 1);
    }
}
