//! Module `cost`
//!
//! The maze router's precomputed edge-cost tables (spec §4.4). Grounded on
//! `router/src/path_finding_algo.rs::dijkstra_verbose`'s
//! `self.costs[edge.node_id].calc_costs(base_cost)` call, which plays the
//! same role (turn accumulated usage into an edge weight) with a simpler
//! linear formula; this module implements spec's logistic-plus-linear
//! schedule instead.

/// Sentinel cost standing in for "no path" / a capacity-exhausted edge.
/// Matches `original_source/.../DataType.h`'s `BIG_INT = 1e7`.
pub const BIG_COST: f32 = 1e7;

/// Parameters the iteration driver tunes every pass (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostSchedule {
    pub cost_height: f32,
    pub logis_cof: f32,
    pub slope: f32,
    /// Multiplier on the `last_usage` history term; spec leaves the exact
    /// semantics of `L` beyond "enable history" unspecified (Open
    /// Question, see DESIGN.md) but fixes it to `{0, 1}`.
    pub history_enable: f32,
}

impl Default for CostSchedule {
    fn default() -> Self {
        Self {
            cost_height: 4.0,
            logis_cof: 1.0,
            slope: 5.0,
            history_enable: 1.0,
        }
    }
}

/// `cost(u) = costHeight / (exp((cap - u) * LOGIS_COF) + 1) + 1
///            + (u >= cap) ? costHeight / slope * (u - cap) : 0`
///
/// `u = usage + red + history_enable * last_usage`, precomputed as a
/// lookup table spanning `u in [0, 40 * cap]` (spec's stated table range).
#[derive(Debug, Clone)]
pub struct CostTable {
    cap: i32,
    table: Vec<f32>,
}

impl CostTable {
    pub fn build(cap: i32, schedule: CostSchedule) -> Self {
        let cap = cap.max(1);
        let len = (40 * cap).max(1) as usize + 1;
        let table = (0..len)
            .map(|u| cost_at(u as f32, cap as f32, schedule))
            .collect();
        Self { cap, table }
    }

    pub fn lookup(&self, u: f32) -> f32 {
        let idx = u.round().clamp(0.0, (self.table.len() - 1) as f32) as usize;
        self.table[idx]
    }

    pub fn cap(&self) -> i32 {
        self.cap
    }
}

fn cost_at(u: f32, cap: f32, s: CostSchedule) -> f32 {
    let logistic = s.cost_height / (((cap - u) * s.logis_cof).exp() + 1.0) + 1.0;
    let tail = if u >= cap { (s.cost_height / s.slope) * (u - cap) } else { 0.0 };
    logistic + tail
}

/// Exact (non-tabulated) edge cost, used by the maze router where edges
/// can carry non-uniform capacity after `add_adjustment` and a single
/// precomputed table keyed on one nominal cap would be inaccurate.
pub fn cost_of_edge2d(e: &crate::grid::Edge2D, schedule: CostSchedule) -> f32 {
    let u = e.usage as f32 + e.red as f32 + schedule.history_enable * e.last_usage;
    cost_at(u, e.cap as f32, schedule)
}

/// Separate H/V tables, since H and V edges may have different
/// capacities on a given net's bounding region.
#[derive(Debug, Clone)]
pub struct CostTables {
    pub h: CostTable,
    pub v: CostTable,
}

impl CostTables {
    pub fn build(h_cap: i32, v_cap: i32, schedule: CostSchedule) -> Self {
        Self {
            h: CostTable::build(h_cap, schedule),
            v: CostTable::build(v_cap, schedule),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_increases_with_usage() {
        let t = CostTable::build(5, CostSchedule::default());
        assert!(t.lookup(0.0) < t.lookup(4.0));
        assert!(t.lookup(4.0) < t.lookup(5.0));
        assert!(t.lookup(5.0) < t.lookup(10.0));
    }

    #[test]
    fn lookup_clamps_out_of_range() {
        let t = CostTable::build(2, CostSchedule::default());
        let at_edge = t.lookup(1_000_000.0);
        assert!(at_edge.is_finite());
    }
}
