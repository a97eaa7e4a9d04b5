//! Module `config`
//!
//! `RouterConfig`: every external knob from spec §6 plus the iteration
//! driver's internal schedule parameters, gathered into one struct with
//! a `new`/`Default` pair. Grounded on the teacher repo's
//! `router::Config::new`/`Config::default` builder shape.

use crate::cost::CostSchedule;

/// Tunables a caller sets before `run()`; everything else (grid size,
/// nets, adjustments) is pushed incrementally through the dedicated
/// setter calls spec §6 lists.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouterConfig {
    /// Hard cap on rip-up-and-reroute iterations (spec §4.4/§6).
    pub overflow_iterations: u32,
    /// Permit `run()` to return with nonzero overflow rather than erroring,
    /// once `overflow_iterations` is exhausted (spec §6 `set_allow_overflow`).
    pub allow_overflow: bool,
    pub verbose: bool,
    pub max_net_degree: usize,
    /// Via cost the layer-assignment DP charges per layer change
    /// (spec §4.5).
    pub via_cost: f32,
    /// Upper bound (`origEng`) a maze reroute's enlarged search region can
    /// grow to; the actual per-call margin also scales with iteration
    /// number and edge length (spec §4.4 "enlarged region").
    pub search_margin: u32,
    /// Slack subtracted from capacity in `newRipupCheck`: an edge needs
    /// rerouting once `usage + red >= capacity - ripup_threshold` (spec
    /// §4.4/§6).
    pub ripup_threshold: i32,
    /// Minimum hop length an edge must have before the maze router bothers
    /// rerouting it at all; short edges stay pattern-routed (spec §6).
    pub mazeedge_threshold: u32,
    /// Reorder nets and edges every `reorder_period`-th iteration
    /// (spec §4.4 "every third iteration").
    pub reorder_period: u32,
    /// Consecutive iterations of non-decreasing overflow tolerated
    /// before the driver gives up and restores the last good snapshot
    /// (spec §4.4 "25 monotonic-increase cap").
    pub max_monotonic_increase: u32,
    pub schedule: CostSchedule,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            overflow_iterations: 50,
            allow_overflow: false,
            verbose: false,
            max_net_degree: 1000,
            via_cost: 2.0,
            search_margin: 15,
            ripup_threshold: 0,
            mazeedge_threshold: 0,
            reorder_period: 3,
            max_monotonic_increase: 25,
            schedule: CostSchedule::default(),
        }
    }
}

/// Cost-schedule band selected from total overflow magnitude (spec §4.4
/// "cost-schedule bands"): heavier overflow gets a gentler logistic
/// knee so early iterations spread congestion instead of thrashing.
pub fn schedule_for_overflow(total_overflow: u64) -> CostSchedule {
    if total_overflow > 15_000 {
        CostSchedule { cost_height: 2.0, logis_cof: 0.5, slope: 3.0, history_enable: 0.0 }
    } else if total_overflow > 2_000 {
        CostSchedule { cost_height: 3.0, logis_cof: 0.8, slope: 4.0, history_enable: 1.0 }
    } else if total_overflow > 500 {
        CostSchedule::default()
    } else {
        CostSchedule { cost_height: 6.0, logis_cof: 1.5, slope: 8.0, history_enable: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_expected_bounds() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.overflow_iterations, 50);
        assert!(!cfg.allow_overflow);
    }

    #[test]
    fn schedule_bands_differ_by_overflow() {
        let heavy = schedule_for_overflow(20_000);
        let light = schedule_for_overflow(100);
        assert_ne!(heavy, light);
    }
}
