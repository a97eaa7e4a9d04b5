//! Module `driver`
//!
//! The iteration driver: builds initial trees, runs cost-scheduled
//! rip-up-and-reroute to convergence, assigns layers, and assembles the
//! final result (spec §4.4/§5). Grounded on `router/src/path_finder.rs`'s
//! iteration loop (snapshot-on-improvement, bail out after a stall) for
//! the overall control-flow shape, generalized from a single fabric pass
//! to the cost-schedule-banded, net-ordered loop spec.md describes.

use std::collections::HashMap;

use crate::config::{schedule_for_overflow, RouterConfig};
use crate::error::{Result, RouterError};
use crate::grid::Grid;
use crate::history::{update_congestion_counts, update_congestion_history, UpdateType};
use crate::logger::Logger;
use crate::maze::{apply_path_usage, needs_reroute, reroute_edge};
use crate::net::NetTable;
use crate::order::{order_edges_by_congestion, order_nets};
use crate::output::{assemble, RouteResult};
use crate::pattern::{apply_est_usage, route_best, Segment};
use crate::steiner::{coeff_adj, shift_edges, RsmtBuilder, SteinerTree, SteinerTreeBuilder};

/// A point-in-time copy of every net's tree plus the grid's `est_usage`
/// snapshot, restored when the loop stalls (spec §4.4 "snapshot backup").
struct Snapshot {
    trees: Vec<SteinerTree>,
    h_est_usage: Vec<f32>,
    v_est_usage: Vec<f32>,
    overflow: u64,
}

fn snapshot_grid_usage(grid: &Grid) -> (Vec<f32>, Vec<f32>) {
    let h = (0..grid.y())
        .flat_map(|y| (0..grid.x().saturating_sub(1)).map(move |x| (y, x)))
        .map(|(y, x)| grid.h_edge2d(y, x).est_usage)
        .collect();
    let v = (0..grid.y().saturating_sub(1))
        .flat_map(|y| (0..grid.x()).map(move |x| (y, x)))
        .map(|(y, x)| grid.v_edge2d(y, x).est_usage)
        .collect();
    (h, v)
}

fn restore_grid_usage(grid: &mut Grid, h: &[f32], v: &[f32]) {
    let mut i = 0;
    for y in 0..grid.y() {
        for x in 0..grid.x().saturating_sub(1) {
            grid.h_edge2d_mut(y, x).est_usage = h[i];
            i += 1;
        }
    }
    let mut i = 0;
    for y in 0..grid.y().saturating_sub(1) {
        for x in 0..grid.x() {
            grid.v_edge2d_mut(y, x).est_usage = v[i];
            i += 1;
        }
    }
}

/// Build every net's initial Steiner tree and pattern-route each edge,
/// committing both the pattern routers' `est_usage` estimate and the
/// maze router's authoritative `usage` field as it goes (spec §4.2/§4.3).
fn build_initial_trees(grid: &mut Grid, nets: &NetTable, builder: &dyn SteinerTreeBuilder) -> Vec<SteinerTree> {
    let rsmt = RsmtBuilder::new(builder);
    let mut trees = Vec::with_capacity(nets.len());
    for net in nets.iter() {
        if net.degree() < 2 {
            trees.push(SteinerTree { net_id: net.id, nodes: Vec::new(), edges: Vec::new() });
            continue;
        }
        let coeff = coeff_adj(grid, net);
        let mut tree = rsmt.build_normal(net, coeff);
        shift_edges(&mut tree, grid);

        for edge_idx in 0..tree.edges.len() {
            let (n1, n2) = (tree.edges[edge_idx].n1, tree.edges[edge_idx].n2);
            let (x1, y1) = (tree.nodes[n1].x, tree.nodes[n1].y);
            let (x2, y2) = (tree.nodes[n2].x, tree.nodes[n2].y);
            let seg = Segment::new(net.id, x1, y1, x2, y2);
            let route = if seg.is_degenerate() { tree.edges[edge_idx].route.clone() } else { route_best(grid, &seg, net.min_layer) };
            apply_est_usage(grid, &route, x1, y1, x2, y2, net.min_layer, 1.0);
            let path = route.to_grid_path(x1, y1, x2, y2, net.min_layer);
            apply_path_usage(grid, &path, 1);
            tree.edges[edge_idx].route = route;
        }
        trees.push(tree);
    }
    trees
}

/// Rebuild a net's tree from scratch when repeated maze failures suggest
/// the existing topology can no longer be routed (spec's `RouteIntegrity`
/// error is caught here rather than propagated, per `error.rs`).
fn reinit_tree(grid: &mut Grid, nets: &NetTable, builder: &dyn SteinerTreeBuilder, old: &SteinerTree, logger: &dyn Logger) -> Result<SteinerTree> {
    let net = nets.get(old.net_id)?;
    for edge in &old.edges {
        let (n1, n2) = (&old.nodes[edge.n1], &old.nodes[edge.n2]);
        apply_est_usage(grid, &edge.route, n1.x, n1.y, n2.x, n2.y, 0, -1.0);
        let path = edge.route.to_grid_path(n1.x, n1.y, n2.x, n2.y, 0);
        apply_path_usage(grid, &path, -1);
    }
    logger.warn("reinit-tree", &format!("net {} rebuilt after repeated route-integrity failures", net.id));
    let mut fresh = build_initial_trees(grid, &single_net_table(net), builder);
    let mut tree = fresh.remove(0);
    tree.net_id = net.id;
    Ok(tree)
}

fn single_net_table(net: &crate::net::FrNet) -> NetTable {
    let mut table = NetTable::new();
    let id = table.add_net(net.handle, net.alpha, net.is_clock, net.driver_idx, net.edge_cost, net.edge_cost_per_layer.clone());
    for pin in &net.pins {
        let _ = table.add_pin(id, pin.x, pin.y, pin.layer);
    }
    let _ = table.set_layer_bounds(id, net.min_layer, net.max_layer);
    table
}

/// Run the full rip-up-and-reroute loop to convergence (or the iteration
/// cap) and return every net's final tree alongside the iteration count
/// actually used.
pub fn run(
    config: &RouterConfig,
    grid: &mut Grid,
    nets: &NetTable,
    builder: &dyn SteinerTreeBuilder,
    logger: &dyn Logger,
) -> Result<(Vec<SteinerTree>, u32)> {
    let mut trees = build_initial_trees(grid, nets, builder);

    let mut overflow = grid.total_overflow_2d();
    let mut best = Snapshot {
        trees: trees.clone(),
        h_est_usage: snapshot_grid_usage(grid).0,
        v_est_usage: snapshot_grid_usage(grid).1,
        overflow,
    };
    let mut stall_count = 0u32;
    let mut failure_counts: HashMap<(u32, usize), u32> = HashMap::new();
    let mut iterations_run = 0u32;
    let reorder_period = config.reorder_period.max(1);
    let mut net_order = order_nets(nets);

    for round in 0..config.overflow_iterations {
        iterations_run = round + 1;
        if overflow == 0 {
            break;
        }
        let schedule = schedule_for_overflow(overflow);

        if round % reorder_period == 0 {
            net_order = order_nets(nets);
        }

        for key in &net_order {
            let Some(tree) = trees.iter_mut().find(|t| t.net_id == key.net_id) else { continue };
            if tree.edges.is_empty() {
                continue;
            }
            let edge_order = order_edges_by_congestion(tree, grid);
            for ek in &edge_order {
                if !needs_reroute(tree, grid, ek.edge_idx, config.ripup_threshold, config.mazeedge_threshold) {
                    failure_counts.remove(&(key.net_id, ek.edge_idx));
                    continue;
                }
                let ok = reroute_edge(tree, grid, schedule, ek.edge_idx, round, config.search_margin);
                if ok {
                    failure_counts.remove(&(key.net_id, ek.edge_idx));
                } else {
                    let count = failure_counts.entry((key.net_id, ek.edge_idx)).or_insert(0);
                    *count += 1;
                    if *count > 3 {
                        logger.error(
                            "route-integrity",
                            &RouterError::RouteIntegrity {
                                net_id: key.net_id,
                                edge_idx: ek.edge_idx,
                                reason: "edge failed to reroute after repeated attempts".into(),
                            }
                            .to_string(),
                        );
                        if let Ok(rebuilt) = reinit_tree(grid, nets, builder, tree, logger) {
                            *tree = rebuilt;
                        }
                        failure_counts.remove(&(key.net_id, ek.edge_idx));
                        break;
                    }
                }
            }
        }

        let new_overflow = grid.total_overflow_2d();
        let update_type = if round == 0 {
            UpdateType::Seed
        } else if new_overflow > overflow {
            UpdateType::Reinforce
        } else {
            UpdateType::Decay
        };
        update_congestion_history(grid, update_type, round);
        update_congestion_counts(grid, update_type);

        if new_overflow < best.overflow {
            let (h, v) = snapshot_grid_usage(grid);
            best = Snapshot { trees: trees.clone(), h_est_usage: h, v_est_usage: v, overflow: new_overflow };
            stall_count = 0;
        } else {
            stall_count += 1;
        }
        overflow = new_overflow;

        if stall_count > config.max_monotonic_increase {
            logger.warn("stall", &format!("restoring snapshot with overflow {}", best.overflow));
            trees = best.trees.clone();
            restore_grid_usage(grid, &best.h_est_usage, &best.v_est_usage);
            overflow = best.overflow;
            break;
        }
    }

    if overflow > 0 && !config.allow_overflow {
        return Err(RouterError::CongestionTooHigh { overflow });
    }

    Ok((trees, iterations_run))
}

/// Top-level entry point: route everything and assemble the final
/// result, including 3D layer assignment (spec §4.5/§4.6).
pub fn route_all(
    config: &RouterConfig,
    grid: &mut Grid,
    nets: &NetTable,
    builder: &dyn SteinerTreeBuilder,
    logger: &dyn Logger,
) -> Result<RouteResult> {
    let (mut trees, iterations_run) = run(config, grid, nets, builder, logger)?;

    for tree in trees.iter_mut() {
        if tree.edges.is_empty() {
            continue;
        }
        let Ok(net) = nets.get(tree.net_id) else { continue };
        crate::layer_assign::assign_net_layers(tree, grid, net, config.via_cost);
    }

    Ok(assemble(grid, nets, &trees, iterations_run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NullLogger;
    use crate::steiner::NaiveSteinerBuilder;

    #[test]
    fn route_all_converges_on_uncongested_grid() {
        let mut grid = Grid::new(10, 10, 2).unwrap();
        grid.add_h_capacity(0, 8);
        grid.add_v_capacity(1, 8);
        let mut nets = NetTable::new();
        let id = nets.add_net(1, None, false, 0, 1, None);
        nets.add_pin(id, 0, 0, 0).unwrap();
        nets.add_pin(id, 5, 5, 0).unwrap();
        nets.set_layer_bounds(id, 0, 1).unwrap();

        let config = RouterConfig::default();
        let builder = NaiveSteinerBuilder;
        let logger = NullLogger;
        let result = route_all(&config, &mut grid, &nets, &builder, &logger).unwrap();
        assert_eq!(result.total_overflow, 0);
        assert!(!result.segments.is_empty());
    }
}
