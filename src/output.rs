//! Module `output`
//!
//! Final result assembly (spec §4.6): flatten every net's committed 3D
//! tree into real-coordinate wire segments, and summarize grid
//! congestion for the caller. Grounded on the teacher repo's
//! `graph_to_json`/`IterationResult` CSV/JSON export shape, adapted from
//! a single fabric snapshot to a per-net segment list.

use crate::grid::Grid;
use crate::net::NetTable;
use crate::pattern::GridStep;
use crate::steiner::SteinerTree;

/// One committed wire segment in real (micron) coordinates, the unit the
/// caller actually places on a layout (spec §4.6 `GSegment`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GSegment {
    pub net_id: u32,
    pub x1: f64,
    pub y1: f64,
    pub l1: u32,
    pub x2: f64,
    pub y2: f64,
    pub l2: u32,
}

/// `run()`'s final output: every net's segments plus the grid's overflow
/// summary, for a caller deciding whether the result is usable as-is.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteResult {
    pub segments: Vec<GSegment>,
    pub total_overflow: u64,
    pub per_layer_overflow: Vec<u64>,
    pub iterations_run: u32,
}

/// Collapse a `Route::Maze`'s `GridStep` run into minimal collinear
/// segments, then map tile coordinates to real coordinates via `grid`'s
/// lower-left corner and tile size.
fn steps_to_segments(grid: &Grid, net_id: u32, steps: &[GridStep]) -> Vec<GSegment> {
    let mut segments = Vec::new();
    let mut i = 0;
    while i + 1 < steps.len() {
        let start = steps[i];
        let mut j = i + 1;
        let dir = direction_of(start, steps[i + 1]);
        while j + 1 < steps.len() && direction_of(steps[j], steps[j + 1]) == dir {
            j += 1;
        }
        let end = steps[j];
        let (x1, y1) = grid.tile_to_xy(start.x, start.y);
        let (x2, y2) = grid.tile_to_xy(end.x, end.y);
        segments.push(GSegment { net_id, x1, y1, l1: start.l, x2, y2, l2: end.l });
        i = j;
    }
    segments
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepDir {
    X,
    Y,
    Layer,
}

fn direction_of(a: GridStep, b: GridStep) -> StepDir {
    if a.l != b.l {
        StepDir::Layer
    } else if a.y != b.y {
        StepDir::Y
    } else {
        StepDir::X
    }
}

/// Assemble the final `RouteResult` from every net's committed tree and
/// the grid's current congestion state (spec §4.6 `run`).
pub fn assemble(grid: &Grid, nets: &NetTable, trees: &[SteinerTree], iterations_run: u32) -> RouteResult {
    let mut segments = Vec::new();
    for tree in trees {
        let Ok(net) = nets.get(tree.net_id) else { continue };
        for edge in &tree.edges {
            let (n1, n2) = (&tree.nodes[edge.n1], &tree.nodes[edge.n2]);
            let steps = edge.route.to_grid_path(n1.x, n1.y, n2.x, n2.y, net.min_layer);
            segments.extend(steps_to_segments(grid, net.id, &steps));
        }
    }
    RouteResult {
        segments,
        total_overflow: grid.total_overflow_3d(),
        per_layer_overflow: grid.per_layer_overflow(),
        iterations_run,
    }
}

/// `updateDbCongestion`: per-layer overflow a caller can push back into
/// its own database for downstream DRC/timing tools (spec §4.6).
pub fn layer_congestion_ratios(grid: &Grid) -> Vec<f64> {
    grid.per_layer_overflow().iter().map(|&o| o as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Route;

    #[test]
    fn assemble_collapses_collinear_steps() {
        let mut grid = Grid::new(10, 10, 1).unwrap();
        grid.set_tile_size(2.0, 2.0);
        let mut nets = NetTable::new();
        let id = nets.add_net(1, None, false, 0, 1, None);
        nets.add_pin(id, 0, 0, 0).unwrap();
        nets.add_pin(id, 4, 0, 0).unwrap();

        let mut tree = SteinerTree { net_id: id, nodes: Vec::new(), edges: Vec::new() };
        let a = tree.new_node(0, 0, true);
        let b = tree.new_node(4, 0, true);
        tree.add_edge(a, b);
        tree.edges[0].route = Route::Maze(vec![
            GridStep { x: 0, y: 0, l: 0 },
            GridStep { x: 1, y: 0, l: 0 },
            GridStep { x: 2, y: 0, l: 0 },
            GridStep { x: 3, y: 0, l: 0 },
            GridStep { x: 4, y: 0, l: 0 },
        ]);

        let result = assemble(&grid, &nets, &[tree], 1);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].x2, 8.0);
    }
}
