//! Module `maze`
//!
//! Congestion-driven 2D rip-up-and-reroute (spec §4.4), the core of the
//! iteration loop. Grounded on `router/src/path_finding_algo.rs`'s
//! `dijkstra_verbose` for the `BinaryHeap<State>` min-heap shape, and on
//! spec §9's redesign note to replace the original's raw-pointer
//! predecessor heap with a `State`/`BinaryHeap` pair whose `Ord` treats
//! `NaN` as positive infinity so a partially-`NaN` cost table can never
//! panic a comparison.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cost::{cost_of_edge2d, CostSchedule};
use crate::grid::Grid;
use crate::pattern::{GridStep, Route};
use crate::steiner::SteinerTree;

#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    cost: f32,
    x: u32,
    y: u32,
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    /// Reversed so `BinaryHeap` (a max-heap) pops the lowest cost first.
    /// `NaN` sorts as `+inf`, i.e. last: a cost that failed to compute
    /// should never be mistaken for the cheapest option.
    fn cmp(&self, other: &Self) -> Ordering {
        let norm = |c: f32| if c.is_nan() { f32::INFINITY } else { c };
        norm(other.cost).partial_cmp(&norm(self.cost)).unwrap_or(Ordering::Equal)
    }
}

/// `newRipupCheck`: an edge needs rerouting if it's long enough to be
/// worth maze-routing at all (`mazeedge_threshold`) and some hop of its
/// current committed path sits on an edge within `ripup_threshold` of
/// overflowing: `usage + red >= capacity - ripup_threshold`.
pub fn needs_reroute(tree: &SteinerTree, grid: &Grid, edge_idx: usize, ripup_threshold: i32, mazeedge_threshold: u32) -> bool {
    let edge = &tree.edges[edge_idx];
    if edge.len < mazeedge_threshold {
        return false;
    }
    let (n1, n2) = (&tree.nodes[edge.n1], &tree.nodes[edge.n2]);
    let path = edge.route.to_grid_path(n1.x, n1.y, n2.x, n2.y, 0);
    path.windows(2).any(|w| {
        let (a, b) = (w[0], w[1]);
        let e = if a.y == b.y { grid.h_edge2d(a.y, a.x.min(b.x)) } else { grid.v_edge2d(a.y.min(b.y), a.x) };
        e.usage + e.red >= e.cap - ripup_threshold
    })
}

/// Remove (`delta = -1`) or add (`delta = 1`) one unit of `usage` along
/// every hop of a 2D path: the maze router's rip-up/commit touches the
/// authoritative `usage` field, not the pattern routers' `est_usage`
/// estimate (spec §4.4; spec.md:229-231).
pub fn apply_path_usage(grid: &mut Grid, path: &[GridStep], delta: i32) {
    for w in path.windows(2) {
        let (a, b) = (w[0], w[1]);
        if a.y == b.y {
            let (y, x) = (a.y, a.x.min(b.x));
            grid.h_edge2d_mut(y, x).usage += delta;
        } else {
            let (y, x) = (a.y.min(b.y), a.x);
            grid.v_edge2d_mut(y, x).usage += delta;
        }
    }
}

/// `enlarge = min(origEng, (iter/6+3) * routelen)`: the search region
/// grows with both iteration number and the edge's own length, capped at
/// `orig_eng` (spec §4.4 "enlarged region").
fn enlarge_margin(iter: u32, routelen: u32, orig_eng: u32) -> u32 {
    let growth = (iter / 6 + 3) * routelen.max(1);
    growth.min(orig_eng)
}

/// Bounding box covering every point in `points`, expanded by `margin`
/// grid cells and clamped to the grid's extent.
fn bbox_around(points: impl Iterator<Item = (u32, u32)>, margin: u32, grid: &Grid) -> (u32, u32, u32, u32) {
    let (mut xlo, mut xhi, mut ylo, mut yhi) = (u32::MAX, 0, u32::MAX, 0);
    for (x, y) in points {
        xlo = xlo.min(x);
        xhi = xhi.max(x);
        ylo = ylo.min(y);
        yhi = yhi.max(y);
    }
    (
        xlo.saturating_sub(margin),
        (xhi + margin).min(grid.x() - 1),
        ylo.saturating_sub(margin),
        (yhi + margin).min(grid.y() - 1),
    )
}

/// Multi-source, multi-destination Dijkstra over the 2D grid, restricted
/// to `bbox`: grows the search frontier from every cell in `sources` at
/// once and stops at the first cell it reaches in `dests` (spec §4.4
/// step 4, spec.md:209-212/235-241 — "the heart of the system"). Returns
/// the connecting path plus the actual source and destination cells it
/// attached to, or `None` if no source can reach any destination inside
/// the box.
fn dijkstra_multi(
    grid: &Grid,
    schedule: CostSchedule,
    sources: &[(u32, u32)],
    dests: &[(u32, u32)],
    bbox: (u32, u32, u32, u32),
) -> Option<(Vec<GridStep>, (u32, u32), (u32, u32))> {
    let (xlo, xhi, ylo, yhi) = bbox;
    let w = (xhi - xlo + 1) as usize;
    let h = (yhi - ylo + 1) as usize;
    let idx = |x: u32, y: u32| -> usize { ((y - ylo) as usize) * w + (x - xlo) as usize };
    let in_box = |x: u32, y: u32| x >= xlo && x <= xhi && y >= ylo && y <= yhi;

    let dest_set: std::collections::HashSet<(u32, u32)> = dests.iter().copied().collect();

    let mut dist = vec![f32::INFINITY; w * h];
    let mut prev = vec![usize::MAX; w * h];
    let mut heap = BinaryHeap::new();

    for &(sx, sy) in sources {
        if !in_box(sx, sy) {
            continue;
        }
        let i = idx(sx, sy);
        if dist[i] != 0.0 {
            dist[i] = 0.0;
            heap.push(State { cost: 0.0, x: sx, y: sy });
        }
    }
    if heap.is_empty() {
        return None;
    }

    let mut found: Option<(u32, u32)> = None;
    while let Some(State { cost, x, y }) = heap.pop() {
        let here = idx(x, y);
        if cost > dist[here] {
            continue;
        }
        if dest_set.contains(&(x, y)) {
            found = Some((x, y));
            break;
        }

        let mut neighbors: Vec<(u32, u32, f32)> = Vec::new();
        if x > xlo {
            neighbors.push((x - 1, y, cost_of_edge2d(grid.h_edge2d(y, x - 1), schedule)));
        }
        if x < xhi {
            neighbors.push((x + 1, y, cost_of_edge2d(grid.h_edge2d(y, x), schedule)));
        }
        if y > ylo {
            neighbors.push((x, y - 1, cost_of_edge2d(grid.v_edge2d(y - 1, x), schedule)));
        }
        if y < yhi {
            neighbors.push((x, y + 1, cost_of_edge2d(grid.v_edge2d(y, x), schedule)));
        }

        for (nx, ny, step_cost) in neighbors {
            let next = idx(nx, ny);
            let nd = cost + step_cost;
            if nd < dist[next] {
                dist[next] = nd;
                prev[next] = here;
                heap.push(State { cost: nd, x: nx, y: ny });
            }
        }
    }

    let (dx, dy) = found?;
    let mut steps = Vec::new();
    let mut cur = idx(dx, dy);
    let (mut cx, mut cy) = (dx, dy);
    let src_cell;
    loop {
        steps.push(GridStep { x: cx, y: cy, l: 0 });
        if dist[cur] == 0.0 {
            src_cell = (cx, cy);
            break;
        }
        cur = prev[cur];
        cy = ylo + (cur / w) as u32;
        cx = xlo + (cur % w) as u32;
    }
    steps.reverse();
    Some((steps, src_cell, (dx, dy)))
}

/// Find the tree node reachable from `start` (without crossing `stop_at`)
/// that sits at `(x, y)`, splitting the incident edge that carries `(x,
/// y)` as a mid-path cell if no existing node matches (spec §4.4 step 7).
fn resolve_attachment(tree: &mut SteinerTree, start: usize, stop_at: usize, x: u32, y: u32) -> usize {
    if tree.nodes[start].x == x && tree.nodes[start].y == y {
        return start;
    }
    let mut visited = vec![false; tree.nodes.len()];
    visited[start] = true;
    let mut stack = vec![start];
    while let Some(n) = stack.pop() {
        for e in tree.nodes[n].incident_edges.clone() {
            let edge = &tree.edges[e];
            let other = if edge.n1 == n { edge.n2 } else { edge.n1 };
            if other == stop_at || visited[other] {
                continue;
            }
            if tree.nodes[other].x == x && tree.nodes[other].y == y {
                return other;
            }
            let (ex1, ey1) = (tree.nodes[edge.n1].x, tree.nodes[edge.n1].y);
            let (ex2, ey2) = (tree.nodes[edge.n2].x, tree.nodes[edge.n2].y);
            let path = edge.route.to_grid_path(ex1, ey1, ex2, ey2, 0);
            if path.iter().any(|s| s.x == x && s.y == y) {
                return tree.split_edge_at(e, x, y);
            }
            visited[other] = true;
            stack.push(other);
        }
    }
    start
}

/// Reroute one tree edge: rip up its old path, run a multi-source,
/// multi-destination maze search from every cell of the two subtrees it
/// joins, commit the new path's usage, and rewire the edge to wherever
/// the search actually attached within each subtree (spec §4.4 steps
/// "rip up", "maze route", "commit", "rewire").
pub fn reroute_edge(tree: &mut SteinerTree, grid: &mut Grid, schedule: CostSchedule, edge_idx: usize, iter: u32, orig_eng: u32) -> bool {
    let (n1, n2) = (tree.edges[edge_idx].n1, tree.edges[edge_idx].n2);
    let (x1, y1) = (tree.nodes[n1].x, tree.nodes[n1].y);
    let (x2, y2) = (tree.nodes[n2].x, tree.nodes[n2].y);

    let old_path = tree.edges[edge_idx].route.to_grid_path(x1, y1, x2, y2, 0);
    apply_path_usage(grid, &old_path, -1);

    let sources = tree.subtree_cells(n1, n2, 0);
    let dests = tree.subtree_cells(n2, n1, 0);
    let routelen = x1.abs_diff(x2) + y1.abs_diff(y2);
    let margin = enlarge_margin(iter, routelen, orig_eng);
    let bbox = bbox_around(sources.iter().chain(dests.iter()).copied(), margin, grid);

    let Some((new_path, src_cell, dst_cell)) = dijkstra_multi(grid, schedule, &sources, &dests, bbox) else {
        apply_path_usage(grid, &old_path, 1);
        return false;
    };

    apply_path_usage(grid, &new_path, 1);

    let new_n1 = resolve_attachment(tree, n1, n2, src_cell.0, src_cell.1);
    let new_n2 = resolve_attachment(tree, n2, n1, dst_cell.0, dst_cell.1);
    if new_n1 != n1 {
        tree.nodes[n1].incident_edges.retain(|&e| e != edge_idx);
        tree.nodes[new_n1].incident_edges.push(edge_idx);
    }
    if new_n2 != n2 {
        tree.nodes[n2].incident_edges.retain(|&e| e != edge_idx);
        tree.nodes[new_n2].incident_edges.push(edge_idx);
    }
    tree.edges[edge_idx].n1 = new_n1;
    tree.edges[edge_idx].n2 = new_n2;
    tree.edges[edge_idx].len = new_path.len().saturating_sub(1) as u32;
    tree.edges[edge_idx].route = Route::Maze(new_path);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> SteinerTree {
        let mut tree = SteinerTree { net_id: 0, nodes: Vec::new(), edges: Vec::new() };
        let a = tree.new_node(0, 0, true);
        let b = tree.new_node(4, 0, true);
        tree.add_edge(a, b);
        tree
    }

    #[test]
    fn reroute_around_a_blocked_row() {
        let mut grid = Grid::new(6, 6, 1).unwrap();
        grid.add_h_capacity(0, 10);
        grid.add_v_capacity(0, 10);
        let mut tree = small_tree();
        tree.edges[0].route = Route::L { x_first: true };
        apply_path_usage(&mut grid, &tree.edges[0].route.to_grid_path(0, 0, 4, 0, 0), 1);

        // Force row y=0 to look expensive by cranking usage near cap.
        for x in 0..5 {
            grid.h_edge2d_mut(0, x).usage = 9;
        }

        let schedule = CostSchedule::default();
        let rerouted = reroute_edge(&mut tree, &mut grid, schedule, 0, 0, 2);
        assert!(rerouted);
        if let Route::Maze(path) = &tree.edges[0].route {
            assert_eq!(path.first().unwrap().x, 0);
            assert_eq!(path.last().unwrap().x, 4);
        } else {
            panic!("expected maze route after reroute");
        }
    }

    #[test]
    fn needs_reroute_false_when_no_overflow() {
        let mut grid = Grid::new(6, 6, 1).unwrap();
        grid.add_h_capacity(0, 10);
        grid.add_v_capacity(0, 10);
        let mut tree = small_tree();
        tree.edges[0].route = Route::L { x_first: true };
        assert!(!needs_reroute(&tree, &grid, 0, 0, 0));
    }

    #[test]
    fn needs_reroute_honors_ripup_threshold_slack() {
        let mut grid = Grid::new(6, 6, 1).unwrap();
        grid.add_h_capacity(0, 10);
        let mut tree = small_tree();
        tree.edges[0].route = Route::L { x_first: true };
        for x in 0..4 {
            grid.h_edge2d_mut(0, x).usage = 8;
        }
        assert!(!needs_reroute(&tree, &grid, 0, 0, 0));
        assert!(needs_reroute(&tree, &grid, 0, 3, 0));
    }

    #[test]
    fn needs_reroute_skips_short_edges_below_threshold() {
        let mut grid = Grid::new(6, 6, 1).unwrap();
        grid.add_h_capacity(0, 10);
        let mut tree = small_tree();
        tree.edges[0].route = Route::L { x_first: true };
        for x in 0..4 {
            grid.h_edge2d_mut(0, x).usage = 20;
        }
        assert!(!needs_reroute(&tree, &grid, 0, 0, 10));
    }
}
