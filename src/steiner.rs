//! Module `steiner`
//!
//! The Steiner tree arena (`TreeNode`/`TreeEdge`) and the RSMT builder:
//! normal + congestion-driven coordinate scaling, and the edge-shifting
//! post-pass (spec §4.2). Grounded on spec §9's redesign note to replace
//! the original's fixed 3-neighbour `TreeNode` struct and hand-coded
//! index swaps with an arena of nodes addressed by index, plus explicit
//! `split_edge_at`/`merge_edges` mutation helpers.

use std::collections::HashMap;

use crate::grid::Grid;
use crate::net::FrNet;
use crate::pattern::Route;

/// One branch of a raw Steiner tree as returned by the external builder
/// (spec §6 collaborator interface): `n` is the index of its parent
/// branch, or its own index if it is a root/degree-0 branch.
#[derive(Debug, Clone, Copy)]
pub struct RawBranch {
    pub x: i32,
    pub y: i32,
    pub n: usize,
}

#[derive(Debug, Clone)]
pub struct RawTree {
    pub deg: usize,
    pub length: i64,
    pub branch: Vec<RawBranch>,
}

/// The FLUTE-like Steiner tree builder collaborator (spec §6). The core
/// never ships a FLUTE lookup-table loader (explicit Non-goal); callers
/// supply their own implementation, or use `NaiveSteinerBuilder` for a
/// dependency-free fallback.
pub trait SteinerTreeBuilder {
    fn make_steiner_tree(&self, xs: &[i32], ys: &[i32], s: &[usize], accuracy: i32) -> RawTree;
}

/// A simple Hanan-grid Prim's-algorithm Steiner heuristic: not
/// wirelength-optimal like FLUTE, but degree-limited use cases with small
/// pin counts converge to the true RSMT wirelength for d <= 3, and it's
/// dependency-free so the crate stays buildable without an external
/// lookup table.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveSteinerBuilder;

impl SteinerTreeBuilder for NaiveSteinerBuilder {
    fn make_steiner_tree(&self, xs: &[i32], ys: &[i32], _s: &[usize], _accuracy: i32) -> RawTree {
        let d = xs.len();
        if d == 1 {
            return RawTree { deg: 1, length: 0, branch: vec![RawBranch { x: xs[0], y: ys[0], n: 0 }] };
        }

        // Hanan grid candidate Steiner points: every (x_i, y_j) pair.
        let mut candidates: Vec<(i32, i32)> = Vec::new();
        for &x in xs {
            for &y in ys {
                candidates.push((x, y));
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        // Prim's algorithm over pins + Hanan candidates, restricted so
        // the MST only ever connects through rectilinear-adjacent hops;
        // this keeps the result a valid rectilinear Steiner topology.
        let pins: Vec<(i32, i32)> = xs.iter().zip(ys).map(|(&x, &y)| (x, y)).collect();
        let mut nodes: Vec<(i32, i32)> = pins.clone();
        for c in &candidates {
            if !nodes.contains(c) {
                nodes.push(*c);
            }
        }

        let n = nodes.len();
        let mut in_tree = vec![false; n];
        let mut best_cost = vec![i64::MAX; n];
        let mut best_parent = vec![0usize; n];
        in_tree[0] = true;
        for v in 1..n {
            best_cost[v] = manhattan(nodes[0], nodes[v]);
            best_parent[v] = 0;
        }

        let mut tree_edges: Vec<(usize, usize)> = Vec::new();
        for _ in 1..n {
            let mut pick = None;
            let mut pick_cost = i64::MAX;
            for v in 0..n {
                if !in_tree[v] && best_cost[v] < pick_cost {
                    pick_cost = best_cost[v];
                    pick = Some(v);
                }
            }
            let Some(v) = pick else { break };
            in_tree[v] = true;
            tree_edges.push((best_parent[v], v));
            for u in 0..n {
                if !in_tree[u] {
                    let c = manhattan(nodes[v], nodes[u]);
                    if c < best_cost[u] {
                        best_cost[u] = c;
                        best_parent[u] = v;
                    }
                }
            }
        }

        // Drop Steiner candidates that ended up as degree-1 leaves (they
        // add nothing); keep iterating until stable.
        loop {
            let mut degree = vec![0usize; n];
            for &(a, b) in &tree_edges {
                degree[a] += 1;
                degree[b] += 1;
            }
            let removable = (pins.len()..n).find(|&i| degree[i] == 1 || degree[i] == 0);
            let Some(dead) = removable else { break };
            tree_edges.retain(|&(a, b)| a != dead && b != dead);
        }

        let used: Vec<usize> = {
            let mut seen: Vec<usize> = (0..pins.len()).collect();
            for &(a, b) in &tree_edges {
                if a >= pins.len() && !seen.contains(&a) {
                    seen.push(a);
                }
                if b >= pins.len() && !seen.contains(&b) {
                    seen.push(b);
                }
            }
            seen
        };
        let remap: HashMap<usize, usize> = used.iter().enumerate().map(|(new, &old)| (old, new)).collect();

        let mut branch: Vec<RawBranch> = used.iter().map(|&old| RawBranch { x: nodes[old].0, y: nodes[old].1, n: remap[&old] }).collect();
        for &(a, b) in &tree_edges {
            let (pa, pb) = (remap[&a], remap[&b]);
            branch[pb].n = pa;
        }
        let length: i64 = tree_edges.iter().map(|&(a, b)| manhattan(nodes[a], nodes[b])).sum();

        RawTree { deg: pins.len(), length, branch }
    }
}

fn manhattan(a: (i32, i32), b: (i32, i32)) -> i64 {
    (a.0 - b.0).unsigned_abs() as i64 + (a.1 - b.1).unsigned_abs() as i64
}

/// One node of a net's Steiner tree (pin or Steiner point).
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub x: u32,
    pub y: u32,
    pub is_pin: bool,
    /// Incident edge indices, at most 3 per spec's `TreeNode` invariant.
    pub incident_edges: Vec<usize>,
    /// Canonical node id for this `(x, y)`, set during layer assignment's
    /// node-layer aggregation (spec §4.5 step 2); `self` until aliased.
    pub stack_alias: usize,
    pub bot_l: u32,
    pub top_l: u32,
}

impl TreeNode {
    fn new(x: u32, y: u32, is_pin: bool, self_idx: usize) -> Self {
        // `bot_l`/`top_l` start as an empty span; `u32::MAX` as the lower
        // bound sentinel lets layer assignment widen it with a plain
        // `min`/`max` instead of a first-touch special case.
        Self { x, y, is_pin, incident_edges: Vec::new(), stack_alias: self_idx, bot_l: u32::MAX, top_l: 0 }
    }
}

/// One edge of a net's Steiner tree, carrying its current 2-pin route
/// geometry.
#[derive(Debug, Clone)]
pub struct TreeEdge {
    pub n1: usize,
    pub n2: usize,
    pub len: u32,
    pub route: Route,
}

/// A net's Steiner tree: `2d-2` nodes, `2d-3` edges for degree `d`
/// (spec §3). Owned exclusively by the net for the lifetime of `run()`.
#[derive(Debug, Clone)]
pub struct SteinerTree {
    pub net_id: u32,
    pub nodes: Vec<TreeNode>,
    pub edges: Vec<TreeEdge>,
}

impl SteinerTree {
    pub fn new_node(&mut self, x: u32, y: u32, is_pin: bool) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::new(x, y, is_pin, idx));
        idx
    }

    pub fn add_edge(&mut self, n1: usize, n2: usize) -> usize {
        let len = self.nodes[n1].x.abs_diff(self.nodes[n2].x) + self.nodes[n1].y.abs_diff(self.nodes[n2].y);
        let idx = self.edges.len();
        let route = if len == 0 { Route::NoRoute } else { Route::L { x_first: true } };
        self.edges.push(TreeEdge { n1, n2, len, route });
        self.nodes[n1].incident_edges.push(idx);
        self.nodes[n2].incident_edges.push(idx);
        idx
    }

    /// Split `edge_idx = (a, b)` at a new Steiner node placed at
    /// `(x, y)`: becomes `(a, new)` and `(new, b)`. Used by the maze
    /// router's tree-rewiring step (spec §4.4 step 7) when a maze path
    /// attaches mid-edge rather than at an existing node.
    pub fn split_edge_at(&mut self, edge_idx: usize, x: u32, y: u32) -> usize {
        let (a, b) = (self.edges[edge_idx].n1, self.edges[edge_idx].n2);
        let new_idx = self.new_node(x, y, false);

        self.nodes[b].incident_edges.retain(|&e| e != edge_idx);
        self.edges[edge_idx].n2 = new_idx;
        self.edges[edge_idx].len = self.nodes[a].x.abs_diff(x) + self.nodes[a].y.abs_diff(y);
        self.edges[edge_idx].route = Route::NoRoute;
        self.nodes[new_idx].incident_edges.push(edge_idx);

        let new_edge = self.add_edge(new_idx, b);
        // add_edge already pushed new_edge onto both endpoints' lists.
        let _ = new_edge;
        new_idx
    }

    /// Every cell of every `Route::Maze` edge currently incident on
    /// `node`, reachable through the tree without crossing `stop_at`.
    /// Used to seed the maze router's multi-source/destination BFS
    /// (spec §4.4 step 4).
    pub fn subtree_cells(&self, node: usize, stop_at: usize, layer: u32) -> Vec<(u32, u32)> {
        let mut visited_nodes = vec![false; self.nodes.len()];
        let mut cells = Vec::new();
        let mut stack = vec![node];
        visited_nodes[node] = true;
        while let Some(n) = stack.pop() {
            cells.push((self.nodes[n].x, self.nodes[n].y));
            for &e in &self.nodes[n].incident_edges.clone() {
                let edge = &self.edges[e];
                let other = if edge.n1 == n { edge.n2 } else { edge.n1 };
                if other == stop_at || visited_nodes[other] {
                    continue;
                }
                visited_nodes[other] = true;
                let path = edge.route.to_grid_path(
                    self.nodes[edge.n1].x,
                    self.nodes[edge.n1].y,
                    self.nodes[edge.n2].x,
                    self.nodes[edge.n2].y,
                    layer,
                );
                cells.extend(path.iter().map(|s| (s.x, s.y)));
                stack.push(other);
            }
        }
        cells
    }

    pub fn degree(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_pin).count()
    }
}

/// `HTreeSuite`: bounding box much taller than wide favours a vertical
/// trunk topology.
pub fn h_tree_suite(xmin: u32, xmax: u32, ymin: u32, ymax: u32) -> bool {
    (ymax - ymin) as i64 > 3 * (xmax - xmin) as i64
}

/// `VTreeSuite`: the horizontal analogue.
pub fn v_tree_suite(xmin: u32, xmax: u32, ymin: u32, ymax: u32) -> bool {
    (xmax - xmin) as i64 > 3 * (ymax - ymin) as i64
}

/// `coeffADJ`: derive the vertical-scaling coefficient from the net's
/// bounding-box H/V usage ratio, biasing the Steiner builder toward
/// whichever topology the congestion favours (spec §4.2).
pub fn coeff_adj(grid: &Grid, net: &FrNet) -> f32 {
    let (xmin, xmax, ymin, ymax) = bbox(net);
    if h_tree_suite(xmin, xmax, ymin, ymax) {
        return 1.36;
    }
    if v_tree_suite(xmin, xmax, ymin, ymax) {
        return 1.2;
    }
    let h_usage: f32 = (ymin..=ymax).flat_map(|y| (xmin..xmax).map(move |x| (y, x))).map(|(y, x)| grid.h_edge2d(y, x).est_usage).sum();
    let v_usage: f32 = (xmin..=xmax).flat_map(|x| (ymin..ymax).map(move |y| (y, x))).map(|(y, x)| grid.v_edge2d(y, x).est_usage).sum();
    if v_usage > h_usage { 1.36 } else { 1.2 }
}

fn bbox(net: &FrNet) -> (u32, u32, u32, u32) {
    let xmin = net.pins.iter().map(|p| p.x).min().unwrap_or(0);
    let xmax = net.pins.iter().map(|p| p.x).max().unwrap_or(0);
    let ymin = net.pins.iter().map(|p| p.y).min().unwrap_or(0);
    let ymax = net.pins.iter().map(|p| p.y).max().unwrap_or(0);
    (xmin, xmax, ymin, ymax)
}

/// Builds 2D Steiner trees from nets, using either coordinate rescaling
/// ("normal") or congestion-proportional stretching ("congestion-driven")
/// to bias the external builder's topology choice (spec §4.2).
pub struct RsmtBuilder<'a> {
    pub builder: &'a dyn SteinerTreeBuilder,
}

impl<'a> RsmtBuilder<'a> {
    pub fn new(builder: &'a dyn SteinerTreeBuilder) -> Self {
        Self { builder }
    }

    /// Normal variant: scale `(x, y)` by `(100, 100 * coeff_v)` before
    /// calling the builder, then unscale. `coeff_v in {1.2, 1.36}`.
    pub fn build_normal(&self, net: &FrNet, coeff_v: f32) -> SteinerTree {
        let xs: Vec<i32> = net.pins.iter().map(|p| p.x as i32 * 100).collect();
        let ys: Vec<i32> = net.pins.iter().map(|p| (p.y as f32 * 100.0 * coeff_v).round() as i32).collect();
        let s: Vec<usize> = (0..net.pins.len()).collect();
        let raw = self.builder.make_steiner_tree(&xs, &ys, &s, 3);
        self.raw_to_tree(net, &raw, |x, y| (x / 100, (y as f32 / (100.0 * coeff_v)).round() as i32))
    }

    /// Congestion-driven variant: stretch each sorted-x interval by the
    /// horizontal congestion crossing it, and each sorted-y interval by
    /// vertical congestion, before calling the builder (spec §4.2).
    pub fn build_congestion_driven(&self, net: &FrNet, grid: &Grid, coeff_h: f32, coeff_v: f32) -> SteinerTree {
        let mut xs_sorted: Vec<u32> = net.pins.iter().map(|p| p.x).collect();
        xs_sorted.sort_unstable();
        xs_sorted.dedup();
        let mut ys_sorted: Vec<u32> = net.pins.iter().map(|p| p.y).collect();
        ys_sorted.sort_unstable();
        ys_sorted.dedup();

        let (xmin, xmax, ymin, ymax) = bbox(net);
        let width = (xmax - xmin + 1).max(1) as f32;
        let height = (ymax - ymin + 1).max(1) as f32;
        let h_cap = grid.h_edge2d(ymin, xmin.min(grid.x().saturating_sub(2))).cap.max(1) as f32;
        let v_cap = grid.v_edge2d(ymin.min(grid.y().saturating_sub(2)), xmin).cap.max(1) as f32;

        // Cumulative stretched coordinate for each distinct x (resp. y).
        let mut x_scaled: HashMap<u32, f32> = HashMap::new();
        let mut acc = 0.0f32;
        for w in xs_sorted.windows(2) {
            x_scaled.insert(w[0], acc);
            let usage_h: f32 = (ymin..=ymax)
                .map(|y| {
                    let e = grid.h_edge2d(y.min(grid.y().saturating_sub(1)), w[0].min(grid.x().saturating_sub(2)));
                    e.est_usage + e.red as f32
                })
                .sum();
            let stretch = (coeff_h * usage_h / (width * height * h_cap)).max(1.0);
            acc += stretch;
        }
        if let Some(&last) = xs_sorted.last() {
            x_scaled.insert(last, acc);
        }

        let mut y_scaled: HashMap<u32, f32> = HashMap::new();
        let mut acc = 0.0f32;
        for w in ys_sorted.windows(2) {
            y_scaled.insert(w[0], acc);
            let usage_v: f32 = (xmin..=xmax)
                .map(|x| {
                    let e = grid.v_edge2d(w[0].min(grid.y().saturating_sub(2)), x.min(grid.x().saturating_sub(1)));
                    e.est_usage + e.red as f32
                })
                .sum();
            let stretch = (coeff_v * usage_v / (width * height * v_cap)).max(1.0);
            acc += stretch;
        }
        if let Some(&last) = ys_sorted.last() {
            y_scaled.insert(last, acc);
        }

        let xs: Vec<i32> = net.pins.iter().map(|p| (x_scaled[&p.x] * 100.0) as i32).collect();
        let ys: Vec<i32> = net.pins.iter().map(|p| (y_scaled[&p.y] * 100.0) as i32).collect();
        let s: Vec<usize> = (0..net.pins.len()).collect();
        let raw = self.builder.make_steiner_tree(&xs, &ys, &s, 3);

        // Map scaled coordinates back by nearest known breakpoint.
        let inv_x = invert(&x_scaled);
        let inv_y = invert(&y_scaled);
        self.raw_to_tree(net, &raw, move |x, y| {
            let ox = nearest(&inv_x, x as f32 / 100.0);
            let oy = nearest(&inv_y, y as f32 / 100.0);
            (ox as i32, oy as i32)
        })
    }

    fn raw_to_tree(&self, net: &FrNet, raw: &RawTree, unscale: impl Fn(i32, i32) -> (i32, i32)) -> SteinerTree {
        let mut tree = SteinerTree { net_id: net.id, nodes: Vec::new(), edges: Vec::new() };
        let pin_count = net.pins.len();
        for (i, b) in raw.branch.iter().enumerate() {
            let (x, y) = unscale(b.x, b.y);
            tree.new_node(x.max(0) as u32, y.max(0) as u32, i < pin_count);
        }
        for (i, b) in raw.branch.iter().enumerate() {
            if b.n != i {
                tree.add_edge(i, b.n);
            }
        }
        tree
    }
}

fn invert(m: &HashMap<u32, f32>) -> Vec<(f32, u32)> {
    let mut v: Vec<(f32, u32)> = m.iter().map(|(&k, &val)| (val, k)).collect();
    v.sort_by(|a, b| a.0.total_cmp(&b.0));
    v
}

fn nearest(sorted: &[(f32, u32)], val: f32) -> u32 {
    sorted
        .iter()
        .min_by(|a, b| (a.0 - val).abs().total_cmp(&(b.0 - val).abs()))
        .map(|&(_, k)| k)
        .unwrap_or(0)
}

/// Two-pass edge-shifting post-pass (spec §4.2): slide internal
/// Steiner-to-Steiner edges parallel to their own orientation toward the
/// row/column of least total `est_usage`. Terminates when no move with
/// positive benefit is found, or after three outer passes.
pub fn shift_edges(tree: &mut SteinerTree, grid: &Grid) {
    for _pass in 0..3 {
        let mut improved = false;
        for edge_idx in 0..tree.edges.len() {
            let (n1, n2) = (tree.edges[edge_idx].n1, tree.edges[edge_idx].n2);
            if tree.nodes[n1].is_pin || tree.nodes[n2].is_pin {
                continue;
            }
            if tree.nodes[n1].x == tree.nodes[n2].x {
                if shift_vertical_edge(tree, grid, edge_idx) {
                    improved = true;
                }
            } else if tree.nodes[n1].y == tree.nodes[n2].y && shift_horizontal_edge(tree, grid, edge_idx) {
                improved = true;
            }
        }
        if !improved {
            break;
        }
    }
}

fn shift_vertical_edge(tree: &mut SteinerTree, grid: &Grid, edge_idx: usize) -> bool {
    let (n1, n2) = (tree.edges[edge_idx].n1, tree.edges[edge_idx].n2);
    let (y1, y2) = (tree.nodes[n1].y, tree.nodes[n2].y);
    let (ylo, yhi) = (y1.min(y2), y1.max(y2));
    let x = tree.nodes[n1].x;
    let current_cost = column_cost(grid, x, ylo, yhi);

    let search_lo = x.saturating_sub(3);
    let search_hi = (x + 3).min(grid.x().saturating_sub(1));
    let mut best_x = x;
    let mut best_cost = current_cost;
    for cand in search_lo..=search_hi {
        let c = column_cost(grid, cand, ylo, yhi);
        if c < best_cost {
            best_cost = c;
            best_x = cand;
        }
    }
    if best_x != x {
        tree.nodes[n1].x = best_x;
        tree.nodes[n2].x = best_x;
        true
    } else {
        false
    }
}

fn shift_horizontal_edge(tree: &mut SteinerTree, grid: &Grid, edge_idx: usize) -> bool {
    let (n1, n2) = (tree.edges[edge_idx].n1, tree.edges[edge_idx].n2);
    let (x1, x2) = (tree.nodes[n1].x, tree.nodes[n2].x);
    let (xlo, xhi) = (x1.min(x2), x1.max(x2));
    let y = tree.nodes[n1].y;
    let current_cost = row_cost(grid, y, xlo, xhi);

    let search_lo = y.saturating_sub(3);
    let search_hi = (y + 3).min(grid.y().saturating_sub(1));
    let mut best_y = y;
    let mut best_cost = current_cost;
    for cand in search_lo..=search_hi {
        let c = row_cost(grid, cand, xlo, xhi);
        if c < best_cost {
            best_cost = c;
            best_y = cand;
        }
    }
    if best_y != y {
        tree.nodes[n1].y = best_y;
        tree.nodes[n2].y = best_y;
        true
    } else {
        false
    }
}

fn column_cost(grid: &Grid, x: u32, ylo: u32, yhi: u32) -> f32 {
    if x >= grid.x() {
        return f32::MAX;
    }
    (ylo..yhi).map(|y| grid.v_edge2d(y, x).est_usage).sum()
}

fn row_cost(grid: &Grid, y: u32, xlo: u32, xhi: u32) -> f32 {
    if y >= grid.y() {
        return f32::MAX;
    }
    (xlo..xhi).map(|x| grid.h_edge2d(y, x).est_usage).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Pin;

    fn two_pin_net() -> FrNet {
        FrNet {
            id: 0,
            handle: 0,
            pins: vec![Pin { x: 1, y: 1, layer: 0 }, Pin { x: 5, y: 3, layer: 0 }],
            driver_idx: 0,
            edge_cost: 1,
            edge_cost_per_layer: None,
            min_layer: 0,
            max_layer: 0,
            is_clock: false,
            alpha: None,
        }
    }

    #[test]
    fn naive_builder_two_pin_is_direct_edge() {
        let builder = NaiveSteinerBuilder;
        let raw = builder.make_steiner_tree(&[100, 500], &[100, 300], &[0, 1], 3);
        assert_eq!(raw.deg, 2);
        assert!(raw.branch.len() >= 2);
    }

    #[test]
    fn rsmt_normal_two_pin_tree_has_one_edge() {
        let net = two_pin_net();
        let builder = NaiveSteinerBuilder;
        let rsmt = RsmtBuilder::new(&builder);
        let tree = rsmt.build_normal(&net, 1.2);
        assert_eq!(tree.degree(), 2);
        assert!(!tree.edges.is_empty());
    }

    #[test]
    fn split_edge_creates_new_node_and_preserves_connectivity() {
        let net = two_pin_net();
        let builder = NaiveSteinerBuilder;
        let rsmt = RsmtBuilder::new(&builder);
        let mut tree = rsmt.build_normal(&net, 1.2);
        let edges_before = tree.edges.len();
        let new_idx = tree.split_edge_at(0, 3, 1);
        assert_eq!(tree.edges.len(), edges_before + 1);
        assert_eq!(tree.nodes[new_idx].x, 3);
    }
}
