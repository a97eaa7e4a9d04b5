//! Module `pattern`
//!
//! `Segment`, `RouteType` and the L/Z/monotonic 2-pin pattern routers
//! (spec §4.3). Grounded on `routing_fpga::dijkstra`'s `State`/`BinaryHeap`
//! idiom from the teacher repo for the monotonic DP's predecessor
//! bookkeeping, and on spec §9's redesign note to replace the original's
//! `{NoRoute | LRoute | ZRoute | MazeRoute}` tag + raw `short*` grid list
//! with a tagged `Route` enum carrying an owned `Vec<GridStep>`.

use crate::grid::Grid;

/// One cell a route passes through, `(x, y, layer)`. Consecutive steps in
/// a `Route::Maze` differ by exactly one coordinate by one grid step
/// (spec §3 "Route record").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridStep {
    pub x: u32,
    pub y: u32,
    pub l: u32,
}

/// Tagged route geometry for one tree edge (spec §9 redesign note).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Route {
    NoRoute,
    L { x_first: bool },
    Z { hvh: bool, zpoint: i32 },
    Maze(Vec<GridStep>),
}

impl Route {
    pub fn route_type_name(&self) -> &'static str {
        match self {
            Route::NoRoute => "NoRoute",
            Route::L { .. } => "LRoute",
            Route::Z { .. } => "ZRoute",
            Route::Maze(_) => "MazeRoute",
        }
    }

    /// Lazily expand an `L`/`Z` flag record into the explicit 2D grid path
    /// between `(x1,y1)` and `(x2,y2)` (spec §3: "For L/Z routes: the same
    /// record can be generated lazily from the flags.").
    pub fn to_grid_path(&self, x1: u32, y1: u32, x2: u32, y2: u32, layer: u32) -> Vec<GridStep> {
        match self {
            Route::NoRoute => vec![],
            Route::L { x_first } => {
                let mut path = Vec::new();
                if *x_first {
                    walk_h(&mut path, y1, x1, x2, layer);
                    walk_v(&mut path, x2, y1, y2, layer);
                } else {
                    walk_v(&mut path, x1, y1, y2, layer);
                    walk_h(&mut path, y2, x1, x2, layer);
                }
                dedup_adjacent(path)
            }
            Route::Z { hvh, zpoint } => {
                let mut path = Vec::new();
                let z = *zpoint as u32;
                if *hvh {
                    walk_h(&mut path, y1, x1, z, layer);
                    walk_v(&mut path, z, y1, y2, layer);
                    walk_h(&mut path, y2, z, x2, layer);
                } else {
                    walk_v(&mut path, x1, y1, z, layer);
                    walk_h(&mut path, z, x1, x2, layer);
                    walk_v(&mut path, x2, z, y2, layer);
                }
                dedup_adjacent(path)
            }
            Route::Maze(steps) => steps.clone(),
        }
    }
}

fn walk_h(path: &mut Vec<GridStep>, y: u32, x_from: u32, x_to: u32, l: u32) {
    let (lo, hi) = (x_from.min(x_to), x_from.max(x_to));
    if x_from <= x_to {
        for x in lo..=hi {
            path.push(GridStep { x, y, l });
        }
    } else {
        for x in (lo..=hi).rev() {
            path.push(GridStep { x, y, l });
        }
    }
}

fn walk_v(path: &mut Vec<GridStep>, x: u32, y_from: u32, y_to: u32, l: u32) {
    let (lo, hi) = (y_from.min(y_to), y_from.max(y_to));
    if y_from <= y_to {
        for y in lo..=hi {
            path.push(GridStep { x, y, l });
        }
    } else {
        for y in (lo..=hi).rev() {
            path.push(GridStep { x, y, l });
        }
    }
}

fn dedup_adjacent(path: Vec<GridStep>) -> Vec<GridStep> {
    let mut out: Vec<GridStep> = Vec::with_capacity(path.len());
    for step in path {
        if out.last() != Some(&step) {
            out.push(step);
        }
    }
    out
}

/// A 2-pin connection inside a net's Steiner tree breakdown (spec §3
/// "Segment").
#[derive(Debug, Clone)]
pub struct Segment {
    pub net_id: u32,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub route: Route,
}

impl Segment {
    pub fn new(net_id: u32, x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        if x1 == x2 && y1 == y2 {
            return Self { net_id, x1, y1, x2, y2, route: Route::NoRoute };
        }
        Self { net_id, x1, y1, x2, y2, route: Route::NoRoute }
    }

    pub fn is_degenerate(&self) -> bool {
        self.x1 == self.x2 && self.y1 == self.y2
    }
}

/// `cap_lb = 0.9 * cap`; per-edge pattern-routing cost (spec §4.3).
fn edge_cost(usage: f32, cap: i32, red: i32) -> f32 {
    let cap_lb = 0.9 * cap as f32;
    (usage - cap_lb + red as f32).max(0.0)
}

fn h_path_cost(grid: &Grid, y: u32, x_from: u32, x_to: u32) -> f32 {
    let (lo, hi) = (x_from.min(x_to), x_from.max(x_to));
    (lo..hi)
        .map(|x| {
            let e = grid.h_edge2d(y, x);
            edge_cost(e.est_usage, e.cap, e.red)
        })
        .sum()
}

fn v_path_cost(grid: &Grid, x: u32, y_from: u32, y_to: u32) -> f32 {
    let (lo, hi) = (y_from.min(y_to), y_from.max(y_to));
    (lo..hi)
        .map(|y| {
            let e = grid.v_edge2d(y, x);
            edge_cost(e.est_usage, e.cap, e.red)
        })
        .sum()
}

/// `newrouteL`: pick the cheaper of the "y-first" and "x-first" L shapes.
/// `via_cost` is added to whichever shape requires a layer change at an
/// endpoint (`needs_via_{1,2}`); ties favour `prefer_x_first` (the
/// segment's current `xFirst` flag).
pub fn route_l(
    grid: &Grid,
    seg: &Segment,
    needs_via_1: bool,
    needs_via_2: bool,
    via_cost: f32,
    prefer_x_first: bool,
) -> Route {
    let (x1, y1, x2, y2) = (seg.x1, seg.y1, seg.x2, seg.y2);
    let via = (needs_via_1 as i32 + needs_via_2 as i32) as f32 * via_cost;

    let y_first_cost = v_path_cost(grid, x1, y1, y2) + h_path_cost(grid, y2, x1, x2) + via;
    let x_first_cost = h_path_cost(grid, y1, x1, x2) + v_path_cost(grid, x2, y1, y2) + via;

    let x_first = if (x_first_cost - y_first_cost).abs() < f32::EPSILON {
        prefer_x_first
    } else {
        x_first_cost < y_first_cost
    };
    Route::L { x_first }
}

/// `newrouteZ`: enumerate HVH bend positions along x and VHV bend
/// positions along y, picking the minimum-cost shape and bend point.
/// Only meaningful for segments with non-zero width *and* height; callers
/// should fall back to `route_l` otherwise.
pub fn route_z(grid: &Grid, seg: &Segment) -> Route {
    let (x1, y1, x2, y2) = (seg.x1, seg.y1, seg.x2, seg.y2);
    let (ymin, ymax) = (y1.min(y2), y1.max(y2));

    let mut best: Option<(f32, bool, i32)> = None;

    if x2 > x1 + 1 {
        for z in (x1 + 1)..x2 {
            let cost = h_path_cost(grid, y1, x1, z) + v_path_cost(grid, z, y1, y2) + h_path_cost(grid, y2, z, x2);
            if best.is_none_or(|(c, ..)| cost < c) {
                best = Some((cost, true, z as i32));
            }
        }
    }
    if ymax > ymin + 1 {
        for z in (ymin + 1)..ymax {
            let cost = v_path_cost(grid, x1, y1, z) + h_path_cost(grid, z, x1, x2) + v_path_cost(grid, x2, z, y2);
            if best.is_none_or(|(c, ..)| cost < c) {
                best = Some((cost, false, z as i32));
            }
        }
    }

    match best {
        Some((_, hvh, zpoint)) => Route::Z { hvh, zpoint },
        None => route_l(grid, seg, false, false, 0.0, true),
    }
}

/// `routeMonotonic`: exact shortest monotonic path inside the bounding
/// rectangle, via DP over a `(|y2-y1|+1) x (|x2-x1|+1)` cost table.
/// Records the result as a `Route::Maze` grid list at `layer`.
pub fn route_monotonic(grid: &Grid, seg: &Segment, layer: u32) -> Route {
    let (x1, y1, x2, y2) = (seg.x1, seg.y1, seg.x2, seg.y2);
    let y_up = y2 >= y1;
    let (ylo, yhi) = (y1.min(y2), y1.max(y2));
    let w = (x2 - x1 + 1) as usize;
    let h = (yhi - ylo + 1) as usize;

    if w == 1 || h == 1 {
        // Degenerates to a straight line; no choice to make.
        let mut path = Vec::new();
        walk_h(&mut path, y1, x1, x1, layer);
        walk_v(&mut path, x1, y1, y2, layer);
        walk_h(&mut path, y2, x1, x2, layer);
        return Route::Maze(dedup_adjacent(path));
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Parent {
        SameX,
        SameY,
        None,
    }
    let mut cost = vec![vec![0.0f32; w]; h];
    let mut parent = vec![vec![Parent::None; w]; h];

    // row 0 (y = y1), col 0 (x = x1) is the start.
    for j in 1..w {
        let x = x1 + j as u32;
        let e = grid.h_edge2d(y1, x - 1);
        cost[0][j] = cost[0][j - 1] + edge_cost(e.est_usage, e.cap, e.red);
        parent[0][j] = Parent::SameY;
    }
    for i in 1..h {
        let (ya, yb) = if y_up { (ylo + i as u32 - 1, ylo + i as u32) } else { (yhi - i as u32 + 1, yhi - i as u32) };
        let e = grid.v_edge2d(ya.min(yb), x1);
        cost[i][0] = cost[i - 1][0] + edge_cost(e.est_usage, e.cap, e.red);
        parent[i][0] = Parent::SameX;
    }
    for i in 1..h {
        for j in 1..w {
            let x = x1 + j as u32;
            let (ya, yb) = if y_up { (ylo + i as u32 - 1, ylo + i as u32) } else { (yhi - i as u32 + 1, yhi - i as u32) };
            let he = grid.h_edge2d(if y_up { ylo + i as u32 } else { yhi - i as u32 }, x - 1);
            let ve = grid.v_edge2d(ya.min(yb), x);
            let from_x = cost[i][j - 1] + edge_cost(he.est_usage, he.cap, he.red);
            let from_y = cost[i - 1][j] + edge_cost(ve.est_usage, ve.cap, ve.red);
            if from_x <= from_y {
                cost[i][j] = from_x;
                parent[i][j] = Parent::SameX;
            } else {
                cost[i][j] = from_y;
                parent[i][j] = Parent::SameY;
            }
        }
    }

    // Walk parents back from (x2,y2) to (x1,y1).
    let mut i = h - 1;
    let mut j = w - 1;
    let mut rev_path = vec![(x1 + j as u32, if y_up { ylo + i as u32 } else { yhi - i as u32 })];
    loop {
        match parent[i][j] {
            Parent::SameX => j -= 1,
            Parent::SameY => i -= 1,
            Parent::None => break,
        }
        rev_path.push((x1 + j as u32, if y_up { ylo + i as u32 } else { yhi - i as u32 }));
    }
    rev_path.reverse();
    let steps = rev_path.into_iter().map(|(x, y)| GridStep { x, y, l: layer }).collect::<Vec<_>>();
    Route::Maze(dedup_adjacent(steps))
}

/// Add (or, with a negative `delta`, remove) `delta` from `est_usage`
/// along `route`'s 2D footprint. Symmetric rip-up/commit per spec §4.3;
/// this is the pattern routers' own running congestion estimate
/// (spec.md:177), kept separate from the maze router's authoritative
/// `usage` field that `maze::apply_path_usage` maintains.
pub fn apply_est_usage(grid: &mut Grid, route: &Route, x1: u32, y1: u32, x2: u32, y2: u32, layer: u32, delta: f32) {
    let path = route.to_grid_path(x1, y1, x2, y2, layer);
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.y == b.y {
            let x = a.x.min(b.x);
            grid.h_edge2d_mut(a.y, x).est_usage += delta;
        } else if a.x == b.x {
            let y = a.y.min(b.y);
            grid.v_edge2d_mut(y, a.x).est_usage += delta;
        }
    }
}

/// Total `est_usage`-based cost of a path's hops, the same per-edge
/// `edge_cost` the pattern routers minimize over.
fn path_cost(grid: &Grid, path: &[GridStep]) -> f32 {
    path.windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            let e = if a.y == b.y { grid.h_edge2d(a.y, a.x.min(b.x)) } else { grid.v_edge2d(a.y.min(b.y), a.x) };
            edge_cost(e.est_usage, e.cap, e.red)
        })
        .sum()
}

/// Pick the cheaper of the Z-shape and full-monotonic pattern routes for
/// `seg` (spec §4.3: L/Z/Monotonic are all reachable pattern-router
/// types). Degenerate segments short-circuit to `NoRoute`.
pub fn route_best(grid: &Grid, seg: &Segment, layer: u32) -> Route {
    if seg.is_degenerate() {
        return Route::NoRoute;
    }
    let z = route_z(grid, seg);
    let mono = route_monotonic(grid, seg, layer);
    let z_cost = path_cost(grid, &z.to_grid_path(seg.x1, seg.y1, seg.x2, seg.y2, layer));
    let mono_cost = path_cost(grid, &mono.to_grid_path(seg.x1, seg.y1, seg.x2, seg.y2, layer));
    if mono_cost < z_cost {
        mono
    } else {
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_grid() -> Grid {
        let mut g = Grid::new(10, 10, 1).unwrap();
        g.add_h_capacity(0, 5);
        g.add_v_capacity(0, 5);
        g
    }

    #[test]
    fn l_route_on_empty_grid_is_zero_cost_either_way() {
        let g = empty_grid();
        let seg = Segment::new(0, 1, 1, 5, 3);
        let r = route_l(&g, &seg, false, false, 0.0, true);
        assert!(matches!(r, Route::L { x_first: true }));
    }

    #[test]
    fn l_route_avoids_congested_row() {
        let mut g = empty_grid();
        // Congest row y=1 between x=1 and x=5 (the x-first shape's H run).
        for x in 1..5 {
            g.h_edge2d_mut(1, x).est_usage = 10.0;
        }
        let seg = Segment::new(0, 1, 1, 5, 3);
        let r = route_l(&g, &seg, false, false, 0.0, true);
        assert!(matches!(r, Route::L { x_first: false }));
    }

    #[test]
    fn monotonic_path_has_correct_length() {
        let g = empty_grid();
        let seg = Segment::new(0, 1, 1, 5, 3);
        let r = route_monotonic(&g, &seg, 0);
        if let Route::Maze(steps) = r {
            assert_eq!(steps.len(), (5 - 1) + (3 - 1) + 1);
            for w in steps.windows(2) {
                let (a, b) = (w[0], w[1]);
                let dx = a.x.abs_diff(b.x);
                let dy = a.y.abs_diff(b.y);
                assert_eq!(dx + dy, 1);
            }
        } else {
            panic!("expected Maze route");
        }
    }

    #[test]
    fn route_best_is_reachable_and_valid() {
        let g = empty_grid();
        let seg = Segment::new(0, 1, 1, 5, 3);
        let r = route_best(&g, &seg, 0);
        let path = r.to_grid_path(seg.x1, seg.y1, seg.x2, seg.y2, 0);
        assert_eq!(path.first().unwrap().x, 1);
        assert_eq!(path.last().unwrap().x, 5);
    }

    #[test]
    fn route_best_never_costs_more_than_the_z_route_alone() {
        let mut g = empty_grid();
        for x in 1..5 {
            g.h_edge2d_mut(1, x).est_usage = 10.0;
            g.h_edge2d_mut(3, x).est_usage = 10.0;
        }
        let seg = Segment::new(0, 1, 1, 5, 3);
        let z = route_z(&g, &seg);
        let best = route_best(&g, &seg, 0);
        let z_cost = path_cost(&g, &z.to_grid_path(seg.x1, seg.y1, seg.x2, seg.y2, 0));
        let best_cost = path_cost(&g, &best.to_grid_path(seg.x1, seg.y1, seg.x2, seg.y2, 0));
        assert!(best_cost <= z_cost);
    }

    #[test]
    fn z_route_picks_some_bend_when_beneficial() {
        let mut g = empty_grid();
        for x in 1..5 {
            g.h_edge2d_mut(1, x).est_usage = 10.0;
            g.h_edge2d_mut(3, x).est_usage = 10.0;
        }
        let seg = Segment::new(0, 1, 1, 5, 3);
        let r = route_z(&g, &seg);
        assert!(matches!(r, Route::Z { .. } | Route::L { .. }));
    }
}
