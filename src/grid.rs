//! Module `grid`
//!
//! The congestion grid: 3D per-layer capacity/usage edges and their 2D
//! projection, plus capacity adjustments and overflow queries (spec §4.1).
//!
//! Grounded on `router/src/fabric_graph.rs`'s `FabricGraph` (adjacency +
//! per-node `Costs`) from the teacher repo, generalized from a single
//! scalar-cost node graph to the layered H/V edge grid spec.md describes;
//! the exact field layout (`cap`/`usage`/`red`/`est_usage`/`last_usage`/
//! `congCNT`) follows `original_source/.../DataType.h`'s `Edge`/`Edge3D`.

use crate::error::{Result, RouterError};
use crate::logger::Logger;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Preferred routing direction of a metal layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    Horizontal,
    Vertical,
}

/// A single tile-to-tile interface on one metal layer.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge3D {
    pub cap: u32,
    pub usage: u32,
    pub red: u32,
}

impl Edge3D {
    pub fn overflow(&self) -> u32 {
        self.usage.saturating_sub(self.cap)
    }
}

/// The 2D projection of all same-direction 3D edges at one grid location.
/// `est_usage`/`last_usage`/`cong_cnt` are the maze router's working state
/// (spec §4.4); they have no 3D counterpart.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge2D {
    pub cap: i32,
    pub usage: i32,
    pub red: i32,
    pub est_usage: f32,
    pub last_usage: f32,
    pub cong_cnt: i32,
}

impl Edge2D {
    pub fn overflow(&self) -> i32 {
        (self.usage - self.cap).max(0)
    }
}

/// One 3D edge address. `dir` is implied by which of `(x1,y1) -> (x2,y2)`
/// differs; adjacent-tile validity is checked by `Grid::edge3d_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCoord3D {
    pub layer: u32,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// The congestion grid: `X x Y` tiles across `L` layers, plus the 2D
/// capacity/usage projection used by the pattern and maze routers.
///
/// Owned exclusively by the router for the lifetime of one `run()` call
/// (spec §3 "Ownership & lifecycle").
#[derive(Debug, Clone)]
pub struct Grid {
    x: u32,
    y: u32,
    l: u32,
    layer_dir: Vec<Direction>,
    h3d: Vec<Edge3D>,
    v3d: Vec<Edge3D>,
    h2d: Vec<Edge2D>,
    v2d: Vec<Edge2D>,
    x_corner: f64,
    y_corner: f64,
    w_tile: f64,
    h_tile: f64,
}

impl Grid {
    /// `set_grid(X, Y, L)`: fix grid extents, (re)allocating every edge
    /// array to its zeroed default. Layer directions default to
    /// alternating Horizontal/Vertical starting from layer 0, the
    /// customary metal stack convention; `set_layer_orientation` can flip
    /// the whole stack afterward.
    pub fn new(x: u32, y: u32, l: u32) -> Result<Self> {
        if x == 0 || y == 0 || l == 0 {
            return Err(RouterError::Configuration(format!(
                "zero grid extent: x={x} y={y} l={l}"
            )));
        }
        let layer_dir = (0..l)
            .map(|i| if i % 2 == 0 { Direction::Horizontal } else { Direction::Vertical })
            .collect();
        Ok(Self {
            x,
            y,
            l,
            layer_dir,
            h3d: vec![Edge3D::default(); (l * y * x.saturating_sub(1)) as usize],
            v3d: vec![Edge3D::default(); (l * y.saturating_sub(1) * x) as usize],
            h2d: vec![Edge2D::default(); (y * x.saturating_sub(1)) as usize],
            v2d: vec![Edge2D::default(); (y.saturating_sub(1) * x) as usize],
            x_corner: 0.0,
            y_corner: 0.0,
            w_tile: 1.0,
            h_tile: 1.0,
        })
    }

    pub fn x(&self) -> u32 {
        self.x
    }
    pub fn y(&self) -> u32 {
        self.y
    }
    pub fn num_layers(&self) -> u32 {
        self.l
    }
    pub fn layer_direction(&self, layer: u32) -> Direction {
        self.layer_dir[layer as usize]
    }

    pub fn set_layer_orientation(&mut self, horizontal_first: bool) {
        for (i, d) in self.layer_dir.iter_mut().enumerate() {
            *d = if (i % 2 == 0) == horizontal_first {
                Direction::Horizontal
            } else {
                Direction::Vertical
            };
        }
    }

    pub fn set_lower_left(&mut self, x0: f64, y0: f64) {
        self.x_corner = x0;
        self.y_corner = y0;
    }

    pub fn set_tile_size(&mut self, w: f64, h: f64) {
        self.w_tile = w;
        self.h_tile = h;
    }

    /// Tile-center-to-real-coordinate mapping used by `output::run` (§4.6).
    pub fn tile_to_xy(&self, tile_x: u32, tile_y: u32) -> (f64, f64) {
        (
            self.x_corner + tile_x as f64 * self.w_tile,
            self.y_corner + tile_y as f64 * self.h_tile,
        )
    }

    fn h3d_index(&self, layer: u32, y: u32, x: u32) -> usize {
        (layer * self.y * (self.x - 1) + y * (self.x - 1) + x) as usize
    }
    fn v3d_index(&self, layer: u32, y: u32, x: u32) -> usize {
        (layer * (self.y - 1) * self.x + y * self.x + x) as usize
    }
    pub(crate) fn h2d_index(&self, y: u32, x: u32) -> usize {
        (y * (self.x - 1) + x) as usize
    }
    pub(crate) fn v2d_index(&self, y: u32, x: u32) -> usize {
        (y * self.x + x) as usize
    }

    pub fn h_edge3d(&self, layer: u32, y: u32, x: u32) -> &Edge3D {
        &self.h3d[self.h3d_index(layer, y, x)]
    }
    pub fn v_edge3d(&self, layer: u32, y: u32, x: u32) -> &Edge3D {
        &self.v3d[self.v3d_index(layer, y, x)]
    }
    pub fn h_edge2d(&self, y: u32, x: u32) -> &Edge2D {
        &self.h2d[self.h2d_index(y, x)]
    }
    pub fn v_edge2d(&self, y: u32, x: u32) -> &Edge2D {
        &self.v2d[self.v2d_index(y, x)]
    }
    pub fn h_edge3d_mut(&mut self, layer: u32, y: u32, x: u32) -> &mut Edge3D {
        let i = self.h3d_index(layer, y, x);
        &mut self.h3d[i]
    }
    pub fn v_edge3d_mut(&mut self, layer: u32, y: u32, x: u32) -> &mut Edge3D {
        let i = self.v3d_index(layer, y, x);
        &mut self.v3d[i]
    }
    /// Set a horizontal 3D edge's `usage` directly (the layer-assignment
    /// pass commits usage after the fact, unlike the maze router's
    /// incremental `est_usage` updates).
    pub fn set_h_edge3d_usage(&mut self, layer: u32, y: u32, x: u32, usage: u32) {
        self.h_edge3d_mut(layer, y, x).usage = usage;
    }
    pub fn set_v_edge3d_usage(&mut self, layer: u32, y: u32, x: u32, usage: u32) {
        self.v_edge3d_mut(layer, y, x).usage = usage;
    }
    pub fn h_edge2d_mut(&mut self, y: u32, x: u32) -> &mut Edge2D {
        let i = self.h2d_index(y, x);
        &mut self.h2d[i]
    }
    pub fn v_edge2d_mut(&mut self, y: u32, x: u32) -> &mut Edge2D {
        let i = self.v2d_index(y, x);
        &mut self.v2d[i]
    }

    /// `add_h_capacity(layer, cap)`: add `cap` tracks to every horizontal
    /// 3D edge on `layer`, and accumulate the same amount into the
    /// matching 2D edges, preserving the cap-sum invariant (spec §3,
    /// property 4).
    pub fn add_h_capacity(&mut self, layer: u32, cap: u32) {
        for y in 0..self.y {
            for x in 0..self.x.saturating_sub(1) {
                let i = self.h3d_index(layer, y, x);
                self.h3d[i].cap += cap;
                let j = self.h2d_index(y, x);
                self.h2d[j].cap += cap as i32;
            }
        }
    }

    pub fn add_v_capacity(&mut self, layer: u32, cap: u32) {
        for y in 0..self.y.saturating_sub(1) {
            for x in 0..self.x {
                let i = self.v3d_index(layer, y, x);
                self.v3d[i].cap += cap;
                let j = self.v2d_index(y, x);
                self.v2d[j].cap += cap as i32;
            }
        }
    }

    /// `add_adjustment`: edit one 3D edge's capacity and keep the 2D
    /// projection's cap/`red` consistent (spec §4.1 invariants).
    ///
    /// `is_reduce == true`: `amount` is a capacity reduction applied on
    /// top of the edge's current `red`; `is_reduce == false`: `amount` is
    /// the new absolute capacity for the edge (used to model blockage
    /// removal / re-opening a track).
    pub fn add_adjustment(
        &mut self,
        x1: u32,
        y1: u32,
        l1: u32,
        x2: u32,
        y2: u32,
        l2: u32,
        amount: u32,
        is_reduce: bool,
        logger: &dyn Logger,
    ) -> Result<()> {
        if l1 != l2 {
            return Err(RouterError::Configuration(format!(
                "add_adjustment spans layers {l1} and {l2}"
            )));
        }
        let (dir, y, x) = self.classify_edge(x1, y1, x2, y2)?;

        match dir {
            Direction::Horizontal => {
                let i3 = self.h3d_index(l1, y, x);
                let i2 = self.h2d_index(y, x);
                self.adjust_one(i3, i2, true, amount, is_reduce, logger);
            }
            Direction::Vertical => {
                let i3 = self.v3d_index(l1, y, x);
                let i2 = self.v2d_index(y, x);
                self.adjust_one(i3, i2, false, amount, is_reduce, logger);
            }
        }
        Ok(())
    }

    fn adjust_one(
        &mut self,
        i3: usize,
        i2: usize,
        horizontal: bool,
        amount: u32,
        is_reduce: bool,
        logger: &dyn Logger,
    ) {
        let (e3, e2) = if horizontal {
            (&mut self.h3d[i3], &mut self.h2d[i2])
        } else {
            (&mut self.v3d[i3], &mut self.v2d[i2])
        };

        if is_reduce {
            let delta = amount.min(e3.cap);
            if delta < amount {
                logger.warn(
                    "adjust-clamped",
                    &format!("reduction of {amount} exceeds remaining capacity {}; clamped to {delta}", e3.cap),
                );
            }
            e3.cap -= delta;
            e3.red += delta;
            e2.cap -= delta as i32;
            e2.red += delta as i32;
        } else {
            let delta = amount as i32 - e3.cap as i32;
            e3.cap = amount;
            e2.cap += delta;
            // `red` tracks the cumulative reduction from the nominal cap;
            // restoring capacity shrinks it back down, never below zero.
            if delta > 0 {
                let shrink = (delta as u32).min(e3.red);
                e3.red -= shrink;
                e2.red -= shrink as i32;
            }
        }
    }

    /// Validate that `(x1,y1)`/`(x2,y2)` are unit-distance axis-aligned
    /// neighbours and return `(direction, shared-row-or-col, lower index)`.
    fn classify_edge(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<(Direction, u32, u32)> {
        if y1 == y2 && x1.abs_diff(x2) == 1 {
            Ok((Direction::Horizontal, y1, x1.min(x2)))
        } else if x1 == x2 && y1.abs_diff(y2) == 1 {
            Ok((Direction::Vertical, y1.min(y2), x1))
        } else {
            Err(RouterError::Configuration(format!(
                "adjustment edge ({x1},{y1})-({x2},{y2}) is not a unit axis-aligned step"
            )))
        }
    }

    /// Total overflow summed over every 3D edge.
    pub fn total_overflow_3d(&self) -> u64 {
        self.h3d.iter().map(|e| e.overflow() as u64).sum::<u64>()
            + self.v3d.iter().map(|e| e.overflow() as u64).sum::<u64>()
    }

    /// Total overflow summed over every 2D edge (what the iteration
    /// driver tracks between passes).
    pub fn total_overflow_2d(&self) -> u64 {
        self.h2d.iter().map(|e| e.overflow() as u64).sum::<u64>()
            + self.v2d.iter().map(|e| e.overflow() as u64).sum::<u64>()
    }

    pub fn per_layer_overflow(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.l as usize];
        for layer in 0..self.l {
            for y in 0..self.y {
                for x in 0..self.x.saturating_sub(1) {
                    totals[layer as usize] += self.h_edge3d(layer, y, x).overflow() as u64;
                }
            }
            for y in 0..self.y.saturating_sub(1) {
                for x in 0..self.x {
                    totals[layer as usize] += self.v_edge3d(layer, y, x).overflow() as u64;
                }
            }
        }
        totals
    }

    /// Property 4: 2D cap equals the sum of same-direction 3D caps.
    #[cfg(test)]
    pub(crate) fn check_cap_consistency(&self) -> bool {
        for y in 0..self.y {
            for x in 0..self.x.saturating_sub(1) {
                let sum: i32 = (0..self.l)
                    .filter(|&l| self.layer_dir[l as usize] == Direction::Horizontal)
                    .map(|l| self.h_edge3d(l, y, x).cap as i32)
                    .sum();
                if sum != self.h_edge2d(y, x).cap {
                    return false;
                }
            }
        }
        for y in 0..self.y.saturating_sub(1) {
            for x in 0..self.x {
                let sum: i32 = (0..self.l)
                    .filter(|&l| self.layer_dir[l as usize] == Direction::Vertical)
                    .map(|l| self.v_edge3d(l, y, x).cap as i32)
                    .sum();
                if sum != self.v_edge2d(y, x).cap {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_h_capacity_keeps_2d_in_sync() {
        let mut g = Grid::new(4, 4, 2).unwrap();
        g.add_h_capacity(0, 3);
        assert_eq!(g.h_edge3d(0, 0, 0).cap, 3);
        assert_eq!(g.h_edge2d(0, 0).cap, 3);
        g.add_h_capacity(1, 2);
        assert_eq!(g.h_edge2d(0, 0).cap, 5);
    }

    #[test]
    fn reduce_adjustment_clamps_at_zero() {
        let mut g = Grid::new(4, 4, 1).unwrap();
        g.add_h_capacity(0, 2);
        let logger = crate::logger::NullLogger;
        g.add_adjustment(0, 0, 0, 1, 0, 0, 5, true, &logger).unwrap();
        assert_eq!(g.h_edge3d(0, 0, 0).cap, 0);
        assert_eq!(g.h_edge3d(0, 0, 0).red, 2);
        assert_eq!(g.h_edge2d(0, 0).cap, 0);
    }

    #[test]
    fn non_axis_aligned_adjustment_errors() {
        let mut g = Grid::new(4, 4, 1).unwrap();
        let logger = crate::logger::NullLogger;
        let err = g.add_adjustment(0, 0, 0, 1, 1, 0, 1, true, &logger);
        assert!(err.is_err());
    }

    #[test]
    fn cap_consistency_holds_after_adjustment() {
        let mut g = Grid::new(5, 5, 2).unwrap();
        g.add_h_capacity(0, 4);
        g.add_v_capacity(1, 4);
        let logger = crate::logger::NullLogger;
        g.add_adjustment(2, 0, 0, 3, 0, 0, 1, true, &logger).unwrap();
        assert!(g.check_cap_consistency());
    }
}
