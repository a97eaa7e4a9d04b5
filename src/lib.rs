//! Global router core for VLSI physical design.
//!
//! Takes a fixed-size layer/tile congestion grid and a set of multi-pin
//! nets, and produces congestion-aware rectilinear routes: an RSMT
//! breakdown per net, pattern or maze routing per tree edge, and a final
//! 3D layer assignment with vias (spec §1-§5).
//!
//! ## Features
//! - `serde` (default): `Serialize`/`Deserialize` on the public data
//!   types (`RouterConfig`, `RouteResult`, `GSegment`, pin/edge records),
//!   for callers that persist a run's result or replay a congestion
//!   snapshot.
//!
//! The core never loads a Steiner-tree lookup table, parses a design
//! file format, or drives a GUI; callers supply a [`steiner::SteinerTreeBuilder`]
//! and push grid/net state through the [`Router`] API (spec §6).

pub mod config;
pub mod cost;
pub mod driver;
pub mod error;
pub mod grid;
pub mod history;
pub mod layer_assign;
pub mod logger;
pub mod maze;
pub mod net;
pub mod order;
pub mod output;
pub mod pattern;
pub mod steiner;

pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use grid::Grid;
pub use logger::{Logger, NullLogger, StdLogger};
pub use net::{FrNet, NetTable, Pin};
pub use output::{GSegment, RouteResult};
pub use steiner::{NaiveSteinerBuilder, SteinerTreeBuilder};

/// The router's external API (spec §6): a caller builds one `Router`,
/// pushes grid and net state through its setters, then calls [`Router::run`].
/// Owns the grid, net table, and configuration for exactly one `run()`
/// call (spec §3 "Ownership & lifecycle").
pub struct Router {
    grid: Option<Grid>,
    nets: NetTable,
    config: RouterConfig,
    logger: Box<dyn Logger>,
    builder: Box<dyn SteinerTreeBuilder>,
}

impl Router {
    pub fn new() -> Self {
        Self { grid: None, nets: NetTable::new(), config: RouterConfig::default(), logger: Box::new(NullLogger), builder: Box::new(NaiveSteinerBuilder) }
    }

    /// Swap in a caller-supplied logger (e.g. [`StdLogger`] to forward
    /// through the `log` facade). Silent ([`NullLogger`]) by default.
    pub fn set_logger(&mut self, logger: Box<dyn Logger>) {
        self.logger = logger;
    }

    /// Swap in a caller-supplied Steiner tree builder (e.g. a FLUTE
    /// binding). Uses [`NaiveSteinerBuilder`] by default.
    pub fn set_steiner_builder(&mut self, builder: Box<dyn SteinerTreeBuilder>) {
        self.builder = builder;
    }

    pub fn set_grid(&mut self, x: u32, y: u32, l: u32) -> Result<()> {
        self.grid = Some(Grid::new(x, y, l)?);
        Ok(())
    }

    fn grid_mut(&mut self) -> Result<&mut Grid> {
        self.grid.as_mut().ok_or_else(|| RouterError::Configuration("set_grid must be called before any grid setter".into()))
    }

    pub fn set_layer_orientation(&mut self, horizontal_first: bool) -> Result<()> {
        self.grid_mut()?.set_layer_orientation(horizontal_first);
        Ok(())
    }

    pub fn set_lower_left(&mut self, x0: f64, y0: f64) -> Result<()> {
        self.grid_mut()?.set_lower_left(x0, y0);
        Ok(())
    }

    pub fn set_tile_size(&mut self, w: f64, h: f64) -> Result<()> {
        self.grid_mut()?.set_tile_size(w, h);
        Ok(())
    }

    pub fn add_h_capacity(&mut self, layer: u32, cap: u32) -> Result<()> {
        self.grid_mut()?.add_h_capacity(layer, cap);
        Ok(())
    }

    pub fn add_v_capacity(&mut self, layer: u32, cap: u32) -> Result<()> {
        self.grid_mut()?.add_v_capacity(layer, cap);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_adjustment(&mut self, x1: u32, y1: u32, l1: u32, x2: u32, y2: u32, l2: u32, amount: u32, is_reduce: bool) -> Result<()> {
        let logger = &*self.logger;
        self.grid.as_mut().ok_or_else(|| RouterError::Configuration("set_grid must be called before add_adjustment".into()))?.add_adjustment(
            x1, y1, l1, x2, y2, l2, amount, is_reduce, logger,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_net(&mut self, handle: u64, alpha: Option<f32>, is_clock: bool, driver_idx: usize, edge_cost: i32, edge_cost_per_layer: Option<Vec<i32>>) -> u32 {
        self.nets.add_net(handle, alpha, is_clock, driver_idx, edge_cost, edge_cost_per_layer)
    }

    pub fn add_pin(&mut self, net_id: u32, x: u32, y: u32, layer: u32) -> Result<()> {
        self.nets.add_pin(net_id, x, y, layer)
    }

    pub fn set_net_layer_bounds(&mut self, net_id: u32, min_layer: u32, max_layer: u32) -> Result<()> {
        self.nets.set_layer_bounds(net_id, min_layer, max_layer)
    }

    pub fn set_alpha(&mut self, net_id: u32, alpha: f32) -> Result<()> {
        self.nets.set_alpha(net_id, alpha)
    }

    pub fn set_overflow_iterations(&mut self, n: u32) {
        self.config.overflow_iterations = n;
    }

    pub fn set_allow_overflow(&mut self, allow: bool) {
        self.config.allow_overflow = allow;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    pub fn set_max_net_degree(&mut self, max_degree: usize) {
        self.config.max_net_degree = max_degree;
    }

    /// Route every net pushed so far and return the assembled result
    /// (spec §4.6). Consumes no state; a `Router` can be `run()` again
    /// after further `add_adjustment`/`add_net` calls, though the crate
    /// makes no guarantee about incremental reuse of the previous run's
    /// congestion history.
    pub fn run(&mut self) -> Result<RouteResult> {
        let grid = self.grid.as_mut().ok_or_else(|| RouterError::Configuration("set_grid must be called before run".into()))?;
        for net in self.nets.iter() {
            if net.degree() > self.config.max_net_degree {
                return Err(RouterError::InvariantViolation(format!(
                    "net {} has degree {} exceeding max_net_degree {}",
                    net.id,
                    net.degree(),
                    self.config.max_net_degree
                )));
            }
        }
        driver::route_all(&self.config, grid, &self.nets, self.builder.as_ref(), self.logger.as_ref())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_two_pin_net_routes_without_overflow() {
        let mut router = Router::new();
        router.set_grid(10, 10, 2).unwrap();
        router.add_h_capacity(0, 8).unwrap();
        router.add_v_capacity(1, 8).unwrap();

        let net_id = router.add_net(1, None, false, 0, 1, None);
        router.add_pin(net_id, 0, 0, 0).unwrap();
        router.add_pin(net_id, 6, 6, 0).unwrap();
        router.set_net_layer_bounds(net_id, 0, 1).unwrap();

        let result = router.run().unwrap();
        assert_eq!(result.total_overflow, 0);
        assert!(!result.segments.is_empty());
    }

    #[test]
    fn run_without_grid_errors() {
        let mut router = Router::new();
        let net_id = router.add_net(1, None, false, 0, 1, None);
        router.add_pin(net_id, 0, 0, 0).unwrap();
        assert!(router.run().is_err());
    }

    #[test]
    fn degree_over_limit_is_rejected() {
        let mut router = Router::new();
        router.set_grid(10, 10, 1).unwrap();
        router.add_h_capacity(0, 4).unwrap();
        router.set_max_net_degree(1);
        let net_id = router.add_net(1, None, false, 0, 1, None);
        router.add_pin(net_id, 0, 0, 0).unwrap();
        router.add_pin(net_id, 1, 0, 0).unwrap();
        assert!(router.run().is_err());
    }
}
