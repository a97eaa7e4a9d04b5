//! Module `net`
//!
//! `FrNet` and its pins (spec §3 "Net"). Grounded on `router/src/node.rs`'s
//! `Node`/`Costs` pair for the "small owned struct with a `new`/default"
//! shape, generalized from a single fabric node to a net with a pin list.

use crate::error::{Result, RouterError};

/// A pin location in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pin {
    pub x: u32,
    pub y: u32,
    pub layer: u32,
}

/// A net to be routed: an opaque external id, its pins, and the routing
/// parameters that scale its edge cost.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrNet {
    pub id: u32,
    pub handle: u64,
    pub pins: Vec<Pin>,
    pub driver_idx: usize,
    pub edge_cost: i32,
    pub edge_cost_per_layer: Option<Vec<i32>>,
    pub min_layer: u32,
    pub max_layer: u32,
    pub is_clock: bool,
    pub alpha: Option<f32>,
}

impl FrNet {
    pub fn degree(&self) -> usize {
        self.pins.len()
    }

    pub fn driver_pin(&self) -> Pin {
        self.pins[self.driver_idx]
    }

    /// `edge_cost` for a move on `layer`, falling back to the net-wide
    /// default when no per-layer override was supplied (spec §3).
    pub fn edge_cost_on(&self, layer: u32) -> i32 {
        self.edge_cost_per_layer
            .as_ref()
            .and_then(|v| v.get(layer as usize).copied())
            .unwrap_or(self.edge_cost)
    }
}

/// Owns every net in the current `run()` call and hands out net ids.
#[derive(Debug, Clone, Default)]
pub struct NetTable {
    nets: Vec<FrNet>,
}

impl NetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `addNet(net_handle, num_pins, alpha, is_clock, driver_idx,
    /// edge_cost, edge_cost_per_layer)`: returns the net id subsequent
    /// `add_pin` calls target.
    #[allow(clippy::too_many_arguments)]
    pub fn add_net(
        &mut self,
        handle: u64,
        alpha: Option<f32>,
        is_clock: bool,
        driver_idx: usize,
        edge_cost: i32,
        edge_cost_per_layer: Option<Vec<i32>>,
    ) -> u32 {
        let id = self.nets.len() as u32;
        self.nets.push(FrNet {
            id,
            handle,
            pins: Vec::new(),
            driver_idx,
            edge_cost,
            edge_cost_per_layer,
            min_layer: 0,
            max_layer: u32::MAX,
            is_clock,
            alpha,
        });
        id
    }

    pub fn add_pin(&mut self, net_id: u32, x: u32, y: u32, layer: u32) -> Result<()> {
        let net = self
            .nets
            .get_mut(net_id as usize)
            .ok_or(RouterError::UnknownNet(net_id))?;
        net.pins.push(Pin { x, y, layer });
        Ok(())
    }

    pub fn set_layer_bounds(&mut self, net_id: u32, min_layer: u32, max_layer: u32) -> Result<()> {
        let net = self
            .nets
            .get_mut(net_id as usize)
            .ok_or(RouterError::UnknownNet(net_id))?;
        net.min_layer = min_layer;
        net.max_layer = max_layer;
        Ok(())
    }

    pub fn set_alpha(&mut self, net_id: u32, alpha: f32) -> Result<()> {
        let net = self
            .nets
            .get_mut(net_id as usize)
            .ok_or(RouterError::UnknownNet(net_id))?;
        net.alpha = Some(alpha);
        Ok(())
    }

    pub fn get(&self, net_id: u32) -> Result<&FrNet> {
        self.nets.get(net_id as usize).ok_or(RouterError::UnknownNet(net_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrNet> {
        self.nets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrNet> {
        self.nets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_net_and_pins() {
        let mut table = NetTable::new();
        let id = table.add_net(7, None, false, 0, 1, None);
        table.add_pin(id, 1, 1, 0).unwrap();
        table.add_pin(id, 5, 3, 0).unwrap();
        let net = table.get(id).unwrap();
        assert_eq!(net.degree(), 2);
        assert_eq!(net.driver_pin(), Pin { x: 1, y: 1, layer: 0 });
    }

    #[test]
    fn unknown_net_errors() {
        let mut table = NetTable::new();
        assert!(table.add_pin(42, 0, 0, 0).is_err());
    }
}
