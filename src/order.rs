//! Module `order`
//!
//! Net and edge routing order (spec §4.4 "every third iteration, reorder
//! nets"). Grounded on `original_source/.../DataType.h`'s `OrderNetEdge`/
//! `OrderTree` sort keys, renamed per SPEC_FULL.md §3 to `EdgeOrderKey`/
//! `NetOrderKey`; the teacher's `router/src/node.rs` `Costs` ordering by
//! `partial_cmp` supplies the "sort a `Vec` of small owned keys" idiom.

use crate::grid::Grid;
use crate::net::{FrNet, NetTable};
use crate::steiner::SteinerTree;

/// Sort key for one net: processed largest-bounding-box-and-degree first,
/// since big nets reshape congestion the most and should claim cheap
/// edges before small ones compete for the same tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetOrderKey {
    pub net_id: u32,
    pub half_perimeter: u32,
    pub degree: u32,
}

/// Sort key for one tree edge within a net, ordered by descending length
/// so the longest, most congestion-sensitive spans reroute first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeOrderKey {
    pub edge_idx: usize,
    pub len: u32,
}

fn half_perimeter(net: &FrNet) -> u32 {
    let xmin = net.pins.iter().map(|p| p.x).min().unwrap_or(0);
    let xmax = net.pins.iter().map(|p| p.x).max().unwrap_or(0);
    let ymin = net.pins.iter().map(|p| p.y).min().unwrap_or(0);
    let ymax = net.pins.iter().map(|p| p.y).max().unwrap_or(0);
    (xmax - xmin) + (ymax - ymin)
}

/// `netedgeOrderDec`: order nets by descending half-perimeter-wirelength,
/// breaking ties by degree. Re-run every third iteration (spec §4.4).
pub fn order_nets(nets: &NetTable) -> Vec<NetOrderKey> {
    let mut keys: Vec<NetOrderKey> = nets
        .iter()
        .map(|n| NetOrderKey { net_id: n.id, half_perimeter: half_perimeter(n), degree: n.degree() as u32 })
        .collect();
    keys.sort_by(|a, b| b.half_perimeter.cmp(&a.half_perimeter).then(b.degree.cmp(&a.degree)));
    keys
}

/// `StNetOrder`: order one net's tree edges by descending length, so the
/// costliest edges get first crack at the freshly-updated cost tables
/// within a single net's reroute pass.
pub fn order_edges(tree: &SteinerTree) -> Vec<EdgeOrderKey> {
    let mut keys: Vec<EdgeOrderKey> =
        tree.edges.iter().enumerate().map(|(idx, e)| EdgeOrderKey { edge_idx: idx, len: e.len }).collect();
    keys.sort_by(|a, b| b.len.cmp(&a.len));
    keys
}

/// Ranks edges that currently sit on overflowed grid edges ahead of
/// clean ones, within the length-descending order `order_edges` gives;
/// used by the maze router to decide rip-up priority inside one net.
pub fn order_edges_by_congestion(tree: &SteinerTree, grid: &Grid) -> Vec<EdgeOrderKey> {
    let mut keys = order_edges(tree);
    keys.sort_by(|a, b| {
        let ca = edge_overflow(tree, grid, a.edge_idx);
        let cb = edge_overflow(tree, grid, b.edge_idx);
        cb.cmp(&ca).then(b.len.cmp(&a.len))
    });
    keys
}

fn edge_overflow(tree: &SteinerTree, grid: &Grid, edge_idx: usize) -> i32 {
    let edge = &tree.edges[edge_idx];
    let (n1, n2) = (&tree.nodes[edge.n1], &tree.nodes[edge.n2]);
    let path = edge.route.to_grid_path(n1.x, n1.y, n2.x, n2.y, 0);
    path.windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            if a.y == b.y {
                grid.h_edge2d(a.y, a.x.min(b.x)).overflow()
            } else {
                grid.v_edge2d(a.y.min(b.y), a.x).overflow()
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_nets_sorts_by_descending_half_perimeter() {
        let mut table = NetTable::new();
        let small = table.add_net(1, None, false, 0, 1, None);
        table.add_pin(small, 0, 0, 0).unwrap();
        table.add_pin(small, 1, 1, 0).unwrap();
        let big = table.add_net(2, None, false, 0, 1, None);
        table.add_pin(big, 0, 0, 0).unwrap();
        table.add_pin(big, 9, 9, 0).unwrap();

        let order = order_nets(&table);
        assert_eq!(order[0].net_id, big);
        assert_eq!(order[1].net_id, small);
    }

    #[test]
    fn order_edges_sorts_by_descending_length() {
        let mut tree = SteinerTree { net_id: 0, nodes: Vec::new(), edges: Vec::new() };
        let a = tree.new_node(0, 0, true);
        let b = tree.new_node(5, 0, false);
        let c = tree.new_node(5, 1, true);
        tree.add_edge(a, b);
        tree.add_edge(b, c);
        let order = order_edges(&tree);
        assert_eq!(order[0].edge_idx, 0);
        assert_eq!(order[1].edge_idx, 1);
    }
}
