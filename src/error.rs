//! Error taxonomy for the router core (see spec §7).

use thiserror::Error;

/// Errors the router core can raise.
///
/// `Configuration` and `InvariantViolation` are fatal: the caller gets an
/// `Err` and the grid/tree state should be discarded. `CongestionTooHigh`
/// is a converge failure, only raised when `allow_overflow` is `false`.
/// `RouteIntegrity` is raised internally by `maze`/`layer_assign` checks;
/// the iteration driver catches it and rebuilds the offending tree rather
/// than propagating it to `Router::run`'s caller.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("routing congestion too high: total overflow {overflow} after iteration cap")]
    CongestionTooHigh { overflow: u64 },

    #[error("route integrity failure on net {net_id} edge {edge_idx}: {reason}")]
    RouteIntegrity {
        net_id: u32,
        edge_idx: usize,
        reason: String,
    },

    #[error("unknown net id {0}")]
    UnknownNet(u32),
}

pub type Result<T> = std::result::Result<T, RouterError>;
