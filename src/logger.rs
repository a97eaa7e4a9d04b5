//! Module `logger`
//!
//! The "Logger sink" collaborator from spec §6: `info`/`warn`/`error(code,
//! msg)`. The core never writes to stdout directly; it always goes through
//! a `Logger` trait object so an embedding application can route messages
//! wherever it likes.

/// Sink for router diagnostics. `code` is a short machine-stable tag
/// (e.g. `"adjust-clamped"`, `"reinit-tree"`) so callers can filter or
/// count without parsing `msg`.
pub trait Logger {
    fn info(&self, code: &str, msg: &str);
    fn warn(&self, code: &str, msg: &str);
    fn error(&self, code: &str, msg: &str);
}

/// Discards everything. Default when the caller doesn't care.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn info(&self, _code: &str, _msg: &str) {}
    fn warn(&self, _code: &str, _msg: &str) {}
    fn error(&self, _code: &str, _msg: &str) {}
}

/// Forwards to the `log` crate's macros, so any `log::Log` implementation
/// installed by the embedding binary (e.g. `simplelog`, `env_logger`)
/// receives router diagnostics for free.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdLogger;

impl Logger for StdLogger {
    fn info(&self, code: &str, msg: &str) {
        log::info!(target: "router", "[{code}] {msg}");
    }
    fn warn(&self, code: &str, msg: &str) {
        log::warn!(target: "router", "[{code}] {msg}");
    }
    fn error(&self, code: &str, msg: &str) {
        log::error!(target: "router", "[{code}] {msg}");
    }
}
