//! Core simulation machinery shared by all scenarios.
//!
//! - Fixed time axes for stepping and for solver output
//! - Jidoka guards for stop-on-error

pub mod clock;
pub mod jidoka;

pub use clock::TimeGrid;
pub use jidoka::{JidokaConfig, JidokaGuard};
