//! # dynsim
//!
//! Small dynamical-system simulations for teaching system dynamics:
//! - First-order delay stock with a step change in inflow
//! - Perception-delay feedback loop with an Erlang (third-order) delay
//! - SIR epidemic compartments, with and without a vaccination pulse
//!
//! Stock-flow models are marched with explicit Euler on a fixed grid; the
//! epidemic models use an adaptive Dormand-Prince solver sampled at fixed
//! evaluation times.
//!
//! ## Example
//!
//! ```rust
//! use dynsim::prelude::*;
//!
//! let scenario = FirstOrderDelayScenario::new(FirstOrderDelayConfig::default());
//! let trajectory = scenario.run().unwrap();
//! assert_eq!(trajectory.len(), 51);
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops,  // Textbook update formulas are kept readable
    clippy::imprecise_flops,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,
    clippy::needless_range_loop,   // Index loops mirror the difference equations
)]

pub mod cli;
pub mod config;
pub mod domains;
pub mod engine;
pub mod error;
pub mod logging;
pub mod scenarios;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{DynConfig, DynConfigBuilder, SolverConfig};
    pub use crate::domains::ode::{
        DormandPrince, EulerIntegrator, Integrator, OdeSolution, OdeSystem, RK4Integrator,
    };
    pub use crate::engine::clock::TimeGrid;
    pub use crate::engine::jidoka::{JidokaConfig, JidokaGuard};
    pub use crate::error::{SimError, SimResult};
    pub use crate::scenarios::{
        ErlangDelay, FirstOrderDelayConfig, FirstOrderDelayScenario, PerceptionLoopConfig,
        PerceptionLoopScenario, SIRConfig, SIRScenario, VaccinationConfig, VaccinationScenario,
    };
}

/// Re-export for public API
pub use error::{SimError, SimResult};
