//! Pre-built simulation scenarios.
//!
//! - First-order delay stock with a step change in inflow
//! - Perception-delay feedback loop through an Erlang delay chain
//! - SIR epidemic compartments
//! - SIR epidemic with a vaccination pulse

pub mod epidemic;
pub mod erlang_delay;
pub mod first_order_delay;
pub mod vaccination;

pub use epidemic::{EpidemicReport, HerdCrossing, SIRConfig, SIRModel, SIRScenario, SIRState};
pub use erlang_delay::{
    CorrectionWindow, ErlangDelay, ErlangRecord, PerceptionLoopConfig, PerceptionLoopScenario,
    PerceptionReport,
};
pub use first_order_delay::{
    DelayRecord, DelayReport, FirstOrderDelayConfig, FirstOrderDelayScenario,
};
pub use vaccination::{VaccinationConfig, VaccinationReport, VaccinationRun, VaccinationScenario};
