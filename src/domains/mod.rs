//! Numerical integration domains.
//!
//! - ODE: fixed-step Euler/RK4 and adaptive Dormand-Prince

pub mod ode;

pub use ode::{
    integrate_fixed, DormandPrince, EulerIntegrator, Integrator, OdeSolution, OdeSystem,
    RK4Integrator,
};
