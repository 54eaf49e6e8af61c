//! Cosmodrift library
//!
//! The core of a cosmological N-body/hydrodynamics simulation: the
//! short-range tree gravity solver, the adaptive timebin step driver,
//! and the radiative cooling solver, with the domain decomposition,
//! long-range PM solver, and IO layers consumed through seams.

pub mod comm;
pub mod config;
pub mod constants;
pub mod cosmology;
pub mod error;
pub mod physics;
pub mod prelude;
pub mod run;
pub mod units;
