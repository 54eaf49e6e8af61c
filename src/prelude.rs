//! Cosmodrift prelude module
//!
//! Re-exports the most commonly used types and traits to reduce import
//! boilerplate in integration tests and downstream drivers.

// External crate re-exports
pub use crate::physics::math::{Scalar, Vector};

// Internal re-exports - Config
pub use crate::config::SimulationConfig;

// Internal re-exports - Core state
pub use crate::comm::{Communicator, LocalComm};
pub use crate::cosmology::Cosmology;
pub use crate::error::{Error, Result};
pub use crate::units::UnitsToCgs;

// Internal re-exports - Physics
pub use crate::physics::cooling::uvbg::Uvbg;
pub use crate::physics::cooling::Cooling;
pub use crate::physics::gravity::tree::{ForceTree, NodeRef};
pub use crate::physics::gravity::{Gravity, Softenings};
pub use crate::physics::particle::{GasState, Particle, ParticleType};
pub use crate::physics::timebins::{TimeBins, TIMEBASE, TIMEBINS};

// Internal re-exports - Driver
pub use crate::run::{NeverStop, NullSink, Simulation, SnapshotSink, StopCheck};
