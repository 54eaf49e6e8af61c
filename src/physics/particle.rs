//! Particle data model.
//!
//! The particle array is owned by the simulation state; the gravity and
//! cooling modules read and write the subsets of fields listed in the
//! field docs. Gas-only state lives in an optional sub-struct so
//! collisionless particles stay small.

use crate::physics::math::{Scalar, Vector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleType {
    Gas,
    DarkMatter,
    Disk,
    Bulge,
    Star,
    Boundary,
    BlackHole,
    /// Tracers follow the potential minimum and receive no gravity.
    Tracer,
}

impl ParticleType {
    /// Index into the per-type softening tables.
    pub fn softening_class(self) -> usize {
        match self {
            ParticleType::Gas => 0,
            ParticleType::DarkMatter => 1,
            ParticleType::Disk => 2,
            ParticleType::Bulge => 3,
            ParticleType::Star => 4,
            ParticleType::Boundary | ParticleType::BlackHole | ParticleType::Tracer => 5,
        }
    }

    pub fn is_gas(self) -> bool {
        self == ParticleType::Gas
    }

    /// Tracer particles are excluded from gravity entirely.
    pub fn has_gravity(self) -> bool {
        self != ParticleType::Tracer
    }
}

/// Gas-only thermochemical state. The cooling integrator owns
/// `internal_energy` and `electron_fraction`; neutral-fraction and
/// temperature views are derived on demand through
/// `Cooling::abundance_ratios` rather than stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasState {
    /// Specific internal energy, code units.
    pub internal_energy: Scalar,
    /// Proper mass density, code units.
    pub density: Scalar,
    /// Electron fraction in units of the hydrogen number density.
    pub electron_fraction: Scalar,
    /// Metallicity in solar units.
    pub metallicity: Scalar,
}

impl Default for GasState {
    fn default() -> Self {
        Self {
            internal_energy: 0.0,
            density: 0.0,
            electron_fraction: 1.0,
            metallicity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vector,
    pub vel: Vector,
    pub mass: Scalar,
    pub ptype: ParticleType,

    /// Magnitude of the total acceleration from the previous force
    /// computation, used by the relative opening criterion.
    pub old_acc: Scalar,
    /// Short-range tree acceleration (physical units after post-processing).
    pub grav_accel: Vector,
    /// Precomputed long-range PM acceleration.
    pub grav_pm: Vector,
    pub potential: Scalar,
    /// Long-range PM potential, merged in during post-processing.
    pub pm_potential: Scalar,
    /// Gravitational interaction count (work estimate for load balancing).
    pub grav_cost: i64,

    /// Timebin index: due for a kick every 2^bin base time units.
    pub timebin: usize,
    /// Integer time this particle's position is drifted to.
    pub ti_drift: i64,

    pub gas: Option<GasState>,
}

impl Particle {
    pub fn new(pos: Vector, vel: Vector, mass: Scalar, ptype: ParticleType) -> Self {
        Self {
            pos,
            vel,
            mass,
            ptype,
            old_acc: 0.0,
            grav_accel: Vector::ZERO,
            grav_pm: Vector::ZERO,
            potential: 0.0,
            pm_potential: 0.0,
            grav_cost: 0,
            timebin: 0,
            ti_drift: 0,
            gas: if ptype == ParticleType::Gas {
                Some(GasState::default())
            } else {
                None
            },
        }
    }

    /// Drift the position to integer time `ti`. Idempotent: a particle
    /// already at `ti` is left untouched, so concurrent lazy drifts of the
    /// same particle cannot double-apply.
    pub fn drift_to(&mut self, ti: i64, drift_factor: impl Fn(i64, i64) -> Scalar) -> bool {
        if ti <= self.ti_drift {
            return false;
        }
        let fac = drift_factor(self.ti_drift, ti);
        self.pos += self.vel * fac;
        self.ti_drift = ti;
        true
    }
}
