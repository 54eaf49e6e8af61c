//! Conversion factors between internal code units and physical cgs units.
//!
//! Fixed once at startup from the unit system in the parameter set; the
//! cooling solver converts its inputs on entry and its outputs on exit.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitsToCgs {
    /// Code mass density -> g/cm^3 (comoving factors included by the caller).
    pub density: f64,
    /// Code specific internal energy -> erg/g.
    pub specific_energy: f64,
    /// Code time -> s.
    pub time: f64,
}

impl UnitsToCgs {
    /// Build the factors from the basic unit system, folding in the
    /// little-h dependence the same way the cooling module expects.
    pub fn new(
        unit_density_in_cgs: f64,
        unit_time_in_s: f64,
        unit_pressure_in_cgs: f64,
        hubble_param: f64,
    ) -> Self {
        Self {
            density: unit_density_in_cgs * hubble_param * hubble_param,
            specific_energy: unit_pressure_in_cgs / unit_density_in_cgs,
            time: unit_time_in_s / hubble_param,
        }
    }
}

impl Default for UnitsToCgs {
    /// Identity conversion; tests feed cgs quantities directly.
    fn default() -> Self {
        Self {
            density: 1.0,
            specific_energy: 1.0,
            time: 1.0,
        }
    }
}
