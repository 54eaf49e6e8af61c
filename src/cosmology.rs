//! Background cosmology: density parameters and the Hubble rate.
//!
//! Only what the gravity post-processing and the timestep driver consume;
//! growth factors and power spectra belong to the excluded IC layer.

use crate::constants::{GRAVITY, HUBBLE, LIGHTSPEED, STEFAN_BOLTZMANN};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cosmology {
    pub omega0: f64,
    pub omega_lambda: f64,
    pub omega_baryon: f64,
    pub hubble_param: f64,
    pub cmb_temperature: f64,
    pub radiation_on: bool,

    /// Hubble constant in internal units (H0 for h = 1).
    pub hubble: f64,
}

impl Cosmology {
    pub fn new(
        omega0: f64,
        omega_lambda: f64,
        omega_baryon: f64,
        hubble_param: f64,
        cmb_temperature: f64,
        radiation_on: bool,
        hubble: f64,
    ) -> Self {
        Self {
            omega0,
            omega_lambda,
            omega_baryon,
            hubble_param,
            cmb_temperature,
            radiation_on,
            hubble,
        }
    }

    fn omega_k(&self) -> f64 {
        1.0 - self.omega0 - self.omega_lambda
    }

    /// Omega_g = 4 sigma_B T_CMB^4 8 pi G / (3 c^3 H^2)
    fn omega_g(&self) -> f64 {
        4.0 * STEFAN_BOLTZMANN * self.cmb_temperature.powi(4) * 8.0 * std::f64::consts::PI
            * GRAVITY
            / (3.0 * LIGHTSPEED.powi(3) * HUBBLE * HUBBLE)
            / (self.hubble_param * self.hubble_param)
    }

    /// Massless-neutrino density today. The background temperature ratio
    /// includes the slight coupling correction at e+- annihilation
    /// (N_eff = 3.046).
    fn omega_nu0(&self) -> f64 {
        let tnu0_tcmb0 = (4.0f64 / 11.0).powf(1.0 / 3.0) * 1.00328;
        self.omega_g() * 7.0 / 8.0 * tnu0_tcmb0.powi(4) * 3.0
    }

    /// Hubble rate at scale factor `a`, in units of `self.hubble`.
    pub fn hubble_rate(&self, a: f64) -> f64 {
        let mut h2 = self.omega_lambda;
        h2 += self.omega_k() / (a * a);
        h2 += self.omega0 / (a * a * a);
        if self.radiation_on {
            h2 += (self.omega_g() + self.omega_nu0()) / (a * a * a * a);
        }
        self.hubble * h2.sqrt()
    }
}

impl Default for Cosmology {
    fn default() -> Self {
        Self::new(0.3, 0.7, 0.045, 0.7, 2.7255, false, 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hubble_rate_reduces_to_h0_today_for_flat_universe() {
        let cp = Cosmology::new(0.3, 0.7, 0.045, 0.7, 2.7255, false, 0.1);
        assert!((cp.hubble_rate(1.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn hubble_rate_is_matter_dominated_early() {
        let cp = Cosmology::new(0.3, 0.7, 0.045, 0.7, 2.7255, false, 0.1);
        let a = 1e-2;
        let expect = 0.1 * (0.3f64 / (a * a * a)).sqrt();
        assert!((cp.hubble_rate(a) - expect).abs() / expect < 1e-3);
    }

    #[test]
    fn radiation_term_raises_early_rate() {
        let with = Cosmology::new(0.3, 0.7, 0.045, 0.7, 2.7255, true, 0.1);
        let without = Cosmology::new(0.3, 0.7, 0.045, 0.7, 2.7255, false, 0.1);
        assert!(with.hubble_rate(1e-4) > without.hubble_rate(1e-4));
    }

    #[test]
    fn curvature_and_radiation_survive_a_config_round_trip() {
        let open = Cosmology::new(0.25, 0.6, 0.045, 0.7, 2.7255, true, 0.1);
        let text = toml::to_string(&open).unwrap();
        let back: Cosmology = toml::from_str(&text).unwrap();
        assert_eq!(back.hubble_rate(0.5), open.hubble_rate(0.5));
    }
}
