//! Precomputed rate-coefficient tables on a uniform log-temperature grid.
//!
//! Collisional excitation/ionization, radiative and dielectronic
//! recombination, and free-free coefficients from the KWH (ApJS 105, 19)
//! fits, with the Cen 92 recombination rates. Built once at startup,
//! read-only afterward.

use crate::physics::math::Scalar;

/// Number of intervals on the log10-temperature grid.
pub const NCOOLTAB: usize = 2000;

/// Upper edge of the tabulated range, log10 K.
pub const TMAX: Scalar = 9.0;

/// Temperature-interpolated rate coefficients at one log-temperature.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rates {
    /// Recombination: H+, He+, He++, dielectronic.
    pub a_hp: Scalar,
    pub a_hep: Scalar,
    pub a_hepp: Scalar,
    pub a_d: Scalar,
    /// Collisional ionization: H0, He0, He+.
    pub ge_h0: Scalar,
    pub ge_he0: Scalar,
    pub ge_hep: Scalar,
    /// Collisional excitation (H0, He+) and free-free.
    pub b_h0: Scalar,
    pub b_hep: Scalar,
    pub b_ff: Scalar,
}

#[derive(Debug, Clone)]
pub struct RateTable {
    pub tmin: Scalar,
    pub tmax: Scalar,
    pub delta_t: Scalar,
    beta_h0: Vec<Scalar>,
    beta_hep: Vec<Scalar>,
    beta_ff: Vec<Scalar>,
    alpha_hp: Vec<Scalar>,
    alpha_hep: Vec<Scalar>,
    alpha_hepp: Vec<Scalar>,
    alpha_d: Vec<Scalar>,
    gamma_e_h0: Vec<Scalar>,
    gamma_e_he0: Vec<Scalar>,
    gamma_e_hep: Vec<Scalar>,
}

impl RateTable {
    /// Fill the tables over `[Tmin, 9.0]` in log10 K with `NCOOLTAB`
    /// intervals. The grid floor is a decade below `min_gas_temp`
    /// (`Tmin = log10(0.1 * MinGasTemp)`), or 1.0 when no floor is set.
    pub fn new(min_gas_temp: Scalar) -> Self {
        let tmin = if min_gas_temp > 0.0 {
            libm::log10(0.1 * min_gas_temp)
        } else {
            1.0
        };
        let delta_t = (TMAX - tmin) / NCOOLTAB as Scalar;

        let n = NCOOLTAB + 1;
        let mut table = Self {
            tmin,
            tmax: TMAX,
            delta_t,
            beta_h0: vec![0.0; n],
            beta_hep: vec![0.0; n],
            beta_ff: vec![0.0; n],
            alpha_hp: vec![0.0; n],
            alpha_hep: vec![0.0; n],
            alpha_hepp: vec![0.0; n],
            alpha_d: vec![0.0; n],
            gamma_e_h0: vec![0.0; n],
            gamma_e_he0: vec![0.0; n],
            gamma_e_hep: vec![0.0; n],
        };

        for i in 0..n {
            let t = libm::pow(10.0, tmin + delta_t * i as Scalar);
            let tfact = 1.0 / (1.0 + libm::sqrt(t / 1.0e5));

            // Exponential terms are skipped when the argument would
            // underflow (exponent >= 70 decades).
            if 118348.0 / t < 70.0 {
                table.beta_h0[i] = 7.5e-19 * libm::exp(-118348.0 / t) * tfact;
            }
            if 473638.0 / t < 70.0 {
                table.beta_hep[i] =
                    5.54e-17 * libm::pow(t, -0.397) * libm::exp(-473638.0 / t) * tfact;
            }

            let lt = libm::log10(t);
            table.beta_ff[i] = 1.43e-27
                * libm::sqrt(t)
                * (1.1 + 0.34 * libm::exp(-(5.5 - lt) * (5.5 - lt) / 3.0));

            // Cen 92 recombination fits
            table.alpha_hp[i] = 8.4e-11 * libm::pow(t / 1000.0, -0.2)
                / (1.0 + libm::pow(t / 1.0e6, 0.7))
                / libm::sqrt(t);
            table.alpha_hep[i] = 1.5e-10 * libm::pow(t, -0.6353);
            table.alpha_hepp[i] = 4.0 * table.alpha_hp[i];

            if 470000.0 / t < 70.0 {
                table.alpha_d[i] = 1.9e-3
                    * libm::pow(t, -1.5)
                    * libm::exp(-470000.0 / t)
                    * (1.0 + 0.3 * libm::exp(-94000.0 / t));
            }

            if 157809.1 / t < 70.0 {
                table.gamma_e_h0[i] = 5.85e-11 * libm::sqrt(t) * libm::exp(-157809.1 / t) * tfact;
            }
            if 285335.4 / t < 70.0 {
                table.gamma_e_he0[i] = 2.38e-11 * libm::sqrt(t) * libm::exp(-285335.4 / t) * tfact;
            }
            if 631515.0 / t < 70.0 {
                table.gamma_e_hep[i] = 5.68e-12 * libm::sqrt(t) * libm::exp(-631515.0 / t) * tfact;
            }
        }

        table
    }

    /// Linear interpolation weights for `logt`: the lower bin index and
    /// the (low, high) weights. Callers guarantee `tmin < logt < tmax`.
    pub(crate) fn weights(&self, logt: Scalar) -> (usize, Scalar, Scalar) {
        let t = (logt - self.tmin) / self.delta_t;
        let j = (t as usize).min(NCOOLTAB - 1);
        let fhi = t - j as Scalar;
        (j, 1.0 - fhi, fhi)
    }

    /// All ten coefficients interpolated at `logt`.
    pub fn interpolate(&self, logt: Scalar) -> Rates {
        let (j, flow, fhi) = self.weights(logt);
        let lerp = |v: &[Scalar]| flow * v[j] + fhi * v[j + 1];
        Rates {
            a_hp: lerp(&self.alpha_hp),
            a_hep: lerp(&self.alpha_hep),
            a_hepp: lerp(&self.alpha_hepp),
            a_d: lerp(&self.alpha_d),
            ge_h0: lerp(&self.gamma_e_h0),
            ge_he0: lerp(&self.gamma_e_he0),
            ge_hep: lerp(&self.gamma_e_hep),
            b_h0: lerp(&self.beta_h0),
            b_hep: lerp(&self.beta_hep),
            b_ff: lerp(&self.beta_ff),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_scaling_formula() {
        // MinGasTemp = 0 leaves the floor at one decade
        assert_eq!(RateTable::new(0.0).tmin, 1.0);
        // MinGasTemp = 100 gives log10(0.1 * 100) = 1.0 as well
        assert!((RateTable::new(100.0).tmin - 1.0).abs() < 1e-12);
        // MinGasTemp = 10 gives log10(1) = 0
        assert!(RateTable::new(10.0).tmin.abs() < 1e-12);
    }

    #[test]
    fn cold_entries_skip_underflowing_exponentials() {
        let table = RateTable::new(0.0);
        // at the 10 K floor every exponential fit underflows to zero
        let r = table.interpolate(table.tmin + 0.5 * table.delta_t);
        assert_eq!(r.b_h0, 0.0);
        assert_eq!(r.ge_h0, 0.0);
        assert_eq!(r.a_d, 0.0);
        // while the power-law fits stay finite
        assert!(r.a_hp > 0.0);
        assert!(r.b_ff > 0.0);
    }

    #[test]
    fn coefficients_are_positive_at_ionizing_temperatures() {
        let table = RateTable::new(0.0);
        let r = table.interpolate(5.0); // 10^5 K
        assert!(r.ge_h0 > 0.0);
        assert!(r.ge_he0 > 0.0);
        assert!(r.a_hp > 0.0);
        assert!(r.a_hepp > r.a_hp); // He++ recombination is 4x Cen's H+ fit
        assert!(r.b_h0 > 0.0);
    }

    #[test]
    fn interpolation_matches_endpoints() {
        let table = RateTable::new(0.0);
        let (j, flow, fhi) = table.weights(table.tmin + table.delta_t * 10.0);
        assert_eq!(j, 10);
        assert!((flow - 1.0).abs() < 1e-9);
        assert!(fhi.abs() < 1e-9);
    }
}
