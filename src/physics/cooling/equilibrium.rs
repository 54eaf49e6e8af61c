//! Ionization equilibrium: coupled H/He abundance balance and the
//! self-consistent equilibrium temperature.
//!
//! The abundance fixed point follows KWH (ApJS 105, 19) eqns 33-38:
//! hydrogen and helium in photo/collisional ionization equilibrium with
//! recombination, iterated against the electron density. Both solvers
//! return accumulator values rather than mutating shared state, so a
//! single iteration is unit-testable in isolation; non-convergence is an
//! unrecoverable error surfaced to the caller.

use super::rates::{RateTable, Rates};
use super::uvbg::Uvbg;
use crate::constants::{BOLTZMANN, GAMMA_MINUS1, PROTONMASS, YHELIUM};
use crate::error::{Error, Result};
use crate::physics::math::Scalar;

/// Iteration cap shared by every solver in the cooling module.
pub const MAXITER: usize = 400;

const SMALLNUM: Scalar = 1.0e-60;

/// Fractional number densities in units of the hydrogen number density.
///
/// Invariants at convergence: `nh0 + nhp == 1`,
/// `nhe0 + nhep + nhepp == YHELIUM`, and `ne` lies in
/// `[0, 1 + 2 * YHELIUM]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Abundance {
    pub ne: Scalar,
    pub nh0: Scalar,
    pub nhp: Scalar,
    pub nhe0: Scalar,
    pub nhep: Scalar,
    pub nhepp: Scalar,
}

impl Abundance {
    /// Everything neutral (at or below the table floor).
    pub fn neutral() -> Self {
        Self {
            ne: 0.0,
            nh0: 1.0,
            nhp: 0.0,
            nhe0: YHELIUM,
            nhep: 0.0,
            nhepp: 0.0,
        }
    }

    /// Everything ionized (at or above the table ceiling).
    pub fn fully_ionized() -> Self {
        let nhp = 1.0;
        let nhepp = YHELIUM;
        Self {
            ne: nhp + 2.0 * nhepp,
            nh0: 0.0,
            nhp,
            nhe0: 0.0,
            nhep: 0.0,
            nhepp,
        }
    }
}

/// Mean molecular weight for an electron fraction `ne`, then
/// specific internal energy (cgs) to temperature.
pub fn internal_energy_to_temperature_cgs(u_cgs: Scalar, ne: Scalar) -> Scalar {
    let mu = (1.0 + 4.0 * YHELIUM) / (1.0 + YHELIUM + ne);
    GAMMA_MINUS1 / BOLTZMANN * u_cgs * PROTONMASS * mu
}

/// Inverse of [`internal_energy_to_temperature_cgs`] at fixed `ne`.
pub fn temperature_to_internal_energy_cgs(temp: Scalar, ne: Scalar) -> Scalar {
    let mu = (1.0 + 4.0 * YHELIUM) / (1.0 + YHELIUM + ne);
    temp * BOLTZMANN / (GAMMA_MINUS1 * PROTONMASS * mu)
}

/// Solve the coupled ionization-balance equations at `logt`.
///
/// Below the table floor the gas is exactly neutral; above the ceiling
/// exactly ionized (closed form, no iteration). Inside the range the
/// electron density is iterated with old/new averaging until it moves by
/// less than 1e-4; with no photoionization the balance is closed after a
/// single pass. `ne_guess` seeds the electron fraction (zero is replaced
/// by 1).
pub fn find_abundances_and_rates(
    table: &RateTable,
    logt: Scalar,
    nh_cgs: Scalar,
    uvbg: &Uvbg,
    ne_guess: Scalar,
) -> Result<(Abundance, Rates)> {
    if logt <= table.tmin {
        return Ok((Abundance::neutral(), Rates::default()));
    }
    if logt >= table.tmax {
        return Ok((Abundance::fully_ionized(), Rates::default()));
    }

    let r = table.interpolate(logt);

    let mut y = Abundance::neutral();
    y.ne = if ne_guess == 0.0 { 1.0 } else { ne_guess };
    let mut necgs = y.ne * nh_cgs;

    let mut niter = 0;
    loop {
        niter += 1;

        let (gjh0ne, gjhe0ne, gjhepne) = if necgs <= 1.0e-25 || !uvbg.is_present() {
            (0.0, 0.0, 0.0)
        } else {
            (
                uvbg.g_jh0 / necgs,
                uvbg.g_jhe0 / necgs,
                uvbg.g_jhep / necgs,
            )
        };

        y.nh0 = r.a_hp / (r.a_hp + r.ge_h0 + gjh0ne); // eqn (33)
        y.nhp = 1.0 - y.nh0; // eqn (34)

        if gjhe0ne + r.ge_he0 <= SMALLNUM {
            // no helium ionization at all
            y.nhep = 0.0;
            y.nhepp = 0.0;
            y.nhe0 = YHELIUM;
        } else {
            y.nhep = YHELIUM
                / (1.0
                    + (r.a_hep + r.a_d) / (r.ge_he0 + gjhe0ne)
                    + (r.ge_hep + gjhepne) / r.a_hepp); // eqn (35)
            y.nhe0 = y.nhep * (r.a_hep + r.a_d) / (r.ge_he0 + gjhe0ne); // eqn (36)
            y.nhepp = y.nhep * (r.ge_hep + gjhepne) / r.a_hepp; // eqn (37)
        }

        let neold = y.ne;
        y.ne = y.nhp + y.nhep + 2.0 * y.nhepp; // eqn (38)

        if !uvbg.is_present() {
            // pure collisional balance closes in one pass
            break;
        }

        // average old and new to damp oscillation
        y.ne = 0.5 * (y.ne + neold);
        necgs = y.ne * nh_cgs;

        if (y.ne - neold).abs() < 1.0e-4 {
            break;
        }

        if niter >= MAXITER {
            return Err(Error::Convergence {
                routine: "find_abundances_and_rates",
                iterations: niter,
                state: format!("logT={logt} nHcgs={nh_cgs} ne={}", y.ne),
            });
        }
    }

    Ok((y, r))
}

/// Equilibrium temperature for specific internal energy `u_cgs` at
/// hydrogen density `nh_cgs`.
///
/// Outer fixed point: mean molecular weight from the current electron
/// fraction gives a temperature; the inner abundance solve at that
/// temperature updates the electron fraction. An adaptive damping factor
/// grows whenever the implied electron-fraction change is large,
/// preventing oscillation. Converges when the temperature moves by less
/// than one part in 1e3.
pub fn solve_equilibrium_temperature(
    table: &RateTable,
    u_cgs: Scalar,
    nh_cgs: Scalar,
    uvbg: &Uvbg,
    ne_guess: Scalar,
) -> Result<(Scalar, Abundance, Rates)> {
    let mut y = Abundance::neutral();
    y.ne = ne_guess;

    let mut temp = internal_energy_to_temperature_cgs(u_cgs, y.ne);
    let mut damp_max: Scalar = 0.0;
    let mut iter = 0;

    loop {
        iter += 1;
        let ne_old = y.ne;

        let (y_new, rates) =
            find_abundances_and_rates(table, libm::log10(temp), nh_cgs, uvbg, y.ne)?;
        y = y_new;

        let temp_old = temp;
        let temp_new = internal_energy_to_temperature_cgs(u_cgs, y.ne);

        damp_max = damp_max.max(
            temp_new / (1.0 + YHELIUM + y.ne)
                * ((y.ne - ne_old) / (temp_new - temp_old + 1.0)).abs(),
        );
        temp = temp_old + (temp_new - temp_old) / (1.0 + damp_max);

        if (temp - temp_old).abs() <= 1.0e-3 * temp {
            return Ok((temp, y, rates));
        }
        if iter >= MAXITER {
            return Err(Error::Convergence {
                routine: "solve_equilibrium_temperature",
                iterations: iter,
                state: format!("u={u_cgs} nHcgs={nh_cgs} temp={temp} ne={}", y.ne),
            });
        }
    }
}
