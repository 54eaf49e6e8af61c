//! Radiative cooling: primordial + metal net rates and the implicit
//! internal-energy integrator.
//!
//! All tables are built once and owned by a [`Cooling`] context passed by
//! reference into solver calls; there is no hidden process-wide state.
//! An empty table path at construction is the "feature disabled"
//! sentinel, not an error: the affected rate silently becomes a no-op.

pub mod equilibrium;
pub mod metal;
pub mod rates;
pub mod uvbg;

use crate::constants::{HYDROGEN_MASSFRAC, PROTONMASS};
use crate::error::{Error, Result};
use crate::physics::math::{Scalar, Vector};
use crate::units::UnitsToCgs;
use equilibrium::{
    find_abundances_and_rates, internal_energy_to_temperature_cgs, solve_equilibrium_temperature,
    Abundance, MAXITER,
};
use log::debug;
use metal::MetalCoolingTable;
use rates::RateTable;
use uvbg::{IonizeTable, Uvbg, UvFluctuations};

#[derive(Debug)]
struct Primordial {
    rates: RateTable,
    ionize: IonizeTable,
}

#[derive(Debug)]
pub struct Cooling {
    primordial: Option<Primordial>,
    metal: Option<MetalCoolingTable>,
    uv_fluctuations: Option<UvFluctuations>,
    units: UnitsToCgs,
    /// Uniform background for the current step; overwritten once per
    /// step by [`Cooling::ionize_params`].
    global_uvbg: Uvbg,
}

impl Cooling {
    /// Cooling switched off entirely: every rate is a no-op.
    pub fn disabled() -> Self {
        Self {
            primordial: None,
            metal: None,
            uv_fluctuations: None,
            units: UnitsToCgs::default(),
            global_uvbg: Uvbg::default(),
        }
    }

    /// Assemble the context. `ionize` of `None` disables primordial
    /// cooling (sensible for DM-only runs); `metal`/`uv_fluctuations`
    /// are independently optional. The uniform background is primed for
    /// `time_begin`.
    pub fn new(
        units: UnitsToCgs,
        min_gas_temp: Scalar,
        ionize: Option<IonizeTable>,
        metal: Option<MetalCoolingTable>,
        uv_fluctuations: Option<UvFluctuations>,
        time_begin: Scalar,
    ) -> Self {
        let mut cooling = Self {
            primordial: ionize.map(|ionize| Primordial {
                rates: RateTable::new(min_gas_temp),
                ionize,
            }),
            metal,
            uv_fluctuations,
            units,
            global_uvbg: Uvbg::default(),
        };
        cooling.ionize_params(time_begin);
        cooling
    }

    /// Build from the configuration section. An empty table path is the
    /// "feature disabled" sentinel. Metal-cooling and UV-fluctuation
    /// tables arrive pre-read through [`Cooling::new`]; this constructor
    /// wires up the text-format ionization table only, and refuses a
    /// nonempty path it has no loader for rather than dropping the
    /// feature silently.
    pub fn from_config(
        config: &crate::config::CoolingConfig,
        units: UnitsToCgs,
        time_begin: Scalar,
    ) -> Result<Self> {
        if !config.cooling_on {
            return Ok(Self::disabled());
        }
        if !config.metal_cool_file.is_empty() {
            return Err(Error::UnsupportedTable {
                name: "MetalCool",
                path: config.metal_cool_file.clone(),
            });
        }
        if !config.uv_fluctuation_file.is_empty() {
            return Err(Error::UnsupportedTable {
                name: "UVFluctuation",
                path: config.uv_fluctuation_file.clone(),
            });
        }
        let ionize = if config.tree_cool_file.is_empty() {
            None
        } else {
            Some(IonizeTable::read(&config.tree_cool_file)?)
        };
        Ok(Self::new(
            units,
            config.min_gas_temp,
            ionize,
            None,
            None,
            time_begin,
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.primordial.is_some()
    }

    /// Update the uniform UV background for the current time. Called once
    /// per step by the driver, before any solver runs; the background is
    /// read-only for the rest of the step.
    pub fn ionize_params(&mut self, time: Scalar) {
        if let Some(primordial) = &self.primordial {
            self.global_uvbg = primordial.ionize.uvbg_at(time);
        }
    }

    pub fn global_uvbg(&self) -> Uvbg {
        self.global_uvbg
    }

    /// The background seen by a particle at `pos`: the uniform value, or
    /// the spatially fluctuating on/off field when enabled.
    pub fn particle_uvbg(&self, pos: Vector, time: Scalar) -> Uvbg {
        match &self.uv_fluctuations {
            Some(uvf) => uvf.uvbg_at_position(pos, &self.global_uvbg, time),
            None => self.global_uvbg,
        }
    }

    /// Integrate the specific internal energy over `dt` and return the
    /// new value, both in code units (`rho` is the proper density).
    ///
    /// Solves the implicit equation `u - u_old - ratefact * Lambda(u) * dt
    /// = 0` by bracket expansion (geometric factor 1.1, half-step first)
    /// and bisection to a relative width of 1e-6. Also returns the
    /// converged electron fraction.
    pub fn do_cooling(
        &self,
        u_old: Scalar,
        rho: Scalar,
        dt: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
        metallicity: Scalar,
        time: Scalar,
    ) -> Result<(Scalar, Scalar)> {
        let Some(primordial) = &self.primordial else {
            return Ok((u_old, ne_guess));
        };

        let rho = rho * self.units.density;
        let u_old_cgs = u_old * self.units.specific_energy;
        let dt = dt * self.units.time;

        let nh_cgs = HYDROGEN_MASSFRAC * rho / PROTONMASS;
        let ratefact = nh_cgs * nh_cgs / rho;

        let mut ne = ne_guess;
        let rate = |u: Scalar, ne: &mut Scalar| -> Result<Scalar> {
            let (lambda, ne_new) =
                self.rate_from_u_cgs(primordial, u, nh_cgs, uvbg, *ne, metallicity, time)?;
            *ne = ne_new;
            Ok(lambda)
        };

        let mut u = u_old_cgs;
        let mut u_lower = u;
        let mut u_upper = u;

        let lambda = rate(u, &mut ne)?;

        // bracket the root before bisecting
        if u - u_old_cgs - ratefact * lambda * dt < 0.0 {
            // net heating: push the bracket upward
            u_upper *= Scalar::sqrt(1.1);
            u_lower /= Scalar::sqrt(1.1);
            while u_upper - u_old_cgs - ratefact * rate(u_upper, &mut ne)? * dt < 0.0 {
                u_upper *= 1.1;
                u_lower *= 1.1;
            }
        }
        if u - u_old_cgs - ratefact * lambda * dt > 0.0 {
            u_lower /= Scalar::sqrt(1.1);
            u_upper *= Scalar::sqrt(1.1);
            while u_lower - u_old_cgs - ratefact * rate(u_lower, &mut ne)? * dt > 0.0 {
                u_upper /= 1.1;
                u_lower /= 1.1;
            }
        }

        let mut iter = 0;
        loop {
            u = 0.5 * (u_lower + u_upper);

            let lambda = rate(u, &mut ne)?;
            if u - u_old_cgs - ratefact * lambda * dt > 0.0 {
                u_upper = u;
            } else {
                u_lower = u;
            }

            let du = u_upper - u_lower;
            iter += 1;

            if iter >= MAXITER - 10 {
                debug!("do_cooling near iteration cap: u={u}");
            }
            if (du / u).abs() <= 1.0e-6 || iter >= MAXITER {
                break;
            }
        }

        if iter >= MAXITER {
            return Err(Error::Convergence {
                routine: "do_cooling",
                iterations: iter,
                state: format!("u_old={u_old_cgs} rho={rho} dt={dt} u={u}"),
            });
        }

        Ok((u / self.units.specific_energy, ne))
    }

    /// Direct (non-iterative) cooling-time estimate in code units.
    /// Returns exactly zero under net heating: the cooling time is
    /// undefined there, and callers must not read 0 as "already cold".
    pub fn get_cooling_time(
        &self,
        u_old: Scalar,
        rho: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
        metallicity: Scalar,
        time: Scalar,
    ) -> Result<Scalar> {
        let Some(primordial) = &self.primordial else {
            return Ok(0.0);
        };

        let rho = rho * self.units.density;
        let u_cgs = u_old * self.units.specific_energy;

        let nh_cgs = HYDROGEN_MASSFRAC * rho / PROTONMASS;
        let ratefact = nh_cgs * nh_cgs / rho;

        let (lambda, _) =
            self.rate_from_u_cgs(primordial, u_cgs, nh_cgs, uvbg, ne_guess, metallicity, time)?;

        if lambda >= 0.0 {
            return Ok(0.0);
        }

        Ok(u_cgs / (-ratefact * lambda) / self.units.time)
    }

    /// Net (heating - cooling)/nH^2 for internal energy `u_cgs`, plus the
    /// equilibrium electron fraction.
    pub fn cooling_rate_from_internal_energy(
        &self,
        u_cgs: Scalar,
        nh_cgs: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
        metallicity: Scalar,
        time: Scalar,
    ) -> Result<(Scalar, Scalar)> {
        let Some(primordial) = &self.primordial else {
            return Ok((0.0, ne_guess));
        };
        self.rate_from_u_cgs(primordial, u_cgs, nh_cgs, uvbg, ne_guess, metallicity, time)
    }

    fn rate_from_u_cgs(
        &self,
        primordial: &Primordial,
        u_cgs: Scalar,
        nh_cgs: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
        metallicity: Scalar,
        time: Scalar,
    ) -> Result<(Scalar, Scalar)> {
        let (temp, y, _) =
            solve_equilibrium_temperature(&primordial.rates, u_cgs, nh_cgs, uvbg, ne_guess)?;
        let logt = libm::log10(temp);
        let redshift = 1.0 / time - 1.0;

        let (mut lambda_net, ne) =
            self.primordial_rate(primordial, logt, nh_cgs, uvbg, y.ne, redshift)?;

        if let Some(metal) = &self.metal {
            let lognh = libm::log10(nh_cgs);
            lambda_net -= metallicity * metal.rate(redshift, logt, lognh);
        }

        Ok((lambda_net, ne))
    }

    /// (heating - cooling)/nH^2 from the primordial network alone, cgs.
    /// Above the tabulated range the gas is taken fully ionized and only
    /// free-free and inverse-Compton cooling remain (no photoheating).
    pub fn primordial_cooling_rate(
        &self,
        logt: Scalar,
        nh_cgs: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
        redshift: Scalar,
    ) -> Result<(Scalar, Scalar)> {
        let Some(primordial) = &self.primordial else {
            return Ok((0.0, ne_guess));
        };
        self.primordial_rate(primordial, logt, nh_cgs, uvbg, ne_guess, redshift)
    }

    fn primordial_rate(
        &self,
        primordial: &Primordial,
        logt: Scalar,
        nh_cgs: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
        redshift: Scalar,
    ) -> Result<(Scalar, Scalar)> {
        let table = &primordial.rates;

        // floor at the coldest tabulated bin
        let logt = if logt <= table.tmin {
            table.tmin + 0.5 * table.delta_t
        } else {
            logt
        };

        let compton = |ne: Scalar, t: Scalar| {
            5.65e-36 * ne * (t - 2.73 * (1.0 + redshift)) * libm::pow(1.0 + redshift, 4.0)
                / nh_cgs
        };

        if logt < table.tmax {
            let (y, r) = find_abundances_and_rates(table, logt, nh_cgs, uvbg, ne_guess)?;
            let t = libm::pow(10.0, logt);

            // KWH Table 1, in units of nH^2
            let lambda_exc = r.b_h0 * y.ne * y.nh0 + r.b_hep * y.ne * y.nhep;

            let lambda_ion = 2.18e-11 * r.ge_h0 * y.ne * y.nh0
                + 3.94e-11 * r.ge_he0 * y.ne * y.nhe0
                + 8.72e-11 * r.ge_hep * y.ne * y.nhep;

            let lambda_rec = 1.036e-16 * t * y.ne * (r.a_hp * y.nhp)
                + 1.036e-16 * t * y.ne * (r.a_hep * y.nhep)
                + 1.036e-16 * t * y.ne * (r.a_hepp * y.nhepp)
                + 6.526e-11 * r.a_d * y.ne * y.nhep;

            let lambda_ff = r.b_ff * (y.nhp + y.nhep + 4.0 * y.nhepp) * y.ne;

            let lambda = lambda_exc + lambda_ion + lambda_rec + lambda_ff + compton(y.ne, t);

            let heat = if uvbg.is_present() {
                (y.nh0 * uvbg.eps_h0 + y.nhe0 * uvbg.eps_he0 + y.nhep * uvbg.eps_hep) / nh_cgs
            } else {
                0.0
            };

            Ok((heat - lambda, y.ne))
        } else {
            // outside the tabulated rates: H and He both fully ionized
            let y = Abundance::fully_ionized();
            let t = libm::pow(10.0, logt);

            let lambda_ff = 1.42e-27
                * libm::sqrt(t)
                * (1.1 + 0.34 * libm::exp(-(5.5 - logt) * (5.5 - logt) / 3.0))
                * (y.nhp + 4.0 * y.nhepp)
                * y.ne;

            let lambda = lambda_ff + compton(y.ne, t);
            Ok((-lambda, y.ne))
        }
    }

    /// Self-consistent temperature plus neutral-hydrogen and He+
    /// fractions for a particle, inputs in code units.
    pub fn abundance_ratios(
        &self,
        u: Scalar,
        rho: Scalar,
        uvbg: &Uvbg,
        ne_guess: Scalar,
    ) -> Result<(Scalar, Abundance)> {
        let Some(primordial) = &self.primordial else {
            return Ok((0.0, Abundance::neutral()));
        };

        let rho = rho * self.units.density;
        let u_cgs = u * self.units.specific_energy;
        let nh_cgs = rho / PROTONMASS * HYDROGEN_MASSFRAC;

        let (temp, y, _) =
            solve_equilibrium_temperature(&primordial.rates, u_cgs, nh_cgs, uvbg, ne_guess)?;
        Ok((temp, y))
    }

    /// Temperature for a code-unit internal energy at a given electron
    /// fraction (no equilibrium solve).
    pub fn convert_internal_energy_to_temperature(&self, u: Scalar, ne: Scalar) -> Scalar {
        if self.primordial.is_none() {
            return 0.0;
        }
        internal_energy_to_temperature_cgs(u * self.units.specific_energy, ne)
    }
}
