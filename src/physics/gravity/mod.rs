//! Short-range gravitational force computation.
//!
//! [`Gravity`] owns the per-run inputs (configuration, suppression
//! table) and drives the walk over the active particles, then applies
//! the per-particle post-processing: unit conversion by G, self-potential
//! removal, the finite-box mean-field correction, and the merge of the
//! long-range PM contributions.

pub mod shortrange;
pub mod tree;
pub mod walk;

use crate::config::GravityConfig;
use crate::cosmology::Cosmology;
use crate::physics::math::Scalar;
use log::info;
use rayon::prelude::*;
use shortrange::ShortRangeTable;
use tree::ForceTree;
use walk::{evaluate_shortrange, GravityQuery, WalkMode, WalkParams};

/// Per-type softening lengths for one force step.
#[derive(Debug, Clone, Copy)]
pub struct Softenings {
    /// Comoving softening, bounded by the physical maximum.
    pub comoving: [Scalar; 6],
    /// Spline softening radius, `2.8 *` the comoving value.
    pub force: [Scalar; 6],
}

impl Softenings {
    pub fn compute(config: &GravityConfig, time: Scalar) -> Self {
        let mut comoving = [0.0; 6];
        let mut force = [0.0; 6];
        for i in 0..6 {
            comoving[i] = if config.softening[i] * time > config.softening_max_phys[i] {
                config.softening_max_phys[i] / time
            } else {
                config.softening[i]
            };
            force[i] = 2.8 * comoving[i];
        }
        Self { comoving, force }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GravityStats {
    /// Particles that received a force this step.
    pub nforces: usize,
    pub ninteractions: u64,
    /// Remote-branch exports requested (zero on a single rank).
    pub nexports: usize,
}

pub struct Gravity {
    config: GravityConfig,
    shortrange: ShortRangeTable,
}

impl Gravity {
    pub fn new(config: GravityConfig) -> Self {
        Self {
            config,
            shortrange: ShortRangeTable::new(),
        }
    }

    pub fn config(&self) -> &GravityConfig {
        &self.config
    }

    pub fn softenings(&self, time: Scalar) -> Softenings {
        Softenings::compute(&self.config, time)
    }

    /// Compute short-range forces for the particles listed in `active`.
    ///
    /// The walks run in parallel over a read-only view of the drifted
    /// tree and particle array; results are applied and post-processed
    /// afterward. Tracer particles are skipped entirely.
    pub fn compute_forces(
        &self,
        tree: &ForceTree,
        particles: &mut [crate::physics::particle::Particle],
        active: &[usize],
        cosmology: &Cosmology,
        time: Scalar,
    ) -> GravityStats {
        let softenings = self.softenings(time);
        let params = WalkParams::new(&self.config, softenings.force);

        info!("Begin tree force for {} active particles.", active.len());

        let view: &[crate::physics::particle::Particle] = particles;
        let results: Vec<_> = active
            .par_iter()
            .filter(|&&i| view[i].ptype.has_gravity())
            .map(|&i| {
                let query = GravityQuery::from_particle(&view[i]);
                let mut exports = Vec::new();
                let result = evaluate_shortrange(
                    tree,
                    view,
                    &query,
                    &params,
                    &self.shortrange,
                    WalkMode::Primary,
                    &mut exports,
                );
                (i, result, exports.len())
            })
            .collect();

        let g = self.config.gravitational_constant;
        let mean_field = 2.8372975
            * libm::pow(
                cosmology.omega0 * 3.0 * cosmology.hubble * cosmology.hubble
                    / (8.0 * std::f64::consts::PI * g),
                1.0 / 3.0,
            );

        let mut stats = GravityStats::default();
        for (i, result, nexports) in results {
            let p = &mut particles[i];
            p.grav_accel = result.acc;
            p.potential = result.potential;
            p.grav_cost += result.ninteractions as i64;

            // total acceleration magnitude for the next relative-criterion
            // pass, before converting the tree part to physical units
            let total = p.grav_accel + p.grav_pm / g;
            p.old_acc = total.length();
            p.grav_accel *= g;

            // remove the self-potential the walk accumulated at r = 0
            p.potential += p.mass / softenings.comoving[p.ptype.softening_class()];
            // finite-box mean-field correction
            p.potential -= mean_field * libm::pow(p.mass, 2.0 / 3.0);
            p.potential *= g;
            p.potential += p.pm_potential;

            stats.nforces += 1;
            stats.ninteractions += result.ninteractions as u64;
            stats.nexports += nexports;
        }

        info!(
            "Tree force done: {} forces, {} interactions.",
            stats.nforces, stats.ninteractions
        );
        stats
    }
}
