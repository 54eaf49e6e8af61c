//! The short-range gravity walk: iterative tree descent with cutoff
//! pruning, opening criteria, softening vetoes, and remote export.
//!
//! The walk is a pure function of the (already drifted) tree and the
//! query particle: visit/skip/open/export decisions happen here, while
//! the message passing that satisfies an export is owned by an external
//! scheduler. This keeps the force kernel testable in a single process.

use super::shortrange::{softened_force, ShortRangeTable, NTAB};
use super::tree::{ForceTree, NodeRef};
use crate::config::GravityConfig;
use crate::physics::math::{nearest_vec, Scalar, Vector};
use crate::physics::particle::{Particle, ParticleType};

/// Per-target inputs of one walk.
#[derive(Debug, Clone, Copy)]
pub struct GravityQuery {
    pub pos: Vector,
    pub ptype: ParticleType,
    /// Acceleration magnitude from the previous force computation,
    /// consumed by the relative opening criterion.
    pub old_acc: Scalar,
}

impl GravityQuery {
    pub fn from_particle(p: &Particle) -> Self {
        Self {
            pos: p.pos,
            ptype: p.ptype,
            old_acc: p.old_acc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GravityResult {
    pub acc: Vector,
    pub potential: Scalar,
    pub ninteractions: usize,
}

/// A branch owned by another rank that must contribute to this query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Export {
    pub rank: usize,
    pub handle: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Walking a locally owned particle: remote branches are exported.
    Primary,
    /// Walking a query imported from another rank: only the local
    /// branches below the entry points contribute, and reaching a
    /// top-level node again ends the branch.
    Imported,
}

/// Geometry and tolerance inputs of the walk, fixed per force step.
#[derive(Debug, Clone, Copy)]
pub struct WalkParams {
    pub boxsize: Scalar,
    pub rcut: Scalar,
    pub asmth: Scalar,
    /// Barnes-Hut opening angle; zero selects the relative criterion.
    pub err_tol_theta: Scalar,
    pub err_tol_force_acc: Scalar,
    pub force_softening: [Scalar; 6],
}

impl WalkParams {
    pub fn new(config: &GravityConfig, force_softening: [Scalar; 6]) -> Self {
        Self {
            boxsize: config.boxsize,
            rcut: config.rcut,
            asmth: config.asmth,
            err_tol_theta: config.err_tol_theta,
            err_tol_force_acc: config.err_tol_force_acc,
            force_softening,
        }
    }
}

/// Evaluate the short-range force and potential on one query.
///
/// Remote branches encountered in [`WalkMode::Primary`] are appended to
/// `exports`; the caller merges their contributions once the remote walk
/// results come back.
pub fn evaluate_shortrange(
    tree: &ForceTree,
    particles: &[Particle],
    query: &GravityQuery,
    params: &WalkParams,
    table: &ShortRangeTable,
    mode: WalkMode,
    exports: &mut Vec<Export>,
) -> GravityResult {
    let mut acc = Vector::ZERO;
    let mut pot = 0.0;
    let mut ninteractions = 0usize;

    let rcut2 = params.rcut * params.rcut;
    let asmthfac = 0.5 / params.asmth * (NTAB as Scalar / 3.0);
    let aold = params.err_tol_force_acc * query.old_acc;
    let query_soft = params.force_softening[query.ptype.softening_class()];

    for &start in &tree.start_nodes {
        // entry points are opened unconditionally
        let mut no = match start {
            NodeRef::Internal(i) => tree.nodes[i].nextnode,
            other => other,
        };

        loop {
            let (d, r2, mass, h) = match no {
                NodeRef::None => break,
                NodeRef::Leaf(p) => {
                    let other = &particles[p];
                    let d = nearest_vec(other.pos - query.pos, params.boxsize);
                    let h = query_soft
                        .max(params.force_softening[other.ptype.softening_class()]);
                    no = tree.next_of_particle[p];
                    (d, d.length_squared(), other.mass, h)
                }
                NodeRef::Remote { rank, handle } => {
                    if mode == WalkMode::Primary {
                        exports.push(Export { rank, handle });
                    }
                    no = tree.next_of_pseudo[handle];
                    continue;
                }
                NodeRef::Internal(i) => {
                    let node = &tree.nodes[i];

                    if mode == WalkMode::Imported && node.top_level {
                        // back at a top-level node: this branch is done
                        break;
                    }

                    if !node.multiple_particles {
                        no = node.nextnode;
                        continue;
                    }

                    let d = nearest_vec(node.center_of_mass - query.pos, params.boxsize);
                    let r2 = d.length_squared();

                    if r2 > rcut2 {
                        // can the node still poke into the cutoff sphere?
                        let eff_dist = params.rcut + 0.5 * node.len;
                        let dc = nearest_vec(node.center - query.pos, params.boxsize);
                        if dc.x.abs() > eff_dist
                            || dc.y.abs() > eff_dist
                            || dc.z.abs() > eff_dist
                        {
                            no = node.sibling;
                            continue;
                        }
                    }

                    if params.err_tol_theta != 0.0 {
                        // Barnes-Hut criterion, boundary inclusive: a node
                        // exactly at the threshold is opened
                        if node.len * node.len
                            >= r2 * params.err_tol_theta * params.err_tol_theta
                        {
                            no = node.nextnode;
                            continue;
                        }
                    } else {
                        // relative criterion
                        if node.mass * node.len * node.len > r2 * r2 * aold {
                            no = node.nextnode;
                            continue;
                        }
                        // always open a node the target lies inside of
                        let dc = node.center - query.pos;
                        if dc.x.abs() < 0.60 * node.len
                            && dc.y.abs() < 0.60 * node.len
                            && dc.z.abs() < 0.60 * node.len
                        {
                            no = node.nextnode;
                            continue;
                        }
                    }

                    let mut h = query_soft;
                    let node_soft = params.force_softening[node.max_softening_type];
                    if h < node_soft {
                        h = node_soft;
                        if r2 < h * h && node.mixed_softening {
                            // unresolved softening mix inside the kernel
                            no = node.nextnode;
                            continue;
                        }
                    }

                    no = node.sibling;
                    (d, r2, node.mass, h)
                }
            };

            let r = libm::sqrt(r2);
            let (fac, facpot) = softened_force(r, r2, h, mass);

            let tab = (asmthfac * r) as usize;
            if tab < NTAB {
                let (sup_f, sup_p) = table.factors(tab);
                acc += d * (fac * sup_f);
                pot += facpot * sup_p;
                ninteractions += 1;
            }
        }
    }

    GravityResult {
        acc,
        potential: pot,
        ninteractions,
    }
}
