//! Force-tree node model and a reference octree builder.
//!
//! The walk consumes the tree through tagged node references instead of
//! the raw index ranges a flat node array would need: a reference is a
//! local particle, a local internal node, a pseudo-particle standing in
//! for a branch owned by a remote rank, or the end of the traversal.
//! Nodes are threaded for iterative descent: `nextnode` enters a node,
//! `sibling` skips past it, and every leaf knows its walk successor.
//!
//! Tree construction proper (domain decomposition, top-level exchange)
//! belongs to an external module; the builder here produces a correctly
//! threaded single-rank octree from a particle slice, which is all the
//! walk, its tests, and the benchmarks need.

use crate::physics::math::{Scalar, Vector};
use crate::physics::particle::Particle;

/// A position in the walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    /// A single local particle.
    Leaf(usize),
    /// A local internal node.
    Internal(usize),
    /// A branch owned by another rank; `handle` indexes the local
    /// pseudo-particle slot used for export bookkeeping.
    Remote { rank: usize, handle: usize },
    /// End of the current branch.
    None,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub center_of_mass: Vector,
    pub mass: Scalar,
    /// Side length of the cubical cell.
    pub len: Scalar,
    /// Geometric center of the cell.
    pub center: Vector,
    /// Next entry at this level or above: taking it skips the subtree.
    pub sibling: NodeRef,
    /// First entry inside the node: taking it opens the subtree.
    pub nextnode: NodeRef,
    /// More than one particle below this node. Nodes holding a single
    /// particle are always opened; their monopole is never used.
    pub multiple_particles: bool,
    /// Top-level (domain-spanning) node; an imported walk terminates its
    /// branch upon reaching one.
    pub top_level: bool,
    /// Softening class with the largest force softening below this node.
    pub max_softening_type: usize,
    /// Particles of differing softening lengths are mixed below here.
    pub mixed_softening: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ForceTree {
    pub nodes: Vec<TreeNode>,
    /// Walk successor of each particle when it appears as a leaf.
    pub next_of_particle: Vec<NodeRef>,
    /// Walk successor of each pseudo-particle handle.
    pub next_of_pseudo: Vec<NodeRef>,
    /// Entry points, one per disjoint top-level branch.
    pub start_nodes: Vec<NodeRef>,
}

/// Subdivision stops once a cell is this many levels deep; coincident
/// particles are then chained directly under the last cell.
const MAX_DEPTH: usize = 40;

enum BuildChild {
    Particle(usize),
    Cell(Box<BuildCell>),
}

struct BuildCell {
    center: Vector,
    len: Scalar,
    children: Vec<BuildChild>,
}

/// Per-subtree aggregate carried up during threading.
struct Summary {
    mass: Scalar,
    mass_weighted_pos: Vector,
    count: usize,
    soft_min: Scalar,
    soft_max: Scalar,
    max_class: usize,
}

impl Summary {
    fn merge(&mut self, other: &Summary, force_softening: &[Scalar; 6]) {
        self.mass += other.mass;
        self.mass_weighted_pos += other.mass_weighted_pos;
        self.count += other.count;
        self.soft_min = self.soft_min.min(other.soft_min);
        self.soft_max = self.soft_max.max(other.soft_max);
        if force_softening[other.max_class] > force_softening[self.max_class] {
            self.max_class = other.max_class;
        }
    }
}

impl ForceTree {
    /// Build a threaded octree over `particles`. A positive `boxsize`
    /// roots the tree on the periodic box; otherwise the root cell is the
    /// particle bounding cube. `force_softening` decides the per-node
    /// maximum-softening class recorded for the walk's softening veto.
    pub fn build(
        particles: &[Particle],
        boxsize: Scalar,
        force_softening: &[Scalar; 6],
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            next_of_particle: vec![NodeRef::None; particles.len()],
            next_of_pseudo: Vec::new(),
            start_nodes: Vec::new(),
        };
        if particles.is_empty() {
            return tree;
        }

        let (center, len) = if boxsize > 0.0 {
            (Vector::splat(0.5 * boxsize), boxsize)
        } else {
            let mut lo = particles[0].pos;
            let mut hi = particles[0].pos;
            for p in &particles[1..] {
                lo = lo.min(p.pos);
                hi = hi.max(p.pos);
            }
            let len = (hi - lo).max_element().max(1.0e-10) * 1.001;
            (0.5 * (lo + hi), len)
        };

        let all: Vec<usize> = (0..particles.len()).collect();
        let root = subdivide(particles, all, center, len, 0);
        let (root_idx, _) = tree.thread(&root, NodeRef::None, particles, force_softening);
        tree.nodes[root_idx].top_level = true;
        tree.start_nodes.push(NodeRef::Internal(root_idx));
        tree
    }

    /// Flatten one build cell into a threaded node; returns the node index
    /// and the subtree aggregate. Children are threaded back to front so
    /// each child's sibling reference is already known.
    fn thread(
        &mut self,
        cell: &BuildCell,
        sibling: NodeRef,
        particles: &[Particle],
        force_softening: &[Scalar; 6],
    ) -> (usize, Summary) {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            center_of_mass: Vector::ZERO,
            mass: 0.0,
            len: cell.len,
            center: cell.center,
            sibling,
            nextnode: NodeRef::None,
            multiple_particles: false,
            top_level: false,
            max_softening_type: 0,
            mixed_softening: false,
        });

        let mut total: Option<Summary> = None;
        let mut next = sibling;
        for child in cell.children.iter().rev() {
            let (child_ref, summary) = match child {
                BuildChild::Particle(i) => {
                    self.next_of_particle[*i] = next;
                    let p = &particles[*i];
                    let class = p.ptype.softening_class();
                    let soft = force_softening[class];
                    (
                        NodeRef::Leaf(*i),
                        Summary {
                            mass: p.mass,
                            mass_weighted_pos: p.mass * p.pos,
                            count: 1,
                            soft_min: soft,
                            soft_max: soft,
                            max_class: class,
                        },
                    )
                }
                BuildChild::Cell(sub) => {
                    let (sub_idx, summary) =
                        self.thread(sub, next, particles, force_softening);
                    (NodeRef::Internal(sub_idx), summary)
                }
            };
            match &mut total {
                Some(total) => total.merge(&summary, force_softening),
                None => total = Some(summary),
            }
            next = child_ref;
        }

        // children were threaded; `next` is now the first of them
        let total = total.expect("build cells always hold at least one child");
        let node = &mut self.nodes[idx];
        node.nextnode = next;
        node.mass = total.mass;
        node.center_of_mass = if total.mass > 0.0 {
            total.mass_weighted_pos / total.mass
        } else {
            cell.center
        };
        node.multiple_particles = total.count > 1;
        node.max_softening_type = total.max_class;
        node.mixed_softening = total.soft_max > total.soft_min;
        (idx, total)
    }
}

fn subdivide(
    particles: &[Particle],
    indices: Vec<usize>,
    center: Vector,
    len: Scalar,
    depth: usize,
) -> BuildCell {
    let mut cell = BuildCell {
        center,
        len,
        children: Vec::new(),
    };

    if depth >= MAX_DEPTH {
        // coincident particles: chain them directly
        cell.children = indices.into_iter().map(BuildChild::Particle).collect();
        return cell;
    }

    let mut octants: [Vec<usize>; 8] = Default::default();
    for i in indices {
        let p = particles[i].pos;
        let oct = ((p.x > center.x) as usize)
            | (((p.y > center.y) as usize) << 1)
            | (((p.z > center.z) as usize) << 2);
        octants[oct].push(i);
    }

    let quarter = 0.25 * len;
    for (oct, members) in octants.into_iter().enumerate() {
        match members.len() {
            0 => {}
            1 => cell.children.push(BuildChild::Particle(members[0])),
            _ => {
                let offset = Vector::new(
                    if oct & 1 != 0 { quarter } else { -quarter },
                    if oct & 2 != 0 { quarter } else { -quarter },
                    if oct & 4 != 0 { quarter } else { -quarter },
                );
                cell.children.push(BuildChild::Cell(Box::new(subdivide(
                    particles,
                    members,
                    center + offset,
                    0.5 * len,
                    depth + 1,
                ))));
            }
        }
    }
    cell
}
