//! Power-of-two timebin buckets for adaptive individual timestepping.
//!
//! The simulated time span maps onto the integer range `[0, TIMEBASE]`.
//! A particle in bin `n` is due for a force update at every multiple of
//! `2^n`; bin 0 is a holding bin for particles that need a timestep
//! assigned immediately. Each bucket owns an intrusive linked list of
//! particle indices, rebuilt whenever particles change bins.

use crate::physics::particle::Particle;

/// Number of power-of-two subdivisions of the integer time range.
pub const TIMEBINS: usize = 29;

/// Integer span of the full simulated time interval.
pub const TIMEBASE: i64 = 1 << TIMEBINS;

#[derive(Debug, Clone)]
pub struct TimeBins {
    first: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    count: Vec<usize>,
    count_gas: Vec<usize>,
    active: Vec<bool>,
}

impl TimeBins {
    pub fn new(nparticles: usize) -> Self {
        Self {
            first: vec![None; TIMEBINS + 1],
            next: vec![None; nparticles],
            count: vec![0; TIMEBINS + 1],
            count_gas: vec![0; TIMEBINS + 1],
            active: vec![false; TIMEBINS + 1],
        }
    }

    /// Integer stride of bin `n`.
    pub fn dti(bin: usize) -> i64 {
        1 << bin
    }

    /// Clear and re-insert every particle according to its current bin.
    pub fn rebuild(&mut self, particles: &[Particle]) {
        self.first.iter_mut().for_each(|f| *f = None);
        self.count.iter_mut().for_each(|c| *c = 0);
        self.count_gas.iter_mut().for_each(|c| *c = 0);
        self.next = vec![None; particles.len()];
        // reverse insertion keeps each bucket in particle-index order
        for (i, p) in particles.iter().enumerate().rev() {
            self.insert(i, p.timebin, p.ptype.is_gas());
        }
    }

    /// Push a particle onto the front of its bucket's list.
    pub fn insert(&mut self, index: usize, bin: usize, is_gas: bool) {
        debug_assert!(bin <= TIMEBINS);
        self.next[index] = self.first[bin];
        self.first[bin] = Some(index);
        self.count[bin] += 1;
        if is_gas {
            self.count_gas[bin] += 1;
        }
    }

    pub fn count(&self, bin: usize) -> usize {
        self.count[bin]
    }

    pub fn count_gas(&self, bin: usize) -> usize {
        self.count_gas[bin]
    }

    /// Earliest next kick time across populated bins. Bin `n > 0` is due
    /// at the next multiple of `2^n` past `ti_current`; bin 0 is due
    /// immediately. An empty set of buckets yields the end of the run.
    pub fn next_kick_time(&self, ti_current: i64) -> i64 {
        let mut ti_next = TIMEBASE;
        for bin in 0..=TIMEBINS {
            if self.count[bin] == 0 {
                continue;
            }
            let due = if bin == 0 {
                ti_current
            } else {
                let dti = Self::dti(bin);
                (ti_current / dti) * dti + dti
            };
            ti_next = ti_next.min(due);
        }
        ti_next
    }

    /// Mark bins whose stride divides `ti` as active.
    pub fn mark_active(&mut self, ti: i64) {
        for bin in 0..=TIMEBINS {
            self.active[bin] = ti % Self::dti(bin) == 0;
        }
    }

    pub fn is_active_bin(&self, bin: usize) -> bool {
        self.active[bin]
    }

    /// Number of particles in active bins.
    pub fn active_count(&self) -> usize {
        (0..=TIMEBINS)
            .filter(|&bin| self.active[bin])
            .map(|bin| self.count[bin])
            .sum()
    }

    /// Active-particle index list: per-bucket lists concatenated in
    /// bucket order.
    pub fn active_particles(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.active_count());
        for bin in 0..=TIMEBINS {
            if !self.active[bin] {
                continue;
            }
            let mut cursor = self.first[bin];
            while let Some(i) = cursor {
                out.push(i);
                cursor = self.next[i];
            }
        }
        out
    }

    /// Occupancy of populated buckets as `(bin, total, gas)` triples,
    /// for the step banner.
    pub fn occupancy(&self) -> Vec<(usize, usize, usize)> {
        (0..=TIMEBINS)
            .filter(|&bin| self.count[bin] > 0)
            .map(|bin| (bin, self.count[bin], self.count_gas[bin]))
            .collect()
    }
}
