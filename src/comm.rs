//! Collective-reduction seam between the step driver and the message
//! passing layer.
//!
//! The driver needs only two collectives: an all-rank minimum of the next
//! kick time and an all-rank sum of particle counts. Putting them behind a
//! trait keeps the synchronization logic testable without a live
//! multi-process environment; the distributed build supplies an MPI-backed
//! implementation.

pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Minimum of `v` across all ranks.
    fn allreduce_min_i64(&self, v: i64) -> i64;

    /// Sum of `v` across all ranks.
    fn allreduce_sum_i64(&self, v: i64) -> i64;
}

/// Single-process communicator: every collective is the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalComm;

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn allreduce_min_i64(&self, v: i64) -> i64 {
        v
    }

    fn allreduce_sum_i64(&self, v: i64) -> i64 {
        v
    }
}
