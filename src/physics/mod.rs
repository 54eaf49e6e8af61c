//! Physics modules: particle data model, shared math, table
//! interpolation, cooling, gravity, and the timebin structure.

pub mod cooling;
pub mod gravity;
pub mod interp;
pub mod math;
pub mod particle;
pub mod timebins;
