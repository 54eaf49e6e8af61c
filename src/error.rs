//! Typed errors for the simulation core.
//!
//! Every unrecoverable condition carries a distinct numeric code so the
//! top-level driver can terminate with the same diagnostics the log
//! parsers expect. Intermediate layers return these as values; nothing
//! below the driver exits the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An iterative solver hit its iteration cap without satisfying its
    /// convergence contract. Returning an unconverged value would corrupt
    /// the energy or ionization state, so this is fatal.
    #[error("no convergence in {routine} after {iterations} iterations: {state}")]
    Convergence {
        routine: &'static str,
        iterations: usize,
        state: String,
    },

    /// A physics table failed validation at load time.
    #[error("malformed table {name}: {reason}")]
    MalformedTable { name: &'static str, reason: String },

    /// A global consistency invariant was violated (e.g. drifted-particle
    /// count disagrees with the active-particle count).
    #[error("internal consistency failure: {0}")]
    Inconsistency(String),

    /// An input table file could not be read.
    #[error("cannot read table file `{path}`: {source}")]
    TableIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A configured table requires a loader owned by the external IO
    /// layer; refusing beats silently running without the table.
    #[error("table `{path}` for {name} requires the external table loader")]
    UnsupportedTable { name: &'static str, path: String },
}

impl Error {
    /// Numeric exit code, one per failure kind, stable across releases.
    pub fn code(&self) -> i32 {
        match self {
            Error::Convergence { routine, .. } => match *routine {
                "do_cooling" => 10,
                "solve_equilibrium_temperature" => 12,
                "find_abundances_and_rates" => 13,
                _ => 19,
            },
            Error::MalformedTable { .. } => 123,
            Error::Inconsistency(_) => 2,
            Error::TableIo { .. } => 456,
            Error::UnsupportedTable { .. } => 457,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
