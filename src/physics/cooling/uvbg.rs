//! Ionizing UV background: uniform redshift-indexed table and the
//! optional spatially fluctuating variant.
//!
//! The uniform table is the whitespace-delimited TREECOOL format:
//! `log10(1+z)  gH0  gHe0  gHe+  epsH0  epsHe0  epsHe+`, ascending in
//! redshift, at most [`TABLESIZE`] rows. The fluctuating variant overlays
//! a reionization-redshift field on a periodic 3-D grid: a cell whose
//! reionization redshift lies below the current redshift has not yet been
//! reionized and sees no background at all.

use crate::error::{Error, Result};
use crate::physics::interp::Interp;
use crate::physics::math::{Scalar, Vector};
use log::info;
use std::io::BufRead;

/// Max number of rows accepted from an ionizing-background table.
pub const TABLESIZE: usize = 500;

/// Amplitude factor relative to the input table.
const JAMPL: Scalar = 1.0;

/// UV background state: photoionization rates `g*` and photoheating
/// rates `eps*` for H0, He0 and He+. `j_uv == 0` means no background.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Uvbg {
    pub j_uv: Scalar,
    pub g_jh0: Scalar,
    pub g_jhe0: Scalar,
    pub g_jhep: Scalar,
    pub eps_h0: Scalar,
    pub eps_he0: Scalar,
    pub eps_hep: Scalar,
}

impl Uvbg {
    pub fn is_present(&self) -> bool {
        self.j_uv != 0.0
    }
}

/// Redshift-ordered photoionization/photoheating table.
#[derive(Debug, Clone)]
pub struct IonizeTable {
    inlogz: Vec<Scalar>,
    g_h0: Vec<Scalar>,
    g_he: Vec<Scalar>,
    g_hep: Vec<Scalar>,
    eps_h0: Vec<Scalar>,
    eps_he: Vec<Scalar>,
    eps_hep: Vec<Scalar>,
}

impl IonizeTable {
    /// Read the TREECOOL text format. Rows after the first row whose
    /// `gH0` column is zero are discarded (zero-padded tails are common).
    pub fn read(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| Error::TableIo {
            path: path.to_string(),
            source,
        })?;
        let mut rows = Vec::new();
        for line in std::io::BufReader::new(file).lines() {
            let line = line.map_err(|source| Error::TableIo {
                path: path.to_string(),
                source,
            })?;
            let cols: Vec<Scalar> = line
                .split_whitespace()
                .filter_map(|tok| tok.parse().ok())
                .collect();
            if cols.len() == 7 {
                rows.push([
                    cols[0], cols[1], cols[2], cols[3], cols[4], cols[5], cols[6],
                ]);
            }
            if rows.len() == TABLESIZE {
                break;
            }
        }
        let table = Self::from_rows(&rows);
        info!(
            "Read ionization table with {} entries in file `{}`.",
            table.len(),
            path
        );
        Ok(table)
    }

    /// Build from parsed rows, truncating at the first zero `gH0` entry.
    pub fn from_rows(rows: &[[Scalar; 7]]) -> Self {
        let n = rows
            .iter()
            .take(TABLESIZE)
            .position(|row| row[1] == 0.0)
            .unwrap_or(rows.len().min(TABLESIZE));
        let column = |k: usize| rows[..n].iter().map(|row| row[k]).collect();
        Self {
            inlogz: column(0),
            g_h0: column(1),
            g_he: column(2),
            g_hep: column(3),
            eps_h0: column(4),
            eps_he: column(5),
            eps_hep: column(6),
        }
    }

    pub fn len(&self) -> usize {
        self.inlogz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inlogz.is_empty()
    }

    /// The uniform background at scale factor `time`. Returns the zero
    /// background when the redshift lies above the tabulated range or a
    /// bracketing entry is zero/missing.
    pub fn uvbg_at(&self, time: Scalar) -> Uvbg {
        let redshift = 1.0 / time - 1.0;
        let logz = libm::log10(redshift + 1.0);

        let n = self.len();
        if n == 0 {
            return Uvbg::default();
        }

        let mut ilow = 0;
        for (i, &z) in self.inlogz.iter().enumerate() {
            if z < logz {
                ilow = i;
            } else {
                break;
            }
        }

        if logz > self.inlogz[n - 1]
            || ilow + 1 >= n
            || self.g_h0[ilow] == 0.0
            || self.g_h0[ilow + 1] == 0.0
        {
            return Uvbg::default();
        }

        let dzlow = logz - self.inlogz[ilow];
        let dzhi = self.inlogz[ilow + 1] - logz;
        // log-log interpolation between the bracketing rows
        let loglerp = |col: &[Scalar]| {
            JAMPL
                * libm::pow(
                    10.0,
                    (dzhi * libm::log10(col[ilow]) + dzlow * libm::log10(col[ilow + 1]))
                        / (dzlow + dzhi),
                )
        };

        Uvbg {
            j_uv: 1.0e-21, // irrelevant as long as it's not 0
            g_jh0: loglerp(&self.g_h0),
            g_jhe0: loglerp(&self.g_he),
            g_jhep: loglerp(&self.g_hep),
            eps_h0: loglerp(&self.eps_h0),
            eps_he0: loglerp(&self.eps_he),
            eps_hep: loglerp(&self.eps_hep),
        }
    }
}

/// Spatially fluctuating reionization: a reionization-redshift field on a
/// periodic cubic grid, plus the (currently unused) reionized-fraction
/// curve that ships in the same table.
#[derive(Debug, Clone)]
pub struct UvFluctuations {
    interp: Interp,
    zreion: Vec<Scalar>,
    #[allow(dead_code)]
    fraction_interp: Interp,
    #[allow(dead_code)]
    fraction: Vec<Scalar>,
}

impl UvFluctuations {
    /// `xyz_bins` are the uniform grid coordinates (length `nside`);
    /// `zreion` is the `nside^3` reionization-redshift field in row-major
    /// order; `zbins`/`fraction` tabulate the reionized fraction of the
    /// universe against redshift.
    pub fn new(
        xyz_bins: &[Scalar],
        zreion: Vec<Scalar>,
        zbins: &[Scalar],
        fraction: Vec<Scalar>,
    ) -> Result<Self> {
        let nside = xyz_bins.len();
        if zreion.len() != nside * nside * nside {
            return Err(Error::MalformedTable {
                name: "UVFluctuation",
                reason: format!(
                    "Zreion table has {} entries for Nside {}",
                    zreion.len(),
                    nside
                ),
            });
        }
        if zreion[0] < 0.01 || zreion[0] > 100.0 {
            return Err(Error::MalformedTable {
                name: "UVFluctuation",
                reason: format!("bootstrap Zreion value {} out of range", zreion[0]),
            });
        }

        let mut interp = Interp::new(&[nside, nside, nside]);
        for axis in 0..3 {
            interp.init_dim(axis, xyz_bins[0], xyz_bins[nside - 1]);
        }

        let mut fraction_interp = Interp::new(&[zbins.len()]);
        if !zbins.is_empty() {
            fraction_interp.init_dim(0, zbins[0], zbins[zbins.len() - 1]);
        }

        info!("Using NON-UNIFORM UV BG on a {nside}^3 reionization grid");

        Ok(Self {
            interp,
            zreion,
            fraction_interp,
            fraction,
        })
    }

    /// The background seen at `pos`: the uniform value once the local cell
    /// has reionized, the zero background before. Binary per cell, never a
    /// blend.
    pub fn uvbg_at_position(&self, pos: Vector, global: &Uvbg, time: Scalar) -> Uvbg {
        let zreion = self
            .interp
            .eval_periodic(&[pos.x, pos.y, pos.z], &self.zreion);
        let z = 1.0 / time - 1.0;
        if zreion < z {
            Uvbg::default()
        } else {
            *global
        }
    }
}
