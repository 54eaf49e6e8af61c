//! Metal-line cooling from a tabulated net rate at solar metallicity.
//!
//! The table is indexed by (redshift, log hydrogen density, log
//! temperature) and scaled linearly by the particle metallicity at
//! evaluation time. The arrays arrive pre-read from the IO layer; this
//! module owns validation and interpolation only.

use crate::error::{Error, Result};
use crate::physics::interp::Interp;
use crate::physics::math::Scalar;

#[derive(Debug, Clone)]
pub struct MetalCoolingTable {
    interp: Interp,
    rates: Vec<Scalar>,
}

impl MetalCoolingTable {
    /// `tabbed_metallicity` must be the single zero entry the reference
    /// tables carry (rates at one solar metallicity, rescaled at lookup);
    /// anything else means the file is tabulated for a different scheme.
    pub fn new(
        tabbed_metallicity: &[Scalar],
        redshift_bins: &[Scalar],
        hydrogen_density_bins: &[Scalar],
        temperature_bins: &[Scalar],
        rates: Vec<Scalar>,
    ) -> Result<Self> {
        if tabbed_metallicity.len() != 1 || tabbed_metallicity[0] != 0.0 {
            return Err(Error::MalformedTable {
                name: "MetalCool",
                reason: "metallicity axis is not the single zero bin".into(),
            });
        }

        let dims = [
            redshift_bins.len(),
            hydrogen_density_bins.len(),
            temperature_bins.len(),
        ];
        if rates.len() != dims.iter().product::<usize>() {
            return Err(Error::MalformedTable {
                name: "MetalCool",
                reason: format!(
                    "rate array has {} entries for {}x{}x{} bins",
                    rates.len(),
                    dims[0],
                    dims[1],
                    dims[2]
                ),
            });
        }

        let mut interp = Interp::new(&dims);
        interp.init_dim(0, redshift_bins[0], redshift_bins[dims[0] - 1]);
        interp.init_dim(
            1,
            hydrogen_density_bins[0],
            hydrogen_density_bins[dims[1] - 1],
        );
        interp.init_dim(2, temperature_bins[0], temperature_bins[dims[2] - 1]);

        Ok(Self { interp, rates })
    }

    /// Net cooling rate at solar metallicity. Queries beyond the table
    /// range use the boundary value; that is OK at the limit.
    pub fn rate(&self, redshift: Scalar, logt: Scalar, lognh: Scalar) -> Scalar {
        let mut status = [0i8; 3];
        self.interp
            .eval(&[redshift, lognh, logt], &self.rates, &mut status)
    }
}
