//! Short-range force kernel: cubic-spline softening and the tabulated
//! TreePM suppression factor.
//!
//! The long-range/short-range split multiplies the Newtonian pair force
//! by `erfc(u) + 2u/sqrt(pi) * exp(-u^2)` with `u = r/(2*Asmth)`. The
//! factor is tabulated once because a table lookup beats recomputing
//! `erfc` per interaction.

use crate::physics::math::Scalar;

/// Number of entries in the suppression lookup table.
pub const NTAB: usize = 1000;

#[derive(Debug, Clone)]
pub struct ShortRangeTable {
    force: Vec<Scalar>,
    potential: Vec<Scalar>,
}

impl ShortRangeTable {
    pub fn new() -> Self {
        let mut force = vec![0.0; NTAB];
        let mut potential = vec![0.0; NTAB];
        for i in 0..NTAB {
            let u = 3.0 / NTAB as Scalar * (i as Scalar + 0.5);
            force[i] = libm::erfc(u)
                + 2.0 * u / libm::sqrt(std::f64::consts::PI) * libm::exp(-u * u);
            potential[i] = libm::erfc(u);
        }
        Self { force, potential }
    }

    /// Suppression factors `(force, potential)` for table index `tab`.
    /// Callers must have checked `tab < NTAB`; beyond the table the
    /// short-range force is fully suppressed and the pair is skipped.
    #[inline]
    pub fn factors(&self, tab: usize) -> (Scalar, Scalar) {
        (self.force[tab], self.potential[tab])
    }
}

impl Default for ShortRangeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Softened pair interaction: returns `(fac, facpot)` such that the
/// acceleration contribution is `d * fac` and the potential contribution
/// is `facpot`, before short-range suppression. Outside the softening
/// radius `h` this is exact Newtonian `m/r^3` and `-m/r`; inside, the
/// two-piece cubic-spline kernel in `u = r/h`.
#[inline]
pub fn softened_force(r: Scalar, r2: Scalar, h: Scalar, mass: Scalar) -> (Scalar, Scalar) {
    if r >= h {
        return (mass / (r2 * r), -mass / r);
    }

    let h_inv = 1.0 / h;
    let h3_inv = h_inv * h_inv * h_inv;
    let u = r * h_inv;

    let fac = if u < 0.5 {
        mass * h3_inv * (10.666666666667 + u * u * (32.0 * u - 38.4))
    } else {
        mass * h3_inv
            * (21.333333333333 - 48.0 * u + 38.4 * u * u
                - 10.666666666667 * u * u * u
                - 0.066666666667 / (u * u * u))
    };

    let wp = if u < 0.5 {
        -2.8 + u * u * (5.333333333333 + u * u * (6.4 * u - 9.6))
    } else {
        -3.2 + 0.066666666667 / u
            + u * u * (10.666666666667 + u * (-16.0 + u * (9.6 - 2.133333333333 * u)))
    };

    (fac, mass * h_inv * wp)
}
