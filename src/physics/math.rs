//! Shared math types for the physics core.

/// Scalar type for physics calculations (f64 for precision)
pub type Scalar = f64;

/// 3D vector type for positions, accelerations, and forces
pub type Vector = glam::DVec3;

/// Minimum-image separation component for a periodic box of side `boxsize`.
///
/// Maps `d` into `[-boxsize/2, boxsize/2]`. A non-positive `boxsize`
/// disables wrapping (non-periodic runs).
#[inline]
pub fn nearest(d: Scalar, boxsize: Scalar) -> Scalar {
    if boxsize <= 0.0 {
        return d;
    }
    let half = 0.5 * boxsize;
    let mut d = d;
    while d > half {
        d -= boxsize;
    }
    while d < -half {
        d += boxsize;
    }
    d
}

/// Component-wise minimum-image separation vector.
#[inline]
pub fn nearest_vec(d: Vector, boxsize: Scalar) -> Vector {
    Vector::new(
        nearest(d.x, boxsize),
        nearest(d.y, boxsize),
        nearest(d.z, boxsize),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_wraps_into_half_box() {
        let l = 100.0;
        assert_eq!(nearest(60.0, l), -40.0);
        assert_eq!(nearest(-60.0, l), 40.0);
        assert_eq!(nearest(10.0, l), 10.0);
        assert_eq!(nearest(0.0, l), 0.0);
    }

    #[test]
    fn nearest_disabled_for_nonperiodic() {
        assert_eq!(nearest(1e6, 0.0), 1e6);
        assert_eq!(nearest(-1e6, -1.0), -1e6);
    }

    #[test]
    fn nearest_vec_is_componentwise() {
        let d = Vector::new(60.0, -60.0, 10.0);
        let w = nearest_vec(d, 100.0);
        assert_eq!(w, Vector::new(-40.0, 40.0, 10.0));
    }
}
