//! Generic N-dimensional table interpolation on uniform grids.
//!
//! Used by the metal-cooling table (redshift x density x temperature) and
//! the spatial UV-fluctuation field (periodic XYZ lookup). Evaluation
//! outside the tabulated range clamps to the boundary value and reports
//! which axes were out of range; that is tolerated by every caller.

/// Per-axis range status from a clamped evaluation.
pub type AxisStatus = i8; // -1 below, 0 inside, +1 above

#[derive(Debug, Clone)]
pub struct Interp {
    dims: Vec<usize>,
    lo: Vec<f64>,
    step: Vec<f64>,
    strides: Vec<usize>,
}

impl Interp {
    /// A table with `dims[k]` points along axis `k`. Axis ranges default to
    /// `[0, dims[k] - 1]` until `init_dim` is called.
    pub fn new(dims: &[usize]) -> Self {
        assert!(!dims.is_empty());
        let mut strides = vec![1usize; dims.len()];
        for k in (0..dims.len() - 1).rev() {
            strides[k] = strides[k + 1] * dims[k + 1];
        }
        Self {
            dims: dims.to_vec(),
            lo: vec![0.0; dims.len()],
            step: dims.iter().map(|&n| if n > 1 { 1.0 } else { 0.0 }).collect(),
            strides,
        }
    }

    /// Define a uniform grid `[lo, hi]` along `axis`.
    pub fn init_dim(&mut self, axis: usize, lo: f64, hi: f64) {
        self.lo[axis] = lo;
        self.step[axis] = if self.dims[axis] > 1 {
            (hi - lo) / (self.dims[axis] - 1) as f64
        } else {
            0.0
        };
    }

    pub fn table_len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Multilinear interpolation of `table` at `x`, clamping per axis and
    /// reporting the range status in `status`.
    pub fn eval(&self, x: &[f64], table: &[f64], status: &mut [AxisStatus]) -> f64 {
        debug_assert_eq!(x.len(), self.dims.len());
        debug_assert_eq!(table.len(), self.table_len());

        let nd = self.dims.len();
        let mut base = vec![0usize; nd];
        let mut frac = vec![0.0f64; nd];

        for k in 0..nd {
            status[k] = 0;
            if self.dims[k] == 1 || self.step[k] == 0.0 {
                continue;
            }
            let t = (x[k] - self.lo[k]) / self.step[k];
            if t <= 0.0 {
                if t < 0.0 {
                    status[k] = -1;
                }
                continue;
            }
            let max = (self.dims[k] - 1) as f64;
            if t >= max {
                if t > max {
                    status[k] = 1;
                }
                base[k] = self.dims[k] - 1;
                continue;
            }
            base[k] = t as usize;
            frac[k] = t - base[k] as f64;
        }

        self.gather(&base, &frac, table, |i, n| (i + 1).min(n - 1))
    }

    /// Periodic (toroidal) multilinear interpolation for spatial lookups.
    /// Coordinates wrap; there is no out-of-range state.
    pub fn eval_periodic(&self, x: &[f64], table: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), self.dims.len());

        let nd = self.dims.len();
        let mut base = vec![0usize; nd];
        let mut frac = vec![0.0f64; nd];

        for k in 0..nd {
            let n = self.dims[k];
            if n == 1 || self.step[k] == 0.0 {
                continue;
            }
            let mut t = (x[k] - self.lo[k]) / self.step[k];
            let nf = n as f64;
            t = t.rem_euclid(nf);
            base[k] = (t as usize).min(n - 1);
            frac[k] = t - base[k] as f64;
        }

        self.gather(&base, &frac, table, |i, n| (i + 1) % n)
    }

    /// Accumulate the 2^ndim corner contributions. `upper` maps a base
    /// index to its neighbor along an axis (clamped or wrapped).
    fn gather(
        &self,
        base: &[usize],
        frac: &[f64],
        table: &[f64],
        upper: impl Fn(usize, usize) -> usize,
    ) -> f64 {
        let nd = self.dims.len();
        let mut value = 0.0;
        for corner in 0..(1usize << nd) {
            let mut weight = 1.0;
            let mut index = 0usize;
            for k in 0..nd {
                let hi = corner & (1 << k) != 0;
                let i = if hi {
                    weight *= frac[k];
                    upper(base[k], self.dims[k])
                } else {
                    weight *= 1.0 - frac[k];
                    base[k]
                };
                index += i * self.strides[k];
            }
            if weight != 0.0 {
                value += weight * table[index];
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_in_one_dimension() {
        let mut interp = Interp::new(&[3]);
        interp.init_dim(0, 0.0, 2.0);
        let table = [0.0, 10.0, 20.0];
        let mut status = [0i8];
        assert_eq!(interp.eval(&[0.5], &table, &mut status), 5.0);
        assert_eq!(status[0], 0);
        assert_eq!(interp.eval(&[1.0], &table, &mut status), 10.0);
    }

    #[test]
    fn clamps_and_reports_out_of_range() {
        let mut interp = Interp::new(&[3]);
        interp.init_dim(0, 0.0, 2.0);
        let table = [0.0, 10.0, 20.0];
        let mut status = [0i8];
        assert_eq!(interp.eval(&[-1.0], &table, &mut status), 0.0);
        assert_eq!(status[0], -1);
        assert_eq!(interp.eval(&[5.0], &table, &mut status), 20.0);
        assert_eq!(status[0], 1);
    }

    #[test]
    fn bilinear_in_two_dimensions() {
        let mut interp = Interp::new(&[2, 2]);
        interp.init_dim(0, 0.0, 1.0);
        interp.init_dim(1, 0.0, 1.0);
        // row-major: f(0,0)=0 f(0,1)=1 f(1,0)=2 f(1,1)=3
        let table = [0.0, 1.0, 2.0, 3.0];
        let mut status = [0i8; 2];
        let v = interp.eval(&[0.5, 0.5], &table, &mut status);
        assert!((v - 1.5).abs() < 1e-12);
    }

    #[test]
    fn periodic_wraps_around_the_grid() {
        let mut interp = Interp::new(&[4]);
        interp.init_dim(0, 0.0, 3.0);
        let table = [0.0, 1.0, 2.0, 3.0];
        // halfway between the last point and the wrapped first point
        let v = interp.eval_periodic(&[3.5], &table);
        assert!((v - 1.5).abs() < 1e-12);
        // a full period away from x = 1
        let v = interp.eval_periodic(&[5.0], &table);
        assert!((v - 1.0).abs() < 1e-12);
    }
}
