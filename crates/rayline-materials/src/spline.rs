//! Cubic spline interpolation for reflectivity maps.
//!
//! Two-dimensional reflectivity tables are sampled on an energy × angle
//! grid. Interpolating each energy row with a spline and then splining the
//! row values across energy gives a smooth bicubic surface $R(E, \theta)$.

use crate::provider::MaterialError;

/// A natural cubic spline interpolator for real-valued data.
///
/// Given $n$ data points $(x_i, y_i)$, constructs piecewise cubic polynomials
/// with continuous first and second derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    /// Sorted x values (knots).
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot.
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Construct a natural cubic spline from data points.
    ///
    /// # Arguments
    /// * `xs` - Strictly increasing x values, at least two.
    /// * `ys` - Corresponding y values (same length as `xs`).
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, MaterialError> {
        if xs.len() != ys.len() {
            return Err(MaterialError::DataError(format!(
                "spline needs equal-length data, got {} x and {} y values",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(MaterialError::DataError("spline needs at least 2 points".into()));
        }
        if let Some(i) = xs.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(MaterialError::DataError(format!(
                "spline abscissae must be strictly increasing at index {}",
                i + 1
            )));
        }

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n - 1];

        // Tridiagonal forward sweep; natural end conditions keep y2 = 0 at both ends.
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            let slope_diff = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * slope_diff / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        for k in (0..n - 2).rev() {
            y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
        }

        Ok(Self { xs, ys, y2s })
    }

    /// Range covered by the knots.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the spline at `x`, clamping `x` to the knot range.
    pub fn evaluate(&self, x: f64) -> f64 {
        let k = Bracket::locate(&self.xs, x);
        k.a * self.ys[k.lo] + k.b * self.ys[k.hi] + k.ca * self.y2s[k.lo] + k.cb * self.y2s[k.hi]
    }
}

/// Knot interval around a point and the cubic weights inside it.
struct Bracket {
    lo: usize,
    hi: usize,
    a: f64,
    b: f64,
    ca: f64,
    cb: f64,
}

impl Bracket {
    fn locate(xs: &[f64], x: f64) -> Self {
        let n = xs.len();
        let x = x.clamp(xs[0], xs[n - 1]);
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        let h = xs[hi] - xs[lo];
        let a = (xs[hi] - x) / h;
        let b = (x - xs[lo]) / h;
        Self {
            lo,
            hi,
            a,
            b,
            ca: (a * a * a - a) * h * h / 6.0,
            cb: (b * b * b - b) * h * h / 6.0,
        }
    }
}

/// Natural cubic splines over fixed knots, for data that changes on every
/// call.
///
/// A natural spline is linear in its knot values, so the second derivatives
/// of the cardinal splines are solved once and any data set is interpolated
/// as a weighted sum of its values.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineBasis {
    xs: Vec<f64>,
    /// `cardinal[j]` holds the knot second derivatives of the spline through
    /// the unit vector `e_j`.
    cardinal: Vec<Vec<f64>>,
}

impl SplineBasis {
    pub fn new(xs: Vec<f64>) -> Result<Self, MaterialError> {
        let n = xs.len();
        let cardinal = (0..n)
            .map(|j| {
                let mut ys = vec![0.0; n];
                ys[j] = 1.0;
                CubicSpline::new(xs.clone(), ys).map(|s| s.y2s)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { xs, cardinal })
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Value at `x` of the natural spline through `(xs[j], value(j))`,
    /// clamping `x` to the knot range.
    pub fn interpolate(&self, x: f64, value: impl Fn(usize) -> f64) -> f64 {
        let k = Bracket::locate(&self.xs, x);
        self.cardinal
            .iter()
            .enumerate()
            .map(|(j, y2)| {
                let mut weight = k.ca * y2[k.lo] + k.cb * y2[k.hi];
                if j == k.lo {
                    weight += k.a;
                }
                if j == k.hi {
                    weight += k.b;
                }
                weight * value(j)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_spline_passes_through_knots() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![0.9, 0.8, 0.5, 0.2, 0.05];
        let spline = CubicSpline::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert_abs_diff_eq!(spline.evaluate(*x), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_two_points_is_linear_and_clamped() {
        let spline = CubicSpline::new(vec![0.0, 2.0], vec![1.0, 0.0]).unwrap();
        assert_abs_diff_eq!(spline.evaluate(0.5), 0.75, epsilon = 1e-15);
        assert_abs_diff_eq!(spline.evaluate(-3.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(spline.evaluate(9.0), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_basis_matches_direct_spline() {
        let xs = vec![100.0, 250.0, 300.0, 700.0, 1000.0, 1800.0];
        let ys = vec![0.95, 0.9, 0.6, 0.62, 0.3, 0.01];
        let spline = CubicSpline::new(xs.clone(), ys.clone()).unwrap();
        let basis = SplineBasis::new(xs).unwrap();
        assert_eq!(basis.len(), 6);
        for x in [50.0, 100.0, 180.0, 299.0, 650.0, 1000.0, 1500.0, 5000.0] {
            assert_abs_diff_eq!(basis.interpolate(x, |j| ys[j]), spline.evaluate(x), epsilon = 1e-12);
        }
        assert!(SplineBasis::new(vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_invalid_knots() {
        assert!(CubicSpline::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(CubicSpline::new(vec![0.0], vec![1.0]).is_err());
        assert!(CubicSpline::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]).is_err());
    }
}
