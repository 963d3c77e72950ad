//! Quadric surfaces.
//!
//! A conic is the zero set of
//!
//! $$F = c_0x^2 + c_1y^2 + c_2z^2 + c_3xy + c_4yz + c_5xz + c_6x + c_7y + c_8z + c_9$$
//!
//! in the local frame of the element. The focusing figures are built in
//! closed form from the focal distances so that the surface passes through
//! the origin with its tangent plane at z = 0.

use nalgebra::{Matrix3, Vector3};

use crate::error::GeometryError;
use crate::surface::{FocalGeometry, FocusAtInfinity, SurfaceModel};

/// A quadric surface given by its 10 coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conic {
    ccc: [f64; 10],
    /// Sign applied to the gradient so normals point to +z at the pole.
    orientation: f64,
}

impl Conic {
    /// Create a conic from raw coefficients.
    pub fn new(ccc: [f64; 10]) -> Result<Self, GeometryError> {
        if ccc.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::InvalidSurface(format!(
                "conic coefficients must be finite: {:?}",
                ccc
            )));
        }
        if ccc[..9].iter().all(|c| *c == 0.0) {
            return Err(GeometryError::InvalidSurface(
                "conic coefficients describe no surface".into(),
            ));
        }
        Ok(Self::from_coefficients(ccc))
    }

    fn from_coefficients(ccc: [f64; 10]) -> Self {
        let orientation = if ccc[8] > 0.0 { 1.0 } else if ccc[8] < 0.0 { -1.0 } else { 1.0 };
        Self { ccc, orientation }
    }

    /// The tangent plane z = 0.
    pub fn plane() -> Self {
        let mut ccc = [0.0; 10];
        ccc[8] = -1.0;
        Self::from_coefficients(ccc)
    }

    /// Sphere of the given radius with its centre at (0, 0, R).
    pub fn sphere(radius: f64) -> Result<Self, GeometryError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(GeometryError::InvalidSurface(format!(
                "sphere radius must be positive, got {}",
                radius
            )));
        }
        Ok(Self::from_coefficients([
            1.0,
            1.0,
            1.0,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            -2.0 * radius,
            0.0,
        ]))
    }

    /// Ellipsoid of revolution imaging the point at `p_focus` onto the point
    /// at `q_focus`.
    pub fn ellipsoid(focus: &FocalGeometry) -> Result<Self, GeometryError> {
        let (f1, f2) = foci(focus);
        Self::of_revolution(f1, f2, 0.5 * (focus.p_focus + focus.q_focus))
    }

    /// Hyperboloid of revolution: rays from `p_focus` leave as if emitted by
    /// a virtual focus `q_focus` behind the surface.
    pub fn hyperboloid(focus: &FocalGeometry) -> Result<Self, GeometryError> {
        let (f1, f2) = foci(focus);
        Self::of_revolution(f1, -f2, 0.5 * (focus.p_focus - focus.q_focus).abs())
    }

    /// Quadric of revolution about the axis through two foci with semi-major
    /// axis `a`: $(\mathbf{d}\cdot\mathbf{u})^2 (1/a^2 - 1/B) + |\mathbf{d}|^2/B = 1$,
    /// $B = a^2 - c^2$, $\mathbf{d}$ measured from the centre.
    fn of_revolution(f1: Vector3<f64>, f2: Vector3<f64>, a: f64) -> Result<Self, GeometryError> {
        let centre = 0.5 * (f1 + f2);
        let half_distance = 0.5 * (f2 - f1).norm();
        let b = a * a - half_distance * half_distance;
        if a <= 0.0 || b.abs() < f64::EPSILON * a * a {
            return Err(GeometryError::InvalidSurface(format!(
                "degenerate quadric of revolution (a = {}, c = {})",
                a, half_distance
            )));
        }
        let u = (f2 - f1) / (2.0 * half_distance);
        let q = (1.0 / (a * a) - 1.0 / b) * (u * u.transpose()) + Matrix3::identity() / b;
        let linear = -2.0 * (q * centre);
        Ok(Self::from_coefficients([
            q[(0, 0)],
            q[(1, 1)],
            q[(2, 2)],
            2.0 * q[(0, 1)],
            2.0 * q[(1, 2)],
            2.0 * q[(0, 2)],
            linear.x,
            linear.y,
            linear.z,
            0.0,
        ]))
    }

    /// Paraboloid of revolution with one focus at infinity.
    pub fn paraboloid(focus: &FocalGeometry, at_infinity: FocusAtInfinity) -> Self {
        let (s, c) = focus.grazing_angle.sin_cos();
        let (fact, f) = match at_infinity {
            FocusAtInfinity::Source => (1.0, focus.q_focus),
            FocusAtInfinity::Image => (-1.0, focus.p_focus),
        };
        Self::from_coefficients([
            1.0,
            s * s,
            c * c,
            0.0,
            2.0 * fact * s * c,
            0.0,
            0.0,
            0.0,
            -4.0 * f * s,
            0.0,
        ])
    }

    /// Cylinder obtained by removing the dependence along an axis in the
    /// x-y plane at `angle` from x: 0 keeps the tangential profile, π/2 turns
    /// it into the sagittal one.
    pub fn cylindrical(&self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let b = self.ccc[1];
        let e = self.ccc[4];
        let h = self.ccc[7];
        let mut ccc = self.ccc;
        ccc[0] = b * s * s;
        ccc[1] = b * c * c;
        ccc[3] = -2.0 * b * s * c;
        ccc[4] = e * c;
        ccc[5] = -e * s;
        ccc[6] = -h * s;
        ccc[7] = h * c;
        Self::from_coefficients(ccc)
    }

    /// Mirror image through the tangent plane (z → −z), turning a concave
    /// figure into a convex one.
    pub fn flipped(&self) -> Self {
        let mut ccc = self.ccc;
        ccc[4] = -ccc[4];
        ccc[5] = -ccc[5];
        ccc[8] = -ccc[8];
        Self::from_coefficients(ccc)
    }

    pub fn coefficients(&self) -> &[f64; 10] {
        &self.ccc
    }

    /// Value of the implicit function at a point.
    pub fn evaluate(&self, p: &Vector3<f64>) -> f64 {
        let c = &self.ccc;
        c[0] * p.x * p.x
            + c[1] * p.y * p.y
            + c[2] * p.z * p.z
            + c[3] * p.x * p.y
            + c[4] * p.y * p.z
            + c[5] * p.x * p.z
            + c[6] * p.x
            + c[7] * p.y
            + c[8] * p.z
            + c[9]
    }

    fn gradient(&self, p: &Vector3<f64>) -> Vector3<f64> {
        let c = &self.ccc;
        Vector3::new(
            2.0 * c[0] * p.x + c[3] * p.y + c[5] * p.z + c[6],
            2.0 * c[1] * p.y + c[3] * p.x + c[4] * p.z + c[7],
            2.0 * c[2] * p.z + c[4] * p.y + c[5] * p.x + c[8],
        )
    }
}

/// Entrance and exit foci in the local frame.
fn foci(focus: &FocalGeometry) -> (Vector3<f64>, Vector3<f64>) {
    let (s, c) = focus.grazing_angle.sin_cos();
    (
        Vector3::new(0.0, -focus.p_focus * c, focus.p_focus * s),
        Vector3::new(0.0, focus.q_focus * c, focus.q_focus * s),
    )
}

impl SurfaceModel for Conic {
    fn name(&self) -> &'static str {
        "conic"
    }

    fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        let c = &self.ccc;
        let (p, v) = (origin, direction);
        let aa = c[0] * v.x * v.x
            + c[1] * v.y * v.y
            + c[2] * v.z * v.z
            + c[3] * v.x * v.y
            + c[4] * v.y * v.z
            + c[5] * v.x * v.z;
        let bb = 2.0 * (c[0] * p.x * v.x + c[1] * p.y * v.y + c[2] * p.z * v.z)
            + c[3] * (p.x * v.y + p.y * v.x)
            + c[4] * (p.y * v.z + p.z * v.y)
            + c[5] * (p.x * v.z + p.z * v.x)
            + c[6] * v.x
            + c[7] * v.y
            + c[8] * v.z;
        let cc = self.evaluate(p);

        if aa == 0.0 {
            return (bb != 0.0).then(|| -cc / bb);
        }
        let deter = bb * bb - 4.0 * aa * cc;
        if deter < 0.0 {
            return None;
        }
        // Numerically stable pair of roots.
        let qq = -0.5 * (bb + bb.signum() * deter.sqrt());
        let t1 = qq / aa;
        let t2 = if qq != 0.0 { cc / qq } else { t1 };

        // Keep the root closest to the pole.
        let d1 = (p + v * t1).norm_squared();
        let d2 = (p + v * t2).norm_squared();
        let t = if d1 <= d2 { t1 } else { t2 };
        t.is_finite().then_some(t)
    }

    fn normal(&self, point: &Vector3<f64>) -> Option<Vector3<f64>> {
        let g = self.gradient(point);
        let norm = g.norm();
        (norm > 0.0).then(|| g * (self.orientation / norm))
    }
}
