//! Toroidal surfaces.
//!
//! The torus is generated by a tube of radius `r` (sagittal) whose centre
//! line is a circle of radius `R - r` around the x-parallel axis through
//! (0, 0, R). Its implicit form,
//!
//! $$F = \left(\sqrt{y^2 + (z - R)^2} - (R - r)\right)^2 + x^2 - r^2,$$
//!
//! is quartic along a ray, so intersections are found by Newton iteration
//! started from the tangent-plane intersection.

use nalgebra::Vector3;

use crate::error::GeometryError;
use crate::surface::{Convexity, SurfaceModel};

const MAX_ITERATIONS: usize = 100;
const SURFACE_TOLERANCE: f64 = 1e-10;

/// A toroid with tangential radius `major` and sagittal radius `minor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Toroid {
    major: f64,
    minor: f64,
    /// +1 for a concave (upward) surface, -1 when mirrored through z = 0.
    z_sign: f64,
}

impl Toroid {
    pub fn new(major_radius: f64, minor_radius: f64) -> Result<Self, GeometryError> {
        let valid = |r: f64| r.is_finite() && r > 0.0;
        if !valid(major_radius) || !valid(minor_radius) {
            return Err(GeometryError::InvalidSurface(format!(
                "toroid radii must be positive, got R = {}, r = {}",
                major_radius, minor_radius
            )));
        }
        Ok(Self {
            major: major_radius,
            minor: minor_radius,
            z_sign: 1.0,
        })
    }

    pub fn with_convexity(mut self, convexity: Convexity) -> Self {
        self.z_sign = match convexity {
            Convexity::Upward => 1.0,
            Convexity::Downward => -1.0,
        };
        self
    }

    pub fn major_radius(&self) -> f64 {
        self.major
    }

    pub fn minor_radius(&self) -> f64 {
        self.minor
    }

    /// Implicit function and its gradient at a point.
    ///
    /// `rho - R` is formed as `-(2wR - w^2 - y^2) / (rho + R)` so that large
    /// tangential radii do not cancel against `rho`.
    fn evaluate(&self, p: &Vector3<f64>) -> Option<(f64, Vector3<f64>)> {
        let w = self.z_sign * p.z;
        let z = w - self.major;
        let rho = (p.y * p.y + z * z).sqrt();
        if rho == 0.0 {
            return None;
        }
        let offset = -(w * (2.0 * self.major - w) - p.y * p.y) / (rho + self.major);
        let tube = offset + self.minor;
        let f = offset * (offset + 2.0 * self.minor) + p.x * p.x;
        let g = Vector3::new(
            2.0 * p.x,
            2.0 * tube * p.y / rho,
            2.0 * tube * z / rho * self.z_sign,
        );
        Some((f, g))
    }
}

impl SurfaceModel for Toroid {
    fn name(&self) -> &'static str {
        "toroid"
    }

    fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        let mut t = if direction.z.abs() > f64::EPSILON {
            -origin.z / direction.z
        } else {
            0.0
        };
        for _ in 0..MAX_ITERATIONS {
            let (f, g) = self.evaluate(&(origin + direction * t))?;
            let slope = g.dot(direction);
            if slope == 0.0 || !slope.is_finite() {
                return None;
            }
            let step = f / slope;
            t -= step;
            if !t.is_finite() {
                return None;
            }
            if step.abs() <= 1e-12 * t.abs().max(1.0) {
                return Some(t);
            }
        }
        // Steps stalled at the round-off floor: accept if the iterate lies on
        // the surface to within a distance tolerance.
        let (f, g) = self.evaluate(&(origin + direction * t))?;
        let distance = f.abs() / g.norm();
        (distance <= SURFACE_TOLERANCE * t.abs().max(1.0)).then_some(t)
    }

    fn normal(&self, point: &Vector3<f64>) -> Option<Vector3<f64>> {
        let (_, g) = self.evaluate(point)?;
        let norm = g.norm();
        // dF/dz at the pole is -2 r z_sign.
        (norm > 0.0).then(|| -g * (self.z_sign / norm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pole_on_surface() {
        let t = Toroid::new(1000.0, 0.05).unwrap();
        let (f, _) = t.evaluate(&Vector3::zeros()).unwrap();
        assert_abs_diff_eq!(f, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.normal(&Vector3::zeros()).unwrap(), Vector3::z(), epsilon = 1e-15);
    }

    #[test]
    fn test_principal_curvatures() {
        let t = Toroid::new(200.0, 0.1).unwrap();
        // Sagittal circle: (x, 0, z) with x^2 + (z - r)^2 = r^2.
        let x: f64 = 0.02;
        let z_sag = 0.1 - (0.01 - x * x).sqrt();
        let t_sag = t
            .intersect(&Vector3::new(x, 0.0, 1.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_abs_diff_eq!(1.0 - t_sag, z_sag, epsilon = 1e-11);

        // Tangential circle: (0, y, z) with y^2 + (z - R)^2 = R^2.
        let y: f64 = 0.5;
        let z_tan = 200.0 - (40000.0 - y * y).sqrt();
        let t_tan = t
            .intersect(&Vector3::new(0.0, y, 1.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_abs_diff_eq!(1.0 - t_tan, z_tan, epsilon = 1e-11);
    }

    #[test]
    fn test_grazing_ray_hits_near_pole() {
        let t = Toroid::new(500.0, 0.05).unwrap();
        let theta: f64 = 0.004;
        let origin = Vector3::new(1e-4, -10.0 * theta.cos(), 10.0 * theta.sin());
        let direction = Vector3::new(0.0, theta.cos(), -theta.sin());
        let s = t.intersect(&origin, &direction).unwrap();
        let hit = origin + direction * s;
        let (f, _) = t.evaluate(&hit).unwrap();
        assert!(f.abs() < 1e-12);
        assert!(hit.y.abs() < 1e-3);
    }

    #[test]
    fn test_large_tangential_radius_converges() {
        for (major, minor, theta) in [(3333.33, 0.03, 0.003f64), (20000.0, 0.05, 0.002)] {
            let t = Toroid::new(major, minor).unwrap();
            let origin = Vector3::new(0.0, -10.0 * theta.cos(), 10.0 * theta.sin());
            let direction = Vector3::new(0.0, theta.cos(), -theta.sin());
            let s = t.intersect(&origin, &direction).unwrap();
            assert_abs_diff_eq!(s, 10.0, epsilon = 1e-9);

            let off_axis = Vector3::new(2e-3, -10.0 * theta.cos(), 10.0 * theta.sin() + 1e-4);
            let s = t.intersect(&off_axis, &direction).unwrap();
            let (f, g) = t.evaluate(&(off_axis + direction * s)).unwrap();
            assert!(f.abs() / g.norm() < 1e-12);
        }
    }

    #[test]
    fn test_convex_toroid_normal_points_up() {
        let t = Toroid::new(50.0, 0.2).unwrap().with_convexity(Convexity::Downward);
        let n = t.normal(&Vector3::zeros()).unwrap();
        assert_abs_diff_eq!(n, Vector3::z(), epsilon = 1e-15);
        let s = t
            .intersect(&Vector3::new(0.05, 0.0, 1.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        // The convex surface falls away below the tangent plane.
        assert!(1.0 - s < 0.0);
    }
}
