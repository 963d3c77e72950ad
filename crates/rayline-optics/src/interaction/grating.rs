//! Diffraction gratings with a variable line spacing.
//!
//! The ruling density along the local y axis is the polynomial
//! $N(y) = a_0 + a_1 y + a_2 y^2 + a_3 y^3 + a_4 y^4$ (lines/m). At the hit
//! point, the component of the ray direction along the ruling-normal tangent
//! $\hat t$ changes by $m\lambda N(y)$ while the component along the
//! grooves is conserved. The normal component follows from $|v| = 1$; when
//! no real solution exists the ray is lost. Positive orders deviate towards
//! +y.

use nalgebra::Vector3;

use crate::error::TraceError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grating {
    /// Ruling coefficients $a_0 \ldots a_4$ (lines/m, lines/m², ...).
    pub ruling: [f64; 5],
    /// Diffraction order.
    pub order: i32,
}

impl Grating {
    /// A grating of constant line density (lines/m).
    pub fn uniform(lines_per_m: f64, order: i32) -> Self {
        Self {
            ruling: [lines_per_m, 0.0, 0.0, 0.0, 0.0],
            order,
        }
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        if self.ruling.iter().any(|a| !a.is_finite()) {
            return Err(TraceError::Configuration(format!(
                "grating ruling coefficients must be finite: {:?}",
                self.ruling
            )));
        }
        Ok(())
    }

    /// Local line density at `y` (lines/m).
    pub fn line_density(&self, y: f64) -> f64 {
        self.ruling.iter().rev().fold(0.0, |acc, a| acc * y + a)
    }

    /// Diffracted direction of a ray hitting the grating at `point`.
    ///
    /// `wavelength` is in metres; `normal` may face either side.
    pub fn diffract(
        &self,
        direction: &Vector3<f64>,
        point: &Vector3<f64>,
        normal: &Vector3<f64>,
        wavelength: f64,
    ) -> Option<Vector3<f64>> {
        let n = normal;
        let tangent = Vector3::y() - n * n.y;
        let tangent_norm = tangent.norm();
        if tangent_norm < f64::EPSILON {
            return None;
        }
        let tangent = tangent / tangent_norm;

        let vn = direction.dot(n);
        let shift = self.order as f64 * wavelength * self.line_density(point.y);
        let v_t = direction - n * vn + tangent * shift;
        let t2 = v_t.norm_squared();
        if t2 > 1.0 {
            return None;
        }
        // Reflected: the normal component changes sign.
        Some(v_t - n * (vn.signum() * (1.0 - t2).sqrt()))
    }
}
