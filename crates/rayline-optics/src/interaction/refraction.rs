//! Refraction at the interface between two media.

use std::sync::Arc;

use nalgebra::Vector3;

use rayline_geometry::Medium;
use rayline_materials::OpticalConstants;

use crate::error::TraceError;

/// A refractive interface: the object medium lies on the +z side of the
/// surface, the image medium below it.
#[derive(Debug, Clone)]
pub struct Refractor {
    pub object: Arc<dyn OpticalConstants>,
    pub image: Arc<dyn OpticalConstants>,
}

impl Refractor {
    pub fn new(object: Arc<dyn OpticalConstants>, image: Arc<dyn OpticalConstants>) -> Self {
        Self { object, image }
    }

    pub fn object_medium(&self, photon_energy: f64) -> Result<Medium, TraceError> {
        medium_of(self.object.as_ref(), photon_energy)
    }

    pub fn image_medium(&self, photon_energy: f64) -> Result<Medium, TraceError> {
        medium_of(self.image.as_ref(), photon_energy)
    }
}

fn medium_of(constants: &dyn OpticalConstants, photon_energy: f64) -> Result<Medium, TraceError> {
    Ok(Medium {
        refraction_index: constants.refraction_index(photon_energy)?.re,
        attenuation: constants.attenuation_coefficient(photon_energy)?,
    })
}

/// Vector form of Snell's law.
///
/// `ratio` is $n_1/n_2$. Returns `None` past the critical angle.
pub fn snell(direction: &Vector3<f64>, normal: &Vector3<f64>, ratio: f64) -> Option<Vector3<f64>> {
    // Normal facing the incoming ray.
    let n = if direction.dot(normal) > 0.0 { -normal } else { *normal };
    let cos_i = -direction.dot(&n);
    let k = 1.0 - ratio * ratio * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some((direction * ratio + n * (ratio * cos_i - k.sqrt())).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;
    use rayline_materials::ConstantIndex;

    #[test]
    fn test_snell_angles() {
        let theta_i: f64 = 0.3;
        let v = Vector3::new(0.0, theta_i.sin(), -theta_i.cos());
        let out = snell(&v, &Vector3::z(), 1.0 / 1.5).unwrap();
        let theta_t = out.y.atan2(-out.z);
        assert_abs_diff_eq!(1.5 * theta_t.sin(), theta_i.sin(), epsilon = 1e-14);
        assert_abs_diff_eq!(out.norm(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_normal_incidence_is_undeviated() {
        let v = -Vector3::z();
        let out = snell(&v, &Vector3::z(), 1.0 / 1.5).unwrap();
        assert_abs_diff_eq!(out, v, epsilon = 1e-15);
    }

    #[test]
    fn test_critical_angle() {
        // Glass to air beyond asin(1/1.5).
        let theta_i: f64 = 0.8;
        let v = Vector3::new(0.0, theta_i.sin(), -theta_i.cos());
        assert!(snell(&v, &Vector3::z(), 1.5).is_none());
        assert!(snell(&v, &Vector3::z(), 1.0).is_some());
    }

    #[test]
    fn test_media_from_constants() {
        let glass = Arc::new(ConstantIndex::from_index("glass", Complex64::new(1.5, 0.0)).with_attenuation(3.0));
        let r = Refractor::new(Arc::new(ConstantIndex::vacuum()), glass);
        let image = r.image_medium(1.0).unwrap();
        assert_eq!(image.refraction_index, 1.5);
        assert_eq!(image.attenuation, 3.0);
        assert_eq!(r.object_medium(1.0).unwrap(), Medium::VACUUM);
    }
}
