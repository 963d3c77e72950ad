//! Reference-frame transformations for optical elements.
//!
//! Every element is traced in its own local frame: the pole of the surface
//! at the origin, the surface tangent plane at z = 0 with +z on the
//! illuminated side, and y along the beam footprint. A beam arrives in the
//! frame of the previous image plane (the "lab" frame of this element,
//! beam along +y) and leaves in the frame of this element's image plane.
//!
//! | Step | Operation |
//! |------|-----------|
//! | entry | rotate by the azimuth about y, by the grazing angle about x, translate the pole to the origin |
//! | movement | optional misalignment applied in the local frame |
//! | exit | propagate to the image plane, rotate by the exit grazing angle about x, translate the image centre to the origin |

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use rayline_core::{Axis, RayBeam};

use crate::error::GeometryError;

/// A rigid-body transformation: rotation matrix + translation.
///
/// Positions map as $\mathbf{r}' = M\mathbf{r} + \mathbf{t}$ while
/// directions and field vectors only see $M$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Orthogonal 3x3 rotation matrix.
    pub matrix: Matrix3<f64>,
    /// Translation vector (m).
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl RigidTransform {
    /// Create a pure translation.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::new(dx, dy, dz),
        }
    }

    /// Create a frame rotation about a coordinate axis.
    pub fn rotation(axis: Axis, angle: f64) -> Self {
        Self {
            matrix: axis.frame_rotation(angle),
            translation: Vector3::zeros(),
        }
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }

    /// The inverse transform. Exact because the matrix is orthogonal.
    pub fn inverse(&self) -> RigidTransform {
        let mt = self.matrix.transpose();
        RigidTransform {
            matrix: mt,
            translation: -(mt * self.translation),
        }
    }

    /// Apply this transformation to a point.
    pub fn apply_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * point + self.translation
    }

    /// Apply this transformation to every ray of a beam.
    pub fn apply_to_beam(&self, beam: &mut RayBeam) {
        beam.transform(&self.matrix, &self.translation);
    }
}

/// Placement of an element along the beamline.
///
/// Angles are measured from the surface normal, so a grazing-incidence
/// mirror at 3 mrad has `angle_radial = π/2 - 0.003`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementCoordinates {
    /// Distance from the previous image plane to the pole (m).
    pub p: f64,
    /// Distance from the pole to this element's image plane (m).
    pub q: f64,
    /// Incidence angle from the normal (rad).
    pub angle_radial: f64,
    /// Exit angle from the normal (rad).
    pub angle_radial_out: f64,
    /// Rotation of the element about the incoming beam axis (rad).
    #[serde(default)]
    pub angle_azimuthal: f64,
}

impl ElementCoordinates {
    /// Coordinates of a specular element with equal incidence and exit
    /// angles.
    pub fn new(p: f64, q: f64, angle_radial: f64) -> Self {
        Self {
            p,
            q,
            angle_radial,
            angle_radial_out: angle_radial,
            angle_azimuthal: 0.0,
        }
    }

    /// Coordinates from grazing angles measured from the surface.
    pub fn from_grazing(p: f64, q: f64, grazing_in: f64, grazing_out: f64) -> Self {
        Self {
            p,
            q,
            angle_radial: FRAC_PI_2 - grazing_in,
            angle_radial_out: FRAC_PI_2 - grazing_out,
            angle_azimuthal: 0.0,
        }
    }

    /// Same coordinates rotated about the incoming beam axis.
    pub fn with_azimuth(mut self, angle_azimuthal: f64) -> Self {
        self.angle_azimuthal = angle_azimuthal;
        self
    }

    /// Incidence grazing angle $\theta_1 = \pi/2 - $ `angle_radial`.
    pub fn grazing_in(&self) -> f64 {
        FRAC_PI_2 - self.angle_radial
    }

    /// Exit grazing angle $\theta_2 = \pi/2 - $ `angle_radial_out`.
    pub fn grazing_out(&self) -> f64 {
        FRAC_PI_2 - self.angle_radial_out
    }

    /// Unit direction of the central outgoing ray in the local frame.
    pub fn central_exit_direction(&self) -> Vector3<f64> {
        let (s, c) = self.grazing_out().sin_cos();
        Vector3::new(0.0, c, s)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let values = [
            self.p,
            self.q,
            self.angle_radial,
            self.angle_radial_out,
            self.angle_azimuthal,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeometryError::InvalidCoordinates(format!("{:?}", self)));
        }
        Ok(())
    }
}

/// Refraction index and linear attenuation coefficient of the space a ray
/// travels through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Medium {
    pub refraction_index: f64,
    /// Intensity attenuation coefficient (m⁻¹).
    pub attenuation: f64,
}

impl Medium {
    pub const VACUUM: Medium = Medium {
        refraction_index: 1.0,
        attenuation: 0.0,
    };
}

impl Default for Medium {
    fn default() -> Self {
        Self::VACUUM
    }
}

/// Lab-to-local and local-to-image transformations of one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrameTransform {
    coordinates: ElementCoordinates,
}

impl ReferenceFrameTransform {
    pub fn new(coordinates: ElementCoordinates) -> Self {
        Self { coordinates }
    }

    pub fn coordinates(&self) -> &ElementCoordinates {
        &self.coordinates
    }

    /// Rigid transform from the incoming beam frame to the local frame.
    pub fn entry_transform(&self) -> RigidTransform {
        let c = &self.coordinates;
        let (s1, c1) = c.grazing_in().sin_cos();
        RigidTransform::rotation(Axis::Y, c.angle_azimuthal)
            .then(&RigidTransform::rotation(Axis::X, c.grazing_in()))
            .then(&RigidTransform::translation(0.0, -c.p * c1, c.p * s1))
    }

    /// Rigid transform from the local frame to the image frame, applied
    /// once rays sit on the image plane.
    pub fn exit_transform(&self) -> RigidTransform {
        let c = &self.coordinates;
        RigidTransform::rotation(Axis::X, c.grazing_out())
            .then(&RigidTransform::translation(0.0, -c.q, 0.0))
    }

    /// Move a beam into the local frame of the element.
    pub fn to_local(&self, beam: &mut RayBeam) {
        self.entry_transform().apply_to_beam(beam);
    }

    /// Propagate a local-frame beam through vacuum to the image plane and
    /// express it in the image frame.
    pub fn to_image(&self, beam: &mut RayBeam, lost_value: f64) {
        let n = beam.len();
        // Same medium for every ray; length always matches.
        let _ = self.to_image_through(beam, &vec![Medium::VACUUM; n], lost_value);
    }

    /// Propagate a local-frame beam to the image plane through per-ray media
    /// and express it in the image frame.
    ///
    /// Good rays advance to the plane normal to the central exit direction
    /// at distance `q`, accumulating `n · distance` of optical path and
    /// having both amplitudes scaled by $\sqrt{e^{-\mu |d|}}$. Rays travelling
    /// parallel to the image plane are flagged with `lost_value`.
    pub fn to_image_through(
        &self,
        beam: &mut RayBeam,
        media: &[Medium],
        lost_value: f64,
    ) -> Result<(), GeometryError> {
        if media.len() != beam.len() {
            return Err(GeometryError::LengthMismatch {
                expected: beam.len(),
                found: media.len(),
            });
        }
        let axis = self.coordinates.central_exit_direction();
        let q = self.coordinates.q;
        for (ray, medium) in beam.rays_mut().iter_mut().zip(media) {
            if ray.is_lost() {
                continue;
            }
            let denom = ray.direction.dot(&axis);
            if denom.abs() < 1e-15 {
                ray.lose(lost_value);
                continue;
            }
            let distance = (q - ray.position.dot(&axis)) / denom;
            ray.advance(distance, medium.refraction_index);
            if medium.attenuation > 0.0 {
                ray.attenuate((-medium.attenuation * distance.abs()).exp().sqrt());
            }
        }
        self.exit_transform().apply_to_beam(beam);
        Ok(())
    }
}

/// Misalignment of an element: translation offset and tilts about the local
/// axes, applied in the local frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Movement {
    /// Displacement of the surface (m).
    #[serde(default)]
    pub offset: [f64; 3],
    /// Tilts about x, y and z (rad), applied in that order.
    #[serde(default)]
    pub rotation: [f64; 3],
}

impl Movement {
    pub fn is_identity(&self) -> bool {
        self.offset.iter().chain(&self.rotation).all(|v| *v == 0.0)
    }

    /// Transform from the nominal local frame to the moved surface frame.
    pub fn transform(&self) -> RigidTransform {
        let [dx, dy, dz] = self.offset;
        let [rx, ry, rz] = self.rotation;
        RigidTransform::translation(-dx, -dy, -dz)
            .then(&RigidTransform::rotation(Axis::X, rx))
            .then(&RigidTransform::rotation(Axis::Y, ry))
            .then(&RigidTransform::rotation(Axis::Z, rz))
    }

    /// Express a beam in the moved surface frame.
    pub fn apply(&self, beam: &mut RayBeam) {
        if !self.is_identity() {
            self.transform().apply_to_beam(beam);
        }
    }

    /// Return a beam from the moved surface frame to the nominal frame.
    pub fn undo(&self, beam: &mut RayBeam) {
        if !self.is_identity() {
            self.transform().inverse().apply_to_beam(beam);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_identity_transform() {
        let t = RigidTransform::default();
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert_abs_diff_eq!(t.apply_point(&p), p, epsilon = 1e-15);
    }

    #[test]
    fn test_then_and_inverse() {
        let t = RigidTransform::rotation(Axis::Z, 0.3)
            .then(&RigidTransform::translation(1.0, 0.0, -2.0))
            .then(&RigidTransform::rotation(Axis::X, -1.1));
        let p = Vector3::new(0.4, -0.7, 2.5);
        let back = t.inverse().apply_point(&t.apply_point(&p));
        assert_abs_diff_eq!(back, p, epsilon = 1e-14);
    }

    #[test]
    fn test_entry_puts_source_on_central_ray() {
        let coords = ElementCoordinates::from_grazing(10.0, 5.0, 0.01, 0.01);
        let frame = ReferenceFrameTransform::new(coords);
        let t = frame.entry_transform();

        // The source sits on the incoming central ray, a distance p before the pole.
        let source = t.apply_point(&Vector3::zeros());
        assert_abs_diff_eq!(source.norm(), 10.0, epsilon = 1e-12);
        let pole = t.apply_point(&Vector3::new(0.0, 10.0, 0.0));
        assert_abs_diff_eq!(pole, Vector3::zeros(), epsilon = 1e-12);

        // The central ray arrives from +z at the grazing angle.
        let d = t.matrix * Vector3::y();
        assert_abs_diff_eq!(d, Vector3::new(0.0, 0.01f64.cos(), -0.01f64.sin()), epsilon = 1e-15);
    }

    #[test]
    fn test_image_plane_centre() {
        let coords = ElementCoordinates::from_grazing(10.0, 5.0, 0.02, 0.02);
        let frame = ReferenceFrameTransform::new(coords);
        let mut beam = RayBeam::pencil(1);
        {
            let ray = &mut beam.rays_mut()[0];
            ray.position = Vector3::zeros();
            ray.direction = coords.central_exit_direction();
        }
        frame.to_image(&mut beam, -1.0);
        let ray = beam.rays()[0];
        assert!(ray.is_good());
        assert_abs_diff_eq!(ray.position, Vector3::zeros(), epsilon = 1e-12);
        assert_abs_diff_eq!(ray.direction, Vector3::y(), epsilon = 1e-15);
        assert_abs_diff_eq!(ray.optical_path, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_attenuating_medium() {
        let coords = ElementCoordinates::from_grazing(1.0, 2.0, FRAC_PI_2, FRAC_PI_2);
        let frame = ReferenceFrameTransform::new(coords);
        let mut beam = RayBeam::pencil(1);
        beam.rays_mut()[0].direction = Vector3::z();
        let media = [Medium {
            refraction_index: 1.5,
            attenuation: 0.5,
        }];
        frame.to_image_through(&mut beam, &media, -1.0).unwrap();
        let ray = beam.rays()[0];
        assert_abs_diff_eq!(ray.optical_path, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ray.intensity(), (-1.0f64).exp(), epsilon = 1e-12);
        assert!(frame.to_image_through(&mut beam, &[], -1.0).is_err());
    }

    #[test]
    fn test_movement_round_trip() {
        let movement = Movement {
            offset: [1e-3, -2e-3, 5e-4],
            rotation: [1e-3, 0.2, -0.05],
        };
        let mut beam = RayBeam::pencil(3);
        beam.rays_mut()[1].position = Vector3::new(0.1, 0.2, 0.3);
        let original = beam.clone();
        movement.apply(&mut beam);
        assert_ne!(beam, original);
        movement.undo(&mut beam);
        for (a, b) in beam.iter().zip(original.iter()) {
            assert_abs_diff_eq!(a.position, b.position, epsilon = 1e-15);
            assert_abs_diff_eq!(a.direction, b.direction, epsilon = 1e-15);
        }
    }
}
