//! Ray ensembles and whole-beam operations.
//!
//! A [`RayBeam`] is the unit of data passed between optical elements. Its
//! ray order is fixed for its whole life: rays are flagged lost, never
//! removed or reordered, so that column `i` of any beam derived from a
//! source beam always describes the same photon.

use nalgebra::{Matrix3, Vector3};
use num_complex::Complex64;

use crate::boundary::BoundaryShape;
use crate::columns::RayFilter;
use crate::error::BeamError;
use crate::ray::{Ray, LOST_FLAG};
use crate::units;

/// Coordinate axis of a frame rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Matrix that rotates the reference frame by `angle` about this axis.
    ///
    /// For the component pair (a, b) orthogonal to the axis ((y, z) for x,
    /// (x, z) for y, (x, y) for z), vectors transform as
    /// $a' = a\cos\theta + b\sin\theta$, $b' = -a\sin\theta + b\cos\theta$.
    pub fn frame_rotation(self, angle: f64) -> Matrix3<f64> {
        let (s, c) = angle.sin_cos();
        match self {
            Axis::X => Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c),
            Axis::Y => Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c),
            Axis::Z => Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0),
        }
    }
}

/// An ordered ensemble of rays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RayBeam {
    rays: Vec<Ray>,
}

impl RayBeam {
    /// Wrap an existing ray list.
    pub fn from_rays(rays: Vec<Ray>) -> Self {
        Self { rays }
    }

    /// `n` identical rays at the origin travelling along +y, s-polarized,
    /// at a wavelength of 1 Å, indexed 0..n.
    pub fn pencil(n: usize) -> Self {
        let rays = (0..n)
            .map(|i| Ray {
                index: i as f64,
                ..Default::default()
            })
            .collect();
        Self { rays }
    }

    pub fn len(&self) -> usize {
        self.rays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    pub fn rays_mut(&mut self) -> &mut [Ray] {
        &mut self.rays
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ray> {
        self.rays.iter()
    }

    pub fn into_rays(self) -> Vec<Ray> {
        self.rays
    }

    /// Deep copy, used so that tracing never mutates its input.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Number of rays selected by a filter.
    pub fn count(&self, filter: RayFilter) -> usize {
        self.rays.iter().filter(|r| filter.accepts(r)).count()
    }

    pub fn good_count(&self) -> usize {
        self.count(RayFilter::Good)
    }

    pub fn lost_count(&self) -> usize {
        self.count(RayFilter::Lost)
    }

    /// Set every ray to the same photon energy (eV).
    pub fn set_photon_energy(&mut self, energy_ev: f64) {
        let k = units::energy_to_wavenumber(energy_ev);
        self.rays.iter_mut().for_each(|r| r.wavenumber = k);
    }

    /// Set every ray to the same wavelength (m).
    pub fn set_wavelength(&mut self, wavelength_m: f64) {
        let k = units::wavelength_to_wavenumber(wavelength_m);
        self.rays.iter_mut().for_each(|r| r.wavenumber = k);
    }

    /// Apply a linear map to the vectors of every ray and an affine map to
    /// its position.
    pub fn transform(&mut self, matrix: &Matrix3<f64>, translation: &Vector3<f64>) {
        for ray in &mut self.rays {
            ray.position = matrix * ray.position + translation;
            ray.direction = matrix * ray.direction;
            ray.e_s = matrix * ray.e_s;
            ray.e_p = matrix * ray.e_p;
        }
    }

    /// Rotate the reference frame by `angle` (rad) about `axis`.
    ///
    /// Positions, directions and both field vectors are rotated; all other
    /// fields are untouched. Rotating by `-angle` undoes the operation.
    pub fn rotate(&mut self, angle: f64, axis: Axis) {
        self.transform(&axis.frame_rotation(angle), &Vector3::zeros());
    }

    /// Shift every position by `offset` (m).
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for ray in &mut self.rays {
            ray.position += offset;
        }
    }

    /// Propagate good rays in vacuum to the plane `y = distance`.
    ///
    /// The travelled length is added to the optical path. Rays travelling
    /// parallel to the plane are flagged lost with [`LOST_FLAG`].
    pub fn retrace(&mut self, distance: f64) {
        for ray in self.rays.iter_mut().filter(|r| r.is_good()) {
            let vy = ray.direction.y;
            if vy.abs() < f64::EPSILON {
                ray.lose(LOST_FLAG);
                continue;
            }
            let tof = (distance - ray.position.y) / vy;
            ray.advance(tof, 1.0);
        }
    }

    /// Flag good rays whose local (x, y) position lies outside `shape`.
    ///
    /// Returns the number of rays newly lost. Applying the same boundary
    /// again loses nothing further.
    pub fn apply_boundaries(&mut self, shape: &BoundaryShape, lost_value: f64) -> usize {
        if shape.is_unlimited() {
            return 0;
        }
        let mut lost = 0;
        for ray in self.rays.iter_mut().filter(|r| r.is_good()) {
            if !shape.contains(ray.position.x, ray.position.y) {
                ray.lose(lost_value);
                lost += 1;
            }
        }
        lost
    }

    /// Scale the s and p field amplitudes ray by ray, leaving phases.
    pub fn apply_reflectivities(&mut self, amp_s: &[f64], amp_p: &[f64]) -> Result<(), BeamError> {
        self.check_len(amp_s.len())?;
        self.check_len(amp_p.len())?;
        for ((ray, &s), &p) in self.rays.iter_mut().zip(amp_s).zip(amp_p) {
            ray.e_s *= s;
            ray.e_p *= p;
        }
        Ok(())
    }

    /// Apply complex amplitude coefficients: magnitudes scale the field
    /// vectors and arguments are added to the phases.
    pub fn apply_complex_reflectivities(
        &mut self,
        rs: &[Complex64],
        rp: &[Complex64],
    ) -> Result<(), BeamError> {
        self.check_len(rs.len())?;
        self.check_len(rp.len())?;
        for ((ray, s), p) in self.rays.iter_mut().zip(rs).zip(rp) {
            ray.e_s *= s.norm();
            ray.e_p *= p.norm();
            ray.phase_s += s.arg();
            ray.phase_p += p.arg();
        }
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<(), BeamError> {
        if found != self.rays.len() {
            return Err(BeamError::LengthMismatch {
                expected: self.rays.len(),
                found,
            });
        }
        Ok(())
    }
}

impl FromIterator<Ray> for RayBeam {
    fn from_iter<I: IntoIterator<Item = Ray>>(iter: I) -> Self {
        Self {
            rays: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RayBeam {
    type Item = &'a Ray;
    type IntoIter = std::slice::Iter<'a, Ray>;

    fn into_iter(self) -> Self::IntoIter {
        self.rays.iter()
    }
}
