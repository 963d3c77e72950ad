//! Interaction laws: how a ray leaves a surface.
//!
//! Each [`InteractionLaw`] maps an incoming direction and the local surface
//! normal to an outgoing direction, and reports the medium the ray travels
//! through afterwards. Crystals also produce complex reflection amplitudes.
//!
//! ## Modules
//! - [`refraction`] - Vector Snell law between two media.
//! - [`grating`] - Ruled gratings with polynomial line density.
//! - [`crystal`] - Bragg/Laue diffraction and the Darwin profile.

pub mod crystal;
pub mod grating;
pub mod refraction;

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Rotation3, Vector3};
use num_complex::Complex64;

use rayline_core::{Ray, RayBeam};
use rayline_geometry::{Medium, SurfaceHit};

use crate::error::{RayFailures, TraceError};
use crystal::CrystalDiffraction;
use grating::Grating;
use refraction::Refractor;

/// The physical law applied where a ray meets a surface.
#[derive(Debug, Clone)]
pub enum InteractionLaw {
    /// Mirror reflection, $\mathbf{v}' = \mathbf{v} - 2(\mathbf{v}\cdot\mathbf{n})\mathbf{n}$.
    SpecularReflection,
    Refraction(Refractor),
    Grating(Grating),
    Crystal(CrystalDiffraction),
}

impl Default for InteractionLaw {
    fn default() -> Self {
        Self::SpecularReflection
    }
}

/// Result of applying a law to one ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deflection {
    pub direction: Vector3<f64>,
    /// Medium between the surface and the image plane.
    pub medium: Medium,
    /// Complex (s, p) amplitudes produced by the law itself.
    pub amplitudes: Option<(Complex64, Complex64)>,
}

/// Per-ray results of applying a law to a beam.
#[derive(Debug, Clone, Default)]
pub struct InteractionOutcome {
    pub media: Vec<Medium>,
    /// Present when the law produces amplitudes (crystals). Lost rays hold 1.
    pub amplitudes: Option<(Vec<Complex64>, Vec<Complex64>)>,
}

fn reflect(v: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    v - n * (2.0 * v.dot(n))
}

impl InteractionLaw {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpecularReflection => "specular_reflection",
            Self::Refraction(_) => "refraction",
            Self::Grating(_) => "grating",
            Self::Crystal(_) => "crystal",
        }
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        match self {
            Self::Grating(g) => g.validate(),
            Self::Crystal(c) => c.validate(),
            _ => Ok(()),
        }
    }

    /// Medium in front of the surface at a photon energy (eV).
    pub fn object_medium(&self, photon_energy: f64) -> Result<Medium, TraceError> {
        match self {
            Self::Refraction(r) => r.object_medium(photon_energy),
            _ => Ok(Medium::VACUUM),
        }
    }

    /// Outgoing direction of one ray at a surface point with unit normal
    /// `normal`. `Ok(None)` means the ray cannot continue.
    pub fn deflect(&self, ray: &Ray, normal: &Vector3<f64>) -> Result<Option<Deflection>, TraceError> {
        let v = &ray.direction;
        let vacuum = |direction: Vector3<f64>| Deflection {
            direction,
            medium: Medium::VACUUM,
            amplitudes: None,
        };
        Ok(match self {
            Self::SpecularReflection => Some(vacuum(reflect(v, normal))),
            Self::Refraction(r) => {
                let energy = ray.photon_energy();
                let n1 = r.object_medium(energy)?;
                let n2 = r.image_medium(energy)?;
                refraction::snell(v, normal, n1.refraction_index / n2.refraction_index).map(|direction| {
                    Deflection {
                        direction,
                        medium: n2,
                        amplitudes: None,
                    }
                })
            }
            Self::Grating(g) => g.diffract(v, &ray.position, normal, ray.wavelength()).map(vacuum),
            Self::Crystal(c) => c.diffract(v, normal, ray.photon_energy())?.map(|d| Deflection {
                direction: d.direction,
                medium: Medium::VACUUM,
                amplitudes: Some(d.amplitudes),
            }),
        })
    }

    /// Apply the law to every good ray sitting on the surface.
    ///
    /// Rays without a hit, for which the law has no solution or whose
    /// material or crystal data cannot be evaluated, are flagged with
    /// `lost_value`. Field vectors follow the direction change: mirrored
    /// for specular reflection, rotated with the ray otherwise.
    pub fn apply(
        &self,
        beam: &mut RayBeam,
        hits: &[Option<SurfaceHit>],
        lost_value: f64,
    ) -> Result<InteractionOutcome, TraceError> {
        if hits.len() != beam.len() {
            return Err(rayline_core::BeamError::LengthMismatch {
                expected: beam.len(),
                found: hits.len(),
            }
            .into());
        }
        let n = beam.len();
        let mut media = vec![Medium::VACUUM; n];
        let mut amplitudes = match self {
            Self::Crystal(_) => Some((vec![Complex64::new(1.0, 0.0); n], vec![Complex64::new(1.0, 0.0); n])),
            _ => None,
        };

        let mut failures = RayFailures::default();
        for (i, (ray, hit)) in beam.rays_mut().iter_mut().zip(hits).enumerate() {
            if ray.is_lost() {
                continue;
            }
            let Some(hit) = hit else {
                ray.lose(lost_value);
                continue;
            };
            let deflection = match self.deflect(ray, &hit.normal) {
                Ok(Some(deflection)) => deflection,
                Ok(None) => {
                    ray.lose(lost_value);
                    continue;
                }
                Err(error) => {
                    failures.record(ray, lost_value, error);
                    continue;
                }
            };

            match self {
                Self::SpecularReflection => {
                    ray.e_s = reflect(&ray.e_s, &hit.normal);
                    ray.e_p = reflect(&ray.e_p, &hit.normal);
                }
                _ => {
                    // Antiparallel directions have no unique rotation; fields stay.
                    if let Some(rot) = Rotation3::rotation_between(&ray.direction, &deflection.direction) {
                        ray.e_s = rot * ray.e_s;
                        ray.e_p = rot * ray.e_p;
                    }
                }
            }
            ray.direction = deflection.direction;
            media[i] = deflection.medium;
            if let (Some((s, p)), Some((amp_s, amp_p))) = (deflection.amplitudes, amplitudes.as_mut()) {
                amp_s[i] = s;
                amp_p[i] = p;
            }
        }
        failures.report(self.name());
        Ok(InteractionOutcome { media, amplitudes })
    }

    /// Exit angle from the normal (`angle_radial_out`) of the central ray
    /// arriving at `angle_radial` with a given photon energy.
    ///
    /// Returns a configuration error when the central ray itself cannot
    /// leave the surface.
    pub fn central_exit_angle(&self, angle_radial: f64, photon_energy: f64) -> Result<f64, TraceError> {
        let (s, c) = angle_radial.sin_cos();
        let ray = Ray {
            direction: Vector3::new(0.0, s, -c),
            wavenumber: rayline_core::units::energy_to_wavenumber(photon_energy),
            ..Default::default()
        };
        let out = self.deflect(&ray, &Vector3::z())?.ok_or_else(|| {
            TraceError::Configuration(format!(
                "central ray at {:.6} rad and {} eV does not leave the {} surface",
                angle_radial,
                photon_energy,
                self.name()
            ))
        })?;
        let v = out.direction;
        Ok(v.y.atan2(v.z))
    }

    /// Grazing angle of incidence for each good ray with a hit, in radians.
    pub fn grazing_angles(beam: &RayBeam, hits: &[Option<SurfaceHit>]) -> Vec<f64> {
        beam.iter()
            .zip(hits)
            .map(|(ray, hit)| match hit {
                Some(h) if ray.is_good() => ray.direction.dot(&h.normal).abs().min(1.0).asin(),
                _ => FRAC_PI_2,
            })
            .collect()
    }
}
