//! Crystal diffraction.
//!
//! Diffracting planes of spacing `d` are tilted from the surface by the
//! asymmetry angle α about the local x axis. The outgoing direction
//! conserves the tangential wavevector up to the tangential part of the
//! reciprocal-lattice vector $\mathbf{H}$ ($|\mathbf{H}| = 1/d$ in units of
//! $1/\lambda$); its normal component points back out of the crystal in
//! Bragg geometry and into it in Laue geometry.
//!
//! The reflection amplitudes depend on the angular deviation from the
//! Bragg angle $\theta_B = \arcsin(\lambda / 2d)$ and are supplied by a
//! [`CrystalStructure`].

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use nalgebra::Vector3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use rayline_core::units;
use rayline_materials::MaterialError;

use crate::error::TraceError;

/// Source of crystal reflection amplitudes.
pub trait CrystalStructure: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Spacing of the diffracting planes (m).
    fn d_spacing(&self) -> f64;

    /// Complex amplitudes $(r_s, r_p)$ at a photon energy (eV) and angular
    /// deviation from the Bragg angle (rad).
    fn amplitudes(&self, photon_energy: f64, deviation: f64) -> Result<(Complex64, Complex64), MaterialError>;

    /// Bragg angle at a photon energy, `None` when $\lambda > 2d$.
    fn bragg_angle(&self, photon_energy: f64) -> Option<f64> {
        let ratio = units::energy_to_wavelength(photon_energy) / (2.0 * self.d_spacing());
        (ratio <= 1.0).then(|| ratio.asin())
    }
}

/// Which side of the crystal surface the diffracted beam leaves from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffractionGeometry {
    /// Reflected back out of the entrance surface.
    #[default]
    Bragg,
    /// Transmitted through the crystal.
    Laue,
}

/// Dynamical diffraction profile of a thick, non-absorbing crystal.
///
/// With $\eta = (\Delta\theta - \Delta_0)/(w/2)$, the amplitude is
/// $r = \eta - i\sqrt{1 - \eta^2}$ inside the total-reflection plateau
/// ($|\eta| \le 1$) and $r = \eta - \operatorname{sign}(\eta)\sqrt{\eta^2 - 1}$
/// outside. The p-polarization width is $w |\cos 2\theta_B|$.
#[derive(Debug, Clone, PartialEq)]
pub struct DarwinCurve {
    name: String,
    d_spacing: f64,
    /// Full width of the s-polarization plateau (rad).
    pub darwin_width: f64,
    /// Offset of the plateau centre from the kinematic Bragg angle (rad).
    pub angular_shift: f64,
}

impl DarwinCurve {
    pub fn new(name: impl Into<String>, d_spacing: f64, darwin_width: f64) -> Result<Self, MaterialError> {
        if !(d_spacing > 0.0) || !(darwin_width > 0.0) {
            return Err(MaterialError::DataError(format!(
                "crystal needs positive d-spacing and Darwin width, got {} m and {} rad",
                d_spacing, darwin_width
            )));
        }
        Ok(Self {
            name: name.into(),
            d_spacing,
            darwin_width,
            angular_shift: 0.0,
        })
    }

    pub fn with_shift(mut self, angular_shift: f64) -> Self {
        self.angular_shift = angular_shift;
        self
    }

    fn profile(eta: f64) -> Complex64 {
        if eta.abs() <= 1.0 {
            Complex64::new(eta, -(1.0 - eta * eta).sqrt())
        } else {
            Complex64::new(eta - eta.signum() * (eta * eta - 1.0).sqrt(), 0.0)
        }
    }
}

impl CrystalStructure for DarwinCurve {
    fn name(&self) -> &str {
        &self.name
    }

    fn d_spacing(&self) -> f64 {
        self.d_spacing
    }

    fn amplitudes(&self, photon_energy: f64, deviation: f64) -> Result<(Complex64, Complex64), MaterialError> {
        let theta_b = self.bragg_angle(photon_energy).ok_or(MaterialError::OutOfRange {
            energy_ev: photon_energy,
            min: units::HC_EV_M / (2.0 * self.d_spacing),
            max: f64::INFINITY,
        })?;
        let offset = deviation - self.angular_shift;
        let rs = Self::profile(offset / (0.5 * self.darwin_width));
        let width_p = self.darwin_width * (2.0 * theta_b).cos().abs();
        // At 45 degrees the p component is not reflected.
        let rp = if width_p > 0.0 {
            Self::profile(offset / (0.5 * width_p))
        } else {
            Complex64::new(0.0, 0.0)
        };
        Ok((rs, rp))
    }
}

/// Diffraction by a crystal with given structure, asymmetry and geometry.
#[derive(Debug, Clone)]
pub struct CrystalDiffraction {
    pub structure: Arc<dyn CrystalStructure>,
    /// Angle between the diffracting planes and the surface (rad).
    pub asymmetry_angle: f64,
    pub geometry: DiffractionGeometry,
}

/// Outgoing direction and amplitudes of a diffracted ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diffracted {
    pub direction: Vector3<f64>,
    pub amplitudes: (Complex64, Complex64),
}

impl CrystalDiffraction {
    pub fn new(structure: Arc<dyn CrystalStructure>) -> Self {
        Self {
            structure,
            asymmetry_angle: 0.0,
            geometry: DiffractionGeometry::Bragg,
        }
    }

    pub fn with_asymmetry(mut self, asymmetry_angle: f64) -> Self {
        self.asymmetry_angle = asymmetry_angle;
        self
    }

    pub fn with_geometry(mut self, geometry: DiffractionGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        let d = self.structure.d_spacing();
        if !(d > 0.0) || !self.asymmetry_angle.is_finite() {
            return Err(TraceError::Configuration(format!(
                "crystal '{}' has d-spacing {} m and asymmetry {} rad",
                self.structure.name(),
                d,
                self.asymmetry_angle
            )));
        }
        Ok(())
    }

    /// Angle of incidence for the central ray, measured from the surface
    /// normal, that meets the Bragg planes at the Bragg angle.
    pub fn central_incidence_angle(&self, photon_energy: f64) -> Option<f64> {
        let theta_b = self.structure.bragg_angle(photon_energy)?;
        Some(match self.geometry {
            DiffractionGeometry::Bragg => 0.5 * PI - (theta_b + self.asymmetry_angle),
            DiffractionGeometry::Laue => 0.5 * PI - (self.asymmetry_angle - theta_b),
        })
    }

    /// Diffract one ray.
    ///
    /// Returns `Ok(None)` when the Bragg condition cannot be met ($\lambda > 2d$)
    /// or the diffracted wave is evanescent.
    pub fn diffract(
        &self,
        direction: &Vector3<f64>,
        normal: &Vector3<f64>,
        photon_energy: f64,
    ) -> Result<Option<Diffracted>, TraceError> {
        let d = self.structure.d_spacing();
        let wavelength = units::energy_to_wavelength(photon_energy);
        let Some(theta_b) = self.structure.bragg_angle(photon_energy) else {
            return Ok(None);
        };

        // Normal facing the incoming ray, and the in-plane tangent along y.
        let n = if direction.dot(normal) > 0.0 { -normal } else { *normal };
        let tangent = Vector3::y() - n * n.y;
        let tangent_norm = tangent.norm();
        if tangent_norm < f64::EPSILON {
            return Ok(None);
        }
        let tangent = tangent / tangent_norm;

        let (sa, ca) = self.asymmetry_angle.sin_cos();
        let planes = n * ca + tangent * sa;
        let vb = direction.dot(&planes);
        // H opposes the incoming wavevector across the planes.
        let h = planes * (-vb.signum() * wavelength / d);

        let vn = direction.dot(&n);
        let v_t = (direction - n * vn) + (h - n * h.dot(&n));
        let t2 = v_t.norm_squared();
        if t2 > 1.0 {
            return Ok(None);
        }
        let normal_part = (1.0 - t2).sqrt();
        let out = match self.geometry {
            DiffractionGeometry::Bragg => v_t + n * normal_part,
            DiffractionGeometry::Laue => v_t - n * normal_part,
        };

        let deviation = vb.abs().min(1.0).asin() - theta_b;
        let amplitudes = self.structure.amplitudes(photon_energy, deviation)?;
        Ok(Some(Diffracted {
            direction: out.normalize(),
            amplitudes,
        }))
    }
}
