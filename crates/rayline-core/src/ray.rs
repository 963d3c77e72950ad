//! A single photon ray.
//!
//! The electric field of a ray is split into two orthogonal components, the
//! s- and p-polarized field vectors $\mathbf{E}_s$ and $\mathbf{E}_p$, each
//! with its own phase. Their squared magnitudes carry the ray intensity, so
//! that an attenuating element simply scales the vectors.

use nalgebra::Vector3;

use crate::units;

/// Flag value of a ray that is still propagating.
pub const GOOD_FLAG: f64 = 1.0;

/// Default flag value assigned to rays lost outside of an element trace.
pub const LOST_FLAG: f64 = -1.0;

/// One photon ray.
///
/// A ray is good when `flag > 0` and lost when `flag <= 0`. Lost rays keep
/// their last state and are never removed from a beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Position (m).
    pub position: Vector3<f64>,
    /// Unit propagation direction.
    pub direction: Vector3<f64>,
    /// s-polarized electric field vector.
    pub e_s: Vector3<f64>,
    /// p-polarized electric field vector.
    pub e_p: Vector3<f64>,
    /// Phase of the s component (rad).
    pub phase_s: f64,
    /// Phase of the p component (rad).
    pub phase_p: f64,
    /// Good/lost flag.
    pub flag: f64,
    /// Wavenumber $2\pi/\lambda$ (cm⁻¹).
    pub wavenumber: f64,
    /// Ray index, 0-based, assigned by the source and never changed.
    pub index: f64,
    /// Accumulated optical path length (m).
    pub optical_path: f64,
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            direction: Vector3::y(),
            e_s: Vector3::x(),
            e_p: Vector3::zeros(),
            phase_s: 0.0,
            phase_p: 0.0,
            flag: GOOD_FLAG,
            wavenumber: units::wavelength_to_wavenumber(1.0e-10),
            index: 0.0,
            optical_path: 0.0,
        }
    }
}

impl Ray {
    /// Whether the ray is still propagating.
    pub fn is_good(&self) -> bool {
        self.flag > 0.0
    }

    /// Whether the ray has been lost.
    pub fn is_lost(&self) -> bool {
        !self.is_good()
    }

    /// Mark the ray as lost with the given (non-positive) flag value.
    pub fn lose(&mut self, lost_value: f64) {
        self.flag = lost_value;
    }

    /// Photon energy (eV).
    pub fn photon_energy(&self) -> f64 {
        units::wavenumber_to_energy(self.wavenumber)
    }

    /// Wavelength (m).
    pub fn wavelength(&self) -> f64 {
        units::wavenumber_to_wavelength(self.wavenumber)
    }

    /// $|\mathbf{E}_s|^2$.
    pub fn intensity_s(&self) -> f64 {
        self.e_s.norm_squared()
    }

    /// $|\mathbf{E}_p|^2$.
    pub fn intensity_p(&self) -> f64 {
        self.e_p.norm_squared()
    }

    /// Total intensity, equal to the Stokes parameter $S_0$.
    pub fn intensity(&self) -> f64 {
        self.intensity_s() + self.intensity_p()
    }

    /// Stokes parameters $(S_0, S_1, S_2, S_3)$.
    ///
    /// $S_1 = |E_p|^2 - |E_s|^2$, $S_2 = 2|E_s||E_p|\cos(\phi_s - \phi_p)$,
    /// $S_3 = 2|E_s||E_p|\sin(\phi_s - \phi_p)$.
    pub fn stokes(&self) -> [f64; 4] {
        let is = self.intensity_s();
        let ip = self.intensity_p();
        let cross = 2.0 * is.sqrt() * ip.sqrt();
        let delta = self.phase_s - self.phase_p;
        [is + ip, ip - is, cross * delta.cos(), cross * delta.sin()]
    }

    /// Advance the ray by `distance` along its direction in a medium of
    /// refraction index `index`, accumulating optical path.
    pub fn advance(&mut self, distance: f64, index: f64) {
        self.position += self.direction * distance;
        self.optical_path += distance * index;
    }

    /// Multiply both field amplitudes by a real factor.
    pub fn attenuate(&mut self, factor: f64) {
        self.e_s *= factor;
        self.e_p *= factor;
    }
}
