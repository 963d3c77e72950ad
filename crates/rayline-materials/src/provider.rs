//! Optical-constant provider trait.
//!
//! All sources of refraction indices implement [`OpticalConstants`], which
//! returns the energy-dependent complex index $n = 1 - \delta + i\beta$ and
//! the matching intensity attenuation coefficient. Atomic-scattering-factor
//! databases plug in through the same trait.

use std::f64::consts::PI;
use std::fmt;

use num_complex::Complex64;
use thiserror::Error;

use rayline_core::units;

/// Errors from optical-constant providers and reflectivity tables.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Photon energy {energy_ev} eV is outside the data range [{min}, {max}] eV")]
    OutOfRange { energy_ev: f64, min: f64, max: f64 },

    #[error("Material not found: {0}")]
    NotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Failed to read table: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },
}

/// Provides energy-dependent complex refraction indices.
///
/// An error for a given energy is a per-ray failure: tracers lose the ray
/// that asked and carry on with the rest of the beam.
pub trait OpticalConstants: Send + Sync + fmt::Debug {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Complex refraction index $n = 1 - \delta + i\beta$ at a photon energy (eV).
    fn refraction_index(&self, photon_energy: f64) -> Result<Complex64, MaterialError>;

    /// Intensity attenuation coefficient $\mu$ (m⁻¹) at a photon energy (eV).
    ///
    /// Default implementation: $\mu = 4\pi\beta/\lambda$.
    fn attenuation_coefficient(&self, photon_energy: f64) -> Result<f64, MaterialError> {
        let n = self.refraction_index(photon_energy)?;
        Ok(4.0 * PI * n.im / units::energy_to_wavelength(photon_energy))
    }
}

/// A material with the same refraction index at every energy.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantIndex {
    name: String,
    index: Complex64,
    attenuation: Option<f64>,
}

impl ConstantIndex {
    /// Material with index $1 - \delta + i\beta$.
    pub fn new(name: impl Into<String>, delta: f64, beta: f64) -> Self {
        Self::from_index(name, Complex64::new(1.0 - delta, beta))
    }

    pub fn from_index(name: impl Into<String>, index: Complex64) -> Self {
        Self {
            name: name.into(),
            index,
            attenuation: None,
        }
    }

    /// Vacuum, n = 1.
    pub fn vacuum() -> Self {
        Self::from_index("vacuum", Complex64::new(1.0, 0.0))
    }

    /// Override the attenuation coefficient (m⁻¹) instead of deriving it
    /// from the imaginary part of the index.
    pub fn with_attenuation(mut self, attenuation: f64) -> Self {
        self.attenuation = Some(attenuation);
        self
    }
}

impl OpticalConstants for ConstantIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn refraction_index(&self, _photon_energy: f64) -> Result<Complex64, MaterialError> {
        Ok(self.index)
    }

    fn attenuation_coefficient(&self, photon_energy: f64) -> Result<f64, MaterialError> {
        match self.attenuation {
            Some(mu) => Ok(mu),
            None => Ok(4.0 * PI * self.index.im / units::energy_to_wavelength(photon_energy)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_index() {
        let si = ConstantIndex::new("Si", 7.5772e-6, 1.7476e-7);
        let n = si.refraction_index(8000.0).unwrap();
        assert_relative_eq!(n.re, 1.0 - 7.5772e-6);
        assert_relative_eq!(n.im, 1.7476e-7);
        // mu = 4 pi beta / lambda; lambda = 1.5498 A at 8 keV.
        let mu = si.attenuation_coefficient(8000.0).unwrap();
        assert_relative_eq!(mu, 4.0 * PI * 1.7476e-7 / 1.549_802_48e-10, max_relative = 1e-8);
    }

    #[test]
    fn test_attenuation_override() {
        let lens = ConstantIndex::vacuum().with_attenuation(120.0);
        assert_eq!(lens.attenuation_coefficient(1000.0).unwrap(), 120.0);
        assert_eq!(lens.name(), "vacuum");
    }
}
