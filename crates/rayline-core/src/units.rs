//! Physical constants and unit conversions.
//!
//! Rays carry their wavenumber in cm⁻¹ so that beams can be exchanged with
//! tools that use the same convention. Photon energies are in eV and
//! wavelengths in metres everywhere else.

use std::f64::consts::PI;

/// Planck constant times speed of light over elementary charge, $hc/e$ (eV·m).
pub const HC_EV_M: f64 = 1.239_841_984e-6;

/// Wavenumber in cm⁻¹ corresponding to a photon energy of 1 eV.
///
/// $k = 2\pi / \lambda$ with $\lambda$ in cm, i.e. $2\pi / (hc/e \cdot 10^2)$.
pub const A2EV: f64 = 2.0 * PI / (HC_EV_M * 1.0e2);

/// Convert a photon energy (eV) to a wavenumber (cm⁻¹).
pub fn energy_to_wavenumber(energy_ev: f64) -> f64 {
    energy_ev * A2EV
}

/// Convert a wavenumber (cm⁻¹) to a photon energy (eV).
pub fn wavenumber_to_energy(wavenumber: f64) -> f64 {
    wavenumber / A2EV
}

/// Convert a wavenumber (cm⁻¹) to a wavelength (m).
pub fn wavenumber_to_wavelength(wavenumber: f64) -> f64 {
    2.0 * PI / wavenumber * 1.0e-2
}

/// Convert a wavelength (m) to a wavenumber (cm⁻¹).
pub fn wavelength_to_wavenumber(wavelength_m: f64) -> f64 {
    2.0 * PI / (wavelength_m * 1.0e2)
}

/// Convert a photon energy (eV) to a wavelength (m).
pub fn energy_to_wavelength(energy_ev: f64) -> f64 {
    HC_EV_M / energy_ev
}
