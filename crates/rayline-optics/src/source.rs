//! Light sources.
//!
//! Stochastic sampling of synchrotron sources lives outside this crate; any
//! generator can feed a beamline by implementing [`LightSource`].
//! [`PointSource`] is a deterministic source for alignment and tests.

use nalgebra::Vector3;

use rayline_core::{Ray, RayBeam, GOOD_FLAG};
use rayline_core::units;

use crate::error::TraceError;

/// Produces the beam that enters the first element.
pub trait LightSource: Send + Sync {
    fn get_beam(&self) -> Result<RayBeam, TraceError>;
}

/// A point emitting a rectangular grid of directions around +y.
///
/// Directions are spaced uniformly in angle over the full divergences; a
/// single sample along an axis sits on the axis. The electric field is split
/// between s (along x) and p (along z) according to the polarization degree
/// $P = |E_s| / (|E_s| + |E_p|)$, normalised to unit intensity per ray.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSource {
    /// Samples across x.
    pub nx: usize,
    /// Samples across z.
    pub nz: usize,
    /// Full horizontal divergence (rad).
    pub divergence_x: f64,
    /// Full vertical divergence (rad).
    pub divergence_z: f64,
    /// Photon energy (eV).
    pub photon_energy: f64,
    pub polarization_degree: f64,
    /// Phase of p relative to s (rad).
    pub phase_difference: f64,
}

impl Default for PointSource {
    fn default() -> Self {
        Self {
            nx: 1,
            nz: 1,
            divergence_x: 0.0,
            divergence_z: 0.0,
            photon_energy: 1000.0,
            polarization_degree: 1.0,
            phase_difference: 0.0,
        }
    }
}

fn grid(n: usize, full_width: f64) -> Vec<f64> {
    if n == 1 {
        return vec![0.0];
    }
    (0..n)
        .map(|i| -0.5 * full_width + full_width * i as f64 / (n - 1) as f64)
        .collect()
}

impl PointSource {
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.nx == 0 || self.nz == 0 {
            return Err(TraceError::Configuration("point source needs at least one ray".into()));
        }
        if !(self.photon_energy > 0.0) {
            return Err(TraceError::Configuration(format!(
                "photon energy must be positive, got {}",
                self.photon_energy
            )));
        }
        if !(0.0..=1.0).contains(&self.polarization_degree) {
            return Err(TraceError::Configuration(format!(
                "polarization degree must lie in [0, 1], got {}",
                self.polarization_degree
            )));
        }
        if !(self.divergence_x >= 0.0 && self.divergence_z >= 0.0) {
            return Err(TraceError::Configuration("divergences must be non-negative".into()));
        }
        Ok(())
    }

    pub fn ray_count(&self) -> usize {
        self.nx * self.nz
    }
}

impl LightSource for PointSource {
    fn get_beam(&self) -> Result<RayBeam, TraceError> {
        self.validate()?;
        let p = self.polarization_degree;
        let norm = (p * p + (1.0 - p) * (1.0 - p)).sqrt();
        let (amp_s, amp_p) = (p / norm, (1.0 - p) / norm);
        let wavenumber = units::energy_to_wavenumber(self.photon_energy);

        let xs = grid(self.nx, self.divergence_x);
        let zs = grid(self.nz, self.divergence_z);
        let beam: RayBeam = xs
            .iter()
            .flat_map(|&ax| zs.iter().map(move |&az| (ax, az)))
            .enumerate()
            .map(|(i, (ax, az))| {
                let direction = Vector3::new(ax.tan(), 1.0, az.tan()).normalize();
                // s along x and p along z for the central ray.
                let e_s = direction.cross(&Vector3::z()).normalize();
                let e_p = e_s.cross(&direction);
                Ray {
                    position: Vector3::zeros(),
                    direction,
                    e_s: e_s * amp_s,
                    e_p: e_p * amp_p,
                    phase_s: 0.0,
                    phase_p: self.phase_difference,
                    flag: GOOD_FLAG,
                    wavenumber,
                    index: i as f64,
                    optical_path: 0.0,
                }
            })
            .collect();
        log::debug!(
            "Point source: {} rays at {} eV",
            beam.len(),
            self.photon_energy
        );
        Ok(beam)
    }
}
