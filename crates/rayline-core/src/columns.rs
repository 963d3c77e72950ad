//! Stored and derived per-ray columns, filters and beam statistics.
//!
//! Columns are numbered from 1 at the user boundary. Numbers 1–18 are the
//! stored fields in interchange order; the rest are derived on request.
//!
//! | No. | Column | Unit |
//! |-----|--------|------|
//! | 1–3 | position x, y, z | m |
//! | 4–6 | direction x', y', z' | - |
//! | 7–9 | $E_s$ x, y, z | - |
//! | 10 | flag | - |
//! | 11 | wavenumber | cm⁻¹ |
//! | 12 | ray index | - |
//! | 13 | optical path | m |
//! | 14, 15 | phase s, phase p | rad |
//! | 16–18 | $E_p$ x, y, z | - |
//! | 19 | wavelength | Å |
//! | 20 | $\sqrt{x^2+y^2+z^2}$ | m |
//! | 21 | angle from the y axis | rad |
//! | 22 | $|E|$ | - |
//! | 23 | $|E|^2$ total intensity | - |
//! | 24, 25 | $|E_s|^2$, $|E_p|^2$ | - |
//! | 26 | $|k|$ | Å⁻¹ |
//! | 27–29 | $k \cdot$ direction | Å⁻¹ |
//! | 30–33 | Stokes $S_0$–$S_3$ | - |
//! | 34 | photon energy | eV |

use serde::{Deserialize, Serialize};

use crate::beam::RayBeam;
use crate::error::BeamError;
use crate::ray::Ray;

/// Selection of rays by their good/lost state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RayFilter {
    #[default]
    All,
    Good,
    Lost,
}

impl RayFilter {
    pub fn accepts(self, ray: &Ray) -> bool {
        match self {
            RayFilter::All => true,
            RayFilter::Good => ray.is_good(),
            RayFilter::Lost => ray.is_lost(),
        }
    }
}

/// A stored or derived ray quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    X,
    Y,
    Z,
    DirectionX,
    DirectionY,
    DirectionZ,
    EsX,
    EsY,
    EsZ,
    Flag,
    Wavenumber,
    Index,
    OpticalPath,
    PhaseS,
    PhaseP,
    EpX,
    EpY,
    EpZ,
    WavelengthAngstrom,
    Radius,
    AngleFromY,
    FieldMagnitude,
    Intensity,
    IntensityS,
    IntensityP,
    WavevectorMagnitude,
    WavevectorX,
    WavevectorY,
    WavevectorZ,
    S0,
    S1,
    S2,
    S3,
    PhotonEnergy,
}

const ALL_COLUMNS: [Column; 34] = [
    Column::X,
    Column::Y,
    Column::Z,
    Column::DirectionX,
    Column::DirectionY,
    Column::DirectionZ,
    Column::EsX,
    Column::EsY,
    Column::EsZ,
    Column::Flag,
    Column::Wavenumber,
    Column::Index,
    Column::OpticalPath,
    Column::PhaseS,
    Column::PhaseP,
    Column::EpX,
    Column::EpY,
    Column::EpZ,
    Column::WavelengthAngstrom,
    Column::Radius,
    Column::AngleFromY,
    Column::FieldMagnitude,
    Column::Intensity,
    Column::IntensityS,
    Column::IntensityP,
    Column::WavevectorMagnitude,
    Column::WavevectorX,
    Column::WavevectorY,
    Column::WavevectorZ,
    Column::S0,
    Column::S1,
    Column::S2,
    Column::S3,
    Column::PhotonEnergy,
];

impl Column {
    /// Look up a column by its 1-based number.
    pub fn from_number(number: usize) -> Result<Self, BeamError> {
        number
            .checked_sub(1)
            .and_then(|i| ALL_COLUMNS.get(i).copied())
            .ok_or(BeamError::InvalidColumn(number))
    }

    /// The 1-based number of this column.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    /// Every column in numeric order.
    pub fn all() -> &'static [Column] {
        &ALL_COLUMNS
    }

    /// Whether this column is stored in the interchange table.
    pub fn is_stored(self) -> bool {
        self.number() <= 18
    }

    /// Short human-readable label with unit.
    pub fn label(self) -> &'static str {
        match self {
            Column::X => "x [m]",
            Column::Y => "y [m]",
            Column::Z => "z [m]",
            Column::DirectionX => "x' [rad]",
            Column::DirectionY => "y' [rad]",
            Column::DirectionZ => "z' [rad]",
            Column::EsX => "Es_x",
            Column::EsY => "Es_y",
            Column::EsZ => "Es_z",
            Column::Flag => "flag",
            Column::Wavenumber => "k [cm^-1]",
            Column::Index => "ray index",
            Column::OpticalPath => "optical path [m]",
            Column::PhaseS => "phase s [rad]",
            Column::PhaseP => "phase p [rad]",
            Column::EpX => "Ep_x",
            Column::EpY => "Ep_y",
            Column::EpZ => "Ep_z",
            Column::WavelengthAngstrom => "wavelength [A]",
            Column::Radius => "R [m]",
            Column::AngleFromY => "angle from y [rad]",
            Column::FieldMagnitude => "|E|",
            Column::Intensity => "intensity",
            Column::IntensityS => "intensity s",
            Column::IntensityP => "intensity p",
            Column::WavevectorMagnitude => "|k| [A^-1]",
            Column::WavevectorX => "k_x [A^-1]",
            Column::WavevectorY => "k_y [A^-1]",
            Column::WavevectorZ => "k_z [A^-1]",
            Column::S0 => "S0",
            Column::S1 => "S1",
            Column::S2 => "S2",
            Column::S3 => "S3",
            Column::PhotonEnergy => "photon energy [eV]",
        }
    }

    /// Evaluate this column for one ray.
    pub fn value(self, ray: &Ray) -> f64 {
        // Wavenumber in Å⁻¹.
        let k_angstrom = ray.wavenumber * 1.0e-8;
        match self {
            Column::X => ray.position.x,
            Column::Y => ray.position.y,
            Column::Z => ray.position.z,
            Column::DirectionX => ray.direction.x,
            Column::DirectionY => ray.direction.y,
            Column::DirectionZ => ray.direction.z,
            Column::EsX => ray.e_s.x,
            Column::EsY => ray.e_s.y,
            Column::EsZ => ray.e_s.z,
            Column::Flag => ray.flag,
            Column::Wavenumber => ray.wavenumber,
            Column::Index => ray.index,
            Column::OpticalPath => ray.optical_path,
            Column::PhaseS => ray.phase_s,
            Column::PhaseP => ray.phase_p,
            Column::EpX => ray.e_p.x,
            Column::EpY => ray.e_p.y,
            Column::EpZ => ray.e_p.z,
            Column::WavelengthAngstrom => ray.wavelength() * 1.0e10,
            Column::Radius => ray.position.norm(),
            Column::AngleFromY => ray.direction.y.clamp(-1.0, 1.0).acos(),
            Column::FieldMagnitude => ray.intensity().sqrt(),
            Column::Intensity => ray.intensity(),
            Column::IntensityS => ray.intensity_s(),
            Column::IntensityP => ray.intensity_p(),
            Column::WavevectorMagnitude => k_angstrom,
            Column::WavevectorX => k_angstrom * ray.direction.x,
            Column::WavevectorY => k_angstrom * ray.direction.y,
            Column::WavevectorZ => k_angstrom * ray.direction.z,
            Column::S0 => ray.stokes()[0],
            Column::S1 => ray.stokes()[1],
            Column::S2 => ray.stokes()[2],
            Column::S3 => ray.stokes()[3],
            Column::PhotonEnergy => ray.photon_energy(),
        }
    }
}

/// Aggregate description of a beam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSummary {
    pub total: usize,
    pub good: usize,
    pub lost: usize,
    /// Σ S0 over good rays.
    pub intensity: f64,
    pub intensity_s: f64,
    pub intensity_p: f64,
    /// Intensity-weighted mean photon energy of good rays (eV).
    pub mean_energy: Option<f64>,
    /// Intensity-weighted centroid (x, z) of good rays (m).
    pub centroid: Option<[f64; 2]>,
    /// Intensity-weighted RMS size (x, z) of good rays (m).
    pub rms_size: Option<[f64; 2]>,
}

impl RayBeam {
    /// Values of a column for the rays selected by `filter`, in ray order.
    pub fn get_column(&self, column: Column, filter: RayFilter) -> Vec<f64> {
        self.iter()
            .filter(|r| filter.accepts(r))
            .map(|r| column.value(r))
            .collect()
    }

    /// Same as [`get_column`](Self::get_column) with a 1-based column number.
    pub fn get_column_by_number(&self, number: usize, filter: RayFilter) -> Result<Vec<f64>, BeamError> {
        Ok(self.get_column(Column::from_number(number)?, filter))
    }

    /// Σ S0 over the selected rays.
    pub fn intensity(&self, filter: RayFilter) -> f64 {
        self.iter().filter(|r| filter.accepts(r)).map(Ray::intensity).sum()
    }

    /// Mean of a column, optionally weighted by ray intensity.
    ///
    /// Returns `None` when no rays are selected or the total weight is zero.
    pub fn mean(&self, column: Column, filter: RayFilter, weighted: bool) -> Option<f64> {
        let (sum_w, sum_wx) = self
            .iter()
            .filter(|r| filter.accepts(r))
            .map(|r| (weight(r, weighted), column.value(r)))
            .fold((0.0, 0.0), |(sw, swx), (w, x)| (sw + w, swx + w * x));
        (sum_w > 0.0).then(|| sum_wx / sum_w)
    }

    /// Population standard deviation of a column, optionally weighted by ray
    /// intensity. Returns `None` under the same conditions as [`mean`](Self::mean).
    pub fn standard_deviation(&self, column: Column, filter: RayFilter, weighted: bool) -> Option<f64> {
        let mean = self.mean(column, filter, weighted)?;
        let (sum_w, sum_wd2) = self
            .iter()
            .filter(|r| filter.accepts(r))
            .map(|r| (weight(r, weighted), column.value(r) - mean))
            .fold((0.0, 0.0), |(sw, swd), (w, d)| (sw + w, swd + w * d * d));
        (sum_w > 0.0).then(|| (sum_wd2 / sum_w).sqrt())
    }

    /// Counts, intensities and good-ray moments.
    pub fn summary(&self) -> BeamSummary {
        let good = RayFilter::Good;
        let centroid = self
            .mean(Column::X, good, true)
            .zip(self.mean(Column::Z, good, true))
            .map(|(x, z)| [x, z]);
        let rms_size = self
            .standard_deviation(Column::X, good, true)
            .zip(self.standard_deviation(Column::Z, good, true))
            .map(|(x, z)| [x, z]);
        BeamSummary {
            total: self.len(),
            good: self.good_count(),
            lost: self.lost_count(),
            intensity: self.intensity(good),
            intensity_s: self.get_column(Column::IntensityS, good).iter().sum(),
            intensity_p: self.get_column(Column::IntensityP, good).iter().sum(),
            mean_energy: self.mean(Column::PhotonEnergy, good, true),
            centroid,
            rms_size,
        }
    }
}

fn weight(ray: &Ray, weighted: bool) -> f64 {
    if weighted {
        ray.intensity()
    } else {
        1.0
    }
}
