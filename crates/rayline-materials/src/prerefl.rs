//! PreRefl optical-constant tables.
//!
//! A PreRefl file tabulates $\alpha = 2\delta$ and $\gamma = 2\beta$ of one
//! material on a regular wavenumber grid. It is a stream of numbers:
//!
//! ```text
//! QMIN QMAX QSTEP DEPTH0
//! NREFL
//! ZF1[0] ... ZF1[NREFL-1]     (alpha)
//! ZF2[0] ... ZF2[NREFL-1]     (gamma)
//! ```
//!
//! Wavenumbers are in cm⁻¹. Line breaks carry no meaning. Values between
//! grid points are interpolated linearly; queries outside the grid are
//! clamped to the first or last point.

use std::fmt::Write as _;
use std::path::Path;

use num_complex::Complex64;

use rayline_core::units;

use crate::provider::{MaterialError, OpticalConstants};

/// A parsed PreRefl table.
#[derive(Debug, Clone, PartialEq)]
pub struct PreReflTable {
    name: String,
    qmin: f64,
    qmax: f64,
    qstep: f64,
    depth0: f64,
    alpha: Vec<f64>,
    gamma: Vec<f64>,
}

impl PreReflTable {
    /// Parse a table from file content.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self, MaterialError> {
        let mut tokens = content
            .lines()
            .enumerate()
            .flat_map(|(idx, line)| line.split_whitespace().map(move |tok| (idx + 1, tok)));
        let mut last_line = 1;
        let mut next = |what: &str| -> Result<f64, MaterialError> {
            let (line, tok) = tokens.next().ok_or_else(|| MaterialError::FormatError {
                line: last_line,
                message: format!("unexpected end of file while reading {}", what),
            })?;
            last_line = line;
            // Fortran-written files may use D exponents.
            tok.replace(['D', 'd'], "e")
                .parse::<f64>()
                .map_err(|_| MaterialError::FormatError {
                    line,
                    message: format!("invalid {}: '{}'", what, tok),
                })
        };

        let qmin = next("QMIN")?;
        let qmax = next("QMAX")?;
        let qstep = next("QSTEP")?;
        let depth0 = next("DEPTH0")?;
        let nrefl = next("NREFL")?;
        if nrefl < 2.0 || nrefl.fract() != 0.0 {
            return Err(MaterialError::DataError(format!(
                "NREFL must be an integer >= 2, got {}",
                nrefl
            )));
        }
        let nrefl = nrefl as usize;
        let alpha = (0..nrefl).map(|_| next("ZF1")).collect::<Result<Vec<_>, _>>()?;
        let gamma = (0..nrefl).map(|_| next("ZF2")).collect::<Result<Vec<_>, _>>()?;

        Self::new(name, qmin, qmax, qstep, depth0, alpha, gamma)
    }

    /// Read a table from a file; the file stem becomes the material name.
    pub fn from_file(path: &Path) -> Result<Self, MaterialError> {
        let content = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "prerefl".into());
        let table = Self::parse(name, &content)?;
        log::debug!(
            "Loaded PreRefl table {} ({} points, {:.1}-{:.1} eV)",
            path.display(),
            table.alpha.len(),
            table.energy_range().0,
            table.energy_range().1
        );
        Ok(table)
    }

    fn new(
        name: impl Into<String>,
        qmin: f64,
        qmax: f64,
        qstep: f64,
        depth0: f64,
        alpha: Vec<f64>,
        gamma: Vec<f64>,
    ) -> Result<Self, MaterialError> {
        if !(qstep > 0.0) || !(qmax > qmin) {
            return Err(MaterialError::DataError(format!(
                "invalid wavenumber grid: QMIN {} QMAX {} QSTEP {}",
                qmin, qmax, qstep
            )));
        }
        if alpha.len() != gamma.len() {
            return Err(MaterialError::DataError("ZF1 and ZF2 lengths differ".into()));
        }
        Ok(Self {
            name: name.into(),
            qmin,
            qmax,
            qstep,
            depth0,
            alpha,
            gamma,
        })
    }

    /// Tabulate another material on a regular energy grid.
    pub fn tabulate(
        constants: &dyn OpticalConstants,
        energy_min: f64,
        energy_max: f64,
        energy_step: f64,
    ) -> Result<Self, MaterialError> {
        if !(energy_step > 0.0) || !(energy_max > energy_min) || !(energy_min > 0.0) {
            return Err(MaterialError::DataError(format!(
                "invalid energy grid [{}, {}] step {}",
                energy_min, energy_max, energy_step
            )));
        }
        let qmin = units::energy_to_wavenumber(energy_min);
        let qstep = units::energy_to_wavenumber(energy_step);
        let count = ((energy_max - energy_min) / energy_step).floor() as usize + 1;
        let mut alpha = Vec::with_capacity(count);
        let mut gamma = Vec::with_capacity(count);
        for i in 0..count {
            let n = constants.refraction_index(energy_min + i as f64 * energy_step)?;
            alpha.push(2.0 * (1.0 - n.re));
            gamma.push(2.0 * n.im);
        }
        let qmax = qmin + (count - 1) as f64 * qstep;
        Self::new(constants.name(), qmin, qmax.max(qmin + qstep), qstep, 0.0, alpha, gamma)
    }

    /// Render in PreRefl format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:e} {:e} {:e} {:e}", self.qmin, self.qmax, self.qstep, self.depth0);
        let _ = writeln!(out, "{}", self.alpha.len());
        for v in self.alpha.iter().chain(&self.gamma) {
            let _ = writeln!(out, "{:e}", v);
        }
        out
    }

    /// Photon-energy range covered by the grid (eV).
    pub fn energy_range(&self) -> (f64, f64) {
        let last = self.qmin + (self.alpha.len() - 1) as f64 * self.qstep;
        (units::wavenumber_to_energy(self.qmin), units::wavenumber_to_energy(last))
    }

    /// Interpolated $(\alpha, \gamma)$ at a wavenumber (cm⁻¹).
    fn interpolate(&self, wavenumber: f64) -> (f64, f64) {
        let last = self.alpha.len() - 1;
        let pos = ((wavenumber - self.qmin) / self.qstep).clamp(0.0, last as f64);
        let i = (pos.floor() as usize).min(last - 1);
        let frac = pos - i as f64;
        let lerp = |v: &[f64]| v[i] + (v[i + 1] - v[i]) * frac;
        (lerp(&self.alpha), lerp(&self.gamma))
    }
}

impl OpticalConstants for PreReflTable {
    fn name(&self) -> &str {
        &self.name
    }

    /// $n = (1 - \alpha/2) + i\gamma/2$.
    fn refraction_index(&self, photon_energy: f64) -> Result<Complex64, MaterialError> {
        let (alpha, gamma) = self.interpolate(units::energy_to_wavenumber(photon_energy));
        Ok(Complex64::new(1.0 - 0.5 * alpha, 0.5 * gamma))
    }

    /// $\mu = \gamma k$, converted from cm⁻¹ to m⁻¹.
    fn attenuation_coefficient(&self, photon_energy: f64) -> Result<f64, MaterialError> {
        let k = units::energy_to_wavenumber(photon_energy);
        let (_, gamma) = self.interpolate(k);
        Ok(gamma * k * 1.0e2)
    }
}
