//! User-supplied reflectivity tables.
//!
//! Tables are whitespace-separated text columns; lines starting with `#` are
//! comments. Angles are given in milliradians and converted to radians on
//! load, energies in eV.
//!
//! - 1D tables: `x R` or `x Rs Rp`, where `x` is a grazing angle or a
//!   photon energy ([`CurveAxis`]). Linear interpolation, clamped at the ends.
//! - 2D tables: `E θ R` or `E θ Rs Rp`, one line per grid point, rows grouped
//!   by energy with the same angles in every group. Interpolated linearly or
//!   bicubically ([`Interpolation`]), clamped at the edges.
//!
//! Tabulated values are power reflectivities.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::provider::MaterialError;
use crate::spline::{CubicSpline, SplineBasis};

/// What the abscissa of a 1D table is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveAxis {
    /// Grazing angle, stored in mrad in the file.
    GrazingAngle,
    /// Photon energy in eV.
    PhotonEnergy,
}

/// Interpolation scheme for 2D tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    Bicubic,
}

/// Read numeric rows, skipping blank lines and comments.
fn read_rows(content: &str, widths: &[usize]) -> Result<Vec<Vec<f64>>, MaterialError> {
    let mut rows = Vec::new();
    let mut width = None;
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|tok| tok.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MaterialError::FormatError {
                line: idx + 1,
                message: e.to_string(),
            })?;
        let expected = *width.get_or_insert(values.len());
        if values.len() != expected || !widths.contains(&values.len()) {
            return Err(MaterialError::FormatError {
                line: idx + 1,
                message: format!("expected {:?} columns, found {}", widths, values.len()),
            });
        }
        rows.push(values);
    }
    if rows.len() < 2 {
        return Err(MaterialError::DataError("table needs at least 2 rows".into()));
    }
    Ok(rows)
}

fn linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs.partition_point(|v| *v <= x).saturating_sub(1).min(n - 2);
    let frac = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + (ys[i + 1] - ys[i]) * frac
}

fn check_increasing(values: &[f64], what: &str) -> Result<(), MaterialError> {
    if values.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(MaterialError::DataError(format!(
            "{} values must be strictly monotonic",
            what
        )));
    }
    Ok(())
}

/// Reflectivity versus one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectivityCurve {
    axis: CurveAxis,
    x: Vec<f64>,
    rs: Vec<f64>,
    rp: Vec<f64>,
}

impl ReflectivityCurve {
    /// Build a curve from samples; `x` in radians or eV.
    pub fn new(axis: CurveAxis, x: Vec<f64>, rs: Vec<f64>, rp: Vec<f64>) -> Result<Self, MaterialError> {
        if x.len() != rs.len() || x.len() != rp.len() {
            return Err(MaterialError::DataError("curve columns differ in length".into()));
        }
        let (x, rs, rp) = if x.len() > 1 && x[0] > x[x.len() - 1] {
            let rev = |v: Vec<f64>| v.into_iter().rev().collect::<Vec<_>>();
            (rev(x), rev(rs), rev(rp))
        } else {
            (x, rs, rp)
        };
        check_increasing(&x, "table abscissa")?;
        Ok(Self { axis, x, rs, rp })
    }

    pub fn parse(axis: CurveAxis, content: &str) -> Result<Self, MaterialError> {
        let rows = read_rows(content, &[2, 3])?;
        let scale = match axis {
            CurveAxis::GrazingAngle => 1.0e-3,
            CurveAxis::PhotonEnergy => 1.0,
        };
        let x = rows.iter().map(|r| r[0] * scale).collect();
        let rs: Vec<f64> = rows.iter().map(|r| r[1]).collect();
        let rp = rows.iter().map(|r| *r.get(2).unwrap_or(&r[1])).collect();
        Self::new(axis, x, rs, rp)
    }

    pub fn from_file(axis: CurveAxis, path: &Path) -> Result<Self, MaterialError> {
        let content = std::fs::read_to_string(path)?;
        let curve = Self::parse(axis, &content)?;
        log::debug!("Loaded {:?} reflectivity curve {} ({} points)", axis, path.display(), curve.x.len());
        Ok(curve)
    }

    pub fn axis(&self) -> CurveAxis {
        self.axis
    }

    /// Power reflectivities $(R_s, R_p)$ at `x` (rad or eV).
    pub fn evaluate(&self, x: f64) -> (f64, f64) {
        (linear(&self.x, &self.rs, x), linear(&self.x, &self.rp, x))
    }
}

/// Reflectivity on an energy × angle grid.
#[derive(Debug, Clone)]
pub struct ReflectivityMap {
    energies: Vec<f64>,
    angles: Vec<f64>,
    /// Rows indexed by energy, each sampled at `angles`.
    rs: Vec<Vec<f64>>,
    rp: Vec<Vec<f64>>,
    interpolation: Interpolation,
    splines: Option<BicubicGrid>,
}

/// Angle splines per energy row, combined across energy through a fixed
/// spline basis.
#[derive(Debug, Clone)]
struct BicubicGrid {
    rs: Vec<CubicSpline>,
    rp: Vec<CubicSpline>,
    across: SplineBasis,
}

impl ReflectivityMap {
    /// Build a map from grid axes (eV, rad) and `energies × angles` rows.
    pub fn new(
        energies: Vec<f64>,
        angles: Vec<f64>,
        rs: Vec<Vec<f64>>,
        rp: Vec<Vec<f64>>,
        interpolation: Interpolation,
    ) -> Result<Self, MaterialError> {
        check_increasing(&energies, "energy")?;
        check_increasing(&angles, "angle")?;
        if energies.len() < 2 || angles.len() < 2 {
            return Err(MaterialError::DataError(
                "2D table needs at least 2 energies and 2 angles".into(),
            ));
        }
        let shape_ok = |grid: &[Vec<f64>]| {
            grid.len() == energies.len() && grid.iter().all(|row| row.len() == angles.len())
        };
        if !shape_ok(&rs) || !shape_ok(&rp) {
            return Err(MaterialError::DataError(format!(
                "reflectivity grid does not match {} energies x {} angles",
                energies.len(),
                angles.len()
            )));
        }

        let splines = match interpolation {
            Interpolation::Linear => None,
            Interpolation::Bicubic => {
                let build = |grid: &[Vec<f64>]| {
                    grid.iter()
                        .map(|row| CubicSpline::new(angles.clone(), row.clone()))
                        .collect::<Result<Vec<_>, _>>()
                };
                Some(BicubicGrid {
                    rs: build(&rs)?,
                    rp: build(&rp)?,
                    across: SplineBasis::new(energies.clone())?,
                })
            }
        };
        Ok(Self {
            energies,
            angles,
            rs,
            rp,
            interpolation,
            splines,
        })
    }

    pub fn parse(content: &str, interpolation: Interpolation) -> Result<Self, MaterialError> {
        let rows = read_rows(content, &[3, 4])?;

        let mut energies: Vec<f64> = Vec::new();
        let mut groups: Vec<Vec<&Vec<f64>>> = Vec::new();
        for row in &rows {
            match energies.last() {
                Some(&e) if e == row[0] => {
                    if let Some(group) = groups.last_mut() {
                        group.push(row);
                    }
                }
                _ => {
                    energies.push(row[0]);
                    groups.push(vec![row]);
                }
            }
        }

        let angles: Vec<f64> = groups[0].iter().map(|r| r[1] * 1.0e-3).collect();
        for (e, group) in energies.iter().zip(&groups) {
            let same = group.len() == angles.len()
                && group
                    .iter()
                    .zip(&angles)
                    .all(|(r, a)| (r[1] * 1.0e-3 - a).abs() <= 1e-12 * a.abs().max(1.0));
            if !same {
                return Err(MaterialError::DataError(format!(
                    "angle grid at {} eV differs from the first energy",
                    e
                )));
            }
        }

        let rs = groups.iter().map(|g| g.iter().map(|r| r[2]).collect()).collect();
        let rp = groups
            .iter()
            .map(|g| g.iter().map(|r| *r.get(3).unwrap_or(&r[2])).collect())
            .collect();
        Self::new(energies, angles, rs, rp, interpolation)
    }

    pub fn from_file(path: &Path, interpolation: Interpolation) -> Result<Self, MaterialError> {
        let content = std::fs::read_to_string(path)?;
        let map = Self::parse(&content, interpolation)?;
        log::debug!(
            "Loaded reflectivity map {} ({} energies x {} angles)",
            path.display(),
            map.energies.len(),
            map.angles.len()
        );
        Ok(map)
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Power reflectivities $(R_s, R_p)$ at a photon energy (eV) and grazing
    /// angle (rad).
    pub fn evaluate(&self, photon_energy: f64, grazing_angle: f64) -> (f64, f64) {
        match &self.splines {
            None => (
                self.bilinear(&self.rs, photon_energy, grazing_angle),
                self.bilinear(&self.rp, photon_energy, grazing_angle),
            ),
            Some(cubic) => (
                cubic.across.interpolate(photon_energy, |j| cubic.rs[j].evaluate(grazing_angle)),
                cubic.across.interpolate(photon_energy, |j| cubic.rp[j].evaluate(grazing_angle)),
            ),
        }
    }

    fn bilinear(&self, grid: &[Vec<f64>], energy: f64, angle: f64) -> f64 {
        let column: Vec<f64> = grid.iter().map(|row| linear(&self.angles, row, angle)).collect();
        linear(&self.energies, &column, energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_angle_curve_in_mrad() {
        let curve = ReflectivityCurve::parse(
            CurveAxis::GrazingAngle,
            "# angle[mrad] R\n1.0 0.9\n3.0 0.7\n5.0 0.1\n",
        )
        .unwrap();
        let (rs, rp) = curve.evaluate(2.0e-3);
        assert_abs_diff_eq!(rs, 0.8, epsilon = 1e-12);
        assert_eq!(rs, rp);
        assert_abs_diff_eq!(curve.evaluate(0.0).0, 0.9, epsilon = 1e-15);
        assert_abs_diff_eq!(curve.evaluate(1.0).0, 0.1, epsilon = 1e-15);
    }

    #[test]
    fn test_descending_energy_curve_with_polarizations() {
        let curve =
            ReflectivityCurve::parse(CurveAxis::PhotonEnergy, "2000 0.2 0.1\n1000 0.6 0.5\n").unwrap();
        let (rs, rp) = curve.evaluate(1500.0);
        assert_abs_diff_eq!(rs, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(rp, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_curve() {
        let err = ReflectivityCurve::parse(CurveAxis::PhotonEnergy, "1 0.5\n2 x\n").unwrap_err();
        assert!(matches!(err, MaterialError::FormatError { line: 2, .. }));
        let err = ReflectivityCurve::parse(CurveAxis::PhotonEnergy, "1 0.5\n2 0.4 0.3\n").unwrap_err();
        assert!(matches!(err, MaterialError::FormatError { line: 2, .. }));
        assert!(ReflectivityCurve::parse(CurveAxis::PhotonEnergy, "1 0.5\n").is_err());
    }

    fn plane_table() -> String {
        // R = 0.5 - 1e-5 E/eV + 10 theta/rad, linear in both variables.
        let mut text = String::from("# E theta R\n");
        for e in [1000.0, 2000.0, 3000.0, 4000.0] {
            for theta_mrad in [1.0, 2.0, 4.0, 8.0] {
                let r = 0.5 - 1e-5 * e + 10.0 * theta_mrad * 1e-3;
                text.push_str(&format!("{} {} {}\n", e, theta_mrad, r));
            }
        }
        text
    }

    #[test]
    fn test_map_linear_and_bicubic_agree_on_plane() {
        let text = plane_table();
        let expected = 0.5 - 1e-5 * 2500.0 + 10.0 * 3e-3;
        for interpolation in [Interpolation::Linear, Interpolation::Bicubic] {
            let map = ReflectivityMap::parse(&text, interpolation).unwrap();
            let (rs, rp) = map.evaluate(2500.0, 3e-3);
            assert_abs_diff_eq!(rs, expected, epsilon = 1e-9);
            assert_eq!(rs, rp);
        }
    }

    #[test]
    fn test_bicubic_map_hits_knots() {
        let energies = vec![1000.0, 1500.0, 2500.0, 4000.0];
        let angles = vec![1e-3, 2e-3, 4e-3];
        let value = |e: f64, a: f64| (-(e / 3000.0).powi(2)).exp() * (1.0 - 50.0 * a);
        let grid: Vec<Vec<f64>> = energies
            .iter()
            .map(|&e| angles.iter().map(|&a| value(e, a)).collect())
            .collect();
        let map = ReflectivityMap::new(energies.clone(), angles.clone(), grid.clone(), grid, Interpolation::Bicubic)
            .unwrap();
        for &e in &energies {
            for &a in &angles {
                assert_abs_diff_eq!(map.evaluate(e, a).0, value(e, a), epsilon = 1e-12);
            }
        }
        let (mid, _) = map.evaluate(2000.0, 3e-3);
        assert!(mid.is_finite() && (mid - value(2000.0, 3e-3)).abs() < 0.02);
    }

    #[test]
    fn test_map_clamps_outside_grid() {
        let map = ReflectivityMap::parse(&plane_table(), Interpolation::Bicubic).unwrap();
        let (corner, _) = map.evaluate(100.0, 0.0);
        assert_abs_diff_eq!(corner, 0.5 - 1e-5 * 1000.0 + 10.0 * 1e-3, epsilon = 1e-9);
    }

    #[test]
    fn test_map_shape_mismatch() {
        let text = "1000 1 0.9\n1000 2 0.8\n2000 1 0.7\n";
        assert!(matches!(
            ReflectivityMap::parse(text, Interpolation::Linear),
            Err(MaterialError::DataError(_))
        ));
    }

    #[test]
    fn test_map_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.dat");
        std::fs::write(&path, plane_table()).unwrap();
        let map = ReflectivityMap::from_file(&path, Interpolation::Linear).unwrap();
        assert_eq!(map.interpolation(), Interpolation::Linear);
        assert!(ReflectivityMap::from_file(&dir.path().join("none.dat"), Interpolation::Linear).is_err());
    }
}
