//! The 18-column beam interchange table.
//!
//! Beams are exchanged with other tools as an N×18 array in the fixed
//! order: position (3), direction (3), $E_s$ (3), flag, wavenumber, ray
//! index, optical path, phase s, phase p, $E_p$ (3). Ray indices are written
//! 1-based in the table and stored 0-based in memory.
//!
//! The same table can be written to and read from whitespace-separated text,
//! one ray per line, with `#` comment lines.

use std::fmt::Write as _;
use std::path::Path;

use nalgebra::Vector3;
use ndarray::{Array2, ArrayView2};

use crate::beam::RayBeam;
use crate::error::BeamError;
use crate::ray::Ray;

/// Number of columns in the interchange table.
pub const INTERCHANGE_COLUMNS: usize = 18;

impl Ray {
    /// This ray as one interchange row.
    pub fn to_row(&self) -> [f64; INTERCHANGE_COLUMNS] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.direction.x,
            self.direction.y,
            self.direction.z,
            self.e_s.x,
            self.e_s.y,
            self.e_s.z,
            self.flag,
            self.wavenumber,
            self.index + 1.0,
            self.optical_path,
            self.phase_s,
            self.phase_p,
            self.e_p.x,
            self.e_p.y,
            self.e_p.z,
        ]
    }

    /// Build a ray from one interchange row.
    pub fn from_row(row: &[f64]) -> Result<Self, BeamError> {
        if row.len() != INTERCHANGE_COLUMNS {
            return Err(BeamError::ColumnCount(row.len()));
        }
        Ok(Self {
            position: Vector3::new(row[0], row[1], row[2]),
            direction: Vector3::new(row[3], row[4], row[5]),
            e_s: Vector3::new(row[6], row[7], row[8]),
            flag: row[9],
            wavenumber: row[10],
            index: row[11] - 1.0,
            optical_path: row[12],
            phase_s: row[13],
            phase_p: row[14],
            e_p: Vector3::new(row[15], row[16], row[17]),
        })
    }
}

impl RayBeam {
    /// Export the beam as an N×18 array.
    pub fn to_array(&self) -> Array2<f64> {
        let mut array = Array2::zeros((self.len(), INTERCHANGE_COLUMNS));
        for (mut row, ray) in array.rows_mut().into_iter().zip(self.iter()) {
            for (dst, src) in row.iter_mut().zip(ray.to_row()) {
                *dst = src;
            }
        }
        array
    }

    /// Import a beam from an N×18 array.
    pub fn from_array(array: ArrayView2<'_, f64>) -> Result<Self, BeamError> {
        if array.ncols() != INTERCHANGE_COLUMNS {
            return Err(BeamError::ColumnCount(array.ncols()));
        }
        array
            .rows()
            .into_iter()
            .map(|row| Ray::from_row(&row.to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map(RayBeam::from_rays)
    }

    /// Render the interchange table as text with a `#` header.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# rays: {}", self.len());
        let _ = writeln!(
            out,
            "# x y z xp yp zp es_x es_y es_z flag k_cm index opd phase_s phase_p ep_x ep_y ep_z"
        );
        for ray in self.iter() {
            let row: Vec<String> = ray.to_row().iter().map(|v| format!("{:.15e}", v)).collect();
            let _ = writeln!(out, "{}", row.join(" "));
        }
        out
    }

    /// Parse a table written by [`to_text`](Self::to_text).
    pub fn from_text(content: &str) -> Result<Self, BeamError> {
        let mut rays = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let values = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>().map_err(|e| BeamError::FormatError {
                        line: line_no + 1,
                        message: format!("invalid number '{}': {}", tok, e),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if values.len() != INTERCHANGE_COLUMNS {
                return Err(BeamError::FormatError {
                    line: line_no + 1,
                    message: format!("expected 18 values, found {}", values.len()),
                });
            }
            rays.push(Ray::from_row(&values)?);
        }
        Ok(RayBeam::from_rays(rays))
    }

    /// Write the beam to a text file.
    pub fn write_text_file(&self, path: &Path) -> Result<(), BeamError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Read a beam from a text file.
    pub fn read_text_file(path: &Path) -> Result<Self, BeamError> {
        let content = std::fs::read_to_string(path)?;
        let beam = Self::from_text(&content)?;
        log::debug!("Read {} rays from {}", beam.len(), path.display());
        Ok(beam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_array_layout() {
        let mut beam = RayBeam::pencil(2);
        beam.rays_mut()[1].flag = -4.0;
        beam.rays_mut()[1].optical_path = 12.5;
        let array = beam.to_array();
        assert_eq!(array.dim(), (2, 18));
        assert_eq!(array[[0, 4]], 1.0);
        assert_eq!(array[[0, 6]], 1.0);
        assert_eq!(array[[1, 9]], -4.0);
        assert_eq!(array[[0, 11]], 1.0);
        assert_eq!(array[[1, 11]], 2.0);
        assert_eq!(array[[1, 12]], 12.5);

        let back = RayBeam::from_array(array.view()).unwrap();
        assert_eq!(back, beam);
    }

    #[test]
    fn test_wrong_column_count() {
        let array = Array2::<f64>::zeros((3, 17));
        assert!(matches!(
            RayBeam::from_array(array.view()),
            Err(BeamError::ColumnCount(17))
        ));
    }

    #[test]
    fn test_text_format_errors_report_line() {
        let text = "# header\n1 2 3\n";
        match RayBeam::from_text(text) {
            Err(BeamError::FormatError { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {:?}", other),
        }
    }
}
