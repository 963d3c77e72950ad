//! Numerical height-map surfaces.
//!
//! A mesh samples the surface height $h(x, y)$ on a rectangular grid.
//! Heights between samples are interpolated bilinearly and intersections are
//! found by Newton iteration on $z(t) - h(x(t), y(t))$. Rays that leave the
//! grid miss the surface.
//!
//! Meshes are read from presurface text files:
//! ```text
//! <nx> <ny>
//! <y_1> ... <y_ny>
//! <x_1> <z_11> ... <z_1ny>
//! ...
//! <x_nx> <z_nx1> ... <z_nxny>
//! ```
//! Values may be split across lines freely; coordinates are in metres.

use std::path::Path;

use nalgebra::Vector3;
use ndarray::Array2;

use crate::error::GeometryError;
use crate::surface::SurfaceModel;

const MAX_ITERATIONS: usize = 100;

/// A tabulated surface height map.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMesh {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Heights indexed `[ix, iy]`.
    z: Array2<f64>,
}

impl HeightMesh {
    /// Create a mesh from sample axes and an `nx × ny` height array.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Array2<f64>) -> Result<Self, GeometryError> {
        check_axis("x", &x)?;
        check_axis("y", &y)?;
        if z.dim() != (x.len(), y.len()) {
            return Err(GeometryError::InvalidSurface(format!(
                "height array is {:?}, expected ({}, {})",
                z.dim(),
                x.len(),
                y.len()
            )));
        }
        if z.iter().any(|h| !h.is_finite()) {
            return Err(GeometryError::InvalidSurface("mesh heights must be finite".into()));
        }
        Ok(Self { x, y, z })
    }

    /// Create a mesh from one row of heights per x sample.
    pub fn from_rows(x: Vec<f64>, y: Vec<f64>, rows: &[Vec<f64>]) -> Result<Self, GeometryError> {
        if rows.len() != x.len() || rows.iter().any(|r| r.len() != y.len()) {
            return Err(GeometryError::InvalidSurface(format!(
                "expected {} rows of {} heights",
                x.len(),
                y.len()
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let z = Array2::from_shape_vec((x.len(), y.len()), flat)
            .map_err(|e| GeometryError::InvalidSurface(e.to_string()))?;
        Self::new(x, y, z)
    }

    /// Sample a height function on a regular grid.
    pub fn from_function<F: Fn(f64, f64) -> f64>(
        x: Vec<f64>,
        y: Vec<f64>,
        height: F,
    ) -> Result<Self, GeometryError> {
        let z = Array2::from_shape_fn((x.len(), y.len()), |(i, j)| height(x[i], y[j]));
        Self::new(x, y, z)
    }

    /// Load a mesh from a presurface text file.
    pub fn from_file(path: &Path) -> Result<Self, GeometryError> {
        let content = std::fs::read_to_string(path)?;
        let mesh = parse_presurface(&content)?;
        log::debug!(
            "Loaded {}x{} height mesh from {}",
            mesh.x.len(),
            mesh.y.len(),
            path.display()
        );
        Ok(mesh)
    }

    /// Bilinear height and slopes $(h, \partial h/\partial x, \partial h/\partial y)$,
    /// or `None` outside the grid.
    pub fn height(&self, x: f64, y: f64) -> Option<(f64, f64, f64)> {
        let i = cell(&self.x, x)?;
        let j = cell(&self.y, y)?;
        let dx = self.x[i + 1] - self.x[i];
        let dy = self.y[j + 1] - self.y[j];
        let u = (x - self.x[i]) / dx;
        let v = (y - self.y[j]) / dy;
        let z00 = self.z[[i, j]];
        let z10 = self.z[[i + 1, j]];
        let z01 = self.z[[i, j + 1]];
        let z11 = self.z[[i + 1, j + 1]];
        let h = z00 * (1.0 - u) * (1.0 - v) + z10 * u * (1.0 - v) + z01 * (1.0 - u) * v + z11 * u * v;
        let hx = ((1.0 - v) * (z10 - z00) + v * (z11 - z01)) / dx;
        let hy = ((1.0 - u) * (z01 - z00) + u * (z11 - z10)) / dy;
        Some((h, hx, hy))
    }
}

fn check_axis(name: &str, values: &[f64]) -> Result<(), GeometryError> {
    if values.len() < 2 {
        return Err(GeometryError::InvalidSurface(format!(
            "mesh {} axis needs at least 2 samples",
            name
        )));
    }
    if values.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(GeometryError::InvalidSurface(format!(
            "mesh {} axis must be strictly increasing",
            name
        )));
    }
    Ok(())
}

/// Index of the grid cell containing `value`, or `None` outside the axis.
fn cell(axis: &[f64], value: f64) -> Option<usize> {
    let n = axis.len();
    if !(value >= axis[0] && value <= axis[n - 1]) {
        return None;
    }
    let upper = axis.partition_point(|a| *a <= value);
    Some(upper.saturating_sub(1).min(n - 2))
}

/// Parse a presurface text file.
pub fn parse_presurface(content: &str) -> Result<HeightMesh, GeometryError> {
    let mut tokens = content.lines().enumerate().flat_map(|(idx, line)| {
        line.split_whitespace().map(move |tok| (idx + 1, tok))
    });
    let mut last_line = 1;
    let mut next_value = |what: &str| -> Result<f64, GeometryError> {
        let (line, tok) = tokens.next().ok_or_else(|| GeometryError::FormatError {
            line: last_line,
            message: format!("unexpected end of file while reading {}", what),
        })?;
        last_line = line;
        tok.parse::<f64>().map_err(|_| GeometryError::FormatError {
            line,
            message: format!("invalid {}: '{}'", what, tok),
        })
    };

    let nx = next_value("nx")?;
    let ny = next_value("ny")?;
    if nx < 2.0 || ny < 2.0 || nx.fract() != 0.0 || ny.fract() != 0.0 {
        return Err(GeometryError::FormatError {
            line: 1,
            message: format!("grid size must be two integers >= 2, got {} {}", nx, ny),
        });
    }
    let (nx, ny) = (nx as usize, ny as usize);
    let available = content.split_whitespace().count().saturating_sub(2);
    let required = ny
        .checked_add(1)
        .and_then(|n| n.checked_mul(nx))
        .and_then(|n| n.checked_add(ny));
    if required.map_or(true, |n| n > available) {
        return Err(GeometryError::FormatError {
            line: 1,
            message: format!(
                "a {} x {} grid needs more values than the {} in the file",
                nx, ny, available
            ),
        });
    }

    let y = (0..ny).map(|_| next_value("y value")).collect::<Result<Vec<_>, _>>()?;
    let mut x = Vec::with_capacity(nx);
    let mut z = Array2::zeros((nx, ny));
    for i in 0..nx {
        x.push(next_value("x value")?);
        for j in 0..ny {
            z[[i, j]] = next_value("height")?;
        }
    }
    HeightMesh::new(x, y, z)
}

impl SurfaceModel for HeightMesh {
    fn name(&self) -> &'static str {
        "numerical_mesh"
    }

    fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        let mut t = if direction.z.abs() > f64::EPSILON {
            -origin.z / direction.z
        } else {
            0.0
        };
        for _ in 0..MAX_ITERATIONS {
            let p = origin + direction * t;
            let (h, hx, hy) = self.height(p.x, p.y)?;
            let g = p.z - h;
            let slope = direction.z - hx * direction.x - hy * direction.y;
            if slope == 0.0 {
                return None;
            }
            let step = g / slope;
            t -= step;
            if step.abs() <= 1e-12 * t.abs().max(1.0) {
                let p = origin + direction * t;
                return self.height(p.x, p.y).map(|_| t);
            }
        }
        None
    }

    fn normal(&self, point: &Vector3<f64>) -> Option<Vector3<f64>> {
        let (_, hx, hy) = self.height(point.x, point.y)?;
        Some(Vector3::new(-hx, -hy, 1.0).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn axis(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn test_flat_mesh_behaves_like_plane() {
        let mesh = HeightMesh::from_function(axis(-0.01, 0.01, 5), axis(-0.2, 0.2, 9), |_, _| 0.0).unwrap();
        let theta: f64 = 0.01;
        let origin = Vector3::new(0.0, -10.0 * theta.cos(), 10.0 * theta.sin());
        let direction = Vector3::new(0.0, theta.cos(), -theta.sin());
        let t = mesh.intersect(&origin, &direction).unwrap();
        assert_abs_diff_eq!(t, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mesh.normal(&Vector3::zeros()).unwrap(), Vector3::z(), epsilon = 1e-15);
    }

    #[test]
    fn test_tilted_mesh_normal_and_height() {
        let mesh =
            HeightMesh::from_function(axis(-1.0, 1.0, 3), axis(-1.0, 1.0, 4), |x, y| 1e-3 * y + 2e-4 * x).unwrap();
        let (h, hx, hy) = mesh.height(0.3, -0.5).unwrap();
        assert_abs_diff_eq!(h, 1e-3 * -0.5 + 2e-4 * 0.3, epsilon = 1e-15);
        assert_abs_diff_eq!(hx, 2e-4, epsilon = 1e-15);
        assert_abs_diff_eq!(hy, 1e-3, epsilon = 1e-15);

        let t = mesh
            .intersect(&Vector3::new(0.2, 0.4, 1.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_abs_diff_eq!(1.0 - t, 1e-3 * 0.4 + 2e-4 * 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_outside_grid_misses() {
        let mesh = HeightMesh::from_function(axis(-0.01, 0.01, 3), axis(-0.1, 0.1, 3), |_, _| 0.0).unwrap();
        assert!(mesh
            .intersect(&Vector3::new(0.5, 0.0, 1.0), &Vector3::new(0.0, 0.0, -1.0))
            .is_none());
        assert!(mesh.height(0.0, 0.2).is_none());
    }

    #[test]
    fn test_parse_presurface() {
        let text = "3 2\n-0.1 0.1\n-0.01 0.0 1e-6\n0.0 0.0 0.0\n0.01\n1e-6 2e-6\n";
        let mesh = parse_presurface(text).unwrap();
        assert_eq!(mesh.x, vec![-0.01, 0.0, 0.01]);
        assert_eq!(mesh.y, vec![-0.1, 0.1]);
        assert_eq!(mesh.z[[2, 1]], 2e-6);
    }

    #[test]
    fn test_parse_presurface_errors() {
        match parse_presurface("3 2\n-0.1 0.1\n0.0 abc 1.0\n0 0 0\n0 0 0\n") {
            Err(GeometryError::FormatError { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_presurface("2 2\n0.0 1.0\n"),
            Err(GeometryError::FormatError { .. })
        ));
        assert!(matches!(
            parse_presurface("2 2\n1.0 0.0\n0 0 0\n1 0 0\n"),
            Err(GeometryError::InvalidSurface(_))
        ));
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        for text in ["4e18 2\n0 1\n", "1e300 1e300\n0 1\n", "3 3\n0 1 2\n0 0 0 0\n"] {
            match parse_presurface(text) {
                Err(GeometryError::FormatError { line, .. }) => assert_eq!(line, 1),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_mesh_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bump.dat");
        std::fs::write(&path, "2 2\n-1 1\n-1 0 0\n1 0 0\n").unwrap();
        let mesh = HeightMesh::from_file(&path).unwrap();
        assert_eq!(mesh.height(0.0, 0.0).unwrap().0, 0.0);
        assert!(HeightMesh::from_file(&dir.path().join("missing.dat")).is_err());
    }
}
