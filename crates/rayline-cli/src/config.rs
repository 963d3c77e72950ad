//! TOML configuration deserialisation for beamline jobs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use rayline_core::BoundaryShape;
use rayline_geometry::{Movement, SurfaceShape};
use rayline_materials::Interpolation;
use rayline_optics::DiffractionGeometry;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub source: SourceConfig,
    #[serde(rename = "element", default)]
    pub elements: Vec<ElementConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Beam entering the first element.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Deterministic grid of directions from a point.
    Point {
        #[serde(default = "default_rays")]
        rays_x: usize,
        #[serde(default = "default_rays")]
        rays_z: usize,
        #[serde(default)]
        divergence_x: f64,
        #[serde(default)]
        divergence_z: f64,
        photon_energy: f64,
        #[serde(default = "default_polarization")]
        polarization_degree: f64,
        #[serde(default)]
        phase_difference: f64,
    },
    /// Beam read from an 18-column text dump.
    File { path: PathBuf },
}

fn default_rays() -> usize {
    1
}
fn default_polarization() -> f64 {
    1.0
}

/// One optical element and its placement.
#[derive(Debug, Deserialize)]
pub struct ElementConfig {
    pub name: String,
    /// Distance from the previous image plane (m).
    pub p: f64,
    /// Distance to this element's image plane (m).
    pub q: f64,
    /// Incidence angle from the normal (rad).
    pub angle_radial: Option<f64>,
    /// Incidence angle from the surface (rad); alternative to `angle_radial`.
    pub grazing_angle: Option<f64>,
    /// Exit angle from the normal (rad). Computed from the law when omitted.
    pub angle_radial_out: Option<f64>,
    #[serde(default)]
    pub angle_azimuthal: f64,
    /// Omitted for an empty element that only changes frames.
    pub surface: Option<SurfaceShape>,
    #[serde(default)]
    pub boundary: BoundaryShape,
    #[serde(default)]
    pub law: LawConfig,
    #[serde(default)]
    pub reflectivity: ReflectivityConfig,
    pub movement: Option<Movement>,
}

/// Interaction law of an element.
#[derive(Debug, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LawConfig {
    #[default]
    SpecularReflection,
    Refraction {
        #[serde(default)]
        object: MaterialConfig,
        image: MaterialConfig,
    },
    Grating {
        /// Line-density polynomial coefficients, constant term first.
        ruling: Vec<f64>,
        #[serde(default = "default_order")]
        order: i32,
    },
    Crystal {
        #[serde(default = "default_crystal_name")]
        name: String,
        /// Plane spacing (m).
        d_spacing: f64,
        /// Full Darwin width (rad).
        darwin_width: f64,
        #[serde(default)]
        angular_shift: f64,
        #[serde(default)]
        asymmetry_angle: f64,
        #[serde(default)]
        geometry: DiffractionGeometry,
    },
}

fn default_order() -> i32 {
    1
}
fn default_crystal_name() -> String {
    "crystal".into()
}

/// Optical constants of a medium.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialConfig {
    #[default]
    Vacuum,
    /// Fixed index $1 - \delta + i\beta$.
    Constant {
        delta: f64,
        #[serde(default)]
        beta: f64,
        /// Overrides the attenuation derived from β (m⁻¹).
        attenuation: Option<f64>,
    },
    Prerefl { file: PathBuf },
}

/// Reflectivity applied after the interaction law.
#[derive(Debug, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReflectivityConfig {
    #[default]
    None,
    Prerefl { file: PathBuf },
    RefractionIndex {
        delta: f64,
        #[serde(default)]
        beta: f64,
    },
    AngleTable { file: PathBuf },
    EnergyTable { file: PathBuf },
    EnergyAngleTable {
        file: PathBuf,
        #[serde(default)]
        interpolation: Interpolation,
    },
    /// Complex Fresnel amplitudes with Névot-Croce roughness (m rms).
    Material {
        material: MaterialConfig,
        #[serde(default)]
        roughness: f64,
    },
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to write the image-plane beam (default: true).
    #[serde(default = "default_true")]
    pub save_image: bool,
    /// Whether to write the footprint on every element (default: false).
    #[serde(default)]
    pub save_footprints: bool,
    /// Whether to write a JSON summary of the trace (default: true).
    #[serde(default = "default_true")]
    pub save_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_image: true,
            save_footprints: false,
            save_summary: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let config: JobConfig =
        toml::from_str(&content).with_context(|| format!("Invalid job file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
[source]
type = "point"
rays_x = 5
rays_z = 3
divergence_x = 1e-4
photon_energy = 8000.0

[[element]]
name = "m1"
p = 10.0
q = 5.0
grazing_angle = 0.003
surface = { type = "ellipsoid", focus = { p_focus = 10.0, q_focus = 5.0, grazing_angle = 0.003 } }
boundary = { type = "rectangle", x_left = -0.01, x_right = 0.01, y_bottom = -0.2, y_top = 0.2 }
reflectivity = { type = "refraction_index", delta = 7.5772e-6, beta = 1.7476e-7 }

[[element]]
name = "mono"
p = 2.0
q = 3.0
surface = { type = "plane" }
law = { type = "crystal", d_spacing = 3.1356e-10, darwin_width = 2.3e-5 }
movement = { rotation = [1e-6, 0.0, 0.0] }

[output]
directory = "out"
save_footprints = true
"#;

    #[test]
    fn test_parse_job() {
        let job: JobConfig = toml::from_str(JOB).unwrap();
        match job.source {
            SourceConfig::Point {
                rays_x,
                rays_z,
                divergence_z,
                polarization_degree,
                ..
            } => {
                assert_eq!((rays_x, rays_z), (5, 3));
                assert_eq!(divergence_z, 0.0);
                assert_eq!(polarization_degree, 1.0);
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert_eq!(job.elements.len(), 2);
        let m1 = &job.elements[0];
        assert_eq!(m1.grazing_angle, Some(0.003));
        assert!(matches!(m1.surface, Some(SurfaceShape::Ellipsoid { .. })));
        assert!(matches!(m1.law, LawConfig::SpecularReflection));
        assert!(matches!(m1.reflectivity, ReflectivityConfig::RefractionIndex { .. }));

        let mono = &job.elements[1];
        assert!(mono.angle_radial.is_none() && mono.grazing_angle.is_none());
        match &mono.law {
            LawConfig::Crystal { name, geometry, .. } => {
                assert_eq!(name, "crystal");
                assert_eq!(*geometry, DiffractionGeometry::Bragg);
            }
            other => panic!("unexpected law {:?}", other),
        }
        assert_eq!(mono.movement.unwrap().rotation[0], 1e-6);
        assert_eq!(job.output.directory, "out");
        assert!(job.output.save_footprints && job.output.save_image);
    }

    #[test]
    fn test_element_without_surface() {
        let job = r#"
[source]
type = "file"
path = "beam.dat"

[[element]]
name = "screen"
p = 1.0
q = 1.0
angle_radial = 0.0
"#;
        let job: JobConfig = toml::from_str(job).unwrap();
        assert!(job.elements[0].surface.is_none());
        assert!(toml::from_str::<JobConfig>("[source]\ntype = \"point\"\n").is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/job.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/job.toml"));
    }
}
