//! Optical surface models.
//!
//! A surface is described declaratively by a [`SurfaceShape`] (the form
//! stored in job files) and resolved once, at element construction, into a
//! [`SurfaceModel`] that answers intersection and normal queries.
//!
//! ## Modules
//! - [`conic`] - Quadric surfaces from 10 coefficients, with closed-form
//!   constructors from focal distances.
//! - [`toroid`] - Toroidal surfaces solved by Newton iteration.
//! - [`mesh`] - Tabulated height maps with bilinear interpolation.

pub mod conic;
pub mod mesh;
pub mod toroid;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use rayline_core::RayBeam;

use crate::error::GeometryError;
use conic::Conic;
use mesh::HeightMesh;
use toroid::Toroid;

/// Where a ray met a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Unit normal at the intersection, pointing to the illuminated (+z)
    /// side of the surface.
    pub normal: Vector3<f64>,
    /// Path length travelled from the ray's previous position (m).
    pub distance: f64,
}

/// Intersection and normal queries on a surface in its local frame.
pub trait SurfaceModel: Send + Sync + fmt::Debug {
    /// Short name of the surface family.
    fn name(&self) -> &'static str;

    /// Parametric distance `t` such that `origin + t * direction` lies on
    /// the surface, or `None` when the ray misses.
    fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<f64>;

    /// Unit normal at a point on the surface, oriented towards +z at the pole.
    fn normal(&self, point: &Vector3<f64>) -> Option<Vector3<f64>>;

    /// Move every good ray onto the surface and report the hit.
    ///
    /// Rays that miss are flagged with `lost_value`; lost rays are left
    /// untouched. The optical path is not updated here because it depends on
    /// the medium in front of the surface.
    fn intersect_and_normal(&self, beam: &mut RayBeam, lost_value: f64) -> Vec<Option<SurfaceHit>> {
        beam.rays_mut()
            .iter_mut()
            .map(|ray| {
                if ray.is_lost() {
                    return None;
                }
                let hit = self
                    .intersect(&ray.position, &ray.direction)
                    .filter(|t| t.is_finite())
                    .and_then(|t| {
                        let point = ray.position + ray.direction * t;
                        self.normal(&point).map(|normal| (t, point, normal))
                    });
                match hit {
                    Some((distance, point, normal)) => {
                        ray.position = point;
                        Some(SurfaceHit { normal, distance })
                    }
                    None => {
                        ray.lose(lost_value);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Focal distances and grazing angle from which a focusing figure is
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalGeometry {
    /// Distance from the pole to the entrance focus (m).
    pub p_focus: f64,
    /// Distance from the pole to the exit focus (m).
    pub q_focus: f64,
    /// Grazing angle of the central ray (rad).
    pub grazing_angle: f64,
}

impl FocalGeometry {
    pub fn new(p_focus: f64, q_focus: f64, grazing_angle: f64) -> Self {
        Self {
            p_focus,
            q_focus,
            grazing_angle,
        }
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if !(self.p_focus > 0.0 && self.q_focus > 0.0) {
            return Err(GeometryError::InvalidSurface(format!(
                "focal distances must be positive, got p = {}, q = {}",
                self.p_focus, self.q_focus
            )));
        }
        if !(self.grazing_angle > 0.0 && self.grazing_angle <= std::f64::consts::FRAC_PI_2) {
            return Err(GeometryError::InvalidSurface(format!(
                "grazing angle {} rad is outside (0, π/2]",
                self.grazing_angle
            )));
        }
        Ok(())
    }

    /// Tangential radius $R = 2pq / ((p+q)\sin\theta)$.
    pub fn tangential_radius(&self) -> f64 {
        2.0 * self.p_focus * self.q_focus
            / ((self.p_focus + self.q_focus) * self.grazing_angle.sin())
    }

    /// Sagittal radius $r = 2pq\sin\theta / (p+q)$.
    pub fn sagittal_radius(&self) -> f64 {
        2.0 * self.p_focus * self.q_focus * self.grazing_angle.sin()
            / (self.p_focus + self.q_focus)
    }
}

/// Which side of the tangent plane the centre of curvature lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convexity {
    /// Centre of curvature on the illuminated side (concave, focusing).
    #[default]
    Upward,
    /// Centre of curvature behind the surface (convex).
    Downward,
}

/// Axis of a cylindrical variant, in the local surface plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CylinderDirection {
    /// Curved along the beam (axis along x).
    Tangential,
    /// Curved across the beam (axis along y).
    Sagittal,
}

impl CylinderDirection {
    /// Angle between the cylinder axis and the x axis (rad).
    pub fn angle(self) -> f64 {
        match self {
            CylinderDirection::Tangential => 0.0,
            CylinderDirection::Sagittal => std::f64::consts::FRAC_PI_2,
        }
    }
}

/// Which focus of a paraboloid is at infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusAtInfinity {
    /// Collimated incoming beam focused at `q_focus`.
    Source,
    /// Point source at `p_focus` collimated on exit.
    Image,
}

/// Inline height grid of a numerical mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshGrid {
    /// Strictly increasing x samples (m).
    pub x: Vec<f64>,
    /// Strictly increasing y samples (m).
    pub y: Vec<f64>,
    /// Heights, one row of `y.len()` values per x sample (m).
    pub z: Vec<Vec<f64>>,
}

/// Declarative surface description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceShape {
    Plane,
    Sphere {
        /// Explicit radius (m); exclusive with `focus`.
        radius: Option<f64>,
        focus: Option<FocalGeometry>,
        #[serde(default)]
        convexity: Convexity,
        cylinder: Option<CylinderDirection>,
    },
    Ellipsoid {
        focus: FocalGeometry,
        #[serde(default)]
        convexity: Convexity,
        cylinder: Option<CylinderDirection>,
    },
    Hyperboloid {
        focus: FocalGeometry,
        #[serde(default)]
        convexity: Convexity,
        cylinder: Option<CylinderDirection>,
    },
    Paraboloid {
        focus: FocalGeometry,
        at_infinity: FocusAtInfinity,
        #[serde(default)]
        convexity: Convexity,
        cylinder: Option<CylinderDirection>,
    },
    Toroid {
        /// Tangential radius (m); exclusive with `focus`.
        major_radius: Option<f64>,
        /// Sagittal radius (m); exclusive with `focus`.
        minor_radius: Option<f64>,
        focus: Option<FocalGeometry>,
        #[serde(default)]
        convexity: Convexity,
    },
    /// User-supplied quadric coefficients.
    Conic { coefficients: [f64; 10] },
    NumericalMesh {
        /// Height file in presurface format; exclusive with `grid`.
        file: Option<PathBuf>,
        grid: Option<MeshGrid>,
    },
}

impl SurfaceShape {
    /// Short name of the shape.
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceShape::Plane => "plane",
            SurfaceShape::Sphere { .. } => "sphere",
            SurfaceShape::Ellipsoid { .. } => "ellipsoid",
            SurfaceShape::Hyperboloid { .. } => "hyperboloid",
            SurfaceShape::Paraboloid { .. } => "paraboloid",
            SurfaceShape::Toroid { .. } => "toroid",
            SurfaceShape::Conic { .. } => "conic",
            SurfaceShape::NumericalMesh { .. } => "numerical_mesh",
        }
    }

    /// Resolve the description into a surface model.
    pub fn build(&self) -> Result<Arc<dyn SurfaceModel>, GeometryError> {
        let model: Arc<dyn SurfaceModel> = match self {
            SurfaceShape::Plane => Arc::new(Conic::plane()),
            SurfaceShape::Sphere {
                radius,
                focus,
                convexity,
                cylinder,
            } => {
                let radius = match (radius, focus) {
                    (Some(r), None) => *r,
                    (None, Some(f)) => {
                        f.validate()?;
                        match cylinder {
                            Some(CylinderDirection::Sagittal) => f.sagittal_radius(),
                            _ => f.tangential_radius(),
                        }
                    }
                    _ => {
                        return Err(GeometryError::InvalidSurface(
                            "sphere needs exactly one of 'radius' or 'focus'".into(),
                        ))
                    }
                };
                let conic = Conic::sphere(radius)?;
                Arc::new(finish_conic(conic, *convexity, *cylinder))
            }
            SurfaceShape::Ellipsoid {
                focus,
                convexity,
                cylinder,
            } => {
                focus.validate()?;
                Arc::new(finish_conic(Conic::ellipsoid(focus)?, *convexity, *cylinder))
            }
            SurfaceShape::Hyperboloid {
                focus,
                convexity,
                cylinder,
            } => {
                focus.validate()?;
                Arc::new(finish_conic(Conic::hyperboloid(focus)?, *convexity, *cylinder))
            }
            SurfaceShape::Paraboloid {
                focus,
                at_infinity,
                convexity,
                cylinder,
            } => {
                focus.validate()?;
                Arc::new(finish_conic(
                    Conic::paraboloid(focus, *at_infinity),
                    *convexity,
                    *cylinder,
                ))
            }
            SurfaceShape::Toroid {
                major_radius,
                minor_radius,
                focus,
                convexity,
            } => {
                let toroid = match (major_radius, minor_radius, focus) {
                    (Some(major), Some(minor), None) => Toroid::new(*major, *minor)?,
                    (None, None, Some(f)) => {
                        f.validate()?;
                        Toroid::new(f.tangential_radius(), f.sagittal_radius())?
                    }
                    _ => {
                        return Err(GeometryError::InvalidSurface(
                            "toroid needs both radii or 'focus'".into(),
                        ))
                    }
                };
                Arc::new(toroid.with_convexity(*convexity))
            }
            SurfaceShape::Conic { coefficients } => Arc::new(Conic::new(*coefficients)?),
            SurfaceShape::NumericalMesh { file, grid } => match (file, grid) {
                (Some(path), None) => Arc::new(HeightMesh::from_file(path)?),
                (None, Some(g)) => Arc::new(HeightMesh::from_rows(g.x.clone(), g.y.clone(), &g.z)?),
                _ => {
                    return Err(GeometryError::InvalidSurface(
                        "numerical mesh needs exactly one of 'file' or 'grid'".into(),
                    ))
                }
            },
        };
        log::debug!("Built {} surface", model.name());
        Ok(model)
    }
}

fn finish_conic(conic: Conic, convexity: Convexity, cylinder: Option<CylinderDirection>) -> Conic {
    let conic = match cylinder {
        Some(direction) => conic.cylindrical(direction.angle()),
        None => conic,
    };
    match convexity {
        Convexity::Upward => conic,
        Convexity::Downward => conic.flipped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_focal_radii() {
        let f = FocalGeometry::new(10.0, 10.0, 0.003);
        assert_abs_diff_eq!(f.tangential_radius(), 10.0 / 0.003f64.sin(), epsilon = 1e-9);
        assert_abs_diff_eq!(f.sagittal_radius(), 10.0 * 0.003f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_requires_one_definition() {
        let shape = SurfaceShape::Sphere {
            radius: Some(10.0),
            focus: Some(FocalGeometry::new(1.0, 1.0, 0.01)),
            convexity: Convexity::Upward,
            cylinder: None,
        };
        assert!(shape.build().is_err());
    }

    #[test]
    fn test_invalid_focal_geometry() {
        let shape = SurfaceShape::Ellipsoid {
            focus: FocalGeometry::new(-1.0, 1.0, 0.01),
            convexity: Convexity::Upward,
            cylinder: None,
        };
        assert!(matches!(shape.build(), Err(GeometryError::InvalidSurface(_))));
    }

    #[test]
    fn test_intersect_and_normal_flags_misses() {
        let plane = SurfaceShape::Plane.build().unwrap();
        let mut beam = RayBeam::pencil(3);
        beam.rays_mut()[0].position = Vector3::new(0.0, -1.0, 0.1);
        beam.rays_mut()[0].direction = Vector3::new(0.0, 1.0, -0.1).normalize();
        // Parallel to the plane: never reaches z = 0.
        beam.rays_mut()[1].position = Vector3::new(0.0, 0.0, 0.1);
        beam.rays_mut()[2].lose(-7.0);

        let hits = plane.intersect_and_normal(&mut beam, -3.0);
        let hit = hits[0].expect("first ray hits");
        assert_abs_diff_eq!(beam.rays()[0].position, Vector3::zeros(), epsilon = 1e-15);
        assert_abs_diff_eq!(hit.normal, Vector3::z(), epsilon = 1e-15);
        assert_abs_diff_eq!(hit.distance, 0.1 * 101f64.sqrt(), epsilon = 1e-12);
        assert!(hits[1].is_none());
        assert_eq!(beam.rays()[1].flag, -3.0);
        assert!(hits[2].is_none());
        assert_eq!(beam.rays()[2].flag, -7.0);
    }

    #[test]
    fn test_shape_from_json() {
        let shape: SurfaceShape = parse_shape(
            r#"{"type":"paraboloid","focus":{"p_focus":30.0,"q_focus":5.0,"grazing_angle":0.004},"at_infinity":"source"}"#,
        );
        assert_eq!(shape.name(), "paraboloid");
        assert!(shape.build().is_ok());
    }

    fn parse_shape(json: &str) -> SurfaceShape {
        serde_json::from_str(json).unwrap()
    }
}
