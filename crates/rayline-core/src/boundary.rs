//! Transverse acceptance regions of optical surfaces.
//!
//! Boundaries are expressed in the local (x, y) coordinates of an element,
//! where y runs along the beam footprint and x across it. Rays whose
//! intersection point falls outside the region are flagged lost.

use serde::{Deserialize, Serialize};

use crate::error::BeamError;

/// A closed region of the local surface plane.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryShape {
    /// Unlimited surface.
    #[default]
    None,
    /// Axis-aligned rectangle (m).
    Rectangle {
        x_left: f64,
        x_right: f64,
        y_bottom: f64,
        y_top: f64,
    },
    /// Axis-aligned ellipse given by its extreme coordinates (m).
    ///
    /// The centre is at the midpoint of `[a_axis_min, a_axis_max]` along x and
    /// `[b_axis_min, b_axis_max]` along y.
    Ellipse {
        a_axis_min: f64,
        a_axis_max: f64,
        b_axis_min: f64,
        b_axis_max: f64,
    },
    /// Union of `include` patches minus the union of `exclude` patches.
    ///
    /// An empty `include` list accepts the whole plane, so a hole is written
    /// as a composite with only `exclude` entries.
    Composite {
        #[serde(default)]
        include: Vec<BoundaryShape>,
        #[serde(default)]
        exclude: Vec<BoundaryShape>,
    },
}

impl BoundaryShape {
    /// Check whether a local point (x, y) lies inside the region.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            BoundaryShape::None => true,
            BoundaryShape::Rectangle {
                x_left,
                x_right,
                y_bottom,
                y_top,
            } => x >= *x_left && x <= *x_right && y >= *y_bottom && y <= *y_top,
            BoundaryShape::Ellipse {
                a_axis_min,
                a_axis_max,
                b_axis_min,
                b_axis_max,
            } => {
                let a = 0.5 * (a_axis_max - a_axis_min);
                let b = 0.5 * (b_axis_max - b_axis_min);
                if a <= 0.0 || b <= 0.0 {
                    return false;
                }
                let u = (x - 0.5 * (a_axis_max + a_axis_min)) / a;
                let v = (y - 0.5 * (b_axis_max + b_axis_min)) / b;
                u * u + v * v <= 1.0
            }
            BoundaryShape::Composite { include, exclude } => {
                let included = include.is_empty() || include.iter().any(|s| s.contains(x, y));
                included && !exclude.iter().any(|s| s.contains(x, y))
            }
        }
    }

    /// Reject degenerate or inverted regions.
    pub fn validate(&self) -> Result<(), BeamError> {
        match self {
            BoundaryShape::None => Ok(()),
            BoundaryShape::Rectangle {
                x_left,
                x_right,
                y_bottom,
                y_top,
            } => {
                if x_left >= x_right || y_bottom >= y_top {
                    return Err(BeamError::InvalidBoundary(format!(
                        "rectangle x [{}, {}], y [{}, {}] is empty",
                        x_left, x_right, y_bottom, y_top
                    )));
                }
                Ok(())
            }
            BoundaryShape::Ellipse {
                a_axis_min,
                a_axis_max,
                b_axis_min,
                b_axis_max,
            } => {
                if a_axis_min >= a_axis_max || b_axis_min >= b_axis_max {
                    return Err(BeamError::InvalidBoundary(format!(
                        "ellipse a [{}, {}], b [{}, {}] is empty",
                        a_axis_min, a_axis_max, b_axis_min, b_axis_max
                    )));
                }
                Ok(())
            }
            BoundaryShape::Composite { include, exclude } => {
                include.iter().chain(exclude).try_for_each(|s| s.validate())
            }
        }
    }

    /// Whether this boundary can flag any ray at all.
    pub fn is_unlimited(&self) -> bool {
        matches!(self, BoundaryShape::None)
    }
}
