//! Errors raised while building or tracing a beamline.
//!
//! Per-ray physical failures (a missed surface, an impossible diffraction
//! order, refraction past the critical angle) never surface here: those rays
//! are flagged lost and the batch continues. A [`TraceError`] means the
//! configuration itself is unusable and no ray was processed.
//!
//! Material and crystal providers that fail for one ray's energy lose that
//! ray only; [`RayFailures`] tallies them for a single warning per stage.

use thiserror::Error;

use rayline_core::{BeamError, Ray};
use rayline_geometry::GeometryError;
use rayline_materials::MaterialError;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Element '{0}' has no surface shape")]
    MissingSurface(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Beam(#[from] BeamError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Material(#[from] MaterialError),
}

/// Rays lost to provider errors during one trace stage.
#[derive(Debug, Default)]
pub(crate) struct RayFailures {
    count: usize,
    first: Option<TraceError>,
}

impl RayFailures {
    /// Flag `ray` lost and remember the error.
    pub(crate) fn record(&mut self, ray: &mut Ray, lost_value: f64, error: TraceError) {
        ray.lose(lost_value);
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(error);
        }
    }

    pub(crate) fn report(&self, context: &str) {
        if let Some(first) = &self.first {
            log::warn!("{}: {} rays lost to provider errors (first: {})", context, self.count, first);
        }
    }
}
