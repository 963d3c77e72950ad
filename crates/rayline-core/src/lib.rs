//! # Rayline Core
//!
//! Ray ensembles for beamline ray tracing. This crate provides:
//!
//! - **Rays** ([`ray`]) - A single photon ray with position, direction,
//!   polarization field vectors, phases, wavenumber and optical path.
//! - **Beams** ([`beam`]) - An ordered ensemble of rays with whole-beam
//!   operations (rotate, translate, retrace, clip, scale).
//! - **Columns** ([`columns`]) - Stored and derived per-ray quantities,
//!   filters and statistics.
//! - **Boundaries** ([`boundary`]) - Transverse acceptance regions of an
//!   optical surface.
//! - **Interchange** ([`interchange`]) - The fixed 18-column table layout
//!   used to exchange beams with other tools.
//! - **Units** ([`units`]) - Physical constants and energy/wavelength
//!   conversions.

pub mod beam;
pub mod boundary;
pub mod columns;
pub mod error;
pub mod interchange;
pub mod ray;
pub mod units;

pub use beam::{Axis, RayBeam};
pub use boundary::BoundaryShape;
pub use columns::{BeamSummary, Column, RayFilter};
pub use error::BeamError;
pub use ray::{Ray, GOOD_FLAG, LOST_FLAG};
