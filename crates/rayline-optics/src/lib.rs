//! # Rayline Optics
//!
//! Optical elements and beamline tracing. An [`OpticalElement`] combines a
//! surface, a boundary, an interaction law and a reflectivity model; a
//! [`BeamlineElement`] places it along the beam; a [`Beamline`] traces a beam
//! through a sequence of them.
//!
//! ## Modules
//! - [`element`] - Elements, their builder and the per-element trace.
//! - [`beamline`] - Ordered element chains, sequential and batch tracing.
//! - [`interaction`] - Reflection, refraction, gratings and crystals.
//! - [`reflectivity`] - Reflectivity sources and loaded models.
//! - [`source`] - The [`LightSource`] seam and a deterministic point source.
//! - [`error`] - Trace errors.

pub mod beamline;
pub mod element;
pub mod error;
pub mod interaction;
pub mod reflectivity;
pub mod source;

pub use beamline::{Beamline, BeamlineTrace};
pub use element::{BeamlineElement, OpticalElement, OpticalElementBuilder, TraceParams};
pub use error::TraceError;
pub use interaction::crystal::{CrystalDiffraction, CrystalStructure, DarwinCurve, DiffractionGeometry};
pub use interaction::grating::Grating;
pub use interaction::refraction::Refractor;
pub use interaction::{Deflection, InteractionLaw};
pub use reflectivity::{ReflectivityModel, ReflectivitySource};
pub use source::{LightSource, PointSource};
