//! # Rayline Materials
//!
//! Optical constants and reflectivity data for X-ray optics.
//!
//! ## Modules
//! - [`provider`] - The [`OpticalConstants`] trait implemented by every
//!   source of complex refraction indices, and a constant-index material.
//! - [`prerefl`] - Tabulated refraction indices in PreRefl format.
//! - [`table`] - User reflectivity tables versus angle, energy, or both.
//! - [`spline`] - Natural cubic splines used by the 2D tables.
//! - [`fresnel`] - Mirror reflectivities from a complex refraction index.
//! - [`cache`] - Load-once, shared storage for parsed tables.

pub mod cache;
pub mod fresnel;
pub mod prerefl;
pub mod provider;
pub mod spline;
pub mod table;

pub use cache::TableCache;
pub use prerefl::PreReflTable;
pub use provider::{ConstantIndex, MaterialError, OpticalConstants};
pub use table::{CurveAxis, Interpolation, ReflectivityCurve, ReflectivityMap};
