//! # Rayline Geometry
//!
//! Geometry of optical elements along a beamline. This crate provides:
//!
//! - **Transforms** ([`transform`]) - Element placement, the lab-to-local
//!   and local-to-image reference-frame changes, and misalignment
//!   movements.
//! - **Surfaces** ([`surface`]) - Conics (plane, sphere, ellipsoid,
//!   paraboloid, hyperboloid and user coefficients), toroids and numerical
//!   height meshes, all answering the same intersection/normal queries.

pub mod error;
pub mod surface;
pub mod transform;

pub use error::GeometryError;
pub use surface::{SurfaceHit, SurfaceModel, SurfaceShape};
pub use transform::{ElementCoordinates, Medium, Movement, ReferenceFrameTransform, RigidTransform};
