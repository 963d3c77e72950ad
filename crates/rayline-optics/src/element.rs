//! Optical elements and their placement in a beamline.
//!
//! An [`OpticalElement`] is the physical object: surface, boundary,
//! interaction law and reflectivity. A [`BeamlineElement`] places it in a
//! beamline with [`ElementCoordinates`] and an optional [`Movement`], and
//! traces beams through it.
//!
//! An element without a surface ([`OpticalElement::empty`]) only changes
//! frames: rays drift through the pole plane and on to the image plane
//! untouched, which lets a beamline re-orient its axes.

use std::sync::Arc;

use nalgebra::Vector3;
use num_complex::Complex64;

use rayline_core::{BoundaryShape, RayBeam, LOST_FLAG};
use rayline_geometry::{ElementCoordinates, Movement, ReferenceFrameTransform, SurfaceModel, SurfaceShape};
use rayline_materials::TableCache;

use crate::error::{RayFailures, TraceError};
use crate::interaction::InteractionLaw;
use crate::reflectivity::{ReflectivityModel, ReflectivitySource};

/// A surface together with the physics applied on it.
#[derive(Debug, Clone)]
pub struct OpticalElement {
    name: String,
    surface: Option<Arc<dyn SurfaceModel>>,
    boundary: BoundaryShape,
    law: InteractionLaw,
    reflectivity: ReflectivityModel,
}

impl OpticalElement {
    pub fn builder(name: impl Into<String>) -> OpticalElementBuilder {
        OpticalElementBuilder::new(name)
    }

    /// An element with no surface and no interaction.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surface: None,
            boundary: BoundaryShape::None,
            law: InteractionLaw::default(),
            reflectivity: ReflectivityModel::Perfect,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The surface, or `None` for an empty element.
    pub fn surface(&self) -> Option<&Arc<dyn SurfaceModel>> {
        self.surface.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_none()
    }

    pub fn boundary(&self) -> &BoundaryShape {
        &self.boundary
    }

    pub fn law(&self) -> &InteractionLaw {
        &self.law
    }

    pub fn reflectivity(&self) -> &ReflectivityModel {
        &self.reflectivity
    }
}

/// Step-by-step construction of an [`OpticalElement`].
///
/// The surface may be given either as a declarative [`SurfaceShape`] or as
/// a ready [`SurfaceModel`]; leaving it unset is an error. Tables named by
/// the reflectivity source are loaded at [`build`](Self::build) time.
#[derive(Debug, Default)]
pub struct OpticalElementBuilder {
    name: String,
    shape: Option<SurfaceShape>,
    surface: Option<Arc<dyn SurfaceModel>>,
    boundary: BoundaryShape,
    law: InteractionLaw,
    reflectivity: ReflectivitySource,
    cache: Option<Arc<TableCache>>,
}

impl OpticalElementBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn shape(mut self, shape: SurfaceShape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn surface(mut self, surface: Arc<dyn SurfaceModel>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn boundary(mut self, boundary: BoundaryShape) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn law(mut self, law: InteractionLaw) -> Self {
        self.law = law;
        self
    }

    pub fn reflectivity(mut self, source: ReflectivitySource) -> Self {
        self.reflectivity = source;
        self
    }

    /// Share a table cache with other elements.
    pub fn cache(mut self, cache: Arc<TableCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<OpticalElement, TraceError> {
        let surface = match (self.surface, &self.shape) {
            (Some(surface), _) => surface,
            (None, Some(shape)) => shape.build()?,
            (None, None) => return Err(TraceError::MissingSurface(self.name)),
        };
        self.boundary.validate()?;
        self.law.validate()?;
        let cache = self.cache.unwrap_or_default();
        let reflectivity = ReflectivityModel::resolve(&self.reflectivity, &cache)?;
        log::debug!(
            "Built element '{}': {} surface, {} law",
            self.name,
            surface.name(),
            self.law.name()
        );
        Ok(OpticalElement {
            name: self.name,
            surface: Some(surface),
            boundary: self.boundary,
            law: self.law,
            reflectivity,
        })
    }
}

/// Options for a single-element trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    /// Flag assigned to rays lost in this element; must be non-positive.
    pub lost_value: f64,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self { lost_value: LOST_FLAG }
    }
}

/// An optical element placed in a beamline.
#[derive(Debug, Clone)]
pub struct BeamlineElement {
    element: Arc<OpticalElement>,
    frame: ReferenceFrameTransform,
    movement: Option<Movement>,
}

impl BeamlineElement {
    pub fn new(element: impl Into<Arc<OpticalElement>>, coordinates: ElementCoordinates) -> Self {
        Self {
            element: element.into(),
            frame: ReferenceFrameTransform::new(coordinates),
            movement: None,
        }
    }

    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = (!movement.is_identity()).then_some(movement);
        self
    }

    pub fn element(&self) -> &OpticalElement {
        &self.element
    }

    pub fn coordinates(&self) -> &ElementCoordinates {
        self.frame.coordinates()
    }

    pub fn movement(&self) -> Option<&Movement> {
        self.movement.as_ref()
    }

    /// Trace a beam through this element.
    ///
    /// Returns `(output, footprint)`: the beam in the image frame and the
    /// beam on the surface in the local frame. The input is not modified.
    /// Rays that miss, fall outside the boundary or cannot satisfy the
    /// interaction law are flagged with `params.lost_value`.
    pub fn trace_beam(&self, input: &RayBeam, params: &TraceParams) -> Result<(RayBeam, RayBeam), TraceError> {
        if !(params.lost_value <= 0.0) {
            return Err(TraceError::Configuration(format!(
                "lost flag value must be non-positive, got {}",
                params.lost_value
            )));
        }
        self.coordinates().validate()?;
        let element = &self.element;
        let lost_value = params.lost_value;

        // (1) The input is never mutated.
        let mut beam = input.duplicate();

        let Some(surface) = &element.surface else {
            return Ok(self.trace_empty(beam, lost_value));
        };

        // (2) Into the local (and possibly moved) surface frame.
        self.frame.to_local(&mut beam);
        if let Some(movement) = &self.movement {
            movement.apply(&mut beam);
        }

        // (3) Intersection, with the path through the object medium.
        let hits = surface.intersect_and_normal(&mut beam, lost_value);
        let mut failures = RayFailures::default();
        for (ray, hit) in beam.rays_mut().iter_mut().zip(&hits) {
            if let Some(hit) = hit {
                let medium = match element.law.object_medium(ray.photon_energy()) {
                    Ok(medium) => medium,
                    Err(error) => {
                        failures.record(ray, lost_value, error);
                        continue;
                    }
                };
                ray.optical_path += medium.refraction_index * hit.distance;
                if medium.attenuation > 0.0 {
                    ray.attenuate((-medium.attenuation * hit.distance.abs()).exp().sqrt());
                }
            }
        }
        failures.report(&element.name);
        log::debug!(
            "{}: {} good rays on the surface",
            element.name,
            beam.good_count()
        );

        // (4) Boundaries.
        let clipped = beam.apply_boundaries(&element.boundary, lost_value);
        if clipped > 0 {
            log::debug!("{}: {} rays outside the boundary", element.name, clipped);
        }

        // (5) Interaction law; incidence angles are taken before it.
        let grazing = InteractionLaw::grazing_angles(&beam, &hits);
        let outcome = element.law.apply(&mut beam, &hits, lost_value)?;

        // (6) Reflectivity and law amplitudes.
        self.apply_amplitudes(&mut beam, &grazing, outcome.amplitudes, lost_value)?;

        // (7) Back to the nominal frame.
        if let Some(movement) = &self.movement {
            movement.undo(&mut beam);
        }

        // (8) Footprint, then on to the image plane.
        let footprint = beam.duplicate();
        self.frame.to_image_through(&mut beam, &outcome.media, lost_value)?;

        if beam.good_count() == 0 && !beam.is_empty() {
            log::warn!("{}: no good rays left", element.name);
        }
        Ok((beam, footprint))
    }

    /// Frame changes and vacuum drift only. The footprint is the beam where
    /// it crosses the plane through the pole normal to the incoming axis.
    fn trace_empty(&self, mut beam: RayBeam, lost_value: f64) -> (RayBeam, RayBeam) {
        self.frame.to_local(&mut beam);
        let (s, c) = self.coordinates().grazing_in().sin_cos();
        let axis = Vector3::new(0.0, c, -s);
        for ray in beam.rays_mut().iter_mut().filter(|r| r.is_good()) {
            let denom = ray.direction.dot(&axis);
            if denom.abs() < 1e-15 {
                ray.lose(lost_value);
                continue;
            }
            ray.advance(-ray.position.dot(&axis) / denom, 1.0);
        }
        let footprint = beam.duplicate();
        self.frame.to_image(&mut beam, lost_value);
        log::debug!("{}: frame change only, {} good rays", self.element.name, beam.good_count());
        (beam, footprint)
    }

    fn apply_amplitudes(
        &self,
        beam: &mut RayBeam,
        grazing: &[f64],
        law_amplitudes: Option<(Vec<Complex64>, Vec<Complex64>)>,
        lost_value: f64,
    ) -> Result<(), TraceError> {
        let model = &self.element.reflectivity;
        if model.is_perfect() && law_amplitudes.is_none() {
            return Ok(());
        }

        let n = beam.len();
        let one = Complex64::new(1.0, 0.0);
        let (mut rs, mut rp) = law_amplitudes.unwrap_or_else(|| (vec![one; n], vec![one; n]));
        if !model.is_perfect() {
            let mut failures = RayFailures::default();
            for (i, ray) in beam.rays_mut().iter_mut().enumerate() {
                if ray.is_lost() {
                    continue;
                }
                match model.amplitude(grazing[i], ray.photon_energy()) {
                    Ok((s, p)) => {
                        rs[i] *= s;
                        rp[i] *= p;
                    }
                    Err(error) => failures.record(ray, lost_value, error),
                }
            }
            failures.report(&self.element.name);
        }

        let has_phase = rs.iter().chain(&rp).any(|r| r.im != 0.0 || r.re < 0.0);
        if has_phase {
            beam.apply_complex_reflectivities(&rs, &rp)?;
        } else {
            let mag = |v: &[Complex64]| v.iter().map(|r| r.re).collect::<Vec<_>>();
            beam.apply_reflectivities(&mag(&rs), &mag(&rp))?;
        }
        Ok(())
    }
}
