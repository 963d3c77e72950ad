//! Ordered chains of beamline elements.

use rayline_core::RayBeam;

use crate::element::{BeamlineElement, TraceParams};
use crate::error::TraceError;

/// Result of tracing a beam through a whole beamline.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamlineTrace {
    /// Beam at the image plane of the last element.
    pub image: RayBeam,
    /// Footprint on each element, in its local frame.
    pub footprints: Vec<RayBeam>,
}

/// A sequence of elements traced one after another.
#[derive(Debug, Clone, Default)]
pub struct Beamline {
    elements: Vec<BeamlineElement>,
}

impl Beamline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: BeamlineElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn push(&mut self, element: BeamlineElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[BeamlineElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Trace a source beam through every element in order.
    ///
    /// Rays lost in element `i` (1-based) are flagged `-i`, so the image
    /// beam records where each ray was lost.
    pub fn trace(&self, source: &RayBeam) -> Result<BeamlineTrace, TraceError> {
        let mut footprints = Vec::with_capacity(self.elements.len());
        let mut beam = source.duplicate();
        for (i, element) in self.elements.iter().enumerate() {
            let params = TraceParams {
                lost_value: -((i + 1) as f64),
            };
            let (output, footprint) = element.trace_beam(&beam, &params)?;
            log::info!(
                "Element {} ({}): {} good / {} lost",
                i + 1,
                element.element().name(),
                output.good_count(),
                output.lost_count()
            );
            footprints.push(footprint);
            beam = output;
        }
        Ok(BeamlineTrace {
            image: beam,
            footprints,
        })
    }

    /// Trace independent beams in parallel against the same beamline.
    ///
    /// Results are returned in input order.
    pub fn trace_many(&self, sources: &[RayBeam]) -> Vec<Result<BeamlineTrace, TraceError>> {
        use rayon::prelude::*;

        sources.par_iter().map(|beam| self.trace(beam)).collect()
    }
}
