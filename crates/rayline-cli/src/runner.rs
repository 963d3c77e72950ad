//! Job runner: builds the source and beamline from a job file, traces, and
//! writes the results.

use std::f64::consts::{FRAC_PI_2, PI};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use num_complex::Complex64;
use serde::Serialize;

use rayline_core::{BeamSummary, BoundaryShape, Column, RayBeam, RayFilter};
use rayline_geometry::ElementCoordinates;
use rayline_materials::{ConstantIndex, OpticalConstants, TableCache};
use rayline_optics::{
    Beamline, BeamlineElement, BeamlineTrace, CrystalDiffraction, DarwinCurve, Grating, InteractionLaw,
    LightSource, OpticalElement, PointSource, ReflectivitySource, Refractor,
};

use crate::config::{ElementConfig, JobConfig, LawConfig, MaterialConfig, ReflectivityConfig, SourceConfig};

/// Everything a job produces.
pub struct JobOutput {
    pub source: RayBeam,
    pub beamline: Beamline,
    pub trace: BeamlineTrace,
}

/// Per-element entry of the JSON summary.
#[derive(Debug, Serialize)]
pub struct ElementReport {
    pub name: String,
    pub angle_radial: f64,
    pub angle_radial_out: f64,
    pub footprint: BeamSummary,
}

/// JSON summary of a trace.
#[derive(Debug, Serialize)]
pub struct TraceReport {
    pub source: BeamSummary,
    pub elements: Vec<ElementReport>,
    pub image: BeamSummary,
}

impl JobOutput {
    pub fn report(&self) -> TraceReport {
        let elements = self
            .beamline
            .elements()
            .iter()
            .zip(&self.trace.footprints)
            .map(|(element, footprint)| ElementReport {
                name: element.element().name().to_string(),
                angle_radial: element.coordinates().angle_radial,
                angle_radial_out: element.coordinates().angle_radial_out,
                footprint: footprint.summary(),
            })
            .collect();
        TraceReport {
            source: self.source.summary(),
            elements,
            image: self.trace.image.summary(),
        }
    }
}

/// Relative paths in a job file are taken from the job file's directory.
fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Generate or load the source beam.
pub fn build_source(config: &SourceConfig, base: &Path) -> Result<RayBeam> {
    match config {
        SourceConfig::Point {
            rays_x,
            rays_z,
            divergence_x,
            divergence_z,
            photon_energy,
            polarization_degree,
            phase_difference,
        } => {
            let source = PointSource {
                nx: *rays_x,
                nz: *rays_z,
                divergence_x: *divergence_x,
                divergence_z: *divergence_z,
                photon_energy: *photon_energy,
                polarization_degree: *polarization_degree,
                phase_difference: *phase_difference,
            };
            Ok(source.get_beam()?)
        }
        SourceConfig::File { path } => {
            let path = resolve(base, path);
            RayBeam::read_text_file(&path).with_context(|| format!("Cannot load source beam {}", path.display()))
        }
    }
}

fn build_material(config: &MaterialConfig, base: &Path, cache: &TableCache) -> Result<Arc<dyn OpticalConstants>> {
    let material: Arc<dyn OpticalConstants> = match config {
        MaterialConfig::Vacuum => Arc::new(ConstantIndex::vacuum()),
        MaterialConfig::Constant {
            delta,
            beta,
            attenuation,
        } => {
            let material = ConstantIndex::new("constant", *delta, *beta);
            match attenuation {
                Some(mu) => Arc::new(material.with_attenuation(*mu)),
                None => Arc::new(material),
            }
        }
        MaterialConfig::Prerefl { file } => cache.prerefl(&resolve(base, file))?,
    };
    Ok(material)
}

fn build_law(config: &LawConfig, base: &Path, cache: &TableCache) -> Result<InteractionLaw> {
    Ok(match config {
        LawConfig::SpecularReflection => InteractionLaw::SpecularReflection,
        LawConfig::Refraction { object, image } => InteractionLaw::Refraction(Refractor::new(
            build_material(object, base, cache)?,
            build_material(image, base, cache)?,
        )),
        LawConfig::Grating { ruling, order } => {
            if ruling.is_empty() || ruling.len() > 5 {
                bail!("grating ruling needs 1 to 5 coefficients, got {}", ruling.len());
            }
            let mut coefficients = [0.0; 5];
            coefficients[..ruling.len()].copy_from_slice(ruling);
            InteractionLaw::Grating(Grating {
                ruling: coefficients,
                order: *order,
            })
        }
        LawConfig::Crystal {
            name,
            d_spacing,
            darwin_width,
            angular_shift,
            asymmetry_angle,
            geometry,
        } => {
            let structure = DarwinCurve::new(name.clone(), *d_spacing, *darwin_width)?.with_shift(*angular_shift);
            InteractionLaw::Crystal(
                CrystalDiffraction::new(Arc::new(structure))
                    .with_asymmetry(*asymmetry_angle)
                    .with_geometry(*geometry),
            )
        }
    })
}

fn build_reflectivity(config: &ReflectivityConfig, base: &Path, cache: &TableCache) -> Result<ReflectivitySource> {
    Ok(match config {
        ReflectivityConfig::None => ReflectivitySource::None,
        ReflectivityConfig::Prerefl { file } => ReflectivitySource::PreRefl {
            file: resolve(base, file),
        },
        ReflectivityConfig::RefractionIndex { delta, beta } => ReflectivitySource::RefractionIndex {
            index: Complex64::new(1.0 - delta, *beta),
        },
        ReflectivityConfig::AngleTable { file } => ReflectivitySource::AngleTable {
            file: resolve(base, file),
        },
        ReflectivityConfig::EnergyTable { file } => ReflectivitySource::EnergyTable {
            file: resolve(base, file),
        },
        ReflectivityConfig::EnergyAngleTable { file, interpolation } => ReflectivitySource::EnergyAngleTable {
            file: resolve(base, file),
            interpolation: *interpolation,
        },
        ReflectivityConfig::Material { material, roughness } => ReflectivitySource::Material {
            constants: build_material(material, base, cache)?,
            roughness: *roughness,
        },
    })
}

/// Incidence angle from the normal: explicit, from a grazing angle, or the
/// Bragg incidence of a crystal.
fn incidence_angle(config: &ElementConfig, law: &InteractionLaw, photon_energy: f64) -> Result<f64> {
    match (config.angle_radial, config.grazing_angle, law) {
        (Some(angle), None, _) => Ok(angle),
        (None, Some(grazing), _) => Ok(FRAC_PI_2 - grazing),
        (None, None, InteractionLaw::Crystal(crystal)) => {
            crystal.central_incidence_angle(photon_energy).with_context(|| {
                format!(
                    "element '{}': no Bragg reflection at {} eV",
                    config.name, photon_energy
                )
            })
        }
        (Some(_), Some(_), _) => bail!("element '{}': give either angle_radial or grazing_angle", config.name),
        (None, None, _) => bail!("element '{}': missing angle_radial or grazing_angle", config.name),
    }
}

/// Build one beamline element. Missing exit angles follow the central ray at
/// `photon_energy`.
pub fn build_element(
    config: &ElementConfig,
    base: &Path,
    cache: &Arc<TableCache>,
    photon_energy: f64,
) -> Result<BeamlineElement> {
    let Some(surface) = &config.surface else {
        return build_empty_element(config);
    };
    let law = build_law(&config.law, base, cache)?;
    let angle_radial = incidence_angle(config, &law, photon_energy)?;
    let angle_radial_out = match config.angle_radial_out {
        Some(angle) => angle,
        None => law
            .central_exit_angle(angle_radial, photon_energy)
            .with_context(|| format!("element '{}'", config.name))?,
    };
    let coordinates = ElementCoordinates {
        p: config.p,
        q: config.q,
        angle_radial,
        angle_radial_out,
        angle_azimuthal: config.angle_azimuthal,
    };
    let reflectivity = build_reflectivity(&config.reflectivity, base, cache)?;

    let mut surface = surface.clone();
    if let rayline_geometry::SurfaceShape::NumericalMesh { file: Some(file), .. } = &mut surface {
        *file = resolve(base, file);
    }
    let element = OpticalElement::builder(config.name.clone())
        .shape(surface)
        .boundary(config.boundary.clone())
        .law(law)
        .reflectivity(reflectivity)
        .cache(Arc::clone(cache))
        .build()
        .with_context(|| format!("Cannot build element '{}'", config.name))?;

    let mut element = BeamlineElement::new(element, coordinates);
    if let Some(movement) = config.movement {
        element = element.with_movement(movement);
    }
    Ok(element)
}

/// An element without a surface: frame change and drift only. The beam
/// continues straight on unless an exit angle is given.
fn build_empty_element(config: &ElementConfig) -> Result<BeamlineElement> {
    let plain = matches!(config.law, LawConfig::SpecularReflection)
        && matches!(config.reflectivity, ReflectivityConfig::None)
        && matches!(config.boundary, BoundaryShape::None)
        && config.movement.is_none();
    if !plain {
        bail!(
            "element '{}' has no surface, so it cannot take a law, reflectivity, boundary or movement",
            config.name
        );
    }
    let angle_radial = match (config.angle_radial, config.grazing_angle) {
        (Some(angle), None) => angle,
        (None, Some(grazing)) => FRAC_PI_2 - grazing,
        (None, None) => 0.0,
        (Some(_), Some(_)) => bail!("element '{}': give either angle_radial or grazing_angle", config.name),
    };
    let coordinates = ElementCoordinates {
        p: config.p,
        q: config.q,
        angle_radial,
        angle_radial_out: config.angle_radial_out.unwrap_or(PI - angle_radial),
        angle_azimuthal: config.angle_azimuthal,
    };
    Ok(BeamlineElement::new(OpticalElement::empty(config.name.clone()), coordinates))
}

/// Build the beamline described by a job for a given central photon energy.
pub fn build_beamline(job: &JobConfig, base: &Path, photon_energy: f64) -> Result<Beamline> {
    if job.elements.is_empty() {
        bail!("job has no [[element]] entries");
    }
    let cache = Arc::new(TableCache::new());
    let mut beamline = Beamline::new();
    for config in &job.elements {
        beamline.push(build_element(config, base, &cache, photon_energy)?);
    }
    log::debug!("{} tables loaded for {} elements", cache.len(), beamline.len());
    Ok(beamline)
}

/// Photon energy of the central ray: the mean over good source rays.
pub fn central_energy(source: &RayBeam) -> Result<f64> {
    source
        .mean(Column::PhotonEnergy, RayFilter::Good, false)
        .context("source beam has no good rays")
}

/// Build and trace a job. `base` is the directory relative paths start from.
pub fn run_job(job: &JobConfig, base: &Path) -> Result<JobOutput> {
    let source = build_source(&job.source, base)?;
    let energy = central_energy(&source)?;
    println!("Source: {} rays, {:.3} eV", source.len(), energy);

    let beamline = build_beamline(job, base, energy)?;
    let trace = beamline.trace(&source)?;
    for (i, (element, footprint)) in beamline.elements().iter().zip(&trace.footprints).enumerate() {
        println!(
            "  [{}/{}] {}: {} good, {} lost",
            i + 1,
            beamline.len(),
            element.element().name(),
            footprint.good_count(),
            footprint.lost_count()
        );
    }
    Ok(JobOutput {
        source,
        beamline,
        trace,
    })
}

/// Write the requested outputs into `out_dir`.
pub fn write_outputs(output: &JobOutput, job: &JobConfig, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("Cannot create {}", out_dir.display()))?;

    if job.output.save_image {
        let path = out_dir.join("image.dat");
        output
            .trace
            .image
            .write_text_file(&path)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        println!("Image beam written to: {}", path.display());
    }

    if job.output.save_footprints {
        for (i, footprint) in output.trace.footprints.iter().enumerate() {
            let path = out_dir.join(format!("footprint_{:02}.dat", i + 1));
            footprint
                .write_text_file(&path)
                .with_context(|| format!("Cannot write {}", path.display()))?;
        }
        println!("Footprints written to: {}", out_dir.display());
    }

    if job.output.save_summary {
        let path = out_dir.join("summary.json");
        let json = serde_json::to_string_pretty(&output.report()).context("JSON serialisation error")?;
        std::fs::write(&path, json).with_context(|| format!("Cannot write {}", path.display()))?;
        println!("Summary written to: {}", path.display());
    }
    Ok(())
}
