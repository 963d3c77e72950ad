//! End-to-end traces through complete elements and beamlines.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::Vector3;
use num_complex::Complex64;

use rayline_core::{BoundaryShape, Column, RayBeam, RayFilter};
use rayline_geometry::surface::{Convexity, FocalGeometry};
use rayline_geometry::{ElementCoordinates, SurfaceShape};
use rayline_materials::ConstantIndex;
use rayline_optics::{
    Beamline, BeamlineElement, CrystalDiffraction, DarwinCurve, Grating, InteractionLaw, LightSource,
    OpticalElement, PointSource, ReflectivitySource, Refractor, TraceParams,
};

fn point_source(n: usize, divergence: f64, photon_energy: f64) -> RayBeam {
    PointSource {
        nx: n,
        nz: n,
        divergence_x: divergence,
        divergence_z: divergence,
        photon_energy,
        ..Default::default()
    }
    .get_beam()
    .unwrap()
}

fn ellipsoid(p: f64, q: f64, grazing: f64) -> SurfaceShape {
    SurfaceShape::Ellipsoid {
        focus: FocalGeometry::new(p, q, grazing),
        convexity: Convexity::Upward,
        cylinder: None,
    }
}

#[test]
fn flat_mirror_images_an_unfolded_drift() {
    let theta = 1.0f64.to_radians();
    let mirror = OpticalElement::builder("flat").shape(SurfaceShape::Plane).build().unwrap();
    let element = BeamlineElement::new(mirror, ElementCoordinates::from_grazing(10.0, 10.0, theta, theta));
    let source = point_source(100, 4e-4, 1000.0);
    assert_eq!(source.len(), 10000);

    let (image, _) = element.trace_beam(&source, &TraceParams::default()).unwrap();
    assert_eq!(image.good_count(), 10000);
    for (input, output) in source.iter().zip(image.iter()) {
        let v = input.direction;
        assert_abs_diff_eq!(output.position.x, 20.0 * v.x / v.y, epsilon = 1e-10);
        assert_abs_diff_eq!(output.position.y, 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(output.position.z, -20.0 * v.z / v.y, epsilon = 1e-10);
        assert_abs_diff_eq!(output.direction, Vector3::new(v.x, v.y, -v.z), epsilon = 1e-12);
        assert_eq!(output.index, input.index);
    }
}

#[test]
fn ellipsoid_focuses_point_source() {
    let (p, q, theta) = (10.0, 10.0, 0.02);
    let mirror = OpticalElement::builder("kb").shape(ellipsoid(p, q, theta)).build().unwrap();
    let element = BeamlineElement::new(mirror, ElementCoordinates::from_grazing(p, q, theta, theta));
    let (image, _) = element
        .trace_beam(&point_source(21, 2e-4, 1000.0), &TraceParams::default())
        .unwrap();
    assert_eq!(image.good_count(), 441);
    let sx = image.standard_deviation(Column::X, RayFilter::Good, false).unwrap();
    let sz = image.standard_deviation(Column::Z, RayFilter::Good, false).unwrap();
    assert!(sx < 1e-8, "x spread {}", sx);
    assert!(sz < 1e-8, "z spread {}", sz);
}

#[test]
fn toroid_focuses_at_grazing_incidence() {
    let (p, q, theta) = (10.0, 10.0, 0.003);
    let shape = SurfaceShape::Toroid {
        major_radius: None,
        minor_radius: None,
        focus: Some(FocalGeometry::new(p, q, theta)),
        convexity: Convexity::Upward,
    };
    let mirror = OpticalElement::builder("toroid").shape(shape).build().unwrap();
    let element = BeamlineElement::new(mirror, ElementCoordinates::from_grazing(p, q, theta, theta));
    let (image, _) = element
        .trace_beam(&point_source(3, 2e-5, 1000.0), &TraceParams::default())
        .unwrap();
    assert_eq!(image.good_count(), 9);
    for ray in image.iter() {
        assert!(ray.position.x.abs() < 1e-7, "x = {}", ray.position.x);
        assert!(ray.position.z.abs() < 1e-7, "z = {}", ray.position.z);
    }
    let central = &image.rays()[4];
    assert_abs_diff_eq!(central.position.norm(), 0.0, epsilon = 1e-10);
}

#[test]
fn perfect_mirror_conserves_intensity() {
    let mirror = OpticalElement::builder("flat").shape(SurfaceShape::Plane).build().unwrap();
    let element = BeamlineElement::new(mirror, ElementCoordinates::from_grazing(3.0, 4.0, 0.005, 0.005));
    let source = PointSource {
        nx: 7,
        nz: 5,
        divergence_x: 1e-3,
        divergence_z: 1e-3,
        polarization_degree: 0.7,
        phase_difference: 0.3,
        ..Default::default()
    }
    .get_beam()
    .unwrap();
    let (image, _) = element.trace_beam(&source, &TraceParams::default()).unwrap();
    assert_relative_eq!(
        image.intensity(RayFilter::Good),
        source.intensity(RayFilter::All),
        max_relative = 1e-12
    );
    let before = source.get_column(Column::S3, RayFilter::All);
    let after = image.get_column(Column::S3, RayFilter::All);
    for (a, b) in before.iter().zip(&after) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn silicon_mirror_reflectivity_at_three_mrad() {
    let theta = 3e-3;
    let mirror = OpticalElement::builder("si")
        .shape(SurfaceShape::Plane)
        .reflectivity(ReflectivitySource::RefractionIndex {
            index: Complex64::new(1.0 - 7.5772e-6, 1.7476e-7),
        })
        .build()
        .unwrap();
    let element = BeamlineElement::new(mirror, ElementCoordinates::from_grazing(1.0, 1.0, theta, theta));
    let (image, _) = element
        .trace_beam(&point_source(1, 0.0, 8000.0), &TraceParams::default())
        .unwrap();
    let ray = image.rays()[0];
    assert!(ray.is_good());
    assert_relative_eq!(ray.intensity_s(), 0.9458, max_relative = 0.01);
    assert_abs_diff_eq!(ray.intensity_p(), 0.0, epsilon = 1e-15);
}

#[test]
fn clipped_rays_are_accounted_for() {
    let (p, q, theta) = (10.0, 10.0, 0.02);
    let mirror = OpticalElement::builder("clipped")
        .shape(ellipsoid(p, q, theta))
        .boundary(BoundaryShape::Rectangle {
            x_left: -5e-4,
            x_right: 5e-4,
            y_bottom: -0.02,
            y_top: 0.02,
        })
        .build()
        .unwrap();
    let beamline = Beamline::new().with_element(BeamlineElement::new(
        mirror,
        ElementCoordinates::from_grazing(p, q, theta, theta),
    ));
    let source = point_source(11, 2e-4, 1000.0);
    let trace = beamline.trace(&source).unwrap();
    let image = &trace.image;
    let good = image.count(RayFilter::Good);
    let lost = image.count(RayFilter::Lost);
    assert_eq!(good + lost, source.len());
    assert!(good > 0 && lost > 0);
    assert!(image.iter().filter(|r| r.is_lost()).all(|r| r.flag == -1.0));
    // The footprint of every surviving ray lies inside the boundary.
    for ray in trace.footprints[0].iter().filter(|r| r.is_good()) {
        assert!(ray.position.x.abs() <= 5e-4 && ray.position.y.abs() <= 0.02);
    }
}

#[test]
fn refraction_into_glass() {
    let incidence = 0.5f64;
    let law = InteractionLaw::Refraction(Refractor::new(
        Arc::new(ConstantIndex::vacuum()),
        Arc::new(ConstantIndex::from_index("glass", Complex64::new(1.5, 0.0))),
    ));
    let exit = law.central_exit_angle(incidence, 1000.0).unwrap();
    // Measured from the +z normal, so the transmitted ray sits past π/2.
    assert!(exit > FRAC_PI_2);
    assert_abs_diff_eq!((std::f64::consts::PI - exit).sin(), incidence.sin() / 1.5, epsilon = 1e-14);

    let interface = OpticalElement::builder("interface")
        .shape(SurfaceShape::Plane)
        .law(law)
        .build()
        .unwrap();
    let coordinates = ElementCoordinates {
        angle_radial_out: exit,
        ..ElementCoordinates::new(1.0, 2.0, incidence)
    };
    let element = BeamlineElement::new(interface, coordinates);
    let (image, _) = element
        .trace_beam(&point_source(1, 0.0, 1000.0), &TraceParams::default())
        .unwrap();
    let ray = image.rays()[0];
    assert!(ray.is_good());
    assert_abs_diff_eq!(ray.position, Vector3::zeros(), epsilon = 1e-12);
    assert_abs_diff_eq!(ray.direction, Vector3::y(), epsilon = 1e-12);
    assert_abs_diff_eq!(ray.optical_path, 1.0 + 1.5 * 2.0, epsilon = 1e-12);
}

#[test]
fn grating_follows_the_grating_equation() {
    let grazing = 0.04f64;
    let energy = 100.0;
    let grating = Grating::uniform(1.2e6, -1);
    let law = InteractionLaw::Grating(grating);
    let exit = law.central_exit_angle(FRAC_PI_2 - grazing, energy).unwrap();
    let wavelength = rayline_core::units::energy_to_wavelength(energy);
    assert_abs_diff_eq!(exit.sin(), grazing.cos() - wavelength * 1.2e6, epsilon = 1e-12);

    let element = OpticalElement::builder("vls").shape(SurfaceShape::Plane).law(law).build().unwrap();
    let coordinates = ElementCoordinates {
        angle_radial_out: exit,
        ..ElementCoordinates::new(10.0, 5.0, FRAC_PI_2 - grazing)
    };
    let element = BeamlineElement::new(element, coordinates);
    let (image, _) = element
        .trace_beam(&point_source(1, 0.0, energy), &TraceParams::default())
        .unwrap();
    let ray = image.rays()[0];
    assert_abs_diff_eq!(ray.position, Vector3::zeros(), epsilon = 1e-10);
    assert_abs_diff_eq!(ray.direction, Vector3::y(), epsilon = 1e-12);

    // Another energy leaves at another angle.
    let (shifted, _) = element
        .trace_beam(&point_source(1, 0.0, 101.0), &TraceParams::default())
        .unwrap();
    let ray = shifted.rays()[0];
    assert!(ray.is_good());
    assert!(ray.position.z.abs() > 1e-3);
    assert_abs_diff_eq!(ray.position.x, 0.0, epsilon = 1e-12);
}

#[test]
fn crystal_reflects_only_inside_darwin_width() {
    let energy = 8000.0;
    let structure = Arc::new(DarwinCurve::new("Si(111)", 3.1356e-10, 2.3e-5).unwrap());
    let crystal = CrystalDiffraction::new(structure);
    let incidence = crystal.central_incidence_angle(energy).unwrap();
    let law = InteractionLaw::Crystal(crystal);
    let exit = law.central_exit_angle(incidence, energy).unwrap();
    assert_abs_diff_eq!(exit, incidence, epsilon = 1e-12);

    let element = OpticalElement::builder("si111").shape(SurfaceShape::Plane).law(law).build().unwrap();
    let coordinates = ElementCoordinates {
        angle_radial_out: exit,
        ..ElementCoordinates::new(1.0, 1.0, incidence)
    };
    let source = PointSource {
        nz: 3,
        divergence_z: 2e-3,
        photon_energy: energy,
        ..Default::default()
    }
    .get_beam()
    .unwrap();
    let (image, _) = BeamlineElement::new(element, coordinates)
        .trace_beam(&source, &TraceParams::default())
        .unwrap();
    assert_eq!(image.good_count(), 3);
    let central = image.rays()[1];
    assert_abs_diff_eq!(central.intensity(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(central.position, Vector3::zeros(), epsilon = 1e-12);
    assert!(image.rays()[0].intensity() < 1e-3);
    assert!(image.rays()[2].intensity() < 1e-3);
}

#[test]
fn two_mirror_beamline_keeps_ray_order() {
    let theta = 0.01;
    let flat = || OpticalElement::builder("flat").shape(SurfaceShape::Plane).build().unwrap();
    let beamline = Beamline::new()
        .with_element(BeamlineElement::new(flat(), ElementCoordinates::from_grazing(5.0, 5.0, theta, theta)))
        .with_element(BeamlineElement::new(flat(), ElementCoordinates::from_grazing(5.0, 5.0, theta, theta)));
    let source = point_source(5, 1e-4, 500.0);
    let trace = beamline.trace(&source).unwrap();
    assert_eq!(trace.footprints.len(), 2);
    // Two reflections restore the original orientation over a 20 m drift.
    for (input, output) in source.iter().zip(trace.image.iter()) {
        let v = input.direction;
        assert_eq!(output.index, input.index);
        assert_abs_diff_eq!(output.position.x, 20.0 * v.x / v.y, epsilon = 1e-10);
        assert_abs_diff_eq!(output.position.z, 20.0 * v.z / v.y, epsilon = 1e-10);
        assert_abs_diff_eq!(output.direction, v, epsilon = 1e-12);
    }
}
