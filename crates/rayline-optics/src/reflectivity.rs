//! Reflectivity of optical surfaces.
//!
//! A [`ReflectivitySource`] names where reflectivities come from; it is
//! resolved once, when the element is built, into a [`ReflectivityModel`]
//! holding the loaded data. Tables are read through a [`TableCache`] so that
//! elements sharing a file share one parsed copy.

use std::path::PathBuf;
use std::sync::Arc;

use num_complex::Complex64;

use rayline_materials::fresnel;
use rayline_materials::{
    ConstantIndex, CurveAxis, Interpolation, OpticalConstants, ReflectivityCurve, ReflectivityMap, TableCache,
};

use crate::error::TraceError;

/// Where the reflectivity of a surface comes from.
#[derive(Debug, Clone, Default)]
pub enum ReflectivitySource {
    /// Perfect reflector; amplitudes are left unchanged.
    #[default]
    None,
    /// Fresnel reflectivity from a PreRefl optical-constant file.
    PreRefl { file: PathBuf },
    /// Fresnel reflectivity from a fixed complex refraction index.
    RefractionIndex { index: Complex64 },
    /// Tabulated reflectivity versus grazing angle.
    AngleTable { file: PathBuf },
    /// Tabulated reflectivity versus photon energy.
    EnergyTable { file: PathBuf },
    /// Tabulated reflectivity on an energy × angle grid.
    EnergyAngleTable { file: PathBuf, interpolation: Interpolation },
    /// Complex Fresnel amplitudes from an external optical-constant provider,
    /// with Névot–Croce roughness (m rms).
    Material {
        constants: Arc<dyn OpticalConstants>,
        roughness: f64,
    },
}

/// Loaded reflectivity data, ready to evaluate.
#[derive(Debug, Clone, Default)]
pub enum ReflectivityModel {
    #[default]
    Perfect,
    /// Power reflectivity from the ρ formula.
    Fresnel(Arc<dyn OpticalConstants>),
    /// Complex amplitudes with roughness attenuation.
    ComplexFresnel {
        constants: Arc<dyn OpticalConstants>,
        roughness: f64,
    },
    Curve(Arc<ReflectivityCurve>),
    Map(Arc<ReflectivityMap>),
}

impl ReflectivityModel {
    /// Load the data a source refers to.
    pub fn resolve(source: &ReflectivitySource, cache: &TableCache) -> Result<Self, TraceError> {
        Ok(match source {
            ReflectivitySource::None => Self::Perfect,
            ReflectivitySource::PreRefl { file } => Self::Fresnel(cache.prerefl(file)?),
            ReflectivitySource::RefractionIndex { index } => {
                Self::Fresnel(Arc::new(ConstantIndex::from_index("refraction index", *index)))
            }
            ReflectivitySource::AngleTable { file } => Self::Curve(cache.curve(file, CurveAxis::GrazingAngle)?),
            ReflectivitySource::EnergyTable { file } => Self::Curve(cache.curve(file, CurveAxis::PhotonEnergy)?),
            ReflectivitySource::EnergyAngleTable { file, interpolation } => {
                Self::Map(cache.map(file, *interpolation)?)
            }
            ReflectivitySource::Material { constants, roughness } => {
                if !(*roughness >= 0.0) {
                    return Err(TraceError::Configuration(format!(
                        "roughness must be non-negative, got {}",
                        roughness
                    )));
                }
                Self::ComplexFresnel {
                    constants: Arc::clone(constants),
                    roughness: *roughness,
                }
            }
        })
    }

    pub fn is_perfect(&self) -> bool {
        matches!(self, Self::Perfect)
    }

    /// Whether amplitudes carry a phase.
    pub fn is_complex(&self) -> bool {
        matches!(self, Self::ComplexFresnel { .. })
    }

    /// Amplitudes $(r_s, r_p)$ at a grazing angle (rad) and photon energy
    /// (eV). Real models return $\sqrt{R}$ with zero phase.
    pub fn amplitude(&self, grazing_angle: f64, photon_energy: f64) -> Result<(Complex64, Complex64), TraceError> {
        let real = |(rs, rp): (f64, f64)| {
            (
                Complex64::new(rs.max(0.0).sqrt(), 0.0),
                Complex64::new(rp.max(0.0).sqrt(), 0.0),
            )
        };
        Ok(match self {
            Self::Perfect => (Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)),
            Self::Fresnel(constants) => {
                let index = constants.refraction_index(photon_energy)?;
                real(fresnel::reflectivity(index, grazing_angle))
            }
            Self::ComplexFresnel { constants, roughness } => {
                let index = constants.refraction_index(photon_energy)?;
                let (rs, rp) = fresnel::amplitudes(index, grazing_angle);
                let k = 2.0 * std::f64::consts::PI / rayline_core::units::energy_to_wavelength(photon_energy);
                let damping = fresnel::roughness_factor(index, grazing_angle, k, *roughness);
                (rs * damping, rp * damping)
            }
            Self::Curve(curve) => match curve.axis() {
                CurveAxis::GrazingAngle => real(curve.evaluate(grazing_angle)),
                CurveAxis::PhotonEnergy => real(curve.evaluate(photon_energy)),
            },
            Self::Map(map) => real(map.evaluate(photon_energy, grazing_angle)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn silicon() -> Complex64 {
        Complex64::new(1.0 - 7.5772e-6, 1.7476e-7)
    }

    #[test]
    fn test_refraction_index_source_matches_reference() {
        let cache = TableCache::new();
        let model =
            ReflectivityModel::resolve(&ReflectivitySource::RefractionIndex { index: silicon() }, &cache).unwrap();
        let (rs, _) = model.amplitude(3e-3, 8000.0).unwrap();
        let reference = 0.9458;
        assert!((rs.norm_sqr() - reference).abs() / reference < 0.01);
        assert!(!model.is_complex());
    }

    #[test]
    fn test_material_source_gives_complex_amplitudes() {
        let cache = TableCache::new();
        let constants: Arc<dyn OpticalConstants> = Arc::new(ConstantIndex::from_index("Si", silicon()));
        let smooth = ReflectivityModel::resolve(
            &ReflectivitySource::Material {
                constants: Arc::clone(&constants),
                roughness: 0.0,
            },
            &cache,
        )
        .unwrap();
        let rough = ReflectivityModel::resolve(
            &ReflectivitySource::Material {
                constants,
                roughness: 1.0e-9,
            },
            &cache,
        )
        .unwrap();
        assert!(smooth.is_complex());
        let (s0, _) = smooth.amplitude(3e-3, 8000.0).unwrap();
        let (s1, _) = rough.amplitude(3e-3, 8000.0).unwrap();
        assert_abs_diff_eq!(s0.norm_sqr(), 0.9458, epsilon = 1e-3);
        assert!(s0.arg().abs() > 0.0);
        assert!(s1.norm() < s0.norm());
    }

    #[test]
    fn test_tables_through_cache() {
        let dir = tempfile::tempdir().unwrap();
        let angle = dir.path().join("angle.dat");
        std::fs::write(&angle, "1 0.81\n5 0.25\n").unwrap();
        let cache = TableCache::new();
        let model = ReflectivityModel::resolve(&ReflectivitySource::AngleTable { file: angle.clone() }, &cache).unwrap();
        let (rs, rp) = model.amplitude(1e-3, 500.0).unwrap();
        assert_abs_diff_eq!(rs.re, 0.9, epsilon = 1e-12);
        assert_eq!(rs, rp);

        let energy = dir.path().join("energy.dat");
        std::fs::write(&energy, "100 0.64\n200 0.36\n").unwrap();
        let model = ReflectivityModel::resolve(&ReflectivitySource::EnergyTable { file: energy }, &cache).unwrap();
        assert_abs_diff_eq!(model.amplitude(0.5, 100.0).unwrap().0.re, 0.8, epsilon = 1e-12);

        let again = ReflectivityModel::resolve(&ReflectivitySource::AngleTable { file: angle }, &cache).unwrap();
        assert!(matches!(again, ReflectivityModel::Curve(_)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_unreadable_table_is_configuration_error() {
        let cache = TableCache::new();
        let missing = ReflectivitySource::PreRefl {
            file: PathBuf::from("/nonexistent/si.dat"),
        };
        assert!(matches!(
            ReflectivityModel::resolve(&missing, &cache),
            Err(TraceError::Material(_))
        ));
        let bad = ReflectivitySource::Material {
            constants: Arc::new(ConstantIndex::vacuum()),
            roughness: -1.0,
        };
        assert!(matches!(
            ReflectivityModel::resolve(&bad, &cache),
            Err(TraceError::Configuration(_))
        ));
    }
}
