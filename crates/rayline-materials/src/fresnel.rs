//! Mirror reflectivity from a complex refraction index.
//!
//! For an index $n = 1 - \delta + i\beta$ write $\alpha = 2\delta$ and
//! $\gamma = 2\beta$. At grazing angle $\theta$ the power reflectivities of
//! a thick, smooth mirror are
//!
//! $$\rho^2 = \tfrac12\left[\sin^2\theta - \alpha + \sqrt{(\sin^2\theta - \alpha)^2 + \gamma^2}\right]$$
//! $$R_s = \frac{4\rho^2(\sin\theta - \rho)^2 + \gamma^2}{4\rho^2(\sin\theta + \rho)^2 + \gamma^2}$$
//! $$R_p = R_s\,\frac{4\rho^2(\rho\sin\theta - \cos^2\theta)^2 + \gamma^2\sin^2\theta}{4\rho^2(\rho\sin\theta + \cos^2\theta)^2 + \gamma^2\sin^2\theta}$$
//!
//! Complex amplitudes, which also carry the reflection phase, follow from
//! the Fresnel equations with the normal wavevector components
//! $k_{z,1} = \sin\theta$ and $k_{z,2} = \sqrt{n^2 - \cos^2\theta}$.

use num_complex::Complex64;

/// Power reflectivities $(R_s, R_p)$ of a smooth mirror.
///
/// # Arguments
/// * `index` - Complex refraction index of the mirror material.
/// * `grazing_angle` - Angle between the ray and the surface (rad).
pub fn reflectivity(index: Complex64, grazing_angle: f64) -> (f64, f64) {
    let alpha = 2.0 * (1.0 - index.re);
    let gamma = 2.0 * index.im.abs();
    let (sin_t, cos_t) = grazing_angle.sin_cos();
    let sin2 = sin_t * sin_t;
    let cos2 = cos_t * cos_t;

    let a = sin2 - alpha;
    let root = (a * a + gamma * gamma).sqrt();
    // Below the critical angle a < 0; the rationalised form avoids cancellation.
    let rho2 = if a >= 0.0 {
        0.5 * (a + root)
    } else {
        0.5 * gamma * gamma / (root - a)
    };
    if rho2 == 0.0 {
        // Lossless material below the critical angle.
        return (1.0, 1.0);
    }
    let rho = rho2.sqrt();
    let g2 = gamma * gamma;

    let rs = (4.0 * rho2 * (sin_t - rho).powi(2) + g2) / (4.0 * rho2 * (sin_t + rho).powi(2) + g2);
    let num = 4.0 * rho2 * (rho * sin_t - cos2).powi(2) + g2 * sin2;
    let den = 4.0 * rho2 * (rho * sin_t + cos2).powi(2) + g2 * sin2;
    let rp = rs * num / den;
    (rs, rp)
}

/// Complex Fresnel amplitudes $(r_s, r_p)$ of a smooth mirror in vacuum.
pub fn amplitudes(index: Complex64, grazing_angle: f64) -> (Complex64, Complex64) {
    let (sin_t, cos_t) = grazing_angle.sin_cos();
    let kz1 = Complex64::new(sin_t, 0.0);
    let n2 = index * index;
    let kz2 = (n2 - cos_t * cos_t).sqrt();
    let rs = (kz1 - kz2) / (kz1 + kz2);
    let rp = (n2 * kz1 - kz2) / (n2 * kz1 + kz2);
    (rs, rp)
}

/// Névot–Croce attenuation of the reflected amplitude by interface roughness,
/// $\exp(-2 k^2 \sigma^2 k_{z,1} k_{z,2})$.
///
/// # Arguments
/// * `index` - Complex refraction index of the mirror material.
/// * `grazing_angle` - Grazing angle (rad).
/// * `wavenumber` - Vacuum wavenumber $2\pi/\lambda$ (m⁻¹).
/// * `roughness_rms` - RMS roughness $\sigma$ (m).
pub fn roughness_factor(index: Complex64, grazing_angle: f64, wavenumber: f64, roughness_rms: f64) -> Complex64 {
    if roughness_rms == 0.0 {
        return Complex64::new(1.0, 0.0);
    }
    let (sin_t, cos_t) = grazing_angle.sin_cos();
    let kz2 = (index * index - cos_t * cos_t).sqrt();
    let k2s2 = (wavenumber * roughness_rms).powi(2);
    (-2.0 * k2s2 * sin_t * kz2).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn silicon_8kev() -> Complex64 {
        Complex64::new(1.0 - 7.5772e-6, 1.7476e-7)
    }

    #[test]
    fn test_silicon_reference_values() {
        let (rs, rp) = reflectivity(silicon_8kev(), 3e-3);
        assert_abs_diff_eq!(rs, 0.945_787_856, epsilon = 1e-8);
        assert_abs_diff_eq!(rp, 0.945_787_057, epsilon = 1e-8);
    }

    #[test]
    fn test_complex_amplitudes_match_power() {
        let n = silicon_8kev();
        for theta in [1e-3, 3e-3, 4e-3, 1e-2] {
            let (rs, rp) = reflectivity(n, theta);
            let (a_s, a_p) = amplitudes(n, theta);
            assert_abs_diff_eq!(a_s.norm_sqr(), rs, epsilon = 5e-5);
            assert_abs_diff_eq!(a_p.norm_sqr(), rp, epsilon = 5e-5);
        }
    }

    #[test]
    fn test_total_reflection_below_critical_angle() {
        let n = Complex64::new(1.0 - 1e-5, 0.0);
        let critical = (2.0e-5f64).sqrt();
        let (rs, _) = reflectivity(n, 0.5 * critical);
        assert_abs_diff_eq!(rs, 1.0, epsilon = 1e-12);
        let (rs_high, _) = reflectivity(n, 3.0 * critical);
        assert!(rs_high < 0.05);
    }

    #[test]
    fn test_roughness_reduces_reflectivity() {
        let n = silicon_8kev();
        let k = 2.0 * std::f64::consts::PI / 1.5498e-10;
        let smooth = roughness_factor(n, 5e-3, k, 0.0);
        let rough = roughness_factor(n, 5e-3, k, 5e-10);
        assert_eq!(smooth, Complex64::new(1.0, 0.0));
        assert!(rough.norm() < 1.0);
    }
}
