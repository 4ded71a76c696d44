//! Partial-wave decomposition of the Berreman matrix.
//!
//! The four eigenvalues `q` of the Berreman matrix are the normal wavevector
//! components of the partial waves a layer supports, and its eigenvectors are
//! their field patterns. An [`Eigensystem`] holds them in the fixed order
//! `[s+, p+, s-, p-]`: forward waves first, each pair ordered s-like then
//! p-like.
//!
//! Media whose tensor is diagonal with equal in-plane values (isotropic, or
//! uniaxial with the optic axis along the normal) use closed-form modes.
//! Everything else goes through a Schur decomposition for the eigenvalues and
//! singular value decompositions for the null vectors, with degenerate pairs
//! split into pure s and p patterns where the field allows it. Schur iterations
//! stall on some non-symmetric (gyrotropic) matrices; those fall back to the
//! roots of the characteristic quartic, polished by Newton steps on
//! `det(D - qI)`.

use nalgebra::{Matrix2, Matrix4, Vector4};
use num_complex::Complex64;
use tracing::{debug, trace};

use super::{delta_matrix, phase_factor, wavenumber, Propagate, PropagationMatrix};
use crate::config;
use crate::error::{Result, StrataError};
use crate::snell;
use crate::tensor::DielectricTensor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::{Euler, EulerConvention, Orientation};
    use crate::propagator::ExpmPropagator;
    use crate::tensor::{build_tensor, MaterialState};
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix3;

    fn biaxial() -> DielectricTensor {
        let state = MaterialState::Permittivity(vec![
            Complex64::new(2.0, 0.1),
            Complex64::new(2.5, 0.0),
            Complex64::new(3.0, 0.02),
        ]);
        let orientation = Orientation::new(Euler::new(30.0, 40.0, 20.0), EulerConvention::ZXZ);
        build_tensor(&state, Some(&orientation)).unwrap()
    }

    #[test]
    fn isotropic_modes() {
        let n = Complex64::new(1.5, 0.0);
        let kx = 0.6;
        let system = Eigensystem::new(&DielectricTensor::from_index(n), kx).unwrap();
        let q = snell::normal_component(n * n, kx);
        assert_abs_diff_eq!((system.q()[0] - q).norm(), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!((system.q()[3] + q).norm(), 0.0, epsilon = 1e-15);
        let p = system.mode(1);
        assert_abs_diff_eq!((p[0] - q / n).norm(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!((p[1] - n).norm(), 0.0, epsilon = 1e-14);
        let s = system.mode(2);
        assert_eq!(s[2], Complex64::new(1.0, 0.0));
        assert_abs_diff_eq!((s[3] + q).norm(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn degenerate_pair_is_split() {
        // an isotropic medium forced through the numeric path
        let tensor = DielectricTensor::from_index(Complex64::new(2.0, 0.05));
        let kx = 0.4;
        let analytic = Eigensystem::analytic(&tensor, kx).unwrap();
        let numeric = Eigensystem::numeric(&tensor, kx).unwrap();
        for j in 0..4 {
            assert_abs_diff_eq!((analytic.q()[j] - numeric.q()[j]).norm(), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(
                (analytic.mode(j) - numeric.mode(j)).norm(),
                0.0,
                epsilon = 1e-8
            );
        }
    }

    #[test]
    fn anisotropic_modes_are_eigenvectors() {
        let tensor = biaxial();
        let kx = 0.5;
        let delta = delta_matrix(&tensor, kx).unwrap();
        let system = Eigensystem::new(&tensor, kx).unwrap();
        for j in 0..4 {
            let v = system.mode(j);
            let residual = (delta * v - v * system.q()[j]).norm();
            assert!(residual < 1e-10, "mode {} residual {}", j, residual);
            assert_eq!(snell::is_forward(system.q()[j]), j < 2);
        }
        // the first mode of each pair carries more s character
        assert!(s_character(&system.mode(0)) > s_character(&system.mode(1)));
        assert!(s_character(&system.mode(2)) > s_character(&system.mode(3)));
    }

    #[test]
    fn matches_matrix_exponential() {
        let tensor = biaxial();
        let eig = EigenPropagator.propagate(&tensor, 0.5, 120.0, 600.0).unwrap();
        let expm = ExpmPropagator.propagate(&tensor, 0.5, 120.0, 600.0).unwrap();
        let difference = (eig.to_full() - expm.to_full()).norm() / expm.to_full().norm();
        assert!(difference < 1e-9, "relative difference {}", difference);
    }

    fn polar_kerr() -> DielectricTensor {
        let eps = Complex64::new(4.0, 0.1);
        let g = Complex64::new(0.0, 0.2);
        let zero = Complex64::new(0.0, 0.0);
        build_tensor(
            &MaterialState::Tensor(Matrix3::new(eps, g, zero, -g, eps, zero, zero, zero, eps)),
            None,
        )
        .unwrap()
    }

    #[test]
    fn gyrotropic_quartic_roots() {
        let delta = delta_matrix(&polar_kerr(), 0.0).unwrap();
        let roots = characteristic_roots(&delta).unwrap();
        // circular waves with eps +- g on the in-plane block
        for q2 in [Complex64::new(4.2, 0.1), Complex64::new(3.8, 0.1)] {
            for q in [q2.sqrt(), -q2.sqrt()] {
                let closest = roots.iter().map(|r| (r - q).norm()).fold(f64::INFINITY, f64::min);
                assert!(closest < 1e-10, "no root near {}: {:?}", q, roots);
            }
        }
    }

    #[test]
    fn polar_kerr_layer() {
        for kx in [0.0, 0.3, 0.7] {
            let tensor = polar_kerr();
            let system = Eigensystem::new(&tensor, kx).unwrap();
            let delta = delta_matrix(&tensor, kx).unwrap();
            for j in 0..4 {
                let v = system.mode(j);
                let residual = (delta * v - v * system.q()[j]).norm();
                assert!(residual < 1e-10, "kx {} mode {} residual {}", kx, j, residual);
            }
            let eig = EigenPropagator.propagate(&tensor, kx, 50.0, 633.0).unwrap();
            let expm = ExpmPropagator.propagate(&tensor, kx, 50.0, 633.0).unwrap();
            let difference = (eig.to_full() - expm.to_full()).norm() / expm.to_full().norm();
            assert!(difference < 1e-9, "kx {} relative difference {}", kx, difference);
        }
    }

    #[test]
    fn quartic_merges_double_roots() {
        let tensor = DielectricTensor::from_index(Complex64::new(1.8, 0.02));
        let delta = delta_matrix(&tensor, 0.5).unwrap();
        let roots = characteristic_roots(&delta).unwrap();
        let q = snell::normal_component(tensor.matrix()[(0, 0)], 0.5);
        for expected in [q, -q] {
            let matching = roots.iter().filter(|r| (*r - expected).norm() < 1e-9).count();
            assert_eq!(matching, 2, "{:?}", roots);
        }
    }

    #[test]
    fn ill_conditioned_modes_are_refused() {
        let mut modes = Matrix4::identity();
        modes[(0, 1)] = Complex64::new(1.0, 0.0);
        modes[(1, 1)] = Complex64::new(1e-14, 0.0);
        let system = Eigensystem {
            q: [Complex64::new(1.0, 0.0); 4],
            modes,
        };
        assert!(matches!(
            system.inverse(),
            Err(StrataError::NumericalInstability(_))
        ));
    }

    #[test]
    fn zero_thickness_is_identity() {
        let p = EigenPropagator
            .propagate(&biaxial(), 0.3, 0.0, 500.0)
            .unwrap()
            .to_full();
        assert_abs_diff_eq!((p - Matrix4::identity()).norm(), 0.0, epsilon = 1e-12);
    }
}

/// Partial waves of one medium in the order `[s+, p+, s-, p-]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Eigensystem {
    q: [Complex64; 4],
    modes: Matrix4<Complex64>,
}

impl Eigensystem {
    pub fn new(tensor: &DielectricTensor, kx: f64) -> Result<Self> {
        if tensor.is_uniaxial_normal() {
            Self::analytic(tensor, kx)
        } else {
            Self::numeric(tensor, kx)
        }
    }

    /// Closed-form modes of a medium whose optic axis, if any, is the normal.
    fn analytic(tensor: &DielectricTensor, kx: f64) -> Result<Self> {
        let e = tensor.matrix();
        let (exx, eyy, ezz) = (e[(0, 0)], e[(1, 1)], e[(2, 2)]);
        if ezz.norm() <= config::TENSOR_TOLERANCE {
            return Err(StrataError::InvalidMaterial(
                "eps_zz vanishes, the partial waves are undefined".to_string(),
            ));
        }
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        let qs = snell::normal_component(eyy, kx);
        let qp = snell::forward((exx * (1.0 - kx * kx / ezz)).sqrt());

        let modes = [
            Vector4::new(zero, zero, one, qs),
            normalize_mode(tensor, kx, Vector4::new(qp, exx, zero, zero), 0),
            Vector4::new(zero, zero, one, -qs),
            normalize_mode(tensor, kx, Vector4::new(qp, -exx, zero, zero), 0),
        ];
        Ok(Self {
            q: [qs, qp, -qs, -qp],
            modes: Matrix4::from_columns(&modes),
        })
    }

    /// Modes from the eigenvalues of the Berreman matrix and its null vectors.
    fn numeric(tensor: &DielectricTensor, kx: f64) -> Result<Self> {
        let delta = delta_matrix(tensor, kx)?;
        let eigenvalues = match delta
            .try_schur(f64::EPSILON, config::MAX_ITERATIONS)
            .and_then(|schur| schur.eigenvalues())
        {
            Some(eigenvalues) => [eigenvalues[0], eigenvalues[1], eigenvalues[2], eigenvalues[3]],
            None => {
                debug!("Schur iteration stalled, using the characteristic quartic");
                characteristic_roots(&delta)?
            }
        };
        trace!("partial-wave eigenvalues: {:?}", eigenvalues);

        let (forward, backward): (Vec<Complex64>, Vec<Complex64>) =
            eigenvalues.iter().copied().partition(|q| snell::is_forward(*q));
        if forward.len() != 2 {
            return Err(StrataError::NumericalInstability(format!(
                "expected two forward and two backward partial waves, found {} forward",
                forward.len()
            )));
        }

        let [(qs_f, s_f), (qp_f, p_f)] = mode_pair(tensor, kx, &delta, forward[0], forward[1])?;
        let [(qs_b, s_b), (qp_b, p_b)] = mode_pair(tensor, kx, &delta, backward[0], backward[1])?;
        Ok(Self {
            q: [qs_f, qp_f, qs_b, qp_b],
            modes: Matrix4::from_columns(&[s_f, p_f, s_b, p_b]),
        })
    }

    /// Normal wavevector components, normalized by `k0`.
    pub fn q(&self) -> &[Complex64; 4] {
        &self.q
    }

    /// Mode matrix with the partial waves as columns.
    pub fn modes(&self) -> &Matrix4<Complex64> {
        &self.modes
    }

    pub fn mode(&self, index: usize) -> Vector4<Complex64> {
        self.modes.column(index).into_owned()
    }

    /// Inverse of the mode matrix, refused when it is ill conditioned.
    pub fn inverse(&self) -> Result<Matrix4<Complex64>> {
        let inverse = self.modes.try_inverse().ok_or_else(|| {
            StrataError::NumericalInstability("partial-wave matrix is singular".to_string())
        })?;
        let condition = self.modes.norm() * inverse.norm();
        if !(condition <= config::MAX_CONDITION) {
            return Err(StrataError::NumericalInstability(format!(
                "partial-wave matrix condition {:.3e} exceeds {:.0e}",
                condition,
                config::MAX_CONDITION
            )));
        }
        Ok(inverse)
    }
}

/// Coefficients `[c0, c1, c2, c3]` of the monic `det(qI - D)`, by Faddeev-LeVerrier.
fn characteristic_polynomial(delta: &Matrix4<Complex64>) -> [Complex64; 4] {
    let identity = Matrix4::<Complex64>::identity();
    let mut coefficients = [Complex64::new(0.0, 0.0); 4];
    let mut m = identity;
    for k in 1..=4 {
        let am = delta * m;
        let c = -am.trace() / k as f64;
        coefficients[4 - k] = c;
        m = am + identity * c;
    }
    coefficients
}

/// Eigenvalues of `D` as the roots of its characteristic quartic.
///
/// Simultaneous Durand-Kerner iteration finds all four roots at once. Roots
/// closer than [`config::CLUSTER_TOLERANCE`] are merged to their mean, which
/// is accurate even where the individual members of a double root are not;
/// the others are refined by Newton steps on the determinant itself, whose
/// step is `1 / tr((D - qI)^-1)`.
fn characteristic_roots(delta: &Matrix4<Complex64>) -> Result<[Complex64; 4]> {
    let c = characteristic_polynomial(delta);
    let p = |z: Complex64| c.iter().rev().fold(Complex64::new(1.0, 0.0), |acc, ci| acc * z + ci);
    let radius = 1.0 + c.iter().map(|ci| ci.norm()).fold(0.0, f64::max);

    let mut roots: [Complex64; 4] = std::array::from_fn(|k| {
        Complex64::from_polar(radius, 0.4 + k as f64 * std::f64::consts::FRAC_PI_2)
    });
    for _ in 0..config::MAX_ITERATIONS {
        let mut largest_step = 0.0f64;
        for i in 0..4 {
            let denominator = (0..4)
                .filter(|&j| j != i)
                .fold(Complex64::new(1.0, 0.0), |acc, j| acc * (roots[i] - roots[j]));
            if denominator.norm() == 0.0 {
                continue;
            }
            let step = p(roots[i]) / denominator;
            roots[i] -= step;
            largest_step = largest_step.max(step.norm() / (1.0 + roots[i].norm()));
        }
        if largest_step <= f64::EPSILON {
            break;
        }
    }
    if roots.iter().any(|z| !(z.re.is_finite() && z.im.is_finite())) {
        return Err(StrataError::NumericalInstability(
            "characteristic quartic of the Berreman matrix has no finite roots".to_string(),
        ));
    }

    let mut clustered = [false; 4];
    for i in 0..4 {
        for j in i + 1..4 {
            let scale = 1.0 + roots[i].norm().max(roots[j].norm());
            if (roots[i] - roots[j]).norm() <= config::CLUSTER_TOLERANCE * scale {
                let mean = (roots[i] + roots[j]) * 0.5;
                roots[i] = mean;
                roots[j] = mean;
                clustered[i] = true;
                clustered[j] = true;
            }
        }
    }
    for (root, _) in roots.iter_mut().zip(clustered).filter(|(_, c)| !c) {
        *root = newton_polish(delta, *root);
    }
    Ok(roots)
}

/// Newton refinement of an eigenvalue on `det(D - qI)`, kept while the determinant shrinks.
fn newton_polish(delta: &Matrix4<Complex64>, mut q: Complex64) -> Complex64 {
    let identity = Matrix4::<Complex64>::identity();
    let mut residual = (delta - identity * q).determinant().norm();
    for _ in 0..3 {
        let Some(inverse) = (delta - identity * q).try_inverse() else {
            break;
        };
        let trace = inverse.trace();
        if trace.norm() == 0.0 {
            break;
        }
        let candidate = q + trace.inv();
        let candidate_residual = (delta - identity * candidate).determinant().norm();
        if !(candidate_residual < residual) {
            break;
        }
        q = candidate;
        residual = candidate_residual;
    }
    q
}

/// Fraction of a field vector's squared norm carried by `(Ey, -Hx)`.
fn s_character(v: &Vector4<Complex64>) -> f64 {
    let total = v.norm_squared();
    if total == 0.0 {
        return 0.0;
    }
    (v[2].norm_sqr() + v[3].norm_sqr()) / total
}

/// Resolves the s-like and p-like members of one propagation direction.
fn mode_pair(
    tensor: &DielectricTensor,
    kx: f64,
    delta: &Matrix4<Complex64>,
    q1: Complex64,
    q2: Complex64,
) -> Result<[(Complex64, Vector4<Complex64>); 2]> {
    let degenerate = (q1 - q2).norm() <= config::DEGENERACY_TOLERANCE * (1.0 + q1.norm());

    let ((qs, s), (qp, p)) = if degenerate {
        let q = (q1 + q2) * 0.5;
        let directions = singular_directions(delta, q)?;
        let largest = directions[3].0.max(1.0);
        if directions[1].0 > config::NULLSPACE_TOLERANCE * largest {
            return Err(StrataError::NumericalInstability(format!(
                "degenerate partial waves at q = {} span a single direction",
                q
            )));
        }
        let (b1, b2) = (directions[0].1, directions[1].1);
        let (s, p) = split_degenerate(&b1, &b2).unwrap_or_else(|| {
            if s_character(&b1) >= s_character(&b2) {
                (b1, b2)
            } else {
                (b2, b1)
            }
        });
        ((q, s), (q, p))
    } else {
        let v1 = null_vector(delta, q1)?;
        let v2 = null_vector(delta, q2)?;
        if s_character(&v1) >= s_character(&v2) {
            ((q1, v1), (q2, v2))
        } else {
            ((q2, v2), (q1, v1))
        }
    };

    Ok([
        (qs, normalize_mode(tensor, kx, s, 2)),
        (qp, normalize_mode(tensor, kx, p, 0)),
    ])
}

/// Right singular vectors of `D - qI`, smallest singular value first.
fn singular_directions(
    delta: &Matrix4<Complex64>,
    q: Complex64,
) -> Result<Vec<(f64, Vector4<Complex64>)>> {
    let shifted = delta - Matrix4::identity() * q;
    let failed = || {
        StrataError::NumericalInstability(format!(
            "singular value decomposition failed for q = {}",
            q
        ))
    };
    let svd = shifted
        .try_svd(false, true, f64::EPSILON, config::MAX_ITERATIONS)
        .ok_or_else(failed)?;
    let v_t = svd.v_t.ok_or_else(failed)?;
    let mut directions: Vec<_> = svd
        .singular_values
        .iter()
        .enumerate()
        .map(|(i, sigma)| (*sigma, v_t.row(i).adjoint()))
        .collect();
    directions.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(directions)
}

fn null_vector(delta: &Matrix4<Complex64>, q: Complex64) -> Result<Vector4<Complex64>> {
    let directions = singular_directions(delta, q)?;
    let largest = directions[3].0.max(1.0);
    if directions[0].0 > config::NULLSPACE_TOLERANCE * largest {
        return Err(StrataError::NumericalInstability(format!(
            "q = {} is not an eigenvalue to working precision",
            q
        )));
    }
    Ok(directions[0].1)
}

/// Splits a two-dimensional eigenspace into a pure s and a pure p pattern.
fn split_degenerate(
    b1: &Vector4<Complex64>,
    b2: &Vector4<Complex64>,
) -> Option<(Vector4<Complex64>, Vector4<Complex64>)> {
    let s = combination_without(b1, b2, [0, 1])?;
    let p = combination_without(b1, b2, [2, 3])?;
    Some((s, p))
}

/// The unit combination of `b1` and `b2` whose `rows` components vanish.
fn combination_without(
    b1: &Vector4<Complex64>,
    b2: &Vector4<Complex64>,
    rows: [usize; 2],
) -> Option<Vector4<Complex64>> {
    let m = Matrix2::new(b1[rows[0]], b2[rows[0]], b1[rows[1]], b2[rows[1]]);
    if m.norm() <= config::SPLIT_TOLERANCE {
        return Some(*b1);
    }
    // null vector of the rank-one block, taken from its dominant row
    let r = if m.row(0).norm() >= m.row(1).norm() { 0 } else { 1 };
    let candidate = b1 * m[(r, 1)] - b2 * m[(r, 0)];
    let norm = candidate.norm();
    if norm <= f64::EPSILON {
        return None;
    }
    let residual = (candidate[rows[0]].norm_sqr() + candidate[rows[1]].norm_sqr()).sqrt() / norm;
    (residual <= config::SPLIT_TOLERANCE).then(|| candidate.unscale(norm))
}

/// Scales a mode to unit electric field and fixes its sign.
///
/// **Context**: Eigenvectors are only defined up to a complex factor. The
/// boundary matrices need a reproducible choice so that results do not depend
/// on how a decomposition happened to scale them.
///
/// **How it Works**: Reconstructs `Ez` from the constitutive relation, divides
/// by the bilinear norm `sqrt(Ex^2 + Ey^2 + Ez^2)` (which gives `(cos, n)` for
/// isotropic p waves) or by the Hermitian norm when the bilinear one nearly
/// vanishes, then makes the real part of the `dominant` field component
/// non-negative.
fn normalize_mode(
    tensor: &DielectricTensor,
    kx: f64,
    v: Vector4<Complex64>,
    dominant: usize,
) -> Vector4<Complex64> {
    let e = tensor.matrix();
    let ez = -(v[1] * kx + e[(2, 0)] * v[0] + e[(2, 1)] * v[2]) / e[(2, 2)];
    let bilinear = v[0] * v[0] + v[2] * v[2] + ez * ez;
    let hermitian = v[0].norm_sqr() + v[2].norm_sqr() + ez.norm_sqr();
    let scale = if bilinear.norm() > 1e-8 * hermitian {
        bilinear.sqrt()
    } else {
        Complex64::new(hermitian.sqrt(), 0.0)
    };
    if scale.norm() == 0.0 {
        return v;
    }
    let v = v / scale;
    if v[dominant].re < 0.0 {
        -v
    } else {
        v
    }
}

/// Eigen-decomposition propagator, `P = W diag(exp(-i k0 q d)) W^-1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EigenPropagator;

impl Propagate for EigenPropagator {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix> {
        let k0 = wavenumber(thickness, wavelength)?;
        let system = Eigensystem::new(tensor, kx)?;
        let inverse = system.inverse()?;
        let exponent = Complex64::new(0.0, -k0 * thickness);
        let phases = Vector4::from_iterator(system.q().iter().map(|q| phase_factor(exponent * q)));
        Ok(PropagationMatrix::Full(
            system.modes() * Matrix4::from_diagonal(&phases) * inverse,
        ))
    }
}
