//! Closed-form Fresnel and Airy coefficients for isotropic media.
//!
//! These are the analytic limits of the transfer-matrix solver: a single
//! interface, and a single film between two half-spaces. They share the
//! solver's sign conventions, so `rs` and `rp` both reduce to
//! `(n1 - n2) / (n1 + n2)` at normal incidence, and serve as independent
//! references for it.
//!
//! All functions take the conserved in-plane wavevector `kx` (normalized by
//! `k0`) instead of angles, which keeps them valid for absorbing media and
//! beyond the critical angle.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2};
use num_complex::Complex64;

use crate::snell;


/// Fresnel reflection coefficients, returned as `diag(rs, rp)`.
///
/// **Context**: A single isotropic interface is the simplest stack. Its
/// reflection is known in closed form and the sign of `rp` is chosen so that
/// `rp = rs` at normal incidence.
///
/// **How it Works**: Uses the forward complex cosines `c = q / n` in both
/// media, with `q` the normal wavevector component for the shared `kx`.
pub fn refl(n1: Complex64, n2: Complex64, kx: f64) -> Matrix2<Complex64> {
    let c1 = snell::transmitted_cos(n1, kx);
    let c2 = snell::transmitted_cos(n2, kx);
    let rs = (n1 * c1 - n2 * c2) / (n1 * c1 + n2 * c2);
    let rp = (n1 * c2 - n2 * c1) / (n1 * c2 + n2 * c1);
    Matrix2::from_diagonal(&Vector2::new(rs, rp))
}

/// Airy reflection coefficients `diag(rs, rp)` of a single film.
///
/// Film of index `n1` and `thickness` between an incident medium `n0` and a
/// substrate `n2`; `thickness` and `wavelength` share a length unit.
pub fn airy(
    n0: Complex64,
    n1: Complex64,
    n2: Complex64,
    thickness: f64,
    kx: f64,
    wavelength: f64,
) -> Matrix2<Complex64> {
    let r01 = refl(n0, n1, kx);
    let r12 = refl(n1, n2, kx);
    let beta = 2.0 * PI / wavelength * thickness * snell::normal_component(n1 * n1, kx);
    let phase = (Complex64::i() * 2.0 * beta).exp();
    let coefficient = |i: usize| {
        (r01[(i, i)] + r12[(i, i)] * phase) / (1.0 + r01[(i, i)] * r12[(i, i)] * phase)
    };
    Matrix2::from_diagonal(&Vector2::new(coefficient(0), coefficient(1)))
}
