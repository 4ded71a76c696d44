//! Snell's law in stratified media.
//!
//! The tangential wavevector is conserved across every interface of a planar
//! stack. With wavevectors normalized by the vacuum wavenumber `k0`, the
//! incident medium fixes `kx = n0 sin(theta0)` and the normal component in any
//! isotropic layer follows from `q^2 = eps - kx^2`.
//!
//! Complex media admit two roots for `q`. This module fixes which one
//! propagates forward (towards `+z`):
//! - an evanescent or lossy wave is forward when it decays along `+z`,
//!   i.e. `Im(q) > 0`
//! - a (numerically) real `q` is forward when `Re(q) > 0`

use num_complex::Complex64;

use crate::config;
use crate::error::{Result, StrataError};


/// Whether a normalized normal wavevector component describes a forward wave.
pub fn is_forward(q: Complex64) -> bool {
    if q.im.abs() > config::IMAG_TOLERANCE * q.norm().max(1.0) {
        q.im > 0.0
    } else {
        q.re > 0.0
    }
}

/// Returns the forward-propagating member of `±q`.
pub fn forward(q: Complex64) -> Complex64 {
    if is_forward(q) {
        q
    } else {
        -q
    }
}

/// Forward normal component `q = sqrt(eps - kx^2)` in an isotropic medium.
pub fn normal_component(eps: Complex64, kx: f64) -> Complex64 {
    forward((eps - kx * kx).sqrt())
}

/// Complex cosine of the propagation angle in a medium of index `n`.
pub fn transmitted_cos(n: Complex64, kx: f64) -> Complex64 {
    normal_component(n * n, kx) / n
}

/// Conserved in-plane wavevector `kx = Re(n0) sin(aoi)` for an angle in degrees.
///
/// **Context**: Every layer sees the same `kx`, so it is computed once from
/// the incident medium and the angle of incidence.
///
/// **How it Works**: Validates the angle to `[0, 90)` degrees and uses the
/// real part of the incident index, since the incident half-space must be
/// transparent for the angle of incidence to be well defined.
pub fn in_plane_wavevector(n0: Complex64, aoi: f64) -> Result<f64> {
    if !(0.0..90.0).contains(&aoi) {
        return Err(StrataError::InvalidParameter(format!(
            "angle of incidence must lie in [0, 90) degrees, got {}",
            aoi
        )));
    }
    Ok(n0.re * aoi.to_radians().sin())
}
