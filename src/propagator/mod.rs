//! Single-layer propagation matrices.
//!
//! Inside a homogeneous layer the tangential fields
//! `psi = (Ex, Hy, Ey, -Hx)` obey `d(psi)/dz = i k0 D psi`, where `D` is the
//! 4x4 Berreman matrix of the layer's dielectric tensor and the conserved
//! in-plane wavevector `kx`. A layer matrix maps the fields at the back face of
//! a layer of thickness `d` to its front face:
//!
//! `psi(z) = P psi(z + d)`, `P = exp(-i k0 d D)`
//!
//! so a stack multiplies its layer matrices left to right in stack order.
//!
//! Several strategies evaluate `P`:
//! - [`Strategy::Eig`]: eigen decomposition into partial waves, the default
//! - [`Strategy::Expm`]: Pade matrix exponential, the reference
//! - [`Strategy::Linear`]: first-order expansion for vanishingly thin layers
//! - [`Strategy::Reduced2x2`]: closed-form s and p blocks for decoupled media
//! - [`Strategy::Batched`]: the eigen strategy evaluated over wavelength arrays

use std::f64::consts::PI;

use nalgebra::{Matrix2, Matrix4, Vector4};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::config;
use crate::error::{Result, StrataError};
use crate::tensor::DielectricTensor;

pub mod batched;
pub mod eigen;
pub mod expm;
pub mod linear;
pub mod reduced;

pub use batched::BatchedPropagator;
pub use eigen::{EigenPropagator, Eigensystem};
pub use expm::ExpmPropagator;
pub use linear::LinearPropagator;
pub use reduced::ReducedPropagator;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix3, Vector3};
    use strum::IntoEnumIterator;

    #[test]
    fn strategy_names() {
        assert_eq!("reduced2x2".parse::<Strategy>().unwrap(), Strategy::Reduced2x2);
        assert_eq!("expm".parse::<Strategy>().unwrap(), Strategy::Expm);
        assert!("qr".parse::<Strategy>().is_err());
        for strategy in Strategy::iter() {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!(Strategy::default(), Strategy::Eig);
    }

    #[test]
    fn isotropic_delta() {
        let eps = Complex64::new(2.25, 0.0);
        let delta = delta_matrix(&DielectricTensor::isotropic(eps), 0.6).unwrap();
        assert_abs_diff_eq!(delta[(0, 1)].re, 1.0 - 0.36 / 2.25, epsilon = 1e-15);
        assert_abs_diff_eq!(delta[(1, 0)].re, 2.25, epsilon = 1e-15);
        assert_abs_diff_eq!(delta[(3, 2)].re, 2.25 - 0.36, epsilon = 1e-15);
        assert_eq!(delta[(2, 3)], Complex64::new(1.0, 0.0));
        assert_eq!(delta[(0, 0)], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn vanishing_normal_permittivity() {
        let tensor = DielectricTensor::from_matrix(Matrix3::from_diagonal(&Vector3::new(
            Complex64::new(2.0, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(0.0, 0.0),
        )));
        assert!(matches!(
            delta_matrix(&tensor, 0.3),
            Err(StrataError::InvalidMaterial(_))
        ));
    }

    #[test]
    fn reduced_embeds_into_full() {
        let s = Matrix2::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(3.0, 0.0),
            Complex64::new(4.0, 0.0),
        );
        let p = s * Complex64::new(0.0, 1.0);
        let full = PropagationMatrix::Reduced { s, p }.to_full();
        assert_eq!(full[(2, 3)], s[(0, 1)]);
        assert_eq!(full[(1, 0)], p[(1, 0)]);
        assert_eq!(full[(0, 2)], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn phase_factor_is_clamped() {
        let grow = phase_factor(Complex64::new(1e4, 0.3));
        assert!(grow.norm().is_finite());
        assert_abs_diff_eq!(grow.norm().ln(), config::MAX_EXPONENT, epsilon = 1e-9);
        let decay = phase_factor(Complex64::new(-1e4, 0.3));
        assert_eq!(decay.norm(), 0.0);
    }
}

/// Selects how a single layer's propagation matrix is evaluated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    #[default]
    Eig,
    Expm,
    Linear,
    Reduced2x2,
    Batched,
}

/// Common contract of the layer propagators.
///
/// `kx` is normalized by the vacuum wavenumber; `thickness` and `wavelength`
/// share a length unit, nanometres by convention.
pub trait Propagate {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix>;
}

impl Propagate for Strategy {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix> {
        match self {
            Strategy::Eig => EigenPropagator.propagate(tensor, kx, thickness, wavelength),
            Strategy::Expm => ExpmPropagator.propagate(tensor, kx, thickness, wavelength),
            Strategy::Linear => LinearPropagator.propagate(tensor, kx, thickness, wavelength),
            Strategy::Reduced2x2 => ReducedPropagator.propagate(tensor, kx, thickness, wavelength),
            Strategy::Batched => BatchedPropagator.propagate(tensor, kx, thickness, wavelength),
        }
    }
}

/// A layer matrix, either full 4x4 or as decoupled s and p blocks.
///
/// The s block acts on `(Ey, -Hx)`, the p block on `(Ex, Hy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropagationMatrix {
    Full(Matrix4<Complex64>),
    Reduced {
        s: Matrix2<Complex64>,
        p: Matrix2<Complex64>,
    },
}

impl PropagationMatrix {
    /// Embeds the reduced blocks into the 4x4 field basis.
    pub fn to_full(&self) -> Matrix4<Complex64> {
        match self {
            PropagationMatrix::Full(matrix) => *matrix,
            PropagationMatrix::Reduced { s, p } => {
                let mut full = Matrix4::zeros();
                full.fixed_view_mut::<2, 2>(0, 0).copy_from(p);
                full.fixed_view_mut::<2, 2>(2, 2).copy_from(s);
                full
            }
        }
    }

    pub fn is_reduced(&self) -> bool {
        matches!(self, PropagationMatrix::Reduced { .. })
    }
}

/// Vacuum wavenumber after validating the layer inputs.
pub(crate) fn wavenumber(thickness: f64, wavelength: f64) -> Result<f64> {
    if !(wavelength.is_finite() && wavelength > 0.0) {
        return Err(StrataError::InvalidParameter(format!(
            "wavelength must be positive, got {}",
            wavelength
        )));
    }
    if !(thickness.is_finite() && thickness >= 0.0) {
        return Err(StrataError::InvalidParameter(format!(
            "thickness must be finite and non-negative, got {}",
            thickness
        )));
    }
    Ok(2.0 * PI / wavelength)
}

/// Berreman matrix `D` of a tensor for the in-plane wavevector `kx`.
pub fn delta_matrix(tensor: &DielectricTensor, kx: f64) -> Result<Matrix4<Complex64>> {
    let e = tensor.matrix();
    let e33 = e[(2, 2)];
    if e33.norm() <= config::TENSOR_TOLERANCE {
        return Err(StrataError::InvalidMaterial(
            "eps_zz vanishes, the Berreman matrix is undefined".to_string(),
        ));
    }
    let (e11, e12, e13) = (e[(0, 0)], e[(0, 1)], e[(0, 2)]);
    let (e21, e22, e23) = (e[(1, 0)], e[(1, 1)], e[(1, 2)]);
    let (e31, e32) = (e[(2, 0)], e[(2, 1)]);
    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let kx2 = kx * kx;

    #[rustfmt::skip]
    let delta = Matrix4::new(
        -kx * e31 / e33,         one - kx2 / e33,  -kx * e32 / e33,               zero,
        e11 - e13 * e31 / e33,   -kx * e13 / e33,  e12 - e13 * e32 / e33,         zero,
        zero,                    zero,             zero,                          one,
        e21 - e23 * e31 / e33,   -kx * e23 / e33,  e22 - e23 * e32 / e33 - kx2,   zero,
    );
    Ok(delta)
}

/// `exp(z)` with the real part of `z` clamped from above.
///
/// Growing exponentials of thick absorbing or evanescent layers saturate at
/// `exp(MAX_EXPONENT)`; decaying ones underflow to zero.
pub fn phase_factor(exponent: Complex64) -> Complex64 {
    Complex64::new(exponent.re.min(config::MAX_EXPONENT), exponent.im).exp()
}

/// Normal component of the time-averaged Poynting vector of a field vector.
pub fn normal_flux(psi: &Vector4<Complex64>) -> f64 {
    0.5 * (psi[0] * psi[1].conj() + psi[2] * psi[3].conj()).re
}
