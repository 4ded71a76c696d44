//! Closed-form 2x2 propagation for decoupled s and p waves.
//!
//! When the tensor is diagonal with equal in-plane values the Berreman matrix
//! splits into two independent blocks:
//! - s: `(Ey, -Hx)` with `M = [[0, 1], [eps_yy - kx^2, 0]]`
//! - p: `(Ex, Hy)` with `M = [[0, 1 - kx^2 / eps_zz], [eps_xx, 0]]`
//!
//! Each block has `M^2 = q^2 I`, so the exponential is
//! `cos(k0 d q) I - i sin(k0 d q) / q M` without any eigen decomposition.

use nalgebra::Matrix2;
use num_complex::Complex64;

use super::{
    phase_factor, wavenumber, Eigensystem, Propagate, PropagationMatrix, Strategy,
};
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

    fn uniaxial() -> MaterialState {
        MaterialState::Permittivity(vec![
            Complex64::new(2.4, 0.05),
            Complex64::new(2.4, 0.05),
            Complex64::new(2.9, 0.01),
        ])
    }

    #[test]
    fn matches_matrix_exponential() {
        let tensor = build_tensor(&uniaxial(), None).unwrap();
        for &(kx, d) in &[(0.0, 80.0), (0.7, 250.0), (0.9, 1e-6)] {
            let reduced = ReducedPropagator.propagate(&tensor, kx, d, 550.0).unwrap();
            let expm = ExpmPropagator.propagate(&tensor, kx, d, 550.0).unwrap();
            assert!(reduced.is_reduced());
            let difference = (reduced.to_full() - expm.to_full()).norm();
            assert!(difference < 1e-10, "kx {} d {}: {}", kx, d, difference);
        }
    }

    #[test]
    fn refuses_coupled_media() {
        let orientation = Orientation::new(Euler::new(0.0, 35.0, 0.0), EulerConvention::ZXZ);
        let tilted = build_tensor(&uniaxial(), Some(&orientation)).unwrap();
        let err = ReducedPropagator
            .propagate(&tilted, 0.5, 100.0, 550.0)
            .unwrap_err();
        assert!(matches!(err, StrataError::UnsupportedMedium { .. }));

        let biaxial = DielectricTensor::from_matrix(nalgebra::Matrix3::from_diagonal(
            &nalgebra::Vector3::new(
                Complex64::new(2.0, 0.0),
                Complex64::new(2.2, 0.0),
                Complex64::new(2.0, 0.0),
            ),
        ));
        assert!(ReducedPropagator.propagate(&biaxial, 0.5, 100.0, 550.0).is_err());
    }

    #[test]
    fn half_space_modes_match_eigensystem() {
        let tensor = build_tensor(&uniaxial(), None).unwrap();
        let modes = ReducedModes::new(&tensor, 0.6).unwrap();
        let system = Eigensystem::new(&tensor, 0.6).unwrap();
        assert_eq!(modes.s[(1, 0)], system.mode(0)[3]);
        assert_eq!(modes.p[(0, 1)], system.mode(3)[0]);
    }

    #[test]
    fn refuses_active_half_space() {
        let gain = DielectricTensor::from_index(Complex64::new(1.5, -0.01));
        let err = ReducedModes::new(&gain, 0.3).unwrap_err();
        assert!(matches!(err, StrataError::UnsupportedMedium { .. }));
    }
}

fn require_decoupled(tensor: &DielectricTensor) -> Result<()> {
    if tensor.is_uniaxial_normal() {
        Ok(())
    } else {
        Err(StrataError::unsupported(
            Strategy::Reduced2x2,
            "tensor couples s and p waves or has unequal in-plane principal values",
        ))
    }
}

/// `exp(-i theta M)` for `M = [[0, a], [b, 0]]`.
fn block(a: Complex64, b: Complex64, theta: f64) -> Matrix2<Complex64> {
    let i = Complex64::i();
    let q = snell::forward((a * b).sqrt());
    let x = q * theta;
    let (cos, sinc) = if x.norm() < 1e-8 {
        (Complex64::new(1.0, 0.0), Complex64::new(theta, 0.0))
    } else {
        let plus = phase_factor(i * x);
        let minus = phase_factor(-i * x);
        ((plus + minus) * 0.5, (plus - minus) / (2.0 * i * q))
    };
    Matrix2::new(cos, -i * sinc * a, -i * sinc * b, cos)
}

/// Closed-form propagator for media without s/p coupling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReducedPropagator;

impl ReducedPropagator {
    /// The s and p blocks of one layer.
    pub fn blocks(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<(Matrix2<Complex64>, Matrix2<Complex64>)> {
        let k0 = wavenumber(thickness, wavelength)?;
        require_decoupled(tensor)?;
        let e = tensor.matrix();
        let (exx, eyy, ezz) = (e[(0, 0)], e[(1, 1)], e[(2, 2)]);
        if ezz.norm() <= config::TENSOR_TOLERANCE {
            return Err(StrataError::InvalidMaterial(
                "eps_zz vanishes, the p block is undefined".to_string(),
            ));
        }
        let theta = k0 * thickness;
        let one = Complex64::new(1.0, 0.0);
        Ok((
            block(one, eyy - kx * kx, theta),
            block(one - kx * kx / ezz, exx, theta),
        ))
    }
}

impl Propagate for ReducedPropagator {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix> {
        let (s, p) = self.blocks(tensor, kx, thickness, wavelength)?;
        Ok(PropagationMatrix::Reduced { s, p })
    }
}

/// Forward and backward boundary modes of a half-space, per polarization.
///
/// Columns are `[forward, backward]`; the s block holds `(Ey, -Hx)` and the
/// p block `(Ex, Hy)` of the same normalized modes as [`Eigensystem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReducedModes {
    pub s: Matrix2<Complex64>,
    pub p: Matrix2<Complex64>,
}

impl ReducedModes {
    pub fn new(tensor: &DielectricTensor, kx: f64) -> Result<Self> {
        require_decoupled(tensor)?;
        if tensor.is_active() {
            return Err(StrataError::unsupported(
                Strategy::Reduced2x2,
                "half-space with gain, the forward root is ambiguous",
            ));
        }
        let system = Eigensystem::new(tensor, kx)?;
        let w = system.modes();
        Ok(Self {
            s: Matrix2::new(w[(2, 0)], w[(2, 2)], w[(3, 0)], w[(3, 2)]),
            p: Matrix2::new(w[(0, 1)], w[(0, 3)], w[(1, 1)], w[(1, 3)]),
        })
    }
}
