//! First-order propagator for vanishingly thin layers.
//!
//! `P = I - i k0 d D` is the leading term of the exponential series. It is
//! accepted only while the phase `k0 d |D|_F` stays below
//! [`config::LINEAR_MAX_PHASE`], which bounds the neglected second-order term
//! to about half its square. Thicker layers are refused outright.

use nalgebra::Matrix4;
use num_complex::Complex64;

use super::{delta_matrix, wavenumber, Propagate, PropagationMatrix, Strategy};
use crate::config;
use crate::error::{Result, StrataError};
use crate::tensor::DielectricTensor;


/// Linearized propagator, valid only for phases below [`config::LINEAR_MAX_PHASE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearPropagator;

impl Propagate for LinearPropagator {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix> {
        let k0 = wavenumber(thickness, wavelength)?;
        let delta = delta_matrix(tensor, kx)?;
        let phase = k0 * thickness * delta.norm();
        if phase > config::LINEAR_MAX_PHASE {
            return Err(StrataError::unsupported(
                Strategy::Linear,
                format!(
                    "phase {:.3e} of a {} nm layer exceeds {:.0e}",
                    phase,
                    thickness,
                    config::LINEAR_MAX_PHASE
                ),
            ));
        }
        Ok(PropagationMatrix::Full(
            Matrix4::identity() - delta * Complex64::new(0.0, k0 * thickness),
        ))
    }
}
