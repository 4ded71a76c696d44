//! Matrix-exponential propagator.
//!
//! Evaluates `exp(-i k0 d D)` directly with nalgebra's scaling-and-squaring
//! Pade approximant. It makes no assumption about the partial waves and so
//! handles degenerate or defective media the eigen path refuses, at a higher
//! cost. Results of the other strategies are validated against it.

use nalgebra::Matrix4;
use num_complex::Complex64;

use super::{delta_matrix, wavenumber, Propagate, PropagationMatrix};
use crate::error::{Result, StrataError};
use crate::tensor::DielectricTensor;


/// Reference propagator `P = expm(-i k0 d D)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpmPropagator;

impl Propagate for ExpmPropagator {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix> {
        let k0 = wavenumber(thickness, wavelength)?;
        let delta = delta_matrix(tensor, kx)?;
        let generator: Matrix4<Complex64> = delta * Complex64::new(0.0, -k0 * thickness);
        let matrix = generator.exp();
        if matrix.iter().any(|e| !(e.re.is_finite() && e.im.is_finite())) {
            return Err(StrataError::NumericalInstability(format!(
                "matrix exponential overflowed for a {} nm layer",
                thickness
            )));
        }
        Ok(PropagationMatrix::Full(matrix))
    }
}
