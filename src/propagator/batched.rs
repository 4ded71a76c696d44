//! Eigen propagation over wavelength arrays.
//!
//! The batched strategy runs the eigen algorithm for many wavelengths at once
//! with rayon. Every wavelength is independent and the output keeps the input
//! order, so results are identical to calling [`EigenPropagator`] in a loop.

use rayon::prelude::*;

use super::{EigenPropagator, Propagate, PropagationMatrix};
use crate::error::{Result, StrataError};
use crate::tensor::DielectricTensor;

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn batch_matches_scalar_in_order() {
        let wavelengths: Vec<f64> = (0..16).map(|i| 400.0 + 25.0 * i as f64).collect();
        let tensors: Vec<_> = wavelengths
            .iter()
            .map(|w| DielectricTensor::from_index(Complex64::new(1.4 + 1e4 / (w * w), 0.01)))
            .collect();
        let batch = BatchedPropagator
            .propagate_batch(&tensors, 0.5, 75.0, &wavelengths)
            .unwrap();
        for ((tensor, wavelength), matrix) in tensors.iter().zip(&wavelengths).zip(&batch) {
            let scalar = EigenPropagator.propagate(tensor, 0.5, 75.0, *wavelength).unwrap();
            assert_eq!(&scalar, matrix);
        }
    }

    #[test]
    fn mismatched_lengths() {
        let tensors = vec![DielectricTensor::from_index(Complex64::new(1.5, 0.0))];
        assert!(BatchedPropagator
            .propagate_batch(&tensors, 0.0, 10.0, &[500.0, 600.0])
            .is_err());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchedPropagator;

impl BatchedPropagator {
    /// Propagation matrices of one layer for paired tensors and wavelengths.
    pub fn propagate_batch(
        &self,
        tensors: &[DielectricTensor],
        kx: f64,
        thickness: f64,
        wavelengths: &[f64],
    ) -> Result<Vec<PropagationMatrix>> {
        if tensors.len() != wavelengths.len() {
            return Err(StrataError::InvalidParameter(format!(
                "{} tensors for {} wavelengths",
                tensors.len(),
                wavelengths.len()
            )));
        }
        tensors
            .par_iter()
            .zip(wavelengths.par_iter())
            .map(|(tensor, wavelength)| {
                EigenPropagator.propagate(tensor, kx, thickness, *wavelength)
            })
            .collect()
    }
}

impl Propagate for BatchedPropagator {
    fn propagate(
        &self,
        tensor: &DielectricTensor,
        kx: f64,
        thickness: f64,
        wavelength: f64,
    ) -> Result<PropagationMatrix> {
        EigenPropagator.propagate(tensor, kx, thickness, wavelength)
    }
}
