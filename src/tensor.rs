//! Laboratory-frame dielectric tensors.
//!
//! A dispersion provider hands the solver a [`MaterialState`] for the current
//! wavelength: one refractive index or permittivity, three principal values,
//! or a complete tensor. [`build_tensor`] turns that state and an optional
//! [`Orientation`] into the 3x3 [`DielectricTensor`] consumed by the layer
//! propagators.
//!
//! Sign convention: fields vary as `exp(-iwt)`, so a passive, lossy medium has
//! `Im(eps) >= 0` on each principal axis and a gain medium `Im(eps) < 0`.

use nalgebra::{Matrix3, Vector3};
use num_complex::Complex64;

use crate::config;
use crate::error::{Result, StrataError};
use crate::orientation::Orientation;


/// The optical state a dispersion provider reports at one wavelength.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialState {
    /// One isotropic or three principal complex refractive indices `n + ik`.
    RefractiveIndex(Vec<Complex64>),
    /// One isotropic or three principal complex permittivities.
    Permittivity(Vec<Complex64>),
    /// A complete tensor in the crystal frame.
    Tensor(Matrix3<Complex64>),
}

/// A 3x3 complex dielectric tensor in the laboratory frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DielectricTensor(Matrix3<Complex64>);

impl DielectricTensor {
    pub fn from_matrix(matrix: Matrix3<Complex64>) -> Self {
        Self(matrix)
    }

    pub fn isotropic(eps: Complex64) -> Self {
        Self(Matrix3::from_diagonal_element(eps))
    }

    /// Isotropic tensor of a medium with refractive index `n`.
    pub fn from_index(n: Complex64) -> Self {
        Self::isotropic(n * n)
    }

    pub fn matrix(&self) -> &Matrix3<Complex64> {
        &self.0
    }

    fn scale(&self) -> f64 {
        self.0.iter().map(|e| e.norm()).fold(0.0, f64::max).max(1.0)
    }

    /// Whether all off-diagonal elements vanish.
    pub fn is_diagonal(&self) -> bool {
        let tol = config::TENSOR_TOLERANCE * self.scale();
        (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .filter(|(i, j)| i != j)
            .all(|(i, j)| self.0[(i, j)].norm() <= tol)
    }

    /// Diagonal with equal in-plane principal values: isotropic, or uniaxial
    /// with the optic axis along the layer normal. s and p waves decouple.
    pub fn is_uniaxial_normal(&self) -> bool {
        let tol = config::TENSOR_TOLERANCE * self.scale();
        self.is_diagonal() && (self.0[(0, 0)] - self.0[(1, 1)]).norm() <= tol
    }

    pub fn is_isotropic(&self) -> bool {
        let tol = config::TENSOR_TOLERANCE * self.scale();
        self.is_uniaxial_normal() && (self.0[(0, 0)] - self.0[(2, 2)]).norm() <= tol
    }

    /// Whether any diagonal element has gain (`Im(eps) < 0`).
    pub fn is_active(&self) -> bool {
        (0..3).any(|i| self.0[(i, i)].im < -config::ACTIVE_TOLERANCE)
    }

    /// Refractive index of an isotropic tensor, on the passive branch.
    pub fn isotropic_index(&self) -> Option<Complex64> {
        if !self.is_isotropic() {
            return None;
        }
        let n = self.0[(0, 0)].sqrt();
        Some(if n.re < 0.0 { -n } else { n })
    }
}

/// Expands one or three principal values into a diagonal.
fn principal_values(values: &[Complex64]) -> Result<Vector3<Complex64>> {
    if let Some(bad) = values.iter().find(|v| !(v.re.is_finite() && v.im.is_finite())) {
        return Err(StrataError::InvalidMaterial(format!(
            "principal value {} is not finite",
            bad
        )));
    }
    match values {
        [v] => Ok(Vector3::from_element(*v)),
        [a, b, c] => Ok(Vector3::new(*a, *b, *c)),
        _ => Err(StrataError::InvalidMaterial(format!(
            "expected 1 or 3 principal values, got {}",
            values.len()
        ))),
    }
}

/// Builds the laboratory-frame tensor `R^T * eps_crystal * R`.
///
/// **Context**: Dispersion providers report optical constants in the crystal
/// frame of a material, while the propagators need the tensor expressed in the
/// laboratory frame where `z` is the stack normal.
///
/// **How it Works**: Converts refractive indices to permittivities, broadcasts
/// a scalar to all three principal axes and applies the orientation's
/// lab-to-crystal rotation on both sides.
pub fn build_tensor(
    state: &MaterialState,
    orientation: Option<&Orientation>,
) -> Result<DielectricTensor> {
    let crystal = match state {
        MaterialState::RefractiveIndex(indices) => {
            Matrix3::from_diagonal(&principal_values(indices)?.map(|n| n * n))
        }
        MaterialState::Permittivity(eps) => Matrix3::from_diagonal(&principal_values(eps)?),
        MaterialState::Tensor(matrix) => {
            if matrix.iter().any(|e| !(e.re.is_finite() && e.im.is_finite())) {
                return Err(StrataError::InvalidMaterial(
                    "tensor has non-finite elements".to_string(),
                ));
            }
            *matrix
        }
    };

    let lab = match orientation {
        Some(orientation) => {
            let r = orientation.lab_to_crystal().map(Complex64::from);
            r.transpose() * crystal * r
        }
        None => crystal,
    };

    Ok(DielectricTensor(lab))
}
