//! Assembly of the global transfer matrix of a stack.
//!
//! The field amplitudes of the incident half-space `(As, Ap, Rs, Rp)` and of
//! the exit half-space `(Ts, Tp, 0, 0)` are related by
//!
//! `G = A_inc^-1 * P_1 * P_2 * ... * P_N * A_exit`
//!
//! where `A_inc` and `A_exit` hold the boundary partial waves as columns and
//! `P_j` are the layer matrices. The running product is renormalized after
//! every layer; the stored [`GlobalMatrix`] keeps the accumulated natural-log
//! scale so that thick absorbing stacks neither overflow nor lose the
//! reflection, which does not depend on the scale.
//!
//! The incident half-space must be a transparent isotropic medium. The exit
//! half-space may be anything the eigen path can decompose.

use nalgebra::{Matrix2, Matrix4, SMatrix, Vector4};
use num_complex::Complex64;
use tracing::{debug, trace};

use crate::config;
use crate::dispersion::DispersionCache;
use crate::error::{Result, StrataError};
use crate::propagator::reduced::ReducedModes;
use crate::propagator::{normal_flux, Eigensystem, Propagate, ReducedPropagator, Strategy};
use crate::snell;
use crate::structure::{Structure, Thickness};
use crate::tensor::DielectricTensor;


/// Normal Poynting flux of the unit boundary modes, indexed `[s, p]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FluxNormalization {
    /// Forward modes of the incident half-space.
    pub incident: [f64; 2],
    /// Forward modes of the exit half-space.
    pub exit: [f64; 2],
}

impl FluxNormalization {
    /// Factor turning a field amplitude ratio into a power amplitude ratio,
    /// from input mode `j` to output mode `i`.
    pub fn power_factor(&self, i: usize, j: usize) -> f64 {
        if self.incident[j] <= 0.0 {
            return 0.0;
        }
        (self.exit[i] / self.incident[j]).max(0.0).sqrt()
    }
}

/// Scale-normalized global matrix of a stack.
///
/// The true matrix is `matrix * exp(log_scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalMatrix {
    Full {
        matrix: Matrix4<Complex64>,
        log_scale: f64,
        flux: FluxNormalization,
    },
    Reduced {
        s: Matrix2<Complex64>,
        s_log_scale: f64,
        p: Matrix2<Complex64>,
        p_log_scale: f64,
        flux: FluxNormalization,
    },
}

impl GlobalMatrix {
    pub fn flux(&self) -> &FluxNormalization {
        match self {
            GlobalMatrix::Full { flux, .. } | GlobalMatrix::Reduced { flux, .. } => flux,
        }
    }
}

/// Laboratory-frame tensors of every layer at one wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct StackTensors {
    pub front: DielectricTensor,
    pub layers: Vec<(DielectricTensor, f64)>,
    pub back: DielectricTensor,
}

impl StackTensors {
    /// Evaluates all layer materials, through `cache` when one is given.
    pub fn evaluate(
        structure: &Structure,
        wavelength: f64,
        mut cache: Option<&mut DispersionCache>,
    ) -> Result<Self> {
        if structure.len() < 2 {
            return Err(StrataError::EmptyStructure(structure.len()));
        }
        let mut tensor = |layer: &crate::structure::Layer| {
            layer.material.tensor(wavelength, cache.as_deref_mut())
        };
        let front = tensor(structure.front())?;
        let back = tensor(structure.back())?;
        let layers = structure
            .finite_layers()
            .map(|layer| {
                let d = match layer.thickness {
                    Thickness::Finite(d) => d,
                    Thickness::SemiInfinite => {
                        return Err(StrataError::InvalidParameter(format!(
                            "interior layer {} is semi-infinite",
                            layer.material.name
                        )))
                    }
                };
                Ok((tensor(layer)?, d))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            front,
            layers,
            back,
        })
    }

    /// Refractive index of the incident medium, which must be transparent and isotropic.
    pub fn incident_index(&self, strategy: Strategy) -> Result<Complex64> {
        let n0 = self.front.isotropic_index().ok_or_else(|| {
            StrataError::unsupported(strategy, "the incident half-space must be isotropic")
        })?;
        if n0.im.abs() > config::IMAG_TOLERANCE * n0.norm().max(1.0) {
            return Err(StrataError::unsupported(
                strategy,
                format!("the incident half-space absorbs (n = {})", n0),
            ));
        }
        Ok(n0)
    }
}

/// Global matrix of `structure` at one wavelength and in-plane wavevector.
pub fn compose(
    structure: &Structure,
    kx: f64,
    wavelength: f64,
    strategy: Strategy,
    cache: Option<&mut DispersionCache>,
) -> Result<GlobalMatrix> {
    let tensors = StackTensors::evaluate(structure, wavelength, cache)?;
    compose_tensors(&tensors, kx, wavelength, strategy)
}

/// Global matrix of pre-evaluated tensors.
pub fn compose_tensors(
    tensors: &StackTensors,
    kx: f64,
    wavelength: f64,
    strategy: Strategy,
) -> Result<GlobalMatrix> {
    let n0 = tensors.incident_index(strategy)?;
    debug!(
        "composing {} layers at {} nm, kx = {:.6}, strategy {}",
        tensors.layers.len(),
        wavelength,
        kx,
        strategy
    );
    match strategy {
        Strategy::Reduced2x2 => compose_reduced(tensors, n0, kx, wavelength),
        _ => compose_full(tensors, n0, kx, wavelength, strategy),
    }
}

/// Boundary modes of the incident medium, columns `[s+, p+, s-, p-]`.
fn incident_modes(n0: Complex64, kx: f64) -> Matrix4<Complex64> {
    let q0 = snell::normal_component(n0 * n0, kx);
    let c = q0 / n0;
    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    Matrix4::from_columns(&[
        Vector4::new(zero, zero, one, q0),
        Vector4::new(c, n0, zero, zero),
        Vector4::new(zero, zero, one, -q0),
        Vector4::new(c, -n0, zero, zero),
    ])
}

/// Multiplies `next` onto `product` and renormalizes it, returning the log of the removed scale.
fn accumulate<const N: usize>(
    product: &mut SMatrix<Complex64, N, N>,
    next: &SMatrix<Complex64, N, N>,
) -> Result<f64> {
    *product = *product * next;
    let norm = product.norm();
    if !(norm.is_finite() && norm > 0.0) {
        return Err(StrataError::NumericalInstability(format!(
            "running transfer product has norm {}",
            norm
        )));
    }
    product.unscale_mut(norm);
    Ok(norm.ln())
}

fn compose_full(
    tensors: &StackTensors,
    n0: Complex64,
    kx: f64,
    wavelength: f64,
    strategy: Strategy,
) -> Result<GlobalMatrix> {
    let a_inc = incident_modes(n0, kx);
    let a_inc_inv = a_inc.try_inverse().ok_or_else(|| {
        StrataError::NumericalInstability("incident boundary matrix is singular".to_string())
    })?;

    let mut product = Matrix4::identity();
    let mut log_scale = 0.0;
    for (tensor, thickness) in &tensors.layers {
        let layer = strategy
            .propagate(tensor, kx, *thickness, wavelength)?
            .to_full();
        log_scale += accumulate(&mut product, &layer)?;
    }

    let exit = Eigensystem::new(&tensors.back, kx)?;
    let matrix = a_inc_inv * product * exit.modes();
    trace!("global matrix (log scale {:.3}): {}", log_scale, matrix);

    let flux = FluxNormalization {
        incident: [
            normal_flux(&a_inc.column(0).into_owned()),
            normal_flux(&a_inc.column(1).into_owned()),
        ],
        exit: [normal_flux(&exit.mode(0)), normal_flux(&exit.mode(1))],
    };
    Ok(GlobalMatrix::Full {
        matrix,
        log_scale,
        flux,
    })
}

fn compose_reduced(
    tensors: &StackTensors,
    n0: Complex64,
    kx: f64,
    wavelength: f64,
) -> Result<GlobalMatrix> {
    let front = ReducedModes::new(&tensors.front, kx)?;
    let back = ReducedModes::new(&tensors.back, kx)?;

    let mut s_product = Matrix2::identity();
    let mut p_product = Matrix2::identity();
    let (mut s_log_scale, mut p_log_scale) = (0.0, 0.0);
    for (tensor, thickness) in &tensors.layers {
        let (s, p) = ReducedPropagator.blocks(tensor, kx, *thickness, wavelength)?;
        s_log_scale += accumulate(&mut s_product, &s)?;
        p_log_scale += accumulate(&mut p_product, &p)?;
    }

    let singular =
        || StrataError::NumericalInstability("incident boundary block is singular".to_string());
    let s = front.s.try_inverse().ok_or_else(singular)? * s_product * back.s;
    let p = front.p.try_inverse().ok_or_else(singular)? * p_product * back.p;

    let zero = Complex64::new(0.0, 0.0);
    let s_mode = |m: &Matrix2<Complex64>| Vector4::new(zero, zero, m[(0, 0)], m[(1, 0)]);
    let p_mode = |m: &Matrix2<Complex64>| Vector4::new(m[(0, 0)], m[(1, 0)], zero, zero);
    let incident = incident_modes(n0, kx);
    let flux = FluxNormalization {
        incident: [
            normal_flux(&incident.column(0).into_owned()),
            normal_flux(&incident.column(1).into_owned()),
        ],
        exit: [normal_flux(&s_mode(&back.s)), normal_flux(&p_mode(&back.p))],
    };
    Ok(GlobalMatrix::Reduced {
        s,
        s_log_scale,
        p,
        p_log_scale,
        flux,
    })
}
