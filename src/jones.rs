//! Jones coefficients from the global matrix.
//!
//! With the global matrix split into 2x2 blocks,
//!
//! ```text
//! [As, Ap, Rs, Rp]^T = [[G11, G12], [G21, G22]] [Ts, Tp, 0, 0]^T
//! ```
//!
//! the transmission matrix is `G11^-1` and the reflection matrix
//! `G21 G11^-1`. Rows index the output polarization and columns the input,
//! so `rsp` is the s-polarized reflection of p-polarized light.

use nalgebra::Matrix2;
use num_complex::Complex64;

use crate::composer::{FluxNormalization, GlobalMatrix};
use crate::config;
use crate::error::{Result, StrataError};


/// Complex reflection and transmission amplitudes of a stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JonesCoefficients {
    pub rss: Complex64,
    pub rsp: Complex64,
    pub rps: Complex64,
    pub rpp: Complex64,
    pub tss: Complex64,
    pub tsp: Complex64,
    pub tps: Complex64,
    pub tpp: Complex64,
    /// Mode fluxes converting field transmission into power transmission.
    pub flux: FluxNormalization,
}

fn is_finite(z: &Complex64) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

fn invert_block(block: &Matrix2<Complex64>) -> Result<Matrix2<Complex64>> {
    let scale = block.norm_squared();
    let det = block.determinant();
    if !(det.norm() > config::SINGULAR_TOLERANCE * scale) {
        return Err(StrataError::SingularStack(format!(
            "|det G11| = {:.3e} for |G11|^2 = {:.3e}",
            det.norm(),
            scale
        )));
    }
    block.try_inverse().ok_or_else(|| {
        StrataError::SingularStack("G11 could not be inverted".to_string())
    })
}

fn invert_scalar(g: Complex64, log_scale: f64) -> Result<(Complex64, Complex64)> {
    if !(g.norm() > 0.0) {
        return Err(StrataError::SingularStack(
            "incident amplitude of a decoupled polarization vanishes".to_string(),
        ));
    }
    Ok((g.inv(), Complex64::new((-log_scale).exp(), 0.0) / g))
}

impl JonesCoefficients {
    /// Extracts reflection and transmission amplitudes from a global matrix.
    pub fn extract(global: &GlobalMatrix) -> Result<Self> {
        let jones = match global {
            GlobalMatrix::Full {
                matrix,
                log_scale,
                flux,
            } => {
                let g11 = matrix.fixed_view::<2, 2>(0, 0).into_owned();
                let g21 = matrix.fixed_view::<2, 2>(2, 0).into_owned();
                let inverse = invert_block(&g11)?;
                let r = g21 * inverse;
                let t = inverse * Complex64::new((-log_scale).exp(), 0.0);
                Self::new(r, t, *flux)
            }
            GlobalMatrix::Reduced {
                s,
                s_log_scale,
                p,
                p_log_scale,
                flux,
            } => {
                let (s_inv, ts) = invert_scalar(s[(0, 0)], *s_log_scale)?;
                let (p_inv, tp) = invert_scalar(p[(0, 0)], *p_log_scale)?;
                let zero = Complex64::new(0.0, 0.0);
                Self {
                    rss: s[(1, 0)] * s_inv,
                    rsp: zero,
                    rps: zero,
                    rpp: p[(1, 0)] * p_inv,
                    tss: ts,
                    tsp: zero,
                    tps: zero,
                    tpp: tp,
                    flux: *flux,
                }
            }
        };
        let all = [
            jones.rss, jones.rsp, jones.rps, jones.rpp, jones.tss, jones.tsp, jones.tps, jones.tpp,
        ];
        if !all.iter().all(is_finite) {
            return Err(StrataError::NumericalInstability(
                "non-finite Jones coefficients".to_string(),
            ));
        }
        Ok(jones)
    }

    /// From reflection and transmission matrices in the `(s, p)` basis.
    pub fn new(r: Matrix2<Complex64>, t: Matrix2<Complex64>, flux: FluxNormalization) -> Self {
        Self {
            rss: r[(0, 0)],
            rsp: r[(0, 1)],
            rps: r[(1, 0)],
            rpp: r[(1, 1)],
            tss: t[(0, 0)],
            tsp: t[(0, 1)],
            tps: t[(1, 0)],
            tpp: t[(1, 1)],
            flux,
        }
    }

    /// Reflection Jones matrix in the `(p, s)` basis.
    pub fn reflection_matrix(&self) -> Matrix2<Complex64> {
        Matrix2::new(self.rpp, self.rps, self.rsp, self.rss)
    }

    /// Transmission Jones matrix in the `(p, s)` basis.
    pub fn transmission_matrix(&self) -> Matrix2<Complex64> {
        Matrix2::new(self.tpp, self.tps, self.tsp, self.tss)
    }

    /// Transmission in the `(p, s)` basis, scaled so that squared magnitudes
    /// are power fractions.
    pub fn power_transmission_matrix(&self) -> Matrix2<Complex64> {
        // flux arrays are indexed [s, p]
        let f = |out: usize, inp: usize| self.flux.power_factor(out, inp);
        Matrix2::new(
            self.tpp * f(1, 1),
            self.tps * f(1, 0),
            self.tsp * f(0, 1),
            self.tss * f(0, 0),
        )
    }
}
