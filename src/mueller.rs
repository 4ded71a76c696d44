//! Mueller matrices and Stokes vectors.
//!
//! A Jones matrix `J` in the `(p, s)` basis maps to the Mueller matrix
//! `M = A (J x J*) A^-1`, with the Stokes convention
//! `S = (|Ep|^2 + |Es|^2, |Ep|^2 - |Es|^2, 2 Re(Ep Es*), -2 Im(Ep Es*))`.
//! Unlike Jones matrices, Mueller matrices add linearly over incoherent
//! ensembles, which is what averaging over a result list relies on.

use std::ops::{Add, AddAssign, Div};

use nalgebra::{Matrix2, Matrix4, Vector4};
use num_complex::Complex64;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Matrix2<Complex64> {
        Matrix2::new(
            Complex64::new(0.3, -0.4),
            Complex64::new(0.05, 0.02),
            Complex64::new(-0.01, 0.04),
            Complex64::new(-0.6, 0.1),
        )
    }

    #[test]
    fn diagonal_jones_block_form() {
        let rpp = Complex64::from_polar(0.4, 0.7);
        let rss = Complex64::from_polar(0.8, -0.2);
        let m = MuellerMatrix::from_jones(&Matrix2::new(
            rpp,
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            rss,
        ));
        let x = rpp * rss.conj();
        assert_abs_diff_eq!(m.0[(0, 0)], 0.5 * (0.16 + 0.64), epsilon = 1e-14);
        assert_abs_diff_eq!(m.0[(0, 1)], 0.5 * (0.16 - 0.64), epsilon = 1e-14);
        assert_abs_diff_eq!(m.0[(2, 2)], x.re, epsilon = 1e-14);
        assert_abs_diff_eq!(m.0[(2, 3)], x.im, epsilon = 1e-14);
        assert_abs_diff_eq!(m.0[(3, 2)], -x.im, epsilon = 1e-14);
        assert_abs_diff_eq!(m.0[(0, 2)], 0.0, epsilon = 1e-14);

        let (psi, delta) = m.normalized().psi_delta();
        assert_abs_diff_eq!(psi, 0.4f64.atan2(0.8), epsilon = 1e-12);
        assert_abs_diff_eq!(delta, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn stokes_intensities() {
        let j = sample();
        let m = MuellerMatrix::from_jones(&j);
        // p input: |rpp|^2 + |rsp|^2
        let p = j[(0, 0)].norm_sqr() + j[(1, 0)].norm_sqr();
        let s = j[(0, 1)].norm_sqr() + j[(1, 1)].norm_sqr();
        assert_abs_diff_eq!(m.intensity(&Polarization::P), p, epsilon = 1e-14);
        assert_abs_diff_eq!(m.intensity(&Polarization::S), s, epsilon = 1e-14);
        assert_abs_diff_eq!(m.intensity(&Polarization::Unpolarized), 0.5 * (p + s), epsilon = 1e-14);
    }

    #[test]
    fn pure_matrices_do_not_depolarize() {
        let m = MuellerMatrix::from_jones(&sample());
        assert_abs_diff_eq!(m.depolarization_index(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.degree_of_polarization(&Polarization::S), 1.0, epsilon = 1e-12);
        // an even mix of two different pure responses depolarizes
        let other = MuellerMatrix::from_jones(&Matrix2::identity());
        let mix = (m.normalized() + other) / 2.0;
        assert!(mix.depolarization_index() < 1.0);
        assert!(mix.degree_of_polarization(&Polarization::Stokes(Vector4::new(1.0, 0.0, 0.0, 1.0))) < 1.0);
    }
}

/// Polarization state of the illumination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Polarization {
    S,
    P,
    Unpolarized,
    /// Arbitrary Stokes vector, normalized to unit intensity when used.
    Stokes(Vector4<f64>),
}

impl Polarization {
    pub fn stokes(&self) -> Vector4<f64> {
        match self {
            Polarization::S => Vector4::new(1.0, -1.0, 0.0, 0.0),
            Polarization::P => Vector4::new(1.0, 1.0, 0.0, 0.0),
            Polarization::Unpolarized => Vector4::new(1.0, 0.0, 0.0, 0.0),
            Polarization::Stokes(s) => {
                if s[0] > 0.0 {
                    s / s[0]
                } else {
                    *s
                }
            }
        }
    }
}

/// A real 4x4 Mueller matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MuellerMatrix(pub Matrix4<f64>);

fn stokes_basis() -> Matrix4<Complex64> {
    let c = |re: f64, im: f64| Complex64::new(re, im);
    #[rustfmt::skip]
    let a = Matrix4::new(
        c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0),  c(1.0, 0.0),
        c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0),  c(-1.0, 0.0),
        c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0),  c(0.0, 0.0),
        c(0.0, 0.0), c(0.0, 1.0), c(0.0, -1.0), c(0.0, 0.0),
    );
    a
}

fn stokes_basis_inverse() -> Matrix4<Complex64> {
    let c = |re: f64, im: f64| Complex64::new(0.5 * re, 0.5 * im);
    #[rustfmt::skip]
    let a_inv = Matrix4::new(
        c(1.0, 0.0), c(1.0, 0.0),  c(0.0, 0.0), c(0.0, 0.0),
        c(0.0, 0.0), c(0.0, 0.0),  c(1.0, 0.0), c(0.0, -1.0),
        c(0.0, 0.0), c(0.0, 0.0),  c(1.0, 0.0), c(0.0, 1.0),
        c(1.0, 0.0), c(-1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0),
    );
    a_inv
}

impl MuellerMatrix {
    pub fn zeros() -> Self {
        Self(Matrix4::zeros())
    }

    /// Mueller matrix of a Jones matrix in the `(p, s)` basis.
    pub fn from_jones(jones: &Matrix2<Complex64>) -> Self {
        let product: Matrix4<Complex64> = jones.kronecker(&jones.conjugate());
        let m = stokes_basis() * product * stokes_basis_inverse();
        Self(Matrix4::from_fn(|i, j| m[(i, j)].re))
    }

    /// Divided by `M00`; unchanged when `M00` vanishes.
    pub fn normalized(&self) -> Self {
        let m00 = self.0[(0, 0)];
        if m00 == 0.0 {
            return *self;
        }
        Self(self.0 / m00)
    }

    /// Output Stokes vector for an illumination.
    pub fn apply(&self, polarization: &Polarization) -> Vector4<f64> {
        self.0 * polarization.stokes()
    }

    /// Output intensity for unit input intensity.
    pub fn intensity(&self, polarization: &Polarization) -> f64 {
        self.apply(polarization)[0]
    }

    /// Degree of polarization of the output for an illumination.
    pub fn degree_of_polarization(&self, polarization: &Polarization) -> f64 {
        let s = self.apply(polarization);
        if s[0] <= 0.0 {
            return 0.0;
        }
        (s[1] * s[1] + s[2] * s[2] + s[3] * s[3]).sqrt() / s[0]
    }

    /// Gil-Bernabeu depolarization index: 1 for pure, 0 for ideal depolarizers.
    pub fn depolarization_index(&self) -> f64 {
        let m00 = self.0[(0, 0)];
        if m00 <= 0.0 {
            return 0.0;
        }
        let sum = self.0.norm_squared() / (m00 * m00);
        ((sum - 1.0).max(0.0) / 3.0).sqrt()
    }

    /// `(psi, delta)` in radians of a normalized, non-depolarizing isotropic response.
    pub fn psi_delta(&self) -> (f64, f64) {
        let psi = 0.5 * (-self.0[(0, 1)]).clamp(-1.0, 1.0).acos();
        let delta = self.0[(2, 3)].atan2(self.0[(2, 2)]);
        (psi, delta)
    }

    /// The 16 elements in row-major order.
    pub fn row_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for (k, value) in out.iter_mut().enumerate() {
            *value = self.0[(k / 4, k % 4)];
        }
        out
    }
}

impl Add for MuellerMatrix {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for MuellerMatrix {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Div<f64> for MuellerMatrix {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self(self.0 / rhs)
    }
}
