//! Layer orientation by Euler angles.
//!
//! Anisotropic materials are described by principal permittivities in their
//! own crystal frame. An [`Orientation`] places that frame in the laboratory
//! frame, where the layer normal is `z` and the plane of incidence is `xz`.
//!
//! Rotations are intrinsic and composed in the order of the convention
//! letters, so `ZXZ` with angles `(alpha, beta, gamma)` is
//! `Rz(alpha) * Rx(beta) * Rz(gamma)`. This active rotation carries crystal
//! axes into the laboratory frame; its transpose maps laboratory coordinates
//! into the crystal frame.

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zero_rotation_is_identity() {
        let orientation = Orientation::new(Euler::new(0.0, 0.0, 0.0), EulerConvention::ZXZ);
        assert_abs_diff_eq!(orientation.lab_to_crystal(), Matrix3::identity(), epsilon = 1e-15);
    }

    #[test]
    fn tilt_moves_optic_axis() {
        // tilting about x by 90 degrees brings the crystal z axis onto the lab y axis
        let orientation = Orientation::new(Euler::new(0.0, 90.0, 0.0), EulerConvention::ZXZ);
        let axis = orientation.crystal_to_lab() * Vector3::z();
        assert_abs_diff_eq!(axis.y.abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(axis.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_is_orthogonal() {
        for convention in [EulerConvention::ZXZ, EulerConvention::ZYZ, EulerConvention::XYZ] {
            let r = Orientation::new(Euler::new(12.0, 34.0, 56.0), convention).lab_to_crystal();
            assert_abs_diff_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
            assert_abs_diff_eq!(r.determinant(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn parse_euler() {
        let euler: Euler = "10,20,30".parse().unwrap();
        assert_eq!(euler, Euler::new(10.0, 20.0, 30.0));
        assert!("10,20".parse::<Euler>().is_err());
        assert!("a,b,c".parse::<Euler>().is_err());
    }
}

/// Euler angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Euler {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }
}

impl std::str::FromStr for Euler {
    type Err = String;

    /// Parses Euler angles in the format "alpha,beta,gamma".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let angles: Vec<&str> = s.split(',').map(str::trim).collect();
        if angles.len() != 3 {
            return Err(format!(
                "Invalid Euler angle format: '{}'. Expected 'alpha,beta,gamma'",
                s
            ));
        }
        let parse = |name: &str, value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| format!("Failed to parse {} angle: {}", name, value))
        };
        Ok(Euler::new(
            parse("alpha", angles[0])?,
            parse("beta", angles[1])?,
            parse("gamma", angles[2])?,
        ))
    }
}

/// Order of the elementary rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EulerConvention {
    #[default]
    ZXZ,
    ZYZ,
    XYZ,
}

impl EulerConvention {
    fn axes(&self) -> [Vector3<f64>; 3] {
        match self {
            EulerConvention::ZXZ => [Vector3::z(), Vector3::x(), Vector3::z()],
            EulerConvention::ZYZ => [Vector3::z(), Vector3::y(), Vector3::z()],
            EulerConvention::XYZ => [Vector3::x(), Vector3::y(), Vector3::z()],
        }
    }
}

/// Orientation of a material's crystal frame within the laboratory frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub euler: Euler,
    #[serde(default)]
    pub euler_convention: EulerConvention,
}

impl Orientation {
    pub fn new(euler: Euler, euler_convention: EulerConvention) -> Self {
        Self {
            euler,
            euler_convention,
        }
    }

    /// Active rotation taking crystal-frame vectors into the laboratory frame.
    pub fn crystal_to_lab(&self) -> Matrix3<f64> {
        let angles = [self.euler.alpha, self.euler.beta, self.euler.gamma];
        self.euler_convention
            .axes()
            .iter()
            .zip(angles)
            .map(|(axis, angle)| {
                Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(*axis), angle.to_radians())
                    .into_inner()
            })
            .fold(Matrix3::identity(), |acc, r| acc * r)
    }

    /// The rotation `R` of `eps_lab = R^T * diag(eps) * R`.
    pub fn lab_to_crystal(&self) -> Matrix3<f64> {
        self.crystal_to_lab().transpose()
    }
}
