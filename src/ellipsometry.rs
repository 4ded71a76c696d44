//! Ellipsometric angles.
//!
//! Standard ellipsometry reports `rho = rpp / rss = tan(psi) exp(i delta)`.
//! Generalized ellipsometry of anisotropic samples adds the cross ratios
//! `rho_ps = rps / rpp` and `rho_sp = rsp / rss`.
//!
//! `delta` is a phase and needs a branch: [`DeltaRange`] selects
//! `(-180, 180]`, `[0, 360)`, or continuity along a sequence of results.

use std::f64::consts::{PI, TAU};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::jones::JonesCoefficients;


/// Branch used to report `delta`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeltaRange {
    /// `(-180, 180]` degrees.
    #[default]
    Symmetric,
    /// `[0, 360)` degrees.
    Positive,
    /// Continuous along a result list; single values use the symmetric branch.
    Unwrapped,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Converts an angle in radians to this unit.
    pub fn convert(&self, radians: f64) -> f64 {
        match self {
            AngleUnit::Degrees => radians.to_degrees(),
            AngleUnit::Radians => radians,
        }
    }
}

/// The reflection ratios of generalized ellipsometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Ratio {
    /// `rpp / rss`
    Pp,
    /// `rps / rpp`
    Ps,
    /// `rsp / rss`
    Sp,
}

impl Ratio {
    pub fn of(&self, jones: &JonesCoefficients) -> Complex64 {
        match self {
            Ratio::Pp => jones.rpp / jones.rss,
            Ratio::Ps => jones.rps / jones.rpp,
            Ratio::Sp => jones.rsp / jones.rss,
        }
    }
}

/// `(psi, delta)` in radians with `delta` on `(-pi, pi]`.
pub fn psi_delta(rpp: Complex64, rss: Complex64) -> (f64, f64) {
    let psi = rpp.norm().atan2(rss.norm());
    let delta = (rpp * rss.conj()).arg();
    (psi, normalize_delta(delta, DeltaRange::Symmetric))
}

/// Maps a phase in radians onto the branch of `range`.
pub fn normalize_delta(delta: f64, range: DeltaRange) -> f64 {
    let positive = delta.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    let positive = if positive >= TAU { 0.0 } else { positive };
    match range {
        DeltaRange::Positive => positive,
        DeltaRange::Symmetric | DeltaRange::Unwrapped => {
            if positive > PI {
                positive - TAU
            } else {
                positive
            }
        }
    }
}

/// Removes `2 pi` jumps between consecutive phases, keeping the first value.
pub fn unwrap(deltas: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(deltas.len());
    for &delta in deltas {
        let next = match out.last() {
            Some(&previous) => {
                let step = normalize_delta(delta - previous, DeltaRange::Symmetric);
                previous + step
            }
            None => delta,
        };
        out.push(next);
    }
    out
}
