//! Solver results.
//!
//! An [`OpticalResult`] describes the response of a stack at one wavelength
//! and angle of incidence. It is backed either by the Jones coefficients of a
//! solve or, after averaging, by reflection and transmission Mueller matrices
//! only. Every derived quantity is computed on first access and cached.
//!
//! A [`ResultList`] collects results along a sweep dimension and exposes the
//! same quantities as arrays. Averaging is done on Mueller matrices: averaging
//! `delta` directly is wrong across its branch cut and for depolarizing
//! ensembles.

use std::sync::OnceLock;

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::ellipsometry::{self, AngleUnit, DeltaRange, Ratio};
use crate::error::{Result, StrataError};
use crate::jones::JonesCoefficients;
use crate::mueller::{MuellerMatrix, Polarization};
use crate::powers::Powers;


/// How angles are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultOptions {
    #[serde(default)]
    pub delta_range: DeltaRange,
    #[serde(default)]
    pub angle_unit: AngleUnit,
}

/// Named observables of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Psi,
    Delta,
    /// Reflectance for s illumination.
    Rs,
    Rp,
    /// Reflectance for unpolarized illumination.
    R,
    Ts,
    Tp,
    T,
    /// Absorbance for unpolarized illumination.
    A,
    DepolarizationIndex,
    PsiPp,
    PsiPs,
    PsiSp,
    DeltaPp,
    DeltaPs,
    DeltaSp,
}

#[derive(Debug, Clone, PartialEq)]
enum Representation {
    Jones(JonesCoefficients),
    Mueller {
        reflection: MuellerMatrix,
        transmission: MuellerMatrix,
    },
}

/// Response of a stack at one wavelength and angle of incidence.
#[derive(Debug, Clone)]
pub struct OpticalResult {
    pub wavelength: f64,
    /// Angle of incidence in degrees.
    pub angle: f64,
    pub options: ResultOptions,
    representation: Representation,
    reflection_mueller: OnceLock<MuellerMatrix>,
    transmission_mueller: OnceLock<MuellerMatrix>,
    psi_delta: OnceLock<(f64, f64)>,
}

impl OpticalResult {
    pub fn new(
        wavelength: f64,
        angle: f64,
        jones: JonesCoefficients,
        options: ResultOptions,
    ) -> Self {
        Self::with_representation(wavelength, angle, Representation::Jones(jones), options)
    }

    /// A result known only through its Mueller matrices, e.g. an average.
    pub fn from_mueller(
        wavelength: f64,
        angle: f64,
        reflection: MuellerMatrix,
        transmission: MuellerMatrix,
        options: ResultOptions,
    ) -> Self {
        Self::with_representation(
            wavelength,
            angle,
            Representation::Mueller {
                reflection,
                transmission,
            },
            options,
        )
    }

    fn with_representation(
        wavelength: f64,
        angle: f64,
        representation: Representation,
        options: ResultOptions,
    ) -> Self {
        Self {
            wavelength,
            angle,
            options,
            representation,
            reflection_mueller: OnceLock::new(),
            transmission_mueller: OnceLock::new(),
            psi_delta: OnceLock::new(),
        }
    }

    pub fn jones(&self) -> Option<&JonesCoefficients> {
        match &self.representation {
            Representation::Jones(jones) => Some(jones),
            Representation::Mueller { .. } => None,
        }
    }

    pub fn rss(&self) -> Option<Complex64> {
        self.jones().map(|j| j.rss)
    }

    pub fn rsp(&self) -> Option<Complex64> {
        self.jones().map(|j| j.rsp)
    }

    pub fn rps(&self) -> Option<Complex64> {
        self.jones().map(|j| j.rps)
    }

    pub fn rpp(&self) -> Option<Complex64> {
        self.jones().map(|j| j.rpp)
    }

    pub fn tss(&self) -> Option<Complex64> {
        self.jones().map(|j| j.tss)
    }

    pub fn tsp(&self) -> Option<Complex64> {
        self.jones().map(|j| j.tsp)
    }

    pub fn tps(&self) -> Option<Complex64> {
        self.jones().map(|j| j.tps)
    }

    pub fn tpp(&self) -> Option<Complex64> {
        self.jones().map(|j| j.tpp)
    }

    /// `rpp / rss`.
    pub fn rho(&self) -> Option<Complex64> {
        self.ratio(Ratio::Pp)
    }

    pub fn ratio(&self, ratio: Ratio) -> Option<Complex64> {
        self.jones().map(|j| ratio.of(j))
    }

    /// Unnormalized reflection Mueller matrix.
    pub fn reflection_mueller(&self) -> MuellerMatrix {
        *self
            .reflection_mueller
            .get_or_init(|| match &self.representation {
                Representation::Jones(jones) => {
                    MuellerMatrix::from_jones(&jones.reflection_matrix())
                }
                Representation::Mueller { reflection, .. } => *reflection,
            })
    }

    /// Unnormalized transmission Mueller matrix in power units.
    pub fn transmission_mueller(&self) -> MuellerMatrix {
        *self
            .transmission_mueller
            .get_or_init(|| match &self.representation {
                Representation::Jones(jones) => {
                    MuellerMatrix::from_jones(&jones.power_transmission_matrix())
                }
                Representation::Mueller { transmission, .. } => *transmission,
            })
    }

    /// Reflection Mueller matrix normalized by `M00`.
    pub fn mueller_matrix(&self) -> MuellerMatrix {
        self.reflection_mueller().normalized()
    }

    fn psi_delta_radians(&self) -> (f64, f64) {
        *self.psi_delta.get_or_init(|| match &self.representation {
            Representation::Jones(jones) => ellipsometry::psi_delta(jones.rpp, jones.rss),
            Representation::Mueller { .. } => self.mueller_matrix().psi_delta(),
        })
    }

    fn report_delta(&self, radians: f64) -> f64 {
        let range = self.options.delta_range;
        self.options
            .angle_unit
            .convert(ellipsometry::normalize_delta(radians, range))
    }

    pub fn psi(&self) -> f64 {
        self.options.angle_unit.convert(self.psi_delta_radians().0)
    }

    pub fn delta(&self) -> f64 {
        self.report_delta(self.psi_delta_radians().1)
    }

    /// `atan(|rho|)` of a generalized ratio.
    pub fn generalized_psi(&self, ratio: Ratio) -> Option<f64> {
        self.ratio(ratio)
            .map(|rho| self.options.angle_unit.convert(rho.norm().atan()))
    }

    /// `arg(rho)` of a generalized ratio.
    pub fn generalized_delta(&self, ratio: Ratio) -> Option<f64> {
        self.ratio(ratio).map(|rho| self.report_delta(rho.arg()))
    }

    pub fn reflectance(&self, polarization: &Polarization) -> f64 {
        self.reflection_mueller().intensity(polarization)
    }

    pub fn transmittance(&self, polarization: &Polarization) -> f64 {
        self.transmission_mueller().intensity(polarization)
    }

    pub fn absorbance(&self, polarization: &Polarization) -> f64 {
        self.powers(polarization).absorbed
    }

    pub fn powers(&self, polarization: &Polarization) -> Powers {
        Powers::new(
            self.reflectance(polarization),
            self.transmittance(polarization),
        )
    }

    /// Degree of polarization of the reflected light.
    pub fn degree_of_polarization(&self, polarization: &Polarization) -> f64 {
        self.reflection_mueller()
            .degree_of_polarization(polarization)
    }

    pub fn depolarization_index(&self) -> f64 {
        self.reflection_mueller().depolarization_index()
    }

    /// Looks a quantity up by name; `None` where the backing data lacks it.
    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Psi => Some(self.psi()),
            Quantity::Delta => Some(self.delta()),
            Quantity::Rs => Some(self.reflectance(&Polarization::S)),
            Quantity::Rp => Some(self.reflectance(&Polarization::P)),
            Quantity::R => Some(self.reflectance(&Polarization::Unpolarized)),
            Quantity::Ts => Some(self.transmittance(&Polarization::S)),
            Quantity::Tp => Some(self.transmittance(&Polarization::P)),
            Quantity::T => Some(self.transmittance(&Polarization::Unpolarized)),
            Quantity::A => Some(self.absorbance(&Polarization::Unpolarized)),
            Quantity::DepolarizationIndex => Some(self.depolarization_index()),
            Quantity::PsiPp => self.generalized_psi(Ratio::Pp),
            Quantity::PsiPs => self.generalized_psi(Ratio::Ps),
            Quantity::PsiSp => self.generalized_psi(Ratio::Sp),
            Quantity::DeltaPp => self.generalized_delta(Ratio::Pp),
            Quantity::DeltaPs => self.generalized_delta(Ratio::Ps),
            Quantity::DeltaSp => self.generalized_delta(Ratio::Sp),
        }
    }
}

/// Results ordered along a sweep dimension.
#[derive(Debug, Clone, Default)]
pub struct ResultList {
    results: Vec<OpticalResult>,
}

impl ResultList {
    pub fn new(results: Vec<OpticalResult>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, result: OpticalResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpticalResult> {
        self.results.iter()
    }

    pub fn results(&self) -> &[OpticalResult] {
        &self.results
    }

    fn collect(&self, f: impl Fn(&OpticalResult) -> f64) -> Array1<f64> {
        self.results.iter().map(f).collect()
    }

    pub fn wavelengths(&self) -> Array1<f64> {
        self.collect(|r| r.wavelength)
    }

    pub fn angles(&self) -> Array1<f64> {
        self.collect(|r| r.angle)
    }

    pub fn psi(&self) -> Array1<f64> {
        self.collect(OpticalResult::psi)
    }

    /// Deltas on each result's branch, made continuous for [`DeltaRange::Unwrapped`].
    pub fn delta(&self) -> Array1<f64> {
        let unwrapped = self
            .results
            .first()
            .is_some_and(|r| r.options.delta_range == DeltaRange::Unwrapped);
        if !unwrapped {
            return self.collect(OpticalResult::delta);
        }
        self.unwrapped(|r| r.psi_delta_radians().1)
    }

    fn unwrapped(&self, radians: impl Fn(&OpticalResult) -> f64) -> Array1<f64> {
        let raw: Vec<f64> = self.results.iter().map(radians).collect();
        ellipsometry::unwrap(&raw)
            .into_iter()
            .zip(&self.results)
            .map(|(delta, r)| r.options.angle_unit.convert(delta))
            .collect()
    }

    pub fn reflectance(&self, polarization: &Polarization) -> Array1<f64> {
        self.collect(|r| r.reflectance(polarization))
    }

    pub fn transmittance(&self, polarization: &Polarization) -> Array1<f64> {
        self.collect(|r| r.transmittance(polarization))
    }

    pub fn absorbance(&self, polarization: &Polarization) -> Array1<f64> {
        self.collect(|r| r.absorbance(polarization))
    }

    pub fn depolarization_index(&self) -> Array1<f64> {
        self.collect(OpticalResult::depolarization_index)
    }

    /// A quantity along the list; `None` if any result lacks it.
    pub fn get(&self, quantity: Quantity) -> Option<Array1<f64>> {
        if quantity == Quantity::Delta {
            return Some(self.delta());
        }
        self.results
            .iter()
            .map(|r| r.get(quantity))
            .collect::<Option<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Incoherent average of the list.
    ///
    /// **Context**: Averaging over a bandwidth, an angular spread or a set of
    /// samples mixes responses incoherently, so amplitudes and phases cannot be
    /// averaged.
    ///
    /// **How it Works**: Averages the unnormalized reflection and
    /// transmission Mueller matrices, along with wavelength and angle, into a
    /// Mueller-backed result that uses the options of the first entry.
    pub fn average(&self) -> Result<OpticalResult> {
        let first = self.results.first().ok_or_else(|| {
            StrataError::InvalidParameter("cannot average an empty result list".to_string())
        })?;
        let n = self.results.len() as f64;
        let (mut reflection, mut transmission) = (MuellerMatrix::zeros(), MuellerMatrix::zeros());
        let (mut wavelength, mut angle) = (0.0, 0.0);
        for r in &self.results {
            reflection += r.reflection_mueller();
            transmission += r.transmission_mueller();
            wavelength += r.wavelength;
            angle += r.angle;
        }
        Ok(OpticalResult::from_mueller(
            wavelength / n,
            angle / n,
            reflection / n,
            transmission / n,
            first.options,
        ))
    }
}

impl FromIterator<OpticalResult> for ResultList {
    fn from_iter<I: IntoIterator<Item = OpticalResult>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
