//! Solving a structure at given wavelengths and angles of incidence.
//!
//! A solve evaluates every layer material at the wavelength, derives the
//! in-plane wavevector from the incident medium, composes the global matrix
//! with the selected strategy and extracts the Jones coefficients.
//!
//! - [`solve`] is the stateless entry point for a single point
//! - [`Solver`] owns a structure and a [`DispersionCache`] for repeated solves,
//!   e.g. from a fitting loop that mutates thicknesses between solves
//!
//! Material evaluation is always sequential. With [`Strategy::Batched`] the
//! wavelengths of a sweep are then composed in parallel, in input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::composer::{compose_tensors, StackTensors};
use crate::dispersion::{DispersionCache, MaterialId};
use crate::ellipsometry::{AngleUnit, DeltaRange};
use crate::error::{Result, StrataError};
use crate::jones::JonesCoefficients;
use crate::propagator::Strategy;
use crate::result::{OpticalResult, ResultList, ResultOptions};
use crate::snell;
use crate::structure::Structure;


/// Configuration of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SolverOptions {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub delta_range: DeltaRange,
    #[serde(default)]
    pub angle_unit: AngleUnit,
}

impl SolverOptions {
    pub fn result_options(&self) -> ResultOptions {
        ResultOptions {
            delta_range: self.delta_range,
            angle_unit: self.angle_unit,
        }
    }
}

fn check_wavelength(wavelength: f64) -> Result<()> {
    if wavelength > 0.0 && wavelength.is_finite() {
        Ok(())
    } else {
        Err(StrataError::InvalidParameter(format!(
            "wavelength must be positive, got {}",
            wavelength
        )))
    }
}

/// Solves pre-evaluated tensors at one angle of incidence in degrees.
pub fn solve_tensors(
    tensors: &StackTensors,
    wavelength: f64,
    aoi: f64,
    options: &SolverOptions,
) -> Result<OpticalResult> {
    let n0 = tensors.incident_index(options.strategy)?;
    let kx = snell::in_plane_wavevector(n0, aoi)?;
    let global = compose_tensors(tensors, kx, wavelength, options.strategy)?;
    let jones = JonesCoefficients::extract(&global)?;
    Ok(OpticalResult::new(
        wavelength,
        aoi,
        jones,
        options.result_options(),
    ))
}

/// Solves `structure` at one wavelength in nm and angle of incidence in degrees.
pub fn solve(
    structure: &Structure,
    wavelength: f64,
    aoi: f64,
    options: &SolverOptions,
) -> Result<OpticalResult> {
    check_wavelength(wavelength)?;
    let tensors = StackTensors::evaluate(structure, wavelength, None)?;
    solve_tensors(&tensors, wavelength, aoi, options)
}

/// A structure with its solve options and dispersion cache.
#[derive(Debug)]
pub struct Solver {
    structure: Structure,
    options: SolverOptions,
    cache: DispersionCache,
}

impl Solver {
    pub fn new(structure: Structure, options: SolverOptions) -> Self {
        Self {
            structure,
            options,
            cache: DispersionCache::new(),
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Mutable access between solves. Cached tensors stay valid because
    /// materials are immutable and replacing one changes its id.
    pub fn structure_mut(&mut self) -> &mut Structure {
        &mut self.structure
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SolverOptions) {
        self.options = options;
    }

    pub fn cache(&self) -> &DispersionCache {
        &self.cache
    }

    pub fn invalidate_material(&mut self, id: MaterialId) {
        self.cache.invalidate(id);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn tensors(&mut self, wavelength: f64) -> Result<StackTensors> {
        check_wavelength(wavelength)?;
        StackTensors::evaluate(&self.structure, wavelength, Some(&mut self.cache))
    }

    pub fn solve(&mut self, wavelength: f64, aoi: f64) -> Result<OpticalResult> {
        let tensors = self.tensors(wavelength)?;
        solve_tensors(&tensors, wavelength, aoi, &self.options)
    }

    /// Solves at one angle for each wavelength, in input order.
    pub fn solve_wavelengths(&mut self, wavelengths: &[f64], aoi: f64) -> Result<ResultList> {
        let tensors = wavelengths
            .iter()
            .map(|w| self.tensors(*w))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "solving {} wavelengths at {} deg with strategy {}",
            wavelengths.len(),
            aoi,
            self.options.strategy
        );

        let options = self.options;
        let solve_one = |(tensors, wavelength): (&StackTensors, &f64)| {
            solve_tensors(tensors, *wavelength, aoi, &options)
        };
        let results = if options.strategy == Strategy::Batched {
            info!("composing {} wavelengths in parallel", wavelengths.len());
            tensors
                .par_iter()
                .zip(wavelengths.par_iter())
                .map(solve_one)
                .collect::<Result<Vec<_>>>()?
        } else {
            tensors
                .iter()
                .zip(wavelengths)
                .map(solve_one)
                .collect::<Result<Vec<_>>>()?
        };
        Ok(ResultList::new(results))
    }

    /// Solves at one wavelength for each angle, evaluating materials once.
    pub fn solve_angles(&mut self, wavelength: f64, aois: &[f64]) -> Result<ResultList> {
        let tensors = self.tensors(wavelength)?;
        debug!("solving {} angles at {} nm", aois.len(), wavelength);
        aois.iter()
            .map(|aoi| solve_tensors(&tensors, wavelength, *aoi, &self.options))
            .collect()
    }
}
