//! Wavelength by angle sweeps.
//!
//! A [`Sweep`] solves a structure on every `(angle, wavelength)` point of a
//! grid. Materials are evaluated once per wavelength through the solver's
//! dispersion cache and reused for every angle.
//!
//! - Progress is reported per angle with an `indicatif` bar
//! - The batched strategy composes the wavelengths of an angle in parallel
//! - [`SweepResult`] exposes quantities as `angle x wavelength` grids

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use tracing::info;

use crate::output;
use crate::result::{OpticalResult, Quantity, ResultList};
use crate::settings::Settings;
use crate::solver::Solver;


/// All results of a sweep, one list per angle.
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub wavelengths: Vec<f64>,
    pub angles: Vec<f64>,
    pub lists: Vec<ResultList>,
    pub duration: Duration,
}

impl SweepResult {
    /// A quantity on the `angle x wavelength` grid.
    pub fn grid(&self, quantity: Quantity) -> Option<Array2<f64>> {
        let mut grid = Array2::zeros((self.angles.len(), self.wavelengths.len()));
        for (mut row, list) in grid.outer_iter_mut().zip(&self.lists) {
            row.assign(&list.get(quantity)?);
        }
        Some(grid)
    }

    /// Every result, angles outermost.
    pub fn points(&self) -> impl Iterator<Item = &OpticalResult> {
        self.lists.iter().flat_map(ResultList::iter)
    }

    /// Incoherent average over the angles at each wavelength.
    pub fn angle_average(&self) -> crate::error::Result<ResultList> {
        (0..self.wavelengths.len())
            .map(|j| {
                self.lists
                    .iter()
                    .map(|list| list.results()[j].clone())
                    .collect::<ResultList>()
                    .average()
            })
            .collect()
    }
}

/// A settings-driven sweep over wavelengths and angles of incidence.
#[derive(Debug)]
pub struct Sweep {
    pub settings: Settings,
    solver: Solver,
    wavelengths: Vec<f64>,
    angles: Vec<f64>,
    pub result: Option<SweepResult>,
}

impl Sweep {
    pub fn new(settings: Settings) -> Result<Self> {
        let structure = settings.structure()?;
        let solver = Solver::new(structure, settings.solver_options());
        let wavelengths = settings.wavelength.values()?;
        let angles = settings.aoi.values();
        Ok(Self {
            settings,
            solver,
            wavelengths,
            angles,
            result: None,
        })
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// Solves every grid point.
    ///
    /// **Context**: Ellipsometric measurements are usually spectra taken at a
    /// handful of angles, so the sweep is organised as one spectrum per angle.
    ///
    /// **How it Works**: Runs [`Solver::solve_wavelengths`] for each angle,
    /// which fills the dispersion cache on the first angle and reuses it for
    /// the rest. A failing point aborts the sweep with the point's context.
    pub fn solve(&mut self) -> Result<&SweepResult> {
        let start = Instant::now();
        info!(
            "solving {} wavelengths x {} angles with strategy {}",
            self.wavelengths.len(),
            self.angles.len(),
            self.settings.strategy
        );

        let pb = ProgressBar::new(self.angles.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            )?
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("angle".to_string());

        let mut lists = Vec::with_capacity(self.angles.len());
        for aoi in &self.angles {
            let list = self
                .solver
                .solve_wavelengths(&self.wavelengths, *aoi)
                .with_context(|| format!("solve failed at {} deg", aoi))?;
            lists.push(list);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let duration = start.elapsed();
        let points = (self.angles.len() * self.wavelengths.len()).max(1);
        info!(
            "time taken: {:.2?}, time per point: {:.2?}",
            duration,
            duration / points as u32
        );

        Ok(self.result.insert(SweepResult {
            wavelengths: self.wavelengths.clone(),
            angles: self.angles.clone(),
            lists,
            duration,
        }))
    }

    /// Writes tables, the summary and the effective settings to the output directory.
    pub fn writeup(&self) -> Result<()> {
        let result = self
            .result
            .as_ref()
            .context("the sweep has not been solved")?;
        let directory = &self.settings.directory;
        output::write_settings(&self.settings, directory)?;
        output::write_quantities(result, &self.settings.output.quantities, directory)?;
        if self.settings.output.mueller {
            output::write_mueller(result, directory)?;
        }
        output::write_summary(result, &self.settings, directory)?;
        Ok(())
    }
}
