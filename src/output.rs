//! Files written at the end of a sweep.
//!
//! Every run directory receives tab separated quantity and Mueller tables, a
//! copy of the resolved settings and a JSON summary with run statistics.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use itertools::Itertools;
use serde_json::json;

use crate::mueller::Polarization;
use crate::result::Quantity;
use crate::settings::Settings;
use crate::sweep::SweepResult;


fn create(directory: &Path, name: &str) -> Result<BufWriter<File>> {
    fs::create_dir_all(directory)
        .with_context(|| format!("could not create output directory {:?}", directory))?;
    let path = directory.join(name);
    let file = File::create(&path).with_context(|| format!("could not create {:?}", path))?;
    Ok(BufWriter::new(file))
}

fn format_row(wavelength: f64, aoi: f64, values: &[f64]) -> String {
    format!(
        "{} {} {}",
        wavelength,
        aoi,
        values.iter().map(|v| format!("{:.6e}", v)).join(" ")
    )
}

/// Writes the selected quantities of every point to `quantities.dat`.
///
/// Quantities a point cannot provide are written as `nan`.
pub fn write_quantities(result: &SweepResult, quantities: &[Quantity], directory: &Path) -> Result<()> {
    let mut writer = create(directory, "quantities.dat")?;
    writeln!(writer, "# wavelength aoi {}", quantities.iter().join(" "))?;
    for list in &result.lists {
        let columns: Vec<Vec<f64>> = quantities
            .iter()
            .map(|q| match list.get(*q) {
                Some(values) => values.to_vec(),
                None => vec![f64::NAN; list.len()],
            })
            .collect();
        for (i, point) in list.iter().enumerate() {
            let row: Vec<f64> = columns.iter().map(|column| column[i]).collect();
            writeln!(writer, "{}", format_row(point.wavelength, point.angle, &row))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes the normalized reflection Mueller matrix of every point to `mueller.dat`.
pub fn write_mueller(result: &SweepResult, directory: &Path) -> Result<()> {
    let mut writer = create(directory, "mueller.dat")?;
    let header = (1..=4)
        .cartesian_product(1..=4)
        .map(|(i, j)| format!("m{}{}", i, j))
        .join(" ");
    writeln!(writer, "# wavelength aoi {}", header)?;
    for point in result.points() {
        let m = point.mueller_matrix().row_major();
        writeln!(writer, "{}", format_row(point.wavelength, point.angle, &m))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the effective settings to `settings.toml`.
pub fn write_settings(settings: &Settings, directory: &Path) -> Result<()> {
    let text = toml::to_string(settings).context("could not serialize settings")?;
    let mut writer = create(directory, "settings.toml")?;
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Writes a JSON summary of the run to `summary.json`.
pub fn write_summary(result: &SweepResult, settings: &Settings, directory: &Path) -> Result<()> {
    let points: Vec<_> = result.points().collect();
    let unpolarized = Polarization::Unpolarized;
    let mean = |f: &dyn Fn(&crate::result::OpticalResult) -> f64| {
        points.iter().map(|p| f(p)).sum::<f64>() / points.len().max(1) as f64
    };
    let energy_conserved = points.iter().all(|p| {
        [Polarization::S, Polarization::P]
            .iter()
            .all(|pol| p.powers(pol).is_conserved(1e-9))
    });

    let summary = json!({
        "timestamp": Local::now().to_rfc3339(),
        "strategy": settings.strategy.to_string(),
        "wavelengths": result.wavelengths,
        "angles": result.angles,
        "points": points.len(),
        "duration_seconds": result.duration.as_secs_f64(),
        "mean_reflectance": mean(&|p| p.reflectance(&unpolarized)),
        "mean_transmittance": mean(&|p| p.transmittance(&unpolarized)),
        "mean_absorbance": mean(&|p| p.absorbance(&unpolarized)),
        "energy_conserved": energy_conserved,
    });

    let mut writer = create(directory, "summary.json")?;
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer.flush()?;
    Ok(())
}
