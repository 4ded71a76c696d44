use num_complex::Complex64;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use strata::dispersion::{ConstantIndex, Material};
use strata::propagator::Strategy;
use strata::result::{OpticalResult, Quantity};
use strata::settings::Settings;
use strata::solver::{self, SolverOptions};
use strata::structure::Structure;
use strata::sweep::Sweep;

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Structure from `(n, k)` pairs, half-spaces first and last.
fn structure(indices: &[(f64, f64)], thicknesses: &[f64]) -> PyResult<Structure> {
    let material = |i: usize, (n, k): (f64, f64)| {
        Material::new(format!("layer{}", i), ConstantIndex::isotropic(Complex64::new(n, k)))
    };
    let (Some(front), Some(back)) = (indices.first(), indices.last()) else {
        return Err(value_error("at least two indices are required"));
    };
    if indices.len() < 2 || thicknesses.len() + 2 != indices.len() {
        return Err(value_error(format!(
            "{} indices need {} thicknesses, got {}",
            indices.len(),
            indices.len().saturating_sub(2),
            thicknesses.len()
        )));
    }
    let mut structure = Structure::new(material(0, *front), material(indices.len() - 1, *back));
    for (i, (index, thickness)) in indices[1..].iter().zip(thicknesses).enumerate() {
        structure
            .push(material(i + 1, *index), *thickness)
            .map_err(value_error)?;
    }
    Ok(structure)
}

fn solve_one(
    indices: Vec<(f64, f64)>,
    thicknesses: Vec<f64>,
    wavelength: f64,
    aoi: f64,
    strategy: &str,
) -> PyResult<OpticalResult> {
    let options = SolverOptions {
        strategy: strategy.parse::<Strategy>().map_err(value_error)?,
        ..Default::default()
    };
    let structure = structure(&indices, &thicknesses)?;
    solver::solve(&structure, wavelength, aoi, &options).map_err(value_error)
}

/// Psi and delta in degrees of an isotropic stack.
#[pyfunction]
#[pyo3(signature = (indices, thicknesses, wavelength, aoi, strategy = "eig"))]
fn ellipsometry(
    indices: Vec<(f64, f64)>,
    thicknesses: Vec<f64>,
    wavelength: f64,
    aoi: f64,
    strategy: &str,
) -> PyResult<(f64, f64)> {
    let result = solve_one(indices, thicknesses, wavelength, aoi, strategy)?;
    Ok((result.psi(), result.delta()))
}

/// Normalized reflection Mueller matrix of an isotropic stack, as rows.
#[pyfunction]
#[pyo3(signature = (indices, thicknesses, wavelength, aoi, strategy = "eig"))]
fn mueller(
    indices: Vec<(f64, f64)>,
    thicknesses: Vec<f64>,
    wavelength: f64,
    aoi: f64,
    strategy: &str,
) -> PyResult<Vec<Vec<f64>>> {
    let result = solve_one(indices, thicknesses, wavelength, aoi, strategy)?;
    Ok(result
        .mueller_matrix()
        .row_major()
        .chunks(4)
        .map(|row| row.to_vec())
        .collect())
}

/// Solves a TOML configuration and returns rows of
/// `[wavelength, aoi, quantity...]` for the named quantities.
#[pyfunction]
#[pyo3(signature = (config, quantities = vec!["psi".to_string(), "delta".to_string()]))]
fn solve_config(config: &str, quantities: Vec<String>) -> PyResult<Vec<Vec<f64>>> {
    let settings = Settings::from_toml(config).map_err(value_error)?;
    let quantities = quantities
        .iter()
        .map(|q| q.parse::<Quantity>().map_err(value_error))
        .collect::<PyResult<Vec<_>>>()?;
    let mut sweep = Sweep::new(settings).map_err(value_error)?;
    let result = sweep.solve().map_err(value_error)?;
    Ok(result
        .points()
        .map(|point| {
            let mut row = vec![point.wavelength, point.angle];
            row.extend(quantities.iter().map(|q| point.get(*q).unwrap_or(f64::NAN)));
            row
        })
        .collect())
}

#[pymodule]
fn strata_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(ellipsometry, m)?)?;
    m.add_function(wrap_pyfunction!(mueller, m)?)?;
    m.add_function(wrap_pyfunction!(solve_config, m)?)?;
    Ok(())
}
