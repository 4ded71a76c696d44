//! Runtime configuration of the `strata` binary and Python bindings.
//!
//! Settings are layered like so:
//! - `config/default.toml`, or `config/local.toml` when it exists
//! - environment variables prefixed with `STRATA_`
//! - command-line arguments, see [`CliArgs`]
//!
//! A structure is described as a list of layers from the incident half-space
//! to the exit half-space. The two half-spaces have no thickness.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dispersion::{Cauchy, ConstantIndex, Material, Tabulated};
use crate::ellipsometry::{AngleUnit, DeltaRange};
use crate::grid;
use crate::orientation::Orientation;
use crate::propagator::Strategy;
use crate::result::Quantity;
use crate::solver::SolverOptions;
use crate::structure::Structure;


/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    /// Vacuum wavelengths in nanometres.
    pub wavelength: Wavelengths,
    /// Angles of incidence in degrees.
    pub aoi: Angles,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub delta_range: DeltaRange,
    #[serde(default)]
    pub angle_unit: AngleUnit,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_directory() -> PathBuf {
    PathBuf::from("strata_run")
}

fn default_quantities() -> Vec<Quantity> {
    vec![Quantity::Psi, Quantity::Delta, Quantity::Rs, Quantity::Rp]
}

fn default_slices() -> usize {
    crate::config::DEFAULT_GRADED_SLICES
}

/// A single wavelength, a list, or an inclusive range.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Wavelengths {
    Single(f64),
    List(Vec<f64>),
    Range { start: f64, stop: f64, step: f64 },
}

impl Wavelengths {
    pub fn values(&self) -> Result<Vec<f64>> {
        match self {
            Wavelengths::Single(w) => Ok(vec![*w]),
            Wavelengths::List(w) => Ok(w.clone()),
            Wavelengths::Range { start, stop, step } => grid::arange(*start, *stop, *step)
                .map(|values| values.to_vec())
                .map_err(|e| anyhow!(e)),
        }
    }
}

/// One angle of incidence or a list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Angles {
    Single(f64),
    List(Vec<f64>),
}

impl Angles {
    pub fn values(&self) -> Vec<f64> {
        match self {
            Angles::Single(a) => vec![*a],
            Angles::List(a) => a.clone(),
        }
    }
}

/// Optical model of a layer material.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum MaterialSpec {
    /// Constant isotropic index `n + ik`.
    Index {
        n: f64,
        #[serde(default)]
        k: f64,
    },
    /// Constant principal indices along the crystal axes.
    Anisotropic {
        n: [f64; 3],
        #[serde(default)]
        k: [f64; 3],
    },
    Cauchy {
        a: f64,
        #[serde(default)]
        b: f64,
        #[serde(default)]
        c: f64,
    },
    /// Index table, linearly interpolated. Missing `k` means transparent.
    Table {
        wavelengths: Vec<f64>,
        n: Vec<f64>,
        #[serde(default)]
        k: Vec<f64>,
    },
}

impl MaterialSpec {
    pub fn material(&self, name: &str) -> Result<Material> {
        let material = match self {
            MaterialSpec::Index { n, k } => {
                Material::new(name, ConstantIndex::isotropic(Complex64::new(*n, *k)))
            }
            MaterialSpec::Anisotropic { n, k } => Material::new(
                name,
                ConstantIndex::new(
                    n.iter()
                        .zip(k)
                        .map(|(n, k)| Complex64::new(*n, *k))
                        .collect(),
                ),
            ),
            MaterialSpec::Cauchy { a, b, c } => Material::new(name, Cauchy::new(*a, *b, *c)),
            MaterialSpec::Table { wavelengths, n, k } => {
                if !k.is_empty() && k.len() != n.len() {
                    bail!("material {}: {} n values but {} k values", name, n.len(), k.len());
                }
                let indices = n
                    .iter()
                    .enumerate()
                    .map(|(i, n)| Complex64::new(*n, k.get(i).copied().unwrap_or(0.0)))
                    .collect();
                let table = Tabulated::new(wavelengths.clone(), indices)
                    .with_context(|| format!("material {}", name))?;
                Material::new(name, table)
            }
        };
        Ok(material)
    }

    /// The constant isotropic index, if this is one.
    fn index(&self) -> Option<Complex64> {
        match self {
            MaterialSpec::Index { n, k } => Some(Complex64::new(*n, *k)),
            _ => None,
        }
    }
}

/// A linear index gradient from the layer material to `to`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GradedSpec {
    pub to: MaterialSpec,
    #[serde(default = "default_slices")]
    pub slices: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub material: MaterialSpec,
    /// Thickness in nanometres; absent for the half-spaces.
    #[serde(default)]
    pub thickness: Option<f64>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub graded: Option<GradedSpec>,
}

impl LayerSpec {
    fn material(&self) -> Result<Material> {
        let material = self.material.material(&self.name)?;
        Ok(match self.orientation {
            Some(orientation) => material.with_orientation(orientation),
            None => material,
        })
    }

    fn push_onto(&self, structure: &mut Structure) -> Result<()> {
        let thickness = self
            .thickness
            .ok_or_else(|| anyhow!("interior layer {} needs a thickness", self.name))?;
        let Some(graded) = &self.graded else {
            structure.push(self.material()?, thickness)?;
            return Ok(());
        };
        let (Some(start), Some(end)) = (self.material.index(), graded.to.index()) else {
            bail!("graded layer {} must interpolate between two index models", self.name);
        };
        let name = &self.name;
        structure.push_graded(thickness, graded.slices, |depth| {
            let n = start + (end - start) * depth;
            Material::new(format!("{}@{:.3}", name, depth), ConstantIndex::isotropic(n))
        })?;
        Ok(())
    }
}

/// Output selection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutputSettings {
    #[serde(default = "default_quantities")]
    pub quantities: Vec<Quantity>,
    /// Also write the normalized reflection Mueller matrix of every point.
    #[serde(default)]
    pub mueller: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            quantities: default_quantities(),
            mueller: false,
        }
    }
}

impl Settings {
    /// Parses and validates settings from a TOML string.
    pub fn from_toml(text: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .context("could not read configuration")?;
        let settings: Settings = config
            .try_deserialize()
            .context("could not deserialize configuration")?;
        validate_config(&settings)?;
        Ok(settings)
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            strategy: self.strategy,
            delta_range: self.delta_range,
            angle_unit: self.angle_unit,
        }
    }

    /// Builds the layer stack, slicing graded layers.
    pub fn structure(&self) -> Result<Structure> {
        let (Some(front), Some(back)) = (self.layers.first(), self.layers.last()) else {
            bail!("a structure needs at least two layers");
        };
        if self.layers.len() < 2 {
            bail!("a structure needs at least two layers");
        }
        for half_space in [front, back] {
            if half_space.thickness.is_some() || half_space.graded.is_some() {
                bail!("half-space {} cannot have a thickness", half_space.name);
            }
        }
        let mut structure = Structure::new(front.material()?, back.material()?);
        for layer in &self.layers[1..self.layers.len() - 1] {
            layer
                .push_onto(&mut structure)
                .with_context(|| format!("layer {}", layer.name))?;
        }
        debug!("built structure:\n{}", structure);
        Ok(structure)
    }
}

/// Loads the settings shipped in `config/default.toml`.
pub fn load_default_config() -> Result<Settings> {
    let default_config_file = retrieve_project_root()?.join("config/default.toml");
    load_file(&default_config_file, false)
}

/// Loads layered settings and applies command-line overrides.
pub fn load_config() -> Result<Settings> {
    let args = CliArgs::parse();
    let config_file = match &args.config {
        Some(path) => path.clone(),
        None => {
            let root = retrieve_project_root()?;
            let local_config = root.join("config/local.toml");
            if local_config.exists() {
                local_config
            } else {
                root.join("config/default.toml")
            }
        }
    };
    info!("using configuration {:?}", config_file);

    let mut settings = load_file(&config_file, true)?;
    apply_args(&mut settings, args);
    validate_config(&settings)?;
    debug!("{:#?}", settings);
    Ok(settings)
}

fn load_file(path: &Path, with_environment: bool) -> Result<Settings> {
    let mut builder = Config::builder().add_source(File::from(path).required(true));
    if with_environment {
        builder = builder.add_source(Environment::with_prefix("strata"));
    }
    let settings: Settings = builder
        .build()
        .with_context(|| format!("could not load configuration {:?}", path))?
        .try_deserialize()
        .with_context(|| format!("could not deserialize configuration {:?}", path))?;
    validate_config(&settings)?;
    Ok(settings)
}

fn apply_args(settings: &mut Settings, args: CliArgs) {
    if let Some(aoi) = args.aoi {
        settings.aoi = Angles::List(aoi);
    }
    if let Some(w) = args.w {
        settings.wavelength = match w.as_slice() {
            [single] => Wavelengths::Single(*single),
            _ => Wavelengths::List(w),
        };
    }
    if let Some(range) = args.range {
        if let [start, stop, step] = range[..] {
            settings.wavelength = Wavelengths::Range { start, stop, step };
        }
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if let Some(delta_range) = args.delta_range {
        settings.delta_range = delta_range;
    }
    if let Some(unit) = args.unit {
        settings.angle_unit = unit;
    }
    if let Some(dir) = args.dir {
        settings.directory = dir;
    }
}

/// Retrieve the project root directory.
///
/// Tries, in order, the `CARGO_MANIFEST_DIR` and `STRATA_ROOT_DIR` environment
/// variables and then the nearest ancestor of the executable that contains a
/// `config` subdirectory.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("STRATA_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }
    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("could not find a project root containing config/"))
}

fn validate_config(settings: &Settings) -> Result<()> {
    let wavelengths = settings.wavelength.values()?;
    if wavelengths.is_empty() || wavelengths.iter().any(|w| !(*w > 0.0)) {
        bail!("wavelengths must be positive, got {:?}", wavelengths);
    }
    let angles = settings.aoi.values();
    if angles.is_empty() || angles.iter().any(|a| !(0.0..90.0).contains(a)) {
        bail!("angles of incidence must lie in [0, 90) degrees, got {:?}", angles);
    }
    if settings.layers.len() < 2 {
        bail!("at least the two half-spaces must be given");
    }
    if settings.output.quantities.is_empty() {
        bail!("no output quantities selected");
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "strata - transfer-matrix optics of stratified thin films")]
pub struct CliArgs {
    /// Angles of incidence in degrees, separated by spaces.
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    aoi: Option<Vec<f64>>,

    /// Vacuum wavelengths in nanometres, separated by spaces.
    #[arg(short, long, num_args = 1.., value_delimiter = ' ', group = "wavelengths")]
    w: Option<Vec<f64>>,

    /// Inclusive wavelength range in nanometres.
    /// Format: start stop step
    #[arg(long, num_args = 3, value_delimiter = ' ', group = "wavelengths")]
    range: Option<Vec<f64>>,

    /// Layer propagation strategy: eig, expm, linear, reduced2x2 or batched.
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Branch of delta: symmetric, positive or unwrapped.
    #[arg(long)]
    delta_range: Option<DeltaRange>,

    /// Unit of reported angles: degrees or radians.
    #[arg(long)]
    unit: Option<AngleUnit>,

    /// Output directory.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Configuration file to use instead of config/default.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Settings:")?;
        writeln!(f, "  - Wavelengths: {:?}", self.wavelength)?;
        writeln!(f, "  - Angles of incidence: {:?}", self.aoi.values())?;
        writeln!(f, "  - Strategy: {}", self.strategy)?;
        writeln!(f, "  - Delta range: {}", self.delta_range)?;
        writeln!(f, "  - Angle unit: {}", self.angle_unit)?;
        for layer in &self.layers {
            match layer.thickness {
                Some(d) => writeln!(f, "  - Layer {}: {} nm", layer.name, d)?,
                None => writeln!(f, "  - Layer {}: half-space", layer.name)?,
            }
        }
        Ok(())
    }
}
