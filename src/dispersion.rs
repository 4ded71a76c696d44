//! Boundary to the material dispersion providers.
//!
//! Dispersion modelling is not part of the solver. Providers only have to
//! implement [`Dispersion`], returning a [`MaterialState`] for a wavelength.
//! A handful of simple providers are included so that stacks can be described
//! in settings files and tests without an external material library.
//!
//! Expensive providers can be memoized with a [`DispersionCache`] owned by the
//! caller. The cache is never global: it is keyed by [`MaterialId`] and
//! wavelength and must be invalidated explicitly when a provider's parameters
//! change.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use itertools::Itertools;
use nalgebra::Matrix3;
use num_complex::Complex64;

use crate::error::{Result, StrataError};
use crate::orientation::Orientation;
use crate::tensor::{build_tensor, DielectricTensor, MaterialState};


/// A source of optical constants as a function of vacuum wavelength.
pub trait Dispersion: fmt::Debug + Send + Sync {
    fn material_state(&self, wavelength: f64) -> Result<MaterialState>;
}

/// Wavelength independent refractive index, one or three principal values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantIndex(pub Vec<Complex64>);

impl ConstantIndex {
    pub fn new(indices: Vec<Complex64>) -> Self {
        Self(indices)
    }

    pub fn isotropic(n: Complex64) -> Self {
        Self(vec![n])
    }
}

impl Dispersion for ConstantIndex {
    fn material_state(&self, _wavelength: f64) -> Result<MaterialState> {
        Ok(MaterialState::RefractiveIndex(self.0.clone()))
    }
}

/// Wavelength independent permittivity, one or three principal values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPermittivity(pub Vec<Complex64>);

impl Dispersion for ConstantPermittivity {
    fn material_state(&self, _wavelength: f64) -> Result<MaterialState> {
        Ok(MaterialState::Permittivity(self.0.clone()))
    }
}

/// Wavelength independent full tensor in the crystal frame, for gyrotropic
/// or otherwise non-symmetric media.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantTensor(pub Matrix3<Complex64>);

impl ConstantTensor {
    /// Polar magneto-optic tensor: `eps` on the diagonal, `eps_xy = -eps_yx = g`.
    pub fn gyrotropic(eps: Complex64, g: Complex64) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        Self(Matrix3::new(eps, g, zero, -g, eps, zero, zero, zero, eps))
    }
}

impl Dispersion for ConstantTensor {
    fn material_state(&self, _wavelength: f64) -> Result<MaterialState> {
        Ok(MaterialState::Tensor(self.0))
    }
}

/// Cauchy formula `n = a + b / l^2 + c / l^4`, wavelength `l` in nanometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cauchy {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Cauchy {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }
}

impl Dispersion for Cauchy {
    fn material_state(&self, wavelength: f64) -> Result<MaterialState> {
        let l2 = wavelength * wavelength;
        let n = self.a + self.b / l2 + self.c / (l2 * l2);
        Ok(MaterialState::RefractiveIndex(vec![Complex64::new(n, 0.0)]))
    }
}

/// Isotropic refractive index sampled on a wavelength grid and linearly interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct Tabulated {
    wavelengths: Vec<f64>,
    indices: Vec<Complex64>,
}

impl Tabulated {
    pub fn new(wavelengths: Vec<f64>, indices: Vec<Complex64>) -> Result<Self> {
        if wavelengths.len() != indices.len() || wavelengths.len() < 2 {
            return Err(StrataError::InvalidMaterial(format!(
                "table needs at least two matching samples, got {} wavelengths and {} indices",
                wavelengths.len(),
                indices.len()
            )));
        }
        if !wavelengths.iter().tuple_windows().all(|(a, b)| a < b) {
            return Err(StrataError::InvalidMaterial(
                "table wavelengths must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            wavelengths,
            indices,
        })
    }
}

impl Dispersion for Tabulated {
    fn material_state(&self, wavelength: f64) -> Result<MaterialState> {
        let (lo, hi) = (self.wavelengths[0], self.wavelengths[self.wavelengths.len() - 1]);
        if !(lo..=hi).contains(&wavelength) {
            return Err(StrataError::InvalidMaterial(format!(
                "wavelength {} outside tabulated range {}..{}",
                wavelength, lo, hi
            )));
        }
        let n = self
            .wavelengths
            .iter()
            .zip(self.indices.iter())
            .tuple_windows()
            .find(|((_, _), (w1, _))| wavelength <= **w1)
            .map(|((w0, n0), (w1, n1))| {
                let f = (wavelength - w0) / (w1 - w0);
                n0 + (n1 - n0) * f
            })
            .unwrap_or(self.indices[self.indices.len() - 1]);
        Ok(MaterialState::RefractiveIndex(vec![n]))
    }
}

/// Identity of a material for caching purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(0);

impl MaterialId {
    fn fresh() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A dispersion provider together with the orientation of its crystal frame.
#[derive(Debug, Clone)]
pub struct Material {
    id: MaterialId,
    pub name: String,
    dispersion: Arc<dyn Dispersion>,
    orientation: Option<Orientation>,
}

impl Material {
    pub fn new(name: impl Into<String>, dispersion: impl Dispersion + 'static) -> Self {
        Self::from_arc(name, Arc::new(dispersion))
    }

    pub fn from_arc(name: impl Into<String>, dispersion: Arc<dyn Dispersion>) -> Self {
        Self {
            id: MaterialId::fresh(),
            name: name.into(),
            dispersion,
            orientation: None,
        }
    }

    /// Returns the material rotated into `orientation`, under a new identity.
    pub fn with_orientation(self, orientation: Orientation) -> Self {
        Self {
            id: MaterialId::fresh(),
            orientation: Some(orientation),
            ..self
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn orientation(&self) -> Option<&Orientation> {
        self.orientation.as_ref()
    }

    /// Laboratory-frame tensor at `wavelength`, memoized in `cache` when given.
    pub fn tensor(
        &self,
        wavelength: f64,
        cache: Option<&mut DispersionCache>,
    ) -> Result<DielectricTensor> {
        let evaluate = || {
            let state = self.dispersion.material_state(wavelength)?;
            build_tensor(&state, self.orientation.as_ref())
        };
        match cache {
            Some(cache) => cache.get_or_try_insert(self.id, wavelength, evaluate),
            None => evaluate(),
        }
    }
}

/// Caller-owned memo of evaluated tensors, keyed by material and wavelength.
#[derive(Debug, Default, Clone)]
pub struct DispersionCache {
    entries: HashMap<(MaterialId, u64), DielectricTensor>,
    hits: usize,
}

impl DispersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_try_insert(
        &mut self,
        id: MaterialId,
        wavelength: f64,
        evaluate: impl FnOnce() -> Result<DielectricTensor>,
    ) -> Result<DielectricTensor> {
        let key = (id, wavelength.to_bits());
        if let Some(tensor) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(*tensor);
        }
        let tensor = evaluate()?;
        self.entries.insert(key, tensor);
        Ok(tensor)
    }

    /// Drops every entry of one material, e.g. after its parameters changed.
    pub fn invalidate(&mut self, id: MaterialId) {
        self.entries.retain(|(entry_id, _), _| *entry_id != id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
