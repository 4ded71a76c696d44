//! Reflection and transmission of stratified thin-film stacks.
//!
//! `strata` solves Maxwell's equations for a plane wave incident on a stack of
//! plane-parallel layers, each described by a complex dielectric tensor, with
//! the 4x4 transfer-matrix method. Layers may be absorbing, anisotropic and
//! arbitrarily oriented.
//!
//! A solve runs through these stages:
//! - [`tensor`]: laboratory-frame dielectric tensors from material states
//! - [`propagator`]: per-layer propagation matrices, by interchangeable strategies
//! - [`composer`]: the global matrix of the stack, with scale control
//! - [`jones`]: Jones reflection and transmission coefficients
//! - [`result`]: ellipsometric angles, Mueller matrices and powers
//!
//! [`solver`] ties these together and [`sweep`] drives wavelength by angle grids
//! from [`settings`].

pub mod composer;
pub mod config;
pub mod dispersion;
pub mod ellipsometry;
pub mod error;
pub mod fresnel;
pub mod grid;
pub mod jones;
pub mod mueller;
pub mod orientation;
pub mod output;
pub mod powers;
pub mod propagator;
pub mod result;
pub mod settings;
pub mod snell;
pub mod solver;
pub mod structure;
pub mod sweep;
pub mod tensor;

pub use error::{Result, StrataError};
