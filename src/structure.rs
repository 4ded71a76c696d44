//! Layered structures.
//!
//! A [`Structure`] is an ordered stack of [`Layer`]s bounded by two
//! semi-infinite half-spaces: the incident medium first, the exit medium last.
//! Finite layers in between carry a thickness in nanometres.
//!
//! Depth-graded layers are not represented directly. [`Structure::push_graded`]
//! cuts them into homogeneous slices when the structure is built, so the
//! solver only ever sees homogeneous layers.

use std::fmt;

use crate::dispersion::Material;
use crate::error::{Result, StrataError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispersion::ConstantIndex;
    use num_complex::Complex64;

    fn material(name: &str, n: f64) -> Material {
        Material::new(name, ConstantIndex::isotropic(Complex64::new(n, 0.0)))
    }

    fn stack() -> Structure {
        let mut structure = Structure::new(material("air", 1.0), material("glass", 1.5));
        structure.push(material("a", 2.0), 10.0).unwrap();
        structure.push(material("b", 1.8), 20.0).unwrap();
        structure
    }

    #[test]
    fn push_keeps_half_spaces() {
        let structure = stack();
        assert_eq!(structure.len(), 4);
        assert_eq!(structure.front().material.name, "air");
        assert_eq!(structure.back().material.name, "glass");
        assert_eq!(structure.total_thickness(), 30.0);
        let names: Vec<_> = structure
            .finite_layers()
            .map(|layer| layer.material.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn from_layers_validation() {
        assert!(matches!(
            Structure::from_layers(vec![Layer::half_space(material("air", 1.0))]),
            Err(StrataError::EmptyStructure(1))
        ));
        let misplaced = vec![
            Layer::new(material("a", 2.0), 10.0),
            Layer::half_space(material("glass", 1.5)),
        ];
        assert!(matches!(
            Structure::from_layers(misplaced),
            Err(StrataError::InvalidParameter(_))
        ));
        let interior_half_space = vec![
            Layer::half_space(material("air", 1.0)),
            Layer::half_space(material("a", 2.0)),
            Layer::half_space(material("glass", 1.5)),
        ];
        assert!(Structure::from_layers(interior_half_space).is_err());
    }

    #[test]
    fn negative_thickness_rejected() {
        let mut structure = stack();
        assert!(structure.push(material("c", 1.2), -1.0).is_err());
        assert!(structure.set_thickness(1, f64::NAN).is_err());
        assert!(structure.set_thickness(0, 5.0).is_err());
        structure.set_thickness(1, 0.0).unwrap();
        assert_eq!(structure.total_thickness(), 20.0);
    }

    #[test]
    fn insert_and_remove() {
        let mut structure = stack();
        structure.insert(1, material("c", 1.2), 5.0).unwrap();
        assert_eq!(structure.layer(1).unwrap().material.name, "c");
        assert!(structure.insert(0, material("d", 1.2), 5.0).is_err());
        assert!(structure.remove(0).is_err());
        assert!(structure.remove(4).is_err());
        let removed = structure.remove(1).unwrap();
        assert_eq!(removed.material.name, "c");
        assert_eq!(structure.len(), 4);
    }

    #[test]
    fn reversed_swaps_half_spaces() {
        let reversed = stack().reversed();
        let names: Vec<_> = reversed.iter().map(|l| l.material.name.as_str()).collect();
        assert_eq!(names, ["glass", "b", "a", "air"]);
        assert!(reversed.front().is_semi_infinite());
    }

    #[test]
    fn graded_layer_slices_at_midpoints() {
        let mut structure = Structure::new(material("air", 1.0), material("glass", 1.5));
        let mut depths = Vec::new();
        structure
            .push_graded(40.0, 4, |depth| {
                depths.push(depth);
                material("graded", 1.5 + depth)
            })
            .unwrap();
        assert_eq!(structure.len(), 6);
        assert_eq!(depths, [0.125, 0.375, 0.625, 0.875]);
        assert_eq!(structure.total_thickness(), 40.0);
        assert!(structure
            .push_graded(10.0, 0, |_| material("x", 1.0))
            .is_err());
    }
}

/// Thickness of a layer in nanometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Thickness {
    Finite(f64),
    SemiInfinite,
}

impl Thickness {
    pub fn value(&self) -> Option<f64> {
        match self {
            Thickness::Finite(d) => Some(*d),
            Thickness::SemiInfinite => None,
        }
    }
}

impl fmt::Display for Thickness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thickness::Finite(d) => write!(f, "{} nm", d),
            Thickness::SemiInfinite => write!(f, "semi-infinite"),
        }
    }
}

fn check_thickness(thickness: f64) -> Result<f64> {
    if thickness.is_finite() && thickness >= 0.0 {
        Ok(thickness)
    } else {
        Err(StrataError::InvalidParameter(format!(
            "layer thickness must be finite and non-negative, got {}",
            thickness
        )))
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub material: Material,
    pub thickness: Thickness,
}

impl Layer {
    pub fn new(material: Material, thickness: f64) -> Self {
        Self {
            material,
            thickness: Thickness::Finite(thickness),
        }
    }

    pub fn half_space(material: Material) -> Self {
        Self {
            material,
            thickness: Thickness::SemiInfinite,
        }
    }

    pub fn is_semi_infinite(&self) -> bool {
        self.thickness == Thickness::SemiInfinite
    }
}

/// An ordered stack of layers between two semi-infinite half-spaces.
#[derive(Debug, Clone)]
pub struct Structure {
    layers: Vec<Layer>,
}

impl Structure {
    /// A bare interface between the incident and exit media.
    pub fn new(front: Material, back: Material) -> Self {
        Self {
            layers: vec![Layer::half_space(front), Layer::half_space(back)],
        }
    }

    /// Validates a complete layer sequence.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.len() < 2 {
            return Err(StrataError::EmptyStructure(layers.len()));
        }
        let last = layers.len() - 1;
        for (i, layer) in layers.iter().enumerate() {
            let boundary = i == 0 || i == last;
            match layer.thickness {
                Thickness::SemiInfinite if !boundary => {
                    return Err(StrataError::InvalidParameter(format!(
                        "layer {} ({}) is semi-infinite but not a boundary",
                        i, layer.material.name
                    )))
                }
                Thickness::Finite(_) if boundary => {
                    return Err(StrataError::InvalidParameter(format!(
                        "boundary layer {} ({}) must be semi-infinite",
                        i, layer.material.name
                    )))
                }
                Thickness::Finite(d) => {
                    check_thickness(d)?;
                }
                Thickness::SemiInfinite => {}
            }
        }
        Ok(Self { layers })
    }

    /// Appends a finite layer just before the exit half-space.
    pub fn push(&mut self, material: Material, thickness: f64) -> Result<()> {
        let index = self.layers.len() - 1;
        self.insert(index, material, thickness)
    }

    /// Inserts a finite layer at `index`, between the two half-spaces.
    pub fn insert(&mut self, index: usize, material: Material, thickness: f64) -> Result<()> {
        if index == 0 || index >= self.layers.len() {
            return Err(StrataError::InvalidParameter(format!(
                "cannot insert a finite layer at index {} of {}",
                index,
                self.layers.len()
            )));
        }
        let thickness = check_thickness(thickness)?;
        self.layers.insert(index, Layer::new(material, thickness));
        Ok(())
    }

    /// Removes a finite layer. The half-spaces cannot be removed.
    pub fn remove(&mut self, index: usize) -> Result<Layer> {
        self.finite_index(index)?;
        Ok(self.layers.remove(index))
    }

    pub fn set_thickness(&mut self, index: usize, thickness: f64) -> Result<()> {
        self.finite_index(index)?;
        self.layers[index].thickness = Thickness::Finite(check_thickness(thickness)?);
        Ok(())
    }

    pub fn set_material(&mut self, index: usize, material: Material) -> Result<()> {
        let len = self.layers.len();
        let layer = self.layers.get_mut(index).ok_or_else(|| {
            StrataError::InvalidParameter(format!("layer index {} out of range 0..{}", index, len))
        })?;
        layer.material = material;
        Ok(())
    }

    /// Replaces a depth-graded layer by `slices` homogeneous slices.
    ///
    /// `profile` receives the normalized depth of each slice midpoint, from
    /// `0` at the front face to `1` at the back face, and returns the slice
    /// material.
    pub fn push_graded(
        &mut self,
        thickness: f64,
        slices: usize,
        mut profile: impl FnMut(f64) -> Material,
    ) -> Result<()> {
        if slices == 0 {
            return Err(StrataError::InvalidParameter(
                "graded layer needs at least one slice".to_string(),
            ));
        }
        let thickness = check_thickness(thickness)?;
        let slice = thickness / slices as f64;
        for i in 0..slices {
            let depth = (i as f64 + 0.5) / slices as f64;
            self.push(profile(depth), slice)?;
        }
        Ok(())
    }

    /// The same stack illuminated from the exit side.
    pub fn reversed(&self) -> Self {
        Self {
            layers: self.layers.iter().rev().cloned().collect(),
        }
    }

    fn finite_index(&self, index: usize) -> Result<()> {
        if index == 0 || index + 1 >= self.layers.len() {
            return Err(StrataError::InvalidParameter(format!(
                "layer {} is not a finite layer",
                index
            )));
        }
        Ok(())
    }

    pub fn total_thickness(&self) -> f64 {
        self.layers.iter().filter_map(|l| l.thickness.value()).sum()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn front(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn back(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    pub fn finite_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers[1..self.layers.len() - 1].iter()
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(f, "  {:>3}  {:<16} {}", i, layer.material.name, layer.thickness)?;
        }
        Ok(())
    }
}
