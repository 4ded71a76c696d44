//! Energy bookkeeping of a stack.
//!
//! For unit incident power a passive stack splits the light into reflected,
//! transmitted and absorbed fractions. With a transparent incident medium the
//! absorbed fraction is whatever the other two leave over, so a lossless
//! stack shows zero absorption up to rounding and a gain medium a negative one.

use std::fmt;


/// Fractions of the incident power.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Powers {
    pub reflected: f64,
    pub transmitted: f64,
    pub absorbed: f64,
}

impl Powers {
    /// Powers from reflectance and transmittance, absorbing the remainder.
    pub fn new(reflected: f64, transmitted: f64) -> Self {
        Self {
            reflected,
            transmitted,
            absorbed: 1.0 - reflected - transmitted,
        }
    }

    /// Whether no fraction is negative beyond `tolerance`.
    pub fn is_conserved(&self, tolerance: f64) -> bool {
        self.reflected >= -tolerance && self.transmitted >= -tolerance && self.absorbed >= -tolerance
    }
}

impl fmt::Display for Powers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Powers:")?;
        writeln!(f, "  Reflected:        {:.6}", self.reflected)?;
        writeln!(f, "  Transmitted:      {:.6}", self.transmitted)?;
        writeln!(f, "  Absorbed:         {:.6}", self.absorbed)
    }
}
