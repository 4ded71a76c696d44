/// Relative size below which off-diagonal tensor elements count as zero.
pub const TENSOR_TOLERANCE: f64 = 1e-12;
/// Imaginary parts of a principal permittivity below `-ACTIVE_TOLERANCE` mark a gain medium.
pub const ACTIVE_TOLERANCE: f64 = 1e-12;
/// Relative imaginary part below which a partial wave is classified by its real part.
pub const IMAG_TOLERANCE: f64 = 1e-10;
/// Relative separation below which two partial-wave eigenvalues are treated as degenerate.
pub const DEGENERACY_TOLERANCE: f64 = 1e-8;
/// Relative separation below which characteristic-quartic roots are merged into one double root.
pub const CLUSTER_TOLERANCE: f64 = 1e-7;
/// Relative singular value below which a direction belongs to an eigen null space.
pub const NULLSPACE_TOLERANCE: f64 = 1e-6;
/// Maximum residual for splitting a degenerate pair into pure s and p modes.
pub const SPLIT_TOLERANCE: f64 = 1e-6;
/// Largest acceptable condition estimate of a partial-wave matrix.
pub const MAX_CONDITION: f64 = 1e12;
/// Upper clamp of the real part of a phase exponent, exp(200) ~ 7e86.
pub const MAX_EXPONENT: f64 = 200.0;
/// Largest phase `k0 * d * |Delta|` for which the linearised propagator is accepted.
pub const LINEAR_MAX_PHASE: f64 = 1e-3;
/// Relative determinant below which the extraction block is singular.
pub const SINGULAR_TOLERANCE: f64 = 1e-14;
/// Iteration cap for Schur and SVD decompositions.
pub const MAX_ITERATIONS: usize = 1000;
/// Default number of slices a graded layer is cut into.
pub const DEFAULT_GRADED_SLICES: usize = 20;
