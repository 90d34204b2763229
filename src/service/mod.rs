pub use meter::*;

mod meter;

/// Name scoring.
pub mod score;
