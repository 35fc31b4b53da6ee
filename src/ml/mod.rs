//! Machine learning building blocks for the weight estimator.
//!
//! Everything here is deterministic and dependency-free beyond serde so the
//! trained artifact is plain JSON that loads identically everywhere.

pub mod encoder;
pub mod gbdt;
pub mod metrics;
