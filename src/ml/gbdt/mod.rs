//! Deterministic gradient-boosted regression trees.
//!
//! Squared-error boosting with depth-limited trees, exact split search, and
//! L2-regularized leaf values. Small enough to audit, and the fitted model
//! serializes to plain JSON.

mod model;
mod train;

pub use model::{GbdtRegressor, RegressionTree, TreeNode};
pub use train::{TrainDataset, TrainOptions, train_gbdt_regressor};
