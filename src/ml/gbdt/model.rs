use serde::{Deserialize, Serialize};

/// Node of a regression tree stored in a flat arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Route `feature <= threshold` to `left`, everything else to `right`.
    Split {
        feature_index: u32,
        threshold: f32,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f64,
    },
}

/// Depth-limited regression tree; the root is `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Predict the tree output for a feature vector. Missing features read as 0.
    pub fn predict(&self, features: &[f32]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature_index as usize).copied().unwrap_or(0.0);
                    let next = if value <= *threshold { *left } else { *right };
                    idx = next as usize;
                }
                None => return 0.0,
            }
        }
    }

    /// Number of splits on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    fn validate(&self, feature_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature_index as usize >= feature_len {
                        return Err(format!(
                            "Node {idx} splits on feature {feature_index} but the model has {feature_len}"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("Node {idx} has a non-finite threshold"));
                    }
                    // Children always follow their parent, which also rules out cycles.
                    for child in [*left, *right] {
                        if child as usize <= idx || child as usize >= self.nodes.len() {
                            return Err(format!("Node {idx} has invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("Leaf {idx} has a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Gradient-boosted regression tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtRegressor {
    /// Model format version.
    pub model_version: i64,
    /// Number of `f32` values per feature vector.
    pub feature_len: usize,
    /// Shrinkage applied to each tree output.
    pub learning_rate: f64,
    /// Prediction before any tree is applied (the training target mean).
    pub base_score: f64,
    pub max_depth: usize,
    pub trees: Vec<RegressionTree>,
}

impl GbdtRegressor {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err("Model has non-finite base score or learning rate".to_string());
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_len)
                .map_err(|err| format!("Tree {tree_idx}: {err}"))?;
            if tree.depth() > self.max_depth {
                return Err(format!(
                    "Tree {tree_idx} is deeper than max_depth {}",
                    self.max_depth
                ));
            }
        }
        Ok(())
    }

    /// Predict the target for one feature vector.
    pub fn predict(&self, features: &[f32]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| {
                acc + self.learning_rate * tree.predict(features)
            })
    }
}
