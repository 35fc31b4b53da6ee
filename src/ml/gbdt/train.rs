use super::model::{GbdtRegressor, RegressionTree, TreeNode};

/// Minimum gain a split must add to be kept.
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Training hyperparameters for tree boosting.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Number of boosting rounds (one tree per round).
    pub n_trees: usize,
    /// Shrinkage applied to each tree.
    pub learning_rate: f64,
    /// Maximum number of splits from root to leaf.
    pub max_depth: usize,
    /// L2 penalty on leaf values.
    pub l2_regularization: f64,
    /// Minimum number of rows on each side of a split.
    pub min_samples_leaf: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: 0.1,
            max_depth: 6,
            l2_regularization: 1.0,
            min_samples_leaf: 1,
        }
    }
}

/// In-memory dataset used for training and evaluation.
#[derive(Debug, Clone)]
pub struct TrainDataset {
    /// Number of `f32` values in each feature vector.
    pub feature_len: usize,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Targets aligned with `x`.
    pub y: Vec<f64>,
}

/// Fit a squared-error gradient-boosted tree ensemble.
pub fn train_gbdt_regressor(
    dataset: &TrainDataset,
    options: &TrainOptions,
) -> Result<GbdtRegressor, String> {
    if dataset.x.len() != dataset.y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if dataset.x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    if dataset.y.iter().any(|v| !v.is_finite()) {
        return Err("Targets must be finite".to_string());
    }
    if dataset.x.iter().any(|row| row.len() != dataset.feature_len) {
        return Err(format!(
            "Every feature row must have {} values",
            dataset.feature_len
        ));
    }

    let n = dataset.y.len();
    let base_score = dataset.y.iter().sum::<f64>() / n as f64;
    let mut predictions = vec![base_score; n];
    let mut trees = Vec::with_capacity(options.n_trees);

    let layout = FeatureLayout::of(&dataset.x, dataset.feature_len);
    for _round in 0..options.n_trees {
        let residuals: Vec<f64> = dataset
            .y
            .iter()
            .zip(&predictions)
            .map(|(y, p)| y - p)
            .collect();
        let tree = TreeBuilder::new(&dataset.x, &residuals, &layout, options).build();
        for (pred, row) in predictions.iter_mut().zip(&dataset.x) {
            *pred += options.learning_rate * tree.predict(row);
        }
        trees.push(tree);
    }

    Ok(GbdtRegressor {
        model_version: 1,
        feature_len: dataset.feature_len,
        learning_rate: options.learning_rate,
        base_score,
        max_depth: options.max_depth,
        trees,
    })
}

/// How split search reads the feature matrix.
enum FeatureLayout {
    /// Every value is 0 or 1; holds the indices of the ones for each row.
    Binary {
        feature_len: usize,
        active: Vec<Vec<usize>>,
    },
    /// Arbitrary values; splits are found by sorting.
    Dense,
}

impl FeatureLayout {
    fn of(x: &[Vec<f32>], feature_len: usize) -> Self {
        let binary = x.iter().flatten().all(|v| *v == 0.0 || *v == 1.0);
        if !binary {
            return Self::Dense;
        }
        let active = x
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| **v == 1.0)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        Self::Binary {
            feature_len,
            active,
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f32>],
    residuals: &'a [f64],
    layout: &'a FeatureLayout,
    options: &'a TrainOptions,
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature_index: usize,
    threshold: f32,
    gain: f64,
}

impl<'a> TreeBuilder<'a> {
    fn new(
        x: &'a [Vec<f32>],
        residuals: &'a [f64],
        layout: &'a FeatureLayout,
        options: &'a TrainOptions,
    ) -> Self {
        Self {
            x,
            residuals,
            layout,
            options,
            nodes: Vec::new(),
        }
    }

    fn build(mut self) -> RegressionTree {
        let rows: Vec<usize> = (0..self.residuals.len()).collect();
        self.grow(&rows, 0);
        RegressionTree { nodes: self.nodes }
    }

    /// Append the subtree for `rows` and return its node index.
    fn grow(&mut self, rows: &[usize], depth: usize) -> u32 {
        let idx = self.nodes.len();
        let sum: f64 = rows.iter().map(|&i| self.residuals[i]).sum();
        let leaf = TreeNode::Leaf {
            value: sum / (rows.len() as f64 + self.options.l2_regularization),
        };

        let split = if depth < self.options.max_depth {
            self.best_split(rows, sum)
        } else {
            None
        };
        let Some(split) = split else {
            self.nodes.push(leaf);
            return idx as u32;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| self.feature(i, split.feature_index) <= split.threshold);
        // Reserve the slot so children land after their parent.
        self.nodes.push(leaf);
        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature_index: split.feature_index as u32,
            threshold: split.threshold,
            left,
            right,
        };
        idx as u32
    }

    fn feature(&self, row: usize, feature_index: usize) -> f32 {
        self.x[row].get(feature_index).copied().unwrap_or(0.0)
    }

    fn best_split(&self, rows: &[usize], total_sum: f64) -> Option<Split> {
        let min_leaf = self.options.min_samples_leaf.max(1);
        if rows.len() < 2 * min_leaf {
            return None;
        }
        match self.layout {
            FeatureLayout::Binary {
                feature_len,
                active,
            } => self.best_binary_split(rows, total_sum, *feature_len, active, min_leaf),
            FeatureLayout::Dense => self.best_sorted_split(rows, total_sum, min_leaf),
        }
    }

    /// One pass over the rows' active features gives, per feature, the
    /// residual sum and count of the `1` side; the `0` side is the remainder.
    fn best_binary_split(
        &self,
        rows: &[usize],
        total_sum: f64,
        feature_len: usize,
        active: &[Vec<usize>],
        min_leaf: usize,
    ) -> Option<Split> {
        let lambda = self.options.l2_regularization;
        let parent_score = score(total_sum, rows.len(), lambda);
        let mut one_sum = vec![0.0f64; feature_len];
        let mut one_count = vec![0usize; feature_len];
        for &row in rows {
            for &feature in &active[row] {
                one_sum[feature] += self.residuals[row];
                one_count[feature] += 1;
            }
        }

        let mut best: Option<Split> = None;
        for feature_index in 0..feature_len {
            let right_count = one_count[feature_index];
            let left_count = rows.len() - right_count;
            if left_count < min_leaf || right_count < min_leaf {
                continue;
            }
            let right_sum = one_sum[feature_index];
            let gain = score(total_sum - right_sum, left_count, lambda)
                + score(right_sum, right_count, lambda)
                - parent_score;
            if gain > MIN_SPLIT_GAIN && best.is_none_or(|b| gain > b.gain) {
                best = Some(Split {
                    feature_index,
                    threshold: 0.5,
                    gain,
                });
            }
        }
        best
    }

    fn best_sorted_split(&self, rows: &[usize], total_sum: f64, min_leaf: usize) -> Option<Split> {
        let lambda = self.options.l2_regularization;
        let parent_score = score(total_sum, rows.len(), lambda);
        let n_features = self.x.first().map(|row| row.len()).unwrap_or(0);

        let mut best: Option<Split> = None;
        let mut sorted = rows.to_vec();
        for feature_index in 0..n_features {
            sorted.sort_by(|&a, &b| {
                self.feature(a, feature_index)
                    .total_cmp(&self.feature(b, feature_index))
            });

            let mut left_sum = 0.0f64;
            for (pos, pair) in sorted.windows(2).enumerate() {
                left_sum += self.residuals[pair[0]];
                let left_count = pos + 1;
                let right_count = sorted.len() - left_count;
                let here = self.feature(pair[0], feature_index);
                let next = self.feature(pair[1], feature_index);
                if here == next || left_count < min_leaf || right_count < min_leaf {
                    continue;
                }
                let gain = score(left_sum, left_count, lambda)
                    + score(total_sum - left_sum, right_count, lambda)
                    - parent_score;
                if gain > MIN_SPLIT_GAIN && best.is_none_or(|b| gain > b.gain) {
                    best = Some(Split {
                        feature_index,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn score(sum: f64, count: usize, lambda: f64) -> f64 {
    sum * sum / (count as f64 + lambda)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot_dataset() -> TrainDataset {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..4 {
            x.push(vec![1.0, 0.0]);
            y.push(1.0);
            x.push(vec![0.0, 1.0]);
            y.push(10.0);
        }
        TrainDataset {
            feature_len: 2,
            x,
            y,
        }
    }

    #[test]
    fn fits_separable_one_hot_targets() {
        let dataset = one_hot_dataset();
        let model = train_gbdt_regressor(&dataset, &TrainOptions::default()).unwrap();

        assert_eq!(model.trees.len(), 100);
        assert!((model.base_score - 5.5).abs() < 1e-9);
        assert!((model.predict(&[1.0, 0.0]) - 1.0).abs() < 0.05);
        assert!((model.predict(&[0.0, 1.0]) - 10.0).abs() < 0.05);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn respects_max_depth() {
        let x: Vec<Vec<f32>> = (0..32).map(|i| vec![i as f32]).collect();
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let dataset = TrainDataset {
            feature_len: 1,
            x,
            y,
        };
        let options = TrainOptions {
            n_trees: 5,
            max_depth: 2,
            ..TrainOptions::default()
        };
        let model = train_gbdt_regressor(&dataset, &options).unwrap();
        assert!(model.trees.iter().all(|tree| tree.depth() <= 2));
        assert!(model.trees.iter().any(|tree| tree.depth() == 2));
    }

    #[test]
    fn constant_features_produce_single_leaf_trees() {
        let dataset = TrainDataset {
            feature_len: 1,
            x: vec![vec![0.0], vec![0.0], vec![0.0]],
            y: vec![1.0, 2.0, 3.0],
        };
        let model = train_gbdt_regressor(&dataset, &TrainOptions::default()).unwrap();
        assert!(model.trees.iter().all(|tree| tree.nodes.len() == 1));
        assert!((model.predict(&[0.0]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn training_is_deterministic() {
        let dataset = one_hot_dataset();
        let a = train_gbdt_regressor(&dataset, &TrainOptions::default()).unwrap();
        let b = train_gbdt_regressor(&dataset, &TrainOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_malformed_datasets() {
        let options = TrainOptions::default();
        let empty = TrainDataset {
            feature_len: 1,
            x: vec![],
            y: vec![],
        };
        assert!(train_gbdt_regressor(&empty, &options).is_err());

        let ragged = TrainDataset {
            feature_len: 2,
            x: vec![vec![0.0, 1.0], vec![1.0]],
            y: vec![1.0, 2.0],
        };
        assert!(train_gbdt_regressor(&ragged, &options).is_err());

        let nan = TrainDataset {
            feature_len: 1,
            x: vec![vec![0.0], vec![1.0]],
            y: vec![1.0, f64::NAN],
        };
        assert!(train_gbdt_regressor(&nan, &options).is_err());
    }

    #[test]
    fn binary_and_sorted_split_search_agree() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let mut row = vec![0.0f32; 5];
            row[i % 3] = 1.0;
            row[3 + i % 2] = 1.0;
            x.push(row);
            y.push((i % 3) as f64 * 4.0 + (i % 2) as f64 + (i % 7) as f64 * 0.1);
        }
        let binary = TrainDataset {
            feature_len: 5,
            x: x.clone(),
            y: y.clone(),
        };
        // Doubling the values forces the sorting path without changing any partition.
        let dense = TrainDataset {
            feature_len: 5,
            x: x.iter()
                .map(|row| row.iter().map(|v| v * 2.0).collect())
                .collect(),
            y,
        };
        let options = TrainOptions {
            n_trees: 20,
            ..TrainOptions::default()
        };
        let fast = train_gbdt_regressor(&binary, &options).unwrap();
        let slow = train_gbdt_regressor(&dense, &options).unwrap();

        for (row, doubled) in binary.x.iter().zip(&dense.x) {
            assert!((fast.predict(row) - slow.predict(doubled)).abs() < 1e-6);
        }
    }
}
