//! One-hot encoding for categorical feature columns.

use serde::{Deserialize, Serialize};

/// Sorted vocabulary observed for one input column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// One-hot encoder over a fixed list of categorical columns.
///
/// Each column contributes one slot per known category, in column order.
/// Values not seen during `fit` encode as an all-zero block instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub columns: Vec<EncodedColumn>,
}

impl OneHotEncoder {
    /// Fit vocabularies from row-major string values, one entry per column.
    pub fn fit(column_names: &[&str], rows: &[Vec<String>]) -> Self {
        let columns = column_names
            .iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let mut categories: Vec<String> = rows
                    .iter()
                    .filter_map(|row| row.get(col_idx).cloned())
                    .collect();
                categories.sort();
                categories.dedup();
                EncodedColumn {
                    name: name.to_string(),
                    categories,
                }
            })
            .collect();
        Self { columns }
    }

    /// Number of `f32` slots produced by [`Self::transform`].
    pub fn width(&self) -> usize {
        self.columns.iter().map(|c| c.categories.len()).sum()
    }

    /// Encode one row. Missing trailing values behave like unknown categories.
    pub fn transform(&self, values: &[&str]) -> Vec<f32> {
        let mut encoded = vec![0.0f32; self.width()];
        let mut offset = 0usize;
        for (col_idx, column) in self.columns.iter().enumerate() {
            if let Some(value) = values.get(col_idx)
                && let Ok(pos) = column.categories.binary_search_by(|c| c.as_str().cmp(*value))
            {
                encoded[offset + pos] = 1.0;
            }
            offset += column.categories.len();
        }
        encoded
    }

    /// Return true when `value` was seen for the column during fitting.
    pub fn knows(&self, column: &str, value: &str) -> bool {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .is_some_and(|c| c.categories.binary_search_by(|v| v.as_str().cmp(value)).is_ok())
    }

    /// Validate that vocabularies are sorted and duplicate-free.
    pub fn validate(&self) -> Result<(), String> {
        if self.columns.is_empty() {
            return Err("Encoder has no columns".to_string());
        }
        for column in &self.columns {
            if column.categories.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(format!(
                    "Encoder column `{}` is not sorted and unique",
                    column.name
                ));
            }
        }
        Ok(())
    }
}
