//! Fit the weight estimator from catalog ground truth.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogStore, ProductRow, RowFilter};
use crate::error::PipelineError;
use crate::estimator::{Estimator, FEATURE_COLUMNS, Features};
use crate::ml::encoder::OneHotEncoder;
use crate::ml::gbdt::{TrainDataset, TrainOptions, train_gbdt_regressor};
use crate::ml::metrics::RegressionMetrics;

/// Fewer usable rows than this cannot train a model.
pub const MIN_TRAINING_ROWS: usize = 2;
/// Holdout evaluation runs only above this many usable rows.
pub const EVALUATION_THRESHOLD: usize = 3;
pub const SPLIT_SEED: u64 = 42;
pub const TEST_FRACTION: f64 = 0.2;
pub const MIN_TEST_ROWS: usize = 2;

/// One labelled training example.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Features,
    pub weight: f64,
}

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub usable_rows: usize,
    /// Rows with a weight that still could not be used.
    pub skipped_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Holdout metrics, absent when the dataset was too small to split.
    pub evaluation: Option<RegressionMetrics>,
    pub categories: usize,
    pub sub_categories: usize,
    pub artifact_path: PathBuf,
}

/// Keep rows with a finite weight and non-empty normalized features.
pub fn usable_samples(rows: &[ProductRow]) -> (Vec<Sample>, usize) {
    let mut samples = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let features = Features::new(&row.category, &row.sub_category);
        match row.real_weight {
            Some(weight)
                if weight.is_finite()
                    && !features.category.is_empty()
                    && !features.sub_category.is_empty() =>
            {
                samples.push(Sample { features, weight });
            }
            _ => skipped += 1,
        }
    }
    (samples, skipped)
}

/// Deterministic shuffled split into `(train, test)` index sets.
pub fn holdout_split(len: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let test_len = ((len as f64 * TEST_FRACTION).ceil() as usize)
        .max(MIN_TEST_ROWS)
        .min(len.saturating_sub(1));
    let train = indices.split_off(test_len);
    (train, indices)
}

/// Fit encoder and regressor on `samples`.
pub fn fit_estimator(samples: &[Sample], options: &TrainOptions) -> Result<Estimator, PipelineError> {
    let rows: Vec<Vec<String>> = samples
        .iter()
        .map(|s| vec![s.features.sub_category.clone(), s.features.category.clone()])
        .collect();
    let encoder = OneHotEncoder::fit(&FEATURE_COLUMNS, &rows);
    let x = rows
        .iter()
        .map(|row| encoder.transform(&[row[0].as_str(), row[1].as_str()]))
        .collect();
    let dataset = TrainDataset {
        feature_len: encoder.width(),
        x,
        y: samples.iter().map(|s| s.weight).collect(),
    };
    let regressor = train_gbdt_regressor(&dataset, options).map_err(PipelineError::Training)?;
    Ok(Estimator::new(encoder, regressor, samples.len()))
}

fn evaluate(estimator: &Estimator, samples: &[Sample]) -> Result<RegressionMetrics, PipelineError> {
    let truth: Vec<f64> = samples.iter().map(|s| s.weight).collect();
    let predicted = samples
        .iter()
        .map(|s| estimator.predict(&s.features))
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(RegressionMetrics::compute(&truth, &predicted))
}

/// Train from every catalog row with a real weight and persist the artifact.
pub fn run_training(
    catalog: &dyn CatalogStore,
    model_path: &Path,
) -> Result<TrainingReport, PipelineError> {
    let rows = catalog
        .select(RowFilter::WithRealWeight)
        .map_err(PipelineError::CatalogRead)?;
    info!("Fetched {} row(s) with real_weight", rows.len());
    let (samples, skipped_rows) = usable_samples(&rows);
    if skipped_rows > 0 {
        warn!("Skipped {skipped_rows} row(s) with unusable weight or features");
    }
    if samples.len() < MIN_TRAINING_ROWS {
        return Err(PipelineError::InsufficientData {
            usable: samples.len(),
            required: MIN_TRAINING_ROWS,
        });
    }

    let options = TrainOptions::default();
    let (estimator, evaluation, train_rows, test_rows) = if samples.len() > EVALUATION_THRESHOLD {
        let (train_idx, test_idx) = holdout_split(samples.len(), SPLIT_SEED);
        let train: Vec<Sample> = train_idx.iter().map(|&i| samples[i].clone()).collect();
        let test: Vec<Sample> = test_idx.iter().map(|&i| samples[i].clone()).collect();
        let estimator = fit_estimator(&train, &options)?;
        let metrics = evaluate(&estimator, &test)?;
        info!(
            "Holdout R2 {:.4}, MAE {:.4} on {} row(s)",
            metrics.r2, metrics.mae, metrics.support
        );
        (estimator, Some(metrics), train.len(), test.len())
    } else {
        info!("Too few rows for a holdout split; training on all {}", samples.len());
        let estimator = fit_estimator(&samples, &options)?;
        (estimator, None, samples.len(), 0)
    };

    estimator.save(model_path)?;
    info!("Saved model to {}", model_path.display());

    let vocabulary = |name: &str| {
        estimator
            .encoder
            .columns
            .iter()
            .find(|c| c.name == name)
            .map_or(0, |c| c.categories.len())
    };
    Ok(TrainingReport {
        usable_rows: samples.len(),
        skipped_rows,
        train_rows,
        test_rows,
        evaluation,
        categories: vocabulary("category"),
        sub_categories: vocabulary("sub_category"),
        artifact_path: model_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewProduct, SqliteCatalog};
    use tempfile::tempdir;

    fn history(catalog: &SqliteCatalog, rows: &[(&str, &str, f64)]) {
        let rows: Vec<NewProduct> = rows
            .iter()
            .enumerate()
            .map(|(i, (cat, sub, w))| NewProduct::history(&format!("p{i}"), cat, sub, *w))
            .collect();
        catalog.insert(&rows).unwrap();
    }

    #[test]
    fn one_usable_row_is_fatal() {
        let dir = tempdir().unwrap();
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        history(&catalog, &[("boxes", "small", 2.0)]);
        catalog
            .insert(&[NewProduct::pending("q", "boxes", "small")])
            .unwrap();

        let path = dir.path().join("model.json");
        let err = run_training(&catalog, &path).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData {
                usable: 1,
                required: 2
            }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn two_rows_persist_without_evaluation() {
        let dir = tempdir().unwrap();
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        history(&catalog, &[("boxes", "small", 2.0), ("boxes", "large", 12.0)]);

        let path = dir.path().join("ml").join("model.json");
        let report = run_training(&catalog, &path).unwrap();
        assert_eq!(report.usable_rows, 2);
        assert_eq!(report.train_rows, 2);
        assert!(report.evaluation.is_none());
        assert_eq!(report.categories, 1);
        assert_eq!(report.sub_categories, 2);
        assert!(Estimator::load(&path).is_ok());
    }

    #[test]
    fn evaluation_runs_only_above_three_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        let catalog = SqliteCatalog::open_in_memory().unwrap();
        history(
            &catalog,
            &[("a", "x", 1.0), ("a", "y", 2.0), ("b", "x", 3.0)],
        );
        assert!(run_training(&catalog, &path).unwrap().evaluation.is_none());

        history(&catalog, &[("b", "y", 4.0)]);
        let report = run_training(&catalog, &path).unwrap();
        let metrics = report.evaluation.unwrap();
        assert_eq!(report.test_rows, 2);
        assert_eq!(report.train_rows, 2);
        assert_eq!(metrics.support, 2);
    }

    #[test]
    fn unusable_rows_are_skipped() {
        let rows = vec![
            ProductRow {
                id: 1,
                product_name: "a".into(),
                category: "Boxes".into(),
                sub_category: " ".into(),
                real_weight: Some(1.0),
                predicted_weight: None,
                status: Default::default(),
            },
            ProductRow {
                id: 2,
                product_name: "b".into(),
                category: "Boxes".into(),
                sub_category: "Small".into(),
                real_weight: Some(f64::INFINITY),
                predicted_weight: None,
                status: Default::default(),
            },
            ProductRow {
                id: 3,
                product_name: "c".into(),
                category: "Boxes".into(),
                sub_category: "Small".into(),
                real_weight: Some(3.0),
                predicted_weight: None,
                status: Default::default(),
            },
        ];
        let (samples, skipped) = usable_samples(&rows);
        assert_eq!(skipped, 2);
        assert_eq!(samples[0].features, Features::new("boxes", "small"));
    }

    #[test]
    fn holdout_split_is_seeded_and_sized() {
        let (train, test) = holdout_split(10, SPLIT_SEED);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        assert_eq!(holdout_split(10, SPLIT_SEED), (train.clone(), test.clone()));

        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        let (_, test) = holdout_split(11, SPLIT_SEED);
        assert_eq!(test.len(), 3);
    }
}
