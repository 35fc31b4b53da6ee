//! Batch estimation of every pending product that has no weight yet.

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogStore, ProductUpdate, RowFilter};
use crate::error::PipelineError;
use crate::estimator::{Estimator, Features};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub selected: usize,
    pub updated: usize,
    /// Rows left pending because prediction or the update failed.
    pub failed: usize,
}

/// Estimate all `pending` rows without `real_weight` and mark them `estimated`.
///
/// Each row is written with its own update. A failed row stays pending and is
/// picked up again by the next pass.
pub fn run_reconcile(
    catalog: &dyn CatalogStore,
    estimator: &Estimator,
) -> Result<ReconcileReport, PipelineError> {
    let rows: Vec<_> = catalog
        .select(RowFilter::PendingWithoutWeight)
        .map_err(PipelineError::CatalogRead)?
        .into_iter()
        .filter(|row| row.status.is_pending() && row.real_weight.is_none())
        .collect();
    let mut report = ReconcileReport {
        selected: rows.len(),
        ..ReconcileReport::default()
    };
    if rows.is_empty() {
        info!("No pending products to estimate");
        return Ok(report);
    }

    let features: Vec<Features> = rows
        .iter()
        .map(|row| Features::new(&row.category, &row.sub_category))
        .collect();
    let predictions = estimator.predict_many(&features);
    for (row, prediction) in rows.iter().zip(predictions) {
        let weight = match prediction {
            Ok(weight) => weight,
            Err(err) => {
                warn!("Product {}: prediction failed: {err}", row.id);
                report.failed += 1;
                continue;
            }
        };
        match catalog.update(row.id, &ProductUpdate::estimated(weight)) {
            Ok(()) => report.updated += 1,
            Err(err) => {
                warn!("Product {}: update failed: {err}", row.id);
                report.failed += 1;
            }
        }
    }
    info!(
        "Reconciled {} of {} pending product(s)",
        report.updated, report.selected
    );
    Ok(report)
}
