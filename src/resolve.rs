//! Predict and record the weight of a single pending product.

use serde::Serialize;
use tracing::info;

use crate::catalog::{CatalogStore, ProductStatus, ProductUpdate};
use crate::error::PipelineError;
use crate::estimator::{Estimator, Features};

/// Result of resolving one product id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// The prediction was written to `predicted_weight`.
    Updated {
        id: i64,
        predicted_weight: f64,
        status: ProductStatus,
    },
    /// The row was not pending and was left alone.
    Skipped { id: i64, status: ProductStatus },
}

/// Predict the weight of product `id` if it is still pending.
///
/// Only `predicted_weight` is written; status and `real_weight` stay as they
/// are so a human can still confirm the value.
pub fn resolve_product(
    catalog: &dyn CatalogStore,
    estimator: &Estimator,
    id: i64,
) -> Result<ResolveOutcome, PipelineError> {
    let row = catalog
        .fetch(id)
        .map_err(PipelineError::CatalogRead)?
        .ok_or(PipelineError::NotFound(id))?;
    if !row.status.is_pending() {
        info!("Product {id} is {}, skipping", row.status);
        return Ok(ResolveOutcome::Skipped {
            id,
            status: row.status,
        });
    }

    let features = Features::new(&row.category, &row.sub_category);
    let predicted_weight = estimator.predict(&features)?;
    catalog
        .update(id, &ProductUpdate::predicted(predicted_weight))
        .map_err(PipelineError::Persistence)?;
    info!("Product {id}: predicted weight {predicted_weight:.3}");
    Ok(ResolveOutcome::Updated {
        id,
        predicted_weight,
        status: row.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewProduct, SqliteCatalog};
    use crate::estimator::PredictError;
    use crate::estimator::tests::sample_estimator;

    fn seeded() -> SqliteCatalog {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .insert(&[
                NewProduct::history("crate", "boxes", "large", 11.5),
                NewProduct::pending("carton", "Boxes", "Large"),
                NewProduct::pending("mystery", "boxes", ""),
            ])
            .unwrap();
        catalog
    }

    #[test]
    fn pending_row_gets_predicted_weight_only() {
        let catalog = seeded();
        let outcome = resolve_product(&catalog, &sample_estimator(), 2).unwrap();
        let ResolveOutcome::Updated {
            id,
            predicted_weight,
            status,
        } = outcome
        else {
            panic!("expected update, got {outcome:?}");
        };
        assert_eq!(id, 2);
        assert_eq!(status, ProductStatus::Pending);
        assert!((predicted_weight - 12.0).abs() < 0.5);

        let row = catalog.fetch(2).unwrap().unwrap();
        assert_eq!(row.predicted_weight, Some(predicted_weight));
        assert_eq!(row.real_weight, None);
        assert_eq!(row.status, ProductStatus::Pending);
    }

    #[test]
    fn history_row_is_skipped_and_untouched() {
        let catalog = seeded();
        let before = catalog.all_rows().unwrap();
        let outcome = resolve_product(&catalog, &sample_estimator(), 1).unwrap();
        assert_eq!(
            outcome,
            ResolveOutcome::Skipped {
                id: 1,
                status: ProductStatus::History
            }
        );
        assert_eq!(catalog.all_rows().unwrap(), before);
    }

    fn assert_skipped_untouched(product: NewProduct, expected: ProductStatus) {
        let catalog = seeded();
        catalog.insert(&[product]).unwrap();
        let before = catalog.all_rows().unwrap();
        let outcome = resolve_product(&catalog, &sample_estimator(), 4).unwrap();
        assert_eq!(
            outcome,
            ResolveOutcome::Skipped {
                id: 4,
                status: expected
            }
        );
        assert_eq!(catalog.all_rows().unwrap(), before);
    }

    #[test]
    fn estimated_row_is_skipped_and_untouched() {
        assert_skipped_untouched(
            NewProduct {
                real_weight: Some(12.2),
                status: ProductStatus::Estimated,
                ..NewProduct::pending("bin", "boxes", "large")
            },
            ProductStatus::Estimated,
        );
    }

    #[test]
    fn unknown_status_is_echoed_back_as_a_skip() {
        assert_skipped_untouched(
            NewProduct {
                status: ProductStatus::Unknown("archived".into()),
                ..NewProduct::pending("tote", "boxes", "small")
            },
            ProductStatus::Unknown("archived".into()),
        );
    }

    #[test]
    fn unknown_id_is_not_found() {
        let catalog = seeded();
        assert!(matches!(
            resolve_product(&catalog, &sample_estimator(), 42),
            Err(PipelineError::NotFound(42))
        ));
    }

    #[test]
    fn empty_features_fail_without_mutation() {
        let catalog = seeded();
        let err = resolve_product(&catalog, &sample_estimator(), 3).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Prediction(PredictError::EmptyFeature("sub_category"))
        ));
        assert_eq!(catalog.fetch(3).unwrap().unwrap().predicted_weight, None);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let value = serde_json::to_value(ResolveOutcome::Skipped {
            id: 5,
            status: ProductStatus::Estimated,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "outcome": "skipped", "id": 5, "status": "estimated" })
        );
    }
}
