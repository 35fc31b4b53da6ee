use heft::catalog::{CatalogStore, NewProduct, ProductStatus, RowFilter, SqliteCatalog};
use heft::error::PipelineError;
use heft::estimator::{Estimator, Features};
use heft::ingest::run_ingest;
use heft::reconcile::run_reconcile;
use heft::resolve::{ResolveOutcome, resolve_product};
use heft::service::{PredictResponse, predict_payload};
use heft::training::run_training;
use tempfile::tempdir;

const HISTORY_CSV: &str = "\
Name,Group,Sub Group,Weight
Oak chair,Furniture,Chairs,7.5
Pine chair,furniture,chairs,6.5
Birch chair,FURNITURE,Chairs ,7.0
Oak table,Furniture,Tables,30
Glass table,Furniture,Tables,28
Desk lamp,Lighting,Lamps,1.2
Floor lamp,Lighting,Lamps,3.4
Broken row,Lighting,,1.0
";

#[test]
fn ingest_train_resolve_reconcile() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("history.csv");
    std::fs::write(&source, HISTORY_CSV).unwrap();
    let catalog = SqliteCatalog::open(dir.path().join("catalog.db")).unwrap();
    let model_path = dir.path().join("ml").join("weight_model.json");

    let ingest = run_ingest(&catalog, &source, 3).unwrap();
    assert_eq!(ingest.total, 8);
    assert_eq!(ingest.dropped, 1);
    assert_eq!(ingest.inserted, 7);
    assert_eq!(ingest.batches, 3);
    assert!(
        catalog
            .all_rows()
            .unwrap()
            .iter()
            .all(|row| row.status == ProductStatus::History && row.real_weight.is_some())
    );

    let training = run_training(&catalog, &model_path).unwrap();
    assert_eq!(training.usable_rows, 7);
    assert!(training.evaluation.is_some());
    let estimator = Estimator::load(&model_path).unwrap();

    catalog
        .insert(&[
            NewProduct::pending("Walnut chair", "Furniture", "Chairs"),
            NewProduct::pending("Reading lamp", "lighting", "lamps"),
            NewProduct::pending("Mystery box", "Storage", "Boxes"),
        ])
        .unwrap();
    let pending = catalog.select(RowFilter::PendingWithoutWeight).unwrap();
    assert_eq!(pending.len(), 3);

    let history_id = catalog.all_rows().unwrap()[0].id;
    assert_eq!(
        resolve_product(&catalog, &estimator, history_id).unwrap(),
        ResolveOutcome::Skipped {
            id: history_id,
            status: ProductStatus::History
        }
    );

    let outcome = resolve_product(&catalog, &estimator, pending[0].id).unwrap();
    assert!(matches!(outcome, ResolveOutcome::Updated { .. }));
    let resolved = catalog.fetch(pending[0].id).unwrap().unwrap();
    assert!(resolved.predicted_weight.is_some());
    assert_eq!(resolved.real_weight, None);
    assert_eq!(resolved.status, ProductStatus::Pending);

    let report = run_reconcile(&catalog, &estimator).unwrap();
    assert_eq!(report.selected, 3);
    assert_eq!(report.updated, 3);
    assert_eq!(report.failed, 0);
    for row in catalog.all_rows().unwrap().iter().skip(7) {
        assert_eq!(row.status, ProductStatus::Estimated);
        assert!(row.real_weight.is_some_and(f64::is_finite));
    }

    let rerun = run_reconcile(&catalog, &estimator).unwrap();
    assert_eq!(rerun.selected, 0);
    assert_eq!(rerun.updated, 0);

    let retrained = run_training(&catalog, &model_path).unwrap();
    assert_eq!(retrained.usable_rows, 10);
}

#[test]
fn service_and_direct_prediction_agree() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("history.csv");
    std::fs::write(&source, HISTORY_CSV).unwrap();
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    let model_path = dir.path().join("model.json");
    run_ingest(&catalog, &source, 500).unwrap();
    run_training(&catalog, &model_path).unwrap();
    let estimator = Estimator::load(&model_path).unwrap();

    let direct = estimator
        .predict(&Features::new("furniture", "tables"))
        .unwrap();
    let served = predict_payload(
        &estimator,
        br#"{"category":" Furniture","sub_category":"TABLES","product_name":"Desk"}"#,
    );
    assert_eq!(served, PredictResponse::Prediction { prediction: direct });
}

#[test]
fn missing_inputs_fail_with_their_kinds() {
    let dir = tempdir().unwrap();
    let catalog = SqliteCatalog::open_in_memory().unwrap();

    let err = run_ingest(&catalog, &dir.path().join("absent.xlsx"), 500).unwrap_err();
    assert_eq!(err.kind(), "source_not_found");

    let header_only = dir.path().join("header.csv");
    std::fs::write(&header_only, "name,group,sub_group,weight\n").unwrap();
    let err = run_ingest(&catalog, &header_only, 500).unwrap_err();
    assert_eq!(err.kind(), "empty_source");

    let wrong_columns = dir.path().join("wrong.csv");
    std::fs::write(&wrong_columns, "title,weight\nMug,0.3\n").unwrap();
    let err = run_ingest(&catalog, &wrong_columns, 500).unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { ref missing } if missing.len() == 3));

    let err = run_training(&catalog, &dir.path().join("model.json")).unwrap_err();
    assert_eq!(err.kind(), "insufficient_data");

    let err = PipelineError::from(Estimator::load(&dir.path().join("model.json")).unwrap_err());
    assert_eq!(err.kind(), "artifact_missing");
}
