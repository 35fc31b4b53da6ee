//! Library exports shared by the pipeline binaries and the inference service.
/// Product catalog model and store backends.
pub mod catalog;
/// Shared command-line parsing for the batch binaries.
pub mod cli;
/// App directory, settings and catalog credential resolution.
pub mod config;
/// Pipeline error taxonomy.
pub mod error;
/// Persisted encoder + regressor artifact.
pub mod estimator;
pub(crate) mod http_client;
/// Spreadsheet ingestion of historical weights.
pub mod ingest;
/// Tracing setup.
pub mod logging;
/// Encoding and boosting primitives.
pub mod ml;
/// Rendering of component results for the command line.
pub mod outcome;
/// Batch reconciliation of pending products.
pub mod reconcile;
/// Single-record prediction.
pub mod resolve;
/// HTTP inference service.
pub mod service;
/// Training of the weight estimator.
pub mod training;
