use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// PostgREST-backed catalog for the hosted `products` table.
pub mod rest;
/// SQLite-backed catalog for local runs.
pub mod sqlite;

pub use rest::RestCatalog;
pub use sqlite::SqliteCatalog;

use crate::config::CatalogLocation;

/// Default name of the product table.
pub const PRODUCTS_TABLE: &str = "products";

/// Lifecycle state of a catalog row.
///
/// Rows only advance `pending -> estimated`; `history` rows are terminal and
/// the only rows used as training ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProductStatus {
    #[default]
    Pending,
    Estimated,
    History,
    /// Any status string the catalog holds that this crate does not know.
    Unknown(String),
}

impl ProductStatus {
    /// Parse a stored status, ignoring surrounding whitespace and case.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "pending" => Self::Pending,
            "estimated" => Self::Estimated,
            "history" => Self::History,
            _ => Self::Unknown(normalized),
        }
    }

    /// Return the stored representation of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Estimated => "estimated",
            Self::History => "history",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProductStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProductStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::parse(raw.as_deref().unwrap_or("")))
    }
}

/// One product row as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub product_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sub_category: String,
    #[serde(default)]
    pub real_weight: Option<f64>,
    #[serde(default)]
    pub predicted_weight: Option<f64>,
    #[serde(default)]
    pub status: ProductStatus,
}

/// A row to insert; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub product_name: String,
    pub category: String,
    pub sub_category: String,
    pub real_weight: Option<f64>,
    pub status: ProductStatus,
}

impl NewProduct {
    /// A measured ground-truth row.
    pub fn history(product_name: &str, category: &str, sub_category: &str, weight: f64) -> Self {
        Self {
            product_name: product_name.to_string(),
            category: category.to_string(),
            sub_category: sub_category.to_string(),
            real_weight: Some(weight),
            status: ProductStatus::History,
        }
    }

    /// A row still waiting for a weight.
    pub fn pending(product_name: &str, category: &str, sub_category: &str) -> Self {
        Self {
            product_name: product_name.to_string(),
            category: category.to_string(),
            sub_category: sub_category.to_string(),
            real_weight: None,
            status: ProductStatus::Pending,
        }
    }
}

/// Partial update applied to a single row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl ProductUpdate {
    /// Single-record path: record the estimate without touching status or truth.
    pub fn predicted(weight: f64) -> Self {
        Self {
            predicted_weight: Some(weight),
            ..Self::default()
        }
    }

    /// Reconciliation path: promote the estimate into `real_weight`.
    pub fn estimated(weight: f64) -> Self {
        Self {
            real_weight: Some(weight),
            status: Some(ProductStatus::Estimated),
            ..Self::default()
        }
    }
}

/// Row selections the pipeline needs from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// `real_weight IS NOT NULL`: training input.
    WithRealWeight,
    /// `status = pending AND real_weight IS NULL`: reconciliation input.
    PendingWithoutWeight,
}

/// Errors raised by catalog backends.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog answered with a non-success HTTP status.
    #[error("Catalog request failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The request could not be delivered or the response could not be read.
    #[error("Catalog request failed: {0}")]
    Transport(String),
    /// The response body was not the expected JSON shape.
    #[error("Catalog response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    /// SQLite query failed.
    #[error("Catalog database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// The configured table name is not a plain SQL identifier.
    #[error("Invalid catalog table name `{0}`")]
    InvalidTable(String),
    /// Failed to create the directory holding the catalog database.
    #[error("Could not create catalog directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// A queryable, mutable product table.
///
/// Every call is one blocking round trip; there are no multi-call
/// transactions, so callers must tolerate partially applied runs.
pub trait CatalogStore {
    /// Fetch one row by id.
    fn fetch(&self, id: i64) -> Result<Option<ProductRow>, CatalogError>;
    /// Select every row matching the filter.
    fn select(&self, filter: RowFilter) -> Result<Vec<ProductRow>, CatalogError>;
    /// Insert a batch of rows, all or nothing. Returns the number inserted.
    fn insert(&self, rows: &[NewProduct]) -> Result<usize, CatalogError>;
    /// Apply a partial update to one row.
    fn update(&self, id: i64, update: &ProductUpdate) -> Result<(), CatalogError>;
}

/// Open the catalog backend named by a resolved location.
pub fn open_catalog(
    location: &CatalogLocation,
    table: &str,
) -> Result<Box<dyn CatalogStore>, CatalogError> {
    match location {
        CatalogLocation::Rest { url, key } => {
            tracing::debug!("Using REST catalog at {url}");
            Ok(Box::new(RestCatalog::new(url, key, table)))
        }
        CatalogLocation::Sqlite(path) => {
            tracing::debug!("Using SQLite catalog at {}", path.display());
            Ok(Box::new(SqliteCatalog::open_table(path, table)?))
        }
    }
}

/// Normalize a categorical label the way the model sees it.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_and_space_insensitive() {
        assert_eq!(ProductStatus::parse(" Pending "), ProductStatus::Pending);
        assert_eq!(ProductStatus::parse("HISTORY"), ProductStatus::History);
        assert_eq!(ProductStatus::parse("estimated"), ProductStatus::Estimated);
        assert_eq!(
            ProductStatus::parse("Archived"),
            ProductStatus::Unknown("archived".into())
        );
    }

    #[test]
    fn row_decodes_nulls_from_the_store() {
        let json = r#"{"id":7,"product_name":null,"category":" Boxes","sub_category":"Small",
            "real_weight":null,"predicted_weight":2.5,"status":null}"#;
        let row: ProductRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.id, 7);
        assert_eq!(row.product_name, "");
        assert_eq!(row.category, " Boxes");
        assert_eq!(row.real_weight, None);
        assert_eq!(row.predicted_weight, Some(2.5));
        assert_eq!(row.status, ProductStatus::Unknown(String::new()));
    }

    #[test]
    fn updates_serialize_only_the_touched_fields() {
        let predicted = serde_json::to_value(ProductUpdate::predicted(1.25)).unwrap();
        assert_eq!(predicted, serde_json::json!({ "predicted_weight": 1.25 }));

        let estimated = serde_json::to_value(ProductUpdate::estimated(3.0)).unwrap();
        assert_eq!(
            estimated,
            serde_json::json!({ "real_weight": 3.0, "status": "estimated" })
        );
    }

    #[test]
    fn normalize_label_trims_and_lowercases() {
        assert_eq!(normalize_label("  Heavy Goods "), "heavy goods");
    }

    #[test]
    fn open_catalog_uses_the_configured_sqlite_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let location = CatalogLocation::Sqlite(path.clone());

        let catalog = open_catalog(&location, "items").unwrap();
        catalog
            .insert(&[NewProduct::history("Mug", "kitchen", "cups", 0.4)])
            .unwrap();
        drop(catalog);

        let items = SqliteCatalog::open_table(&path, "items").unwrap();
        assert_eq!(items.all_rows().unwrap().len(), 1);
        assert!(open_catalog(&location, "bad name").is_err());
    }
}
