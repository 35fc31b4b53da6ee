//! Import of historical product weights from spreadsheets.
//!
//! Headers are free-form, so each logical column is matched against a ranked
//! alias list after normalization. Surviving rows are written as `history`
//! ground truth in fixed-size batches; a failed batch is skipped and counted.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

pub mod source;

use source::{Cell, SheetTable, read_table};

use crate::catalog::{CatalogStore, NewProduct, normalize_label};
use crate::error::PipelineError;

/// Rows written per insert call unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Catalog fields a source must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalField {
    ProductName,
    Category,
    SubCategory,
    RealWeight,
}

impl LogicalField {
    pub const ALL: [LogicalField; 4] = [
        Self::ProductName,
        Self::Category,
        Self::SubCategory,
        Self::RealWeight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ProductName => "product_name",
            Self::Category => "category",
            Self::SubCategory => "sub_category",
            Self::RealWeight => "real_weight",
        }
    }

    /// Accepted normalized header names, most preferred first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::ProductName => &["product_name", "name", "item_name"],
            Self::Category => &["category", "group", "type"],
            Self::SubCategory => &["sub_category", "sub_group", "sub_type"],
            Self::RealWeight => &["real_weight", "weight", "actual_weight"],
        }
    }
}

/// Source column index for every logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub product_name: usize,
    pub category: usize,
    pub sub_category: usize,
    pub real_weight: usize,
}

/// Summary of one import run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub source: PathBuf,
    /// Data rows read from the source.
    pub total: usize,
    /// Rows removed during cleaning.
    pub dropped: usize,
    /// Rows the catalog accepted.
    pub inserted: usize,
    /// Rows that survived cleaning.
    pub valid: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Normalize a header: trim, lower-case, spaces to underscores.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Match source headers to logical fields.
///
/// Fails with every missing field listed at once.
pub fn resolve_columns(headers: &[String]) -> Result<ColumnMap, PipelineError> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let find = |field: LogicalField| {
        field
            .aliases()
            .iter()
            .find_map(|alias| normalized.iter().position(|h| h == alias))
    };
    let mut missing = Vec::new();
    let mut indices = [0usize; 4];
    for (slot, field) in indices.iter_mut().zip(LogicalField::ALL) {
        match find(field) {
            Some(index) => *slot = index,
            None => missing.push(field.name()),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::SchemaMismatch { missing });
    }
    Ok(ColumnMap {
        product_name: indices[0],
        category: indices[1],
        sub_category: indices[2],
        real_weight: indices[3],
    })
}

/// Coerce a weight cell; blanks, non-numbers, non-finite and negative values fail.
pub fn coerce_weight(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Empty => return None,
        Cell::Number(value) => *value,
        Cell::Text(text) => text.trim().parse::<f64>().ok()?,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Validate and normalize data rows. Returns the kept rows and the drop count.
pub fn clean_rows(table: &SheetTable, columns: &ColumnMap) -> (Vec<NewProduct>, usize) {
    let empty = Cell::Empty;
    let mut kept = Vec::with_capacity(table.rows.len());
    let mut dropped = 0;
    for row in &table.rows {
        let cell = |index: usize| row.get(index).unwrap_or(&empty);
        let name = cell(columns.product_name).text();
        let category = normalize_label(&cell(columns.category).text());
        let sub_category = normalize_label(&cell(columns.sub_category).text());
        let weight = coerce_weight(cell(columns.real_weight));
        match weight {
            Some(weight) if !name.is_empty() && !category.is_empty() && !sub_category.is_empty() => {
                kept.push(NewProduct::history(&name, &category, &sub_category, weight));
            }
            _ => dropped += 1,
        }
    }
    (kept, dropped)
}

/// Read `path` and import its rows into the catalog.
pub fn run_ingest(
    catalog: &dyn CatalogStore,
    path: &Path,
    batch_size: usize,
) -> Result<IngestReport, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::SourceNotFound(path.to_path_buf()));
    }
    info!("Reading source {}", path.display());
    let table = read_table(path)?;
    let mut report = ingest_table(catalog, &table, batch_size)?;
    report.source = path.to_path_buf();
    Ok(report)
}

/// Import an already-read table.
pub fn ingest_table(
    catalog: &dyn CatalogStore,
    table: &SheetTable,
    batch_size: usize,
) -> Result<IngestReport, PipelineError> {
    if table.rows.is_empty() {
        return Err(PipelineError::EmptySource);
    }
    let columns = resolve_columns(&table.headers)?;
    let (rows, dropped) = clean_rows(table, &columns);
    if dropped > 0 {
        info!("Dropped {dropped} invalid row(s) during cleaning");
    }
    if rows.is_empty() {
        return Err(PipelineError::Validation { dropped });
    }

    let mut report = IngestReport {
        source: PathBuf::new(),
        total: table.rows.len(),
        dropped,
        inserted: 0,
        valid: rows.len(),
        batches: 0,
        failed_batches: 0,
    };
    for (index, batch) in rows.chunks(batch_size.max(1)).enumerate() {
        report.batches += 1;
        match catalog.insert(batch) {
            Ok(count) => {
                report.inserted += count;
                info!("Inserted batch {} ({count} rows)", index + 1);
            }
            Err(err) => {
                report.failed_batches += 1;
                warn!("Batch {} failed, skipping {} rows: {err}", index + 1, batch.len());
            }
        }
    }
    info!(
        "Import finished: {}/{} rows inserted",
        report.inserted, report.valid
    );
    Ok(report)
}
