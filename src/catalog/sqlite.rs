use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{
    CatalogError, CatalogStore, NewProduct, PRODUCTS_TABLE, ProductRow, ProductStatus,
    ProductUpdate, RowFilter,
};

const COLUMNS: &str = "id, product_name, category, sub_category, real_weight, predicted_weight, status";

/// SQLite wrapper holding a local product table with the hosted schema.
pub struct SqliteCatalog {
    connection: Connection,
    table: String,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database file using the `products` table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::open_table(path, PRODUCTS_TABLE)
    }

    /// Open (or create) a catalog database file using a named table.
    pub fn open_table(path: impl AsRef<Path>, table: &str) -> Result<Self, CatalogError> {
        check_table_name(table)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let connection = Connection::open(path)?;
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Self::with_connection(connection, table)
    }

    /// Open a throwaway in-memory catalog.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?, PRODUCTS_TABLE)
    }

    fn with_connection(connection: Connection, table: &str) -> Result<Self, CatalogError> {
        let catalog = Self {
            connection,
            table: table.to_string(),
        };
        catalog.apply_schema()?;
        Ok(catalog)
    }

    /// Return every row ordered by id.
    pub fn all_rows(&self) -> Result<Vec<ProductRow>, CatalogError> {
        self.query_rows("")
    }

    fn apply_schema(&self) -> Result<(), CatalogError> {
        let table = &self.table;
        self.connection.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name TEXT NOT NULL,
                category TEXT NOT NULL,
                sub_category TEXT NOT NULL,
                real_weight REAL,
                predicted_weight REAL,
                status TEXT NOT NULL DEFAULT 'pending'
             );
             CREATE INDEX IF NOT EXISTS idx_{table}_status_weight
                ON {table} (status, real_weight);"
        ))?;
        Ok(())
    }

    fn query_rows(&self, clause: &str) -> Result<Vec<ProductRow>, CatalogError> {
        let mut stmt = self.connection.prepare(&format!(
            "SELECT {COLUMNS} FROM {} {clause} ORDER BY id",
            self.table
        ))?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Table names are spliced into SQL, so only plain identifiers are accepted.
fn check_table_name(table: &str) -> Result<(), CatalogError> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidTable(table.to_string()))
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    let status: Option<String> = row.get(6)?;
    Ok(ProductRow {
        id: row.get(0)?,
        product_name: row.get(1)?,
        category: row.get(2)?,
        sub_category: row.get(3)?,
        real_weight: row.get(4)?,
        predicted_weight: row.get(5)?,
        status: ProductStatus::parse(status.as_deref().unwrap_or("")),
    })
}

impl CatalogStore for SqliteCatalog {
    fn fetch(&self, id: i64) -> Result<Option<ProductRow>, CatalogError> {
        let row = self
            .connection
            .query_row(
                &format!("SELECT {COLUMNS} FROM {} WHERE id = ?1", self.table),
                [id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn select(&self, filter: RowFilter) -> Result<Vec<ProductRow>, CatalogError> {
        self.query_rows(match filter {
            RowFilter::WithRealWeight => "WHERE real_weight IS NOT NULL",
            RowFilter::PendingWithoutWeight => "WHERE status = 'pending' AND real_weight IS NULL",
        })
    }

    fn insert(&self, rows: &[NewProduct]) -> Result<usize, CatalogError> {
        let tx = self.connection.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (product_name, category, sub_category, real_weight, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                self.table
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.product_name,
                    row.category,
                    row.sub_category,
                    row.real_weight,
                    row.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn update(&self, id: i64, update: &ProductUpdate) -> Result<(), CatalogError> {
        self.connection.execute(
            &format!(
                "UPDATE {} SET
                    real_weight = COALESCE(?1, real_weight),
                    predicted_weight = COALESCE(?2, predicted_weight),
                    status = COALESCE(?3, status)
                 WHERE id = ?4",
                self.table
            ),
            params![
                update.real_weight,
                update.predicted_weight,
                update.status.as_ref().map(|status| status.as_str()),
                id,
            ],
        )?;
        Ok(())
    }
}
