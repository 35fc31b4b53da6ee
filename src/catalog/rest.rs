//! Catalog backend speaking the PostgREST dialect used by hosted Supabase tables.

use super::{CatalogError, CatalogStore, NewProduct, ProductRow, ProductUpdate, RowFilter};
use crate::http_client;

const SELECT_COLUMNS: &str = "id,product_name,category,sub_category,real_weight,predicted_weight,status";
const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
const MAX_ERROR_BODY_CHARS: usize = 512;
/// Rows requested per page; the server may cap pages lower with `max-rows`.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Product table exposed through a PostgREST endpoint.
pub struct RestCatalog {
    table_url: String,
    key: String,
    agent: ureq::Agent,
    page_size: usize,
}

/// One page of a select together with the server's total count, when reported.
struct Page {
    rows: Vec<ProductRow>,
    total: Option<usize>,
}

impl RestCatalog {
    /// Build a client for `<base_url>/rest/v1/<table>` authenticated with a service key.
    pub fn new(base_url: &str, key: &str, table: &str) -> Self {
        Self {
            table_url: format!("{}/rest/v1/{table}", base_url.trim_end_matches('/')),
            key: key.to_string(),
            agent: http_client::agent().clone(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the number of rows requested per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn request(&self, method: &str) -> ureq::Request {
        self.agent
            .request(method, &self.table_url)
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
    }

    fn read_page(&self, request: ureq::Request) -> Result<Page, CatalogError> {
        let response = request
            .query("select", SELECT_COLUMNS)
            .call()
            .map_err(map_request_error)?;
        let total = response.header("Content-Range").and_then(content_range_total);
        let bytes = http_client::read_response_bytes(response, MAX_RESPONSE_BYTES)
            .map_err(|err| CatalogError::Transport(err.to_string()))?;
        Ok(Page {
            rows: serde_json::from_slice(&bytes)?,
            total,
        })
    }

    /// Read every row matching `filter`, one page at a time.
    ///
    /// Paging stops once the reported total is reached, or, without a total,
    /// at the first page shorter than requested.
    fn read_all(&self, filter: &[(&str, &str)]) -> Result<Vec<ProductRow>, CatalogError> {
        let mut rows: Vec<ProductRow> = Vec::new();
        loop {
            let limit = self.page_size.to_string();
            let offset = rows.len().to_string();
            let request = filter
                .iter()
                .fold(self.request("GET"), |request, (name, value)| {
                    request.query(name, value)
                })
                .query("order", "id.asc")
                .query("limit", &limit)
                .query("offset", &offset)
                .set("Prefer", "count=exact");
            let page = self.read_page(request)?;
            let received = page.rows.len();
            rows.extend(page.rows);
            let done = match page.total {
                Some(total) => rows.len() >= total,
                None => received < self.page_size,
            };
            if received == 0 || done {
                if let Some(total) = page.total.filter(|total| *total > rows.len()) {
                    tracing::warn!(
                        "Catalog reported {total} rows but only {} were returned",
                        rows.len()
                    );
                }
                return Ok(rows);
            }
            tracing::debug!("Read {} rows so far from {}", rows.len(), self.table_url);
        }
    }
}

/// Total from a `Content-Range` header such as `0-999/1500`; `*` means unknown.
fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

impl CatalogStore for RestCatalog {
    fn fetch(&self, id: i64) -> Result<Option<ProductRow>, CatalogError> {
        let request = self
            .request("GET")
            .query("id", &format!("eq.{id}"))
            .query("limit", "1");
        Ok(self.read_page(request)?.rows.into_iter().next())
    }

    fn select(&self, filter: RowFilter) -> Result<Vec<ProductRow>, CatalogError> {
        match filter {
            RowFilter::WithRealWeight => self.read_all(&[("real_weight", "not.is.null")]),
            RowFilter::PendingWithoutWeight => {
                self.read_all(&[("status", "eq.pending"), ("real_weight", "is.null")])
            }
        }
    }

    fn insert(&self, rows: &[NewProduct]) -> Result<usize, CatalogError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.request("POST")
            .set("Prefer", "return=minimal")
            .send_json(rows)
            .map_err(map_request_error)?;
        Ok(rows.len())
    }

    fn update(&self, id: i64, update: &ProductUpdate) -> Result<(), CatalogError> {
        self.request("PATCH")
            .query("id", &format!("eq.{id}"))
            .set("Prefer", "return=minimal")
            .send_json(update)
            .map_err(map_request_error)?;
        Ok(())
    }
}

fn map_request_error(err: ureq::Error) -> CatalogError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            CatalogError::Status {
                status,
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            }
        }
        ureq::Error::Transport(transport) => CatalogError::Transport(transport.to_string()),
    }
}
