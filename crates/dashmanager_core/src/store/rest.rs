//! HTTP implementation of the data-access contract for a hosted
//! PostgREST-compatible backend.
//!
//! # Responsibility
//! - Map `Select` and write requests to `/rest/v1/{table}` calls.
//! - Authenticate every request with the project anon key.
//!
//! # Invariants
//! - Filters are sent as `column=eq.value` (or `is.null`) query pairs.
//! - Writes ask for `return=representation` so counts come from the body.
//! - Non-success statuses surface as `StoreError::Status`; nothing is retried.

use super::{
    check_filters, check_row_columns, DataStore, Filter, Row, Select, StoreError, StoreResult,
    Table,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

const REST_PREFIX: &str = "rest/v1";
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Blocking REST store client.
pub struct RestDataStore {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RestDataStore {
    pub fn new(base_url: Url, api_key: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: Table) -> StoreResult<Url> {
        self.base_url
            .join(&format!("{REST_PREFIX}/{}", table.name()))
            .map_err(|err| StoreError::Unavailable(format!("invalid table url: {err}")))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
    }

    fn send_for_rows(&self, builder: RequestBuilder) -> StoreResult<Vec<Row>> {
        let response = self.authorized(builder).send()?;
        let response = ensure_success(response)?;
        let body = response.text()?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_rows(&body)
    }
}

impl DataStore for RestDataStore {
    fn check_connection(&self) -> StoreResult<()> {
        let url = self.table_url(Table::People)?;
        let request = self
            .client
            .get(url)
            .query(&[("select", "id"), ("limit", "1")]);
        self.send_for_rows(request).map(|_| ())
    }

    fn select(&self, query: &Select) -> StoreResult<Vec<Row>> {
        query.check()?;
        let url = self.table_url(query.table)?;
        let request = self.client.get(url).query(&select_query_pairs(query));
        self.send_for_rows(request)
    }

    fn insert(&self, table: Table, rows: &[Row]) -> StoreResult<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        for row in rows {
            check_row_columns(table, row)?;
        }

        let url = self.table_url(table)?;
        let request = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(rows);
        self.send_for_rows(request)
    }

    fn update(&self, table: Table, values: &Row, filters: &[Filter]) -> StoreResult<usize> {
        if filters.is_empty() {
            return Err(StoreError::MissingFilter(table.name()));
        }
        check_row_columns(table, values)?;
        check_filters(table, filters)?;

        let url = self.table_url(table)?;
        let request = self
            .client
            .patch(url)
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation")
            .json(values);
        self.send_for_rows(request).map(|rows| rows.len())
    }

    fn delete(&self, table: Table, filters: &[Filter]) -> StoreResult<usize> {
        if filters.is_empty() {
            return Err(StoreError::MissingFilter(table.name()));
        }
        check_filters(table, filters)?;

        let url = self.table_url(table)?;
        let request = self
            .client
            .delete(url)
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation");
        self.send_for_rows(request).map(|rows| rows.len())
    }
}

/// Builds the query string pairs for one select request.
pub fn select_query_pairs(query: &Select) -> Vec<(String, String)> {
    let mut select = String::from("*");
    for child in &query.embeds {
        select.push_str(&format!(",{}(*)", child.name()));
    }

    let mut pairs = vec![("select".to_string(), select)];
    pairs.extend(filter_pairs(&query.filters));
    if let Some(order) = query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        pairs.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    for child in &query.embeds {
        if let Some(column) = child.embed_order() {
            pairs.push((format!("{}.order", child.name()), format!("{column}.asc")));
        }
    }
    pairs
}

/// Encodes equality filters as PostgREST operators.
pub fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| {
            let operand = match &filter.value {
                Value::Null => "is.null".to_string(),
                Value::String(text) => format!("eq.{text}"),
                other => format!("eq.{other}"),
            };
            (filter.column.to_string(), operand)
        })
        .collect()
}

fn ensure_success(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

fn parse_rows(body: &str) -> StoreResult<Vec<Row>> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::InvalidRow(format!(
                    "expected object row, got `{other}`"
                ))),
            })
            .collect(),
        Value::Object(row) => Ok(vec![row]),
        other => Err(StoreError::InvalidRow(format!(
            "expected row array, got `{other}`"
        ))),
    }
}
