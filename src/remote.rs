//! Remote table access.
//!
//! The synchronizer talks to the hosted database only through
//! [`TableSource`]: a paged, ordered, optionally filtered row fetch and a
//! server-side maximum. [`RestTableClient`] speaks the PostgREST query
//! dialect over blocking HTTP; [`MemoryTableClient`] serves fixtures.

use std::{cell::Cell, collections::BTreeMap, time::Duration};

use log::debug;
use thiserror::Error;

use crate::{
    config::RemoteConfig,
    data::{Value, compare_cells, compare_values},
    frame::Record,
};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote source is not configured: {0}")]
    NotConfigured(String),

    #[error("request to '{table}' failed: {message}")]
    Transport { table: String, message: String },

    #[error("'{table}' responded with HTTP {status}: {body}")]
    Status {
        table: String,
        status: u16,
        body: String,
    },

    #[error("could not decode rows of '{table}': {message}")]
    Decode { table: String, message: String },

    #[error("table '{0}' does not exist")]
    UnknownTable(String),
}

/// One page request. Rows come back ordered by `order_by` (when set) and,
/// with `greater_than`, restricted to rows whose column is strictly greater
/// than the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub order_by: Option<String>,
    pub descending: bool,
    pub greater_than: Option<(String, Value)>,
    pub offset: usize,
    pub limit: usize,
}

impl PageQuery {
    pub fn new(table: impl Into<String>, limit: usize) -> Self {
        Self {
            table: table.into(),
            columns: None,
            order_by: None,
            descending: false,
            greater_than: None,
            offset: 0,
            limit,
        }
    }

    pub fn ordered_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn after(mut self, column: impl Into<String>, threshold: Value) -> Self {
        self.greater_than = Some((column.into(), threshold));
        self
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.columns
                .as_ref()
                .map(|c| c.join(","))
                .unwrap_or_else(|| "*".to_string()),
        )];
        if let Some(column) = &self.order_by {
            let direction = if self.descending { "desc.nullslast" } else { "asc" };
            params.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some((column, threshold)) = &self.greater_than {
            params.push((column.clone(), format!("gt.{}", threshold.as_display())));
        }
        params.push(("offset".to_string(), self.offset.to_string()));
        params.push(("limit".to_string(), self.limit.to_string()));
        params
    }
}

pub trait TableSource {
    fn fetch_page(&self, query: &PageQuery) -> Result<Vec<Record>, RemoteError>;

    /// Largest non-null value of `column` in `table`, computed by the source.
    fn max_value(&self, table: &str, column: &str) -> Result<Option<Value>, RemoteError> {
        let query = PageQuery {
            columns: Some(vec![column.to_string()]),
            order_by: Some(column.to_string()),
            descending: true,
            ..PageQuery::new(table, 1)
        };
        let rows = self.fetch_page(&query)?;
        Ok(rows
            .first()
            .and_then(|row| row.get(column))
            .and_then(Value::from_json))
    }
}

pub struct RestTableClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestTableClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Builds a client from configuration. The API key, when present in the
    /// named environment variable, is forwarded on every request.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base_url = config
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RemoteError::NotConfigured("remote.base_url is not set".into()))?;
        let api_key = std::env::var(&config.api_key_env).ok();
        Self::new(base_url, api_key, Duration::from_secs(config.timeout_secs))
    }
}

impl TableSource for RestTableClient {
    fn fetch_page(&self, query: &PageQuery) -> Result<Vec<Record>, RemoteError> {
        let url = format!("{}/{}", self.base_url, query.table);
        let params = query.params();
        debug!("GET {url} {params:?}");
        let mut request = self.client.get(&url).query(&params);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        let response = request.send().map_err(|e| RemoteError::Transport {
            table: query.table.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RemoteError::Status {
                table: query.table.clone(),
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Vec<Record>>()
            .map_err(|e| RemoteError::Decode {
                table: query.table.clone(),
                message: e.to_string(),
            })
    }
}

/// In-memory source used for fixtures and offline runs.
#[derive(Debug, Default)]
pub struct MemoryTableClient {
    tables: BTreeMap<String, Vec<Record>>,
    fail_at_offset: Option<usize>,
    requests: Cell<usize>,
}

impl MemoryTableClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<Record>) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }

    pub fn append_rows(&mut self, table: &str, rows: Vec<Record>) {
        self.tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Makes every page request starting at or beyond `offset` fail.
    pub fn fail_from_offset(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.get()
    }
}

impl TableSource for MemoryTableClient {
    fn fetch_page(&self, query: &PageQuery) -> Result<Vec<Record>, RemoteError> {
        self.requests.set(self.requests.get() + 1);
        if let Some(limit) = self.fail_at_offset
            && query.offset >= limit
        {
            return Err(RemoteError::Transport {
                table: query.table.clone(),
                message: format!("simulated failure at offset {}", query.offset),
            });
        }
        let rows = self
            .tables
            .get(&query.table)
            .ok_or_else(|| RemoteError::UnknownTable(query.table.clone()))?;

        let cell = |row: &Record, column: &str| row.get(column).and_then(Value::from_json);
        let mut selected: Vec<&Record> = rows
            .iter()
            .filter(|row| match &query.greater_than {
                Some((column, threshold)) => cell(row, column)
                    .is_some_and(|v| compare_values(&v, threshold).is_gt()),
                None => true,
            })
            .collect();
        if let Some(column) = &query.order_by {
            selected.sort_by(|a, b| {
                let (left, right) = (cell(a, column), cell(b, column));
                if query.descending {
                    // Nulls last when descending.
                    match (&left, &right) {
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (Some(_), None) => std::cmp::Ordering::Less,
                        _ => compare_cells(right.as_ref(), left.as_ref()),
                    }
                } else {
                    compare_cells(left.as_ref(), right.as_ref())
                }
            });
        }
        Ok(selected
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|row| match &query.columns {
                Some(columns) => row
                    .iter()
                    .filter(|(k, _)| columns.contains(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                None => row.clone(),
            })
            .collect())
    }
}
