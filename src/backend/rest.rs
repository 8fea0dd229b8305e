//! REST data API query builder
//!
//! Filters and modifiers become query parameters
//! (`column=eq.value`, `order=column.desc`, `limit=n`); inserts and
//! updates send a JSON body and ask for the affected rows back when
//! `select` is chained after them.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{BackendClient, BackendError};

const ACCEPT_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Pending request against one table
#[must_use = "queries do nothing until a terminal method is awaited"]
pub struct QueryBuilder<'a> {
    client: &'a BackendClient,
    table: String,
    method: Method,
    params: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    returning: bool,
    bearer: Option<String>,
    pending_error: Option<BackendError>,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(client: &'a BackendClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            method: Method::GET,
            params: Vec::new(),
            body: None,
            returning: false,
            bearer: None,
            pending_error: None,
        }
    }

    /// Columns to return, embedded resources included
    ///
    /// After `insert`/`update` this also asks for the affected rows.
    pub fn select(mut self, columns: &str) -> Self {
        self.params
            .push(("select".to_string(), clean_columns(columns)));
        if self.method != Method::GET {
            self.returning = true;
        }
        self
    }

    /// `column = value`
    pub fn eq(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.params.push(("limit".to_string(), count.to_string()));
        self
    }

    /// Insert one row (object) or many (array)
    pub fn insert<T: Serialize + ?Sized>(mut self, rows: &T) -> Self {
        self.method = Method::POST;
        self.set_body(rows);
        self
    }

    /// Patch every row matching the filters
    pub fn update<T: Serialize + ?Sized>(mut self, patch: &T) -> Self {
        self.method = Method::PATCH;
        self.set_body(patch);
        self
    }

    /// Use this access token instead of the client's session
    pub fn with_token(mut self, access_token: &str) -> Self {
        self.bearer = Some(access_token.to_string());
        self
    }

    /// Run and decode all returned rows
    ///
    /// Writes without `select` return no rows.
    pub async fn execute<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let body = self.send(false).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Run and decode exactly one row
    ///
    /// Zero or several rows fail with `PGRST116`.
    pub async fn single<T: DeserializeOwned>(self) -> Result<T, BackendError> {
        let body = self.send(true).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Run and decode zero or one row
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>, BackendError> {
        let mut rows = self.execute::<T>().await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(BackendError::not_single_row(n)),
        }
    }

    /// Run a write whose result is not needed
    pub async fn execute_empty(self) -> Result<(), BackendError> {
        self.send(false).await.map(|_| ())
    }

    fn set_body<T: Serialize + ?Sized>(&mut self, value: &T) {
        match serde_json::to_value(value) {
            Ok(body) => self.body = Some(body),
            Err(error) => self.pending_error = Some(error.into()),
        }
    }

    fn operation(&self) -> &'static str {
        match self.method {
            Method::POST => "insert",
            Method::PATCH => "update",
            Method::DELETE => "delete",
            _ => "select",
        }
    }

    async fn send(mut self, single_object: bool) -> Result<String, BackendError> {
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }

        let operation = self.operation();
        let url = format!("{}/{}", self.client.rest_url(), self.table);
        let bearer = match self.bearer.take() {
            Some(token) => token,
            None => self.client.current_bearer().await,
        };

        let mut request = self
            .client
            .request(self.method.clone(), &url, &bearer)
            .query(&self.params);

        if self.method != Method::GET {
            let prefer = if self.returning || single_object {
                "return=representation"
            } else {
                "return=minimal"
            };
            request = request.header("Prefer", prefer);
        }
        if single_object {
            request = request.header(reqwest::header::ACCEPT, ACCEPT_OBJECT);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        self.client.send(operation, &self.table, request).await
    }
}

/// Strip whitespace outside double quotes, as the REST API expects
fn clean_columns(columns: &str) -> String {
    let mut quoted = false;
    columns
        .chars()
        .filter(|c| {
            if *c == '"' {
                quoted = !quoted;
            }
            quoted || !c.is_whitespace()
        })
        .collect()
}
