use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use super::{validate_identifier, Backend, BackendError, Filter, Query, Row, SortDirection};
use crate::config::BackendConfig;

/// Hosted REST interface (PostgREST dialect) authenticated with the
/// service-role key.
pub struct RestBackend {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl RestBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.url.is_empty() {
            return Err(BackendError::ConfigMissing("BACKEND_URL"));
        }
        if config.service_key.is_empty() {
            return Err(BackendError::ConfigMissing("BACKEND_SERVICE_KEY"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Self::new(client, &config.url, &config.service_key)
    }

    pub fn new(client: Client, url: &str, service_key: &str) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(url).map_err(|_| BackendError::ConfigMissing("BACKEND_URL"))?;
        base_url.set_path("/rest/v1/");
        Ok(Self {
            client,
            base_url,
            service_key: service_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        validate_identifier(table)?;
        self.base_url
            .join(table)
            .map_err(|e| BackendError::InvalidIdentifier(format!("{}: {}", table, e)))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound(body),
            StatusCode::CONFLICT => BackendError::Conflict(body),
            _ => BackendError::Status { status: status.as_u16(), body },
        })
    }

    async fn rows(response: Response) -> Result<Vec<Row>, BackendError> {
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// Render an equality filter as query pairs: `column=eq.value`
pub(crate) fn filter_pairs(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            let rendered = match value {
                Value::Null => "is.null".to_string(),
                Value::String(s) => format!("eq.{}", s),
                other => format!("eq.{}", other),
            };
            (column.clone(), rendered)
        })
        .collect()
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError> {
        query.validate()?;
        let mut params = filter_pairs(&query.filter);
        params.push(("select".into(), "*".into()));
        if let Some((column, direction)) = &query.order {
            let dir = match direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            params.push(("order".into(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".into(), offset.to_string()));
        }

        let response = self
            .authed(self.client.get(self.table_url(table)?))
            .query(&params)
            .send()
            .await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, BackendError> {
        let response = self
            .authed(self.client.post(self.table_url(table)?))
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn upsert(&self, table: &str, rows: Vec<Row>, on_conflict: &[&str]) -> Result<usize, BackendError> {
        for column in on_conflict {
            validate_identifier(column)?;
        }
        let count = rows.len();
        let mut request = self
            .authed(self.client.post(self.table_url(table)?))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .header(header::CONTENT_TYPE, "application/json");
        if !on_conflict.is_empty() {
            request = request.query(&[("on_conflict", on_conflict.join(","))]);
        }

        let response = request.json(&rows).send().await?;
        Self::check(response).await?;
        Ok(count)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>, BackendError> {
        filter.validate()?;
        if filter.is_empty() {
            return Err(BackendError::UnfilteredWrite("update", table.to_string()));
        }
        let response = self
            .authed(self.client.patch(self.table_url(table)?))
            .header("Prefer", "return=representation")
            .query(&filter_pairs(filter))
            .json(&patch)
            .send()
            .await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, BackendError> {
        filter.validate()?;
        if filter.is_empty() {
            return Err(BackendError::UnfilteredWrite("delete", table.to_string()));
        }
        let response = self
            .authed(self.client.delete(self.table_url(table)?))
            .header("Prefer", "return=representation")
            .query(&filter_pairs(filter))
            .send()
            .await?;
        Ok(Self::rows(Self::check(response).await?).await?.len())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self.authed(self.client.get(self.base_url.clone())).send().await?;
        Self::check(response).await.map(|_| ())
    }
}
