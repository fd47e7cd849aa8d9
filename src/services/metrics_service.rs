use std::sync::Arc;

use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::ServiceError;
use crate::backend::{from_row, Backend, Filter};
use crate::integrations::{FacebookApi, IntegrationError};
use crate::models::social::TABLE;
use crate::models::{Platform, SocialConnection};

/// Upper bound on ids fetched in one batch request
pub const MAX_BATCH: usize = 50;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MetricsRequest {
    GetVideoStats(MetricsParams),
    GetReelStats(MetricsParams),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsParams {
    pub tenant_id: Uuid,
    pub page_id: String,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub video_ids: Vec<String>,
}

impl MetricsRequest {
    pub fn params(&self) -> &MetricsParams {
        match self {
            MetricsRequest::GetVideoStats(p) | MetricsRequest::GetReelStats(p) => p,
        }
    }
}

impl MetricsParams {
    /// Either one `video_id` or a non-empty `video_ids` batch, every id a Graph object id
    fn ids(&self) -> Result<Vec<&str>, IntegrationError> {
        let ids: Vec<&str> = match (&self.video_id, self.video_ids.is_empty()) {
            (Some(id), true) => vec![id.as_str()],
            (None, false) => self.video_ids.iter().map(String::as_str).collect(),
            (Some(_), false) => {
                return Err(IntegrationError::InvalidRequest("Chỉ truyền video_id hoặc video_ids".into()))
            }
            (None, true) => return Err(IntegrationError::InvalidRequest("Thiếu video_id".into())),
        };
        if ids.len() > MAX_BATCH {
            return Err(IntegrationError::InvalidRequest(format!("Tối đa {} video mỗi lần", MAX_BATCH)));
        }
        if let Some(bad) = ids.iter().find(|id| !is_graph_id(id)) {
            return Err(IntegrationError::InvalidRequest(format!("video_id không hợp lệ: {}", bad)));
        }
        if !is_graph_id(&self.page_id) {
            return Err(IntegrationError::InvalidRequest("page_id không hợp lệ".into()));
        }
        Ok(ids)
    }
}

fn is_graph_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_digit() || c == '_')
}

/// Fetches Graph metrics with the stored Page token; the token never leaves the server
pub struct MetricsService {
    backend: Arc<dyn Backend>,
}

impl MetricsService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, api: &dyn FacebookApi, request: &MetricsRequest) -> Result<Value, ServiceError> {
        let params = request.params();
        let ids = params.ids()?;
        let token = self.page_token(params).await?;
        let token = token.as_str();

        let fetches = ids.iter().copied().map(|id| async move {
            let stats = match request {
                MetricsRequest::GetVideoStats(_) => api.video_stats(id, token).await?,
                MetricsRequest::GetReelStats(_) => api.reel_stats(id, token).await?,
            };
            Ok::<_, IntegrationError>(json!({ "video_id": id, "stats": stats }))
        });
        let mut results = try_join_all(fetches).await?;

        if params.video_id.is_some() {
            return Ok(results.pop().map(|r| r["stats"].clone()).unwrap_or(Value::Null));
        }
        Ok(Value::Array(results))
    }

    async fn page_token(&self, params: &MetricsParams) -> Result<String, ServiceError> {
        let filter = Filter::new()
            .eq("tenant_id", params.tenant_id.to_string())
            .eq("platform", Platform::Facebook.as_str())
            .eq("page_id", params.page_id.clone())
            .eq("is_active", true);
        let row = self
            .backend
            .select_one(TABLE, filter)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Trang Facebook chưa được kết nối".into()))?;
        let connection: SocialConnection = from_row(row)?;
        Ok(connection.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(video_id: Option<&str>, video_ids: &[&str]) -> MetricsParams {
        MetricsParams {
            tenant_id: Uuid::nil(),
            page_id: "1029384756".into(),
            video_id: video_id.map(str::to_string),
            video_ids: video_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn request_parses_action_tag() {
        let req: MetricsRequest = serde_json::from_value(json!({
            "action": "get_reel_stats",
            "tenant_id": Uuid::nil(),
            "page_id": "1",
            "video_ids": ["2", "3"]
        }))
        .unwrap();
        assert!(matches!(req, MetricsRequest::GetReelStats(_)));
        assert_eq!(req.params().video_ids.len(), 2);
    }

    #[test]
    fn exactly_one_id_form_is_accepted() {
        assert_eq!(params(Some("123"), &[]).ids().unwrap(), vec!["123"]);
        assert_eq!(params(None, &["1", "2_3"]).ids().unwrap().len(), 2);
        assert!(params(None, &[]).ids().is_err());
        assert!(params(Some("1"), &["2"]).ids().is_err());
    }

    #[test]
    fn ids_cannot_reach_other_graph_paths() {
        assert!(params(Some("123/insights"), &[]).ids().is_err());
        assert!(params(Some("me"), &[]).ids().is_err());
        assert!(params(Some("1?fields=access_token"), &[]).ids().is_err());
    }
}
