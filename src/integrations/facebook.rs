use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::IntegrationError;
use crate::config::FacebookConfig;

const SERVICE: &str = "Facebook";

const VIDEO_FIELDS: &str = "id,title,description,created_time,length,permalink_url,views,\
likes.summary(true).limit(0),comments.summary(true).limit(0)";

const REEL_METRICS: &str = "blue_reels_play_count,post_impressions_unique,\
post_video_avg_time_watched,post_video_social_actions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until expiry; absent for non-expiring tokens
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// A Page the user can manage, with its own Page token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[async_trait]
pub trait FacebookApi: Send + Sync {
    /// Authorization code → short-lived user token
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, IntegrationError>;

    /// Short-lived user token → long-lived user token
    async fn exchange_long_lived(&self, short_token: &str) -> Result<AccessToken, IntegrationError>;

    /// Pages manageable with a long-lived user token; their Page tokens do not expire
    async fn list_pages(&self, user_token: &str) -> Result<Vec<ManagedPage>, IntegrationError>;

    async fn video_stats(&self, video_id: &str, page_token: &str) -> Result<Value, IntegrationError>;

    async fn reel_stats(&self, video_id: &str, page_token: &str) -> Result<Value, IntegrationError>;
}

/// Graph API client
pub struct GraphClient {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    redirect_uri: String,
}

impl GraphClient {
    pub fn new(client: Client, config: &FacebookConfig) -> Self {
        Self {
            client,
            base_url: format!("{}/{}", config.graph_base_url.trim_end_matches('/'), config.graph_version),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    /// Same requirements as [`FacebookConfig::is_configured`]
    fn ensure_configured(&self) -> Result<(), IntegrationError> {
        if self.app_id.is_empty() || self.app_secret.is_empty() || self.redirect_uri.is_empty() {
            return Err(IntegrationError::NotConfigured(
                "FACEBOOK_APP_ID/FACEBOOK_APP_SECRET/FACEBOOK_REDIRECT_URI",
            ));
        }
        Ok(())
    }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, IntegrationError> {
        let response = self.client.get(url).query(params).send().await?;
        graph_json(response).await
    }
}

/// Decode a Graph response, turning `{"error": {...}}` bodies into errors
async fn graph_json(response: Response) -> Result<Value, IntegrationError> {
    let status = response.status();
    let body: Value = response.json().await.map_err(|e| IntegrationError::Decode {
        service: SERVICE,
        message: e.to_string(),
    })?;

    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(IntegrationError::Upstream { service: SERVICE, status: status.as_u16(), message });
    }
    if !status.is_success() {
        return Err(IntegrationError::Upstream {
            service: SERVICE,
            status: status.as_u16(),
            message: body.to_string(),
        });
    }
    Ok(body)
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, IntegrationError> {
    serde_json::from_value(value).map_err(|e| IntegrationError::Decode {
        service: SERVICE,
        message: e.to_string(),
    })
}

#[async_trait]
impl FacebookApi for GraphClient {
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, IntegrationError> {
        self.ensure_configured()?;
        let url = format!("{}/oauth/access_token", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("redirect_uri", self.redirect_uri.as_str()),
                    ("code", code),
                ],
            )
            .await?;
        decode(body)
    }

    async fn exchange_long_lived(&self, short_token: &str) -> Result<AccessToken, IntegrationError> {
        self.ensure_configured()?;
        let url = format!("{}/oauth/access_token", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("fb_exchange_token", short_token),
                ],
            )
            .await?;
        decode(body)
    }

    async fn list_pages(&self, user_token: &str) -> Result<Vec<ManagedPage>, IntegrationError> {
        let first = format!("{}/me/accounts", self.base_url);
        let mut body = self
            .get_json(
                &first,
                &[
                    ("fields", "id,name,access_token,category"),
                    ("limit", "100"),
                    ("access_token", user_token),
                ],
            )
            .await?;

        let mut pages = Vec::new();
        loop {
            let data = body.get("data").cloned().unwrap_or(Value::Array(vec![]));
            pages.extend(decode::<Vec<ManagedPage>>(data)?);

            // `paging.next` is a complete URL with the token already embedded
            let next = body
                .pointer("/paging/next")
                .and_then(Value::as_str)
                .map(str::to_string);
            match next {
                Some(url) => body = self.get_json(&url, &[]).await?,
                None => break,
            }
        }
        Ok(pages)
    }

    async fn video_stats(&self, video_id: &str, page_token: &str) -> Result<Value, IntegrationError> {
        let url = format!("{}/{}", self.base_url, video_id);
        self.get_json(&url, &[("fields", VIDEO_FIELDS), ("access_token", page_token)]).await
    }

    async fn reel_stats(&self, video_id: &str, page_token: &str) -> Result<Value, IntegrationError> {
        let url = format!("{}/{}/video_insights", self.base_url, video_id);
        self.get_json(&url, &[("metric", REEL_METRICS), ("access_token", page_token)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_includes_graph_version() {
        let mut config = crate::config::AppConfig::development().facebook;
        config.graph_base_url = "https://graph.facebook.com/".into();
        let client = GraphClient::new(Client::new(), &config);
        assert_eq!(client.base_url, "https://graph.facebook.com/v19.0");
    }

    #[test]
    fn unconfigured_client_refuses_token_exchange() {
        let config = crate::config::AppConfig::development().facebook;
        let client = GraphClient::new(Client::new(), &config);
        assert!(matches!(client.ensure_configured(), Err(IntegrationError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn missing_redirect_uri_fails_before_calling_facebook() {
        let mut config = crate::config::AppConfig::development().facebook;
        config.app_id = "123".into();
        config.app_secret = "secret".into();
        // Unroutable so a request that slips through would fail differently
        config.graph_base_url = "http://127.0.0.1:9".into();
        assert!(!config.is_configured());

        let client = GraphClient::new(Client::new(), &config);
        let err = client.exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, IntegrationError::NotConfigured(_)), "{:?}", err);

        config.redirect_uri = "https://app.test/api/facebook/callback".into();
        assert!(config.is_configured());
        assert!(GraphClient::new(Client::new(), &config).ensure_configured().is_ok());
    }

    #[test]
    fn decodes_pages_and_tokens() {
        let pages: Vec<ManagedPage> = decode(json!([
            { "id": "123", "name": "Shop A", "access_token": "PAGE_TOKEN", "category": "Retail" }
        ]))
        .unwrap();
        assert_eq!(pages[0].id, "123");

        let token: AccessToken = decode(json!({ "access_token": "x", "token_type": "bearer" })).unwrap();
        assert_eq!(token.expires_in, None);
    }
}
