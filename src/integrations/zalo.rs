use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::IntegrationError;
use crate::config::ZaloConfig;

const SERVICE: &str = "Zalo";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaloToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Zalo sends this as a string of seconds
    #[serde(default, deserialize_with = "seconds")]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaloOfficialAccount {
    pub oa_id: String,
    pub name: String,
}

#[async_trait]
pub trait ZaloApi: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<ZaloToken, IntegrationError>;

    async fn oa_profile(&self, access_token: &str) -> Result<ZaloOfficialAccount, IntegrationError>;
}

pub struct ZaloClient {
    client: Client,
    config: ZaloConfig,
}

impl ZaloClient {
    pub fn new(client: Client, config: &ZaloConfig) -> Self {
        Self { client, config: config.clone() }
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

/// Zalo reports failures in-band with a non-zero `error` field
fn zalo_error(body: &Value, status: u16) -> Option<IntegrationError> {
    let code = body.get("error").and_then(Value::as_i64).unwrap_or(0);
    if code == 0 {
        return None;
    }
    let message = body
        .get("error_description")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Some(IntegrationError::Upstream { service: SERVICE, status, message: format!("{} ({})", message, code) })
}

async fn zalo_json(response: reqwest::Response) -> Result<Value, IntegrationError> {
    let status = response.status().as_u16();
    let body: Value = response.json().await.map_err(|e| IntegrationError::Decode {
        service: SERVICE,
        message: e.to_string(),
    })?;
    if let Some(err) = zalo_error(&body, status) {
        return Err(err);
    }
    if !(200..300).contains(&status) {
        return Err(IntegrationError::Upstream { service: SERVICE, status, message: body.to_string() });
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
impl ZaloApi for ZaloClient {
    async fn exchange_code(&self, code: &str) -> Result<ZaloToken, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("ZALO_APP_ID/ZALO_SECRET_KEY"));
        }
        let url = format!("{}/oa/access_token", self.config.oauth_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("secret_key", &self.config.secret_key)
            .form(&[
                ("app_id", self.config.app_id.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        decode(zalo_json(response).await?)
    }

    async fn oa_profile(&self, access_token: &str) -> Result<ZaloOfficialAccount, IntegrationError> {
        let url = format!("{}/oa/getoa", self.config.api_base_url.trim_end_matches('/'));
        let response = self.client.get(url).header("access_token", access_token).send().await?;
        let body = zalo_json(response).await?;
        let data = body.get("data").cloned().ok_or(IntegrationError::Decode {
            service: SERVICE,
            message: "missing data".into(),
        })?;
        decode(data)
    }
}
