//! OAuth callbacks that link a tenant to its Facebook Pages or Zalo OA.
//!
//! Every step runs in order and the first failure ends the flow; nothing is
//! retried or rolled back. Connection rows are upserted on their natural key,
//! so replaying a callback only refreshes tokens.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{to_row, Backend, BackendError};
use crate::integrations::{FacebookApi, IntegrationError, ZaloApi};
use crate::models::social::{CONFLICT_KEY, TABLE};
use crate::models::{Platform, SocialConnection};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Zalo only
    pub oa_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Provider denied authorization: {0}")]
    Denied(String),

    #[error("Missing authorization code")]
    MissingCode,

    #[error("State is not a tenant id")]
    InvalidState,

    #[error("No manageable pages returned")]
    NoPages,

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl OAuthError {
    pub fn user_message(&self) -> String {
        match self {
            OAuthError::Denied(reason) => format!("Bạn đã từ chối cấp quyền: {}", reason),
            OAuthError::MissingCode => "Thiếu mã xác thực".to_string(),
            OAuthError::InvalidState => "Tham số state không hợp lệ".to_string(),
            OAuthError::NoPages => "Không tìm thấy Trang nào bạn quản lý".to_string(),
            OAuthError::Integration(e) => e.user_message(),
            OAuthError::Backend(_) => "Không lưu được kết nối".to_string(),
        }
    }
}

/// Validated callback: the code to exchange and the tenant to link
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    pub code: String,
    pub tenant_id: Uuid,
}

impl CallbackParams {
    /// Check the query before any external call is made
    pub fn authorization(&self) -> Result<Authorization, OAuthError> {
        if let Some(error) = &self.error {
            let reason = self.error_description.clone().unwrap_or_else(|| error.clone());
            return Err(OAuthError::Denied(reason));
        }
        let code = match self.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => return Err(OAuthError::MissingCode),
        };
        let tenant_id = self
            .state
            .as_deref()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or(OAuthError::InvalidState)?;
        Ok(Authorization { code, tenant_id })
    }
}

pub struct OAuthService {
    backend: Arc<dyn Backend>,
}

impl OAuthService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// code → short-lived token → long-lived token → Pages; returns the number of Pages linked
    pub async fn connect_facebook(&self, api: &dyn FacebookApi, auth: &Authorization) -> Result<usize, OAuthError> {
        let short = api.exchange_code(&auth.code).await?;
        let long = api.exchange_long_lived(&short.access_token).await?;
        let pages = api.list_pages(&long.access_token).await?;
        if pages.is_empty() {
            return Err(OAuthError::NoPages);
        }

        let now = Utc::now();
        for page in &pages {
            // Page tokens derived from a long-lived user token do not expire
            let connection = SocialConnection {
                tenant_id: auth.tenant_id,
                platform: Platform::Facebook,
                page_id: page.id.clone(),
                page_name: page.name.clone(),
                access_token: page.access_token.clone(),
                refresh_token: None,
                token_expires_at: None,
                is_active: true,
                updated_at: Some(now),
            };
            self.backend.upsert(TABLE, vec![to_row(&connection)?], &CONFLICT_KEY).await?;
            tracing::info!("Linked Facebook page {} ({}) to tenant {}", page.name, page.id, auth.tenant_id);
        }
        Ok(pages.len())
    }

    /// code → OA token → OA profile; upserts the single OA connection
    pub async fn connect_zalo(
        &self,
        api: &dyn ZaloApi,
        auth: &Authorization,
        oa_id: Option<&str>,
    ) -> Result<SocialConnection, OAuthError> {
        let token = api.exchange_code(&auth.code).await?;
        let profile = api.oa_profile(&token.access_token).await?;

        let page_id = oa_id.filter(|id| !id.is_empty()).unwrap_or(&profile.oa_id);
        let now = Utc::now();
        let connection = SocialConnection {
            tenant_id: auth.tenant_id,
            platform: Platform::Zalo,
            page_id: page_id.to_string(),
            page_name: profile.name.clone(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_expires_at: token.expires_in.map(|secs| now + Duration::seconds(secs)),
            is_active: true,
            updated_at: Some(now),
        };
        self.backend.upsert(TABLE, vec![to_row(&connection)?], &CONFLICT_KEY).await?;
        tracing::info!("Linked Zalo OA {} to tenant {}", connection.page_id, auth.tenant_id);
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn authorization_requires_code_and_uuid_state() {
        let tenant = Uuid::new_v4().to_string();
        assert!(matches!(params(None, Some(&tenant)).authorization(), Err(OAuthError::MissingCode)));
        assert!(matches!(params(Some("  "), Some(&tenant)).authorization(), Err(OAuthError::MissingCode)));
        assert!(matches!(params(Some("abc"), Some("tenant-1")).authorization(), Err(OAuthError::InvalidState)));
        assert!(matches!(params(Some("abc"), None).authorization(), Err(OAuthError::InvalidState)));

        let auth = params(Some("abc"), Some(&tenant)).authorization().unwrap();
        assert_eq!(auth.code, "abc");
        assert_eq!(auth.tenant_id.to_string(), tenant);
    }

    #[test]
    fn provider_denial_wins_over_other_checks() {
        let p = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("Permissions error".into()),
            ..Default::default()
        };
        match p.authorization() {
            Err(OAuthError::Denied(reason)) => assert_eq!(reason, "Permissions error"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
