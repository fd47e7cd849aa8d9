use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "social_connections";

/// Natural key of a connection row; upserts on it are safe to repeat
pub const CONFLICT_KEY: [&str; 3] = ["tenant_id", "platform", "page_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Zalo,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Zalo => "zalo",
        }
    }
}

/// A tenant's link to one manageable social resource (Facebook Page, Zalo OA)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConnection {
    pub tenant_id: Uuid,
    pub platform: Platform,
    pub page_id: String,
    #[serde(default)]
    pub page_name: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}
