use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub facebook: FacebookConfig,
    pub zalo: ZaloConfig,
    pub shipping: ShippingConfig,
    pub payroll: PayrollConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Front-end root that OAuth callbacks redirect back to
    pub app_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted REST interface of the managed database
    Rest,
    /// Direct Postgres connection to the same database
    Postgres,
    /// Process-local tables, for development and tests
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub url: String,
    #[serde(skip_serializing)]
    pub service_key: String,
    #[serde(skip_serializing)]
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Upper bound on distinct client keys tracked by the limiter
    pub rate_limit_max_clients: usize,
    /// Reverse proxies in front of the server that append to `X-Forwarded-For`.
    /// Zero keys the limiter on the socket peer and ignores forwarding headers.
    pub trusted_proxy_hops: usize,
    /// Wrap the router in a per-request tracing span
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    /// Patterns of the form `https://*.example.com`
    pub cors_wildcard_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub app_id: String,
    #[serde(skip_serializing)]
    pub app_secret: String,
    pub redirect_uri: String,
    pub graph_base_url: String,
    pub graph_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaloConfig {
    pub app_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub oauth_base_url: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingConfig {
    pub enable_dev_proxy: bool,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollConfig {
    pub livestream_threshold: Decimal,
    pub sale_threshold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub batch_size: usize,
    pub page_size: usize,
    pub output_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("BIZOPS_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("APP_URL") {
            self.server.app_url = v;
        }

        // Backend overrides
        if let Ok(v) = env::var("BACKEND_KIND") {
            self.backend.kind = match v.as_str() {
                "postgres" | "pg" => BackendKind::Postgres,
                "memory" => BackendKind::Memory,
                "rest" => BackendKind::Rest,
                _ => self.backend.kind,
            };
        }
        if let Ok(v) = env::var("BACKEND_URL") {
            self.backend.url = v;
        }
        if let Ok(v) = env::var("BACKEND_SERVICE_KEY") {
            self.backend.service_key = v;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.backend.database_url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.backend.max_connections = v.parse().unwrap_or(self.backend.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.backend.connection_timeout = v.parse().unwrap_or(self.backend.connection_timeout);
        }
        if let Ok(v) = env::var("BACKEND_REQUEST_TIMEOUT_SECS") {
            self.backend.request_timeout_secs = v.parse().unwrap_or(self.backend.request_timeout_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_MAX_CLIENTS") {
            self.api.rate_limit_max_clients = v.parse().unwrap_or(self.api.rate_limit_max_clients);
        }
        if let Ok(v) = env::var("API_TRUSTED_PROXY_HOPS") {
            self.api.trusted_proxy_hops = v.parse().unwrap_or(self.api.trusted_proxy_hops);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_CORS_WILDCARD_ORIGINS") {
            self.security.cors_wildcard_origins = split_list(&v);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }

        // Integration credentials
        if let Ok(v) = env::var("FACEBOOK_APP_ID") {
            self.facebook.app_id = v;
        }
        if let Ok(v) = env::var("FACEBOOK_APP_SECRET") {
            self.facebook.app_secret = v;
        }
        if let Ok(v) = env::var("FACEBOOK_REDIRECT_URI") {
            self.facebook.redirect_uri = v;
        }
        if let Ok(v) = env::var("FACEBOOK_GRAPH_VERSION") {
            self.facebook.graph_version = v;
        }
        if let Ok(v) = env::var("ZALO_APP_ID") {
            self.zalo.app_id = v;
        }
        if let Ok(v) = env::var("ZALO_SECRET_KEY") {
            self.zalo.secret_key = v;
        }
        if let Ok(v) = env::var("SHIPPING_ENABLE_DEV_PROXY") {
            self.shipping.enable_dev_proxy = v.parse().unwrap_or(self.shipping.enable_dev_proxy);
        }
        if let Ok(v) = env::var("SHIPPING_BASE_URL") {
            self.shipping.base_url = v;
        }

        // Payroll policy
        if let Ok(v) = env::var("PAYROLL_LIVESTREAM_THRESHOLD") {
            self.payroll.livestream_threshold = v.parse().unwrap_or(self.payroll.livestream_threshold);
        }
        if let Ok(v) = env::var("PAYROLL_SALE_THRESHOLD") {
            self.payroll.sale_threshold = v.parse().unwrap_or(self.payroll.sale_threshold);
        }

        // Backup overrides
        if let Ok(v) = env::var("BACKUP_BATCH_SIZE") {
            self.backup.batch_size = v.parse().unwrap_or(self.backup.batch_size);
        }
        if let Ok(v) = env::var("BACKUP_PAGE_SIZE") {
            self.backup.page_size = v.parse().unwrap_or(self.backup.page_size);
        }
        if let Ok(v) = env::var("BACKUP_OUTPUT_DIR") {
            self.backup.output_dir = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                app_url: "http://localhost:5173".to_string(),
            },
            backend: BackendConfig {
                kind: BackendKind::Memory,
                url: String::new(),
                service_key: String::new(),
                database_url: String::new(),
                max_connections: 5,
                connection_timeout: 30,
                request_timeout_secs: 30,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 30,
                rate_limit_window_secs: 60,
                rate_limit_max_clients: 10_000,
                trusted_proxy_hops: 0,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                cors_wildcard_origins: vec![
                    "https://*.vercel.app".to_string(),
                    "https://*.netlify.app".to_string(),
                ],
                jwt_secret: "dev-secret-change-me".to_string(),
            },
            facebook: FacebookConfig::defaults(),
            zalo: ZaloConfig::defaults(),
            shipping: ShippingConfig {
                enable_dev_proxy: true,
                base_url: "https://partner.viettelpost.vn/v2".to_string(),
            },
            payroll: PayrollConfig::defaults(),
            backup: BackupConfig::defaults(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                app_url: "https://staging.bizops.vn".to_string(),
            },
            backend: BackendConfig {
                kind: BackendKind::Rest,
                url: String::new(),
                service_key: String::new(),
                database_url: String::new(),
                max_connections: 10,
                connection_timeout: 10,
                request_timeout_secs: 20,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 30,
                rate_limit_window_secs: 60,
                rate_limit_max_clients: 10_000,
                trusted_proxy_hops: 0,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.bizops.vn".to_string()],
                cors_wildcard_origins: vec![
                    "https://*.vercel.app".to_string(),
                    "https://*.bizops.vn".to_string(),
                ],
                jwt_secret: String::new(),
            },
            facebook: FacebookConfig::defaults(),
            zalo: ZaloConfig::defaults(),
            shipping: ShippingConfig {
                enable_dev_proxy: false,
                base_url: "https://partner.viettelpost.vn/v2".to_string(),
            },
            payroll: PayrollConfig::defaults(),
            backup: BackupConfig::defaults(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                app_url: "https://app.bizops.vn".to_string(),
            },
            backend: BackendConfig {
                kind: BackendKind::Rest,
                url: String::new(),
                service_key: String::new(),
                database_url: String::new(),
                max_connections: 20,
                connection_timeout: 5,
                request_timeout_secs: 15,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 30,
                rate_limit_window_secs: 60,
                rate_limit_max_clients: 50_000,
                trusted_proxy_hops: 0,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                cors_origins: vec![
                    "https://app.bizops.vn".to_string(),
                    "https://bizops.vn".to_string(),
                ],
                cors_wildcard_origins: vec![
                    "https://*.vercel.app".to_string(),
                    "https://*.bizops.vn".to_string(),
                ],
                jwt_secret: String::new(),
            },
            facebook: FacebookConfig::defaults(),
            zalo: ZaloConfig::defaults(),
            shipping: ShippingConfig {
                enable_dev_proxy: false,
                base_url: "https://partner.viettelpost.vn/v2".to_string(),
            },
            payroll: PayrollConfig::defaults(),
            backup: BackupConfig::defaults(),
        }
    }
}

impl FacebookConfig {
    fn defaults() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            redirect_uri: String::new(),
            graph_base_url: "https://graph.facebook.com".to_string(),
            graph_version: "v19.0".to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.app_secret.is_empty() && !self.redirect_uri.is_empty()
    }
}

impl ZaloConfig {
    fn defaults() -> Self {
        Self {
            app_id: String::new(),
            secret_key: String::new(),
            oauth_base_url: "https://oauth.zaloapp.com/v4".to_string(),
            api_base_url: "https://openapi.zalo.me/v2.0".to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.secret_key.is_empty()
    }
}

impl PayrollConfig {
    fn defaults() -> Self {
        Self {
            livestream_threshold: Decimal::from(100_000_000i64),
            sale_threshold: Decimal::ZERO,
        }
    }
}

impl BackupConfig {
    fn defaults() -> Self {
        Self {
            batch_size: 500,
            page_size: 1000,
            output_dir: "backups".to_string(),
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert!(config.shipping.enable_dev_proxy);
        assert_eq!(config.api.rate_limit_requests, 30);
        assert_eq!(config.api.rate_limit_window_secs, 60);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.backend.kind, BackendKind::Rest);
        assert!(!config.shipping.enable_dev_proxy);
        assert_eq!(config.security.cors_wildcard_origins.len(), 2);
        assert_eq!(config.backup.batch_size, 500);
    }

    #[test]
    fn livestream_threshold_defaults_to_one_hundred_million() {
        let config = AppConfig::development();
        assert_eq!(config.payroll.livestream_threshold, Decimal::from(100_000_000i64));
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
    }
}
