use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::SecurityConfig;

/// Exact origins plus `scheme://*.domain` patterns
pub fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let exact = security.cors_origins.clone();
    let wildcards = security.cors_wildcard_origins.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| origin_allowed(o, &exact, &wildcards))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn origin_allowed(origin: &str, exact: &[String], wildcards: &[String]) -> bool {
    if exact.iter().any(|o| o == origin) {
        return true;
    }
    wildcards.iter().any(|pattern| matches_wildcard(origin, pattern))
}

fn matches_wildcard(origin: &str, pattern: &str) -> bool {
    let Some((prefix, suffix)) = pattern.split_once('*') else {
        return origin == pattern;
    };
    if !suffix.starts_with('.') || origin.len() <= prefix.len() + suffix.len() {
        return false;
    }
    let Some(rest) = origin.strip_prefix(prefix) else {
        return false;
    };
    let Some(sub) = rest.strip_suffix(suffix) else {
        return false;
    };
    !sub.is_empty() && !sub.contains(['/', ':', '@', '?', '#'])
}
