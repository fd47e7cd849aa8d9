//! Fixed-window request limiter keyed by client IP.
//!
//! Windows live in a bounded map: expired windows are evicted first and,
//! when every tracked client is still inside its window, the oldest window
//! makes room for the newcomer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::ApiConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    max_clients: usize,
    trusted_proxy_hops: usize,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, max_clients: usize) -> Self {
        Self {
            limit,
            window,
            max_clients: max_clients.max(1),
            trusted_proxy_hops: 0,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Trust `hops` reverse proxies to append the caller's address to `X-Forwarded-For`
    pub fn behind_proxies(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
            config.rate_limit_max_clients,
        )
        .behind_proxies(config.trusted_proxy_hops)
    }

    /// Limiter key for a request: see [`client_ip`]
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        client_ip(headers, peer, self.trusted_proxy_hops)
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !clients.contains_key(key) && clients.len() >= self.max_clients {
            self.evict(&mut clients, now);
        }

        let entry = clients.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.limit {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited { retry_after: self.window.saturating_sub(elapsed) };
        }

        entry.count += 1;
        Decision::Allowed { remaining: self.limit - entry.count }
    }

    /// Number of client windows currently held
    pub fn tracked_clients(&self) -> usize {
        match self.clients.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn evict(&self, clients: &mut HashMap<String, Window>, now: Instant) {
        let window = self.window;
        clients.retain(|_, w| now.duration_since(w.started) < window);

        if clients.len() >= self.max_clients {
            let oldest = clients
                .iter()
                .min_by_key(|(_, w)| w.started)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                clients.remove(&key);
            }
        }
    }
}

/// Client address used as the limiter key.
///
/// Without trusted proxies the socket peer is the client and forwarding
/// headers are ignored. With `trusted_hops` proxies, each one appended the address it saw, so the
/// client is the `trusted_hops`-th entry from the right of `X-Forwarded-For`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let peer_ip = || peer.map(|addr| addr.ip().to_string());
    if trusted_hops == 0 {
        return peer_ip().unwrap_or_else(|| "unknown".to_string());
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    hops.len()
        .checked_sub(trusted_hops)
        .and_then(|i| hops.get(i))
        .map(|ip| ip.to_string())
        .or_else(peer_ip)
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = limiter.client_key(request.headers(), peer);

    match limiter.check(&key) {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { retry_after } => {
            tracing::warn!("Rate limit exceeded for {}", key);
            let mut response =
                ApiError::too_many_requests("Quá nhiều yêu cầu, vui lòng thử lại sau").into_response();
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_first_request_in_window_is_limited() {
        let limiter = RateLimiter::new(30, Duration::from_secs(60), 100);
        let start = Instant::now();

        for i in 0..30 {
            let at = start + Duration::from_secs(i);
            assert!(matches!(limiter.check_at("1.2.3.4", at), Decision::Allowed { .. }), "request {}", i + 1);
        }
        match limiter.check_at("1.2.3.4", start + Duration::from_secs(45)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(15)),
            other => panic!("expected limit, got {:?}", other),
        }

        // Other clients have their own window
        assert!(matches!(limiter.check_at("5.6.7.8", start), Decision::Allowed { remaining: 29 }));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 100);
        let start = Instant::now();
        assert!(matches!(limiter.check_at("a", start), Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at("a", start), Decision::Limited { .. }));
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(60)),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn tracked_clients_stay_bounded() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), 3);
        let start = Instant::now();
        for i in 0..10u64 {
            limiter.check_at(&format!("10.0.0.{}", i), start + Duration::from_millis(i));
        }
        assert_eq!(limiter.tracked_clients(), 3);
    }

    #[test]
    fn expired_windows_are_evicted_before_live_ones() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), 2);
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("live", start + Duration::from_secs(50));
        limiter.check_at("new", start + Duration::from_secs(70));

        let clients = limiter.clients.lock().unwrap();
        assert!(clients.contains_key("live"));
        assert!(!clients.contains_key("old"));
    }

    #[test]
    fn forwarding_headers_are_ignored_without_trusted_proxies() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));

        assert_eq!(client_ip(&headers, Some(peer), 0), "127.0.0.1");
        assert_eq!(client_ip(&headers, None, 0), "unknown");
    }

    #[test]
    fn trusted_proxy_hop_is_read_from_the_right() {
        let peer: SocketAddr = "10.0.0.2:443".parse().unwrap();
        let mut headers = HeaderMap::new();
        // Caller forged the first entry; the proxy appended the real address
        headers.insert("x-forwarded-for", HeaderValue::from_static("6.6.6.6, 203.0.113.7"));
        assert_eq!(client_ip(&headers, Some(peer), 1), "203.0.113.7");
        assert_eq!(client_ip(&headers, Some(peer), 2), "6.6.6.6");

        // Fewer hops than trusted proxies: fall back to the peer
        assert_eq!(client_ip(&headers, Some(peer), 3), "10.0.0.2");
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), 1), "10.0.0.2");
    }

    #[test]
    fn rotating_forwarded_for_does_not_escape_the_limit() {
        let limiter = RateLimiter::new(30, Duration::from_secs(60), 100);
        let peer: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let start = Instant::now();

        let mut last = None;
        for i in 0..31 {
            let mut headers = HeaderMap::new();
            let forged = HeaderValue::from_str(&format!("10.9.{}.{}", i / 250, i % 250)).unwrap();
            headers.insert("x-forwarded-for", forged);
            last = Some(limiter.check_at(&limiter.client_key(&headers, Some(peer)), start));
        }
        assert!(matches!(last, Some(Decision::Limited { .. })));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
