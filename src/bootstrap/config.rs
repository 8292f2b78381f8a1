use std::env;
use std::time::Duration;

use crate::application::linkgraph::traversal::DEFAULT_MAX_DEPTH;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_port: u16,
    pub frontend_url: Option<String>,
    /// Entity backend base URL; the in-memory backend is used when unset.
    pub backend_url: Option<String>,
    pub backend_timeout: Duration,
    pub graph_default_depth: usize,
    pub event_buffer: usize,
    pub is_production: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8787);
        let frontend_url = env::var("FRONTEND_URL").ok();
        let backend_url = env::var("BACKEND_URL").ok().and_then(|v| {
            let trimmed = v.trim();
            if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                Some(trimmed.trim_end_matches('/').to_string())
            } else {
                None
            }
        });
        let backend_timeout_secs = env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let graph_default_depth = env::var("GRAPH_DEFAULT_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_DEPTH);
        let event_buffer = env::var("EVENT_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(1024);
        let is_production = matches!(
            env::var("RUST_ENV").ok().as_deref(),
            Some("production") | Some("prod")
        );

        // An in-memory backend loses everything on restart.
        if is_production && backend_url.is_none() {
            anyhow::bail!(
                "BACKEND_URL must be set to a full origin in production (e.g., https://api.example.com)"
            );
        }

        Ok(Self {
            api_port,
            frontend_url,
            backend_url,
            backend_timeout: Duration::from_secs(backend_timeout_secs),
            graph_default_depth,
            event_buffer,
            is_production,
        })
    }
}
