use anyhow::{anyhow, Context, Result};
use std::{env, net::SocketAddr};

pub const DEFAULT_API_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone)]
pub struct Config {
    pub api_base_url: String,
    pub image_base_url: String,
    pub read_token: String,
    pub bind_addr: SocketAddr,
}

// Keep the token out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("image_base_url", &self.image_base_url)
            .field("read_token", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let read_token =
            read("TMDB_READ_TOKEN").ok_or_else(|| anyhow!("TMDB_READ_TOKEN must be set"))?;
        let api_base_url = read("TMDB_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let image_base_url = read("TMDB_IMAGE_BASE")
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let bind_raw = read("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR is not a socket address: {bind_raw}"))?;

        Ok(Self {
            api_base_url,
            image_base_url,
            read_token,
            bind_addr,
        })
    }
}
