use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub dashboard_username: String,
    pub dashboard_password: String,
    pub demo_mode: bool,
    pub static_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let demo_mode = match lookup("DEMO_MODE").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => anyhow::bail!("DEMO_MODE must be true or false, got '{}'", other),
        };

        Ok(Self {
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| "influencer_metrics.db".to_string())
                .into(),
            bind_addr,
            dashboard_username: lookup("DASHBOARD_USERNAME").unwrap_or_else(|| "admin".to_string()),
            dashboard_password: lookup("DASHBOARD_PASSWORD").unwrap_or_else(|| "admin".to_string()),
            demo_mode,
            static_dir: lookup("STATIC_DIR").filter(|dir| !dir.is_empty()).map(PathBuf::from),
        })
    }
}
