use std::path::PathBuf;

use anyhow::{Context, Result, bail};

pub const DEFAULT_SECRET_KEY: &str = "it's a secret";

#[derive(Debug, Clone)]
pub struct Config {
    /// `DATABASE_URL`
    pub database_url: String,
    /// `SECRET_KEY`, signs the session cookie.
    pub secret_key: String,
    /// `WTF_CSRF_ENABLED`. Tests turn this off.
    pub csrf_enabled: bool,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "warbler.db".into(),
            secret_key: DEFAULT_SECRET_KEY.into(),
            csrf_enabled: true,
            host: "0.0.0.0".into(),
            port: 5000,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    /// Load `.env` before calling this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match std::env::var("WARBLER_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("WARBLER_PORT is not a valid port: {raw}"))?,
            Err(_) => defaults.port,
        };

        let csrf_enabled = match std::env::var("WTF_CSRF_ENABLED") {
            Ok(raw) => parse_flag(&raw)?,
            Err(_) => defaults.csrf_enabled,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            secret_key: std::env::var("SECRET_KEY").unwrap_or(defaults.secret_key),
            csrf_enabled,
            host: std::env::var("WARBLER_HOST").unwrap_or(defaults.host),
            port,
            static_dir: std::env::var("WARBLER_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        })
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean flag, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert!(parse_flag("True").unwrap());
        assert!(parse_flag(" 1 ").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
