use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    /// Base for public photo URLs. Defaults to `http://localhost:{port}`.
    pub public_url: String,
    pub jwt_secret: String,
    /// Unreferenced photos younger than this are left alone.
    pub orphan_grace: chrono::Duration,
    pub cleanup_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("FIELDLOG_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FIELDLOG_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = var("FIELDLOG_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("FIELDLOG_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("FIELDLOG_PORT is not a valid port")?;
        let db_path = var("FIELDLOG_DB_PATH").unwrap_or_else(|| "fieldlog.db".into()).into();
        let storage_dir = var("FIELDLOG_STORAGE_DIR")
            .unwrap_or_else(|| "./photo-storage".into())
            .into();
        let public_url = var("FIELDLOG_PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{port}"));
        let orphan_grace = match var("FIELDLOG_ORPHAN_GRACE_HOURS") {
            None => chrono::Duration::hours(24),
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .and_then(|hours| chrono::Duration::try_hours(i64::from(hours)))
                .context("FIELDLOG_ORPHAN_GRACE_HOURS must be a non-negative number of hours")?,
        };
        let interval_secs: u64 = var("FIELDLOG_CLEANUP_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(3600);

        Ok(Self {
            host,
            port,
            db_path,
            storage_dir,
            public_url,
            jwt_secret,
            orphan_grace,
            cleanup_interval: Duration::from_secs(interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("FIELDLOG_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("fieldlog.db"));
        assert_eq!(config.storage_dir, PathBuf::from("./photo-storage"));
        assert_eq!(config.public_url, "http://localhost:3000");
        assert_eq!(config.orphan_grace, chrono::Duration::hours(24));
        assert_eq!(config.cleanup_interval, Duration::from_secs(3600));
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("FIELDLOG_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("FIELDLOG_JWT_SECRET", "s3cret"),
            ("FIELDLOG_PORT", "8080"),
            ("FIELDLOG_PUBLIC_URL", "https://field.example.org"),
            ("FIELDLOG_ORPHAN_GRACE_HOURS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_url, "https://field.example.org");
        assert_eq!(config.orphan_grace, chrono::Duration::hours(2));
    }

    #[test]
    fn negative_or_garbled_grace_is_an_error() {
        for raw in ["-1", "-48", "soon", "1.5"] {
            let result = Config::from_lookup(lookup(&[
                ("FIELDLOG_JWT_SECRET", "s3cret"),
                ("FIELDLOG_ORPHAN_GRACE_HOURS", raw),
            ]));
            assert!(result.is_err(), "{raw}");
        }

        let config = Config::from_lookup(lookup(&[
            ("FIELDLOG_JWT_SECRET", "s3cret"),
            ("FIELDLOG_ORPHAN_GRACE_HOURS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.orphan_grace, chrono::Duration::zero());
    }

    #[test]
    fn bad_port_is_an_error() {
        let result = Config::from_lookup(lookup(&[
            ("FIELDLOG_JWT_SECRET", "s3cret"),
            ("FIELDLOG_PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }
}
