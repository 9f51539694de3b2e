use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub google: GoogleConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Missing secrets are fatal.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let port = match lookup("APP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("APP_PORT is not a valid port: {raw}"))?,
            None => 5000,
        };

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: or_default("JWT_ISSUER", "collegedash"),
            audience: or_default("JWT_AUDIENCE", "collegedash-users"),
        };
        let google = GoogleConfig {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            callback_url: or_default(
                "GOOGLE_CALLBACK_URL",
                "http://localhost:5000/api/auth/google/callback",
            ),
        };

        Ok(Self {
            host: or_default("APP_HOST", "0.0.0.0"),
            port,
            database_url: required("DATABASE_URL")?,
            frontend_url: or_default("FRONTEND_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            jwt,
            google,
        })
    }
}

/// Settings for the frontend-side API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".into(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            api_url: lookup("API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.api_url),
            timeout: lookup("API_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        vars(&[
            ("DATABASE_URL", "postgres://localhost/collegedash"),
            ("JWT_SECRET", "s3cret"),
            ("GOOGLE_CLIENT_ID", "client-id"),
            ("GOOGLE_CLIENT_SECRET", "client-secret"),
        ])
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let env = base();
        let cfg = AppConfig::from_lookup(|k| env.get(k).cloned()).expect("config");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.frontend_url, "http://localhost:3000");
        assert_eq!(cfg.jwt.issuer, "collegedash");
        assert_eq!(
            cfg.google.callback_url,
            "http://localhost:5000/api/auth/google/callback"
        );
    }

    #[test]
    fn missing_secret_is_fatal() {
        let mut env = base();
        env.remove("JWT_SECRET");
        let err = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn blank_google_secret_is_fatal() {
        let mut env = base();
        env.insert("GOOGLE_CLIENT_SECRET".into(), "  ".into());
        let err = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_SECRET"));
    }

    #[test]
    fn frontend_url_trailing_slash_is_trimmed() {
        let mut env = base();
        env.insert("FRONTEND_URL".into(), "https://dash.example.edu/".into());
        env.insert("APP_PORT".into(), "8080".into());
        let cfg = AppConfig::from_lookup(|k| env.get(k).cloned()).expect("config");
        assert_eq!(cfg.frontend_url, "https://dash.example.edu");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut env = base();
        env.insert("APP_PORT".into(), "http".into());
        assert!(AppConfig::from_lookup(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn client_config_reads_overrides_and_falls_back() {
        let env = vars(&[
            ("API_URL", "https://api.dash.example.edu/api/"),
            ("API_TIMEOUT_SECS", "3"),
        ]);
        let cfg = ClientConfig::from_lookup(|k| env.get(k).cloned());
        assert_eq!(cfg.api_url, "https://api.dash.example.edu/api");
        assert_eq!(cfg.timeout, Duration::from_secs(3));

        let env = vars(&[("API_TIMEOUT_SECS", "soon")]);
        let cfg = ClientConfig::from_lookup(|k| env.get(k).cloned());
        assert_eq!(cfg.api_url, "http://localhost:5000/api");
        assert_eq!(cfg.timeout, Duration::from_secs(15));
    }
}
