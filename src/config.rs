use crate::error::{Error, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use std::env;
use std::time::Duration;

pub const DEFAULT_DISCLAIMER: &str = "DISCLAIMER: BYN-K Platform is a gateway service that curates and shares \
opportunities from various sources. We are NOT the hiring entity, scholarship \
provider, or organization offering these opportunities. We do not process \
applications. All applications are submitted directly to the respective \
organizations through their official channels. Please verify all information \
with the official source before applying.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    /// JSON mail API (Postmark-compatible)
    Api,
    /// Writes outgoing mail to the log
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub api_base_url: Option<String>,
    pub api_token: Option<Secret<String>>,
    pub sender: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: Secret<String>,
    pub frontend_url: String,
    pub platform_disclaimer: String,
    pub default_page_size: i64,
    pub mail: MailConfig,
    pub send_emails_async: bool,
    pub notification_queue_capacity: usize,
    pub digest_cron: String,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let storage_backend = match vars.or("STORAGE_BACKEND", "postgres").to_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(Error::Config(format!(
                    "Invalid value for STORAGE_BACKEND: {}",
                    other
                )))
            }
        };
        let database_url = vars.optional("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(Error::Config(
                "Missing environment variable: DATABASE_URL".to_string(),
            ));
        }

        let mail_backend = match vars.or("MAIL_BACKEND", "log").to_lowercase().as_str() {
            "api" => MailBackend::Api,
            "log" => MailBackend::Log,
            other => {
                return Err(Error::Config(format!(
                    "Invalid value for MAIL_BACKEND: {}",
                    other
                )))
            }
        };
        let mail = MailConfig {
            backend: mail_backend,
            api_base_url: vars.optional("MAIL_API_BASE_URL"),
            api_token: vars.optional("MAIL_API_TOKEN").map(Secret::new),
            sender: vars.or("MAIL_SENDER", "no-reply@byn-k.org"),
            timeout: Duration::from_millis(vars.parse_or("MAIL_TIMEOUT_MS", 10_000u64)?),
        };
        if mail.backend == MailBackend::Api
            && (mail.api_base_url.is_none() || mail.api_token.is_none())
        {
            return Err(Error::Config(
                "MAIL_BACKEND=api requires MAIL_API_BASE_URL and MAIL_API_TOKEN".to_string(),
            ));
        }

        let log_format = match vars.or("LOG_FORMAT", "text").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            server_address: vars.required("SERVER_ADDRESS")?,
            storage_backend,
            database_url,
            database_max_connections: vars.parse_or("DATABASE_MAX_CONNECTIONS", 20u32)?,
            jwt_secret: Secret::new(vars.required("JWT_SECRET")?),
            frontend_url: vars
                .or("FRONTEND_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            platform_disclaimer: vars.or("PLATFORM_DISCLAIMER", DEFAULT_DISCLAIMER),
            default_page_size: vars.parse_or("DEFAULT_PAGE_SIZE", 20i64)?.clamp(1, 100),
            mail,
            send_emails_async: vars.parse_or("SEND_EMAILS_ASYNC", true)?,
            notification_queue_capacity: vars
                .parse_or("NOTIFICATION_QUEUE_CAPACITY", 256usize)?
                .max(1),
            digest_cron: vars.or("DIGEST_CRON", "0 0 8 * * *"),
            request_timeout: Duration::from_secs(vars.parse_or("REQUEST_TIMEOUT_SECS", 30u64)?),
            log_format,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| Error::Config(format!("Missing environment variable: {}", name)))
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn memory_backend_needs_no_database_url() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_ADDRESS", "127.0.0.1:0"),
            ("JWT_SECRET", "secret"),
            ("STORAGE_BACKEND", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.mail.backend, MailBackend::Log);
        assert!(config.send_emails_async);
        assert_eq!(config.platform_disclaimer, DEFAULT_DISCLAIMER);
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let result = Config::from_lookup(lookup(&[
            ("SERVER_ADDRESS", "127.0.0.1:0"),
            ("JWT_SECRET", "secret"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn api_mail_backend_requires_credentials() {
        let result = Config::from_lookup(lookup(&[
            ("SERVER_ADDRESS", "127.0.0.1:0"),
            ("JWT_SECRET", "secret"),
            ("STORAGE_BACKEND", "memory"),
            ("MAIL_BACKEND", "api"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn frontend_url_loses_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_ADDRESS", "127.0.0.1:0"),
            ("JWT_SECRET", "secret"),
            ("STORAGE_BACKEND", "memory"),
            ("FRONTEND_URL", "https://byn-k.org/"),
            ("DEFAULT_PAGE_SIZE", "500"),
        ]))
        .unwrap();
        assert_eq!(config.frontend_url, "https://byn-k.org");
        assert_eq!(config.default_page_size, 100);
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let result = Config::from_lookup(lookup(&[
            ("SERVER_ADDRESS", "127.0.0.1:0"),
            ("JWT_SECRET", "secret"),
            ("STORAGE_BACKEND", "memory"),
            ("MAIL_TIMEOUT_MS", "soon"),
        ]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("MAIL_TIMEOUT_MS")));
    }
}
