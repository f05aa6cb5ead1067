//! Environment-driven configuration.
//!
//! Every required variable is checked before any is used, so a misconfigured
//! process reports the full list of problems at once instead of failing on
//! the first lookup.

use crate::error::Error;

/// Process configuration for wiring the providers and policies.
#[derive(Debug, Clone)]
pub struct Config {
    pub unsub_secret: String,
    pub gemini_api_key: String,
    pub text_model: String,
    pub image_model: String,
    pub bucket_endpoint: String,
    pub bucket_name: String,
    pub bucket_token: Option<String>,
    pub bucket_public_url: String,
    pub resend_api_key: String,
    pub resend_from_email: String,
    pub app_origin: String,
    pub daily_quota: u32,
}

const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_DAILY_QUOTA: u32 = 5;

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup. Extracted so tests can
    /// exercise validation without mutating process-global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut missing = Vec::new();
        let mut require = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let unsub_secret = require("UNSUB_SECRET");
        let gemini_api_key = require("GEMINI_API_KEY");
        let bucket_endpoint = require("BUCKET_ENDPOINT");
        let bucket_name = require("BUCKET_NAME");
        let bucket_public_url = require("BUCKET_PUBLIC_URL");
        let resend_api_key = require("RESEND_API_KEY");
        let resend_from_email = require("RESEND_FROM_EMAIL");

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Invalid environment: {} required",
                missing.join(", ")
            )));
        }

        let daily_quota = match lookup("DAILY_QUOTA") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("DAILY_QUOTA must be a number, got {raw:?}"))
            })?,
            None => DEFAULT_DAILY_QUOTA,
        };

        Ok(Self {
            unsub_secret,
            gemini_api_key,
            text_model: lookup("TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: lookup("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            bucket_endpoint,
            bucket_name,
            bucket_token: lookup("BUCKET_TOKEN"),
            bucket_public_url,
            resend_api_key,
            resend_from_email,
            app_origin: lookup("APP_ORIGIN").unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_string()),
            daily_quota,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("UNSUB_SECRET", "secret"),
            ("GEMINI_API_KEY", "key"),
            ("BUCKET_ENDPOINT", "https://storage.test"),
            ("BUCKET_NAME", "strips"),
            ("BUCKET_PUBLIC_URL", "https://cdn.test"),
            ("RESEND_API_KEY", "re_key"),
            ("RESEND_FROM_EMAIL", "strips@example.com"),
        ])
    }

    #[test]
    fn test_full_config_with_defaults() {
        let env = full_env();
        let config = Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.app_origin, DEFAULT_APP_ORIGIN);
        assert_eq!(config.daily_quota, 5);
        assert!(config.bucket_token.is_none());
    }

    #[test]
    fn test_missing_variables_all_reported() {
        let mut env = full_env();
        env.remove("UNSUB_SECRET");
        env.remove("RESEND_API_KEY");
        let err = Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("UNSUB_SECRET"));
        assert!(message.contains("RESEND_API_KEY"));
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let mut env = full_env();
        env.insert("GEMINI_API_KEY", "   ");
        let err = Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_bad_quota_rejected() {
        let mut env = full_env();
        env.insert("DAILY_QUOTA", "lots");
        let err = Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("DAILY_QUOTA"));
    }
}
