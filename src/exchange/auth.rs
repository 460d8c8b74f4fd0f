use crate::error::{ClaimError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Exchange api credentials. Never printed.
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            secret,
            passphrase,
        }
    }

    /// Load from the named environment variables; `None` when any is unset or empty.
    pub fn from_env(key_var: &str, secret_var: &str, passphrase_var: &str) -> Option<Self> {
        let read = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());
        Some(Self::new(read(key_var)?, read(secret_var)?, read(passphrase_var)?))
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Request signing for the v5 REST api.
#[derive(Clone, Debug)]
pub struct HmacAuth {
    credentials: ApiCredentials,
}

impl HmacAuth {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }

    fn timestamp(now: DateTime<Utc>) -> String {
        now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    fn build_message(timestamp: &str, method: &str, path: &str, body: Option<&str>) -> String {
        format!(
            "{timestamp}{}{path}{}",
            method.to_uppercase(),
            body.unwrap_or_default()
        )
    }

    fn sign(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret.as_bytes())
            .map_err(|e| ClaimError::Exchange(format!("HMAC init failed: {e}")))?;
        mac.update(message.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// `path` includes the query string.
    pub fn build_headers(&self, method: &str, path: &str, body: Option<&str>) -> Result<HeaderMap> {
        self.build_headers_at(Utc::now(), method, path, body)
    }

    fn build_headers_at(
        &self,
        now: DateTime<Utc>,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<HeaderMap> {
        let timestamp = Self::timestamp(now);
        let signature = self.sign(&Self::build_message(&timestamp, method, path, body))?;

        let header = |value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| ClaimError::Exchange(format!("invalid header value: {e}")))
        };
        let mut headers = HeaderMap::new();
        headers.insert("OK-ACCESS-KEY", header(&self.credentials.api_key)?);
        headers.insert("OK-ACCESS-SIGN", header(&signature)?);
        headers.insert("OK-ACCESS-TIMESTAMP", header(&timestamp)?);
        headers.insert("OK-ACCESS-PASSPHRASE", header(&self.credentials.passphrase)?);
        Ok(headers)
    }
}
