use crate::error::{ClaimError, Result};
use crate::types::{parse_decimal_amount, parse_proof_entry, parse_u256, ClaimProof, TOKEN_DECIMALS};
use crate::workflow::AllocationSource;
use alloy_primitives::{Address, U256};
use anyhow::Context;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
];

/// A proxy normalized to URL form.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCandidate {
    url: String,
}

impl ProxyCandidate {
    /// Accepts `scheme://…`, `user:pass@host:port`, `host:port:user:pass`
    /// and `host:port`. Bare forms default to http.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            anyhow::bail!("empty proxy line");
        }
        let url = if raw.contains("://") {
            raw.to_string()
        } else if raw.contains('@') {
            format!("http://{raw}")
        } else {
            match raw.split(':').collect::<Vec<_>>().as_slice() {
                [host, port] => format!("http://{host}:{port}"),
                [host, port, user, pass] => format!("http://{user}:{pass}@{host}:{port}"),
                _ => anyhow::bail!("unrecognized proxy format {raw}"),
            }
        };
        url::Url::parse(&url).with_context(|| format!("invalid proxy {raw}"))?;
        Ok(Self { url })
    }

    pub fn as_url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // credentials stay out of logs
        let host = url::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "ProxyCandidate({host})")
    }
}

/// Read one proxy per non-empty line. A missing file means no proxies.
pub fn load_proxies(path: &Path) -> anyhow::Result<Vec<ProxyCandidate>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read proxies file {}", path.display()))?;
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ProxyCandidate::parse)
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocationResponse {
    zro_allocation: Option<AllocationValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocationValue {
    as_string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProofResponse {
    amount: String,
    proof: String,
}

/// Allocation api client with per-call proxy failover.
pub struct HttpAllocationSource {
    base_url: String,
    proxies: Vec<ProxyCandidate>,
    timeout: Duration,
}

impl HttpAllocationSource {
    pub fn new(base_url: &str, proxies: Vec<ProxyCandidate>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            proxies,
            timeout,
        }
    }

    /// Try each candidate in order; an empty list means a direct connection.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        candidates: &[ProxyCandidate],
    ) -> Result<T> {
        if candidates.is_empty() {
            return self.fetch_once(url, None).await;
        }
        let mut last_error = None;
        for candidate in candidates {
            match self.fetch_once(url, Some(candidate)).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(proxy = ?candidate, error = %err, "proxy attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ClaimError::Allocation("no proxy candidates".into())))
    }

    async fn fetch_once<T: DeserializeOwned>(
        &self,
        url: &str,
        proxy: Option<&ProxyCandidate>,
    ) -> Result<T> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(user_agent);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_url()).map_err(allocation_error)?);
        }
        let client = builder.build().map_err(allocation_error)?;
        let response = client
            .get(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::REFERER, url)
            .send()
            .await
            .map_err(allocation_error)?
            .error_for_status()
            .map_err(allocation_error)?;
        response.json::<T>().await.map_err(allocation_error)
    }

    fn shuffled(&self) -> Vec<ProxyCandidate> {
        let mut candidates = self.proxies.clone();
        candidates.shuffle(&mut rand::thread_rng());
        candidates
    }
}

fn allocation_error(err: reqwest::Error) -> ClaimError {
    // reqwest errors may echo the proxy url
    ClaimError::Allocation(err.without_url().to_string())
}

fn parse_allocation(response: AllocationResponse) -> Result<Option<U256>> {
    let Some(raw) = response.zro_allocation.and_then(|value| value.as_string) else {
        return Ok(None);
    };
    parse_decimal_amount(&raw, TOKEN_DECIMALS)
        .map(Some)
        .map_err(|err| ClaimError::Allocation(err.to_string()))
}

fn parse_proof(response: ProofResponse) -> Result<ClaimProof> {
    let allocation_amount =
        parse_u256(response.amount.trim()).map_err(|err| ClaimError::Allocation(err.to_string()))?;
    let proof_entries = response
        .proof
        .split('|')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_proof_entry)
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(|err| ClaimError::Allocation(err.to_string()))?;
    Ok(ClaimProof {
        allocation_amount,
        proof_entries,
    })
}

#[async_trait]
impl AllocationSource for HttpAllocationSource {
    async fn allocation(&self, wallet: Address) -> Result<Option<U256>> {
        let url = format!("{}/allocation/{wallet}", self.base_url);
        let response: AllocationResponse = self.fetch_json(&url, &self.shuffled()).await?;
        let allocation = parse_allocation(response)?;
        if allocation.is_none() {
            warn!(%wallet, "allocation response carried no amount");
        }
        Ok(allocation)
    }

    async fn proof(&self, wallet: Address) -> Result<ClaimProof> {
        let url = format!("{}/proof/{wallet}", self.base_url);
        let response: ProofResponse = self.fetch_json(&url, &self.shuffled()).await?;
        parse_proof(response)
    }
}
