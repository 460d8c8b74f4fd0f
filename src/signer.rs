use crate::error::ClaimError;
use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// Signing secret of one wallet, held in memory for a single workflow run.
#[derive(Clone)]
pub struct SignerContext {
    signer: PrivateKeySigner,
}

impl SignerContext {
    pub fn from_key(key: &str) -> std::result::Result<Self, ClaimError> {
        let trimmed = key.trim();
        let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if raw.len() != 64 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ClaimError::Signer(
                "private key must be 32 bytes of hex".to_string(),
            ));
        }
        let signer: PrivateKeySigner = raw
            .parse()
            .map_err(|err| ClaimError::Signer(format!("invalid private key: {err}")))?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub(crate) fn inner(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for SignerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerContext")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Read one private key per non-empty line.
pub fn load_keys(path: &Path) -> Result<Vec<SignerContext>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read keys file {}", path.display()))?;
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            SignerContext::from_key(line).map_err(|err| anyhow!("line {}: {err}", index + 1))
        })
        .collect()
}
