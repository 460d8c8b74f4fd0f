use alloy_primitives::{address, Address, Bytes, B256, U256};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TOKEN: Address = address!("6985884c4392d348587b19cb9eaaf157f13271cd");
pub const DEFAULT_FEE_ORACLE: Address = address!("d6b6a6701303b5ea36fa0edf7389b562d8f894db");

pub const TOKEN_DECIMALS: u32 = 18;
pub const NATIVE_DECIMALS: u32 = 18;
pub const STABLE_DECIMALS: u32 = 6;

/// Lifecycle of a wallet in the store. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Success,
    WithoutAllocation,
    AlreadyClaimed,
    Error,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::WithoutAllocation => "without_allocation",
            Self::AlreadyClaimed => "already_claimed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "without_allocation" => Ok(Self::WithoutAllocation),
            "already_claimed" => Ok(Self::AlreadyClaimed),
            "error" => Ok(Self::Error),
            other => anyhow::bail!("unknown claim status {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub wallet_address: Address,
    pub deposit_address: Address,
    pub allocation_amount: U256,
    pub claimed: bool,
    pub claim_status: ClaimStatus,
}

impl WalletRecord {
    pub fn pending(wallet_address: Address, deposit_address: Address) -> Self {
        Self {
            wallet_address,
            deposit_address,
            allocation_amount: U256::ZERO,
            claimed: false,
            claim_status: ClaimStatus::Pending,
        }
    }
}

/// Allocation plus merkle path as served by the allocation api.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimProof {
    pub allocation_amount: U256,
    pub proof_entries: Vec<B256>,
}

/// Everything the claim call needs from the fee oracle for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeQuote {
    pub messaging_fee: U256,
    pub donation_required: U256,
    pub extra_payload: Bytes,
}

impl FeeQuote {
    pub fn call_value(&self) -> U256 {
        self.donation_required + self.messaging_fee
    }
}

pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim()).map_err(|err| anyhow!("invalid address {value}: {err}"))
}

pub fn parse_u256(value: &str) -> Result<U256> {
    U256::from_str(value).map_err(|err| anyhow!("invalid uint256 {value}: {err}"))
}

/// Left-pad a hex proof node to 32 bytes.
pub fn parse_proof_entry(value: &str) -> Result<B256> {
    let trimmed = value.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if raw.len() > 64 {
        anyhow::bail!("proof entry {value} is longer than 32 bytes");
    }
    let padded = format!("{raw:0>64}");
    let bytes = hex::decode(&padded).map_err(|err| anyhow!("invalid proof entry {value}: {err}"))?;
    Ok(B256::from_slice(&bytes))
}

pub fn format_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a human-readable decimal token amount into base units.
///
/// Enforces that fractional digits do not exceed the token decimals.
pub fn parse_decimal_amount(amount: &str, decimals: u32) -> Result<U256> {
    let trimmed = amount.trim();
    let mut parts = trimmed.split('.');
    let whole_part = parts.next().unwrap_or("0");
    let fraction_part = parts.next();
    if parts.next().is_some() {
        anyhow::bail!("invalid amount {amount}");
    }

    let whole = if whole_part.is_empty() {
        U256::ZERO
    } else {
        parse_u256(whole_part)?
    };
    let base = pow10(decimals)?;
    let mut value = whole
        .checked_mul(base)
        .ok_or_else(|| anyhow!("amount overflow"))?;

    if let Some(fraction_part) = fraction_part {
        if fraction_part.len() > decimals as usize {
            anyhow::bail!("amount has too many decimal places (max {decimals})");
        }
        if !fraction_part.is_empty() {
            let fraction = parse_u256(fraction_part)?;
            let scale = pow10(decimals - fraction_part.len() as u32)?;
            value += fraction * scale;
        }
    }

    Ok(value)
}

/// Compute 10^exp with overflow protection.
pub fn pow10(exp: u32) -> Result<U256> {
    let mut value = U256::from(1u64);
    for _ in 0..exp {
        value = value
            .checked_mul(U256::from(10u64))
            .ok_or_else(|| anyhow!("amount overflow"))?;
    }
    Ok(value)
}

/// Format a token value with the given decimals.
pub fn format_units(value: U256, decimals: u32) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let mut digits = value.to_string();
    if digits.len() <= decimals as usize {
        let zeros = "0".repeat(decimals as usize + 1 - digits.len());
        digits = format!("{zeros}{digits}");
    }
    let split = digits.len() - decimals as usize;
    let mut out = format!("{}.{}", &digits[..split], &digits[split..]);
    while out.ends_with('0') {
        out.pop();
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_entries_are_left_padded() {
        let entry = parse_proof_entry("0xabc").unwrap();
        assert_eq!(
            format!("{entry:#x}"),
            "0x0000000000000000000000000000000000000000000000000000000000000abc"
        );
        let full = "0x1111111111111111111111111111111111111111111111111111111111111111";
        assert_eq!(format!("{:#x}", parse_proof_entry(full).unwrap()), full);
        assert!(parse_proof_entry(&format!("{full}00")).is_err());
    }

    #[test]
    fn decimal_amounts_round_trip_through_units() {
        let value = parse_decimal_amount("123.45", 18).unwrap();
        assert_eq!(value, U256::from(123_450_000_000_000_000_000u128));
        assert_eq!(format_units(value, 18), "123.45");
        assert_eq!(parse_decimal_amount("0", 18).unwrap(), U256::ZERO);
        assert!(parse_decimal_amount("1.0000001", 6).is_err());
        assert!(parse_decimal_amount("1.2.3", 6).is_err());
    }

    #[test]
    fn format_units_handles_small_values() {
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::from(1_000_000u64), 6), "1");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn claim_status_parses_its_own_names() {
        for status in [
            ClaimStatus::Pending,
            ClaimStatus::Success,
            ClaimStatus::WithoutAllocation,
            ClaimStatus::AlreadyClaimed,
            ClaimStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
        assert!(!ClaimStatus::Pending.is_terminal());
        assert!(ClaimStatus::Error.is_terminal());
    }
}
