use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use anyhow::{anyhow, Result};

alloy_sol_types::sol! {
    function donateAndClaim(
        uint8 currency,
        uint256 amountToDonate,
        uint256 zroAmount,
        bytes32[] proof,
        address to,
        bytes extraBytes
    ) payable;
    function claimContract() view returns (address);

    function balanceOf(address account) view returns (uint256);
    function transfer(address to, uint256 value) returns (bool);
}

/// Donate contract: `isClaimed(address)`-style lookup, non-zero when claimed.
pub const CLAIMED_SELECTOR: [u8; 4] = [0x7a, 0x69, 0x29, 0x82];
/// Donate contract: donation quote for an allocation, returns three uint256.
pub const DONATION_QUOTE_SELECTOR: [u8; 4] = [0xd6, 0xd7, 0x54, 0xdb];
/// Donate contract: destination gas cost for an endpoint id and amount.
pub const GAS_COST_SELECTOR: [u8; 4] = [0x73, 0x76, 0x0a, 0x89];
/// Remote claim contract: messaging fee quote for the claim message.
pub const SEND_FEE_SELECTOR: [u8; 4] = [0x9b, 0xaa, 0x23, 0xe6];

/// Donation currency discriminator expected by `donateAndClaim` (native).
pub const NATIVE_DONATION: u8 = 2;

pub fn encode_donate_and_claim_call(
    donation: U256,
    allocation: U256,
    proof: Vec<B256>,
    to: Address,
    extra: Bytes,
) -> Bytes {
    let call = donateAndClaimCall {
        currency: NATIVE_DONATION,
        amountToDonate: donation,
        zroAmount: allocation,
        proof,
        to,
        extraBytes: extra,
    };
    Bytes::from(call.abi_encode())
}

pub fn encode_claim_contract_call() -> Bytes {
    Bytes::from(claimContractCall {}.abi_encode())
}

pub fn encode_balance_of_call(account: Address) -> Bytes {
    Bytes::from(balanceOfCall { account }.abi_encode())
}

pub fn encode_transfer_call(to: Address, value: U256) -> Bytes {
    Bytes::from(transferCall { to, value }.abi_encode())
}

pub fn decode_u256(data: &Bytes) -> Result<U256> {
    let value: (U256,) = <(U256,)>::abi_decode(data.as_ref())
        .map_err(|err| anyhow!("expected uint256 result: {err}"))?;
    Ok(value.0)
}

pub fn decode_u256_triple(data: &Bytes) -> Result<(U256, U256, U256)> {
    <(U256, U256, U256)>::abi_decode(data.as_ref())
        .map_err(|err| anyhow!("expected (uint256,uint256,uint256) result: {err}"))
}

pub fn decode_address(data: &Bytes) -> Result<Address> {
    let value: (Address,) = <(Address,)>::abi_decode(data.as_ref())
        .map_err(|err| anyhow!("expected address result: {err}"))?;
    Ok(value.0)
}
