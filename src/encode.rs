use crate::abi::{CLAIMED_SELECTOR, DONATION_QUOTE_SELECTOR, GAS_COST_SELECTOR, SEND_FEE_SELECTOR};
use alloy_primitives::{Address, Bytes, U256};

/// Options type 3, executor worker, 33-byte lzReceive option.
pub const EXTRA_OPTIONS_HEADER: [u8; 6] = [0x00, 0x03, 0x01, 0x00, 0x21, 0x01];

const WORD: usize = 32;

/// Build the extra-options payload carrying the destination gas cost.
pub fn encode_extra_options(gas_cost: U256) -> Bytes {
    let mut out = Vec::with_capacity(EXTRA_OPTIONS_HEADER.len() + WORD);
    out.extend_from_slice(&EXTRA_OPTIONS_HEADER);
    out.extend_from_slice(&gas_cost.to_be_bytes::<32>());
    Bytes::from(out)
}

pub fn encode_claimed_query(wallet: Address) -> Bytes {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&CLAIMED_SELECTOR);
    push_address(&mut out, wallet);
    Bytes::from(out)
}

pub fn encode_donation_quote(allocation: U256) -> Bytes {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&DONATION_QUOTE_SELECTOR);
    out.extend_from_slice(&allocation.to_be_bytes::<32>());
    Bytes::from(out)
}

pub fn encode_gas_cost_query(endpoint_id: u32, amount: U256) -> Bytes {
    let mut out = Vec::with_capacity(4 + 2 * WORD);
    out.extend_from_slice(&GAS_COST_SELECTOR);
    out.extend_from_slice(&U256::from(endpoint_id).to_be_bytes::<32>());
    out.extend_from_slice(&amount.to_be_bytes::<32>());
    Bytes::from(out)
}

/// Packed `(address, uint256, bytes)` argument block for the send-fee quote.
///
/// Layout: padded wallet, amount, offset word (0x60), length word, the extra
/// options and zero padding up to the next word boundary.
pub fn encode_send_fee_query(wallet: Address, amount: U256, extra: &Bytes) -> Bytes {
    let padding = (WORD - extra.len() % WORD) % WORD;
    let mut out = Vec::with_capacity(4 + 4 * WORD + extra.len() + padding);
    out.extend_from_slice(&SEND_FEE_SELECTOR);
    push_address(&mut out, wallet);
    out.extend_from_slice(&amount.to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(3 * WORD).to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(extra.len()).to_be_bytes::<32>());
    out.extend_from_slice(extra.as_ref());
    out.extend(std::iter::repeat(0u8).take(padding));
    Bytes::from(out)
}

fn push_address(out: &mut Vec<u8>, address: Address) {
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(address.as_slice());
}
