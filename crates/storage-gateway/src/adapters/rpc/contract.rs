//! Storage contract bytecode and ABI encoding.
//!
//! The contract keeps one `uint256` in storage slot 0 and exposes
//! `get() returns (uint256)` and `set(uint256)`. Unknown selectors revert.

use crate::domain::{Bytes, ChainError, U256};
use ethers::abi::{self, ParamType, Token};
use ethers::utils::id;

/// Creation code: copies the 78-byte runtime that follows it and returns it.
pub const STORAGE_INIT_CODE: &str = concat!(
    "604e80600b6000396000f3",
    "7c0100000000000000000000000000000000000000000000000000000000",
    "600035048063",
    "6d4ce63c",
    "14603a578063",
    "60fe47b1",
    "14604657600080fd",
    "5b60005460005260206000f3",
    "5b60043560005500",
);

/// Decoded creation code.
pub fn init_code() -> Result<Bytes, ChainError> {
    hex::decode(STORAGE_INIT_CODE)
        .map(Bytes::from)
        .map_err(|e| ChainError::Deployment(format!("embedded bytecode is not hex: {}", e)))
}

pub fn encode_get() -> Bytes {
    Bytes::from(id("get()").to_vec())
}

pub fn encode_set(value: U256) -> Bytes {
    let mut data = id("set(uint256)").to_vec();
    data.extend(abi::encode(&[Token::Uint(value)]));
    Bytes::from(data)
}

/// Decode the single `uint256` returned by `get()`.
pub fn decode_word(output: &[u8]) -> Result<U256, ChainError> {
    if output.is_empty() {
        return Err(ChainError::Call(
            "empty return data (is the contract mined?)".into(),
        ));
    }
    abi::decode(&[ParamType::Uint(256)], output)
        .map_err(|e| ChainError::Call(format!("cannot decode get() result: {}", e)))?
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| ChainError::Call("get() returned no uint256".into()))
}
