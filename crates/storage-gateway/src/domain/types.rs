//! Core chain types shared by the service context, operations and adapters.
//!
//! Hashes, addresses and quantities follow Ethereum JSON-RPC conventions:
//! `0x`-prefixed hex on the wire.

use std::fmt;

pub use ethers::types::{Address, Bytes, H256 as Hash, U256};

/// Parse a 32-byte transaction hash from user input.
///
/// Accepts an optional `0x` prefix. Unlike a lenient hex-to-hash conversion,
/// anything that is not exactly 64 hex digits is rejected.
pub fn parse_hash(input: &str) -> Option<Hash> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 64 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(Hash::from_slice(&bytes))
}

/// Parse an unsigned 256-bit decimal integer from user input.
pub fn parse_decimal_u256(input: &str) -> Option<U256> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_dec_str(digits).ok()
}

/// Result of submitting a state-changing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// Hash of the submitted transaction
    pub hash: Hash,
}

/// Signature components of a transaction as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

/// A transaction as fetched from the chain. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: Hash,
    pub nonce: U256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: U256,
    pub gas: U256,
    pub input: Bytes,
    /// Block the transaction was included in; `None` while pending
    pub block_number: Option<U256>,
    pub signature: Option<TxSignature>,
}

impl TransactionRecord {
    /// A transaction is pending until it is included in a block.
    pub fn is_pending(&self) -> bool {
        self.block_number.is_none()
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TX({:x})", self.hash)?;
        writeln!(f, "Contract: {}", self.to.is_none())?;
        writeln!(f, "From:     {:?}", self.from)?;
        match self.to {
            Some(to) => writeln!(f, "To:       {:?}", to)?,
            None => writeln!(f, "To:       [contract creation]")?,
        }
        writeln!(f, "Nonce:    {}", self.nonce)?;
        writeln!(f, "GasPrice: {:#x}", self.gas_price)?;
        writeln!(f, "GasLimit  {:#x}", self.gas)?;
        writeln!(f, "Value:    {:#x}", self.value)?;
        write!(f, "Data:     {}", self.input)?;
        if let Some(sig) = &self.signature {
            write!(f, "\nV:        {:#x}", sig.v)?;
            write!(f, "\nR:        {:#x}", sig.r)?;
            write!(f, "\nS:        {:#x}", sig.s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hash_accepts_prefixed_and_bare() {
        let hex = "378674bebd1430d9ce63adc792c573da56e69b8d6c97174c93a43c5991ae0d61";
        let prefixed = parse_hash(&format!("0x{}", hex)).unwrap();
        let bare = parse_hash(hex).unwrap();
        assert_eq!(prefixed, bare);
        assert_eq!(format!("{:x}", prefixed), hex);
    }

    #[test]
    fn test_parse_hash_rejects_wrong_length() {
        assert!(parse_hash("0x1234").is_none());
        assert!(parse_hash("").is_none());
        assert!(parse_hash(&"zz".repeat(32)).is_none());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal_u256("100"), Some(U256::from(100u64)));
        assert_eq!(parse_decimal_u256(" 7 "), Some(U256::from(7u64)));
        assert_eq!(parse_decimal_u256("0"), Some(U256::zero()));
        assert!(parse_decimal_u256("12abc").is_none());
        assert!(parse_decimal_u256("-5").is_none());
        assert!(parse_decimal_u256("").is_none());
        assert!(parse_decimal_u256("0x10").is_none());
    }

    #[test]
    fn test_parse_decimal_rejects_overflow() {
        let too_big = format!("{}0", U256::MAX);
        assert!(parse_decimal_u256(&too_big).is_none());
        assert_eq!(parse_decimal_u256(&U256::MAX.to_string()), Some(U256::MAX));
    }

    #[test]
    fn test_record_rendering() {
        let record = TransactionRecord {
            hash: Hash::repeat_byte(0xab),
            nonce: U256::from(3u64),
            from: Address::repeat_byte(0x11),
            to: None,
            value: U256::zero(),
            gas_price: U256::zero(),
            gas: U256::from(21_000u64),
            input: Bytes::from(vec![0x01]),
            block_number: Some(U256::from(9u64)),
            signature: None,
        };
        assert!(!record.is_pending());
        let rendered = record.to_string();
        assert!(rendered.starts_with("TX(abab"));
        assert!(rendered.contains("Contract: true"));
        assert!(rendered.contains("Nonce:    3"));
        assert!(rendered.contains("GasPrice: 0x0"));
        assert!(rendered.contains("GasLimit  0x5208"));
        assert!(rendered.contains("Value:    0x0"));
        assert!(rendered.contains("Data:     0x01"));
        assert!(!rendered.contains("V:"));
    }
}
