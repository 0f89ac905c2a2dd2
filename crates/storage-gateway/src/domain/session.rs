//! Session: a deployed contract bound to its invocation parameters.

use super::types::Address;
use ethers::signers::LocalWallet;
use std::fmt;

/// Handle to a deployed storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractHandle {
    address: Address,
}

impl ContractHandle {
    /// Bind to a contract address. Only chain connections construct handles.
    pub(crate) fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

/// Read-mode flags for contract calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Read pending state instead of the latest confirmed block
    pub pending: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self { pending: true }
    }
}

/// Parameters for state-changing transactions.
#[derive(Clone)]
pub struct TransactOptions {
    pub from: Address,
    /// Wallet that signs for `from`
    pub signer: LocalWallet,
    pub gas_limit: u64,
}

impl fmt::Debug for TransactOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactOptions")
            .field("from", &self.from)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}

/// Immutable once built; a redeploy replaces it wholesale.
#[derive(Debug, Clone)]
pub struct Session {
    pub contract: ContractHandle,
    pub call_options: CallOptions,
    pub transact_options: TransactOptions,
}

impl Session {
    pub fn contract_address(&self) -> Address {
        self.contract.address()
    }
}
