//! Outbound ports to the chain client.

use crate::domain::{
    Address, CallOptions, ChainError, ContractHandle, Credential, Hash, NodeEndpoint,
    TransactOptions, TransactionRecord, TxReceipt, U256,
};
use async_trait::async_trait;
use ethers::signers::LocalWallet;
use std::fmt;
use std::sync::Arc;

/// Shared, thread-safe handle to a live chain connection.
pub type Connection = Arc<dyn ChainConnection>;

/// Sender identity plus the capability to sign for it.
#[derive(Clone)]
pub struct Authorization {
    pub from: Address,
    pub signer: LocalWallet,
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Result of submitting the contract-creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: Address,
    pub transaction: Hash,
}

/// Opens connections and turns credential material into an [`Authorization`].
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Connect to the node at `endpoint`
    async fn connect(&self, endpoint: &NodeEndpoint) -> Result<Connection, ChainError>;

    /// Unlock the credential for signing
    async fn authorize(&self, credential: &Credential) -> Result<Authorization, ChainError>;
}

/// A live connection to a chain node.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Endpoint this connection talks to
    fn endpoint(&self) -> &NodeEndpoint;

    /// Submit the storage contract creation transaction
    async fn deploy_contract(
        &self,
        auth: &Authorization,
        gas_limit: u64,
    ) -> Result<DeployedContract, ChainError>;

    /// Bind a handle to an already deployed contract
    fn bind_contract(&self, address: Address) -> Result<ContractHandle, ChainError>;

    /// Read-only `get()` call
    async fn call(
        &self,
        contract: &ContractHandle,
        options: &CallOptions,
    ) -> Result<U256, ChainError>;

    /// State-changing `set(value)` transaction
    async fn transact(
        &self,
        contract: &ContractHandle,
        options: &TransactOptions,
        value: U256,
    ) -> Result<TxReceipt, ChainError>;

    /// Look up a transaction by hash
    async fn fetch_transaction(&self, hash: Hash) -> Result<TransactionRecord, ChainError>;
}
