//! Chain client backed by an Ethereum/Quorum JSON-RPC node.
//!
//! Transport, signing and nonce tracking come from `ethers`: every sender
//! gets a `NonceManagerMiddleware` over a `SignerMiddleware`. The manager
//! hands out nonces from a local counter, so a transaction whose send never
//! resolved must not leave that counter behind. [`NonceReservation`] drops the
//! sender's manager unless the node accepted the transaction, and the next
//! send re-reads the pending count from the node.

use super::contract;
use crate::domain::{
    Address, CallOptions, ChainError, ContractHandle, Credential, Hash, NodeEndpoint,
    TransactOptions, TransactionRecord, TxReceipt, TxSignature, U256,
};
use crate::ports::{Authorization, ChainConnection, ChainConnector, Connection, DeployedContract};
use async_trait::async_trait;
use ethers::middleware::{NonceManagerMiddleware, SignerMiddleware};
use ethers::providers::{Http, JsonRpcClient, Middleware, MiddlewareError, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{BlockNumber, Transaction, TransactionRequest};
use ethers::utils::get_contract_address;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-sender client: nonces from a local counter, signatures from the wallet.
type SigningClient<P> = NonceManagerMiddleware<SignerMiddleware<Provider<P>, LocalWallet>>;

/// Connects to JSON-RPC nodes and unlocks keystore credentials.
pub struct RpcConnector {
    handshake_timeout: Duration,
}

impl RpcConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }

    async fn open(&self, endpoint: &NodeEndpoint) -> Result<Connection, ChainError> {
        match endpoint {
            NodeEndpoint::Http(url) => {
                let provider = Provider::<Http>::try_from(url.as_str())
                    .map_err(|e| ChainError::Connection(format!("invalid url {}: {}", url, e)))?;
                Ok(Arc::new(RpcConnection::open(endpoint.clone(), provider).await?))
            }
            NodeEndpoint::Ipc(path) => {
                let provider = Provider::connect_ipc(path)
                    .await
                    .map_err(|e| ChainError::Connection(format!("{}: {}", endpoint, e)))?;
                Ok(Arc::new(RpcConnection::open(endpoint.clone(), provider).await?))
            }
        }
    }
}

#[async_trait]
impl ChainConnector for RpcConnector {
    async fn connect(&self, endpoint: &NodeEndpoint) -> Result<Connection, ChainError> {
        tokio::time::timeout(self.handshake_timeout, self.open(endpoint))
            .await
            .map_err(|_| {
                ChainError::Connection(format!(
                    "{}: no answer within {:?}",
                    endpoint, self.handshake_timeout
                ))
            })?
    }

    async fn authorize(&self, credential: &Credential) -> Result<Authorization, ChainError> {
        let keystore_json = credential.keystore.clone();
        let password = credential.password.clone();

        let wallet = tokio::task::spawn_blocking(move || decrypt_keystore(&keystore_json, &password))
            .await
            .map_err(|e| ChainError::Authorization(format!("keystore task failed: {}", e)))??;

        let from = wallet.address();
        if let Some(declared) = declared_address(&credential.keystore) {
            if declared != format!("{:x}", from) {
                warn!(%declared, derived = ?from, "Keystore address does not match its key");
            }
        }

        debug!(?from, "Credential unlocked");
        Ok(Authorization {
            from,
            signer: wallet,
        })
    }
}

/// The wallet loader reads keystores from disk, so the JSON is staged in a
/// private temporary file first.
fn decrypt_keystore(keystore_json: &str, password: &str) -> Result<LocalWallet, ChainError> {
    let mut staged = tempfile::NamedTempFile::new()
        .map_err(|e| ChainError::Authorization(format!("cannot stage keystore: {}", e)))?;
    staged
        .write_all(keystore_json.as_bytes())
        .map_err(|e| ChainError::Authorization(format!("cannot stage keystore: {}", e)))?;
    LocalWallet::decrypt_keystore(staged.path(), password)
        .map_err(|e| ChainError::Authorization(e.to_string()))
}

fn declared_address(keystore_json: &str) -> Option<String> {
    let document: serde_json::Value = serde_json::from_str(keystore_json).ok()?;
    let address = document.get("address")?.as_str()?;
    Some(address.trim_start_matches("0x").to_ascii_lowercase())
}

/// Live JSON-RPC connection.
pub struct RpcConnection<P: JsonRpcClient> {
    endpoint: NodeEndpoint,
    provider: Provider<P>,
    chain_id: u64,
    clients: Mutex<HashMap<Address, Arc<SigningClient<P>>>>,
}

impl<P: JsonRpcClient + Clone + 'static> RpcConnection<P> {
    /// Complete the handshake: the chain id signs every transaction.
    pub async fn open(endpoint: NodeEndpoint, provider: Provider<P>) -> Result<Self, ChainError> {
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ChainError::Connection(format!("{}: {}", endpoint, e)))?;
        if chain_id > U256::from(u64::MAX) {
            return Err(ChainError::Connection(format!(
                "chain id {} out of range",
                chain_id
            )));
        }
        let chain_id = chain_id.low_u64();

        info!(%endpoint, chain_id, "Connected to chain node");
        Ok(Self {
            endpoint,
            provider,
            chain_id,
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn reserve(&self, signer: &LocalWallet) -> NonceReservation<'_, P> {
        let from = signer.address();
        let client = self
            .clients
            .lock()
            .entry(from)
            .or_insert_with(|| {
                let wallet = signer.clone().with_chain_id(self.chain_id);
                Arc::new(NonceManagerMiddleware::new(
                    SignerMiddleware::new(self.provider.clone(), wallet),
                    from,
                ))
            })
            .clone();
        NonceReservation {
            clients: &self.clients,
            from,
            client,
            committed: false,
        }
    }

    /// Sign and send `request`, returning the node's hash and the nonce used.
    async fn submit(
        &self,
        signer: &LocalWallet,
        request: TransactionRequest,
        wrap: fn(String) -> ChainError,
    ) -> Result<(Hash, U256), ChainError> {
        let reservation = self.reserve(signer);
        let client = reservation.client.clone();

        let mut tx: TypedTransaction = request.into();
        client
            .fill_transaction(&mut tx, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| node_error(e, wrap))?;
        let nonce = tx
            .nonce()
            .copied()
            .ok_or_else(|| wrap("nonce was not assigned".into()))?;

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| node_error(e, wrap))?;
        let hash = *pending;
        reservation.commit();
        Ok((hash, nonce))
    }
}

/// Holds a sender's nonce manager while one of its nonces is in flight.
///
/// Dropped uncommitted (send failed, timed out or the caller went away), it
/// evicts the manager so the skipped nonce is handed out again.
struct NonceReservation<'a, P: JsonRpcClient> {
    clients: &'a Mutex<HashMap<Address, Arc<SigningClient<P>>>>,
    from: Address,
    client: Arc<SigningClient<P>>,
    committed: bool,
}

impl<P: JsonRpcClient> NonceReservation<'_, P> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl<P: JsonRpcClient> Drop for NonceReservation<'_, P> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut clients = self.clients.lock();
        // a concurrent failure may already have replaced it
        if clients
            .get(&self.from)
            .map_or(false, |held| Arc::ptr_eq(held, &self.client))
        {
            clients.remove(&self.from);
            debug!(from = ?self.from, "Nonce reservation released");
        }
    }
}

/// Keep the node's JSON-RPC error object when there is one.
fn node_error<E: MiddlewareError>(err: E, wrap: fn(String) -> ChainError) -> ChainError {
    match err.as_error_response() {
        Some(rpc) => ChainError::Rpc {
            code: rpc.code,
            message: rpc.message.clone(),
        },
        None => wrap(err.to_string()),
    }
}

#[async_trait]
impl<P: JsonRpcClient + Clone + 'static> ChainConnection for RpcConnection<P> {
    fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    async fn deploy_contract(
        &self,
        auth: &Authorization,
        gas_limit: u64,
    ) -> Result<DeployedContract, ChainError> {
        let request = TransactionRequest::new()
            .from(auth.from)
            .data(contract::init_code()?);

        let estimate: TypedTransaction = request.clone().into();
        match self.provider.estimate_gas(&estimate, None).await {
            Ok(gas) if gas > U256::from(gas_limit) => {
                return Err(ChainError::Deployment(format!(
                    "estimated gas {} exceeds limit {}",
                    gas, gas_limit
                )));
            }
            Ok(gas) => debug!(%gas, "Deployment gas estimate"),
            Err(e) => warn!(error = %e, "Gas estimation failed, using configured limit"),
        }

        let (transaction, nonce) = self
            .submit(&auth.signer, request.gas(gas_limit), ChainError::Deployment)
            .await?;
        let address = get_contract_address(auth.from, nonce);
        info!(?address, ?transaction, %nonce, "Submitted contract creation");
        Ok(DeployedContract {
            address,
            transaction,
        })
    }

    fn bind_contract(&self, address: Address) -> Result<ContractHandle, ChainError> {
        if address.is_zero() {
            return Err(ChainError::Binding("zero address".into()));
        }
        Ok(ContractHandle::new(address))
    }

    async fn call(
        &self,
        contract: &ContractHandle,
        options: &CallOptions,
    ) -> Result<U256, ChainError> {
        let block = if options.pending {
            BlockNumber::Pending
        } else {
            BlockNumber::Latest
        };
        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract.address())
            .data(contract::encode_get())
            .into();
        let output = self
            .provider
            .call(&tx, Some(block.into()))
            .await
            .map_err(|e| node_error(e, ChainError::Call))?;
        contract::decode_word(&output)
    }

    async fn transact(
        &self,
        contract: &ContractHandle,
        options: &TransactOptions,
        value: U256,
    ) -> Result<TxReceipt, ChainError> {
        let request = TransactionRequest::new()
            .from(options.from)
            .to(contract.address())
            .data(contract::encode_set(value))
            .gas(options.gas_limit);
        let (hash, nonce) = self
            .submit(&options.signer, request, ChainError::Transact)
            .await?;
        debug!(?hash, %nonce, "Submitted set transaction");
        Ok(TxReceipt { hash })
    }

    async fn fetch_transaction(&self, hash: Hash) -> Result<TransactionRecord, ChainError> {
        self.provider
            .get_transaction(hash)
            .await
            .map_err(|e| node_error(e, ChainError::Transport))?
            .map(TransactionRecord::from)
            .ok_or(ChainError::NotFound(hash))
    }
}

impl From<Transaction> for TransactionRecord {
    fn from(tx: Transaction) -> Self {
        TransactionRecord {
            hash: tx.hash,
            nonce: tx.nonce,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            gas_price: tx.gas_price.unwrap_or_default(),
            gas: tx.gas,
            input: tx.input,
            block_number: tx.block_number.map(|n| U256::from(n.as_u64())),
            signature: Some(TxSignature {
                v: U256::from(tx.v.as_u64()),
                r: tx.r,
                s: tx.s,
            }),
        }
    }
}
