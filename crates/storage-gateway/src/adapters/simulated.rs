//! In-process chain used by tests, the demo driver and `--simulated`.
//!
//! Transactions are signed for real so hashes and contract addresses follow
//! the same rules as on a node. Storage writes are visible to pending reads
//! immediately and to confirmed reads once the transaction is mined.

use super::rpc::contract;
use crate::domain::{
    Address, Bytes, CallOptions, ChainError, ContractHandle, Credential, Hash, NodeEndpoint,
    TransactOptions, TransactionRecord, TxReceipt, TxSignature, U256,
};
use crate::ports::{Authorization, ChainConnection, ChainConnector, Connection, DeployedContract};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::TransactionRequest;
use ethers::utils::{get_contract_address, keccak256};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Chain id reported by the simulated node.
pub const SIMULATED_CHAIN_ID: u64 = 1337;

/// Chain client entry points, for counters and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Connect,
    Authorize,
    Deploy,
    Bind,
    Call,
    Transact,
    Fetch,
}

impl Stage {
    const ALL: [Stage; 7] = [
        Stage::Connect,
        Stage::Authorize,
        Stage::Deploy,
        Stage::Bind,
        Stage::Call,
        Stage::Transact,
        Stage::Fetch,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn error(self, message: String) -> ChainError {
        match self {
            Stage::Connect => ChainError::Connection(message),
            Stage::Authorize => ChainError::Authorization(message),
            Stage::Deploy => ChainError::Deployment(message),
            Stage::Bind => ChainError::Binding(message),
            Stage::Call => ChainError::Call(message),
            Stage::Transact => ChainError::Transact(message),
            Stage::Fetch => ChainError::Rpc {
                code: -32000,
                message,
            },
        }
    }
}

#[derive(Debug)]
struct SimTransaction {
    record: TransactionRecord,
    /// Storage write applied when the transaction is mined
    effect: Option<(Address, U256)>,
    /// Fetches left before the transaction is mined
    fetches_until_mined: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    block: u64,
    nonces: HashMap<Address, U256>,
    contracts: HashSet<Address>,
    storage: HashMap<Address, U256>,
    transactions: HashMap<Hash, SimTransaction>,
    /// Unmined transactions in submission order
    pending: Vec<Hash>,
}

impl Ledger {
    fn next_nonce(&mut self, from: Address) -> U256 {
        let slot = self.nonces.entry(from).or_insert_with(U256::zero);
        let nonce = *slot;
        *slot = nonce + U256::one();
        nonce
    }

    fn mine(&mut self, hash: &Hash) {
        let Some(tx) = self.transactions.get_mut(hash) else {
            return;
        };
        if tx.record.block_number.is_some() {
            return;
        }
        self.block += 1;
        tx.record.block_number = Some(U256::from(self.block));
        if let Some((contract, value)) = tx.effect {
            self.storage.insert(contract, value);
        }
        self.pending.retain(|h| h != hash);
    }

    fn read(&self, contract: &Address, pending: bool) -> U256 {
        let mut value = self.storage.get(contract).copied().unwrap_or_default();
        if pending {
            for hash in &self.pending {
                if let Some(SimTransaction {
                    effect: Some((target, v)),
                    ..
                }) = self.transactions.get(hash)
                {
                    if target == contract {
                        value = *v;
                    }
                }
            }
        }
        value
    }
}

struct ChainState {
    calls: [AtomicU64; 7],
    failures: Mutex<HashMap<Stage, String>>,
    latency: Mutex<Duration>,
    confirm_after: AtomicU64,
    ledger: Mutex<Ledger>,
}

/// Simulated chain node. Clones share the same ledger.
#[derive(Clone)]
pub struct SimulatedChain {
    state: Arc<ChainState>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ChainState {
                calls: Default::default(),
                failures: Mutex::new(HashMap::new()),
                latency: Mutex::new(Duration::ZERO),
                confirm_after: AtomicU64::new(0),
                ledger: Mutex::new(Ledger::default()),
            }),
        }
    }

    /// Make every call at `stage` fail with `message` until cleared.
    pub fn fail(&self, stage: Stage, message: impl Into<String>) {
        self.state.failures.lock().insert(stage, message.into());
    }

    pub fn clear_failure(&self, stage: Stage) {
        self.state.failures.lock().remove(&stage);
    }

    /// Delay applied to every async chain call.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = latency;
    }

    /// Number of fetches a new transaction stays pending for (0 = mined at once).
    pub fn set_confirm_after(&self, fetches: u64) {
        self.state.confirm_after.store(fetches, Ordering::SeqCst);
    }

    /// Calls made at `stage`, failed ones included.
    pub fn calls(&self, stage: Stage) -> u64 {
        self.state.calls[stage.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u64 {
        Stage::ALL.iter().map(|s| self.calls(*s)).sum()
    }

    /// Count the call, wait out the configured latency, then apply any injected failure.
    async fn enter(&self, stage: Stage) -> Result<(), ChainError> {
        self.state.calls[stage.index()].fetch_add(1, Ordering::SeqCst);
        let latency = *self.state.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check(stage)
    }

    fn check(&self, stage: Stage) -> Result<(), ChainError> {
        match self.state.failures.lock().get(&stage) {
            Some(message) => Err(stage.error(message.clone())),
            None => Ok(()),
        }
    }

    fn submit(
        &self,
        signer: &LocalWallet,
        to: Option<Address>,
        data: Bytes,
        gas_limit: u64,
        effect: impl FnOnce(U256) -> Option<(Address, U256)>,
    ) -> Result<(Hash, U256), ChainError> {
        let from = signer.address();
        let mut ledger = self.state.ledger.lock();
        let nonce = ledger.next_nonce(from);

        let mut request = TransactionRequest::new()
            .from(from)
            .nonce(nonce)
            .gas(gas_limit)
            .gas_price(0u64)
            .value(0u64)
            .data(data.clone())
            .chain_id(SIMULATED_CHAIN_ID);
        if let Some(to) = to {
            request = request.to(to);
        }
        let tx = TypedTransaction::Legacy(request);
        let signature = signer
            .clone()
            .with_chain_id(SIMULATED_CHAIN_ID)
            .sign_transaction_sync(&tx)
            .map_err(|e| ChainError::Transact(format!("signing failed: {}", e)))?;
        let hash = tx.hash(&signature);

        let record = TransactionRecord {
            hash,
            nonce,
            from,
            to,
            value: U256::zero(),
            gas_price: U256::zero(),
            gas: U256::from(gas_limit),
            input: data,
            block_number: None,
            signature: Some(TxSignature {
                v: U256::from(signature.v),
                r: signature.r,
                s: signature.s,
            }),
        };
        ledger.transactions.insert(
            hash,
            SimTransaction {
                record,
                effect: effect(nonce),
                fetches_until_mined: self.state.confirm_after.load(Ordering::SeqCst),
            },
        );
        ledger.pending.push(hash);
        if self.state.confirm_after.load(Ordering::SeqCst) == 0 {
            ledger.mine(&hash);
        }
        Ok((hash, nonce))
    }
}

#[async_trait]
impl ChainConnector for SimulatedChain {
    async fn connect(&self, endpoint: &NodeEndpoint) -> Result<Connection, ChainError> {
        self.enter(Stage::Connect).await?;
        debug!(%endpoint, "Connected to simulated chain");
        Ok(Arc::new(SimulatedConnection {
            chain: self.clone(),
            endpoint: endpoint.clone(),
        }))
    }

    async fn authorize(&self, credential: &Credential) -> Result<Authorization, ChainError> {
        self.enter(Stage::Authorize).await?;
        // Deterministic account per credential; no key derivation cost.
        let seed = keccak256(
            [credential.keystore.as_bytes(), credential.password.as_bytes()].concat(),
        );
        let signer = LocalWallet::from_bytes(&seed)
            .map_err(|e| ChainError::Authorization(e.to_string()))?;
        Ok(Authorization {
            from: signer.address(),
            signer,
        })
    }
}

/// Connection handed out by [`SimulatedChain`].
pub struct SimulatedConnection {
    chain: SimulatedChain,
    endpoint: NodeEndpoint,
}

#[async_trait]
impl ChainConnection for SimulatedConnection {
    fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    async fn deploy_contract(
        &self,
        auth: &Authorization,
        gas_limit: u64,
    ) -> Result<DeployedContract, ChainError> {
        self.chain.enter(Stage::Deploy).await?;
        let init_code = contract::init_code()?;
        let (transaction, nonce) =
            self.chain
                .submit(&auth.signer, None, init_code, gas_limit, |_| None)?;
        let address = get_contract_address(auth.from, nonce);
        self.chain.state.ledger.lock().contracts.insert(address);
        Ok(DeployedContract {
            address,
            transaction,
        })
    }

    fn bind_contract(&self, address: Address) -> Result<ContractHandle, ChainError> {
        self.chain.state.calls[Stage::Bind.index()].fetch_add(1, Ordering::SeqCst);
        self.chain.check(Stage::Bind)?;
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
        self.chain.enter(Stage::Call).await?;
        let ledger = self.chain.state.ledger.lock();
        if !ledger.contracts.contains(&contract.address()) {
            return Err(ChainError::Call("no contract code at address".into()));
        }
        Ok(ledger.read(&contract.address(), options.pending))
    }

    async fn transact(
        &self,
        contract: &ContractHandle,
        options: &TransactOptions,
        value: U256,
    ) -> Result<TxReceipt, ChainError> {
        self.chain.enter(Stage::Transact).await?;
        let target = contract.address();
        if !self.chain.state.ledger.lock().contracts.contains(&target) {
            return Err(ChainError::Transact("no contract code at address".into()));
        }
        let data = contract::encode_set(value);
        let (hash, _) = self.chain.submit(
            &options.signer,
            Some(target),
            data,
            options.gas_limit,
            |_| Some((target, value)),
        )?;
        Ok(TxReceipt { hash })
    }

    async fn fetch_transaction(&self, hash: Hash) -> Result<TransactionRecord, ChainError> {
        self.chain.enter(Stage::Fetch).await?;
        let mut ledger = self.chain.state.ledger.lock();
        let ready = match ledger.transactions.get_mut(&hash) {
            None => return Err(ChainError::NotFound(hash)),
            Some(tx) if tx.fetches_until_mined > 0 => {
                tx.fetches_until_mined -= 1;
                false
            }
            Some(_) => true,
        };
        if ready {
            ledger.mine(&hash);
        }
        ledger
            .transactions
            .get(&hash)
            .map(|tx| tx.record.clone())
            .ok_or(ChainError::NotFound(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> NodeEndpoint {
        NodeEndpoint::Http("http://localhost:22001".into())
    }

    async fn deployed(chain: &SimulatedChain) -> (Connection, ContractHandle, TransactOptions) {
        let conn = chain.connect(&endpoint()).await.unwrap();
        let auth = chain.authorize(&Credential::default()).await.unwrap();
        let contract = conn.deploy_contract(&auth, 10_000_000).await.unwrap();
        let handle = conn.bind_contract(contract.address).unwrap();
        let options = TransactOptions {
            from: auth.from,
            signer: auth.signer,
            gas_limit: 10_000_000,
        };
        (conn, handle, options)
    }

    #[tokio::test]
    async fn test_fresh_contract_reads_zero() {
        let chain = SimulatedChain::new();
        let (conn, handle, _) = deployed(&chain).await;
        let value = conn.call(&handle, &CallOptions::default()).await.unwrap();
        assert_eq!(value, U256::zero());
        assert_eq!(chain.calls(Stage::Deploy), 1);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let chain = SimulatedChain::new();
        let (conn, handle, options) = deployed(&chain).await;
        conn.transact(&handle, &options, U256::from(100u64))
            .await
            .unwrap();
        let value = conn
            .call(&handle, &CallOptions { pending: false })
            .await
            .unwrap();
        assert_eq!(value, U256::from(100u64));
    }

    #[tokio::test]
    async fn test_same_value_distinct_hashes() {
        let chain = SimulatedChain::new();
        let (conn, handle, options) = deployed(&chain).await;
        let a = conn.transact(&handle, &options, U256::one()).await.unwrap();
        let b = conn.transact(&handle, &options, U256::one()).await.unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[tokio::test]
    async fn test_pending_until_fetched() {
        let chain = SimulatedChain::new();
        let (conn, handle, options) = deployed(&chain).await;
        chain.set_confirm_after(2);

        let receipt = conn
            .transact(&handle, &options, U256::from(5u64))
            .await
            .unwrap();

        // Pending state sees the write, confirmed state does not yet.
        assert_eq!(
            conn.call(&handle, &CallOptions { pending: true }).await.unwrap(),
            U256::from(5u64)
        );
        assert_eq!(
            conn.call(&handle, &CallOptions { pending: false }).await.unwrap(),
            U256::zero()
        );

        assert!(conn.fetch_transaction(receipt.hash).await.unwrap().is_pending());
        assert!(conn.fetch_transaction(receipt.hash).await.unwrap().is_pending());
        assert!(!conn.fetch_transaction(receipt.hash).await.unwrap().is_pending());
        assert_eq!(
            conn.call(&handle, &CallOptions { pending: false }).await.unwrap(),
            U256::from(5u64)
        );
    }

    #[tokio::test]
    async fn test_unknown_hash_not_found() {
        let chain = SimulatedChain::new();
        let conn = chain.connect(&endpoint()).await.unwrap();
        let hash = Hash::repeat_byte(9);
        assert!(matches!(
            conn.fetch_transaction(hash).await,
            Err(ChainError::NotFound(h)) if h == hash
        ));
    }

    #[tokio::test]
    async fn test_failure_injection_and_counters() {
        let chain = SimulatedChain::new();
        chain.fail(Stage::Connect, "connection refused");
        assert!(matches!(
            chain.connect(&endpoint()).await,
            Err(ChainError::Connection(_))
        ));
        assert_eq!(chain.calls(Stage::Connect), 1);

        chain.clear_failure(Stage::Connect);
        assert!(chain.connect(&endpoint()).await.is_ok());
        assert_eq!(chain.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_records_carry_eip155_signature() {
        let chain = SimulatedChain::new();
        let (conn, handle, options) = deployed(&chain).await;
        let receipt = conn
            .transact(&handle, &options, U256::from(3u64))
            .await
            .unwrap();
        let record = conn.fetch_transaction(receipt.hash).await.unwrap();
        assert_eq!(record.from, options.from);
        assert_eq!(record.input, contract::encode_set(U256::from(3u64)));
        let v = record.signature.unwrap().v.as_u64();
        assert!(v == SIMULATED_CHAIN_ID * 2 + 35 || v == SIMULATED_CHAIN_ID * 2 + 36);
    }

    #[tokio::test]
    async fn test_deploy_address_follows_sender_nonce() {
        let chain = SimulatedChain::new();
        let conn = chain.connect(&endpoint()).await.unwrap();
        let auth = chain.authorize(&Credential::default()).await.unwrap();
        let first = conn.deploy_contract(&auth, 1_000_000).await.unwrap();
        let second = conn.deploy_contract(&auth, 1_000_000).await.unwrap();
        assert_eq!(first.address, get_contract_address(auth.from, 0u64));
        assert_eq!(second.address, get_contract_address(auth.from, 1u64));
    }
}
