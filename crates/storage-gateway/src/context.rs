//! Service context: the process-wide deployment shared by all handlers.
//!
//! The live `(Session, Connection)` pair is an immutable [`Deployment`]
//! published through an [`ArcSwapOption`]. Readers take one snapshot per
//! request and never block. Deploys are serialized by an async mutex that
//! readers never touch.

use crate::domain::{
    CallOptions, ChainError, Credential, DeployError, GatewayConfig, Hash, NodeEndpoint, Session,
    TransactOptions,
};
use crate::ports::{ChainConnector, Connection};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Read-only settings captured at startup.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub endpoint: NodeEndpoint,
    pub credential: Credential,
    pub gas_limit: u64,
    pub read_pending: bool,
    pub call_timeout: Duration,
    pub deploy_timeout: Duration,
}

impl From<&GatewayConfig> for ContextSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            endpoint: config.node_endpoint(),
            credential: config.credential.clone(),
            gas_limit: config.contract.gas_limit,
            read_pending: config.contract.read_pending,
            call_timeout: config.timeouts.chain_call,
            deploy_timeout: config.timeouts.deploy,
        }
    }
}

/// A session together with the connection it was deployed through.
pub struct Deployment {
    /// 1 for the first successful deploy, then increasing
    pub generation: u64,
    pub session: Session,
    pub connection: Connection,
    /// Contract-creation transaction
    pub transaction: Hash,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("generation", &self.generation)
            .field("contract", &self.session.contract_address())
            .field("endpoint", self.connection.endpoint())
            .field("transaction", &self.transaction)
            .finish()
    }
}

pub struct ServiceContext {
    settings: ContextSettings,
    connector: Arc<dyn ChainConnector>,
    live: ArcSwapOption<Deployment>,
    deploy_lock: Mutex<()>,
    generation: AtomicU64,
}

impl ServiceContext {
    pub fn new(settings: ContextSettings, connector: Arc<dyn ChainConnector>) -> Self {
        Self {
            settings,
            connector,
            live: ArcSwapOption::empty(),
            deploy_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Deploy a fresh storage contract and install it as the live deployment.
    ///
    /// On failure the previously installed deployment, if any, stays live.
    #[instrument(skip(self), fields(endpoint = %self.settings.endpoint))]
    pub async fn deploy(&self) -> Result<Arc<Deployment>, DeployError> {
        let _guard = self.deploy_lock.lock().await;

        let timeout = self.settings.deploy_timeout;
        let deployment = tokio::time::timeout(timeout, self.build_deployment())
            .await
            .map_err(|_| DeployError::Timeout(timeout))
            .and_then(|result| result)
            .map_err(|e| {
                warn!(stage = e.stage(), error = %e, "Deploy failed, keeping previous deployment");
                e
            })?;

        let deployment = Arc::new(deployment);
        let previous = self.live.swap(Some(deployment.clone()));
        info!(
            generation = deployment.generation,
            contract = ?deployment.session.contract_address(),
            transaction = ?deployment.transaction,
            replaced = ?previous.map(|p| p.generation),
            "Storage contract deployed"
        );
        Ok(deployment)
    }

    async fn build_deployment(&self) -> Result<Deployment, DeployError> {
        let connection = self
            .connector
            .connect(&self.settings.endpoint)
            .await
            .map_err(DeployError::Connection)?;
        let auth = self
            .connector
            .authorize(&self.settings.credential)
            .await
            .map_err(DeployError::Authorization)?;
        let deployed = connection
            .deploy_contract(&auth, self.settings.gas_limit)
            .await
            .map_err(DeployError::Deployment)?;
        let contract = connection
            .bind_contract(deployed.address)
            .map_err(DeployError::HandleResolution)?;

        let session = Session {
            contract,
            call_options: CallOptions {
                pending: self.settings.read_pending,
            },
            transact_options: TransactOptions {
                from: auth.from,
                signer: auth.signer,
                gas_limit: self.settings.gas_limit,
            },
        };

        Ok(Deployment {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            session,
            connection,
            transaction: deployed.transaction,
        })
    }

    /// The live deployment, if any. Hold it for the whole request.
    pub fn snapshot(&self) -> Option<Arc<Deployment>> {
        self.live.load_full()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.snapshot().map(|d| d.session.clone())
    }

    pub fn current_connection(&self) -> Option<Connection> {
        self.snapshot().map(|d| d.connection.clone())
    }

    /// Run a chain call under the per-call timeout.
    pub async fn bounded<F, T>(&self, call: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        let timeout = self.settings.call_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| ChainError::Timeout(timeout))?
    }
}
