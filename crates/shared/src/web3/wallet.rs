use std::fmt;
use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
    signers::local::PrivateKeySigner,
    transports::{
        http::{reqwest, Http},
        TransportError,
    },
};
use log::{error, info};
use url::Url;

pub type WalletProvider = DynProvider;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("private key belongs to {derived}, not to the configured account {expected}")]
    AccountMismatch { expected: Address, derived: Address },
    #[error("couldn't connect to the primary and backup Ethereum nodes")]
    Exhausted,
}

/// Errors raised while bringing up a single endpoint. These never leave this
/// module: they are logged and the next endpoint is tried.
#[derive(Debug, thiserror::Error)]
enum EndpointError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("liveness probe failed: {0}")]
    Probe(String),
    #[error("liveness probe timed out after {0:?}")]
    ProbeTimeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Primary,
    Backup,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Primary => write!(f, "primary"),
            NodeRole::Backup => write!(f, "backup"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeEndpoint {
    pub url: Url,
    pub timeout: Duration,
    pub role: NodeRole,
}

impl NodeEndpoint {
    pub fn new(url: Url, timeout: Duration, role: NodeRole) -> Self {
        Self { url, timeout, role }
    }

    /// Host part of the endpoint URL. Userinfo, path and query (which often
    /// carry API keys) are never part of it.
    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or("<unknown host>")
    }
}

/// The account transactions are sent from, together with its key.
#[derive(Clone)]
pub struct SigningIdentity {
    address: Address,
    signer: PrivateKeySigner,
}

impl SigningIdentity {
    pub fn new(eth_from: Address, private_key: &str) -> Result<Self, ConnectionError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| ConnectionError::InvalidPrivateKey(format!("{e}")))?;

        if signer.address() != eth_from {
            return Err(ConnectionError::AccountMismatch {
                expected: eth_from,
                derived: signer.address(),
            });
        }

        Ok(Self {
            address: eth_from,
            signer,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Wallet {
    pub wallet: EthereumWallet,
    pub provider: WalletProvider,
    address: Address,
    role: NodeRole,
}

impl Wallet {
    /// Opens an RPC channel to `endpoint` and attaches the signing identity.
    /// Nothing is sent over the wire until the provider is used.
    pub fn new(endpoint: &NodeEndpoint, identity: &SigningIdentity) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()?;
        let transport = Http::with_client(client, endpoint.url.clone());
        let rpc_client = RpcClient::new(transport, false);

        let wallet = EthereumWallet::from(identity.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet.clone())
            .on_client(rpc_client)
            .erased();

        Ok(Self {
            wallet,
            provider,
            address: identity.address(),
            role: endpoint.role,
        })
    }

    /// Connects to the primary endpoint, falling back to the backup when the
    /// primary cannot be reached. The selected node is kept for the lifetime
    /// of the process.
    pub async fn connect(
        primary: &NodeEndpoint,
        backup: Option<&NodeEndpoint>,
        identity: &SigningIdentity,
        probe_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        match Self::connect_to_node(primary, identity, probe_timeout).await {
            Ok(wallet) => return Ok(wallet),
            Err(e) => error!("Error connecting to {} Ethereum node: {e}", primary.role),
        }

        let Some(backup) = backup else {
            error!("No backup Ethereum node configured");
            return Err(ConnectionError::Exhausted);
        };

        info!("Switching to backup node.");
        match Self::connect_to_node(backup, identity, probe_timeout).await {
            Ok(wallet) => Ok(wallet),
            Err(e) => {
                error!("Error connecting to {} Ethereum node: {e}", backup.role);
                Err(ConnectionError::Exhausted)
            }
        }
    }

    async fn connect_to_node(
        endpoint: &NodeEndpoint,
        identity: &SigningIdentity,
        probe_timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let wallet = Self::new(endpoint, identity)?;

        let block = tokio::time::timeout(probe_timeout, wallet.provider.get_block_number())
            .await
            .map_err(|_| EndpointError::ProbeTimeout(probe_timeout))?
            .map_err(|e| EndpointError::Probe(e.to_string()))?;

        info!(
            "Connected to {} Ethereum node at {} (block {block})",
            endpoint.role,
            endpoint.hostname()
        );
        Ok(wallet)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn provider(&self) -> WalletProvider {
        self.provider.clone()
    }

    pub async fn get_balance(&self) -> Result<U256, TransportError> {
        let balance = self.provider.get_balance(self.address).await?;
        Ok(balance)
    }
}
