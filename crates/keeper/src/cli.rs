use std::time::Duration;

use alloy::primitives::{utils::format_ether, Address};
use anyhow::Context;
use clap::Parser;
use log::{error, info};
use shared::web3::contracts::constants::addresses::{AUTOLINE_SEQUENCER_ADDRESS, SEQUENCER_ADDRESS};
use shared::web3::contracts::helpers::gas::GWEI;
use shared::web3::contracts::implementations::sequencer_contract::SequencerContract;
use shared::web3::wallet::{NodeEndpoint, NodeRole, SigningIdentity, Wallet};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::executor::{ChainSubmitter, ExecutionEngine};
use crate::keeper::{Keeper, KeeperState};
use crate::lifecycle::Lifecycle;
use crate::network::NetworkId;
use crate::tip_oracle::BlocknativeOracle;

#[derive(Parser)]
#[command(name = "keeper", about = "Works jobs exposed by an on-chain job sequencer")]
pub struct Cli {
    /// Primary Ethereum node URL
    #[arg(long, alias = "rpc-url")]
    pub primary_eth_rpc_url: Url,

    /// Request timeout for the primary node, in seconds
    #[arg(long, default_value = "60")]
    pub primary_eth_rpc_timeout: u64,

    /// Optional: backup Ethereum node URL, used when the primary is unreachable
    #[arg(long, default_value = None)]
    pub backup_eth_rpc_url: Option<Url>,

    /// Request timeout for the backup node, in seconds
    #[arg(long, default_value = "60")]
    pub backup_eth_rpc_timeout: u64,

    /// Timeout of the startup liveness probe, in seconds
    #[arg(long, default_value = "10")]
    pub rpc_timeout: u64,

    /// Keeper account
    #[arg(long)]
    pub eth_from: Address,

    /// Private key of the keeper account
    #[arg(long, env = "ETH_PRIVATE_KEY", hide_env_values = true)]
    pub eth_private_key: String,

    /// Optional: job sequencer contract. Defaults to the autoline sequencer
    /// when --autoline-address is set, to the generic job sequencer otherwise
    #[arg(long, default_value = None)]
    pub sequencer_address: Option<Address>,

    /// Optional: only work jobs at this address (autoline)
    #[arg(long, default_value = None)]
    pub autoline_address: Option<Address>,

    /// Failures tolerated before the keeper exits
    #[arg(long, default_value = "100")]
    pub max_errors: u32,

    /// Keeper network identifier
    #[arg(long)]
    pub network_id: NetworkId,

    /// Blocknative gas price API key
    #[arg(long, env = "BLOCKNATIVE_API_KEY", hide_env_values = true)]
    pub blocknative_api_key: String,

    /// Seconds between block number polls
    #[arg(long, default_value = "2")]
    pub block_poll_interval: u64,

    /// Optional: cap on the escalated tip, in gwei
    #[arg(long, default_value = None)]
    pub max_tip_gwei: Option<u64>,

    /// Log level
    #[arg(short = 'l', long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Sequencer to poll: the explicit `--sequencer-address`, or the
    /// well-known sequencer of the configured job family.
    pub fn sequencer(&self) -> Address {
        match (self.sequencer_address, self.autoline_address) {
            (Some(address), _) => address,
            (None, Some(_)) => AUTOLINE_SEQUENCER_ADDRESS,
            (None, None) => SEQUENCER_ADDRESS,
        }
    }

    /// Connects, waits for the node to sync and keeps working jobs until the
    /// error budget runs out or `cancellation_token` is cancelled.
    pub async fn run(self, cancellation_token: CancellationToken) -> anyhow::Result<KeeperState> {
        let sequencer_address = self.sequencer();
        let identity = SigningIdentity::new(self.eth_from, &self.eth_private_key)
            .context("invalid keeper account")?;

        let primary = NodeEndpoint::new(
            self.primary_eth_rpc_url,
            Duration::from_secs(self.primary_eth_rpc_timeout),
            NodeRole::Primary,
        );
        let backup = self.backup_eth_rpc_url.map(|url| {
            NodeEndpoint::new(
                url,
                Duration::from_secs(self.backup_eth_rpc_timeout),
                NodeRole::Backup,
            )
        });

        let wallet = Wallet::connect(
            &primary,
            backup.as_ref(),
            &identity,
            Duration::from_secs(self.rpc_timeout),
        )
        .await
        .inspect_err(|e| error!("{e}"))?;

        match wallet.get_balance().await {
            Ok(balance) => info!(
                "Keeper account {} has a balance of {} ETH",
                wallet.address(),
                format_ether(balance)
            ),
            Err(e) => error!("Failed to get balance of {}: {e}", wallet.address()),
        }

        let sequencer = SequencerContract::new(sequencer_address, wallet.provider())
            .context("failed to load sequencer contract")?;
        let oracle = BlocknativeOracle::new(self.blocknative_api_key)
            .context("failed to build gas price oracle client")?;
        let submitter = ChainSubmitter::new(wallet.provider(), wallet.address());

        let max_tip = self
            .max_tip_gwei
            .map(|gwei| u128::from(gwei).saturating_mul(GWEI));
        let engine = ExecutionEngine::new(self.network_id, oracle, submitter)
            .with_expected_target(self.autoline_address)
            .with_max_tip(max_tip);

        if let Some(target) = self.autoline_address {
            info!("Only working jobs at {target}");
        }
        info!(
            "Polling sequencer {sequencer_address} for network {}",
            self.network_id
        );

        let mut keeper = Keeper::new(
            sequencer,
            engine,
            self.network_id,
            self.max_errors,
            cancellation_token.clone(),
        );
        let lifecycle = Lifecycle::new(
            wallet.provider(),
            cancellation_token,
            Duration::from_secs(self.block_poll_interval),
        );

        if !lifecycle.wait_for_sync().await {
            return Ok(keeper.state());
        }

        Ok(lifecycle.on_block(&mut keeper).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    /// Parses the required flags plus `extra`, where an `extra` flag replaces
    /// the required one of the same name.
    fn parse(extra: &[(&'static str, &'static str)]) -> Result<Cli, clap::Error> {
        let mut flags = vec![
            ("--primary-eth-rpc-url", "http://localhost:8545"),
            ("--eth-from", ACCOUNT),
            ("--eth-private-key", KEY),
            ("--network-id", "MAINNET"),
            ("--blocknative-api-key", "bn-key"),
        ];
        for &(flag, value) in extra {
            match flags.iter_mut().find(|(f, _)| *f == flag) {
                Some(existing) => existing.1 = value,
                None => flags.push((flag, value)),
            }
        }
        let args = flags.into_iter().flat_map(|(flag, value)| [flag, value]);
        Cli::try_parse_from(std::iter::once("keeper").chain(args))
    }

    #[test]
    fn applies_defaults() {
        let cli = parse(&[]).unwrap();

        assert_eq!(cli.primary_eth_rpc_timeout, 60);
        assert_eq!(cli.backup_eth_rpc_url, None);
        assert_eq!(cli.backup_eth_rpc_timeout, 60);
        assert_eq!(cli.rpc_timeout, 10);
        assert_eq!(cli.sequencer_address, None);
        assert_eq!(cli.sequencer(), SEQUENCER_ADDRESS);
        assert_eq!(cli.autoline_address, None);
        assert_eq!(cli.max_errors, 100);
        assert_eq!(cli.block_poll_interval, 2);
        assert_eq!(cli.max_tip_gwei, None);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.network_id, "MAINNET".parse().unwrap());
    }

    #[test]
    fn accepts_rpc_url_alias_and_backup() {
        let cli = Cli::try_parse_from([
            "keeper",
            "--rpc-url",
            "http://primary:8545",
            "--backup-eth-rpc-url",
            "http://backup:8545",
            "--eth-from",
            ACCOUNT,
            "--eth-private-key",
            KEY,
            "--network-id",
            "MAINNET",
            "--blocknative-api-key",
            "bn-key",
            "--autoline-address",
            "0xc7bdd1f2b16447dcf3de045c4a039a60ec2f0ba3",
            "--max-tip-gwei",
            "50",
        ])
        .unwrap();

        assert_eq!(cli.primary_eth_rpc_url.as_str(), "http://primary:8545/");
        assert_eq!(
            cli.backup_eth_rpc_url.map(|u| u.to_string()),
            Some("http://backup:8545/".to_string())
        );
        assert_eq!(
            cli.autoline_address,
            Some(address!("0xc7bdd1f2b16447dcf3de045c4a039a60ec2f0ba3"))
        );
        assert_eq!(cli.max_tip_gwei, Some(50));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse(&[("--network-id", "a-network-identifier-well-over-32-bytes")]).is_err());
        assert!(parse(&[("--max-errors", "lots")]).is_err());
        assert!(parse(&[("--autoline-address", "not-an-address")]).is_err());
        assert!(parse(&[("--eth-from", "0x1234")]).is_err());
    }

    #[test]
    fn missing_required_flag_is_an_error() {
        assert!(Cli::try_parse_from(["keeper", "--network-id", "MAINNET"]).is_err());
    }

    #[test]
    fn autoline_defaults_to_autoline_sequencer() {
        let cli = parse(&[(
            "--autoline-address",
            "0xc7bdd1f2b16447dcf3de045c4a039a60ec2f0ba3",
        )])
        .unwrap();
        assert_eq!(cli.sequencer(), AUTOLINE_SEQUENCER_ADDRESS);
    }

    #[test]
    fn explicit_sequencer_wins() {
        let custom = address!("0x1111111111111111111111111111111111111111");
        let cli = parse(&[
            ("--autoline-address", "0xc7bdd1f2b16447dcf3de045c4a039a60ec2f0ba3"),
            ("--sequencer-address", "0x1111111111111111111111111111111111111111"),
        ])
        .unwrap();
        assert_eq!(cli.sequencer(), custom);
    }
}
