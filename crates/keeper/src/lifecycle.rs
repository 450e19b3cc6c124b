use std::time::Duration;

use alloy::providers::Provider;
use alloy::rpc::types::SyncStatus;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::executor::JobSubmitter;
use crate::job_source::JobSource;
use crate::keeper::{Keeper, KeeperState};
use crate::tip_oracle::TipOracle;

/// Drives a [`Keeper`] once per new block until `cancellation_token` is
/// cancelled, either by a signal or by the keeper itself.
pub struct Lifecycle<P> {
    provider: P,
    cancellation_token: CancellationToken,
    poll_interval: Duration,
}

impl<P: Provider> Lifecycle<P> {
    pub fn new(provider: P, cancellation_token: CancellationToken, poll_interval: Duration) -> Self {
        Self {
            provider,
            cancellation_token,
            poll_interval,
        }
    }

    /// Stops future block notifications.
    pub fn terminate(&self) {
        self.cancellation_token.cancel();
    }

    /// Blocks until the node reports it is not syncing. Returns `false` if the
    /// lifecycle was terminated while waiting.
    pub async fn wait_for_sync(&self) -> bool {
        loop {
            match self.provider.syncing().await {
                Ok(SyncStatus::None) => return true,
                Ok(SyncStatus::Info(info)) => {
                    info!(
                        "Node is syncing (current block {}, highest block {}), waiting",
                        info.current_block, info.highest_block
                    );
                }
                Err(e) => warn!("Failed to query node sync status: {e}"),
            }

            tokio::select! {
                _ = self.cancellation_token.cancelled() => return false,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Calls `keeper.process_block` for every new block. Each call is awaited
    /// before the next block is read, and blocks that arrive meanwhile
    /// collapse into the latest one. Nothing is processed while the node
    /// reports it is syncing.
    pub async fn on_block<J, O, S>(&self, keeper: &mut Keeper<J, O, S>) -> KeeperState
    where
        J: JobSource,
        O: TipOracle,
        S: JobSubmitter,
    {
        let mut last_block: Option<u64> = None;

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("Keeper is stopping due to cancellation signal");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    match self.provider.syncing().await {
                        Ok(SyncStatus::None) => {}
                        Ok(SyncStatus::Info(info)) => {
                            info!(
                                "Node is syncing (current block {}, highest block {}), skipping",
                                info.current_block, info.highest_block
                            );
                            continue;
                        }
                        Err(e) => {
                            error!("Node is not responding: {e}");
                            continue;
                        }
                    }
                    let block_number = match self.provider.get_block_number().await {
                        Ok(block_number) => block_number,
                        Err(e) => {
                            error!("Node is not responding: {e}");
                            continue;
                        }
                    };
                    if last_block.is_some_and(|last| block_number <= last) {
                        continue;
                    }
                    last_block = Some(block_number);
                    info!("Node is connected, current block number: {block_number}");

                    if keeper.process_block(block_number).await == KeeperState::Terminated {
                        break;
                    }
                }
            }
        }

        keeper.state()
    }
}
