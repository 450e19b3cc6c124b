use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::executor::{ExecutionEngine, JobSubmitter};
use crate::job_source::JobSource;
use crate::network::NetworkId;
use crate::tip_oracle::TipOracle;

/// Failures tolerated before the keeper stops itself. Reset only by a
/// restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBudget {
    count: u32,
    max: u32,
}

impl ErrorBudget {
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    pub fn record(&mut self, errors: u32) {
        self.count = self.count.saturating_add(errors);
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperState {
    Polling,
    Terminated,
}

pub struct Keeper<J, O, S> {
    job_source: J,
    engine: ExecutionEngine<O, S>,
    network: NetworkId,
    budget: ErrorBudget,
    state: KeeperState,
    lifecycle: CancellationToken,
}

impl<J, O, S> Keeper<J, O, S>
where
    J: JobSource,
    O: TipOracle,
    S: JobSubmitter,
{
    /// `lifecycle` is cancelled once the error budget runs out, which stops
    /// the block driver.
    pub fn new(
        job_source: J,
        engine: ExecutionEngine<O, S>,
        network: NetworkId,
        max_errors: u32,
        lifecycle: CancellationToken,
    ) -> Self {
        Self {
            job_source,
            engine,
            network,
            budget: ErrorBudget::new(max_errors),
            state: KeeperState::Polling,
            lifecycle,
        }
    }

    pub fn budget(&self) -> &ErrorBudget {
        &self.budget
    }

    pub fn state(&self) -> KeeperState {
        self.state
    }

    /// Runs one polling cycle. Takes `&mut self`, so two cycles can never
    /// overlap.
    pub async fn process_block(&mut self, block_number: u64) -> KeeperState {
        if self.state == KeeperState::Terminated {
            return self.state;
        }

        if self.budget.is_exhausted() {
            error!(
                "Number of errors reached max configured ({}/{}), exiting keeper",
                self.budget.count(),
                self.budget.max()
            );
            self.terminate();
            return self.state;
        }

        info!("Checking jobs for network {} at block {block_number}", self.network);
        let candidates = match self.job_source.next_jobs(&self.network).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("{e}");
                self.budget.record(1);
                return self.state;
            }
        };

        for candidate in &candidates {
            info!(
                "canWork: {} | Address: {} | Calldata: {}",
                candidate.eligible, candidate.address, candidate.call_data
            );
            let outcome = self.engine.execute(candidate).await;
            self.budget.record(outcome.error_cost());
        }

        self.state
    }

    fn terminate(&mut self) {
        self.state = KeeperState::Terminated;
        self.lifecycle.cancel();
    }
}
