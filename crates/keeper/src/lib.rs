mod cli;
mod error;
mod executor;
mod job_source;
mod keeper;
mod lifecycle;
mod network;
mod tip_oracle;

pub use cli::Cli;
pub use error::{NetworkIdError, OracleError, QueryError};
pub use executor::{
    is_benign, BenignSignature, ChainSubmitter, ExecutionEngine, ExecutionOutcome, JobSubmitter,
    KNOWN_BENIGN,
};
pub use job_source::{JobCandidate, JobSource};
pub use keeper::{ErrorBudget, Keeper, KeeperState};
pub use lifecycle::Lifecycle;
pub use network::NetworkId;
pub use tip_oracle::{BlocknativeOracle, QuoteSource, TipOracle, TipQuote, FALLBACK_TIP};
