use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde::Deserialize;
use shared::web3::contracts::helpers::gas::GWEI;

use crate::error::OracleError;

const BLOCKNATIVE_URL: &str = "https://api.blocknative.com/gasprices/blockprices";
const ORACLE_TIMEOUT: Duration = Duration::from_secs(15);
/// 1.5 gwei, used whenever the oracle cannot be consulted.
pub const FALLBACK_TIP: u128 = 1_500_000_000;

/// Position of the 80%-confidence entry in `estimatedPrices`.
const CONFIDENCE_80_INDEX: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSource {
    Oracle,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipQuote {
    pub wei_per_gas: u128,
    pub source: QuoteSource,
}

impl TipQuote {
    pub fn fallback() -> Self {
        Self {
            wei_per_gas: FALLBACK_TIP,
            source: QuoteSource::Fallback,
        }
    }
}

/// Source of the initial priority fee for a job transaction. Implementations
/// must not fail: a quote is always produced.
#[async_trait]
pub trait TipOracle: Send + Sync {
    async fn initial_tip(&self) -> TipQuote;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockPricesResponse {
    #[serde(default)]
    block_prices: Vec<BlockPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockPrice {
    #[serde(default)]
    estimated_prices: Vec<EstimatedPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimatedPrice {
    max_priority_fee_per_gas: Option<f64>,
}

pub struct BlocknativeOracle {
    client: Client,
    url: String,
    api_key: String,
}

impl BlocknativeOracle {
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_url(BLOCKNATIVE_URL, api_key)
    }

    pub fn with_url(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(ORACLE_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    async fn fetch_tip(&self) -> Result<u128, OracleError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status));
        }

        let body = response.bytes().await?;
        let prices: BlockPricesResponse = serde_json::from_slice(&body)?;
        let estimate = confidence_80_tip(&prices)?;
        info!("Using Blocknative 80% confidence tip {estimate}");

        gwei_to_wei(estimate)
    }
}

fn confidence_80_tip(prices: &BlockPricesResponse) -> Result<f64, OracleError> {
    prices
        .block_prices
        .first()
        .ok_or(OracleError::MissingField("blockPrices[0]"))?
        .estimated_prices
        .get(CONFIDENCE_80_INDEX)
        .ok_or(OracleError::MissingField("blockPrices[0].estimatedPrices[3]"))?
        .max_priority_fee_per_gas
        .ok_or(OracleError::MissingField(
            "blockPrices[0].estimatedPrices[3].maxPriorityFeePerGas",
        ))
}

fn gwei_to_wei(estimate: f64) -> Result<u128, OracleError> {
    if !estimate.is_finite() || estimate < 0.0 {
        return Err(OracleError::InvalidEstimate(estimate));
    }
    Ok((estimate * GWEI as f64).floor() as u128)
}

#[async_trait]
impl TipOracle for BlocknativeOracle {
    async fn initial_tip(&self) -> TipQuote {
        match self.fetch_tip().await {
            Ok(wei_per_gas) => TipQuote {
                wei_per_gas,
                source: QuoteSource::Oracle,
            },
            Err(e) => {
                error!("Failed to fetch Blocknative tip, using fallback of {FALLBACK_TIP} wei: {e}");
                TipQuote::fallback()
            }
        }
    }
}
