use std::time::Duration;

use alloy::providers::Provider;
use alloy::{
    contract::CallBuilder,
    json_abi::Function,
    network::ReceiptResponse,
    primitives::{Address, TxHash},
    rpc::types::TransactionReceipt,
};
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::web3::contracts::core::error::ContractError;
use crate::web3::contracts::helpers::gas::GeometricGasPrice;
use crate::web3::contracts::structs::work_receipt::WorkReceipt;

pub type KeeperCallBuilder<'a, P> = CallBuilder<&'a P, Function>;

/// Upper bound on same-nonce replacements before giving up on a transaction.
const MAX_REPLACEMENTS: u32 = 10;
const MAX_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MIN_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sends `call` from `from`, re-sending it at the same nonce with an
/// escalated tip whenever it is not mined within `strategy.every()`.
///
/// Every hash sent is kept, and whichever of them gets mined first is the
/// result. Once the tip stops growing (it hit its cap) nothing is re-sent;
/// the keeper keeps waiting for what is already in flight.
pub async fn send_with_gas_strategy<P: Provider>(
    mut call: KeeperCallBuilder<'_, P>,
    from: Address,
    strategy: &GeometricGasPrice,
    provider: &P,
) -> Result<WorkReceipt, ContractError> {
    let nonce = provider
        .get_transaction_count(from)
        .pending()
        .await
        .map_err(|err| ContractError::Transaction(format!("failed to fetch nonce: {err}")))?;
    call = call.from(from).nonce(nonce);

    let gas = call
        .estimate_gas()
        .await
        .map_err(|err| ContractError::Reverted(err.to_string()))?;
    call = call.gas(gas);

    let started = Instant::now();
    let mut sent: Vec<TxHash> = Vec::new();
    let mut last_tip: Option<u128> = None;
    let mut attempts = 0;

    while attempts <= MAX_REPLACEMENTS {
        attempts += 1;

        let tip = strategy
            .tip(attempts - 1)
            .max(strategy.tip_after(started.elapsed()));

        if last_tip.is_some_and(|last| tip <= last) {
            debug!("Tip is capped at {tip} wei, waiting for the transaction in flight");
        } else {
            let base_fee_proxy = provider.get_gas_price().await.map_err(|err| {
                ContractError::Transaction(format!("failed to fetch gas price: {err}"))
            })?;
            let max_fee = base_fee_proxy.saturating_mul(2).saturating_add(tip);
            info!("Sending transaction with nonce {nonce}, tip {tip} wei, max fee {max_fee} wei");
            call = call.max_priority_fee_per_gas(tip).max_fee_per_gas(max_fee);

            match call.send().await {
                Ok(pending) => {
                    let tx_hash = *pending.tx_hash();
                    sent.push(tx_hash);
                    last_tip = Some(tip);
                    debug!("Transaction {tx_hash} sent, waiting for confirmation");
                }
                Err(err) => {
                    let message = err.to_string();
                    if is_nonce_consumed(&message) {
                        // One of the earlier attempts made it in between our checks.
                        if let Some(receipt) = find_mined(provider, &sent).await {
                            return interpret_receipt(&receipt);
                        }
                        return Err(ContractError::Transaction(message));
                    }
                    if !message.contains("replacement transaction underpriced") {
                        return Err(ContractError::Transaction(message));
                    }
                    warn!("Replacement transaction underpriced, waiting before the next attempt");
                }
            }
        }

        if let Some(receipt) = wait_for_receipt(provider, &sent, strategy.every()).await {
            return interpret_receipt(&receipt);
        }
        warn!(
            "Transaction with nonce {nonce} not mined within {}s",
            strategy.every().as_secs()
        );
    }

    if let Some(receipt) = find_mined(provider, &sent).await {
        return interpret_receipt(&receipt);
    }
    Err(ContractError::NotMined { attempts })
}

fn is_nonce_consumed(message: &str) -> bool {
    message.contains("nonce too low") || message.contains("already known")
}

/// Polls the receipts of `sent` until one of them is mined or `window`
/// elapses.
async fn wait_for_receipt<P: Provider>(
    provider: &P,
    sent: &[TxHash],
    window: Duration,
) -> Option<TransactionReceipt> {
    let poll_interval = (window / 10).clamp(MIN_RECEIPT_POLL_INTERVAL, MAX_RECEIPT_POLL_INTERVAL);
    let deadline = Instant::now() + window;
    loop {
        if let Some(receipt) = find_mined(provider, sent).await {
            return Some(receipt);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn find_mined<P: Provider>(provider: &P, sent: &[TxHash]) -> Option<TransactionReceipt> {
    for tx_hash in sent.iter().rev() {
        match provider.get_transaction_receipt(*tx_hash).await {
            Ok(Some(receipt)) => return Some(receipt),
            Ok(None) => {}
            Err(err) => warn!("Failed to fetch receipt for {tx_hash}: {err}"),
        }
    }
    None
}

fn interpret_receipt(receipt: &TransactionReceipt) -> Result<WorkReceipt, ContractError> {
    classify_receipt(
        receipt.transaction_hash,
        ReceiptResponse::status(receipt),
        receipt.inner.logs().len(),
        receipt.block_number,
    )
}

/// A successful receipt without a single log is how a job reports that it
/// had nothing to do; it is surfaced as an error so callers can decide.
pub(crate) fn classify_receipt(
    tx_hash: TxHash,
    successful: bool,
    log_count: usize,
    block_number: Option<u64>,
) -> Result<WorkReceipt, ContractError> {
    if successful && log_count == 0 {
        return Err(ContractError::NoLogEntries { tx_hash });
    }
    Ok(WorkReceipt {
        tx_hash,
        successful,
        block_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web3::contracts::core::contract::{Contract, JOB_ABI};
    use crate::web3::contracts::helpers::gas::GWEI;
    use alloy::dyn_abi::DynSolValue;
    use alloy::network::EthereumWallet;
    use alloy::primitives::B256;
    use alloy::providers::{DynProvider, ProviderBuilder};
    use alloy::signers::local::PrivateKeySigner;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // Anvil's first default account.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEEPER: Address = alloy::primitives::address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const JOB: Address = alloy::primitives::address!("0xe717Ec34b2707fc8c226b34be5eae8482d06ED03");

    #[test]
    fn successful_receipt_with_logs_is_returned() {
        let tx_hash = TxHash::repeat_byte(0xaa);
        let receipt = classify_receipt(tx_hash, true, 2, Some(100)).unwrap();
        assert!(receipt.successful);
        assert_eq!(receipt.tx_hash, tx_hash);
        assert_eq!(receipt.block_number, Some(100));
    }

    #[test]
    fn failed_receipt_is_returned_as_unsuccessful() {
        let receipt = classify_receipt(TxHash::ZERO, false, 0, Some(7)).unwrap();
        assert!(!receipt.successful);
    }

    #[test]
    fn successful_receipt_without_logs_is_reported() {
        let tx_hash = TxHash::repeat_byte(0x01);
        let err = classify_receipt(tx_hash, true, 0, Some(1)).unwrap_err();
        assert!(matches!(err, ContractError::NoLogEntries { .. }));
        assert!(err
            .to_string()
            .contains("mined successfully but generated no single log entry"));
    }

    #[test]
    fn detects_consumed_nonce() {
        assert!(is_nonce_consumed("server returned an error response: nonce too low"));
        assert!(is_nonce_consumed("already known"));
        assert!(!is_nonce_consumed("insufficient funds for gas * price + value"));
    }

    /// Scripted behaviour of the fake JSON-RPC node.
    #[derive(Clone, Default)]
    struct Chain {
        /// Error message `eth_estimateGas` answers with.
        estimate_error: Option<&'static str>,
        /// Error message for the n-th `eth_sendRawTransaction`, `None` to
        /// accept it. Sends past the end are accepted.
        send_errors: Vec<Option<&'static str>>,
        /// Receipts become available once this many raw transactions were
        /// submitted (accepted or not).
        mined_after_sends: Option<usize>,
    }

    #[derive(Clone, Default)]
    struct Recorded {
        sends: Arc<AtomicUsize>,
        estimates: Arc<Mutex<Vec<Value>>>,
    }

    fn sent_hash(index: usize) -> TxHash {
        TxHash::repeat_byte(u8::try_from(index + 1).unwrap())
    }

    fn receipt_json(tx_hash: &Value) -> Value {
        json!({
            "type": "0x2",
            "status": "0x1",
            "cumulativeGasUsed": "0x5208",
            "logs": [{
                "address": JOB,
                "topics": [],
                "data": "0x",
                "blockHash": B256::repeat_byte(0x11),
                "blockNumber": "0x10",
                "transactionHash": tx_hash,
                "transactionIndex": "0x0",
                "logIndex": "0x0",
                "removed": false
            }],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": B256::repeat_byte(0x11),
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": KEEPER,
            "to": JOB,
            "contractAddress": null
        })
    }

    fn answer(chain: &Chain, recorded: &Recorded, method: &str, params: &Value) -> Value {
        match method {
            "eth_chainId" => json!({ "result": "0x1" }),
            "eth_getTransactionCount" => json!({ "result": "0x7" }),
            "eth_gasPrice" => json!({ "result": "0x3b9aca00" }),
            "eth_estimateGas" => {
                recorded.estimates.lock().unwrap().push(params.clone());
                match chain.estimate_error {
                    Some(message) => json!({ "error": { "code": 3, "message": message } }),
                    None => json!({ "result": "0x30d40" }),
                }
            }
            "eth_sendRawTransaction" => {
                let index = recorded.sends.fetch_add(1, Ordering::SeqCst);
                match chain.send_errors.get(index).copied().flatten() {
                    Some(message) => json!({ "error": { "code": -32000, "message": message } }),
                    None => json!({ "result": sent_hash(index) }),
                }
            }
            "eth_getTransactionReceipt" => {
                let mined = chain
                    .mined_after_sends
                    .is_some_and(|after| recorded.sends.load(Ordering::SeqCst) >= after);
                if mined {
                    json!({ "result": receipt_json(&params[0]) })
                } else {
                    json!({ "result": null })
                }
            }
            _ => json!({ "result": "0x10" }),
        }
    }

    async fn fake_chain(chain: Chain) -> (mockito::ServerGuard, mockito::Mock, Recorded) {
        let recorded = Recorded::default();
        let handle = recorded.clone();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |request| {
                let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
                let method = body["method"].as_str().unwrap_or_default();
                let mut response = answer(&chain, &handle, method, &body["params"]);
                response["jsonrpc"] = json!("2.0");
                response["id"] = body["id"].clone();
                response.to_string().into()
            })
            .create_async()
            .await;
        (server, mock, recorded)
    }

    fn provider(url: &str) -> DynProvider {
        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(url.parse().unwrap())
            .erased()
    }

    async fn work(
        provider: &DynProvider,
        strategy: &GeometricGasPrice,
    ) -> Result<WorkReceipt, ContractError> {
        let job = Contract::new(JOB, provider.clone(), JOB_ABI).unwrap();
        let call = job
            .instance()
            .function(
                "work",
                &[
                    DynSolValue::FixedBytes(B256::repeat_byte(0x4d), 32),
                    DynSolValue::Bytes(b"ETH-A".to_vec()),
                ],
            )
            .unwrap();
        send_with_gas_strategy(call, KEEPER, strategy, provider).await
    }

    fn strategy(window_ms: u64) -> GeometricGasPrice {
        GeometricGasPrice::new(GWEI, Duration::from_millis(window_ms))
    }

    #[tokio::test]
    async fn first_transaction_mined() {
        let (server, _mock, recorded) = fake_chain(Chain {
            mined_after_sends: Some(1),
            ..Chain::default()
        })
        .await;

        let receipt = work(&provider(&server.url()), &strategy(1_000)).await.unwrap();

        assert!(receipt.successful);
        assert_eq!(receipt.tx_hash, sent_hash(0));
        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(recorded.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gas_is_estimated_from_the_keeper_account() {
        let (server, _mock, recorded) = fake_chain(Chain {
            mined_after_sends: Some(1),
            ..Chain::default()
        })
        .await;

        work(&provider(&server.url()), &strategy(1_000)).await.unwrap();

        let estimates = recorded.estimates.lock().unwrap();
        assert_eq!(estimates.len(), 1);
        let from: Address = estimates[0][0]["from"].as_str().unwrap().parse().unwrap();
        assert_eq!(from, KEEPER);
    }

    #[tokio::test]
    async fn reverted_estimate_is_reported_verbatim() {
        let (server, _mock, recorded) = fake_chain(Chain {
            estimate_error: Some("execution reverted: Vow/insufficient-surplus"),
            ..Chain::default()
        })
        .await;

        let err = work(&provider(&server.url()), &strategy(1_000)).await.unwrap_err();

        assert!(matches!(err, ContractError::Reverted(_)));
        assert!(err.to_string().contains("Vow/insufficient-surplus"));
        assert_eq!(recorded.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unmined_transaction_is_replaced() {
        let (server, _mock, recorded) = fake_chain(Chain {
            mined_after_sends: Some(2),
            ..Chain::default()
        })
        .await;

        let receipt = work(&provider(&server.url()), &strategy(100)).await.unwrap();

        assert_eq!(recorded.sends.load(Ordering::SeqCst), 2);
        assert_eq!(receipt.tx_hash, sent_hash(1));
    }

    #[tokio::test]
    async fn underpriced_replacement_waits_for_the_earlier_transaction() {
        let (server, _mock, recorded) = fake_chain(Chain {
            send_errors: vec![None, Some("replacement transaction underpriced")],
            mined_after_sends: Some(2),
            ..Chain::default()
        })
        .await;

        let receipt = work(&provider(&server.url()), &strategy(100)).await.unwrap();

        assert_eq!(receipt.tx_hash, sent_hash(0));
        assert_eq!(recorded.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn consumed_nonce_recovers_the_earlier_receipt() {
        let (server, _mock, recorded) = fake_chain(Chain {
            send_errors: vec![None, Some("nonce too low")],
            mined_after_sends: Some(2),
            ..Chain::default()
        })
        .await;

        let receipt = work(&provider(&server.url()), &strategy(100)).await.unwrap();

        assert_eq!(receipt.tx_hash, sent_hash(0));
        assert_eq!(recorded.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn capped_tip_is_not_resent() {
        let (server, _mock, recorded) = fake_chain(Chain::default()).await;
        let capped = strategy(20).with_max_tip(Some(GWEI));

        let err = work(&provider(&server.url()), &capped).await.unwrap_err();

        assert!(matches!(err, ContractError::NotMined { attempts } if attempts == MAX_REPLACEMENTS + 1));
        assert_eq!(recorded.sends.load(Ordering::SeqCst), 1);
    }
}
