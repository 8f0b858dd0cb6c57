//! JSON-RPC backed [`ForwarderChain`].
//!
//! - **Reads**: chain id (resolved once), forwarder `getNonce`.
//! - **Execute**: one `execute(request, signature)` transaction from the relayer wallet,
//!   followed by a bounded receipt wait.
//!
//! Invariants:
//! - Transactions from the relayer account are serialized from nonce allocation through
//!   broadcast. The lock is released before waiting for the receipt.
//! - A broadcast transaction is never resubmitted. Only the nonce-correction retry below
//!   sends a second time, and only after the node refused the first attempt.

use alloy::hex;
use alloy::network::{
    Ethereum as AlloyEthereum, EthereumWallet, ReceiptResponse, TransactionBuilder,
};
use alloy::primitives::{Address, U256};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{
    Identity, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
    RootProvider, WatchTxError,
};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use alloy::transports::layers::RetryBackoffLayer;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{Instrument, instrument};

use crate::chain::nonce::{PendingNonceManager, parse_expected_nonce_from_error};
use crate::chain::{ExecuteCall, ExecutionReceipt, ForwarderChain, RelayError};
use crate::config::TransactionConfig;
use crate::forwarder::MinimalForwarder;
use crate::network::KnownNetwork;

/// Combined filler type for gas, blob gas, nonce, and chain ID.
type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// The composed provider: fillers, the relayer wallet, and a [`RootProvider`] for JSON-RPC.
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Relayer bound to one forwarder deployment through one RPC endpoint.
#[derive(Debug)]
pub struct EvmForwarder {
    inner: InnerProvider,
    forwarder: Address,
    relayer: Address,
    /// Resolved from the RPC on first use, never from clients.
    chain_id: OnceCell<u64>,
    expected_chain_id: Option<u64>,
    /// Held from nonce allocation through broadcast.
    submission_lock: Mutex<()>,
    nonce_manager: PendingNonceManager,
    receipt_timeout: Duration,
    confirmations: u64,
    legacy_gas_price: bool,
}

impl EvmForwarder {
    /// Builds the provider stack without touching the network.
    ///
    /// Connection failures surface later, from [`probe`](Self::probe) or the first relay.
    pub fn try_new(
        signer: PrivateKeySigner,
        rpc_url: url::Url,
        forwarder: Address,
        config: &TransactionConfig,
        expected_chain_id: Option<u64>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let relayer = signer.address();

        tracing::debug!(
            rpc_timeout_secs = config.rpc_timeout_seconds,
            connection_timeout_secs = config.connection_timeout_seconds,
            pool_max_idle = config.pool_max_idle_per_host,
            pool_idle_timeout_secs = config.pool_idle_timeout_seconds,
            "Configuring RPC client"
        );
        let http_client = alloy::transports::http::reqwest::Client::builder()
            .connect_timeout(config.connection_timeout())
            .timeout(config.rpc_timeout())
            .pool_idle_timeout(config.pool_idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| -> Box<dyn std::error::Error> {
                format!("failed to build HTTP client for {rpc_url}: {e}").into()
            })?;
        let transport = alloy::transports::http::Http::with_client(http_client, rpc_url.clone());

        // Retries cover rate-limited responses only, never a broadcast.
        let mut client = if config.rpc_max_retries > 0 {
            RpcClient::builder()
                .layer(RetryBackoffLayer::new(
                    config.rpc_max_retries,
                    config.rpc_initial_backoff_ms,
                    config.rpc_compute_units_per_second,
                ))
                .transport(transport, false)
        } else {
            RpcClient::new(transport, false)
        };

        if let Some(poll_ms) = config.poll_interval_ms {
            tracing::info!(poll_interval_ms = poll_ms, "Overriding receipt poll interval");
            client = client.with_poll_interval(Duration::from_millis(poll_ms));
        }

        let nonce_manager = PendingNonceManager::default();
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        let inner = ProviderBuilder::default()
            .filler(filler)
            .wallet(EthereumWallet::from(signer))
            .connect_client(client);

        tracing::info!(rpc = %rpc_url, %forwarder, %relayer, "Initialized forwarder provider");

        Ok(Self {
            inner,
            forwarder,
            relayer,
            chain_id: OnceCell::new(),
            expected_chain_id,
            submission_lock: Mutex::new(()),
            nonce_manager,
            receipt_timeout: config.receipt_timeout(),
            confirmations: config.confirmations,
            legacy_gas_price: config.legacy_gas_price,
        })
    }

    /// Resolves the chain id and reports the relayer balance.
    ///
    /// Meant to run in the background at startup; failures are logged, never fatal.
    pub async fn probe(&self) {
        match self.chain_id().await {
            Ok(chain_id) => {
                let network = KnownNetwork::from_chain_id(chain_id)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown network".to_string());
                tracing::info!(chain_id, %network, forwarder = %self.forwarder, "Connected to chain");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve chain id, relays will fail until the RPC recovers");
                return;
            }
        }
        match self.inner.get_balance(self.relayer).await {
            Ok(balance) if balance.is_zero() => {
                tracing::warn!(relayer = %self.relayer, "Relayer account has no balance to pay gas");
            }
            Ok(balance) => {
                tracing::info!(relayer = %self.relayer, %balance, "Relayer balance");
            }
            Err(e) => {
                tracing::warn!(relayer = %self.relayer, error = %e, "Failed to fetch relayer balance");
            }
        }
    }

    fn check_expected_chain_id(&self, actual: u64) -> Result<u64, RelayError> {
        match self.expected_chain_id {
            Some(expected) if expected != actual => {
                Err(RelayError::ChainIdMismatch { expected, actual })
            }
            _ => Ok(actual),
        }
    }

    /// Broadcasts the `execute` transaction. Must be called with the submission lock held.
    async fn submit(
        &self,
        call: &ExecuteCall,
    ) -> Result<PendingTransactionBuilder<AlloyEthereum>, RelayError> {
        let calldata = MinimalForwarder::executeCall {
            req: call.request.clone(),
            signature: call.signature.clone(),
        }
        .abi_encode();

        // No ether is attached: `request.value` is paid from the forwarder's own balance.
        let mut txr = TransactionRequest::default()
            .with_to(self.forwarder)
            .with_from(self.relayer)
            .with_input(calldata)
            .with_gas_limit(call.gas_limit);
        if self.legacy_gas_price {
            let gas_price: u128 = self
                .inner
                .get_gas_price()
                .instrument(tracing::info_span!("get_gas_price"))
                .await
                .map_err(|e| categorize_transport_error(e, "get_gas_price"))?;
            txr.set_gas_price(gas_price);
        }

        const MAX_NONCE_RETRIES: u32 = 1;
        let mut nonce_retry_count = 0;
        loop {
            match self.inner.send_transaction(txr.clone()).await {
                Ok(pending) => return Ok(pending),
                Err(e) => {
                    let error_str = format!("{e:?}");
                    let is_nonce_error = error_str.contains("nonce too low")
                        || error_str.contains("nonce too high");

                    if is_nonce_error && nonce_retry_count < MAX_NONCE_RETRIES {
                        if let Some(expected_nonce) = parse_expected_nonce_from_error(&error_str) {
                            tracing::warn!(
                                relayer = %self.relayer,
                                expected_nonce,
                                "Relayer nonce mismatch, correcting and retrying"
                            );
                            self.nonce_manager
                                .set_next_nonce(self.relayer, expected_nonce)
                                .await;
                            nonce_retry_count += 1;
                            continue;
                        }
                    }

                    self.nonce_manager.reset_nonce(self.relayer).await;
                    return Err(categorize_transport_error(e, "send_transaction"));
                }
            }
        }
    }
}

impl ForwarderChain for EvmForwarder {
    fn forwarder_address(&self) -> Address {
        self.forwarder
    }

    fn relayer_address(&self) -> Address {
        self.relayer
    }

    fn known_chain_id(&self) -> Option<u64> {
        self.chain_id.get().copied()
    }

    async fn chain_id(&self) -> Result<u64, RelayError> {
        let chain_id = self
            .chain_id
            .get_or_try_init(|| async {
                self.inner
                    .get_chain_id()
                    .await
                    .map_err(|e| RelayError::ChainUnavailable(e.to_string()))
            })
            .await?;
        self.check_expected_chain_id(*chain_id)
    }

    async fn get_nonce(&self, from: Address) -> Result<U256, RelayError> {
        let forwarder = MinimalForwarder::new(self.forwarder, &self.inner);
        forwarder
            .getNonce(from)
            .call()
            .await
            .map_err(|e| categorize_transport_error(e, "getNonce"))
    }

    #[instrument(skip_all, fields(from = %call.request.from, nonce = %call.request.nonce))]
    async fn execute(&self, call: ExecuteCall) -> Result<ExecutionReceipt, RelayError> {
        let send_start = Instant::now();
        let pending = {
            let _guard = self.submission_lock.lock().await;
            self.submit(&call).await?
        };
        let send_elapsed = send_start.elapsed();
        let tx_hash = *pending.tx_hash();
        tracing::info!(
            %tx_hash,
            relayer = %self.relayer,
            send_tx_ms = send_elapsed.as_millis() as u64,
            "Transaction submitted"
        );

        let receipt_start = Instant::now();
        let watcher = pending
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.receipt_timeout));
        let receipt = match watcher.get_receipt().await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    %tx_hash,
                    receipt_wait_ms = receipt_start.elapsed().as_millis() as u64,
                    error = %e,
                    "Receipt fetch failed"
                );
                self.nonce_manager.reset_nonce(self.relayer).await;
                return Err(match e {
                    PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                        RelayError::ReceiptTimeout { tx_hash }
                    }
                    other => RelayError::RpcProvider(format!(
                        "receipt for {tx_hash}: {other}"
                    )),
                });
            }
        };

        let receipt_elapsed = receipt_start.elapsed();
        tracing::info!(
            %tx_hash,
            status = ReceiptResponse::status(&receipt),
            gas_used = receipt.gas_used,
            send_tx_ms = send_elapsed.as_millis() as u64,
            receipt_wait_ms = receipt_elapsed.as_millis() as u64,
            total_ms = (send_elapsed + receipt_elapsed).as_millis() as u64,
            "Transaction mined"
        );
        if !ReceiptResponse::status(&receipt) {
            return Err(RelayError::Reverted { tx_hash });
        }
        Ok(ExecutionReceipt {
            tx_hash,
            gas_used: receipt.gas_used,
            block_number: receipt.block_number,
        })
    }
}

/// Decodes revert data into a readable message.
///
/// Handles `Error(string)`, `Panic(uint256)`, and reports other selectors as hex.
fn decode_revert_reason(data: &str) -> Option<String> {
    let bytes = hex::decode(data).ok()?;
    if bytes.len() < 4 {
        return None;
    }

    // Error(string)
    if bytes[0..4] == [0x08, 0xc3, 0x79, 0xa0] && bytes.len() >= 68 {
        let len = bytes[36..68]
            .iter()
            .fold(0usize, |acc, &b| acc.saturating_mul(256).saturating_add(b as usize));
        if len <= 1024 && bytes.len() >= 68 + len {
            return String::from_utf8(bytes[68..68 + len].to_vec()).ok();
        }
    }

    // Panic(uint256)
    if bytes[0..4] == [0x4e, 0x48, 0x7b, 0x71] && bytes.len() >= 36 {
        return Some(format!("Panic(0x{:02x})", bytes[35]));
    }

    Some(format!("UnknownError(0x{})", hex::encode(&bytes[0..4])))
}

/// Finds `data: Some(RawValue("0x..."))` in a debug-formatted RPC error and decodes it.
fn extract_revert_data(err_str: &str) -> Option<String> {
    const PLAIN: &str = "data: Some(RawValue(\"";
    const ESCAPED: &str = r#"data: Some(RawValue(\""#;

    if let Some(idx) = err_str.find(PLAIN) {
        let start = idx + PLAIN.len();
        if let Some(end) = err_str[start..].find('"') {
            if let Some(decoded) = decode_revert_reason(&err_str[start..start + end]) {
                return Some(decoded);
            }
        }
    }
    if let Some(idx) = err_str.find(ESCAPED) {
        let start = idx + ESCAPED.len();
        if let Some(end) = err_str[start..].find(r#"\""#) {
            return decode_revert_reason(&err_str[start..start + end]);
        }
    }
    None
}

/// Maps an RPC or contract error to a [`RelayError`] carrying the underlying message.
///
/// Revert data wins when present, then connection-level failures; anything else is
/// reported as a failed contract call.
fn categorize_transport_error(
    e: impl std::fmt::Debug + std::fmt::Display,
    context: &str,
) -> RelayError {
    let err_str = format!("{e:?}");

    if let Some(reason) = extract_revert_data(&err_str) {
        tracing::error!(context, %reason, "Forwarder call reverted");
        return RelayError::ContractCall(reason);
    }

    if err_str.contains("Connection refused")
        || err_str.contains("Connection reset")
        || err_str.contains("No route to host")
        || err_str.contains("timeout")
        || err_str.contains("Timeout")
        || err_str.contains("dns error")
        || err_str.contains("Too many open files")
    {
        tracing::error!(context, error = %err_str, "RPC connection error");
        RelayError::RpcProvider(format!("{context}: {e}"))
    } else {
        tracing::error!(context, error = %err_str, "RPC call failed");
        RelayError::ContractCall(format!("{context}: {e}"))
    }
}
