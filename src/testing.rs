//! In-memory forwarder for unit tests.

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::hex;
use alloy::primitives::{Address, B256, Bytes, Signature, U256, keccak256};
use alloy::signers::local::PrivateKeySigner;
use axum::extract::{Json, State};
use axum::routing::post;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chain::{ExecuteCall, ExecutionReceipt, ForwarderChain, RelayError};
use crate::forwarder::{ForwardRequest, forwarder_domain, recover_signer, sign_request};
use crate::types::RelayRequest;

pub const SEPOLIA: u64 = 11155111;
pub const FORWARDER: Address = Address::new([0xf0; 20]);
pub const TARGET: Address = Address::new([0xb0; 20]);

/// Mirrors the forwarder contract's rules: the signature must recover to `from` under the
/// mock's own domain and the nonce must match, after which the nonce increments.
#[derive(Debug)]
pub struct MockForwarder {
    forwarder: Address,
    relayer: Address,
    chain_id: Option<u64>,
    nonces: Mutex<HashMap<Address, U256>>,
    submissions: AtomicUsize,
    execute_failure: Option<RelayError>,
    nonce_failure: Option<RelayError>,
}

impl MockForwarder {
    pub fn new(chain_id: u64) -> Self {
        Self {
            forwarder: FORWARDER,
            relayer: Address::repeat_byte(0x0e),
            chain_id: Some(chain_id),
            nonces: Mutex::new(HashMap::new()),
            submissions: AtomicUsize::new(0),
            execute_failure: None,
            nonce_failure: None,
        }
    }

    /// RPC that has not answered yet.
    pub fn unreachable() -> Self {
        Self {
            chain_id: None,
            ..Self::new(0)
        }
    }

    pub fn failing_with(mut self, error: RelayError) -> Self {
        self.execute_failure = Some(error);
        self
    }

    /// `getNonce` calls fail with `error`.
    pub fn failing_reads_with(mut self, error: RelayError) -> Self {
        self.nonce_failure = Some(error);
        self
    }

    pub fn with_nonce(self, from: Address, nonce: u64) -> Self {
        self.nonces
            .lock()
            .unwrap()
            .insert(from, U256::from(nonce));
        self
    }

    pub fn nonce_of(&self, from: Address) -> U256 {
        self.nonces
            .lock()
            .unwrap()
            .get(&from)
            .copied()
            .unwrap_or_default()
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

impl ForwarderChain for MockForwarder {
    fn forwarder_address(&self) -> Address {
        self.forwarder
    }

    fn relayer_address(&self) -> Address {
        self.relayer
    }

    fn known_chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn chain_id(&self) -> Result<u64, RelayError> {
        self.chain_id
            .ok_or_else(|| RelayError::ChainUnavailable("connection refused".to_string()))
    }

    async fn get_nonce(&self, from: Address) -> Result<U256, RelayError> {
        if let Some(error) = &self.nonce_failure {
            return Err(error.clone());
        }
        Ok(self.nonce_of(from))
    }

    async fn execute(&self, call: ExecuteCall) -> Result<ExecutionReceipt, RelayError> {
        let count = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = keccak256(U256::from(count as u64).to_be_bytes::<32>());
        if let Some(error) = &self.execute_failure {
            return Err(error.clone());
        }

        let chain_id = self.chain_id().await?;
        let domain = forwarder_domain(chain_id, self.forwarder);
        let signer = Signature::from_raw(&call.signature)
            .ok()
            .and_then(|sig| recover_signer(&call.request, &domain, &sig).ok());

        let mut nonces = self.nonces.lock().unwrap();
        let current = nonces.entry(call.request.from).or_default();
        if signer != Some(call.request.from) || *current != call.request.nonce {
            return Err(RelayError::Reverted { tx_hash });
        }
        *current += U256::from(1);

        Ok(ExecutionReceipt {
            tx_hash,
            gas_used: 21_000 + call.request.data.len() as u64 * 16,
            block_number: Some(count as u64),
        })
    }
}

pub fn request(from: Address, nonce: u64) -> ForwardRequest {
    ForwardRequest {
        from,
        to: TARGET,
        value: U256::ZERO,
        gas: U256::from(100_000),
        nonce: U256::from(nonce),
        data: Bytes::new(),
    }
}

/// Signs `request` under `{chain_id, verifying_contract}` and wraps it as a relay body.
pub async fn signed_body(
    signer: &PrivateKeySigner,
    chain_id: u64,
    verifying_contract: Address,
    request: ForwardRequest,
) -> RelayRequest {
    let domain = forwarder_domain(chain_id, verifying_contract);
    sign_request(signer, &domain, request)
        .await
        .unwrap()
        .to_relay_request()
}

/// Hash that never matches a mined transaction.
pub fn unknown_hash() -> B256 {
    B256::repeat_byte(0xee)
}

/// JSON-RPC node double for [`EvmForwarder`](crate::chain::evm::EvmForwarder).
///
/// Answers the handful of methods the relayer uses over real HTTP and records every
/// accepted `eth_sendRawTransaction`. Receipts are only served once a status is set.
#[derive(Debug)]
pub struct FakeNode {
    chain_id: u64,
    gas_price_delay: Duration,
    state: Mutex<FakeNodeState>,
}

#[derive(Debug, Default)]
struct FakeNodeState {
    methods: Vec<String>,
    broadcasts: Vec<Bytes>,
    rejections: VecDeque<String>,
    receipt_status: Option<bool>,
    pending_count: u64,
    forwarder_nonce: U256,
}

impl FakeNode {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas_price_delay: Duration::ZERO,
            state: Mutex::new(FakeNodeState::default()),
        }
    }

    /// Slows `eth_gasPrice` down, which widens the window between nonce allocation and
    /// broadcast.
    pub fn with_gas_price_delay(mut self, delay: Duration) -> Self {
        self.gas_price_delay = delay;
        self
    }

    pub fn with_receipt_status(self, status: bool) -> Self {
        self.set_receipt_status(Some(status));
        self
    }

    pub fn with_pending_count(self, count: u64) -> Self {
        self.set_pending_count(count);
        self
    }

    pub fn with_forwarder_nonce(self, nonce: u64) -> Self {
        self.state.lock().unwrap().forwarder_nonce = U256::from(nonce);
        self
    }

    /// Refuses the next broadcast with a `-32000` error carrying `message`.
    pub fn rejecting_next_broadcast(self, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .rejections
            .push_back(message.to_string());
        self
    }

    pub fn set_receipt_status(&self, status: Option<bool>) {
        self.state.lock().unwrap().receipt_status = status;
    }

    pub fn set_pending_count(&self, count: u64) {
        self.state.lock().unwrap().pending_count = count;
    }

    /// Serves the node on an ephemeral local port and returns its URL.
    pub async fn spawn(self) -> (Arc<Self>, url::Url) {
        let node = Arc::new(self);
        let app = axum::Router::new()
            .route("/", post(rpc))
            .with_state(Arc::clone(&node));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let url = format!("http://{addr}/").parse().unwrap();
        (node, url)
    }

    /// Methods called so far, in arrival order.
    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().methods.clone()
    }

    /// Accepted transactions, in broadcast order.
    pub fn broadcasts(&self) -> Vec<TxEnvelope> {
        self.state
            .lock()
            .unwrap()
            .broadcasts
            .iter()
            .map(|raw| TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap())
            .collect()
    }

    async fn answer(&self, method: &str, params: &Value) -> Result<Value, (i64, String)> {
        self.state.lock().unwrap().methods.push(method.to_string());
        match method {
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id))),
            "eth_blockNumber" => Ok(json!("0x10")),
            "eth_getBalance" => Ok(json!("0xde0b6b3a7640000")),
            "eth_getBlockByNumber" => Ok(Value::Null),
            "eth_gasPrice" => {
                tokio::time::sleep(self.gas_price_delay).await;
                Ok(json!("0x3b9aca00"))
            }
            "eth_getTransactionCount" => {
                let count = self.state.lock().unwrap().pending_count;
                Ok(json!(format!("{count:#x}")))
            }
            "eth_call" => {
                let nonce = self.state.lock().unwrap().forwarder_nonce;
                Ok(json!(format!("0x{}", hex::encode(nonce.to_be_bytes::<32>()))))
            }
            "eth_sendRawTransaction" => {
                let raw = params[0]
                    .as_str()
                    .and_then(|s| hex::decode(s).ok())
                    .ok_or((-32602, "invalid raw transaction".to_string()))?;
                let mut state = self.state.lock().unwrap();
                if let Some(message) = state.rejections.pop_front() {
                    return Err((-32000, message));
                }
                let hash = keccak256(&raw);
                state.broadcasts.push(raw.into());
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = serde_json::from_value(params[0].clone())
                    .map_err(|e| (-32602, e.to_string()))?;
                let state = self.state.lock().unwrap();
                let known = state.broadcasts.iter().any(|raw| keccak256(raw) == hash);
                Ok(match state.receipt_status {
                    Some(status) if known => receipt_json(hash, status),
                    _ => Value::Null,
                })
            }
            other => Err((-32601, format!("method {other} not found"))),
        }
    }
}

async fn rpc(State(node): State<Arc<FakeNode>>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let body = match node.answer(&method, &request["params"]).await {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err((code, message)) => {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
        }
    };
    Json(body)
}

fn receipt_json(hash: B256, status: bool) -> Value {
    json!({
        "type": "0x0",
        "status": if status { "0x1" } else { "0x0" },
        "cumulativeGasUsed": "0xa410",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0x11),
        "blockNumber": "0x10",
        "gasUsed": "0xa410",
        "effectiveGasPrice": "0x3b9aca00",
        "from": Address::repeat_byte(0x0e),
        "to": FORWARDER,
        "contractAddress": null,
    })
}
