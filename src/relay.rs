//! Verify-then-execute flow for one relay request.
//!
//! The forwarder contract is the trust boundary: it re-checks the signature and nonce and
//! rejects replays on its own. Everything here only keeps the relayer from paying gas for
//! requests that would revert. In particular the domain is always rebuilt from the chain id
//! the RPC reports and the configured forwarder, never from anything the client sends.

use alloy::primitives::U256;
use std::fmt::{Display, Formatter};
use std::time::Instant;

use crate::chain::{ExecuteCall, ForwarderChain, RelayError};
use crate::config::RelayConfig;
use crate::forwarder::{
    ForwardRequest, forwarder_domain, parse_signature, recover_signer, signature_bytes,
};
use crate::types::{HealthResponse, RelayRequest, RelayResponse};

/// Stages a single relay attempt moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Received,
    StructurallyValid,
    SignatureVerified,
    Submitted,
    Confirmed,
    Rejected,
    Failed,
}

impl Display for RelayStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayStage::Received => write!(f, "received"),
            RelayStage::StructurallyValid => write!(f, "structurally_valid"),
            RelayStage::SignatureVerified => write!(f, "signature_verified"),
            RelayStage::Submitted => write!(f, "submitted"),
            RelayStage::Confirmed => write!(f, "confirmed"),
            RelayStage::Rejected => write!(f, "rejected"),
            RelayStage::Failed => write!(f, "failed"),
        }
    }
}

impl RelayStage {
    /// Stage logged for an attempt that stopped before submission.
    ///
    /// Caller mistakes end in `Rejected`. Upstream failures stay at the last stage reached,
    /// since `Failed` is only entered after a broadcast.
    pub fn unsubmitted(reached: RelayStage, error: &RelayError) -> RelayStage {
        if error.is_rejection() {
            RelayStage::Rejected
        } else {
            reached
        }
    }
}

/// Fast-fail checks applied after signature recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    pub precheck_nonce: bool,
    pub max_gas_limit: Option<u64>,
    pub execute_gas_overhead: u64,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelayPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            precheck_nonce: config.precheck_nonce,
            max_gas_limit: config.max_gas_limit,
            execute_gas_overhead: config.execute_gas_overhead,
        }
    }
}

impl RelayPolicy {
    /// Gas limit of the outer transaction for a request asking for `gas`.
    fn gas_limit(&self, gas: U256) -> Result<u64, RelayError> {
        let max = self.max_gas_limit.unwrap_or(u64::MAX);
        let too_high = || RelayError::GasLimitTooHigh {
            requested: gas,
            max,
        };
        let requested = u64::try_from(gas).map_err(|_| too_high())?;
        if requested > max {
            return Err(too_high());
        }
        requested
            .checked_add(self.execute_gas_overhead)
            .ok_or_else(too_high)
    }
}

/// Shared, immutable relay context handed to every request.
#[derive(Debug)]
pub struct Relayer<P> {
    chain: P,
    policy: RelayPolicy,
}

impl<P: ForwarderChain> Relayer<P> {
    pub fn new(chain: P, policy: RelayPolicy) -> Self {
        Self { chain, policy }
    }

    pub fn chain(&self) -> &P {
        &self.chain
    }

    /// Liveness report. Reads only configuration and the already-resolved chain id.
    pub fn health(&self) -> HealthResponse {
        HealthResponse::ok(self.chain.forwarder_address(), self.chain.known_chain_id())
    }

    /// Verifies `body` and, if it holds up, executes it through the forwarder.
    ///
    /// Submits at most one transaction. Rejections happen before anything reaches the chain.
    pub async fn relay(&self, body: RelayRequest) -> Result<RelayResponse, RelayError> {
        let started = Instant::now();
        let from = body.request.from;
        let nonce = body.request.nonce;
        tracing::info!(stage = %RelayStage::Received, %from, %nonce, "Relay request");

        let mut reached = RelayStage::Received;
        let call = match self.verify(body, &mut reached).await {
            Ok(call) => call,
            Err(e) => {
                let stage = RelayStage::unsubmitted(reached, &e);
                tracing::warn!(%stage, %from, %nonce, error = %e, "Relay request not submitted");
                return Err(e);
            }
        };

        tracing::info!(
            stage = %RelayStage::Submitted,
            %from,
            %nonce,
            to = %call.request.to,
            gas_limit = call.gas_limit,
            "Submitting execute"
        );
        match self.chain.execute(call).await {
            Ok(receipt) => {
                tracing::info!(
                    stage = %RelayStage::Confirmed,
                    %from,
                    %nonce,
                    tx_hash = %receipt.tx_hash,
                    gas_used = receipt.gas_used,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Relay confirmed"
                );
                Ok(RelayResponse {
                    success: true,
                    tx_hash: receipt.tx_hash,
                    gas_used: receipt.gas_used.into(),
                })
            }
            Err(e) => {
                tracing::error!(
                    stage = %RelayStage::Failed,
                    %from,
                    %nonce,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Relay failed"
                );
                Err(e)
            }
        }
    }

    /// Runs the pre-submission checks, recording in `reached` the last stage passed.
    async fn verify(
        &self,
        body: RelayRequest,
        reached: &mut RelayStage,
    ) -> Result<ExecuteCall, RelayError> {
        let signature = parse_signature(&body.signature)?;
        let request = ForwardRequest::from(&body.request);
        *reached = RelayStage::StructurallyValid;
        tracing::debug!(stage = %reached, from = %request.from, nonce = %request.nonce);

        let chain_id = self.chain.chain_id().await?;
        let domain = forwarder_domain(chain_id, self.chain.forwarder_address());
        // Address equality is on bytes, so checksum casing in the request is irrelevant.
        match recover_signer(&request, &domain, &signature) {
            Ok(signer) if signer == request.from => {}
            Ok(signer) => {
                tracing::debug!(%signer, from = %request.from, "Recovered signer does not match");
                return Err(RelayError::InvalidSignature);
            }
            Err(_) => return Err(RelayError::InvalidSignature),
        }
        *reached = RelayStage::SignatureVerified;
        tracing::debug!(stage = %reached, from = %request.from, chain_id);

        let gas_limit = self.policy.gas_limit(request.gas)?;

        if self.policy.precheck_nonce {
            let expected = self.chain.get_nonce(request.from).await?;
            if expected != request.nonce {
                return Err(RelayError::StaleNonce {
                    expected,
                    got: request.nonce,
                });
            }
        }

        Ok(ExecuteCall {
            request,
            signature: signature_bytes(&signature),
            gas_limit,
        })
    }
}
