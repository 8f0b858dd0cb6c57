//! Chain access behind the relay flow.
//!
//! [`ForwarderChain`] is the seam between request validation and the network: the
//! production implementation talks JSON-RPC through [`evm::EvmForwarder`], tests use an
//! in-memory forwarder.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use std::future::Future;

use crate::forwarder::{ForwardRequest, SignatureDecodeError};

pub mod evm;
pub mod nonce;

/// Everything that can go wrong while relaying a single request.
///
/// Validation variants are the caller's fault and are answered before anything reaches
/// the chain. The rest originate upstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Invalid signature encoding: {0}")]
    InvalidSignatureEncoding(#[from] SignatureDecodeError),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Stale nonce: expected {expected}, got {got}")]
    StaleNonce { expected: U256, got: U256 },
    #[error("Gas limit too high: {requested} exceeds maximum {max}")]
    GasLimitTooHigh { requested: U256, max: u64 },
    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),
    #[error("Chain id mismatch: expected {expected}, RPC reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("RPC provider error: {0}")]
    RpcProvider(String),
    #[error("Contract call failed: {0}")]
    ContractCall(String),
    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },
    #[error("Timed out waiting for receipt of {tx_hash}")]
    ReceiptTimeout { tx_hash: TxHash },
}

impl RelayError {
    /// `true` when the request itself is at fault and nothing was submitted.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RelayError::MalformedRequest(_)
                | RelayError::InvalidSignatureEncoding(_)
                | RelayError::InvalidSignature
                | RelayError::StaleNonce { .. }
                | RelayError::GasLimitTooHigh { .. }
        )
    }
}

/// A verified `execute(request, signature)` call ready to be broadcast.
#[derive(Debug, Clone)]
pub struct ExecuteCall {
    pub request: ForwardRequest,
    /// Signature bytes as passed to the contract.
    pub signature: Bytes,
    /// Gas limit of the outer transaction.
    pub gas_limit: u64,
}

/// Outcome of a mined, successful `execute` transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub tx_hash: TxHash,
    pub gas_used: u64,
    pub block_number: Option<u64>,
}

/// Operations the relayer needs from the network and the forwarder deployment.
pub trait ForwarderChain: Send + Sync {
    /// Address of the forwarder contract requests are bound to.
    fn forwarder_address(&self) -> Address;

    /// Account that pays for `execute` transactions.
    fn relayer_address(&self) -> Address;

    /// Chain id if it has already been resolved. Never performs I/O.
    fn known_chain_id(&self) -> Option<u64>;

    /// Chain id reported by the RPC connection, resolved once and cached.
    fn chain_id(&self) -> impl Future<Output = Result<u64, RelayError>> + Send;

    /// Current forwarder nonce of `from`.
    fn get_nonce(&self, from: Address) -> impl Future<Output = Result<U256, RelayError>> + Send;

    /// Broadcasts `call` from the relayer account and waits for a successful receipt.
    fn execute(
        &self,
        call: ExecuteCall,
    ) -> impl Future<Output = Result<ExecutionReceipt, RelayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_rejections() {
        assert!(RelayError::InvalidSignature.is_rejection());
        assert!(RelayError::MalformedRequest("x".into()).is_rejection());
        assert!(
            RelayError::StaleNonce {
                expected: U256::from(1),
                got: U256::ZERO
            }
            .is_rejection()
        );
        assert!(!RelayError::ChainUnavailable("down".into()).is_rejection());
        assert!(
            !RelayError::Reverted {
                tx_hash: TxHash::ZERO
            }
            .is_rejection()
        );
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(RelayError::InvalidSignature.to_string(), "Invalid signature");
        assert_eq!(
            RelayError::StaleNonce {
                expected: U256::from(3),
                got: U256::from(1)
            }
            .to_string(),
            "Stale nonce: expected 3, got 1"
        );
    }
}
