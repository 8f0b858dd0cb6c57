//! EIP-712 schema of `MinimalForwarder` requests.
//!
//! Requests are signed over the domain
//! `{name: "MinimalForwarder", version: "0.0.1", chainId, verifyingContract}` with the
//! struct type
//! `ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data)`.
//! The same helpers serve the client that signs and the relayer that verifies, so both
//! sides always hash identically.

use alloy::hex;
use alloy::primitives::{Address, B256, Bytes, Signature};
use alloy::signers::Signer;
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct, eip712_domain};

use crate::types::{ForwardRequestPayload, RelayRequest};

/// EIP-712 domain name the forwarder contract was deployed with.
pub const FORWARDER_NAME: &str = "MinimalForwarder";
/// EIP-712 domain version the forwarder contract was deployed with.
pub const FORWARDER_VERSION: &str = "0.0.1";

/// Length of an `(r, s, v)` signature.
pub const SIGNATURE_LENGTH: usize = 65;

sol! {
    /// Call intent signed by `from` and executed by the forwarder on its behalf.
    #[derive(Debug, PartialEq, Eq)]
    struct ForwardRequest {
        address from;
        address to;
        uint256 value;
        uint256 gas;
        uint256 nonce;
        bytes data;
    }

    /// Subset of the EIP-2771 `MinimalForwarder` ABI the relayer talks to.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    contract MinimalForwarder {
        function getNonce(address from) external view returns (uint256);
        function verify(ForwardRequest calldata req, bytes calldata signature) external view returns (bool);
        function execute(ForwardRequest calldata req, bytes calldata signature) external payable returns (bool, bytes memory);
    }
}

/// Builds the domain binding signatures to one forwarder deployment on one chain.
pub fn forwarder_domain(chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    eip712_domain! {
        name: FORWARDER_NAME,
        version: FORWARDER_VERSION,
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    }
}

/// EIP-712 digest of `request` under `domain`.
pub fn signing_hash(request: &ForwardRequest, domain: &Eip712Domain) -> B256 {
    request.eip712_signing_hash(domain)
}

/// Recovers the address that produced `signature` over `request` and `domain`.
///
/// A signature made under any other domain or over a different request does not fail here;
/// it recovers some unrelated address, so callers must compare against `request.from`.
pub fn recover_signer(
    request: &ForwardRequest,
    domain: &Eip712Domain,
    signature: &Signature,
) -> Result<Address, alloy::primitives::SignatureError> {
    signature.recover_address_from_prehash(&signing_hash(request, domain))
}

/// Errors while decoding a hex signature from the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureDecodeError {
    #[error("signature is not valid hex: {0}")]
    Hex(String),
    #[error("signature must be {SIGNATURE_LENGTH} bytes, got {0}")]
    Length(usize),
    #[error("signature is malformed: {0}")]
    Malformed(String),
}

/// Decodes a `0x`-prefixed 65-byte signature. Both `v ∈ {0, 1}` and `v ∈ {27, 28}` are accepted.
pub fn parse_signature(encoded: &str) -> Result<Signature, SignatureDecodeError> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| SignatureDecodeError::Hex(e.to_string()))?;
    if bytes.len() != SIGNATURE_LENGTH {
        return Err(SignatureDecodeError::Length(bytes.len()));
    }
    Signature::from_raw(&bytes).map_err(|e| SignatureDecodeError::Malformed(e.to_string()))
}

/// Signature bytes in the `v ∈ {27, 28}` form the forwarder's ECDSA library expects.
pub fn signature_bytes(signature: &Signature) -> Bytes {
    Bytes::from(signature.as_bytes().to_vec())
}

/// Errors raised while signing a request on the client side.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("request.from {from} does not match signer {signer}")]
    SignerMismatch { signer: Address, from: Address },
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),
}

/// A request together with the signature of its `from` account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedForwardRequest {
    pub request: ForwardRequest,
    pub signature: Signature,
}

impl SignedForwardRequest {
    /// Hex encoding of the signature as sent to the relayer.
    pub fn signature_hex(&self) -> String {
        hex::encode_prefixed(self.signature.as_bytes())
    }

    /// Body for `POST /relay`.
    pub fn to_relay_request(&self) -> RelayRequest {
        RelayRequest {
            request: ForwardRequestPayload::from(&self.request),
            signature: self.signature_hex(),
        }
    }
}

/// Signs `request` under `domain`.
///
/// Pure and local: nothing is read from or written to the chain. `request.from` must be
/// the signer's own address, otherwise the forwarder would reject the signature anyway.
pub async fn sign_request<S>(
    signer: &S,
    domain: &Eip712Domain,
    request: ForwardRequest,
) -> Result<SignedForwardRequest, SigningError>
where
    S: Signer + Sync,
{
    let signer_address = signer.address();
    if request.from != signer_address {
        return Err(SigningError::SignerMismatch {
            signer: signer_address,
            from: request.from,
        });
    }
    let hash = signing_hash(&request, domain);
    let signature = signer.sign_hash(&hash).await?;
    Ok(SignedForwardRequest { request, signature })
}
