//! Wire types for the relay HTTP API.
//!
//! These mirror the JSON produced by browser wallets and `ethers`-style tooling:
//! addresses and byte strings are `0x`-prefixed hex, while 256-bit integers may arrive as
//! JSON numbers, decimal strings or hex strings. Integers are always emitted as decimal
//! strings so they survive JavaScript clients without precision loss.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::forwarder::ForwardRequest;

/// Non-negative 256-bit integer as carried in JSON payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Uint256(pub U256);

/// Reasons a string cannot be read as a [`Uint256`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Uint256ParseError {
    #[error("empty integer string")]
    Empty,
    #[error("negative integers are not allowed: {0}")]
    Negative(String),
    #[error("invalid unsigned integer {0:?}")]
    Invalid(String),
}

impl FromStr for Uint256 {
    type Err = Uint256ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Uint256ParseError::Empty);
        }
        if s.starts_with('-') {
            return Err(Uint256ParseError::Negative(s.to_string()));
        }
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some("") => return Err(Uint256ParseError::Invalid(s.to_string())),
            Some(hex) if hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                U256::from_str_radix(hex, 16)
            }
            Some(_) => return Err(Uint256ParseError::Invalid(s.to_string())),
            None if s.chars().all(|c| c.is_ascii_digit()) => U256::from_str_radix(s, 10),
            None => return Err(Uint256ParseError::Invalid(s.to_string())),
        };
        parsed
            .map(Uint256)
            .map_err(|_| Uint256ParseError::Invalid(s.to_string()))
    }
}

impl Display for Uint256 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<U256> for Uint256 {
    fn from(value: U256) -> Self {
        Uint256(value)
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        Uint256(U256::from(value))
    }
}

impl From<Uint256> for U256 {
    fn from(value: Uint256) -> Self {
        value.0
    }
}

impl Serialize for Uint256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Uint256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Uint256Visitor;

        impl Visitor<'_> for Uint256Visitor {
            type Value = Uint256;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer, decimal string or 0x-prefixed hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Uint256::from(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
                Ok(Uint256(U256::from(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(Uint256::from)
                    .map_err(|_| E::custom(format!("negative integers are not allowed: {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Err(E::custom(format!(
                    "expected an integer, got {v}; send large values as strings"
                )))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Uint256::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Uint256Visitor)
    }
}

/// JSON form of a `MinimalForwarder` request, as submitted by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequestPayload {
    pub from: Address,
    pub to: Address,
    pub value: Uint256,
    pub gas: Uint256,
    pub nonce: Uint256,
    pub data: Bytes,
}

impl From<&ForwardRequestPayload> for ForwardRequest {
    fn from(payload: &ForwardRequestPayload) -> Self {
        ForwardRequest {
            from: payload.from,
            to: payload.to,
            value: payload.value.0,
            gas: payload.gas.0,
            nonce: payload.nonce.0,
            data: payload.data.clone(),
        }
    }
}

impl From<&ForwardRequest> for ForwardRequestPayload {
    fn from(request: &ForwardRequest) -> Self {
        ForwardRequestPayload {
            from: request.from,
            to: request.to,
            value: request.value.into(),
            gas: request.gas.into(),
            nonce: request.nonce.into(),
            data: request.data.clone(),
        }
    }
}

/// Body of `POST /relay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub request: ForwardRequestPayload,
    /// 65-byte `(r, s, v)` signature, hex encoded.
    pub signature: String,
}

/// Successful `POST /relay` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    pub tx_hash: TxHash,
    pub gas_used: Uint256,
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub forwarder_address: Address,
    /// Only present once the upstream RPC has reported its chain id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl HealthResponse {
    pub fn ok(forwarder_address: Address, chain_id: Option<u64>) -> Self {
        Self {
            status: "ok".to_string(),
            forwarder_address,
            chain_id,
        }
    }
}

/// Error body shared by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
