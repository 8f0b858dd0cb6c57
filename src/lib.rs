//! Relayer for EIP-2771 `MinimalForwarder` meta-transactions.
//!
//! Users sign an EIP-712 `ForwardRequest` off-chain; the relayer re-verifies the signature
//! against its own view of the domain and pays gas to call `execute(request, signature)`.
//!
//! The [`forwarder`] and [`types`] modules are shared with the signing client.

pub mod chain;
pub mod config;
pub mod forwarder;
pub mod from_env;
pub mod handlers;
pub mod network;
pub mod relay;
pub mod sig_down;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
