//! Client side of the relay protocol: sign forward requests and post them to a relayer.

pub mod client;
pub mod wallet;

pub use client::RelayerClient;
pub use wallet::{ForwardCall, ForwarderWallet};
