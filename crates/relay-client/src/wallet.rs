//! Builds and signs forward requests for a local key.

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use forwarder_relayer::forwarder::{
    ForwardRequest, MinimalForwarder, SignedForwardRequest, forwarder_domain, sign_request,
};

/// The call the signer wants the forwarder to make on its behalf.
#[derive(Debug, Clone)]
pub struct ForwardCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: U256,
}

/// Signer bound to one forwarder deployment.
///
/// Reads the nonce and chain id from `provider`; the signature itself is produced locally.
#[derive(Clone)]
pub struct ForwarderWallet<P> {
    signer: PrivateKeySigner,
    provider: P,
    forwarder: Address,
}

impl<P: Provider + Clone> ForwarderWallet<P> {
    pub fn new(signer: PrivateKeySigner, provider: P, forwarder: Address) -> Self {
        Self {
            signer,
            provider,
            forwarder,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// `getNonce(signer)` as currently stored by the forwarder.
    pub async fn current_nonce(&self) -> Result<U256> {
        let forwarder = MinimalForwarder::new(self.forwarder, self.provider.clone());
        forwarder
            .getNonce(self.address())
            .call()
            .await
            .context("Failed to read forwarder nonce")
    }

    /// Reads the nonce, builds the request and signs it under the forwarder's domain.
    ///
    /// A request signed here goes stale as soon as another request from the same account
    /// is executed first.
    pub async fn prepare(&self, call: ForwardCall) -> Result<SignedForwardRequest> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .context("Failed to read chain id")?;
        let nonce = self.current_nonce().await?;

        let request = ForwardRequest {
            from: self.address(),
            to: call.to,
            value: call.value,
            gas: call.gas,
            nonce,
            data: call.data,
        };
        let domain = forwarder_domain(chain_id, self.forwarder);
        tracing::debug!(chain_id, %nonce, forwarder = %self.forwarder, "Signing forward request");

        sign_request(&self.signer, &domain, request)
            .await
            .context("Signing failed")
    }
}
