//! Account nonce allocation for the relayer wallet.

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::providers::fillers::NonceManager;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Caching nonce manager that seeds from the `pending` block tag.
///
/// The first allocation for an address queries `eth_getTransactionCount(address, "pending")`
/// so transactions still in the mempool are accounted for; later allocations increment the
/// cached value locally. After any failed submission or receipt wait the cache is reset
/// with [`reset_nonce`](Self::reset_nonce), since whether the transaction reached the
/// mempool is unknown.
///
/// Each slot holds the next nonce to hand out, `None` once it must be re-read from the RPC.
/// Clones share the same cache.
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<Option<u64>>>>>,
}

#[async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(
        &self,
        provider: &P,
        address: Address,
    ) -> alloy::transports::TransportResult<u64>
    where
        P: Provider<N>,
        N: alloy::network::Network,
    {
        // Clone the slot out so the map shard is not held across the await.
        let slot = self.slot(address);

        let mut cached = slot.lock().await;
        let next = match *cached {
            Some(next) => next,
            None => match provider.get_transaction_count(address).pending().await {
                Ok(pending) => {
                    tracing::info!(%address, nonce = pending, "relayer nonce seeded from pending block");
                    pending
                }
                Err(e) => {
                    tracing::warn!(%address, error = ?e, "pending tag unsupported, seeding nonce from latest");
                    provider.get_transaction_count(address).latest().await?
                }
            },
        };
        *cached = Some(next + 1);
        tracing::debug!(%address, nonce = next, "relayer nonce allocated");
        Ok(next)
    }
}

impl PendingNonceManager {
    fn slot(&self, address: Address) -> Arc<Mutex<Option<u64>>> {
        let entry = self.nonces.entry(address).or_default();
        Arc::clone(entry.value())
    }

    /// Forgets the cached nonce of `address`; the next allocation queries the RPC.
    pub async fn reset_nonce(&self, address: Address) {
        let slot = self.nonces.get(&address).map(|s| Arc::clone(s.value()));
        if let Some(slot) = slot {
            *slot.lock().await = None;
            tracing::debug!(%address, "relayer nonce cache reset");
        }
    }

    /// Pins the nonce the next allocation for `address` yields.
    pub async fn set_next_nonce(&self, address: Address, next: u64) {
        *self.slot(address).lock().await = Some(next);
        tracing::info!(%address, nonce = next, "relayer nonce corrected from RPC error");
    }

    /// Next nonce that would be handed out without asking the RPC.
    #[cfg(test)]
    pub(crate) async fn cached(&self, address: Address) -> Option<u64> {
        let slot = self.nonces.get(&address).map(|s| Arc::clone(s.value()))?;
        let value = *slot.lock().await;
        value
    }
}

/// Reads the expected nonce out of `nonce too low/high: next nonce N, tx nonce M`.
pub fn parse_expected_nonce_from_error(msg: &str) -> Option<u64> {
    const MARKER: &str = "next nonce ";
    msg.find(MARKER)
        .map(|i| &msg[i + MARKER.len()..])
        .and_then(|s| s.split(|c: char| !c.is_ascii_digit()).next())
        .and_then(|n| n.parse().ok())
}
