//! Per-network trust store.
//!
//! Maps a [`NetworkId`] to the gateway hardware address last observed as
//! safe on that network. The detection engine is the only writer, and it
//! only writes the first time a network is seen.

mod file;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use pnet::util::MacAddr;

use crate::error::TrustStoreError;
use crate::network::NetworkId;

pub use file::FileTrustStore;

/// Namespace holding the trusted records.
pub const NAMESPACE: &str = "safe_macs";

/// Trait for trust record storage.
pub trait TrustStore: Send + Sync + 'static {
    /// Get the trusted gateway address for a network.
    fn get(
        &self,
        network: &NetworkId,
    ) -> impl Future<Output = Result<Option<MacAddr>, TrustStoreError>> + Send;

    /// Record `mac` as trusted for `network`, replacing any previous value.
    ///
    /// Storing the same value twice is a no-op.
    fn put(
        &self,
        network: NetworkId,
        mac: MacAddr,
    ) -> impl Future<Output = Result<(), TrustStoreError>> + Send;
}

/// In-memory trust store.
///
/// Records are lost when the process exits; use [`FileTrustStore`] to
/// survive restarts.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrustStore {
    records: Arc<RwLock<HashMap<NetworkId, MacAddr>>>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl TrustStore for MemoryTrustStore {
    async fn get(&self, network: &NetworkId) -> Result<Option<MacAddr>, TrustStoreError> {
        Ok(self.records.read().get(network).copied())
    }

    async fn put(&self, network: NetworkId, mac: MacAddr) -> Result<(), TrustStoreError> {
        self.records.write().insert(network, mac);
        Ok(())
    }
}
