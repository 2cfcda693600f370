//! Frame router
//!
//! Owns the attached endpoints and fans outbound frames across them.
//! Inbound pumping is wired up by the session, which spawns one task per
//! endpoint; the router only provides the send side and the duplicate
//! ledger shared by those tasks.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::trace;

use tangle_core::{Frame, Identity, Neighbour, Result};

use crate::endpoint::Endpoint;

// ----------------------------------------------------------------------------
// Duplicate Suppression
// ----------------------------------------------------------------------------

/// Bounded ledger of recently seen (sender, seq) pairs
pub(crate) struct FrameLedger {
    seen: HashSet<(Identity, u64)>,
    order: VecDeque<(Identity, u64)>,
    capacity: usize,
}

impl FrameLedger {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a frame; returns false when it was already seen
    pub(crate) fn witness(&mut self, sender: Identity, seq: u64) -> bool {
        let key = (sender, seq);
        if !self.seen.insert(key) {
            return false;
        }

        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

// ----------------------------------------------------------------------------
// Router
// ----------------------------------------------------------------------------

/// Fans frames out across the attached endpoints
pub struct Router {
    endpoints: Vec<Arc<dyn Endpoint>>,
}

impl Router {
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        Self { endpoints }
    }

    /// The attached endpoints, for inbound pumping
    pub fn endpoints(&self) -> &[Arc<dyn Endpoint>] {
        &self.endpoints
    }

    /// Deliver a frame to every neighbour on every endpoint
    pub async fn flood(&self, frame: Frame) -> Result<()> {
        trace!(sender = %frame.sender, seq = frame.seq, "flooding frame");
        for endpoint in &self.endpoints {
            endpoint.send(frame.clone(), Neighbour::Flood).await?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkEndpoint;
    use tangle_core::FrameCodec;

    #[test]
    fn test_ledger_dedupes() {
        let mut ledger = FrameLedger::new(8);
        let id = Identity::new([1u8; 32]);

        assert!(ledger.witness(id, 1));
        assert!(!ledger.witness(id, 1));
        assert!(ledger.witness(id, 2));
        assert!(ledger.witness(Identity::new([2u8; 32]), 1));
    }

    #[test]
    fn test_ledger_evicts_oldest() {
        let mut ledger = FrameLedger::new(2);
        let id = Identity::new([1u8; 32]);

        assert!(ledger.witness(id, 1));
        assert!(ledger.witness(id, 2));
        assert!(ledger.witness(id, 3)); // evicts seq 1

        assert!(ledger.witness(id, 1));
        assert!(!ledger.witness(id, 3));
    }

    #[tokio::test]
    async fn test_flood_hits_every_endpoint() {
        let codec = FrameCodec::default();
        let a = LinkEndpoint::new(codec, 4);
        let b = LinkEndpoint::new(codec, 4);
        let endpoints: Vec<Arc<dyn Endpoint>> = vec![a.clone(), b.clone()];
        let router = Router::new(endpoints);

        let frame = Frame::new(Identity::new([9u8; 32]), 0, b"x".to_vec());
        router.flood(frame.clone()).await.unwrap();

        assert_eq!(a.take().await.unwrap().0, frame);
        assert_eq!(b.take().await.unwrap().0, frame);
    }
}
