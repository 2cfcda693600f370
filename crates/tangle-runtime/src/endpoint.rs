//! The transport seam

use async_trait::async_trait;

use tangle_core::{Frame, Neighbour, Result};

/// A frame-carrying transport attached to the router
///
/// Implementations own their queues and connections; the router only
/// pushes outbound frames in and pulls inbound frames out.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Queue a frame for delivery to a neighbour (or all of them)
    async fn send(&self, frame: Frame, neighbour: Neighbour) -> Result<()>;

    /// Wait for the next inbound frame, tagged with the neighbour it
    /// arrived from
    async fn next(&self) -> Result<(Frame, Neighbour)>;

    /// Advisory maximum frame size for this transport, 0 for no hint
    fn size_hint(&self) -> usize {
        0
    }
}
