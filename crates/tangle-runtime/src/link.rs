//! Platform link endpoint
//!
//! The integration point for link drivers the platform owns (wifi-direct
//! style local wireless, or any other byte-shuttling layer): the driver
//! pushes inbound encoded frames in with [`give`](LinkEndpoint::give) and
//! pulls outbound frames with [`take`](LinkEndpoint::take). Frames cross
//! this edge fully encoded, addressing metadata included; the driver
//! never looks inside them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{trace, warn};

use tangle_core::{Frame, FrameCodec, Neighbour, Result, TangleError, TransportError};

use crate::endpoint::Endpoint;

type FrameQueue = (
    mpsc::Sender<(Frame, Neighbour)>,
    Mutex<mpsc::Receiver<(Frame, Neighbour)>>,
);

fn frame_queue(depth: usize) -> FrameQueue {
    let (tx, rx) = mpsc::channel(depth);
    (tx, Mutex::new(rx))
}

/// Push/pull frame queues for a platform link driver
pub struct LinkEndpoint {
    codec: FrameCodec,
    inbound: FrameQueue,
    outbound: FrameQueue,
}

impl LinkEndpoint {
    /// Create a link endpoint with the given queue depth
    pub fn new(codec: FrameCodec, depth: usize) -> Arc<Self> {
        Arc::new(Self {
            codec,
            inbound: frame_queue(depth),
            outbound: frame_queue(depth),
        })
    }

    /// Hand an inbound encoded frame to the engine
    ///
    /// Called by the platform driver for every frame received on the
    /// local link. The bytes are decoded and validated here; malformed
    /// input is an error, not a panic.
    pub async fn give(&self, encoded: &[u8]) -> Result<()> {
        let (frame, neighbour) = self.codec.decode_enveloped(encoded)?;
        trace!(sender = %frame.sender, seq = frame.seq, "link frame in");
        self.inbound
            .0
            .send((frame, neighbour))
            .await
            .map_err(|_| TangleError::Transport(TransportError::QueueClosed))
    }

    /// Wait for the next outbound frame to carry off, with its
    /// addressing
    pub async fn take(&self) -> Result<(Frame, Neighbour)> {
        self.outbound
            .1
            .lock()
            .await
            .recv()
            .await
            .ok_or(TangleError::Transport(TransportError::QueueClosed))
    }

    /// Like [`take`](Self::take), but already encoded for the wire
    pub async fn take_encoded(&self) -> Result<Vec<u8>> {
        let (frame, neighbour) = self.take().await?;
        self.codec.encode_enveloped(&frame, neighbour)
    }

    /// Non-blocking variant of [`take`](Self::take) for poll-style
    /// drivers; None when nothing is queued
    pub async fn try_take(&self) -> Option<(Frame, Neighbour)> {
        self.outbound.1.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl Endpoint for LinkEndpoint {
    /// Queue a frame for the driver, evicting the oldest queued frame
    /// when the queue is full
    ///
    /// A slow or absent driver must not park the router; like a dead TCP
    /// peer, an undrained link loses frames instead of blocking sends.
    async fn send(&self, frame: Frame, neighbour: Neighbour) -> Result<()> {
        trace!(sender = %frame.sender, seq = frame.seq, "link frame out");
        match self.outbound.0.try_send((frame, neighbour)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => {
                Err(TangleError::Transport(TransportError::QueueClosed))
            }
            Err(TrySendError::Full(mut item)) => {
                // Hold the consumer side while we make room
                let mut outbound = self.outbound.1.lock().await;
                loop {
                    if let Ok((dropped, _)) = outbound.try_recv() {
                        warn!(
                            sender = %dropped.sender,
                            seq = dropped.seq,
                            "link outbound queue full, dropping oldest frame"
                        );
                    }
                    match self.outbound.0.try_send(item) {
                        Ok(()) => return Ok(()),
                        Err(TrySendError::Closed(_)) => {
                            return Err(TangleError::Transport(TransportError::QueueClosed))
                        }
                        Err(TrySendError::Full(returned)) => item = returned,
                    }
                }
            }
        }
    }

    async fn next(&self) -> Result<(Frame, Neighbour)> {
        self.inbound
            .1
            .lock()
            .await
            .recv()
            .await
            .ok_or(TangleError::Transport(TransportError::QueueClosed))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
