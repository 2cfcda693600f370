//! TCP endpoint
//!
//! Binds the session's listening port, accepts inbound peers and dials
//! outbound ones. Frames travel length-prefixed (u32 big-endian, capped
//! at the codec's frame limit) over the stream; each connected peer gets
//! a `Single(n)` neighbour id scoped to this endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tangle_core::{Frame, FrameCodec, Neighbour, Result, TangleError, TransportError};

use crate::endpoint::Endpoint;

const LEN_PREFIX: usize = 4;

/// TCP transport for frames
pub struct TcpEndpoint {
    codec: FrameCodec,
    local_addr: SocketAddr,
    queue_depth: usize,
    next_peer: AtomicU16,
    peers: RwLock<HashMap<u16, mpsc::Sender<Vec<u8>>>>,
    inbound_tx: mpsc::Sender<(Frame, Neighbour)>,
    inbound_rx: Mutex<mpsc::Receiver<(Frame, Neighbour)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TcpEndpoint {
    /// Bind a listening socket and start accepting peers
    ///
    /// Port 0 binds an ephemeral port; use [`local_addr`](Self::local_addr)
    /// to discover it.
    pub async fn bind(port: u16, codec: FrameCodec, queue_depth: usize) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let local_addr = listener.local_addr()?;
        let (inbound_tx, inbound_rx) = mpsc::channel(queue_depth);

        let endpoint = Arc::new(Self {
            codec,
            local_addr,
            queue_depth,
            next_peer: AtomicU16::new(0),
            peers: RwLock::new(HashMap::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            tasks: Mutex::new(Vec::new()),
        });

        let accept_handle = {
            let endpoint = Arc::clone(&endpoint);
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, addr)) => {
                            debug!(%addr, "inbound tcp peer");
                            if let Err(err) = endpoint.register_peer(stream).await {
                                warn!(%addr, %err, "failed to register tcp peer");
                            }
                        }
                        Err(err) => {
                            warn!(%err, "tcp accept failed");
                            break;
                        }
                    }
                }
            })
        };
        endpoint.tasks.lock().await.push(accept_handle);

        debug!(addr = %local_addr, "tcp endpoint listening");
        Ok(endpoint)
    }

    /// The bound listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Dial a remote peer, returning its neighbour id
    pub async fn connect(self: &Arc<Self>, addr: &str, port: u16) -> Result<u16> {
        let stream = TcpStream::connect((addr, port)).await.map_err(|err| {
            TangleError::connection_failed(format!("{addr}:{port}"), err.to_string())
        })?;
        debug!(addr, port, "outbound tcp peer");
        self.register_peer(stream).await
    }

    /// Number of currently connected peers
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Abort the accept loop and all per-peer tasks
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.peers.write().await.clear();
    }

    async fn register_peer(self: &Arc<Self>, stream: TcpStream) -> Result<u16> {
        let peer = self.next_peer.fetch_add(1, Ordering::Relaxed);
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(self.queue_depth);

        self.peers.write().await.insert(peer, outbound_tx);

        let writer = {
            let endpoint = Arc::clone(self);
            tokio::spawn(async move {
                endpoint.write_loop(peer, write_half, outbound_rx).await;
            })
        };
        let reader = {
            let endpoint = Arc::clone(self);
            tokio::spawn(async move {
                endpoint.read_loop(peer, read_half).await;
            })
        };

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(writer);
        tasks.push(reader);
        Ok(peer)
    }

    async fn write_loop(
        &self,
        peer: u16,
        mut half: OwnedWriteHalf,
        mut outbound: mpsc::Receiver<Vec<u8>>,
    ) {
        while let Some(bytes) = outbound.recv().await {
            let prefix = (bytes.len() as u32).to_be_bytes();
            if half.write_all(&prefix).await.is_err() || half.write_all(&bytes).await.is_err() {
                break;
            }
        }
        debug!(peer, "tcp writer closed");
        self.peers.write().await.remove(&peer);
    }

    async fn read_loop(&self, peer: u16, mut half: OwnedReadHalf) {
        loop {
            let mut prefix = [0u8; LEN_PREFIX];
            if half.read_exact(&mut prefix).await.is_err() {
                break;
            }

            // The prefix is peer-controlled; cap it before allocating
            let len = u32::from_be_bytes(prefix) as usize;
            if len == 0 || len > self.codec.max_frame_size() {
                warn!(peer, len, "dropping peer over bad frame length");
                break;
            }

            let mut buf = vec![0u8; len];
            if half.read_exact(&mut buf).await.is_err() {
                break;
            }

            let frame = match self.codec.decode(&buf) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(peer, %err, "dropping malformed tcp frame");
                    continue;
                }
            };

            if self
                .inbound_tx
                .send((frame, Neighbour::Single(peer)))
                .await
                .is_err()
            {
                break;
            }
        }
        debug!(peer, "tcp reader closed");
        self.peers.write().await.remove(&peer);
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
    async fn send(&self, frame: Frame, neighbour: Neighbour) -> Result<()> {
        let bytes = self.codec.encode(&frame)?;

        match neighbour {
            Neighbour::Single(peer) => {
                let peers = self.peers.read().await;
                let tx = peers.get(&peer).ok_or(TangleError::Transport(
                    TransportError::UnknownNeighbour { neighbour: peer },
                ))?;
                tx.send(bytes)
                    .await
                    .map_err(|_| TangleError::Transport(TransportError::QueueClosed))
            }
            Neighbour::Flood => {
                // A dead peer must not block delivery to the others
                let peers = self.peers.read().await;
                for tx in peers.values() {
                    let _ = tx.send(bytes.clone()).await;
                }
                Ok(())
            }
        }
    }

    async fn next(&self) -> Result<(Frame, Neighbour)> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TangleError::Transport(TransportError::QueueClosed))
    }

    fn size_hint(&self) -> usize {
        u32::MAX as usize
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_core::Identity;

    fn test_frame(seq: u64) -> Frame {
        Frame::new(Identity::new([7u8; 32]), seq, b"over tcp".to_vec())
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let codec = FrameCodec::default();
        let server = TcpEndpoint::bind(0, codec, 16).await.unwrap();
        let client = TcpEndpoint::bind(0, codec, 16).await.unwrap();

        let server_peer = client
            .connect("127.0.0.1", server.local_addr().port())
            .await
            .unwrap();

        // Client -> server
        client
            .send(test_frame(1), Neighbour::Single(server_peer))
            .await
            .unwrap();
        let (frame, from) = server.next().await.unwrap();
        assert_eq!(frame, test_frame(1));

        // Server -> client, back along the same connection
        server.send(test_frame(2), from).await.unwrap();
        let (frame, _) = client.next().await.unwrap();
        assert_eq!(frame, test_frame(2));

        server.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_flood_reaches_all_peers() {
        let codec = FrameCodec::default();
        let hub = TcpEndpoint::bind(0, codec, 16).await.unwrap();
        let a = TcpEndpoint::bind(0, codec, 16).await.unwrap();
        let b = TcpEndpoint::bind(0, codec, 16).await.unwrap();

        a.connect("127.0.0.1", hub.local_addr().port()).await.unwrap();
        b.connect("127.0.0.1", hub.local_addr().port()).await.unwrap();

        // Wait until the hub has registered both inbound peers
        while hub.peer_count().await < 2 {
            tokio::task::yield_now().await;
        }

        hub.send(test_frame(3), Neighbour::Flood).await.unwrap();
        assert_eq!(a.next().await.unwrap().0, test_frame(3));
        assert_eq!(b.next().await.unwrap().0, test_frame(3));

        hub.shutdown().await;
        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_neighbour_is_an_error() {
        let codec = FrameCodec::default();
        let endpoint = TcpEndpoint::bind(0, codec, 16).await.unwrap();

        let err = endpoint
            .send(test_frame(1), Neighbour::Single(99))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TangleError::Transport(TransportError::UnknownNeighbour { neighbour: 99 })
        ));
        endpoint.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_drops_peer() {
        let codec = FrameCodec::new(64);
        let endpoint = TcpEndpoint::bind(0, codec, 16).await.unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", endpoint.local_addr().port()))
            .await
            .unwrap();
        while endpoint.peer_count().await < 1 {
            tokio::task::yield_now().await;
        }

        // A hostile prefix far past the codec limit must hang up the
        // peer, not allocate the claimed buffer
        stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        let mut buf = [0u8; 1];
        assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
        while endpoint.peer_count().await > 0 {
            tokio::task::yield_now().await;
        }
        endpoint.shutdown().await;
    }

    #[tokio::test]
    async fn test_finished_peer_tasks_pruned() {
        let codec = FrameCodec::default();
        let server = TcpEndpoint::bind(0, codec, 16).await.unwrap();

        // Churn a few short-lived peers
        for _ in 0..3 {
            let client = TcpStream::connect(("127.0.0.1", server.local_addr().port()))
                .await
                .unwrap();
            while server.peer_count().await < 1 {
                tokio::task::yield_now().await;
            }
            drop(client);
            while server.peer_count().await > 0 {
                tokio::task::yield_now().await;
            }
        }

        // Wait until only the accept loop is still running
        loop {
            let live = server
                .tasks
                .lock()
                .await
                .iter()
                .filter(|task| !task.is_finished())
                .count();
            if live == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        // Registering the next peer sweeps the dead handles out
        let client = TcpEndpoint::bind(0, codec, 16).await.unwrap();
        client
            .connect("127.0.0.1", server.local_addr().port())
            .await
            .unwrap();
        while server.tasks.lock().await.len() < 3 {
            tokio::task::yield_now().await;
        }
        // Accept loop plus the live peer's reader/writer pair; the dead
        // pairs are gone
        assert_eq!(server.tasks.lock().await.len(), 3);

        server.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let codec = FrameCodec::default();
        let endpoint = TcpEndpoint::bind(0, codec, 16).await.unwrap();

        // Nothing listens on the endpoint's own port + 1 in all likelihood;
        // use a freshly bound-then-dropped port instead for determinism.
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let dead_port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(endpoint.connect("127.0.0.1", dead_port).await.is_err());
        endpoint.shutdown().await;
    }
}
