//! The owned session
//!
//! A [`Session`] is the engine handle: bound to a listening port at
//! creation, it owns the stores, the endpoints and the router tasks, and
//! every operation of the protocol hangs off it. Call
//! [`shutdown`](Session::shutdown) to tear the engine down; there is no
//! detached state to pass around.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use tangle_core::{
    ChatMessage, ChatStore, Frame, FrameCodec, Identity, Payload, Result, Room, RoomId,
    SessionConfig, UserAuth, UserProfile, UserStore, UserUpdate,
};

use crate::endpoint::Endpoint;
use crate::handlers::handle_frame;
use crate::link::LinkEndpoint;
use crate::router::{FrameLedger, Router};
use crate::tcp::TcpEndpoint;

const LEDGER_CAPACITY: usize = 1024;

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

/// State shared between the session handle and its router tasks
pub(crate) struct SessionState {
    pub(crate) codec: FrameCodec,
    pub(crate) users: RwLock<UserStore>,
    pub(crate) chat: RwLock<ChatStore>,
    pub(crate) ledger: Mutex<FrameLedger>,
}

impl SessionState {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            codec: FrameCodec::new(config.max_frame_size),
            users: RwLock::new(UserStore::new()),
            chat: RwLock::new(ChatStore::new(config)),
            ledger: Mutex::new(FrameLedger::new(LEDGER_CAPACITY)),
        }
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// An owned, running engine instance
pub struct Session {
    state: Arc<SessionState>,
    link: Arc<LinkEndpoint>,
    tcp: Arc<TcpEndpoint>,
    router: Arc<Router>,
    seq: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Bind a session to its listening port and start the engine
    pub async fn bind(config: SessionConfig) -> Result<Self> {
        let state = Arc::new(SessionState::new(&config));
        let codec = state.codec;

        let link = LinkEndpoint::new(codec, config.queue_depth);
        let tcp = TcpEndpoint::bind(config.port, codec, config.queue_depth).await?;

        let endpoints: Vec<Arc<dyn Endpoint>> = vec![link.clone(), tcp.clone()];
        let router = Arc::new(Router::new(endpoints));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let seq = Arc::new(AtomicU64::new(0));

        let mut tasks = Vec::new();
        for endpoint in router.endpoints() {
            tasks.push(spawn_inbound_pump(
                Arc::clone(endpoint),
                Arc::clone(&state),
                shutdown_rx.clone(),
            ));
        }
        tasks.push(spawn_announcer(
            Arc::clone(&state),
            Arc::clone(&router),
            Arc::clone(&seq),
            Duration::from_secs(config.announce_interval_secs),
            shutdown_rx,
        ));

        info!(port = tcp.local_addr().port(), "session up");
        Ok(Self {
            state,
            link,
            tcp,
            router,
            seq,
            shutdown_tx,
            tasks,
        })
    }

    /// The actual TCP port this session listens on
    pub fn local_port(&self) -> u16 {
        self.tcp.local_addr().port()
    }

    /// The platform link endpoint, for give/take integration
    pub fn link(&self) -> Arc<LinkEndpoint> {
        Arc::clone(&self.link)
    }

    /// Number of currently connected TCP peers
    pub async fn peer_count(&self) -> usize {
        self.tcp.peer_count().await
    }

    /// Peer this session's TCP endpoint to a remote server
    ///
    /// Announces all local users once connected so the new peer learns
    /// who lives here.
    pub async fn connect_tcp(&self, addr: &str, port: u16) -> Result<()> {
        self.tcp.connect(addr, port).await?;
        self.announce_all().await
    }

    /// Stop all engine tasks and close the endpoints
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.tcp.shutdown().await;
        info!("session down");
    }

    // ------------------------------------------------------------------
    // User Operations
    // ------------------------------------------------------------------

    /// Create a new local user and announce them to the network
    pub async fn create_user(
        &self,
        handle: impl Into<String>,
        display_name: impl Into<String>,
        password: &str,
    ) -> Result<(UserAuth, UserProfile)> {
        let (auth, profile) = self
            .state
            .users
            .write()
            .await
            .create(handle, display_name, password)?;
        self.emit(profile.id, Payload::Announce(profile.clone()))
            .await?;
        Ok((auth, profile))
    }

    /// Log in as an existing user via their id and password
    pub async fn login(&self, id: Identity, password: &str) -> Result<UserAuth> {
        self.state.users.write().await.login(id, password)
    }

    /// Revoke a login
    pub async fn logout(&self, auth: &UserAuth) -> Result<()> {
        self.state.users.write().await.logout(auth)
    }

    /// Check whether an auth still refers to a valid login
    pub async fn is_authenticated(&self, auth: &UserAuth) -> bool {
        self.state.users.read().await.is_authenticated(auth)
    }

    /// Get a user profile by id, local or remote
    pub async fn user(&self, id: Identity) -> Result<UserProfile> {
        self.state.users.read().await.get(id)
    }

    /// Update the authenticated user's profile and re-announce it
    pub async fn update_user(&self, auth: &UserAuth, update: UserUpdate) -> Result<UserProfile> {
        let profile = self.state.users.write().await.update(auth, update)?;
        self.emit(profile.id, Payload::Announce(profile.clone()))
            .await?;
        Ok(profile)
    }

    /// List local users
    pub async fn users(&self) -> Vec<UserProfile> {
        self.state.users.read().await.list()
    }

    /// List users discovered on the network
    pub async fn remote_users(&self) -> Vec<UserProfile> {
        self.state.users.read().await.list_remote()
    }

    // ------------------------------------------------------------------
    // Room and Message Operations
    // ------------------------------------------------------------------

    /// List all known rooms
    pub async fn rooms(&self) -> Vec<Room> {
        self.state.chat.read().await.rooms()
    }

    /// Get a room by id
    pub async fn room(&self, id: RoomId) -> Result<Room> {
        self.state.chat.read().await.room(id)
    }

    /// Start a new chat with some friends and tell them about it
    ///
    /// When no name is given, a 1-on-1 takes the friend's label and a
    /// group chat gets a name joined from the participants.
    pub async fn create_room(
        &self,
        auth: &UserAuth,
        name: Option<String>,
        friends: Vec<Identity>,
    ) -> Result<Room> {
        let room = {
            // Lock order everywhere: users before chat
            let users = self.state.users.read().await;
            let creator = users.authenticate(auth)?;
            let mut chat = self.state.chat.write().await;
            chat.create_room(creator, friends, name, |id| {
                users
                    .get(id)
                    .map(|profile| profile.label())
                    .unwrap_or_else(|_| id.short())
            })?
        };

        self.emit(auth.id(), Payload::RoomCreate(room.clone()))
            .await?;
        Ok(room)
    }

    /// Send a text message to a room, returning the stored message
    pub async fn send_message(
        &self,
        auth: &UserAuth,
        room: RoomId,
        content: impl Into<String>,
    ) -> Result<ChatMessage> {
        let message = {
            let users = self.state.users.read().await;
            let sender = users.authenticate(auth)?;
            let mut chat = self.state.chat.write().await;
            chat.send_message(sender, room, content)?
        };

        self.emit(auth.id(), Payload::Chat(message.clone())).await?;
        Ok(message)
    }

    /// Load all messages from a room, oldest first, clearing its unread
    /// counter
    pub async fn load_messages(&self, auth: &UserAuth, room: RoomId) -> Result<Vec<ChatMessage>> {
        let users = self.state.users.read().await;
        let reader = users.authenticate(auth)?;
        self.state.chat.write().await.load_messages(reader, room)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Sign and flood a payload as a local user
    async fn emit(&self, sender: Identity, payload: Payload) -> Result<()> {
        let frame = build_frame(&self.state, &self.seq, sender, &payload).await?;
        self.router.flood(frame).await
    }

    /// Announce every local user, e.g. after a new peering
    async fn announce_all(&self) -> Result<()> {
        let profiles = self.state.users.read().await.list();
        for profile in profiles {
            self.emit(profile.id, Payload::Announce(profile)).await?;
        }
        Ok(())
    }
}

/// Encode, number and sign a payload frame
async fn build_frame(
    state: &SessionState,
    seq: &AtomicU64,
    sender: Identity,
    payload: &Payload,
) -> Result<Frame> {
    let bytes = state.codec.encode_payload(payload)?;
    let frame = Frame::new(sender, seq.fetch_add(1, Ordering::Relaxed), bytes);
    let signature = state
        .users
        .read()
        .await
        .sign_local(sender, &frame.signable_bytes())?;
    Ok(frame.with_signature(signature))
}

// ----------------------------------------------------------------------------
// Engine Tasks
// ----------------------------------------------------------------------------

fn spawn_inbound_pump(
    endpoint: Arc<dyn Endpoint>,
    state: Arc<SessionState>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                inbound = endpoint.next() => match inbound {
                    Ok((frame, _neighbour)) => handle_frame(&state, frame).await,
                    Err(err) => {
                        debug!(%err, "endpoint closed, stopping pump");
                        break;
                    }
                }
            }
        }
    })
}

fn spawn_announcer(
    state: Arc<SessionState>,
    router: Arc<Router>,
    seq: Arc<AtomicU64>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        // The first tick fires immediately; skip it, creation already
        // announced
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let profiles = state.users.read().await.list();
                    for profile in profiles {
                        let id = profile.id;
                        let frame = match build_frame(&state, &seq, id, &Payload::Announce(profile)).await {
                            Ok(frame) => frame,
                            Err(err) => {
                                warn!(user = %id, %err, "failed to build announce");
                                continue;
                            }
                        };
                        if let Err(err) = router.flood(frame).await {
                            warn!(user = %id, %err, "announce flood failed");
                        }
                    }
                }
            }
        }
    })
}
