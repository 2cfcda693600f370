//! Command handlers for the tangle CLI

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use tangle_runtime::{Identity, RoomId, Session, UserAuth};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
        let session_config = config.session.session_config(cli.port);
        let session = Session::bind(session_config).await?;
        info!(port = session.local_port(), "node listening");

        let mut peers = config.peers.clone();
        peers.extend(cli.peers.iter().cloned());

        match cli.command {
            Commands::Listen { name } => {
                Self::handle_listen(session, &config, &peers, name).await
            }
            Commands::Send { to, message } => {
                Self::handle_send(session, &config, &peers, to, message).await
            }
            Commands::Users { wait } => Self::handle_users(session, &peers, wait).await,
            Commands::Status => Self::handle_status(session, &peers).await,
        }
    }

    /// Handle the listen command: run a node until interrupted, printing
    /// messages as they arrive
    async fn handle_listen(
        session: Session,
        config: &AppConfig,
        peers: &[String],
        name: String,
    ) -> anyhow::Result<()> {
        let (auth, profile) = Self::create_identity(&session, config, &name).await?;
        Self::connect_all(&session, peers).await;
        println!("Listening as {} ({})", profile.label(), profile.id);

        let mut printed: HashMap<RoomId, usize> = HashMap::new();
        let mut known_users = 0;
        let mut ticker = tokio::time::interval(Duration::from_millis(500));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {
                    Self::print_new_users(&session, &mut known_users).await;
                    Self::print_new_messages(&session, &auth, &mut printed).await;
                }
            }
        }

        session.shutdown().await;
        Ok(())
    }

    /// Handle the send command: one message into a 1-on-1 room, then exit
    async fn handle_send(
        session: Session,
        config: &AppConfig,
        peers: &[String],
        to: String,
        message: String,
    ) -> anyhow::Result<()> {
        if peers.is_empty() {
            warn!("no peers given; the message will only reach link neighbours");
        }

        let recipient: Identity = to
            .parse()
            .with_context(|| format!("invalid recipient identity {to}"))?;

        let (auth, _) = Self::create_identity(&session, config, "Courier").await?;
        Self::connect_all(&session, peers).await;

        // Give the recipient a chance to announce so the room gets a
        // readable name
        for _ in 0..50 {
            if session.user(recipient).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let room = session.create_room(&auth, None, vec![recipient]).await?;
        let sent = session.send_message(&auth, room.id, message).await?;
        println!("Message sent to {} (ID: {})", recipient, sent.id);

        // Let the flood drain before tearing the node down
        tokio::time::sleep(Duration::from_secs(2)).await;
        session.shutdown().await;
        Ok(())
    }

    /// Handle the users command: wait for announcements, then list them
    async fn handle_users(session: Session, peers: &[String], wait: u64) -> anyhow::Result<()> {
        Self::connect_all(&session, peers).await;

        println!("Listening for announcements for {wait}s...");
        tokio::time::sleep(Duration::from_secs(wait)).await;

        let users = session.remote_users().await;
        if users.is_empty() {
            println!("No users discovered");
        } else {
            println!("Discovered {} user(s):", users.len());
            for user in users {
                println!("  {}  {}", user.id, user.label());
            }
        }

        session.shutdown().await;
        Ok(())
    }

    /// Handle the status command
    async fn handle_status(session: Session, peers: &[String]) -> anyhow::Result<()> {
        Self::connect_all(&session, peers).await;

        println!("Tangle node status:");
        println!("  listening port: {}", session.local_port());
        println!("  tcp peers:      {}", session.peer_count().await);
        println!("  local users:    {}", session.users().await.len());
        println!("  known users:    {}", session.remote_users().await.len());

        session.shutdown().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Create the node-local user from config plus the given name
    async fn create_identity(
        session: &Session,
        config: &AppConfig,
        name: &str,
    ) -> anyhow::Result<(UserAuth, tangle_runtime::UserProfile)> {
        let handle = config
            .identity
            .handle
            .clone()
            .unwrap_or_else(|| format!("@{}", name.to_lowercase()));
        let pair = session
            .create_user(handle, name, &config.identity.password)
            .await?;
        Ok(pair)
    }

    /// Dial every configured peer; a dead peer is a warning, not an exit
    async fn connect_all(session: &Session, peers: &[String]) {
        for peer in peers {
            let (host, port) = match parse_peer(peer) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(peer, %err, "skipping malformed peer");
                    continue;
                }
            };
            match session.connect_tcp(&host, port).await {
                Ok(()) => info!(peer, "connected"),
                Err(err) => warn!(peer, %err, "failed to connect"),
            }
        }
    }

    async fn print_new_users(session: &Session, known: &mut usize) {
        let users = session.remote_users().await;
        if users.len() > *known {
            for user in &users[*known..] {
                println!("* {} joined the network", user.label());
            }
            *known = users.len();
        }
    }

    async fn print_new_messages(
        session: &Session,
        auth: &UserAuth,
        printed: &mut HashMap<RoomId, usize>,
    ) {
        for room in session.rooms().await {
            if !room.has_participant(auth.id()) {
                continue;
            }
            if room.unread == 0 && printed.contains_key(&room.id) {
                continue;
            }
            let messages = match session.load_messages(auth, room.id).await {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(room = %room.id, %err, "failed to load messages");
                    continue;
                }
            };

            let seen = printed.entry(room.id).or_insert(0);
            for message in &messages[*seen..] {
                let sender = session
                    .user(message.sender)
                    .await
                    .map(|profile| profile.label())
                    .unwrap_or_else(|_| message.sender.short());
                println!("[{}] {}: {}", room.name, sender, message.content);
            }
            *seen = messages.len();
        }
    }
}

/// Split a `host:port` peer address
fn parse_peer(peer: &str) -> anyhow::Result<(String, u16)> {
    let Some((host, port)) = peer.rsplit_once(':') else {
        bail!("expected host:port, got {peer}");
    };
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in {peer}"))?;
    Ok((host.to_string(), port))
}
