//! UDP host for the scoreboard engine

use crate::client_manager::ClientManager;
use crate::lobby::Lobby;
use crate::registry::Registry;
use crate::sidebar::Sidebar;
use crate::transport::{Transport, TransportError};
use crate::viewer::{Viewer, ViewerId};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, ScoreboardPacket, CLIENT_TIMEOUT_SECS, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { viewer: Viewer },
    Shutdown,
}

/// Messages sent to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    SendToViewers {
        packet: Packet,
        viewers: Vec<ViewerId>,
    },
    /// Acknowledged once every earlier message has been written
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// Scoreboard transport that queues packets for the UDP sender task
#[derive(Debug, Clone)]
pub struct UdpTransport {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl UdpTransport {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl Transport for UdpTransport {
    fn send_update(
        &self,
        packet: &ScoreboardPacket,
        viewers: &[ViewerId],
    ) -> Result<(), TransportError> {
        self.game_tx
            .send(GameMessage::SendToViewers {
                packet: Packet::Scoreboard(packet.clone()),
                viewers: viewers.to_vec(),
            })
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Asks a running server to close its boards and stop
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    sidebar: Arc<Sidebar>,
    lobby: Lobby,
    tick_duration: Duration,
    tasks: Vec<JoinHandle<()>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        title: &str,
    ) -> ServerResult<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let registry = Arc::new(Registry::new(Arc::new(UdpTransport::new(game_tx.clone()))));
        let lobby = Lobby::new(&registry, title);
        let sidebar = Arc::new(Sidebar::new(registry));

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            sidebar,
            lobby,
            tick_duration,
            tasks: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn sidebar(&self) -> Arc<Sidebar> {
        Arc::clone(&self.sidebar)
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(self.sidebar.registry())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task to receive and deserialize incoming packets
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that resolves viewer addresses and writes datagrams in
    /// queue order
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToViewers { packet, viewers } => {
                        let addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.addrs_for(&viewers)
                        };

                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to viewer at {}: {}", addr, e);
                            }
                        }
                    }
                    GameMessage::Flush { done } => {
                        let _ = done.send(());
                    }
                }
            }
        }));
    }

    /// Spawns task that drops viewers silent for longer than the client timeout
    fn spawn_timeout_checker(&mut self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            let timeout = Duration::from_secs(CLIENT_TIMEOUT_SECS);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for viewer in timed_out {
                    info!("Viewer {} timed out", viewer.id());
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { viewer }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        }));
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> ServerResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                info!(
                    "Viewer {:?} connecting from {} (version: {})",
                    name, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Reconnect from the same address replaces the old session
                let existing = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|id| clients.remove_client(id))
                };
                if let Some(existing) = existing {
                    info!("Replacing viewer {} from {}", existing.id(), addr);
                    self.handle_viewer_left(&existing);
                }

                let viewer = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, &name)
                };

                match viewer {
                    Some(viewer) => {
                        self.send_packet(
                            Packet::Connected {
                                viewer_id: viewer.id().0,
                            },
                            addr,
                        );
                        self.sidebar.registry().on_viewer_connected(&viewer);
                        self.lobby.join(&viewer);
                    }
                    None => {
                        self.send_packet(
                            Packet::Disconnected {
                                reason: "Server full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Heartbeat => {
                let known = self.clients.write().await.touch(addr);
                if !known {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::Disconnect => {
                let viewer = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|id| clients.remove_client(id))
                };

                if let Some(viewer) = viewer {
                    self.handle_viewer_left(&viewer);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn handle_viewer_left(&mut self, viewer: &Viewer) {
        self.lobby.leave(viewer);
        self.sidebar.registry().on_viewer_disconnected(viewer);
        self.sidebar.on_viewer_disconnected(viewer.id());
    }

    /// Closes every board and waits briefly for the remove packets to go out
    async fn shutdown(&mut self) {
        info!("Server shutting down");
        self.sidebar.close();

        let (done_tx, done_rx) = oneshot::channel();
        if self.game_tx.send(GameMessage::Flush { done: done_tx }).is_ok()
            && tokio::time::timeout(Duration::from_secs(1), done_rx)
                .await
                .is_err()
        {
            warn!("Timed out flushing outgoing packets");
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { viewer }) => {
                            self.handle_viewer_left(&viewer);
                        },
                        Some(ServerMessage::Shutdown) | None => break,
                    }
                },

                _ = tick_interval.tick() => {
                    self.lobby.tick(&self.sidebar);

                    if self.lobby.ticks() % 60 == 0 {
                        let client_count = self.clients.read().await.len();
                        if client_count > 0 {
                            debug!("Tick {}: {} viewers", self.lobby.ticks(), client_count);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C");
                    break;
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }
}
