use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, ScoreboardPacket, HEARTBEAT_INTERVAL_MS, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// What the connection reports to the render loop
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { viewer_id: u32 },
    Disconnected { reason: String },
    Scoreboard(ScoreboardPacket),
}

pub struct Connection {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    viewer_id: Option<u32>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Connection {
    pub async fn new(
        server_addr: &str,
        name: &str,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> ClientResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Connection {
            socket,
            server_addr,
            name: name.to_string(),
            viewer_id: None,
            events,
        })
    }

    pub fn viewer_id(&self) -> Option<u32> {
        self.viewer_id
    }

    pub fn is_connected(&self) -> bool {
        self.viewer_id.is_some()
    }

    async fn connect(&mut self) -> ClientResult<()> {
        info!("Connecting to {} as {}...", self.server_addr, self.name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> ClientResult<()> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Updates connection state and turns a server packet into an event
    pub fn handle_packet(&mut self, packet: Packet) -> Option<ClientEvent> {
        match packet {
            Packet::Connected { viewer_id } => {
                info!("Connected! Viewer ID: {}", viewer_id);
                self.viewer_id = Some(viewer_id);
                Some(ClientEvent::Connected { viewer_id })
            }
            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.viewer_id = None;
                Some(ClientEvent::Disconnected { reason })
            }
            Packet::Scoreboard(update) => Some(ClientEvent::Scoreboard(update)),
            other => {
                warn!("Unexpected packet type: {:?}", other);
                None
            }
        }
    }

    /// Runs until `shutdown` fires or the event receiver goes away, then
    /// tells the server we are leaving.
    pub async fn run(&mut self, mut shutdown: oneshot::Receiver<()>) -> ClientResult<()> {
        self.connect().await?;

        let mut heartbeat = interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => {
                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    if let Some(event) = self.handle_packet(packet) {
                                        if self.events.send(event).is_err() {
                                            debug!("Event receiver dropped");
                                            break;
                                        }
                                    }
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat.tick() => {
                    if self.is_connected() {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = &mut shutdown => break,
            }
        }

        if self.is_connected() {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
