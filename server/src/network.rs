//! Server network layer handling UDP communications and event routing
//!
//! The UDP socket, the connection table, and the game room meet here. Two
//! background tasks own the raw packet flow (one receiving, one sending)
//! and a third sweeps for timed-out peers; the main loop is the single
//! writer of game state, so room mutation needs no locking.

use crate::connection::ConnectionTable;
use crate::game::{GameRoom, Outgoing};
use crate::lobby::JoinOutcome;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u64,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the outgoing network task
#[derive(Debug)]
pub enum NetCommand {
    Send { addr: SocketAddr, packet: Packet },
    Broadcast { packet: Packet },
}

/// Main server coordinating networking and the authoritative game room
pub struct Server {
    socket: Arc<UdpSocket>,
    connections: Arc<RwLock<ConnectionTable>>,
    room: GameRoom,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    net_tx: mpsc::UnboundedSender<NetCommand>,
    net_rx: mpsc::UnboundedReceiver<NetCommand>,
}

impl Server {
    pub async fn new(addr: &str, room: GameRoom) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (net_tx, net_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            connections: Arc::new(RwLock::new(ConnectionTable::new())),
            room,
            server_tx,
            server_rx,
            net_tx,
            net_rx,
        })
    }

    /// The bound address, useful when the server was started on port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 8192];

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
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let connections = Arc::clone(&self.connections);
        let mut net_rx = std::mem::replace(&mut self.net_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(command) = net_rx.recv().await {
                match command {
                    NetCommand::Send { addr, packet } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    NetCommand::Broadcast { packet } => {
                        let client_addrs = {
                            let connections_guard = connections.read().await;
                            connections_guard.addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let connections = Arc::clone(&self.connections);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut connections_guard = connections.write().await;
                    connections_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Queues the room's outgoing messages, resolving client IDs to
    /// addresses now so a client removed right after (a denied join, an
    /// exit) still receives its final packet.
    async fn dispatch(&self, outgoing: Vec<Outgoing>) {
        for message in outgoing {
            let command = match message {
                Outgoing::Direct { client_id, packet } => {
                    let addr = {
                        let connections = self.connections.read().await;
                        connections.addr_of(client_id)
                    };

                    match addr {
                        Some(addr) => NetCommand::Send { addr, packet },
                        None => {
                            warn!("No address for client {}; dropping packet", client_id);
                            continue;
                        }
                    }
                }
                Outgoing::Broadcast { packet } => NetCommand::Broadcast { packet },
            };

            if let Err(e) = self.net_tx.send(command) {
                error!("Failed to queue outgoing packet: {}", e);
            }
        }
    }

    /// Processes incoming packets and drives the game room
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::JoinGame => {
                let known = {
                    let connections = self.connections.read().await;
                    connections.find_by_addr(addr)
                };

                let client_id = match known {
                    Some(client_id) => client_id,
                    None => {
                        let mut connections = self.connections.write().await;
                        connections.register(addr)
                    }
                };

                {
                    let mut connections = self.connections.write().await;
                    connections.mark_seen(client_id);
                }

                let (outcome, outgoing) = self.room.client_joined(client_id);
                self.dispatch(outgoing).await;

                // A denied newcomer gets no transport entry either, so the
                // lobby-full rejection leaves no trace of the peer.
                if outcome == JoinOutcome::Full && known.is_none() {
                    let mut connections = self.connections.write().await;
                    connections.remove(client_id);
                }
            }

            Packet::ExitGame => {
                let client_id = {
                    let connections = self.connections.read().await;
                    connections.find_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let outgoing = self.room.client_left(client_id);
                    self.dispatch(outgoing).await;

                    let mut connections = self.connections.write().await;
                    connections.remove(client_id);
                } else {
                    warn!("ExitGame from unknown address {}", addr);
                }
            }

            Packet::KeepAlive => {
                let client_id = {
                    let connections = self.connections.read().await;
                    connections.find_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let mut connections = self.connections.write().await;
                    connections.mark_seen(client_id);
                }
            }

            Packet::SetupPhaseEnd { discarded_tokens } => {
                let client_id = {
                    let connections = self.connections.read().await;
                    connections.find_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    {
                        let mut connections = self.connections.write().await;
                        connections.mark_seen(client_id);
                    }

                    let outgoing = self.room.setup_phase_end(client_id, &discarded_tokens);
                    self.dispatch(outgoing).await;
                } else {
                    warn!("SetupPhaseEnd from unknown address {}", addr);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    info!("Client {} timed out", client_id);
                    let outgoing = self.room.client_left(client_id);
                    self.dispatch(outgoing).await;
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
