//! Client network loop and the cancelable setup pipeline
//!
//! The client is purely reactive: it joins, mirrors the phase transitions
//! the server broadcasts, and relays the local player's discard choices
//! back. Entering SETUP spawns a presentation pipeline task; a single
//! watch-channel cancel flag is threaded through every suspension point so
//! a reset at any moment stops the pipeline without leaving anything
//! behind.

use crate::game::{ClientGame, ClientPhase, SetupIdentity, SetupProgress};
use crate::presentation::Presentation;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Packet, TokenInstance, TARGET_HAND_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, sleep};

/// Pause after the table pool is revealed, before drafts are dealt.
const TABLE_REVEAL_DELAY: Duration = Duration::from_millis(800);
/// Pause after the drafts are dealt, before discards are collected.
const DRAFT_DEAL_DELAY: Duration = Duration::from_millis(400);
/// How often to tell the server we are still here.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// What the setup pipeline reports back to the main loop. Events carry the
/// generation of the pipeline that produced them; an event outliving its
/// session in the queue must not act on a newer one.
#[derive(Debug)]
enum PipelineEvent {
    SubmitDiscards {
        generation: u64,
        discards: Vec<TokenInstance>,
    },
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    game: ClientGame,
    presentation: Arc<Mutex<Box<dyn Presentation>>>,

    pipeline_tx: mpsc::UnboundedSender<PipelineEvent>,
    pipeline_rx: mpsc::UnboundedReceiver<PipelineEvent>,
    cancel_tx: Option<watch::Sender<bool>>,
    pipeline_generation: u64,

    running: bool,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        presentation: Box<dyn Presentation>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        let (pipeline_tx, pipeline_rx) = mpsc::unbounded_channel();

        Ok(Client {
            socket,
            server_addr,
            game: ClientGame::new(),
            presentation: Arc::new(Mutex::new(presentation)),
            pipeline_tx,
            pipeline_rx,
            cancel_tx: None,
            pipeline_generation: 0,
            running: false,
        })
    }

    async fn connect(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Joining game at {}...", self.server_addr);
        self.send_packet(&Packet::JoinGame).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::JoinAccepted { client_id } => {
                info!("Joined! Client ID: {}", client_id);
                self.game.set_client_id(client_id);
            }

            Packet::JoinDenied { reason } => {
                warn!("Join denied: {}", reason);
                self.running = false;
            }

            Packet::SetupPhaseStart {
                first_turn_client_id,
                player1_client_id,
                player2_client_id,
                table_pool,
                player1_draft,
                player2_draft,
            } => {
                let identity = self.game.on_setup_start(
                    first_turn_client_id,
                    player1_client_id,
                    player2_client_id,
                    table_pool,
                    player1_draft,
                    player2_draft,
                );

                if let Some(identity) = identity {
                    info!(
                        "Setup started: we are player {}, opponent is {}",
                        if identity.is_player1 { 1 } else { 2 },
                        identity.op_client_id
                    );
                    self.start_setup_pipeline(identity);
                }
            }

            Packet::PlayPhaseStart {
                player1_dice,
                player2_dice,
            } => {
                if self.game.on_play_start() {
                    info!("Play phase started");
                    if let Some(identity) = self.game.identity() {
                        let (my_dice, op_dice) = if identity.is_player1 {
                            (player1_dice, player2_dice)
                        } else {
                            (player2_dice, player1_dice)
                        };
                        self.presentation.lock().await.replay_dice(&my_dice, &op_dice);
                    }
                }
            }

            Packet::GameReset => {
                info!("Game reset; returning to connecting");
                self.cancel_pipeline();
                self.presentation.lock().await.clear();
                self.game.reset();
            }

            _ => {
                warn!("Unexpected packet type from server");
            }
        }
    }

    /// Spawns the setup presentation pipeline for the session just started.
    /// Any previous pipeline is cancelled first, and the generation bump
    /// invalidates any of its events still sitting in the queue.
    fn start_setup_pipeline(&mut self, identity: SetupIdentity) {
        self.cancel_pipeline();
        self.pipeline_generation += 1;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_tx = Some(cancel_tx);

        let presentation = Arc::clone(&self.presentation);
        let submit_tx = self.pipeline_tx.clone();
        let table_pool = self.game.table_pool().to_vec();
        let my_draft = self.game.my_board().to_vec();
        let op_draft = self.game.op_board().to_vec();

        tokio::spawn(run_setup_pipeline(
            presentation,
            table_pool,
            my_draft,
            op_draft,
            identity,
            self.pipeline_generation,
            cancel_rx,
            submit_tx,
        ));
    }

    /// Raises the cancel flag for the current pipeline, if any. Safe to
    /// call when nothing is running, and safe to call repeatedly.
    fn cancel_pipeline(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(true);
        }
    }

    /// Applies the pipeline's discard selection to the local board and, if
    /// it checks out, submits it to the server. A selection from a
    /// cancelled session fails the generation check before it can touch
    /// the current session's state.
    async fn handle_submission(&mut self, generation: u64, discards: Vec<TokenInstance>) {
        if generation != self.pipeline_generation {
            warn!("Discard selection from a cancelled setup session; dropping");
            return;
        }

        if self.game.phase() != ClientPhase::Setup(SetupProgress::Drafting) {
            warn!("Stale discard selection; dropping");
            return;
        }

        self.game.begin_discards();

        for token in &discards {
            if !self.game.discard(token) {
                error!("Invalid discard selection; abandoning submission");
                return;
            }
        }

        if self.game.discards_needed() != 0 {
            error!(
                "Discard selection leaves {} tokens over target; not submitting",
                self.game.discards_needed()
            );
            return;
        }

        let packet = Packet::SetupPhaseEnd {
            discarded_tokens: discards,
        };
        match self.send_packet(&packet).await {
            Ok(()) => {
                info!("Discards submitted; hand is down to {}", TARGET_HAND_SIZE);
                self.game.mark_submitted();
            }
            Err(e) => error!("Error submitting discards: {}", e),
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;
        self.running = true;

        let mut keepalive = interval(KEEPALIVE_INTERVAL);
        let mut buffer = [0u8; 8192];

        while self.running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet).await;
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                Some(event) = self.pipeline_rx.recv() => {
                    match event {
                        PipelineEvent::SubmitDiscards { generation, discards } => {
                            self.handle_submission(generation, discards).await;
                        }
                    }
                },

                _ = keepalive.tick() => {
                    if self.game.client_id().is_some() {
                        if let Err(e) = self.send_packet(&Packet::KeepAlive).await {
                            error!("Error sending keep-alive: {}", e);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted; leaving the game");
                    self.running = false;
                },
            }
        }

        self.cancel_pipeline();
        let _ = self.send_packet(&Packet::ExitGame).await;

        Ok(())
    }
}

/// The SETUP presentation sequence: reveal the drawn pool, deal the drafts,
/// collect the player's discards, and hand the selection back to the main
/// loop. Every suspension point checks the shared cancel flag.
async fn run_setup_pipeline(
    presentation: Arc<Mutex<Box<dyn Presentation>>>,
    table_pool: Vec<TokenInstance>,
    my_draft: Vec<TokenInstance>,
    op_draft: Vec<TokenInstance>,
    identity: SetupIdentity,
    generation: u64,
    mut cancel_rx: watch::Receiver<bool>,
    submit_tx: mpsc::UnboundedSender<PipelineEvent>,
) {
    presentation.lock().await.reveal_table_pool(&table_pool);

    if wait_or_cancelled(TABLE_REVEAL_DELAY, &mut cancel_rx).await {
        return;
    }

    presentation
        .lock()
        .await
        .show_drafts(&my_draft, &op_draft, identity.is_first_turn);

    if wait_or_cancelled(DRAFT_DEAL_DELAY, &mut cancel_rx).await {
        return;
    }

    let discard_count = my_draft.len().saturating_sub(TARGET_HAND_SIZE);
    let discards = presentation
        .lock()
        .await
        .choose_discards(&my_draft, discard_count);

    if *cancel_rx.borrow() {
        return;
    }

    if submit_tx
        .send(PipelineEvent::SubmitDiscards {
            generation,
            discards,
        })
        .is_err()
    {
        warn!("Setup pipeline finished after the client shut down");
    }
}

/// Sleeps for `delay`, returning early with true if the cancel flag is
/// raised (or its sender is gone) before the delay elapses.
async fn wait_or_cancelled(delay: Duration, cancel_rx: &mut watch::Receiver<bool>) -> bool {
    if *cancel_rx.borrow() {
        return true;
    }

    tokio::select! {
        _ = sleep(delay) => false,
        changed = cancel_rx.changed() => match changed {
            Ok(()) => *cancel_rx.borrow(),
            Err(_) => true,
        },
    }
}
