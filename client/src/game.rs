//! Client-side phase mirror and token bookkeeping
//!
//! The client never initiates a phase transition. It mirrors the server's
//! CONNECTING/SETUP/PLAY sequence as packets arrive, tracks the local copy
//! of both boards keyed by token identity, and validates the player's
//! discard choices before they are sent. `reset` may be called at any time,
//! from any state, repeatedly.

use log::warn;
use shared::{GamePhase, TokenInstance, TARGET_HAND_SIZE};

/// Sub-states of the SETUP phase on the client. The presentation pipeline
/// moves through these in order; a reset abandons them wherever they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupProgress {
    /// Tokens revealed, drafts being dealt.
    Drafting,
    /// Waiting for the local player to discard down to the target hand.
    AwaitingDiscards,
    /// Discards sent to the server; waiting for PLAY.
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Connecting,
    Setup(SetupProgress),
    Play,
}

impl ClientPhase {
    pub fn game_phase(&self) -> GamePhase {
        match self {
            ClientPhase::Connecting => GamePhase::Connecting,
            ClientPhase::Setup(_) => GamePhase::Setup,
            ClientPhase::Play => GamePhase::Play,
        }
    }
}

/// Identity facts derived from a SetupPhaseStart broadcast.
#[derive(Debug, Clone, Copy)]
pub struct SetupIdentity {
    pub my_client_id: u64,
    pub op_client_id: u64,
    pub is_player1: bool,
    pub is_first_turn: bool,
}

pub struct ClientGame {
    phase: ClientPhase,
    client_id: Option<u64>,
    identity: Option<SetupIdentity>,
    my_board: Vec<TokenInstance>,
    op_board: Vec<TokenInstance>,
    table_pool: Vec<TokenInstance>,
}

impl Default for ClientGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGame {
    pub fn new() -> Self {
        Self {
            phase: ClientPhase::Connecting,
            client_id: None,
            identity: None,
            my_board: Vec::new(),
            op_board: Vec::new(),
            table_pool: Vec::new(),
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn client_id(&self) -> Option<u64> {
        self.client_id
    }

    pub fn identity(&self) -> Option<SetupIdentity> {
        self.identity
    }

    pub fn my_board(&self) -> &[TokenInstance] {
        &self.my_board
    }

    pub fn op_board(&self) -> &[TokenInstance] {
        &self.op_board
    }

    pub fn table_pool(&self) -> &[TokenInstance] {
        &self.table_pool
    }

    /// Records the ID the server assigned us on join.
    pub fn set_client_id(&mut self, client_id: u64) {
        self.client_id = Some(client_id);
    }

    /// Enters SETUP from a SetupPhaseStart broadcast. Returns the derived
    /// identity, or None if the message is out of phase or we don't yet
    /// know our own client ID.
    #[allow(clippy::too_many_arguments)]
    pub fn on_setup_start(
        &mut self,
        first_turn_client_id: u64,
        player1_client_id: u64,
        player2_client_id: u64,
        table_pool: Vec<TokenInstance>,
        player1_draft: Vec<TokenInstance>,
        player2_draft: Vec<TokenInstance>,
    ) -> Option<SetupIdentity> {
        if self.phase != ClientPhase::Connecting {
            warn!("SetupPhaseStart received outside CONNECTING; ignoring");
            return None;
        }

        let my_client_id = match self.client_id {
            Some(id) => id,
            None => {
                warn!("SetupPhaseStart received before join was accepted; ignoring");
                return None;
            }
        };

        let is_player1 = my_client_id == player1_client_id;
        if !is_player1 && my_client_id != player2_client_id {
            warn!("SetupPhaseStart does not name us as a player; ignoring");
            return None;
        }

        let identity = SetupIdentity {
            my_client_id,
            op_client_id: if is_player1 {
                player2_client_id
            } else {
                player1_client_id
            },
            is_player1,
            is_first_turn: my_client_id == first_turn_client_id,
        };

        let (my_draft, op_draft) = if is_player1 {
            (player1_draft, player2_draft)
        } else {
            (player2_draft, player1_draft)
        };

        self.identity = Some(identity);
        self.my_board = my_draft;
        self.op_board = op_draft;
        self.table_pool = table_pool;
        self.phase = ClientPhase::Setup(SetupProgress::Drafting);

        Some(identity)
    }

    /// Drafts are dealt; the player may now discard.
    pub fn begin_discards(&mut self) {
        if self.phase == ClientPhase::Setup(SetupProgress::Drafting) {
            self.phase = ClientPhase::Setup(SetupProgress::AwaitingDiscards);
        }
    }

    /// How many more tokens must go before the hand is at target size.
    pub fn discards_needed(&self) -> usize {
        self.my_board.len().saturating_sub(TARGET_HAND_SIZE)
    }

    /// Removes one token from the local board. Rejects tokens we don't
    /// hold and discards outside the discard window.
    pub fn discard(&mut self, token: &TokenInstance) -> bool {
        if self.phase != ClientPhase::Setup(SetupProgress::AwaitingDiscards) {
            warn!("Discard of {} outside the discard window", token);
            return false;
        }

        let before = self.my_board.len();
        self.my_board.retain(|t| t != token);

        if self.my_board.len() == before {
            warn!("Discard of {} which is not on our board", token);
            return false;
        }

        true
    }

    /// The discard submission has been handed to the network layer.
    pub fn mark_submitted(&mut self) {
        if self.phase == ClientPhase::Setup(SetupProgress::AwaitingDiscards) {
            self.phase = ClientPhase::Setup(SetupProgress::Submitted);
        }
    }

    /// Enters PLAY. Valid from any SETUP sub-state: the server only sends
    /// PlayPhaseStart once both discard submissions are in.
    pub fn on_play_start(&mut self) -> bool {
        match self.phase {
            ClientPhase::Setup(_) => {
                self.phase = ClientPhase::Play;
                true
            }
            _ => {
                warn!("PlayPhaseStart received outside SETUP; ignoring");
                false
            }
        }
    }

    /// Unconditional return to CONNECTING. Safe to call in any state, any
    /// number of times; afterwards no token or identity state remains.
    pub fn reset(&mut self) {
        self.phase = ClientPhase::Connecting;
        self.identity = None;
        self.my_board.clear();
        self.op_board.clear();
        self.table_pool.clear();
    }
}
