//! Authoritative phase state machine
//!
//! `GameRoom` owns the whole session: the player seats, the token catalog,
//! the RNG, and the current phase. Phases form a sum type so each phase's
//! state exists exactly while that phase is active; dropping a
//! `SetupSession` on exit is what guarantees no partial-discard state leaks
//! into the next setup.
//!
//! The room never touches the network. Event handlers return the packets to
//! send as `Outgoing` values, which the network layer routes; every payload
//! is a snapshot, never a view into the room's own mutable state.

use crate::catalog::TokenCatalog;
use crate::dice;
use crate::lobby::{JoinOutcome, PlayerSlots};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    DiceOutcome, GamePhase, Packet, TokenInstance, BAG_TOKEN_COUNT, DICE_PER_PLAYER, DICE_SIDES,
    DRAFT_TOKEN_COUNT,
};
use std::collections::HashSet;

/// A packet the network layer should deliver on the room's behalf.
#[derive(Debug)]
pub enum Outgoing {
    Direct { client_id: u64, packet: Packet },
    Broadcast { packet: Packet },
}

/// Server-side state scoped to the SETUP phase. Created on entry, dropped
/// on any exit.
pub struct SetupSession {
    pub first_turn_client_id: u64,
    pub player1_client_id: u64,
    pub player2_client_id: u64,
    player1_board: Vec<TokenInstance>,
    player2_board: Vec<TokenInstance>,
    completed: HashSet<u64>,
}

impl SetupSession {
    pub fn board_of(&self, client_id: u64) -> Option<&[TokenInstance]> {
        if client_id == self.player1_client_id {
            Some(&self.player1_board)
        } else if client_id == self.player2_client_id {
            Some(&self.player2_board)
        } else {
            None
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// State carried into PLAY: the post-discard boards and the opening rolls.
pub struct PlayState {
    pub current_turn_client_id: u64,
    pub player1_board: Vec<TokenInstance>,
    pub player2_board: Vec<TokenInstance>,
    pub player1_dice: Vec<DiceOutcome>,
    pub player2_dice: Vec<DiceOutcome>,
}

enum Phase {
    Connecting,
    Setup(SetupSession),
    Play(PlayState),
}

pub struct GameRoom {
    slots: PlayerSlots,
    catalog: TokenCatalog,
    rng: StdRng,
    phase: Phase,
}

impl GameRoom {
    pub fn new(catalog: TokenCatalog) -> Self {
        Self::with_rng(catalog, StdRng::from_entropy())
    }

    /// Seeded constructor for deterministic tests.
    pub fn with_rng(catalog: TokenCatalog, rng: StdRng) -> Self {
        Self {
            slots: PlayerSlots::new(),
            catalog,
            rng,
            phase: Phase::Connecting,
        }
    }

    pub fn phase(&self) -> GamePhase {
        match self.phase {
            Phase::Connecting => GamePhase::Connecting,
            Phase::Setup(_) => GamePhase::Setup,
            Phase::Play(_) => GamePhase::Play,
        }
    }

    pub fn slots(&self) -> &PlayerSlots {
        &self.slots
    }

    pub fn setup_session(&self) -> Option<&SetupSession> {
        match &self.phase {
            Phase::Setup(session) => Some(session),
            _ => None,
        }
    }

    pub fn play_state(&self) -> Option<&PlayState> {
        match &self.phase {
            Phase::Play(state) => Some(state),
            _ => None,
        }
    }

    /// Seats the client, or rejects it when both seats are taken. The
    /// second seat filling triggers CONNECTING -> SETUP.
    pub fn client_joined(&mut self, client_id: u64) -> (JoinOutcome, Vec<Outgoing>) {
        let outcome = self.slots.join(client_id);
        let mut outgoing = Vec::new();

        match outcome {
            JoinOutcome::Seated => {
                outgoing.push(Outgoing::Direct {
                    client_id,
                    packet: Packet::JoinAccepted { client_id },
                });

                if self.slots.both_seated() {
                    if matches!(self.phase, Phase::Connecting) {
                        outgoing.extend(self.enter_setup());
                    } else {
                        error!("Both seats filled while in {}", self.phase());
                    }
                }
            }
            JoinOutcome::AlreadySeated => {
                // Resend the accept so a retried join converges.
                warn!("Client {} joined twice", client_id);
                outgoing.push(Outgoing::Direct {
                    client_id,
                    packet: Packet::JoinAccepted { client_id },
                });
            }
            JoinOutcome::Full => {
                warn!("Join rejected for client {}: lobby full", client_id);
                outgoing.push(Outgoing::Direct {
                    client_id,
                    packet: Packet::JoinDenied {
                        reason: "lobby full".to_string(),
                    },
                });
            }
        }

        (outcome, outgoing)
    }

    /// Tears the session down to CONNECTING from any phase. Phase state is
    /// dropped wholesale, so an in-flight setup leaves nothing behind.
    pub fn client_left(&mut self, client_id: u64) -> Vec<Outgoing> {
        if !self.slots.leave(client_id) {
            warn!("Exit from client {} which holds no seat", client_id);
            return Vec::new();
        }

        info!(
            "Client {} left during {}; session reset to CONNECTING",
            client_id,
            self.phase()
        );
        self.phase = Phase::Connecting;

        vec![Outgoing::Broadcast {
            packet: Packet::GameReset,
        }]
    }

    /// A client reports its discard selection. The submission is rejected
    /// outright if it arrives outside SETUP, from a non-seated client, or
    /// names any token not on the sender's board. Completions are tracked
    /// per client ID, so resubmitting is idempotent and the two players'
    /// completions commute.
    pub fn setup_phase_end(
        &mut self,
        client_id: u64,
        discarded: &[TokenInstance],
    ) -> Vec<Outgoing> {
        let session = match &mut self.phase {
            Phase::Setup(session) => session,
            _ => {
                warn!(
                    "SetupPhaseEnd from client {} outside SETUP; ignoring",
                    client_id
                );
                return Vec::new();
            }
        };

        if session.completed.contains(&client_id) {
            warn!(
                "Client {} already completed setup; ignoring resubmission",
                client_id
            );
            return Vec::new();
        }

        let board = if client_id == session.player1_client_id {
            &mut session.player1_board
        } else if client_id == session.player2_client_id {
            &mut session.player2_board
        } else {
            warn!("SetupPhaseEnd from non-seated client {}", client_id);
            return Vec::new();
        };

        if let Some(foreign) = discarded.iter().find(|t| !board.contains(t)) {
            warn!(
                "Client {} tried to discard {} which is not on their board",
                client_id, foreign
            );
            return Vec::new();
        }

        board.retain(|t| !discarded.contains(t));
        session.completed.insert(client_id);
        info!(
            "Client {} finished setup ({} of 2)",
            client_id,
            session.completed.len()
        );

        let both_done = session.completed.len() == 2;
        if both_done {
            self.enter_play()
        } else {
            Vec::new()
        }
    }

    fn enter_setup(&mut self) -> Vec<Outgoing> {
        let (player1, player2) = match (self.slots.player1(), self.slots.player2()) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => {
                error!("SETUP entered without two seated players");
                return Vec::new();
            }
        };

        // One coin flip decides who opens.
        let first_turn = if self.rng.gen_range(0..2) == 0 {
            player1
        } else {
            player2
        };

        let mut drawn = match self.catalog.draw_selection(BAG_TOKEN_COUNT, &mut self.rng) {
            Ok(tokens) => tokens,
            Err(e) => {
                // Configuration error: abandon this session, keep the process.
                // Seats are cleared too; a full lobby stuck in CONNECTING
                // could never re-enter SETUP, so the clients must re-join.
                error!("Token draw failed, resetting session: {}", e);
                self.slots = PlayerSlots::new();
                self.phase = Phase::Connecting;
                return vec![Outgoing::Broadcast {
                    packet: Packet::GameReset,
                }];
            }
        };

        let table_pool = drawn.clone();

        // Alternating pairs off the front: p1, p2, p1, p2, ...
        let mut player1_draft = Vec::with_capacity(DRAFT_TOKEN_COUNT);
        let mut player2_draft = Vec::with_capacity(DRAFT_TOKEN_COUNT);
        for _ in 0..DRAFT_TOKEN_COUNT {
            player1_draft.push(drawn.remove(0));
            player2_draft.push(drawn.remove(0));
        }

        info!(
            "Entering SETUP: player1={}, player2={}, first turn={}",
            player1, player2, first_turn
        );

        self.phase = Phase::Setup(SetupSession {
            first_turn_client_id: first_turn,
            player1_client_id: player1,
            player2_client_id: player2,
            player1_board: player1_draft.clone(),
            player2_board: player2_draft.clone(),
            completed: HashSet::new(),
        });

        vec![Outgoing::Broadcast {
            packet: Packet::SetupPhaseStart {
                first_turn_client_id: first_turn,
                player1_client_id: player1,
                player2_client_id: player2,
                table_pool,
                player1_draft,
                player2_draft,
            },
        }]
    }

    fn enter_play(&mut self) -> Vec<Outgoing> {
        let session = match std::mem::replace(&mut self.phase, Phase::Connecting) {
            Phase::Setup(session) => session,
            other => {
                self.phase = other;
                error!("PLAY entered outside SETUP");
                return Vec::new();
            }
        };

        let player1_dice = dice::roll_set(&mut self.rng, DICE_PER_PLAYER, DICE_SIDES);
        let player2_dice = dice::roll_set(&mut self.rng, DICE_PER_PLAYER, DICE_SIDES);

        info!(
            "Entering PLAY: first turn goes to client {}",
            session.first_turn_client_id
        );

        self.phase = Phase::Play(PlayState {
            current_turn_client_id: session.first_turn_client_id,
            player1_board: session.player1_board,
            player2_board: session.player2_board,
            player1_dice: player1_dice.clone(),
            player2_dice: player2_dice.clone(),
        });

        vec![Outgoing::Broadcast {
            packet: Packet::PlayPhaseStart {
                player1_dice,
                player2_dice,
            },
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{standard_definitions, SamplerConfig};
    use shared::{remaining_table_pool, TARGET_HAND_SIZE};

    fn seeded_room(seed: u64) -> GameRoom {
        let catalog = TokenCatalog::new(standard_definitions(), SamplerConfig::default()).unwrap();
        GameRoom::with_rng(catalog, StdRng::seed_from_u64(seed))
    }

    /// Joins two clients and returns the broadcast SetupPhaseStart payload.
    fn start_setup(
        room: &mut GameRoom,
        id1: u64,
        id2: u64,
    ) -> (
        u64,
        Vec<TokenInstance>,
        Vec<TokenInstance>,
        Vec<TokenInstance>,
    ) {
        let (_, _) = room.client_joined(id1);
        let (_, outgoing) = room.client_joined(id2);

        for message in outgoing {
            if let Outgoing::Broadcast {
                packet:
                    Packet::SetupPhaseStart {
                        first_turn_client_id,
                        table_pool,
                        player1_draft,
                        player2_draft,
                        ..
                    },
            } = message
            {
                return (first_turn_client_id, table_pool, player1_draft, player2_draft);
            }
        }
        panic!("second join did not broadcast SetupPhaseStart");
    }

    #[test]
    fn test_two_joins_enter_setup() {
        let mut room = seeded_room(1);

        let (outcome, outgoing) = room.client_joined(10);
        assert_eq!(outcome, JoinOutcome::Seated);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(room.phase(), GamePhase::Connecting);

        let (outcome, outgoing) = room.client_joined(20);
        assert_eq!(outcome, JoinOutcome::Seated);
        assert_eq!(room.phase(), GamePhase::Setup);

        // Accept for the joiner plus the setup broadcast.
        assert_eq!(outgoing.len(), 2);

        let session = room.setup_session().unwrap();
        assert_eq!(session.player1_client_id, 10);
        assert_eq!(session.player2_client_id, 20);
        assert!(session.first_turn_client_id == 10 || session.first_turn_client_id == 20);
    }

    #[test]
    fn test_draft_partition_invariant() {
        let mut room = seeded_room(2);
        let (_, table_pool, p1_draft, p2_draft) = start_setup(&mut room, 10, 20);

        assert_eq!(table_pool.len(), BAG_TOKEN_COUNT);
        assert_eq!(p1_draft.len(), DRAFT_TOKEN_COUNT);
        assert_eq!(p2_draft.len(), DRAFT_TOKEN_COUNT);

        // Drafts are disjoint.
        assert!(p1_draft.iter().all(|t| !p2_draft.contains(t)));

        // Drafts come out of the pool, and the remainder plus both drafts
        // recovers all 24 drawn instances.
        assert!(p1_draft.iter().all(|t| table_pool.contains(t)));
        assert!(p2_draft.iter().all(|t| table_pool.contains(t)));

        let remaining = remaining_table_pool(&table_pool, &p1_draft, &p2_draft);
        assert_eq!(remaining.len(), BAG_TOKEN_COUNT - 2 * DRAFT_TOKEN_COUNT);

        // Alternating pairs off the front.
        assert_eq!(p1_draft[0], table_pool[0]);
        assert_eq!(p2_draft[0], table_pool[1]);
        assert_eq!(p1_draft[1], table_pool[2]);
        assert_eq!(p2_draft[1], table_pool[3]);
    }

    #[test]
    fn test_third_join_denied() {
        let mut room = seeded_room(3);
        start_setup(&mut room, 10, 20);

        let (outcome, outgoing) = room.client_joined(30);
        assert_eq!(outcome, JoinOutcome::Full);
        assert_eq!(outgoing.len(), 1);
        match &outgoing[0] {
            Outgoing::Direct {
                client_id: 30,
                packet: Packet::JoinDenied { .. },
            } => {}
            other => panic!("expected JoinDenied for client 30, got {:?}", other),
        }

        // The active session is untouched.
        assert_eq!(room.phase(), GamePhase::Setup);
    }

    #[test]
    fn test_both_discards_advance_to_play() {
        let mut room = seeded_room(4);
        let (_, _, p1_draft, p2_draft) = start_setup(&mut room, 10, 20);

        let p1_discards = p1_draft[..2].to_vec();
        let outgoing = room.setup_phase_end(10, &p1_discards);
        assert!(outgoing.is_empty());
        assert_eq!(room.phase(), GamePhase::Setup);
        assert_eq!(room.setup_session().unwrap().completed_count(), 1);

        let p2_discards = p2_draft[..2].to_vec();
        let outgoing = room.setup_phase_end(20, &p2_discards);
        assert_eq!(room.phase(), GamePhase::Play);

        let packet = match &outgoing[..] {
            [Outgoing::Broadcast { packet }] => packet,
            other => panic!("expected a single broadcast, got {:?}", other),
        };
        match packet {
            Packet::PlayPhaseStart {
                player1_dice,
                player2_dice,
            } => {
                assert_eq!(player1_dice.len(), DICE_PER_PLAYER);
                assert_eq!(player2_dice.len(), DICE_PER_PLAYER);
                assert!(player1_dice.iter().chain(player2_dice).all(|d| d.is_valid()));
            }
            other => panic!("expected PlayPhaseStart, got {:?}", other),
        }

        let play = room.play_state().unwrap();
        assert_eq!(play.player1_board.len(), TARGET_HAND_SIZE);
        assert_eq!(play.player2_board.len(), TARGET_HAND_SIZE);
        assert!(p1_discards.iter().all(|t| !play.player1_board.contains(t)));
    }

    #[test]
    fn test_completion_order_is_commutative() {
        for seed in [5u64, 6] {
            let mut room_a = seeded_room(seed);
            let (_, _, p1, p2) = start_setup(&mut room_a, 10, 20);
            room_a.setup_phase_end(10, &p1[..2]);
            room_a.setup_phase_end(20, &p2[..2]);

            let mut room_b = seeded_room(seed);
            let (_, _, p1, p2) = start_setup(&mut room_b, 10, 20);
            room_b.setup_phase_end(20, &p2[..2]);
            room_b.setup_phase_end(10, &p1[..2]);

            assert_eq!(room_a.phase(), GamePhase::Play);
            assert_eq!(room_b.phase(), GamePhase::Play);

            let play_a = room_a.play_state().unwrap();
            let play_b = room_b.play_state().unwrap();
            assert_eq!(play_a.player1_board, play_b.player1_board);
            assert_eq!(play_a.player2_board, play_b.player2_board);
        }
    }

    #[test]
    fn test_duplicate_completion_does_not_advance() {
        let mut room = seeded_room(7);
        let (_, _, p1_draft, _) = start_setup(&mut room, 10, 20);

        room.setup_phase_end(10, &p1_draft[..2]);
        let outgoing = room.setup_phase_end(10, &p1_draft[2..4]);

        assert!(outgoing.is_empty());
        assert_eq!(room.phase(), GamePhase::Setup);
        assert_eq!(room.setup_session().unwrap().completed_count(), 1);

        // The second submission must not have touched the board either.
        assert_eq!(
            room.setup_session().unwrap().board_of(10).unwrap().len(),
            TARGET_HAND_SIZE
        );
    }

    #[test]
    fn test_foreign_token_discard_rejected() {
        let mut room = seeded_room(8);
        let (_, _, p1_draft, p2_draft) = start_setup(&mut room, 10, 20);

        // Client 10 tries to discard one of its own plus one of player 2's.
        let sneaky = vec![p1_draft[0].clone(), p2_draft[0].clone()];
        let outgoing = room.setup_phase_end(10, &sneaky);

        assert!(outgoing.is_empty());
        let session = room.setup_session().unwrap();
        assert_eq!(session.completed_count(), 0);
        assert_eq!(session.board_of(10).unwrap().len(), DRAFT_TOKEN_COUNT);
    }

    #[test]
    fn test_setup_end_outside_setup_ignored() {
        let mut room = seeded_room(9);
        room.client_joined(10);

        let token = TokenInstance::new("acorn", "0");
        let outgoing = room.setup_phase_end(10, &[token]);

        assert!(outgoing.is_empty());
        assert_eq!(room.phase(), GamePhase::Connecting);
    }

    #[test]
    fn test_exit_resets_to_connecting() {
        let mut room = seeded_room(10);
        start_setup(&mut room, 10, 20);

        let outgoing = room.client_left(10);
        assert_eq!(room.phase(), GamePhase::Connecting);
        assert!(room.setup_session().is_none());
        assert!(matches!(
            outgoing[..],
            [Outgoing::Broadcast {
                packet: Packet::GameReset
            }]
        ));

        // Player 2 was promoted; a new client can fill seat 2 and a fresh
        // setup starts with no leftover discard state.
        assert_eq!(room.slots().player1(), Some(20));
        let (outcome, _) = room.client_joined(30);
        assert_eq!(outcome, JoinOutcome::Seated);
        assert_eq!(room.phase(), GamePhase::Setup);
        assert_eq!(room.setup_session().unwrap().completed_count(), 0);
    }

    #[test]
    fn test_exit_is_idempotent_to_connecting() {
        let mut room = seeded_room(11);

        // Arbitrary join/exit churn always lands back in CONNECTING with a
        // consistent registry.
        room.client_joined(1);
        room.client_left(1);
        room.client_joined(2);
        room.client_joined(3);
        room.client_left(3);
        room.client_left(2);
        room.client_left(2);

        assert_eq!(room.phase(), GamePhase::Connecting);
        assert_eq!(room.slots().count(), 0);
    }

    #[test]
    fn test_exit_during_play_resets() {
        let mut room = seeded_room(12);
        let (_, _, p1, p2) = start_setup(&mut room, 10, 20);
        room.setup_phase_end(10, &p1[..2]);
        room.setup_phase_end(20, &p2[..2]);
        assert_eq!(room.phase(), GamePhase::Play);

        room.client_left(20);
        assert_eq!(room.phase(), GamePhase::Connecting);
        assert!(room.play_state().is_none());
    }

    #[test]
    fn test_failed_draw_clears_seats() {
        // 15 definitions capped at one copy each cannot satisfy a 24-token
        // draw, so SETUP entry fails as a configuration error.
        let config = SamplerConfig {
            max_per_id: 1,
            ..SamplerConfig::default()
        };
        let catalog = TokenCatalog::new(standard_definitions(), config).unwrap();
        let mut room = GameRoom::with_rng(catalog, StdRng::seed_from_u64(13));

        room.client_joined(10);
        let (_, outgoing) = room.client_joined(20);

        assert!(matches!(
            outgoing.last(),
            Some(Outgoing::Broadcast {
                packet: Packet::GameReset
            })
        ));

        // The reset must empty the seats: a full lobby in CONNECTING has no
        // path back to SETUP. Both clients can re-join afterwards.
        assert_eq!(room.phase(), GamePhase::Connecting);
        assert_eq!(room.slots().count(), 0);
        assert_eq!(room.client_joined(10).0, JoinOutcome::Seated);
    }

    #[test]
    fn test_first_turn_is_coin_flip_over_seeds() {
        let mut saw_player1 = false;
        let mut saw_player2 = false;

        for seed in 0..32 {
            let mut room = seeded_room(seed);
            let (first_turn, _, _, _) = start_setup(&mut room, 10, 20);
            match first_turn {
                10 => saw_player1 = true,
                20 => saw_player2 = true,
                other => panic!("first turn went to unseated client {}", other),
            }
        }

        assert!(saw_player1 && saw_player2);
    }
}
