//! Player slot registry
//!
//! Tracks which client identities occupy the two player seats. Seats fill
//! player1-first, and a client ID can hold at most one seat. When player1
//! leaves, player2 is promoted into the vacated seat, so a lone remaining
//! player is always player1.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The client took the next open seat.
    Seated,
    /// The client already holds a seat; the join is a no-op.
    AlreadySeated,
    /// Both seats are occupied.
    Full,
}

#[derive(Debug, Default)]
pub struct PlayerSlots {
    player1: Option<u64>,
    player2: Option<u64>,
}

impl PlayerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, client_id: u64) -> JoinOutcome {
        if self.player1 == Some(client_id) || self.player2 == Some(client_id) {
            return JoinOutcome::AlreadySeated;
        }

        if self.player1.is_none() {
            self.player1 = Some(client_id);
            info!("Client {} seated as player 1", client_id);
            JoinOutcome::Seated
        } else if self.player2.is_none() {
            self.player2 = Some(client_id);
            info!("Client {} seated as player 2", client_id);
            JoinOutcome::Seated
        } else {
            JoinOutcome::Full
        }
    }

    /// Vacates the client's seat, promoting player2 to player1 if needed.
    /// Returns false if the client held no seat.
    pub fn leave(&mut self, client_id: u64) -> bool {
        if self.player1 == Some(client_id) {
            self.player1 = self.player2.take();
            info!("Client {} left; remaining player promoted to seat 1", client_id);
            true
        } else if self.player2 == Some(client_id) {
            self.player2 = None;
            info!("Client {} left seat 2", client_id);
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> usize {
        self.player1.iter().count() + self.player2.iter().count()
    }

    pub fn both_seated(&self) -> bool {
        self.player1.is_some() && self.player2.is_some()
    }

    pub fn contains(&self, client_id: u64) -> bool {
        self.player1 == Some(client_id) || self.player2 == Some(client_id)
    }

    pub fn player1(&self) -> Option<u64> {
        self.player1
    }

    pub fn player2(&self) -> Option<u64> {
        self.player2
    }

    /// The opponent of a seated client, if both seats are taken.
    pub fn other_player(&self, client_id: u64) -> Option<u64> {
        if self.player1 == Some(client_id) {
            self.player2
        } else if self.player2 == Some(client_id) {
            self.player1
        } else {
            None
        }
    }
}
