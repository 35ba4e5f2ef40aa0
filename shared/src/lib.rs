use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const BAG_TOKEN_COUNT: usize = 24;
pub const DRAFT_TOKEN_COUNT: usize = 6;
pub const TARGET_HAND_SIZE: usize = 4;
pub const DICE_PER_PLAYER: usize = 5;
pub const DICE_SIDES: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl TokenRarity {
    /// Fixed iteration order used by the weighted sampler. The order is part
    /// of the sampling contract: the last entry absorbs floating-point
    /// residue from the weight walk.
    pub const ALL: [TokenRarity; 4] = [
        TokenRarity::Common,
        TokenRarity::Rare,
        TokenRarity::Epic,
        TokenRarity::Legendary,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDefinition {
    pub id: String,
    pub rarity: TokenRarity,
}

impl TokenDefinition {
    pub fn new(id: &str, rarity: TokenRarity) -> Self {
        Self {
            id: id.to_string(),
            rarity,
        }
    }
}

/// A drawn token: a catalog definition paired with a unique instance ID.
/// Instance IDs are minted only by the server; clients treat the pair as an
/// opaque identity for board bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInstance {
    pub token_id: String,
    pub instance_id: String,
}

impl TokenInstance {
    pub fn new(token_id: &str, instance_id: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
            instance_id: instance_id.to_string(),
        }
    }
}

impl fmt::Display for TokenInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.token_id, self.instance_id)
    }
}

impl FromStr for TokenInstance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('_') {
            Some((token_id, instance_id)) if !token_id.is_empty() && !instance_id.is_empty() => {
                Ok(TokenInstance::new(token_id, instance_id))
            }
            _ => Err(format!("malformed token instance: {:?}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceOutcome {
    pub sides: u32,
    pub value: u32,
}

impl DiceOutcome {
    pub fn is_valid(&self) -> bool {
        self.sides >= 1 && self.value >= 1 && self.value <= self.sides
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Connecting,
    Setup,
    Play,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Connecting => write!(f, "CONNECTING"),
            GamePhase::Setup => write!(f, "SETUP"),
            GamePhase::Play => write!(f, "PLAY"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    JoinGame,
    ExitGame,
    KeepAlive,
    SetupPhaseEnd {
        discarded_tokens: Vec<TokenInstance>,
    },

    JoinAccepted {
        client_id: u64,
    },
    JoinDenied {
        reason: String,
    },
    SetupPhaseStart {
        first_turn_client_id: u64,
        player1_client_id: u64,
        player2_client_id: u64,
        table_pool: Vec<TokenInstance>,
        player1_draft: Vec<TokenInstance>,
        player2_draft: Vec<TokenInstance>,
    },
    PlayPhaseStart {
        player1_dice: Vec<DiceOutcome>,
        player2_dice: Vec<DiceOutcome>,
    },
    GameReset,
}

/// Tokens still on the shared table after both drafts have been peeled off
/// the front of the drawn pool. `table_pool` is the full pre-partition
/// snapshot, so subtracting both drafts recovers the communal remainder.
pub fn remaining_table_pool(
    table_pool: &[TokenInstance],
    player1_draft: &[TokenInstance],
    player2_draft: &[TokenInstance],
) -> Vec<TokenInstance> {
    table_pool
        .iter()
        .filter(|t| !player1_draft.contains(t) && !player2_draft.contains(t))
        .cloned()
        .collect()
}
