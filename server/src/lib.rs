//! # Game Server Library
//!
//! Authoritative server for the two-player token duel. The server owns every
//! game-affecting decision — seat assignment, the first-turn coin flip, the
//! rarity-weighted token draw, the opening dice rolls — and drives both
//! clients through the shared phase sequence:
//!
//! ```text
//! CONNECTING --(2nd client seated)--> SETUP --(both discards in)--> PLAY
//!      ^                                |                             |
//!      +-------- any client exit -------+-----------------------------+
//! ```
//!
//! ## Core Responsibilities
//!
//! ### Authoritative randomness
//! Token instances are minted only here; clients receive them by value and
//! never create or mutate them. Dice outcomes are decided here once, and
//! any client-side dice visual replays the given faces.
//!
//! ### Setup negotiation
//! SETUP is a two-phase commit over player discards: the server accumulates
//! each client's discard submission, validates it against that client's
//! board, and only advances to PLAY once both distinct clients have
//! completed. The two completions are order-independent.
//!
//! ### Churn tolerance
//! Any disconnect — explicit exit or timeout — tears the session back to
//! CONNECTING, drops all setup state, and broadcasts a reset. A lone
//! remaining player keeps seat 1 and waits for a new opponent.
//!
//! ## Module Organization
//!
//! ### Catalog Module (`catalog`)
//! The read-only token definition registry and the rarity-weighted deck
//! sampler, including per-definition duplicate caps and the retry ceiling
//! that turns an unsatisfiable draw into a loud configuration error.
//!
//! ### Dice Module (`dice`)
//! Uniform dice-outcome generation, decoupled from any visual replay.
//!
//! ### Lobby Module (`lobby`)
//! The two player seats: player1-first assignment, duplicate and overflow
//! rejection, and promotion of player2 into seat 1 when seat 1 empties.
//!
//! ### Game Module (`game`)
//! The phase state machine itself. `GameRoom` consumes connection and
//! packet events and returns the packets to send; it never touches the
//! socket.
//!
//! ### Connection Module (`connection`)
//! Transport bookkeeping: address-to-ID mapping, liveness tracking, and
//! the timeout sweep.
//!
//! ### Network Module (`network`)
//! The tokio event loop gluing the above together over a UDP socket, with
//! dedicated receive/send tasks feeding a single-writer main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::catalog::{standard_definitions, SamplerConfig, TokenCatalog};
//! use server::game::GameRoom;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = TokenCatalog::new(standard_definitions(), SamplerConfig::default())?;
//!     let room = GameRoom::new(catalog);
//!
//!     let mut server = Server::new("127.0.0.1:8080", room).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod connection;
pub mod dice;
pub mod game;
pub mod lobby;
pub mod network;
