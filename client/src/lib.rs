//! # Game Client Library
//!
//! Client-side implementation for the two-player token duel. The client is
//! the reactive half of the protocol: it joins, mirrors the phase
//! transitions the server broadcasts, runs the local setup presentation,
//! and relays exactly one discard submission per setup session.
//!
//! ## Architecture Overview
//!
//! ### Phase Mirroring
//! The server owns every transition. The client's state machine moves only
//! when a `SetupPhaseStart`, `PlayPhaseStart`, or `GameReset` packet
//! arrives, and a reset is honored from any state at any time.
//!
//! ### The Setup Pipeline
//! Entering SETUP spawns a long-lived presentation task: reveal the drawn
//! pool, deal the drafts, collect the local player's discards down to the
//! target hand size, submit. The task suspends between stages, and every
//! suspension point checks a single cancel flag. When the phase exits for
//! any reason the flag is raised once and the pipeline unwinds without
//! leaving partial state for the next session.
//!
//! ### Presentation Seam
//! Rendering and input are collaborator concerns behind the `Presentation`
//! trait. The shipped `HeadlessPresentation` auto-plays, which keeps the
//! binary runnable end-to-end and the pipeline testable without a GUI.
//! Dice are replayed from the server's authoritative outcomes, never
//! re-rolled locally.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The phase mirror and local token bookkeeping: board contents keyed by
//! token identity, discard validation, and the
//! Drafting -> AwaitingDiscards -> Submitted sub-sequence.
//!
//! ### Network Module (`network`)
//! The UDP event loop: packet handling, keep-alives, pipeline lifecycle,
//! and the discard submission path.
//!
//! ### Presentation Module (`presentation`)
//! The rendering seam and its headless implementation.

pub mod game;
pub mod network;
pub mod presentation;
