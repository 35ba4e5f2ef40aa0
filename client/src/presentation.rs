//! Narrow seam between the setup pipeline and whatever renders the game
//!
//! Rendering, animation, and input collection live behind this trait. The
//! pipeline calls through it at each stage and owns all pacing; an
//! implementation only reports what it would show and, when asked, which
//! tokens the local player discards. `clear` must be safe to call at any
//! moment, including when nothing was ever shown.

use log::info;
use shared::{DiceOutcome, TokenInstance};

pub trait Presentation: Send {
    /// The full drawn pool has been revealed on the table.
    fn reveal_table_pool(&mut self, tokens: &[TokenInstance]);

    /// Both drafts have been dealt.
    fn show_drafts(
        &mut self,
        my_draft: &[TokenInstance],
        op_draft: &[TokenInstance],
        is_first_turn: bool,
    );

    /// Ask the player which tokens to give up. Must return exactly
    /// `discard_count` tokens drawn from `hand`.
    fn choose_discards(
        &mut self,
        hand: &[TokenInstance],
        discard_count: usize,
    ) -> Vec<TokenInstance>;

    /// Replay the authoritative dice faces. Outcomes are given, never
    /// re-rolled locally.
    fn replay_dice(&mut self, my_dice: &[DiceOutcome], op_dice: &[DiceOutcome]);

    /// Release everything shown so far. Unconditional and idempotent.
    fn clear(&mut self);
}

/// Presentation that plays by itself: logs each stage and discards from the
/// front of the hand. Lets the client binary run a full session without a
/// rendering layer attached.
#[derive(Debug, Default)]
pub struct HeadlessPresentation;

impl HeadlessPresentation {
    pub fn new() -> Self {
        Self
    }
}

impl Presentation for HeadlessPresentation {
    fn reveal_table_pool(&mut self, tokens: &[TokenInstance]) {
        info!("Table pool revealed: {} tokens", tokens.len());
    }

    fn show_drafts(
        &mut self,
        my_draft: &[TokenInstance],
        op_draft: &[TokenInstance],
        is_first_turn: bool,
    ) {
        let mine: Vec<String> = my_draft.iter().map(|t| t.to_string()).collect();
        info!(
            "Drafted {} tokens ({}); opponent drafted {}; {} turn first",
            my_draft.len(),
            mine.join(", "),
            op_draft.len(),
            if is_first_turn { "our" } else { "their" }
        );
    }

    fn choose_discards(
        &mut self,
        hand: &[TokenInstance],
        discard_count: usize,
    ) -> Vec<TokenInstance> {
        let chosen: Vec<TokenInstance> = hand.iter().take(discard_count).cloned().collect();
        for token in &chosen {
            info!("Discarding {}", token);
        }
        chosen
    }

    fn replay_dice(&mut self, my_dice: &[DiceOutcome], op_dice: &[DiceOutcome]) {
        let mine: Vec<String> = my_dice.iter().map(|d| d.value.to_string()).collect();
        let theirs: Vec<String> = op_dice.iter().map(|d| d.value.to_string()).collect();
        info!(
            "Opening rolls: ours [{}], theirs [{}]",
            mine.join(" "),
            theirs.join(" ")
        );
    }

    fn clear(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_discards_requested_count() {
        let mut presentation = HeadlessPresentation::new();
        let hand: Vec<TokenInstance> = (0..6)
            .map(|i| TokenInstance::new("acorn", &i.to_string()))
            .collect();

        let chosen = presentation.choose_discards(&hand, 2);

        assert_eq!(chosen.len(), 2);
        assert!(chosen.iter().all(|t| hand.contains(t)));
    }

    #[test]
    fn test_headless_clear_is_idempotent() {
        let mut presentation = HeadlessPresentation::new();
        presentation.clear();
        presentation.clear();
    }
}
