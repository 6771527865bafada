//! Budgeted history selection.
//!
//! Two greedy passes over newest-first turns. The first admits important
//! turns only, but halts at the first turn of any kind that would overflow
//! the budget; the second fills the remaining room by recency and halts at
//! the first overflow as well. Output is in selection order, so callers that
//! render a transcript must run [`sort_chronological`] first.

use jaidee_core::types::ConversationTurn;
use std::collections::HashSet;

/// Select turns from `turns` (newest first) whose summed `token_count`
/// stays within `budget`.
///
/// A turn that alone costs more than `budget` is never admitted.
pub fn pack(turns: &[ConversationTurn], budget: usize) -> Vec<&ConversationTurn> {
    if turns.is_empty() || budget == 0 {
        return Vec::new();
    }

    let mut selected: Vec<&ConversationTurn> = Vec::new();
    let mut taken: HashSet<usize> = HashSet::new();
    let mut total = 0usize;

    // importance first; an overflowing plain turn still ends the pass
    for (idx, turn) in turns.iter().enumerate() {
        if total + turn.token_count > budget {
            break;
        }
        if !turn.is_important() {
            continue;
        }
        total += turn.token_count;
        taken.insert(idx);
        selected.push(turn);
    }

    // recency fill
    for (idx, turn) in turns.iter().enumerate() {
        if taken.contains(&idx) {
            continue;
        }
        if total + turn.token_count > budget {
            break;
        }
        total += turn.token_count;
        selected.push(turn);
    }

    tracing::debug!(
        "📦 Packed {}/{} turns ({total}/{budget} tokens)",
        selected.len(),
        turns.len()
    );
    selected
}

/// Summed `token_count` of a selection.
pub fn total_cost(turns: &[&ConversationTurn]) -> usize {
    turns.iter().map(|t| t.token_count).sum()
}

/// Oldest first; ties broken by store id.
pub fn sort_chronological(turns: &mut [&ConversationTurn]) {
    turns.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}
