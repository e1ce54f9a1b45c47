//! Fairness planner
//!
//! Pure reordering logic: given the playlist in playback order and a cursor,
//! find the single move that most urgently evens out playback time between
//! contributors. Repeated application converges on a playlist where, scanning
//! forward, the next track always belongs to whichever contributor has been
//! heard the least so far (among contributors with tracks remaining).
//!
//! Everything here is synchronous and side-effect-free; the sort controller
//! owns all I/O.

use serde::{Deserialize, Serialize};

/// One track occurrence in the playlist, tagged with who contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Identity of the user who added this entry
    pub contributor: String,
    /// Track identity as reported by the streaming service
    pub track_id: String,
    /// Track length in milliseconds
    pub duration_ms: u64,
}

/// A single remove-and-reinsert move.
///
/// Remove the entry at `from`, then insert it at `insert_before`. The planner
/// only pulls later tracks earlier (`insert_before < from`), so the removal
/// never shifts the insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOp {
    /// Index of the track to move
    pub from: usize,
    /// Index to insert the track before
    pub insert_before: usize,
}

/// Finds the next reordering that makes the playlist more even. Returns
/// `None` when the tail from `start_at` onward is already even.
///
/// Played time is recomputed from scratch at every cursor step. An
/// incremental running total would be cheaper, but the full re-scan keeps
/// each step auditable against the playlist alone, and playlists are small
/// enough that O(n²) per full sort is irrelevant.
pub fn find_next_reorder_op(entries: &[PlaylistEntry], start_at: usize) -> Option<ReorderOp> {
    if start_at >= entries.len() {
        return None;
    }

    let mut pos = start_at;
    while pos < entries.len() {
        // Figure out how much each contributor has already played, and where
        // each contributor's first remaining track sits. Both lists are kept
        // in order of first appearance so that later tie-breaks are stable.
        let mut played_times: Vec<(&str, u64)> = Vec::new();
        let mut first_remaining: Vec<(&str, usize)> = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let user = entry.contributor.as_str();
            if i < pos {
                match played_times.iter_mut().find(|(u, _)| *u == user) {
                    Some((_, total)) => *total += entry.duration_ms,
                    None => played_times.push((user, entry.duration_ms)),
                }
            } else {
                if !played_times.iter().any(|(u, _)| *u == user) {
                    played_times.push((user, 0));
                }
                if !first_remaining.iter().any(|(u, _)| *u == user) {
                    first_remaining.push((user, i));
                }
            }
        }

        if played_times.len() == 1 {
            // Only one contributor in the list, nothing to sort
            return None;
        }

        // Contributors that still have tracks left, least-served first.
        // The sort is stable, so equally-served contributors stay in
        // first-appearance order.
        let mut candidates: Vec<(&str, u64)> = played_times
            .iter()
            .filter(|(user, _)| first_remaining.iter().any(|(u, _)| u == user))
            .copied()
            .collect();
        candidates.sort_by_key(|&(_, time)| time);

        let min_time = candidates[0].1;
        let looking_for: Vec<&str> = candidates
            .iter()
            .take_while(|&&(_, time)| time == min_time)
            .map(|&(user, _)| user)
            .collect();

        let next_contributor = entries[pos].contributor.as_str();
        if looking_for.contains(&next_contributor) {
            // The track at the cursor already belongs to a least-served
            // contributor, so it is in the "correct" position
            pos += 1;
            continue;
        }

        // This contributor is ahead of the others; pull the earliest
        // remaining track from any least-served contributor up to here
        let from = looking_for
            .iter()
            .filter_map(|user| {
                first_remaining
                    .iter()
                    .find(|(u, _)| u == user)
                    .map(|&(_, index)| index)
            })
            .min()?;
        return Some(ReorderOp {
            from,
            insert_before: pos,
        });
    }

    None
}

/// Applies `op` to `entries` in place.
pub fn apply_reorder_op(entries: &mut Vec<PlaylistEntry>, op: &ReorderOp) {
    let removed = entries.remove(op.from);
    entries.insert(op.insert_before, removed);
}

/// Runs the planner to convergence against a private copy of `entries`,
/// returning the operations in application order.
///
/// After each accepted operation the cursor advances to just past the
/// insertion point. With `bound` set, planning stops before the first
/// operation whose insertion point lands beyond it; continuous mode uses
/// this to keep only the next few upcoming tracks in order, since anything
/// further out gets replanned before playback reaches it.
pub fn plan_reorder_ops(
    entries: &[PlaylistEntry],
    start_at: usize,
    bound: Option<usize>,
) -> Vec<ReorderOp> {
    let mut items = entries.to_vec();
    let mut pos = start_at;
    let mut ops = Vec::new();

    while let Some(op) = find_next_reorder_op(&items, pos) {
        if bound.is_some_and(|limit| op.insert_before > limit) {
            break;
        }

        pos = op.insert_before + 1;
        apply_reorder_op(&mut items, &op);
        ops.push(op);
    }

    ops
}
