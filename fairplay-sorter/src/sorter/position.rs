//! Playback position resolution
//!
//! Finds where the player currently is inside the fetched entry list. The
//! position is honestly ambiguous in several situations (nothing playing,
//! playing a different context, shuffle on, track not in the playlist), and
//! all of those resolve to `None` rather than an error; continuous mode
//! treats them as "inactive" and applies its timeout policy.
//!
//! When the playing track appears more than once in the playlist, the
//! player's upcoming queue is compared against each occurrence's
//! continuation to pick the right one. No attempt is made to locate the
//! position from the queue alone: the queue endpoint reports a fixed number
//! of tracks with no context for where the playlist ends, which makes the
//! tail cases unresolvable anyway. Sorting resumes once playback returns.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use fairplay_common::{Error, Result};

use crate::planner::PlaylistEntry;
use crate::service::PlaylistService;
use crate::sorter::with_cancel;

/// Resolve the current playback index within `entries`, or `None` when the
/// player is not verifiably inside this playlist.
pub(crate) async fn resolve<S: PlaylistService>(
    service: &S,
    playlist_id: &str,
    cancel_token: &CancellationToken,
    entries: &[PlaylistEntry],
) -> Result<Option<usize>> {
    let Some(now_playing) = with_cancel(cancel_token, service.now_playing()).await? else {
        return Ok(None);
    };
    let Some(track_id) = now_playing.track_id else {
        return Ok(None);
    };

    let context = service.playlist_context(playlist_id);
    if now_playing.context_uri.as_deref() != Some(context.as_str()) || now_playing.shuffle_enabled {
        return Ok(None);
    }

    let candidates = matching_indices(entries, &track_id);
    match candidates.len() {
        0 => Ok(None),
        1 => {
            // Only appears once in the playlist, so this is for sure where
            // we're at
            Ok(Some(candidates[0]))
        }
        _ => {
            let queue = match with_cancel(cancel_token, service.upcoming_queue()).await {
                Ok(queue) => queue,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    debug!(error = %err, "queue unavailable, treating position as unresolved");
                    return Ok(None);
                }
            };
            Ok(best_candidate(entries, &candidates, &queue))
        }
    }
}

/// Every index at which `track_id` occurs.
fn matching_indices(entries: &[PlaylistEntry], track_id: &str) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.track_id == track_id)
        .map(|(index, _)| index)
        .collect()
}

/// Pick the candidate whose continuation agrees with the upcoming queue.
///
/// Each candidate scores the number of consecutive entries after it that
/// match the queue; the first disagreement invalidates the candidate
/// outright, while running out of list or queue just stops the comparison.
/// Ties go to the later candidate, which errs toward treating ambiguous
/// repeats as current instead of re-sorting already-played material.
fn best_candidate(
    entries: &[PlaylistEntry],
    candidates: &[usize],
    queue: &[String],
) -> Option<usize> {
    let mut match_lengths: Vec<i64> = Vec::with_capacity(candidates.len());
    for &candidate in candidates {
        let mut match_length: i64 = 0;
        let mut i = candidate + 1;
        let mut j = 0;
        while i < entries.len() && j < queue.len() {
            if entries[i].track_id != queue[j] {
                match_length = -1;
                break;
            }
            match_length += 1;
            i += 1;
            j += 1;
        }
        match_lengths.push(match_length);
    }

    let mut best: Option<usize> = None;
    let mut best_length: i64 = -1;
    for (index, &length) in match_lengths.iter().enumerate() {
        if length >= best_length {
            best_length = length;
            best = Some(index);
        }
    }

    best.map(|index| candidates[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(track_ids: &[&str]) -> Vec<PlaylistEntry> {
        track_ids
            .iter()
            .map(|id| PlaylistEntry {
                contributor: "someone".to_string(),
                track_id: (*id).to_string(),
                duration_ms: 180_000,
            })
            .collect()
    }

    fn queue(track_ids: &[&str]) -> Vec<String> {
        track_ids.iter().map(|id| (*id).to_string()).collect()
    }

    #[test]
    fn test_matching_indices() {
        let entries = playlist(&["a", "b", "a", "c"]);
        assert_eq!(matching_indices(&entries, "a"), vec![0, 2]);
        assert_eq!(matching_indices(&entries, "c"), vec![3]);
        assert_eq!(matching_indices(&entries, "zzz"), Vec::<usize>::new());
    }

    #[test]
    fn test_queue_disambiguates_repeats() {
        // "x" appears at 0 and 3; the queue continues like the second one
        let entries = playlist(&["x", "b", "c", "x", "d", "e"]);
        let result = best_candidate(&entries, &[0, 3], &queue(&["d", "e"]));
        assert_eq!(result, Some(3));
    }

    #[test]
    fn test_mismatch_invalidates_candidate() {
        // The queue continues like the first occurrence, not the second
        let entries = playlist(&["x", "b", "c", "x", "d", "e"]);
        let result = best_candidate(&entries, &[0, 3], &queue(&["b", "c"]));
        assert_eq!(result, Some(0));
    }

    #[test]
    fn test_short_tail_is_still_viable() {
        // The last occurrence has nothing after it to compare; it scores
        // zero rather than being penalized, which beats a candidate whose
        // continuation actively disagrees with the queue
        let entries = playlist(&["x", "b", "x"]);
        let result = best_candidate(&entries, &[0, 2], &queue(&["zzz"]));
        assert_eq!(result, Some(2));
    }

    #[test]
    fn test_tie_prefers_later_candidate() {
        let entries = playlist(&["x", "a", "x", "a"]);
        let result = best_candidate(&entries, &[0, 2], &queue(&["a"]));
        assert_eq!(result, Some(2));
    }

    #[test]
    fn test_all_mismatching_falls_back_to_last() {
        let entries = playlist(&["x", "b", "x", "c"]);
        let result = best_candidate(&entries, &[0, 2], &queue(&["zzz"]));
        assert_eq!(result, Some(2));
    }

    #[test]
    fn test_empty_queue_scores_everyone_zero() {
        let entries = playlist(&["x", "b", "x", "c"]);
        let result = best_candidate(&entries, &[0, 2], &queue(&[]));
        assert_eq!(result, Some(2));
    }
}
