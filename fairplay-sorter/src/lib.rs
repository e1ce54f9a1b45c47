//! # Fairplay Sorter Library
//!
//! Keeps a shared streaming-service playlist "fair": re-ordered so no single
//! contributor's tracks dominate consecutive playback.
//!
//! **Planner** (`planner`): pure logic computing, from (contributor,
//! duration) pairs and a cursor, the next minimal move toward an even
//! interleaving.
//!
//! **Controller** (`sorter`): async lifecycle around the planner. Fetches
//! live playlist state through the `service` seam, applies planned moves
//! with pacing against the mutation endpoint, and in continuous mode tracks
//! the playback position and corrects drift on a poll interval. Observers
//! subscribe to a broadcast bus for status and lifecycle events.

pub mod planner;
pub mod service;
pub mod sorter;

pub use planner::{apply_reorder_op, find_next_reorder_op, plan_reorder_ops, PlaylistEntry, ReorderOp};
pub use service::{EntriesPage, NowPlaying, PlaylistService, WebPlaylistClient};
pub use sorter::{PlaylistSorter, SortMode, SorterConfig, SorterState};
