//! # Fairplay Common Library
//!
//! Shared code for the Fairplay workspace including:
//! - Error type (Error enum + Result alias)
//! - Event types (SorterEvent enum) and the broadcast EventBus
//! - Configuration loading
//! - Cancellable timing helpers

pub mod config;
pub mod error;
pub mod events;
pub mod timing;

pub use error::{Error, Result};
pub use events::{EventBus, FailureKind, SorterEvent};
