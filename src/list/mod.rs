//! # List Fetching
//!
//! The fetch/paginate/error state machine behind every list screen.
//! [`ListController`] runs one fetch at a time per intent and publishes an
//! [`AsyncListState`]; [`QueryEffect`] drives it from a watched
//! [`ListQuery`](crate::query::ListQuery); [`ListScreen`] bundles the two.

pub mod controller;
pub mod effect;
pub mod fetcher;
pub mod screen;
pub mod state;

pub use controller::{ListController, LoadOutcome, Operation};
pub use effect::QueryEffect;
pub use fetcher::{ListService, PageFetcher};
pub use screen::ListScreen;
pub use state::{AsyncListState, ListStatus};
