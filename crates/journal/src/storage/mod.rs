//! Storage traits and implementations
//!
//! The sync driver writes entries, comments, usernames and its resume state
//! through [`JournalStore`]. Only an in-memory backend ships with the crate.

mod memory;
mod traits;

pub use memory::InMemoryJournalStore;
pub use traits::JournalStore;
