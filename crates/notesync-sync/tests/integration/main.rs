//! Integration tests for notesync-sync
//!
//! Drives the sync engine, change tracker and scheduler end to end against
//! an in-memory remote store and an in-memory SQLite local store.

mod common;

mod test_conflicts;
mod test_deletion;
mod test_pull;
mod test_scenario;
mod test_scheduler;
