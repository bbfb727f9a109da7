//! Integration tests for notesync-remote
//!
//! Uses wiremock to simulate the record store API and verifies the
//! end-to-end behavior of HttpRemoteStore: availability, record CRUD,
//! asset transfer, paged queries and batch modify.

mod common;

mod test_availability;
mod test_batch;
