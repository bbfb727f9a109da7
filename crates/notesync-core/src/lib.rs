//! Notesync Core - Domain logic and port definitions
//!
//! This crate is the hexagonal core of the synchronization engine:
//! - **Domain entities** - `JournalEntry`, `JournalAttachment`, `Profile`, `Avatar`, `Settings`,
//!   each embedding a [`SyncMetadata`](domain::SyncMetadata) value
//! - **Wire model** - [`WireRecord`](record::WireRecord) and the query types used against the
//!   remote record store
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ILocalStore`,
//!   `ISyncStatusStore`, `IAssetCompressor`
//! - **Configuration** - YAML-backed [`Config`](config::Config)
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O. Ports define
//! trait interfaces that adapter crates implement; the sync crate orchestrates
//! domain entities through those ports.

pub mod config;
pub mod domain;
pub mod ports;
pub mod record;
