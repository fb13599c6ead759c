//! Client core for a remote torrent-maker orchestration service.
//!
//! The service runs torrent-creation jobs on SSH-reachable seedbox servers
//! and exposes a JSON HTTP API plus a WebSocket event stream. This crate
//! keeps one consistent in-memory view of that service: the [`reconciler`]
//! merges pushed deltas and pulled snapshots, the [`navigator`] drives
//! remote directory browsing, and [`client::Client`] ties both to a
//! [`gateway::Gateway`]. Rendering is left entirely to the caller.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod models;
pub mod navigator;
pub mod reconciler;

pub use client::{Client, Confirmed};
pub use error::ClientError;
