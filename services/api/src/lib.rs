//! OmniVerse API Library Crate
//!
//! This library contains the web-facing half of OmniVerseAI: configuration,
//! the Postgres conversation store, local media storage, the per-user session
//! registry, API handlers and routing. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod upload;
