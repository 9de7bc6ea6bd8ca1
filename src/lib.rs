//! Resilient operations: error classification, retry with backoff, and
//! operation coordination for client applications talking to a remote API.
//!
//! The pieces fit together as follows:
//! - [`error`] turns raw failures into [`error::EnhancedError`] records.
//! - [`retry`] computes backoff delays.
//! - [`coordinator`] runs operations with retries and tracks attempt counts.
//! - [`binding`] adds notification and loading state for UI-facing code.
//! - [`network`] mirrors connectivity into observable state.

pub mod auth;
pub mod binding;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod network;
pub mod notification;
pub mod retry;
