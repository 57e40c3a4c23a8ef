//! Service internals.
//!
//! ## Structure
//!
//! - [`store`] - durable keyed board pool with cross-process locking.
//! - [`synth`] - seam between the pool subsystem and the puzzle engine.
//! - [`pool`] - background generation workers and backlog replenishment.
//! - [`service`] - HTTP entry points (fetch, solve, status).
//! - [`auth`] - bearer-token allow-list.
//! - [`config`] - CLI/env configuration.
//! - [`error`] - unified service error type.
//! - [`telemetry`] - console tracing setup.

pub mod auth;
pub mod config;
pub mod error;
pub mod pool;
pub mod service;
pub mod store;
pub mod synth;
pub mod telemetry;

#[cfg(test)]
pub mod testutil;
