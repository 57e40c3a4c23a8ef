//! Background board generation.
//!
//! ## Structure
//!
//! - [`worker`] - the generation job body and the per-worker task loop.
//! - [`manager`] - the [`manager::WorkerPool`]: round-robin dispatch,
//!   backlog replenishment, and coordinated shutdown.

pub mod manager;
pub mod worker;
