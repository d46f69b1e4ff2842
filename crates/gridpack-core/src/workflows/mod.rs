//! # Workflows Module
//!
//! Top-level entry points that drive many job configurations at once.
//!
//! ## Architecture
//!
//! - **Sweeps** ([`sweep`]) - Per-scan-type submission helpers and the one-shot,
//!   unthrottled sweep over a list of processes.
//! - **Submission Loop** ([`chain`]) - Polls the job tracker, keeps the number of
//!   code-generating and integrating jobs under their caps, and cleans failed
//!   jobs so they are submitted again.
//! - **Pacing** ([`pacer`]) - The waiting seam between submissions and polling passes.

pub mod chain;
pub mod pacer;
pub mod sweep;
