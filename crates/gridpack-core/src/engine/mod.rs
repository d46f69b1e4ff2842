//! # Engine Module
//!
//! Stateful logic of gridpack production: turning a process and a set of
//! degrees of freedom into materialized job configurations, submitting them,
//! and following the submitted jobs through their phases.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Batch and scan types, directory layout and per-sweep options
//! - **Naming** ([`naming`]) - The shared job identity and every artifact name derived from it
//! - **Sampling** ([`sampling`]) - Reweight-point strategies and start-point selection
//! - **Job Configuration** ([`gridpack`]) - Configure, materialize, submit, clean and run one job
//! - **External Commands** ([`command`]) - The seam through which generation scripts are launched
//! - **Job Tracking** ([`tracker`]) - File-system based phase classification
//! - **Progress Monitoring** ([`progress`]) - Event callbacks for long-running loops
//! - **Error Handling** ([`error`]) - Engine-level error type

pub mod command;
pub mod config;
pub mod error;
pub mod gridpack;
pub mod naming;
pub mod progress;
pub mod sampling;
pub mod tracker;
