//! # Gridpack Core Library
//!
//! Configuration, submission and tracking of EFT gridpack production jobs for the
//! MadGraph gridpack-generation tool chain.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`DegreeOfFreedom`, `ScanPoint`,
//!   `ProcessDefinition`), template-card editing, and the plain-text tables shared with the
//!   fitting tools.
//!
//! - **[`engine`]: The Logic Core.** Point sampling, job configuration and materialization
//!   (`Gridpack`), command dispatch to the batch backends, and the directory-polling
//!   `JobTracker` that classifies running jobs.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built on the engine: one-shot
//!   sweeps over processes and coefficients, and the throttled submission loop that keeps
//!   a batch system busy without overloading it.

pub mod core;
pub mod engine;
pub mod workflows;
