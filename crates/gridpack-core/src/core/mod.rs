//! # Core Module
//!
//! Stateless building blocks shared by the engine and workflow layers.
//!
//! - **Scan axes** ([`dof`]) - named degrees of freedom mapped onto model couplings
//! - **Scan points** ([`point`]) - coordinates in Wilson-coefficient space and their text form
//! - **Processes** ([`process`]) - physics processes and their template-card locations
//! - **Cards** ([`cards`]) - round-trip editing of run, customize and reweight cards
//! - **Tables** ([`io`]) - limit tables and scan-point files

pub mod cards;
pub mod dof;
pub mod io;
pub mod point;
pub mod process;
