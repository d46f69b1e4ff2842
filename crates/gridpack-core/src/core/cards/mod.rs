//! Editing of the plain-text configuration cards consumed by the generator.
//!
//! Cards are edited by copying the template verbatim and applying targeted
//! in-place substitutions, so comments, spacing and untouched lines survive
//! byte for byte. The substitution patterns themselves live in
//! [`substitution`] and are shared by every card type.

pub mod customize_card;
pub mod options;
pub mod reweight;
pub mod run_card;
pub mod substitution;
pub mod traits;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),
    #[error("{src} and {dst} refer to the same file")]
    SameFile { src: PathBuf, dst: PathBuf },
    #[error("{0} is not a file")]
    NotAFile(PathBuf),
    #[error("Invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),
}
