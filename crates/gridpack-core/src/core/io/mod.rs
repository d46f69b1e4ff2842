//! Readers and writers for the whitespace-separated tables exchanged with
//! the fitting tools: coefficient limit tables and scan-point files.

pub mod limits;
pub mod scanfile;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error in {path} on line {line}: invalid number '{value}'")]
    InvalidFloat {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("{0} has no header line")]
    MissingHeader(PathBuf),
}
