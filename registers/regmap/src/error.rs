// Licensed under the Apache-2.0 license

use thiserror::Error;

/// Fatal conditions reported before any output is produced.
///
/// Merging and clustering are total over well-formed devices; only missing
/// inputs, malformed inputs and unusable configuration end up here.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Dual-core processing was requested but a core's register map is absent.
    #[error("register map for core {core} is missing")]
    MissingCore { core: u8 },

    /// A core prefix was empty or would not form a valid identifier prefix.
    #[error("invalid core prefix {0:?}")]
    InvalidPrefix(String),

    /// The loader handed over a device that breaks a model invariant.
    #[error("malformed register map at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// A policy value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for register-map processing.
pub type Result<T> = std::result::Result<T, Error>;
