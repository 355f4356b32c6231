//! Crate-wide error type.
//!
//! Every fallible operation in this crate raises synchronously at the point of
//! violation; nothing is deferred or batched.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::upload::UploadErrorCode;

/// Errors produced by the message model.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input: status codes, ports, methods, header
    /// names and values, cookie attributes, parsed-body shape, and so on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unable to parse URI {uri:?}: {reason}")]
    UriParse { uri: String, reason: &'static str },

    #[error("stream is not readable: {reason}")]
    Unreadable { reason: &'static str },

    #[error("stream is not writable: {reason}")]
    Unwritable { reason: String },

    #[error("stream is not seekable: {reason}")]
    NotSeekable { reason: String },

    #[error("unable to determine stream position")]
    PositionUnknown,

    #[error("unable to read stream contents: {0}")]
    ReadFailure(#[source] io::Error),

    #[error("unable to open stream {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("upload is not active (error code {0:?})")]
    UploadInactive(UploadErrorCode),

    #[error("uploaded file has already been moved")]
    AlreadyMoved,

    #[error("failed to move uploaded file to {target}: {source}")]
    MoveFailed {
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("request head is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
