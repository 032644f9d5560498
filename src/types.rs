//! Core types: the library error and reader configuration.

use std::io;

use thiserror::Error;

use crate::format::Compression;

/// Default upper bound for a chunk's declared size: anything the 32-bit field can hold.
pub const DEFAULT_MAX_CHUNK_SIZE: u32 = u32::MAX;

/// Options for [`CbefReader`](crate::CbefReader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Largest accepted chunk-size field (nonce + ciphertext + tag).
    /// Chunks declaring more are rejected before any buffer is grown.
    pub max_chunk_size: u32,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl ReaderOptions {
    pub fn with_max_chunk_size(mut self, max: u32) -> Self {
        self.max_chunk_size = max;
        self
    }
}

/// Options for [`decrypt_file`](crate::decrypt_file).
#[derive(Debug, Clone, Copy, Default)]
pub struct DecryptOptions {
    /// When `true`, allow overwriting an existing output file.
    pub force: bool,
    pub reader: ReaderOptions,
}

/// Library error type (no panics for expected failures).
#[derive(Error, Debug)]
pub enum CbefError {
    // Header and construction.
    #[error("stream ended before the {0}-byte file header was complete")]
    TruncatedHeader(usize),
    #[error("failed to read file header")]
    HeaderRead(#[source] io::Error),
    #[error("invalid header length {0}")]
    InvalidHeaderLength(usize),
    #[error("invalid magic: not a CBEF file")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported compression type {code} ({})", Compression::describe(*.code))]
    UnsupportedCompression { code: u8 },
    #[error("unsupported key derivation id {0}")]
    UnsupportedKdf(u8),
    #[error("reserved header byte at offset {offset} is not zero")]
    ReservedNotZero { offset: usize },
    #[error("invalid key id length {0}")]
    InvalidKeyIdLength(u8),
    #[error("key id is not valid UTF-8")]
    KeyIdNotUtf8,
    #[error("key not found for key id {0:?}")]
    KeyNotFound(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(&'static str),
    #[error("invalid AES-GCM key length {0}")]
    InvalidKeyLength(usize),
    #[error("malformed {compression} stream: {reason}")]
    InvalidCompressedStream {
        compression: Compression,
        reason: &'static str,
    },
    #[error("failed to read compressed stream header")]
    CompressedHeaderRead(#[source] io::Error),

    // Chunk stream.
    #[error("invalid chunk size {0} in chunk header")]
    InvalidChunkSize(u32),
    #[error("chunk size {size} exceeds configured maximum {max}")]
    ChunkTooLarge { size: u32, max: u32 },
    #[error("chunk at offset {offset} failed authentication")]
    AuthenticationFailed { offset: u64 },
    #[error("stream already failed; no further data can be read")]
    StreamFailed,

    // Lifecycle.
    #[error("encryption reader is closed")]
    ReaderClosed,
    #[error("decryptor is closed")]
    DecryptorClosed,

    // Helpers.
    #[error("I/O error")]
    Io(#[source] io::Error),
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    #[error("key file line {line}: {reason}")]
    InvalidKeyFile { line: usize, reason: &'static str },
}

impl CbefError {
    /// Recover a `CbefError` carried inside an `io::Error` returned from a `Read` call.
    pub fn from_io(err: &io::Error) -> Option<&CbefError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<CbefError>())
    }

    fn io_kind(&self) -> io::ErrorKind {
        use io::ErrorKind;
        match self {
            CbefError::TruncatedHeader(_) => ErrorKind::UnexpectedEof,
            CbefError::HeaderRead(e) | CbefError::CompressedHeaderRead(e) | CbefError::Io(e) => {
                e.kind()
            }
            CbefError::KeyNotFound(_)
            | CbefError::KeyDerivation(_)
            | CbefError::InvalidKeyLength(_)
            | CbefError::Invalid(_)
            | CbefError::InvalidKeyFile { .. } => ErrorKind::InvalidInput,
            CbefError::ReaderClosed | CbefError::DecryptorClosed | CbefError::StreamFailed => {
                ErrorKind::Other
            }
            _ => ErrorKind::InvalidData,
        }
    }
}

/// Decode failures that travelled through `Read` as `io::Error` come back out
/// as their own variant; everything else becomes `Io`.
impl From<io::Error> for CbefError {
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<CbefError>()) {
            return CbefError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<CbefError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => CbefError::Io(io::Error::new(kind, other)),
            None => CbefError::Io(io::Error::from(kind)),
        }
    }
}

impl From<CbefError> for io::Error {
    fn from(err: CbefError) -> Self {
        // Unwrap plain I/O errors rather than nesting them.
        if let CbefError::Io(e) = err {
            return e;
        }
        io::Error::new(err.io_kind(), err)
    }
}
