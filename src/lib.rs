#![forbid(unsafe_code)]
//! # cbef_reader: streaming decryption of CBEF encrypted files.
//!
//! A CBEF file is a fixed 80-byte header followed by independently sealed
//! AES-GCM chunks. Every chunk is authenticated against the full header and
//! its own byte offset in the file, so chunks cannot be reordered, dropped
//! mid-file or spliced in from another file without detection.
//!
//! ## Features
//! - **Header validation** with a distinct error for every malformed field
//! - **Per-file keys** derived with KBKDF (HMAC-SHA256, counter mode) from
//!   caller-supplied key material
//! - **Streaming decryption** in constant memory, one chunk at a time
//! - **Optional decompression** of zlib or gzip payloads
//!
//! ## Example: read a file
//! ```no_run
//! use std::io::Read;
//! use cbef_reader::CbefReader;
//!
//! let lookup = |key_id: &str| (key_id == "my-key").then(|| vec![0x11; 32]);
//! let file = std::fs::File::open("data.cbef")?;
//! let mut reader = CbefReader::new(file, &lookup)?;
//!
//! let mut plaintext = Vec::new();
//! reader.read_to_end(&mut plaintext)?;
//! reader.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Safety notes
//! - Decryption only; the crate cannot produce CBEF files.
//! - Plaintext is released chunk by chunk: a failure in a later chunk does
//!   not retract data already returned from earlier, authenticated chunks.

mod types;
mod format;
mod header;
mod kdf;
mod crypto;
mod decryptor;
mod compression;
mod keymap;
mod reader;
mod file;

// Re-export public API from modules
pub use types::*;
pub use format::{
    AD_LEN, CHUNK_HEADER_LEN, COMPRESSION_OFFSET, Compression, HEADER_LEN, KDF_OFFSET,
    KEY_ID_LEN_OFFSET, KEY_ID_OFFSET, KdfAlg, MAGIC, MAX_KEY_ID_LEN, NONCE_LEN, RESERVED_OFFSET,
    SALT_LEN, SALT_OFFSET, TAG_LEN, VERSION, VERSION_OFFSET,
};
pub use header::{Header, validate_header};
pub use kdf::derive_key;
pub use decryptor::ChunkDecryptor;
pub use keymap::{KeyLookup, KeyMap, RawKeyLookup};
pub use reader::CbefReader;
pub use file::{decrypt_file, default_decrypt_output_path, persist_tempfile_atomic, read_header_from_file};
