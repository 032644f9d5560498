//! On-disk format constants (CBEF version 1).
//!
//! File header layout:
//!
//! | offset | length | field                             |
//! |--------|--------|-----------------------------------|
//! | 0      | 21     | magic `\0Couchbase Encrypted\0`   |
//! | 21     | 1      | version                           |
//! | 22     | 1      | compression                       |
//! | 23     | 1      | key derivation                    |
//! | 24     | 3      | reserved (zero)                   |
//! | 27     | 1      | key id length                     |
//! | 28     | 36     | key id                            |
//! | 64     | 16     | random salt                       |
//!
//! The header is followed by chunks of
//! `[u32 BE chunk size][12-byte nonce][ciphertext || 16-byte tag]`, where the
//! chunk size counts the nonce, ciphertext and tag. Each chunk is sealed with
//! AES-GCM using `header || u64 BE offset of the chunk` as associated data.

use std::fmt;

pub const MAGIC: &[u8; 21] = b"\0Couchbase Encrypted\0";
pub const VERSION: u8 = 1;

pub const MAGIC_OFFSET: usize = 0;
pub const VERSION_OFFSET: usize = 21;
pub const COMPRESSION_OFFSET: usize = 22;
pub const KDF_OFFSET: usize = 23;
pub const RESERVED_OFFSET: usize = 24;
pub const KEY_ID_LEN_OFFSET: usize = 27;
pub const KEY_ID_OFFSET: usize = 28;
pub const SALT_OFFSET: usize = 64;

pub const HEADER_LEN: usize = 80;
pub const SALT_LEN: usize = HEADER_LEN - SALT_OFFSET;
pub const MAX_KEY_ID_LEN: usize = SALT_OFFSET - KEY_ID_OFFSET;

pub const CHUNK_HEADER_LEN: usize = 4;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Header followed by the 8-byte chunk offset.
pub const AD_LEN: usize = HEADER_LEN + 8;

pub const KBKDF_LABEL: &[u8] = b"Couchbase Encrypted File";
pub const KBKDF_CONTEXT_PREFIX: &[u8] = b"Couchbase Encrypted File/";

/// Compression applied to the plaintext before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Zlib = 2,
    Gzip = 3,
}

impl Compression {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name for any compression code, including ones the
    /// format reserves but this reader does not decode.
    pub fn describe(code: u8) -> &'static str {
        match code {
            0 => "no compression",
            1 => "snappy",
            2 => "zlib",
            3 => "gzip",
            4 => "zstd",
            5 => "bzip2",
            _ => "undefined compression algorithm",
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Compression::None),
            2 => Ok(Compression::Zlib),
            3 => Ok(Compression::Gzip),
            other => Err(other),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Compression::describe(self.code()))
    }
}

/// Supported key derivation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum KdfAlg {
    /// NIST SP 800-108 counter mode with HMAC-SHA256 (OpenSSL KBKDF defaults).
    #[default]
    KbkdfHmacSha256 = 1,
}

impl KdfAlg {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for KdfAlg {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(KdfAlg::KbkdfHmacSha256),
            other => Err(other),
        }
    }
}

impl fmt::Display for KdfAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KdfAlg::KbkdfHmacSha256 => f.write_str("KBKDF HMAC-SHA256 (counter mode)"),
        }
    }
}
