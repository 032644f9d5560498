//! Reference encoder and helpers shared by the integration tests.
//!
//! The encoder mirrors the companion writer: plaintext is optionally
//! compressed, split into fixed-size chunks, and each chunk is sealed with
//! AES-GCM under a nonce of `[4-byte fixed counter][8-byte BE counter]`, with
//! `header || BE offset` as associated data.
#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::ops::Range;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use cbef_reader::{
    COMPRESSION_OFFSET, CbefError, Compression, HEADER_LEN, KDF_OFFSET, KEY_ID_LEN_OFFSET,
    KEY_ID_OFFSET, KdfAlg, KeyMap, MAGIC, SALT_OFFSET, VERSION, VERSION_OFFSET, derive_key,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub const KEY_ID: &str = "query-key-1";
pub const KEY: [u8; 32] = [0x5a; 32];
pub const SALT: [u8; 16] = *b"0123456789abcdef";
pub const DEFAULT_CHUNK: usize = 64 * 1024;

#[derive(Clone)]
pub struct EncodeOpts {
    pub key_id: String,
    pub key: Vec<u8>,
    pub salt: [u8; 16],
    pub compression: Compression,
    pub chunk_size: usize,
}

impl Default for EncodeOpts {
    fn default() -> Self {
        Self {
            key_id: KEY_ID.to_string(),
            key: KEY.to_vec(),
            salt: SALT,
            compression: Compression::None,
            chunk_size: DEFAULT_CHUNK,
        }
    }
}

impl EncodeOpts {
    pub fn compression(mut self, c: Compression) -> Self {
        self.compression = c;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }
}

pub fn keys() -> KeyMap {
    let mut map = KeyMap::new();
    map.insert(KEY_ID, KEY.to_vec());
    map
}

pub fn header_bytes(opts: &EncodeOpts) -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    h[..VERSION_OFFSET].copy_from_slice(MAGIC);
    h[VERSION_OFFSET] = VERSION;
    h[COMPRESSION_OFFSET] = opts.compression.code();
    h[KDF_OFFSET] = KdfAlg::KbkdfHmacSha256.id();
    h[KEY_ID_LEN_OFFSET] = opts.key_id.len() as u8;
    h[KEY_ID_OFFSET..KEY_ID_OFFSET + opts.key_id.len()].copy_from_slice(opts.key_id.as_bytes());
    h[SALT_OFFSET..].copy_from_slice(&opts.salt);
    h
}

pub fn compress(data: &[u8], compression: Compression) -> Vec<u8> {
    match compression {
        Compression::None => data.to_vec(),
        Compression::Zlib => {
            let mut enc =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }
        Compression::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }
    }
}

fn seal(key: &[u8], nonce: &[u8; 12], msg: &[u8], aad: &[u8]) -> Vec<u8> {
    let nonce = GenericArray::from_slice(nonce);
    let payload = Payload { msg, aad };
    let sealed = match key.len() {
        16 => Aes128Gcm::new_from_slice(key).unwrap().encrypt(nonce, payload),
        32 => Aes256Gcm::new_from_slice(key).unwrap().encrypt(nonce, payload),
        n => panic!("test encoder does not support {n}-byte keys"),
    };
    sealed.unwrap()
}

/// Seal `chunks` (already compressed, if at all) after the given header.
pub fn encode_chunks(header: &[u8; HEADER_LEN], key: &[u8], chunks: &[&[u8]]) -> Vec<u8> {
    let derived = derive_key(
        KdfAlg::KbkdfHmacSha256,
        key,
        &header[SALT_OFFSET..],
        key.len(),
    )
    .unwrap();

    let mut out = header.to_vec();
    let mut ad = header.to_vec();
    ad.extend_from_slice(&[0u8; 8]);

    for (counter, chunk) in chunks.iter().enumerate() {
        let mut nonce = [0u8; 12];
        nonce[4..].copy_from_slice(&(counter as u64).to_be_bytes());

        let offset = out.len() as u64;
        ad[HEADER_LEN..].copy_from_slice(&offset.to_be_bytes());

        let ct = seal(&derived, &nonce, chunk, &ad);
        out.extend_from_slice(&((12 + ct.len()) as u32).to_be_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
    }
    out
}

/// Produce a complete container for `plaintext`.
pub fn encode(plaintext: &[u8], opts: &EncodeOpts) -> Vec<u8> {
    let header = header_bytes(opts);
    let payload = compress(plaintext, opts.compression);
    let chunks: Vec<&[u8]> = payload.chunks(opts.chunk_size).collect();
    encode_chunks(&header, &opts.key, &chunks)
}

/// Byte ranges of each chunk (including its 4-byte size field).
pub fn chunk_ranges(container: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut pos = HEADER_LEN;
    while pos < container.len() {
        let size = u32::from_be_bytes(container[pos..pos + 4].try_into().unwrap()) as usize;
        ranges.push(pos..pos + 4 + size);
        pos += 4 + size;
    }
    ranges
}

pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = vec![0u8; len];
    rng.fill_bytes(&mut v);
    v
}

/// Compressible but not trivially so.
pub fn text_bytes(len: usize) -> Vec<u8> {
    let words = ["select ", "from ", "where ", "bucket ", "scope ", "index ", "42 ", "\n"];
    let mut out = Vec::with_capacity(len);
    let mut i = 0usize;
    while out.len() < len {
        out.extend_from_slice(words[(i * 7 + i / 3) % words.len()].as_bytes());
        i += 1;
    }
    out.truncate(len);
    out
}

/// Drain `r` using a fixed read-buffer size until a clean end of stream.
pub fn read_all_with<R: Read>(r: &mut R, buf_size: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; buf_size];
    loop {
        match r.read(&mut buf)? {
            0 => return Ok(out),
            n => out.extend_from_slice(&buf[..n]),
        }
    }
}

/// Drain `r` until the first error, returning everything read before it.
pub fn read_until_error<R: Read>(r: &mut R, buf_size: usize) -> (Vec<u8>, io::Result<()>) {
    let mut out = Vec::new();
    let mut buf = vec![0u8; buf_size];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return (out, Ok(())),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) => return (out, Err(e)),
        }
    }
}

pub fn cbef_err(err: &io::Error) -> &CbefError {
    CbefError::from_io(err).unwrap_or_else(|| panic!("expected a CbefError, got {err:?}"))
}
