//! Chunked AEAD decryption over a byte stream.

use std::io::{self, Read};

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::GcmCipher;
use crate::format::{AD_LEN, CHUNK_HEADER_LEN, HEADER_LEN, NONCE_LEN};
use crate::header::Header;
use crate::types::CbefError;

enum State {
    Open,
    /// Clean end of stream at a chunk boundary.
    Exhausted,
    /// A chunk failed; holds the error not yet handed to the caller.
    Failed(Option<io::Error>),
    Closed,
}

/// Reads chunks from `source`, authenticates and decrypts each one, and serves
/// the plaintext through [`Read`]. Not thread safe.
///
/// The ciphertext buffer doubles as the plaintext buffer: a chunk is read into
/// it, opened in place, then drained by subsequent reads. Its allocation is
/// reused across chunks and only grows by the bytes the source delivers, never
/// by a declared chunk size alone.
pub struct ChunkDecryptor<R> {
    source: R,
    cipher: GcmCipher,
    ad: Zeroizing<Vec<u8>>,
    nonce: [u8; NONCE_LEN],
    chunk_header: [u8; CHUNK_HEADER_LEN],
    buffer: Zeroizing<Vec<u8>>,
    read_pos: usize,
    plaintext_len: usize,
    file_offset: u64,
    max_chunk_size: u32,
    state: State,
}

impl<R: Read> ChunkDecryptor<R> {
    /// `source` must be positioned at the first chunk, right after `header`.
    pub fn new(
        source: R,
        key: &[u8],
        header: &Header,
        max_chunk_size: u32,
    ) -> Result<Self, CbefError> {
        let cipher = GcmCipher::new(key)?;

        let mut ad = Zeroizing::new(vec![0u8; AD_LEN]);
        ad[..HEADER_LEN].copy_from_slice(header.as_bytes());

        Ok(Self {
            source,
            cipher,
            ad,
            nonce: [0u8; NONCE_LEN],
            chunk_header: [0u8; CHUNK_HEADER_LEN],
            buffer: Zeroizing::new(Vec::new()),
            read_pos: 0,
            plaintext_len: 0,
            file_offset: HEADER_LEN as u64,
            max_chunk_size,
            state: State::Open,
        })
    }

    /// Offset of the next chunk header, counted from the start of the file.
    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    /// Gets a reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Wipe all key-dependent and plaintext state. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = State::Closed;

        self.ad.zeroize();
        self.nonce.zeroize();
        self.chunk_header.zeroize();
        self.buffer.zeroize();
        // Release the memory, not just the contents.
        *self.buffer = Vec::new();
        *self.ad = Vec::new();
        self.read_pos = 0;
        self.plaintext_len = 0;
        Ok(())
    }

    /// Read the 4-byte chunk header. `Ok(false)` means the source ended
    /// cleanly before the first byte of it.
    fn read_chunk_header(&mut self) -> io::Result<bool> {
        let mut filled = 0;
        while filled < CHUNK_HEADER_LEN {
            match self.source.read(&mut self.chunk_header[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a chunk header",
                    ));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Read and decrypt the next chunk into the buffer.
    ///
    /// Returns `Ok(false)` on a clean end of stream. Source errors are
    /// returned as-is; decode failures as `CbefError` wrapped in `io::Error`.
    fn read_and_decrypt(&mut self) -> io::Result<bool> {
        if !self.read_chunk_header()? {
            return Ok(false);
        }
        let chunk_size = u32::from_be_bytes(self.chunk_header);

        self.source.read_exact(&mut self.nonce)?;

        if (chunk_size as usize) < NONCE_LEN {
            return Err(CbefError::InvalidChunkSize(chunk_size).into());
        }
        if chunk_size > self.max_chunk_size {
            return Err(CbefError::ChunkTooLarge {
                size: chunk_size,
                max: self.max_chunk_size,
            }
            .into());
        }
        let ciphertext_len = chunk_size as usize - NONCE_LEN;

        // Grow only as ciphertext actually arrives; the declared size is untrusted.
        self.buffer.clear();
        let got = (&mut self.source)
            .take(ciphertext_len as u64)
            .read_to_end(&mut self.buffer)?;
        if got != ciphertext_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a chunk",
            ));
        }

        self.ad[HEADER_LEN..].copy_from_slice(&self.file_offset.to_be_bytes());

        log::trace!(
            "opening chunk at offset {} ({} bytes)",
            self.file_offset,
            chunk_size
        );
        if self
            .cipher
            .open_in_place(&self.nonce, &self.ad, &mut self.buffer)
            .is_err()
        {
            self.buffer.zeroize();
            return Err(CbefError::AuthenticationFailed {
                offset: self.file_offset,
            }
            .into());
        }

        // chunk_size already includes the nonce.
        self.file_offset += (CHUNK_HEADER_LEN as u64) + u64::from(chunk_size);

        self.read_pos = 0;
        self.plaintext_len = self.buffer.len();
        Ok(true)
    }
}

impl<R: Read> Read for ChunkDecryptor<R> {
    fn read(&mut self, data: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            State::Closed => return Err(CbefError::DecryptorClosed.into()),
            State::Failed(pending) => {
                return Err(pending
                    .take()
                    .unwrap_or_else(|| CbefError::StreamFailed.into()));
            }
            State::Open | State::Exhausted => {}
        }

        if data.is_empty() {
            return Ok(0);
        }

        let mut read = 0;
        while read < data.len() {
            if self.read_pos < self.plaintext_len {
                let available = &self.buffer[self.read_pos..self.plaintext_len];
                let n = available.len().min(data.len() - read);
                data[read..read + n].copy_from_slice(&available[..n]);
                read += n;
                self.read_pos += n;
                continue;
            }

            if matches!(self.state, State::Exhausted) {
                break;
            }

            match self.read_and_decrypt() {
                Ok(true) => {}
                Ok(false) => {
                    self.state = State::Exhausted;
                    break;
                }
                Err(e) => {
                    self.read_pos = 0;
                    self.plaintext_len = 0;
                    if read == 0 {
                        self.state = State::Failed(None);
                        return Err(e);
                    }
                    // Hand out what was already decrypted; report the failure next call.
                    self.state = State::Failed(Some(e));
                    break;
                }
            }
        }

        Ok(read)
    }
}

impl<R> std::fmt::Debug for ChunkDecryptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDecryptor")
            .field("file_offset", &self.file_offset)
            .field("buffered", &(self.plaintext_len - self.read_pos))
            .finish_non_exhaustive()
    }
}
