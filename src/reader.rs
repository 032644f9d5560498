//! The reader callers use: header validation, key setup, decryption and
//! optional decompression behind a single [`Read`].

use std::io::{self, Read};

use zeroize::Zeroizing;

use crate::compression::Pipeline;
use crate::decryptor::ChunkDecryptor;
use crate::format::Compression;
use crate::header::Header;
use crate::kdf::derive_key;
use crate::keymap::KeyLookup;
use crate::types::{CbefError, ReaderOptions};

/// Streaming reader for a CBEF file. Not thread safe.
///
/// Read flow: encrypted chunks from the source -> decrypted into an internal
/// buffer -> decompressed (if the file is compressed) -> returned to the caller.
///
/// Errors from the source, including end of stream, reach the caller
/// unchanged. Format and authentication failures surface as `io::Error`s
/// carrying a [`CbefError`]; use [`CbefError::from_io`] to inspect them.
///
/// ```no_run
/// use std::fs::File;
/// use std::io::Read;
/// use cbef_reader::{CbefReader, KeyMap};
///
/// let keys = KeyMap::load("keys.txt".as_ref())?;
/// let mut reader = CbefReader::new(File::open("data.cbef")?, &keys)?;
/// let mut text = String::new();
/// reader.read_to_string(&mut text)?;
/// reader.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CbefReader<R: Read> {
    header: Header,
    // Outermost layer of the read pipeline; `None` once closed.
    pipeline: Option<Pipeline<R>>,
}

impl<R: Read> CbefReader<R> {
    /// Open a reader with default options.
    pub fn new<K>(source: R, keys: &K) -> Result<Self, CbefError>
    where
        K: KeyLookup + ?Sized,
    {
        Self::with_options(source, keys, &ReaderOptions::default())
    }

    /// Read and validate the header from `source`, resolve and derive the
    /// file key, and set up decryption (plus decompression if the header asks
    /// for it).
    pub fn with_options<K>(
        mut source: R,
        keys: &K,
        opts: &ReaderOptions,
    ) -> Result<Self, CbefError>
    where
        K: KeyLookup + ?Sized,
    {
        let header = Header::read_from(&mut source)?;

        let key_id = String::from_utf8_lossy(header.key_id());
        let raw_key = Zeroizing::new(
            keys.lookup_raw(header.key_id())
                .ok_or_else(|| CbefError::KeyNotFound(key_id.clone().into_owned()))?,
        );

        let derived = derive_key(header.kdf(), &raw_key, header.salt(), raw_key.len())?;
        let decryptor = ChunkDecryptor::new(source, &derived, &header, opts.max_chunk_size)?;

        let compression = Compression::try_from(header.compression_code())
            .map_err(|code| CbefError::UnsupportedCompression { code })?;
        let pipeline = Pipeline::new(decryptor, compression)?;

        log::debug!(
            "opened encrypted file: key id {:?}, {}, {}",
            key_id,
            compression,
            header.kdf()
        );

        Ok(Self {
            header,
            pipeline: Some(pipeline),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn compression(&self) -> Compression {
        self.header.compression()
    }

    pub fn is_closed(&self) -> bool {
        self.pipeline.is_none()
    }

    /// Close the reader. A second call is a no-op.
    ///
    /// The decompression layer goes first, then the decryptor, which wipes
    /// its key-dependent buffers. The source is dropped along with the
    /// decryptor; pass `&mut source` to keep ownership of it.
    pub fn close(&mut self) -> io::Result<()> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };
        log::debug!("closing encrypted file reader");
        pipeline.close()
    }
}

// Do not wrap errors from the pipeline: callers compare kinds directly
// (e.g. `UnexpectedEof` from the source).
impl<R: Read> Read for CbefReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.read(buf),
            None => Err(CbefError::ReaderClosed.into()),
        }
    }
}

impl<R: Read> std::fmt::Debug for CbefReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbefReader")
            .field("header", &self.header)
            .field("closed", &self.is_closed())
            .finish()
    }
}
