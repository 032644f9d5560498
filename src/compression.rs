//! Optional decompression layered over the decryptor.

use std::io::{self, BufRead, BufReader, Read};

use flate2::bufread::{MultiGzDecoder, ZlibDecoder};

use crate::decryptor::ChunkDecryptor;
use crate::format::Compression;
use crate::types::CbefError;

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];
const ZLIB_METHOD_DEFLATE: u8 = 8;
const ZLIB_MAX_WINDOW_BITS: u8 = 7;
const ZLIB_FLAG_PRESET_DICT: u8 = 0x20;

/// The outermost reader handed to callers: the decryptor itself, or a
/// decompressor reading from it.
pub(crate) enum Pipeline<R: Read> {
    Plain(ChunkDecryptor<R>),
    Zlib(ZlibDecoder<BufReader<ChunkDecryptor<R>>>),
    Gzip(MultiGzDecoder<BufReader<ChunkDecryptor<R>>>),
}

impl<R: Read> Pipeline<R> {
    /// Wrap `decryptor` according to `compression`.
    ///
    /// For compressed payloads the stream header is peeked (not consumed) so a
    /// malformed payload fails here rather than on the first read.
    pub(crate) fn new(
        decryptor: ChunkDecryptor<R>,
        compression: Compression,
    ) -> Result<Self, CbefError> {
        match compression {
            Compression::None => Ok(Self::Plain(decryptor)),
            Compression::Zlib => {
                let mut inner = BufReader::new(decryptor);
                check_zlib_header(peek(&mut inner)?)?;
                Ok(Self::Zlib(ZlibDecoder::new(inner)))
            }
            Compression::Gzip => {
                let mut inner = BufReader::new(decryptor);
                check_gzip_header(peek(&mut inner)?)?;
                Ok(Self::Gzip(MultiGzDecoder::new(inner)))
            }
        }
    }

    /// Drop the decompression layer and close the decryptor.
    ///
    /// The flate2 decoders hold no closeable resources of their own, so the
    /// decryptor's result is the only one to report.
    pub(crate) fn close(self) -> io::Result<()> {
        let mut decryptor = match self {
            Self::Plain(d) => d,
            Self::Zlib(z) => z.into_inner().into_inner(),
            Self::Gzip(g) => g.into_inner().into_inner(),
        };
        decryptor.close()
    }
}

impl<R: Read> Read for Pipeline<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(d) => d.read(buf),
            Self::Zlib(z) => z.read(buf),
            Self::Gzip(g) => g.read(buf),
        }
    }
}

fn peek<R: Read>(inner: &mut BufReader<R>) -> Result<&[u8], CbefError> {
    inner.fill_buf().map_err(CbefError::CompressedHeaderRead)
}

fn check_zlib_header(bytes: &[u8]) -> Result<(), CbefError> {
    let invalid = |reason| CbefError::InvalidCompressedStream {
        compression: Compression::Zlib,
        reason,
    };
    let [cmf, flg, ..] = *bytes else {
        return Err(invalid("stream too short for a zlib header"));
    };
    if cmf & 0x0f != ZLIB_METHOD_DEFLATE {
        return Err(invalid("unknown compression method"));
    }
    if cmf >> 4 > ZLIB_MAX_WINDOW_BITS {
        return Err(invalid("window size too large"));
    }
    if ((u16::from(cmf) << 8) | u16::from(flg)) % 31 != 0 {
        return Err(invalid("header checksum mismatch"));
    }
    if flg & ZLIB_FLAG_PRESET_DICT != 0 {
        return Err(invalid("preset dictionaries are not supported"));
    }
    Ok(())
}

fn check_gzip_header(bytes: &[u8]) -> Result<(), CbefError> {
    let invalid = |reason| CbefError::InvalidCompressedStream {
        compression: Compression::Gzip,
        reason,
    };
    if bytes.len() < GZIP_MAGIC.len() {
        return Err(invalid("stream too short for a gzip header"));
    }
    if bytes[..GZIP_MAGIC.len()] != GZIP_MAGIC {
        return Err(invalid("invalid gzip header"));
    }
    Ok(())
}
