//! File header parsing and validation.

use std::io::{self, Read};

use crate::format::{
    COMPRESSION_OFFSET, Compression, HEADER_LEN, KDF_OFFSET, KEY_ID_LEN_OFFSET, KEY_ID_OFFSET,
    KdfAlg, MAGIC, MAGIC_OFFSET, MAX_KEY_ID_LEN, RESERVED_OFFSET, SALT_OFFSET, VERSION, VERSION_OFFSET,
};
use crate::types::CbefError;

/// Validate a raw file header.
///
/// Checks run in a fixed order (length, magic, version, compression, KDF id,
/// reserved bytes, key id length) and the first failure is reported with its
/// own error variant.
pub fn validate_header(header: &[u8]) -> Result<(), CbefError> {
    if header.len() != HEADER_LEN {
        return Err(CbefError::InvalidHeaderLength(header.len()));
    }

    if &header[MAGIC_OFFSET..VERSION_OFFSET] != MAGIC.as_slice() {
        return Err(CbefError::BadMagic);
    }

    if header[VERSION_OFFSET] != VERSION {
        return Err(CbefError::UnsupportedVersion(header[VERSION_OFFSET]));
    }

    Compression::try_from(header[COMPRESSION_OFFSET])
        .map_err(|code| CbefError::UnsupportedCompression { code })?;

    KdfAlg::try_from(header[KDF_OFFSET]).map_err(CbefError::UnsupportedKdf)?;

    if let Some(offset) =
        (RESERVED_OFFSET..KEY_ID_LEN_OFFSET).find(|&i| header[i] != 0)
    {
        return Err(CbefError::ReservedNotZero { offset });
    }

    let key_id_len = header[KEY_ID_LEN_OFFSET];
    if key_id_len == 0 || usize::from(key_id_len) > MAX_KEY_ID_LEN {
        return Err(CbefError::InvalidKeyIdLength(key_id_len));
    }

    Ok(())
}

/// A validated, immutable CBEF file header.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    bytes: [u8; HEADER_LEN],
}

impl Header {
    /// Parse and validate a header from exactly [`HEADER_LEN`] bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, CbefError> {
        validate_header(bytes)?;
        let mut owned = [0u8; HEADER_LEN];
        owned.copy_from_slice(bytes);
        Ok(Self { bytes: owned })
    }

    /// Read and validate the header at the start of `reader`.
    ///
    /// A stream shorter than the header is reported as
    /// [`CbefError::TruncatedHeader`]; any other read failure as
    /// [`CbefError::HeaderRead`].
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, CbefError> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CbefError::TruncatedHeader(HEADER_LEN),
            _ => CbefError::HeaderRead(e),
        })?;
        Self::parse(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.bytes
    }

    pub fn version(&self) -> u8 {
        self.bytes[VERSION_OFFSET]
    }

    pub fn compression(&self) -> Compression {
        // Validated on construction.
        Compression::try_from(self.bytes[COMPRESSION_OFFSET]).unwrap_or(Compression::None)
    }

    /// Raw compression code as stored on disk.
    pub fn compression_code(&self) -> u8 {
        self.bytes[COMPRESSION_OFFSET]
    }

    pub fn kdf(&self) -> KdfAlg {
        KdfAlg::try_from(self.bytes[KDF_OFFSET]).unwrap_or_default()
    }

    /// Key identifier bytes (only the significant `key id length` bytes).
    pub fn key_id(&self) -> &[u8] {
        let len = usize::from(self.bytes[KEY_ID_LEN_OFFSET]);
        &self.bytes[KEY_ID_OFFSET..KEY_ID_OFFSET + len]
    }

    pub fn key_id_str(&self) -> Result<&str, CbefError> {
        std::str::from_utf8(self.key_id()).map_err(|_| CbefError::KeyIdNotUtf8)
    }

    pub fn salt(&self) -> &[u8] {
        &self.bytes[SALT_OFFSET..]
    }
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Header")
            .field("version", &self.version())
            .field("compression", &self.compression())
            .field("kdf", &self.kdf())
            .field("key_id", &String::from_utf8_lossy(self.key_id()))
            .field("salt", &hex::encode(self.salt()))
            .finish()
    }
}
