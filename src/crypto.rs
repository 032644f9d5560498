//! AES-GCM primitive used to open chunks.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};

use crate::format::NONCE_LEN;
use crate::types::CbefError;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// AES-GCM with the key size picked from the derived key's length
/// (16, 24 or 32 bytes).
pub(crate) enum GcmCipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl GcmCipher {
    pub(crate) fn new(key: &[u8]) -> Result<Self, CbefError> {
        let invalid = |_| CbefError::InvalidKeyLength(key.len());
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            n => Err(CbefError::InvalidKeyLength(n)),
        }
    }

    /// Authenticate and decrypt `buf` in place.
    ///
    /// On success `buf` holds the plaintext (the tag is truncated away). On
    /// failure the tag did not verify and no keystream has been applied.
    pub(crate) fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        ad: &[u8],
        buf: &mut Vec<u8>,
    ) -> Result<(), aes_gcm::aead::Error> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.decrypt_in_place(nonce, ad, buf),
            Self::Aes192(c) => c.decrypt_in_place(nonce, ad, buf),
            Self::Aes256(c) => c.decrypt_in_place(nonce, ad, buf),
        }
    }
}
