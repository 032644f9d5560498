//! Per-file key derivation.
//!
//! The key that seals a file's chunks is never the raw key material from the
//! key store. It is derived with KBKDF (NIST SP 800-108, counter mode) using
//! HMAC-SHA256 as the PRF, with the same fixed-input layout OpenSSL's `KBKDF`
//! uses by default:
//!
//! ```text
//! K(i) = HMAC(key, [i]_32 || label || 0x00 || context || [L]_32)
//! ```
//!
//! where `i` starts at 1, `L` is the output length in bits, the label is
//! `"Couchbase Encrypted File"` and the context is
//! `"Couchbase Encrypted File/" || salt`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::format::{KBKDF_CONTEXT_PREFIX, KBKDF_LABEL, KdfAlg};
use crate::types::CbefError;

type HmacSha256 = Hmac<Sha256>;

/// Derive `out_len` bytes of key material for a file with the given salt.
///
/// # Errors
///
/// Returns `CbefError::KeyDerivation` if `out_len` is zero or too large to be
/// encoded in the 32-bit length field, or if the key is empty.
pub fn derive_key(
    alg: KdfAlg,
    key: &[u8],
    salt: &[u8],
    out_len: usize,
) -> Result<Zeroizing<Vec<u8>>, CbefError> {
    match alg {
        KdfAlg::KbkdfHmacSha256 => {
            let mut context = Vec::with_capacity(KBKDF_CONTEXT_PREFIX.len() + salt.len());
            context.extend_from_slice(KBKDF_CONTEXT_PREFIX);
            context.extend_from_slice(salt);
            kbkdf_hmac_sha256(key, KBKDF_LABEL, &context, out_len)
        }
    }
}

fn kbkdf_hmac_sha256(
    key: &[u8],
    label: &[u8],
    context: &[u8],
    out_len: usize,
) -> Result<Zeroizing<Vec<u8>>, CbefError> {
    if key.is_empty() {
        return Err(CbefError::KeyDerivation("key material is empty"));
    }
    if out_len == 0 {
        return Err(CbefError::KeyDerivation("requested key length is zero"));
    }
    let len_bits = out_len
        .checked_mul(8)
        .and_then(|bits| u32::try_from(bits).ok())
        .ok_or(CbefError::KeyDerivation("requested key length too large"))?;

    let prf = HmacSha256::new_from_slice(key)
        .map_err(|_| CbefError::KeyDerivation("invalid HMAC key"))?;

    let mut out = Zeroizing::new(Vec::with_capacity(out_len));
    let mut counter: u32 = 1;
    while out.len() < out_len {
        let mut mac = prf.clone();
        mac.update(&counter.to_be_bytes());
        mac.update(label);
        mac.update(&[0u8]);
        mac.update(context);
        mac.update(&len_bits.to_be_bytes());
        let block = mac.finalize().into_bytes();

        let take = (out_len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);
        counter = counter
            .checked_add(1)
            .ok_or(CbefError::KeyDerivation("counter overflow"))?;
    }
    Ok(out)
}
