//! Key resolution: mapping a header's key id to raw key material.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use zeroize::Zeroize;

use crate::types::CbefError;

/// Resolves a key id from a file header to raw key material.
///
/// Called at most once per reader construction. Returning `None` fails the
/// construction with [`CbefError::KeyNotFound`].
pub trait KeyLookup {
    fn lookup(&self, key_id: &str) -> Option<Vec<u8>>;

    /// Resolve the key id exactly as stored in the header.
    ///
    /// The default forwards UTF-8 ids to [`lookup`](Self::lookup) and resolves
    /// nothing else. Stores keyed by raw bytes override it; see [`RawKeyLookup`].
    fn lookup_raw(&self, key_id: &[u8]) -> Option<Vec<u8>> {
        std::str::from_utf8(key_id).ok().and_then(|id| self.lookup(id))
    }
}

impl<F> KeyLookup for F
where
    F: Fn(&str) -> Option<Vec<u8>>,
{
    fn lookup(&self, key_id: &str) -> Option<Vec<u8>> {
        self(key_id)
    }
}

/// Lookup over raw key id bytes. Ids that are not UTF-8 reach the closure unchanged.
///
/// ```
/// use cbef_reader::RawKeyLookup;
///
/// let keys = RawKeyLookup(|id: &[u8]| (id == b"\xffkey").then(|| vec![0u8; 32]));
/// # let _ = keys;
/// ```
pub struct RawKeyLookup<F>(pub F);

impl<F> KeyLookup for RawKeyLookup<F>
where
    F: Fn(&[u8]) -> Option<Vec<u8>>,
{
    fn lookup(&self, key_id: &str) -> Option<Vec<u8>> {
        (self.0)(key_id.as_bytes())
    }

    fn lookup_raw(&self, key_id: &[u8]) -> Option<Vec<u8>> {
        (self.0)(key_id)
    }
}

/// In-memory store of named symmetric keys.
#[derive(Default, Clone)]
pub struct KeyMap {
    keys: HashMap<String, Vec<u8>>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, returning the previous key stored under `id` (if any).
    pub fn insert(&mut self, id: impl Into<String>, key: Vec<u8>) -> Option<Vec<u8>> {
        self.keys.insert(id.into(), key)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load a key file.
    ///
    /// One key per line as `<key-id> <hex key>`; blank lines and lines
    /// starting with `#` are skipped.
    pub fn load(path: &Path) -> Result<Self, CbefError> {
        let mut text = fs::read_to_string(path)?;
        let parsed = Self::parse(&text);
        text.zeroize();
        parsed
    }

    pub fn parse(text: &str) -> Result<Self, CbefError> {
        let mut map = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(id), Some(hex_key), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(CbefError::InvalidKeyFile {
                    line: line_no,
                    reason: "expected `<key-id> <hex key>`",
                });
            };
            let key = hex::decode(hex_key).map_err(|_| CbefError::InvalidKeyFile {
                line: line_no,
                reason: "key is not valid hex",
            })?;
            if key.is_empty() {
                return Err(CbefError::InvalidKeyFile {
                    line: line_no,
                    reason: "key is empty",
                });
            }
            if map.insert(id, key).is_some() {
                return Err(CbefError::InvalidKeyFile {
                    line: line_no,
                    reason: "duplicate key id",
                });
            }
        }
        Ok(map)
    }
}

impl KeyLookup for KeyMap {
    fn lookup(&self, key_id: &str) -> Option<Vec<u8>> {
        self.keys.get(key_id).cloned()
    }
}

impl Drop for KeyMap {
    fn drop(&mut self) {
        for key in self.keys.values_mut() {
            key.zeroize();
        }
    }
}

impl std::fmt::Debug for KeyMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_set().entries(self.keys.keys()).finish()
    }
}
