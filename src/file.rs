//! File-level helpers built on [`CbefReader`].

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::header::Header;
use crate::keymap::KeyLookup;
use crate::reader::CbefReader;
use crate::types::{CbefError, DecryptOptions};

/// Extension stripped from encrypted file names when deriving an output path.
pub const ENCRYPTED_EXTENSION: &str = "cbef";

/// Decrypt (and decompress, if needed) an encrypted file on disk.
///
/// Plaintext is streamed into a temporary file next to the destination and
/// only moved into place once the whole input has been authenticated, so a
/// failed decryption never leaves partial output behind.
///
/// # Errors
///
/// Any construction error from [`CbefReader`], `CbefError::Invalid` if the
/// output exists and `opts.force` is not set, the decode error (for example
/// `AuthenticationFailed`) of a chunk that fails mid-stream, or `CbefError::Io`
/// for plain I/O failures.
pub fn decrypt_file<K>(
    input: &Path,
    output: Option<&Path>,
    keys: &K,
    opts: &DecryptOptions,
) -> Result<PathBuf, CbefError>
where
    K: KeyLookup + ?Sized,
{
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_decrypt_output_path(input));

    if out_path.exists() && !opts.force {
        return Err(CbefError::Invalid("output exists; use --force to overwrite"));
    }

    let source = BufReader::new(File::open(input)?);
    let mut reader = CbefReader::with_options(source, keys, &opts.reader)?;

    let parent = match out_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;

    let copied = io::copy(&mut reader, &mut tmp);
    let closed = reader.close();
    let written = copied?;
    closed?;

    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    let out = persist_tempfile_atomic(tmp, &out_path, opts.force)?;
    log::debug!("decrypted {} bytes into {}", written, out.display());
    Ok(out)
}

/// Read and validate only the header of an encrypted file.
pub fn read_header_from_file(path: &Path) -> Result<Header, CbefError> {
    let mut f = File::open(path)?;
    Header::read_from(&mut f)
}

/// Atomically persist a tempfile to the target path, honoring the force overwrite policy.
pub fn persist_tempfile_atomic(
    tmp: NamedTempFile,
    out: &Path,
    force: bool,
) -> Result<PathBuf, CbefError> {
    let tmp_path = tmp.into_temp_path();

    if out.exists() {
        if force {
            fs::remove_file(out)?;
        } else {
            return Err(CbefError::Invalid("output exists; use --force to overwrite"));
        }
    }

    tmp_path.persist(out).map_err(|e| CbefError::Io(e.error))?;
    Ok(out.to_path_buf())
}

/// Determine the default output path for decryption:
/// - if the input file ends with ".cbef", strip that extension
/// - otherwise, append ".dec"
pub fn default_decrypt_output_path(in_path: &Path) -> PathBuf {
    let parent = in_path.parent().unwrap_or_else(|| Path::new(""));
    let file_name = in_path.file_name().unwrap_or_else(|| OsStr::new("out"));

    if let Some(name) = file_name.to_str() {
        if let Some(stripped) = name
            .strip_suffix(ENCRYPTED_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .filter(|s| !s.is_empty())
        {
            return parent.join(stripped);
        }
        return parent.join(format!("{name}.dec"));
    }

    // Non-UTF-8 file name: just append ".dec"
    let mut os = file_name.to_os_string();
    os.push(".dec");
    parent.join(os)
}
