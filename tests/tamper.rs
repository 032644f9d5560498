//! Integrity: any modification of a chunk, its position, or the key it was
//! sealed under is detected before plaintext from that chunk is released.

mod common;

use std::io::{ErrorKind, Read};

use cbef_reader::{CbefError, CbefReader, Compression, HEADER_LEN, NONCE_LEN, SALT_OFFSET, TAG_LEN};
use common::{
    EncodeOpts, cbef_err, chunk_ranges, encode, keys, random_bytes, read_until_error,
};

const CHUNK: usize = 1000;

fn four_chunk_file() -> (Vec<u8>, Vec<u8>) {
    let plaintext = random_bytes(4 * CHUNK, 10);
    let container = encode(&plaintext, &EncodeOpts::default().chunk_size(CHUNK));
    assert_eq!(chunk_ranges(&container).len(), 4);
    (plaintext, container)
}

fn assert_auth_failure(err: &std::io::Error, offset: u64) {
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    match cbef_err(err) {
        CbefError::AuthenticationFailed { offset: got } => assert_eq!(*got, offset),
        other => panic!("expected AuthenticationFailed, got {other:?}"),
    }
}

/// Flip a bit at `pos` and check that decoding releases exactly the chunks
/// before the damaged one, then fails.
fn check_flip(pos: usize, damaged_chunk: usize) {
    let (plaintext, mut container) = four_chunk_file();
    let ranges = chunk_ranges(&container);
    container[pos] ^= 0x04;

    for buf_size in [1, 7, 4096, container.len()] {
        let mut reader = CbefReader::new(container.as_slice(), &keys()).unwrap();
        let (got, res) = read_until_error(&mut reader, buf_size);
        let err = res.expect_err("tampered chunk must not decode");
        assert_auth_failure(&err, ranges[damaged_chunk].start as u64);
        assert_eq!(got, plaintext[..damaged_chunk * CHUNK], "buf_size={buf_size}");
    }
}

#[test]
fn flipped_nonce_bit_fails() {
    let (_, container) = four_chunk_file();
    let r = &chunk_ranges(&container)[1];
    check_flip(r.start + 4 + 3, 1);
}

#[test]
fn flipped_ciphertext_bit_fails() {
    let (_, container) = four_chunk_file();
    let r = &chunk_ranges(&container)[2];
    check_flip(r.start + 4 + NONCE_LEN + 500, 2);
}

#[test]
fn flipped_tag_bit_fails() {
    let (_, container) = four_chunk_file();
    let r = &chunk_ranges(&container)[3];
    check_flip(r.end - TAG_LEN / 2, 3);
}

#[test]
fn first_chunk_damage_releases_nothing() {
    check_flip(HEADER_LEN + 4 + NONCE_LEN, 0);
}

#[test]
fn swapped_chunks_fail() {
    let (_, container) = four_chunk_file();
    let ranges = chunk_ranges(&container);
    let (a, b) = (ranges[0].clone(), ranges[1].clone());
    assert_eq!(a.len(), b.len());

    let mut swapped = container[..a.start].to_vec();
    swapped.extend_from_slice(&container[b.clone()]);
    swapped.extend_from_slice(&container[a.clone()]);
    swapped.extend_from_slice(&container[b.end..]);

    let mut reader = CbefReader::new(swapped.as_slice(), &keys()).unwrap();
    let (got, res) = read_until_error(&mut reader, 4096);
    assert!(got.is_empty());
    assert_auth_failure(&res.unwrap_err(), HEADER_LEN as u64);
}

#[test]
fn dropped_middle_chunk_fails() {
    let (plaintext, container) = four_chunk_file();
    let ranges = chunk_ranges(&container);

    let mut spliced = container[..ranges[1].start].to_vec();
    spliced.extend_from_slice(&container[ranges[2].start..]);

    let mut reader = CbefReader::new(spliced.as_slice(), &keys()).unwrap();
    let (got, res) = read_until_error(&mut reader, 4096);
    assert_eq!(got, plaintext[..CHUNK]);
    assert_auth_failure(&res.unwrap_err(), ranges[1].start as u64);
}

#[test]
fn chunk_from_another_file_fails() {
    let (_, container) = four_chunk_file();
    let mut other_opts = EncodeOpts::default().chunk_size(CHUNK);
    other_opts.salt = *b"fedcba9876543210";
    let other = encode(&random_bytes(4 * CHUNK, 11), &other_opts);

    // Same key, same position, different file.
    let ranges = chunk_ranges(&container);
    let mut spliced = container.clone();
    spliced[ranges[2].clone()].copy_from_slice(&other[ranges[2].clone()]);

    let mut reader = CbefReader::new(spliced.as_slice(), &keys()).unwrap();
    let (got, res) = read_until_error(&mut reader, 4096);
    assert_eq!(got.len(), 2 * CHUNK);
    assert_auth_failure(&res.unwrap_err(), ranges[2].start as u64);
}

#[test]
fn modified_salt_fails_first_chunk() {
    let (_, mut container) = four_chunk_file();
    container[SALT_OFFSET] ^= 0xff;

    // Header is still well-formed; the derived key and the AD no longer match.
    let mut reader = CbefReader::new(container.as_slice(), &keys()).unwrap();
    let err = reader.read(&mut [0u8; 16]).unwrap_err();
    assert_auth_failure(&err, HEADER_LEN as u64);
}

#[test]
fn wrong_key_material_fails() {
    let (_, container) = four_chunk_file();
    let wrong = |_: &str| Some(vec![0x01; 32]);
    let mut reader = CbefReader::new(container.as_slice(), &wrong).unwrap();
    let err = reader.read(&mut [0u8; 16]).unwrap_err();
    assert_auth_failure(&err, HEADER_LEN as u64);
}

#[test]
fn tampered_compressed_payload_fails_at_construction() {
    // With compression the first chunk is decrypted while peeking at the
    // compressed stream header.
    let plaintext = random_bytes(3000, 12);
    let mut container = encode(
        &plaintext,
        &EncodeOpts::default()
            .compression(Compression::Zlib)
            .chunk_size(CHUNK),
    );
    container[HEADER_LEN + 4 + NONCE_LEN + 1] ^= 0x01;

    match CbefReader::new(container.as_slice(), &keys()) {
        Err(CbefError::CompressedHeaderRead(e)) => assert_auth_failure(&e, HEADER_LEN as u64),
        other => panic!("expected CompressedHeaderRead, got {other:?}"),
    }
}

#[test]
fn truncation_inside_chunk_is_unexpected_eof() {
    let (plaintext, container) = four_chunk_file();
    let ranges = chunk_ranges(&container);

    // Cut in the size field, the nonce, and the ciphertext of the last chunk.
    for cut in [
        ranges[3].start + 2,
        ranges[3].start + 4 + 5,
        ranges[3].end - 1,
    ] {
        let truncated = &container[..cut];
        let mut reader = CbefReader::new(truncated, &keys()).unwrap();
        let (got, res) = read_until_error(&mut reader, 4096);
        let err = res.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof, "cut={cut}");
        // Source errors are passed through, not reclassified.
        assert!(CbefError::from_io(&err).is_none(), "cut={cut}");
        assert_eq!(got, plaintext[..3 * CHUNK]);
    }
}

#[test]
fn compressed_payload_cut_at_chunk_boundary_is_unexpected_eof() {
    // The deflate stream is left unfinished, so the decompressor notices.
    let plaintext = random_bytes(20_000, 13);
    for kind in [Compression::Zlib, Compression::Gzip] {
        let container = encode(
            &plaintext,
            &EncodeOpts::default().compression(kind).chunk_size(CHUNK),
        );
        let ranges = chunk_ranges(&container);
        assert!(ranges.len() > 2, "kind={kind:?}");
        let truncated = &container[..ranges[ranges.len() - 1].start];

        let mut reader = CbefReader::new(truncated, &keys()).unwrap();
        let (got, res) = read_until_error(&mut reader, 4096);
        let err = res.expect_err("truncated compressed payload must not end cleanly");
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof, "kind={kind:?}");
        assert!(got.len() < plaintext.len(), "kind={kind:?}");
        assert_eq!(got, plaintext[..got.len()], "kind={kind:?}");
    }
}

#[test]
fn truncation_at_chunk_boundary_ends_cleanly() {
    let (plaintext, container) = four_chunk_file();
    let ranges = chunk_ranges(&container);
    let truncated = &container[..ranges[3].start];

    let mut reader = CbefReader::new(truncated, &keys()).unwrap();
    let mut got = Vec::new();
    reader.read_to_end(&mut got).unwrap();
    assert_eq!(got, plaintext[..3 * CHUNK]);
}
