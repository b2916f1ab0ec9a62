//! Package verification with SHA-256 checksums
//!
//! Downloaded update packages are hashed as a stream and compared against
//! the hex digest published by the update host. The comparison runs in
//! time independent of where the first mismatching byte sits.

use sdk::errors::UpdateError;
use sha2::{Digest, Sha256};
use std::io::Read;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

const READ_BUF_SIZE: usize = 8192;

/// Compute the SHA-256 hash of `data` and return hex string
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 hash of everything readable from `reader`
pub fn compute_hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check a package stream against an expected hex digest
///
/// Fails closed: an empty expectation or a read error yields `false`.
pub fn verify<R: Read>(expected: &str, actual_source: R) -> bool {
    let expected = normalize_digest(expected);
    if expected.is_empty() {
        return false;
    }

    match compute_hash_reader(actual_source) {
        Ok(computed) => constant_time_eq(expected.as_bytes(), computed.as_bytes()),
        Err(e) => {
            tracing::warn!("Failed to read package for checksum verification: {}", e);
            false
        }
    }
}

/// Check an in-memory package against an expected hex digest
pub fn verify_bytes(expected: &str, data: &[u8]) -> bool {
    verify(expected, data)
}

/// Verify that the SHA-256 hash of `data` matches `expected_hex`
///
/// Unlike [`verify`], a mismatch is an error the caller has to handle.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<(), UpdateError> {
    if normalize_digest(expected_hex).is_empty() {
        return Err(UpdateError::Integrity("no checksum published".to_string()));
    }
    if !verify_bytes(expected_hex, data) {
        return Err(UpdateError::Integrity(format!(
            "checksum mismatch, expected {}",
            normalize_digest(expected_hex)
        )));
    }
    Ok(())
}

/// Whether `digest` looks like a hex-encoded SHA-256 value
pub fn is_well_formed_digest(digest: &str) -> bool {
    let digest = digest.trim();
    digest.len() == DIGEST_HEX_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit())
}

fn normalize_digest(digest: &str) -> String {
    digest.trim().to_ascii_lowercase()
}

/// Compare two byte strings without an early exit on the first difference
///
/// Length is not treated as secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let (diff, _) = fold_difference(a, b);
    std::hint::black_box(diff) == 0
}

/// OR of the XOR of every byte pair, with the number of pairs visited
///
/// Never stops early, so the visit count is the shorter length whatever the
/// position of the first difference.
pub fn fold_difference(a: &[u8], b: &[u8]) -> (u8, usize) {
    a.iter()
        .zip(b.iter())
        .fold((0u8, 0usize), |(acc, visited), (x, y)| {
            (acc | (x ^ y), visited + 1)
        })
}
