//! Content digests of autorun images.

use crate::error::FingerprintError;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Buffer size for streaming file reads (64 KiB).
const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

/// Hash a file with `algorithm`, streaming it in fixed-size chunks.
///
/// Returns the lowercase hex digest.
///
/// # Errors
///
/// Returns [`FingerprintError::UnreadableFile`] if the file cannot be opened
/// or read.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String, FingerprintError> {
    match algorithm {
        HashAlgorithm::Md5 => digest_file::<Md5>(path),
        HashAlgorithm::Sha1 => digest_file::<Sha1>(path),
        HashAlgorithm::Sha256 => digest_file::<Sha256>(path),
    }
}

fn digest_file<D: Digest>(path: &Path) -> Result<String, FingerprintError> {
    let unreadable = |source| FingerprintError::UnreadableFile {
        path: path.display().to_string(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(unreadable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// The three digests recorded for every image. A digest that could not be
/// computed is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl Fingerprint {
    /// Hash `path` with every algorithm. Unreadable files give empty digests.
    pub fn of(path: &Path) -> Self {
        let digest = |algorithm| match hash_file(path, algorithm) {
            Ok(digest) => Some(digest),
            Err(err) => {
                debug!(%err, ?algorithm, "digest skipped");
                None
            }
        };
        Self {
            md5: digest(HashAlgorithm::Md5),
            sha1: digest(HashAlgorithm::Sha1),
            sha256: digest(HashAlgorithm::Sha256),
        }
    }
}
