// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bundle hashing
//!
//! Checksum and content hash are computed once, at build time. Consumers
//! only compare them, they never recompute them.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ring::digest::{Context, SHA256};
use thiserror::Error;

/// Checksum and content hash of one built bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDigest {
    /// CRC-32 of the bundle bytes
    pub checksum: u32,
    /// Hex encoded content identity digest
    pub content_hash: String,
}

/// Produces a digest for a built bundle file.
///
/// Implemented for closures so tests and alternative pipelines can plug in
/// their own hashing without a dedicated type.
pub trait BundleHasher {
    /// Hashes the bundle stored at `path`.
    fn digest(&self, path: &Path) -> Result<BundleDigest, HashError>;
}

impl<F> BundleHasher for F
where
    F: Fn(&Path) -> Result<BundleDigest, HashError>,
{
    fn digest(&self, path: &Path) -> Result<BundleDigest, HashError> {
        self(path)
    }
}

/// Default hasher: CRC-32 checksum plus SHA-256 content hash.
///
/// The file is streamed once through both hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHasher;

impl FileHasher {
    const BUFFER_SIZE: usize = 64 * 1024;

    /// Hashes an in-memory buffer.
    ///
    /// # Example
    /// ```
    /// use bundlesync_core::FileHasher;
    ///
    /// let digest = FileHasher::digest_bytes(b"hello world");
    /// assert_eq!(digest.checksum, 0x0d4a_1185);
    /// ```
    pub fn digest_bytes(data: &[u8]) -> BundleDigest {
        let mut crc = crc32fast::Hasher::new();
        let mut sha = Context::new(&SHA256);
        crc.update(data);
        sha.update(data);
        BundleDigest {
            checksum: crc.finalize(),
            content_hash: hex::encode(sha.finish().as_ref()),
        }
    }
}

impl BundleHasher for FileHasher {
    fn digest(&self, path: &Path) -> Result<BundleDigest, HashError> {
        let io_err = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let mut crc = crc32fast::Hasher::new();
        let mut sha = Context::new(&SHA256);
        let mut buffer = vec![0u8; Self::BUFFER_SIZE];

        loop {
            let read = file.read(&mut buffer).map_err(io_err)?;
            if read == 0 {
                break;
            }
            crc.update(&buffer[..read]);
            sha.update(&buffer[..read]);
        }

        Ok(BundleDigest {
            checksum: crc.finalize(),
            content_hash: hex::encode(sha.finish().as_ref()),
        })
    }
}

/// A bundle that could not be hashed.
#[derive(Debug, Error)]
pub enum HashError {
    /// The bundle file could not be read
    #[error("cannot read bundle {path}: {source}")]
    Io {
        /// Bundle file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The hasher rejected the bundle
    #[error("cannot hash bundle {path}: {reason}")]
    Rejected {
        /// Bundle file path
        path: PathBuf,
        /// Reason reported by the hasher
        reason: String,
    },
}
