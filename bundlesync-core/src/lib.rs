// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! bundlesync Core Library
//!
//! Versioned distribution of opaque content bundles. The build side hashes
//! a pipeline's output, diffs it against the previously published manifest
//! and packages only the changed bundles. The runtime side polls a static
//! host, recomputes the same delta against its local cache and commits the
//! downloaded bundles all-or-nothing.

pub mod bundle;
pub mod package;
pub mod sync;

pub use bundle::{
    diff, stale_names, BundleDigest, BundleHasher, BundleRecord, DeltaSet, FileHasher, HashError,
    SerializationError, VersionManifest, MANIFEST_FILE_NAME, SIDECAR_EXTENSION,
    VERSION_MARKER_FILE_NAME,
};
pub use package::{
    archive_name, read_published_manifest, BuildError, BuildReport, BuildRequest, PackageBuilder,
    SkippedBundle,
};
#[cfg(feature = "http")]
pub use sync::HttpCatalogFetcher;
pub use sync::{
    CacheError, CatalogSource, DirectoryCatalog, LocalCache, LocalCacheState, MockCatalog,
    NetworkError, RetryPolicy, SyncConfig, SyncEngine, SyncError, SyncOutcome, SyncPhase,
    TaskFailure,
};
