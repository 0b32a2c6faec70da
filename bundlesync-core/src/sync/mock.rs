// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory catalog for tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use super::fetcher::{CatalogSource, NetworkError};
use crate::bundle::{BundleRecord, FileHasher};

/// In-memory catalog with injectable failures.
///
/// Every request yields once before answering so that concurrently issued
/// requests really interleave, and is recorded in a request log.
#[derive(Debug, Default)]
pub struct MockCatalog {
    marker: Option<u32>,
    manifests: HashMap<String, Vec<BundleRecord>>,
    blobs: HashMap<(String, String), Vec<u8>>,
    sidecars: HashMap<(String, String), String>,
    failing: HashSet<String>,
    requests: RefCell<Vec<String>>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a complete version: marker, manifest, blobs, sidecars and
    /// a catalog named like the target.
    pub fn publish(&mut self, target: &str, version: u32, bundles: &[(&str, &[u8])]) {
        let mut records = Vec::with_capacity(bundles.len());
        for (name, data) in bundles {
            let digest = FileHasher::digest_bytes(data);
            records.push(BundleRecord::new(
                *name,
                digest.checksum,
                digest.content_hash,
            ));
            self.put_file(target, name, data.to_vec(), format!("bundle {}", name));
        }

        let catalog = format!("catalog v{}", version);
        self.put_file(
            target,
            target,
            catalog.clone().into_bytes(),
            format!("{} sidecar", catalog),
        );
        self.set_manifest(target, records);
        self.set_version_marker(version);
    }

    pub fn set_version_marker(&mut self, version: u32) {
        self.marker = Some(version);
    }

    pub fn set_manifest(&mut self, target: &str, records: Vec<BundleRecord>) {
        self.manifests.insert(target.to_string(), records);
    }

    /// Stores a blob and its sidecar.
    pub fn put_file(&mut self, target: &str, name: &str, data: Vec<u8>, sidecar: String) {
        let key = (target.to_string(), name.to_string());
        self.blobs.insert(key.clone(), data);
        self.sidecars.insert(key, sidecar);
    }

    /// Makes blob downloads of `name` fail with a connection error.
    pub fn fail_bundle(&mut self, name: &str) {
        self.failing.insert(name.to_string());
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Request log, e.g. `bundle linux/ui`, in issue order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Number of blob requests issued for `name`.
    pub fn bundle_requests(&self, target: &str, name: &str) -> usize {
        let entry = format!("bundle {}/{}", target, name);
        self.requests.borrow().iter().filter(|r| **r == entry).count()
    }

    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
    }

    /// Highest number of requests that were pending at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }

    async fn request(&self, entry: String) {
        self.requests.borrow_mut().push(entry);
        let now = self.in_flight.get() + 1;
        self.in_flight.set(now);
        self.max_in_flight.set(self.max_in_flight.get().max(now));

        tokio::task::yield_now().await;

        self.in_flight.set(self.in_flight.get() - 1);
    }
}

fn not_found(url: String) -> NetworkError {
    NetworkError::Protocol { url, status: 404 }
}

impl CatalogSource for MockCatalog {
    async fn fetch_version_marker(&self) -> Result<u32, NetworkError> {
        self.request("marker".to_string()).await;
        self.marker
            .ok_or_else(|| not_found("mock://version.txt".to_string()))
    }

    async fn fetch_manifest(&self, target: &str) -> Result<Vec<BundleRecord>, NetworkError> {
        self.request(format!("manifest {}", target)).await;
        self.manifests
            .get(target)
            .cloned()
            .ok_or_else(|| not_found(format!("mock://{}/versionData.json", target)))
    }

    async fn fetch_bundle(&self, target: &str, name: &str) -> Result<Vec<u8>, NetworkError> {
        self.request(format!("bundle {}/{}", target, name)).await;
        let url = format!("mock://{}/{}", target, name);
        if self.failing.contains(name) {
            return Err(NetworkError::Connection {
                url,
                reason: "simulated connection failure".to_string(),
            });
        }
        self.blobs
            .get(&(target.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(url))
    }

    async fn fetch_sidecar(&self, target: &str, name: &str) -> Result<String, NetworkError> {
        self.request(format!("sidecar {}/{}", target, name)).await;
        self.sidecars
            .get(&(target.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("mock://{}/{}.manifest", target, name)))
    }
}
