// Dweve VHDP - VHDPlus Editor Integration
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-path document snapshots and analyzer contexts.
//!
//! The store is the single owner of every document snapshot and every
//! analyzer context known to the server.
//!
//! # Design
//!
//! - **One entry per path**: a `DashMap` maps each path to an
//!   `Arc<Mutex<FileEntry>>`. Every read or write of one path's snapshot
//!   and context goes through that path's mutex, so an edit and a
//!   watcher-driven refresh can never interleave into a torn snapshot.
//! - **Replace-only**: texts are `Arc<str>` and contexts `Arc<AnalyzerContext>`;
//!   both are swapped wholesale, never mutated in place.
//! - **Versions**: every new snapshot gets a fresh number from one
//!   store-wide counter, so versions never repeat, not even across a
//!   remove and re-add of the same path.
//! - **Generations**: every stored context bumps the entry's generation,
//!   letting an analysis pass detect that another pass stored first.

use crate::constants::DEFAULT_MAX_DOCUMENT_SIZE;
use crate::error::{ProjectError, ProjectResult};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use vhdp_core::{AnalyzerContext, AnalyzerMode, Phase};

/// Analysis state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileState {
    Unindexed,
    Indexed,
    Resolved,
    Checked,
}

impl FileState {
    /// Furthest phase a context built with `mode` has been through.
    pub fn from_mode(mode: AnalyzerMode) -> Self {
        if mode.contains(Phase::Check) {
            Self::Checked
        } else if mode.contains(Phase::Resolve) {
            Self::Resolved
        } else if mode.contains(Phase::Indexing) {
            Self::Indexed
        } else {
            Self::Unindexed
        }
    }
}

/// Snapshot and analysis result of one path.
#[derive(Debug)]
pub struct FileEntry {
    /// Current document text.
    pub text: Arc<str>,
    /// Version of `text`.
    pub version: u64,
    /// Latest stored analyzer context, if any pass succeeded yet.
    pub context: Option<Arc<AnalyzerContext>>,
    /// Number of contexts stored so far.
    pub generation: u64,
}

impl FileEntry {
    pub fn state(&self) -> FileState {
        self.context
            .as_ref()
            .map_or(FileState::Unindexed, |ctx| FileState::from_mode(ctx.mode))
    }

    /// Whether the stored context was built from the current text.
    pub fn is_current(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|ctx| ctx.source_version == self.version)
    }
}

/// Store statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct StoreStatistics {
    /// Number of snapshot replacements.
    pub updates: u64,
    /// Number of snapshots rejected by the size limit.
    pub rejected: u64,
    /// Number of removed paths.
    pub removed: u64,
    /// Current number of paths.
    pub current_size: usize,
}

/// Concurrent per-path store.
///
/// # Example
///
/// ```
/// use vhdp_lsp::document_store::DocumentStore;
/// use std::path::Path;
///
/// let store = DocumentStore::new(1024);
/// let version = store.set_text(Path::new("/w/a.vhdp"), "Main () { }".into()).unwrap();
/// let (text, current) = store.snapshot(Path::new("/w/a.vhdp")).unwrap();
/// assert_eq!(&*text, "Main () { }");
/// assert_eq!(current, version);
/// ```
pub struct DocumentStore {
    documents: DashMap<PathBuf, Arc<Mutex<FileEntry>>>,
    next_version: AtomicU64,
    max_document_size: RwLock<usize>,
    stats: Mutex<StoreStatistics>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENT_SIZE)
    }
}

impl DocumentStore {
    pub fn new(max_document_size: usize) -> Self {
        Self {
            documents: DashMap::new(),
            next_version: AtomicU64::new(1),
            max_document_size: RwLock::new(max_document_size),
            stats: Mutex::new(StoreStatistics::default()),
        }
    }

    pub fn statistics(&self) -> StoreStatistics {
        let mut stats = self.stats.lock();
        stats.current_size = self.documents.len();
        stats.clone()
    }

    /// Update maximum document size (can be called during runtime).
    pub fn set_max_document_size(&self, new_max: usize) {
        *self.max_document_size.write() = new_max;
        debug!("Max document size updated to: {} bytes", new_max);
    }

    pub fn max_document_size(&self) -> usize {
        *self.max_document_size.read()
    }

    /// Reserve a fresh snapshot version.
    pub fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    /// Fail with [`ProjectError::TooLarge`] when `size` exceeds the limit.
    pub fn check_size(&self, path: &Path, size: usize) -> ProjectResult<()> {
        let max = self.max_document_size();
        if size > max {
            self.stats.lock().rejected += 1;
            warn!(
                "Document size limit exceeded for {}: {} bytes > {} bytes maximum (rejected)",
                path.display(),
                size,
                max
            );
            return Err(ProjectError::TooLarge {
                path: path.to_path_buf(),
                size,
                max,
            });
        }
        Ok(())
    }

    /// Entry of `path`, if known.
    pub fn entry(&self, path: &Path) -> Option<Arc<Mutex<FileEntry>>> {
        self.documents.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// Entry of `path`, creating an empty one when unknown.
    pub fn entry_or_default(&self, path: &Path) -> Arc<Mutex<FileEntry>> {
        let entry = self.documents.entry(path.to_path_buf()).or_insert_with(|| {
            debug!("New document registered: {}", path.display());
            Arc::new(Mutex::new(FileEntry {
                text: Arc::from(""),
                version: 0,
                context: None,
                generation: 0,
            }))
        });
        Arc::clone(entry.value())
    }

    /// Whether `entry` is still the live entry of `path` (not removed or
    /// replaced by a remove and re-add).
    pub fn is_live(&self, path: &Path, entry: &Arc<Mutex<FileEntry>>) -> bool {
        self.documents
            .get(path)
            .is_some_and(|live| Arc::ptr_eq(live.value(), entry))
    }

    /// Replace the snapshot of `path` wholesale. Returns the new version.
    pub fn set_text(&self, path: &Path, text: Arc<str>) -> ProjectResult<u64> {
        self.check_size(path, text.len())?;
        let entry = self.entry_or_default(path);
        let mut state = entry.lock();
        let version = self.next_version();
        debug!(
            "Document replaced: {} ({} -> {} bytes, version {})",
            path.display(),
            state.text.len(),
            text.len(),
            version
        );
        state.text = text;
        state.version = version;
        self.stats.lock().updates += 1;
        Ok(version)
    }

    /// Run `update` on the current text of `path` under its lock and store
    /// the result as a new snapshot. Nothing changes when `update` fails.
    pub fn update_text<F>(&self, path: &Path, update: F) -> ProjectResult<u64>
    where
        F: FnOnce(&str) -> ProjectResult<String>,
    {
        let entry = self.entry_or_default(path);
        let mut state = entry.lock();
        let text = update(&state.text)?;
        self.check_size(path, text.len())?;
        state.text = Arc::from(text);
        state.version = self.next_version();
        self.stats.lock().updates += 1;
        Ok(state.version)
    }

    /// Current text and version of `path`.
    pub fn snapshot(&self, path: &Path) -> Option<(Arc<str>, u64)> {
        self.documents.get(path).map(|entry| {
            let state = entry.lock();
            (Arc::clone(&state.text), state.version)
        })
    }

    /// Latest stored context of `path`.
    pub fn context(&self, path: &Path) -> Option<Arc<AnalyzerContext>> {
        self.documents
            .get(path)
            .and_then(|entry| entry.lock().context.clone())
    }

    pub fn state(&self, path: &Path) -> FileState {
        self.documents
            .get(path)
            .map_or(FileState::Unindexed, |entry| entry.lock().state())
    }

    /// Every stored context, for building a project snapshot.
    pub fn contexts(&self) -> Vec<Arc<AnalyzerContext>> {
        self.documents
            .iter()
            .filter_map(|entry| entry.value().lock().context.clone())
            .collect()
    }

    /// Every known path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.documents.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    /// Remove `path`. Returns `true` if it was known.
    pub fn remove(&self, path: &Path) -> bool {
        let removed = self.documents.remove(path).is_some();
        if removed {
            self.stats.lock().removed += 1;
            debug!("Document removed: {}", path.display());
        }
        removed
    }

    /// Drop every path.
    pub fn clear(&self) {
        self.documents.clear();
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
