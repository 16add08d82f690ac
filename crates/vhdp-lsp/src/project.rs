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

//! Project analysis context: document snapshots, analyzer contexts and the
//! three-phase analysis pipeline.
//!
//! # Phases
//!
//! ```text
//! Indexing  parse one file, record its declarations        (silent)
//! Resolve   bind references project-wide                   (silent)
//! Check     semantic rules, user-facing diagnostics        (notifies the sink)
//! ```
//!
//! Resolve for any file needs the Index output of *every* file, so a
//! workspace load runs three fan-outs (Index, Resolve, Resolve|Check), each
//! awaited project-wide before the next one starts.
//!
//! # Error Handling
//!
//! - Configuration errors (manifest) abort [`ProjectAnalysis::load_workspace`]
//!   and leave no project behind.
//! - Per-file analysis errors are returned as [`AnalysisError`] and logged by
//!   the orchestrating caller; the file keeps its previous context.
//! - Malformed edit batches fail [`ProjectAnalysis::apply_edits`] and keep
//!   the previous snapshot.

use crate::document_store::{DocumentStore, FileState};
use crate::manifest::ProjectRoot;
use crate::patcher::{apply_changes, apply_events, TextChange};
use crate::watcher::ProjectOp;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use tracing::{debug, error, info, warn};
use vhdp_core::{Analyzer, AnalyzerContext, AnalyzerMode, Diagnostic, Phase, ProjectContext};

pub use crate::error::{AnalysisError, ProjectError, ProjectResult};

/// New diagnostics for one file, announced after a Check pass, or an empty
/// list when the file left the project.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsEvent {
    pub path: PathBuf,
    /// Snapshot version the diagnostics belong to; `None` when cleared.
    pub version: Option<u64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsEvent {
    pub fn from_context(ctx: &AnalyzerContext) -> Self {
        Self {
            path: ctx.path.clone(),
            version: Some(ctx.source_version),
            diagnostics: ctx.diagnostics.clone(),
        }
    }

    pub fn cleared(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            version: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Receiver of diagnostics-changed notifications.
pub trait DiagnosticsSink: Send + Sync {
    fn publish(&self, event: DiagnosticsEvent);
}

/// Sink forwarding events into a tokio channel the hosting layer drains.
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<DiagnosticsEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<DiagnosticsEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl DiagnosticsSink for ChannelSink {
    fn publish(&self, event: DiagnosticsEvent) {
        if self.sender.send(event).is_err() {
            debug!("Diagnostics receiver dropped, event discarded");
        }
    }
}

/// What happened to the result of one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The context was stored; `notified` tells whether the sink was told.
    Stored { mode: AnalyzerMode, notified: bool },
    /// A newer snapshot or context replaced the analyzed one meanwhile.
    Discarded,
}

/// Owner of every document snapshot and analyzer context of a workspace.
pub struct ProjectAnalysis {
    workspace: PathBuf,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<dyn DiagnosticsSink>,
    store: DocumentStore,
    project: RwLock<Option<ProjectRoot>>,
    /// Documents owned by the editor; they outlive a failed reload.
    pinned: RwLock<HashSet<PathBuf>>,
}

impl ProjectAnalysis {
    pub fn new(workspace: impl Into<PathBuf>, analyzer: Arc<dyn Analyzer>, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self::with_store(workspace, analyzer, sink, DocumentStore::default())
    }

    pub fn with_store(
        workspace: impl Into<PathBuf>,
        analyzer: Arc<dyn Analyzer>,
        sink: Arc<dyn DiagnosticsSink>,
        store: DocumentStore,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            analyzer,
            sink,
            store,
            project: RwLock::new(None),
            pinned: RwLock::new(HashSet::new()),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Whether a manifest was loaded.
    pub fn is_loaded(&self) -> bool {
        self.project.read().is_some()
    }

    /// Loaded project root, if any.
    pub fn project_root(&self) -> Option<ProjectRoot> {
        self.project.read().clone()
    }

    /// Mark `path` as open in the editor.
    pub fn pin(&self, path: &Path) {
        self.pinned.write().insert(path.to_path_buf());
    }

    /// Drop the editor mark of `path`.
    pub fn unpin(&self, path: &Path) {
        self.pinned.write().remove(path);
    }

    pub fn is_pinned(&self, path: &Path) -> bool {
        self.pinned.read().contains(path)
    }

    // ==================== Snapshots ====================

    /// Apply a batch of range edits to the snapshot of `path` (empty when
    /// unknown). Does not trigger analysis. Returns the new version.
    pub fn apply_edits(&self, path: &Path, edits: &[TextChange]) -> ProjectResult<u64> {
        let version = self.store.update_text(path, |current| {
            apply_changes(current, edits).map_err(|source| ProjectError::MalformedEdit {
                path: path.to_path_buf(),
                source,
            })
        })?;
        debug!("Applied {} edits to {} (version {})", edits.len(), path.display(), version);
        Ok(version)
    }

    /// Apply editor change events to the snapshot of `path` in order, as one
    /// update: a failing event leaves the previous snapshot in place.
    pub fn apply_events(&self, path: &Path, events: &[TextDocumentContentChangeEvent]) -> ProjectResult<u64> {
        let version = self.store.update_text(path, |current| {
            apply_events(current, events).map_err(|source| ProjectError::MalformedEdit {
                path: path.to_path_buf(),
                source,
            })
        })?;
        debug!("Applied {} change events to {} (version {})", events.len(), path.display(), version);
        Ok(version)
    }

    /// Replace the snapshot of `path` without scheduling analysis.
    pub fn set_text(&self, path: &Path, text: impl Into<Arc<str>>) -> ProjectResult<u64> {
        self.store.set_text(path, text.into())
    }

    /// Replace the snapshot of `path` and schedule a full
    /// Indexing|Resolve|Check pass on a separate task.
    pub fn replace_text(self: &Arc<Self>, path: &Path, text: impl Into<Arc<str>>) -> ProjectResult<JoinHandle<()>> {
        self.set_text(path, text)?;
        let project = Arc::clone(self);
        let path = path.to_path_buf();
        Ok(tokio::spawn(async move {
            if let Err(e) = project.analyze(&path, AnalyzerMode::FULL).await {
                warn!("Analysis of {} failed: {}", path.display(), e);
            }
        }))
    }

    // ==================== Analysis ====================

    /// Snapshot of every stored context, for one analyzer call.
    pub fn project_context(&self) -> ProjectContext {
        ProjectContext::new(self.store.contexts())
    }

    /// Run one analysis pass over `path`.
    ///
    /// With Indexing in `mode` the analyzer starts from the current text;
    /// otherwise it continues from the stored context. The result replaces
    /// the stored context unless a newer snapshot or context appeared while
    /// the pass ran. Only passes including Check notify the sink.
    pub async fn analyze(&self, path: &Path, mode: AnalyzerMode) -> Result<AnalysisOutcome, AnalysisError> {
        let entry = self.store.entry(path).ok_or_else(|| missing(path, mode))?;
        let (text, version, existing, generation) = {
            let state = entry.lock();
            (Arc::clone(&state.text), state.version, state.context.clone(), state.generation)
        };
        let existing = match existing {
            None if !mode.is_indexing() => return Err(missing(path, mode)),
            other => other,
        };

        let project = self.project_context();
        let analyzer = Arc::clone(&self.analyzer);
        let owned = path.to_path_buf();
        debug!("Analyzing {} ({}, version {})", path.display(), mode, version);
        let joined = tokio::task::spawn_blocking(move || match existing {
            Some(ctx) if !mode.is_indexing() => analyzer.reanalyze(&ctx, mode, &project),
            _ => analyzer
                .analyze(&owned, text, mode, &project)
                .map(|ctx| ctx.with_version(version)),
        })
        .await;

        let ctx = match joined {
            Ok(result) => Arc::new(result?),
            Err(join) => {
                let message = if join.is_panic() {
                    panic_message(join.into_panic())
                } else {
                    join.to_string()
                };
                return Err(AnalysisError::Panicked {
                    path: path.to_path_buf(),
                    message,
                });
            }
        };

        {
            let mut state = entry.lock();
            if state.version != version || state.generation != generation || !self.store.is_live(path, &entry) {
                debug!(
                    "Discarding {} result for {}: superseded while analyzing",
                    mode,
                    path.display()
                );
                return Ok(AnalysisOutcome::Discarded);
            }
            state.context = Some(Arc::clone(&ctx));
            state.generation += 1;
        }

        let notified = mode.publishes_diagnostics();
        if notified {
            debug!("Publishing {} diagnostics for {}", ctx.diagnostics.len(), path.display());
            self.sink.publish(DiagnosticsEvent::from_context(&ctx));
        }
        Ok(AnalysisOutcome::Stored { mode, notified })
    }

    /// Run `mode` over every path concurrently and wait for all of them.
    /// Returns the number of passes that succeeded.
    pub async fn analyze_all(self: &Arc<Self>, paths: &[PathBuf], mode: AnalyzerMode) -> usize {
        let mut tasks = JoinSet::new();
        for path in paths {
            let project = Arc::clone(self);
            let path = path.clone();
            tasks.spawn(async move {
                let result = project.analyze(&path, mode).await;
                (path, result)
            });
        }

        let mut succeeded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => succeeded += 1,
                Ok((path, Err(e))) => warn!("{} pass failed for {}: {}", mode, path.display(), e),
                Err(e) => error!("{} task failed: {}", mode, e),
            }
        }
        debug!("{} pass finished: {}/{} files", mode, succeeded, paths.len());
        succeeded
    }

    // ==================== Workspace ====================

    /// Load the workspace: locate the manifest, import every included source
    /// file and run Index, Resolve and Resolve|Check project-wide, in that
    /// order. Returns the number of imported source files.
    ///
    /// Files that cannot be read or analyzed are logged and skipped. A
    /// manifest error aborts the load and leaves no project loaded.
    pub async fn load_workspace(self: &Arc<Self>) -> ProjectResult<usize> {
        let root = match ProjectRoot::load(&self.workspace) {
            Ok(root) => root,
            Err(e) => {
                error!("Cannot load workspace {}: {}", self.workspace.display(), e);
                self.unload();
                return Err(e);
            }
        };

        let mut imported = Vec::new();
        for path in root.source_files() {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => match self.set_text(&path, text) {
                    Ok(_) => imported.push(path),
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                },
                Err(e) => warn!("Cannot read {}: {}", path.display(), e),
            }
        }
        info!(
            "Loaded project {} with {} source files",
            root.manifest_path().display(),
            imported.len()
        );
        *self.project.write() = Some(root);

        self.analyze_all(&imported, AnalyzerMode::INDEXING).await;
        self.analyze_all(&imported, AnalyzerMode::RESOLVE).await;
        self.analyze_all(&imported, AnalyzerMode::RESOLVE | AnalyzerMode::CHECK)
            .await;
        Ok(imported.len())
    }

    /// Drop the loaded project and every file the editor does not hold open.
    fn unload(&self) {
        *self.project.write() = None;
        let pinned = self.pinned.read().clone();
        let dropped: Vec<PathBuf> = self
            .store
            .paths()
            .into_iter()
            .filter(|path| !pinned.contains(path))
            .collect();
        for path in &dropped {
            self.remove_path(path);
        }
        if !dropped.is_empty() {
            info!("Dropped {} project files of {}", dropped.len(), self.workspace.display());
        }
    }

    /// Whether `path` is a source file the loaded project includes.
    fn accepts(&self, path: &Path) -> ProjectResult<bool> {
        let guard = self.project.read();
        let root = guard.as_ref().ok_or(ProjectError::NotLoaded)?;
        Ok(ProjectRoot::is_source_file(path) && root.is_path_included(path))
    }

    /// Read `path` from disk and run Indexing followed by Resolve|Check.
    async fn import(&self, path: &Path) -> ProjectResult<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProjectError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        self.set_text(path, text)?;
        self.analyze(path, AnalyzerMode::INDEXING).await?;
        self.analyze(path, AnalyzerMode::RESOLVE | AnalyzerMode::CHECK).await?;
        Ok(())
    }

    /// Add a new member file. Returns `false` when the path is not an
    /// included source file.
    pub async fn add_path(&self, path: &Path) -> ProjectResult<bool> {
        if !self.accepts(path)? {
            debug!("Ignoring {}: not an included source file", path.display());
            return Ok(false);
        }
        self.import(path).await?;
        debug!("Added {}", path.display());
        Ok(true)
    }

    /// Re-read a member file after it changed on disk.
    pub async fn refresh_path(&self, path: &Path) -> ProjectResult<bool> {
        if !self.accepts(path)? {
            return Ok(false);
        }
        self.import(path).await?;
        debug!("Refreshed {}", path.display());
        Ok(true)
    }

    /// Forget `path`: its snapshot and context stop contributing to project
    /// snapshots and its diagnostics are cleared.
    pub fn remove_path(&self, path: &Path) -> bool {
        let removed = self.store.remove(path);
        if removed {
            self.sink.publish(DiagnosticsEvent::cleared(path));
        }
        removed
    }

    /// Remove `from`, then add `to`.
    pub async fn rename_path(&self, from: &Path, to: &Path) -> ProjectResult<bool> {
        self.remove_path(from);
        self.add_path(to).await
    }

    /// Apply one structural operation from the watch aggregator.
    pub async fn apply_op(&self, op: ProjectOp) -> ProjectResult<()> {
        match op {
            ProjectOp::Add(path) => self.add_path(&path).await.map(drop),
            ProjectOp::Refresh(path) => self.refresh_path(&path).await.map(drop),
            ProjectOp::Remove(path) => {
                self.remove_path(&path);
                Ok(())
            }
            ProjectOp::Rename { from, to } => self.rename_path(&from, &to).await.map(drop),
        }
    }

    // ==================== Read access ====================

    pub fn context(&self, path: &Path) -> Option<Arc<AnalyzerContext>> {
        self.store.context(path)
    }

    /// Current text and version of `path`.
    pub fn document(&self, path: &Path) -> Option<(Arc<str>, u64)> {
        self.store.snapshot(path)
    }

    pub fn state(&self, path: &Path) -> FileState {
        self.store.state(path)
    }

    /// Every known path, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.store.paths()
    }

    /// Diagnostics of the stored context of `path`.
    pub fn diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        self.context(path)
            .map(|ctx| ctx.diagnostics.clone())
            .unwrap_or_default()
    }

    /// Bring `path` up to date for `mode` and return its context together
    /// with a project snapshot to query against.
    ///
    /// When the stored context already matches the current text, its tree
    /// is reused and only the remaining phases run again.
    pub async fn fresh_view(&self, path: &Path, mode: AnalyzerMode) -> Option<(Arc<AnalyzerContext>, ProjectContext)> {
        let current = self
            .store
            .entry(path)
            .is_some_and(|entry| entry.lock().is_current());
        let pass = if current { mode.without(Phase::Indexing) } else { mode };
        if !pass.is_empty() {
            if let Err(e) = self.analyze(path, pass).await {
                warn!("Refreshing {} for a query failed: {}", path.display(), e);
            }
        }
        let ctx = self.context(path)?;
        Some((ctx, self.project_context()))
    }

    /// Drop every snapshot, context and the loaded project.
    pub fn close(&self) {
        *self.project.write() = None;
        self.pinned.write().clear();
        self.store.clear();
        info!("Project {} closed", self.workspace.display());
    }
}

fn missing(path: &Path, mode: AnalyzerMode) -> AnalysisError {
    let path = path.to_path_buf();
    if mode.is_indexing() {
        AnalysisError::MissingDocument { path }
    } else {
        AnalysisError::MissingContext { path }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
