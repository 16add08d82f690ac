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

//! Integration tests for workspace loading and the phase pipeline.
//!
//! Each test builds a project on disk with `tempfile`, loads it through
//! [`ProjectAnalysis`] and inspects the stored contexts and the diagnostics
//! announced to a recording sink.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use vhdp_core::{Analyzer, AnalyzerContext, AnalyzerMode, AnalyzerResult, ProjectContext, VhdpAnalyzer};
use vhdp_lsp::document_store::FileState;
use vhdp_lsp::watcher::ProjectOp;
use vhdp_lsp::{DiagnosticsEvent, DiagnosticsSink, ProjectAnalysis, ProjectError};

const COUNTER: &str = "Component Counter (\n    Generic ( N : INTEGER := 8; );\n    Q : OUT STD_LOGIC_VECTOR(N-1 downto 0);\n) { }\n";
const TOP: &str = "Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    NewComponent Counter (Q => count, N => );\n}\n";

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<DiagnosticsEvent>>,
}

impl RecordingSink {
    fn events_for(&self, path: &Path) -> Vec<DiagnosticsEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.path == path)
            .cloned()
            .collect()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn publish(&self, event: DiagnosticsEvent) {
        self.events.lock().push(event);
    }
}

/// Reference analyzer that logs every pass and panics on request.
#[derive(Default)]
struct TracingAnalyzer {
    inner: VhdpAnalyzer,
    log: Mutex<Vec<(String, AnalyzerMode)>>,
    /// File name whose non-indexing passes panic.
    broken: Option<&'static str>,
}

impl TracingAnalyzer {
    fn record(&self, path: &Path, mode: AnalyzerMode) {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if !mode.is_indexing() && self.broken == Some(name.as_str()) {
            panic!("resolver crashed on {}", name);
        }
        self.log.lock().push((name, mode));
    }
}

impl Analyzer for TracingAnalyzer {
    fn analyze(
        &self,
        path: &Path,
        text: Arc<str>,
        mode: AnalyzerMode,
        project: &ProjectContext,
    ) -> AnalyzerResult<AnalyzerContext> {
        self.record(path, mode);
        self.inner.analyze(path, text, mode, project)
    }

    fn reanalyze(
        &self,
        existing: &AnalyzerContext,
        mode: AnalyzerMode,
        project: &ProjectContext,
    ) -> AnalyzerResult<AnalyzerContext> {
        self.record(&existing.path, mode);
        self.inner.reanalyze(existing, mode, project)
    }
}

struct Workspace {
    dir: TempDir,
    project: Arc<ProjectAnalysis>,
    sink: Arc<RecordingSink>,
    analyzer: Arc<TracingAnalyzer>,
}

impl Workspace {
    fn new(files: &[(&str, &str)], analyzer: TracingAnalyzer) -> Self {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let sink = Arc::new(RecordingSink::default());
        let analyzer = Arc::new(analyzer);
        let project = Arc::new(ProjectAnalysis::new(
            dir.path(),
            Arc::clone(&analyzer) as Arc<dyn Analyzer>,
            Arc::clone(&sink) as Arc<dyn DiagnosticsSink>,
        ));
        Self {
            dir,
            project,
            sink,
            analyzer,
        }
    }

    fn standard(analyzer: TracingAnalyzer) -> Self {
        Self::new(
            &[
                ("demo.fpgaproj", r#"{ "Include": ["src/**"], "Exclude": ["src/old/**"] }"#),
                ("src/counter.vhdp", COUNTER),
                ("src/top.vhdp", TOP),
                ("src/pins.qsf", "set_location_assignment PIN_1 -to LED"),
                ("src/old/legacy.vhdp", "Component Legacy () { }"),
                ("scratch/notes.vhdp", "Main () { }"),
            ],
            analyzer,
        )
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_load_imports_included_sources_only() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    let count = ws.project.load_workspace().await.unwrap();

    assert_eq!(count, 2);
    assert!(ws.project.is_loaded());
    assert_eq!(
        ws.project.files(),
        vec![ws.path("src/counter.vhdp"), ws.path("src/top.vhdp")]
    );
    assert_eq!(ws.project.state(&ws.path("src/top.vhdp")), FileState::Checked);
    assert_eq!(ws.project.state(&ws.path("src/counter.vhdp")), FileState::Checked);
    assert_eq!(ws.project.state(&ws.path("src/old/legacy.vhdp")), FileState::Unindexed);
}

#[tokio::test]
async fn test_load_resolves_across_files() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    let top = ws.path("src/top.vhdp");
    let codes: Vec<String> = ws.project.diagnostics(&top).into_iter().map(|d| d.code).collect();
    assert!(!codes.iter().any(|c| c == "unknown-component"), "{:?}", codes);
    assert!(codes.iter().any(|c| c == "auto-connect"), "{:?}", codes);

    let events = ws.sink.events_for(&top);
    assert_eq!(events.len(), 1);
    assert!(events[0].version.is_some());
}

#[tokio::test]
async fn test_phases_run_project_wide_in_order() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    let log = ws.analyzer.log.lock().clone();
    assert_eq!(log.len(), 6);
    let modes: Vec<AnalyzerMode> = log.iter().map(|(_, mode)| *mode).collect();
    assert!(modes[..2].iter().all(|m| *m == AnalyzerMode::INDEXING));
    assert!(modes[2..4].iter().all(|m| *m == AnalyzerMode::RESOLVE));
    assert!(modes[4..]
        .iter()
        .all(|m| *m == AnalyzerMode::RESOLVE | AnalyzerMode::CHECK));
}

#[tokio::test]
async fn test_missing_manifest_leaves_no_project() {
    let ws = Workspace::new(&[("src/top.vhdp", TOP)], TracingAnalyzer::default());
    let result = ws.project.load_workspace().await;

    assert!(matches!(result, Err(ProjectError::ManifestMissing { .. })));
    assert!(!ws.project.is_loaded());
    assert!(ws.project.files().is_empty());
}

#[tokio::test]
async fn test_failed_reload_drops_previous_project() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();
    let top = ws.path("src/top.vhdp");
    let counter = ws.path("src/counter.vhdp");
    ws.project.pin(&top);

    fs::remove_file(ws.path("demo.fpgaproj")).unwrap();
    let result = ws.project.load_workspace().await;

    assert!(matches!(result, Err(ProjectError::ManifestMissing { .. })));
    assert!(!ws.project.is_loaded());
    // the editor still holds top; counter no longer feeds project snapshots
    assert_eq!(ws.project.files(), vec![top.clone()]);
    assert!(ws.project.project_context().file(&counter).is_none());
    let cleared = ws.sink.events_for(&counter);
    assert_eq!(cleared.last().map(|e| e.version), Some(None));
}

#[tokio::test]
async fn test_failed_reload_without_open_files_leaves_nothing() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    fs::write(ws.path("demo.fpgaproj"), "{ not json").unwrap();
    let result = ws.project.load_workspace().await;

    assert!(matches!(result, Err(ProjectError::ManifestInvalid { .. })));
    assert!(ws.project.files().is_empty());
}

// ============================================================================
// Phase ordering
// ============================================================================

fn codes(project: &ProjectAnalysis, path: &Path) -> Vec<String> {
    project.diagnostics(path).into_iter().map(|d| d.code).collect()
}

#[tokio::test]
async fn test_resolve_needs_the_other_file_indexed() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    let top = ws.path("src/top.vhdp");
    let counter = ws.path("src/counter.vhdp");
    ws.project.set_text(&top, TOP).unwrap();
    ws.project.set_text(&counter, COUNTER).unwrap();

    // Counter is not indexed yet
    ws.project.analyze(&top, AnalyzerMode::INDEXING).await.unwrap();
    ws.project
        .analyze(&top, AnalyzerMode::RESOLVE | AnalyzerMode::CHECK)
        .await
        .unwrap();
    assert!(codes(&ws.project, &top).iter().any(|c| c == "unknown-component"));

    ws.project.analyze(&counter, AnalyzerMode::INDEXING).await.unwrap();
    ws.project
        .analyze(&top, AnalyzerMode::RESOLVE | AnalyzerMode::CHECK)
        .await
        .unwrap();
    let after = codes(&ws.project, &top);
    assert!(!after.iter().any(|c| c == "unknown-component"), "{:?}", after);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_panicking_file_does_not_stop_the_others() {
    let analyzer = TracingAnalyzer {
        broken: Some("counter.vhdp"),
        ..Default::default()
    };
    let ws = Workspace::standard(analyzer);
    let count = ws.project.load_workspace().await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(ws.project.state(&ws.path("src/counter.vhdp")), FileState::Indexed);
    assert_eq!(ws.project.state(&ws.path("src/top.vhdp")), FileState::Checked);
    assert!(ws.sink.events_for(&ws.path("src/counter.vhdp")).is_empty());
}

// ============================================================================
// Structural operations
// ============================================================================

#[tokio::test]
async fn test_added_file_joins_the_project() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    let path = ws.path("src/blink.vhdp");
    fs::write(&path, "Component Blink (LED : OUT STD_LOGIC;) { }\n").unwrap();
    ws.project.apply_op(ProjectOp::Add(path.clone())).await.unwrap();

    assert_eq!(ws.project.state(&path), FileState::Checked);
    assert!(ws.project.project_context().component("Blink", Path::new("")).is_some());
}

#[tokio::test]
async fn test_excluded_and_foreign_files_are_ignored() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    assert!(!ws.project.add_path(&ws.path("src/old/legacy.vhdp")).await.unwrap());
    assert!(!ws.project.add_path(&ws.path("src/pins.qsf")).await.unwrap());
    assert_eq!(ws.project.files().len(), 2);
}

#[tokio::test]
async fn test_removed_file_clears_diagnostics() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    let top = ws.path("src/top.vhdp");
    ws.project.apply_op(ProjectOp::Remove(top.clone())).await.unwrap();

    let events = ws.sink.events_for(&top);
    assert_eq!(events.last().unwrap(), &DiagnosticsEvent::cleared(&top));
    assert!(ws.project.context(&top).is_none());
}

#[tokio::test]
async fn test_rename_moves_the_file() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    ws.project.load_workspace().await.unwrap();

    let from = ws.path("src/counter.vhdp");
    let to = ws.path("src/counter8.vhdp");
    fs::rename(&from, &to).unwrap();
    ws.project
        .apply_op(ProjectOp::Rename {
            from: from.clone(),
            to: to.clone(),
        })
        .await
        .unwrap();

    assert_eq!(ws.project.state(&from), FileState::Unindexed);
    assert_eq!(ws.project.state(&to), FileState::Checked);
}

#[tokio::test]
async fn test_operations_before_load_fail() {
    let ws = Workspace::standard(TracingAnalyzer::default());
    let result = ws.project.add_path(&ws.path("src/top.vhdp")).await;
    assert!(matches!(result, Err(ProjectError::NotLoaded)));
}
