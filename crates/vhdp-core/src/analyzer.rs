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

//! The analyzer seam and the reference VHDP analyzer.

use crate::check::{default_rules, CheckContext, CheckRule};
use crate::context::{AnalyzerContext, ProjectContext};
use crate::diagnostic::Diagnostic;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::line_index::LineIndex;
use crate::mode::{AnalyzerMode, Phase};
use crate::parser::parse;
use crate::resolver::resolve;
use crate::segment::SegmentKind;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Default maximum source size accepted by [`VhdpAnalyzer`] (8 MiB).
pub const DEFAULT_MAX_SOURCE_LEN: usize = 8 * 1024 * 1024;

/// Language analyzer consumed by the editor-integration layer.
///
/// Implementations must be callable from several worker threads at once.
pub trait Analyzer: Send + Sync {
    /// Analyze `text` from scratch. The tree is always rebuilt from the text;
    /// `mode` selects the phases that run on top of it.
    fn analyze(
        &self,
        path: &Path,
        text: Arc<str>,
        mode: AnalyzerMode,
        project: &ProjectContext,
    ) -> AnalyzerResult<AnalyzerContext>;

    /// Run further phases on an existing context, reusing its tree unless
    /// `mode` asks for Indexing.
    fn reanalyze(
        &self,
        existing: &AnalyzerContext,
        mode: AnalyzerMode,
        project: &ProjectContext,
    ) -> AnalyzerResult<AnalyzerContext>;
}

/// Reference analyzer: lexer + parser (Indexing), resolver (Resolve) and
/// rule-based checker (Check).
pub struct VhdpAnalyzer {
    max_source_len: usize,
    rules: Vec<Box<dyn CheckRule>>,
}

impl Default for VhdpAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl VhdpAnalyzer {
    pub fn new() -> Self {
        Self {
            max_source_len: DEFAULT_MAX_SOURCE_LEN,
            rules: default_rules(),
        }
    }

    pub fn with_max_source_len(mut self, max: usize) -> Self {
        self.max_source_len = max;
        self
    }

    /// Replace the check rules.
    pub fn with_rules(mut self, rules: Vec<Box<dyn CheckRule>>) -> Self {
        self.rules = rules;
        self
    }

    fn index(&self, path: &Path, text: Arc<str>) -> AnalyzerResult<AnalyzerContext> {
        if text.len() > self.max_source_len {
            return Err(AnalyzerError::limit(
                path,
                format!("source is {} bytes, limit is {}", text.len(), self.max_source_len),
            ));
        }
        let output = parse(&text);
        let line_index = LineIndex::new(&text);
        let syntax_errors: Vec<Diagnostic> = output
            .errors
            .iter()
            .map(|e| {
                Diagnostic::error(
                    e.message.clone(),
                    "syntax",
                    line_index.line_col(&text, e.start),
                    line_index.line_col(&text, e.end),
                )
            })
            .collect();
        let connections: HashSet<String> = output
            .tree
            .iter()
            .filter(|(_, s)| s.kind == SegmentKind::Connections)
            .flat_map(|(_, s)| s.first_parameters().to_vec())
            .filter(|m| output.tree.get(*m).kind == SegmentKind::ConnectionMember)
            .map(|m| output.tree.get(m).name.to_ascii_lowercase())
            .collect();
        debug!(
            path = %path.display(),
            segments = output.tree.len(),
            errors = syntax_errors.len(),
            "indexed"
        );
        Ok(AnalyzerContext {
            path: path.to_path_buf(),
            text,
            source_version: 0,
            mode: AnalyzerMode::INDEXING,
            tree: output.tree,
            diagnostics: syntax_errors.clone(),
            syntax_errors,
            line_index,
            connections,
        })
    }

    /// Run the non-indexing phases of `mode` on `ctx`.
    fn run_phases(&self, ctx: &mut AnalyzerContext, mode: AnalyzerMode, project: &ProjectContext) {
        if mode.contains(Phase::Resolve) {
            let bound = resolve(&mut ctx.tree, &ctx.path, project);
            debug!(path = %ctx.path.display(), bound, "resolved");
        }
        if mode.contains(Phase::Check) {
            let check = CheckContext {
                text: &ctx.text,
                tree: &ctx.tree,
                line_index: &ctx.line_index,
            };
            let mut diagnostics = ctx.syntax_errors.clone();
            for rule in &self.rules {
                diagnostics.extend(rule.check(&check));
            }
            debug!(path = %ctx.path.display(), diagnostics = diagnostics.len(), "checked");
            ctx.diagnostics = diagnostics;
        }
        ctx.mode |= mode;
    }
}

impl Analyzer for VhdpAnalyzer {
    fn analyze(
        &self,
        path: &Path,
        text: Arc<str>,
        mode: AnalyzerMode,
        project: &ProjectContext,
    ) -> AnalyzerResult<AnalyzerContext> {
        let mut ctx = self.index(path, text)?;
        self.run_phases(&mut ctx, mode, project);
        Ok(ctx)
    }

    fn reanalyze(
        &self,
        existing: &AnalyzerContext,
        mode: AnalyzerMode,
        project: &ProjectContext,
    ) -> AnalyzerResult<AnalyzerContext> {
        if mode.is_indexing() {
            let ctx = self.analyze(&existing.path, existing.text.clone(), mode, project)?;
            return Ok(ctx.with_version(existing.source_version));
        }
        if !existing.mode.is_indexing() {
            return Err(AnalyzerError::not_indexed(&existing.path));
        }
        let mut ctx = existing.clone();
        self.run_phases(&mut ctx, mode, project);
        Ok(ctx)
    }
}
