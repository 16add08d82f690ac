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

//! Analysis results: one [`AnalyzerContext`] per file, and the
//! [`ProjectContext`] snapshot handed to the analyzer for cross-file lookups.

use crate::diagnostic::Diagnostic;
use crate::line_index::{LineCol, LineIndex};
use crate::mode::AnalyzerMode;
use crate::segment::{Segment, SegmentId, SegmentKind, SymbolRef, SyntaxTree, VariableType};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of analyzing one file.
///
/// Contexts are immutable once built; a new analysis pass produces a new
/// context that replaces the stored one.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    pub path: PathBuf,
    /// Text the tree was built from.
    pub text: Arc<str>,
    /// Version of the document snapshot the text came from.
    pub source_version: u64,
    /// Phases applied to this context so far.
    pub mode: AnalyzerMode,
    pub tree: SyntaxTree,
    /// Problems found while parsing.
    pub syntax_errors: Vec<Diagnostic>,
    /// User-facing diagnostics as of the last Check phase.
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
    /// Lower-cased names forwarded to top-level pins by `Connections` blocks.
    pub connections: HashSet<String>,
}

impl AnalyzerContext {
    /// A context with an empty tree, used as a placeholder for files that
    /// exist but were never analyzed.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            text: Arc::from(""),
            source_version: 0,
            mode: AnalyzerMode::empty(),
            tree: SyntaxTree::new(0),
            syntax_errors: Vec::new(),
            diagnostics: Vec::new(),
            line_index: LineIndex::new(""),
            connections: HashSet::new(),
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.source_version = version;
        self
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        self.tree.get(id)
    }

    /// Source text covered by `[start, end)`, empty when out of range.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.text.get(start..end).unwrap_or("")
    }

    pub fn segment_text(&self, id: SegmentId) -> &str {
        let segment = self.tree.get(id);
        self.slice(segment.offset, segment.end_offset)
    }

    pub fn position(&self, offset: usize) -> LineCol {
        self.line_index.line_col(&self.text, offset)
    }

    pub fn offset(&self, pos: LineCol) -> Option<usize> {
        self.line_index.offset(&self.text, pos)
    }

    /// Deepest segment at `offset`.
    pub fn segment_at(&self, offset: usize) -> Option<SegmentId> {
        self.tree.segment_at(offset)
    }

    /// Components declared at the top level of this file.
    pub fn components(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.tree
            .get(self.tree.root())
            .children
            .iter()
            .copied()
            .filter(|id| self.tree.get(*id).kind == SegmentKind::Component)
    }

    /// Top-level component with the given name (case-insensitive).
    pub fn component(&self, name: &str) -> Option<SegmentId> {
        self.components().find(|id| self.tree.get(*id).is_named(name))
    }

    /// Top-level packages of this file.
    pub fn packages(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.tree
            .get(self.tree.root())
            .children
            .iter()
            .copied()
            .filter(|id| self.tree.get(*id).kind == SegmentKind::Package)
    }

    /// Declarations of `owner` with the given variable type.
    pub fn declarations_of(&self, owner: SegmentId, variable_type: VariableType) -> Vec<SegmentId> {
        self.tree
            .declarations(owner)
            .into_iter()
            .filter(|id| self.tree.get(*id).variable_type == Some(variable_type))
            .collect()
    }

    pub fn io_declarations(&self, component: SegmentId) -> Vec<SegmentId> {
        self.declarations_of(component, VariableType::Io)
    }

    pub fn generic_declarations(&self, component: SegmentId) -> Vec<SegmentId> {
        self.declarations_of(component, VariableType::Generic)
    }

    /// Whether this file forwards `name` to a top-level pin.
    pub fn is_forwarded(&self, name: &str) -> bool {
        self.connections.contains(&name.to_ascii_lowercase())
    }

    /// Diagnostics whose range covers `pos`, highest severity first.
    pub fn diagnostics_at(&self, pos: LineCol) -> Vec<&Diagnostic> {
        let mut hits: Vec<&Diagnostic> = self.diagnostics.iter().filter(|d| d.covers(pos)).collect();
        hits.sort_by(|a, b| b.severity.cmp(&a.severity));
        hits
    }
}

/// Snapshot of every known file context, built right before an analyzer call.
///
/// Symbol indexes are keyed by lower-cased name. Lookups take the path of the
/// file being analyzed and skip it: a file's own symbols always come from its
/// fresh tree, never from its previous context.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    files: HashMap<PathBuf, Arc<AnalyzerContext>>,
    components: HashMap<String, Vec<SymbolRef>>,
    types: HashMap<String, Vec<SymbolRef>>,
    functions: HashMap<String, Vec<SymbolRef>>,
    /// Package-level declarations (constants, signals, enum literals).
    globals: HashMap<String, Vec<SymbolRef>>,
}

impl ProjectContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(contexts: impl IntoIterator<Item = Arc<AnalyzerContext>>) -> Self {
        let mut project = Self::default();
        for ctx in contexts {
            project.index(&ctx);
            project.files.insert(ctx.path.clone(), ctx);
        }
        for refs in project
            .components
            .values_mut()
            .chain(project.types.values_mut())
            .chain(project.functions.values_mut())
            .chain(project.globals.values_mut())
        {
            refs.sort_by(|a, b| a.path.cmp(&b.path).then(a.segment.cmp(&b.segment)));
        }
        project
    }

    fn index(&mut self, ctx: &AnalyzerContext) {
        let tree = &ctx.tree;
        let symbol = |segment| SymbolRef {
            path: ctx.path.clone(),
            segment,
        };
        for id in ctx.components() {
            self.components
                .entry(tree.get(id).name.to_ascii_lowercase())
                .or_default()
                .push(symbol(id));
        }
        let root = tree.root();
        for owner in std::iter::once(root).chain(ctx.packages()) {
            for child in &tree.get(owner).children {
                let segment = tree.get(*child);
                let key = segment.name.to_ascii_lowercase();
                match segment.kind {
                    SegmentKind::TypeDeclaration => self.types.entry(key).or_default().push(symbol(*child)),
                    SegmentKind::Function => self.functions.entry(key).or_default().push(symbol(*child)),
                    _ => {}
                }
            }
            if owner != root {
                for decl in tree.declarations(owner) {
                    self.globals
                        .entry(tree.get(decl).name.to_ascii_lowercase())
                        .or_default()
                        .push(symbol(decl));
                }
            }
        }
    }

    fn lookup<'a>(map: &'a HashMap<String, Vec<SymbolRef>>, name: &str, exclude: &Path) -> Option<&'a SymbolRef> {
        map.get(&name.to_ascii_lowercase())?
            .iter()
            .find(|r| r.path != exclude)
    }

    pub fn file(&self, path: &Path) -> Option<&Arc<AnalyzerContext>> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<AnalyzerContext>> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Component declared in a file other than `exclude`.
    pub fn component(&self, name: &str, exclude: &Path) -> Option<&SymbolRef> {
        Self::lookup(&self.components, name, exclude)
    }

    pub fn type_declaration(&self, name: &str, exclude: &Path) -> Option<&SymbolRef> {
        Self::lookup(&self.types, name, exclude)
    }

    pub fn function(&self, name: &str, exclude: &Path) -> Option<&SymbolRef> {
        Self::lookup(&self.functions, name, exclude)
    }

    pub fn global(&self, name: &str, exclude: &Path) -> Option<&SymbolRef> {
        Self::lookup(&self.globals, name, exclude)
    }

    /// Every indexed component, sorted by name.
    pub fn components(&self) -> Vec<&SymbolRef> {
        let mut names: Vec<_> = self.components.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        names.into_iter().filter_map(|(_, refs)| refs.first()).collect()
    }

    /// Every indexed package-level declaration and type, for completion.
    pub fn globals(&self) -> impl Iterator<Item = &SymbolRef> {
        self.globals.values().chain(self.types.values()).flatten()
    }

    /// Context owning `path`: `current` itself when it matches, otherwise the
    /// snapshot's entry.
    pub fn context_for<'a>(&'a self, current: &'a AnalyzerContext, path: &Path) -> Option<&'a AnalyzerContext> {
        if current.path == path {
            Some(current)
        } else {
            self.files.get(path).map(|ctx| ctx.as_ref())
        }
    }

    /// Segment a symbol points at, looked up through [`Self::context_for`].
    pub fn resolve_symbol<'a>(
        &'a self,
        current: &'a AnalyzerContext,
        symbol: &SymbolRef,
    ) -> Option<(&'a AnalyzerContext, &'a Segment)> {
        let ctx = self.context_for(current, &symbol.path)?;
        let segment = ctx.tree.try_get(symbol.segment)?;
        Some((ctx, segment))
    }
}
