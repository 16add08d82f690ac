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

//! Auto-connect synthesizer.
//!
//! Completes a `NewComponent` instantiation whose port map contains
//! auto-generate markers (`Q => ,`): every marked port gets a local
//! `SIGNAL <Instance>_<Port>` (or is hoisted into the enclosing entity's
//! port list when the component forwards it to a pin), generics referenced
//! by those ports become `CONSTANT <Instance>_<Generic>` declarations, and
//! the markers are rewritten to point at the new names.
//!
//! All text is computed from the analyzed tree before the document is
//! touched. The edits then run inside one [`UpdateGuard`] group, applied in
//! descending offset order so earlier offsets stay valid.

use crate::editor::{EditError, EditableDocument, UpdateGuard};
use crate::symbols::declaration_clause;
use regex::{NoExpand, Regex};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;
use vhdp_core::{AnalyzerContext, ProjectContext, Segment, SegmentId, SegmentKind};

/// Failure of an auto-connect run. The document edit group is closed in
/// every case.
#[derive(Error, Debug)]
pub enum AutoConnectError {
    #[error("segment {0:?} is not a component instantiation")]
    NotAnInstance(SegmentId),

    /// The document no longer holds the text the tree was built from.
    #[error("document changed since it was analyzed")]
    StaleDocument,

    #[error("invalid generic name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// What an auto-connect run generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoConnectReport {
    /// Names of generated constants.
    pub constants: Vec<String>,
    /// Names of generated local signals.
    pub signals: Vec<String>,
    /// Ports added to the enclosing entity.
    pub hoisted: Vec<String>,
    /// Generics whose marker was replaced by the default value.
    pub defaults: Vec<String>,
    /// Number of markers rewritten.
    pub rewritten: usize,
}

impl AutoConnectReport {
    pub fn is_empty(&self) -> bool {
        self.rewritten == 0 && self.constants.is_empty() && self.signals.is_empty() && self.hoisted.is_empty()
    }
}

/// Pending replacement of `len` bytes at `offset`.
#[derive(Debug)]
struct Splice {
    offset: usize,
    len: usize,
    text: String,
}

/// Port-map completion for component instantiations.
#[derive(Debug, Clone)]
pub struct AutoConnect {
    auto_indent: bool,
}

impl Default for AutoConnect {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoConnect {
    pub fn new() -> Self {
        Self { auto_indent: true }
    }

    /// Leave inserted lines as generated instead of re-indenting them.
    pub fn with_auto_indent(mut self, auto_indent: bool) -> Self {
        self.auto_indent = auto_indent;
        self
    }

    /// Complete the instantiation `instance` of `ctx` inside `doc`.
    ///
    /// `doc` must hold the text `ctx` was built from. An unknown component,
    /// an empty port map or a port map without markers leaves the document
    /// untouched and returns an empty report.
    pub fn connect(
        &self,
        doc: &mut dyn EditableDocument,
        ctx: &AnalyzerContext,
        project: &ProjectContext,
        instance: SegmentId,
    ) -> Result<AutoConnectReport, AutoConnectError> {
        let instance_segment = ctx
            .tree
            .try_get(instance)
            .filter(|s| s.kind == SegmentKind::NewComponent)
            .ok_or(AutoConnectError::NotAnInstance(instance))?;
        if doc.text() != *ctx.text {
            return Err(AutoConnectError::StaleDocument);
        }

        let mut report = AutoConnectReport::default();
        if instance_segment.first_parameters().is_empty() {
            debug!("Auto-connect: '{}' has no parameters", instance_segment.name);
            return Ok(report);
        }
        let Some((owner, component)) = resolve_component(ctx, project, instance_segment) else {
            debug!("Auto-connect: unknown component '{}'", instance_segment.name);
            return Ok(report);
        };
        let markers = markers(ctx, instance);
        if markers.is_empty() {
            return Ok(report);
        }

        let marked: HashSet<String> = markers
            .iter()
            .map(|(member, _)| ctx.segment(*member).name.to_ascii_lowercase())
            .collect();
        let is_marked = |segment: &Segment| marked.contains(&segment.name.to_ascii_lowercase());
        let prefix = instance_segment.instance_name();
        let ios = owner.io_declarations(component);
        let generics = owner.generic_declarations(component);

        let mut patterns = Vec::with_capacity(generics.len());
        for generic in &generics {
            let name = &owner.segment(*generic).name;
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))?;
            patterns.push((*generic, pattern, format!("{}_{}", prefix, name)));
        }

        // ports first: they decide which generics are used
        let mut used: Vec<SegmentId> = Vec::new();
        let mut signal_lines = Vec::new();
        let mut hoisted_lines = Vec::new();
        for io in &ios {
            let segment = owner.segment(*io);
            if !is_marked(segment) {
                continue;
            }
            let forwarded = owner.is_forwarded(&segment.name);
            let mut clause = declaration_clause(owner, *io, forwarded).unwrap_or_default();
            for (generic, pattern, replacement) in &patterns {
                if pattern.is_match(&clause) {
                    if !used.contains(generic) {
                        used.push(*generic);
                    }
                    clause = pattern.replace_all(&clause, NoExpand(replacement)).into_owned();
                }
            }
            if forwarded {
                hoisted_lines.push(declaration_line(&segment.name, &clause));
                report.hoisted.push(segment.name.clone());
            } else {
                let name = format!("{}_{}", prefix, segment.name);
                signal_lines.push(declaration_line(&format!("SIGNAL {}", name), &clause));
                report.signals.push(name);
            }
        }

        let mut constant_lines = Vec::new();
        for generic in generics.iter().filter(|g| used.contains(g)) {
            let segment = owner.segment(*generic);
            if !is_marked(segment) {
                continue;
            }
            let name = format!("{}_{}", prefix, segment.name);
            let clause = declaration_clause(owner, *generic, false).unwrap_or_default();
            constant_lines.push(declaration_line(&format!("CONSTANT {}", name), &clause));
            report.constants.push(name);
        }

        let mut rewrites = Vec::new();
        for (member, marker) in &markers {
            let name = &ctx.segment(*member).name;
            let marker_segment = ctx.segment(*marker);
            let Some(op) = &marker_segment.operator else {
                continue;
            };
            let target = if ios.iter().any(|io| owner.segment(*io).is_named(name)) {
                if owner.is_forwarded(name) {
                    name.clone()
                } else {
                    format!("{}_{}", prefix, name)
                }
            } else if let Some(generic) = generics.iter().find(|g| owner.segment(**g).is_named(name)) {
                if used.contains(generic) {
                    format!("{}_{}", prefix, name)
                } else if let Some(default) = owner.tree.child_of_kind(*generic, SegmentKind::DefaultValue) {
                    report.defaults.push(owner.segment(*generic).name.clone());
                    owner.segment(default).name.clone()
                } else {
                    continue;
                }
            } else {
                continue;
            };
            rewrites.push(Splice {
                offset: op.offset,
                len: marker_segment.offset - op.offset,
                text: format!("=> {}", target),
            });
        }
        report.rewritten = rewrites.len();

        let hoist_point = if hoisted_lines.is_empty() {
            None
        } else {
            hoist_point(ctx, instance)
        };
        if hoist_point.is_none() && !hoisted_lines.is_empty() {
            debug!("Auto-connect: no enclosing entity for '{}'", prefix);
            report.hoisted.clear();
        }

        let mut doc = UpdateGuard::new(doc);
        rewrites.sort_by(|a, b| b.offset.cmp(&a.offset));
        for splice in &rewrites {
            doc.replace(splice.offset, splice.len, &splice.text)?;
        }

        let declarations: Vec<String> = constant_lines.into_iter().chain(signal_lines).collect();
        if !declarations.is_empty() {
            let text: String = declarations.iter().map(|line| format!("{}\n", line)).collect();
            let line = doc.line_of_offset(instance_segment.offset);
            doc.replace(instance_segment.offset, 0, &text)?;
            if self.auto_indent {
                doc.indent_lines(line, line + declarations.len())?;
            }
        }

        if let Some((offset, needs_separator)) = hoist_point {
            let mut text = String::new();
            if needs_separator {
                text.push(';');
            }
            for line in &hoisted_lines {
                text.push('\n');
                text.push_str(line);
            }
            let line = doc.line_of_offset(offset);
            doc.replace(offset, 0, &text)?;
            if self.auto_indent {
                doc.indent_lines(line, line + hoisted_lines.len() + 1)?;
            }
        }

        debug!(
            "Auto-connect '{}': {} constants, {} signals, {} hoisted, {} markers",
            prefix,
            report.constants.len(),
            report.signals.len(),
            report.hoisted.len(),
            report.rewritten
        );
        Ok(report)
    }
}

/// `head clause;`
fn declaration_line(head: &str, clause: &str) -> String {
    if clause.is_empty() {
        format!("{};", head)
    } else {
        format!("{} {};", head, clause)
    }
}

/// Component declaration an instantiation refers to.
fn resolve_component<'a>(
    ctx: &'a AnalyzerContext,
    project: &'a ProjectContext,
    instance: &Segment,
) -> Option<(&'a AnalyzerContext, SegmentId)> {
    if let Some(symbol) = &instance.resolved {
        if let Some((owner, segment)) = project.resolve_symbol(ctx, symbol) {
            if segment.kind == SegmentKind::Component {
                return Some((owner, symbol.segment));
            }
        }
    }
    if let Some(local) = ctx.component(&instance.name) {
        return Some((ctx, local));
    }
    let symbol = project.component(&instance.name, &ctx.path)?;
    let owner = project.context_for(ctx, &symbol.path)?;
    Some((owner, symbol.segment))
}

/// `(member, marker)` pairs of the instantiation's port map.
fn markers(ctx: &AnalyzerContext, instance: SegmentId) -> Vec<(SegmentId, SegmentId)> {
    ctx.segment(instance)
        .first_parameters()
        .iter()
        .filter(|m| ctx.segment(**m).kind == SegmentKind::ConnectionMember)
        .filter_map(|m| {
            ctx.tree
                .child_of_kind(*m, SegmentKind::EmptyName)
                .filter(|k| ctx.segment(*k).operator.as_ref().is_some_and(|op| op.text == "=>"))
                .map(|k| (*m, k))
        })
        .collect()
}

/// Insertion point for hoisted ports: after the last parameter of the
/// enclosing entity (and its `;`), or after the entity's first `(`.
///
/// The flag is set when the last parameter has no terminating `;`.
fn hoist_point(ctx: &AnalyzerContext, instance: SegmentId) -> Option<(usize, bool)> {
    let entity = ctx
        .tree
        .top_segment(instance, &[SegmentKind::Component, SegmentKind::Main])?;
    let segment = ctx.segment(entity);
    if let Some(last) = segment.first_parameters().last() {
        let end = ctx.segment(*last).end_offset;
        let rest = ctx.slice(end, ctx.text.len());
        let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        return Some(if rest[gap..].starts_with(';') {
            (end + gap + 1, false)
        } else {
            (end, true)
        });
    }
    ctx.slice(segment.offset, ctx.text.len())
        .find('(')
        .map(|i| (segment.offset + i + 1, false))
}

/// Instantiation at `offset`, if any.
pub fn find_instance(ctx: &AnalyzerContext, offset: usize) -> Option<SegmentId> {
    let id = ctx.segment_at(offset)?;
    ctx.tree.enclosing(id, &[SegmentKind::NewComponent])
}

/// Whether the instantiation's port map contains auto-generate markers.
pub fn has_markers(ctx: &AnalyzerContext, instance: SegmentId) -> bool {
    ctx.tree
        .try_get(instance)
        .is_some_and(|s| s.kind == SegmentKind::NewComponent)
        && !markers(ctx, instance).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::RopeDocument;
    use std::path::Path;
    use std::sync::Arc;
    use vhdp_core::{Analyzer, AnalyzerMode, VhdpAnalyzer};

    fn analyze(text: &str) -> AnalyzerContext {
        VhdpAnalyzer::new()
            .analyze(Path::new("/p/top.vhdp"), Arc::from(text), AnalyzerMode::FULL, &ProjectContext::empty())
            .unwrap()
    }

    #[test]
    fn test_hoist_point_after_last_port() {
        let ctx = analyze("Main (\n    a : IN BIT;\n) {\n    NewComponent X (Q => );\n}\n");
        let instance = find_instance(&ctx, ctx.text.find("NewComponent").unwrap()).unwrap();
        let (offset, separator) = hoist_point(&ctx, instance).unwrap();
        assert_eq!(&ctx.text[..offset], "Main (\n    a : IN BIT;");
        assert!(!separator);
    }

    #[test]
    fn test_hoist_point_without_ports() {
        let ctx = analyze("Main () {\n    NewComponent X (Q => );\n}\n");
        let instance = find_instance(&ctx, ctx.text.find("NewComponent").unwrap()).unwrap();
        assert_eq!(hoist_point(&ctx, instance), Some((6, false)));
    }

    #[test]
    fn test_not_an_instance() {
        let ctx = analyze("Main () { }");
        let mut doc = RopeDocument::new(&ctx.text);
        let err = AutoConnect::new()
            .connect(&mut doc, &ctx, &ProjectContext::empty(), ctx.tree.root())
            .unwrap_err();
        assert!(matches!(err, AutoConnectError::NotAnInstance(_)));
    }

    #[test]
    fn test_stale_document_is_rejected() {
        let ctx = analyze("Main () {\n    NewComponent X (Q => );\n}\n");
        let instance = find_instance(&ctx, ctx.text.find("NewComponent").unwrap()).unwrap();
        let mut doc = RopeDocument::new("Main () { }");
        let err = AutoConnect::new()
            .connect(&mut doc, &ctx, &ProjectContext::empty(), instance)
            .unwrap_err();
        assert!(matches!(err, AutoConnectError::StaleDocument));
        assert_eq!(doc.update_depth(), 0);
    }

    #[test]
    fn test_declaration_line() {
        assert_eq!(declaration_line("SIGNAL a", ": BIT"), "SIGNAL a : BIT;");
        assert_eq!(declaration_line("SIGNAL a", ""), "SIGNAL a;");
    }
}
