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

//! Declaration rendering and document symbols for VHDP files.
//!
//! The rendering helpers turn syntax segments back into short, normalized
//! source snippets (`Q : OUT STD_LOGIC`, `Component Counter (...)`). Hover,
//! signature help and auto-connect all show declarations the way they are
//! written in the source.
//!
//! # Error Handling
//!
//! Symbol extraction is fault-tolerant:
//! - Segments with empty names are labelled with their kind
//! - Offsets are converted through the context's line index, which clamps
//!   out-of-range values

use crate::utils::to_range;
use tower_lsp::lsp_types::{DocumentSymbol, Range, SymbolKind};
use tracing::debug;
use vhdp_core::{AnalyzerContext, SegmentId, SegmentKind, VariableType};

/// Collapse every whitespace run to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Direction keyword of a port declaration (`IN`, `OUT`, ...).
pub fn direction(ctx: &AnalyzerContext, decl: SegmentId) -> Option<&str> {
    ctx.tree
        .child_of_kind(decl, SegmentKind::Direction)
        .map(|d| ctx.segment(d).name.as_str())
}

/// Type clause of a declaration starting at its `:`, whitespace-normalized,
/// e.g. `: OUT STD_LOGIC_VECTOR(N-1 downto 0)`.
///
/// With `keep_direction` false the direction keyword is dropped, which
/// turns a port clause into a signal clause. Names declared together
/// (`SIGNAL a, b : T`) get `: T` for the later names.
pub fn declaration_clause(ctx: &AnalyzerContext, decl: SegmentId, keep_direction: bool) -> Option<String> {
    let tree = &ctx.tree;
    let segment = tree.get(decl);
    if let Some(head) = tree.operator_child(decl, ":") {
        let head_segment = tree.get(head);
        let start = match (&head_segment.operator, head_segment.kind) {
            (_, SegmentKind::Direction) if !keep_direction => head_segment.end_offset,
            (Some(colon), _) => colon.end(),
            (None, _) => head_segment.offset,
        };
        let body = normalize_whitespace(ctx.slice(start, segment.end_offset));
        return Some(format!(": {}", body));
    }
    let usage = tree.child_of_kind(decl, SegmentKind::TypeUsage)?;
    Some(format!(": {}", normalize_whitespace(ctx.segment_text(usage))))
}

/// Source-like one-line rendering of a declaration.
pub fn declaration_signature(ctx: &AnalyzerContext, decl: SegmentId) -> String {
    let segment = ctx.segment(decl);
    let clause = declaration_clause(ctx, decl, true).unwrap_or_default();
    let head = match segment.variable_type {
        Some(t @ (VariableType::Signal | VariableType::Constant | VariableType::Variable)) => {
            format!("{} {}", t.keyword(), segment.name)
        }
        _ => segment.name.clone(),
    };
    if clause.is_empty() {
        head
    } else {
        format!("{} {}", head, clause)
    }
}

/// `Component Name (generics; ports)` rendering of an entity.
pub fn component_signature(ctx: &AnalyzerContext, component: SegmentId) -> String {
    let segment = ctx.segment(component);
    let generics: Vec<String> = ctx
        .generic_declarations(component)
        .into_iter()
        .map(|g| declaration_signature(ctx, g))
        .collect();
    let ports: Vec<String> = ctx
        .io_declarations(component)
        .into_iter()
        .map(|p| declaration_signature(ctx, p))
        .collect();

    let mut out = match segment.kind {
        SegmentKind::Main => "Main\n(\n".to_string(),
        _ => format!("Component {}\n(\n", segment.name),
    };
    if !generics.is_empty() {
        out.push_str(&format!("    Generic ({});\n", generics.join("; ")));
    }
    for port in ports {
        out.push_str(&format!("    {};\n", port));
    }
    out.push(')');
    out
}

/// `Function name (params) return T` rendering.
pub fn function_signature(ctx: &AnalyzerContext, function: SegmentId) -> String {
    let segment = ctx.segment(function);
    let params: Vec<String> = segment
        .first_parameters()
        .iter()
        .filter(|p| ctx.segment(**p).kind == SegmentKind::VariableDeclaration)
        .map(|p| declaration_signature(ctx, *p))
        .collect();
    let mut out = format!("Function {} ({})", segment.name, params.join("; "));
    if let Some(ret) = return_type(ctx, function) {
        out.push_str(&format!(" return {}", ret));
    }
    out
}

pub fn return_type(ctx: &AnalyzerContext, function: SegmentId) -> Option<String> {
    ctx.tree
        .operator_child(function, "return")
        .map(|t| normalize_whitespace(ctx.segment_text(t)))
}

/// Human-readable role of a declaration.
pub fn declaration_role(variable_type: Option<VariableType>) -> &'static str {
    match variable_type {
        Some(VariableType::Io) => "Port",
        Some(VariableType::Generic) => "Generic",
        Some(VariableType::Signal) => "Signal",
        Some(VariableType::Constant) => "Constant",
        Some(VariableType::Variable) => "Variable",
        Some(VariableType::Parameter) => "Parameter",
        Some(VariableType::RecordField) => "Record field",
        Some(VariableType::EnumMember) => "Enum literal",
        None => "Declaration",
    }
}

/// Range covering the name of a segment (the label for labelled instances).
pub fn name_range(ctx: &AnalyzerContext, id: SegmentId) -> Range {
    let segment = ctx.segment(id);
    let (start, len) = match &segment.label {
        Some(label) => (label.offset, label.name.len()),
        None => (name_offset(ctx, id), segment.name.len()),
    };
    let end = (start + len).min(segment.end_offset.max(start));
    to_range(ctx.position(start), ctx.position(end))
}

/// Offset of the segment's name inside its span; keywords such as
/// `Component` precede the name of entities.
fn name_offset(ctx: &AnalyzerContext, id: SegmentId) -> usize {
    let segment = ctx.segment(id);
    if segment.name.is_empty() {
        return segment.offset;
    }
    let body = ctx.slice(segment.offset, segment.end_offset).to_ascii_uppercase();
    let name = segment.name.to_ascii_uppercase();
    if body.starts_with(&name) {
        return segment.offset;
    }
    // skip the leading keyword
    let skip = body.find(char::is_whitespace).unwrap_or(0);
    body[skip..]
        .find(&name)
        .map_or(segment.offset, |i| segment.offset + skip + i)
}

/// Full range of a segment.
pub fn segment_range(ctx: &AnalyzerContext, id: SegmentId) -> Range {
    let segment = ctx.segment(id);
    to_range(ctx.position(segment.offset), ctx.position(segment.end_offset))
}

/// Get document symbols for outline view.
#[allow(deprecated)]
pub fn get_document_symbols(ctx: &AnalyzerContext) -> Vec<DocumentSymbol> {
    let tree = &ctx.tree;
    let symbols: Vec<DocumentSymbol> = tree
        .get(tree.root())
        .children
        .iter()
        .filter_map(|id| symbol_for(ctx, *id))
        .collect();
    debug!("Extracted {} top-level symbols from {}", symbols.len(), ctx.path.display());
    symbols
}

#[allow(deprecated)]
fn symbol_for(ctx: &AnalyzerContext, id: SegmentId) -> Option<DocumentSymbol> {
    let tree = &ctx.tree;
    let segment = tree.get(id);
    let (kind, detail) = match segment.kind {
        SegmentKind::Component => (SymbolKind::CLASS, Some("Component".to_string())),
        SegmentKind::Main => (SymbolKind::MODULE, Some("Top-level entity".to_string())),
        SegmentKind::Package => (SymbolKind::PACKAGE, None),
        SegmentKind::Process => (SymbolKind::EVENT, None),
        SegmentKind::Function => (SymbolKind::FUNCTION, return_type(ctx, id).map(|t| format!("return {}", t))),
        SegmentKind::NewComponent => (SymbolKind::OBJECT, Some(format!("NewComponent {}", segment.name))),
        SegmentKind::TypeDeclaration => {
            let is_enum = segment
                .children
                .iter()
                .any(|c| tree.get(*c).variable_type == Some(VariableType::EnumMember));
            (if is_enum { SymbolKind::ENUM } else { SymbolKind::STRUCT }, None)
        }
        SegmentKind::VariableDeclaration => {
            let kind = match segment.variable_type? {
                VariableType::Io => SymbolKind::INTERFACE,
                VariableType::Generic => SymbolKind::TYPE_PARAMETER,
                VariableType::Constant => SymbolKind::CONSTANT,
                VariableType::Signal | VariableType::Variable => SymbolKind::VARIABLE,
                VariableType::RecordField => SymbolKind::FIELD,
                VariableType::EnumMember => SymbolKind::ENUM_MEMBER,
                VariableType::Parameter => return None,
            };
            (kind, declaration_clause(ctx, id, true))
        }
        _ => return None,
    };

    let children: Vec<DocumentSymbol> = match segment.kind {
        SegmentKind::Component | SegmentKind::Main | SegmentKind::Package | SegmentKind::Process | SegmentKind::Function => {
            let mut nested: Vec<SegmentId> = tree
                .declarations(id)
                .into_iter()
                .filter(|d| tree.get(*d).variable_type != Some(VariableType::EnumMember))
                .collect();
            nested.extend(
                segment
                    .children
                    .iter()
                    .copied()
                    .filter(|c| tree.get(*c).kind != SegmentKind::VariableDeclaration),
            );
            nested.sort_by_key(|c| tree.get(*c).offset);
            nested.dedup();
            nested.into_iter().filter_map(|c| symbol_for(ctx, c)).collect()
        }
        SegmentKind::TypeDeclaration => segment.children.iter().filter_map(|c| symbol_for(ctx, *c)).collect(),
        _ => Vec::new(),
    };

    let name = if segment.kind == SegmentKind::NewComponent {
        segment.instance_name().to_string()
    } else if segment.name.is_empty() {
        format!("{:?}", segment.kind)
    } else {
        segment.name.clone()
    };
    let range = segment_range(ctx, id);
    let selection = name_range(ctx, id);
    Some(DocumentSymbol {
        name,
        detail,
        kind,
        tags: None,
        deprecated: None,
        range,
        selection_range: if selection.start >= range.start && selection.end <= range.end {
            selection
        } else {
            range
        },
        children: (!children.is_empty()).then_some(children),
    })
}
