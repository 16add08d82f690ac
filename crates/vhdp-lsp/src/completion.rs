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

//! Autocompletion for VHDP files.
//!
//! Completions are derived from the syntax tree of the current file plus the
//! project snapshot, suggesting what is valid at the cursor.
//!
//! # Completion Contexts
//!
//! - **RecordField**: after `.`, the fields of the record-typed expression
//! - **PortMap**: inside `NewComponent Name (...)`, the unconnected ports and
//!   generics of the instantiated component plus a snippet inserting empty
//!   auto-connect markers for all of them
//! - **PortValue**: after `=>` in a port map, the visible signals
//! - **Include**: inside `Include(...)`, package names
//! - **TypePosition**: after `:` in a declaration, types (and directions in
//!   port lists)
//! - **DeclarationList**: in an entity's parameter list
//! - **Body**: inside an entity, process, function, block or package
//! - **TopLevel**: outside of everything
//!
//! # Examples
//!
//! ```text
//! cfg.|                         → Suggests fields of cfg's record type
//! NewComponent Counter (|       → Suggests Q =>, N =>
//! SIGNAL s : |                  → Suggests STD_LOGIC, UNSIGNED, ...
//! Process () { | }              → Suggests If, While, VARIABLE, ...
//! ```

use crate::symbols::{declaration_clause, declaration_signature};
use crate::utils::{safe_slice_to, to_line_col, word_before};
use std::collections::HashSet;
use tower_lsp::lsp_types::*;
use vhdp_core::{keywords, AnalyzerContext, ProjectContext, SegmentId, SegmentKind, VariableType};

/// Completion context for determining what to suggest.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionContext {
    /// After `.`; the segment left of the dot, when one was found.
    RecordField { target: Option<SegmentId> },
    /// Member position inside an instantiation's parameter list.
    PortMap { instance: SegmentId },
    /// Value position (after `=>`) inside an instantiation's parameter list.
    PortValue { anchor: SegmentId },
    /// Inside `Include(...)`.
    Include,
    /// Type of a declaration.
    TypePosition { port_list: bool },
    /// Parameter list of a component or `Main`.
    DeclarationList,
    /// Statement or declaration position inside `scope`.
    Body { scope: SegmentId, anchor: SegmentId },
    /// File level.
    TopLevel,
    /// Unknown context.
    Unknown,
}

/// Get completions for a position in the document.
pub fn get_completions(
    ctx: &AnalyzerContext,
    project: &ProjectContext,
    position: Position,
    trigger_character: Option<&str>,
) -> Vec<CompletionItem> {
    let context = match ctx.offset(to_line_col(position)) {
        Some(offset) => determine_context(ctx, offset),
        None => CompletionContext::Unknown,
    };
    if trigger_character == Some(".") && !matches!(context, CompletionContext::RecordField { .. }) {
        return Vec::new();
    }

    match context {
        CompletionContext::RecordField { target } => target
            .map(|t| record_field_completions(ctx, project, t))
            .unwrap_or_default(),
        CompletionContext::PortMap { instance } => port_map_completions(ctx, project, instance),
        CompletionContext::PortValue { anchor } => variable_completions(ctx, project, anchor),
        CompletionContext::Include => include_completions(project),
        CompletionContext::TypePosition { port_list } => type_completions(ctx, project, port_list),
        CompletionContext::DeclarationList => declaration_list_completions(),
        CompletionContext::Body { scope, anchor } => {
            let mut items = body_keyword_completions(ctx.segment(scope).kind);
            items.extend(variable_completions(ctx, project, anchor));
            if ctx.segment(scope).kind.is_entity() {
                items.extend(component_completions(ctx, project));
            }
            items
        }
        CompletionContext::TopLevel => top_level_completions(),
        CompletionContext::Unknown => Vec::new(),
    }
}

/// Determine completion context from the syntax tree around `offset`.
///
/// The identifier being typed is skipped, so the context is decided by what
/// precedes it.
pub fn determine_context(ctx: &AnalyzerContext, offset: usize) -> CompletionContext {
    let text: &str = &ctx.text;
    let prefix = safe_slice_to(text, offset);
    let probe = prefix.len() - word_before(text, offset).len();
    let before = &prefix[..probe];

    if let Some(dot) = before.strip_suffix('.').map(str::len) {
        let target = dot.checked_sub(1).and_then(|o| ctx.segment_at(o)).filter(|id| {
            matches!(
                ctx.segment(*id).kind,
                SegmentKind::VariableReference | SegmentKind::RecordMember
            )
        });
        return CompletionContext::RecordField { target };
    }

    let anchor = match probe.checked_sub(1).and_then(|o| ctx.segment_at(o)) {
        Some(anchor) => anchor,
        None if before.trim().is_empty() => return CompletionContext::TopLevel,
        None => return CompletionContext::Unknown,
    };
    let tree = &ctx.tree;

    if let Some(instance) = tree.enclosing(anchor, &[SegmentKind::NewComponent]) {
        if paren_start(ctx, instance).is_some_and(|p| p < probe) {
            return if current_clause(before).contains("=>") {
                CompletionContext::PortValue { anchor }
            } else {
                CompletionContext::PortMap { instance }
            };
        }
    }
    if tree.enclosing(anchor, &[SegmentKind::Include]).is_some() {
        return CompletionContext::Include;
    }
    if tree.enclosing(anchor, &[SegmentKind::Connections]).is_some() {
        return CompletionContext::PortValue { anchor };
    }

    let clause = current_clause(before);
    let in_list = in_parameter_list(ctx, anchor, probe);
    if clause.contains(':') && !clause.contains(":=") && !clause.contains("=>") && !clause.contains("<=") {
        let port_list = in_list && tree.enclosing(anchor, &[SegmentKind::GenericBlock]).is_none();
        return CompletionContext::TypePosition { port_list };
    }
    if in_list {
        return CompletionContext::DeclarationList;
    }

    let scope = tree.enclosing(
        anchor,
        &[
            SegmentKind::Component,
            SegmentKind::Main,
            SegmentKind::Package,
            SegmentKind::Process,
            SegmentKind::Function,
            SegmentKind::Block,
        ],
    );
    match scope {
        Some(scope) => CompletionContext::Body { scope, anchor },
        None => CompletionContext::TopLevel,
    }
}

/// Text after the last clause delimiter.
fn current_clause(before: &str) -> &str {
    before
        .rfind(|c| matches!(c, ';' | '{' | '}' | '(' | ','))
        .map_or(before, |i| &before[i + 1..])
}

/// Offset of the `(` opening a segment's parameter list.
fn paren_start(ctx: &AnalyzerContext, id: SegmentId) -> Option<usize> {
    let segment = ctx.segment(id);
    ctx.slice(segment.offset, segment.end_offset)
        .find('(')
        .map(|i| segment.offset + i)
}

/// Whether `probe` lies between an entity's `(` and its body's `{`.
fn in_parameter_list(ctx: &AnalyzerContext, anchor: SegmentId, probe: usize) -> bool {
    let Some(entity) = ctx.tree.enclosing(anchor, &[SegmentKind::Component, SegmentKind::Main]) else {
        return false;
    };
    let segment = ctx.segment(entity);
    let body = ctx
        .slice(segment.offset, segment.end_offset)
        .find('{')
        .map_or(segment.end_offset, |i| segment.offset + i);
    paren_start(ctx, entity).is_some_and(|p| p < probe && probe <= body)
}

fn record_field_completions(ctx: &AnalyzerContext, project: &ProjectContext, target: SegmentId) -> Vec<CompletionItem> {
    let Some(symbol) = &ctx.segment(target).resolved else {
        return Vec::new();
    };
    let Some((owner, decl)) = project.resolve_symbol(ctx, symbol) else {
        return Vec::new();
    };
    if decl.kind != SegmentKind::VariableDeclaration {
        return Vec::new();
    }
    let type_symbol = owner
        .tree
        .child_of_kind(symbol.segment, SegmentKind::TypeUsage)
        .and_then(|usage| owner.segment(usage).resolved.clone());
    let Some(type_symbol) = type_symbol else {
        return Vec::new();
    };
    let Some((type_owner, record)) = project.resolve_symbol(ctx, &type_symbol) else {
        return Vec::new();
    };
    if record.kind != SegmentKind::TypeDeclaration {
        return Vec::new();
    }

    record
        .children
        .iter()
        .copied()
        .filter(|f| type_owner.segment(*f).is_declaration_of(VariableType::RecordField))
        .map(|f| CompletionItem {
            label: type_owner.segment(f).name.clone(),
            kind: Some(CompletionItemKind::FIELD),
            detail: declaration_clause(type_owner, f, true),
            insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
            ..Default::default()
        })
        .collect()
}

fn port_map_completions(ctx: &AnalyzerContext, project: &ProjectContext, instance: SegmentId) -> Vec<CompletionItem> {
    let segment = ctx.segment(instance);
    let Some((owner, component)) = segment
        .resolved
        .as_ref()
        .and_then(|s| project.resolve_symbol(ctx, s).map(|(owner, _)| (owner, s.segment)))
    else {
        return Vec::new();
    };

    let connected: HashSet<String> = segment
        .first_parameters()
        .iter()
        .map(|m| ctx.segment(*m))
        .filter(|m| m.kind == SegmentKind::ConnectionMember)
        .map(|m| m.name.to_ascii_lowercase())
        .collect();

    let open: Vec<SegmentId> = owner
        .generic_declarations(component)
        .into_iter()
        .chain(owner.io_declarations(component))
        .filter(|d| !connected.contains(&owner.segment(*d).name.to_ascii_lowercase()))
        .collect();

    let mut items: Vec<CompletionItem> = open
        .iter()
        .map(|d| {
            let decl = owner.segment(*d);
            let kind = if decl.variable_type == Some(VariableType::Generic) {
                CompletionItemKind::TYPE_PARAMETER
            } else {
                CompletionItemKind::INTERFACE
            };
            CompletionItem {
                label: decl.name.clone(),
                kind: Some(kind),
                detail: Some(declaration_signature(owner, *d)),
                insert_text: Some(format!("{} => ", decl.name)),
                insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
                ..Default::default()
            }
        })
        .collect();

    if !open.is_empty() {
        let markers: Vec<String> = open
            .iter()
            .map(|d| format!("{} => ", owner.segment(*d).name))
            .collect();
        items.push(CompletionItem {
            label: "Auto-connect markers".to_string(),
            kind: Some(CompletionItemKind::SNIPPET),
            detail: Some(format!("{} unconnected", open.len())),
            insert_text: Some(markers.join(",\n")),
            insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
            documentation: Some(Documentation::String(
                "Inserts an empty value for every unconnected port and generic. \
                 Run auto-connect afterwards to generate the signals."
                    .to_string(),
            )),
            ..Default::default()
        });
    }
    items
}

/// Declarations visible from `anchor`: enclosing scopes (nearest first),
/// packages of this file, then package-level declarations of the project.
fn variable_completions(ctx: &AnalyzerContext, project: &ProjectContext, anchor: SegmentId) -> Vec<CompletionItem> {
    let tree = &ctx.tree;
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut push = |owner: &AnalyzerContext, decl: SegmentId| {
        let segment = owner.segment(decl);
        if segment.kind != SegmentKind::VariableDeclaration || !seen.insert(segment.name.to_ascii_lowercase()) {
            return;
        }
        let kind = match segment.variable_type {
            Some(VariableType::Constant | VariableType::Generic) => CompletionItemKind::CONSTANT,
            Some(VariableType::Io) => CompletionItemKind::INTERFACE,
            Some(VariableType::EnumMember) => CompletionItemKind::ENUM_MEMBER,
            Some(VariableType::RecordField) => CompletionItemKind::FIELD,
            _ => CompletionItemKind::VARIABLE,
        };
        items.push(CompletionItem {
            label: segment.name.clone(),
            kind: Some(kind),
            detail: Some(declaration_signature(owner, decl)),
            insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
            ..Default::default()
        });
    };

    for scope in std::iter::once(anchor)
        .chain(tree.ancestors(anchor))
        .filter(|s| tree.get(*s).kind.is_scope())
    {
        for decl in tree.declarations(scope) {
            push(ctx, decl);
        }
    }
    for package in ctx.packages() {
        for decl in tree.declarations(package) {
            push(ctx, decl);
        }
    }
    let mut globals: Vec<_> = project.globals().filter(|s| s.path != ctx.path).collect();
    globals.sort_by(|a, b| a.path.cmp(&b.path).then(a.segment.cmp(&b.segment)));
    for symbol in globals {
        if let Some((owner, _)) = project.resolve_symbol(ctx, symbol) {
            push(owner, symbol.segment);
        }
    }
    items
}

fn component_completions(ctx: &AnalyzerContext, project: &ProjectContext) -> Vec<CompletionItem> {
    let mut seen = HashSet::new();
    let local = ctx.components().map(|id| (ctx, id));
    let remote = project
        .components()
        .into_iter()
        .filter(|s| s.path != ctx.path)
        .filter_map(|s| project.resolve_symbol(ctx, s).map(|(owner, _)| (owner, s.segment)));
    local
        .chain(remote)
        .filter(|(owner, id)| seen.insert(owner.segment(*id).name.to_ascii_lowercase()))
        .map(|(owner, id)| {
            let name = owner.segment(id).name.clone();
            CompletionItem {
                label: name.clone(),
                kind: Some(CompletionItemKind::CLASS),
                detail: Some(format!(
                    "Component ({} ports, {} generics)",
                    owner.io_declarations(id).len(),
                    owner.generic_declarations(id).len()
                )),
                insert_text: Some(format!("NewComponent {}\n(\n\t$0\n);", name)),
                insert_text_format: Some(InsertTextFormat::SNIPPET),
                ..Default::default()
            }
        })
        .collect()
}

fn include_completions(project: &ProjectContext) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = keywords::PACKAGE_NAMES
        .iter()
        .map(|name| CompletionItem {
            label: name.to_string(),
            kind: Some(CompletionItemKind::MODULE),
            detail: Some("IEEE library".to_string()),
            ..Default::default()
        })
        .collect();
    let mut packages: Vec<String> = project
        .files()
        .flat_map(|file| file.packages().map(|p| file.segment(p).name.clone()).collect::<Vec<_>>())
        .collect();
    packages.sort();
    packages.dedup();
    items.extend(packages.into_iter().map(|name| CompletionItem {
        label: name,
        kind: Some(CompletionItemKind::MODULE),
        detail: Some("Project package".to_string()),
        ..Default::default()
    }));
    items
}

fn type_completions(ctx: &AnalyzerContext, project: &ProjectContext, port_list: bool) -> Vec<CompletionItem> {
    let mut items = Vec::new();
    if port_list {
        items.extend(keywords::DIRECTIONS.iter().map(|d| CompletionItem {
            label: d.to_string(),
            kind: Some(CompletionItemKind::KEYWORD),
            detail: Some("Port direction".to_string()),
            ..Default::default()
        }));
    }
    items.extend(keywords::BUILTIN_TYPES.iter().map(|t| CompletionItem {
        label: t.to_string(),
        kind: Some(CompletionItemKind::CLASS),
        detail: Some("Built-in type".to_string()),
        ..Default::default()
    }));

    let mut seen = HashSet::new();
    let local = ctx
        .tree
        .iter()
        .filter(|(_, s)| s.kind == SegmentKind::TypeDeclaration)
        .map(|(id, _)| (ctx, id));
    let mut remote: Vec<_> = project.globals().filter(|s| s.path != ctx.path).collect();
    remote.sort_by(|a, b| a.path.cmp(&b.path).then(a.segment.cmp(&b.segment)));
    let remote = remote
        .into_iter()
        .filter_map(|s| project.resolve_symbol(ctx, s).map(|(owner, _)| (owner, s.segment)));
    for (owner, id) in local.chain(remote) {
        let segment = owner.segment(id);
        if segment.kind != SegmentKind::TypeDeclaration || !seen.insert(segment.name.to_ascii_lowercase()) {
            continue;
        }
        items.push(CompletionItem {
            label: segment.name.clone(),
            kind: Some(CompletionItemKind::STRUCT),
            detail: Some("Declared type".to_string()),
            ..Default::default()
        });
    }
    items
}

fn snippet(label: &str, detail: &str, body: &str) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(CompletionItemKind::KEYWORD),
        detail: Some(detail.to_string()),
        insert_text: Some(body.to_string()),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        ..Default::default()
    }
}

fn declaration_list_completions() -> Vec<CompletionItem> {
    let mut items = vec![
        snippet("Generic", "Generic parameters", "Generic\n(\n\t${1:N} : ${2:NATURAL} := ${3:8};\n);"),
        snippet("Include", "Package inclusion", "Include\n(\n\t${1:IEEE.STD_LOGIC_1164.ALL}\n);"),
    ];
    items.extend(keywords::BUILTIN_PORTS.iter().map(|port| CompletionItem {
        label: port.to_string(),
        kind: Some(CompletionItemKind::INTERFACE),
        detail: Some("Board port".to_string()),
        insert_text: Some(format!("{} : ${{1:IN}} STD_LOGIC;", port)),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        ..Default::default()
    }));
    items
}

/// Block keywords with the spelling VHDP sources use.
const BLOCK_SNIPPETS: &[(&str, &str)] = &[
    ("If", "If (${1:condition})\n{\n\t$0\n}"),
    ("Elsif", "Elsif (${1:condition})\n{\n\t$0\n}"),
    ("Else", "Else\n{\n\t$0\n}"),
    ("While", "While (${1:condition})\n{\n\t$0\n}"),
    ("For", "For (${1:i} IN ${2:0} to ${3:7})\n{\n\t$0\n}"),
    ("Case", "Case (${1:value})\n{\n\tWhen (${2:choice})\n\t{\n\t\t$0\n\t}\n}"),
    ("When", "When (${1:choice})\n{\n\t$0\n}"),
    ("Thread", "Thread\n{\n\t$0\n}"),
    ("SeqFor", "SeqFor (${1:i} IN ${2:0} to ${3:7})\n{\n\t$0\n}"),
    ("StepFor", "StepFor (${1:i} IN ${2:0} to ${3:7})\n{\n\t$0\n}"),
    ("ParFor", "ParFor (${1:i} IN ${2:0} to ${3:7})\n{\n\t$0\n}"),
    ("Step", "Step\n{\n\t$0\n}"),
];

fn body_keyword_completions(scope: SegmentKind) -> Vec<CompletionItem> {
    let signal = snippet("SIGNAL", "Signal declaration", "SIGNAL ${1:name} : ${2:STD_LOGIC};");
    let constant = snippet(
        "CONSTANT",
        "Constant declaration",
        "CONSTANT ${1:name} : ${2:NATURAL} := ${3:0};",
    );
    let type_decl = snippet("TYPE", "Type declaration", "TYPE ${1:name}_type IS (${2:Idle});");
    let function = snippet(
        "Function",
        "Function",
        "Function ${1:name} (${2:a} : ${3:INTEGER}) return ${4:INTEGER}\n{\n\t$0\n}",
    );

    match scope {
        SegmentKind::Component | SegmentKind::Main => vec![
            signal,
            constant,
            type_decl,
            snippet("Process", "Sequential process", "Process ()\n{\n\t$0\n}"),
            function,
            snippet("NewComponent", "Component instance", "NewComponent ${1:Name}\n(\n\t$0\n);"),
            snippet("Connections", "Pin assignment", "Connections\n(\n\t${1:port} => ${2:pin},\n);"),
        ],
        SegmentKind::Package => vec![constant, signal, type_decl, function],
        _ => {
            let mut items = vec![
                snippet("VARIABLE", "Variable declaration", "VARIABLE ${1:name} : ${2:INTEGER} := ${3:0};"),
                constant,
            ];
            items.extend(BLOCK_SNIPPETS.iter().map(|(label, body)| snippet(label, "Block", body)));
            items.extend(keywords::STATEMENT_KEYWORDS.iter().map(|k| CompletionItem {
                label: k.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                detail: Some("Statement".to_string()),
                ..Default::default()
            }));
            items
        }
    }
}

fn top_level_completions() -> Vec<CompletionItem> {
    vec![
        snippet("Component", "Component declaration", "Component ${1:Name}\n(\n\t$0\n)\n{\n}"),
        snippet("Main", "Top-level entity", "Main\n(\n\t$0\n)\n{\n}"),
        snippet("Package", "Package declaration", "Package ${1:Name}\n{\n\t$0\n}"),
        snippet("Include", "Package inclusion", "Include\n(\n\t${1:IEEE.STD_LOGIC_1164.ALL}\n);"),
    ]
}
