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

//! Hover information for VHDP files.
//!
//! # Supported Elements
//!
//! - **Diagnostics**: the most severe problem under the cursor comes first
//! - **Declarations**: signature of ports, generics, signals, constants
//! - **References**: signature of the declaration a name resolved to
//! - **Components**: generics and ports of declared and instantiated components
//! - **Operators**: `=>`, `:`, `:=`, `<=` and `.` describe the relation they
//!   express (which port is connected, which declaration is typed) instead
//!   of the segment body
//!
//! # Examples
//!
//! Hovering over `=>` in `NewComponent Counter (Q => count)` shows the `Q`
//! port of `Counter` with its full type.

use crate::symbols::{
    component_signature, declaration_role, declaration_signature, function_signature, normalize_whitespace,
};
use crate::utils::{to_line_col, to_range};
use tower_lsp::lsp_types::*;
use vhdp_core::{keywords, AnalyzerContext, ProjectContext, SegmentId, SegmentKind, Severity, SymbolRef};

/// Get hover information for a position.
///
/// # Returns
///
/// Markdown with the diagnostic covering the cursor (if any) followed by
/// structural information about the segment at the cursor. `None` when
/// neither is available.
pub fn get_hover(ctx: &AnalyzerContext, project: &ProjectContext, position: Position) -> Option<Hover> {
    let pos = to_line_col(position);
    let offset = ctx.offset(pos)?;

    let diagnostic = ctx.diagnostics_at(pos).into_iter().next();
    let structural = ctx.segment_at(offset).and_then(|id| {
        let segment = ctx.segment(id);
        if segment.operator_contains(offset) {
            let op = segment.operator.as_ref()?;
            let content = describe_operator(ctx, project, id)?;
            Some((content, (op.offset, op.end())))
        } else {
            let content = describe_segment(ctx, project, id)?;
            Some((content, hovered_span(ctx, id)))
        }
    });

    let (value, range) = match (diagnostic, structural) {
        (None, None) => return None,
        (Some(d), None) => (diagnostic_markdown(d), to_range(d.start, d.end)),
        (diag, Some(((title, description), (start, end)))) => {
            let mut value = String::new();
            if let Some(d) = diag {
                value.push_str(&diagnostic_markdown(d));
                value.push_str("\n\n---\n\n");
            }
            value.push_str(&create_hover_content(&title, &description).value);
            (value, to_range(ctx.position(start), ctx.position(end)))
        }
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(range),
    })
}

fn diagnostic_markdown(d: &vhdp_core::Diagnostic) -> String {
    let label = match d.severity {
        Severity::Error => "Error",
        Severity::Warning => "Warning",
        Severity::Hint => "Hint",
    };
    format!("**{}** ({}): {}", label, d.code, d.message)
}

/// Name span of the hovered segment, falling back to its whole body.
fn hovered_span(ctx: &AnalyzerContext, id: SegmentId) -> (usize, usize) {
    let segment = ctx.segment(id);
    let name_end = segment.offset + segment.name.len();
    if !segment.name.is_empty() && ctx.slice(segment.offset, name_end).eq_ignore_ascii_case(&segment.name) {
        (segment.offset, name_end)
    } else {
        (segment.offset, segment.end_offset)
    }
}

type Content = (String, String);

fn describe_segment(ctx: &AnalyzerContext, project: &ProjectContext, id: SegmentId) -> Option<Content> {
    let segment = ctx.segment(id);
    match segment.kind {
        SegmentKind::VariableDeclaration => Some(describe_declaration(ctx, id)),
        SegmentKind::Component | SegmentKind::Main => Some(describe_component(ctx, id)),
        SegmentKind::Package => {
            let count = ctx.tree.declarations(id).len();
            Some((
                format!("**Package** `{}`", segment.name),
                format!("{} declarations", count),
            ))
        }
        SegmentKind::TypeDeclaration => Some((
            format!("**Type** `{}`", segment.name),
            code_block(&normalize_whitespace(ctx.segment_text(id))),
        )),
        SegmentKind::Function => Some((
            format!("**Function** `{}`", segment.name),
            code_block(&function_signature(ctx, id)),
        )),
        SegmentKind::Process => Some((
            "**Process**".to_string(),
            "Sequential block executed on every clock cycle of its sensitivity list.".to_string(),
        )),
        SegmentKind::Direction => Some((format!("**Direction** `{}`", segment.name), direction_help(&segment.name))),
        SegmentKind::DefaultValue => Some(("**Default value**".to_string(), format!("`{}`", segment.name))),
        SegmentKind::EmptyName => Some(marker_help()),
        SegmentKind::PackageName => Some((
            format!("**Include** `{}`", segment.name),
            "Makes the package's declarations visible in this file.".to_string(),
        )),
        SegmentKind::NewComponent => match &segment.resolved {
            Some(symbol) => {
                let (title, description) = describe_symbol(ctx, project, symbol)?;
                let instance = match &segment.label {
                    Some(label) => format!("Instance `{}` of ", label.name),
                    None => "Instance of ".to_string(),
                };
                Some((format!("{}{}", instance, title.trim_start_matches("**Component** ")), description))
            }
            None => Some((
                format!("**NewComponent** `{}`", segment.name),
                "Component is not declared in the project.".to_string(),
            )),
        },
        SegmentKind::VariableReference
        | SegmentKind::ConnectionMember
        | SegmentKind::RecordMember
        | SegmentKind::FunctionCall
        | SegmentKind::TypeUsage => match &segment.resolved {
            Some(symbol) => describe_symbol(ctx, project, symbol),
            None => describe_builtin(segment.kind, &segment.name),
        },
        _ => None,
    }
}

/// Describe the relation expressed by the operator joining `id` to its owner.
fn describe_operator(ctx: &AnalyzerContext, project: &ProjectContext, id: SegmentId) -> Option<Content> {
    let segment = ctx.segment(id);
    let op = segment.operator.as_ref()?;
    let parent = segment.parent?;
    match op.text.as_str() {
        "=>" => {
            let member = ctx.segment(parent);
            let target = match &member.resolved {
                Some(symbol) => describe_symbol(ctx, project, symbol).map(|(_, d)| d),
                None => None,
            };
            let relation = if segment.kind == SegmentKind::EmptyName {
                "not connected yet; auto-connect can generate it".to_string()
            } else {
                format!("connected to `{}`", segment.name)
            };
            Some((
                format!("**Port map** `{} =>`", member.name),
                match target {
                    Some(d) => format!("{}\n\n`{}` is {}.", d, member.name, relation),
                    None => format!("`{}` is {}.", member.name, relation),
                },
            ))
        }
        ":" => Some((
            format!("**{}** `{}`", declaration_role(ctx.segment(parent).variable_type), ctx.segment(parent).name),
            code_block(&declaration_signature(ctx, parent)),
        )),
        ":=" if segment.kind == SegmentKind::DefaultValue => Some((
            "**Default value**".to_string(),
            format!("`{}` starts as `{}`.", ctx.segment(parent).name, segment.name),
        )),
        ":=" => Some((
            "**Variable assignment** `:=`".to_string(),
            "Takes effect immediately inside the process.".to_string(),
        )),
        "<=" => Some((
            "**Signal assignment** `<=`".to_string(),
            "Takes effect at the end of the current cycle.".to_string(),
        )),
        "." => describe_segment(ctx, project, id),
        "return" => Some((
            "**Return type**".to_string(),
            format!("`{}`", normalize_whitespace(ctx.segment_text(id))),
        )),
        _ => None,
    }
}

/// Describe the declaration `symbol` points at, in whichever file owns it.
fn describe_symbol(ctx: &AnalyzerContext, project: &ProjectContext, symbol: &SymbolRef) -> Option<Content> {
    let (owner, decl) = project.resolve_symbol(ctx, symbol)?;
    let (title, mut description) = match decl.kind {
        SegmentKind::VariableDeclaration => describe_declaration(owner, symbol.segment),
        SegmentKind::Component | SegmentKind::Main => describe_component(owner, symbol.segment),
        SegmentKind::Function => (
            format!("**Function** `{}`", decl.name),
            code_block(&function_signature(owner, symbol.segment)),
        ),
        SegmentKind::TypeDeclaration => (
            format!("**Type** `{}`", decl.name),
            code_block(&normalize_whitespace(owner.segment_text(symbol.segment))),
        ),
        _ => return None,
    };
    if owner.path != ctx.path {
        let line = owner.position(decl.offset).line + 1;
        let file = owner
            .path
            .file_name()
            .map_or_else(|| owner.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        description.push_str(&format!("\n\nDefined in `{}` on line {}.", file, line));
    }
    Some((title, description))
}

fn describe_declaration(ctx: &AnalyzerContext, decl: SegmentId) -> Content {
    let segment = ctx.segment(decl);
    let mut description = code_block(&declaration_signature(ctx, decl));
    let owner = ctx.tree.enclosing(decl, &[
        SegmentKind::Component,
        SegmentKind::Main,
        SegmentKind::Package,
        SegmentKind::Process,
        SegmentKind::Function,
        SegmentKind::TypeDeclaration,
    ]);
    if let Some(owner) = owner.filter(|o| *o != decl) {
        let owner = ctx.segment(owner);
        description.push_str(&format!("\n\nDeclared in {:?} `{}`.", owner.kind, owner.name));
    }
    if ctx.is_forwarded(&segment.name) && segment.variable_type == Some(vhdp_core::VariableType::Io) {
        description.push_str("\n\nForwarded to a top-level pin by `Connections`.");
    }
    (
        format!("**{}** `{}`", declaration_role(segment.variable_type), segment.name),
        description,
    )
}

fn describe_component(ctx: &AnalyzerContext, component: SegmentId) -> Content {
    let segment = ctx.segment(component);
    let ports = ctx.io_declarations(component).len();
    let generics = ctx.generic_declarations(component).len();
    let title = match segment.kind {
        SegmentKind::Main => "**Main**".to_string(),
        _ => format!("**Component** `{}`", segment.name),
    };
    (
        title,
        format!(
            "{}\n\n{} ports, {} generics",
            code_block(&component_signature(ctx, component)),
            ports,
            generics
        ),
    )
}

fn describe_builtin(kind: SegmentKind, name: &str) -> Option<Content> {
    if kind == SegmentKind::TypeUsage && keywords::is_builtin_type(name) {
        return Some((
            format!("**Type** `{}`", name.to_ascii_uppercase()),
            "Built-in type from the IEEE library.".to_string(),
        ));
    }
    if kind == SegmentKind::FunctionCall && keywords::is_builtin_function(name) {
        return Some((
            format!("**Function** `{}`", name.to_ascii_lowercase()),
            "Built-in function from the IEEE library.".to_string(),
        ));
    }
    None
}

fn direction_help(direction: &str) -> String {
    match direction {
        "IN" => "Input port: read inside the component, driven from outside.",
        "OUT" => "Output port: driven inside the component.",
        "INOUT" => "Bidirectional port.",
        "BUFFER" => "Output port that can also be read inside the component.",
        _ => "Port direction.",
    }
    .to_string()
}

fn marker_help() -> Content {
    (
        "**Auto-connect marker**".to_string(),
        "Empty port-map value. Run auto-connect to generate a signal or constant for it.".to_string(),
    )
}

fn code_block(code: &str) -> String {
    format!("```vhdp\n{}\n```", code)
}

fn create_hover_content(title: &str, description: &str) -> MarkupContent {
    MarkupContent {
        kind: MarkupKind::Markdown,
        value: format!("{}\n\n---\n\n{}", title, description),
    }
}
