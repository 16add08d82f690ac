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

//! Signature help for instantiations and function calls.
//!
//! Inside `NewComponent Name (...)` the component's generics and ports are
//! listed; inside `f(...)` the function's parameters. The active parameter
//! is the member named before `=>` when there is one, otherwise the number of
//! top-level commas before the cursor.

use crate::symbols::{declaration_signature, return_type};
use crate::utils::{safe_slice_to, to_line_col};
use tower_lsp::lsp_types::*;
use vhdp_core::{AnalyzerContext, ProjectContext, SegmentId, SegmentKind};

pub fn get_signature_help(ctx: &AnalyzerContext, project: &ProjectContext, position: Position) -> Option<SignatureHelp> {
    let offset = ctx.offset(to_line_col(position))?;
    let anchor = ctx.segment_at(offset.checked_sub(1)?)?;
    let call = ctx
        .tree
        .enclosing(anchor, &[SegmentKind::NewComponent, SegmentKind::FunctionCall])?;
    let call_segment = ctx.segment(call);
    let open = ctx
        .slice(call_segment.offset, call_segment.end_offset)
        .find('(')
        .map(|i| call_segment.offset + i)?;
    if offset <= open {
        return None;
    }

    let symbol = call_segment.resolved.as_ref()?;
    let (owner, target) = project.resolve_symbol(ctx, symbol)?;
    let (head, params, documentation) = match (call_segment.kind, target.kind) {
        (SegmentKind::NewComponent, SegmentKind::Component) => {
            let params: Vec<SegmentId> = owner
                .generic_declarations(symbol.segment)
                .into_iter()
                .chain(owner.io_declarations(symbol.segment))
                .collect();
            (format!("{} ", target.name), params, "Component instantiation".to_string())
        }
        (SegmentKind::FunctionCall, SegmentKind::Function) => {
            let params: Vec<SegmentId> = target
                .first_parameters()
                .iter()
                .copied()
                .filter(|p| owner.segment(*p).kind == SegmentKind::VariableDeclaration)
                .collect();
            let documentation = match return_type(owner, symbol.segment) {
                Some(ret) => format!("Returns {}", ret),
                None => "Procedure".to_string(),
            };
            (format!("{} ", target.name), params, documentation)
        }
        _ => return None,
    };

    let mut label = format!("{}(", head);
    let mut parameters = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            label.push_str("; ");
        }
        let start = char_len(&label);
        label.push_str(&declaration_signature(owner, *param));
        parameters.push(ParameterInformation {
            label: ParameterLabel::LabelOffsets([start, char_len(&label)]),
            documentation: None,
        });
    }
    label.push(')');

    let typed = safe_slice_to(&ctx.text, offset);
    let typed = typed.get(open + 1..).unwrap_or("");
    let active = named_member(typed)
        .and_then(|name| params.iter().position(|p| owner.segment(*p).is_named(name)))
        .map(|i| i as u32)
        .unwrap_or_else(|| top_level_commas(typed));

    Some(SignatureHelp {
        signatures: vec![SignatureInformation {
            label,
            documentation: Some(Documentation::String(documentation)),
            parameters: Some(parameters),
            active_parameter: Some(active),
        }],
        active_signature: Some(0),
        active_parameter: Some(active),
    })
}

/// Label offsets use the server's column unit: Unicode scalar values.
fn char_len(s: &str) -> u32 {
    s.chars().count() as u32
}

/// Number of commas outside nested parentheses.
fn top_level_commas(text: &str) -> u32 {
    let mut depth = 0usize;
    let mut commas = 0;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => commas += 1,
            _ => {}
        }
    }
    commas
}

/// Name before `=>` in the member being typed, if any.
fn named_member(text: &str) -> Option<&str> {
    let clause = text.rsplit(',').next()?;
    let (name, _) = clause.split_once("=>")?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}
