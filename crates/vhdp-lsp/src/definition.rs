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

//! Go-to-definition.

use crate::symbols::name_range;
use crate::utils::to_line_col;
use std::path::PathBuf;
use tower_lsp::lsp_types::{Position, Range};
use tracing::debug;
use vhdp_core::{AnalyzerContext, ProjectContext, SegmentKind, SymbolRef};

/// Location of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionTarget {
    pub path: PathBuf,
    /// Range of the declared name.
    pub range: Range,
}

/// Find the declaration of the segment at `position`.
///
/// References follow the binding recorded by the Resolve phase; the
/// position of the target comes from the owning file's line index, which
/// may be another file of the project.
pub fn get_definition(ctx: &AnalyzerContext, project: &ProjectContext, position: Position) -> Option<DefinitionTarget> {
    let offset = ctx.offset(to_line_col(position))?;
    let id = ctx.segment_at(offset)?;
    let segment = ctx.segment(id);

    let symbol = match segment.kind {
        SegmentKind::VariableReference
        | SegmentKind::NewComponent
        | SegmentKind::ConnectionMember
        | SegmentKind::FunctionCall
        | SegmentKind::TypeUsage
        | SegmentKind::RecordMember => segment.resolved.clone()?,
        // a marker or value belongs to the member it connects
        SegmentKind::EmptyName | SegmentKind::Expression if segment.operator_contains(offset) => {
            ctx.segment(segment.parent?).resolved.clone()?
        }
        SegmentKind::VariableDeclaration
        | SegmentKind::Component
        | SegmentKind::Function
        | SegmentKind::TypeDeclaration
        | SegmentKind::Package => SymbolRef {
            path: ctx.path.clone(),
            segment: id,
        },
        _ => return None,
    };

    let (owner, _) = project.resolve_symbol(ctx, &symbol)?;
    debug!(
        "Definition of '{}' at {}:{} -> {}",
        segment.name,
        position.line,
        position.character,
        owner.path.display()
    );
    Some(DefinitionTarget {
        path: owner.path.clone(),
        range: name_range(owner, symbol.segment),
    })
}
