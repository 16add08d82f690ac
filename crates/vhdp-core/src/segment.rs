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

//! Syntax segments stored in an arena.
//!
//! A [`SyntaxTree`] owns every [`Segment`] of one file in a flat vector.
//! Segments refer to each other through [`SegmentId`] handles: `children`
//! and `parameters` point down, `parent` points back up without owning
//! anything, so a tree can be dropped and rebuilt on every analysis pass.
//!
//! # Shape
//!
//! ```text
//! Root
//! └─ Component "Counter"            parameters[0]: Include, GenericBlock, IO declarations
//!    ├─ VariableDeclaration "count" (Signal)
//!    │  ├─ TypeUsage "INTEGER"       operator ":"
//!    │  └─ DefaultValue "0"          operator ":="
//!    └─ NewComponent "Divider"       parameters[0]: ConnectionMember ...
//!       └─ (ConnectionMember "Q")
//!          └─ EmptyName ""           operator "=>"   ← auto-generate marker
//! ```

use std::path::PathBuf;

/// Handle of a segment inside its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(u32);

impl SegmentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Syntactic role of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Whole file ("top segment").
    Root,
    /// `Component Name (...) { ... }`
    Component,
    /// `Main (...) { ... }`, the top-level entity.
    Main,
    /// `Package Name { ... }`
    Package,
    /// `Include(...)`
    Include,
    /// One package path inside `Include(...)`.
    PackageName,
    /// `Generic (...)` inside a component's parameter list.
    GenericBlock,
    /// Declaration of an IO, generic, signal, constant, variable, parameter,
    /// record field or enum literal. See [`Segment::variable_type`].
    VariableDeclaration,
    /// `IN` / `OUT` / `INOUT` / `BUFFER` of a port declaration.
    Direction,
    /// Type named in a declaration (including its constraint).
    TypeUsage,
    /// `:= value` part of a declaration.
    DefaultValue,
    /// `TYPE name IS ...`
    TypeDeclaration,
    /// `Process (...) { ... }`
    Process,
    /// `Function name (...) return T { ... }`
    Function,
    /// `[Label :] NewComponent Name (...)`, an instantiation site.
    NewComponent,
    /// `Connections (...)`, pin forwarding of the enclosing entity.
    Connections,
    /// `name => value` inside a port map or `Connections`.
    ConnectionMember,
    /// Missing right-hand side of `name =>` (auto-generate marker).
    EmptyName,
    /// Right-hand side of `name => value` or one call argument.
    Expression,
    /// Keyword block such as `If (...) { ... }`.
    Block,
    /// Any other statement terminated by `;`.
    Statement,
    /// Identifier that names a variable, signal, port or constant.
    VariableReference,
    /// `name(args)`: function call, conversion or indexing.
    FunctionCall,
    /// `.field` access on a record-typed expression.
    RecordMember,
}

impl SegmentKind {
    /// Kinds that open a declaration scope.
    pub fn is_scope(self) -> bool {
        matches!(
            self,
            Self::Root
                | Self::Component
                | Self::Main
                | Self::Package
                | Self::Process
                | Self::Function
        )
    }

    /// Kinds that are top-level entities (component-like).
    pub fn is_entity(self) -> bool {
        matches!(self, Self::Component | Self::Main)
    }
}

/// What a [`SegmentKind::VariableDeclaration`] declares.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Io,
    Generic,
    Signal,
    Constant,
    Variable,
    Parameter,
    RecordField,
    EnumMember,
}

impl VariableType {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Io => "IO",
            Self::Generic => "GENERIC",
            Self::Signal => "SIGNAL",
            Self::Constant => "CONSTANT",
            Self::Variable => "VARIABLE",
            Self::Parameter => "PARAMETER",
            Self::RecordField => "FIELD",
            Self::EnumMember => "LITERAL",
        }
    }
}

/// Token that joins a segment to its sibling or owner (`:`, `=>`, `:=`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatOperator {
    pub text: String,
    /// Byte offset of the operator token.
    pub offset: usize,
}

impl ConcatOperator {
    pub fn new(text: impl Into<String>, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// Instance label of a `NewComponent` (`Label : NewComponent ...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub offset: usize,
}

/// Declaration a reference was bound to by the Resolve phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    /// File owning the declaration.
    pub path: PathBuf,
    /// Declaration segment inside that file's tree.
    pub segment: SegmentId,
}

/// One node of the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Name or value text.
    pub name: String,
    /// Start byte offset (inclusive).
    pub offset: usize,
    /// End byte offset (exclusive).
    pub end_offset: usize,
    pub operator: Option<ConcatOperator>,
    /// Non-owning link to the enclosing segment.
    pub parent: Option<SegmentId>,
    pub children: Vec<SegmentId>,
    /// Parameter groups, e.g. a component's port list.
    pub parameters: Vec<Vec<SegmentId>>,
    pub variable_type: Option<VariableType>,
    pub label: Option<Label>,
    pub resolved: Option<SymbolRef>,
}

impl Segment {
    pub fn new(kind: SegmentKind, name: impl Into<String>, offset: usize, end_offset: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            offset,
            end_offset,
            operator: None,
            parent: None,
            children: Vec::new(),
            parameters: Vec::new(),
            variable_type: None,
            label: None,
            resolved: None,
        }
    }

    pub fn declaration(
        name: impl Into<String>,
        variable_type: VariableType,
        offset: usize,
        end_offset: usize,
    ) -> Self {
        let mut segment = Self::new(SegmentKind::VariableDeclaration, name, offset, end_offset);
        segment.variable_type = Some(variable_type);
        segment
    }

    pub fn with_operator(mut self, text: impl Into<String>, offset: usize) -> Self {
        self.operator = Some(ConcatOperator::new(text, offset));
        self
    }

    /// Case-insensitive name comparison (VHDP identifiers are case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Whether `offset` falls in the segment body.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end_offset
    }

    /// Whether `offset` falls in the operator token joining this segment.
    pub fn operator_contains(&self, offset: usize) -> bool {
        self.operator.as_ref().is_some_and(|op| op.contains(offset))
    }

    pub fn is_declaration_of(&self, variable_type: VariableType) -> bool {
        self.kind == SegmentKind::VariableDeclaration && self.variable_type == Some(variable_type)
    }

    /// Instance prefix for names generated from this instantiation.
    pub fn instance_name(&self) -> &str {
        self.label.as_ref().map_or(self.name.as_str(), |l| l.name.as_str())
    }

    /// First parameter group, empty when there is none.
    pub fn first_parameters(&self) -> &[SegmentId] {
        self.parameters.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Arena holding every segment of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    segments: Vec<Segment>,
}

impl SyntaxTree {
    /// Create a tree with a root segment spanning `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            segments: vec![Segment::new(SegmentKind::Root, "", 0, len)],
        }
    }

    pub fn root(&self) -> SegmentId {
        SegmentId(0)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.len() <= 1
    }

    pub fn get(&self, id: SegmentId) -> &Segment {
        &self.segments[id.index()]
    }

    pub fn try_get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.index())
    }

    pub fn get_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.segments[id.index()]
    }

    /// Allocate a segment owned by `parent` without listing it as a child
    /// (used for parameter-group members).
    pub fn alloc(&mut self, parent: SegmentId, mut segment: Segment) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        segment.parent = Some(parent);
        self.segments.push(segment);
        id
    }

    /// Allocate a segment and append it to `parent`'s children.
    pub fn push(&mut self, parent: SegmentId, segment: Segment) -> SegmentId {
        let id = self.alloc(parent, segment);
        self.segments[parent.index()].children.push(id);
        id
    }

    pub fn ids(&self) -> impl Iterator<Item = SegmentId> {
        (0..self.segments.len() as u32).map(SegmentId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, s)| (SegmentId(i as u32), s))
    }

    /// Parameter-group members followed by children.
    pub fn sub_segments(&self, id: SegmentId) -> impl Iterator<Item = SegmentId> + '_ {
        let segment = self.get(id);
        segment
            .parameters
            .iter()
            .flatten()
            .chain(segment.children.iter())
            .copied()
    }

    /// Ancestors of `id`, nearest first (excluding `id`).
    pub fn ancestors(&self, id: SegmentId) -> impl Iterator<Item = SegmentId> + '_ {
        std::iter::successors(self.get(id).parent, move |p| self.get(*p).parent)
    }

    /// Nearest ancestor-or-self of one of `kinds`.
    pub fn enclosing(&self, id: SegmentId, kinds: &[SegmentKind]) -> Option<SegmentId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|s| kinds.contains(&self.get(*s).kind))
    }

    /// Outermost ancestor-or-self of one of `kinds`.
    pub fn top_segment(&self, id: SegmentId, kinds: &[SegmentKind]) -> Option<SegmentId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|s| kinds.contains(&self.get(*s).kind))
            .last()
    }

    /// Deepest segment whose body or operator token covers `offset`.
    pub fn segment_at(&self, offset: usize) -> Option<SegmentId> {
        let mut current = self.root();
        if !self.get(current).contains(offset) {
            return None;
        }
        loop {
            // Sibling spans may overlap (`a, b : T` shares one clause), so the
            // tightest match wins.
            let next = self
                .sub_segments(current)
                .filter(|sub| {
                    let segment = self.get(*sub);
                    segment.contains(offset) || segment.operator_contains(offset)
                })
                .min_by_key(|sub| {
                    let segment = self.get(*sub);
                    let start = segment.operator.as_ref().map_or(segment.offset, |op| op.offset.min(segment.offset));
                    segment.end_offset.max(start + 1) - start
                });
            match next {
                Some(sub) => current = sub,
                None => return Some(current),
            }
        }
    }

    /// All segments below `id` in pre-order (excluding `id`).
    pub fn descendants(&self, id: SegmentId) -> Vec<SegmentId> {
        let mut out = Vec::new();
        let mut stack: Vec<SegmentId> = self.sub_segments(id).collect();
        stack.reverse();
        while let Some(next) = stack.pop() {
            out.push(next);
            let mut subs: Vec<SegmentId> = self.sub_segments(next).collect();
            subs.reverse();
            stack.extend(subs);
        }
        out
    }

    /// Declarations visible directly in scope `owner`: parameter-group
    /// declarations (looking through `Generic` blocks) and declaration children.
    pub fn declarations(&self, owner: SegmentId) -> Vec<SegmentId> {
        let mut out = Vec::new();
        for id in self.get(owner).parameters.iter().flatten() {
            match self.get(*id).kind {
                SegmentKind::VariableDeclaration => out.push(*id),
                SegmentKind::GenericBlock => out.extend(
                    self.get(*id)
                        .parameters
                        .iter()
                        .flatten()
                        .filter(|g| self.get(**g).kind == SegmentKind::VariableDeclaration),
                ),
                _ => {}
            }
        }
        for id in &self.get(owner).children {
            let segment = self.get(*id);
            match segment.kind {
                SegmentKind::VariableDeclaration => out.push(*id),
                SegmentKind::TypeDeclaration => out.extend(
                    segment
                        .children
                        .iter()
                        .filter(|c| self.get(**c).is_declaration_of(VariableType::EnumMember)),
                ),
                _ => {}
            }
        }
        out
    }

    /// Child of `id` joined by operator `op`.
    pub fn operator_child(&self, id: SegmentId, op: &str) -> Option<SegmentId> {
        self.get(id)
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).operator.as_ref().is_some_and(|o| o.text == op))
    }

    /// First child of the given kind.
    pub fn child_of_kind(&self, id: SegmentId, kind: SegmentKind) -> Option<SegmentId> {
        self.get(id)
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SyntaxTree, SegmentId, SegmentId, SegmentId) {
        let mut tree = SyntaxTree::new(40);
        let comp = tree.push(tree.root(), Segment::new(SegmentKind::Component, "Top", 0, 40));
        let decl = tree.alloc(comp, Segment::declaration("Q", VariableType::Io, 5, 20));
        tree.get_mut(comp).parameters.push(vec![decl]);
        let ty = tree.push(
            decl,
            Segment::new(SegmentKind::TypeUsage, "STD_LOGIC", 10, 19).with_operator(":", 7),
        );
        (tree, comp, decl, ty)
    }

    #[test]
    fn test_segment_at_finds_deepest() {
        let (tree, comp, decl, ty) = sample();
        assert_eq!(tree.segment_at(12), Some(ty));
        assert_eq!(tree.segment_at(5), Some(decl));
        // operator token of the type counts as part of the type segment
        assert_eq!(tree.segment_at(7), Some(ty));
        assert_eq!(tree.segment_at(30), Some(comp));
        assert_eq!(tree.segment_at(100), None);
    }

    #[test]
    fn test_parent_links_are_navigable() {
        let (tree, comp, decl, ty) = sample();
        let ancestors: Vec<_> = tree.ancestors(ty).collect();
        assert_eq!(ancestors, vec![decl, comp, tree.root()]);
        assert_eq!(tree.enclosing(ty, &[SegmentKind::Component]), Some(comp));
        assert_eq!(tree.declarations(comp), vec![decl]);
        assert_eq!(tree.operator_child(decl, ":"), Some(ty));
    }
}
