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

//! Resolve phase: bind references to declarations.
//!
//! Bindings are computed against an immutable view of the tree and applied
//! in one sweep afterwards, so lookups for one segment may freely consult
//! the bindings of others (a port-map member needs its instantiation's
//! component, a record member needs its base's type).

use crate::context::ProjectContext;
use crate::keywords;
use crate::segment::{SegmentId, SegmentKind, SymbolRef, SyntaxTree, VariableType};
use std::path::Path;

/// Fill `resolved` on every reference segment of `tree`.
pub(crate) fn resolve(tree: &mut SyntaxTree, path: &Path, project: &ProjectContext) -> usize {
    let bindings: Vec<(SegmentId, Option<SymbolRef>)> = {
        let resolver = Resolver {
            path,
            tree: &*tree,
            project,
        };
        tree.ids().map(|id| (id, resolver.binding(id))).collect()
    };
    let mut bound = 0;
    for (id, symbol) in bindings {
        bound += usize::from(symbol.is_some());
        tree.get_mut(id).resolved = symbol;
    }
    bound
}

struct Resolver<'a> {
    path: &'a Path,
    tree: &'a SyntaxTree,
    project: &'a ProjectContext,
}

impl<'a> Resolver<'a> {
    fn local(&self, segment: SegmentId) -> SymbolRef {
        SymbolRef {
            path: self.path.to_path_buf(),
            segment,
        }
    }

    fn tree_of(&self, path: &Path) -> Option<&'a SyntaxTree> {
        if path == self.path {
            Some(self.tree)
        } else {
            self.project.file(path).map(|ctx| &ctx.tree)
        }
    }

    fn binding(&self, id: SegmentId) -> Option<SymbolRef> {
        let segment = self.tree.get(id);
        match segment.kind {
            SegmentKind::VariableReference => self.variable(id, &segment.name),
            SegmentKind::FunctionCall => self.function_call(id, &segment.name),
            SegmentKind::TypeUsage => lookup_type(self.tree, self.path, id, &segment.name, self.project),
            SegmentKind::NewComponent => self.component(&segment.name),
            SegmentKind::ConnectionMember => self.connection_member(id),
            SegmentKind::RecordMember => self.record_member(id),
            _ => None,
        }
    }

    fn variable(&self, id: SegmentId, name: &str) -> Option<SymbolRef> {
        if let Some(decl) = lookup_local(self.tree, id, name) {
            return Some(self.local(decl));
        }
        if let Some(decl) = self.in_local_packages(|pkg| {
            self.tree
                .declarations(pkg)
                .into_iter()
                .find(|d| self.tree.get(*d).is_named(name))
        }) {
            return Some(self.local(decl));
        }
        self.project.global(name, self.path).cloned()
    }

    fn function_call(&self, id: SegmentId, name: &str) -> Option<SymbolRef> {
        // `arr(i)` indexes a declared array before it calls anything
        if let Some(decl) = lookup_local(self.tree, id, name) {
            return Some(self.local(decl));
        }
        let scopes = std::iter::once(id)
            .chain(self.tree.ancestors(id))
            .filter(|s| self.tree.get(*s).kind.is_scope());
        for scope in scopes {
            if let Some(function) = self.find_child(scope, SegmentKind::Function, name) {
                return Some(self.local(function));
            }
        }
        if let Some(function) = self.in_local_packages(|pkg| self.find_child(pkg, SegmentKind::Function, name)) {
            return Some(self.local(function));
        }
        self.project
            .function(name, self.path)
            .or_else(|| self.project.global(name, self.path))
            .cloned()
    }

    fn component(&self, name: &str) -> Option<SymbolRef> {
        let root = self.tree.root();
        if let Some(comp) = self.find_child(root, SegmentKind::Component, name) {
            return Some(self.local(comp));
        }
        self.project.component(name, self.path).cloned()
    }

    /// `name => value` binds `name` to a port or generic of the instantiated
    /// component, or, inside `Connections`, to an IO of the enclosing entity.
    fn connection_member(&self, id: SegmentId) -> Option<SymbolRef> {
        let segment = self.tree.get(id);
        let owner = self.tree.get(segment.parent?);
        match owner.kind {
            SegmentKind::NewComponent => {
                let component = self.component(&owner.name)?;
                let tree = self.tree_of(&component.path)?;
                let decl = tree.declarations(component.segment).into_iter().find(|d| {
                    let decl = tree.get(*d);
                    decl.is_named(&segment.name)
                        && matches!(decl.variable_type, Some(VariableType::Io | VariableType::Generic))
                })?;
                Some(SymbolRef {
                    path: component.path,
                    segment: decl,
                })
            }
            SegmentKind::Connections => {
                let entity = self
                    .tree
                    .enclosing(id, &[SegmentKind::Component, SegmentKind::Main])?;
                self.tree
                    .declarations(entity)
                    .into_iter()
                    .find(|d| {
                        let decl = self.tree.get(*d);
                        decl.is_named(&segment.name) && decl.variable_type == Some(VariableType::Io)
                    })
                    .map(|d| self.local(d))
            }
            _ => None,
        }
    }

    /// `.field` binds to the record field of the base expression's type.
    fn record_member(&self, id: SegmentId) -> Option<SymbolRef> {
        let segment = self.tree.get(id);
        let parent = segment.parent?;
        let siblings = &self.tree.get(parent).children;
        let index = siblings.iter().position(|s| *s == id)?;
        let base_decl = match index.checked_sub(1).map(|i| siblings[i]) {
            Some(prev) if self.tree.get(prev).kind == SegmentKind::RecordMember => self.record_member(prev)?,
            _ => self.binding(parent)?,
        };
        self.field_of(&base_decl, &segment.name)
    }

    fn field_of(&self, decl: &SymbolRef, field: &str) -> Option<SymbolRef> {
        let tree = self.tree_of(&decl.path)?;
        let usage = tree.child_of_kind(decl.segment, SegmentKind::TypeUsage)?;
        let record = lookup_type(tree, &decl.path, usage, &tree.get(usage).name, self.project)?;
        let record_tree = self.tree_of(&record.path)?;
        let found = record_tree.get(record.segment).children.iter().copied().find(|c| {
            let child = record_tree.get(*c);
            child.variable_type == Some(VariableType::RecordField) && child.is_named(field)
        })?;
        Some(SymbolRef {
            path: record.path,
            segment: found,
        })
    }

    fn find_child(&self, owner: SegmentId, kind: SegmentKind, name: &str) -> Option<SegmentId> {
        find_child(self.tree, owner, kind, name)
    }

    fn in_local_packages<F>(&self, f: F) -> Option<SegmentId>
    where
        F: FnMut(SegmentId) -> Option<SegmentId>,
    {
        let root = self.tree.root();
        self.tree
            .get(root)
            .children
            .iter()
            .copied()
            .filter(|c| self.tree.get(*c).kind == SegmentKind::Package)
            .find_map(f)
    }
}

fn find_child(tree: &SyntaxTree, owner: SegmentId, kind: SegmentKind, name: &str) -> Option<SegmentId> {
    tree.get(owner)
        .children
        .iter()
        .copied()
        .find(|c| tree.get(*c).kind == kind && tree.get(*c).is_named(name))
}

/// Nearest declaration named `name` visible from `from` (scope walk).
pub(crate) fn lookup_local(tree: &SyntaxTree, from: SegmentId, name: &str) -> Option<SegmentId> {
    std::iter::once(from)
        .chain(tree.ancestors(from))
        .filter(|s| tree.get(*s).kind.is_scope())
        .find_map(|scope| {
            tree.declarations(scope)
                .into_iter()
                .find(|d| tree.get(*d).is_named(name))
        })
}

/// Type named `name` as seen from segment `from` of the file at `path`.
fn lookup_type(
    tree: &SyntaxTree,
    path: &Path,
    from: SegmentId,
    name: &str,
    project: &ProjectContext,
) -> Option<SymbolRef> {
    if keywords::is_builtin_type(name) {
        return None;
    }
    let local = |segment| SymbolRef {
        path: path.to_path_buf(),
        segment,
    };
    let scopes = std::iter::once(from)
        .chain(tree.ancestors(from))
        .filter(|s| tree.get(*s).kind.is_scope());
    for scope in scopes {
        if let Some(ty) = find_child(tree, scope, SegmentKind::TypeDeclaration, name) {
            return Some(local(ty));
        }
    }
    let root = tree.root();
    let packaged = tree
        .get(root)
        .children
        .iter()
        .copied()
        .filter(|c| tree.get(*c).kind == SegmentKind::Package)
        .find_map(|pkg| find_child(tree, pkg, SegmentKind::TypeDeclaration, name));
    if let Some(ty) = packaged {
        return Some(local(ty));
    }
    project.type_declaration(name, path).cloned()
}
