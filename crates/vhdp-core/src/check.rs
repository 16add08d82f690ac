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

//! Check phase: semantic rules producing user-facing diagnostics.

use crate::diagnostic::{Diagnostic, Severity};
use crate::keywords;
use crate::line_index::LineIndex;
use crate::segment::{SegmentId, SegmentKind, SyntaxTree};
use std::collections::{HashMap, HashSet};

/// Everything a rule may look at.
pub struct CheckContext<'a> {
    pub text: &'a str,
    pub tree: &'a SyntaxTree,
    pub line_index: &'a LineIndex,
}

impl CheckContext<'_> {
    fn diagnostic(
        &self,
        severity: Severity,
        message: String,
        code: &'static str,
        start: usize,
        end: usize,
    ) -> Diagnostic {
        Diagnostic::new(
            severity,
            message,
            code,
            self.line_index.line_col(self.text, start),
            self.line_index.line_col(self.text, end),
        )
    }
}

/// Trait for check rules
pub trait CheckRule: Send + Sync {
    /// Rule identifier, used as the diagnostic code
    fn id(&self) -> &'static str;

    /// Rule description
    fn description(&self) -> &'static str;

    /// Run the rule on a resolved tree
    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic>;
}

/// Rules run by the default analyzer.
pub fn default_rules() -> Vec<Box<dyn CheckRule>> {
    vec![
        Box::new(UnknownComponentRule),
        Box::new(UnknownPortRule),
        Box::new(DuplicateDeclarationRule),
        Box::new(UnknownIdentifierRule),
        Box::new(UnknownTypeRule),
        Box::new(AutoConnectMarkerRule),
    ]
}

/// Span of an instantiation head (`Label : NewComponent Name`).
fn instance_head(ctx: &CheckContext<'_>, id: SegmentId) -> (usize, usize) {
    let segment = ctx.tree.get(id);
    let body = ctx.text.get(segment.offset..segment.end_offset).unwrap_or("");
    let head = body.find('(').unwrap_or(body.len());
    (segment.offset, segment.offset + body[..head].trim_end().len())
}

/// Rule: instantiated components must exist in the project
pub struct UnknownComponentRule;

impl CheckRule for UnknownComponentRule {
    fn id(&self) -> &'static str {
        "unknown-component"
    }

    fn description(&self) -> &'static str {
        "NewComponent must name a component declared in the project"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic> {
        ctx.tree
            .iter()
            .filter(|(_, s)| s.kind == SegmentKind::NewComponent && s.resolved.is_none() && !s.name.is_empty())
            .map(|(id, s)| {
                let (start, end) = instance_head(ctx, id);
                ctx.diagnostic(
                    Severity::Error,
                    format!("Unknown component '{}'", s.name),
                    self.id(),
                    start,
                    end,
                )
            })
            .collect()
    }
}

/// Rule: port-map members must name a port or generic of the component
pub struct UnknownPortRule;

impl CheckRule for UnknownPortRule {
    fn id(&self) -> &'static str {
        "unknown-port"
    }

    fn description(&self) -> &'static str {
        "Port-map members must name a port or generic of the instantiated component"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (_, instance) in ctx.tree.iter() {
            if instance.kind != SegmentKind::NewComponent || instance.resolved.is_none() {
                continue;
            }
            for member in instance.first_parameters() {
                let member = ctx.tree.get(*member);
                if member.kind == SegmentKind::ConnectionMember && member.resolved.is_none() {
                    diagnostics.push(ctx.diagnostic(
                        Severity::Error,
                        format!("Component '{}' has no port or generic '{}'", instance.name, member.name),
                        self.id(),
                        member.offset,
                        member.offset + member.name.len(),
                    ));
                }
            }
        }
        diagnostics
    }
}

/// Rule: no two declarations with the same name in one scope
pub struct DuplicateDeclarationRule;

impl CheckRule for DuplicateDeclarationRule {
    fn id(&self) -> &'static str {
        "duplicate-declaration"
    }

    fn description(&self) -> &'static str {
        "Names must be declared once per scope"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (scope, segment) in ctx.tree.iter() {
            if !segment.kind.is_scope() {
                continue;
            }
            let mut seen: HashMap<String, SegmentId> = HashMap::new();
            for decl in ctx.tree.declarations(scope) {
                let d = ctx.tree.get(decl);
                if seen.insert(d.name.to_ascii_lowercase(), decl).is_some() {
                    diagnostics.push(ctx.diagnostic(
                        Severity::Error,
                        format!("'{}' is already declared in this scope", d.name),
                        self.id(),
                        d.offset,
                        d.offset + d.name.len(),
                    ));
                }
            }
        }
        diagnostics
    }
}

/// Rule: identifiers must resolve to a declaration
pub struct UnknownIdentifierRule;

impl CheckRule for UnknownIdentifierRule {
    fn id(&self) -> &'static str {
        "unknown-identifier"
    }

    fn description(&self) -> &'static str {
        "Referenced names must be declared in scope or in the project"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic> {
        ctx.tree
            .iter()
            .filter(|(id, s)| {
                s.kind == SegmentKind::VariableReference
                    && s.resolved.is_none()
                    && !keywords::is_builtin(&s.name)
                    // right-hand sides of `Connections` name board pins
                    && ctx.tree.enclosing(*id, &[SegmentKind::Connections]).is_none()
            })
            .map(|(_, s)| {
                ctx.diagnostic(
                    Severity::Warning,
                    format!("Unknown identifier '{}'", s.name),
                    self.id(),
                    s.offset,
                    s.offset + s.name.len(),
                )
            })
            .collect()
    }
}

/// Rule: declared types must exist
pub struct UnknownTypeRule;

impl CheckRule for UnknownTypeRule {
    fn id(&self) -> &'static str {
        "unknown-type"
    }

    fn description(&self) -> &'static str {
        "Types must be built in or declared in the project"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic> {
        // `a, b : T` stores one copy of the type per name
        let mut seen = HashSet::new();
        ctx.tree
            .iter()
            .filter(|(_, s)| {
                s.kind == SegmentKind::TypeUsage
                    && s.resolved.is_none()
                    && seen.insert(s.offset)
                    && !keywords::is_builtin_type(&s.name)
            })
            .map(|(_, s)| {
                ctx.diagnostic(
                    Severity::Warning,
                    format!("Unknown type '{}'", s.name),
                    self.id(),
                    s.offset,
                    s.offset + s.name.len(),
                )
            })
            .collect()
    }
}

/// Rule: point out auto-generate markers so the user can run auto-connect
pub struct AutoConnectMarkerRule;

impl CheckRule for AutoConnectMarkerRule {
    fn id(&self) -> &'static str {
        "auto-connect"
    }

    fn description(&self) -> &'static str {
        "Empty port-map values can be generated with auto-connect"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Diagnostic> {
        ctx.tree
            .iter()
            .filter(|(_, s)| s.kind == SegmentKind::EmptyName)
            .filter_map(|(_, s)| {
                let member = ctx.tree.get(s.parent?);
                let in_instance = member
                    .parent
                    .is_some_and(|p| ctx.tree.get(p).kind == SegmentKind::NewComponent);
                in_instance.then(|| {
                    ctx.diagnostic(
                        Severity::Hint,
                        format!("'{}' is not connected; auto-connect can generate it", member.name),
                        self.id(),
                        member.offset,
                        member.end_offset,
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolver::resolve;
    use crate::ProjectContext;
    use std::path::Path;

    fn run(src: &str) -> Vec<Diagnostic> {
        let mut tree = parse(src).tree;
        resolve(&mut tree, Path::new("/p/x.vhdp"), &ProjectContext::empty());
        let index = LineIndex::new(src);
        let ctx = CheckContext {
            text: src,
            tree: &tree,
            line_index: &index,
        };
        default_rules().iter().flat_map(|r| r.check(&ctx)).collect()
    }

    fn codes(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_clean_file_has_no_diagnostics() {
        let src = "Component A (Q : OUT STD_LOGIC;) { SIGNAL s : STD_LOGIC; Q <= s; }";
        assert!(run(src).is_empty(), "{:?}", run(src));
    }

    #[test]
    fn test_unknown_component_spans_head() {
        let src = "Main () {\n  u : NewComponent Missing (a => b);\n}";
        let diags = run(src);
        assert_eq!(codes(&diags), vec!["unknown-component", "unknown-identifier"]);
        let d = &diags[0];
        assert_eq!((d.start.line, d.start.col), (1, 2));
        assert_eq!((d.end.line, d.end.col), (1, 26));
    }

    #[test]
    fn test_unknown_port_and_marker_hint() {
        let src = "Component C (Q : OUT STD_LOGIC;) { }\nMain () { NewComponent C (Q => , Z => ); }";
        let diags = run(src);
        assert!(codes(&diags).contains(&"unknown-port"));
        assert_eq!(codes(&diags).iter().filter(|c| **c == "auto-connect").count(), 2);
    }

    #[test]
    fn test_duplicates_and_unknown_types() {
        let src = "Main () { SIGNAL a : STD_LOGIC; SIGNAL A : my_t; }";
        let diags = run(src);
        assert_eq!(codes(&diags), vec!["duplicate-declaration", "unknown-type"]);
    }
}
