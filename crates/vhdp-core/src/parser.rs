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

//! Recursive-descent parser building the segment arena (Indexing phase).
//!
//! The parser never fails. Malformed input produces [`SyntaxError`]s and the
//! parser resynchronizes on `;`, `,`, `)` or braces, so the editor always gets
//! a tree to query.

use crate::keywords;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::segment::{Label, Segment, SegmentId, SegmentKind, SyntaxTree, VariableType};

/// Maximum brace nesting before the parser skips a block.
///
/// Each nested block costs a few recursive calls; this bound keeps hostile
/// inputs from exhausting the stack of the analysis worker.
const MAX_NESTING: usize = 256;

/// A problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

pub(crate) struct ParseOutput {
    pub tree: SyntaxTree,
    pub errors: Vec<SyntaxError>,
}

/// Parse a complete source file.
pub(crate) fn parse(source: &str) -> ParseOutput {
    let mut parser = Parser {
        source,
        tokens: tokenize(source),
        pos: 0,
        last_end: 0,
        nesting: 0,
        tree: SyntaxTree::new(source.len()),
        errors: Vec::new(),
    };
    parser.parse_file();
    ParseOutput {
        tree: parser.tree,
        errors: parser.errors,
    }
}

/// Where an expression run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Free statement: `;` or a brace.
    Statement,
    /// Item of a parenthesized list: `,` or the closing `)`.
    ListItem,
    /// Type inside a declaration list: also stops at `:=`.
    TypeInList,
    /// Type inside a declaration statement: `:=` or `;`.
    TypeInStatement,
    /// Call argument or port-map value.
    Argument,
}

impl Stop {
    fn at_close(self) -> bool {
        matches!(self, Stop::ListItem | Stop::TypeInList | Stop::Argument)
    }

    fn at_comma(self) -> bool {
        matches!(self, Stop::ListItem | Stop::TypeInList | Stop::Argument)
    }

    fn at_assign(self) -> bool {
        matches!(self, Stop::TypeInList | Stop::TypeInStatement)
    }

    fn for_default(self) -> Stop {
        match self {
            Stop::TypeInList => Stop::ListItem,
            Stop::TypeInStatement => Stop::Statement,
            other => other,
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// End offset of the most recently consumed token.
    last_end: usize,
    nesting: usize,
    tree: SyntaxTree,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    // ==================== Token helpers ====================

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        self.last_end = token.end;
        Some(token)
    }

    fn text(&self, token: Token) -> &'a str {
        token.text(self.source)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(self.source, punct))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(self.source, keyword))
    }

    fn at_ident(&self) -> bool {
        self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn eat_punct(&mut self, punct: &str) -> Option<Token> {
        if self.at_punct(punct) {
            self.bump()
        } else {
            None
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Option<Token> {
        let token = self.eat_punct(punct);
        if token.is_none() {
            self.error_here(format!("expected '{}'", punct));
        }
        token
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let (start, end) = match self.peek() {
            Some(t) => (t.start, t.end),
            None => (self.source.len(), self.source.len()),
        };
        self.errors.push(SyntaxError {
            message: message.into(),
            start,
            end,
        });
    }

    fn normalized(&self, start: usize, end: usize) -> String {
        self.source
            .get(start..end)
            .unwrap_or("")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Skip spaces and tabs (not newlines) starting at `offset`.
    fn skip_inline_space(&self, mut offset: usize) -> usize {
        let bytes = self.source.as_bytes();
        while offset < bytes.len() && matches!(bytes[offset], b' ' | b'\t') {
            offset += 1;
        }
        offset
    }

    fn attach(&mut self, owner: SegmentId, segment: Segment, as_child: bool) -> SegmentId {
        if as_child {
            self.tree.push(owner, segment)
        } else {
            self.tree.alloc(owner, segment)
        }
    }

    fn finish(&mut self, id: SegmentId) {
        let end = self.last_end;
        let segment = self.tree.get_mut(id);
        segment.end_offset = segment.end_offset.max(end);
    }

    // ==================== Items ====================

    fn parse_file(&mut self) {
        let root = self.tree.root();
        while self.peek().is_some() {
            if self.at_punct("}") {
                self.error_here("unmatched '}'");
                self.bump();
                continue;
            }
            self.parse_item(root);
        }
    }

    fn parse_body(&mut self, parent: SegmentId) {
        while self.peek().is_some() && !self.at_punct("}") {
            self.parse_item(parent);
        }
    }

    fn parse_braced_body(&mut self, owner: SegmentId) {
        if self.expect_punct("{").is_none() {
            return;
        }
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            self.error_here(format!("blocks nested deeper than {}", MAX_NESTING));
            self.skip_block();
        } else {
            self.parse_body(owner);
            self.expect_punct("}");
        }
        self.nesting -= 1;
        self.finish(owner);
    }

    /// Skip tokens up to and including the brace closing the current block.
    fn skip_block(&mut self) {
        let mut depth = 1usize;
        while let Some(token) = self.bump() {
            if token.is_punct(self.source, "{") {
                depth += 1;
            } else if token.is_punct(self.source, "}") {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    fn parse_item(&mut self, parent: SegmentId) {
        let Some(token) = self.peek() else {
            return;
        };
        if token.kind != TokenKind::Ident {
            if token.is_punct(self.source, ";") {
                self.bump();
            } else {
                self.parse_statement(parent);
            }
            return;
        }

        let next_is_paren = self
            .peek_at(1)
            .is_some_and(|t| t.is_punct(self.source, "("));
        match self.text(token).to_ascii_uppercase().as_str() {
            "COMPONENT" => self.parse_entity(parent, SegmentKind::Component),
            "MAIN" if next_is_paren => self.parse_entity(parent, SegmentKind::Main),
            "PACKAGE" => self.parse_package(parent),
            "SIGNAL" => self.parse_declaration_statement(parent, VariableType::Signal),
            "CONSTANT" => self.parse_declaration_statement(parent, VariableType::Constant),
            "VARIABLE" => self.parse_declaration_statement(parent, VariableType::Variable),
            "TYPE" => self.parse_type_declaration(parent),
            "PROCESS" => self.parse_process(parent),
            "FUNCTION" | "PROCEDURE" => self.parse_function(parent),
            "NEWCOMPONENT" => self.parse_new_component(parent, None, token.start),
            "CONNECTIONS" => self.parse_connections(parent),
            "INCLUDE" => {
                self.parse_include(parent, true);
                self.eat_punct(";");
            }
            _ if self.at_labelled_instance() => {
                let label = Label {
                    name: self.text(token).to_string(),
                    offset: token.start,
                };
                self.bump();
                self.bump();
                self.parse_new_component(parent, Some(label), token.start);
            }
            _ => self.parse_statement(parent),
        }
    }

    fn at_labelled_instance(&self) -> bool {
        self.peek_at(1).is_some_and(|t| t.is_punct(self.source, ":"))
            && self
                .peek_at(2)
                .is_some_and(|t| t.is_keyword(self.source, "NewComponent"))
    }

    /// `Component Name (decls) { body }` or `Main (decls) { body }`.
    fn parse_entity(&mut self, parent: SegmentId, kind: SegmentKind) {
        let Some(keyword) = self.bump() else {
            return;
        };
        let name = if kind == SegmentKind::Main {
            self.text(keyword).to_string()
        } else if self.at_ident() {
            let name = self.bump().map(|t| self.text(t)).unwrap_or_default();
            name.to_string()
        } else {
            self.error_here("expected component name");
            String::new()
        };
        let id = self
            .tree
            .push(parent, Segment::new(kind, name, keyword.start, self.last_end));

        if self.expect_punct("(").is_some() {
            let group = self.parse_declaration_list(id, VariableType::Io);
            self.tree.get_mut(id).parameters.push(group);
            self.expect_punct(")");
        }
        self.parse_braced_body(id);
        self.finish(id);
    }

    fn parse_package(&mut self, parent: SegmentId) {
        let Some(keyword) = self.bump() else {
            return;
        };
        let name = if self.at_ident() {
            self.bump().map(|t| self.text(t)).unwrap_or_default()
        } else {
            self.error_here("expected package name");
            ""
        };
        let id = self.tree.push(
            parent,
            Segment::new(SegmentKind::Package, name, keyword.start, self.last_end),
        );
        self.parse_braced_body(id);
        self.finish(id);
    }

    // ==================== Declarations ====================

    /// Declarations inside `( ... )` up to (not including) the closing paren.
    fn parse_declaration_list(&mut self, owner: SegmentId, variable_type: VariableType) -> Vec<SegmentId> {
        let mut group = Vec::new();
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Punct {
                match self.text(token) {
                    ")" | "{" | "}" => break,
                    ";" | "," => {
                        self.bump();
                    }
                    other => {
                        self.error_here(format!("unexpected '{}' in declaration list", other));
                        self.bump();
                    }
                }
                continue;
            }
            if token.is_keyword(self.source, "Include") {
                group.push(self.parse_include(owner, false));
            } else if token.is_keyword(self.source, "Generic")
                && self.peek_at(1).is_some_and(|t| t.is_punct(self.source, "("))
            {
                group.push(self.parse_generic_block(owner));
            } else if variable_type == VariableType::Parameter && token.is_keyword(self.source, "return") {
                self.parse_return_type(owner);
            } else {
                group.extend(self.parse_declaration(owner, variable_type, Stop::TypeInList, false));
            }
        }
        group
    }

    fn parse_generic_block(&mut self, owner: SegmentId) -> SegmentId {
        let start = self.peek().map_or(self.last_end, |t| t.start);
        self.bump();
        self.bump();
        let id = self.tree.alloc(
            owner,
            Segment::new(SegmentKind::GenericBlock, "Generic", start, self.last_end),
        );
        let group = self.parse_declaration_list(id, VariableType::Generic);
        self.tree.get_mut(id).parameters.push(group);
        self.expect_punct(")");
        self.finish(id);
        id
    }

    /// `SIGNAL a : T := v;` (and `CONSTANT` / `VARIABLE`).
    fn parse_declaration_statement(&mut self, parent: SegmentId, variable_type: VariableType) {
        self.bump();
        self.parse_declaration(parent, variable_type, Stop::TypeInStatement, true);
        if !self.at_punct("}") {
            self.expect_punct(";");
        } else {
            self.error_here("expected ';'");
        }
    }

    /// `name [, name] : [direction] type [:= default]`.
    ///
    /// Every name gets its own declaration segment; the type and default
    /// clause hang off the first one, later names carry a copy of the type.
    fn parse_declaration(
        &mut self,
        owner: SegmentId,
        variable_type: VariableType,
        stop: Stop,
        as_child: bool,
    ) -> Vec<SegmentId> {
        let mut names = Vec::new();
        loop {
            if !self.at_ident() {
                self.error_here("expected identifier");
                self.bump();
                break;
            }
            if let Some(token) = self.bump() {
                names.push(token);
            }
            if stop == Stop::TypeInStatement && self.eat_punct(",").is_some() {
                continue;
            }
            break;
        }
        let ids: Vec<SegmentId> = names
            .iter()
            .map(|t| {
                let segment = Segment::declaration(self.text(*t), variable_type, t.start, t.end);
                self.attach(owner, segment, as_child)
            })
            .collect();
        let Some(&decl) = ids.first() else {
            return ids;
        };

        let Some(colon) = self.eat_punct(":") else {
            self.error_here("expected ':'");
            return ids;
        };

        let mut has_direction = false;
        if let Some(token) = self.peek().filter(|t| t.kind == TokenKind::Ident) {
            if keywords::is_direction(self.text(token)) {
                self.bump();
                let direction = Segment::new(
                    SegmentKind::Direction,
                    self.text(token).to_ascii_uppercase(),
                    token.start,
                    token.end,
                )
                .with_operator(":", colon.start);
                self.tree.push(decl, direction);
                has_direction = true;
            }
        }

        let mut type_copy = None;
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => {
                self.bump();
                let mut usage = Segment::new(SegmentKind::TypeUsage, self.text(token), token.start, token.end);
                if !has_direction {
                    usage = usage.with_operator(":", colon.start);
                }
                let ty = self.tree.push(decl, usage);
                self.parse_expr_until(ty, stop);
                self.finish(ty);
                let mut copy = self.tree.get(ty).clone();
                copy.children.clear();
                copy.operator = None;
                type_copy = Some(copy);
            }
            _ => self.error_here("expected type"),
        }

        if let Some(assign) = self.eat_punct(":=") {
            let start = self.peek().map_or(assign.end, |t| t.start);
            let value = self.tree.push(
                decl,
                Segment::new(SegmentKind::DefaultValue, "", start, start).with_operator(":=", assign.start),
            );
            self.parse_expr_until(value, stop.for_default());
            self.finish(value);
            let text = self.normalized(start, self.tree.get(value).end_offset);
            self.tree.get_mut(value).name = text;
        }
        self.finish(decl);

        if let Some(copy) = type_copy {
            for id in ids.iter().skip(1) {
                self.tree.push(*id, copy.clone());
            }
        }
        ids
    }

    /// `TYPE name IS (A, B)`, `TYPE name IS RECORD ... END RECORD` or any other
    /// type definition up to `;`.
    fn parse_type_declaration(&mut self, parent: SegmentId) {
        let Some(keyword) = self.bump() else {
            return;
        };
        let name = if self.at_ident() {
            self.bump().map(|t| self.text(t)).unwrap_or_default()
        } else {
            self.error_here("expected type name");
            ""
        };
        let id = self.tree.push(
            parent,
            Segment::new(SegmentKind::TypeDeclaration, name, keyword.start, self.last_end),
        );
        if self.at_keyword("IS") {
            self.bump();
        } else {
            self.error_here("expected 'IS'");
        }

        if self.eat_punct("(").is_some() {
            loop {
                match self.peek() {
                    Some(t) if matches!(t.kind, TokenKind::Ident | TokenKind::Char) => {
                        self.bump();
                        let member = Segment::declaration(self.text(t), VariableType::EnumMember, t.start, t.end);
                        self.tree.push(id, member);
                    }
                    Some(t) if t.is_punct(self.source, ",") => {
                        self.bump();
                    }
                    Some(t) if t.is_punct(self.source, ")") => {
                        self.bump();
                        break;
                    }
                    _ => {
                        self.error_here("expected ')'");
                        break;
                    }
                }
            }
        } else if self.at_keyword("RECORD") {
            self.bump();
            loop {
                if self.at_keyword("END") {
                    self.bump();
                    if self.at_keyword("RECORD") {
                        self.bump();
                    }
                    break;
                }
                match self.peek() {
                    None => {
                        self.error_here("expected 'END RECORD'");
                        break;
                    }
                    Some(t) if t.is_punct(self.source, "}") => {
                        self.error_here("expected 'END RECORD'");
                        break;
                    }
                    Some(t) if t.kind == TokenKind::Ident => {
                        self.parse_declaration(id, VariableType::RecordField, Stop::TypeInStatement, true);
                    }
                    Some(_) => {
                        self.bump();
                    }
                }
            }
        } else {
            self.parse_expr_until(id, Stop::Statement);
        }
        self.expect_punct(";");
        self.finish(id);
    }

    fn parse_include(&mut self, owner: SegmentId, as_child: bool) -> SegmentId {
        let start = self.peek().map_or(self.last_end, |t| t.start);
        self.bump();
        let id = self.attach(
            owner,
            Segment::new(SegmentKind::Include, "Include", start, self.last_end),
            as_child,
        );
        if self.expect_punct("(").is_none() {
            return id;
        }
        loop {
            match self.peek() {
                None => break,
                Some(t) if t.is_punct(self.source, ")") => break,
                Some(t) if t.is_punct(self.source, "{") || t.is_punct(self.source, "}") => break,
                Some(t) if t.is_punct(self.source, ",") || t.is_punct(self.source, ";") => {
                    self.bump();
                }
                Some(t) => {
                    self.bump();
                    let mut end = t.end;
                    while self.eat_punct(".").is_some() {
                        end = self.last_end;
                        if let Some(part) = self.peek().filter(|p| p.kind == TokenKind::Ident) {
                            self.bump();
                            end = part.end;
                        } else {
                            break;
                        }
                    }
                    let name: String = self.source[t.start..end].split_whitespace().collect();
                    self.tree
                        .push(id, Segment::new(SegmentKind::PackageName, name, t.start, end));
                }
            }
        }
        self.expect_punct(")");
        self.finish(id);
        id
    }

    // ==================== Scopes ====================

    fn parse_process(&mut self, parent: SegmentId) {
        let Some(keyword) = self.bump() else {
            return;
        };
        let name = if self.at_ident() {
            self.bump().map(|t| self.text(t)).unwrap_or_default()
        } else {
            "Process"
        };
        let id = self.tree.push(
            parent,
            Segment::new(SegmentKind::Process, name, keyword.start, self.last_end),
        );
        if self.eat_punct("(").is_some() {
            self.parse_argument_list(id);
        }
        self.parse_braced_body(id);
        self.finish(id);
    }

    fn parse_function(&mut self, parent: SegmentId) {
        let Some(keyword) = self.bump() else {
            return;
        };
        let name = if self.at_ident() {
            self.bump().map(|t| self.text(t)).unwrap_or_default()
        } else {
            self.error_here("expected function name");
            ""
        };
        let id = self.tree.push(
            parent,
            Segment::new(SegmentKind::Function, name, keyword.start, self.last_end),
        );
        if self.eat_punct("(").is_some() {
            let group = self.parse_declaration_list(id, VariableType::Parameter);
            self.tree.get_mut(id).parameters.push(group);
            self.expect_punct(")");
        } else {
            self.tree.get_mut(id).parameters.push(Vec::new());
        }
        if self.at_keyword("return") {
            self.parse_return_type(id);
        }
        if self.at_punct("{") {
            self.parse_braced_body(id);
        } else {
            self.expect_punct(";");
        }
        self.finish(id);
    }

    fn parse_return_type(&mut self, owner: SegmentId) {
        let Some(keyword) = self.bump() else {
            return;
        };
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => {
                self.bump();
                let usage = Segment::new(SegmentKind::TypeUsage, self.text(t), t.start, t.end)
                    .with_operator("return", keyword.start);
                let ty = self.tree.push(owner, usage);
                self.parse_expr_until(ty, Stop::TypeInList);
                self.finish(ty);
            }
            _ => self.error_here("expected return type"),
        }
    }

    // ==================== Instantiations ====================

    /// `[Label :] NewComponent Name (member, ...)`.
    fn parse_new_component(&mut self, parent: SegmentId, label: Option<Label>, start: usize) {
        self.bump();
        let name = if self.at_ident() {
            self.bump().map(|t| self.text(t)).unwrap_or_default()
        } else {
            self.error_here("expected component name");
            ""
        };
        let mut segment = Segment::new(SegmentKind::NewComponent, name, start, self.last_end);
        segment.label = label;
        let id = self.tree.push(parent, segment);
        let members = if self.expect_punct("(").is_some() {
            self.parse_member_list(id)
        } else {
            Vec::new()
        };
        self.tree.get_mut(id).parameters.push(members);
        self.eat_punct(";");
        self.finish(id);
    }

    /// `Connections (name => pin, ...)`.
    fn parse_connections(&mut self, parent: SegmentId) {
        let Some(keyword) = self.bump() else {
            return;
        };
        let id = self.tree.push(
            parent,
            Segment::new(SegmentKind::Connections, "Connections", keyword.start, keyword.end),
        );
        let members = if self.expect_punct("(").is_some() {
            self.parse_member_list(id)
        } else {
            Vec::new()
        };
        self.tree.get_mut(id).parameters.push(members);
        self.eat_punct(";");
        self.finish(id);
    }

    /// Members after an opening paren, consuming the closing paren.
    fn parse_member_list(&mut self, owner: SegmentId) -> Vec<SegmentId> {
        let mut members = Vec::new();
        loop {
            match self.peek() {
                None => {
                    self.error_here("expected ')'");
                    break;
                }
                Some(t) if t.is_punct(self.source, ")") => {
                    self.bump();
                    break;
                }
                Some(t) if t.is_punct(self.source, ",") || t.is_punct(self.source, ";") => {
                    self.bump();
                }
                Some(t) if t.is_punct(self.source, "{") || t.is_punct(self.source, "}") => {
                    self.error_here("expected ')'");
                    break;
                }
                Some(t) => members.push(self.parse_connection_member(owner, t)),
            }
        }
        members
    }

    fn parse_connection_member(&mut self, owner: SegmentId, first: Token) -> SegmentId {
        let named = first.kind == TokenKind::Ident
            && self.peek_at(1).is_some_and(|t| t.is_punct(self.source, "=>"));
        if !named {
            let expr = self.tree.alloc(
                owner,
                Segment::new(SegmentKind::Expression, "", first.start, first.start),
            );
            self.parse_expr_until(expr, Stop::Argument);
            self.finish(expr);
            let text = self.normalized(first.start, self.tree.get(expr).end_offset);
            self.tree.get_mut(expr).name = text;
            return expr;
        }

        self.bump();
        let arrow_start = self.peek().map_or(self.last_end, |t| t.start);
        self.bump();
        let arrow_end = self.last_end;
        let id = self.tree.alloc(
            owner,
            Segment::new(SegmentKind::ConnectionMember, self.text(first), first.start, arrow_end),
        );

        let is_marker = match self.peek() {
            None => true,
            Some(t) => [",", ")", ";", "}"].iter().any(|p| t.is_punct(self.source, p)),
        };
        if is_marker {
            let offset = self.skip_inline_space(arrow_end);
            let marker = Segment::new(SegmentKind::EmptyName, "", offset, offset).with_operator("=>", arrow_start);
            self.tree.push(id, marker);
        } else {
            let start = self.peek().map_or(arrow_end, |t| t.start);
            let expr = self.tree.push(
                id,
                Segment::new(SegmentKind::Expression, "", start, start).with_operator("=>", arrow_start),
            );
            self.parse_expr_until(expr, Stop::Argument);
            self.finish(expr);
            let text = self.normalized(start, self.tree.get(expr).end_offset);
            self.tree.get_mut(expr).name = text;
            self.finish(id);
        }
        id
    }

    /// Comma-separated expressions after an opening paren, consuming the
    /// closing paren; each becomes an `Expression` parameter of `owner`.
    fn parse_argument_list(&mut self, owner: SegmentId) {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                None => {
                    self.error_here("expected ')'");
                    break;
                }
                Some(t) if t.is_punct(self.source, ")") => {
                    self.bump();
                    break;
                }
                Some(t) if t.is_punct(self.source, ",") => {
                    self.bump();
                }
                Some(t)
                    if t.is_punct(self.source, ";")
                        || t.is_punct(self.source, "{")
                        || t.is_punct(self.source, "}") =>
                {
                    self.error_here("expected ')'");
                    break;
                }
                Some(t) => {
                    let expr = self
                        .tree
                        .alloc(owner, Segment::new(SegmentKind::Expression, "", t.start, t.start));
                    self.parse_expr_until(expr, Stop::Argument);
                    self.finish(expr);
                    let text = self.normalized(t.start, self.tree.get(expr).end_offset);
                    self.tree.get_mut(expr).name = text;
                    args.push(expr);
                }
            }
        }
        self.tree.get_mut(owner).parameters.push(args);
    }

    // ==================== Statements & expressions ====================

    /// Statement up to `;`, or a block when a `{` follows.
    fn parse_statement(&mut self, parent: SegmentId) {
        let Some(first) = self.peek() else {
            return;
        };
        let before = self.pos;
        let name = if first.kind == TokenKind::Ident {
            self.text(first)
        } else {
            ""
        };
        let id = self.tree.push(
            parent,
            Segment::new(SegmentKind::Statement, name, first.start, first.end),
        );
        if first.kind == TokenKind::Ident
            && (keywords::is_block_keyword(name)
                || keywords::STATEMENT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name)))
        {
            self.bump();
        }
        self.parse_expr_until(id, Stop::Statement);

        match self.peek() {
            Some(t) if t.is_punct(self.source, ";") => {
                self.bump();
            }
            Some(t) if t.is_punct(self.source, "{") => {
                self.tree.get_mut(id).kind = SegmentKind::Block;
                self.parse_braced_body(id);
            }
            _ => self.error_here("expected ';'"),
        }
        if self.pos == before {
            self.bump();
        }
        self.finish(id);
    }

    fn parse_expr_until(&mut self, parent: SegmentId, stop: Stop) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Ident => self.parse_atom(parent),
                TokenKind::Punct => match self.text(token) {
                    "{" | "}" | ";" => return,
                    "(" => {
                        depth += 1;
                        self.bump();
                    }
                    ")" if depth == 0 => {
                        if stop.at_close() {
                            return;
                        }
                        self.error_here("unmatched ')'");
                        self.bump();
                    }
                    ")" => {
                        depth -= 1;
                        self.bump();
                    }
                    "," if depth == 0 && stop.at_comma() => return,
                    ":=" if depth == 0 && stop.at_assign() => return,
                    _ => {
                        self.bump();
                    }
                },
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Identifier inside an expression: variable reference (with `.field`
    /// chain), function call, or a skipped keyword/attribute/literal prefix.
    fn parse_atom(&mut self, parent: SegmentId) {
        let prev = self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)).copied();
        let Some(token) = self.bump() else {
            return;
        };
        let text = self.text(token);

        if prev.is_some_and(|p| p.is_punct(self.source, "'")) {
            return;
        }
        if self
            .peek()
            .is_some_and(|n| n.kind == TokenKind::Str && n.start == token.end)
        {
            self.bump();
            return;
        }
        if keywords::is_operator_word(text) || keywords::is_direction(text) || keywords::is_block_keyword(text) {
            return;
        }

        let source = self.source;
        let operator = prev.filter(|p| {
            p.kind == TokenKind::Punct && matches!(p.text(source), "<=" | ":=" | "=>")
        });
        let with_operator = |segment: Segment| match operator {
            Some(op) => segment.with_operator(op.text(source), op.start),
            None => segment,
        };

        if self.at_punct("(") {
            let call = self.tree.push(
                parent,
                with_operator(Segment::new(SegmentKind::FunctionCall, text, token.start, token.end)),
            );
            self.bump();
            self.parse_argument_list(call);
            self.finish(call);
            return;
        }

        let var = self.tree.push(
            parent,
            with_operator(Segment::new(SegmentKind::VariableReference, text, token.start, token.end)),
        );
        while self.at_punct(".")
            && self
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::Ident)
        {
            let Some(dot) = self.bump() else { break };
            let Some(field) = self.bump() else { break };
            let member = Segment::new(SegmentKind::RecordMember, self.text(field), field.start, field.end)
                .with_operator(".", dot.start);
            self.tree.push(var, member);
        }
        self.finish(var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_named(tree: &SyntaxTree, kind: SegmentKind) -> Vec<String> {
        tree.iter()
            .filter(|(_, s)| s.kind == kind)
            .map(|(_, s)| s.name.clone())
            .collect()
    }

    const COUNTER: &str = "Component Counter
(
    Generic
    (
        N : INTEGER := 8;
    );
    Q : OUT STD_LOGIC_VECTOR(N-1 downto 0);
)
{
    SIGNAL count : NATURAL range 0 to 255 := 0;
    Process ()
    {
        count <= count + 1;
    }
}
";

    #[test]
    fn test_component_with_generics_and_ports() {
        let out = parse(COUNTER);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let tree = &out.tree;
        let comp = tree.get(tree.root()).children[0];
        assert_eq!(tree.get(comp).kind, SegmentKind::Component);
        assert_eq!(tree.get(comp).name, "Counter");

        let decls = tree.declarations(comp);
        let names: Vec<_> = decls.iter().map(|d| tree.get(*d).name.as_str()).collect();
        assert_eq!(names, vec!["N", "Q", "count"]);
        assert_eq!(tree.get(decls[0]).variable_type, Some(VariableType::Generic));
        assert_eq!(tree.get(decls[1]).variable_type, Some(VariableType::Io));

        let q = decls[1];
        let dir = tree.child_of_kind(q, SegmentKind::Direction).map(|d| tree.get(d).name.clone());
        assert_eq!(dir.as_deref(), Some("OUT"));
        let ty = tree.child_of_kind(q, SegmentKind::TypeUsage).map(|t| tree.get(t).name.clone());
        assert_eq!(ty.as_deref(), Some("STD_LOGIC_VECTOR"));
        assert_eq!(&COUNTER[tree.get(q).offset..tree.get(q).end_offset], "Q : OUT STD_LOGIC_VECTOR(N-1 downto 0)");

        let default = tree.child_of_kind(decls[0], SegmentKind::DefaultValue).map(|d| tree.get(d).name.clone());
        assert_eq!(default.as_deref(), Some("8"));
    }

    #[test]
    fn test_new_component_with_markers() {
        let src = "Main\n(\n)\n{\n    NewCounter : NewComponent Counter\n    (\n        Q => ,\n        N =>\n    );\n}\n";
        let out = parse(src);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let tree = &out.tree;
        let inst = tree
            .iter()
            .find(|(_, s)| s.kind == SegmentKind::NewComponent)
            .map(|(id, _)| id)
            .expect("instantiation");
        let segment = tree.get(inst);
        assert_eq!(segment.name, "Counter");
        assert_eq!(segment.instance_name(), "NewCounter");
        assert_eq!(segment.offset, src.find("NewCounter").unwrap());

        let members = segment.first_parameters();
        assert_eq!(members.len(), 2);
        for member in members {
            let marker = tree.get(*member).children[0];
            let marker = tree.get(marker);
            assert_eq!(marker.kind, SegmentKind::EmptyName);
            assert_eq!(marker.operator.as_ref().map(|o| o.text.as_str()), Some("=>"));
        }
        // `Q => ,` marker sits on the comma, `N =>` marker at the arrow end
        let q_marker = tree.get(tree.get(members[0]).children[0]);
        assert_eq!(&src[q_marker.offset..q_marker.offset + 1], ",");
    }

    #[test]
    fn test_expressions_record_members_and_calls() {
        let src = "Main () { x <= to_integer(cfg.width) + y.a.b; }";
        let out = parse(src);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let tree = &out.tree;
        assert_eq!(kinds_named(tree, SegmentKind::FunctionCall), vec!["to_integer"]);
        assert_eq!(kinds_named(tree, SegmentKind::VariableReference), vec!["x", "cfg", "y"]);
        assert_eq!(kinds_named(tree, SegmentKind::RecordMember), vec!["width", "a", "b"]);

        let x = tree
            .iter()
            .find(|(_, s)| s.name == "to_integer")
            .map(|(_, s)| s.operator.clone());
        assert_eq!(x.flatten().map(|o| o.text), Some("<=".to_string()));
    }

    #[test]
    fn test_types_and_enums() {
        let src = "Package Defs {\n  TYPE state_t IS (Idle, Run);\n  TYPE cfg_t IS RECORD\n    width : NATURAL;\n    en : STD_LOGIC;\n  END RECORD;\n}";
        let out = parse(src);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let tree = &out.tree;
        assert_eq!(kinds_named(tree, SegmentKind::TypeDeclaration), vec!["state_t", "cfg_t"]);
        let fields: Vec<_> = tree
            .iter()
            .filter(|(_, s)| s.variable_type == Some(VariableType::RecordField))
            .map(|(_, s)| s.name.clone())
            .collect();
        assert_eq!(fields, vec!["width", "en"]);
        let package = tree.get(tree.root()).children[0];
        let enum_names: Vec<_> = tree
            .declarations(package)
            .iter()
            .map(|d| tree.get(*d).name.clone())
            .collect();
        assert_eq!(enum_names, vec!["Idle", "Run"]);
    }

    #[test]
    fn test_recovers_from_errors() {
        let src = "Component Broken ( a : ; ) { SIGNAL s STD_LOGIC; x <= 1 }";
        let out = parse(src);
        assert!(!out.errors.is_empty());
        // tree is still usable
        assert_eq!(kinds_named(&out.tree, SegmentKind::Component), vec!["Broken"]);
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let depth = MAX_NESTING + 10;
        let src = format!("Main () {}{}", "If (a) {".repeat(depth), "}".repeat(depth + 1));
        let out = parse(&src);
        assert!(out.errors.iter().any(|e| e.message.contains("nested")));
    }
}
