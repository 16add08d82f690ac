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

//! Tokenizer for VHDP sources.
//!
//! Produces a flat token list with byte spans. Comments (`--`, `//` and
//! `/* */`) and whitespace are skipped; the parser works on token spans and
//! slices names out of the source text.

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Ident,
    /// Numeric literal, including based literals like `16#FF#`.
    Number,
    /// String literal `"..."`.
    Str,
    /// Character literal `'0'`.
    Char,
    /// Punctuation or operator (`=>`, `:=`, `<=`, `(`, `;`, ...).
    Punct,
}

/// One token with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_punct(&self, source: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(source) == punct
    }

    pub fn is_keyword(&self, source: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source).eq_ignore_ascii_case(keyword)
    }
}

const TWO_CHAR_PUNCT: &[&str] = &["=>", ":=", "<=", ">=", "/=", "**"];

/// Split `source` into tokens.
///
/// Lexing never fails: unterminated strings and comments extend to the end of
/// the input, and unexpected characters become single punctuation tokens.
///
/// ```
/// use vhdp_core::lexer::{tokenize, TokenKind};
///
/// let src = "Q => NewCounter_Q, -- wire it\n";
/// let tokens = tokenize(src);
/// let texts: Vec<_> = tokens.iter().map(|t| t.text(src)).collect();
/// assert_eq!(texts, vec!["Q", "=>", "NewCounter_Q", ","]);
/// assert_eq!(tokens[1].kind, TokenKind::Punct);
/// ```
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line comments
        if (b == b'-' && bytes.get(i + 1) == Some(&b'-')) || (b == b'/' && bytes.get(i + 1) == Some(&b'/')) {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Block comments
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
            continue;
        }

        let start = i;
        let kind = if b.is_ascii_alphabetic() || b == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Ident
        } else if b.is_ascii_digit() {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.' | b'#'))
            {
                i += 1;
            }
            TokenKind::Number
        } else if b == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'\n' {
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            TokenKind::Str
        } else if b == b'\'' && bytes.get(i + 2) == Some(&b'\'') && bytes.get(i + 1).is_some_and(u8::is_ascii) {
            i += 3;
            TokenKind::Char
        } else if !b.is_ascii() {
            // Keep multi-byte characters whole so spans stay on char boundaries.
            let len = source[i..].chars().next().map_or(1, char::len_utf8);
            i += len;
            TokenKind::Punct
        } else {
            let two = source.get(i..i + 2).unwrap_or("");
            i += if TWO_CHAR_PUNCT.contains(&two) { 2 } else { 1 };
            TokenKind::Punct
        };

        tokens.push(Token { kind, start, end: i });
    }

    tokens
}
