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

//! Utility functions for safe string handling and position conversion.

use tower_lsp::lsp_types::{Position, Range};
use vhdp_core::LineCol;

/// Safely get a string slice up to a byte position, ensuring UTF-8 character boundaries.
///
/// If the requested position falls in the middle of a multi-byte character,
/// it rounds down to the nearest valid character boundary.
///
/// # Example
///
/// ```
/// use vhdp_lsp::utils::safe_slice_to;
///
/// let s = "SIGNAL ä : BIT";
/// assert_eq!(safe_slice_to(s, 7), "SIGNAL ");
/// // Position 8 would be mid-character, so it rounds down to 7
/// assert_eq!(safe_slice_to(s, 8), "SIGNAL ");
/// ```
pub fn safe_slice_to(s: &str, pos: usize) -> &str {
    if pos >= s.len() {
        return s;
    }
    &s[..floor_boundary(s, pos)]
}

/// Safely get a string slice from a byte position, ensuring UTF-8 character boundaries.
///
/// # Example
///
/// ```
/// use vhdp_lsp::utils::safe_slice_from;
///
/// let s = "SIGNAL ä : BIT";
/// assert_eq!(safe_slice_from(s, 7), "ä : BIT");
/// assert_eq!(safe_slice_from(s, 8), "ä : BIT");
/// ```
pub fn safe_slice_from(s: &str, pos: usize) -> &str {
    if pos >= s.len() {
        return "";
    }
    &s[floor_boundary(s, pos)..]
}

fn floor_boundary(s: &str, mut pos: usize) -> usize {
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Identifier characters immediately before `offset`.
pub fn word_before(s: &str, offset: usize) -> &str {
    let head = safe_slice_to(s, offset);
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map_or(head.len(), |(i, _)| i);
    &head[start..]
}

/// LSP position to analyzer line/column.
pub fn to_line_col(position: Position) -> LineCol {
    LineCol::new(position.line, position.character)
}

/// Analyzer line/column to LSP position.
pub fn to_position(pos: LineCol) -> Position {
    Position::new(pos.line, pos.col)
}

pub fn to_range(start: LineCol, end: LineCol) -> Range {
    Range::new(to_position(start), to_position(end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_slice_to_ascii() {
        let s = "Hello, World!";
        assert_eq!(safe_slice_to(s, 5), "Hello");
        assert_eq!(safe_slice_to(s, 0), "");
        assert_eq!(safe_slice_to(s, 100), s);
    }

    #[test]
    fn test_safe_slice_from_utf8() {
        let s = "Hello 世界"; // "世" is 3 bytes at position 6
        assert_eq!(safe_slice_from(s, 6), "世界");
        assert_eq!(safe_slice_from(s, 7), "世界");
        assert_eq!(safe_slice_from(s, 9), "界");
        assert_eq!(safe_slice_from(s, 100), "");
    }

    #[test]
    fn test_word_before() {
        let s = "  count <= cou";
        assert_eq!(word_before(s, s.len()), "cou");
        assert_eq!(word_before(s, 2), "");
        assert_eq!(word_before("a.b", 2), "");
        assert_eq!(word_before("x_1", 3), "x_1");
    }

    #[test]
    fn test_position_conversion() {
        let pos = Position::new(3, 7);
        assert_eq!(to_position(to_line_col(pos)), pos);
        let range = to_range(LineCol::new(1, 0), LineCol::new(1, 4));
        assert_eq!(range.end.character, 4);
    }
}
