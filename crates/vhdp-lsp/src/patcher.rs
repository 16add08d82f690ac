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

//! Change patcher: applies a batch of range edits to a document snapshot.
//!
//! Every edit in a batch is interpreted against the *original* document.
//! Positions are converted to byte offsets once, up front; edits are then
//! spliced into a single buffer in descending start order, so splicing one
//! edit never shifts the offsets of the edits still to be applied.
//!
//! A batch is validated completely before the buffer is touched: either all
//! edits apply, or the call fails and the caller keeps its previous snapshot.
//!
//! # Example
//!
//! ```
//! use tower_lsp::lsp_types::{Position, Range};
//! use vhdp_lsp::patcher::{apply_changes, TextChange};
//!
//! let edits = [
//!     TextChange::new(Range::new(Position::new(0, 0), Position::new(0, 1)), "X"),
//!     TextChange::new(Range::new(Position::new(1, 0), Position::new(1, 1)), "Y"),
//! ];
//! assert_eq!(apply_changes("abc\ndef\n", &edits).unwrap(), "Xbc\nYef\n");
//! ```

use thiserror::Error;
use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent};
use vhdp_core::LineIndex;

/// One range edit: replace `range` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub range: Range,
    pub text: String,
}

impl TextChange {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    /// Range edit carried by an LSP change event; `None` for full-text events.
    pub fn from_event(event: &TextDocumentContentChangeEvent) -> Option<Self> {
        event.range.map(|range| Self::new(range, event.text.clone()))
    }
}

/// Reasons a batch is rejected. Indices refer to positions in the input slice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("position {line}:{character} is outside the document")]
    OutOfRange { line: u32, character: u32 },

    #[error("edit {index} ends before it starts")]
    InvertedRange { index: usize },

    #[error("edits {first} and {second} overlap")]
    Overlap { first: usize, second: usize },
}

/// An edit resolved to byte offsets of the original document.
#[derive(Debug)]
struct Splice<'a> {
    index: usize,
    start: usize,
    end: usize,
    text: &'a str,
}

/// Apply `changes` to `document` as if each had been computed against the
/// original text.
///
/// Fails on positions outside the document or past the end of their line,
/// on ranges whose end precedes their start, and on overlapping ranges. Two
/// edits starting at the same offset are rejected as well: their relative
/// order would be ambiguous.
pub fn apply_changes(document: &str, changes: &[TextChange]) -> Result<String, PatchError> {
    let lines = LineIndex::new(document);
    let mut splices = Vec::with_capacity(changes.len());
    for (index, change) in changes.iter().enumerate() {
        let start = byte_offset(document, &lines, change.range.start)?;
        let end = byte_offset(document, &lines, change.range.end)?;
        if end < start {
            return Err(PatchError::InvertedRange { index });
        }
        splices.push(Splice {
            index,
            start,
            end,
            text: &change.text,
        });
    }

    splices.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    for pair in splices.windows(2) {
        let (later, earlier) = (&pair[0], &pair[1]);
        if earlier.end > later.start || earlier.start == later.start {
            return Err(PatchError::Overlap {
                first: earlier.index.min(later.index),
                second: earlier.index.max(later.index),
            });
        }
    }

    let removed: usize = splices.iter().map(|s| s.end - s.start).sum();
    let inserted: usize = splices.iter().map(|s| s.text.len()).sum();
    let mut buffer = String::with_capacity(document.len() - removed + inserted);
    buffer.push_str(document);
    for splice in &splices {
        buffer.replace_range(splice.start..splice.end, splice.text);
    }
    Ok(buffer)
}

/// Apply LSP change events in order, each relative to the text produced by
/// the previous one. A range-less event replaces the whole text.
///
/// All-or-nothing: the first failing event fails the call and no earlier
/// event is kept.
pub fn apply_events(document: &str, events: &[TextDocumentContentChangeEvent]) -> Result<String, PatchError> {
    let mut text = document.to_string();
    for event in events {
        text = match TextChange::from_event(event) {
            Some(change) => apply_changes(&text, std::slice::from_ref(&change))?,
            None => event.text.clone(),
        };
    }
    Ok(text)
}

/// Byte offset of `position` in `document`.
///
/// Columns count Unicode scalar values within the line; the line terminator
/// (`\n` or `\r\n`) is not part of the line, so the furthest valid column is
/// the line length.
fn byte_offset(document: &str, lines: &LineIndex, position: Position) -> Result<usize, PatchError> {
    let out_of_range = || PatchError::OutOfRange {
        line: position.line,
        character: position.character,
    };
    let line = position.line as usize;
    let start = lines.line_start(line).ok_or_else(out_of_range)?;
    let end = lines
        .line_start(line + 1)
        .map(|next| next - 1)
        .unwrap_or(document.len());
    let text = &document[start..end];
    let text = text.strip_suffix('\r').unwrap_or(text);
    let end = start + text.len();

    let column = position.character as usize;
    match text.char_indices().nth(column) {
        Some((within, _)) => Ok(start + within),
        None if text.chars().count() == column => Ok(end),
        None => Err(out_of_range()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextChange {
        TextChange::new(Range::new(Position::new(sl, sc), Position::new(el, ec)), text)
    }

    #[test]
    fn test_edits_use_original_offsets() {
        let edits = [change(0, 0, 0, 1, "X"), change(1, 0, 1, 1, "Y")];
        assert_eq!(apply_changes("abc\ndef\n", &edits).unwrap(), "Xbc\nYef\n");
        // input order does not matter
        let reversed = [edits[1].clone(), edits[0].clone()];
        assert_eq!(apply_changes("abc\ndef\n", &reversed).unwrap(), "Xbc\nYef\n");
    }

    #[test]
    fn test_growing_edit_does_not_shift_later_ones() {
        let edits = [change(0, 1, 0, 1, "1234567890"), change(0, 2, 0, 3, "Z")];
        assert_eq!(apply_changes("abcd", &edits).unwrap(), "a1234567890bZd");
    }

    #[test]
    fn test_multiline_replacement() {
        let edits = [change(0, 2, 2, 1, "-")];
        assert_eq!(apply_changes("ab\ncd\nef", &edits).unwrap(), "ab-f");
    }

    #[test]
    fn test_end_of_document_and_line_end() {
        let doc = "abc\ndef\n";
        assert_eq!(apply_changes(doc, &[change(2, 0, 2, 0, "g")]).unwrap(), "abc\ndef\ng");
        assert_eq!(apply_changes(doc, &[change(0, 3, 1, 0, "")]).unwrap(), "abcdef\n");
    }

    #[test]
    fn test_columns_count_characters() {
        let edits = [change(0, 1, 0, 2, "o")];
        assert_eq!(apply_changes("häs", &edits).unwrap(), "hos");
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let doc = "abc\ndef";
        assert_eq!(
            apply_changes(doc, &[change(5, 0, 5, 0, "x")]),
            Err(PatchError::OutOfRange { line: 5, character: 0 })
        );
        assert_eq!(
            apply_changes(doc, &[change(0, 4, 0, 4, "x")]),
            Err(PatchError::OutOfRange { line: 0, character: 4 })
        );
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert_eq!(
            apply_changes("abc", &[change(0, 2, 0, 1, "x")]),
            Err(PatchError::InvertedRange { index: 0 })
        );
    }

    #[test]
    fn test_overlap_is_rejected() {
        let edits = [change(0, 0, 0, 2, "x"), change(0, 1, 0, 3, "y")];
        assert_eq!(
            apply_changes("abcd", &edits),
            Err(PatchError::Overlap { first: 0, second: 1 })
        );

        let same_point = [change(0, 1, 0, 1, "x"), change(0, 1, 0, 1, "y")];
        assert!(matches!(apply_changes("abcd", &same_point), Err(PatchError::Overlap { .. })));
    }

    #[test]
    fn test_adjacent_edits_are_allowed() {
        let edits = [change(0, 0, 0, 2, "x"), change(0, 2, 0, 4, "y")];
        assert_eq!(apply_changes("abcd", &edits).unwrap(), "xy");
    }

    #[test]
    fn test_empty_batch_is_identity() {
        assert_eq!(apply_changes("abc", &[]).unwrap(), "abc");
    }

    #[test]
    fn test_crlf_terminator_is_not_a_column() {
        let doc = "ab\r\ncd";
        assert_eq!(apply_changes(doc, &[change(0, 2, 0, 2, "!")]).unwrap(), "ab!\r\ncd");
        assert_eq!(
            apply_changes(doc, &[change(0, 3, 0, 3, "x")]),
            Err(PatchError::OutOfRange { line: 0, character: 3 })
        );
        assert_eq!(apply_changes(doc, &[change(0, 1, 1, 1, "")]).unwrap(), "ad");
    }

    fn event(range: Option<Range>, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range,
            range_length: None,
            text: text.into(),
        }
    }

    #[test]
    fn test_events_apply_in_sequence() {
        let events = [
            event(Some(Range::new(Position::new(0, 0), Position::new(0, 1))), "xy"),
            // relative to "xybc"
            event(Some(Range::new(Position::new(0, 3), Position::new(0, 4))), "Z"),
        ];
        assert_eq!(apply_events("abc", &events).unwrap(), "xybZ");

        let replaced = [event(None, "new"), event(Some(Range::new(Position::new(0, 3), Position::new(0, 3))), "!")];
        assert_eq!(apply_events("old", &replaced).unwrap(), "new!");
    }

    #[test]
    fn test_failing_event_discards_earlier_ones() {
        let events = [
            event(Some(Range::new(Position::new(0, 0), Position::new(0, 4))), "Component"),
            event(Some(Range::new(Position::new(7, 0), Position::new(7, 1))), "x"),
        ];
        assert_eq!(
            apply_events("Main () { }\n", &events),
            Err(PatchError::OutOfRange { line: 7, character: 0 })
        );
    }

    #[test]
    fn test_from_event() {
        let full = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "all".into(),
        };
        assert!(TextChange::from_event(&full).is_none());

        let ranged = TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(0, 0), Position::new(0, 1))),
            range_length: None,
            text: "x".into(),
        };
        assert_eq!(TextChange::from_event(&ranged).unwrap().text, "x");
    }
}
