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

//! Editable document handle used by code generation.
//!
//! Auto-connect writes into a document through [`EditableDocument`] rather
//! than returning text, so the same algorithm can drive an editor buffer or
//! the in-memory [`RopeDocument`] the server uses to compute workspace edits.
//!
//! Offsets are byte offsets into the UTF-8 text, the same unit the analyzer
//! uses for segment offsets.

use crate::constants::INDENT_UNIT;
use ropey::Rope;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// Rejected document edit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("edit {offset}..{end} is outside the document (length {len})")]
    OutOfRange { offset: usize, end: usize, len: usize },

    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },
}

/// A text buffer that supports grouped, undoable replacements.
pub trait EditableDocument {
    fn text(&self) -> String;

    /// Replace `len` bytes at `offset` with `text`.
    fn replace(&mut self, offset: usize, len: usize, text: &str) -> Result<(), EditError>;

    /// Zero-based line containing `offset`.
    fn line_of_offset(&self, offset: usize) -> usize;

    /// Re-indent the lines `start_line..=end_line` from bracket depth.
    fn indent_lines(&mut self, start_line: usize, end_line: usize) -> Result<(), EditError>;

    /// Open an edit group. Groups nest; edits inside the outermost group
    /// form one undo step.
    fn begin_update(&mut self);

    fn end_update(&mut self);
}

/// Closes the edit group it opened when dropped, including on early return.
pub struct UpdateGuard<'a, D: EditableDocument + ?Sized> {
    doc: &'a mut D,
}

impl<'a, D: EditableDocument + ?Sized> UpdateGuard<'a, D> {
    pub fn new(doc: &'a mut D) -> Self {
        doc.begin_update();
        Self { doc }
    }
}

impl<D: EditableDocument + ?Sized> Drop for UpdateGuard<'_, D> {
    fn drop(&mut self) {
        self.doc.end_update();
    }
}

impl<D: EditableDocument + ?Sized> Deref for UpdateGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.doc
    }
}

impl<D: EditableDocument + ?Sized> DerefMut for UpdateGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.doc
    }
}

/// One applied replacement, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
    pub offset: usize,
    pub len: usize,
    pub text: String,
}

/// In-memory document backed by a rope.
#[derive(Debug, Clone, Default)]
pub struct RopeDocument {
    rope: Rope,
    edits: Vec<DocumentEdit>,
    update_depth: usize,
    groups: usize,
}

impl RopeDocument {
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            ..Self::default()
        }
    }

    /// Replacements applied so far.
    pub fn edits(&self) -> &[DocumentEdit] {
        &self.edits
    }

    /// Number of currently open edit groups.
    pub fn update_depth(&self) -> usize {
        self.update_depth
    }

    /// Number of outermost edit groups closed so far.
    pub fn completed_groups(&self) -> usize {
        self.groups
    }

    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    fn char_index(&self, offset: usize) -> Result<usize, EditError> {
        let idx = self.rope.byte_to_char(offset);
        if self.rope.char_to_byte(idx) != offset {
            return Err(EditError::NotCharBoundary { offset });
        }
        Ok(idx)
    }
}

impl EditableDocument for RopeDocument {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn replace(&mut self, offset: usize, len: usize, text: &str) -> Result<(), EditError> {
        let end = offset.saturating_add(len);
        let doc_len = self.rope.len_bytes();
        if end > doc_len {
            return Err(EditError::OutOfRange {
                offset,
                end,
                len: doc_len,
            });
        }
        let start = self.char_index(offset)?;
        let stop = self.char_index(end)?;
        self.rope.remove(start..stop);
        self.rope.insert(start, text);
        self.edits.push(DocumentEdit {
            offset,
            len,
            text: text.to_string(),
        });
        Ok(())
    }

    fn line_of_offset(&self, offset: usize) -> usize {
        self.rope.byte_to_line(offset.min(self.rope.len_bytes()))
    }

    fn indent_lines(&mut self, start_line: usize, end_line: usize) -> Result<(), EditError> {
        let last = self.rope.len_lines().saturating_sub(1);
        if start_line > last {
            return Ok(());
        }
        let end_line = end_line.min(last);
        let text = self.rope.to_string();
        let depths = line_depths(&text);

        for line in (start_line..=end_line).rev() {
            let slice = self.rope.line(line);
            let content: String = slice.chars().collect();
            let body = content.trim_start_matches([' ', '\t']);
            if body.trim().is_empty() {
                continue;
            }
            let mut depth = depths.get(line).copied().unwrap_or(0);
            if body.starts_with([')', '}']) {
                depth = depth.saturating_sub(1);
            }
            let current = content.len() - body.len();
            let wanted = INDENT_UNIT.repeat(depth);
            if content[..current] != wanted {
                let offset = self.rope.line_to_byte(line);
                self.replace(offset, current, &wanted)?;
            }
        }
        Ok(())
    }

    fn begin_update(&mut self) {
        self.update_depth += 1;
    }

    fn end_update(&mut self) {
        if self.update_depth == 1 {
            self.groups += 1;
        }
        self.update_depth = self.update_depth.saturating_sub(1);
    }
}

/// Open bracket depth at the start of every line.
///
/// `--` comments, string literals and character literals such as `'('`
/// do not count.
pub fn line_depths(text: &str) -> Vec<usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut depths = vec![0];
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\n' => depths.push(depth),
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i + 1 < chars.len() && chars[i + 1] != '\n' {
                    i += 1;
                }
            }
            '"' => {
                i += 1;
                while i < chars.len() && chars[i] != '"' && chars[i] != '\n' {
                    i += 1;
                }
                if chars.get(i) == Some(&'\n') {
                    depths.push(depth);
                }
            }
            '\'' if chars.get(i + 2) == Some(&'\'') => i += 2,
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    depths
}
