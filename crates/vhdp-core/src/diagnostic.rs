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

//! Diagnostic types produced by the analyzer.

use crate::line_index::LineCol;

/// Severity level for diagnostics
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational hint
    Hint,
    /// Warning - might be an issue
    Warning,
    /// Error - definitely an issue
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hint => write!(f, "hint"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic attached to a range of one file.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub start: LineCol,
    pub end: LineCol,
    /// Rule that produced the diagnostic (`syntax`, `unknown-component`, ...).
    pub code: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        code: impl Into<String>,
        start: LineCol,
        end: LineCol,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            start,
            end,
            code: code.into(),
        }
    }

    pub fn error(message: impl Into<String>, code: impl Into<String>, start: LineCol, end: LineCol) -> Self {
        Self::new(Severity::Error, message, code, start, end)
    }

    pub fn warning(message: impl Into<String>, code: impl Into<String>, start: LineCol, end: LineCol) -> Self {
        Self::new(Severity::Warning, message, code, start, end)
    }

    pub fn hint(message: impl Into<String>, code: impl Into<String>, start: LineCol, end: LineCol) -> Self {
        Self::new(Severity::Hint, message, code, start, end)
    }

    /// Whether the diagnostic range covers `pos` (end inclusive, so a cursor
    /// right after the last character still counts).
    pub fn covers(&self, pos: LineCol) -> bool {
        self.start <= pos && pos <= self.end
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}:{}: {} ({})",
            self.severity,
            self.start.line + 1,
            self.start.col + 1,
            self.message,
            self.code
        )
    }
}
