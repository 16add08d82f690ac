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

//! Error types for VHDP analysis.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The kind of failure an analysis pass ran into.
///
/// Syntax problems are not failures: they are reported as diagnostics on the
/// resulting context. These kinds describe passes that produced no context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerErrorKind {
    /// Source exceeds the configured size limit.
    Limit,
    /// The pass needs a context that was never indexed.
    NotIndexed,
    /// Internal invariant violated while building the tree.
    Internal,
}

impl fmt::Display for AnalyzerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "LimitError"),
            Self::NotIndexed => write!(f, "NotIndexedError"),
            Self::Internal => write!(f, "InternalError"),
        }
    }
}

/// An analysis pass that failed for one file.
#[derive(Debug, Clone, Error)]
#[error("{kind} in {}: {message}", path.display())]
pub struct AnalyzerError {
    /// The kind of error.
    pub kind: AnalyzerErrorKind,
    /// File being analyzed.
    pub path: PathBuf,
    /// Human-readable error message.
    pub message: String,
}

impl AnalyzerError {
    /// Create a new error.
    pub fn new(kind: AnalyzerErrorKind, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn limit(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::Limit, path, message)
    }

    pub fn not_indexed(path: impl Into<PathBuf>) -> Self {
        Self::new(
            AnalyzerErrorKind::NotIndexed,
            path,
            "incremental pass requested before the file was indexed",
        )
    }

    pub fn internal(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(AnalyzerErrorKind::Internal, path, message)
    }
}

/// Result type for analyzer operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
