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

//! Error types for the project orchestration layer.

use crate::patcher::PatchError;
use std::path::PathBuf;
use thiserror::Error;
use vhdp_core::AnalyzerError;

/// Project-level error type.
///
/// Manifest variants are configuration errors and abort a workspace load;
/// the others are confined to the single path they name.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// No manifest in the workspace root.
    #[error("no *.{extension} project file in {}", root.display())]
    ManifestMissing { root: PathBuf, extension: &'static str },

    /// More than one manifest in the workspace root.
    #[error("{count} project files in {}, expected exactly one", root.display())]
    ManifestAmbiguous { root: PathBuf, count: usize },

    /// Manifest (or the root directory) could not be read.
    #[error("cannot read project file {}: {source}", path.display())]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest was read but could not be parsed.
    #[error("invalid project file {}: {message}", path.display())]
    ManifestInvalid { path: PathBuf, message: String },

    /// Structural operation before a workspace was loaded.
    #[error("no project loaded")]
    NotLoaded,

    /// Edit batch rejected by the change patcher.
    #[error("malformed edit batch for {}: {source}", path.display())]
    MalformedEdit {
        path: PathBuf,
        #[source]
        source: PatchError,
    },

    /// Source file exceeds the document size limit.
    #[error("{} is {size} bytes, limit is {max}", path.display())]
    TooLarge { path: PathBuf, size: usize, max: usize },

    /// IO error while reading a member file.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Analysis of a single file failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl ProjectError {
    /// Whether this error aborts a workspace load.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ManifestMissing { .. }
                | Self::ManifestAmbiguous { .. }
                | Self::ManifestUnreadable { .. }
                | Self::ManifestInvalid { .. }
        )
    }
}

/// Result type for project operations.
pub type ProjectResult<T> = Result<T, ProjectError>;

/// Failure of one analysis pass over one file.
///
/// The stored context of the file is left untouched whenever one of these
/// is returned.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The analyzer reported an error.
    #[error("analyzer failed: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// The analyzer panicked on the blocking pool.
    #[error("analyzer panicked on {}: {message}", path.display())]
    Panicked { path: PathBuf, message: String },

    /// Incremental pass requested for a file that was never analyzed.
    #[error("no analyzer context for {}", path.display())]
    MissingContext { path: PathBuf },

    /// Indexing requested for a path without a document snapshot.
    #[error("no document for {}", path.display())]
    MissingDocument { path: PathBuf },
}
