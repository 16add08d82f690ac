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

//! Project manifest (`*.fpgaproj`) and member-file discovery.
//!
//! The manifest is a JSON file in the workspace root:
//!
//! ```json
//! {
//!   "Include": ["src/**", "libraries/*.vhdp"],
//!   "Exclude": ["src/old/**"],
//!   "TopEntity": "src/Top.vhdp"
//! }
//! ```
//!
//! Every field is optional. An empty include list includes the whole
//! workspace; exclusion always wins over inclusion. Patterns are matched
//! against the path relative to the workspace root with `/` separators, and
//! a pattern matching a directory covers everything below it.

use crate::constants::{MANIFEST_EXTENSION, SOURCE_EXTENSION};
use crate::error::{ProjectError, ProjectResult};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Deserialized manifest content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Manifest {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub top_entity: Option<String>,
}

/// A loaded project: workspace root, manifest and compiled inclusion rules.
#[derive(Debug, Clone)]
pub struct ProjectRoot {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl ProjectRoot {
    /// Path of the single manifest directly inside `root`.
    pub fn locate(root: &Path) -> ProjectResult<PathBuf> {
        let entries = std::fs::read_dir(root).map_err(|source| ProjectError::ManifestUnreadable {
            path: root.to_path_buf(),
            source,
        })?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_extension(path, MANIFEST_EXTENSION))
            .collect();
        found.sort();
        match found.len() {
            0 => Err(ProjectError::ManifestMissing {
                root: root.to_path_buf(),
                extension: MANIFEST_EXTENSION,
            }),
            1 => Ok(found.remove(0)),
            count => Err(ProjectError::ManifestAmbiguous {
                root: root.to_path_buf(),
                count,
            }),
        }
    }

    /// Locate, read and parse the manifest of the workspace at `root`.
    pub fn load(root: &Path) -> ProjectResult<Self> {
        let manifest_path = Self::locate(root)?;
        let content = std::fs::read_to_string(&manifest_path).map_err(|source| {
            ProjectError::ManifestUnreadable {
                path: manifest_path.clone(),
                source,
            }
        })?;
        // An empty project file is a valid project with default rules.
        let manifest = if content.trim().is_empty() {
            Manifest::default()
        } else {
            serde_json::from_str(&content).map_err(|e| ProjectError::ManifestInvalid {
                path: manifest_path.clone(),
                message: e.to_string(),
            })?
        };
        debug!(
            "Loaded project file {} ({} include, {} exclude rules)",
            manifest_path.display(),
            manifest.include.len(),
            manifest.exclude.len()
        );
        Self::from_manifest(root, manifest_path, manifest)
    }

    /// Build a project root from an already parsed manifest.
    pub fn from_manifest(root: &Path, manifest_path: PathBuf, manifest: Manifest) -> ProjectResult<Self> {
        let compile = |patterns: &[String]| -> ProjectResult<Vec<Pattern>> {
            patterns
                .iter()
                .map(|p| {
                    Pattern::new(p.trim_start_matches("./").trim_end_matches('/')).map_err(|e| {
                        ProjectError::ManifestInvalid {
                            path: manifest_path.clone(),
                            message: format!("bad pattern '{}': {}", p, e),
                        }
                    })
                })
                .collect()
        };
        let include = compile(&manifest.include)?;
        let exclude = compile(&manifest.exclude)?;
        Ok(Self {
            root: root.to_path_buf(),
            manifest_path,
            manifest,
            include,
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Absolute path of the top entity, when the manifest names one.
    pub fn top_entity(&self) -> Option<PathBuf> {
        self.manifest.top_entity.as_ref().map(|p| self.root.join(p))
    }

    /// Whether `path` is a member of the project according to the
    /// inclusion rules. Paths outside the root never are.
    pub fn is_path_included(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        if self.exclude.iter().any(|p| matches_path_or_parent(p, relative)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| matches_path_or_parent(p, relative))
    }

    /// Whether `path` has the VHDP source extension.
    pub fn is_source_file(path: &Path) -> bool {
        has_extension(path, SOURCE_EXTENSION)
    }

    /// Every included file below the root, sorted. Hidden directories are
    /// skipped.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path != &self.manifest_path && self.is_path_included(path))
            .collect();
        files.sort();
        files
    }

    /// Included files with the VHDP source extension.
    pub fn source_files(&self) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|path| Self::is_source_file(path))
            .collect()
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn matches_path_or_parent(pattern: &Pattern, relative: &Path) -> bool {
    relative
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| pattern.matches_with(&p.to_string_lossy().replace('\\', "/"), MATCH_OPTIONS))
}
