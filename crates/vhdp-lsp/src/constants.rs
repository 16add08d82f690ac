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

//! LSP constants and magic number definitions.
//!
//! This module centralizes the tuning values and protocol strings used
//! throughout the server, with the rationale for each value.
//!
//! # Organization
//!
//! Constants are organized by category:
//! - **Timing**: Watcher drain interval, edit debounce delay
//! - **Memory Limits**: Document size constraints
//! - **Project Layout**: File extensions recognized in a workspace
//! - **LSP Protocol**: Diagnostic source, command identifiers
//! - **Code Generation**: Indentation used by synthesized text

// ============================================================================
// Timing
// ============================================================================

/// Interval at which pending filesystem events are drained (in milliseconds).
///
/// **Rationale**: Editors and version-control tools write files in bursts
/// (temp file, rename, chmod). 300ms is long enough to collapse such a burst
/// into one structural operation per path, and short enough that a file
/// created from a terminal shows up in the project before the user switches
/// back to the editor.
///
/// **Trade-offs**:
/// - Lower values (50-100ms): bursts get split, causing redundant re-indexing
/// - Higher values (1s+): noticeable delay before new files resolve
pub const WATCH_INTERVAL_MS: u64 = 300;

/// Debounce delay for analysis after an edit (in milliseconds).
///
/// **Rationale**: Typing produces a change notification per keystroke. A
/// full Index/Resolve/Check pass per keystroke wastes work on text that is
/// replaced a moment later. 200ms sits below the point where diagnostics
/// feel delayed while collapsing a typing burst into one pass.
///
/// **Trade-offs**:
/// - Lower values (50-100ms): more passes while typing
/// - Higher values (500ms+): diagnostics lag behind the text
pub const DEBOUNCE_MS: u64 = 200;

// ============================================================================
// Memory Limits
// ============================================================================

/// Bytes per megabyte (1024 * 1024).
pub const BYTES_PER_MEGABYTE: usize = 1024 * 1024;

/// Default maximum document size in bytes (8 MB).
///
/// **Rationale**: Hardware description sources are small; the largest
/// generated netlists seen in VHDP projects stay well under 1 MB. Files above
/// this limit are almost always vendor IP dumps that cannot be analyzed
/// usefully and would stall the blocking pool.
///
/// **Trade-offs**:
/// - Larger limits allow bigger files but keep a worker busy for seconds
/// - Smaller limits risk rejecting legitimately large packages
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 8 * BYTES_PER_MEGABYTE;

// ============================================================================
// Project Layout
// ============================================================================

/// Extension of VHDP source files (without the dot).
///
/// Only files with this extension take part in the Index/Resolve/Check
/// pipeline; other project members (constraints, VHDL) are ignored.
pub const SOURCE_EXTENSION: &str = "vhdp";

/// Extension of the project manifest located in the workspace root.
pub const MANIFEST_EXTENSION: &str = "fpgaproj";

// ============================================================================
// LSP Protocol Constants
// ============================================================================

/// `source` field of every published diagnostic.
pub const DIAGNOSTIC_SOURCE: &str = "vhdp";

/// Command identifier of the auto-connect synthesizer.
///
/// Arguments: `[uri, position]` of the instantiation under the cursor.
pub const AUTO_CONNECT_COMMAND: &str = "vhdp.autoConnect";

// ============================================================================
// Code Generation
// ============================================================================

/// One indentation level of synthesized code.
///
/// **Rationale**: The VHDPlus IDE templates indent with four spaces; using
/// the same unit keeps generated declarations aligned with hand-written ones.
pub const INDENT_UNIT: &str = "    ";
