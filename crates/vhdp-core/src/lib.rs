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

//! Syntax model and analyzer interface for VHDP (VHDPlus) sources.
//!
//! This crate defines everything the editor-integration layer consumes from
//! the analyzer, plus a reference analyzer that implements it:
//!
//! - [`SyntaxTree`] / [`Segment`]: an arena of syntax segments with
//!   non-owning parent links, replaced wholesale on every analysis.
//! - [`AnalyzerMode`]: the set of phases (Indexing, Resolve, Check) a pass runs.
//! - [`AnalyzerContext`]: the result of analyzing one file.
//! - [`ProjectContext`]: a per-call snapshot of every known file context used
//!   for cross-file resolution.
//! - [`Analyzer`]: the seam the project orchestrator calls through.
//! - [`VhdpAnalyzer`]: the reference implementation (lexer, parser,
//!   resolver, checker).
//!
//! # Phases
//!
//! ```text
//! Indexing → parse one file, record its declarations
//! Resolve  → bind references against the file and the ProjectContext
//! Check    → run semantic rules, produce user-facing diagnostics
//! ```
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use vhdp_core::{Analyzer, AnalyzerMode, ProjectContext, VhdpAnalyzer};
//!
//! let analyzer = VhdpAnalyzer::new();
//! let source = "Component Blink\n(\n    LED : OUT STD_LOGIC;\n)\n{\n}\n";
//! let ctx = analyzer
//!     .analyze(Path::new("blink.vhdp"), source.into(), AnalyzerMode::FULL, &ProjectContext::empty())
//!     .unwrap();
//! assert!(ctx.component("blink").is_some());
//! ```

mod analyzer;
mod check;
mod context;
mod diagnostic;
mod error;
pub mod keywords;
pub mod lexer;
mod line_index;
mod mode;
mod parser;
mod resolver;
mod segment;

pub use analyzer::{Analyzer, VhdpAnalyzer, DEFAULT_MAX_SOURCE_LEN};
pub use check::{default_rules, CheckContext, CheckRule};
pub use context::{AnalyzerContext, ProjectContext};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{AnalyzerError, AnalyzerErrorKind, AnalyzerResult};
pub use line_index::{LineCol, LineIndex};
pub use mode::{AnalyzerMode, Phase};
pub use segment::{
    ConcatOperator, Label, Segment, SegmentId, SegmentKind, SymbolRef, SyntaxTree, VariableType,
};
