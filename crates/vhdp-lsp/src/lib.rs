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

//! VHDP Language Server Protocol (LSP) Implementation
//!
//! This crate connects the VHDP analyzer to editors: it keeps a snapshot of
//! every project file, runs the Index/Resolve/Check pipeline across the
//! project and answers editor queries from the results.
//!
//! # Features
//!
//! - **Diagnostics**: Project-wide errors and warnings after every Check pass
//! - **Autocomplete**: Ports, signals, components, types and record fields
//! - **Hover**: Declarations, component interfaces and diagnostics under the cursor
//! - **Signature Help**: Generic and port lists inside `NewComponent` and calls
//! - **Go to Definition**: Across files of the project
//! - **Document Symbols**: Outline of components, processes and declarations
//! - **Auto-Connect**: Generates signals and constants for `Q => ,` markers
//!
//! # Pipeline
//!
//! ```text
//! editor edits ──► patcher ──┐
//!                            ├─► ProjectAnalysis ──► Index ► Resolve ► Check ──► diagnostics
//! file watcher ──► aggregator┘          │
//!                                       └──► queries (completion, hover, ...)
//! ```
//!
//! # Usage
//!
//! ## Running the Server
//!
//! ```bash
//! # Run the language server (stdio transport)
//! vhdp-lsp
//!
//! # With debug logging
//! RUST_LOG=debug vhdp-lsp
//! ```
//!
//! ## Programmatic Usage
//!
//! ```no_run
//! use tower_lsp::{LspService, Server};
//! use vhdp_lsp::VhdpLanguageServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let stdin = tokio::io::stdin();
//!     let stdout = tokio::io::stdout();
//!
//!     let (service, socket) = LspService::new(VhdpLanguageServer::new);
//!
//!     Server::new(stdin, stdout, socket).serve(service).await;
//! }
//! ```
//!
//! # Architecture
//!
//! - `backend`: LSP protocol handling
//! - [`patcher`]: Applies range edits computed against one base text
//! - [`watcher`]: Collapses filesystem events into project operations
//! - [`project`]: Snapshots, analyzer contexts and the phase pipeline
//! - [`manifest`]: `.fpgaproj` project files and inclusion rules
//! - [`completion`], [`hover`], [`signature`], [`definition`], [`symbols`]: Derived queries
//! - [`autoconnect`] and [`editor`]: Port-map completion for instantiations

pub mod autoconnect;
mod backend;
pub mod completion;
pub mod config;
pub mod constants;
pub mod definition;
pub mod diagnostics;
pub mod document_store;
pub mod editor;
pub mod error;
pub mod hover;
pub mod manifest;
pub mod patcher;
pub mod project;
pub mod signature;
pub mod symbols;
pub mod utils;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use autoconnect::{AutoConnect, AutoConnectError, AutoConnectReport};
pub use backend::VhdpLanguageServer;
pub use config::ServerConfig;
pub use editor::{EditableDocument, RopeDocument};
pub use error::{AnalysisError, ProjectError, ProjectResult};
pub use project::{AnalysisOutcome, DiagnosticsEvent, DiagnosticsSink, ProjectAnalysis};

/// LSP server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
