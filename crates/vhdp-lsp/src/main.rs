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

//! VHDP Language Server binary.
//!
//! # Usage
//!
//! ```bash
//! # Run the language server (stdio transport) from the project directory
//! vhdp-lsp
//!
//! # With debug logging
//! RUST_LOG=debug vhdp-lsp
//! ```
//!
//! # Editor Integration
//!
//! ## Neovim (nvim-lspconfig)
//!
//! ```lua
//! require('lspconfig.configs').vhdp = {
//!   default_config = {
//!     cmd = { 'vhdp-lsp' },
//!     filetypes = { 'vhdp' },
//!     root_dir = require('lspconfig.util').root_pattern('*.fpgaproj'),
//!     init_options = { debounceMs = 200, watch = true },
//!   },
//! }
//! require('lspconfig').vhdp.setup {}
//! ```

use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;
use vhdp_lsp::VhdpLanguageServer;

#[tokio::main]
async fn main() {
    // Initialize logging to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("vhdp_lsp=info".parse().expect("valid log directive"))
                .add_directive("tower_lsp=info".parse().expect("valid log directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting VHDP Language Server v{}", vhdp_lsp::VERSION);

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(VhdpLanguageServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
