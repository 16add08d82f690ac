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

//! Server configuration, read from the client's `initializationOptions`.

use crate::constants::{DEBOUNCE_MS, DEFAULT_MAX_DOCUMENT_SIZE, WATCH_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Tunables of the language server.
///
/// Every field is optional in the JSON form; missing fields keep their
/// defaults.
///
/// ```
/// use vhdp_lsp::config::ServerConfig;
///
/// let config = ServerConfig::from_options(Some(&serde_json::json!({ "debounceMs": 50 })));
/// assert_eq!(config.debounce_ms, 50);
/// assert!(config.watch);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Maximum size of one source file in bytes (default: 8 MB).
    pub max_document_size: usize,

    /// Drain interval of the filesystem watcher (default: 300ms).
    pub watch_interval_ms: u64,

    /// Delay between the last edit and the analysis pass (default: 200ms).
    pub debounce_ms: u64,

    /// Watch the workspace for files created, changed or deleted outside
    /// the editor (default: true).
    pub watch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            watch_interval_ms: WATCH_INTERVAL_MS,
            debounce_ms: DEBOUNCE_MS,
            watch: true,
        }
    }
}

impl ServerConfig {
    /// Parse `initializationOptions`, falling back to the defaults when the
    /// value is absent or malformed.
    pub fn from_options(options: Option<&serde_json::Value>) -> Self {
        let Some(value) = options else {
            return Self::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid initialization options: {}", e);
                Self::default()
            }
        }
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
