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

//! Conversion of analyzer diagnostics into LSP diagnostics.

use crate::constants::DIAGNOSTIC_SOURCE;
use crate::utils::to_range;
use tower_lsp::lsp_types::{self, DiagnosticSeverity, NumberOrString};
use vhdp_core::{Diagnostic, Severity};

pub fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Hint => DiagnosticSeverity::HINT,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Error => DiagnosticSeverity::ERROR,
    }
}

/// Convert one analyzer diagnostic.
pub fn to_lsp_diagnostic(diagnostic: &Diagnostic) -> lsp_types::Diagnostic {
    lsp_types::Diagnostic {
        range: to_range(diagnostic.start, diagnostic.end),
        severity: Some(to_lsp_severity(diagnostic.severity)),
        code: Some(NumberOrString::String(diagnostic.code.clone())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

/// Convert to LSP diagnostics.
pub fn to_lsp_diagnostics(diagnostics: &[Diagnostic]) -> Vec<lsp_types::Diagnostic> {
    diagnostics.iter().map(to_lsp_diagnostic).collect()
}
