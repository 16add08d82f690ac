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

//! End-to-end tests for the auto-connect synthesizer.
//!
//! The instantiated component lives in its own file; the instantiating file
//! is analyzed against it, then connected through a [`RopeDocument`].

use std::path::Path;
use std::sync::Arc;
use vhdp_core::{Analyzer, AnalyzerContext, AnalyzerMode, ProjectContext, VhdpAnalyzer};
use vhdp_lsp::autoconnect::find_instance;
use vhdp_lsp::{AutoConnect, AutoConnectReport, EditableDocument, RopeDocument};

const COUNTER: &str = "Component Counter (\n    Generic ( N : INTEGER := 8; );\n    Q : OUT STD_LOGIC_VECTOR(N-1 downto 0);\n) { }\n";
const BLINK: &str = "Component Blink (\n    LED : OUT STD_LOGIC;\n) {\n    Connections (LED => PIN_7);\n}\n";

fn analyze(path: &str, text: &str, mode: AnalyzerMode, project: &ProjectContext) -> AnalyzerContext {
    VhdpAnalyzer::new()
        .analyze(Path::new(path), Arc::from(text), mode, project)
        .unwrap()
}

fn library() -> ProjectContext {
    let empty = ProjectContext::empty();
    ProjectContext::new([
        Arc::new(analyze("/p/counter.vhdp", COUNTER, AnalyzerMode::INDEXING, &empty)),
        Arc::new(analyze("/p/blink.vhdp", BLINK, AnalyzerMode::INDEXING, &empty)),
    ])
}

/// Run auto-connect on the first instantiation of `top`.
fn connect_with(connect: AutoConnect, top: &str) -> (String, AutoConnectReport, RopeDocument) {
    let project = library();
    let ctx = analyze("/p/top.vhdp", top, AnalyzerMode::FULL, &project);
    let instance = find_instance(&ctx, ctx.text.find("NewComponent").unwrap()).unwrap();
    let mut doc = RopeDocument::new(top);
    let report = connect.connect(&mut doc, &ctx, &project, instance).unwrap();
    (doc.text(), report, doc)
}

fn connect(top: &str) -> (String, AutoConnectReport) {
    let (text, report, _) = connect_with(AutoConnect::new(), top);
    (text, report)
}

// ============================================================================
// Generated declarations
// ============================================================================

#[test]
fn test_marked_ports_and_generics_become_declarations() {
    let (text, report) = connect("Main (\n) {\n    NewComponent Counter (Q => , N => );\n}\n");

    assert_eq!(
        text,
        "Main (\n) {\n    CONSTANT Counter_N : INTEGER := 8;\n    SIGNAL Counter_Q : STD_LOGIC_VECTOR(Counter_N-1 downto 0);\n    NewComponent Counter (Q => Counter_Q, N => Counter_N);\n}\n"
    );
    assert_eq!(report.constants, vec!["Counter_N"]);
    assert_eq!(report.signals, vec!["Counter_Q"]);
    assert!(report.hoisted.is_empty());
    assert!(report.defaults.is_empty());
    assert_eq!(report.rewritten, 2);
}

#[test]
fn test_label_names_the_generated_signals() {
    let (text, report) = connect("Main (\n) {\n    NewCounter : NewComponent Counter (Q => , N => );\n}\n");

    assert_eq!(
        text,
        "Main (\n) {\n    CONSTANT NewCounter_N : INTEGER := 8;\n    SIGNAL NewCounter_Q : STD_LOGIC_VECTOR(NewCounter_N-1 downto 0);\n    NewCounter : NewComponent Counter (Q => NewCounter_Q, N => NewCounter_N);\n}\n"
    );
    assert_eq!(report.signals, vec!["NewCounter_Q"]);
}

#[test]
fn test_unused_generic_takes_its_default() {
    let (text, report) =
        connect("Main (\n) {\n    SIGNAL q : STD_LOGIC_VECTOR(7 downto 0);\n    NewComponent Counter (Q => q, N => );\n}\n");

    assert_eq!(
        text,
        "Main (\n) {\n    SIGNAL q : STD_LOGIC_VECTOR(7 downto 0);\n    NewComponent Counter (Q => q, N => 8);\n}\n"
    );
    assert!(report.constants.is_empty());
    assert!(report.signals.is_empty());
    assert_eq!(report.defaults, vec!["N"]);
    assert_eq!(report.rewritten, 1);
}

#[test]
fn test_forwarded_port_is_hoisted() {
    let (text, report) = connect("Main (\n    btn : IN STD_LOGIC;\n) {\n    NewComponent Blink (LED => );\n}\n");

    assert_eq!(
        text,
        "Main (\n    btn : IN STD_LOGIC;\n    LED : OUT STD_LOGIC;\n) {\n    NewComponent Blink (LED => LED);\n}\n"
    );
    assert_eq!(report.hoisted, vec!["LED"]);
    assert!(report.signals.is_empty());
}

#[test]
fn test_without_auto_indent_lines_stay_flush() {
    let (text, _, _) = connect_with(
        AutoConnect::new().with_auto_indent(false),
        "Main (\n) {\n    NewComponent Counter (Q => , N => );\n}\n",
    );

    assert_eq!(
        text,
        "Main (\n) {\n    CONSTANT Counter_N : INTEGER := 8;\nSIGNAL Counter_Q : STD_LOGIC_VECTOR(Counter_N-1 downto 0);\nNewComponent Counter (Q => Counter_Q, N => Counter_N);\n}\n"
    );
}

// ============================================================================
// Edit grouping
// ============================================================================

#[test]
fn test_edits_form_one_group() {
    let (_, _, doc) = connect_with(AutoConnect::new(), "Main (\n) {\n    NewComponent Counter (Q => , N => );\n}\n");

    assert_eq!(doc.update_depth(), 0);
    assert_eq!(doc.completed_groups(), 1);
    // two marker rewrites, one declaration block
    assert!(doc.edits().len() >= 3);
}

// ============================================================================
// Nothing to do
// ============================================================================

#[test]
fn test_fully_connected_instance_is_untouched() {
    let top = "Main (\n) {\n    SIGNAL q : STD_LOGIC_VECTOR(3 downto 0);\n    NewComponent Counter (Q => q, N => 4);\n}\n";
    let (text, report, doc) = connect_with(AutoConnect::new(), top);

    assert_eq!(text, top);
    assert!(report.is_empty());
    assert!(doc.edits().is_empty());
    assert_eq!(doc.completed_groups(), 0);
}

#[test]
fn test_unknown_component_is_untouched() {
    let top = "Main (\n) {\n    NewComponent Missing (Q => );\n}\n";
    let (text, report) = connect(top);

    assert_eq!(text, top);
    assert!(report.is_empty());
}

#[test]
fn test_empty_port_map_is_untouched() {
    let top = "Main (\n) {\n    NewComponent Counter ();\n}\n";
    let (text, report) = connect(top);

    assert_eq!(text, top);
    assert!(report.is_empty());
}
