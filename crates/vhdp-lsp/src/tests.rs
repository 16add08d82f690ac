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

//! Tests for the derived queries and backend helpers.
//!
//! Every fixture is analyzed with the reference analyzer; cross-file cases
//! index `Counter` first and resolve the file under test against it.

#[cfg(test)]
mod fixtures {
    use crate::utils::to_position;
    use std::path::Path;
    use std::sync::Arc;
    use tower_lsp::lsp_types::Position;
    use vhdp_core::{Analyzer, AnalyzerContext, AnalyzerMode, ProjectContext, VhdpAnalyzer};

    pub const COUNTER: &str = "Component Counter (\n    Generic ( N : INTEGER := 8; );\n    Q : OUT STD_LOGIC_VECTOR(N-1 downto 0);\n) { }\n";

    pub fn analyze(path: &str, text: &str, mode: AnalyzerMode, project: &ProjectContext) -> AnalyzerContext {
        VhdpAnalyzer::new()
            .analyze(Path::new(path), Arc::from(text), mode, project)
            .unwrap()
    }

    pub fn counter_project() -> ProjectContext {
        let counter = analyze("/p/counter.vhdp", COUNTER, AnalyzerMode::INDEXING, &ProjectContext::empty());
        ProjectContext::new([Arc::new(counter)])
    }

    /// `text` analyzed as `/p/top.vhdp` against the `Counter` project.
    pub fn top(text: &str) -> (AnalyzerContext, ProjectContext) {
        let project = counter_project();
        let ctx = analyze("/p/top.vhdp", text, AnalyzerMode::FULL, &project);
        (ctx, project)
    }

    /// Position `delta` bytes after the first occurrence of `needle`.
    pub fn position_of(ctx: &AnalyzerContext, needle: &str, delta: usize) -> Position {
        let offset = ctx.text.find(needle).unwrap() + delta;
        to_position(ctx.position(offset))
    }
}

#[cfg(test)]
mod completion_tests {
    use super::fixtures::*;
    use crate::completion::{determine_context, get_completions, CompletionContext};
    use tower_lsp::lsp_types::*;
    use vhdp_core::{AnalyzerMode, ProjectContext};

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn test_top_level_in_empty_file() {
        let ctx = analyze("/p/a.vhdp", "", AnalyzerMode::FULL, &ProjectContext::empty());
        let items = get_completions(&ctx, &ProjectContext::empty(), Position::new(0, 0), None);
        assert_eq!(labels(&items), vec!["Component", "Main", "Package", "Include"]);
    }

    #[test]
    fn test_port_map_lists_unconnected_ports() {
        let (ctx, project) = top("Main (\n) {\n    NewComponent Counter ();\n}\n");
        let position = position_of(&ctx, "();", 1);
        let items = get_completions(&ctx, &project, position, None);
        let names = labels(&items);
        assert_eq!(names, vec!["N", "Q", "Auto-connect markers"]);
        assert_eq!(items[0].insert_text.as_deref(), Some("N => "));
        assert_eq!(items[0].kind, Some(CompletionItemKind::TYPE_PARAMETER));
        assert_eq!(items[2].insert_text.as_deref(), Some("N => ,\nQ => "));
    }

    #[test]
    fn test_port_map_skips_connected_members() {
        let (ctx, project) = top("Main (\n) {\n    SIGNAL c : STD_LOGIC;\n    NewComponent Counter (Q => c, );\n}\n");
        let position = position_of(&ctx, ", )", 2);
        let items = get_completions(&ctx, &project, position, None);
        assert_eq!(labels(&items), vec!["N", "Auto-connect markers"]);
    }

    #[test]
    fn test_port_value_suggests_signals() {
        let (ctx, project) = top("Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    NewComponent Counter (Q => );\n}\n");
        let offset = ctx.text.find("=> )").unwrap() + 3;
        assert!(matches!(determine_context(&ctx, offset), CompletionContext::PortValue { .. }));

        let items = get_completions(&ctx, &project, position_of(&ctx, "=> )", 3), None);
        let count = items.iter().find(|i| i.label == "count").unwrap();
        assert_eq!(count.kind, Some(CompletionItemKind::VARIABLE));
        assert_eq!(count.detail.as_deref(), Some("SIGNAL count : STD_LOGIC"));
    }

    #[test]
    fn test_type_position_in_port_list() {
        let ctx = analyze(
            "/p/a.vhdp",
            "Main (\n    led : OUT STD_LOGIC;\n) { }\n",
            AnalyzerMode::FULL,
            &ProjectContext::empty(),
        );
        let offset = ctx.text.find("STD_LOGIC").unwrap() + 3;
        assert_eq!(
            determine_context(&ctx, offset),
            CompletionContext::TypePosition { port_list: true }
        );
        let items = get_completions(&ctx, &ProjectContext::empty(), position_of(&ctx, "STD_LOGIC", 3), None);
        let names = labels(&items);
        assert_eq!(&names[..4], &["IN", "OUT", "INOUT", "BUFFER"]);
        assert!(names.contains(&"STD_LOGIC"));
    }

    #[test]
    fn test_body_offers_declarations_and_components() {
        let (ctx, project) = top("Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    x <= count;\n}\n");
        let offset = ctx.text.find("x <=").unwrap();
        assert!(matches!(determine_context(&ctx, offset), CompletionContext::Body { .. }));

        let items = get_completions(&ctx, &project, position_of(&ctx, "x <=", 0), None);
        let names = labels(&items);
        assert!(names.contains(&"SIGNAL"));
        assert!(names.contains(&"Process"));
        assert!(names.contains(&"count"));
        let counter = items.iter().find(|i| i.label == "Counter").unwrap();
        assert_eq!(counter.detail.as_deref(), Some("Component (1 ports, 1 generics)"));
        assert_eq!(counter.insert_text_format, Some(InsertTextFormat::SNIPPET));
    }

    #[test]
    fn test_record_fields_after_dot() {
        let text = "Package P { TYPE cfg_t IS RECORD w : NATURAL; ok : BOOLEAN; END RECORD; }\nMain () { SIGNAL cfg : cfg_t; x <= cfg.w; }\n";
        let ctx = analyze("/p/a.vhdp", text, AnalyzerMode::FULL, &ProjectContext::empty());
        let items = get_completions(&ctx, &ProjectContext::empty(), position_of(&ctx, "cfg.w", 4), Some("."));
        assert_eq!(labels(&items), vec!["w", "ok"]);
        assert_eq!(items[0].detail.as_deref(), Some(": NATURAL"));
    }

    #[test]
    fn test_dot_trigger_outside_record_is_empty() {
        let (ctx, project) = top("Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    x <= count;\n}\n");
        let items = get_completions(&ctx, &project, position_of(&ctx, "x <=", 0), Some("."));
        assert!(items.is_empty());
    }

    #[test]
    fn test_include_lists_ieee_packages() {
        let ctx = analyze(
            "/p/a.vhdp",
            "Main (\n    Include ( IEEE.NUMERIC_STD.ALL );\n) { }\n",
            AnalyzerMode::FULL,
            &ProjectContext::empty(),
        );
        let offset = ctx.text.find("IEEE").unwrap();
        assert_eq!(determine_context(&ctx, offset), CompletionContext::Include);
    }
}

#[cfg(test)]
mod signature_tests {
    use super::fixtures::*;
    use crate::signature::get_signature_help;
    use std::sync::Arc;
    use tower_lsp::lsp_types::*;
    use vhdp_core::{AnalyzerMode, ProjectContext};

    const LABEL: &str = "Counter (N : INTEGER := 8; Q : OUT STD_LOGIC_VECTOR(N-1 downto 0))";

    #[test]
    fn test_instantiation_signature() {
        let (ctx, project) = top("Main (\n) {\n    SIGNAL c : STD_LOGIC;\n    NewComponent Counter (Q => c, );\n}\n");
        let help = get_signature_help(&ctx, &project, position_of(&ctx, ", )", 2)).unwrap();
        let signature = &help.signatures[0];
        assert_eq!(signature.label, LABEL);
        assert_eq!(signature.parameters.as_ref().unwrap().len(), 2);
        assert_eq!(help.active_parameter, Some(1));
    }

    #[test]
    fn test_named_member_selects_parameter() {
        let (ctx, project) = top("Main (\n) {\n    NewComponent Counter (Q => , N => );\n}\n");
        let help = get_signature_help(&ctx, &project, position_of(&ctx, "N => )", 5)).unwrap();
        assert_eq!(help.active_parameter, Some(0));
        match &help.signatures[0].parameters.as_ref().unwrap()[0].label {
            ParameterLabel::LabelOffsets([start, end]) => {
                assert_eq!(&LABEL[*start as usize..*end as usize], "N : INTEGER := 8");
            }
            other => panic!("unexpected label {:?}", other),
        }
    }

    #[test]
    fn test_label_offsets_count_characters() {
        let greeter = analyze(
            "/p/greeter.vhdp",
            "Component Greeter (\n    Generic ( S : STRING := \"hi😀\"; );\n    Q : OUT BIT;\n) { }\n",
            AnalyzerMode::INDEXING,
            &ProjectContext::empty(),
        );
        let project = ProjectContext::new([Arc::new(greeter)]);
        let ctx = analyze(
            "/p/top.vhdp",
            "Main (\n) {\n    NewComponent Greeter (S => , Q => );\n}\n",
            AnalyzerMode::FULL,
            &project,
        );
        let help = get_signature_help(&ctx, &project, position_of(&ctx, "Q => )", 5)).unwrap();
        let signature = &help.signatures[0];
        match &signature.parameters.as_ref().unwrap()[1].label {
            ParameterLabel::LabelOffsets([start, end]) => {
                let text: String = signature
                    .label
                    .chars()
                    .skip(*start as usize)
                    .take((end - start) as usize)
                    .collect();
                assert_eq!(text, "Q : OUT BIT");
            }
            other => panic!("unexpected label {:?}", other),
        }
    }

    #[test]
    fn test_no_signature_before_paren() {
        let (ctx, project) = top("Main (\n) {\n    NewComponent Counter ();\n}\n");
        assert!(get_signature_help(&ctx, &project, position_of(&ctx, "Counter ()", 3)).is_none());
    }

    #[test]
    fn test_unknown_component_has_no_signature() {
        let (ctx, project) = top("Main (\n) {\n    NewComponent Missing ();\n}\n");
        assert!(get_signature_help(&ctx, &project, position_of(&ctx, "();", 1)).is_none());
    }
}

#[cfg(test)]
mod definition_tests {
    use super::fixtures::*;
    use crate::definition::get_definition;
    use std::path::PathBuf;
    use tower_lsp::lsp_types::*;

    const TOP: &str = "Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    NewComponent Counter (Q => count, N => );\n    x <= count;\n}\n";

    #[test]
    fn test_local_signal() {
        let (ctx, project) = top(TOP);
        let target = get_definition(&ctx, &project, position_of(&ctx, "x <= count", 6)).unwrap();
        assert_eq!(target.path, PathBuf::from("/p/top.vhdp"));
        assert_eq!(target.range, Range::new(Position::new(2, 11), Position::new(2, 16)));
    }

    #[test]
    fn test_component_in_other_file() {
        let (ctx, project) = top(TOP);
        let target = get_definition(&ctx, &project, position_of(&ctx, "Counter (", 2)).unwrap();
        assert_eq!(target.path, PathBuf::from("/p/counter.vhdp"));
        assert_eq!(target.range.start, Position::new(0, 10));
    }

    #[test]
    fn test_port_map_member() {
        let (ctx, project) = top(TOP);
        let target = get_definition(&ctx, &project, position_of(&ctx, "Q =>", 0)).unwrap();
        assert_eq!(target.path, PathBuf::from("/p/counter.vhdp"));
        assert_eq!(target.range.start, Position::new(2, 4));
    }

    #[test]
    fn test_nothing_on_keywords() {
        let (ctx, project) = top(TOP);
        assert!(get_definition(&ctx, &project, Position::new(5, 0)).is_none());
    }
}

#[cfg(test)]
mod backend_tests {
    use super::fixtures::*;
    use crate::backend::{diff_edit, path_of};
    use std::path::PathBuf;
    use tower_lsp::lsp_types::*;
    use vhdp_core::{AnalyzerMode, ProjectContext};

    #[test]
    fn test_diff_edit_covers_changed_span() {
        let ctx = analyze("/p/a.vhdp", "abc\ndef\n", AnalyzerMode::INDEXING, &ProjectContext::empty());
        let edit = diff_edit(&ctx, "abc\nXYef\n").unwrap();
        assert_eq!(edit.range, Range::new(Position::new(1, 0), Position::new(1, 1)));
        assert_eq!(edit.new_text, "XY");
    }

    #[test]
    fn test_diff_edit_pure_insertion() {
        let ctx = analyze("/p/a.vhdp", "a\nb\n", AnalyzerMode::INDEXING, &ProjectContext::empty());
        let edit = diff_edit(&ctx, "a\nx\nb\n").unwrap();
        assert_eq!(edit.range.start, edit.range.end);
        assert_eq!(edit.new_text.len(), 2);
        assert!(diff_edit(&ctx, "a\nb\n").is_none());
    }

    #[test]
    fn test_path_of_file_uri() {
        let uri = Url::parse("file:///p/top.vhdp").unwrap();
        assert_eq!(path_of(&uri), PathBuf::from("/p/top.vhdp"));
        let untitled = Url::parse("untitled:Untitled-1").unwrap();
        assert_eq!(path_of(&untitled), PathBuf::from("untitled:Untitled-1"));
    }
}
