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

//! Integration tests for the language server backend.
//!
//! Trait methods are called directly on the service's inner server. The
//! client is never initialized, so notifications and requests towards the
//! editor are dropped instead of blocking.

use serde_json::json;
use std::fs;
use std::time::Duration;
use tower_lsp::lsp_types::*;
use tower_lsp::{LanguageServer, LspService};
use vhdp_lsp::constants::AUTO_CONNECT_COMMAND;
use vhdp_lsp::document_store::FileState;
use vhdp_lsp::patcher::{apply_changes, TextChange};
use vhdp_lsp::VhdpLanguageServer;

const COUNTER: &str = "Component Counter (\n    Generic ( N : INTEGER := 8; );\n    Q : OUT STD_LOGIC_VECTOR(N-1 downto 0);\n) { }\n";
const TOP: &str = "Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    NewComponent Counter (Q => , N => );\n    x <= count;\n}\n";

macro_rules! test_server {
    () => {{
        let (service, _socket) = LspService::new(VhdpLanguageServer::new);
        service
    }};
}

fn uri(path: &str) -> Url {
    Url::parse(&format!("file://{}", path)).unwrap()
}

async fn initialize(server: &VhdpLanguageServer, options: serde_json::Value) -> InitializeResult {
    let params = InitializeParams {
        initialization_options: Some(options),
        ..Default::default()
    };
    server.initialize(params).await.unwrap()
}

async fn open(server: &VhdpLanguageServer, uri: &Url, text: &str) {
    server
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: "vhdp".to_string(),
                version: 1,
                text: text.to_string(),
            },
        })
        .await;
}

/// Opens `counter.vhdp` and `top.vhdp` in single-file mode.
async fn open_pair(server: &VhdpLanguageServer) -> Url {
    initialize(server, json!({ "watch": false })).await;
    open(server, &uri("/p/counter.vhdp"), COUNTER).await;
    let top = uri("/p/top.vhdp");
    open(server, &top, TOP).await;
    top
}

fn position_in(text: &str, needle: &str, delta: usize) -> Position {
    let offset = text.find(needle).unwrap() + delta;
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32;
    let character = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) as u32;
    Position::new(line, character)
}

fn text_position(uri: &Url, position: Position) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        position,
    }
}

// ============================================================================
// Initialize/Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_initialize_capabilities() {
    let service = test_server!();
    let server = service.inner();
    let result = server.initialize(InitializeParams::default()).await.unwrap();
    let caps = result.capabilities;

    assert!(matches!(
        caps.text_document_sync,
        Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            ..
        }))
    ));
    assert_eq!(
        caps.completion_provider.unwrap().trigger_characters,
        Some(vec![".".to_string()])
    );
    assert!(caps.hover_provider.is_some());
    assert!(caps.signature_help_provider.is_some());
    assert!(caps.definition_provider.is_some());
    assert!(caps.document_symbol_provider.is_some());
    assert!(caps.code_action_provider.is_some());
    assert_eq!(
        caps.execute_command_provider.unwrap().commands,
        vec![AUTO_CONNECT_COMMAND.to_string()]
    );
    assert_eq!(caps.position_encoding, None);
    assert_eq!(result.server_info.unwrap().name, "vhdp-lsp");
}

#[tokio::test]
async fn test_initialize_negotiates_utf32() {
    let service = test_server!();
    let server = service.inner();
    let params = InitializeParams {
        capabilities: ClientCapabilities {
            general: Some(GeneralClientCapabilities {
                position_encodings: Some(vec![PositionEncodingKind::UTF16, PositionEncodingKind::UTF32]),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };
    let result = server.initialize(params).await.unwrap();
    assert_eq!(result.capabilities.position_encoding, Some(PositionEncodingKind::UTF32));
}

#[tokio::test]
async fn test_initialization_options() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "debounceMs": 20, "watch": false, "maxDocumentSize": 64 })).await;

    let config = server.config();
    assert_eq!(config.debounce_ms, 20);
    assert!(!config.watch);
    assert_eq!(server.project().store().max_document_size(), 64);
}

#[tokio::test]
async fn test_initialized_and_shutdown_without_workspace() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({})).await;

    server.initialized(InitializedParams {}).await;
    assert!(!server.project().is_loaded());
    assert!(server.shutdown().await.is_ok());
}

// ============================================================================
// Document Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_did_open_runs_full_analysis() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    assert!(server.is_open(&top));
    let project = server.project();
    assert_eq!(project.state(top.to_file_path().unwrap().as_path()), FileState::Checked);
    let codes: Vec<String> = project
        .diagnostics(top.to_file_path().unwrap().as_path())
        .into_iter()
        .map(|d| d.code)
        .collect();
    assert!(codes.iter().any(|c| c == "auto-connect"), "{:?}", codes);
}

#[tokio::test]
async fn test_did_open_oversized_document() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "maxDocumentSize": 100 })).await;

    let big = uri("/p/big.vhdp");
    open(server, &big, &"-- filler\n".repeat(20)).await;

    assert!(!server.is_open(&big));
    assert!(server.project().document(big.to_file_path().unwrap().as_path()).is_none());
}

#[tokio::test]
async fn test_did_change_applies_changes_in_sequence() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "debounceMs": 10, "watch": false })).await;
    let doc = uri("/p/a.vhdp");
    open(server, &doc, "Main () {\n    SIGNAL a : BIT;\n}\n").await;

    // the second change addresses the text produced by the first
    server
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: doc.clone(),
                version: 2,
            },
            content_changes: vec![
                TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(1, 11), Position::new(1, 12))),
                    range_length: None,
                    text: "abc".to_string(),
                },
                TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(1, 11), Position::new(1, 14))),
                    range_length: None,
                    text: "xyz".to_string(),
                },
            ],
        })
        .await;

    let path = doc.to_file_path().unwrap();
    let (text, version) = server.project().document(&path).unwrap();
    assert_eq!(&*text, "Main () {\n    SIGNAL xyz : BIT;\n}\n");

    tokio::time::sleep(Duration::from_millis(500)).await;
    let ctx = server.project().context(&path).unwrap();
    assert_eq!(ctx.source_version, version);
    assert_eq!(server.project().state(&path), FileState::Checked);
}

#[tokio::test]
async fn test_rejected_change_keeps_snapshot() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "watch": false })).await;
    let doc = uri("/p/a.vhdp");
    open(server, &doc, "Main () { }\n").await;

    server
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: doc.clone(),
                version: 2,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: Some(Range::new(Position::new(7, 0), Position::new(7, 1))),
                range_length: None,
                text: "x".to_string(),
            }],
        })
        .await;

    let (text, _) = server.project().document(&doc.to_file_path().unwrap()).unwrap();
    assert_eq!(&*text, "Main () { }\n");
}

#[tokio::test]
async fn test_change_batch_is_all_or_nothing() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "watch": false })).await;
    let doc = uri("/p/a.vhdp");
    open(server, &doc, "Main () { }\n").await;
    let path = doc.to_file_path().unwrap();
    let (_, before) = server.project().document(&path).unwrap();

    // the first change is valid, the second one is not
    server
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: doc.clone(),
                version: 2,
            },
            content_changes: vec![
                TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(0, 0), Position::new(0, 4))),
                    range_length: None,
                    text: "Component".to_string(),
                },
                TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(7, 0), Position::new(7, 1))),
                    range_length: None,
                    text: "x".to_string(),
                },
            ],
        })
        .await;

    let (text, version) = server.project().document(&path).unwrap();
    assert_eq!(&*text, "Main () { }\n");
    assert_eq!(version, before);
}

#[tokio::test]
async fn test_did_close_forgets_files_outside_a_project() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    server
        .did_close(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: top.clone() },
        })
        .await;

    assert!(!server.is_open(&top));
    assert!(server.project().context(&top.to_file_path().unwrap()).is_none());
}

// ============================================================================
// Query Tests
// ============================================================================

#[tokio::test]
async fn test_completion_in_port_map() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "watch": false })).await;
    open(server, &uri("/p/counter.vhdp"), COUNTER).await;
    let top_text = "Main (\n) {\n    NewComponent Counter ();\n}\n";
    let top = uri("/p/top.vhdp");
    open(server, &top, top_text).await;

    let response = server
        .completion(CompletionParams {
            text_document_position: text_position(&top, position_in(top_text, "();", 1)),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        })
        .await
        .unwrap();
    let Some(CompletionResponse::Array(items)) = response else {
        panic!("expected completion items");
    };
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["N", "Q", "Auto-connect markers"]);
}

#[tokio::test]
async fn test_hover_on_signal() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    let hover = server
        .hover(HoverParams {
            text_document_position_params: text_position(&top, position_in(TOP, "x <= count", 6)),
            work_done_progress_params: Default::default(),
        })
        .await
        .unwrap()
        .unwrap();
    let HoverContents::Markup(markup) = hover.contents else {
        panic!("expected markdown hover");
    };
    assert!(markup.value.contains("SIGNAL count : STD_LOGIC"), "{}", markup.value);
}

#[tokio::test]
async fn test_signature_help_in_port_map() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    let help = server
        .signature_help(SignatureHelpParams {
            context: None,
            text_document_position_params: text_position(&top, position_in(TOP, "N => )", 5)),
            work_done_progress_params: Default::default(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(help.active_parameter, Some(0));
    assert!(help.signatures[0].label.starts_with("Counter ("));
}

#[tokio::test]
async fn test_definition_of_open_component() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    let response = server
        .goto_definition(GotoDefinitionParams {
            text_document_position_params: text_position(&top, position_in(TOP, "Counter (", 2)),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await
        .unwrap();
    let Some(GotoDefinitionResponse::Scalar(location)) = response else {
        panic!("expected a location");
    };
    assert_eq!(location.uri, uri("/p/counter.vhdp"));
    assert_eq!(location.range.start, Position::new(0, 10));
}

#[tokio::test]
async fn test_document_symbols() {
    let service = test_server!();
    let server = service.inner();
    open_pair(server).await;

    let response = server
        .document_symbol(DocumentSymbolParams {
            text_document: TextDocumentIdentifier {
                uri: uri("/p/counter.vhdp"),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await
        .unwrap();
    let Some(DocumentSymbolResponse::Nested(symbols)) = response else {
        panic!("expected nested symbols");
    };
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "Counter");
}

#[tokio::test]
async fn test_queries_on_unknown_document() {
    let service = test_server!();
    let server = service.inner();
    initialize(server, json!({ "watch": false })).await;

    let hover = server
        .hover(HoverParams {
            text_document_position_params: text_position(&uri("/p/nope.vhdp"), Position::new(0, 0)),
            work_done_progress_params: Default::default(),
        })
        .await
        .unwrap();
    assert!(hover.is_none());
}

// ============================================================================
// Auto-Connect Tests
// ============================================================================

fn code_action_params(uri: &Url, position: Position) -> CodeActionParams {
    CodeActionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        range: Range::new(position, position),
        context: CodeActionContext::default(),
        work_done_progress_params: Default::default(),
        partial_result_params: Default::default(),
    }
}

#[tokio::test]
async fn test_code_action_offers_auto_connect() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    let actions = server
        .code_action(code_action_params(&top, position_in(TOP, "NewComponent", 3)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(actions.len(), 1);
    let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
        panic!("expected a code action");
    };
    assert_eq!(action.title, "Auto-connect `Counter`");
    assert_eq!(action.kind, Some(CodeActionKind::REFACTOR_REWRITE));
    assert_eq!(action.command.as_ref().unwrap().command, AUTO_CONNECT_COMMAND);

    let outside = server
        .code_action(code_action_params(&top, position_in(TOP, "SIGNAL", 0)))
        .await
        .unwrap()
        .unwrap();
    assert!(outside.is_empty());
}

#[tokio::test]
async fn test_auto_connect_edit_produces_declarations() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    let edit = server
        .auto_connect_edit(&top, position_in(TOP, "NewComponent", 3))
        .await
        .unwrap();
    let edits = &edit.changes.unwrap()[&top];
    assert_eq!(edits.len(), 1);

    let changes: Vec<TextChange> = edits
        .iter()
        .map(|e| TextChange::new(e.range, e.new_text.clone()))
        .collect();
    assert_eq!(
        apply_changes(TOP, &changes).unwrap(),
        "Main (\n) {\n    SIGNAL count : STD_LOGIC;\n    CONSTANT Counter_N : INTEGER := 8;\n    SIGNAL Counter_Q : STD_LOGIC_VECTOR(Counter_N-1 downto 0);\n    NewComponent Counter (Q => Counter_Q, N => Counter_N);\n    x <= count;\n}\n"
    );
}

#[tokio::test]
async fn test_execute_command_validates_arguments() {
    let service = test_server!();
    let server = service.inner();
    let top = open_pair(server).await;

    let unknown = server
        .execute_command(ExecuteCommandParams {
            command: "vhdp.unknown".to_string(),
            arguments: vec![],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert!(unknown.is_err());

    let missing = server
        .execute_command(ExecuteCommandParams {
            command: AUTO_CONNECT_COMMAND.to_string(),
            arguments: vec![json!(top)],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert!(missing.is_err());

    let malformed = server
        .execute_command(ExecuteCommandParams {
            command: AUTO_CONNECT_COMMAND.to_string(),
            arguments: vec![json!(top), json!("line 3")],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert!(malformed.is_err());

    let valid = server
        .execute_command(ExecuteCommandParams {
            command: AUTO_CONNECT_COMMAND.to_string(),
            arguments: vec![json!(top), json!(position_in(TOP, "NewComponent", 3))],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert_eq!(valid.unwrap(), None);
}

// ============================================================================
// Workspace Tests
// ============================================================================

#[tokio::test]
async fn test_workspace_load_and_cross_file_definition() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("blink.fpgaproj"), r#"{ "Include": ["src/**"] }"#).unwrap();
    fs::write(dir.path().join("src/counter.vhdp"), COUNTER).unwrap();
    fs::write(dir.path().join("src/top.vhdp"), TOP).unwrap();

    let service = test_server!();
    let server = service.inner();
    let params = InitializeParams {
        workspace_folders: Some(vec![WorkspaceFolder {
            uri: Url::from_directory_path(dir.path()).unwrap(),
            name: "blink".to_string(),
        }]),
        initialization_options: Some(json!({ "watch": false })),
        ..Default::default()
    };
    server.initialize(params).await.unwrap();
    server.initialized(InitializedParams {}).await;

    let project = server.project();
    assert!(project.is_loaded());
    assert_eq!(project.files().len(), 2);
    assert_eq!(project.state(&dir.path().join("src/counter.vhdp")), FileState::Checked);

    let top = Url::from_file_path(dir.path().join("src/top.vhdp")).unwrap();
    let response = server
        .goto_definition(GotoDefinitionParams {
            text_document_position_params: text_position(&top, position_in(TOP, "Counter (", 2)),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await
        .unwrap();
    let Some(GotoDefinitionResponse::Scalar(location)) = response else {
        panic!("expected a location");
    };
    assert_eq!(
        location.uri,
        Url::from_file_path(dir.path().join("src/counter.vhdp")).unwrap()
    );

    server.shutdown().await.unwrap();
    assert!(!server.project().is_loaded());
}
