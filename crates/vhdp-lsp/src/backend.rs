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

//! LSP backend implementation.
//!
//! # Document Flow
//!
//! 1. **Edits**: `didChange` range edits are applied to the project's
//!    snapshot through the change patcher, then a debounced
//!    Index|Resolve|Check pass is scheduled (200ms by default). `didOpen`
//!    and `didSave` analyze immediately.
//!
//! 2. **Diagnostics**: passes that include Check publish through a channel
//!    sink; a background task forwards every event to the client.
//!
//! 3. **Queries**: completion, signature help and definition bring the file
//!    up to Index|Resolve first, hover up to a full pass, so answers never
//!    come from a tree older than the text under the cursor.
//!
//! 4. **Workspace**: `initialized` loads the `.fpgaproj` project and starts
//!    the filesystem watcher, whose aggregated operations re-index files
//!    changed outside the editor.

use crate::autoconnect::{find_instance, has_markers, AutoConnect};
use crate::completion::get_completions;
use crate::config::ServerConfig;
use crate::constants::AUTO_CONNECT_COMMAND;
use crate::definition::get_definition;
use crate::diagnostics::to_lsp_diagnostics;
use crate::document_store::DocumentStore;
use crate::editor::{EditableDocument, RopeDocument};
use crate::hover::get_hover;
use crate::project::{ChannelSink, DiagnosticsEvent, ProjectAnalysis, ProjectError};
use crate::signature::get_signature_help;
use crate::symbols::get_document_symbols;
use crate::utils::{to_line_col, to_position};
use crate::watcher::{FsWatcher, ProjectOp, WatchAggregator};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, error, info, warn};
use vhdp_core::{Analyzer, AnalyzerContext, AnalyzerMode, VhdpAnalyzer};

/// Phases a query needs before it reads the tree.
const QUERY_MODE: AnalyzerMode = AnalyzerMode::INDEXING.union(AnalyzerMode::RESOLVE);

/// VHDP Language Server backend.
///
/// Protocol handling lives here; documents, contexts and the analysis
/// pipeline are owned by [`ProjectAnalysis`].
pub struct VhdpLanguageServer {
    /// LSP client connection.
    client: Client,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<ChannelSink>,
    /// Taken by the publisher task on `initialized`.
    diagnostics: Mutex<Option<mpsc::UnboundedReceiver<DiagnosticsEvent>>>,
    /// Replaced on `initialize` once the workspace root is known.
    project: RwLock<Arc<ProjectAnalysis>>,
    config: RwLock<ServerConfig>,
    /// Paths currently open in the editor, with the URI they were opened as.
    open_documents: Arc<DashMap<PathBuf, Url>>,
    /// Debounce channels: URI -> sender for triggering analysis.
    debounce_channels: DashMap<Url, mpsc::UnboundedSender<()>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    watcher: Mutex<Option<FsWatcher>>,
}

impl VhdpLanguageServer {
    /// Create a new language server with the reference analyzer.
    pub fn new(client: Client) -> Self {
        Self::with_analyzer(client, Arc::new(VhdpAnalyzer::new()))
    }

    /// Create a new language server backed by `analyzer`.
    pub fn with_analyzer(client: Client, analyzer: Arc<dyn Analyzer>) -> Self {
        let (sink, receiver) = ChannelSink::new();
        let sink = Arc::new(sink);
        let config = ServerConfig::default();
        let project = Arc::new(ProjectAnalysis::with_store(
            PathBuf::new(),
            Arc::clone(&analyzer),
            sink.clone(),
            DocumentStore::new(config.max_document_size),
        ));
        Self {
            client,
            analyzer,
            sink,
            diagnostics: Mutex::new(Some(receiver)),
            project: RwLock::new(project),
            config: RwLock::new(config),
            open_documents: Arc::new(DashMap::new()),
            debounce_channels: DashMap::new(),
            background: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
        }
    }

    /// The project owning every document of this session.
    pub fn project(&self) -> Arc<ProjectAnalysis> {
        Arc::clone(&self.project.read())
    }

    pub fn config(&self) -> ServerConfig {
        self.config.read().clone()
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.open_documents.contains_key(&path_of(uri))
    }

    /// Run a full pass over `path` now, logging failures.
    async fn analyze_now(&self, path: &Path) {
        match self.project().analyze(path, AnalyzerMode::FULL).await {
            Ok(outcome) => debug!("Analysis of {}: {:?}", path.display(), outcome),
            Err(e) => warn!("Analysis of {} failed: {}", path.display(), e),
        }
    }

    /// Start debounced analysis for a document.
    fn schedule_analysis(&self, uri: Url) {
        // Get or create debounce channel
        let tx = if let Some(entry) = self.debounce_channels.get(&uri) {
            entry.clone()
        } else {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let path = path_of(&uri);
            let project = self.project();
            let delay = self.config.read().debounce();

            tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    sleep(delay).await;

                    // Drain any additional signals during debounce
                    while rx.try_recv().is_ok() {}

                    debug!("Debounced analysis for: {}", path.display());
                    if let Err(e) = project.analyze(&path, AnalyzerMode::FULL).await {
                        warn!("Analysis of {} failed: {}", path.display(), e);
                    }
                }
            });

            self.debounce_channels.insert(uri.clone(), tx.clone());
            tx
        };

        // Trigger analysis
        let _ = tx.send(());
    }

    /// Forward diagnostics events to the client until the sink is dropped.
    fn start_publisher(&self) {
        let Some(mut receiver) = self.diagnostics.lock().take() else {
            return;
        };
        let client = self.client.clone();
        let open_documents = Arc::clone(&self.open_documents);
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let uri = match open_documents.get(&event.path) {
                    Some(uri) => uri.value().clone(),
                    None => match Url::from_file_path(&event.path) {
                        Ok(uri) => uri,
                        Err(()) => {
                            debug!("No URI for {}, diagnostics dropped", event.path.display());
                            continue;
                        }
                    },
                };
                debug!("Publishing {} diagnostics for {}", event.diagnostics.len(), uri);
                client
                    .publish_diagnostics(uri, to_lsp_diagnostics(&event.diagnostics), None)
                    .await;
            }
        });
        self.background.lock().push(task);
    }

    /// Watch the workspace and feed aggregated operations into the project.
    ///
    /// Refreshes of files open in the editor are skipped; the editor buffer
    /// is the authority for those.
    fn start_watcher(&self, root: &Path) {
        let aggregator = Arc::new(WatchAggregator::new());
        let watcher = match FsWatcher::start(root, Arc::clone(&aggregator)) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!("Cannot watch {}: {}", root.display(), e);
                return;
            }
        };
        let project = self.project();
        let open_documents = Arc::clone(&self.open_documents);
        let task = aggregator.spawn(self.config.read().watch_interval(), move |op: ProjectOp| {
            let project = Arc::clone(&project);
            let skip = matches!(&op, ProjectOp::Refresh(path) if open_documents.contains_key(path));
            async move {
                if skip {
                    debug!("Skipping {}: open in editor", op);
                    return Ok::<(), ProjectError>(());
                }
                project.apply_op(op).await
            }
        });
        info!("Watching {}", watcher.root().display());
        *self.watcher.lock() = Some(watcher);
        self.background.lock().push(task);
    }

    /// Workspace edit that auto-connects the instantiation at `position`,
    /// or `None` when there is nothing to generate.
    pub async fn auto_connect_edit(&self, uri: &Url, position: Position) -> Option<WorkspaceEdit> {
        let path = path_of(uri);
        let (ctx, project) = self.project().fresh_view(&path, AnalyzerMode::FULL).await?;
        let offset = ctx.offset(to_line_col(position))?;
        let instance = find_instance(&ctx, offset)?;

        let mut doc = RopeDocument::new(&ctx.text);
        let report = match AutoConnect::new().connect(&mut doc, &ctx, &project, instance) {
            Ok(report) => report,
            Err(e) => {
                error!("Auto-connect failed in {}: {}", uri, e);
                return None;
            }
        };
        if report.is_empty() {
            debug!("Auto-connect in {}: nothing to generate", uri);
            return None;
        }
        let edit = diff_edit(&ctx, &doc.text())?;
        Some(WorkspaceEdit {
            changes: Some(HashMap::from([(uri.clone(), vec![edit])])),
            ..Default::default()
        })
    }
}

/// File path for a document URI; non-file URIs map to their string form.
pub(crate) fn path_of(uri: &Url) -> PathBuf {
    uri.to_file_path().unwrap_or_else(|_| PathBuf::from(uri.as_str()))
}

/// Single edit turning the text of `ctx` into `new_text`, covering only the
/// span between their common prefix and suffix.
pub(crate) fn diff_edit(ctx: &AnalyzerContext, new_text: &str) -> Option<TextEdit> {
    let old = ctx.text.as_ref();
    if old == new_text {
        return None;
    }
    let prefix: usize = old
        .chars()
        .zip(new_text.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let suffix: usize = old[prefix..]
        .chars()
        .rev()
        .zip(new_text[prefix..].chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    Some(TextEdit {
        range: Range::new(
            to_position(ctx.position(prefix)),
            to_position(ctx.position(old.len() - suffix)),
        ),
        new_text: new_text[prefix..new_text.len() - suffix].to_string(),
    })
}

#[tower_lsp::async_trait]
impl LanguageServer for VhdpLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("VHDP Language Server initializing");

        let config = ServerConfig::from_options(params.initialization_options.as_ref());
        #[allow(deprecated)]
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| folder.uri.clone())
            .or(params.root_uri.clone())
            .and_then(|uri| uri.to_file_path().ok());
        if let Some(root) = &root {
            info!("Workspace root: {}", root.display());
            let project = ProjectAnalysis::with_store(
                root.clone(),
                Arc::clone(&self.analyzer),
                self.sink.clone(),
                DocumentStore::new(config.max_document_size),
            );
            *self.project.write() = Arc::new(project);
        } else {
            self.project().store().set_max_document_size(config.max_document_size);
        }
        *self.config.write() = config;

        // Columns are counted in Unicode scalars
        let position_encoding = params
            .capabilities
            .general
            .as_ref()
            .and_then(|general| general.position_encodings.as_ref())
            .filter(|encodings| encodings.contains(&PositionEncodingKind::UTF32))
            .map(|_| PositionEncodingKind::UTF32);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                position_encoding,
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    will_save: None,
                    will_save_wait_until: None,
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                })),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![".".to_string()]),
                    work_done_progress_options: Default::default(),
                    all_commit_characters: None,
                    completion_item: None,
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    retrigger_characters: None,
                    work_done_progress_options: Default::default(),
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![AUTO_CONNECT_COMMAND.to_string()],
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "vhdp-lsp".to_string(),
                version: Some(crate::VERSION.to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!("VHDP Language Server initialized");
        self.start_publisher();

        let project = self.project();
        if project.workspace().as_os_str().is_empty() {
            info!("No workspace root, running in single-file mode");
            return;
        }
        match project.load_workspace().await {
            Ok(count) => info!("Workspace loaded: {} source files", count),
            Err(e) => {
                self.client
                    .show_message(MessageType::WARNING, format!("VHDP project not loaded: {}", e))
                    .await;
                return;
            }
        }
        if self.config.read().watch {
            self.start_watcher(project.workspace());
        }
    }

    async fn shutdown(&self) -> Result<()> {
        info!("VHDP Language Server shutting down");
        self.watcher.lock().take();
        for task in self.background.lock().drain(..) {
            task.abort();
        }
        self.debounce_channels.clear();
        self.project().close();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let path = path_of(&uri);
        let text = params.text_document.text;
        info!(
            "Document opened: {} ({} bytes, {} lines)",
            uri,
            text.len(),
            text.lines().count()
        );

        if let Err(e) = self.project().set_text(&path, text) {
            error!("Cannot open {}: {}", uri, e);
            self.client
                .show_message(MessageType::ERROR, format!("Document not analyzed: {}", e))
                .await;
            return;
        }
        self.project().pin(&path);
        self.open_documents.insert(path.clone(), uri);

        // For did_open, analyze immediately (no debounce) to provide instant feedback
        self.analyze_now(&path).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let path = path_of(&uri);
        if params.content_changes.is_empty() {
            warn!("Document change event for {} had no content changes", uri);
            return;
        }

        // Each change is relative to the text produced by the previous one;
        // the batch is committed as a whole or not at all
        if let Err(e) = self.project().apply_events(&path, &params.content_changes) {
            error!("Rejected change to {}: {}", uri, e);
            self.client
                .show_message(MessageType::ERROR, format!("Edit not applied: {}", e))
                .await;
            return;
        }
        debug!(
            "Applied {} changes to {}, scheduling debounced analysis",
            params.content_changes.len(),
            uri
        );
        self.schedule_analysis(uri);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("Document saved: {}", uri);
        let path = path_of(&uri);
        if let Some(text) = params.text {
            if let Err(e) = self.project().set_text(&path, text) {
                warn!("Cannot update {} on save: {}", uri, e);
                return;
            }
        }
        // For did_save, analyze immediately to ensure diagnostics are current
        self.analyze_now(&path).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("Document closed: {}", uri);
        let path = path_of(&uri);
        self.open_documents.remove(&path);
        self.debounce_channels.remove(&uri);

        // Project members fall back to their saved content; other files leave
        let project = self.project();
        project.unpin(&path);
        match project.refresh_path(&path).await {
            Ok(true) => {}
            Ok(false) | Err(ProjectError::NotLoaded) => {
                project.remove_path(&path);
            }
            Err(e) => {
                warn!("Cannot reload {} after close: {}", path.display(), e);
                project.remove_path(&path);
            }
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let trigger = params
            .context
            .as_ref()
            .and_then(|context| context.trigger_character.as_deref());

        debug!("Completion request for {} at {}:{}", uri, position.line, position.character);

        let Some((ctx, project)) = self.project().fresh_view(&path_of(uri), QUERY_MODE).await else {
            debug!("No completion available for {} (document not found)", uri);
            return Ok(None);
        };
        let items = get_completions(&ctx, &project, position, trigger);
        debug!(
            "Providing {} completion items for {} at {}:{}",
            items.len(),
            uri,
            position.line,
            position.character
        );
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        // Hover shows diagnostics, so it needs the Check phase too
        let Some((ctx, project)) = self.project().fresh_view(&path_of(uri), AnalyzerMode::FULL).await else {
            return Ok(None);
        };
        Ok(get_hover(&ctx, &project, position))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((ctx, project)) = self.project().fresh_view(&path_of(uri), QUERY_MODE).await else {
            return Ok(None);
        };
        Ok(get_signature_help(&ctx, &project, position))
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((ctx, project)) = self.project().fresh_view(&path_of(uri), QUERY_MODE).await else {
            return Ok(None);
        };
        let Some(target) = get_definition(&ctx, &project, position) else {
            return Ok(None);
        };
        let target_uri = if target.path == ctx.path {
            uri.clone()
        } else {
            match self.open_documents.get(&target.path) {
                Some(open) => open.value().clone(),
                None => match Url::from_file_path(&target.path) {
                    Ok(target_uri) => target_uri,
                    Err(()) => {
                        warn!("Cannot build URI for {}", target.path.display());
                        return Ok(None);
                    }
                },
            }
        };
        Ok(Some(GotoDefinitionResponse::Scalar(Location {
            uri: target_uri,
            range: target.range,
        })))
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> Result<Option<DocumentSymbolResponse>> {
        let uri = &params.text_document.uri;

        let Some((ctx, _)) = self.project().fresh_view(&path_of(uri), AnalyzerMode::INDEXING).await else {
            return Ok(None);
        };
        Ok(Some(DocumentSymbolResponse::Nested(get_document_symbols(&ctx))))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = &params.text_document.uri;
        let position = params.range.start;

        let Some((ctx, _)) = self.project().fresh_view(&path_of(uri), QUERY_MODE).await else {
            return Ok(None);
        };
        let instance = ctx
            .offset(to_line_col(position))
            .and_then(|offset| find_instance(&ctx, offset))
            .filter(|instance| has_markers(&ctx, *instance));
        let Some(instance) = instance else {
            return Ok(Some(Vec::new()));
        };

        let title = format!("Auto-connect `{}`", ctx.segment(instance).instance_name());
        let action = CodeAction {
            title: title.clone(),
            kind: Some(CodeActionKind::REFACTOR_REWRITE),
            command: Some(Command {
                title,
                command: AUTO_CONNECT_COMMAND.to_string(),
                arguments: Some(vec![serde_json::json!(uri), serde_json::json!(position)]),
            }),
            ..Default::default()
        };
        Ok(Some(vec![CodeActionOrCommand::CodeAction(action)]))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        if params.command != AUTO_CONNECT_COMMAND {
            return Err(Error::invalid_params(format!("unknown command '{}'", params.command)));
        }
        let (uri, position) = match params.arguments.as_slice() {
            [uri, position, ..] => {
                let uri: Url = serde_json::from_value(uri.clone())
                    .map_err(|e| Error::invalid_params(format!("invalid document URI: {}", e)))?;
                let position: Position = serde_json::from_value(position.clone())
                    .map_err(|e| Error::invalid_params(format!("invalid position: {}", e)))?;
                (uri, position)
            }
            _ => return Err(Error::invalid_params("expected [uri, position]")),
        };

        let Some(edit) = self.auto_connect_edit(&uri, position).await else {
            return Ok(None);
        };
        match self.client.apply_edit(edit).await {
            Ok(response) if response.applied => info!("Auto-connect applied to {}", uri),
            Ok(response) => warn!(
                "Client rejected auto-connect edit for {}: {}",
                uri,
                response.failure_reason.unwrap_or_default()
            ),
            Err(e) => error!("Cannot apply auto-connect edit to {}: {}", uri, e),
        }
        Ok(None)
    }
}
