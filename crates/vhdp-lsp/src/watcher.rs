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

//! Debounced watch aggregator.
//!
//! Filesystem notifications arrive noisy: duplicated, reordered, split into
//! several events for a single save. [`WatchAggregator`] queues them per
//! path and, once per tick, turns the queue into a clean batch of
//! [`ProjectOp`]s where only the last event of each path counts.
//!
//! ```text
//! notify thread ──push──▶ [pending: path → events] ◀──drain── interval tick
//!                                                              │
//!                                               one task per ProjectOp
//! ```
//!
//! Enqueue and drain share one lock; drain swaps the map out under it, so an
//! event arriving while a batch is processed lands in the next tick and is
//! neither lost nor seen twice.

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

/// Raw filesystem event for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Changed,
    Deleted,
    /// The path is the new name; `from` is the old one when the platform
    /// reports both ends of the rename together.
    Renamed { from: Option<PathBuf> },
}

/// Structural operation on the project derived from the last event of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOp {
    Add(PathBuf),
    Refresh(PathBuf),
    Remove(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
}

impl fmt::Display for ProjectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(path) => write!(f, "add {}", path.display()),
            Self::Refresh(path) => write!(f, "refresh {}", path.display()),
            Self::Remove(path) => write!(f, "remove {}", path.display()),
            Self::Rename { from, to } => write!(f, "rename {} -> {}", from.display(), to.display()),
        }
    }
}

/// Queued events per path, each tagged with its arrival order.
#[derive(Debug, Default)]
struct Pending {
    next: u64,
    events: HashMap<PathBuf, Vec<(u64, WatchEventKind)>>,
}

/// Per-path event queue drained on a fixed interval.
#[derive(Debug, Default)]
pub struct WatchAggregator {
    pending: Mutex<Pending>,
}

impl WatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one event. Callable from any thread.
    pub fn push(&self, path: impl Into<PathBuf>, kind: WatchEventKind) {
        let path = path.into();
        trace!("Watch event {:?} for {}", kind, path.display());
        let mut pending = self.pending.lock();
        let seq = pending.next;
        pending.next += 1;
        pending.events.entry(path).or_default().push((seq, kind));
    }

    /// Number of paths with queued events.
    pub fn pending_paths(&self) -> usize {
        self.pending.lock().events.len()
    }

    /// Take the queued batch and collapse it to one operation per path,
    /// ordered by path.
    ///
    /// A paired rename consumes the old path's own events when they happened
    /// before it. When the old path reappears after the rename (editors that
    /// save by renaming the original to a backup), the old path keeps its own
    /// operation and the new name is simply added.
    pub fn drain(&self) -> Vec<ProjectOp> {
        let batch = std::mem::take(&mut self.pending.lock().events);
        let last: HashMap<PathBuf, (u64, WatchEventKind)> = batch
            .into_iter()
            .filter_map(|(path, mut events)| events.pop().map(|event| (path, event)))
            .collect();

        let mut consumed = HashSet::new();
        let mut ops: Vec<(PathBuf, ProjectOp)> = last
            .iter()
            .map(|(path, (seq, kind))| {
                let op = match kind {
                    WatchEventKind::Created => ProjectOp::Add(path.clone()),
                    WatchEventKind::Changed => ProjectOp::Refresh(path.clone()),
                    WatchEventKind::Deleted => ProjectOp::Remove(path.clone()),
                    WatchEventKind::Renamed { from: None } => ProjectOp::Add(path.clone()),
                    WatchEventKind::Renamed { from: Some(from) } => match rename_origin(&last, from, *seq, &mut consumed) {
                        Some(origin) => ProjectOp::Rename {
                            from: origin,
                            to: path.clone(),
                        },
                        None => ProjectOp::Add(path.clone()),
                    },
                };
                (path.clone(), op)
            })
            .collect();

        ops.retain(|(path, _)| !consumed.contains(path));
        ops.sort_by(|a, b| a.0.cmp(&b.0));
        ops.into_iter().map(|(_, op)| op).collect()
    }

    /// Drain once and run `handler` for every operation, each on its own
    /// task. Failures are logged and counted; they never stop the others.
    pub async fn dispatch<F, Fut, E>(&self, handler: &F) -> usize
    where
        F: Fn(ProjectOp) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let ops = self.drain();
        if ops.is_empty() {
            return 0;
        }
        debug!("Dispatching {} watch operations", ops.len());

        let mut tasks = JoinSet::new();
        for op in ops {
            let label = op.to_string();
            let pending = handler(op);
            tasks.spawn(async move { pending.await.map_err(|e| (label, e.to_string())) });
        }

        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((op, error))) => {
                    failures += 1;
                    warn!("Watch operation '{}' failed: {}", op, error);
                }
                Err(error) => {
                    failures += 1;
                    warn!("Watch operation task aborted: {}", error);
                }
            }
        }
        failures
    }

    /// Start the interval task that drains and dispatches every `interval`.
    pub fn spawn<F, Fut, E>(self: &Arc<Self>, interval: Duration, handler: F) -> JoinHandle<()>
    where
        F: Fn(ProjectOp) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                aggregator.dispatch(&handler).await;
            }
        })
    }
}

/// Path a rename at `seq` moved away from, following earlier renames into
/// `from` within the same batch. Paths whose events the rename supersedes
/// are recorded in `consumed`.
///
/// `None` when `from` exists again after the rename: its content stays
/// where it is and the rename target is a new file.
fn rename_origin(
    last: &HashMap<PathBuf, (u64, WatchEventKind)>,
    from: &Path,
    seq: u64,
    consumed: &mut HashSet<PathBuf>,
) -> Option<PathBuf> {
    let mut from = from.to_path_buf();
    let mut seq = seq;
    loop {
        match last.get(&from) {
            None => return Some(from),
            Some((later, kind)) if *later > seq => {
                if *kind != WatchEventKind::Deleted {
                    return None;
                }
                consumed.insert(from.clone());
                return Some(from);
            }
            Some((earlier, WatchEventKind::Renamed { from: Some(previous) })) => {
                consumed.insert(from.clone());
                seq = *earlier;
                from = previous.clone();
            }
            Some(_) => {
                consumed.insert(from.clone());
                return Some(from);
            }
        }
    }
}

/// Bridge from `notify` to a [`WatchAggregator`]. Watching stops on drop.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FsWatcher {
    /// Watch `root` recursively, feeding every relevant event into `aggregator`.
    pub fn start(root: &Path, aggregator: Arc<WatchAggregator>) -> notify::Result<Self> {
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for (path, kind) in classify(&event) {
                        aggregator.push(path, kind);
                    }
                }
                Err(error) => warn!("Filesystem watcher error: {:?}", error),
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!("Watching {}", root.display());
        Ok(Self {
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map a `notify` event to per-path watch events.
///
/// Access events and events without paths produce nothing. A rename seen
/// only from its old side is reported as a deletion of the old path.
pub fn classify(event: &Event) -> Vec<(PathBuf, WatchEventKind)> {
    let each = |kind: WatchEventKind| {
        event
            .paths
            .iter()
            .map(|p| (p.clone(), kind.clone()))
            .collect::<Vec<_>>()
    };
    match &event.kind {
        EventKind::Create(_) => each(WatchEventKind::Created),
        EventKind::Remove(_) => each(WatchEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to]) => vec![(
                to.clone(),
                WatchEventKind::Renamed {
                    from: Some(from.clone()),
                },
            )],
            (RenameMode::From, _) => each(WatchEventKind::Deleted),
            (RenameMode::To, _) => each(WatchEventKind::Renamed { from: None }),
            // Platforms that do not say which side they report.
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        WatchEventKind::Renamed { from: None }
                    } else {
                        WatchEventKind::Deleted
                    };
                    (p.clone(), kind)
                })
                .collect(),
        },
        EventKind::Modify(_) => each(WatchEventKind::Changed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
