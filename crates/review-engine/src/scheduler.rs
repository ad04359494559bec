//! Evaluation scheduling: bulk worker pool and interactive session.
//!
//! Bulk pre-analysis fans a finished game out over `min(max_workers,
//! positions)` tasks, each owning one oracle; the only shared state is
//! the work index, the completion counter and index-disjoint result
//! slots. The interactive path is deliberately the opposite: one
//! oracle, one consumer, a strictly priority-ordered queue, so
//! background evaluation never starves the position the user is
//! looking at.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use review_core::classify::{classify, Classification, ClassificationResult, MoveContext, PreviousContext};
use review_core::eval::EvaluationLine;
use review_core::move_tree::{MoveRecord, MoveTree};
use review_core::NodeId;

use crate::cloud::CloudEvalClient;
use crate::config::EngineConfig;
use crate::oracle::{OracleAbort, PositionOracle};

/// Evaluate every position of a finished game.
///
/// Results come back indexed by input order regardless of completion
/// order. `progress` is called with 0..=100 as positions complete.
pub async fn evaluate_positions<F>(
    config: &EngineConfig,
    fens: Vec<String>,
    progress: F,
) -> Vec<Vec<EvaluationLine>>
where
    F: Fn(u8) + Send + Sync + 'static,
{
    let total = fens.len();
    if total == 0 {
        progress(100);
        return Vec::new();
    }
    let workers = config.max_workers.clamp(1, total);
    info!(total, workers, depth = config.search_depth, "Starting bulk evaluation");

    let fens = Arc::new(fens);
    let next = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));
    let results: Arc<Mutex<Vec<Option<Vec<EvaluationLine>>>>> =
        Arc::new(Mutex::new(vec![None; total]));
    let progress = Arc::new(progress);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let config = config.clone();
        let fens = fens.clone();
        let next = next.clone();
        let done = done.clone();
        let results = results.clone();
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let mut oracle = PositionOracle::new(&config);
            let cloud = config
                .cloud_eval_url
                .clone()
                .map(|url| CloudEvalClient::new(url, config.cloud_timeout_ms));

            loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= total {
                    break;
                }
                let fen = &fens[idx];

                let mut lines = None;
                if let Some(cloud) = &cloud {
                    lines = cloud
                        .lookup(fen, config.search_depth, config.multipv)
                        .await;
                    if lines.is_some() {
                        debug!(idx, "Cloud eval hit");
                    }
                }
                let lines = match lines {
                    Some(l) => l,
                    None => oracle.evaluate(fen).await,
                };

                // Slot write, counter bump and progress report under
                // one lock so percentages arrive in order
                {
                    let mut slots = results.lock().unwrap();
                    slots[idx] = Some(lines);
                    let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(((completed * 100) / total) as u8);
                }
            }
            oracle.terminate().await;
        }));
    }

    let _ = futures::future::join_all(handles).await;

    let mut slots = results.lock().unwrap();
    slots.drain(..).map(|s| s.unwrap_or_default()).collect()
}

/// What an interactive evaluation hands back to its callback.
pub struct EvalOutcome {
    pub node: NodeId,
    /// `None` only for the root, which carries no move to classify.
    pub classification: Option<ClassificationResult>,
    pub lines: Vec<EvaluationLine>,
    /// Lines for the position the move was played from
    pub previous_lines: Vec<EvaluationLine>,
    /// Path of the engine that answered, if one is still alive
    pub engine: Option<String>,
}

type Callback = Box<dyn FnOnce(EvalOutcome) + Send + 'static>;

/// Foreground priority: the node currently displayed.
pub const PRIORITY_FOREGROUND: u8 = 0;
/// Background priority: speculative evaluation.
pub const PRIORITY_BACKGROUND: u8 = 1;

struct QueuedTask {
    node: NodeId,
    fen: String,
    previous_fen: String,
    priority: u8,
    // Snapshot taken from the tree at submission time so the consumer
    // can classify without touching shared tree state
    record: Option<MoveRecord>,
    history: Vec<String>,
    previous_classification: Option<Classification>,
    /// Parent lines already stored in the tree; empty means unknown
    known_previous_lines: Vec<EvaluationLine>,
    callback: Callback,
}

/// Synchronous session bookkeeping: the queue, the in-flight marker and
/// the result caches. Lives behind one mutex; no await ever happens
/// while it is held.
struct SessionState {
    queue: Vec<QueuedTask>,
    in_flight: Option<NodeId>,
    cache: HashMap<NodeId, Vec<EvaluationLine>>,
    fen_cache: HashMap<String, Vec<EvaluationLine>>,
    shutdown: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            queue: Vec::new(),
            in_flight: None,
            cache: HashMap::new(),
            fen_cache: HashMap::new(),
            shutdown: false,
        }
    }

    /// Insert by priority, FIFO within a priority band. Returns false
    /// when the node is already queued, mid-evaluation or resolved.
    fn enqueue(&mut self, task: QueuedTask) -> bool {
        if self.shutdown
            || self.in_flight == Some(task.node)
            || self.cache.contains_key(&task.node)
            || self.queue.iter().any(|t| t.node == task.node)
        {
            return false;
        }
        let pos = self
            .queue
            .iter()
            .position(|t| t.priority > task.priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, task);
        true
    }

    fn next(&mut self) -> Option<QueuedTask> {
        if self.queue.is_empty() {
            return None;
        }
        let task = self.queue.remove(0);
        self.in_flight = Some(task.node);
        Some(task)
    }

    fn complete(
        &mut self,
        node: NodeId,
        fen: &str,
        lines: &[EvaluationLine],
        previous_fen: &str,
        previous_lines: &[EvaluationLine],
    ) {
        self.in_flight = None;
        self.cache.insert(node, lines.to_vec());
        self.fen_cache.insert(fen.to_string(), lines.to_vec());
        self.fen_cache
            .entry(previous_fen.to_string())
            .or_insert_with(|| previous_lines.to_vec());
    }
}

/// Interactive evaluation session: one oracle, one consumer task.
pub struct AnalysisSession {
    state: Arc<Mutex<SessionState>>,
    notify: Arc<Notify>,
    abort: OracleAbort,
    worker: JoinHandle<()>,
}

impl AnalysisSession {
    pub fn new(config: &EngineConfig) -> Self {
        let state = Arc::new(Mutex::new(SessionState::new()));
        let notify = Arc::new(Notify::new());
        let oracle = PositionOracle::new(config);
        let abort = oracle.abort_handle();
        let worker = tokio::spawn(run_consumer(state.clone(), notify.clone(), oracle));
        Self {
            state,
            notify,
            abort,
            worker,
        }
    }

    /// Fire-and-forget submission. The callback runs exactly once when
    /// the evaluation completes; a deduplicated submission (node
    /// already queued, in flight or resolved) returns false and the
    /// callback is dropped unused.
    pub fn add_to_queue<F>(
        &self,
        node: NodeId,
        fen: String,
        previous_fen: String,
        priority: u8,
        callback: F,
        tree: &MoveTree,
    ) -> bool
    where
        F: FnOnce(EvalOutcome) + Send + 'static,
    {
        let record = tree.node(node).and_then(|n| n.record.clone());
        let history = tree.moves_to_node(node).unwrap_or_default();
        let parent = tree.node(node).and_then(|n| n.parent).and_then(|p| tree.node(p));
        let previous_classification = parent
            .and_then(|p| p.classification.as_ref())
            .map(|c| c.classification);
        let known_previous_lines = parent.map(|p| p.lines.clone()).unwrap_or_default();

        let accepted = self.state.lock().unwrap().enqueue(QueuedTask {
            node,
            fen,
            previous_fen,
            priority,
            record,
            history,
            previous_classification,
            known_previous_lines,
            callback: Box::new(callback),
        });
        if accepted {
            self.notify.notify_one();
        } else {
            debug!(node = %node, "Duplicate evaluation request skipped");
        }
        accepted
    }

    /// Resolved lines for a node, if the session has them.
    pub fn cached_lines(&self, node: NodeId) -> Option<Vec<EvaluationLine>> {
        self.state.lock().unwrap().cache.get(&node).cloned()
    }

    /// Abort the in-flight evaluation and discard all queued work. No
    /// pending callback is invoked.
    pub async fn shutdown(self) {
        {
            let mut state = self.state.lock().unwrap();
            state.shutdown = true;
            let discarded = state.queue.len();
            state.queue.clear();
            if discarded > 0 {
                debug!(discarded, "Discarded queued evaluations on shutdown");
            }
        }
        self.abort.abort();
        self.notify.notify_one();
        let _ = self.worker.await;
    }
}

async fn run_consumer(
    state: Arc<Mutex<SessionState>>,
    notify: Arc<Notify>,
    mut oracle: PositionOracle,
) {
    loop {
        let task = {
            let mut s = state.lock().unwrap();
            if s.shutdown {
                break;
            }
            s.next()
        };
        let task = match task {
            Some(t) => t,
            None => {
                notify.notified().await;
                continue;
            }
        };

        // Resolve the reference position first so the consumer can
        // classify against it. Lines already known to the session cache
        // or stored on the parent tree node skip the engine entirely.
        let previous_cached = state
            .lock()
            .unwrap()
            .fen_cache
            .get(&task.previous_fen)
            .cloned();
        let previous_lines = match previous_cached {
            Some(lines) => lines,
            None if !task.known_previous_lines.is_empty() => task.known_previous_lines.clone(),
            None => oracle.evaluate(&task.previous_fen).await,
        };
        let lines = oracle.evaluate(&task.fen).await;

        let deliver = {
            let mut s = state.lock().unwrap();
            if s.shutdown {
                s.in_flight = None;
                false
            } else {
                s.complete(task.node, &task.fen, &lines, &task.previous_fen, &previous_lines);
                true
            }
        };
        if deliver {
            let classification = task.record.as_ref().map(|record| {
                classify(
                    &MoveContext {
                        fen: &task.fen,
                        lines: &lines,
                        record: Some(record),
                    },
                    &PreviousContext {
                        fen: &task.previous_fen,
                        lines: &previous_lines,
                        classification: task.previous_classification,
                    },
                    &task.history,
                )
            });
            (task.callback)(EvalOutcome {
                node: task.node,
                classification,
                lines,
                previous_lines,
                engine: oracle.engine_name().map(str::to_string),
            });
        }
    }
    oracle.terminate().await;
}
