//! Action Dispatcher
//!
//! Executes `Ready` commands against their registered handler.
//!
//! Bulk actions (descriptors with a `bulk_parameter`) run one handler
//! invocation per target. Targets run concurrently as separate tasks, capped
//! by a semaphore shared by every command on this dispatcher. Each target is
//! isolated: a failure or panic is recorded for that target only and the rest
//! keep running. Idempotent actions get one retry after a transient failure.
//!
//! Cancellation is cooperative. Once requested, no further targets are
//! scheduled; targets already in flight complete and are recorded, and
//! never-scheduled targets are reported as `Cancelled`.
//!
//! Progress channels exist from the first subscription or dispatch until the
//! command finishes. A subscription whose command is never dispatched is
//! closed once its receivers are gone or `subscription_ttl` passes.
//! Subscribing to a command that already finished yields a closed receiver.
//!
//! Reversible actions that succeeded on at least one target get a single-use
//! rollback token covering exactly the succeeded targets.

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use shutter_core::{
    Command, DispatchConfig, ExecutionResult, ExecutionStatus, Parameters, Quantity, ReasonCode,
    RollbackToken, TargetError, TargetOutcome, TargetResult,
};
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::descriptor::ActionDescriptor;
use crate::error::DispatchError;
use crate::handler::{ActionHandler, TargetResolver};
use crate::progress::ProgressEvent;
use crate::registry::ActionRegistry;

/// What a rollback of one command undid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackReport {
    pub token: RollbackToken,
    pub command_id: Uuid,
    pub action_id: String,
    /// One entry per reverted target.
    pub results: Vec<TargetResult>,
}

/// Finished command ids remembered so late subscribers get a closed channel.
const FINISHED_MEMORY: usize = 1024;

struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
    opened: Instant,
}

struct RollbackRecord {
    command_id: Uuid,
    action_id: String,
    handler: Arc<dyn ActionHandler>,
    parameters: Parameters,
    succeeded: Vec<(Option<String>, Value)>,
}

pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    resolver: Option<Arc<dyn TargetResolver>>,
    config: DispatchConfig,
    permits: Arc<Semaphore>,
    channels: Mutex<HashMap<Uuid, ProgressChannel>>,
    finished: Mutex<VecDeque<Uuid>>,
    running: Mutex<HashMap<Uuid, watch::Sender<bool>>>,
    rollbacks: Mutex<HashMap<RollbackToken, RollbackRecord>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionRegistry>, config: DispatchConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            registry,
            resolver: None,
            config,
            permits,
            channels: Mutex::new(HashMap::new()),
            finished: Mutex::new(VecDeque::new()),
            running: Mutex::new(HashMap::new()),
            rollbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver used to expand target selections such as "the last 5".
    pub fn with_resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Run a `Ready` command to completion.
    ///
    /// Errors are returned only when nothing was invoked: the command is not
    /// ready, its action is unknown, its targets cannot be resolved, or it is
    /// already executing. Handler failures are reported inside the result.
    pub async fn execute(&self, command: &Command) -> Result<ExecutionResult, DispatchError> {
        let prepared = self.prepare(command).await;
        let (descriptor, jobs) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.close_progress(command.id);
                return Err(err);
            }
        };

        let (_running, mut cancel_rx) = self.begin(command.id)?;
        let progress = self.channel(command.id);
        let total = jobs.len();
        tracing::info!(
            command_id = %command.id,
            action = %descriptor.id,
            targets = total,
            "Dispatching command"
        );

        let parameters = Arc::new(command.parameters.clone());
        let retry = descriptor.idempotent.then(|| self.config.retry_backoff());
        let completed = Arc::new(Mutex::new(0_usize));

        let mut scheduled: Vec<(Option<String>, JoinHandle<TargetResult>)> = Vec::with_capacity(total);
        let mut unscheduled: Vec<Option<String>> = Vec::new();
        let mut jobs = jobs.into_iter();

        while let Some(target) = jobs.next() {
            let permit = tokio::select! {
                biased;
                _ = cancellation(&mut cancel_rx) => None,
                permit = self.permits.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                unscheduled.push(target);
                unscheduled.extend(jobs.by_ref());
                break;
            };

            let handler = descriptor.handler.clone();
            let parameters = parameters.clone();
            let completed = completed.clone();
            let progress = progress.clone();
            let command_id = command.id;
            let task_target = target.clone();
            let handle = tokio::spawn(async move {
                let result = invoke_target(handler, task_target, &parameters, retry).await;
                report_progress(&completed, &progress, command_id, total);
                drop(permit);
                result
            });
            scheduled.push((target, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (target, handle) in scheduled {
            results.push(match handle.await {
                Ok(result) => result,
                Err(err) => TargetResult::failed(
                    target,
                    ReasonCode::HandlerError,
                    format!("target task aborted: {err}"),
                    1,
                ),
            });
        }
        if !unscheduled.is_empty() {
            tracing::info!(
                command_id = %command.id,
                skipped = unscheduled.len(),
                "Cancelled before scheduling remaining targets"
            );
        }
        // a cancel that arrives after every target was scheduled changes nothing
        let cancelled = !unscheduled.is_empty();
        results.extend(unscheduled.into_iter().map(TargetResult::cancelled));

        let failed = results
            .iter()
            .filter(|r| r.outcome == TargetOutcome::Failed)
            .count();
        let status = if cancelled {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::from_counts(total, failed)
        };
        let (reason, message) = summarize(status, &results);
        let rollback_token = self.record_rollback(command, &descriptor, &results);

        let _ = progress.send(ProgressEvent::Finished {
            command_id: command.id,
            status,
        });
        self.finish_progress(command.id);

        tracing::info!(
            command_id = %command.id,
            action = %descriptor.id,
            status = %status,
            succeeded = results.iter().filter(|r| r.is_success()).count(),
            failed,
            "Command finished"
        );

        Ok(ExecutionResult {
            command_id: command.id,
            action_id: descriptor.id.clone(),
            status,
            per_target_results: results,
            rollback_token,
            reason,
            message,
        })
    }

    /// Request cancellation of an executing command. Returns `false` when
    /// the command is not executing.
    pub fn cancel(&self, command_id: Uuid) -> bool {
        match lock(&self.running).get(&command_id) {
            Some(tx) => {
                tx.send_replace(true);
                tracing::info!(command_id = %command_id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Progress events of a command from now on. May be called before the
    /// command is dispatched; past events are not replayed. The receiver is
    /// already closed when the command has finished.
    pub fn subscribe_progress(&self, command_id: Uuid) -> broadcast::Receiver<ProgressEvent> {
        self.prune_progress();
        if lock(&self.finished).contains(&command_id) {
            return broadcast::channel(1).1;
        }
        self.channel(command_id).subscribe()
    }

    /// Close the progress channel of a command that will not be dispatched.
    /// Has no effect while the command is executing.
    pub fn close_progress(&self, command_id: Uuid) {
        let running = lock(&self.running);
        if !running.contains_key(&command_id) {
            lock(&self.channels).remove(&command_id);
        }
    }

    /// Forward a command's future progress events to `callback` until it
    /// finishes. Must be called within a Tokio runtime.
    pub fn on_progress<F>(&self, command_id: Uuid, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(ProgressEvent) + Send + 'static,
    {
        let mut rx = self.subscribe_progress(command_id);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let finished = event.is_finished();
                        callback(event);
                        if finished {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(command_id = %command_id, skipped, "Progress subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Action a rollback token would revert, if the token is still valid.
    pub fn rollback_action(&self, token: RollbackToken) -> Option<String> {
        lock(&self.rollbacks).get(&token).map(|r| r.action_id.clone())
    }

    /// Undo the succeeded targets recorded under `token`. Tokens are
    /// single-use.
    pub async fn rollback(&self, token: RollbackToken) -> Result<RollbackReport, DispatchError> {
        let record = lock(&self.rollbacks)
            .remove(&token)
            .ok_or(DispatchError::UnknownRollbackToken { token })?;

        tracing::info!(
            token = %token,
            command_id = %record.command_id,
            action = %record.action_id,
            targets = record.succeeded.len(),
            "Rolling back command"
        );

        let mut results = Vec::with_capacity(record.succeeded.len());
        for (target, output) in &record.succeeded {
            let outcome = AssertUnwindSafe(record.handler.revert(target.as_deref(), &record.parameters, output))
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(())) => TargetResult::succeeded(target.clone(), Value::Null, 1),
                Ok(Err(err)) => {
                    tracing::warn!(token = %token, target_id = ?target, error = %err, "Revert failed");
                    TargetResult::failed(target.clone(), err.reason(), err.message, 1)
                }
                Err(panic) => TargetResult::failed(
                    target.clone(),
                    ReasonCode::HandlerError,
                    format!("revert panicked: {}", panic_message(&*panic)),
                    1,
                ),
            };
            results.push(result);
        }

        Ok(RollbackReport {
            token,
            command_id: record.command_id,
            action_id: record.action_id,
            results,
        })
    }

    /// Concrete target ids for a bulk action, in parameter order with
    /// duplicates removed. `None` for single-target invocations.
    async fn expand_targets(
        &self,
        descriptor: &ActionDescriptor,
        parameters: &Parameters,
    ) -> Result<Option<Vec<String>>, DispatchError> {
        let Some(name) = &descriptor.bulk_parameter else {
            return Ok(None);
        };
        let unresolved = |reason: String| DispatchError::UnresolvedTargets {
            parameter: name.clone(),
            reason,
        };
        let items = match parameters.get(name) {
            None => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(other) => return Err(unresolved(format!("expected an array, got {other}"))),
        };

        let mut targets = Vec::new();
        for item in items {
            match item {
                Value::String(id) => targets.push(id.clone()),
                Value::Object(_) => {
                    let selection: Quantity = serde_json::from_value(item.clone())
                        .map_err(|e| unresolved(format!("invalid selection {item}: {e}")))?;
                    let resolver = self
                        .resolver
                        .as_ref()
                        .ok_or_else(|| unresolved("no target resolver configured".to_string()))?;
                    let resolved = resolver
                        .resolve(&descriptor.id, &selection)
                        .await
                        .map_err(|e| unresolved(e.message))?;
                    tracing::debug!(
                        action = %descriptor.id,
                        selection = ?selection,
                        resolved = resolved.len(),
                        "Expanded target selection"
                    );
                    targets.extend(resolved);
                }
                other => return Err(unresolved(format!("unsupported target {other}"))),
            }
        }

        let mut seen = HashSet::new();
        targets.retain(|t| seen.insert(t.clone()));
        if targets.is_empty() {
            return Err(unresolved("selection matched no targets".to_string()));
        }
        Ok(Some(targets))
    }

    fn begin(&self, command_id: Uuid) -> Result<(Running<'_>, watch::Receiver<bool>), DispatchError> {
        let mut running = lock(&self.running);
        if running.contains_key(&command_id) {
            return Err(DispatchError::AlreadyRunning { command_id });
        }
        let (tx, rx) = watch::channel(false);
        running.insert(command_id, tx);
        Ok((
            Running {
                dispatcher: self,
                command_id,
            },
            rx,
        ))
    }

    async fn prepare(
        &self,
        command: &Command,
    ) -> Result<(Arc<ActionDescriptor>, Vec<Option<String>>), DispatchError> {
        if !command.is_ready() {
            return Err(DispatchError::NotReady {
                command_id: command.id,
            });
        }
        let descriptor = self.registry.lookup(&command.action_id)?;
        let jobs = match self.expand_targets(&descriptor, &command.parameters).await? {
            Some(targets) => targets.into_iter().map(Some).collect(),
            None => vec![None],
        };
        Ok((descriptor, jobs))
    }

    fn channel(&self, command_id: Uuid) -> broadcast::Sender<ProgressEvent> {
        let capacity = self.config.progress_buffer.max(1);
        lock(&self.channels)
            .entry(command_id)
            .or_insert_with(|| ProgressChannel {
                sender: broadcast::channel(capacity).0,
                opened: Instant::now(),
            })
            .sender
            .clone()
    }

    fn finish_progress(&self, command_id: Uuid) {
        lock(&self.channels).remove(&command_id);
        let mut finished = lock(&self.finished);
        if finished.len() == FINISHED_MEMORY {
            finished.pop_front();
        }
        finished.push_back(command_id);
    }

    /// Drop channels of commands that are not executing and either have no
    /// receivers left or have waited longer than the subscription TTL.
    fn prune_progress(&self) {
        let ttl = self.config.subscription_ttl();
        let running = lock(&self.running);
        lock(&self.channels).retain(|id, channel| {
            running.contains_key(id) || (channel.sender.receiver_count() > 0 && channel.opened.elapsed() < ttl)
        });
    }

    fn record_rollback(
        &self,
        command: &Command,
        descriptor: &ActionDescriptor,
        results: &[TargetResult],
    ) -> Option<RollbackToken> {
        let succeeded: Vec<(Option<String>, Value)> = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| (r.target_id.clone(), r.output.clone()))
            .collect();
        if !descriptor.reversible || succeeded.is_empty() {
            return None;
        }
        let token = RollbackToken::new();
        lock(&self.rollbacks).insert(
            token,
            RollbackRecord {
                command_id: command.id,
                action_id: descriptor.id.clone(),
                handler: descriptor.handler.clone(),
                parameters: command.parameters.clone(),
                succeeded,
            },
        );
        Some(token)
    }
}

/// Removes the command's cancel switch when execution ends, including when
/// the `execute` future is dropped early.
struct Running<'a> {
    dispatcher: &'a Dispatcher,
    command_id: Uuid,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        lock(&self.dispatcher.running).remove(&self.command_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves once cancellation has been requested.
async fn cancellation(rx: &mut watch::Receiver<bool>) {
    loop {
        let cancelled = *rx.borrow_and_update();
        if cancelled {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn invoke_target(
    handler: Arc<dyn ActionHandler>,
    target: Option<String>,
    parameters: &Parameters,
    retry: Option<Duration>,
) -> TargetResult {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let outcome = AssertUnwindSafe(handler.invoke(target.as_deref(), parameters))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(output)) => return TargetResult::succeeded(target, output, attempts),
            Ok(Err(err)) => match retry {
                Some(backoff) if err.is_transient() && attempts == 1 => {
                    tracing::warn!(target_id = ?target, error = %err, "Transient failure, retrying once");
                    tokio::time::sleep(backoff).await;
                }
                _ => return TargetResult::failed(target, err.reason(), err.message, attempts),
            },
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::warn!(target_id = ?target, panic = %message, "Action handler panicked");
                return TargetResult::failed(
                    target,
                    ReasonCode::HandlerError,
                    format!("handler panicked: {message}"),
                    attempts,
                );
            }
        }
    }
}

fn report_progress(
    completed: &Mutex<usize>,
    progress: &broadcast::Sender<ProgressEvent>,
    command_id: Uuid,
    total: usize,
) {
    // sent under the lock so `completed` reaches subscribers in order
    let mut done = lock(completed);
    *done += 1;
    let _ = progress.send(ProgressEvent::Progress {
        command_id,
        completed: *done,
        total,
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Reason and message for a non-succeeded result.
fn summarize(status: ExecutionStatus, results: &[TargetResult]) -> (Option<ReasonCode>, Option<String>) {
    match status {
        ExecutionStatus::Succeeded => (None, None),
        ExecutionStatus::Cancelled => {
            let skipped = results
                .iter()
                .filter(|r| r.outcome == TargetOutcome::Cancelled)
                .count();
            (
                Some(ReasonCode::Cancelled),
                Some(format!(
                    "command cancelled; {skipped} of {} targets were not scheduled",
                    results.len()
                )),
            )
        }
        ExecutionStatus::Failed | ExecutionStatus::PartiallyFailed => {
            let errors: Vec<&TargetError> = results
                .iter()
                .filter(|r| r.outcome == TargetOutcome::Failed)
                .filter_map(|r| r.error.as_ref())
                .collect();
            let reason = errors.first().map_or(ReasonCode::HandlerError, |e| e.reason);
            let message = match errors.as_slice() {
                [only] if results.len() == 1 => only.message.clone(),
                _ => format!("{} of {} targets failed", errors.len(), results.len()),
            };
            (Some(reason), Some(message))
        }
    }
}
