//! The dispatch loop.
//!
//! A run bootstraps by handing the seed payload straight to the entry step's
//! default handler. Every event a handler emits is queued with that handler's
//! step as its source; the loop dequeues FIFO, resolves targets through the
//! router and invokes them, committing each invocation's state and queueing
//! its emissions only when it succeeds. The run ends when the queue drains.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use docflow_core::{Document, Payload, StepState};
use events::{EventBus, RunEvent};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::{
    CancelSignal, CancellationHandle, Emission, EventKind, RunEventEmitter, Step, StepContext,
    StepId,
};
use crate::error::{OrchestratorError, Result};
use crate::process::{ProcessDefinition, ResolvedTarget};
use crate::state_machine::{RunStateMachine, RunStatus};
use crate::state_store::StateStore;

/// Limits applied to a single run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Dequeued events (bootstrap included) before the run is faulted
    pub max_dispatches: usize,
    /// Per-invocation deadline; a timeout is a handler failure
    pub invocation_timeout: Option<Duration>,
    /// Distinct steps invoked concurrently for one dequeued event
    pub max_parallel_branches: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_dispatches: 1000,
            invocation_timeout: None,
            max_parallel_branches: 8,
        }
    }
}

impl RunnerConfig {
    pub fn with_max_dispatches(mut self, limit: usize) -> Self {
        self.max_dispatches = limit;
        self
    }

    pub fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    pub fn with_max_parallel_branches(mut self, branches: usize) -> Self {
        self.max_parallel_branches = branches.max(1);
        self
    }
}

/// A handler invocation that failed without faulting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationFailure {
    pub step: StepId,
    pub function: String,
    pub error: String,
}

/// Final report of a run that did not fault.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// `Idle` when the queue drained, `Cancelled` when stopped early
    pub status: RunStatus,
    /// Last document the output step handled successfully
    pub output: Option<Document>,
    pub failures: Vec<InvocationFailure>,
    /// Committed state of every step activated during the run
    pub states: HashMap<StepId, StepState>,
    pub dispatched: usize,
}

impl RunOutcome {
    pub fn state(&self, step: &str) -> Option<&StepState> {
        self.states.get(&StepId::from(step))
    }

    pub fn is_published(&self) -> bool {
        self.status == RunStatus::Idle && self.output.is_some()
    }
}

/// What a host can observe about a run started with [`ProcessRunner::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunResult {
    #[default]
    Pending,
    Published(Document),
    /// Drained without a document reaching the output step
    Unpublished,
    Failed(String),
    Cancelled,
}

impl RunResult {
    fn from_run(result: &Result<RunOutcome>) -> Self {
        match result {
            Ok(outcome) if outcome.status == RunStatus::Cancelled => Self::Cancelled,
            Ok(outcome) => match &outcome.output {
                Some(document) => Self::Published(document.clone()),
                None => Self::Unpublished,
            },
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Handle to a run executing on the tokio runtime.
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancellationHandle,
    status: watch::Receiver<RunStatus>,
    result: watch::Receiver<RunResult>,
    join: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    /// Current result; `Pending` until the run finishes.
    pub fn result(&self) -> RunResult {
        self.result.borrow().clone()
    }

    /// Request cooperative cancellation. The run stops before its next
    /// dispatch and in-flight handlers drop their emissions.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<RunOutcome> {
        self.join
            .await
            .map_err(|e| OrchestratorError::RunTask(e.to_string()))?
    }
}

struct ActiveStep {
    state: StepState,
    /// Number of commits applied to `state` in this run
    version: u64,
}

struct Pending<E> {
    source: StepId,
    event: E,
    payload: Payload,
}

/// Mutable bookkeeping for one run.
struct RunData<E> {
    run_id: Uuid,
    active: HashMap<StepId, ActiveStep>,
    queue: VecDeque<Pending<E>>,
    failures: Vec<InvocationFailure>,
    output: Option<Document>,
    dispatched: usize,
}

/// Result of invoking one step's share of a dispatch wave.
struct GroupOutcome<E> {
    step: StepId,
    base_version: u64,
    state: StepState,
    commits: u64,
    invocations: Vec<(ResolvedTarget, Result<Vec<Emission<E>>>)>,
}

struct StatusTracker {
    sender: watch::Sender<RunStatus>,
}

impl StatusTracker {
    fn current(&self) -> RunStatus {
        *self.sender.borrow()
    }

    fn transition(&self, to: RunStatus) -> Result<()> {
        let from = self.current();
        RunStateMachine::validate_transition(&from, &to)?;
        self.sender.send_replace(to);
        Ok(())
    }
}

/// Drives runs of a [`ProcessDefinition`].
///
/// A runner is bound to one run id. Step state is loaded from the state store
/// under that id on activation and saved back when the run ends, so a second
/// runner built [`with_run_id`](Self::with_run_id) resumes where the first
/// one stopped.
pub struct ProcessRunner<E> {
    definition: Arc<ProcessDefinition<E>>,
    config: RunnerConfig,
    state_store: Option<Arc<dyn StateStore>>,
    emitter: RunEventEmitter,
    cancel: CancellationHandle,
    run_id: Uuid,
}

impl<E: EventKind> ProcessRunner<E> {
    pub fn new(definition: Arc<ProcessDefinition<E>>) -> Self {
        Self {
            definition,
            config: RunnerConfig::default(),
            state_store: None,
            emitter: RunEventEmitter::default(),
            cancel: CancellationHandle::new(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.emitter = RunEventEmitter::new(Some(bus));
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn definition(&self) -> &ProcessDefinition<E> {
        &self.definition
    }

    /// Handle that cancels runs driven through [`run`](Self::run).
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Number of lifecycle events this runner has published.
    pub fn events_emitted(&self) -> u64 {
        self.emitter.current_sequence()
    }

    /// Run to completion on the current task.
    pub async fn run(&self, seed: Payload) -> Result<RunOutcome> {
        let (sender, _) = watch::channel(RunStatus::Idle);
        self.execute(seed, StatusTracker { sender }).await
    }

    /// Spawn the run and return a handle to observe or cancel it.
    pub fn start(self, seed: Payload) -> RunHandle {
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);
        let (result_tx, result_rx) = watch::channel(RunResult::Pending);
        let run_id = self.run_id;
        let cancel = self.cancel.clone();

        let join = tokio::spawn(async move {
            let result = self.execute(seed, StatusTracker { sender: status_tx }).await;
            result_tx.send_replace(RunResult::from_run(&result));
            result
        });

        RunHandle {
            run_id,
            cancel,
            status: status_rx,
            result: result_rx,
            join,
        }
    }

    async fn execute(&self, seed: Payload, status: StatusTracker) -> Result<RunOutcome> {
        let mut run = RunData {
            run_id: self.run_id,
            active: HashMap::new(),
            queue: VecDeque::new(),
            failures: Vec::new(),
            output: None,
            dispatched: 0,
        };

        match self.drive(&mut run, seed, &status).await {
            Ok(final_status) => {
                let outcome = RunOutcome {
                    run_id: run.run_id,
                    status: final_status,
                    output: run.output,
                    failures: run.failures,
                    states: run
                        .active
                        .into_iter()
                        .map(|(id, active)| (id, active.state))
                        .collect(),
                    dispatched: run.dispatched,
                };
                Ok(outcome)
            }
            Err(e) => {
                error!(run_id = %run.run_id, error = %e, "Run faulted");
                if status.transition(RunStatus::Faulted).is_err() {
                    status.sender.send_replace(RunStatus::Faulted);
                }
                self.emitter.emit(RunEvent::RunFaulted {
                    run_id: run.run_id,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        run: &mut RunData<E>,
        seed: Payload,
        status: &StatusTracker,
    ) -> Result<RunStatus> {
        let definition = &self.definition;
        for warning in definition.warnings() {
            warn!(run_id = %run.run_id, process = %definition.name(), "{}", warning);
        }

        status.transition(RunStatus::Dispatching)?;
        info!(
            run_id = %run.run_id,
            process = %definition.name(),
            entry_event = %definition.entry_event(),
            "Run started"
        );
        self.emitter.emit(RunEvent::RunStarted {
            run_id: run.run_id,
            process: definition.name().to_string(),
            entry_event: definition.entry_event().to_string(),
        });

        self.bootstrap(run, seed).await?;

        while let Some(pending) = run.queue.pop_front() {
            if self.cancel.is_cancelled() {
                return self.finish_cancelled(run, status).await;
            }

            run.dispatched += 1;
            if run.dispatched > self.config.max_dispatches {
                return Err(OrchestratorError::DispatchLimitExceeded {
                    limit: self.config.max_dispatches,
                });
            }

            let targets = definition
                .router()
                .resolve(&pending.source, pending.event)
                .to_vec();
            if targets.is_empty() {
                debug!(
                    run_id = %run.run_id,
                    source = %pending.source,
                    event = %pending.event,
                    "No route for event, branch ends"
                );
                continue;
            }

            self.dispatch_wave(run, &pending, targets).await?;
        }

        if self.cancel.is_cancelled() {
            return self.finish_cancelled(run, status).await;
        }

        self.persist(run).await?;
        status.transition(RunStatus::Idle)?;

        let published = run.output.is_some();
        info!(
            run_id = %run.run_id,
            dispatched = run.dispatched,
            failures = run.failures.len(),
            published,
            "Run completed"
        );
        self.emitter.emit(RunEvent::RunCompleted {
            run_id: run.run_id,
            dispatched: run.dispatched,
            published,
        });
        Ok(RunStatus::Idle)
    }

    /// Deliver the seed to the entry step, bypassing the router.
    async fn bootstrap(&self, run: &mut RunData<E>, seed: Payload) -> Result<()> {
        let entry = self.definition.entry_step().clone();
        let step = self.lookup(&entry)?;
        let function = step.default_function().ok_or_else(|| {
            OrchestratorError::configuration(format!("step {} exposes no handlers", entry))
        })?;

        run.dispatched += 1;
        self.ensure_active(run, &entry).await?;

        let committed = self.committed_state(run, &entry)?;
        let result = self
            .invoke(run.run_id, &step, &entry, function, committed, seed.clone())
            .await;

        match result {
            Ok((state, emissions)) => {
                self.commit(run, &entry, state)?;
                self.capture_output(run, &entry, &seed);
                self.enqueue(run, &entry, emissions);
                Ok(())
            }
            Err(OrchestratorError::Cancelled) => Ok(()),
            Err(e) => Err(OrchestratorError::EntryFailed {
                step: entry.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Invoke every target of one dequeued event.
    ///
    /// Targets on distinct steps run concurrently; targets on the same step run
    /// in declaration order on that step's rolling state. All emissions are
    /// queued before the next dequeue, in target order.
    async fn dispatch_wave(
        &self,
        run: &mut RunData<E>,
        pending: &Pending<E>,
        targets: Vec<ResolvedTarget>,
    ) -> Result<()> {
        let mut groups: Vec<(StepId, Vec<ResolvedTarget>)> = Vec::new();
        for target in targets {
            self.ensure_active(run, &target.step).await?;
            match groups.iter_mut().find(|(step, _)| *step == target.step) {
                Some((_, members)) => members.push(target),
                None => groups.push((target.step.clone(), vec![target])),
            }
        }

        let mut work = Vec::with_capacity(groups.len());
        for (step_id, members) in groups {
            let step = self.lookup(&step_id)?;
            let active = run.active.get(&step_id).ok_or_else(|| {
                OrchestratorError::StateStore(format!("step {} was not activated", step_id))
            })?;
            work.push((step, step_id, members, active.state.clone(), active.version));
        }

        let run_id = run.run_id;
        let futures: Vec<_> = work
            .into_iter()
            .map(|(step, step_id, members, mut state, base_version)| {
                let payload = pending.payload.clone();
                async move {
                    let mut commits = 0;
                    let mut invocations = Vec::with_capacity(members.len());
                    for target in members {
                        let result = self
                            .invoke(run_id, &step, &step_id, &target.function, state.clone(), payload.clone())
                            .await;
                        let result = match result {
                            Ok((next, emissions)) => {
                                state = next;
                                commits += 1;
                                Ok(emissions)
                            }
                            Err(e) => Err(e),
                        };
                        invocations.push((target, result));
                    }
                    GroupOutcome {
                        step: step_id,
                        base_version,
                        state,
                        commits,
                        invocations,
                    }
                }
            })
            .collect();

        let outcomes: Vec<GroupOutcome<E>> = stream::iter(futures)
            .buffered(self.config.max_parallel_branches.max(1))
            .collect()
            .await;

        for group in outcomes {
            let active = run.active.get_mut(&group.step).ok_or_else(|| {
                OrchestratorError::StateStore(format!("step {} was not activated", group.step))
            })?;
            if active.version != group.base_version {
                return Err(OrchestratorError::ConcurrencyFault {
                    step: group.step.to_string(),
                    expected: group.base_version,
                    found: active.version,
                });
            }
            active.state = group.state;
            active.version += group.commits;

            for (target, result) in group.invocations {
                match result {
                    Ok(emissions) => {
                        self.capture_output(run, &target.step, &pending.payload);
                        self.enqueue(run, &target.step, emissions);
                    }
                    Err(OrchestratorError::Cancelled) => {
                        debug!(run_id = %run.run_id, target = %target, "Invocation abandoned on cancel");
                    }
                    Err(e) if e.is_run_fatal() => return Err(e),
                    Err(e) => self.record_failure(run, &target, e),
                }
            }
        }

        Ok(())
    }

    /// Run one handler on a private copy of the committed state.
    async fn invoke(
        &self,
        run_id: Uuid,
        step: &Arc<dyn Step<E>>,
        step_id: &StepId,
        function: &str,
        mut state: StepState,
        payload: Payload,
    ) -> Result<(StepState, Vec<Emission<E>>)> {
        let mut signal: CancelSignal = self.cancel.signal();
        if signal.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        debug!(run_id = %run_id, step = %step_id, function, payload = payload.kind(), "Invoking handler");
        let mut ctx = StepContext::new(run_id, step_id.clone(), function, signal.clone());

        let result = {
            let call = step.invoke(function, &mut ctx, &mut state, payload);
            match self.config.invocation_timeout {
                Some(limit) => tokio::select! {
                    outcome = tokio::time::timeout(limit, call) => {
                        outcome.unwrap_or_else(|_| Err(OrchestratorError::Timeout {
                            step: step_id.to_string(),
                            function: function.to_string(),
                            duration_ms: saturating_millis(limit),
                        }))
                    }
                    _ = signal.cancelled() => Err(OrchestratorError::Cancelled),
                },
                None => tokio::select! {
                    outcome = call => outcome,
                    _ = signal.cancelled() => Err(OrchestratorError::Cancelled),
                },
            }
        };
        result?;

        if ctx.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        Ok((state, ctx.into_emissions()))
    }

    /// Activate a step the first time the run dispatches into it.
    async fn ensure_active(&self, run: &mut RunData<E>, step_id: &StepId) -> Result<()> {
        if run.active.contains_key(step_id) {
            return Ok(());
        }

        let step = self.lookup(step_id)?;
        let restored = match &self.state_store {
            Some(store) => store.load(run.run_id, step_id).await?,
            None => None,
        };
        let is_restored = restored.is_some();
        let mut state = restored.unwrap_or_default();
        step.activate(&mut state).await?;

        debug!(
            run_id = %run.run_id,
            step = %step_id,
            restored = is_restored,
            revision_count = state.revision_count(),
            "Step activated"
        );
        self.emitter.emit(RunEvent::StepActivated {
            run_id: run.run_id,
            step: step_id.to_string(),
            restored: is_restored,
        });

        run.active.insert(step_id.clone(), ActiveStep { state, version: 0 });
        Ok(())
    }

    fn committed_state(&self, run: &RunData<E>, step_id: &StepId) -> Result<StepState> {
        run.active
            .get(step_id)
            .map(|active| active.state.clone())
            .ok_or_else(|| OrchestratorError::StateStore(format!("step {} was not activated", step_id)))
    }

    fn commit(&self, run: &mut RunData<E>, step_id: &StepId, state: StepState) -> Result<()> {
        let active = run.active.get_mut(step_id).ok_or_else(|| {
            OrchestratorError::StateStore(format!("step {} was not activated", step_id))
        })?;
        active.state = state;
        active.version += 1;
        Ok(())
    }

    fn enqueue(&self, run: &mut RunData<E>, source: &StepId, emissions: Vec<Emission<E>>) {
        for emission in emissions {
            let targets = self.definition.router().resolve(source, emission.event).len();
            self.emitter.emit(RunEvent::EventEmitted {
                run_id: run.run_id,
                source: source.to_string(),
                event: emission.event.to_string(),
                targets,
            });
            run.queue.push_back(Pending {
                source: source.clone(),
                event: emission.event,
                payload: emission.payload,
            });
        }
    }

    fn capture_output(&self, run: &mut RunData<E>, step_id: &StepId, payload: &Payload) {
        if self.definition.output_step() != Some(step_id) {
            return;
        }
        if let Some(document) = payload.as_document() {
            info!(
                run_id = %run.run_id,
                step = %step_id,
                document_id = %document.id(),
                title = %document.title(),
                "Output captured"
            );
            self.emitter.emit(RunEvent::OutputCaptured {
                run_id: run.run_id,
                step: step_id.to_string(),
                document_id: document.id(),
            });
            run.output = Some(document.clone());
        }
    }

    fn record_failure(&self, run: &mut RunData<E>, target: &ResolvedTarget, e: OrchestratorError) {
        error!(
            run_id = %run.run_id,
            step = %target.step,
            function = %target.function,
            error = %e,
            "Invocation failed, branch ends"
        );
        self.emitter.emit(RunEvent::InvocationFailed {
            run_id: run.run_id,
            step: target.step.to_string(),
            function: target.function.clone(),
            error: e.to_string(),
        });
        run.failures.push(InvocationFailure {
            step: target.step.clone(),
            function: target.function.clone(),
            error: e.to_string(),
        });
    }

    async fn finish_cancelled(&self, run: &mut RunData<E>, status: &StatusTracker) -> Result<RunStatus> {
        self.persist(run).await?;
        status.transition(RunStatus::Cancelled)?;
        info!(run_id = %run.run_id, dispatched = run.dispatched, "Run cancelled");
        self.emitter.emit(RunEvent::RunCancelled { run_id: run.run_id });
        Ok(RunStatus::Cancelled)
    }

    /// Save every activated step, in registration order.
    async fn persist(&self, run: &RunData<E>) -> Result<()> {
        let Some(store) = &self.state_store else {
            return Ok(());
        };
        for step_id in self.definition.step_ids() {
            if let Some(active) = run.active.get(step_id) {
                store.save(run.run_id, step_id, &active.state).await?;
            }
        }
        Ok(())
    }

    fn lookup(&self, step_id: &StepId) -> Result<Arc<dyn Step<E>>> {
        self.definition
            .step(step_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::configuration(format!("unknown step {}", step_id)))
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
