//! # Startup Orchestrator
//!
//! Runs startup tasks strictly in ascending `order`, one at a time.
//!
//! ## Phases
//!
//! PENDING → RUNNING(task) → ... → COMPLETED
//!
//! Terminal states: COMPLETED, ABORTED(task, cause), CANCELLED
//!
//! ## Abort Invariant
//!
//! The first task to fail ends the run. No later task runs, and the
//! returned error names the failing task. Cancellation is checked before
//! each task and ends the run as CANCELLED, not as a failure.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

/// Error type returned by a startup task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Receiver side of the process cancellation flag. `true` means stop.
pub type CancellationSignal = watch::Receiver<bool>;

/// A fresh cancellation flag, initially clear.
pub fn cancellation_channel() -> (watch::Sender<bool>, CancellationSignal) {
    watch::channel(false)
}

fn is_cancelled(signal: &CancellationSignal) -> bool {
    *signal.borrow()
}

/// One step of process startup.
pub trait StartupTask: Send + Sync {
    /// Position in the sequence. Lower runs first.
    fn order(&self) -> i32;

    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    fn run(&self, cancel: &CancellationSignal) -> Result<(), TaskError>;
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupPhase {
    Pending,
    Running { task: String },
    Completed,
    Aborted { task: String, cause: String },
    Cancelled,
}

impl StartupPhase {
    /// Whether this phase is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted { .. } | Self::Cancelled)
    }
}

impl std::fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Running { task } => write!(f, "RUNNING({task})"),
            Self::Completed => f.write_str("COMPLETED"),
            Self::Aborted { task, .. } => write!(f, "ABORTED({task})"),
            Self::Cancelled => f.write_str("CANCELLED"),
        }
    }
}

/// Execution record of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub name: String,
    pub order: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: bool,
}

/// Why a startup run did not complete.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Startup task '{task_name}' failed: {source}")]
    TaskFailed {
        task_name: String,
        #[source]
        source: TaskError,
    },

    #[error("startup cancelled before task '{next_task}'")]
    Cancelled { next_task: String },

    /// `run` was called on an orchestrator that already finished.
    #[error("startup orchestrator already finished in phase {phase}")]
    AlreadyFinished { phase: StartupPhase },
}

/// Sequential runner for [`StartupTask`]s.
pub struct StartupOrchestrator {
    tasks: Vec<Box<dyn StartupTask>>,
    phase: StartupPhase,
    records: Vec<TaskRecord>,
}

impl std::fmt::Debug for StartupOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupOrchestrator")
            .field("tasks", &self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("phase", &self.phase)
            .field("records", &self.records.len())
            .finish()
    }
}

impl StartupOrchestrator {
    /// Tasks are sorted by `order`; equal orders keep registration order.
    pub fn new(mut tasks: Vec<Box<dyn StartupTask>>) -> Self {
        tasks.sort_by_key(|t| t.order());
        Self {
            tasks,
            phase: StartupPhase::Pending,
            records: Vec::new(),
        }
    }

    pub fn phase(&self) -> &StartupPhase {
        &self.phase
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Run every task once.
    pub fn run(&mut self, cancel: &CancellationSignal) -> Result<(), StartupError> {
        if self.phase.is_terminal() {
            return Err(StartupError::AlreadyFinished {
                phase: self.phase.clone(),
            });
        }

        tracing::info!(tasks = self.tasks.len(), "running startup tasks");

        for task in &self.tasks {
            if is_cancelled(cancel) {
                tracing::info!(next_task = task.name(), "startup cancelled");
                self.phase = StartupPhase::Cancelled;
                return Err(StartupError::Cancelled {
                    next_task: task.name().to_string(),
                });
            }

            self.phase = StartupPhase::Running {
                task: task.name().to_string(),
            };
            tracing::info!(task = task.name(), order = task.order(), "startup task starting");

            let started_at = Utc::now();
            let outcome = task.run(cancel);
            let finished_at = Utc::now();
            self.records.push(TaskRecord {
                name: task.name().to_string(),
                order: task.order(),
                started_at,
                finished_at,
                succeeded: outcome.is_ok(),
            });

            if let Err(source) = outcome {
                tracing::error!(task = task.name(), error = %source, "startup task failed");
                self.phase = StartupPhase::Aborted {
                    task: task.name().to_string(),
                    cause: source.to_string(),
                };
                return Err(StartupError::TaskFailed {
                    task_name: task.name().to_string(),
                    source,
                });
            }

            let elapsed_ms = (finished_at - started_at).num_milliseconds();
            tracing::info!(task = task.name(), elapsed_ms, "startup task completed");
        }

        self.phase = StartupPhase::Completed;
        tracing::info!("all startup tasks completed");
        Ok(())
    }
}
